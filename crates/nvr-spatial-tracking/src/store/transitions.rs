//! Camera transition persistence, learned statistics and auto-detection.

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::{enum_col, json_col, opt_json_col, time_col, to_millis, Result, SpatialStore, StoreError};
use crate::domain::CameraTransition;
use crate::inference::TransitionDetector;

const TRANSITION_COLUMNS: &str = "id, from_camera_id, to_camera_id, transition_type, bidirectional, overlap_zone, \
     expected_transit_time, transit_time_variance, exit_zone, entry_zone, avg_transit_time, success_rate, \
     total_handoffs, successful_handoffs, created_at, updated_at";

fn transition_from_row(row: &Row<'_>) -> rusqlite::Result<CameraTransition> {
    Ok(CameraTransition {
        id: row.get(0)?,
        from_camera_id: row.get(1)?,
        to_camera_id: row.get(2)?,
        transition_type: enum_col(row, 3)?,
        bidirectional: row.get(4)?,
        overlap_zone: json_col(row, 5)?,
        expected_transit_time: row.get(6)?,
        transit_time_variance: row.get(7)?,
        exit_zone: opt_json_col(row, 8)?,
        entry_zone: opt_json_col(row, 9)?,
        avg_transit_time: row.get(10)?,
        success_rate: row.get(11)?,
        total_handoffs: row.get(12)?,
        successful_handoffs: row.get(13)?,
        created_at: time_col(row, 14)?,
        updated_at: time_col(row, 15)?,
    })
}

fn insert_transition(conn: &Connection, t: &CameraTransition) -> Result<()> {
    let overlap = serde_json::to_string(&t.overlap_zone)?;
    let exit_zone = t.exit_zone.as_ref().map(serde_json::to_string).transpose()?;
    let entry_zone = t.entry_zone.as_ref().map(serde_json::to_string).transpose()?;

    conn.execute(
        &format!(
            "INSERT INTO camera_transitions ({TRANSITION_COLUMNS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)"
        ),
        params![
            t.id,
            t.from_camera_id,
            t.to_camera_id,
            t.transition_type.as_str(),
            t.bidirectional,
            overlap,
            t.expected_transit_time,
            t.transit_time_variance,
            exit_zone,
            entry_zone,
            t.avg_transit_time,
            t.success_rate,
            t.total_handoffs,
            t.successful_handoffs,
            to_millis(t.created_at),
            to_millis(t.updated_at),
        ],
    )
    .map_err(|e| {
        StoreError::from_write(e, || {
            format!("transition {} -> {} already exists", t.from_camera_id, t.to_camera_id)
        })
    })?;
    Ok(())
}

fn select_by_cameras(conn: &Connection, from: &str, to: &str) -> Result<Option<CameraTransition>> {
    let transition = conn
        .query_row(
            &format!(
                "SELECT {TRANSITION_COLUMNS} FROM camera_transitions
                 WHERE (from_camera_id = ?1 AND to_camera_id = ?2)
                    OR (bidirectional = 1 AND from_camera_id = ?2 AND to_camera_id = ?1)
                 ORDER BY (from_camera_id = ?1) DESC, created_at, rowid
                 LIMIT 1"
            ),
            params![from, to],
            transition_from_row,
        )
        .optional()?;
    Ok(transition)
}

impl SpatialStore {
    /// Insert a transition. Assigns an id when empty and stamps both timestamps.
    pub fn create_transition(&self, mut transition: CameraTransition) -> Result<CameraTransition> {
        if transition.from_camera_id.is_empty() || transition.to_camera_id.is_empty() {
            return Err(StoreError::Validation(
                "from_camera_id and to_camera_id are required".to_string(),
            ));
        }
        transition.validate_timing().map_err(StoreError::Validation)?;
        if transition.id.is_empty() {
            transition.id = crate::domain::new_id();
        }
        let now = Utc::now();
        transition.created_at = now;
        transition.updated_at = now;

        let conn = self.conn.lock();
        insert_transition(&conn, &transition)?;
        Ok(transition)
    }

    /// Get a transition by id
    pub fn get_transition(&self, id: &str) -> Result<Option<CameraTransition>> {
        let conn = self.conn.lock();
        let transition = conn
            .query_row(
                &format!("SELECT {TRANSITION_COLUMNS} FROM camera_transitions WHERE id = ?1"),
                params![id],
                transition_from_row,
            )
            .optional()?;
        Ok(transition)
    }

    /// All transitions, in creation order
    pub fn list_transitions(&self) -> Result<Vec<CameraTransition>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT {TRANSITION_COLUMNS} FROM camera_transitions ORDER BY created_at, rowid"
        ))?;
        let transitions = stmt
            .query_map([], transition_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(transitions)
    }

    /// Transitions leaving `camera_id`: those starting there, plus
    /// bidirectional ones ending there. Creation order.
    pub fn list_transitions_from_camera(&self, camera_id: &str) -> Result<Vec<CameraTransition>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT {TRANSITION_COLUMNS} FROM camera_transitions
             WHERE from_camera_id = ?1 OR (bidirectional = 1 AND to_camera_id = ?1)
             ORDER BY created_at, rowid"
        ))?;
        let transitions = stmt
            .query_map(params![camera_id], transition_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(transitions)
    }

    /// Transition linking `from` to `to`, either stored that way or as a
    /// bidirectional `to -> from`. The exact direction wins when both exist.
    pub fn get_transition_by_cameras(&self, from: &str, to: &str) -> Result<Option<CameraTransition>> {
        let conn = self.conn.lock();
        select_by_cameras(&conn, from, to)
    }

    /// Overwrite configuration fields and bump `updated_at`.
    ///
    /// Learned statistics are left untouched; they only change through
    /// [`SpatialStore::record_handoff`].
    pub fn update_transition(&self, mut transition: CameraTransition) -> Result<CameraTransition> {
        transition.validate_timing().map_err(StoreError::Validation)?;
        transition.updated_at = Utc::now();
        let overlap = serde_json::to_string(&transition.overlap_zone)?;
        let exit_zone = transition.exit_zone.as_ref().map(serde_json::to_string).transpose()?;
        let entry_zone = transition.entry_zone.as_ref().map(serde_json::to_string).transpose()?;

        let conn = self.conn.lock();
        let changed = conn
            .execute(
                "UPDATE camera_transitions
                 SET from_camera_id = ?1, to_camera_id = ?2, transition_type = ?3, bidirectional = ?4,
                     overlap_zone = ?5, expected_transit_time = ?6, transit_time_variance = ?7,
                     exit_zone = ?8, entry_zone = ?9, updated_at = ?10
                 WHERE id = ?11",
                params![
                    transition.from_camera_id,
                    transition.to_camera_id,
                    transition.transition_type.as_str(),
                    transition.bidirectional,
                    overlap,
                    transition.expected_transit_time,
                    transition.transit_time_variance,
                    exit_zone,
                    entry_zone,
                    to_millis(transition.updated_at),
                    transition.id,
                ],
            )
            .map_err(|e| {
                StoreError::from_write(e, || {
                    format!(
                        "transition {} -> {} already exists",
                        transition.from_camera_id, transition.to_camera_id
                    )
                })
            })?;
        if changed == 0 {
            return Err(StoreError::not_found("transition", transition.id));
        }

        conn.query_row(
            &format!("SELECT {TRANSITION_COLUMNS} FROM camera_transitions WHERE id = ?1"),
            params![transition.id],
            transition_from_row,
        )
        .map_err(StoreError::from)
    }

    /// Delete a transition
    pub fn delete_transition(&self, id: &str) -> Result<()> {
        let conn = self.conn.lock();
        let changed = conn.execute("DELETE FROM camera_transitions WHERE id = ?1", params![id])?;
        if changed == 0 {
            return Err(StoreError::not_found("transition", id));
        }
        Ok(())
    }

    /// Fold one handoff attempt into a transition's learned statistics.
    ///
    /// Read-modify-write inside one transaction; returns the updated record.
    pub fn record_handoff(&self, transition_id: &str, transit_time: f64, success: bool) -> Result<CameraTransition> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;

        let mut transition = tx
            .query_row(
                &format!("SELECT {TRANSITION_COLUMNS} FROM camera_transitions WHERE id = ?1"),
                params![transition_id],
                transition_from_row,
            )
            .optional()?
            .ok_or_else(|| StoreError::not_found("transition", transition_id))?;

        transition.record_handoff(transit_time, success);

        tx.execute(
            "UPDATE camera_transitions
             SET total_handoffs = ?1, successful_handoffs = ?2, avg_transit_time = ?3, success_rate = ?4, updated_at = ?5
             WHERE id = ?6",
            params![
                transition.total_handoffs,
                transition.successful_handoffs,
                transition.avg_transit_time,
                transition.success_rate,
                to_millis(transition.updated_at),
                transition.id,
            ],
        )?;
        tx.commit()?;

        Ok(transition)
    }

    /// Classify every placement pair on a map and persist new transitions.
    ///
    /// Pairs that already have a transition (in either direction) keep its
    /// identity and are not rewritten. The full set is returned for review.
    pub fn auto_detect_transitions(
        &self,
        map_id: &str,
        detector: &TransitionDetector,
    ) -> crate::Result<Vec<CameraTransition>> {
        let placements = self.list_placements_by_map(map_id)?;
        let proposals = detector.detect(&placements)?;

        let mut conn = self.conn.lock();
        let tx = conn.transaction().map_err(StoreError::from)?;
        let mut results = Vec::with_capacity(proposals.len());
        for mut proposal in proposals {
            match select_by_cameras(&tx, &proposal.from_camera_id, &proposal.to_camera_id)? {
                Some(existing) => {
                    proposal.id = existing.id;
                    proposal.created_at = existing.created_at;
                }
                None => insert_transition(&tx, &proposal)?,
            }
            results.push(proposal);
        }
        tx.commit().map_err(StoreError::from)?;

        tracing::info!(map_id = %map_id, transitions = results.len(), "Auto-detected transitions");
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{CameraPlacement, SpatialMap, TransitionType};
    use crate::geometry::Point;
    use crate::SpatialError;

    #[test]
    fn test_transition_crud_and_unique_pair() {
        let store = SpatialStore::in_memory().unwrap();
        let t = store
            .create_transition(CameraTransition::new("a", "b", TransitionType::Gap))
            .unwrap();
        assert!(store.get_transition(&t.id).unwrap().is_some());

        let dup = CameraTransition::new("a", "b", TransitionType::Adjacent);
        assert!(matches!(store.create_transition(dup), Err(StoreError::Conflict(_))));

        let mut edited = t.clone();
        edited.expected_transit_time = 42.0;
        edited.total_handoffs = 999;
        let updated = store.update_transition(edited).unwrap();
        assert_eq!(updated.expected_transit_time, 42.0);
        assert_eq!(updated.total_handoffs, 0);

        store.delete_transition(&t.id).unwrap();
        assert!(store.list_transitions().unwrap().is_empty());
    }

    #[test]
    fn test_out_of_range_timings_are_rejected() {
        let store = SpatialStore::in_memory().unwrap();
        let mut negative = CameraTransition::new("a", "b", TransitionType::Gap);
        negative.expected_transit_time = -10.0;
        assert!(matches!(store.create_transition(negative), Err(StoreError::Validation(_))));

        let t = store
            .create_transition(CameraTransition::new("a", "b", TransitionType::Gap))
            .unwrap();
        let mut huge = t.clone();
        huge.transit_time_variance = 1e13;
        assert!(matches!(store.update_transition(huge), Err(StoreError::Validation(_))));
        assert_eq!(store.get_transition(&t.id).unwrap().unwrap().transit_time_variance, 0.0);
    }

    #[test]
    fn test_lookup_by_cameras_honours_direction() {
        let store = SpatialStore::in_memory().unwrap();
        let mut oneway = CameraTransition::new("a", "b", TransitionType::Gap);
        oneway.bidirectional = false;
        store.create_transition(oneway).unwrap();
        store
            .create_transition(CameraTransition::new("c", "a", TransitionType::Overlap))
            .unwrap();

        assert!(store.get_transition_by_cameras("a", "b").unwrap().is_some());
        assert!(store.get_transition_by_cameras("b", "a").unwrap().is_none());
        assert!(store.get_transition_by_cameras("a", "c").unwrap().is_some());

        let from_a: Vec<_> = store
            .list_transitions_from_camera("a")
            .unwrap()
            .into_iter()
            .filter_map(|t| t.destination_from("a").map(str::to_string))
            .collect();
        assert_eq!(from_a, vec!["b".to_string(), "c".to_string()]);
        assert!(store.list_transitions_from_camera("b").unwrap().is_empty());
    }

    #[test]
    fn test_record_handoff_persists_running_mean() {
        let store = SpatialStore::in_memory().unwrap();
        let t = store
            .create_transition(CameraTransition::new("a", "b", TransitionType::Gap))
            .unwrap();

        store.record_handoff(&t.id, 10.0, true).unwrap();
        let after_one = store.get_transition(&t.id).unwrap().unwrap();
        assert_eq!(after_one.avg_transit_time, 10.0);
        assert_eq!(after_one.success_rate, 1.0);

        store.record_handoff(&t.id, 20.0, true).unwrap();
        store.record_handoff(&t.id, 0.0, false).unwrap();
        let after = store.get_transition(&t.id).unwrap().unwrap();
        assert_eq!(after.avg_transit_time, 15.0);
        assert_eq!(after.total_handoffs, 3);
        assert_eq!(after.successful_handoffs, 2);
        assert!((after.success_rate - 2.0 / 3.0).abs() < 1e-12);

        assert!(matches!(
            store.record_handoff("missing", 1.0, true),
            Err(StoreError::NotFound { .. })
        ));
    }

    #[test]
    fn test_auto_detect_is_idempotent() {
        let store = SpatialStore::in_memory().unwrap();
        let map = store.create_map(SpatialMap::new("F1", 200.0, 100.0, 1.0)).unwrap();
        store
            .create_placement(CameraPlacement::new("cam-1", &map.id, Point::new(0.0, 0.0), 0.0, 60.0, 80.0))
            .unwrap();
        store
            .create_placement(CameraPlacement::new("cam-2", &map.id, Point::new(50.0, 0.0), 180.0, 60.0, 80.0))
            .unwrap();

        let detector = TransitionDetector::default();
        let first = store.auto_detect_transitions(&map.id, &detector).unwrap();
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].transition_type, TransitionType::Overlap);

        let second = store.auto_detect_transitions(&map.id, &detector).unwrap();
        assert_eq!(second[0].id, first[0].id);
        assert_eq!(store.list_transitions().unwrap().len(), 1);
    }

    #[test]
    fn test_auto_detect_needs_two_placements() {
        let store = SpatialStore::in_memory().unwrap();
        let map = store.create_map(SpatialMap::new("F1", 200.0, 100.0, 1.0)).unwrap();
        let err = store
            .auto_detect_transitions(&map.id, &TransitionDetector::default())
            .unwrap_err();
        assert!(matches!(err, SpatialError::Validation(_)));
    }
}
