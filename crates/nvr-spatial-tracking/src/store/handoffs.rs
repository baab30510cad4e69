//! Pending handoff persistence.

use chrono::{DateTime, Utc};
use rusqlite::{params, Row};

use super::{enum_col, json_col, opt_enum_col, time_col, to_millis, Result, SpatialStore};
use crate::domain::PendingHandoff;

const HANDOFF_COLUMNS: &str = "id, global_track_id, from_camera_id, to_camera_ids, transition_type, exited_at, \
     expected_by, exit_direction, exit_position, embedding, dominant_colors";

fn handoff_from_row(row: &Row<'_>) -> rusqlite::Result<PendingHandoff> {
    Ok(PendingHandoff {
        id: row.get(0)?,
        global_track_id: row.get(1)?,
        from_camera_id: row.get(2)?,
        to_camera_ids: json_col(row, 3)?,
        transition_type: enum_col(row, 4)?,
        exited_at: time_col(row, 5)?,
        expected_by: time_col(row, 6)?,
        exit_direction: opt_enum_col(row, 7)?,
        exit_position: json_col(row, 8)?,
        embedding: row.get::<_, Option<Vec<u8>>>(9)?.unwrap_or_default(),
        dominant_colors: json_col(row, 10)?,
    })
}

impl SpatialStore {
    /// Persist a pending handoff. The owning track row must exist.
    pub fn create_pending_handoff(&self, handoff: &PendingHandoff) -> Result<()> {
        let to_cameras = serde_json::to_string(&handoff.to_camera_ids)?;
        let position = serde_json::to_string(&handoff.exit_position)?;
        let colors = serde_json::to_string(&handoff.dominant_colors)?;
        let embedding = (!handoff.embedding.is_empty()).then_some(&handoff.embedding);

        let conn = self.conn.lock();
        conn.execute(
            &format!(
                "INSERT OR REPLACE INTO pending_handoffs ({HANDOFF_COLUMNS})
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)"
            ),
            params![
                handoff.id,
                handoff.global_track_id,
                handoff.from_camera_id,
                to_cameras,
                handoff.transition_type.as_str(),
                to_millis(handoff.exited_at),
                to_millis(handoff.expected_by),
                handoff.exit_direction.map(|d| d.as_str()),
                position,
                embedding,
                colors,
            ],
        )?;
        Ok(())
    }

    /// Remove a handoff. Returns whether a row existed.
    pub fn delete_pending_handoff(&self, id: &str) -> Result<bool> {
        let conn = self.conn.lock();
        let changed = conn.execute("DELETE FROM pending_handoffs WHERE id = ?1", params![id])?;
        Ok(changed > 0)
    }

    /// Handoffs still open at `now`, earliest deadline first
    pub fn list_pending_handoffs(&self, now: DateTime<Utc>) -> Result<Vec<PendingHandoff>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT {HANDOFF_COLUMNS} FROM pending_handoffs WHERE expected_by >= ?1 ORDER BY expected_by, rowid"
        ))?;
        let handoffs = stmt
            .query_map(params![to_millis(now)], handoff_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(handoffs)
    }

    /// Open handoffs listing `camera_id` as a candidate destination
    pub fn list_pending_handoffs_for_camera(&self, camera_id: &str, now: DateTime<Utc>) -> Result<Vec<PendingHandoff>> {
        Ok(self
            .list_pending_handoffs(now)?
            .into_iter()
            .filter(|h| h.expects_camera(camera_id))
            .collect())
    }

    /// Delete every handoff whose deadline passed before `now`.
    pub fn cleanup_expired_handoffs(&self, now: DateTime<Utc>) -> Result<usize> {
        let conn = self.conn.lock();
        let removed = conn.execute(
            "DELETE FROM pending_handoffs WHERE expected_by < ?1",
            params![to_millis(now)],
        )?;
        Ok(removed)
    }
}
