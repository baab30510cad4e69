//! Global track and segment persistence.

use rusqlite::{params, OptionalExtension, Row};

use super::{
    enum_col, json_col, opt_enum_col, opt_json_col, opt_time_col, time_col, to_millis, Result,
    SpatialStore,
};
use crate::domain::{GlobalTrack, TrackSegment, TrackState};

const TRACK_COLUMNS: &str = "id, first_seen, last_seen, current_camera_id, current_local_track, object_type, \
     embedding, embedding_confidence, dominant_colors, estimated_height, state, predicted_next_camera, \
     predicted_arrival, created_at, updated_at";

const SEGMENT_COLUMNS: &str = "id, global_track_id, camera_id, local_track_id, entered_at, exited_at, \
     exit_direction, exit_position, bounding_boxes";

fn track_from_row(row: &Row<'_>) -> rusqlite::Result<GlobalTrack> {
    Ok(GlobalTrack {
        id: row.get(0)?,
        first_seen: time_col(row, 1)?,
        last_seen: time_col(row, 2)?,
        current_camera_id: row.get(3)?,
        current_local_track: row.get(4)?,
        object_type: row.get(5)?,
        embedding: row.get::<_, Option<Vec<u8>>>(6)?.unwrap_or_default(),
        embedding_confidence: row.get(7)?,
        dominant_colors: json_col(row, 8)?,
        estimated_height: row.get(9)?,
        state: enum_col(row, 10)?,
        predicted_next_camera: row.get::<_, Option<String>>(11)?.filter(|c| !c.is_empty()),
        predicted_arrival: opt_time_col(row, 12)?,
        path: Vec::new(),
        created_at: time_col(row, 13)?,
        updated_at: time_col(row, 14)?,
    })
}

fn segment_from_row(row: &Row<'_>) -> rusqlite::Result<TrackSegment> {
    Ok(TrackSegment {
        id: row.get(0)?,
        global_track_id: row.get(1)?,
        camera_id: row.get(2)?,
        local_track_id: row.get(3)?,
        entered_at: time_col(row, 4)?,
        exited_at: opt_time_col(row, 5)?,
        exit_direction: opt_enum_col(row, 6)?,
        exit_position: opt_json_col(row, 7)?,
        bounding_boxes: json_col(row, 8)?,
    })
}

impl SpatialStore {
    /// Insert or overwrite a track row. Segments are written separately.
    pub fn save_track(&self, track: &GlobalTrack) -> Result<()> {
        let colors = serde_json::to_string(&track.dominant_colors)?;
        let embedding = (!track.embedding.is_empty()).then_some(&track.embedding);

        let conn = self.conn.lock();
        conn.execute(
            &format!(
                "INSERT INTO global_tracks ({TRACK_COLUMNS})
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)
                 ON CONFLICT(id) DO UPDATE SET
                    last_seen = excluded.last_seen,
                    current_camera_id = excluded.current_camera_id,
                    current_local_track = excluded.current_local_track,
                    object_type = excluded.object_type,
                    embedding = excluded.embedding,
                    embedding_confidence = excluded.embedding_confidence,
                    dominant_colors = excluded.dominant_colors,
                    estimated_height = excluded.estimated_height,
                    state = excluded.state,
                    predicted_next_camera = excluded.predicted_next_camera,
                    predicted_arrival = excluded.predicted_arrival,
                    updated_at = excluded.updated_at"
            ),
            params![
                track.id,
                to_millis(track.first_seen),
                to_millis(track.last_seen),
                track.current_camera_id,
                track.current_local_track,
                track.object_type,
                embedding,
                track.embedding_confidence,
                colors,
                track.estimated_height,
                track.state.as_str(),
                track.predicted_next_camera,
                track.predicted_arrival.map(to_millis),
                to_millis(track.created_at),
                to_millis(track.updated_at),
            ],
        )?;
        Ok(())
    }

    /// Insert or overwrite a segment. The owning track row must exist.
    pub fn save_segment(&self, segment: &TrackSegment) -> Result<()> {
        let position = segment.exit_position.as_ref().map(serde_json::to_string).transpose()?;
        let boxes = serde_json::to_string(&segment.bounding_boxes)?;

        let conn = self.conn.lock();
        conn.execute(
            &format!(
                "INSERT INTO track_segments ({SEGMENT_COLUMNS})
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                 ON CONFLICT(id) DO UPDATE SET
                    exited_at = excluded.exited_at,
                    exit_direction = excluded.exit_direction,
                    exit_position = excluded.exit_position,
                    bounding_boxes = excluded.bounding_boxes"
            ),
            params![
                segment.id,
                segment.global_track_id,
                segment.camera_id,
                segment.local_track_id,
                to_millis(segment.entered_at),
                segment.exited_at.map(to_millis),
                segment.exit_direction.map(|d| d.as_str()),
                position,
                boxes,
            ],
        )?;
        Ok(())
    }

    /// Get a track with its segments in entry order
    pub fn get_track(&self, id: &str) -> Result<Option<GlobalTrack>> {
        let conn = self.conn.lock();
        let track = conn
            .query_row(
                &format!("SELECT {TRACK_COLUMNS} FROM global_tracks WHERE id = ?1"),
                params![id],
                track_from_row,
            )
            .optional()?;

        let Some(mut track) = track else {
            return Ok(None);
        };

        let mut stmt = conn.prepare(&format!(
            "SELECT {SEGMENT_COLUMNS} FROM track_segments WHERE global_track_id = ?1 ORDER BY entered_at, rowid"
        ))?;
        track.path = stmt
            .query_map(params![id], segment_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(Some(track))
    }

    /// Tracks in a given state, most recently seen first, without segments
    pub fn list_tracks_by_state(&self, state: TrackState, limit: usize) -> Result<Vec<GlobalTrack>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT {TRACK_COLUMNS} FROM global_tracks WHERE state = ?1 ORDER BY last_seen DESC LIMIT ?2"
        ))?;
        let tracks = stmt
            .query_map(params![state.as_str(), limit as i64], track_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(tracks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{BoundingBox, DetectionEvent, EdgeDirection};
    use crate::geometry::Point;
    use chrono::Utc;

    #[test]
    fn test_track_round_trip_with_segments() {
        let store = SpatialStore::in_memory().unwrap();
        let event = DetectionEvent::new("cam-1", "t1", "person", Utc::now()).with_bounding_box(BoundingBox {
            x: 0.1,
            y: 0.1,
            width: 0.2,
            height: 0.5,
        });
        let mut track = GlobalTrack::start(&event);
        track.observe(&event, 100);
        store.save_track(&track).unwrap();
        store.save_segment(&track.path[0]).unwrap();

        let closed = track
            .close_segment(Utc::now(), Some(EdgeDirection::Left), Some(Point::new(3.0, 4.0)))
            .unwrap();
        track.mark_lost();
        store.save_segment(&closed).unwrap();
        store.save_track(&track).unwrap();

        let loaded = store.get_track(&track.id).unwrap().unwrap();
        assert_eq!(loaded.state, TrackState::Lost);
        assert_eq!(loaded.path.len(), 1);
        assert_eq!(loaded.path[0].exit_direction, Some(EdgeDirection::Left));
        assert_eq!(loaded.path[0].exit_position, Some(Point::new(3.0, 4.0)));
        assert_eq!(loaded.path[0].bounding_boxes.len(), 1);

        let lost = store.list_tracks_by_state(TrackState::Lost, 10).unwrap();
        assert_eq!(lost.len(), 1);
        assert!(store.get_track("missing").unwrap().is_none());
    }
}
