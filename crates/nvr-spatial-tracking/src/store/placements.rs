//! Camera placement persistence.

use chrono::Utc;
use rusqlite::{params, OptionalExtension, Row};

use super::{json_col, time_col, to_millis, Result, SpatialStore, StoreError};
use crate::domain::CameraPlacement;
use crate::geometry::Point;

const PLACEMENT_COLUMNS: &str = "id, camera_id, map_id, position_x, position_y, rotation, fov_angle, fov_depth, \
     coverage_polygon, mount_height, tilt_angle, created_at, updated_at";

fn placement_from_row(row: &Row<'_>) -> rusqlite::Result<CameraPlacement> {
    Ok(CameraPlacement {
        id: row.get(0)?,
        camera_id: row.get(1)?,
        map_id: row.get(2)?,
        position: Point::new(row.get(3)?, row.get(4)?),
        rotation: row.get(5)?,
        fov_angle: row.get(6)?,
        fov_depth: row.get(7)?,
        coverage_polygon: json_col(row, 8)?,
        mount_height: row.get(9)?,
        tilt_angle: row.get(10)?,
        created_at: time_col(row, 11)?,
        updated_at: time_col(row, 12)?,
    })
}

impl SpatialStore {
    /// Insert a placement on an existing map.
    ///
    /// A second placement of the same camera on the same map is a conflict.
    pub fn create_placement(&self, mut placement: CameraPlacement) -> Result<CameraPlacement> {
        if placement.id.is_empty() {
            placement.id = crate::domain::new_id();
        }
        let now = Utc::now();
        placement.created_at = now;
        placement.updated_at = now;
        let coverage = serde_json::to_string(&placement.coverage_polygon)?;

        let conn = self.conn.lock();
        let map_exists: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM spatial_maps WHERE id = ?1)",
            params![placement.map_id],
            |row| row.get(0),
        )?;
        if !map_exists {
            return Err(StoreError::not_found("map", placement.map_id));
        }

        conn.execute(
            &format!("INSERT INTO camera_placements ({PLACEMENT_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)"),
            params![
                placement.id,
                placement.camera_id,
                placement.map_id,
                placement.position.x,
                placement.position.y,
                placement.rotation,
                placement.fov_angle,
                placement.fov_depth,
                coverage,
                placement.mount_height,
                placement.tilt_angle,
                to_millis(placement.created_at),
                to_millis(placement.updated_at),
            ],
        )
        .map_err(|e| {
            StoreError::from_write(e, || {
                format!(
                    "camera {} is already placed on map {}",
                    placement.camera_id, placement.map_id
                )
            })
        })?;

        Ok(placement)
    }

    /// Get a placement by id
    pub fn get_placement(&self, id: &str) -> Result<Option<CameraPlacement>> {
        let conn = self.conn.lock();
        let placement = conn
            .query_row(
                &format!("SELECT {PLACEMENT_COLUMNS} FROM camera_placements WHERE id = ?1"),
                params![id],
                placement_from_row,
            )
            .optional()?;
        Ok(placement)
    }

    /// Earliest placement of a camera across all maps
    pub fn get_placement_by_camera(&self, camera_id: &str) -> Result<Option<CameraPlacement>> {
        let conn = self.conn.lock();
        let placement = conn
            .query_row(
                &format!(
                    "SELECT {PLACEMENT_COLUMNS} FROM camera_placements WHERE camera_id = ?1 \
                     ORDER BY created_at, rowid LIMIT 1"
                ),
                params![camera_id],
                placement_from_row,
            )
            .optional()?;
        Ok(placement)
    }

    /// Placements on a map, in creation order
    pub fn list_placements_by_map(&self, map_id: &str) -> Result<Vec<CameraPlacement>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT {PLACEMENT_COLUMNS} FROM camera_placements WHERE map_id = ?1 ORDER BY created_at, rowid"
        ))?;
        let placements = stmt
            .query_map(params![map_id], placement_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(placements)
    }

    /// Overwrite a placement's geometry and bump `updated_at`.
    pub fn update_placement(&self, mut placement: CameraPlacement) -> Result<CameraPlacement> {
        placement.updated_at = Utc::now();
        let coverage = serde_json::to_string(&placement.coverage_polygon)?;

        let conn = self.conn.lock();
        let changed = conn
            .execute(
                "UPDATE camera_placements
                 SET camera_id = ?1, position_x = ?2, position_y = ?3, rotation = ?4, fov_angle = ?5,
                     fov_depth = ?6, coverage_polygon = ?7, mount_height = ?8, tilt_angle = ?9, updated_at = ?10
                 WHERE id = ?11",
                params![
                    placement.camera_id,
                    placement.position.x,
                    placement.position.y,
                    placement.rotation,
                    placement.fov_angle,
                    placement.fov_depth,
                    coverage,
                    placement.mount_height,
                    placement.tilt_angle,
                    to_millis(placement.updated_at),
                    placement.id,
                ],
            )
            .map_err(|e| {
                StoreError::from_write(e, || {
                    format!("camera {} is already placed on this map", placement.camera_id)
                })
            })?;
        if changed == 0 {
            return Err(StoreError::not_found("placement", placement.id));
        }

        conn.query_row(
            &format!("SELECT {PLACEMENT_COLUMNS} FROM camera_placements WHERE id = ?1"),
            params![placement.id],
            placement_from_row,
        )
        .map_err(StoreError::from)
    }

    /// Delete a placement
    pub fn delete_placement(&self, id: &str) -> Result<()> {
        let conn = self.conn.lock();
        let changed = conn.execute("DELETE FROM camera_placements WHERE id = ?1", params![id])?;
        if changed == 0 {
            return Err(StoreError::not_found("placement", id));
        }
        Ok(())
    }
}
