//! Spatial map persistence.

use chrono::Utc;
use rusqlite::{params, OptionalExtension, Row};

use super::{json_col, time_col, to_millis, Result, SpatialStore, StoreError};
use crate::domain::SpatialMap;

const MAP_COLUMNS: &str = "id, name, image_url, width, height, scale, metadata, created_at, updated_at";

fn map_from_row(row: &Row<'_>) -> rusqlite::Result<SpatialMap> {
    Ok(SpatialMap {
        id: row.get(0)?,
        name: row.get(1)?,
        image_url: row.get::<_, Option<String>>(2)?.filter(|u| !u.is_empty()),
        width: row.get(3)?,
        height: row.get(4)?,
        scale: row.get(5)?,
        metadata: json_col(row, 6)?,
        created_at: time_col(row, 7)?,
        updated_at: time_col(row, 8)?,
    })
}

impl SpatialStore {
    /// Insert a map. Assigns an id when empty and stamps both timestamps.
    pub fn create_map(&self, mut map: SpatialMap) -> Result<SpatialMap> {
        if map.id.is_empty() {
            map.id = crate::domain::new_id();
        }
        let now = Utc::now();
        map.created_at = now;
        map.updated_at = now;

        let metadata = serde_json::to_string(&map.metadata)?;
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO spatial_maps (id, name, image_url, width, height, scale, metadata, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                map.id,
                map.name,
                map.image_url,
                map.width,
                map.height,
                map.scale,
                metadata,
                to_millis(map.created_at),
                to_millis(map.updated_at),
            ],
        )
        .map_err(|e| StoreError::from_write(e, || format!("map {} already exists", map.id)))?;

        Ok(map)
    }

    /// Get a map by id
    pub fn get_map(&self, id: &str) -> Result<Option<SpatialMap>> {
        let conn = self.conn.lock();
        let map = conn
            .query_row(
                &format!("SELECT {MAP_COLUMNS} FROM spatial_maps WHERE id = ?1"),
                params![id],
                map_from_row,
            )
            .optional()?;
        Ok(map)
    }

    /// All maps, newest first
    pub fn list_maps(&self) -> Result<Vec<SpatialMap>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT {MAP_COLUMNS} FROM spatial_maps ORDER BY created_at DESC, rowid DESC"
        ))?;
        let maps = stmt
            .query_map([], map_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(maps)
    }

    /// Overwrite a map's mutable fields and bump `updated_at`.
    pub fn update_map(&self, mut map: SpatialMap) -> Result<SpatialMap> {
        map.updated_at = Utc::now();
        let metadata = serde_json::to_string(&map.metadata)?;

        let conn = self.conn.lock();
        let changed = conn.execute(
            "UPDATE spatial_maps
             SET name = ?1, image_url = ?2, width = ?3, height = ?4, scale = ?5, metadata = ?6, updated_at = ?7
             WHERE id = ?8",
            params![
                map.name,
                map.image_url,
                map.width,
                map.height,
                map.scale,
                metadata,
                to_millis(map.updated_at),
                map.id,
            ],
        )?;
        if changed == 0 {
            return Err(StoreError::not_found("map", map.id));
        }
        Ok(map)
    }

    /// Delete a map and, by cascade, its placements
    pub fn delete_map(&self, id: &str) -> Result<()> {
        let conn = self.conn.lock();
        let changed = conn.execute("DELETE FROM spatial_maps WHERE id = ?1", params![id])?;
        if changed == 0 {
            return Err(StoreError::not_found("map", id));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::MapMetadata;

    #[test]
    fn test_map_crud() {
        let store = SpatialStore::in_memory().unwrap();
        let mut map = SpatialMap::new("Ground floor", 800.0, 600.0, 10.0);
        map.id = String::new();
        map.metadata = MapMetadata {
            building: Some("HQ".into()),
            floor: Some("0".into()),
            area: None,
        };

        let created = store.create_map(map).unwrap();
        assert!(!created.id.is_empty());

        let fetched = store.get_map(&created.id).unwrap().unwrap();
        assert_eq!(fetched.name, "Ground floor");
        assert_eq!(fetched.metadata.building.as_deref(), Some("HQ"));

        let mut renamed = fetched.clone();
        renamed.name = "Lobby".into();
        store.update_map(renamed).unwrap();
        assert_eq!(store.get_map(&created.id).unwrap().unwrap().name, "Lobby");

        store.delete_map(&created.id).unwrap();
        assert!(store.get_map(&created.id).unwrap().is_none());
        assert!(matches!(store.delete_map(&created.id), Err(StoreError::NotFound { .. })));
    }

    #[test]
    fn test_update_missing_map() {
        let store = SpatialStore::in_memory().unwrap();
        let map = SpatialMap::new("ghost", 1.0, 1.0, 1.0);
        assert!(matches!(store.update_map(map), Err(StoreError::NotFound { .. })));
        assert!(store.list_maps().unwrap().is_empty());
    }
}
