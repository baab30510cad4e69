//! Map background image files.

use std::path::{Path, PathBuf};

use chrono::Utc;

use super::{Result, SpatialStore, StoreError};
use crate::domain::SpatialMap;

/// URL prefix under which map images are served
pub const MAP_IMAGE_ROUTE: &str = "/api/v1/map-images";

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "webp", "svg"];

fn image_extension(filename: &str) -> Result<String> {
    let ext = Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
        Ok(ext)
    } else {
        Err(StoreError::Validation(format!(
            "unsupported image type '{filename}', expected one of {}",
            IMAGE_EXTENSIONS.join(", ")
        )))
    }
}

impl SpatialStore {
    /// Directory holding map images, if file-backed
    pub fn image_root(&self) -> Option<PathBuf> {
        self.data_dir.as_ref().map(|d| d.join("maps"))
    }

    /// Store a background image for a map and point its `image_url` at it.
    ///
    /// The file is written to `<data_dir>/maps/<map_id>/map_<unix_ts>.<ext>`.
    pub fn save_map_image(&self, map_id: &str, filename: &str, bytes: &[u8]) -> Result<SpatialMap> {
        let root = self
            .image_root()
            .ok_or_else(|| StoreError::Validation("image storage is not configured".to_string()))?;
        let ext = image_extension(filename)?;

        let mut map = self
            .get_map(map_id)?
            .ok_or_else(|| StoreError::not_found("map", map_id))?;
        if map.id.contains(['/', '\\']) || map.id.contains("..") {
            return Err(StoreError::Validation(format!("map id '{}' is not path safe", map.id)));
        }

        let dir = root.join(&map.id);
        std::fs::create_dir_all(&dir)?;
        let file_name = format!("map_{}.{ext}", Utc::now().timestamp());
        std::fs::write(dir.join(&file_name), bytes)?;

        map.image_url = Some(format!("{MAP_IMAGE_ROUTE}/{}/{file_name}", map.id));
        let map = self.update_map(map)?;

        tracing::info!(map_id = %map.id, file = %file_name, size = bytes.len(), "Stored map image");
        Ok(map)
    }
}
