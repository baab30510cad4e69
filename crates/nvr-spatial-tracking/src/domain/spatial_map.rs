//! Spatial maps: the coordinate spaces cameras are placed on.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Descriptive location of a map.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapMetadata {
    /// Building name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub building: Option<String>,
    /// Floor label
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub floor: Option<String>,
    /// Area within the floor
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub area: Option<String>,
}

/// A flat coordinate space, e.g. one floor of a building.
///
/// Owns zero or more camera placements, which are removed with it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpatialMap {
    /// Unique identifier
    pub id: String,
    /// Display name
    pub name: String,
    /// URL of the background image, if one was uploaded
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    /// Logical width in map units
    pub width: f64,
    /// Logical height in map units
    pub height: f64,
    /// Map units per meter
    pub scale: f64,
    /// Location metadata
    #[serde(default)]
    pub metadata: MapMetadata,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Last modification time
    pub updated_at: DateTime<Utc>,
}

impl SpatialMap {
    /// Create a new map with a fresh id
    pub fn new(name: impl Into<String>, width: f64, height: f64, scale: f64) -> Self {
        let now = Utc::now();
        Self {
            id: super::new_id(),
            name: name.into(),
            image_url: None,
            width,
            height,
            scale,
            metadata: MapMetadata::default(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Set location metadata
    pub fn with_metadata(mut self, metadata: MapMetadata) -> Self {
        self.metadata = metadata;
        self
    }
}
