//! Inbound events from the per-camera detection subsystem.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::transition::EdgeDirection;
use crate::geometry::Point;

/// Normalized bounding box within a camera frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    /// Left, 0-1
    pub x: f64,
    /// Top, 0-1
    pub y: f64,
    /// Width, 0-1
    pub width: f64,
    /// Height, 0-1
    pub height: f64,
}

/// One detection of a camera-local track.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionEvent {
    /// Camera that produced the detection
    #[serde(default)]
    pub camera_id: String,
    /// Camera-local track id
    #[serde(default)]
    pub track_id: String,
    /// Object class, e.g. "person"
    #[serde(default)]
    pub object_type: String,
    /// Capture time
    pub timestamp: DateTime<Utc>,
    /// Bounding box, if the detector reports one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bounding_box: Option<BoundingBox>,
}

impl DetectionEvent {
    /// Create a detection without a bounding box
    pub fn new(
        camera_id: impl Into<String>,
        track_id: impl Into<String>,
        object_type: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            camera_id: camera_id.into(),
            track_id: track_id.into(),
            object_type: object_type.into(),
            timestamp,
            bounding_box: None,
        }
    }

    /// Attach a bounding box
    pub fn with_bounding_box(mut self, bbox: BoundingBox) -> Self {
        self.bounding_box = Some(bbox);
        self
    }

    /// Events missing either identity cannot be tracked.
    pub fn is_well_formed(&self) -> bool {
        !self.camera_id.is_empty() && !self.track_id.is_empty()
    }
}

/// A camera-local track leaving the frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackExit {
    /// Camera the object left
    #[serde(default)]
    pub camera_id: String,
    /// Camera-local track id
    #[serde(default)]
    pub track_id: String,
    /// Frame edge crossed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_direction: Option<EdgeDirection>,
    /// Last position on the map
    #[serde(default)]
    pub exit_position: Point,
}

impl TrackExit {
    /// Create an exit event
    pub fn new(
        camera_id: impl Into<String>,
        track_id: impl Into<String>,
        exit_direction: Option<EdgeDirection>,
        exit_position: Point,
    ) -> Self {
        Self {
            camera_id: camera_id.into(),
            track_id: track_id.into(),
            exit_direction,
            exit_position,
        }
    }

    /// Events missing either identity are dropped.
    pub fn is_well_formed(&self) -> bool {
        !self.camera_id.is_empty() && !self.track_id.is_empty()
    }
}
