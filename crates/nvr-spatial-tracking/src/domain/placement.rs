//! Camera placements and their field-of-view polygons.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::geometry::{Point, Polygon};

/// Where and how a camera looks within a spatial map.
///
/// Exactly one placement exists per `(camera_id, map_id)` pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraPlacement {
    /// Unique identifier
    pub id: String,
    /// NVR camera identity
    pub camera_id: String,
    /// Owning map
    pub map_id: String,
    /// Camera position in map units
    pub position: Point,
    /// Heading in degrees, 0 pointing along +x
    pub rotation: f64,
    /// Horizontal field of view in degrees
    pub fov_angle: f64,
    /// How far the camera sees, in map units
    pub fov_depth: f64,
    /// Manual coverage override; empty when the wedge is derived
    #[serde(default)]
    pub coverage_polygon: Polygon,
    /// Mount height in meters
    #[serde(default)]
    pub mount_height: f64,
    /// Vertical tilt in degrees
    #[serde(default)]
    pub tilt_angle: f64,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Last modification time
    pub updated_at: DateTime<Utc>,
}

impl CameraPlacement {
    /// Create a placement with a fresh id and a derived coverage wedge
    pub fn new(
        camera_id: impl Into<String>,
        map_id: impl Into<String>,
        position: Point,
        rotation: f64,
        fov_angle: f64,
        fov_depth: f64,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: super::new_id(),
            camera_id: camera_id.into(),
            map_id: map_id.into(),
            position,
            rotation,
            fov_angle,
            fov_depth,
            coverage_polygon: Polygon::empty(),
            mount_height: 0.0,
            tilt_angle: 0.0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Field-of-view polygon used for intersection tests and auto-detection.
    ///
    /// Returns the manual override verbatim when set. Otherwise a 3-point
    /// wedge: apex at `position`, two rays at `rotation ± fov_angle / 2` of
    /// length `fov_depth`.
    pub fn fov_polygon(&self) -> Polygon {
        if !self.coverage_polygon.is_empty() {
            return self.coverage_polygon.clone();
        }

        let half = (self.fov_angle / 2.0).to_radians();
        let heading = self.rotation.to_radians();
        let ray = |angle: f64| {
            Point::new(
                self.position.x + self.fov_depth * angle.cos(),
                self.position.y + self.fov_depth * angle.sin(),
            )
        };

        Polygon::new(vec![self.position, ray(heading - half), ray(heading + half)])
    }
}
