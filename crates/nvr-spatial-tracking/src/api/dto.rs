//! Request and response bodies for the REST API.
//!
//! Domain types are serialized directly in responses; the types here cover
//! request bodies that differ from the stored shape and a few envelopes.

use serde::{Deserialize, Serialize};

use crate::domain::{
    CameraPlacement, CameraTransition, MapMetadata, SpatialMap, TrackState, TransitionType,
    ZoneDefinition,
};
use crate::geometry::{Point, Polygon};

fn default_scale() -> f64 {
    1.0
}

fn default_true() -> bool {
    true
}

// ============================================================================
// Maps
// ============================================================================

/// Body of `POST /api/v1/maps`.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateMapRequest {
    /// Client-chosen id; generated when empty
    #[serde(default)]
    pub id: String,
    /// Display name
    pub name: String,
    /// Width in map units
    pub width: f64,
    /// Height in map units
    pub height: f64,
    /// Map units per meter
    #[serde(default = "default_scale")]
    pub scale: f64,
    /// Location metadata
    #[serde(default)]
    pub metadata: MapMetadata,
}

impl CreateMapRequest {
    /// Build the map to insert
    pub fn into_map(self) -> SpatialMap {
        let mut map = SpatialMap::new(self.name, self.width, self.height, self.scale).with_metadata(self.metadata);
        map.id = self.id;
        map
    }
}

/// Body of `PUT /api/v1/maps/:map_id`. Absent fields are kept.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateMapRequest {
    /// Display name
    pub name: Option<String>,
    /// Width in map units
    pub width: Option<f64>,
    /// Height in map units
    pub height: Option<f64>,
    /// Map units per meter
    pub scale: Option<f64>,
    /// Location metadata
    pub metadata: Option<MapMetadata>,
}

impl UpdateMapRequest {
    /// Apply onto the stored map
    pub fn apply(self, map: &mut SpatialMap) {
        if let Some(name) = self.name {
            map.name = name;
        }
        if let Some(width) = self.width {
            map.width = width;
        }
        if let Some(height) = self.height {
            map.height = height;
        }
        if let Some(scale) = self.scale {
            map.scale = scale;
        }
        if let Some(metadata) = self.metadata {
            map.metadata = metadata;
        }
    }
}

// ============================================================================
// Camera placements
// ============================================================================

/// Body of `POST /api/v1/maps/:map_id/cameras`.
#[derive(Debug, Clone, Deserialize)]
pub struct CreatePlacementRequest {
    /// Camera being placed
    pub camera_id: String,
    /// Position on the map
    pub position: Point,
    /// Heading in degrees
    #[serde(default)]
    pub rotation: f64,
    /// Horizontal field of view in degrees
    pub fov_angle: f64,
    /// View depth in map units
    pub fov_depth: f64,
    /// Manual coverage override
    #[serde(default)]
    pub coverage_polygon: Polygon,
    /// Mount height in meters
    #[serde(default)]
    pub mount_height: f64,
    /// Tilt in degrees
    #[serde(default)]
    pub tilt_angle: f64,
}

impl CreatePlacementRequest {
    /// Build the placement to insert on `map_id`
    pub fn into_placement(self, map_id: &str) -> CameraPlacement {
        let mut placement = CameraPlacement::new(
            self.camera_id,
            map_id,
            self.position,
            self.rotation,
            self.fov_angle,
            self.fov_depth,
        );
        placement.coverage_polygon = self.coverage_polygon;
        placement.mount_height = self.mount_height;
        placement.tilt_angle = self.tilt_angle;
        placement
    }
}

/// Body of placement updates. Absent fields are kept.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdatePlacementRequest {
    /// Camera being placed
    pub camera_id: Option<String>,
    /// Position on the map
    pub position: Option<Point>,
    /// Heading in degrees
    pub rotation: Option<f64>,
    /// Horizontal field of view in degrees
    pub fov_angle: Option<f64>,
    /// View depth in map units
    pub fov_depth: Option<f64>,
    /// Manual coverage override; an empty array clears it
    pub coverage_polygon: Option<Polygon>,
    /// Mount height in meters
    pub mount_height: Option<f64>,
    /// Tilt in degrees
    pub tilt_angle: Option<f64>,
}

impl UpdatePlacementRequest {
    /// Apply onto the stored placement
    pub fn apply(self, placement: &mut CameraPlacement) {
        if let Some(camera_id) = self.camera_id {
            placement.camera_id = camera_id;
        }
        if let Some(position) = self.position {
            placement.position = position;
        }
        if let Some(rotation) = self.rotation {
            placement.rotation = rotation;
        }
        if let Some(fov_angle) = self.fov_angle {
            placement.fov_angle = fov_angle;
        }
        if let Some(fov_depth) = self.fov_depth {
            placement.fov_depth = fov_depth;
        }
        if let Some(polygon) = self.coverage_polygon {
            placement.coverage_polygon = polygon;
        }
        if let Some(mount_height) = self.mount_height {
            placement.mount_height = mount_height;
        }
        if let Some(tilt_angle) = self.tilt_angle {
            placement.tilt_angle = tilt_angle;
        }
    }
}

/// Reject geometry no wedge can be built from.
pub(crate) fn validate_placement(placement: &CameraPlacement) -> Result<(), String> {
    if placement.camera_id.is_empty() {
        return Err("camera_id is required".to_string());
    }
    if !(placement.fov_angle > 0.0 && placement.fov_angle <= 360.0) {
        return Err(format!("fov_angle must be in (0, 360], got {}", placement.fov_angle));
    }
    if placement.fov_depth <= 0.0 {
        return Err(format!("fov_depth must be positive, got {}", placement.fov_depth));
    }
    Ok(())
}

// ============================================================================
// Transitions
// ============================================================================

/// Body of `POST /api/v1/transitions`.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateTransitionRequest {
    /// Source camera
    pub from_camera_id: String,
    /// Destination camera
    pub to_camera_id: String,
    /// Relationship between the cameras
    #[serde(rename = "type")]
    pub transition_type: TransitionType,
    /// Traversable both ways
    #[serde(default = "default_true")]
    pub bidirectional: bool,
    /// Shared region for overlap transitions
    #[serde(default)]
    pub overlap_zone: Polygon,
    /// Expected transit seconds
    #[serde(default)]
    pub expected_transit_time: f64,
    /// Allowed deviation in seconds
    #[serde(default)]
    pub transit_time_variance: f64,
    /// Exit region on the source camera
    #[serde(default)]
    pub exit_zone: Option<ZoneDefinition>,
    /// Entry region on the destination camera
    #[serde(default)]
    pub entry_zone: Option<ZoneDefinition>,
}

impl CreateTransitionRequest {
    /// Build the transition to insert
    pub fn into_transition(self) -> CameraTransition {
        let mut transition = CameraTransition::new(self.from_camera_id, self.to_camera_id, self.transition_type);
        transition.bidirectional = self.bidirectional;
        transition.overlap_zone = self.overlap_zone;
        transition.expected_transit_time = self.expected_transit_time;
        transition.transit_time_variance = self.transit_time_variance;
        transition.exit_zone = self.exit_zone;
        transition.entry_zone = self.entry_zone;
        transition
    }
}

/// Body of `PUT /api/v1/transitions/:id`. Absent fields are kept.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateTransitionRequest {
    /// Source camera
    pub from_camera_id: Option<String>,
    /// Destination camera
    pub to_camera_id: Option<String>,
    /// Relationship between the cameras
    #[serde(rename = "type")]
    pub transition_type: Option<TransitionType>,
    /// Traversable both ways
    pub bidirectional: Option<bool>,
    /// Shared region for overlap transitions
    pub overlap_zone: Option<Polygon>,
    /// Expected transit seconds
    pub expected_transit_time: Option<f64>,
    /// Allowed deviation in seconds
    pub transit_time_variance: Option<f64>,
    /// Exit region on the source camera
    pub exit_zone: Option<ZoneDefinition>,
    /// Entry region on the destination camera
    pub entry_zone: Option<ZoneDefinition>,
}

impl UpdateTransitionRequest {
    /// Apply onto the stored transition
    pub fn apply(self, transition: &mut CameraTransition) {
        if let Some(from) = self.from_camera_id {
            transition.from_camera_id = from;
        }
        if let Some(to) = self.to_camera_id {
            transition.to_camera_id = to;
        }
        if let Some(kind) = self.transition_type {
            transition.transition_type = kind;
        }
        if let Some(bidirectional) = self.bidirectional {
            transition.bidirectional = bidirectional;
        }
        if let Some(zone) = self.overlap_zone {
            transition.overlap_zone = zone;
        }
        if let Some(expected) = self.expected_transit_time {
            transition.expected_transit_time = expected;
        }
        if let Some(variance) = self.transit_time_variance {
            transition.transit_time_variance = variance;
        }
        if self.exit_zone.is_some() {
            transition.exit_zone = self.exit_zone;
        }
        if self.entry_zone.is_some() {
            transition.entry_zone = self.entry_zone;
        }
    }
}

/// Reject self-loops and timings the engine cannot schedule.
pub(crate) fn validate_transition(transition: &CameraTransition) -> Result<(), String> {
    if transition.from_camera_id.is_empty() || transition.to_camera_id.is_empty() {
        return Err("from_camera_id and to_camera_id are required".to_string());
    }
    if transition.from_camera_id == transition.to_camera_id {
        return Err("from_camera_id and to_camera_id must differ".to_string());
    }
    transition.validate_timing()
}

/// Body of `POST /api/v1/transitions/auto-detect`.
#[derive(Debug, Clone, Deserialize)]
pub struct AutoDetectRequest {
    /// Map whose placements are classified
    pub map_id: String,
}

// ============================================================================
// Tools
// ============================================================================

/// Body of `POST /api/v1/test-handoff`.
#[derive(Debug, Clone, Deserialize)]
pub struct TestHandoffRequest {
    /// Camera the object leaves
    pub from_camera_id: String,
    /// Camera the object enters
    pub to_camera_id: String,
}

/// Response of the detection ingestion endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestResponse {
    /// Whether the event was attributed to a track
    pub accepted: bool,
    /// Global track the event was attributed to
    #[serde(skip_serializing_if = "Option::is_none")]
    pub global_track_id: Option<String>,
    /// Track state after an exit
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<TrackState>,
}

/// Response of `GET /health`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// `healthy` or `unhealthy`
    pub status: String,
    /// Tracks active or in transit
    pub active_tracks: usize,
    /// Open pending handoffs
    pub pending_handoffs: usize,
    /// Engine writes abandoned after retries
    pub dropped_writes: u64,
    /// Crate version
    pub version: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_map_defaults() {
        let req: CreateMapRequest = serde_json::from_str(r#"{"name":"F1","width":10,"height":5}"#).unwrap();
        let map = req.into_map();
        assert!(map.id.is_empty());
        assert_eq!(map.scale, 1.0);
    }

    #[test]
    fn test_partial_placement_update() {
        let mut placement = CameraPlacement::new("cam-1", "m1", Point::new(0.0, 0.0), 0.0, 60.0, 30.0);
        let req: UpdatePlacementRequest = serde_json::from_str(r#"{"rotation":90}"#).unwrap();
        req.apply(&mut placement);
        assert_eq!(placement.rotation, 90.0);
        assert_eq!(placement.fov_depth, 30.0);
    }

    #[test]
    fn test_placement_validation() {
        let mut placement = CameraPlacement::new("cam-1", "m1", Point::new(0.0, 0.0), 0.0, 60.0, 30.0);
        assert!(validate_placement(&placement).is_ok());
        placement.fov_depth = 0.0;
        assert!(validate_placement(&placement).is_err());
        placement.camera_id.clear();
        assert_eq!(validate_placement(&placement).unwrap_err(), "camera_id is required");
    }

    #[test]
    fn test_transition_request_uses_type_key() {
        let req: CreateTransitionRequest =
            serde_json::from_str(r#"{"from_camera_id":"a","to_camera_id":"b","type":"gap"}"#).unwrap();
        let t = req.into_transition();
        assert_eq!(t.transition_type, TransitionType::Gap);
        assert!(t.bidirectional);
    }

    #[test]
    fn test_transition_validation() {
        let req: CreateTransitionRequest = serde_json::from_str(
            r#"{"from_camera_id":"a","to_camera_id":"b","type":"gap","expected_transit_time":-10}"#,
        )
        .unwrap();
        let mut t = req.into_transition();
        assert!(validate_transition(&t).unwrap_err().contains("expected_transit_time"));

        let update: UpdateTransitionRequest =
            serde_json::from_str(r#"{"expected_transit_time":12,"transit_time_variance":1e13}"#).unwrap();
        update.apply(&mut t);
        assert!(validate_transition(&t).unwrap_err().contains("transit_time_variance"));

        t.transit_time_variance = 3.0;
        assert!(validate_transition(&t).is_ok());

        t.to_camera_id = "a".to_string();
        assert_eq!(validate_transition(&t).unwrap_err(), "from_camera_id and to_camera_id must differ");
    }
}
