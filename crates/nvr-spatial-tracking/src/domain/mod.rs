//! Domain model for cross-camera spatial tracking.
//!
//! - [`spatial_map`]: flat coordinate spaces (one floor, one yard)
//! - [`placement`]: where and how a camera looks within a map
//! - [`transition`]: learned relationships between camera pairs
//! - [`track`]: global tracks and their per-camera segments
//! - [`handoff`]: open questions about where an exiting object went
//! - [`detection`]: inbound events from the detection subsystem
//! - [`reports`]: derived, read-only views (analytics, paths, diagnostics)

pub mod detection;
pub mod handoff;
pub mod placement;
pub mod reports;
pub mod spatial_map;
pub mod track;
pub mod transition;

pub use detection::{BoundingBox, DetectionEvent, TrackExit};
pub use handoff::PendingHandoff;
pub use placement::CameraPlacement;
pub use reports::{
    Analytics, CalibrationSession, HandoffTestResult, HandoffTestStatus, HourlyActivity,
    MapAnalytics, TrackPath, TransitionStat, Waypoint,
};
pub use spatial_map::{MapMetadata, SpatialMap};
pub use track::{BoundingBoxSample, GlobalTrack, TrackSegment, TrackState};
pub use transition::{CameraTransition, EdgeDirection, TransitionType, ZoneDefinition, MAX_TRANSIT_SECS};

/// Generate a fresh opaque identifier.
pub(crate) fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
