//! Read-side views computed on demand. None of these are persisted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::transition::TransitionType;
use crate::geometry::Point;

/// Instructions handed to operators starting a calibration walk.
pub const CALIBRATION_INSTRUCTIONS: &str = "Walk through the camera's field of view from edge to edge. \
The system will analyze your movement to determine exit zones and transitions.";

/// System-wide tracking analytics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Analytics {
    /// All tracks ever stored
    pub total_tracks: u64,
    /// Tracks currently active
    pub active_tracks: u64,
    /// Handoff attempts across all transitions
    pub total_handoffs: u64,
    /// Successful handoffs across all transitions
    pub successful_handoffs: u64,
    /// `successful / total`, zero with no attempts
    pub overall_success_rate: f64,
    /// Transitions with at least one attempt
    pub transition_stats: Vec<TransitionStat>,
    /// Tracks first seen per hour of day over the last 24 hours
    pub hourly_activity: Vec<HourlyActivity>,
}

/// Per-transition statistics row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionStat {
    /// Transition id
    pub transition_id: String,
    /// Source camera
    pub from_camera_id: String,
    /// Destination camera
    pub to_camera_id: String,
    /// Transition type
    #[serde(rename = "type")]
    pub transition_type: TransitionType,
    /// Attempts
    pub total_handoffs: u64,
    /// Success ratio
    pub success_rate: f64,
    /// Learned mean transit time
    pub avg_transit_time: f64,
}

/// Histogram bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HourlyActivity {
    /// Hour of day, UTC
    pub hour: u32,
    /// Tracks first seen within the hour
    pub track_count: u64,
}

/// Analytics scoped to one map.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MapAnalytics {
    /// Active tracks currently on one of the map's cameras
    pub active_tracks: u64,
    /// Tracks whose current camera is on the map
    pub total_tracks: u64,
    /// Successful handoffs over the map's transitions
    pub successful_handoffs: u64,
    /// Failed handoffs over the map's transitions
    pub failed_handoffs: u64,
    /// Attempts over the map's transitions
    pub total_handoffs: u64,
    /// Mean learned transit time over transitions with a success
    pub average_transit_time: f64,
    /// Cameras on the map with no transition
    pub coverage_gaps: Vec<String>,
}

/// A track projected onto a spatial map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackPath {
    /// Track id
    pub track_id: String,
    /// Map of the first placed segment, empty if none
    pub map_id: String,
    /// Ordered waypoints
    pub waypoints: Vec<Waypoint>,
}

/// One point of a [`TrackPath`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Waypoint {
    /// When the object was at the point
    pub timestamp: DateTime<Utc>,
    /// Camera that observed it
    pub camera_id: String,
    /// Map position
    pub position: Point,
    /// 1.0 for camera positions, lower for reported exit positions
    pub confidence: f64,
}

/// A guided calibration walk. No geometry is fitted automatically.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationSession {
    /// Session id
    pub id: String,
    /// Camera being calibrated
    pub camera_id: String,
    /// Start time
    pub started_at: DateTime<Utc>,
    /// Always "pending" on creation
    pub status: String,
    /// Operator instructions
    pub instructions: String,
}

impl CalibrationSession {
    /// Start a session for a camera
    pub fn start(camera_id: impl Into<String>) -> Self {
        Self {
            id: super::new_id(),
            camera_id: camera_id.into(),
            started_at: Utc::now(),
            status: "pending".to_string(),
            instructions: CALIBRATION_INSTRUCTIONS.to_string(),
        }
    }
}

/// Outcome class of a handoff configuration check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HandoffTestStatus {
    /// Configured and geometrically consistent
    Ok,
    /// Configured but suspicious
    Warning,
    /// Not configured
    Error,
}

/// Result of checking a camera pair's transition configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HandoffTestResult {
    /// Source camera
    pub from_camera_id: String,
    /// Destination camera
    pub to_camera_id: String,
    /// Configured type, if a transition exists
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transition_type: Option<TransitionType>,
    /// Configured or learned transit time
    pub expected_time_seconds: f64,
    /// Outcome class
    pub status: HandoffTestStatus,
    /// Human-readable explanation
    pub message: String,
}
