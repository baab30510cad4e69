//! Pending handoffs: an exited track awaiting reappearance.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::transition::{EdgeDirection, TransitionType};
use crate::geometry::Point;

/// Open question "where did this object go?".
///
/// Created when a track exits a camera with known transitions, deleted on
/// match or once `expected_by` passes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingHandoff {
    /// Unique identifier
    pub id: String,
    /// Track in transit
    pub global_track_id: String,
    /// Camera the track exited
    pub from_camera_id: String,
    /// Candidate destinations
    pub to_camera_ids: Vec<String>,
    /// Type of the transition used for matching rules
    pub transition_type: TransitionType,
    /// Exit time
    pub exited_at: DateTime<Utc>,
    /// Match deadline
    pub expected_by: DateTime<Utc>,
    /// Frame edge crossed on exit
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_direction: Option<EdgeDirection>,
    /// Last position on the map
    #[serde(default)]
    pub exit_position: Point,
    /// Appearance embedding carried from the track
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub embedding: Vec<u8>,
    /// Dominant colors carried from the track
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dominant_colors: Vec<String>,
}

impl PendingHandoff {
    /// Whether `camera_id` is a candidate destination
    pub fn expects_camera(&self, camera_id: &str) -> bool {
        self.to_camera_ids.iter().any(|c| c == camera_id)
    }

    /// Whether the deadline has passed at `now`
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expected_by
    }

    /// Destination whose transition is charged for a failed handoff
    pub fn primary_destination(&self) -> Option<&str> {
        self.to_camera_ids.first().map(String::as_str)
    }
}
