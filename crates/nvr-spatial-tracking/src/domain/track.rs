//! Global tracks and their per-camera segments.
//!
//! Lifecycle of a [`GlobalTrack`]:
//!
//! ```text
//! active ──exit──▶ transit ──match──▶ active
//!   │                 │
//!   └─exit, no route──┴─deadline──▶ lost ──TTL──▶ completed
//! ```
//!
//! `pending` is reserved for multi-candidate matching and accepted on the
//! wire, but the engine never enters it. Nothing leaves `completed`.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::detection::{BoundingBox, DetectionEvent};
use super::handoff::PendingHandoff;
use super::transition::EdgeDirection;
use crate::geometry::Point;

/// Current lifecycle state of a global track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackState {
    /// Currently localized in a camera.
    Active,
    /// Exited a camera; a handoff is pending.
    Transit,
    /// Reserved for multi-candidate matching.
    Pending,
    /// Handoff window expired without a match; retained until TTL.
    Lost,
    /// Terminal. Retained for history only.
    Completed,
}

impl TrackState {
    /// Wire and storage representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Transit => "transit",
            Self::Pending => "pending",
            Self::Lost => "lost",
            Self::Completed => "completed",
        }
    }

    /// True for the terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed)
    }

    /// States shown as live on dashboards
    pub fn is_live(&self) -> bool {
        matches!(self, Self::Active | Self::Transit | Self::Pending)
    }
}

impl fmt::Display for TrackState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TrackState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(Self::Active),
            "transit" => Ok(Self::Transit),
            "pending" => Ok(Self::Pending),
            "lost" => Ok(Self::Lost),
            "completed" => Ok(Self::Completed),
            other => Err(format!("unknown track state '{other}'")),
        }
    }
}

/// A sampled bounding box within a segment.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBoxSample {
    /// Sample time
    pub timestamp: DateTime<Utc>,
    /// Left, 0-1
    pub x: f64,
    /// Top, 0-1
    pub y: f64,
    /// Width, 0-1
    pub width: f64,
    /// Height, 0-1
    pub height: f64,
}

impl BoundingBoxSample {
    fn new(timestamp: DateTime<Utc>, bbox: &BoundingBox) -> Self {
        Self {
            timestamp,
            x: bbox.x,
            y: bbox.y,
            width: bbox.width,
            height: bbox.height,
        }
    }
}

/// One camera visit within a global track.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackSegment {
    /// Unique identifier
    pub id: String,
    /// Owning track
    pub global_track_id: String,
    /// Camera visited
    pub camera_id: String,
    /// Camera-local track id during the visit
    pub local_track_id: String,
    /// Entry time
    pub entered_at: DateTime<Utc>,
    /// Exit time, `None` while open
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exited_at: Option<DateTime<Utc>>,
    /// Frame edge crossed on exit
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_direction: Option<EdgeDirection>,
    /// Last position on the map
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_position: Option<Point>,
    /// Recent bounding box samples
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub bounding_boxes: Vec<BoundingBoxSample>,
}

impl TrackSegment {
    /// Open a segment for a camera visit
    pub fn open(global_track_id: &str, camera_id: &str, local_track_id: &str, entered_at: DateTime<Utc>) -> Self {
        Self {
            id: super::new_id(),
            global_track_id: global_track_id.to_string(),
            camera_id: camera_id.to_string(),
            local_track_id: local_track_id.to_string(),
            entered_at,
            exited_at: None,
            exit_direction: None,
            exit_position: None,
            bounding_boxes: Vec::new(),
        }
    }

    /// Whether the segment has not been exited
    pub fn is_open(&self) -> bool {
        self.exited_at.is_none()
    }
}

/// One physical object followed across cameras.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlobalTrack {
    /// Unique identifier
    pub id: String,
    /// First detection time
    pub first_seen: DateTime<Utc>,
    /// Latest detection time
    pub last_seen: DateTime<Utc>,
    /// Camera currently (or last) observing the object
    pub current_camera_id: String,
    /// Local track id on the current camera
    pub current_local_track: String,
    /// Object class
    pub object_type: String,
    /// Appearance embedding, opaque
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub embedding: Vec<u8>,
    /// Confidence of the embedding
    #[serde(default)]
    pub embedding_confidence: f64,
    /// Dominant colors
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dominant_colors: Vec<String>,
    /// Estimated height in meters
    #[serde(default)]
    pub estimated_height: f64,
    /// Lifecycle state
    pub state: TrackState,
    /// Most likely next camera while in transit
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub predicted_next_camera: Option<String>,
    /// Latest expected arrival while in transit
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub predicted_arrival: Option<DateTime<Utc>>,
    /// Time-ordered camera visits
    #[serde(default)]
    pub path: Vec<TrackSegment>,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Last modification time
    pub updated_at: DateTime<Utc>,
}

impl GlobalTrack {
    /// Start a track from its first detection, with one open segment.
    pub fn start(event: &DetectionEvent) -> Self {
        let now = Utc::now();
        let id = super::new_id();
        let segment = TrackSegment::open(&id, &event.camera_id, &event.track_id, event.timestamp);
        Self {
            id,
            first_seen: event.timestamp,
            last_seen: event.timestamp,
            current_camera_id: event.camera_id.clone(),
            current_local_track: event.track_id.clone(),
            object_type: event.object_type.clone(),
            embedding: Vec::new(),
            embedding_confidence: 0.0,
            dominant_colors: Vec::new(),
            estimated_height: 0.0,
            state: TrackState::Active,
            predicted_next_camera: None,
            predicted_arrival: None,
            path: vec![segment],
            created_at: now,
            updated_at: now,
        }
    }

    /// The open segment, if any. At most one exists.
    pub fn open_segment(&self) -> Option<&TrackSegment> {
        self.path.last().filter(|s| s.is_open())
    }

    fn open_segment_mut(&mut self) -> Option<&mut TrackSegment> {
        self.path.last_mut().filter(|s| s.is_open())
    }

    /// Apply a detection on the current camera.
    ///
    /// Appends a bounding box sample to the latest segment, keeping at most
    /// `max_samples`, and forces the state back to active.
    pub fn observe(&mut self, event: &DetectionEvent, max_samples: usize) {
        if self.state.is_terminal() {
            return;
        }
        self.last_seen = event.timestamp;
        self.state = TrackState::Active;
        self.updated_at = Utc::now();

        if let (Some(segment), Some(bbox)) = (self.path.last_mut(), event.bounding_box.as_ref()) {
            segment.bounding_boxes.push(BoundingBoxSample::new(event.timestamp, bbox));
            let excess = segment.bounding_boxes.len().saturating_sub(max_samples);
            if excess > 0 {
                segment.bounding_boxes.drain(..excess);
            }
        }
    }

    /// Close the open segment. Returns the closed segment if one was open.
    pub fn close_segment(
        &mut self,
        exited_at: DateTime<Utc>,
        direction: Option<EdgeDirection>,
        position: Option<Point>,
    ) -> Option<TrackSegment> {
        let segment = self.open_segment_mut()?;
        segment.exited_at = Some(exited_at);
        segment.exit_direction = direction;
        segment.exit_position = position;
        Some(segment.clone())
    }

    /// Move the track into transit towards `next_camera`.
    pub fn begin_transit(&mut self, next_camera: &str, arrival: DateTime<Utc>) {
        if self.state.is_terminal() {
            return;
        }
        self.state = TrackState::Transit;
        self.predicted_next_camera = Some(next_camera.to_string());
        self.predicted_arrival = Some(arrival);
        self.updated_at = Utc::now();
    }

    /// Continue the track onto the camera a matched handoff led to.
    ///
    /// Closes the previous segment with the handoff's exit data, opens a new
    /// segment and returns `(closed, opened)`.
    pub fn continue_from(
        &mut self,
        handoff: &PendingHandoff,
        event: &DetectionEvent,
    ) -> (Option<TrackSegment>, TrackSegment) {
        let closed = self.close_segment(handoff.exited_at, handoff.exit_direction, None);

        let opened = TrackSegment::open(&self.id, &event.camera_id, &event.track_id, event.timestamp);
        self.path.push(opened.clone());

        self.current_camera_id = event.camera_id.clone();
        self.current_local_track = event.track_id.clone();
        self.last_seen = event.timestamp;
        self.state = TrackState::Active;
        self.predicted_next_camera = None;
        self.predicted_arrival = None;
        self.updated_at = Utc::now();

        (closed, opened)
    }

    /// Handoff window expired or no route exists.
    pub fn mark_lost(&mut self) {
        if self.state.is_terminal() {
            return;
        }
        self.state = TrackState::Lost;
        self.updated_at = Utc::now();
    }

    /// Promote a lost track to completed once `ttl` has elapsed since last seen.
    /// Returns true if the track completed.
    pub fn complete_if_stale(&mut self, now: DateTime<Utc>, ttl: chrono::Duration) -> bool {
        if self.state != TrackState::Lost || now - self.last_seen <= ttl {
            return false;
        }
        self.state = TrackState::Completed;
        self.updated_at = Utc::now();
        true
    }
}
