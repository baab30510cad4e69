//! Camera transitions and their learned timing statistics.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::geometry::Polygon;

/// How two cameras relate spatially.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransitionType {
    /// Fields of view overlap; the object is visible in both at once
    Overlap,
    /// Fields of view nearly touch; short blind hop
    Adjacent,
    /// Blind stretch between the cameras
    Gap,
}

impl TransitionType {
    /// Wire and storage representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Overlap => "overlap",
            Self::Adjacent => "adjacent",
            Self::Gap => "gap",
        }
    }

    /// Whether handoffs over this transition require the same object type.
    ///
    /// Long blind stretches make type re-identification unreliable, so gaps
    /// skip the check.
    pub fn requires_type_match(&self) -> bool {
        matches!(self, Self::Overlap | Self::Adjacent)
    }
}

impl fmt::Display for TransitionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransitionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "overlap" => Ok(Self::Overlap),
            "adjacent" => Ok(Self::Adjacent),
            "gap" => Ok(Self::Gap),
            other => Err(format!("unknown transition type '{other}'")),
        }
    }
}

/// Edge of a camera frame an object left through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EdgeDirection {
    /// Top edge
    Top,
    /// Bottom edge
    Bottom,
    /// Left edge
    Left,
    /// Right edge
    Right,
}

impl EdgeDirection {
    /// Wire and storage representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Top => "top",
            Self::Bottom => "bottom",
            Self::Left => "left",
            Self::Right => "right",
        }
    }
}

impl FromStr for EdgeDirection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "top" => Ok(Self::Top),
            "bottom" => Ok(Self::Bottom),
            "left" => Ok(Self::Left),
            "right" => Ok(Self::Right),
            other => Err(format!("unknown edge direction '{other}'")),
        }
    }
}

/// A stretch of a frame edge, as fractions `0.0..=1.0` along it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ZoneDefinition {
    /// Frame edge
    pub edge: EdgeDirection,
    /// Start along the edge
    pub start: f64,
    /// End along the edge
    pub end: f64,
}

/// A directed, optionally bidirectional, relationship between two cameras.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraTransition {
    /// Unique identifier
    pub id: String,
    /// Camera the object leaves
    pub from_camera_id: String,
    /// Camera the object arrives at
    pub to_camera_id: String,
    /// Spatial relationship
    #[serde(rename = "type")]
    pub transition_type: TransitionType,
    /// Matched in either direction by lookups
    #[serde(default = "default_bidirectional")]
    pub bidirectional: bool,
    /// Shared coverage, overlap transitions only
    #[serde(default)]
    pub overlap_zone: Polygon,
    /// Configured transit time in seconds
    #[serde(default)]
    pub expected_transit_time: f64,
    /// Configured +/- window in seconds; zero means half the transit time
    #[serde(default)]
    pub transit_time_variance: f64,
    /// Where on the source frame objects leave
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_zone: Option<ZoneDefinition>,
    /// Where on the destination frame objects appear
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entry_zone: Option<ZoneDefinition>,
    /// Learned mean transit time over successful handoffs
    #[serde(default)]
    pub avg_transit_time: f64,
    /// `successful_handoffs / total_handoffs`, zero with no attempts
    #[serde(default)]
    pub success_rate: f64,
    /// Handoff attempts
    #[serde(default)]
    pub total_handoffs: u64,
    /// Handoffs that matched a detection
    #[serde(default)]
    pub successful_handoffs: u64,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Last modification time
    pub updated_at: DateTime<Utc>,
}

/// Upper bound, in seconds, on configured transit times and variances.
pub const MAX_TRANSIT_SECS: f64 = 86_400.0;

fn check_seconds(field: &str, value: f64) -> Result<(), String> {
    if !value.is_finite() || value < 0.0 || value > MAX_TRANSIT_SECS {
        return Err(format!("{field} must be between 0 and {MAX_TRANSIT_SECS} seconds, got {value}"));
    }
    Ok(())
}

fn default_bidirectional() -> bool {
    true
}

impl CameraTransition {
    /// Create a transition with a fresh id and no learned statistics
    pub fn new(
        from_camera_id: impl Into<String>,
        to_camera_id: impl Into<String>,
        transition_type: TransitionType,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: super::new_id(),
            from_camera_id: from_camera_id.into(),
            to_camera_id: to_camera_id.into(),
            transition_type,
            bidirectional: true,
            overlap_zone: Polygon::empty(),
            expected_transit_time: 0.0,
            transit_time_variance: 0.0,
            exit_zone: None,
            entry_zone: None,
            avg_transit_time: 0.0,
            success_rate: 0.0,
            total_handoffs: 0,
            successful_handoffs: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Camera on the other end when leaving `camera_id`, if traversable that way.
    pub fn destination_from(&self, camera_id: &str) -> Option<&str> {
        if self.from_camera_id == camera_id {
            Some(&self.to_camera_id)
        } else if self.bidirectional && self.to_camera_id == camera_id {
            Some(&self.from_camera_id)
        } else {
            None
        }
    }

    /// Whether this transition links `a` to `b`, honouring bidirectionality.
    pub fn connects(&self, a: &str, b: &str) -> bool {
        (self.from_camera_id == a && self.to_camera_id == b)
            || (self.bidirectional && self.from_camera_id == b && self.to_camera_id == a)
    }

    /// Transit estimate in seconds: learned average if any, else configured.
    pub fn transit_time(&self) -> f64 {
        if self.avg_transit_time > 0.0 {
            self.avg_transit_time
        } else {
            self.expected_transit_time
        }
    }

    /// Reject configured timings that are negative, non-finite or beyond a day.
    pub fn validate_timing(&self) -> Result<(), String> {
        check_seconds("expected_transit_time", self.expected_transit_time)?;
        check_seconds("transit_time_variance", self.transit_time_variance)
    }

    /// Time window in seconds after exit during which a handoff may match.
    pub fn handoff_window(&self, default_variance_ratio: f64) -> f64 {
        let transit = self.transit_time();
        let variance = if self.transit_time_variance > 0.0 {
            self.transit_time_variance
        } else {
            transit * default_variance_ratio
        };
        transit + variance
    }

    /// Fold one handoff attempt into the learned statistics.
    pub fn record_handoff(&mut self, transit_time: f64, success: bool) {
        self.total_handoffs += 1;
        if success {
            self.successful_handoffs += 1;
            let n = self.successful_handoffs as f64;
            self.avg_transit_time = if self.avg_transit_time == 0.0 {
                transit_time
            } else {
                (self.avg_transit_time * (n - 1.0) + transit_time) / n
            };
        }
        self.success_rate = self.successful_handoffs as f64 / self.total_handoffs as f64;
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_handoff_running_mean() {
        let mut t = CameraTransition::new("a", "b", TransitionType::Gap);
        t.record_handoff(12.0, true);
        assert_eq!(t.avg_transit_time, 12.0);
        assert_eq!(t.success_rate, 1.0);

        t.record_handoff(8.0, true);
        assert_eq!(t.avg_transit_time, 10.0);
        assert_eq!(t.successful_handoffs, 2);
    }

    #[test]
    fn test_record_failure_keeps_average() {
        let mut t = CameraTransition::new("a", "b", TransitionType::Gap);
        t.record_handoff(6.0, true);
        t.record_handoff(0.0, false);
        assert_eq!(t.avg_transit_time, 6.0);
        assert_eq!(t.total_handoffs, 2);
        assert_eq!(t.success_rate, 0.5);
        assert!(t.successful_handoffs <= t.total_handoffs);
    }

    #[test]
    fn test_destination_respects_direction() {
        let mut t = CameraTransition::new("a", "b", TransitionType::Adjacent);
        assert_eq!(t.destination_from("a"), Some("b"));
        assert_eq!(t.destination_from("b"), Some("a"));
        assert_eq!(t.destination_from("c"), None);

        t.bidirectional = false;
        assert_eq!(t.destination_from("b"), None);
        assert!(t.connects("a", "b"));
        assert!(!t.connects("b", "a"));
    }

    #[test]
    fn test_handoff_window() {
        let mut t = CameraTransition::new("a", "b", TransitionType::Gap);
        t.expected_transit_time = 10.0;
        assert_eq!(t.handoff_window(0.5), 15.0);

        t.transit_time_variance = 2.0;
        t.avg_transit_time = 20.0;
        assert_eq!(t.handoff_window(0.5), 22.0);
    }

    #[test]
    fn test_timing_validation() {
        let mut t = CameraTransition::new("a", "b", TransitionType::Gap);
        t.expected_transit_time = 30.0;
        assert!(t.validate_timing().is_ok());

        t.expected_transit_time = -10.0;
        assert!(t.validate_timing().unwrap_err().contains("expected_transit_time"));

        t.expected_transit_time = 1e13;
        assert!(t.validate_timing().is_err());

        t.expected_transit_time = 30.0;
        t.transit_time_variance = f64::NAN;
        assert!(t.validate_timing().unwrap_err().contains("transit_time_variance"));
    }

    #[test]
    fn test_type_serialization() {
        let t = CameraTransition::new("a", "b", TransitionType::Overlap);
        let json = serde_json::to_value(&t).unwrap();
        assert_eq!(json["type"], "overlap");
        assert_eq!("gap".parse::<TransitionType>(), Ok(TransitionType::Gap));
        assert!("teleport".parse::<TransitionType>().is_err());
    }
}
