//! Pluggable handoff matching strategies.

use chrono::{DateTime, Utc};

use crate::domain::{DetectionEvent, PendingHandoff};

/// Decides whether a detection continues a pending handoff.
///
/// The track manager offers candidates oldest exit first and takes the first
/// one accepted, so implementations only judge a single pair. Appearance
/// re-identification would plug in here via `handoff.embedding`.
pub trait HandoffMatcher: Send + Sync {
    /// Strategy name for logs
    fn name(&self) -> &'static str;

    /// Whether `event` continues `handoff`.
    ///
    /// `original_object_type` is the type of the track in transit, `None`
    /// when that track is no longer held in memory.
    fn matches(
        &self,
        handoff: &PendingHandoff,
        original_object_type: Option<&str>,
        event: &DetectionEvent,
        now: DateTime<Utc>,
    ) -> bool;
}

/// Camera membership, deadline, and same object type over short hops.
///
/// No appearance comparison is performed.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicMatcher;

impl HandoffMatcher for HeuristicMatcher {
    fn name(&self) -> &'static str {
        "heuristic"
    }

    fn matches(
        &self,
        handoff: &PendingHandoff,
        original_object_type: Option<&str>,
        event: &DetectionEvent,
        now: DateTime<Utc>,
    ) -> bool {
        if !handoff.expects_camera(&event.camera_id) || handoff.is_expired(now) {
            return false;
        }
        if handoff.transition_type.requires_type_match() {
            if let Some(original) = original_object_type {
                return original == event.object_type;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::TransitionType;
    use crate::geometry::Point;
    use chrono::Duration;

    fn handoff(transition_type: TransitionType, expected_by: DateTime<Utc>) -> PendingHandoff {
        PendingHandoff {
            id: "h1".into(),
            global_track_id: "g1".into(),
            from_camera_id: "cam-1".into(),
            to_camera_ids: vec!["cam-2".into()],
            transition_type,
            exited_at: expected_by - Duration::seconds(30),
            expected_by,
            exit_direction: None,
            exit_position: Point::default(),
            embedding: Vec::new(),
            dominant_colors: Vec::new(),
        }
    }

    #[test]
    fn test_requires_candidate_camera_and_deadline() {
        let now = Utc::now();
        let h = handoff(TransitionType::Gap, now + Duration::seconds(5));
        let m = HeuristicMatcher;

        assert!(m.matches(&h, Some("person"), &DetectionEvent::new("cam-2", "t2", "person", now), now));
        assert!(!m.matches(&h, Some("person"), &DetectionEvent::new("cam-3", "t2", "person", now), now));
        let late = now + Duration::seconds(6);
        assert!(!m.matches(&h, Some("person"), &DetectionEvent::new("cam-2", "t2", "person", late), late));
    }

    #[test]
    fn test_type_check_on_short_hops_only() {
        let now = Utc::now();
        let car = DetectionEvent::new("cam-2", "t2", "car", now);
        let m = HeuristicMatcher;

        let overlap = handoff(TransitionType::Overlap, now + Duration::seconds(5));
        assert!(!m.matches(&overlap, Some("person"), &car, now));
        assert!(m.matches(&overlap, None, &car, now));

        let adjacent = handoff(TransitionType::Adjacent, now + Duration::seconds(5));
        assert!(!m.matches(&adjacent, Some("person"), &car, now));

        let gap = handoff(TransitionType::Gap, now + Duration::seconds(5));
        assert!(m.matches(&gap, Some("person"), &car, now));
    }
}
