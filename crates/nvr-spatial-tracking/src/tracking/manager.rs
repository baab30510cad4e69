//! Track and handoff engine.
//!
//! Shared state lives in three independently locked maps:
//!
//! 1. global track id → [`GlobalTrack`]
//! 2. `"camera:local_track"` → global track id
//! 3. pending handoff id → [`PendingHandoff`]
//!
//! No method holds more than one of these locks at a time, and none holds a
//! lock across a store call. A caller resolving a track through map (2)
//! releases it before locking map (1).

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Timelike, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

use super::matcher::{HandoffMatcher, HeuristicMatcher};
use super::persistence::{PersistenceStats, WriteBehind};
use crate::domain::{
    CalibrationSession, CameraTransition, DetectionEvent, GlobalTrack, HandoffTestResult,
    HandoffTestStatus, PendingHandoff, TrackExit, TrackPath, TrackState, TransitionType, Waypoint,
    MAX_TRANSIT_SECS,
};
use crate::store::SpatialStore;
use crate::{Result, SpatialError, TrackingConfig};

/// Confidence of a waypoint placed at the camera position
const ENTRY_CONFIDENCE: f64 = 1.0;
/// Confidence of a waypoint at a reported exit position
const EXIT_CONFIDENCE: f64 = 0.8;
/// Longest handoff window: transit plus variance, each capped at a day
const MAX_HANDOFF_WINDOW_SECS: f64 = 2.0 * MAX_TRANSIT_SECS;

fn camera_key(camera_id: &str, local_track_id: &str) -> String {
    format!("{camera_id}:{local_track_id}")
}

fn seconds_between(later: DateTime<Utc>, earlier: DateTime<Utc>) -> f64 {
    (later - earlier).num_milliseconds() as f64 / 1000.0
}

/// Where an exiting track may reappear.
#[derive(Debug, Clone, PartialEq)]
struct Route {
    destinations: Vec<String>,
    deadline: DateTime<Utc>,
    transition_type: TransitionType,
}

/// Union of reachable cameras with the latest deadline across them.
///
/// The handoff type is that of the last transition considered.
fn plan_route(
    transitions: &[CameraTransition],
    camera_id: &str,
    now: DateTime<Utc>,
    default_variance_ratio: f64,
) -> Option<Route> {
    let mut route: Option<Route> = None;
    for transition in transitions {
        let Some(next) = transition.destination_from(camera_id) else {
            continue;
        };
        // NaN collapses to zero under `max`.
        let window = transition
            .handoff_window(default_variance_ratio)
            .max(0.0)
            .min(MAX_HANDOFF_WINDOW_SECS);
        let offset = chrono::Duration::milliseconds((window * 1000.0).round() as i64);
        let Some(arrival) = now.checked_add_signed(offset) else {
            tracing::warn!(
                transition_id = %transition.id,
                window_secs = window,
                "Handoff deadline out of range, skipping transition"
            );
            continue;
        };

        match route.as_mut() {
            None => {
                route = Some(Route {
                    destinations: vec![next.to_string()],
                    deadline: arrival,
                    transition_type: transition.transition_type,
                })
            }
            Some(r) => {
                if !r.destinations.iter().any(|d| d == next) {
                    r.destinations.push(next.to_string());
                }
                r.deadline = r.deadline.max(arrival);
                r.transition_type = transition.transition_type;
            }
        }
    }
    route
}

/// Outcome of one sweep pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    /// Handoffs deleted because their deadline passed
    pub expired_handoffs: usize,
    /// Lost tracks promoted to completed and evicted
    pub completed_tracks: usize,
}

/// Cross-camera track state machine.
pub struct TrackManager {
    store: SpatialStore,
    config: TrackingConfig,
    matcher: Box<dyn HandoffMatcher>,
    writes: WriteBehind,
    tracks: RwLock<HashMap<String, GlobalTrack>>,
    camera_tracks: RwLock<HashMap<String, String>>,
    pending: RwLock<HashMap<String, PendingHandoff>>,
}

impl TrackManager {
    /// Create a manager using the heuristic matcher
    pub fn new(store: SpatialStore, config: TrackingConfig) -> Self {
        let writes = WriteBehind::new(config.persist_retries);
        Self {
            store,
            config,
            matcher: Box::new(HeuristicMatcher),
            writes,
            tracks: RwLock::new(HashMap::new()),
            camera_tracks: RwLock::new(HashMap::new()),
            pending: RwLock::new(HashMap::new()),
        }
    }

    /// Replace the matching strategy
    pub fn with_matcher(mut self, matcher: impl HandoffMatcher + 'static) -> Self {
        self.matcher = Box::new(matcher);
        self
    }

    /// Persistence gateway
    pub fn store(&self) -> &SpatialStore {
        &self.store
    }

    /// Active configuration
    pub fn config(&self) -> &TrackingConfig {
        &self.config
    }

    // ========================================================================
    // Detection ingestion
    // ========================================================================

    /// Ingest a detection, returning the global track it was attributed to.
    pub fn process_detection(&self, event: &DetectionEvent) -> Option<String> {
        self.process_detection_at(event, Utc::now())
    }

    /// [`TrackManager::process_detection`] with an explicit clock.
    ///
    /// Malformed events (missing camera or track id) are dropped.
    pub fn process_detection_at(&self, event: &DetectionEvent, now: DateTime<Utc>) -> Option<String> {
        if !event.is_well_formed() {
            tracing::trace!("Dropping detection without camera or track id");
            return None;
        }

        let key = camera_key(&event.camera_id, &event.track_id);
        let known = self.camera_tracks.read().get(&key).cloned();
        if let Some(track_id) = known {
            self.update_track(&track_id, event);
            return Some(track_id);
        }

        if let Some(handoff) = self.match_pending_handoff(event, now) {
            if let Some(track_id) = self.continue_track(&handoff, event) {
                return Some(track_id);
            }
        }

        Some(self.create_track(event))
    }

    fn update_track(&self, track_id: &str, event: &DetectionEvent) {
        let persist_due = event.timestamp.second() % self.config.persist_every_secs.max(1) == 0;
        let snapshot = {
            let mut tracks = self.tracks.write();
            let Some(track) = tracks.get_mut(track_id) else {
                return;
            };
            track.observe(event, self.config.max_bbox_samples);
            persist_due.then(|| track.clone())
        };

        if let Some(track) = snapshot {
            self.writes.write("update_track", || self.store.save_track(&track));
        }
    }

    fn match_pending_handoff(&self, event: &DetectionEvent, now: DateTime<Utc>) -> Option<PendingHandoff> {
        let mut candidates: Vec<PendingHandoff> = self
            .pending
            .read()
            .values()
            .filter(|h| h.expects_camera(&event.camera_id))
            .cloned()
            .collect();
        if candidates.is_empty() {
            return None;
        }
        candidates.sort_by(|a, b| a.exited_at.cmp(&b.exited_at).then_with(|| a.id.cmp(&b.id)));

        let object_types: HashMap<String, String> = {
            let tracks = self.tracks.read();
            candidates
                .iter()
                .filter_map(|h| {
                    tracks
                        .get(&h.global_track_id)
                        .map(|t| (h.global_track_id.clone(), t.object_type.clone()))
                })
                .collect()
        };

        for candidate in candidates {
            let original = object_types.get(&candidate.global_track_id).map(String::as_str);
            if !self.matcher.matches(&candidate, original, event, now) {
                continue;
            }

            // Another detection may have claimed it since the snapshot.
            let Some(handoff) = self.pending.write().remove(&candidate.id) else {
                continue;
            };

            self.writes.write("delete_pending_handoff", || {
                self.store.delete_pending_handoff(&handoff.id).map(|_| ())
            });
            let transit = seconds_between(event.timestamp, handoff.exited_at).max(0.0);
            self.record_outcome(&handoff.from_camera_id, &event.camera_id, transit, true);

            tracing::info!(
                global_track_id = %handoff.global_track_id,
                from_camera = %handoff.from_camera_id,
                to_camera = %event.camera_id,
                transit_secs = transit,
                matcher = self.matcher.name(),
                "Handoff matched"
            );
            return Some(handoff);
        }
        None
    }

    fn continue_track(&self, handoff: &PendingHandoff, event: &DetectionEvent) -> Option<String> {
        let (track, closed, opened) = {
            let mut tracks = self.tracks.write();
            let track = tracks.get_mut(&handoff.global_track_id)?;
            let (closed, opened) = track.continue_from(handoff, event);
            (track.clone(), closed, opened)
        };

        self.camera_tracks
            .write()
            .insert(camera_key(&event.camera_id, &event.track_id), track.id.clone());

        if let Some(segment) = closed {
            self.writes.write("close_segment", || self.store.save_segment(&segment));
        }
        self.writes.write("update_track", || self.store.save_track(&track));
        self.writes.write("create_segment", || self.store.save_segment(&opened));

        Some(track.id)
    }

    fn create_track(&self, event: &DetectionEvent) -> String {
        let track = GlobalTrack::start(event);
        let id = track.id.clone();

        self.writes.write("create_track", || self.store.save_track(&track));
        if let Some(segment) = track.path.first() {
            self.writes.write("create_segment", || self.store.save_segment(segment));
        }

        tracing::debug!(
            track_id = %id,
            camera_id = %event.camera_id,
            object_type = %event.object_type,
            "Created new global track"
        );

        self.tracks.write().insert(id.clone(), track);
        self.camera_tracks
            .write()
            .insert(camera_key(&event.camera_id, &event.track_id), id.clone());
        id
    }

    // ========================================================================
    // Exits and handoffs
    // ========================================================================

    /// Handle a camera-local track leaving the frame.
    ///
    /// Returns the resulting state, or `None` if the track is unknown.
    pub fn handle_track_exit(&self, exit: &TrackExit) -> Option<TrackState> {
        self.handle_track_exit_at(exit, Utc::now())
    }

    /// [`TrackManager::handle_track_exit`] with an explicit clock.
    pub fn handle_track_exit_at(&self, exit: &TrackExit, now: DateTime<Utc>) -> Option<TrackState> {
        if !exit.is_well_formed() {
            return None;
        }
        let key = camera_key(&exit.camera_id, &exit.track_id);
        let track_id = self.camera_tracks.read().get(&key).cloned()?;

        let transitions = self
            .store
            .list_transitions_from_camera(&exit.camera_id)
            .unwrap_or_else(|err| {
                tracing::warn!(camera_id = %exit.camera_id, error = %err, "Transition lookup failed");
                Vec::new()
            });
        let route = plan_route(&transitions, &exit.camera_id, now, self.config.default_variance_ratio);

        let (track, closed, handoff) = {
            let mut tracks = self.tracks.write();
            let track = tracks.get_mut(&track_id)?;
            let closed = track.close_segment(now, exit.exit_direction, Some(exit.exit_position));

            let handoff = match route {
                Some(route) => {
                    track.begin_transit(&route.destinations[0], route.deadline);
                    Some(PendingHandoff {
                        id: crate::domain::new_id(),
                        global_track_id: track.id.clone(),
                        from_camera_id: exit.camera_id.clone(),
                        to_camera_ids: route.destinations,
                        transition_type: route.transition_type,
                        exited_at: now,
                        expected_by: route.deadline,
                        exit_direction: exit.exit_direction,
                        exit_position: exit.exit_position,
                        embedding: track.embedding.clone(),
                        dominant_colors: track.dominant_colors.clone(),
                    })
                }
                None => {
                    track.mark_lost();
                    None
                }
            };
            (track.clone(), closed, handoff)
        };

        if let Some(handoff) = &handoff {
            self.pending.write().insert(handoff.id.clone(), handoff.clone());
        }
        self.camera_tracks.write().remove(&key);

        if let Some(segment) = closed {
            self.writes.write("close_segment", || self.store.save_segment(&segment));
        }
        self.writes.write("update_track", || self.store.save_track(&track));

        match handoff {
            Some(handoff) => {
                self.writes
                    .write("create_pending_handoff", || self.store.create_pending_handoff(&handoff));
                tracing::debug!(
                    track_id = %track.id,
                    from_camera = %handoff.from_camera_id,
                    to_cameras = ?handoff.to_camera_ids,
                    expected_by = %handoff.expected_by,
                    "Created pending handoff"
                );
            }
            None => {
                tracing::debug!(track_id = %track.id, camera_id = %exit.camera_id, "No route from camera, track lost");
            }
        }

        Some(track.state)
    }

    fn record_outcome(&self, from: &str, to: &str, transit: f64, success: bool) {
        self.writes.write("record_handoff", || {
            match self.store.get_transition_by_cameras(from, to)? {
                Some(transition) => self.store.record_handoff(&transition.id, transit, success).map(|_| ()),
                None => Ok(()),
            }
        });
    }

    // ========================================================================
    // Sweeps
    // ========================================================================

    /// Delete handoffs past their deadline and mark their tracks lost.
    pub fn expire_handoffs(&self, now: DateTime<Utc>) -> usize {
        let expired: Vec<PendingHandoff> = {
            let mut pending = self.pending.write();
            let ids: Vec<String> = pending
                .values()
                .filter(|h| h.is_expired(now))
                .map(|h| h.id.clone())
                .collect();
            ids.iter().filter_map(|id| pending.remove(id)).collect()
        };

        for handoff in &expired {
            let lost = {
                let mut tracks = self.tracks.write();
                tracks.get_mut(&handoff.global_track_id).map(|track| {
                    track.mark_lost();
                    track.clone()
                })
            };
            if let Some(track) = lost {
                self.writes.write("update_track", || self.store.save_track(&track));
            }

            if let Some(to) = handoff.primary_destination() {
                self.record_outcome(&handoff.from_camera_id, to, 0.0, false);
            }
            self.writes.write("delete_pending_handoff", || {
                self.store.delete_pending_handoff(&handoff.id).map(|_| ())
            });

            tracing::debug!(
                track_id = %handoff.global_track_id,
                from_camera = %handoff.from_camera_id,
                "Handoff expired"
            );
        }

        self.writes.write("cleanup_expired_handoffs", || {
            self.store.cleanup_expired_handoffs(now).map(|_| ())
        });
        expired.len()
    }

    /// Promote lost tracks idle beyond the TTL to completed and evict them.
    pub fn complete_stale_tracks(&self, now: DateTime<Utc>) -> usize {
        let ttl = self.config.track_ttl();
        let completed: Vec<GlobalTrack> = {
            let mut tracks = self.tracks.write();
            let ids: Vec<String> = tracks
                .iter_mut()
                .filter_map(|(id, track)| track.complete_if_stale(now, ttl).then(|| id.clone()))
                .collect();
            ids.iter().filter_map(|id| tracks.remove(id)).collect()
        };

        for track in &completed {
            self.writes.write("update_track", || self.store.save_track(track));
        }
        completed.len()
    }

    /// Run both sweeps once.
    pub fn sweep_at(&self, now: DateTime<Utc>) -> SweepReport {
        SweepReport {
            expired_handoffs: self.expire_handoffs(now),
            completed_tracks: self.complete_stale_tracks(now),
        }
    }

    /// Periodic sweep loop. Returns once `shutdown` flips to `true` or its
    /// sender is dropped.
    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        let period = Duration::from_secs(self.config.sweep_interval_secs.max(1));
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tracing::info!(interval_secs = period.as_secs(), "Track sweeper started");

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let report = self.sweep_at(Utc::now());
                    if report != SweepReport::default() {
                        tracing::debug!(
                            expired_handoffs = report.expired_handoffs,
                            completed_tracks = report.completed_tracks,
                            "Sweep complete"
                        );
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        tracing::info!("Track sweeper stopped");
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Tracks in active, transit or pending state, most recent first
    pub fn list_active_tracks(&self) -> Vec<GlobalTrack> {
        let mut live: Vec<GlobalTrack> = self
            .tracks
            .read()
            .values()
            .filter(|t| t.state.is_live())
            .cloned()
            .collect();
        live.sort_by(|a, b| b.last_seen.cmp(&a.last_seen));
        live
    }

    /// Tracks currently active or in transit
    pub fn active_track_count(&self) -> usize {
        self.tracks
            .read()
            .values()
            .filter(|t| matches!(t.state, TrackState::Active | TrackState::Transit))
            .count()
    }

    /// Open pending handoffs
    pub fn pending_handoff_count(&self) -> usize {
        self.pending.read().len()
    }

    /// Snapshot of open pending handoffs, earliest deadline first
    pub fn pending_handoffs(&self) -> Vec<PendingHandoff> {
        let mut handoffs: Vec<PendingHandoff> = self.pending.read().values().cloned().collect();
        handoffs.sort_by(|a, b| a.expected_by.cmp(&b.expected_by));
        handoffs
    }

    /// A track from memory, falling back to durable storage
    pub fn get_track(&self, id: &str) -> Result<Option<GlobalTrack>> {
        if let Some(track) = self.tracks.read().get(id).cloned() {
            return Ok(Some(track));
        }
        Ok(self.store.get_track(id)?)
    }

    /// Project a track onto its spatial map.
    ///
    /// Each segment contributes an entry waypoint at the camera position and,
    /// once exited with a known position, an exit waypoint. Segments on
    /// unplaced cameras are skipped.
    pub fn get_track_path(&self, track_id: &str) -> Result<TrackPath> {
        let track = self.get_track(track_id)?.ok_or_else(|| SpatialError::NotFound {
            entity: "track",
            id: track_id.to_string(),
        })?;

        let mut map_id = String::new();
        let mut waypoints = Vec::with_capacity(track.path.len() * 2);
        for segment in &track.path {
            let Some(placement) = self.store.get_placement_by_camera(&segment.camera_id)? else {
                continue;
            };
            if map_id.is_empty() {
                map_id = placement.map_id.clone();
            }

            waypoints.push(Waypoint {
                timestamp: segment.entered_at,
                camera_id: segment.camera_id.clone(),
                position: placement.position,
                confidence: ENTRY_CONFIDENCE,
            });
            if let (Some(exited_at), Some(position)) = (segment.exited_at, segment.exit_position) {
                waypoints.push(Waypoint {
                    timestamp: exited_at,
                    camera_id: segment.camera_id.clone(),
                    position,
                    confidence: EXIT_CONFIDENCE,
                });
            }
        }

        Ok(TrackPath {
            track_id: track.id,
            map_id,
            waypoints,
        })
    }

    /// Check whether a camera pair's transition is configured and
    /// consistent with the placements' fields of view.
    pub fn test_handoff(&self, from_camera_id: &str, to_camera_id: &str) -> Result<HandoffTestResult> {
        let mut result = HandoffTestResult {
            from_camera_id: from_camera_id.to_string(),
            to_camera_id: to_camera_id.to_string(),
            transition_type: None,
            expected_time_seconds: 0.0,
            status: HandoffTestStatus::Error,
            message: "No transition configured between these cameras".to_string(),
        };

        let Some(transition) = self.store.get_transition_by_cameras(from_camera_id, to_camera_id)? else {
            return Ok(result);
        };
        result.transition_type = Some(transition.transition_type);
        result.expected_time_seconds = transition.expected_transit_time;

        let from = self.store.get_placement_by_camera(from_camera_id)?;
        let to = self.store.get_placement_by_camera(to_camera_id)?;
        let (Some(from), Some(to)) = (from, to) else {
            result.status = HandoffTestStatus::Warning;
            result.message = "Camera placements not fully configured".to_string();
            return Ok(result);
        };

        let overlapping = from.fov_polygon().intersects(&to.fov_polygon());
        let (status, message) = match (overlapping, transition.transition_type) {
            (true, TransitionType::Overlap) | (false, TransitionType::Adjacent | TransitionType::Gap) => (
                HandoffTestStatus::Ok,
                format!(
                    "Transition configured correctly. Type: {}, Expected time: {:.1}s",
                    transition.transition_type, transition.expected_transit_time
                ),
            ),
            (true, other) => (
                HandoffTestStatus::Warning,
                format!("Cameras overlap but transition is marked as '{other}'"),
            ),
            (false, TransitionType::Overlap) => (
                HandoffTestStatus::Warning,
                "Transition marked as overlap but cameras don't overlap".to_string(),
            ),
        };
        result.status = status;
        result.message = message;
        Ok(result)
    }

    /// Start a guided calibration walk for a camera
    pub fn start_calibration(&self, camera_id: &str) -> CalibrationSession {
        let session = CalibrationSession::start(camera_id);
        tracing::info!(camera_id = %camera_id, session_id = %session.id, "Calibration session started");
        session
    }

    /// Persistence counters
    pub fn persistence_stats(&self) -> PersistenceStats {
        self.writes.stats()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{BoundingBox, CameraPlacement, EdgeDirection, SpatialMap};
    use crate::geometry::Point;
    use chrono::{Duration, TimeZone};

    fn manager() -> TrackManager {
        TrackManager::new(SpatialStore::in_memory().unwrap(), TrackingConfig::default())
    }

    fn transition(store: &SpatialStore, from: &str, to: &str, kind: TransitionType, expected: f64) -> CameraTransition {
        let mut t = CameraTransition::new(from, to, kind);
        t.expected_transit_time = expected;
        store.create_transition(t).unwrap()
    }

    fn exit(camera: &str, track: &str) -> TrackExit {
        TrackExit::new(camera, track, Some(EdgeDirection::Right), Point::new(10.0, 0.0))
    }

    #[test]
    fn test_new_detection_creates_active_track() {
        let tm = manager();
        let now = Utc::now();
        let id = tm
            .process_detection_at(&DetectionEvent::new("cam-1", "t1", "person", now), now)
            .unwrap();

        let track = tm.get_track(&id).unwrap().unwrap();
        assert_eq!(track.state, TrackState::Active);
        assert_eq!(track.path.len(), 1);
        assert!(track.open_segment().is_some());
        assert!(tm.store().get_track(&id).unwrap().is_some());
        assert_eq!(tm.active_track_count(), 1);
    }

    #[test]
    fn test_repeat_detection_updates_same_track() {
        let tm = manager();
        let t0 = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 3).unwrap();
        let bbox = BoundingBox { x: 0.1, y: 0.1, width: 0.1, height: 0.1 };
        let first = tm
            .process_detection_at(&DetectionEvent::new("cam-1", "t1", "person", t0).with_bounding_box(bbox), t0)
            .unwrap();
        let t1 = t0 + Duration::seconds(2);
        let second = tm
            .process_detection_at(&DetectionEvent::new("cam-1", "t1", "person", t1).with_bounding_box(bbox), t1)
            .unwrap();

        assert_eq!(first, second);
        let track = tm.get_track(&first).unwrap().unwrap();
        assert_eq!(track.last_seen, t1);
        assert_eq!(track.path[0].bounding_boxes.len(), 1);

        // Second 5 is off the persistence cadence; the durable copy lags.
        let stored = tm.store().get_track(&first).unwrap().unwrap();
        assert_eq!(stored.last_seen, t0);

        let t2 = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 10).unwrap();
        tm.process_detection_at(&DetectionEvent::new("cam-1", "t1", "person", t2), t2);
        assert_eq!(tm.store().get_track(&first).unwrap().unwrap().last_seen, t2);
    }

    #[test]
    fn test_malformed_events_are_dropped() {
        let tm = manager();
        let now = Utc::now();
        assert!(tm.process_detection_at(&DetectionEvent::new("", "t1", "person", now), now).is_none());
        assert!(tm.process_detection_at(&DetectionEvent::new("cam-1", "", "person", now), now).is_none());
        assert!(tm.handle_track_exit_at(&exit("", "t1"), now).is_none());
        assert_eq!(tm.active_track_count(), 0);
    }

    #[test]
    fn test_exit_without_route_is_lost() {
        let tm = manager();
        let now = Utc::now();
        let id = tm.process_detection_at(&DetectionEvent::new("cam-1", "t1", "person", now), now).unwrap();

        assert_eq!(tm.handle_track_exit_at(&exit("cam-1", "t1"), now), Some(TrackState::Lost));
        assert_eq!(tm.pending_handoff_count(), 0);
        assert_eq!(tm.get_track(&id).unwrap().unwrap().state, TrackState::Lost);
        assert!(tm.handle_track_exit_at(&exit("cam-1", "t1"), now).is_none());
    }

    #[test]
    fn test_exit_with_route_creates_one_handoff() {
        let tm = manager();
        transition(tm.store(), "cam-1", "cam-2", TransitionType::Gap, 10.0);
        transition(tm.store(), "cam-3", "cam-1", TransitionType::Adjacent, 20.0);
        let now = Utc::now();
        let id = tm.process_detection_at(&DetectionEvent::new("cam-1", "t1", "person", now), now).unwrap();

        assert_eq!(tm.handle_track_exit_at(&exit("cam-1", "t1"), now), Some(TrackState::Transit));

        let handoffs = tm.pending_handoffs();
        assert_eq!(handoffs.len(), 1);
        let handoff = &handoffs[0];
        assert_eq!(handoff.to_camera_ids, vec!["cam-2".to_string(), "cam-3".to_string()]);
        assert_eq!(handoff.expected_by, now + Duration::seconds(30));
        assert!(handoff.expected_by > now);
        assert_eq!(handoff.transition_type, TransitionType::Adjacent);
        assert_eq!(tm.store().list_pending_handoffs(now).unwrap().len(), 1);

        let track = tm.get_track(&id).unwrap().unwrap();
        assert_eq!(track.state, TrackState::Transit);
        assert_eq!(track.predicted_next_camera.as_deref(), Some("cam-2"));
        assert!(track.open_segment().is_none());
        assert_eq!(track.path[0].exit_position, Some(Point::new(10.0, 0.0)));
    }

    #[test]
    fn test_route_window_is_bounded() {
        let now = Utc::now();
        let mut huge = CameraTransition::new("cam-1", "cam-2", TransitionType::Gap);
        huge.expected_transit_time = 1e13;
        let route = plan_route(&[huge.clone()], "cam-1", now, 0.5).unwrap();
        assert_eq!(route.deadline, now + Duration::days(2));

        let mut negative = CameraTransition::new("cam-1", "cam-3", TransitionType::Gap);
        negative.expected_transit_time = -10.0;
        let route = plan_route(&[negative], "cam-1", now, 0.5).unwrap();
        assert!(route.deadline >= now);

        let end_of_time = chrono::DateTime::<Utc>::MAX_UTC;
        assert!(plan_route(&[huge], "cam-1", end_of_time, 0.5).is_none());
    }

    #[test]
    fn test_concurrent_arrivals_claim_handoff_once() {
        for _ in 0..25 {
            let tm = manager();
            transition(tm.store(), "cam-1", "cam-2", TransitionType::Gap, 10.0);
            let now = Utc::now();
            let id = tm.process_detection_at(&DetectionEvent::new("cam-1", "t1", "person", now), now).unwrap();
            tm.handle_track_exit_at(&exit("cam-1", "t1"), now);
            assert_eq!(tm.pending_handoff_count(), 1);

            let arrived = now + Duration::seconds(3);
            let barrier = std::sync::Barrier::new(4);
            let claimed: Vec<String> = std::thread::scope(|scope| {
                let workers: Vec<_> = (0..4)
                    .map(|i| {
                        let (tm, barrier) = (&tm, &barrier);
                        scope.spawn(move || {
                            let event = DetectionEvent::new("cam-2", format!("t{}", i + 2), "person", arrived);
                            barrier.wait();
                            tm.process_detection_at(&event, arrived).unwrap()
                        })
                    })
                    .collect();
                workers.into_iter().map(|w| w.join().unwrap()).collect()
            });

            assert_eq!(claimed.iter().filter(|c| **c == id).count(), 1);
            assert_eq!(tm.pending_handoff_count(), 0);
            let stats = tm.store().get_transition_by_cameras("cam-1", "cam-2").unwrap().unwrap();
            assert_eq!(stats.successful_handoffs, 1);
        }
    }

    #[test]
    fn test_match_continues_track_and_records_success() {
        let tm = manager();
        let t = transition(tm.store(), "cam-1", "cam-2", TransitionType::Overlap, 10.0);
        let now = Utc::now();
        let id = tm.process_detection_at(&DetectionEvent::new("cam-1", "t1", "person", now), now).unwrap();
        tm.handle_track_exit_at(&exit("cam-1", "t1"), now);

        let later = now + Duration::seconds(4);
        let continued = tm
            .process_detection_at(&DetectionEvent::new("cam-2", "t2", "person", later), later)
            .unwrap();
        assert_eq!(continued, id);

        let track = tm.get_track(&id).unwrap().unwrap();
        assert_eq!(track.state, TrackState::Active);
        assert_eq!(track.path.len(), 2);
        assert!(track.path[0].exited_at.is_some());
        assert!(track.path[1].is_open());
        assert_eq!(track.current_camera_id, "cam-2");
        assert_eq!(tm.pending_handoff_count(), 0);
        assert!(tm.store().list_pending_handoffs(now).unwrap().is_empty());

        let stats = tm.store().get_transition(&t.id).unwrap().unwrap();
        assert_eq!(stats.successful_handoffs, 1);
        assert_eq!(stats.avg_transit_time, 4.0);

        let stored = tm.store().get_track(&id).unwrap().unwrap();
        assert_eq!(stored.path.len(), 2);
    }

    #[test]
    fn test_type_mismatch_on_overlap_starts_new_track() {
        let tm = manager();
        transition(tm.store(), "cam-1", "cam-2", TransitionType::Overlap, 10.0);
        let now = Utc::now();
        let id = tm.process_detection_at(&DetectionEvent::new("cam-1", "t1", "person", now), now).unwrap();
        tm.handle_track_exit_at(&exit("cam-1", "t1"), now);

        let other = tm
            .process_detection_at(&DetectionEvent::new("cam-2", "t7", "car", now), now)
            .unwrap();
        assert_ne!(other, id);
        assert_eq!(tm.pending_handoff_count(), 1);
    }

    #[test]
    fn test_expiry_marks_lost_and_records_failure() {
        let tm = manager();
        let t = transition(tm.store(), "cam-1", "cam-2", TransitionType::Gap, 10.0);
        let now = Utc::now();
        let id = tm.process_detection_at(&DetectionEvent::new("cam-1", "t1", "person", now), now).unwrap();
        tm.handle_track_exit_at(&exit("cam-1", "t1"), now);

        assert_eq!(tm.expire_handoffs(now + Duration::seconds(10)), 0);
        let report = tm.sweep_at(now + Duration::seconds(16));
        assert_eq!(report.expired_handoffs, 1);
        assert_eq!(tm.pending_handoff_count(), 0);
        assert_eq!(tm.get_track(&id).unwrap().unwrap().state, TrackState::Lost);
        assert!(tm.store().list_pending_handoffs(now).unwrap().is_empty());

        let stats = tm.store().get_transition(&t.id).unwrap().unwrap();
        assert_eq!(stats.total_handoffs, 1);
        assert_eq!(stats.successful_handoffs, 0);
        assert_eq!(stats.success_rate, 0.0);

        let late = now + Duration::seconds(17);
        let fresh = tm
            .process_detection_at(&DetectionEvent::new("cam-2", "t2", "person", late), late)
            .unwrap();
        assert_ne!(fresh, id);
    }

    #[test]
    fn test_stale_lost_track_completes_and_is_evicted() {
        let tm = TrackManager::new(
            SpatialStore::in_memory().unwrap(),
            TrackingConfig::builder().track_ttl_secs(60).build(),
        );
        let now = Utc::now();
        let id = tm.process_detection_at(&DetectionEvent::new("cam-1", "t1", "person", now), now).unwrap();
        tm.handle_track_exit_at(&exit("cam-1", "t1"), now);

        assert_eq!(tm.complete_stale_tracks(now + Duration::seconds(30)), 0);
        assert_eq!(tm.complete_stale_tracks(now + Duration::seconds(61)), 1);
        assert!(tm.list_active_tracks().is_empty());

        let stored = tm.get_track(&id).unwrap().unwrap();
        assert_eq!(stored.state, TrackState::Completed);
    }

    #[test]
    fn test_track_path_waypoints() {
        let tm = manager();
        let store = tm.store();
        let map = store.create_map(SpatialMap::new("F1", 100.0, 100.0, 1.0)).unwrap();
        store
            .create_placement(CameraPlacement::new("cam-1", &map.id, Point::new(0.0, 0.0), 0.0, 60.0, 80.0))
            .unwrap();
        let now = Utc::now();
        let id = tm.process_detection_at(&DetectionEvent::new("cam-1", "t1", "person", now), now).unwrap();
        tm.handle_track_exit_at(&exit("cam-1", "t1"), now);

        let path = tm.get_track_path(&id).unwrap();
        assert_eq!(path.map_id, map.id);
        assert_eq!(path.waypoints.len(), 2);
        assert_eq!(path.waypoints[0].confidence, 1.0);
        assert_eq!(path.waypoints[1].position, Point::new(10.0, 0.0));
        assert_eq!(path.waypoints[1].confidence, 0.8);

        assert!(tm.get_track_path("missing").unwrap_err().is_not_found());
    }

    #[test]
    fn test_handoff_test_statuses() {
        let tm = manager();
        let store = tm.store();
        let missing = tm.test_handoff("cam-1", "cam-2").unwrap();
        assert_eq!(missing.status, HandoffTestStatus::Error);

        transition(store, "cam-1", "cam-2", TransitionType::Gap, 12.0);
        let unplaced = tm.test_handoff("cam-1", "cam-2").unwrap();
        assert_eq!(unplaced.status, HandoffTestStatus::Warning);

        let map = store.create_map(SpatialMap::new("F1", 100.0, 100.0, 1.0)).unwrap();
        store
            .create_placement(CameraPlacement::new("cam-1", &map.id, Point::new(0.0, 0.0), 0.0, 60.0, 80.0))
            .unwrap();
        store
            .create_placement(CameraPlacement::new("cam-2", &map.id, Point::new(50.0, 0.0), 180.0, 60.0, 80.0))
            .unwrap();
        let mismatch = tm.test_handoff("cam-2", "cam-1").unwrap();
        assert_eq!(mismatch.status, HandoffTestStatus::Warning);
        assert_eq!(mismatch.message, "Cameras overlap but transition is marked as 'gap'");
    }

    #[test]
    fn test_calibration_session() {
        let tm = manager();
        let session = tm.start_calibration("cam-5");
        assert_eq!(session.camera_id, "cam-5");
        assert_eq!(session.status, "pending");
        assert!(session.instructions.starts_with("Walk through"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_loop_stops_on_shutdown() {
        let tm = Arc::new(manager());
        let (tx, rx) = watch::channel(false);
        let handle = tokio::spawn(tm.clone().run(rx));

        tokio::time::sleep(std::time::Duration::from_secs(12)).await;
        tx.send(true).unwrap();
        handle.await.unwrap();
    }
}
