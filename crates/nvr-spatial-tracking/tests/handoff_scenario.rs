//! Two cameras facing each other across a corridor: auto-detect their
//! transition, then follow one person from the first camera into the second.

use chrono::{Duration, Utc};

use nvr_spatial_tracking::prelude::*;
use nvr_spatial_tracking::InferenceConfig;

struct Corridor {
    manager: TrackManager,
    transition: CameraTransition,
}

fn corridor() -> Corridor {
    let store = SpatialStore::in_memory().unwrap();
    let map = store.create_map(SpatialMap::new("Corridor", 200.0, 100.0, 1.0)).unwrap();
    store
        .create_placement(CameraPlacement::new("cam-1", &map.id, Point::new(0.0, 0.0), 0.0, 60.0, 80.0))
        .unwrap();
    store
        .create_placement(CameraPlacement::new("cam-2", &map.id, Point::new(50.0, 0.0), 180.0, 60.0, 80.0))
        .unwrap();

    let detector = TransitionDetector::new(InferenceConfig::default());
    let mut transitions = store.auto_detect_transitions(&map.id, &detector).unwrap();
    assert_eq!(transitions.len(), 1);
    let transition = transitions.remove(0);

    Corridor {
        manager: TrackManager::new(store, TrackingConfig::default()),
        transition,
    }
}

fn leave_right(camera: &str, track: &str) -> TrackExit {
    TrackExit::new(camera, track, Some(EdgeDirection::Right), Point::new(40.0, 0.0))
}

#[test]
fn test_overlapping_cameras_detect_one_overlap_transition() {
    let Corridor { transition, .. } = corridor();
    assert_eq!(transition.transition_type, TransitionType::Overlap);
    assert!(transition.bidirectional);
    assert!(transition.connects("cam-1", "cam-2"));
    assert!(transition.expected_transit_time > 0.0);
    assert!(!transition.overlap_zone.is_empty());
}

#[test]
fn test_auto_detect_twice_keeps_identity() {
    let store = SpatialStore::in_memory().unwrap();
    let map = store.create_map(SpatialMap::new("F1", 100.0, 100.0, 1.0)).unwrap();
    for (cam, x, rot) in [("cam-1", 0.0, 0.0), ("cam-2", 50.0, 180.0)] {
        store
            .create_placement(CameraPlacement::new(cam, &map.id, Point::new(x, 0.0), rot, 60.0, 80.0))
            .unwrap();
    }
    let detector = TransitionDetector::default();

    let first = store.auto_detect_transitions(&map.id, &detector).unwrap();
    let second = store.auto_detect_transitions(&map.id, &detector).unwrap();
    assert_eq!(first[0].id, second[0].id);
    assert_eq!(store.list_transitions().unwrap().len(), 1);
}

#[test]
fn test_person_is_followed_across_cameras() {
    let Corridor { manager, transition } = corridor();
    let t0 = Utc::now();

    let id = manager
        .process_detection_at(&DetectionEvent::new("cam-1", "t1", "person", t0), t0)
        .unwrap();
    let seen = t0 + Duration::seconds(2);
    manager.process_detection_at(&DetectionEvent::new("cam-1", "t1", "person", seen), seen);

    let exited = t0 + Duration::seconds(3);
    assert_eq!(
        manager.handle_track_exit_at(&leave_right("cam-1", "t1"), exited),
        Some(TrackState::Transit)
    );
    assert_eq!(manager.pending_handoff_count(), 1);

    let arrived = exited + Duration::seconds(5);
    let continued = manager
        .process_detection_at(&DetectionEvent::new("cam-2", "t2", "person", arrived), arrived)
        .unwrap();
    assert_eq!(continued, id);

    let track = manager.get_track(&id).unwrap().unwrap();
    assert_eq!(track.state, TrackState::Active);
    assert_eq!(track.path.len(), 2);
    assert_eq!(track.path[0].camera_id, "cam-1");
    assert_eq!(track.path[1].camera_id, "cam-2");
    assert_eq!(manager.pending_handoff_count(), 0);

    let learned = manager.store().get_transition(&transition.id).unwrap().unwrap();
    assert_eq!(learned.successful_handoffs, 1);
    assert_eq!(learned.total_handoffs, 1);
    assert_eq!(learned.success_rate, 1.0);
    assert_eq!(learned.avg_transit_time, 5.0);

    let path = manager.get_track_path(&id).unwrap();
    assert_eq!(path.waypoints.len(), 3);
    assert_eq!(path.waypoints[0].position, Point::new(0.0, 0.0));
    assert_eq!(path.waypoints[2].position, Point::new(50.0, 0.0));

    let diagnosis = manager.test_handoff("cam-1", "cam-2").unwrap();
    assert_eq!(diagnosis.status, nvr_spatial_tracking::HandoffTestStatus::Ok);
}

#[test]
fn test_missed_handoff_is_lost_then_completed() {
    let Corridor { manager, transition } = corridor();
    let t0 = Utc::now();
    let id = manager
        .process_detection_at(&DetectionEvent::new("cam-1", "t1", "person", t0), t0)
        .unwrap();
    manager.handle_track_exit_at(&leave_right("cam-1", "t1"), t0);

    let deadline = manager.pending_handoffs()[0].expected_by;
    assert!(deadline > t0);

    let report = manager.sweep_at(deadline + Duration::seconds(1));
    assert_eq!(report.expired_handoffs, 1);
    assert_eq!(report.completed_tracks, 0);
    assert_eq!(manager.get_track(&id).unwrap().unwrap().state, TrackState::Lost);

    let learned = manager.store().get_transition(&transition.id).unwrap().unwrap();
    assert_eq!(learned.total_handoffs, 1);
    assert_eq!(learned.successful_handoffs, 0);

    // A late arrival starts a fresh identity.
    let late = deadline + Duration::seconds(2);
    let fresh = manager
        .process_detection_at(&DetectionEvent::new("cam-2", "t2", "person", late), late)
        .unwrap();
    assert_ne!(fresh, id);

    let report = manager.sweep_at(t0 + Duration::seconds(301));
    assert_eq!(report.completed_tracks, 1);
    let stored = manager.store().get_track(&id).unwrap().unwrap();
    assert_eq!(stored.state, TrackState::Completed);
}

#[test]
fn test_state_survives_reopening_the_store() {
    let dir = tempfile::tempdir().unwrap();
    let t0 = Utc::now();
    let id = {
        let manager = TrackManager::new(SpatialStore::open(dir.path()).unwrap(), TrackingConfig::default());
        manager
            .process_detection_at(&DetectionEvent::new("cam-1", "t1", "car", t0), t0)
            .unwrap()
    };

    let reopened = TrackManager::new(SpatialStore::open(dir.path()).unwrap(), TrackingConfig::default());
    let track = reopened.get_track(&id).unwrap().unwrap();
    assert_eq!(track.object_type, "car");
    assert_eq!(track.path.len(), 1);
    assert!(reopened.list_active_tracks().is_empty());
}
