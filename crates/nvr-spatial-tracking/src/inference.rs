//! Transition auto-detection between camera placements.
//!
//! Every unordered pair of placements on a map is classified from their
//! field-of-view polygons:
//!
//! 1. intersecting polygons → [`TransitionType::Overlap`], with the overlap
//!    zone approximated by the vertices of each polygon inside the other;
//! 2. otherwise the minimum vertex distance decides between
//!    [`TransitionType::Adjacent`] (below the adjacency threshold) and
//!    [`TransitionType::Gap`].
//!
//! Expected transit time is the straight-line distance between camera
//! positions divided by an assumed walking speed. Distances are in map units
//! and are not rescaled by the map's units-per-meter. Transit times are capped
//! at [`MAX_TRANSIT_SECS`].

use crate::domain::{CameraPlacement, CameraTransition, TransitionType, MAX_TRANSIT_SECS};
use crate::geometry::{distance, Polygon};
use crate::{Result, SpatialError};

/// Tuning for [`TransitionDetector`].
#[derive(Debug, Clone)]
pub struct InferenceConfig {
    /// Max vertex distance for an adjacent pair, in map units (default: 10.0)
    pub adjacency_threshold: f64,
    /// Assumed walking speed used for transit estimates (default: 1.4)
    pub walking_speed: f64,
    /// Variance as a fraction of expected transit time (default: 0.5)
    pub variance_ratio: f64,
    /// Distance reported when either polygon is empty (default: 1000.0)
    pub far_distance: f64,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            adjacency_threshold: 10.0,
            walking_speed: 1.4,
            variance_ratio: 0.5,
            far_distance: 1000.0,
        }
    }
}

/// Classification of one placement pair.
#[derive(Debug, Clone, PartialEq)]
pub struct PairClassification {
    /// Relationship
    pub transition_type: TransitionType,
    /// Shared vertices, overlap only
    pub overlap_zone: Polygon,
    /// Min vertex distance, zero for overlaps
    pub gap_distance: f64,
    /// Estimated transit time in seconds
    pub expected_transit_time: f64,
    /// Estimated +/- window in seconds
    pub transit_time_variance: f64,
}

/// Pure pairwise classifier. Persistence is applied by the store.
#[derive(Debug, Clone, Default)]
pub struct TransitionDetector {
    config: InferenceConfig,
}

impl TransitionDetector {
    /// Create a detector with custom tuning
    pub fn new(config: InferenceConfig) -> Self {
        Self { config }
    }

    /// Tuning in use
    pub fn config(&self) -> &InferenceConfig {
        &self.config
    }

    /// Classify how two placements relate.
    pub fn classify(&self, a: &CameraPlacement, b: &CameraPlacement) -> PairClassification {
        let fov_a = a.fov_polygon();
        let fov_b = b.fov_polygon();

        let expected = (distance(&a.position, &b.position) / self.config.walking_speed).min(MAX_TRANSIT_SECS);
        let variance = (expected * self.config.variance_ratio).min(MAX_TRANSIT_SECS);

        if fov_a.intersects(&fov_b) {
            return PairClassification {
                transition_type: TransitionType::Overlap,
                overlap_zone: fov_a.overlap_zone(&fov_b),
                gap_distance: 0.0,
                expected_transit_time: expected,
                transit_time_variance: variance,
            };
        }

        let gap = fov_a
            .min_vertex_distance(&fov_b)
            .unwrap_or(self.config.far_distance);
        let transition_type = if gap < self.config.adjacency_threshold {
            TransitionType::Adjacent
        } else {
            TransitionType::Gap
        };

        PairClassification {
            transition_type,
            overlap_zone: Polygon::empty(),
            gap_distance: gap,
            expected_transit_time: expected,
            transit_time_variance: variance,
        }
    }

    /// Propose a transition for every unordered pair, `i < j` in input order.
    ///
    /// The proposals carry fresh ids; callers reconcile them with existing
    /// transitions. Fails with a validation error for fewer than two placements.
    pub fn detect(&self, placements: &[CameraPlacement]) -> Result<Vec<CameraTransition>> {
        if placements.len() < 2 {
            return Err(SpatialError::Validation(
                "need at least 2 camera placements to detect transitions".to_string(),
            ));
        }

        let mut proposals = Vec::with_capacity(placements.len() * (placements.len() - 1) / 2);
        for (i, a) in placements.iter().enumerate() {
            for b in &placements[i + 1..] {
                let pair = self.classify(a, b);
                let mut transition =
                    CameraTransition::new(&a.camera_id, &b.camera_id, pair.transition_type);
                transition.bidirectional = true;
                transition.overlap_zone = pair.overlap_zone;
                transition.expected_transit_time = pair.expected_transit_time;
                transition.transit_time_variance = pair.transit_time_variance;

                tracing::debug!(
                    from_camera = %a.camera_id,
                    to_camera = %b.camera_id,
                    transition_type = %pair.transition_type,
                    gap = pair.gap_distance,
                    "Classified camera pair"
                );
                proposals.push(transition);
            }
        }
        Ok(proposals)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Point;

    fn placement(camera: &str, x: f64, y: f64, rotation: f64) -> CameraPlacement {
        CameraPlacement::new(camera, "map-1", Point::new(x, y), rotation, 60.0, 80.0)
    }

    #[test]
    fn test_facing_cameras_overlap() {
        let detector = TransitionDetector::default();
        let pair = detector.classify(&placement("cam-1", 0.0, 0.0, 0.0), &placement("cam-2", 50.0, 0.0, 180.0));

        assert_eq!(pair.transition_type, TransitionType::Overlap);
        assert!(!pair.overlap_zone.is_empty());
        assert!((pair.expected_transit_time - 50.0 / 1.4).abs() < 1e-9);
        assert!((pair.transit_time_variance - pair.expected_transit_time * 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_far_cameras_gap() {
        let detector = TransitionDetector::default();
        let pair = detector.classify(&placement("cam-1", 0.0, 0.0, 180.0), &placement("cam-2", 500.0, 0.0, 0.0));
        assert_eq!(pair.transition_type, TransitionType::Gap);
        assert!(pair.overlap_zone.is_empty());

        let remote = detector.classify(&placement("cam-1", 0.0, 0.0, 180.0), &placement("cam-3", 1e9, 0.0, 0.0));
        assert_eq!(remote.expected_transit_time, MAX_TRANSIT_SECS);
        assert_eq!(remote.transit_time_variance, MAX_TRANSIT_SECS * 0.5);
    }

    #[test]
    fn test_near_cameras_adjacent() {
        let detector = TransitionDetector::default();
        let mut a = placement("cam-1", 0.0, 0.0, 0.0);
        let mut b = placement("cam-2", 0.0, 0.0, 0.0);
        a.coverage_polygon = Polygon::new(vec![
            Point::new(0.0, 0.0),
            Point::new(10.0, 0.0),
            Point::new(10.0, 10.0),
        ]);
        b.coverage_polygon = Polygon::new(vec![
            Point::new(15.0, 0.0),
            Point::new(25.0, 0.0),
            Point::new(25.0, 10.0),
        ]);
        let pair = detector.classify(&a, &b);
        assert_eq!(pair.transition_type, TransitionType::Adjacent);
        assert_eq!(pair.gap_distance, 5.0);
    }

    #[test]
    fn test_detect_requires_two_placements() {
        let detector = TransitionDetector::default();
        let err = detector.detect(&[placement("cam-1", 0.0, 0.0, 0.0)]).unwrap_err();
        assert!(matches!(err, SpatialError::Validation(_)));
    }

    #[test]
    fn test_detect_all_pairs() {
        let detector = TransitionDetector::default();
        let placements = vec![
            placement("cam-1", 0.0, 0.0, 0.0),
            placement("cam-2", 50.0, 0.0, 180.0),
            placement("cam-3", 900.0, 900.0, 90.0),
        ];
        let proposals = detector.detect(&placements).unwrap();
        assert_eq!(proposals.len(), 3);
        assert_eq!(proposals[0].from_camera_id, "cam-1");
        assert_eq!(proposals[0].to_camera_id, "cam-2");
        assert!(proposals.iter().all(|t| t.bidirectional));
    }
}
