//! # NVR Spatial Tracking
//!
//! Cross-camera object tracking for a network video recorder.
//!
//! Cameras are placed on flat spatial maps. From their placements the crate
//! derives field-of-view polygons, infers how camera pairs relate (overlap,
//! adjacent, gap) and estimates transit times. A track manager consumes
//! per-camera detection events and stitches them into global tracks: when an
//! object leaves one camera, a pending handoff is opened towards the cameras
//! it can reach, and a matching detection on one of those cameras before the
//! deadline continues the same track.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                   nvr-spatial-tracking                   │
//! ├──────────────────────────────────────────────────────────┤
//! │  detections ──▶ ┌──────────────┐      ┌──────────────┐   │
//! │                 │ TrackManager │◀────▶│ SpatialStore │   │
//! │  exits ───────▶ └──────┬───────┘      └──────▲───────┘   │
//! │                        │                     │           │
//! │               ┌────────▼────────┐   ┌────────┴────────┐  │
//! │               │ HandoffMatcher  │   │ TransitionDetect│  │
//! │               └─────────────────┘   └─────────────────┘  │
//! │                        ▲                                 │
//! │                 ┌──────┴──────┐                          │
//! │                 │  REST API   │                          │
//! │                 └─────────────┘                          │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use nvr_spatial_tracking::prelude::*;
//!
//! fn main() -> nvr_spatial_tracking::Result<()> {
//!     let store = SpatialStore::in_memory()?;
//!     let config = TrackingConfig::builder().track_ttl_secs(120).build();
//!     let manager = Arc::new(TrackManager::new(store, config));
//!
//!     manager.process_detection(&DetectionEvent::new("cam-1", "t1", "person", chrono::Utc::now()));
//!     println!("active tracks: {}", manager.active_track_count());
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]

pub mod domain;
pub mod geometry;
pub mod inference;
pub mod store;
pub mod tracking;

#[cfg(feature = "api")]
pub mod api;

pub use domain::{
    Analytics, BoundingBox, BoundingBoxSample, CalibrationSession, CameraPlacement,
    CameraTransition, DetectionEvent, EdgeDirection, GlobalTrack, HandoffTestResult,
    HandoffTestStatus, HourlyActivity, MapAnalytics, MapMetadata, PendingHandoff, SpatialMap,
    TrackExit, TrackPath, TrackSegment, TrackState, TransitionStat, TransitionType, Waypoint,
    ZoneDefinition,
};
pub use geometry::{distance, Point, Polygon};
pub use inference::{InferenceConfig, TransitionDetector};
pub use store::{SpatialStore, StoreError};
pub use tracking::{
    HandoffMatcher, HeuristicMatcher, PersistenceStats, SweepReport, TrackManager, WriteBehind,
};

#[cfg(feature = "api")]
pub use api::{create_router, AppState};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Common result type for spatial tracking operations
pub type Result<T> = std::result::Result<T, SpatialError>;

/// Unified error type for spatial tracking operations
#[derive(Debug, thiserror::Error)]
pub enum SpatialError {
    /// Persistence failure
    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    /// Invalid input
    #[error("Validation error: {0}")]
    Validation(String),

    /// Requested entity absent
    #[error("{entity} not found: {id}")]
    NotFound {
        /// Entity kind
        entity: &'static str,
        /// Requested id
        id: String,
    },

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),
}

impl SpatialError {
    /// Whether this error means the requested entity does not exist
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            SpatialError::NotFound { .. } | SpatialError::Store(StoreError::NotFound { .. })
        )
    }
}

/// Configuration for the track manager
#[derive(Debug, Clone)]
pub struct TrackingConfig {
    /// Seconds a lost track is kept in memory before completing (default: 300)
    pub track_ttl_secs: u64,
    /// Period of the expiry and stale-track sweeps (default: 5)
    pub sweep_interval_secs: u64,
    /// Bounding box samples kept per segment (default: 100)
    pub max_bbox_samples: usize,
    /// Opportunistic track persistence cadence, in timestamp seconds (default: 10)
    pub persist_every_secs: u32,
    /// Variance as a fraction of transit time when unset (default: 0.5)
    pub default_variance_ratio: f64,
    /// Extra attempts for a failed write before it is dropped (default: 1)
    pub persist_retries: u32,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            track_ttl_secs: 300,
            sweep_interval_secs: 5,
            max_bbox_samples: 100,
            persist_every_secs: 10,
            default_variance_ratio: 0.5,
            persist_retries: 1,
        }
    }
}

impl TrackingConfig {
    /// Create a new configuration builder
    pub fn builder() -> TrackingConfigBuilder {
        TrackingConfigBuilder::default()
    }

    /// Lost-track TTL as a chrono duration
    pub fn track_ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.track_ttl_secs as i64)
    }

    /// Reject values the builder would have clamped.
    pub fn validate(&self) -> Result<()> {
        if !(1..=60).contains(&self.persist_every_secs) {
            return Err(SpatialError::Config(format!(
                "persist_every_secs must be in 1..=60, got {}",
                self.persist_every_secs
            )));
        }
        if self.max_bbox_samples == 0 {
            return Err(SpatialError::Config("max_bbox_samples must be at least 1".to_string()));
        }
        if !self.default_variance_ratio.is_finite() || self.default_variance_ratio < 0.0 {
            return Err(SpatialError::Config(format!(
                "default_variance_ratio must be a non-negative number, got {}",
                self.default_variance_ratio
            )));
        }
        Ok(())
    }
}

/// Builder for TrackingConfig
#[derive(Debug, Default)]
pub struct TrackingConfigBuilder {
    config: TrackingConfig,
}

impl TrackingConfigBuilder {
    /// Set lost-track TTL
    pub fn track_ttl_secs(mut self, secs: u64) -> Self {
        self.config.track_ttl_secs = secs;
        self
    }

    /// Set sweep period
    pub fn sweep_interval_secs(mut self, secs: u64) -> Self {
        self.config.sweep_interval_secs = secs.max(1);
        self
    }

    /// Set bounding box samples kept per segment
    pub fn max_bbox_samples(mut self, samples: usize) -> Self {
        self.config.max_bbox_samples = samples.max(1);
        self
    }

    /// Set opportunistic persistence cadence
    pub fn persist_every_secs(mut self, secs: u32) -> Self {
        self.config.persist_every_secs = secs.clamp(1, 60);
        self
    }

    /// Set default variance ratio
    pub fn default_variance_ratio(mut self, ratio: f64) -> Self {
        self.config.default_variance_ratio = ratio.max(0.0);
        self
    }

    /// Set write retries
    pub fn persist_retries(mut self, retries: u32) -> Self {
        self.config.persist_retries = retries;
        self
    }

    /// Build the configuration
    pub fn build(self) -> TrackingConfig {
        self.config
    }
}

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{
        CameraPlacement, CameraTransition, DetectionEvent, EdgeDirection, GlobalTrack,
        PendingHandoff, Point, Polygon, SpatialError, SpatialMap, SpatialStore, TrackExit,
        TrackManager, TrackState, TrackingConfig, TransitionDetector, TransitionType,
    };
}
