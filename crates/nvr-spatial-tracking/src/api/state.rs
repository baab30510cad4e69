//! Shared state handed to every API handler.

use std::sync::Arc;

use crate::inference::{InferenceConfig, TransitionDetector};
use crate::store::SpatialStore;
use crate::tracking::TrackManager;

/// Default cap on map image uploads
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Shared application state for the API.
///
/// Cheap to clone; everything lives behind one `Arc`.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    store: SpatialStore,
    manager: Arc<TrackManager>,
    detector: TransitionDetector,
    config: ApiConfig,
}

/// API configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Largest accepted map image, in bytes
    pub max_upload_bytes: usize,
    /// Transition inference thresholds
    pub inference: InferenceConfig,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            inference: InferenceConfig::default(),
        }
    }
}

impl AppState {
    /// State around a running track manager, with default configuration.
    pub fn new(manager: Arc<TrackManager>) -> Self {
        Self::with_config(manager, ApiConfig::default())
    }

    /// State with custom configuration.
    pub fn with_config(manager: Arc<TrackManager>, config: ApiConfig) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                store: manager.store().clone(),
                detector: TransitionDetector::new(config.inference.clone()),
                manager,
                config,
            }),
        }
    }

    /// Persistence gateway
    pub fn store(&self) -> &SpatialStore {
        &self.inner.store
    }

    /// Track engine
    pub fn manager(&self) -> &TrackManager {
        &self.inner.manager
    }

    /// Transition classifier used by auto-detection
    pub fn detector(&self) -> &TransitionDetector {
        &self.inner.detector
    }

    /// API configuration
    pub fn config(&self) -> &ApiConfig {
        &self.inner.config
    }
}
