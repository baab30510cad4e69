//! REST API for spatial tracking.
//!
//! ## Endpoints
//!
//! ### Maps
//! - `GET /api/v1/maps` - List maps
//! - `POST /api/v1/maps` - Create map
//! - `GET|PUT|DELETE /api/v1/maps/{id}` - Get, update, delete map
//! - `POST /api/v1/maps/{id}/image` - Upload background image
//! - `GET /api/v1/maps/{id}/analytics` - Per-map aggregates
//!
//! ### Camera placements
//! - `GET|POST /api/v1/maps/{id}/cameras` - List, create placements
//! - `PUT|DELETE /api/v1/maps/{id}/cameras/{placement_id}`
//! - `GET|PUT|DELETE /api/v1/cameras/{placement_id}`
//!
//! ### Transitions
//! - `GET|POST /api/v1/transitions`
//! - `GET|PUT|DELETE /api/v1/transitions/{id}`
//! - `POST /api/v1/transitions/auto-detect` - Body `{ "map_id": ... }`
//! - `POST /api/v1/maps/{id}/auto-detect-transitions`
//!
//! ### Tracks and ingestion
//! - `GET /api/v1/tracks`, `GET /api/v1/tracks/{id}`, `GET /api/v1/tracks/{id}/path`
//! - `POST /api/v1/detections`, `POST /api/v1/detections/exit`
//!
//! ### Tools
//! - `POST /api/v1/calibrate/{camera_id}`
//! - `POST /api/v1/test-handoff`
//! - `GET /api/v1/analytics`
//! - `GET /health`
//!
//! Uploaded map images are served under [`MAP_IMAGE_ROUTE`] by the hosting
//! binary, which knows where the data directory lives.
//!
//! [`MAP_IMAGE_ROUTE`]: crate::store::MAP_IMAGE_ROUTE

pub mod dto;
pub mod error;
pub mod handlers;
pub mod state;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};

pub use dto::*;
pub use error::{ApiError, ApiResult};
pub use state::{ApiConfig, AppState};

/// Create the API router with all endpoints.
///
/// # Example
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use nvr_spatial_tracking::api::{create_router, AppState};
/// use nvr_spatial_tracking::{SpatialStore, TrackManager, TrackingConfig};
///
/// #[tokio::main]
/// async fn main() {
///     let store = SpatialStore::in_memory().unwrap();
///     let manager = Arc::new(TrackManager::new(store, TrackingConfig::default()));
///     let app = create_router(AppState::new(manager));
///     // ... serve with axum
/// }
/// ```
pub fn create_router(state: AppState) -> Router {
    let upload_limit = state.config().max_upload_bytes;

    Router::new()
        // Maps
        .route("/api/v1/maps", get(handlers::list_maps).post(handlers::create_map))
        .route(
            "/api/v1/maps/:map_id",
            get(handlers::get_map)
                .put(handlers::update_map)
                .delete(handlers::delete_map),
        )
        .route(
            "/api/v1/maps/:map_id/image",
            post(handlers::upload_map_image).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route("/api/v1/maps/:map_id/analytics", get(handlers::get_map_analytics))
        .route(
            "/api/v1/maps/:map_id/auto-detect-transitions",
            post(handlers::auto_detect_transitions_for_map),
        )
        // Camera placements
        .route(
            "/api/v1/maps/:map_id/cameras",
            get(handlers::list_placements).post(handlers::create_placement),
        )
        .route(
            "/api/v1/maps/:map_id/cameras/:placement_id",
            axum::routing::put(handlers::update_map_placement).delete(handlers::delete_map_placement),
        )
        .route(
            "/api/v1/cameras/:placement_id",
            get(handlers::get_placement)
                .put(handlers::update_placement)
                .delete(handlers::delete_placement),
        )
        // Transitions
        .route(
            "/api/v1/transitions",
            get(handlers::list_transitions).post(handlers::create_transition),
        )
        .route("/api/v1/transitions/auto-detect", post(handlers::auto_detect_transitions))
        .route(
            "/api/v1/transitions/:transition_id",
            get(handlers::get_transition)
                .put(handlers::update_transition)
                .delete(handlers::delete_transition),
        )
        // Tracks
        .route("/api/v1/tracks", get(handlers::list_tracks))
        .route("/api/v1/tracks/:track_id", get(handlers::get_track))
        .route("/api/v1/tracks/:track_id/path", get(handlers::get_track_path))
        // Ingestion
        .route("/api/v1/detections", post(handlers::ingest_detection))
        .route("/api/v1/detections/exit", post(handlers::ingest_exit))
        // Tools
        .route("/api/v1/calibrate/:camera_id", post(handlers::start_calibration))
        .route("/api/v1/test-handoff", post(handlers::test_handoff))
        .route("/api/v1/analytics", get(handlers::get_analytics))
        .route("/health", get(handlers::health))
        .with_state(state)
}
