//! Axum request handlers for the spatial tracking REST API.
//!
//! Handlers stay thin: decode, call the store or the track manager, encode.
//! Every failure is an [`ApiError`] so clients always receive a JSON body.
//!
//! Single-row SQLite calls run inline on the runtime. Calls that scan whole
//! tables (auto-detection, analytics) go through `spawn_blocking`.

use axum::{
    extract::{rejection::JsonRejection, Multipart, Path, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;

use super::dto::*;
use super::error::{ApiError, ApiResult};
use super::state::AppState;
use crate::domain::{
    Analytics, CalibrationSession, CameraPlacement, CameraTransition, DetectionEvent, GlobalTrack,
    HandoffTestResult, MapAnalytics, SpatialMap, TrackExit, TrackPath,
};

// ============================================================================
// Map Handlers
// ============================================================================

/// List all maps, newest first.
#[tracing::instrument(skip(state))]
pub async fn list_maps(State(state): State<AppState>) -> ApiResult<Json<Vec<SpatialMap>>> {
    Ok(Json(state.store().list_maps()?))
}

/// Create a map.
///
/// # OpenAPI Specification
///
/// ```yaml
/// /api/v1/maps:
///   post:
///     summary: Create spatial map
///     tags: [Maps]
///     requestBody:
///       required: true
///       content:
///         application/json:
///           schema:
///             $ref: '#/components/schemas/CreateMapRequest'
///     responses:
///       201:
///         description: Map created
///       400:
///         description: Invalid request body
///       409:
///         description: A map with this id exists
/// ```
#[tracing::instrument(skip(state))]
pub async fn create_map(
    State(state): State<AppState>,
    payload: Result<Json<CreateMapRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<SpatialMap>)> {
    let Json(request) = payload?;
    if request.name.trim().is_empty() {
        return Err(ApiError::bad_request("name is required"));
    }
    let map = state.store().create_map(request.into_map())?;
    tracing::info!(map_id = %map.id, name = %map.name, "Created spatial map");
    Ok((StatusCode::CREATED, Json(map)))
}

/// Get a map by id.
#[tracing::instrument(skip(state))]
pub async fn get_map(
    State(state): State<AppState>,
    Path(map_id): Path<String>,
) -> ApiResult<Json<SpatialMap>> {
    let map = state
        .store()
        .get_map(&map_id)?
        .ok_or_else(|| ApiError::not_found("map", &map_id))?;
    Ok(Json(map))
}

/// Update a map's name, size, scale or metadata.
#[tracing::instrument(skip(state))]
pub async fn update_map(
    State(state): State<AppState>,
    Path(map_id): Path<String>,
    payload: Result<Json<UpdateMapRequest>, JsonRejection>,
) -> ApiResult<Json<SpatialMap>> {
    let Json(request) = payload?;
    let mut map = state
        .store()
        .get_map(&map_id)?
        .ok_or_else(|| ApiError::not_found("map", &map_id))?;
    request.apply(&mut map);
    Ok(Json(state.store().update_map(map)?))
}

/// Delete a map and its placements.
#[tracing::instrument(skip(state))]
pub async fn delete_map(State(state): State<AppState>, Path(map_id): Path<String>) -> ApiResult<StatusCode> {
    state.store().delete_map(&map_id)?;
    tracing::info!(map_id = %map_id, "Deleted spatial map");
    Ok(StatusCode::NO_CONTENT)
}

/// Upload a background image from the multipart field `image`.
///
/// # OpenAPI Specification
///
/// ```yaml
/// /api/v1/maps/{map_id}/image:
///   post:
///     summary: Upload map background image
///     tags: [Maps]
///     requestBody:
///       content:
///         multipart/form-data:
///           schema:
///             type: object
///             properties:
///               image:
///                 type: string
///                 format: binary
///     responses:
///       200:
///         description: Map with updated image_url
///       400:
///         description: Missing field or unsupported file type
///       404:
///         description: Map not found
///       413:
///         description: File too large
/// ```
#[tracing::instrument(skip(state, multipart))]
pub async fn upload_map_image(
    State(state): State<AppState>,
    Path(map_id): Path<String>,
    mut multipart: Multipart,
) -> ApiResult<Json<SpatialMap>> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some("image") {
            continue;
        }
        let filename = field.file_name().unwrap_or_default().to_string();
        let bytes = field.bytes().await?;
        let map = state.store().save_map_image(&map_id, &filename, &bytes)?;
        return Ok(Json(map));
    }
    Err(ApiError::bad_request("No image file provided"))
}

/// Aggregates for the cameras placed on a map.
#[tracing::instrument(skip(state))]
pub async fn get_map_analytics(
    State(state): State<AppState>,
    Path(map_id): Path<String>,
) -> ApiResult<Json<MapAnalytics>> {
    if state.store().get_map(&map_id)?.is_none() {
        return Err(ApiError::not_found("map", map_id));
    }
    let store = state.store().clone();
    let analytics = tokio::task::spawn_blocking(move || store.map_analytics(&map_id)).await??;
    Ok(Json(analytics))
}

// ============================================================================
// Camera Placement Handlers
// ============================================================================

/// List the placements on a map, in creation order.
#[tracing::instrument(skip(state))]
pub async fn list_placements(
    State(state): State<AppState>,
    Path(map_id): Path<String>,
) -> ApiResult<Json<Vec<CameraPlacement>>> {
    if state.store().get_map(&map_id)?.is_none() {
        return Err(ApiError::not_found("map", map_id));
    }
    Ok(Json(state.store().list_placements_by_map(&map_id)?))
}

/// Place a camera on a map.
#[tracing::instrument(skip(state))]
pub async fn create_placement(
    State(state): State<AppState>,
    Path(map_id): Path<String>,
    payload: Result<Json<CreatePlacementRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<CameraPlacement>)> {
    let Json(request) = payload?;
    let placement = request.into_placement(&map_id);
    validate_placement(&placement).map_err(ApiError::bad_request)?;

    let placement = state.store().create_placement(placement)?;
    tracing::info!(
        placement_id = %placement.id,
        camera_id = %placement.camera_id,
        map_id = %placement.map_id,
        "Placed camera"
    );
    Ok((StatusCode::CREATED, Json(placement)))
}

/// Get a placement by id.
#[tracing::instrument(skip(state))]
pub async fn get_placement(
    State(state): State<AppState>,
    Path(placement_id): Path<String>,
) -> ApiResult<Json<CameraPlacement>> {
    Ok(Json(find_placement(&state, &placement_id, None)?))
}

/// Update a placement addressed by id alone.
#[tracing::instrument(skip(state))]
pub async fn update_placement(
    State(state): State<AppState>,
    Path(placement_id): Path<String>,
    payload: Result<Json<UpdatePlacementRequest>, JsonRejection>,
) -> ApiResult<Json<CameraPlacement>> {
    let Json(request) = payload?;
    apply_placement_update(&state, &placement_id, None, request).map(Json)
}

/// Update a placement addressed through its map.
#[tracing::instrument(skip(state))]
pub async fn update_map_placement(
    State(state): State<AppState>,
    Path((map_id, placement_id)): Path<(String, String)>,
    payload: Result<Json<UpdatePlacementRequest>, JsonRejection>,
) -> ApiResult<Json<CameraPlacement>> {
    let Json(request) = payload?;
    apply_placement_update(&state, &placement_id, Some(&map_id), request).map(Json)
}

/// Delete a placement addressed by id alone.
#[tracing::instrument(skip(state))]
pub async fn delete_placement(
    State(state): State<AppState>,
    Path(placement_id): Path<String>,
) -> ApiResult<StatusCode> {
    state.store().delete_placement(&placement_id)?;
    Ok(StatusCode::NO_CONTENT)
}

/// Delete a placement addressed through its map.
#[tracing::instrument(skip(state))]
pub async fn delete_map_placement(
    State(state): State<AppState>,
    Path((map_id, placement_id)): Path<(String, String)>,
) -> ApiResult<StatusCode> {
    find_placement(&state, &placement_id, Some(&map_id))?;
    state.store().delete_placement(&placement_id)?;
    Ok(StatusCode::NO_CONTENT)
}

/// A placement, optionally required to sit on `map_id`.
fn find_placement(state: &AppState, placement_id: &str, map_id: Option<&str>) -> ApiResult<CameraPlacement> {
    state
        .store()
        .get_placement(placement_id)?
        .filter(|p| map_id.map_or(true, |m| p.map_id == m))
        .ok_or_else(|| ApiError::not_found("placement", placement_id))
}

fn apply_placement_update(
    state: &AppState,
    placement_id: &str,
    map_id: Option<&str>,
    request: UpdatePlacementRequest,
) -> ApiResult<CameraPlacement> {
    let mut placement = find_placement(state, placement_id, map_id)?;
    request.apply(&mut placement);
    validate_placement(&placement).map_err(ApiError::bad_request)?;
    Ok(state.store().update_placement(placement)?)
}

// ============================================================================
// Transition Handlers
// ============================================================================

/// List all transitions, in creation order.
#[tracing::instrument(skip(state))]
pub async fn list_transitions(State(state): State<AppState>) -> ApiResult<Json<Vec<CameraTransition>>> {
    Ok(Json(state.store().list_transitions()?))
}

/// Configure a transition between two cameras.
#[tracing::instrument(skip(state))]
pub async fn create_transition(
    State(state): State<AppState>,
    payload: Result<Json<CreateTransitionRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<CameraTransition>)> {
    let Json(request) = payload?;
    let transition = request.into_transition();
    validate_transition(&transition).map_err(ApiError::bad_request)?;
    let transition = state.store().create_transition(transition)?;
    Ok((StatusCode::CREATED, Json(transition)))
}

/// Get a transition by id.
#[tracing::instrument(skip(state))]
pub async fn get_transition(
    State(state): State<AppState>,
    Path(transition_id): Path<String>,
) -> ApiResult<Json<CameraTransition>> {
    let transition = state
        .store()
        .get_transition(&transition_id)?
        .ok_or_else(|| ApiError::not_found("transition", &transition_id))?;
    Ok(Json(transition))
}

/// Update a transition's configuration. Learned statistics are kept.
#[tracing::instrument(skip(state))]
pub async fn update_transition(
    State(state): State<AppState>,
    Path(transition_id): Path<String>,
    payload: Result<Json<UpdateTransitionRequest>, JsonRejection>,
) -> ApiResult<Json<CameraTransition>> {
    let Json(request) = payload?;
    let mut transition = state
        .store()
        .get_transition(&transition_id)?
        .ok_or_else(|| ApiError::not_found("transition", &transition_id))?;
    request.apply(&mut transition);
    validate_transition(&transition).map_err(ApiError::bad_request)?;
    Ok(Json(state.store().update_transition(transition)?))
}

/// Delete a transition.
#[tracing::instrument(skip(state))]
pub async fn delete_transition(
    State(state): State<AppState>,
    Path(transition_id): Path<String>,
) -> ApiResult<StatusCode> {
    state.store().delete_transition(&transition_id)?;
    Ok(StatusCode::NO_CONTENT)
}

/// Infer transitions for the map named in the body.
#[tracing::instrument(skip(state))]
pub async fn auto_detect_transitions(
    State(state): State<AppState>,
    payload: Result<Json<AutoDetectRequest>, JsonRejection>,
) -> ApiResult<Json<Vec<CameraTransition>>> {
    let Json(request) = payload?;
    detect_for_map(&state, request.map_id).await.map(Json)
}

/// Infer transitions for the map in the path.
#[tracing::instrument(skip(state))]
pub async fn auto_detect_transitions_for_map(
    State(state): State<AppState>,
    Path(map_id): Path<String>,
) -> ApiResult<Json<Vec<CameraTransition>>> {
    detect_for_map(&state, map_id).await.map(Json)
}

async fn detect_for_map(state: &AppState, map_id: String) -> ApiResult<Vec<CameraTransition>> {
    if map_id.is_empty() {
        return Err(ApiError::bad_request("map_id is required"));
    }
    if state.store().get_map(&map_id)?.is_none() {
        return Err(ApiError::not_found("map", map_id));
    }
    let store = state.store().clone();
    let detector = state.detector().clone();
    let transitions =
        tokio::task::spawn_blocking(move || store.auto_detect_transitions(&map_id, &detector)).await??;
    Ok(transitions)
}

// ============================================================================
// Track Handlers
// ============================================================================

/// Tracks currently active, in transit or pending, most recent first.
#[tracing::instrument(skip(state))]
pub async fn list_tracks(State(state): State<AppState>) -> Json<Vec<GlobalTrack>> {
    Json(state.manager().list_active_tracks())
}

/// Get a track from memory or durable storage.
#[tracing::instrument(skip(state))]
pub async fn get_track(
    State(state): State<AppState>,
    Path(track_id): Path<String>,
) -> ApiResult<Json<GlobalTrack>> {
    let track = state
        .manager()
        .get_track(&track_id)?
        .ok_or_else(|| ApiError::not_found("track", &track_id))?;
    Ok(Json(track))
}

/// A track projected onto its map as waypoints.
#[tracing::instrument(skip(state))]
pub async fn get_track_path(
    State(state): State<AppState>,
    Path(track_id): Path<String>,
) -> ApiResult<Json<TrackPath>> {
    Ok(Json(state.manager().get_track_path(&track_id)?))
}

// ============================================================================
// Detection Ingestion
// ============================================================================

/// Feed one detection into the track engine.
///
/// Events without a camera or track id are accepted and dropped.
#[tracing::instrument(skip(state, payload))]
pub async fn ingest_detection(
    State(state): State<AppState>,
    payload: Result<Json<DetectionEvent>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<IngestResponse>)> {
    let Json(event) = payload?;
    let global_track_id = state.manager().process_detection(&event);
    Ok((
        StatusCode::ACCEPTED,
        Json(IngestResponse {
            accepted: global_track_id.is_some(),
            global_track_id,
            state: None,
        }),
    ))
}

/// Report a camera-local track leaving the frame.
#[tracing::instrument(skip(state, payload))]
pub async fn ingest_exit(
    State(state): State<AppState>,
    payload: Result<Json<TrackExit>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<IngestResponse>)> {
    let Json(exit) = payload?;
    let track_state = state.manager().handle_track_exit(&exit);
    Ok((
        StatusCode::ACCEPTED,
        Json(IngestResponse {
            accepted: track_state.is_some(),
            global_track_id: None,
            state: track_state,
        }),
    ))
}

// ============================================================================
// Calibration, Diagnostics and Analytics
// ============================================================================

/// Start a guided calibration walk. Nothing is stored.
#[tracing::instrument(skip(state))]
pub async fn start_calibration(
    State(state): State<AppState>,
    Path(camera_id): Path<String>,
) -> Json<CalibrationSession> {
    Json(state.manager().start_calibration(&camera_id))
}

/// Check a camera pair's transition against the placements' geometry.
///
/// # OpenAPI Specification
///
/// ```yaml
/// /api/v1/test-handoff:
///   post:
///     summary: Diagnose a camera handoff
///     tags: [Tools]
///     requestBody:
///       content:
///         application/json:
///           schema:
///             type: object
///             required: [from_camera_id, to_camera_id]
///     responses:
///       200:
///         description: Result with status ok, warning or error
/// ```
#[tracing::instrument(skip(state))]
pub async fn test_handoff(
    State(state): State<AppState>,
    payload: Result<Json<TestHandoffRequest>, JsonRejection>,
) -> ApiResult<Json<HandoffTestResult>> {
    let Json(request) = payload?;
    let result = state
        .manager()
        .test_handoff(&request.from_camera_id, &request.to_camera_id)?;
    Ok(Json(result))
}

/// System-wide track and handoff aggregates.
#[tracing::instrument(skip(state))]
pub async fn get_analytics(State(state): State<AppState>) -> ApiResult<Json<Analytics>> {
    let store = state.store().clone();
    let analytics = tokio::task::spawn_blocking(move || store.analytics(Utc::now())).await??;
    Ok(Json(analytics))
}

/// Liveness plus engine counters. 503 when the store cannot answer.
#[tracing::instrument(skip(state))]
pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let (status, code) = match state.store().ping() {
        Ok(()) => ("healthy", StatusCode::OK),
        Err(err) => {
            tracing::warn!(error = %err, "Health check failed");
            ("unhealthy", StatusCode::SERVICE_UNAVAILABLE)
        }
    };

    let manager = state.manager();
    (
        code,
        Json(HealthResponse {
            status: status.to_string(),
            active_tracks: manager.active_track_count(),
            pending_handoffs: manager.pending_handoff_count(),
            dropped_writes: manager.persistence_stats().dropped_writes,
            version: crate::VERSION.to_string(),
        }),
    )
}
