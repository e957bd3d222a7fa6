//! Proximity state and what-if checks.
//!
//! `GET /api/proximity` is the UI's view of the detector. The check and
//! distance endpoints are pure: they never touch detection state.

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use geoentry_core::{distance, format_distance, Coordinates, DetectionState, ProximityCheck};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::api::error::{ApiError, ApiResult};
use crate::state::SharedState;

/// Creates the proximity router.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/", get(get_state))
        .route("/check", post(check))
        .route("/distance", post(measure))
}

// ============================================================================
// Request/Response Types
// ============================================================================

/// Two points to measure between.
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[schema(example = json!({
    "from": { "latitude": 0.0, "longitude": 0.0 },
    "to": { "latitude": 0.0, "longitude": 1.0 }
}))]
pub struct DistanceRequest {
    /// Start point.
    pub from: Coordinates,
    /// End point.
    pub to: Coordinates,
}

/// Great-circle distance between two points.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
#[schema(example = json!({ "distanceMeters": 111195.08, "distanceText": "111.2km" }))]
pub struct DistanceResponse {
    /// Distance in meters.
    pub distance_meters: f64,
    /// Distance formatted for display.
    pub distance_text: String,
}

pub(crate) fn validate_coordinates(coordinates: Coordinates) -> ApiResult<()> {
    if coordinates.is_valid() {
        Ok(())
    } else {
        Err(ApiError::bad_request(
            "INVALID_COORDINATES",
            format!(
                "Coordinates out of range: ({}, {})",
                coordinates.latitude, coordinates.longitude
            ),
        ))
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// Current detection state.
#[utoipa::path(
    get,
    path = "/api/proximity",
    tag = "proximity",
    operation_id = "getProximityState",
    summary = "Get detection state",
    description = "Returns whether the user is near home, the distance to and identity of the \
        nearest active zone, when the last transition happened, and whether the prompt for the \
        current near episode was already handled.",
    responses(
        (status = 200, description = "Current detection state", body = DetectionState)
    )
)]
pub async fn get_state(State(state): State<SharedState>) -> Json<DetectionState> {
    Json(state.engine().snapshot().await)
}

/// Evaluate a position against the stored zones.
#[utoipa::path(
    post,
    path = "/api/proximity/check",
    tag = "proximity",
    operation_id = "checkProximity",
    summary = "Check a position against home zones",
    description = "Finds the nearest active zone and whether the position is inside it. \
        Detection state is not changed.",
    request_body = Coordinates,
    responses(
        (status = 200, description = "Proximity of the position", body = ProximityCheck),
        (status = 400, description = "Coordinates out of range", body = crate::api::ErrorResponse)
    )
)]
pub async fn check(
    State(state): State<SharedState>,
    Json(position): Json<Coordinates>,
) -> ApiResult<Json<ProximityCheck>> {
    validate_coordinates(position)?;
    Ok(Json(state.engine().check(position)?))
}

/// Distance between two points.
#[utoipa::path(
    post,
    path = "/api/proximity/distance",
    tag = "proximity",
    operation_id = "measureDistance",
    summary = "Measure great-circle distance",
    request_body = DistanceRequest,
    responses(
        (status = 200, description = "Distance between the points", body = DistanceResponse),
        (status = 400, description = "Coordinates out of range", body = crate::api::ErrorResponse)
    )
)]
pub async fn measure(Json(request): Json<DistanceRequest>) -> ApiResult<Json<DistanceResponse>> {
    validate_coordinates(request.from)?;
    validate_coordinates(request.to)?;
    let meters = distance(request.from, request.to);
    Ok(Json(DistanceResponse {
        distance_meters: meters,
        distance_text: format_distance(meters),
    }))
}
