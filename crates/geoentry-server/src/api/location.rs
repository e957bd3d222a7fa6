//! Device position reports and platform controls.
//!
//! The device app reports fixes here; they feed the running watch. The
//! permission and services switches mirror the device's own settings so the
//! sampler can surface the matching errors.

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{post, put};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use geoentry_core::{Coordinates, DetectionState, PermissionStatus, Position};
use serde::{Deserialize, Serialize};
use tracing::debug;
use utoipa::ToSchema;

use crate::api::error::ApiResult;
use crate::api::proximity::validate_coordinates;
use crate::state::SharedState;

/// Creates the location router.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/", post(report_location))
        .route("/refresh", post(refresh))
        .route("/permission", put(set_permission))
        .route("/services", put(set_services))
}

// ============================================================================
// Request/Response Types
// ============================================================================

/// A fix reported by the device.
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
#[schema(example = json!({
    "latitude": 40.0001,
    "longitude": -74.0,
    "accuracyMeters": 8.5
}))]
pub struct LocationReport {
    /// Latitude in degrees.
    pub latitude: f64,
    /// Longitude in degrees.
    pub longitude: f64,
    /// Horizontal accuracy radius in meters.
    #[serde(default)]
    pub accuracy_meters: Option<f64>,
    /// When the fix was taken. Defaults to now.
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

/// Outcome of a reported fix.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LocationReportResponse {
    /// The stored fix.
    pub position: Position,
    /// Number of watch subscriptions the fix was delivered to.
    pub delivered: usize,
}

/// Result of a one-shot refresh.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RefreshResponse {
    /// The fix that was evaluated.
    pub coordinates: Coordinates,
    /// Detection state after the fix.
    pub state: DetectionState,
}

/// New permission state.
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[schema(example = json!({ "status": "granted" }))]
pub struct PermissionRequest {
    /// Permission state on the device.
    pub status: PermissionStatus,
}

/// New location services switch.
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[schema(example = json!({ "enabled": true }))]
pub struct ServicesRequest {
    /// Whether location services are on.
    pub enabled: bool,
}

// ============================================================================
// Handlers
// ============================================================================

/// Report a device fix.
#[utoipa::path(
    post,
    path = "/api/location",
    tag = "location",
    operation_id = "reportLocation",
    summary = "Report a device position",
    description = "Stores the fix as the latest known position and delivers it to the running \
        watch, subject to its minimum-distance filter. Fixes are processed in arrival order.",
    request_body = LocationReport,
    responses(
        (status = 202, description = "Fix accepted", body = LocationReportResponse),
        (status = 400, description = "Coordinates out of range", body = crate::api::ErrorResponse)
    )
)]
pub async fn report_location(
    State(state): State<SharedState>,
    Json(report): Json<LocationReport>,
) -> ApiResult<(StatusCode, Json<LocationReportResponse>)> {
    let coordinates = Coordinates::new(report.latitude, report.longitude);
    validate_coordinates(coordinates)?;

    let position = Position {
        coordinates,
        accuracy_meters: report.accuracy_meters,
        timestamp: report.timestamp.unwrap_or_else(Utc::now),
    };
    let delivered = state.platform().push(position);
    debug!(delivered, "Location report accepted");

    Ok((
        StatusCode::ACCEPTED,
        Json(LocationReportResponse {
            position,
            delivered,
        }),
    ))
}

/// Acquire one fix and run it through detection.
#[utoipa::path(
    post,
    path = "/api/location/refresh",
    tag = "location",
    operation_id = "refreshLocation",
    summary = "Force a proximity check",
    description = "Requests a single fix with the configured timeout and feeds it to the detector. \
        Location failures carry a recovery action and leave detection state unchanged.",
    responses(
        (status = 200, description = "Fix evaluated", body = RefreshResponse),
        (status = 403, description = "Location permission denied", body = crate::api::ErrorResponse),
        (status = 503, description = "Location services disabled or unavailable", body = crate::api::ErrorResponse),
        (status = 504, description = "No fix before the timeout", body = crate::api::ErrorResponse)
    )
)]
pub async fn refresh(State(state): State<SharedState>) -> ApiResult<Json<RefreshResponse>> {
    let coordinates = state.sampler().force_proximity_check().await?;
    Ok(Json(RefreshResponse {
        coordinates,
        state: state.engine().snapshot().await,
    }))
}

/// Set the device's location permission state.
#[utoipa::path(
    put,
    path = "/api/location/permission",
    tag = "location",
    operation_id = "setLocationPermission",
    summary = "Set location permission",
    request_body = PermissionRequest,
    responses(
        (status = 204, description = "Permission updated")
    )
)]
pub async fn set_permission(
    State(state): State<SharedState>,
    Json(request): Json<PermissionRequest>,
) -> StatusCode {
    state.platform().set_permission(request.status);
    StatusCode::NO_CONTENT
}

/// Switch device location services on or off.
#[utoipa::path(
    put,
    path = "/api/location/services",
    tag = "location",
    operation_id = "setLocationServices",
    summary = "Set location services",
    request_body = ServicesRequest,
    responses(
        (status = 204, description = "Services switch updated")
    )
)]
pub async fn set_services(
    State(state): State<SharedState>,
    Json(request): Json<ServicesRequest>,
) -> StatusCode {
    state.platform().set_services_enabled(request.enabled);
    StatusCode::NO_CONTENT
}
