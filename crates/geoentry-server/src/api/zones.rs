//! Home zone management.
//!
//! Zones are listed in creation order. Deleting a zone also deletes its
//! history entries.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use geoentry_core::{HomeZone, HomeZoneUpdate, NewHomeZone, RADIUS_OPTIONS};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::api::error::ApiResult;
use crate::state::SharedState;

/// Creates the zones router.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/", get(list_zones).post(create_zone))
        .route("/radius-options", get(radius_options))
        .route(
            "/{id}",
            get(get_zone).patch(update_zone).delete(delete_zone),
        )
}

/// Radius presets offered when creating a zone.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
#[schema(example = json!({ "radiusOptions": [50.0, 100.0, 200.0, 500.0, 1000.0] }))]
pub struct RadiusOptionsResponse {
    /// Suggested radii in meters.
    pub radius_options: Vec<f64>,
}

/// List zones.
#[utoipa::path(
    get,
    path = "/api/zones",
    tag = "zones",
    operation_id = "listZones",
    summary = "List home zones",
    responses(
        (status = 200, description = "All zones in creation order", body = Vec<HomeZone>)
    )
)]
pub async fn list_zones(State(state): State<SharedState>) -> ApiResult<Json<Vec<HomeZone>>> {
    Ok(Json(state.engine().zones()?))
}

/// Create a zone.
#[utoipa::path(
    post,
    path = "/api/zones",
    tag = "zones",
    operation_id = "createZone",
    summary = "Create a home zone",
    description = "Name must be 1-100 characters after trimming, coordinates in range and the \
        radius positive. The server assigns the id and creation time.",
    request_body = NewHomeZone,
    responses(
        (status = 201, description = "Zone created", body = HomeZone),
        (status = 400, description = "Invalid zone", body = crate::api::ErrorResponse)
    )
)]
pub async fn create_zone(
    State(state): State<SharedState>,
    Json(zone): Json<NewHomeZone>,
) -> ApiResult<(StatusCode, Json<HomeZone>)> {
    let zone = state.engine().create_zone(zone)?;
    Ok((StatusCode::CREATED, Json(zone)))
}

/// Suggested radii.
#[utoipa::path(
    get,
    path = "/api/zones/radius-options",
    tag = "zones",
    operation_id = "getRadiusOptions",
    summary = "Get suggested zone radii",
    responses(
        (status = 200, description = "Suggested radii", body = RadiusOptionsResponse)
    )
)]
pub async fn radius_options() -> Json<RadiusOptionsResponse> {
    Json(RadiusOptionsResponse {
        radius_options: RADIUS_OPTIONS.to_vec(),
    })
}

/// Get one zone.
#[utoipa::path(
    get,
    path = "/api/zones/{id}",
    tag = "zones",
    operation_id = "getZone",
    summary = "Get a home zone",
    params(("id" = Uuid, Path, description = "Zone id")),
    responses(
        (status = 200, description = "The zone", body = HomeZone),
        (status = 404, description = "No such zone", body = crate::api::ErrorResponse)
    )
)]
pub async fn get_zone(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<HomeZone>> {
    Ok(Json(state.engine().zone(id)?))
}

/// Update a zone.
#[utoipa::path(
    patch,
    path = "/api/zones/{id}",
    tag = "zones",
    operation_id = "updateZone",
    summary = "Update a home zone",
    description = "Applies the fields present in the body. The result is validated as a whole.",
    params(("id" = Uuid, Path, description = "Zone id")),
    request_body = HomeZoneUpdate,
    responses(
        (status = 200, description = "Updated zone", body = HomeZone),
        (status = 400, description = "Invalid zone", body = crate::api::ErrorResponse),
        (status = 404, description = "No such zone", body = crate::api::ErrorResponse)
    )
)]
pub async fn update_zone(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Json(update): Json<HomeZoneUpdate>,
) -> ApiResult<Json<HomeZone>> {
    Ok(Json(state.engine().update_zone(id, update)?))
}

/// Delete a zone and its history.
#[utoipa::path(
    delete,
    path = "/api/zones/{id}",
    tag = "zones",
    operation_id = "deleteZone",
    summary = "Delete a home zone",
    description = "Removes the zone and every history entry that refers to it.",
    params(("id" = Uuid, Path, description = "Zone id")),
    responses(
        (status = 200, description = "The deleted zone", body = HomeZone),
        (status = 404, description = "No such zone", body = crate::api::ErrorResponse)
    )
)]
pub async fn delete_zone(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<HomeZone>> {
    Ok(Json(state.engine().delete_zone(id).await?))
}
