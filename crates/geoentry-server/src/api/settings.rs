//! Proximity settings.
//!
//! Changing `isEnabled` takes effect immediately: disabling stops the watch
//! and freezes detection state, enabling resumes the watch if one was wanted
//! (started through `/api/watch/start` or `[watch] auto_start`) and not
//! stopped since.

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use geoentry_core::{ProximitySettings, ProximitySettingsUpdate};
use tracing::warn;

use crate::api::error::ApiResult;
use crate::state::SharedState;

/// Creates the settings router.
pub fn router() -> Router<SharedState> {
    Router::new().route("/", get(get_settings).patch(update_settings))
}

/// Current settings.
#[utoipa::path(
    get,
    path = "/api/settings",
    tag = "settings",
    operation_id = "getSettings",
    summary = "Get proximity settings",
    responses(
        (status = 200, description = "Current settings", body = ProximitySettings)
    )
)]
pub async fn get_settings(State(state): State<SharedState>) -> Json<ProximitySettings> {
    Json(state.engine().settings())
}

/// Update settings.
#[utoipa::path(
    patch,
    path = "/api/settings",
    tag = "settings",
    operation_id = "updateSettings",
    summary = "Update proximity settings",
    description = "Applies the fields present in the body and persists the result.",
    request_body = ProximitySettingsUpdate,
    responses(
        (status = 200, description = "Updated settings", body = ProximitySettings),
        (status = 500, description = "Settings could not be saved", body = crate::api::ErrorResponse)
    )
)]
pub async fn update_settings(
    State(state): State<SharedState>,
    Json(update): Json<ProximitySettingsUpdate>,
) -> ApiResult<Json<ProximitySettings>> {
    let settings = state.engine().update_settings(update)?;

    if let Err(e) = state.sampler().resync().await {
        warn!(error = %e, "Failed to sync location watch with settings");
    }

    Ok(Json(settings))
}
