//! Device-control presence gate.

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use geoentry_core::PresenceStatus;

use crate::state::SharedState;

/// Creates the presence router.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/", get(get_presence))
        .route("/refresh", post(refresh_presence))
}

/// Latest presence status.
#[utoipa::path(
    get,
    path = "/api/presence",
    tag = "presence",
    operation_id = "getPresence",
    summary = "Get presence status",
    description = "Device controls are enabled while `isAtHome` is true, that is while the most \
        recent event is an enter. Re-evaluated in the background on a fixed interval.",
    responses(
        (status = 200, description = "Presence status", body = PresenceStatus)
    )
)]
pub async fn get_presence(State(state): State<SharedState>) -> Json<PresenceStatus> {
    Json(state.presence().status())
}

/// Re-evaluate presence now.
#[utoipa::path(
    post,
    path = "/api/presence/refresh",
    tag = "presence",
    operation_id = "refreshPresence",
    summary = "Re-evaluate presence",
    description = "A failed fetch keeps the previous status and reports the error in `error`.",
    responses(
        (status = 200, description = "Presence status", body = PresenceStatus)
    )
)]
pub async fn refresh_presence(State(state): State<SharedState>) -> Json<PresenceStatus> {
    Json(state.presence().refresh().await)
}
