//! Transition history.

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use geoentry_core::{HistoryEntry, HistoryStats, RemoteEvent};
use serde::Deserialize;
use utoipa::IntoParams;
use uuid::Uuid;

use crate::api::error::{ApiError, ApiResult};
use crate::state::SharedState;

/// Creates the history router.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/", get(list_history).delete(clear_history))
        .route("/stats", get(get_stats))
        .route("/remote", get(list_remote))
}

/// Query parameters for the history list.
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct HistoryQuery {
    /// Only entries for this zone.
    pub zone_id: Option<Uuid>,
    /// At most this many entries.
    pub limit: Option<usize>,
}

/// List history, newest first.
#[utoipa::path(
    get,
    path = "/api/history",
    tag = "history",
    operation_id = "listHistory",
    summary = "List enter/exit history",
    description = "Newest first. At most 100 entries are kept; older ones are dropped.",
    params(HistoryQuery),
    responses(
        (status = 200, description = "History entries", body = Vec<HistoryEntry>)
    )
)]
pub async fn list_history(
    State(state): State<SharedState>,
    Query(query): Query<HistoryQuery>,
) -> Json<Vec<HistoryEntry>> {
    let mut entries = match query.zone_id {
        Some(zone_id) => state.engine().history_for_zone(zone_id).await,
        None => state.engine().history().await,
    };
    if let Some(limit) = query.limit {
        entries.truncate(limit);
    }
    Json(entries)
}

/// Clear history.
#[utoipa::path(
    delete,
    path = "/api/history",
    tag = "history",
    operation_id = "clearHistory",
    summary = "Clear history",
    responses(
        (status = 204, description = "History cleared")
    )
)]
pub async fn clear_history(State(state): State<SharedState>) -> StatusCode {
    state.engine().clear_history().await;
    StatusCode::NO_CONTENT
}

/// History counts.
#[utoipa::path(
    get,
    path = "/api/history/stats",
    tag = "history",
    operation_id = "getHistoryStats",
    summary = "Get history counts",
    description = "Total, enter and exit counts, and the number of entries recorded today (UTC).",
    responses(
        (status = 200, description = "History counts", body = HistoryStats)
    )
)]
pub async fn get_stats(State(state): State<SharedState>) -> Json<HistoryStats> {
    Json(state.engine().history_stats().await)
}

/// Events stored on the remote backend.
#[utoipa::path(
    get,
    path = "/api/history/remote",
    tag = "history",
    operation_id = "listRemoteEvents",
    summary = "List events from the remote backend",
    responses(
        (status = 200, description = "Remote events", body = Vec<RemoteEvent>),
        (status = 404, description = "No remote backend configured", body = crate::api::ErrorResponse),
        (status = 502, description = "Remote backend failed", body = crate::api::ErrorResponse)
    )
)]
pub async fn list_remote(State(state): State<SharedState>) -> ApiResult<Json<Vec<RemoteEvent>>> {
    let mirror = state.engine().mirror().ok_or_else(|| ApiError::NotFound {
        error_code: "MIRROR_NOT_CONFIGURED".to_string(),
        message: "No remote event backend is configured".to_string(),
    })?;
    let events = mirror
        .fetch_events()
        .await
        .map_err(geoentry_core::GeoentryError::from)?;
    Ok(Json(events))
}
