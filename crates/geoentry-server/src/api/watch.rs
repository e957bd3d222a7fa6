//! Continuous location watch control.

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use geoentry_core::{Accuracy, SamplerStatus, WatchOptions};
use serde::Deserialize;
use utoipa::ToSchema;

use crate::api::error::{ApiError, ApiResult};
use crate::state::SharedState;

/// Creates the watch router.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/", get(get_status))
        .route("/start", post(start))
        .route("/stop", post(stop))
}

/// Overrides for the configured watch options. Send `{}` to use the
/// configured values.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
#[schema(example = json!({ "intervalMs": 5000, "minDistanceMeters": 10.0, "accuracy": "high" }))]
pub struct StartWatchRequest {
    /// Update interval hint in milliseconds.
    pub interval_ms: Option<u64>,
    /// Minimum movement between delivered fixes, in meters.
    pub min_distance_meters: Option<f64>,
    /// Requested accuracy.
    pub accuracy: Option<Accuracy>,
}

impl StartWatchRequest {
    fn apply(&self, base: WatchOptions) -> ApiResult<WatchOptions> {
        let options = WatchOptions {
            interval_ms: self.interval_ms.unwrap_or(base.interval_ms),
            min_distance_meters: self.min_distance_meters.unwrap_or(base.min_distance_meters),
            accuracy: self.accuracy.unwrap_or(base.accuracy),
        };
        if options.interval_ms == 0 {
            return Err(ApiError::bad_request(
                "INVALID_WATCH_OPTIONS",
                "intervalMs must be greater than 0",
            ));
        }
        if !options.min_distance_meters.is_finite() || options.min_distance_meters < 0.0 {
            return Err(ApiError::bad_request(
                "INVALID_WATCH_OPTIONS",
                "minDistanceMeters must be a non-negative number",
            ));
        }
        Ok(options)
    }
}

/// Sampler status.
#[utoipa::path(
    get,
    path = "/api/watch",
    tag = "location",
    operation_id = "getWatchStatus",
    summary = "Get watch status",
    description = "Whether a watch is running, the last processed fix, the last error and \
        when a fix was last received.",
    responses(
        (status = 200, description = "Sampler status", body = SamplerStatus)
    )
)]
pub async fn get_status(State(state): State<SharedState>) -> Json<SamplerStatus> {
    Json(state.sampler().status())
}

/// Start the watch.
#[utoipa::path(
    post,
    path = "/api/watch/start",
    tag = "location",
    operation_id = "startWatch",
    summary = "Start continuous location watch",
    description = "Starts a watch with the configured options, overridden by any fields in the \
        body. Does nothing if a watch is already running or detection is disabled.",
    request_body = StartWatchRequest,
    responses(
        (status = 200, description = "Sampler status after the request", body = SamplerStatus),
        (status = 400, description = "Invalid options", body = crate::api::ErrorResponse),
        (status = 403, description = "Location permission denied", body = crate::api::ErrorResponse),
        (status = 503, description = "Location services disabled", body = crate::api::ErrorResponse)
    )
)]
pub async fn start(
    State(state): State<SharedState>,
    Json(request): Json<StartWatchRequest>,
) -> ApiResult<Json<SamplerStatus>> {
    let options = request.apply(state.sampler().options())?;
    state.sampler().start_watching(options).await?;
    Ok(Json(state.sampler().status()))
}

/// Stop the watch.
#[utoipa::path(
    post,
    path = "/api/watch/stop",
    tag = "location",
    operation_id = "stopWatch",
    summary = "Stop continuous location watch",
    description = "Cancels the watch. Fixes still in flight are dropped. Safe to call when not watching.",
    responses(
        (status = 200, description = "Sampler status after the request", body = SamplerStatus)
    )
)]
pub async fn stop(State(state): State<SharedState>) -> Json<SamplerStatus> {
    state.sampler().stop_watching();
    Json(state.sampler().status())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_request_keeps_base_options() {
        let base = WatchOptions::default();
        assert_eq!(StartWatchRequest::default().apply(base).unwrap(), base);
    }

    #[test]
    fn test_rejects_negative_distance() {
        let request = StartWatchRequest {
            min_distance_meters: Some(-1.0),
            ..StartWatchRequest::default()
        };
        assert!(request.apply(WatchOptions::default()).is_err());
    }
}
