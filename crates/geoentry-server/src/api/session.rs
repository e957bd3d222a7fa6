//! "Near home" prompt for the current episode.
//!
//! The UI polls for a prompt while it is in the foreground. A prompt is
//! returned at most once per near episode; acknowledging it closes the
//! prompt and marks the episode as handled until the user leaves.

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use geoentry_core::{DetectionState, NotificationPrompt};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::state::SharedState;

/// Creates the session router.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/prompt", get(get_prompt))
        .route("/notified", post(acknowledge))
}

/// Prompt to show, if any.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PromptResponse {
    /// Present when the prompt should be shown now.
    pub prompt: Option<NotificationPrompt>,
}

/// Poll for the prompt.
#[utoipa::path(
    get,
    path = "/api/session/prompt",
    tag = "session",
    operation_id = "getPrompt",
    summary = "Poll for the near-home prompt",
    description = "Returns a prompt when the user is near home, notifications are enabled, the \
        prompt has not been handled this episode and none is currently shown. Returning a prompt \
        marks it as shown.",
    responses(
        (status = 200, description = "Prompt, or null", body = PromptResponse)
    )
)]
pub async fn get_prompt(State(state): State<SharedState>) -> Json<PromptResponse> {
    let snapshot = state.engine().snapshot().await;
    let settings = state.engine().settings();
    let prompt = state.gate().poll(&snapshot, &settings);
    Json(PromptResponse { prompt })
}

/// Acknowledge the prompt.
#[utoipa::path(
    post,
    path = "/api/session/notified",
    tag = "session",
    operation_id = "acknowledgePrompt",
    summary = "Close the near-home prompt",
    description = "Closes the prompt and suppresses it until the user leaves home and returns.",
    responses(
        (status = 200, description = "Detection state after acknowledging", body = DetectionState)
    )
)]
pub async fn acknowledge(State(state): State<SharedState>) -> Json<DetectionState> {
    state.gate().dismiss();
    state.engine().mark_session_notified().await;
    Json(state.engine().snapshot().await)
}
