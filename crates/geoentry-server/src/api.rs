//! HTTP API routes and handlers.
//!
//! Endpoints are grouped by domain:
//! - `health` - Service health check
//! - `proximity` - Detection state and what-if checks
//! - `location` - Device fixes and platform switches
//! - `watch` - Continuous watch control
//! - `session` - Near-home prompt gating
//! - `zones` - Home zone CRUD
//! - `history` - Transition history
//! - `settings` - Proximity settings
//! - `presence` - Device-control presence gate
//! - `error` - API error types
//! - `openapi` - OpenAPI specification

use axum::routing::get;
use axum::Router;

use crate::state::SharedState;

pub mod error;
pub mod health;
pub mod history;
pub mod location;
pub mod openapi;
pub mod presence;
pub mod proximity;
pub mod session;
pub mod settings;
pub mod watch;
pub mod zones;

pub use error::{ApiError, ApiResult, ErrorResponse};
pub use openapi::get_openapi_json;

/// Creates the combined API router.
///
/// # Route Structure
///
/// ```text
/// /health                 - Health check
/// /api
/// ├── /proximity          - Detection state, what-if check, distance
/// ├── /location           - Report a fix, refresh, permission, services
/// ├── /watch              - Watch status, start, stop
/// ├── /session            - Prompt poll and acknowledge
/// ├── /zones              - Home zone CRUD
/// ├── /history            - List, clear, stats, remote events
/// ├── /settings           - Get and patch settings
/// ├── /presence           - Presence status and refresh
/// └── /openapi.json       - OpenAPI specification
/// ```
pub fn create_router(state: SharedState) -> Router {
    Router::new()
        .nest("/health", health::router())
        .nest(
            "/api",
            Router::new()
                .route("/openapi.json", get(openapi::get_openapi_spec))
                .nest("/proximity", proximity::router())
                .nest("/location", location::router())
                .nest("/watch", watch::router())
                .nest("/session", session::router())
                .nest("/zones", zones::router())
                .nest("/history", history::router())
                .nest("/settings", settings::router())
                .nest("/presence", presence::router()),
        )
        .with_state(state)
}
