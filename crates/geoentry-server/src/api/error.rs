//! API error types and response handling.
//!
//! Every handler returns [`ApiResult`]; core errors convert into [`ApiError`]
//! and render as a JSON [`ErrorResponse`].

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use geoentry_core::{GeoentryError, RecoveryAction};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Result type alias for API handlers.
pub type ApiResult<T> = Result<T, ApiError>;

/// Unified API error type.
#[derive(Debug, Clone)]
pub enum ApiError {
    /// 400 Bad Request - invalid input from the client.
    BadRequest {
        /// Machine-readable error code.
        error_code: String,
        /// Human-readable error message.
        message: String,
    },

    /// 404 Not Found - the resource does not exist.
    NotFound {
        /// Machine-readable error code.
        error_code: String,
        /// Human-readable error message.
        message: String,
    },

    /// 403, 503 or 504 - no location fix could be obtained.
    Location {
        /// Status chosen by the underlying error.
        status: StatusCode,
        /// Machine-readable error code.
        error_code: String,
        /// Human-readable error message.
        message: String,
        /// What the user can do about it.
        recovery_action: Option<RecoveryAction>,
    },

    /// 502 Bad Gateway - the remote event backend failed.
    BadGateway {
        /// Machine-readable error code.
        error_code: String,
        /// Human-readable error message.
        message: String,
    },

    /// 500 Internal Server Error - unexpected server-side error.
    InternalError {
        /// Machine-readable error code.
        error_code: String,
        /// Human-readable error message.
        message: String,
        /// Optional details.
        details: Option<String>,
    },
}

/// Standard JSON error response body.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "error": "ZONE_NOT_FOUND",
    "message": "Home zone not found: 0192f4d2-5c1e-7b8a-9c3d-4e5f6a7b8c9d",
    "details": null
}))]
pub struct ErrorResponse {
    /// Machine-readable error code.
    #[schema(example = "ZONE_NOT_FOUND")]
    pub error: String,

    /// Human-readable error message.
    pub message: String,

    /// Optional additional details.
    #[schema(nullable)]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    /// HTTP status this error renders with.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest { .. } => StatusCode::BAD_REQUEST,
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::Location { status, .. } => *status,
            Self::BadGateway { .. } => StatusCode::BAD_GATEWAY,
            Self::InternalError { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Shorthand for a 400 response.
    pub fn bad_request(error_code: &str, message: impl Into<String>) -> Self {
        Self::BadRequest {
            error_code: error_code.to_string(),
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match self {
            Self::BadRequest { error_code, message }
            | Self::NotFound { error_code, message }
            | Self::BadGateway { error_code, message } => ErrorResponse {
                error: error_code,
                message,
                details: None,
            },

            Self::Location {
                error_code,
                message,
                recovery_action,
                ..
            } => ErrorResponse {
                error: error_code,
                message,
                details: recovery_action
                    .map(|action| serde_json::json!({ "recoveryAction": action })),
            },

            Self::InternalError {
                error_code,
                message,
                details,
            } => {
                tracing::error!(
                    error_code = %error_code,
                    message = %message,
                    details = ?details,
                    "Internal server error"
                );
                ErrorResponse {
                    error: error_code,
                    message,
                    details: details.map(serde_json::Value::String),
                }
            }
        };

        (status, Json(body)).into_response()
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BadRequest { message, .. } => write!(f, "Bad Request: {message}"),
            Self::NotFound { message, .. } => write!(f, "Not Found: {message}"),
            Self::Location { message, .. } => write!(f, "Location Error: {message}"),
            Self::BadGateway { message, .. } => write!(f, "Bad Gateway: {message}"),
            Self::InternalError { message, .. } => write!(f, "Internal Error: {message}"),
        }
    }
}

impl std::error::Error for ApiError {}

impl From<GeoentryError> for ApiError {
    fn from(err: GeoentryError) -> Self {
        let error_code = err.error_code().to_string();
        let message = err.to_string();

        if err.is_location_error() {
            return Self::Location {
                status: StatusCode::from_u16(err.http_status_code())
                    .unwrap_or(StatusCode::SERVICE_UNAVAILABLE),
                error_code,
                message,
                recovery_action: err.recovery_action(),
            };
        }

        match err {
            GeoentryError::ZoneValidation(_) => Self::BadRequest { error_code, message },
            GeoentryError::ZoneNotFound(_) => Self::NotFound { error_code, message },
            GeoentryError::MirrorError(_) => Self::BadGateway { error_code, message },
            _ => Self::InternalError {
                error_code,
                message,
                details: None,
            },
        }
    }
}
