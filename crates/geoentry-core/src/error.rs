//! Unified error types for the geoentry core library.
//!
//! This module provides a unified error type [`GeoentryError`] that covers all
//! failure modes across the proximity engine. Each module also has its own
//! specific error type (`LocationError`, `ZoneError`, `ConfigError`,
//! `StorageError`, `MirrorError`) for internal use.
//!
//! Every variant maps to one failure mode and carries a stable error code and
//! HTTP status, so the server can render it without inspecting messages.
//! Location failures additionally carry a [`RecoveryAction`].
//!
//! # Example
//!
//! ```rust
//! use geoentry_core::error::GeoentryError;
//! use uuid::Uuid;
//!
//! let err = GeoentryError::ZoneNotFound(Uuid::nil());
//! assert_eq!(err.http_status_code(), 404);
//! ```

use std::path::PathBuf;

use thiserror::Error;
use uuid::Uuid;

use crate::sampler::RecoveryAction;

/// The unified error type for all geoentry operations.
#[derive(Debug, Error)]
pub enum GeoentryError {
    // =========================================================================
    // LOCATION ERRORS
    // =========================================================================
    /// Foreground location permission was not granted.
    #[error("Location permission denied. Allow location access so geoentry can tell when you are home.")]
    LocationPermissionDenied,

    /// Device location services are switched off.
    #[error("Location services are disabled. Turn them on in system settings.")]
    LocationServiceDisabled,

    /// The platform could not produce a fix.
    #[error("Location unavailable: {0}")]
    LocationUnavailable(String),

    /// No fix arrived before the deadline.
    #[error("Timed out after {timeout_secs} seconds waiting for a location fix")]
    LocationTimeout {
        /// The timeout that elapsed.
        timeout_secs: u64,
    },

    // =========================================================================
    // ZONE ERRORS
    // =========================================================================
    /// No home zone exists with the given id.
    #[error("Home zone not found: {0}")]
    ZoneNotFound(Uuid),

    /// A zone payload failed validation.
    #[error("Invalid home zone: {0}")]
    ZoneValidation(String),

    // =========================================================================
    // CONFIGURATION ERRORS
    // =========================================================================
    /// The configuration file was not found at the expected path.
    #[error("Configuration file not found at: {}", .0.display())]
    ConfigNotFound(PathBuf),

    /// The configuration file exists but could not be parsed.
    #[error("Failed to parse configuration: {0}")]
    ConfigParseError(String),

    /// The configuration was parsed but contains invalid values.
    #[error("Configuration validation failed: {0}")]
    ConfigValidationError(String),

    // =========================================================================
    // PERSISTENCE, I/O & REMOTE ERRORS
    // =========================================================================
    /// An error occurred while persisting or reading data.
    #[error("Persistence error: {0}")]
    PersistenceError(String),

    /// A low-level I/O error occurred.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// The remote event backend failed or is unreachable.
    #[error("Remote event backend error: {0}")]
    MirrorError(String),
}

/// A specialized [`Result`] type for geoentry operations.
pub type Result<T> = std::result::Result<T, GeoentryError>;

impl GeoentryError {
    /// Returns `true` if this error came from location acquisition.
    #[inline]
    #[must_use]
    pub const fn is_location_error(&self) -> bool {
        matches!(
            self,
            Self::LocationPermissionDenied
                | Self::LocationServiceDisabled
                | Self::LocationUnavailable(_)
                | Self::LocationTimeout { .. }
        )
    }

    /// Returns `true` if this error is related to home zones.
    #[inline]
    #[must_use]
    pub const fn is_zone_error(&self) -> bool {
        matches!(self, Self::ZoneNotFound(_) | Self::ZoneValidation(_))
    }

    /// Returns `true` if this error is related to configuration.
    #[inline]
    #[must_use]
    pub const fn is_config_error(&self) -> bool {
        matches!(
            self,
            Self::ConfigNotFound(_) | Self::ConfigParseError(_) | Self::ConfigValidationError(_)
        )
    }

    /// Returns `true` if this error is related to I/O or persistence.
    #[inline]
    #[must_use]
    pub const fn is_io_error(&self) -> bool {
        matches!(self, Self::PersistenceError(_) | Self::IoError(_))
    }

    /// Returns `true` if this error is likely recoverable without user intervention.
    #[inline]
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::LocationUnavailable(_) | Self::LocationTimeout { .. } | Self::MirrorError(_)
        )
    }

    /// The user action that resolves a location error.
    #[must_use]
    pub const fn recovery_action(&self) -> Option<RecoveryAction> {
        match self {
            Self::LocationPermissionDenied => Some(RecoveryAction::RequestPermission),
            Self::LocationServiceDisabled => Some(RecoveryAction::OpenSettings),
            Self::LocationUnavailable(_) | Self::LocationTimeout { .. } => {
                Some(RecoveryAction::Retry)
            }
            _ => None,
        }
    }

    /// Returns an HTTP-appropriate status code for this error.
    #[inline]
    #[must_use]
    pub const fn http_status_code(&self) -> u16 {
        match self {
            // 400 Bad Request - malformed input
            Self::ZoneValidation(_) => 400,

            // 403 Forbidden - the user refused access
            Self::LocationPermissionDenied => 403,

            // 404 Not Found
            Self::ZoneNotFound(_) | Self::ConfigNotFound(_) => 404,

            // 422 Unprocessable Entity - semantic errors
            Self::ConfigParseError(_) | Self::ConfigValidationError(_) => 422,

            // 500 Internal Server Error - server-side issues
            Self::PersistenceError(_) | Self::IoError(_) => 500,

            // 502 Bad Gateway - remote backend failed
            Self::MirrorError(_) => 502,

            // 503 Service Unavailable - no location source
            Self::LocationServiceDisabled | Self::LocationUnavailable(_) => 503,

            // 504 Gateway Timeout - no fix in time
            Self::LocationTimeout { .. } => 504,
        }
    }

    /// Returns a machine-readable error code for API responses.
    #[inline]
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::LocationPermissionDenied => "LOCATION_PERMISSION_DENIED",
            Self::LocationServiceDisabled => "LOCATION_SERVICE_DISABLED",
            Self::LocationUnavailable(_) => "LOCATION_UNAVAILABLE",
            Self::LocationTimeout { .. } => "LOCATION_TIMEOUT",
            Self::ZoneNotFound(_) => "ZONE_NOT_FOUND",
            Self::ZoneValidation(_) => "ZONE_VALIDATION_ERROR",
            Self::ConfigNotFound(_) => "CONFIG_NOT_FOUND",
            Self::ConfigParseError(_) => "CONFIG_PARSE_ERROR",
            Self::ConfigValidationError(_) => "CONFIG_VALIDATION_ERROR",
            Self::PersistenceError(_) => "PERSISTENCE_ERROR",
            Self::IoError(_) => "IO_ERROR",
            Self::MirrorError(_) => "MIRROR_ERROR",
        }
    }
}

// =============================================================================
// CONVERSIONS FROM MODULE-SPECIFIC ERRORS
// =============================================================================

impl From<crate::sampler::LocationError> for GeoentryError {
    fn from(err: crate::sampler::LocationError) -> Self {
        use crate::sampler::LocationError;
        match err {
            LocationError::PermissionDenied => Self::LocationPermissionDenied,
            LocationError::ServiceDisabled => Self::LocationServiceDisabled,
            LocationError::Unavailable { message } => Self::LocationUnavailable(message),
            LocationError::Timeout { timeout_secs } => Self::LocationTimeout { timeout_secs },
        }
    }
}

impl From<crate::zone::ZoneError> for GeoentryError {
    fn from(err: crate::zone::ZoneError) -> Self {
        use crate::zone::ZoneError;
        match err {
            ZoneError::NotFound(id) => Self::ZoneNotFound(id),
            ZoneError::Storage(e) => e.into(),
            e @ (ZoneError::EmptyName
            | ZoneError::NameTooLong { .. }
            | ZoneError::InvalidCoordinates { .. }
            | ZoneError::InvalidRadius(_)) => Self::ZoneValidation(e.to_string()),
        }
    }
}

impl From<crate::storage::StorageError> for GeoentryError {
    fn from(err: crate::storage::StorageError) -> Self {
        Self::PersistenceError(err.to_string())
    }
}

impl From<crate::config::ConfigError> for GeoentryError {
    fn from(err: crate::config::ConfigError) -> Self {
        use crate::config::ConfigError;
        match err {
            ConfigError::NotFound(path) => Self::ConfigNotFound(path),
            ConfigError::WriteError { path, source } => {
                Self::PersistenceError(format!("Failed to write {}: {}", path.display(), source))
            }
            ConfigError::Load(e) => Self::ConfigParseError(e.to_string()),
            ConfigError::SerializeError(e) => Self::ConfigParseError(e.to_string()),
            ConfigError::ValidationError { field, message } => {
                Self::ConfigValidationError(format!("{field}: {message}"))
            }
            ConfigError::MultipleValidationErrors(errors) => {
                let messages: Vec<String> = errors.into_iter().map(|e| e.to_string()).collect();
                Self::ConfigValidationError(messages.join("; "))
            }
        }
    }
}

impl From<crate::mirror::MirrorError> for GeoentryError {
    fn from(err: crate::mirror::MirrorError) -> Self {
        Self::MirrorError(err.to_string())
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigError;
    use crate::sampler::LocationError;
    use crate::zone::ZoneError;
    use std::io::{Error as IoErr, ErrorKind};

    #[test]
    fn test_location_error_classification() {
        assert!(GeoentryError::LocationPermissionDenied.is_location_error());
        assert!(GeoentryError::LocationServiceDisabled.is_location_error());
        assert!(GeoentryError::LocationUnavailable("no fix".into()).is_location_error());
        assert!(GeoentryError::LocationTimeout { timeout_secs: 15 }.is_location_error());

        assert!(!GeoentryError::ZoneNotFound(Uuid::nil()).is_location_error());
    }

    #[test]
    fn test_zone_and_config_classification() {
        assert!(GeoentryError::ZoneNotFound(Uuid::nil()).is_zone_error());
        assert!(GeoentryError::ZoneValidation("bad".into()).is_zone_error());
        assert!(GeoentryError::ConfigNotFound(PathBuf::from("/test")).is_config_error());
        assert!(GeoentryError::ConfigValidationError("x".into()).is_config_error());

        assert!(!GeoentryError::LocationPermissionDenied.is_config_error());
    }

    #[test]
    fn test_recoverable_errors() {
        assert!(GeoentryError::LocationTimeout { timeout_secs: 15 }.is_recoverable());
        assert!(GeoentryError::MirrorError("down".into()).is_recoverable());
        assert!(!GeoentryError::LocationPermissionDenied.is_recoverable());
    }

    #[test]
    fn test_recovery_actions() {
        assert_eq!(
            GeoentryError::LocationPermissionDenied.recovery_action(),
            Some(RecoveryAction::RequestPermission)
        );
        assert_eq!(
            GeoentryError::LocationServiceDisabled.recovery_action(),
            Some(RecoveryAction::OpenSettings)
        );
        assert_eq!(GeoentryError::ZoneNotFound(Uuid::nil()).recovery_action(), None);
    }

    #[test]
    fn test_http_status_codes() {
        assert_eq!(GeoentryError::ZoneValidation("bad".into()).http_status_code(), 400);
        assert_eq!(GeoentryError::LocationPermissionDenied.http_status_code(), 403);
        assert_eq!(GeoentryError::ZoneNotFound(Uuid::nil()).http_status_code(), 404);
        assert_eq!(GeoentryError::ConfigParseError("e".into()).http_status_code(), 422);
        assert_eq!(GeoentryError::PersistenceError("e".into()).http_status_code(), 500);
        assert_eq!(GeoentryError::MirrorError("e".into()).http_status_code(), 502);
        assert_eq!(GeoentryError::LocationServiceDisabled.http_status_code(), 503);
        assert_eq!(
            GeoentryError::LocationTimeout { timeout_secs: 1 }.http_status_code(),
            504
        );
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(
            GeoentryError::LocationPermissionDenied.error_code(),
            "LOCATION_PERMISSION_DENIED"
        );
        assert_eq!(GeoentryError::ZoneNotFound(Uuid::nil()).error_code(), "ZONE_NOT_FOUND");
        assert_eq!(GeoentryError::MirrorError("x".into()).error_code(), "MIRROR_ERROR");
    }

    #[test]
    fn test_from_location_error() {
        let err: GeoentryError = LocationError::Timeout { timeout_secs: 15 }.into();
        assert!(matches!(err, GeoentryError::LocationTimeout { timeout_secs: 15 }));

        let err: GeoentryError = LocationError::Unavailable {
            message: "gps off".into(),
        }
        .into();
        assert!(err.to_string().contains("gps off"));
    }

    #[test]
    fn test_from_zone_error() {
        let id = Uuid::now_v7();
        assert!(matches!(
            GeoentryError::from(ZoneError::NotFound(id)),
            GeoentryError::ZoneNotFound(found) if found == id
        ));
        assert!(matches!(
            GeoentryError::from(ZoneError::EmptyName),
            GeoentryError::ZoneValidation(_)
        ));
    }

    #[test]
    fn test_from_config_error() {
        let err: GeoentryError = ConfigError::MultipleValidationErrors(vec![
            ConfigError::ValidationError {
                field: "watch.interval_ms".into(),
                message: "must be greater than 0".into(),
            },
            ConfigError::ValidationError {
                field: "server.bind_address".into(),
                message: "bad".into(),
            },
        ])
        .into();
        assert!(err.is_config_error());
        assert!(err.to_string().contains("watch.interval_ms"));
        assert!(err.to_string().contains("server.bind_address"));
    }

    #[test]
    fn test_from_io_error() {
        let io_err = IoErr::new(ErrorKind::NotFound, "file not found");
        let err: GeoentryError = io_err.into();
        assert!(matches!(err, GeoentryError::IoError(_)));
        assert!(err.is_io_error());
    }

    #[test]
    fn test_error_is_send_and_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}

        assert_send::<GeoentryError>();
        assert_sync::<GeoentryError>();
    }
}
