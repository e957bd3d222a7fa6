//! Contract between the sampler and the device location provider.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;
use utoipa::ToSchema;

use crate::geo::Coordinates;

/// Requested fix accuracy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Accuracy {
    /// Coarse, lowest power.
    Low,
    /// City-block level.
    Balanced,
    /// GPS-level.
    High,
    /// Highest available, for navigation.
    #[default]
    BestForNavigation,
}

/// Foreground location permission state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum PermissionStatus {
    /// Location access is allowed.
    Granted,
    /// The user refused location access.
    Denied,
    /// The user has not been asked yet.
    Undetermined,
}

/// Options for a continuous watch.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct WatchOptions {
    /// Sampling cadence in milliseconds, for platforms that poll.
    pub interval_ms: u64,
    /// Minimum movement in meters between delivered fixes.
    pub min_distance_meters: f64,
    /// Requested accuracy.
    pub accuracy: Accuracy,
}

impl Default for WatchOptions {
    fn default() -> Self {
        Self {
            interval_ms: 5000,
            min_distance_meters: 10.0,
            accuracy: Accuracy::BestForNavigation,
        }
    }
}

/// A single location fix.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Position {
    /// Fix coordinates.
    pub coordinates: Coordinates,
    /// Horizontal accuracy radius in meters, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accuracy_meters: Option<f64>,
    /// When the fix was taken.
    pub timestamp: DateTime<Utc>,
}

impl Position {
    /// A fix at `coordinates` taken now.
    #[must_use]
    pub fn now(coordinates: Coordinates) -> Self {
        Self {
            coordinates,
            accuracy_meters: None,
            timestamp: Utc::now(),
        }
    }
}

/// Receiving end of a continuous watch.
///
/// Dropping the subscription releases it on the platform side.
#[derive(Debug)]
pub struct PositionSubscription {
    rx: mpsc::Receiver<Position>,
}

impl PositionSubscription {
    /// Wrap a channel receiver.
    #[must_use]
    pub const fn new(rx: mpsc::Receiver<Position>) -> Self {
        Self { rx }
    }

    /// Wait for the next fix. Returns `None` once the platform closes the
    /// subscription.
    pub async fn next(&mut self) -> Option<Position> {
        self.rx.recv().await
    }
}

/// What the user can do about a location failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryAction {
    /// Ask for location permission again.
    RequestPermission,
    /// Open the system location settings.
    OpenSettings,
    /// Try again later.
    Retry,
}

/// Location acquisition failures.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LocationError {
    /// Foreground location permission was not granted.
    #[error("Location permission denied. Allow location access so geoentry can tell when you are home.")]
    PermissionDenied,

    /// Device location services are switched off.
    #[error("Location services are disabled. Turn them on in system settings.")]
    ServiceDisabled,

    /// The platform could not produce a fix.
    #[error("Location unavailable: {message}")]
    Unavailable {
        /// Platform-specific detail.
        message: String,
    },

    /// No fix arrived before the deadline.
    #[error("Timed out after {timeout_secs} seconds waiting for a location fix")]
    Timeout {
        /// The timeout that elapsed.
        timeout_secs: u64,
    },
}

impl LocationError {
    /// Suggested user action.
    #[must_use]
    pub const fn recovery_action(&self) -> RecoveryAction {
        match self {
            Self::PermissionDenied => RecoveryAction::RequestPermission,
            Self::ServiceDisabled => RecoveryAction::OpenSettings,
            Self::Unavailable { .. } | Self::Timeout { .. } => RecoveryAction::Retry,
        }
    }

    /// Whether retrying without user intervention may succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Unavailable { .. } | Self::Timeout { .. })
    }
}

/// Device location provider.
#[async_trait]
pub trait LocationPlatform: Send + Sync + 'static {
    /// Current foreground permission state.
    async fn permission_status(&self) -> PermissionStatus;

    /// Ask for foreground permission, returning the resulting state.
    async fn request_permission(&self) -> PermissionStatus;

    /// Whether device location services are on.
    async fn services_enabled(&self) -> bool;

    /// Produce a single fix.
    ///
    /// # Errors
    ///
    /// Returns a [`LocationError`] if no fix can be produced.
    async fn current_position(&self, accuracy: Accuracy) -> Result<Position, LocationError>;

    /// Start a continuous watch.
    ///
    /// # Errors
    ///
    /// Returns a [`LocationError`] if the watch cannot be started.
    async fn watch_position(
        &self,
        options: WatchOptions,
    ) -> Result<PositionSubscription, LocationError>;
}
