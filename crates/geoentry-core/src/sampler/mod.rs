//! Location acquisition.
//!
//! [`LocationSampler`] asks a [`LocationPlatform`] for fixes, either one at a
//! time or as a continuous watch, and routes every fix through the
//! [`ProximityEngine`] before exposing it.
//!
//! At most one watch subscription is live at a time. Each subscription gets a
//! generation number, claimed before the platform is asked for a watch;
//! [`LocationSampler::stop_watching`] bumps the generation and aborts the task
//! synchronously, so a fix that was already in flight for an old subscription
//! is dropped, and a start still waiting on the platform never installs.
//!
//! The sampler also remembers whether the caller wants a watch at all. The
//! watch runs iff that intent is set and detection is enabled;
//! [`LocationSampler::resync`] re-applies the rule after a settings change.

mod platform;
mod push;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use utoipa::ToSchema;

pub use platform::{
    Accuracy, LocationError, LocationPlatform, PermissionStatus, Position, PositionSubscription,
    RecoveryAction, WatchOptions,
};
pub use push::PushLocationPlatform;

use crate::config::GeoentryConfig;
use crate::engine::ProximityEngine;
use crate::error::{GeoentryError, Result};
use crate::geo::Coordinates;

/// Default one-shot timeout.
pub const DEFAULT_LOCATION_TIMEOUT: Duration = Duration::from_secs(15);

/// Observable sampler status.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SamplerStatus {
    /// Whether a watch subscription is live.
    pub is_watching: bool,
    /// Last fix that went through the engine.
    pub current_location: Option<Position>,
    /// Message of the last failure, cleared by the next success.
    pub last_error: Option<String>,
    /// When a fix was last received or a request last failed.
    pub last_check: Option<DateTime<Utc>>,
}

struct WatchHandle {
    generation: u64,
    task: JoinHandle<()>,
}

#[derive(Default)]
struct Shared {
    generation: AtomicU64,
    watch: Mutex<Option<WatchHandle>>,
    status: Mutex<SamplerStatus>,
    // Options of the watch the caller wants running, if any.
    wanted: Mutex<Option<WatchOptions>>,
}

impl Shared {
    fn record_success(&self, position: Position) {
        let mut status = self.status.lock().unwrap_or_else(PoisonError::into_inner);
        status.current_location = Some(position);
        status.last_error = None;
        status.last_check = Some(Utc::now());
    }

    fn record_error(&self, message: String) {
        let mut status = self.status.lock().unwrap_or_else(PoisonError::into_inner);
        status.last_error = Some(message);
        status.last_check = Some(Utc::now());
    }

    fn set_wanted(&self, options: Option<WatchOptions>) {
        *self.wanted.lock().unwrap_or_else(PoisonError::into_inner) = options;
    }

    fn wanted(&self) -> Option<WatchOptions> {
        *self.wanted.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_watching(&self) -> bool {
        let current = self.generation.load(Ordering::SeqCst);
        self.watch
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|h| h.generation == current && !h.task.is_finished())
    }
}

/// One-shot and continuous location sampling.
pub struct LocationSampler<P: LocationPlatform> {
    platform: Arc<P>,
    engine: ProximityEngine,
    options: WatchOptions,
    timeout: Duration,
    shared: Arc<Shared>,
    start_lock: tokio::sync::Mutex<()>,
}

impl<P: LocationPlatform> LocationSampler<P> {
    /// Create a sampler with default options and timeout.
    #[must_use]
    pub fn new(platform: Arc<P>, engine: ProximityEngine) -> Self {
        Self {
            platform,
            engine,
            options: WatchOptions::default(),
            timeout: DEFAULT_LOCATION_TIMEOUT,
            shared: Arc::new(Shared::default()),
            start_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Create a sampler using `[watch]` and `[location]` from `config`.
    #[must_use]
    pub fn from_config(platform: Arc<P>, engine: ProximityEngine, config: &GeoentryConfig) -> Self {
        Self::new(platform, engine)
            .with_options(config.watch_options())
            .with_timeout(config.location_timeout())
    }

    /// Options used by [`sync_lifecycle`](Self::sync_lifecycle).
    #[must_use]
    pub fn with_options(mut self, options: WatchOptions) -> Self {
        self.options = options;
        self
    }

    /// One-shot timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Default watch options.
    #[must_use]
    pub const fn options(&self) -> WatchOptions {
        self.options
    }

    /// The underlying platform.
    #[must_use]
    pub const fn platform(&self) -> &Arc<P> {
        &self.platform
    }

    async fn ensure_permission(&self) -> std::result::Result<(), LocationError> {
        let mut status = self.platform.permission_status().await;
        if status != PermissionStatus::Granted {
            status = self.platform.request_permission().await;
        }
        if status == PermissionStatus::Granted {
            Ok(())
        } else {
            Err(LocationError::PermissionDenied)
        }
    }

    async fn acquire(&self) -> std::result::Result<Position, LocationError> {
        self.ensure_permission().await?;
        if !self.platform.services_enabled().await {
            return Err(LocationError::ServiceDisabled);
        }
        tokio::time::timeout(self.timeout, self.platform.current_position(self.options.accuracy))
            .await
            .map_err(|_| LocationError::Timeout {
                timeout_secs: self.timeout.as_secs(),
            })?
    }

    fn fail(&self, err: LocationError) -> GeoentryError {
        warn!(error = %err, action = ?err.recovery_action(), "Location request failed");
        self.shared.record_error(err.to_string());
        err.into()
    }

    /// Acquire one fix and run it through the engine.
    ///
    /// # Errors
    ///
    /// Returns a location error (permission, services, unavailable, timeout)
    /// or an engine error. Detection state is untouched on location failure.
    pub async fn get_current_location(&self) -> Result<Coordinates> {
        let position = self.acquire().await.map_err(|e| self.fail(e))?;
        self.shared.record_success(position);
        self.engine.process_sample(position).await?;
        Ok(position.coordinates)
    }

    /// Re-check proximity now, as a "refresh" action.
    ///
    /// # Errors
    ///
    /// Same as [`get_current_location`](Self::get_current_location).
    pub async fn force_proximity_check(&self) -> Result<Coordinates> {
        debug!("Forced proximity check");
        self.get_current_location().await
    }

    /// Start a continuous watch and remember that one is wanted.
    ///
    /// Does nothing if a watch is already running. While detection is
    /// disabled nothing starts, but the watch resumes on the next
    /// [`resync`](Self::resync) after detection is enabled again.
    ///
    /// # Errors
    ///
    /// Returns a location error if the platform refuses the subscription.
    pub async fn start_watching(&self, options: WatchOptions) -> Result<()> {
        self.shared.set_wanted(Some(options));
        self.start_inner(options).await
    }

    async fn start_inner(&self, options: WatchOptions) -> Result<()> {
        let _guard = self.start_lock.lock().await;
        if self.is_watching() {
            debug!("Location watch already running");
            return Ok(());
        }
        if !self.engine.settings().is_enabled {
            debug!("Proximity detection disabled, not starting watch");
            return Ok(());
        }
        self.cancel_watch();

        // Claimed before any await so a concurrent stop invalidates it.
        let generation = self.shared.generation.fetch_add(1, Ordering::SeqCst) + 1;

        self.ensure_permission().await.map_err(|e| self.fail(e))?;
        let mut subscription = self
            .platform
            .watch_position(options)
            .await
            .map_err(|e| self.fail(e))?;

        {
            let mut watch = self
                .shared
                .watch
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            if self.shared.generation.load(Ordering::SeqCst) != generation {
                debug!(generation, "Watch stopped while starting, discarding subscription");
                return Ok(());
            }

            let shared = Arc::clone(&self.shared);
            let engine = self.engine.clone();
            let task = tokio::spawn(async move {
                while let Some(position) = subscription.next().await {
                    if shared.generation.load(Ordering::SeqCst) != generation {
                        break;
                    }
                    shared.record_success(position);
                    if let Err(e) = engine.process_sample(position).await {
                        warn!(error = %e, "Failed to process location sample");
                        shared.record_error(e.to_string());
                    }
                }
                debug!(generation, "Location watch task finished");
            });
            *watch = Some(WatchHandle { generation, task });
        }

        info!(
            generation,
            interval_ms = options.interval_ms,
            min_distance_m = options.min_distance_meters,
            accuracy = ?options.accuracy,
            "Location watch started"
        );
        Ok(())
    }

    /// Stop the continuous watch and forget that one is wanted. Safe to call
    /// when not watching.
    pub fn stop_watching(&self) {
        self.shared.set_wanted(None);
        self.cancel_watch();
    }

    fn cancel_watch(&self) {
        self.shared.generation.fetch_add(1, Ordering::SeqCst);
        let handle = self
            .shared
            .watch
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            handle.task.abort();
            info!(generation = handle.generation, "Location watch stopped");
        }
    }

    /// Whether a watch subscription is live.
    #[must_use]
    pub fn is_watching(&self) -> bool {
        self.shared.is_watching()
    }

    /// Whether the caller currently wants a watch running.
    #[must_use]
    pub fn watching_enabled(&self) -> bool {
        self.shared.wanted().is_some()
    }

    /// Record whether a watch is wanted, then run it iff wanted and detection
    /// is enabled.
    ///
    /// Keeps the options of an already wanted watch; otherwise uses the
    /// configured defaults.
    ///
    /// # Errors
    ///
    /// Returns a location error if starting the watch fails.
    pub async fn sync_lifecycle(&self, enable_watching: bool) -> Result<()> {
        let wanted = enable_watching.then(|| self.shared.wanted().unwrap_or(self.options));
        self.shared.set_wanted(wanted);
        self.resync().await
    }

    /// Re-apply the running rule with the stored intent, e.g. after
    /// `isEnabled` changed.
    ///
    /// # Errors
    ///
    /// Returns a location error if starting the watch fails.
    pub async fn resync(&self) -> Result<()> {
        let wanted = self
            .shared
            .wanted()
            .filter(|_| self.engine.settings().is_enabled);
        match (wanted, self.is_watching()) {
            (Some(options), false) => self.start_inner(options).await,
            (None, true) => {
                self.cancel_watch();
                Ok(())
            }
            _ => Ok(()),
        }
    }

    /// Last fix that went through the engine.
    #[must_use]
    pub fn current_location(&self) -> Option<Position> {
        self.status().current_location
    }

    /// Message of the last failure.
    #[must_use]
    pub fn last_error(&self) -> Option<String> {
        self.status().last_error
    }

    /// When a fix was last received or a request last failed.
    #[must_use]
    pub fn last_check(&self) -> Option<DateTime<Utc>> {
        self.status().last_check
    }

    /// Snapshot of the sampler status.
    #[must_use]
    pub fn status(&self) -> SamplerStatus {
        let mut status = self
            .shared
            .status
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        status.is_watching = self.is_watching();
        status
    }
}

impl<P: LocationPlatform> Drop for LocationSampler<P> {
    fn drop(&mut self) {
        self.cancel_watch();
    }
}
