//! Application state shared across handlers.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use geoentry_core::{
    EventSource, GeoentryConfig, HistorySource, LocationSampler, NotificationGate, PresenceMonitor,
    PresenceSource, ProximityEngine, PushLocationPlatform, RemoteEventSource,
};
use tracing::{info, warn};

/// State handle used by every router.
pub type SharedState = AppState;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: GeoentryConfig,
    engine: ProximityEngine,
    platform: PushLocationPlatform,
    sampler: LocationSampler<PushLocationPlatform>,
    gate: Mutex<NotificationGate>,
    presence: PresenceMonitor,
    started_at: Instant,
}

impl AppState {
    /// Create state with a file-backed engine built from `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if stored zones, settings or history cannot be read.
    pub fn new(config: GeoentryConfig) -> anyhow::Result<Self> {
        let engine = ProximityEngine::from_config(&config)?;
        Ok(Self::with_engine(config, engine))
    }

    /// Create state around an existing engine.
    #[must_use]
    pub fn with_engine(config: GeoentryConfig, engine: ProximityEngine) -> Self {
        let platform = PushLocationPlatform::new();
        let sampler =
            LocationSampler::from_config(Arc::new(platform.clone()), engine.clone(), &config);

        let presence_source: Arc<dyn EventSource> =
            match (config.presence.source, engine.mirror()) {
                (PresenceSource::Remote, Some(mirror)) => Arc::new(RemoteEventSource::new(mirror)),
                (PresenceSource::Remote, None) => {
                    warn!("Remote presence source requested without a mirror, using local history");
                    Arc::new(HistorySource::new(engine.clone()))
                }
                (PresenceSource::Local, _) => Arc::new(HistorySource::new(engine.clone())),
            };
        let presence =
            PresenceMonitor::new(presence_source).with_interval(config.presence_interval());

        Self {
            inner: Arc::new(AppStateInner {
                config,
                engine,
                platform,
                sampler,
                gate: Mutex::new(NotificationGate::new()),
                presence,
                started_at: Instant::now(),
            }),
        }
    }

    /// Start the presence poller and, if configured, the location watch.
    ///
    /// # Errors
    ///
    /// Returns an error if the watch cannot be started.
    pub async fn start_background(&self) -> geoentry_core::Result<()> {
        self.inner.presence.start();
        if self.inner.config.watch.auto_start {
            self.inner.sampler.sync_lifecycle(true).await?;
        }
        info!(
            watching = self.inner.sampler.is_watching(),
            "Background tasks started"
        );
        Ok(())
    }

    /// Stop background tasks.
    pub fn shutdown(&self) {
        self.inner.sampler.stop_watching();
        self.inner.presence.stop();
    }

    /// Loaded configuration.
    #[must_use]
    pub fn config(&self) -> &GeoentryConfig {
        &self.inner.config
    }

    /// The proximity engine.
    #[must_use]
    pub fn engine(&self) -> &ProximityEngine {
        &self.inner.engine
    }

    /// Platform that device position reports are pushed into.
    #[must_use]
    pub fn platform(&self) -> &PushLocationPlatform {
        &self.inner.platform
    }

    /// The location sampler.
    #[must_use]
    pub fn sampler(&self) -> &LocationSampler<PushLocationPlatform> {
        &self.inner.sampler
    }

    /// The device-control presence gate.
    #[must_use]
    pub fn presence(&self) -> &PresenceMonitor {
        &self.inner.presence
    }

    /// Lock the prompt gate.
    pub fn gate(&self) -> MutexGuard<'_, NotificationGate> {
        self.inner
            .gate
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Time since the state was created.
    #[must_use]
    pub fn uptime(&self) -> Duration {
        self.inner.started_at.elapsed()
    }
}
