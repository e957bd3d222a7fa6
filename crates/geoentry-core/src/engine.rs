//! The proximity engine.
//!
//! [`ProximityEngine`] is the single owner of mutable detection state. Every
//! sample goes through [`ProximityEngine::process_sample`], which reads the
//! current zones, runs the state machine, records history and fans the
//! resulting transition out to the remote mirror and to subscribers.
//!
//! The detector and history share one async mutex so each sample's
//! read-compare-write is atomic. Callers only ever see cloned snapshots.

use std::sync::{Arc, PoisonError, RwLock};

use chrono::Utc;
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::GeoentryConfig;
use crate::detector::{DetectionState, ProximityDetector};
use crate::error::Result;
use crate::event::Transition;
use crate::geo::Coordinates;
use crate::history::{HistoryEntry, HistoryLog, HistoryStats};
use crate::mirror::{EventMirror, HttpEventMirror};
use crate::resolver::{check_proximity, ProximityCheck};
use crate::sampler::Position;
use crate::settings::{ProximitySettings, ProximitySettingsUpdate};
use crate::storage::{JsonZoneStore, Storage};
use crate::zone::{HomeZone, HomeZoneUpdate, NewHomeZone, ZoneError, ZoneStore};

/// Capacity of the transition broadcast channel.
const EVENT_CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Default)]
struct EngineCore {
    detector: ProximityDetector,
    history: HistoryLog,
}

struct EngineInner {
    zones: Arc<dyn ZoneStore>,
    storage: Option<Storage>,
    core: Mutex<EngineCore>,
    settings: RwLock<ProximitySettings>,
    mirror: Option<Arc<dyn EventMirror>>,
    device_id: Option<String>,
    user_id: Option<String>,
    events: broadcast::Sender<Transition>,
}

/// Shared handle to the proximity engine.
#[derive(Clone)]
pub struct ProximityEngine {
    inner: Arc<EngineInner>,
}

impl std::fmt::Debug for ProximityEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProximityEngine")
            .field("storage", &self.inner.storage)
            .field("mirror", &self.inner.mirror.is_some())
            .finish_non_exhaustive()
    }
}

/// Builder for [`ProximityEngine`].
pub struct EngineBuilder {
    zones: Arc<dyn ZoneStore>,
    storage: Option<Storage>,
    settings: ProximitySettings,
    history: HistoryLog,
    mirror: Option<Arc<dyn EventMirror>>,
    device_id: Option<String>,
    user_id: Option<String>,
}

impl EngineBuilder {
    /// Persist settings and history under `storage`.
    #[must_use]
    pub fn storage(mut self, storage: Storage) -> Self {
        self.storage = Some(storage);
        self
    }

    /// Initial settings.
    #[must_use]
    pub fn settings(mut self, settings: ProximitySettings) -> Self {
        self.settings = settings;
        self
    }

    /// Initial history.
    #[must_use]
    pub fn history(mut self, history: HistoryLog) -> Self {
        self.history = history;
        self
    }

    /// Publish transitions to `mirror`.
    #[must_use]
    pub fn mirror(mut self, mirror: Arc<dyn EventMirror>) -> Self {
        self.mirror = Some(mirror);
        self
    }

    /// Identity attached to published events.
    #[must_use]
    pub fn identity(mut self, device_id: Option<String>, user_id: Option<String>) -> Self {
        self.device_id = device_id;
        self.user_id = user_id;
        self
    }

    /// Build the engine.
    #[must_use]
    pub fn build(self) -> ProximityEngine {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        ProximityEngine {
            inner: Arc::new(EngineInner {
                zones: self.zones,
                storage: self.storage,
                core: Mutex::new(EngineCore {
                    detector: ProximityDetector::new(),
                    history: self.history,
                }),
                settings: RwLock::new(self.settings),
                mirror: self.mirror,
                device_id: self.device_id,
                user_id: self.user_id,
                events,
            }),
        }
    }
}

impl ProximityEngine {
    /// Start building an engine over `zones`.
    #[must_use]
    pub fn builder(zones: Arc<dyn ZoneStore>) -> EngineBuilder {
        EngineBuilder {
            zones,
            storage: None,
            settings: ProximitySettings::default(),
            history: HistoryLog::new(),
            mirror: None,
            device_id: None,
            user_id: None,
        }
    }

    /// Build a file-backed engine from configuration.
    ///
    /// Zones, settings and history are loaded from the configured data
    /// directory. Settings fall back to `[proximity]` until first saved. The
    /// remote mirror is attached when `mirror.base_url` is set.
    ///
    /// # Errors
    ///
    /// Returns an error if stored data cannot be read or the mirror URL is
    /// invalid.
    pub fn from_config(config: &GeoentryConfig) -> Result<Self> {
        let storage = match &config.storage.data_dir {
            Some(dir) => Storage::new(dir),
            None => Storage::default_location()?,
        };
        info!(data_dir = %storage.data_dir().display(), "Opening proximity engine");

        let zones = JsonZoneStore::open(storage.clone())?;
        let settings = if storage.has_settings() {
            storage.load_settings()?
        } else {
            config.proximity.to_settings()
        };
        let history = storage.load_history()?;

        let mut builder = Self::builder(Arc::new(zones))
            .storage(storage)
            .settings(settings)
            .history(history)
            .identity(config.mirror.device_id.clone(), config.mirror.user_id.clone());

        if let Some(base_url) = &config.mirror.base_url {
            let mirror = HttpEventMirror::new(
                base_url,
                std::time::Duration::from_secs(config.mirror.timeout_secs),
            )?;
            builder = builder.mirror(Arc::new(mirror));
        }

        Ok(builder.build())
    }

    /// Feed one sample through the state machine.
    ///
    /// Returns the transition it caused, if any. When detection is disabled
    /// the sample is ignored and state is left untouched.
    ///
    /// # Errors
    ///
    /// Returns an error if the zone list cannot be read.
    pub async fn process_sample(&self, position: Position) -> Result<Option<Transition>> {
        if !self.settings().is_enabled {
            debug!("Proximity detection disabled, ignoring sample");
            return Ok(None);
        }

        let zones = self.inner.zones.list_zones()?;
        let now = Utc::now();

        let transition = {
            let mut core = self.inner.core.lock().await;
            let Some(event) = core.detector.process(position.coordinates, &zones, now) else {
                return Ok(None);
            };
            core.history
                .record_at(event.zone().id, event.event_type(), event.distance_meters(), now);
            self.persist_history(&core.history);
            Transition {
                event,
                position: position.coordinates,
                detected_at: now,
            }
        };

        self.publish(&transition);
        // No subscribers is fine.
        let _ = self.inner.events.send(transition.clone());
        Ok(Some(transition))
    }

    fn publish(&self, transition: &Transition) {
        let Some(mirror) = self.inner.mirror.clone() else {
            return;
        };
        let payload = transition.to_payload(
            self.inner.device_id.as_deref(),
            self.inner.user_id.as_deref(),
        );
        tokio::spawn(async move {
            if let Err(e) = mirror.publish(&payload).await {
                warn!(
                    error = %e,
                    event = %payload.event_type,
                    zone_id = %payload.home_zone_id,
                    "Failed to mirror proximity event"
                );
            }
        });
    }

    fn persist_history(&self, history: &HistoryLog) {
        if let Some(storage) = &self.inner.storage {
            if let Err(e) = storage.save_history(history) {
                warn!(error = %e, "Failed to persist history");
            }
        }
    }

    /// Evaluate `position` without touching detection state.
    ///
    /// # Errors
    ///
    /// Returns an error if the zone list cannot be read.
    pub fn check(&self, position: Coordinates) -> Result<ProximityCheck> {
        let zones = self.inner.zones.list_zones()?;
        Ok(check_proximity(position, &zones))
    }

    /// Clone of the current detection state.
    pub async fn snapshot(&self) -> DetectionState {
        self.inner.core.lock().await.detector.snapshot()
    }

    /// Record that the prompt for the current near episode was handled.
    pub async fn mark_session_notified(&self) {
        self.inner.core.lock().await.detector.mark_session_notified();
    }

    /// Subscribe to transitions.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<Transition> {
        self.inner.events.subscribe()
    }

    /// The attached remote mirror, if any.
    #[must_use]
    pub fn mirror(&self) -> Option<Arc<dyn EventMirror>> {
        self.inner.mirror.clone()
    }

    // =========================================================================
    // SETTINGS
    // =========================================================================

    /// Current settings.
    #[must_use]
    pub fn settings(&self) -> ProximitySettings {
        *self
            .inner
            .settings
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Apply a partial settings update, persisting it first.
    ///
    /// # Errors
    ///
    /// Returns an error if the settings cannot be saved; nothing changes then.
    pub fn update_settings(&self, update: ProximitySettingsUpdate) -> Result<ProximitySettings> {
        let mut settings = self
            .inner
            .settings
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let next = settings.merged(update);
        if let Some(storage) = &self.inner.storage {
            storage.save_settings(&next)?;
        }
        *settings = next;
        info!(
            enabled = next.is_enabled,
            notifications = next.show_notifications,
            "Settings updated"
        );
        Ok(next)
    }

    // =========================================================================
    // ZONES
    // =========================================================================

    /// Every zone, in creation order.
    ///
    /// # Errors
    ///
    /// Returns an error if the zone store cannot be read.
    pub fn zones(&self) -> Result<Vec<HomeZone>> {
        Ok(self.inner.zones.list_zones()?)
    }

    /// One zone by id.
    ///
    /// # Errors
    ///
    /// Returns [`crate::GeoentryError::ZoneNotFound`] for unknown ids.
    pub fn zone(&self, id: Uuid) -> Result<HomeZone> {
        self.inner
            .zones
            .list_zones()?
            .into_iter()
            .find(|z| z.id == id)
            .ok_or_else(|| ZoneError::NotFound(id).into())
    }

    /// Create a zone. It takes part from the next sample on.
    ///
    /// # Errors
    ///
    /// Returns a validation or storage error.
    pub fn create_zone(&self, zone: NewHomeZone) -> Result<HomeZone> {
        let zone = self.inner.zones.save_zone(zone)?;
        info!(
            zone_id = %zone.id,
            zone = %zone.name,
            radius_m = zone.radius_meters,
            "Home zone created"
        );
        Ok(zone)
    }

    /// Update a zone.
    ///
    /// # Errors
    ///
    /// Returns a not-found, validation or storage error.
    pub fn update_zone(&self, id: Uuid, update: HomeZoneUpdate) -> Result<HomeZone> {
        let zone = self.inner.zones.update_zone(id, update)?;
        info!(zone_id = %zone.id, active = zone.is_active, "Home zone updated");
        Ok(zone)
    }

    /// Delete a zone together with its history.
    ///
    /// # Errors
    ///
    /// Returns a not-found or storage error.
    pub async fn delete_zone(&self, id: Uuid) -> Result<HomeZone> {
        let zone = self.inner.zones.delete_zone(id)?;
        let mut core = self.inner.core.lock().await;
        let removed = core.history.delete_for_zone(id);
        if removed > 0 {
            self.persist_history(&core.history);
        }
        info!(zone_id = %id, history_removed = removed, "Home zone deleted");
        Ok(zone)
    }

    // =========================================================================
    // HISTORY
    // =========================================================================

    /// Every history entry, newest first.
    pub async fn history(&self) -> Vec<HistoryEntry> {
        self.inner.core.lock().await.history.to_vec()
    }

    /// History for one zone, newest first.
    pub async fn history_for_zone(&self, zone_id: Uuid) -> Vec<HistoryEntry> {
        self.inner.core.lock().await.history.for_zone(zone_id)
    }

    /// Most recent history entry.
    pub async fn latest_event(&self) -> Option<HistoryEntry> {
        self.inner.core.lock().await.history.latest().cloned()
    }

    /// Aggregate history counts.
    pub async fn history_stats(&self) -> HistoryStats {
        self.inner.core.lock().await.history.stats(Utc::now())
    }

    /// Remove every history entry.
    pub async fn clear_history(&self) {
        let mut core = self.inner.core.lock().await;
        core.history.clear();
        self.persist_history(&core.history);
        info!("History cleared");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{EventType, ProximityEventPayload};
    use crate::mirror::{MirrorError, RemoteEvent};
    use crate::zone::MemoryZoneStore;
    use async_trait::async_trait;
    use std::sync::Mutex as StdMutex;
    use tempfile::TempDir;

    const NEAR: Coordinates = Coordinates::new(40.0001, -74.0);
    const FAR: Coordinates = Coordinates::new(40.01, -74.0);

    fn home() -> NewHomeZone {
        NewHomeZone {
            name: "Home".to_string(),
            coordinates: Coordinates::new(40.0, -74.0),
            radius_meters: 100.0,
            is_active: true,
            address: None,
        }
    }

    fn engine() -> ProximityEngine {
        ProximityEngine::builder(Arc::new(MemoryZoneStore::new())).build()
    }

    #[derive(Default)]
    struct RecordingMirror {
        published: StdMutex<Vec<ProximityEventPayload>>,
    }

    #[async_trait]
    impl EventMirror for RecordingMirror {
        async fn publish(
            &self,
            payload: &ProximityEventPayload,
        ) -> std::result::Result<(), MirrorError> {
            self.published.lock().unwrap().push(payload.clone());
            Ok(())
        }

        async fn fetch_events(&self) -> std::result::Result<Vec<RemoteEvent>, MirrorError> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn test_transition_is_recorded_and_broadcast() {
        let engine = engine();
        let zone = engine.create_zone(home()).unwrap();
        let mut rx = engine.subscribe();

        let transition = engine.process_sample(Position::now(NEAR)).await.unwrap().unwrap();
        assert_eq!(transition.event.event_type(), EventType::Enter);
        assert_eq!(transition.position, NEAR);

        let received = rx.recv().await.unwrap();
        assert_eq!(received, transition);

        let history = engine.history().await;
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].home_zone_id, zone.id);
        assert!(engine.snapshot().await.is_near_home);
    }

    #[tokio::test]
    async fn test_disabled_engine_freezes_state() {
        let engine = engine();
        engine.create_zone(home()).unwrap();
        engine
            .update_settings(ProximitySettingsUpdate {
                is_enabled: Some(false),
                ..ProximitySettingsUpdate::default()
            })
            .unwrap();

        assert!(engine.process_sample(Position::now(NEAR)).await.unwrap().is_none());
        assert_eq!(engine.snapshot().await, DetectionState::default());
        assert!(engine.history().await.is_empty());
    }

    #[tokio::test]
    async fn test_zone_changes_apply_on_next_sample() {
        let engine = engine();
        let zone = engine.create_zone(home()).unwrap();
        engine.process_sample(Position::now(NEAR)).await.unwrap();

        engine
            .update_zone(
                zone.id,
                HomeZoneUpdate {
                    is_active: Some(false),
                    ..HomeZoneUpdate::default()
                },
            )
            .unwrap();

        let exit = engine.process_sample(Position::now(NEAR)).await.unwrap().unwrap();
        assert_eq!(exit.event.event_type(), EventType::Exit);
        assert_eq!(exit.event.zone().id, zone.id);
    }

    #[tokio::test]
    async fn test_delete_zone_cascades_history() {
        let engine = engine();
        let zone = engine.create_zone(home()).unwrap();
        engine.process_sample(Position::now(NEAR)).await.unwrap();
        engine.process_sample(Position::now(FAR)).await.unwrap();
        assert_eq!(engine.history_for_zone(zone.id).await.len(), 2);

        engine.delete_zone(zone.id).await.unwrap();
        assert!(engine.history().await.is_empty());
        assert!(matches!(
            engine.zone(zone.id),
            Err(crate::GeoentryError::ZoneNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_mark_session_notified() {
        let engine = engine();
        engine.create_zone(home()).unwrap();
        engine.process_sample(Position::now(NEAR)).await.unwrap();

        engine.mark_session_notified().await;
        assert!(engine.snapshot().await.modal_shown_for_current_session);
    }

    #[tokio::test]
    async fn test_mirror_receives_payload() {
        let mirror = Arc::new(RecordingMirror::default());
        let engine = ProximityEngine::builder(Arc::new(MemoryZoneStore::new()))
            .mirror(mirror.clone())
            .identity(Some("pixel-8".to_string()), None)
            .build();
        let zone = engine.create_zone(home()).unwrap();

        engine.process_sample(Position::now(NEAR)).await.unwrap();

        for _ in 0..50 {
            if !mirror.published.lock().unwrap().is_empty() {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        let published = mirror.published.lock().unwrap();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].home_zone_id, zone.id);
        assert_eq!(published[0].device_id.as_deref(), Some("pixel-8"));
        assert_eq!(published[0].coordinates, NEAR);
    }

    #[tokio::test]
    async fn test_check_does_not_mutate_state() {
        let engine = engine();
        engine.create_zone(home()).unwrap();

        let check = engine.check(NEAR).unwrap();
        assert!(check.within_radius);
        assert_eq!(engine.snapshot().await, DetectionState::default());
    }

    #[tokio::test]
    async fn test_from_config_persists_across_restarts() {
        let dir = TempDir::new().unwrap();
        let mut config = GeoentryConfig::default();
        config.storage.data_dir = Some(dir.path().to_path_buf());
        config.proximity.show_notifications = false;

        let engine = ProximityEngine::from_config(&config).unwrap();
        assert!(!engine.settings().show_notifications);
        let zone = engine.create_zone(home()).unwrap();
        engine.process_sample(Position::now(NEAR)).await.unwrap();
        engine
            .update_settings(ProximitySettingsUpdate {
                vibration: Some(false),
                ..ProximitySettingsUpdate::default()
            })
            .unwrap();
        drop(engine);

        let reopened = ProximityEngine::from_config(&config).unwrap();
        assert_eq!(reopened.zones().unwrap()[0].id, zone.id);
        assert_eq!(reopened.history().await.len(), 1);
        assert!(!reopened.settings().vibration);
        assert!(!reopened.settings().show_notifications);
        // Detection state is not persisted.
        assert!(!reopened.snapshot().await.is_near_home);
    }
}
