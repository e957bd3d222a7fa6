//! Device-control presence gate.
//!
//! Device controls are only enabled while the user is at home, where "at
//! home" means the most recent recorded event is an enter. A background task
//! re-derives that status on a fixed interval and publishes it into a
//! `watch` cell; a failed fetch keeps the previous status and records the
//! error alongside it.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};
use utoipa::ToSchema;

use crate::engine::ProximityEngine;
use crate::error::Result;
use crate::event::EventType;
use crate::mirror::EventMirror;

/// Default re-evaluation interval.
pub const DEFAULT_PRESENCE_INTERVAL: Duration = Duration::from_secs(10);

/// Whether the user is considered at home.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PresenceStatus {
    /// True when the latest event is an enter.
    pub is_at_home: bool,
    /// Type of the latest event.
    pub last_event: Option<EventType>,
    /// When the latest event happened.
    pub last_event_time: Option<DateTime<Utc>>,
    /// When the status was last evaluated.
    pub checked_at: Option<DateTime<Utc>>,
    /// Error from the last evaluation, if it failed.
    pub error: Option<String>,
}

/// Minimal view of an event for presence evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventRecord {
    /// Event type.
    pub event_type: EventType,
    /// When it happened, if known. Unknown times sort oldest.
    pub timestamp: Option<DateTime<Utc>>,
}

/// Where presence events come from.
#[async_trait]
pub trait EventSource: Send + Sync {
    /// Fetch every known event, in any order.
    ///
    /// # Errors
    ///
    /// Returns an error if the events cannot be fetched.
    async fn fetch(&self) -> Result<Vec<EventRecord>>;
}

/// Events from the engine's local history.
#[derive(Debug, Clone)]
pub struct HistorySource {
    engine: ProximityEngine,
}

impl HistorySource {
    /// Read from `engine`'s history.
    #[must_use]
    pub const fn new(engine: ProximityEngine) -> Self {
        Self { engine }
    }
}

#[async_trait]
impl EventSource for HistorySource {
    async fn fetch(&self) -> Result<Vec<EventRecord>> {
        Ok(self
            .engine
            .history()
            .await
            .into_iter()
            .map(|e| EventRecord {
                event_type: e.event_type,
                timestamp: Some(e.timestamp),
            })
            .collect())
    }
}

/// Events from the remote mirror.
pub struct RemoteEventSource {
    mirror: Arc<dyn EventMirror>,
}

impl RemoteEventSource {
    /// Read from `mirror`.
    #[must_use]
    pub fn new(mirror: Arc<dyn EventMirror>) -> Self {
        Self { mirror }
    }
}

#[async_trait]
impl EventSource for RemoteEventSource {
    async fn fetch(&self) -> Result<Vec<EventRecord>> {
        let events = self.mirror.fetch_events().await?;
        Ok(events
            .into_iter()
            .filter_map(|e| {
                Some(EventRecord {
                    event_type: e.kind()?,
                    timestamp: e.created_at,
                })
            })
            .collect())
    }
}

/// Derive presence from `records`, newest timestamp first.
#[must_use]
pub fn derive_status(mut records: Vec<EventRecord>, now: DateTime<Utc>) -> PresenceStatus {
    records.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    let latest = records.first();
    PresenceStatus {
        is_at_home: latest.is_some_and(|r| r.event_type == EventType::Enter),
        last_event: latest.map(|r| r.event_type),
        last_event_time: latest.and_then(|r| r.timestamp),
        checked_at: Some(now),
        error: None,
    }
}

struct MonitorShared {
    source: Arc<dyn EventSource>,
    tx: watch::Sender<PresenceStatus>,
}

impl MonitorShared {
    async fn refresh(&self) -> PresenceStatus {
        match self.source.fetch().await {
            Ok(records) => {
                let status = derive_status(records, Utc::now());
                let previous = self.tx.send_replace(status.clone());
                if previous.is_at_home != status.is_at_home {
                    info!(at_home = status.is_at_home, "Presence changed");
                }
                status
            }
            Err(e) => {
                warn!(error = %e, "Failed to refresh presence");
                self.tx.send_modify(|s| {
                    s.error = Some(e.to_string());
                    s.checked_at = Some(Utc::now());
                });
                self.tx.borrow().clone()
            }
        }
    }
}

/// Periodic presence evaluator.
pub struct PresenceMonitor {
    shared: Arc<MonitorShared>,
    interval: Duration,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl PresenceMonitor {
    /// Create a monitor over `source` with the default interval.
    #[must_use]
    pub fn new(source: Arc<dyn EventSource>) -> Self {
        let (tx, _) = watch::channel(PresenceStatus::default());
        Self {
            shared: Arc::new(MonitorShared { source, tx }),
            interval: DEFAULT_PRESENCE_INTERVAL,
            task: Mutex::new(None),
        }
    }

    /// Override the re-evaluation interval.
    #[must_use]
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Start the background task. Evaluates immediately, then every
    /// interval. Does nothing if already running.
    pub fn start(&self) {
        let mut task = self.task.lock().unwrap_or_else(PoisonError::into_inner);
        if task.as_ref().is_some_and(|t| !t.is_finished()) {
            return;
        }

        let shared = Arc::clone(&self.shared);
        let period = self.interval;
        *task = Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                let status = shared.refresh().await;
                debug!(at_home = status.is_at_home, "Presence evaluated");
            }
        }));
        info!(interval_secs = period.as_secs(), "Presence monitor started");
    }

    /// Stop the background task.
    pub fn stop(&self) {
        if let Some(task) = self
            .task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            task.abort();
            info!("Presence monitor stopped");
        }
    }

    /// Whether the background task is running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|t| !t.is_finished())
    }

    /// Evaluate now and publish the result.
    pub async fn refresh(&self) -> PresenceStatus {
        self.shared.refresh().await
    }

    /// Latest published status.
    #[must_use]
    pub fn status(&self) -> PresenceStatus {
        self.shared.tx.borrow().clone()
    }

    /// Receive every published status.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<PresenceStatus> {
        self.shared.tx.subscribe()
    }

    /// Whether device controls may be used.
    #[must_use]
    pub fn controls_enabled(&self) -> bool {
        self.shared.tx.borrow().is_at_home
    }
}

impl Drop for PresenceMonitor {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::Coordinates;
    use crate::sampler::Position;
    use crate::zone::{MemoryZoneStore, NewHomeZone};
    use crate::GeoentryError;
    use chrono::Duration as ChronoDuration;
    use std::sync::atomic::{AtomicBool, Ordering};

    fn record(event_type: EventType, minutes_ago: i64) -> EventRecord {
        EventRecord {
            event_type,
            timestamp: Some(Utc::now() - ChronoDuration::minutes(minutes_ago)),
        }
    }

    #[test]
    fn test_no_events_means_not_home() {
        let status = derive_status(Vec::new(), Utc::now());
        assert!(!status.is_at_home);
        assert!(status.last_event.is_none());
        assert!(status.checked_at.is_some());
    }

    #[test]
    fn test_latest_event_wins_regardless_of_order() {
        let records = vec![
            record(EventType::Exit, 30),
            record(EventType::Enter, 5),
            record(EventType::Exit, 60),
        ];
        let status = derive_status(records, Utc::now());
        assert!(status.is_at_home);
        assert_eq!(status.last_event, Some(EventType::Enter));

        let records = vec![record(EventType::Enter, 30), record(EventType::Exit, 1)];
        assert!(!derive_status(records, Utc::now()).is_at_home);
    }

    #[test]
    fn test_unknown_timestamps_sort_oldest() {
        let records = vec![
            EventRecord {
                event_type: EventType::Exit,
                timestamp: None,
            },
            record(EventType::Enter, 10),
        ];
        assert!(derive_status(records, Utc::now()).is_at_home);
    }

    struct FlakySource {
        fail: AtomicBool,
    }

    #[async_trait]
    impl EventSource for FlakySource {
        async fn fetch(&self) -> Result<Vec<EventRecord>> {
            if self.fail.load(Ordering::SeqCst) {
                Err(GeoentryError::MirrorError("backend down".into()))
            } else {
                Ok(vec![record(EventType::Enter, 1)])
            }
        }
    }

    #[tokio::test]
    async fn test_failed_refresh_keeps_previous_status() {
        let source = Arc::new(FlakySource {
            fail: AtomicBool::new(false),
        });
        let monitor = PresenceMonitor::new(source.clone());

        assert!(monitor.refresh().await.is_at_home);

        source.fail.store(true, Ordering::SeqCst);
        let status = monitor.refresh().await;
        assert!(status.is_at_home);
        assert!(status.error.as_deref().unwrap().contains("backend down"));
        assert!(monitor.controls_enabled());

        source.fail.store(false, Ordering::SeqCst);
        assert!(monitor.refresh().await.error.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_background_poll_follows_history() {
        let engine = ProximityEngine::builder(Arc::new(MemoryZoneStore::new())).build();
        engine
            .create_zone(NewHomeZone {
                name: "Home".to_string(),
                coordinates: Coordinates::new(40.0, -74.0),
                radius_meters: 100.0,
                is_active: true,
                address: None,
            })
            .unwrap();

        let monitor = PresenceMonitor::new(Arc::new(HistorySource::new(engine.clone())));
        let mut rx = monitor.subscribe();
        monitor.start();
        assert!(monitor.is_running());

        rx.changed().await.unwrap();
        assert!(!monitor.controls_enabled());

        engine
            .process_sample(Position::now(Coordinates::new(40.0001, -74.0)))
            .await
            .unwrap();
        // Not re-evaluated until the next tick.
        assert!(!monitor.controls_enabled());

        tokio::time::sleep(DEFAULT_PRESENCE_INTERVAL + Duration::from_secs(1)).await;
        assert!(monitor.controls_enabled());

        monitor.stop();
        assert!(!monitor.is_running());
    }
}
