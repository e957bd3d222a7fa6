//! Host-fed location platform.
//!
//! [`PushLocationPlatform`] is driven from outside: the host (the HTTP
//! server, a test) calls [`PushLocationPlatform::push`] whenever the device
//! reports a fix. One-shot requests return the newest fix, or wait for the
//! next one; watch subscriptions receive every pushed fix that passes their
//! minimum-distance filter.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use tokio::sync::{mpsc, watch};
use tracing::{debug, warn};

use super::platform::{
    Accuracy, LocationError, LocationPlatform, PermissionStatus, Position, PositionSubscription,
    WatchOptions,
};
use crate::geo::{distance, Coordinates};

const SUBSCRIPTION_BUFFER: usize = 64;

#[derive(Debug)]
struct Subscriber {
    tx: mpsc::Sender<Position>,
    min_distance_meters: f64,
    last_delivered: Option<Coordinates>,
}

impl Subscriber {
    fn wants(&self, position: &Position) -> bool {
        self.last_delivered
            .map_or(true, |last| distance(last, position.coordinates) >= self.min_distance_meters)
    }
}

#[derive(Debug)]
struct Inner {
    permission: Mutex<PermissionStatus>,
    services_enabled: AtomicBool,
    latest: watch::Sender<Option<Position>>,
    subscribers: Mutex<Vec<Subscriber>>,
}

/// Location platform fed by [`push`](Self::push).
#[derive(Debug, Clone)]
pub struct PushLocationPlatform {
    inner: Arc<Inner>,
}

impl Default for PushLocationPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl PushLocationPlatform {
    /// Create a platform with permission granted and services on.
    #[must_use]
    pub fn new() -> Self {
        let (latest, _) = watch::channel(None);
        Self {
            inner: Arc::new(Inner {
                permission: Mutex::new(PermissionStatus::Granted),
                services_enabled: AtomicBool::new(true),
                latest,
                subscribers: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Report a new fix. Returns how many watch subscriptions received it.
    pub fn push(&self, position: Position) -> usize {
        self.inner.latest.send_replace(Some(position));

        let mut subscribers = self
            .inner
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        subscribers.retain(|s| !s.tx.is_closed());

        let mut delivered = 0;
        for subscriber in subscribers.iter_mut().filter(|s| s.wants(&position)) {
            match subscriber.tx.try_send(position) {
                Ok(()) => {
                    subscriber.last_delivered = Some(position.coordinates);
                    delivered += 1;
                }
                Err(mpsc::error::TrySendError::Full(_)) => {
                    warn!("Watch subscriber is not keeping up, dropping fix");
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {}
            }
        }

        debug!(
            latitude = position.coordinates.latitude,
            longitude = position.coordinates.longitude,
            delivered,
            "Location fix pushed"
        );
        delivered
    }

    /// Set the permission state reported to the sampler.
    pub fn set_permission(&self, status: PermissionStatus) {
        *self
            .inner
            .permission
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = status;
    }

    /// Switch device location services on or off.
    pub fn set_services_enabled(&self, enabled: bool) {
        self.inner.services_enabled.store(enabled, Ordering::SeqCst);
    }

    /// Newest pushed fix.
    #[must_use]
    pub fn latest(&self) -> Option<Position> {
        *self.inner.latest.borrow()
    }

    /// Number of open watch subscriptions.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.inner
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|s| !s.tx.is_closed())
            .count()
    }

    fn permission(&self) -> PermissionStatus {
        *self
            .inner
            .permission
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl LocationPlatform for PushLocationPlatform {
    async fn permission_status(&self) -> PermissionStatus {
        self.permission()
    }

    // Nobody to prompt; the host sets the state explicitly.
    async fn request_permission(&self) -> PermissionStatus {
        self.permission()
    }

    async fn services_enabled(&self) -> bool {
        self.inner.services_enabled.load(Ordering::SeqCst)
    }

    async fn current_position(&self, _accuracy: Accuracy) -> Result<Position, LocationError> {
        let mut rx = self.inner.latest.subscribe();
        let position = rx
            .wait_for(Option::is_some)
            .await
            .map(|latest| *latest)
            .map_err(|_| LocationError::Unavailable {
                message: "location source closed".to_string(),
            })?;
        position.ok_or_else(|| LocationError::Unavailable {
            message: "no location fix available".to_string(),
        })
    }

    async fn watch_position(
        &self,
        options: WatchOptions,
    ) -> Result<PositionSubscription, LocationError> {
        if self.permission() != PermissionStatus::Granted {
            return Err(LocationError::PermissionDenied);
        }
        if !self.inner.services_enabled.load(Ordering::SeqCst) {
            return Err(LocationError::ServiceDisabled);
        }

        let (tx, rx) = mpsc::channel(SUBSCRIPTION_BUFFER);
        let mut subscriber = Subscriber {
            tx,
            min_distance_meters: options.min_distance_meters,
            last_delivered: None,
        };
        if let Some(latest) = self.latest() {
            if subscriber.tx.try_send(latest).is_ok() {
                subscriber.last_delivered = Some(latest.coordinates);
            }
        }

        self.inner
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(subscriber);
        Ok(PositionSubscription::new(rx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_pending, assert_ready_ok, block_on, task};

    fn fix(latitude: f64) -> Position {
        Position::now(Coordinates::new(latitude, -74.0))
    }

    #[test]
    fn test_current_position_returns_latest() {
        let platform = PushLocationPlatform::new();
        platform.push(fix(40.0));
        platform.push(fix(41.0));

        let position = block_on(platform.current_position(Accuracy::High)).unwrap();
        assert!((position.coordinates.latitude - 41.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_current_position_waits_for_first_fix() {
        let platform = PushLocationPlatform::new();
        let mut request = task::spawn(platform.current_position(Accuracy::High));
        assert_pending!(request.poll());

        platform.push(fix(40.0));
        assert!(request.is_woken());
        let position = assert_ready_ok!(request.poll());
        assert!((position.coordinates.latitude - 40.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_watch_applies_distance_filter() {
        let platform = PushLocationPlatform::new();
        let mut sub = platform
            .watch_position(WatchOptions {
                min_distance_meters: 50.0,
                ..WatchOptions::default()
            })
            .await
            .unwrap();

        assert_eq!(platform.push(fix(40.0)), 1);
        // ~11m away: filtered out.
        assert_eq!(platform.push(fix(40.0001)), 0);
        // ~111m away: delivered.
        assert_eq!(platform.push(fix(40.001)), 1);

        assert!((sub.next().await.unwrap().coordinates.latitude - 40.0).abs() < f64::EPSILON);
        assert!((sub.next().await.unwrap().coordinates.latitude - 40.001).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_dropped_subscription_is_released() {
        let platform = PushLocationPlatform::new();
        let sub = platform.watch_position(WatchOptions::default()).await.unwrap();
        assert_eq!(platform.subscriber_count(), 1);

        drop(sub);
        assert_eq!(platform.subscriber_count(), 0);
        assert_eq!(platform.push(fix(40.0)), 0);
    }

    #[tokio::test]
    async fn test_watch_refused_without_permission() {
        let platform = PushLocationPlatform::new();
        platform.set_permission(PermissionStatus::Denied);
        assert_eq!(
            platform.watch_position(WatchOptions::default()).await.unwrap_err(),
            LocationError::PermissionDenied
        );

        platform.set_permission(PermissionStatus::Granted);
        platform.set_services_enabled(false);
        assert_eq!(
            platform.watch_position(WatchOptions::default()).await.unwrap_err(),
            LocationError::ServiceDisabled
        );
    }
}
