//! Best-effort publication of proximity events to a remote backend.
//!
//! The engine hands every transition to an [`EventMirror`] in the background.
//! Mirror failures are logged and never reach detection. The same backend is
//! also the remote source for the presence gate.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, instrument};
use url::Url;
use utoipa::ToSchema;

use crate::event::{EventType, ProximityEventPayload};

/// Errors from the remote event backend.
#[derive(Debug, Error)]
pub enum MirrorError {
    /// The backend did not pass its health check.
    #[error("Remote backend is unreachable or unhealthy")]
    Unhealthy,

    /// The HTTP request itself failed.
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The base URL is invalid.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// The backend answered with a non-success status.
    #[error("Backend returned {status}: {body}")]
    Status {
        /// HTTP status.
        status: StatusCode,
        /// Response body, possibly empty.
        body: String,
    },
}

/// An event as stored by the remote backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct RemoteEvent {
    /// Backend id.
    pub id: String,
    /// `"enter"` or `"exit"`.
    #[serde(rename = "type")]
    pub event_type: String,
    /// Sample latitude.
    pub latitude: f64,
    /// Sample longitude.
    pub longitude: f64,
    /// Distance to the zone center in meters.
    pub distance: f64,
    /// Zone id.
    pub home_location_id: String,
    /// Zone name.
    pub home_location_name: String,
    /// Reporting device.
    #[serde(default)]
    pub device_id: Option<String>,
    /// Reporting user.
    #[serde(default)]
    pub user_id: Option<String>,
    /// When the backend stored the event.
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl RemoteEvent {
    /// Parsed event type, if recognised.
    #[must_use]
    pub fn kind(&self) -> Option<EventType> {
        EventType::parse(&self.event_type)
    }
}

/// Destination for proximity events.
#[async_trait]
pub trait EventMirror: Send + Sync {
    /// Publish one event.
    ///
    /// # Errors
    ///
    /// Returns a [`MirrorError`] if the backend is unhealthy or rejects it.
    async fn publish(&self, payload: &ProximityEventPayload) -> Result<(), MirrorError>;

    /// Fetch every event the backend holds.
    ///
    /// # Errors
    ///
    /// Returns a [`MirrorError`] if the request fails.
    async fn fetch_events(&self) -> Result<Vec<RemoteEvent>, MirrorError>;
}

/// HTTP client for the remote event backend.
///
/// Endpoints, relative to the base URL:
/// - `GET /` health check (200 or 404 count as healthy)
/// - `POST /location` publish an event
/// - `GET /events` list events
#[derive(Debug, Clone)]
pub struct HttpEventMirror {
    client: Client,
    base_url: Url,
}

impl HttpEventMirror {
    /// Create a client for `base_url` with a per-request timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid or the client cannot be built.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, MirrorError> {
        let mut base_url = Url::parse(base_url)?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("geoentry/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self { client, base_url })
    }

    /// Base URL, always ending in `/`.
    #[must_use]
    pub const fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Probe the base URL.
    pub async fn is_healthy(&self) -> bool {
        match self.client.get(self.base_url.clone()).send().await {
            Ok(response) => {
                let status = response.status();
                status.is_success() || status == StatusCode::NOT_FOUND
            }
            Err(e) => {
                debug!(error = %e, "Health check failed");
                false
            }
        }
    }

    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, MirrorError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(MirrorError::Status { status, body })
    }
}

#[async_trait]
impl EventMirror for HttpEventMirror {
    #[instrument(
        skip(self, payload),
        fields(event = %payload.event_type, zone_id = %payload.home_zone_id)
    )]
    async fn publish(&self, payload: &ProximityEventPayload) -> Result<(), MirrorError> {
        if !self.is_healthy().await {
            return Err(MirrorError::Unhealthy);
        }

        let url = self.base_url.join("location")?;
        let response = self.client.post(url).json(payload).send().await?;
        Self::check_status(response).await?;
        debug!("Event published");
        Ok(())
    }

    async fn fetch_events(&self) -> Result<Vec<RemoteEvent>, MirrorError> {
        let url = self.base_url.join("events")?;
        let response = self.client.get(url).send().await?;
        let events = Self::check_status(response).await?.json().await?;
        Ok(events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_gets_trailing_slash() {
        let mirror =
            HttpEventMirror::new("http://localhost:8080/api", Duration::from_secs(1)).unwrap();
        assert_eq!(mirror.base_url().as_str(), "http://localhost:8080/api/");
        assert_eq!(
            mirror.base_url().join("location").unwrap().as_str(),
            "http://localhost:8080/api/location"
        );
    }

    #[test]
    fn test_invalid_base_url() {
        assert!(matches!(
            HttpEventMirror::new("not a url", Duration::from_secs(1)),
            Err(MirrorError::InvalidUrl(_))
        ));
    }

    #[test]
    fn test_remote_event_parses_backend_shape() {
        let json = r#"{
            "id": "42",
            "type": "enter",
            "latitude": 40.0,
            "longitude": -74.0,
            "distance": 12.5,
            "home_location_id": "abc",
            "home_location_name": "Home",
            "device_id": null,
            "user_id": null,
            "created_at": "2025-01-15T03:30:00Z"
        }"#;
        let event: RemoteEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event.kind(), Some(EventType::Enter));
        assert!(event.created_at.is_some());
        assert!(event.device_id.is_none());
    }

    #[tokio::test]
    async fn test_unreachable_backend_is_unhealthy() {
        // Port 9 (discard) on localhost is closed on test hosts.
        let mirror =
            HttpEventMirror::new("http://127.0.0.1:9/", Duration::from_millis(500)).unwrap();
        assert!(!mirror.is_healthy().await);
    }
}
