//! # geoentry-core
//!
//! Core business logic for the geoentry home proximity system.
//!
//! This crate provides:
//! - Great-circle distance and nearest home-zone resolution
//! - Edge-triggered enter/exit detection over a noisy location stream
//! - One-shot and continuous location sampling with cancellable watches
//! - Session-scoped "near home" prompt gating
//! - A capped transition history, persisted as JSON
//! - Best-effort mirroring of events to a remote backend
//! - The presence gate that decides whether device controls are enabled
//!
//! ## Architecture
//!
//! The crate is organized into the following modules:
//!
//! - [`geo`] - Haversine distance and distance formatting
//! - [`zone`] - Home-zone model, validation and the zone store contract
//! - [`resolver`] - Nearest active zone and containment checks
//! - [`detector`] - The near/far state machine
//! - [`event`] - Transition events and their wire payload
//! - [`history`] - Newest-first transition log
//! - [`gate`] - Notification gating for the current near episode
//! - [`settings`] - User-facing proximity settings
//! - [`engine`] - Owner of detection state; wires the pieces together
//! - [`sampler`] - Location platform contract and the sampling loop
//! - [`mirror`] - HTTP client for the remote event backend
//! - [`presence`] - Periodic "at home" evaluation for device controls
//! - [`storage`] - JSON file persistence
//! - [`config`] - Configuration loading, saving and validation
//! - [`error`] - Unified error types for the crate

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![warn(missing_docs)]

pub mod config;
pub mod detector;
pub mod engine;
pub mod error;
pub mod event;
pub mod gate;
pub mod geo;
pub mod history;
pub mod mirror;
pub mod presence;
pub mod resolver;
pub mod sampler;
pub mod settings;
pub mod storage;
pub mod zone;

// Re-export primary types for convenience
pub use config::{ConfigError, ConfigResult, GeoentryConfig, PresenceSource};
pub use detector::{DetectionState, ProximityDetector};
pub use engine::{EngineBuilder, ProximityEngine};
pub use error::{GeoentryError, Result};
pub use event::{EventType, ProximityEvent, ProximityEventPayload, Transition};
pub use gate::{should_notify, NotificationGate, NotificationPrompt};
pub use geo::{distance, format_distance, Coordinates, EARTH_RADIUS_METERS};
pub use history::{HistoryEntry, HistoryLog, HistoryStats, HISTORY_CAPACITY};
pub use mirror::{EventMirror, HttpEventMirror, MirrorError, RemoteEvent};
pub use presence::{
    derive_status, EventRecord, EventSource, HistorySource, PresenceMonitor, PresenceStatus,
    RemoteEventSource,
};
pub use resolver::{check_proximity, find_nearest, NearestZone, ProximityCheck};
pub use sampler::{
    Accuracy, LocationError, LocationPlatform, LocationSampler, PermissionStatus, Position,
    PushLocationPlatform, RecoveryAction, SamplerStatus, WatchOptions,
};
pub use settings::{ProximitySettings, ProximitySettingsUpdate};
pub use storage::{JsonZoneStore, Storage, StorageError};
pub use zone::{
    HomeZone, HomeZoneUpdate, MemoryZoneStore, NewHomeZone, ZoneError, ZoneStore, RADIUS_OPTIONS,
};
