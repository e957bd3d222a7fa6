//! Application configuration management.
//!
//! Configuration is read from a TOML file and then overridden by environment
//! variables of the form `GEOENTRY__SECTION__KEY` (for example
//! `GEOENTRY__WATCH__INTERVAL_MS=2000`). Every field has a default, so an
//! empty or missing file yields a working configuration.
//!
//! ```toml
//! [proximity]
//! enabled = true
//! show_notifications = true
//!
//! [watch]
//! interval_ms = 5000
//! min_distance_meters = 10.0
//! accuracy = "best_for_navigation"
//!
//! [presence]
//! poll_interval_secs = 10
//! source = "local"
//!
//! [mirror]
//! base_url = "https://api.example.com/"
//! device_id = "pixel-8"
//! ```

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::sampler::{Accuracy, WatchOptions};
use crate::settings::ProximitySettings;

/// Environment variable prefix for overrides.
pub const ENV_PREFIX: &str = "GEOENTRY";

/// Result type for configuration operations.
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Errors raised while loading, saving or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file does not exist.
    #[error("Configuration file not found: {}", .0.display())]
    NotFound(PathBuf),

    /// Failed to write the configuration file.
    #[error("Failed to write {}: {source}", path.display())]
    WriteError {
        /// File path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The file or environment could not be merged or deserialized.
    #[error("Failed to load configuration: {0}")]
    Load(#[from] ::config::ConfigError),

    /// The configuration could not be serialized to TOML.
    #[error("Failed to serialize configuration: {0}")]
    SerializeError(#[from] toml::ser::Error),

    /// A single field failed validation.
    #[error("Invalid value for '{field}': {message}")]
    ValidationError {
        /// Dotted field path.
        field: String,
        /// What is wrong with it.
        message: String,
    },

    /// Several fields failed validation.
    #[error("Configuration has {} validation errors", .0.len())]
    MultipleValidationErrors(Vec<ConfigError>),
}

impl ConfigError {
    fn invalid(field: &str, message: impl Into<String>) -> Self {
        Self::ValidationError {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeoentryConfig {
    /// Initial proximity settings, used until settings are first saved.
    pub proximity: ProximityConfig,
    /// Continuous location watch.
    pub watch: WatchConfig,
    /// One-shot location requests.
    pub location: LocationConfig,
    /// Device-control presence gate.
    pub presence: PresenceConfig,
    /// Remote event mirror.
    pub mirror: MirrorConfig,
    /// Data directory.
    pub storage: StorageConfig,
    /// HTTP host.
    pub server: ServerConfig,
}

/// Initial proximity settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
#[allow(clippy::struct_excessive_bools)]
pub struct ProximityConfig {
    /// Master switch.
    pub enabled: bool,
    /// Show the "near home" prompt.
    pub show_notifications: bool,
    /// Trigger devices automatically on arrival.
    pub auto_trigger_devices: bool,
    /// Play a sound with the prompt.
    pub notification_sound: bool,
    /// Vibrate with the prompt.
    pub vibration: bool,
}

impl Default for ProximityConfig {
    fn default() -> Self {
        let defaults = ProximitySettings::default();
        Self {
            enabled: defaults.is_enabled,
            show_notifications: defaults.show_notifications,
            auto_trigger_devices: defaults.auto_trigger_devices,
            notification_sound: defaults.notification_sound,
            vibration: defaults.vibration,
        }
    }
}

impl ProximityConfig {
    /// Convert to runtime settings.
    #[must_use]
    pub const fn to_settings(self) -> ProximitySettings {
        ProximitySettings {
            is_enabled: self.enabled,
            show_notifications: self.show_notifications,
            auto_trigger_devices: self.auto_trigger_devices,
            notification_sound: self.notification_sound,
            vibration: self.vibration,
        }
    }
}

/// Continuous watch configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
    /// Start watching as soon as the host starts.
    pub auto_start: bool,
    /// Sampling interval in milliseconds.
    pub interval_ms: u64,
    /// Minimum movement in meters before a sample is delivered.
    pub min_distance_meters: f64,
    /// Requested accuracy.
    pub accuracy: Accuracy,
}

impl Default for WatchConfig {
    fn default() -> Self {
        let options = WatchOptions::default();
        Self {
            auto_start: true,
            interval_ms: options.interval_ms,
            min_distance_meters: options.min_distance_meters,
            accuracy: options.accuracy,
        }
    }
}

/// One-shot location configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocationConfig {
    /// Timeout for a one-shot fix, in seconds.
    pub timeout_secs: u64,
}

impl Default for LocationConfig {
    fn default() -> Self {
        Self { timeout_secs: 15 }
    }
}

/// Where the presence gate reads events from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PresenceSource {
    /// Local transition history.
    #[default]
    Local,
    /// The remote event mirror.
    Remote,
}

/// Presence gate configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PresenceConfig {
    /// Re-evaluation interval in seconds.
    pub poll_interval_secs: u64,
    /// Event source.
    pub source: PresenceSource,
}

impl Default for PresenceConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 10,
            source: PresenceSource::Local,
        }
    }
}

/// Remote event mirror configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MirrorConfig {
    /// Backend base URL. The mirror is disabled when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// Device id attached to published events.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,
    /// User id attached to published events.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for MirrorConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            device_id: None,
            user_id: None,
            timeout_secs: 15,
        }
    }
}

/// Storage configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Data directory; the platform default is used when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,
}

/// HTTP host configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Listen address.
    pub bind_address: String,
    /// Production logging (JSON files) instead of pretty stdout.
    pub production: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:3000".to_string(),
            production: false,
        }
    }
}

impl GeoentryConfig {
    /// Load configuration from `path` plus environment overrides.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NotFound`] if the file is missing, or a load or
    /// validation error.
    pub fn load(path: &Path) -> ConfigResult<Self> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }
        Self::build(Some(path), environment())
    }

    /// Load configuration from `path` if it exists, otherwise from defaults.
    /// Environment overrides apply either way.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be parsed or fails validation.
    pub fn load_or_default(path: &Path) -> ConfigResult<Self> {
        Self::build(path.exists().then_some(path), environment())
    }

    fn build(path: Option<&Path>, env: ::config::Environment) -> ConfigResult<Self> {
        let mut builder = ::config::Config::builder();
        if let Some(path) = path {
            debug!(path = %path.display(), "Loading configuration file");
            builder = builder
                .add_source(::config::File::from(path).format(::config::FileFormat::Toml));
        }
        let config: Self = builder.add_source(env).build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Write the configuration to `path` as TOML, creating parent directories.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write fails.
    pub fn save(&self, path: &Path) -> ConfigResult<()> {
        let content = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| ConfigError::WriteError {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        std::fs::write(path, content).map_err(|source| ConfigError::WriteError {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Check every field, collecting all failures.
    ///
    /// # Errors
    ///
    /// Returns a single [`ConfigError::ValidationError`] or
    /// [`ConfigError::MultipleValidationErrors`].
    pub fn validate(&self) -> ConfigResult<()> {
        let mut errors = Vec::new();

        if self.watch.interval_ms == 0 {
            errors.push(ConfigError::invalid("watch.interval_ms", "must be greater than 0"));
        }
        if !self.watch.min_distance_meters.is_finite() || self.watch.min_distance_meters < 0.0 {
            errors.push(ConfigError::invalid(
                "watch.min_distance_meters",
                "must be a non-negative number",
            ));
        }
        if self.location.timeout_secs == 0 {
            errors.push(ConfigError::invalid("location.timeout_secs", "must be greater than 0"));
        }
        if self.presence.poll_interval_secs == 0 {
            errors.push(ConfigError::invalid(
                "presence.poll_interval_secs",
                "must be greater than 0",
            ));
        }
        if self.mirror.timeout_secs == 0 {
            errors.push(ConfigError::invalid("mirror.timeout_secs", "must be greater than 0"));
        }
        if let Some(base) = &self.mirror.base_url {
            match url::Url::parse(base) {
                Ok(u) if matches!(u.scheme(), "http" | "https") => {}
                Ok(u) => errors.push(ConfigError::invalid(
                    "mirror.base_url",
                    format!("unsupported scheme '{}'", u.scheme()),
                )),
                Err(e) => errors.push(ConfigError::invalid("mirror.base_url", e.to_string())),
            }
        }
        if self.presence.source == PresenceSource::Remote && self.mirror.base_url.is_none() {
            errors.push(ConfigError::invalid(
                "presence.source",
                "'remote' requires mirror.base_url",
            ));
        }
        if self.server.bind_address.parse::<SocketAddr>().is_err() {
            errors.push(ConfigError::invalid(
                "server.bind_address",
                format!("'{}' is not a socket address", self.server.bind_address),
            ));
        }

        match errors.len() {
            0 => Ok(()),
            1 => Err(errors.remove(0)),
            _ => Err(ConfigError::MultipleValidationErrors(errors)),
        }
    }

    /// Watch options derived from `[watch]`.
    #[must_use]
    pub const fn watch_options(&self) -> WatchOptions {
        WatchOptions {
            interval_ms: self.watch.interval_ms,
            min_distance_meters: self.watch.min_distance_meters,
            accuracy: self.watch.accuracy,
        }
    }

    /// One-shot location timeout.
    #[must_use]
    pub const fn location_timeout(&self) -> Duration {
        Duration::from_secs(self.location.timeout_secs)
    }

    /// Presence re-evaluation interval.
    #[must_use]
    pub const fn presence_interval(&self) -> Duration {
        Duration::from_secs(self.presence.poll_interval_secs)
    }

    /// Default configuration file path.
    ///
    /// On Linux hosts: `/etc/geoentry/config.toml`
    /// Elsewhere: `config.toml` in the platform config directory.
    #[must_use]
    pub fn default_path() -> PathBuf {
        #[cfg(target_os = "linux")]
        {
            PathBuf::from("/etc/geoentry/config.toml")
        }
        #[cfg(not(target_os = "linux"))]
        {
            directories::ProjectDirs::from("", "", "geoentry").map_or_else(
                || PathBuf::from("config.toml"),
                |dirs| dirs.config_dir().join("config.toml"),
            )
        }
    }
}

fn environment() -> ::config::Environment {
    ::config::Environment::with_prefix(ENV_PREFIX)
        .separator("__")
        .try_parsing(true)
}
