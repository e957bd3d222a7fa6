//! Persistent storage for zones, settings and history.
//!
//! Everything lives as pretty-printed JSON in a single data directory:
//! `zones.json`, `settings.json` and `history.json`. Missing files read as
//! empty or default values.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use crate::history::{HistoryEntry, HistoryLog};
use crate::settings::ProximitySettings;
use crate::zone::{HomeZone, HomeZoneUpdate, NewHomeZone, ZoneError, ZoneStore};

const ZONES_FILE: &str = "zones.json";
const SETTINGS_FILE: &str = "settings.json";
const HISTORY_FILE: &str = "history.json";

/// Errors raised by the JSON file store.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Failed to read a data file.
    #[error("Failed to read {}: {source}", path.display())]
    ReadError {
        /// File path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to write a data file.
    #[error("Failed to write {}: {source}", path.display())]
    WriteError {
        /// File path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// A data file held invalid JSON.
    #[error("Failed to parse {}: {source}", path.display())]
    ParseError {
        /// File path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: serde_json::Error,
    },

    /// A value could not be serialized.
    #[error("Failed to serialize data: {0}")]
    SerializeError(#[source] serde_json::Error),

    /// The data directory could not be created.
    #[error("Failed to create directory {}: {source}", path.display())]
    CreateDirError {
        /// Directory path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// No platform data directory could be determined.
    #[error("Cannot determine data directory")]
    NoDataDir,
}

/// JSON file storage rooted at a data directory.
#[derive(Debug, Clone)]
pub struct Storage {
    data_dir: PathBuf,
}

impl Storage {
    /// Create a storage instance rooted at `data_dir`.
    #[must_use]
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    /// Get the default storage location.
    ///
    /// On Linux hosts: `/var/lib/geoentry/`
    /// Elsewhere: the platform data directory for `geoentry`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::NoDataDir`] if no home directory is known.
    pub fn default_location() -> Result<Self, StorageError> {
        #[cfg(target_os = "linux")]
        {
            Ok(Self::new("/var/lib/geoentry"))
        }
        #[cfg(not(target_os = "linux"))]
        {
            let dirs = directories::ProjectDirs::from("", "", "geoentry")
                .ok_or(StorageError::NoDataDir)?;
            Ok(Self::new(dirs.data_dir()))
        }
    }

    /// Data directory.
    #[must_use]
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Load all zones, in creation order.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load_zones(&self) -> Result<Vec<HomeZone>, StorageError> {
        Ok(self.read_json(ZONES_FILE)?.unwrap_or_default())
    }

    /// Replace the stored zone list.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save_zones(&self, zones: &[HomeZone]) -> Result<(), StorageError> {
        self.write_json(ZONES_FILE, zones)
    }

    /// Load settings, falling back to defaults when none are stored.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load_settings(&self) -> Result<ProximitySettings, StorageError> {
        Ok(self.read_json(SETTINGS_FILE)?.unwrap_or_default())
    }

    /// Whether settings have been saved before.
    #[must_use]
    pub fn has_settings(&self) -> bool {
        self.data_dir.join(SETTINGS_FILE).exists()
    }

    /// Persist settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save_settings(&self, settings: &ProximitySettings) -> Result<(), StorageError> {
        self.write_json(SETTINGS_FILE, settings)
    }

    /// Load the history log.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load_history(&self) -> Result<HistoryLog, StorageError> {
        let entries: Vec<HistoryEntry> = self.read_json(HISTORY_FILE)?.unwrap_or_default();
        Ok(HistoryLog::from_entries(entries))
    }

    /// Persist the history log.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save_history(&self, history: &HistoryLog) -> Result<(), StorageError> {
        self.write_json(HISTORY_FILE, history)
    }

    fn read_json<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>, StorageError> {
        let path = self.data_dir.join(name);
        if !path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(&path).map_err(|source| StorageError::ReadError {
            path: path.clone(),
            source,
        })?;
        serde_json::from_str(&content)
            .map(Some)
            .map_err(|source| StorageError::ParseError { path, source })
    }

    fn write_json<T: Serialize + ?Sized>(&self, name: &str, value: &T) -> Result<(), StorageError> {
        std::fs::create_dir_all(&self.data_dir).map_err(|source| StorageError::CreateDirError {
            path: self.data_dir.clone(),
            source,
        })?;
        let path = self.data_dir.join(name);
        let content = serde_json::to_string_pretty(value).map_err(StorageError::SerializeError)?;
        std::fs::write(&path, content).map_err(|source| StorageError::WriteError {
            path: path.clone(),
            source,
        })?;
        debug!(path = %path.display(), "Saved data file");
        Ok(())
    }
}

/// Zone store backed by `zones.json`.
///
/// Zones are cached in memory and the whole list is rewritten on every
/// mutation.
#[derive(Debug)]
pub struct JsonZoneStore {
    storage: Storage,
    zones: Mutex<Vec<HomeZone>>,
}

impl JsonZoneStore {
    /// Open the store, loading any existing zones.
    ///
    /// # Errors
    ///
    /// Returns an error if `zones.json` exists but cannot be read.
    pub fn open(storage: Storage) -> Result<Self, StorageError> {
        let zones = storage.load_zones()?;
        Ok(Self {
            storage,
            zones: Mutex::new(zones),
        })
    }

    fn mutate<T>(
        &self,
        f: impl FnOnce(&mut Vec<HomeZone>) -> Result<T, ZoneError>,
    ) -> Result<T, ZoneError> {
        let mut zones = self.zones.lock().unwrap_or_else(PoisonError::into_inner);
        let mut next = zones.clone();
        let out = f(&mut next)?;
        self.storage.save_zones(&next)?;
        *zones = next;
        Ok(out)
    }
}

impl ZoneStore for JsonZoneStore {
    fn list_zones(&self) -> Result<Vec<HomeZone>, ZoneError> {
        Ok(self
            .zones
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }

    fn save_zone(&self, zone: NewHomeZone) -> Result<HomeZone, ZoneError> {
        let zone = HomeZone::create(zone)?;
        self.mutate(|zones| {
            zones.push(zone.clone());
            Ok(zone)
        })
    }

    fn update_zone(&self, id: Uuid, update: HomeZoneUpdate) -> Result<HomeZone, ZoneError> {
        self.mutate(|zones| {
            let slot = zones
                .iter_mut()
                .find(|z| z.id == id)
                .ok_or(ZoneError::NotFound(id))?;
            *slot = slot.with_update(update)?;
            Ok(slot.clone())
        })
    }

    fn delete_zone(&self, id: Uuid) -> Result<HomeZone, ZoneError> {
        self.mutate(|zones| {
            let index = zones
                .iter()
                .position(|z| z.id == id)
                .ok_or(ZoneError::NotFound(id))?;
            Ok(zones.remove(index))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventType;
    use crate::geo::Coordinates;
    use tempfile::TempDir;

    fn new_zone(name: &str) -> NewHomeZone {
        NewHomeZone {
            name: name.to_string(),
            coordinates: Coordinates::new(40.0, -74.0),
            radius_meters: 100.0,
            is_active: true,
            address: Some("1 Main St".to_string()),
        }
    }

    #[test]
    fn test_missing_files_load_defaults() {
        let dir = TempDir::new().unwrap();
        let storage = Storage::new(dir.path().join("nested"));

        assert!(storage.load_zones().unwrap().is_empty());
        assert_eq!(storage.load_settings().unwrap(), ProximitySettings::default());
        assert!(storage.load_history().unwrap().is_empty());
    }

    #[test]
    fn test_settings_and_history_persist() {
        let dir = TempDir::new().unwrap();
        let storage = Storage::new(dir.path());

        let settings = ProximitySettings {
            show_notifications: false,
            ..ProximitySettings::default()
        };
        storage.save_settings(&settings).unwrap();
        assert_eq!(storage.load_settings().unwrap(), settings);

        let mut history = HistoryLog::new();
        history.record(Uuid::now_v7(), EventType::Enter, 12.0);
        storage.save_history(&history).unwrap();
        assert_eq!(storage.load_history().unwrap(), history);
    }

    #[test]
    fn test_corrupt_file_is_parse_error() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(ZONES_FILE), "not json").unwrap();

        let err = Storage::new(dir.path()).load_zones().unwrap_err();
        assert!(matches!(err, StorageError::ParseError { .. }));
    }

    #[test]
    fn test_json_zone_store_survives_reopen() {
        let dir = TempDir::new().unwrap();
        let store = JsonZoneStore::open(Storage::new(dir.path())).unwrap();
        let a = store.save_zone(new_zone("Home")).unwrap();
        let b = store.save_zone(new_zone("Cabin")).unwrap();
        store.delete_zone(b.id).unwrap();

        let reopened = JsonZoneStore::open(Storage::new(dir.path())).unwrap();
        let zones = reopened.list_zones().unwrap();
        assert_eq!(zones.len(), 1);
        assert_eq!(zones[0].id, a.id);
        assert_eq!(zones[0].address.as_deref(), Some("1 Main St"));
    }

    #[test]
    fn test_failed_update_leaves_store_unchanged() {
        let dir = TempDir::new().unwrap();
        let store = JsonZoneStore::open(Storage::new(dir.path())).unwrap();
        let zone = store.save_zone(new_zone("Home")).unwrap();

        let result = store.update_zone(
            zone.id,
            HomeZoneUpdate {
                radius_meters: Some(-1.0),
                ..HomeZoneUpdate::default()
            },
        );
        assert!(matches!(result, Err(ZoneError::InvalidRadius(_))));
        assert_eq!(store.list_zones().unwrap()[0].radius_meters, 100.0);

        assert!(matches!(
            store.update_zone(Uuid::now_v7(), HomeZoneUpdate::default()),
            Err(ZoneError::NotFound(_))
        ));
    }
}
