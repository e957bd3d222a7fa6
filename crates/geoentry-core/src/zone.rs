//! Home zones and the zone storage contract.
//!
//! A home zone is a named circular geofence. Zones are owned by the user and
//! edited through a [`ZoneStore`]; the proximity engine only ever reads the
//! current list when it evaluates a sample.

use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::geo::{distance, Coordinates};
use crate::storage::StorageError;

/// Suggested zone radii in meters.
pub const RADIUS_OPTIONS: [f64; 5] = [50.0, 100.0, 200.0, 500.0, 1000.0];

/// Maximum length of a zone name in characters.
pub const MAX_NAME_LENGTH: usize = 100;

/// Errors raised while validating or storing home zones.
#[derive(Debug, Error)]
pub enum ZoneError {
    /// The zone name is empty or whitespace.
    #[error("Zone name cannot be empty")]
    EmptyName,

    /// The zone name exceeds [`MAX_NAME_LENGTH`].
    #[error("Zone name exceeds maximum length of {max} characters (got {actual})")]
    NameTooLong {
        /// Maximum allowed length.
        max: usize,
        /// Actual length provided.
        actual: usize,
    },

    /// The zone center is outside the valid latitude/longitude ranges.
    #[error("Invalid coordinates ({latitude}, {longitude}): latitude must be -90..90, longitude -180..180")]
    InvalidCoordinates {
        /// Rejected latitude.
        latitude: f64,
        /// Rejected longitude.
        longitude: f64,
    },

    /// The radius is not a positive finite number.
    #[error("Zone radius must be a positive number of meters (got {0})")]
    InvalidRadius(f64),

    /// No zone exists with the given id.
    #[error("Home zone not found: {0}")]
    NotFound(Uuid),

    /// The backing store failed.
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// A named circular geofence designated as "home".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
#[schema(example = json!({
    "id": "01936f4e-6a2b-7c3d-9e8f-0a1b2c3d4e5f",
    "name": "Home",
    "coordinates": {"latitude": 40.0, "longitude": -74.0},
    "radiusMeters": 100.0,
    "isActive": true,
    "address": "1 Main St",
    "createdAt": "2025-01-15T03:30:00Z"
}))]
pub struct HomeZone {
    /// Unique zone id (UUID v7, so ids sort by creation time).
    pub id: Uuid,

    /// Display name.
    #[schema(example = "Home")]
    pub name: String,

    /// Zone center.
    pub coordinates: Coordinates,

    /// Zone radius in meters.
    #[schema(example = 100.0)]
    pub radius_meters: f64,

    /// Only active zones take part in proximity evaluation.
    pub is_active: bool,

    /// Optional street address.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,

    /// When the zone was created.
    pub created_at: DateTime<Utc>,
}

/// Payload for creating a zone; the store assigns `id` and `createdAt`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NewHomeZone {
    /// Display name.
    #[schema(example = "Home")]
    pub name: String,

    /// Zone center.
    pub coordinates: Coordinates,

    /// Zone radius in meters.
    #[schema(example = 100.0)]
    pub radius_meters: f64,

    /// Whether the zone starts active. Defaults to `true`.
    #[serde(default = "default_active")]
    pub is_active: bool,

    /// Optional street address.
    #[serde(default)]
    pub address: Option<String>,
}

const fn default_active() -> bool {
    true
}

/// Partial update of a zone. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct HomeZoneUpdate {
    /// New display name.
    pub name: Option<String>,
    /// New center.
    pub coordinates: Option<Coordinates>,
    /// New radius in meters.
    pub radius_meters: Option<f64>,
    /// New active flag.
    pub is_active: Option<bool>,
    /// New address.
    pub address: Option<String>,
}

impl HomeZone {
    /// Build a zone from a creation payload, assigning a fresh id and
    /// creation timestamp.
    ///
    /// # Errors
    ///
    /// Returns a [`ZoneError`] if the payload fails validation.
    pub fn create(new: NewHomeZone) -> Result<Self, ZoneError> {
        let zone = Self {
            id: Uuid::now_v7(),
            name: new.name.trim().to_string(),
            coordinates: new.coordinates,
            radius_meters: new.radius_meters,
            is_active: new.is_active,
            address: new.address.filter(|a| !a.trim().is_empty()),
            created_at: Utc::now(),
        };
        zone.validate()?;
        Ok(zone)
    }

    /// Return a copy of this zone with `update` applied.
    ///
    /// # Errors
    ///
    /// Returns a [`ZoneError`] if the updated zone fails validation.
    pub fn with_update(&self, update: HomeZoneUpdate) -> Result<Self, ZoneError> {
        let mut zone = self.clone();
        if let Some(name) = update.name {
            zone.name = name.trim().to_string();
        }
        if let Some(coordinates) = update.coordinates {
            zone.coordinates = coordinates;
        }
        if let Some(radius) = update.radius_meters {
            zone.radius_meters = radius;
        }
        if let Some(active) = update.is_active {
            zone.is_active = active;
        }
        if let Some(address) = update.address {
            zone.address = Some(address).filter(|a| !a.trim().is_empty());
        }
        zone.validate()?;
        Ok(zone)
    }

    /// Check name, coordinates and radius.
    ///
    /// # Errors
    ///
    /// Returns the first failing rule as a [`ZoneError`].
    pub fn validate(&self) -> Result<(), ZoneError> {
        let name_len = self.name.chars().count();
        if self.name.trim().is_empty() {
            return Err(ZoneError::EmptyName);
        }
        if name_len > MAX_NAME_LENGTH {
            return Err(ZoneError::NameTooLong {
                max: MAX_NAME_LENGTH,
                actual: name_len,
            });
        }
        if !self.coordinates.is_valid() {
            return Err(ZoneError::InvalidCoordinates {
                latitude: self.coordinates.latitude,
                longitude: self.coordinates.longitude,
            });
        }
        if !self.radius_meters.is_finite() || self.radius_meters <= 0.0 {
            return Err(ZoneError::InvalidRadius(self.radius_meters));
        }
        Ok(())
    }

    /// Distance in meters from `position` to the zone center.
    #[must_use]
    pub fn distance_from(&self, position: Coordinates) -> f64 {
        distance(position, self.coordinates)
    }

    /// Returns `true` if `position` lies inside the radius (boundary inclusive).
    #[must_use]
    pub fn contains(&self, position: Coordinates) -> bool {
        self.distance_from(position) <= self.radius_meters
    }
}

/// Storage contract for home zones.
///
/// Implementations return zones in creation order so that nearest-zone ties
/// resolve the same way on every sample.
pub trait ZoneStore: Send + Sync {
    /// List every zone, active or not.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store cannot be read.
    fn list_zones(&self) -> Result<Vec<HomeZone>, ZoneError>;

    /// Validate and persist a new zone.
    ///
    /// # Errors
    ///
    /// Returns an error on validation or storage failure.
    fn save_zone(&self, zone: NewHomeZone) -> Result<HomeZone, ZoneError>;

    /// Apply a partial update to an existing zone.
    ///
    /// # Errors
    ///
    /// Returns [`ZoneError::NotFound`] for unknown ids, or a validation or
    /// storage error.
    fn update_zone(&self, id: Uuid, update: HomeZoneUpdate) -> Result<HomeZone, ZoneError>;

    /// Remove a zone, returning it.
    ///
    /// # Errors
    ///
    /// Returns [`ZoneError::NotFound`] for unknown ids, or a storage error.
    fn delete_zone(&self, id: Uuid) -> Result<HomeZone, ZoneError>;
}

/// In-memory zone store.
#[derive(Debug, Default)]
pub struct MemoryZoneStore {
    zones: Mutex<Vec<HomeZone>>,
}

impl MemoryZoneStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with `zones`.
    #[must_use]
    pub fn with_zones(zones: Vec<HomeZone>) -> Self {
        Self {
            zones: Mutex::new(zones),
        }
    }
}

impl ZoneStore for MemoryZoneStore {
    fn list_zones(&self) -> Result<Vec<HomeZone>, ZoneError> {
        Ok(self
            .zones
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }

    fn save_zone(&self, zone: NewHomeZone) -> Result<HomeZone, ZoneError> {
        let zone = HomeZone::create(zone)?;
        self.zones
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(zone.clone());
        Ok(zone)
    }

    fn update_zone(&self, id: Uuid, update: HomeZoneUpdate) -> Result<HomeZone, ZoneError> {
        let mut zones = self.zones.lock().unwrap_or_else(PoisonError::into_inner);
        let slot = zones
            .iter_mut()
            .find(|z| z.id == id)
            .ok_or(ZoneError::NotFound(id))?;
        let updated = slot.with_update(update)?;
        *slot = updated.clone();
        Ok(updated)
    }

    fn delete_zone(&self, id: Uuid) -> Result<HomeZone, ZoneError> {
        let mut zones = self.zones.lock().unwrap_or_else(PoisonError::into_inner);
        let index = zones
            .iter()
            .position(|z| z.id == id)
            .ok_or(ZoneError::NotFound(id))?;
        Ok(zones.remove(index))
    }
}
