//! Great-circle distance between geographic coordinates.
//!
//! Distances use the haversine formula on a spherical Earth with the mean
//! radius below. Inputs are decimal degrees (WGS84). The functions here do not
//! validate their inputs: non-finite degrees propagate `NaN` instead of
//! failing, so callers must pass finite values.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Mean Earth radius in meters.
pub const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

/// A geographic position in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({"latitude": 40.0, "longitude": -74.0}))]
pub struct Coordinates {
    /// Latitude in degrees, -90 to 90.
    #[schema(example = 40.0, minimum = -90.0, maximum = 90.0)]
    pub latitude: f64,

    /// Longitude in degrees, -180 to 180.
    #[schema(example = -74.0, minimum = -180.0, maximum = 180.0)]
    pub longitude: f64,
}

impl Coordinates {
    /// Create a coordinate pair.
    #[must_use]
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Returns `true` if both components are finite and inside their ranges.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }

    /// Distance in meters to another position.
    #[must_use]
    pub fn distance_to(&self, other: &Self) -> f64 {
        distance(*self, *other)
    }
}

/// Haversine distance in meters between two positions.
#[must_use]
pub fn distance(a: Coordinates, b: Coordinates) -> f64 {
    let phi1 = a.latitude.to_radians();
    let phi2 = b.latitude.to_radians();
    let delta_phi = (b.latitude - a.latitude).to_radians();
    let delta_lambda = (b.longitude - a.longitude).to_radians();

    let sin_dphi = (delta_phi / 2.0).sin();
    let sin_dlambda = (delta_lambda / 2.0).sin();
    let h = sin_dphi * sin_dphi + phi1.cos() * phi2.cos() * sin_dlambda * sin_dlambda;
    // Rounding can push h a hair above 1 for antipodal points.
    let c = 2.0 * h.sqrt().atan2((1.0 - h).max(0.0).sqrt());

    EARTH_RADIUS_METERS * c
}

/// Human-readable distance: whole meters below 1 km, otherwise kilometers
/// with one decimal.
#[must_use]
pub fn format_distance(meters: f64) -> String {
    if meters < 1000.0 {
        format!("{:.0}m", meters.round())
    } else {
        format!("{:.1}km", meters / 1000.0)
    }
}
