//! Nearest-zone resolution and containment checks.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::geo::{distance, Coordinates};
use crate::zone::HomeZone;

/// The nearest active zone to a position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NearestZone<'a> {
    /// The zone.
    pub zone: &'a HomeZone,
    /// Distance from the position to the zone center, in meters.
    pub distance_meters: f64,
}

/// Find the nearest active zone to `position`.
///
/// Inactive zones are skipped. Returns `None` when no active zone remains.
/// Equidistant zones resolve to the first one in `zones` order.
#[must_use]
pub fn find_nearest(position: Coordinates, zones: &[HomeZone]) -> Option<NearestZone<'_>> {
    let mut nearest: Option<NearestZone<'_>> = None;

    for zone in zones.iter().filter(|z| z.is_active) {
        let d = distance(position, zone.coordinates);
        if nearest.map_or(true, |n| d < n.distance_meters) {
            nearest = Some(NearestZone {
                zone,
                distance_meters: d,
            });
        }
    }

    nearest
}

/// Result of evaluating a position against the zone set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
#[schema(example = json!({
    "isNearHome": true,
    "nearestZone": null,
    "distanceMeters": 42.5,
    "withinRadius": true
}))]
pub struct ProximityCheck {
    /// Mirrors `within_radius`.
    pub is_near_home: bool,

    /// Nearest active zone, if any.
    pub nearest_zone: Option<HomeZone>,

    /// Distance to the nearest zone center in meters.
    pub distance_meters: Option<f64>,

    /// Whether the position is inside the nearest zone (boundary inclusive).
    pub within_radius: bool,
}

impl ProximityCheck {
    /// The reading produced when there is no active zone.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            is_near_home: false,
            nearest_zone: None,
            distance_meters: None,
            within_radius: false,
        }
    }
}

/// Evaluate `position` against the nearest active zone.
#[must_use]
pub fn check_proximity(position: Coordinates, zones: &[HomeZone]) -> ProximityCheck {
    let Some(nearest) = find_nearest(position, zones) else {
        return ProximityCheck::empty();
    };

    let within_radius = nearest.distance_meters <= nearest.zone.radius_meters;

    ProximityCheck {
        is_near_home: within_radius,
        nearest_zone: Some(nearest.zone.clone()),
        distance_meters: Some(nearest.distance_meters),
        within_radius,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    const HOME: Coordinates = Coordinates::new(40.0, -74.0);

    fn zone_at(name: &str, latitude: f64, radius: f64, active: bool) -> HomeZone {
        HomeZone {
            id: Uuid::now_v7(),
            name: name.to_string(),
            coordinates: Coordinates::new(latitude, -74.0),
            radius_meters: radius,
            is_active: active,
            address: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_nearest_selection() {
        // ~50m and ~200m north of the sample.
        let near = zone_at("Z1", 40.00045, 100.0, true);
        let far = zone_at("Z2", 40.0018, 100.0, true);
        let zones = vec![far.clone(), near.clone()];

        let nearest = find_nearest(HOME, &zones).unwrap();
        assert_eq!(nearest.zone.id, near.id);
        assert!((nearest.distance_meters - 50.0).abs() < 1.0);
    }

    #[test]
    fn test_inactive_zone_is_never_selected() {
        let inactive = zone_at("Closest", 40.0, 100.0, false);
        let active = zone_at("Further", 40.01, 100.0, true);
        let zones = vec![inactive, active.clone()];

        let nearest = find_nearest(HOME, &zones).unwrap();
        assert_eq!(nearest.zone.id, active.id);
    }

    #[test]
    fn test_only_inactive_zones_yield_none() {
        let zones = vec![zone_at("Off", 40.0, 100.0, false)];
        assert!(find_nearest(HOME, &zones).is_none());
    }

    #[test]
    fn test_tie_keeps_first_in_input_order() {
        let first = zone_at("First", 40.001, 100.0, true);
        let second = zone_at("Second", 40.001, 100.0, true);
        let zones = vec![first.clone(), second];

        assert_eq!(find_nearest(HOME, &zones).unwrap().zone.id, first.id);
    }

    #[test]
    fn test_boundary_is_inclusive() {
        let mut zone = zone_at("Home", 40.0, 1.0, true);
        let sample = Coordinates::new(40.0005, -74.0);
        zone.radius_meters = distance(sample, zone.coordinates);

        let check = check_proximity(sample, &[zone]);
        assert!(check.within_radius);
        assert!(check.is_near_home);
    }

    #[test]
    fn test_no_zones_returns_empty_shape() {
        let check = check_proximity(HOME, &[]);
        assert_eq!(check, ProximityCheck::empty());
        assert!(!check.is_near_home);
        assert!(check.nearest_zone.is_none());
        assert!(check.distance_meters.is_none());
        assert!(!check.within_radius);
    }

    #[test]
    fn test_outside_radius_reports_nearest_anyway() {
        let zone = zone_at("Home", 41.0, 100.0, true);
        let check = check_proximity(HOME, &[zone.clone()]);
        assert!(!check.within_radius);
        assert_eq!(check.nearest_zone.map(|z| z.id), Some(zone.id));
        assert!(check.distance_meters.unwrap() > 100_000.0);
    }
}
