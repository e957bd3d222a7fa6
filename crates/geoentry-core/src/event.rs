//! Proximity transition events.
//!
//! [`ProximityEvent`] is what the state machine emits. [`Transition`] wraps it
//! with the sample that caused it, and [`ProximityEventPayload`] is the flat
//! wire shape sent to the remote mirror.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::geo::Coordinates;
use crate::zone::HomeZone;

/// Direction of a proximity transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum EventType {
    /// Far to near.
    Enter,
    /// Near to far.
    Exit,
}

impl EventType {
    /// Lowercase wire name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Enter => "enter",
            Self::Exit => "exit",
        }
    }

    /// Parse from a wire name (case-insensitive).
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "enter" => Some(Self::Enter),
            "exit" => Some(Self::Exit),
            _ => None,
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A confirmed enter or exit transition.
#[derive(Debug, Clone, PartialEq)]
pub enum ProximityEvent {
    /// The position moved inside the nearest zone.
    Enter {
        /// Zone that was entered.
        zone: HomeZone,
        /// Distance to the zone center in meters.
        distance_meters: f64,
    },
    /// The position left the zone it was inside.
    Exit {
        /// Zone that was left.
        zone: HomeZone,
        /// Distance to the zone center in meters.
        distance_meters: f64,
    },
}

impl ProximityEvent {
    /// Transition direction.
    #[must_use]
    pub const fn event_type(&self) -> EventType {
        match self {
            Self::Enter { .. } => EventType::Enter,
            Self::Exit { .. } => EventType::Exit,
        }
    }

    /// Zone the transition refers to.
    #[must_use]
    pub const fn zone(&self) -> &HomeZone {
        match self {
            Self::Enter { zone, .. } | Self::Exit { zone, .. } => zone,
        }
    }

    /// Distance to the zone center in meters.
    #[must_use]
    pub const fn distance_meters(&self) -> f64 {
        match self {
            Self::Enter {
                distance_meters, ..
            }
            | Self::Exit {
                distance_meters, ..
            } => *distance_meters,
        }
    }
}

/// An event together with the sample that triggered it.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    /// The emitted event.
    pub event: ProximityEvent,
    /// Sample position that caused the transition.
    pub position: Coordinates,
    /// When the transition was detected.
    pub detected_at: DateTime<Utc>,
}

impl Transition {
    /// Flatten into the wire payload.
    #[must_use]
    pub fn to_payload(
        &self,
        device_id: Option<&str>,
        user_id: Option<&str>,
    ) -> ProximityEventPayload {
        let zone = self.event.zone();
        ProximityEventPayload {
            event_type: self.event.event_type(),
            home_zone_id: zone.id,
            home_zone_name: zone.name.clone(),
            coordinates: self.position,
            distance_meters: self.event.distance_meters(),
            timestamp: self.detected_at,
            device_id: device_id.map(str::to_string),
            user_id: user_id.map(str::to_string),
        }
    }
}

/// Proximity event as exchanged with the remote backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
#[schema(example = json!({
    "type": "enter",
    "homeZoneId": "01936f4e-6a2b-7c3d-9e8f-0a1b2c3d4e5f",
    "homeZoneName": "Home",
    "coordinates": {"latitude": 40.0, "longitude": -74.0},
    "distanceMeters": 12.5,
    "timestampISO": "2025-01-15T03:30:00Z"
}))]
pub struct ProximityEventPayload {
    /// Transition direction.
    #[serde(rename = "type")]
    pub event_type: EventType,

    /// Zone id.
    pub home_zone_id: Uuid,

    /// Zone display name.
    pub home_zone_name: String,

    /// Sample position.
    pub coordinates: Coordinates,

    /// Distance to the zone center in meters.
    pub distance_meters: f64,

    /// When the transition happened.
    #[serde(rename = "timestampISO")]
    pub timestamp: DateTime<Utc>,

    /// Reporting device, if configured.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,

    /// Reporting user, if configured.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn zone() -> HomeZone {
        HomeZone {
            id: Uuid::now_v7(),
            name: "Home".to_string(),
            coordinates: Coordinates::new(40.0, -74.0),
            radius_meters: 100.0,
            is_active: true,
            address: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_event_type_parse_and_display() {
        assert_eq!(EventType::parse("ENTER"), Some(EventType::Enter));
        assert_eq!(EventType::parse("exit"), Some(EventType::Exit));
        assert_eq!(EventType::parse("dwell"), None);
        assert_eq!(EventType::Exit.to_string(), "exit");
    }

    #[test]
    fn test_event_accessors() {
        let z = zone();
        let event = ProximityEvent::Exit {
            zone: z.clone(),
            distance_meters: 150.0,
        };
        assert_eq!(event.event_type(), EventType::Exit);
        assert_eq!(event.zone().id, z.id);
        assert_eq!(event.distance_meters(), 150.0);
    }

    #[test]
    fn test_payload_wire_names() {
        let transition = Transition {
            event: ProximityEvent::Enter {
                zone: zone(),
                distance_meters: 12.5,
            },
            position: Coordinates::new(40.0001, -74.0),
            detected_at: Utc::now(),
        };
        let payload = transition.to_payload(Some("pixel-8"), None);
        let json = serde_json::to_value(&payload).unwrap();

        assert_eq!(json["type"], "enter");
        assert_eq!(json["homeZoneName"], "Home");
        assert_eq!(json["deviceId"], "pixel-8");
        assert!(json.get("timestampISO").is_some());
        assert!(json.get("userId").is_none());
    }
}
