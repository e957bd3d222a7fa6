//! Near/far state machine.
//!
//! [`ProximityDetector`] turns a stream of position samples into enter and
//! exit events. Events are edge-triggered: a run of consecutive near samples
//! produces exactly one [`ProximityEvent::Enter`], and the first far sample
//! after that produces exactly one [`ProximityEvent::Exit`].
//!
//! The previous near/far baseline is tracked separately from the published
//! [`DetectionState`], so callers that reset or inspect the state cannot
//! cause a transition to be missed or fired twice.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use utoipa::ToSchema;

use crate::event::ProximityEvent;
use crate::geo::Coordinates;
use crate::resolver::check_proximity;
use crate::zone::HomeZone;

/// Published detection state.
///
/// Invariant: when `is_near_home` is true, `nearest_home_location` is set and
/// `current_distance` does not exceed its radius.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DetectionState {
    /// Whether the last transition left us inside a zone.
    pub is_near_home: bool,

    /// Distance to the nearest active zone from the latest sample, in meters.
    pub current_distance: Option<f64>,

    /// Nearest active zone for the latest sample.
    pub nearest_home_location: Option<HomeZone>,

    /// Time of the most recent enter or exit.
    pub last_detection_time: Option<DateTime<Utc>>,

    /// Set once the "near home" prompt has been handled for this episode.
    pub modal_shown_for_current_session: bool,
}

/// Edge-triggered proximity state machine.
#[derive(Debug, Clone, Default)]
pub struct ProximityDetector {
    state: DetectionState,
    was_near: bool,
    last_nearest: Option<HomeZone>,
}

impl ProximityDetector {
    /// Create a detector in the far state with no zone.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Evaluate one sample against `zones`, returning the transition it
    /// causes, if any.
    pub fn process(
        &mut self,
        position: Coordinates,
        zones: &[HomeZone],
        now: DateTime<Utc>,
    ) -> Option<ProximityEvent> {
        let reading = check_proximity(position, zones);
        let is_near = reading.within_radius;

        self.state.current_distance = reading.distance_meters;
        self.state
            .nearest_home_location
            .clone_from(&reading.nearest_zone);

        debug!(
            latitude = position.latitude,
            longitude = position.longitude,
            distance_m = ?reading.distance_meters,
            is_near,
            "Proximity sample evaluated"
        );

        let event = match (self.was_near, is_near) {
            (false, true) => reading.nearest_zone.clone().map(|zone| ProximityEvent::Enter {
                distance_meters: reading.distance_meters.unwrap_or_default(),
                zone,
            }),
            (true, false) => reading
                .nearest_zone
                .clone()
                .map(|zone| (zone, reading.distance_meters))
                .or_else(|| self.last_nearest.clone().map(|zone| (zone, None)))
                .map(|(zone, d)| ProximityEvent::Exit {
                    distance_meters: d.unwrap_or_else(|| zone.distance_from(position)),
                    zone,
                }),
            _ => None,
        };

        if self.was_near != is_near {
            self.state.is_near_home = is_near;
            self.state.last_detection_time = Some(now);
            self.state.modal_shown_for_current_session = false;
        }

        if let Some(event) = &event {
            info!(
                event = %event.event_type(),
                zone_id = %event.zone().id,
                zone = %event.zone().name,
                distance_m = event.distance_meters(),
                "Proximity transition"
            );
        }

        self.was_near = is_near;
        self.last_nearest = reading.nearest_zone;
        event
    }

    /// Record that the prompt for the current near episode has been handled.
    pub fn mark_session_notified(&mut self) {
        self.state.modal_shown_for_current_session = true;
    }

    /// Borrow the published state.
    #[must_use]
    pub const fn state(&self) -> &DetectionState {
        &self.state
    }

    /// Clone of the published state.
    #[must_use]
    pub fn snapshot(&self) -> DetectionState {
        self.state.clone()
    }

    /// Whether the previous sample was inside a zone.
    #[must_use]
    pub const fn was_near(&self) -> bool {
        self.was_near
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventType;
    use uuid::Uuid;

    const NEAR: Coordinates = Coordinates::new(40.0001, -74.0);
    const FAR: Coordinates = Coordinates::new(40.01, -74.0);

    fn home() -> HomeZone {
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

    fn run(
        detector: &mut ProximityDetector,
        zones: &[HomeZone],
        samples: &[Coordinates],
    ) -> Vec<Option<EventType>> {
        samples
            .iter()
            .map(|&p| detector.process(p, zones, Utc::now()).map(|e| e.event_type()))
            .collect()
    }

    fn assert_invariant(state: &DetectionState) {
        if state.is_near_home {
            let zone = state.nearest_home_location.as_ref().expect("near without zone");
            let d = state.current_distance.expect("near without distance");
            assert!(d <= zone.radius_meters);
        }
    }

    #[test]
    fn test_initial_state_is_far() {
        let detector = ProximityDetector::new();
        assert_eq!(detector.snapshot(), DetectionState::default());
        assert!(!detector.was_near());
    }

    #[test]
    fn test_enter_fires_once_on_first_near_sample() {
        let zones = vec![home()];
        let mut detector = ProximityDetector::new();

        let events = run(&mut detector, &zones, &[FAR, FAR, NEAR, NEAR, NEAR]);
        assert_eq!(
            events,
            vec![None, None, Some(EventType::Enter), None, None]
        );
        assert!(detector.state().is_near_home);
        assert_invariant(detector.state());
    }

    #[test]
    fn test_exit_fires_once_on_first_far_sample() {
        let zones = vec![home()];
        let mut detector = ProximityDetector::new();

        let events = run(&mut detector, &zones, &[NEAR, NEAR, FAR, FAR]);
        assert_eq!(
            events,
            vec![Some(EventType::Enter), None, Some(EventType::Exit), None]
        );
        assert!(!detector.state().is_near_home);
    }

    #[test]
    fn test_exit_carries_zone_and_distance() {
        let zone = home();
        let mut detector = ProximityDetector::new();
        detector.process(NEAR, &[zone.clone()], Utc::now());

        let event = detector.process(FAR, &[zone.clone()], Utc::now()).unwrap();
        assert_eq!(event.event_type(), EventType::Exit);
        assert_eq!(event.zone().id, zone.id);
        assert!(event.distance_meters() > 1000.0);
    }

    #[test]
    fn test_session_flag_resets_on_every_transition() {
        let zones = vec![home()];
        let mut detector = ProximityDetector::new();

        detector.process(NEAR, &zones, Utc::now());
        detector.mark_session_notified();
        assert!(detector.state().modal_shown_for_current_session);

        // Staying near keeps the flag.
        detector.process(NEAR, &zones, Utc::now());
        assert!(detector.state().modal_shown_for_current_session);

        detector.process(FAR, &zones, Utc::now());
        assert!(!detector.state().modal_shown_for_current_session);

        detector.mark_session_notified();
        detector.process(NEAR, &zones, Utc::now());
        assert!(!detector.state().modal_shown_for_current_session);
    }

    #[test]
    fn test_last_detection_time_only_moves_on_transitions() {
        let zones = vec![home()];
        let mut detector = ProximityDetector::new();
        let t0 = Utc::now();

        detector.process(FAR, &zones, t0);
        assert!(detector.state().last_detection_time.is_none());

        let t1 = t0 + chrono::Duration::seconds(5);
        detector.process(NEAR, &zones, t1);
        assert_eq!(detector.state().last_detection_time, Some(t1));

        detector.process(NEAR, &zones, t1 + chrono::Duration::seconds(5));
        assert_eq!(detector.state().last_detection_time, Some(t1));
    }

    #[test]
    fn test_zones_removed_while_near_exits_previous_zone() {
        let zone = home();
        let mut detector = ProximityDetector::new();
        detector.process(NEAR, &[zone.clone()], Utc::now());

        let event = detector.process(NEAR, &[], Utc::now()).unwrap();
        assert_eq!(event.event_type(), EventType::Exit);
        assert_eq!(event.zone().id, zone.id);
        assert!((event.distance_meters() - zone.distance_from(NEAR)).abs() < 1e-9);

        let state = detector.snapshot();
        assert!(!state.is_near_home);
        assert!(state.nearest_home_location.is_none());
        assert!(state.current_distance.is_none());
    }

    #[test]
    fn test_distance_updates_without_transition() {
        let zones = vec![home()];
        let mut detector = ProximityDetector::new();

        detector.process(FAR, &zones, Utc::now());
        let first = detector.state().current_distance.unwrap();
        detector.process(Coordinates::new(40.02, -74.0), &zones, Utc::now());
        let second = detector.state().current_distance.unwrap();

        assert!(second > first);
        assert!(detector.state().last_detection_time.is_none());
    }

    #[test]
    fn test_invariant_holds_across_random_walk() {
        let zones = vec![home()];
        let mut detector = ProximityDetector::new();
        let walk = [FAR, NEAR, Coordinates::new(40.0009, -74.0), NEAR, FAR, NEAR];
        for p in walk {
            detector.process(p, &zones, Utc::now());
            assert_invariant(detector.state());
        }
    }
}
