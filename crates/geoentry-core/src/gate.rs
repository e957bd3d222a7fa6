//! Session-scoped notification gating.
//!
//! The "near home" prompt is shown at most once per continuous near episode.
//! The detector clears `modal_shown_for_current_session` on every transition;
//! the host sets it through the engine once the prompt has been shown or
//! dismissed.
//!
//! A visible prompt belongs to the episode it was shown for. Once the state
//! leaves proximity or a new transition is recorded, the prompt counts as
//! gone even if the host never dismissed it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::detector::DetectionState;
use crate::geo::format_distance;
use crate::settings::ProximitySettings;
use crate::zone::HomeZone;

/// Returns `true` if the prompt should be shown for `state`.
#[must_use]
pub const fn should_notify(
    state: &DetectionState,
    settings: &ProximitySettings,
    already_visible: bool,
) -> bool {
    state.is_near_home
        && state.nearest_home_location.is_some()
        && settings.show_notifications
        && !state.modal_shown_for_current_session
        && !already_visible
}

/// Content of the "near home" prompt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NotificationPrompt {
    /// Zone the user is near.
    pub zone: HomeZone,
    /// Distance to the zone center in meters.
    pub distance_meters: f64,
    /// Distance formatted for display, e.g. `"42m"` or `"1.2km"`.
    pub distance_text: String,
    /// Play a sound with the prompt.
    pub sound: bool,
    /// Vibrate with the prompt.
    pub vibration: bool,
}

/// Tracks whether a prompt is currently on screen.
#[derive(Debug, Clone, Copy, Default)]
pub struct NotificationGate {
    visible: bool,
    // `last_detection_time` of the episode the visible prompt belongs to.
    episode: Option<DateTime<Utc>>,
}

impl NotificationGate {
    /// Create a gate with nothing visible.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            visible: false,
            episode: None,
        }
    }

    fn expire(&mut self, state: &DetectionState) {
        if self.visible && (!state.is_near_home || state.last_detection_time != self.episode) {
            self.dismiss();
        }
    }

    /// Return a prompt if one should be shown now, marking it visible.
    pub fn poll(
        &mut self,
        state: &DetectionState,
        settings: &ProximitySettings,
    ) -> Option<NotificationPrompt> {
        self.expire(state);
        if !should_notify(state, settings, self.visible) {
            return None;
        }
        let zone = state.nearest_home_location.clone()?;
        let distance_meters = state.current_distance.unwrap_or_default();

        self.visible = true;
        self.episode = state.last_detection_time;
        Some(NotificationPrompt {
            zone,
            distance_meters,
            distance_text: format_distance(distance_meters),
            sound: settings.notification_sound,
            vibration: settings.vibration,
        })
    }

    /// Clear the visible flag after the prompt is closed.
    pub fn dismiss(&mut self) {
        self.visible = false;
        self.episode = None;
    }

    /// Whether a prompt is on screen.
    #[must_use]
    pub const fn is_visible(&self) -> bool {
        self.visible
    }
}
