//! User-facing proximity settings.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Process-wide proximity settings.
///
/// When `is_enabled` is false the engine ignores samples and leaves its
/// detection state frozen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", default)]
#[schema(example = json!({
    "isEnabled": true,
    "showNotifications": true,
    "autoTriggerDevices": false,
    "notificationSound": true,
    "vibration": true
}))]
pub struct ProximitySettings {
    /// Master switch for detection.
    pub is_enabled: bool,
    /// Whether the "near home" prompt may be shown.
    pub show_notifications: bool,
    /// Whether devices may be triggered automatically on arrival.
    pub auto_trigger_devices: bool,
    /// Play a sound with the prompt.
    pub notification_sound: bool,
    /// Vibrate with the prompt.
    pub vibration: bool,
}

impl Default for ProximitySettings {
    fn default() -> Self {
        Self {
            is_enabled: true,
            show_notifications: true,
            auto_trigger_devices: false,
            notification_sound: true,
            vibration: true,
        }
    }
}

/// Partial settings update. Absent fields are left unchanged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProximitySettingsUpdate {
    /// New master switch.
    pub is_enabled: Option<bool>,
    /// New notification flag.
    pub show_notifications: Option<bool>,
    /// New auto-trigger flag.
    pub auto_trigger_devices: Option<bool>,
    /// New sound flag.
    pub notification_sound: Option<bool>,
    /// New vibration flag.
    pub vibration: Option<bool>,
}

impl ProximitySettings {
    /// Return these settings with `update` applied.
    #[must_use]
    pub fn merged(self, update: ProximitySettingsUpdate) -> Self {
        Self {
            is_enabled: update.is_enabled.unwrap_or(self.is_enabled),
            show_notifications: update.show_notifications.unwrap_or(self.show_notifications),
            auto_trigger_devices: update
                .auto_trigger_devices
                .unwrap_or(self.auto_trigger_devices),
            notification_sound: update.notification_sound.unwrap_or(self.notification_sound),
            vibration: update.vibration.unwrap_or(self.vibration),
        }
    }
}
