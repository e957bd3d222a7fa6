//! OpenAPI specification for the geoentry API.

use axum::Json;
use geoentry_core::{
    Accuracy, Coordinates, DetectionState, EventType, HistoryEntry, HistoryStats, HomeZone,
    HomeZoneUpdate, NewHomeZone, NotificationPrompt, PermissionStatus, Position, PresenceStatus,
    ProximityCheck, ProximitySettings, ProximitySettingsUpdate, RecoveryAction, RemoteEvent,
    SamplerStatus, WatchOptions,
};
use utoipa::OpenApi;

use super::error::ErrorResponse;
use super::health::HealthResponse;
use super::location::{
    LocationReport, LocationReportResponse, PermissionRequest, RefreshResponse, ServicesRequest,
};
use super::proximity::{DistanceRequest, DistanceResponse};
use super::session::PromptResponse;
use super::watch::StartWatchRequest;
use super::zones::RadiusOptionsResponse;

/// Serve the specification at `/api/openapi.json`.
pub async fn get_openapi_spec() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

/// The specification as pretty JSON, for the gen-openapi binary.
///
/// # Errors
///
/// Returns an error if the document cannot be serialized.
pub fn get_openapi_json() -> Result<String, serde_json::Error> {
    ApiDoc::openapi().to_pretty_json()
}

/// OpenAPI document for geoentry.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "geoentry API",
        version = "0.1.0",
        description = r#"
# geoentry API

geoentry tells a companion app when its user arrives at or leaves home.

## Overview

1. **Home zones**: named circles (center and radius) the user cares about
2. **Location reports**: the device pushes fixes; a watch feeds them to the detector
3. **Detection**: enter fires once on arrival in the nearest active zone, exit once on leaving
4. **Prompt**: a "near home" prompt is offered once per arrival
5. **History**: the last 100 transitions, newest first
6. **Presence**: device controls are enabled while the latest event is an enter
"#,
        license(name = "MIT", url = "https://opensource.org/licenses/MIT")
    ),
    servers(
        (url = "/", description = "Local geoentry server")
    ),
    tags(
        (name = "system", description = "Health checks"),
        (name = "proximity", description = "Detection state and what-if checks"),
        (name = "location", description = "Device fixes, one-shot refresh and the continuous watch"),
        (name = "session", description = "Near-home prompt for the current arrival"),
        (name = "zones", description = "Home zone management"),
        (name = "history", description = "Enter/exit history"),
        (name = "settings", description = "Proximity settings"),
        (name = "presence", description = "Device-control presence gate")
    ),
    paths(
        super::health::health_check,
        super::proximity::get_state,
        super::proximity::check,
        super::proximity::measure,
        super::location::report_location,
        super::location::refresh,
        super::location::set_permission,
        super::location::set_services,
        super::watch::get_status,
        super::watch::start,
        super::watch::stop,
        super::session::get_prompt,
        super::session::acknowledge,
        super::zones::list_zones,
        super::zones::create_zone,
        super::zones::radius_options,
        super::zones::get_zone,
        super::zones::update_zone,
        super::zones::delete_zone,
        super::history::list_history,
        super::history::clear_history,
        super::history::get_stats,
        super::history::list_remote,
        super::settings::get_settings,
        super::settings::update_settings,
        super::presence::get_presence,
        super::presence::refresh_presence,
    ),
    components(
        schemas(
            ErrorResponse,
            HealthResponse,
            Coordinates,
            DistanceRequest,
            DistanceResponse,
            DetectionState,
            ProximityCheck,
            LocationReport,
            LocationReportResponse,
            RefreshResponse,
            PermissionRequest,
            PermissionStatus,
            ServicesRequest,
            RecoveryAction,
            Position,
            Accuracy,
            WatchOptions,
            StartWatchRequest,
            SamplerStatus,
            PromptResponse,
            NotificationPrompt,
            HomeZone,
            NewHomeZone,
            HomeZoneUpdate,
            RadiusOptionsResponse,
            EventType,
            HistoryEntry,
            HistoryStats,
            RemoteEvent,
            ProximitySettings,
            ProximitySettingsUpdate,
            PresenceStatus,
        )
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_spec_generation() {
        let spec = ApiDoc::openapi();
        assert_eq!(spec.info.title, "geoentry API");
        assert!(spec.paths.paths.contains_key("/api/zones/{id}"));
        assert!(spec.paths.paths.contains_key("/api/session/prompt"));
    }

    #[test]
    fn test_openapi_json_serialization() {
        let json = get_openapi_json().unwrap();
        assert!(json.contains("\"openapi\":"));
        assert!(json.contains("\"geoentry API\""));
    }
}
