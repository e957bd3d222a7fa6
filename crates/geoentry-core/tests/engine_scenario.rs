//! End-to-end proximity scenarios through the public API.

use std::sync::Arc;
use std::time::Duration;

use geoentry_core::{
    Coordinates, EventType, GeoentryConfig, HistorySource, LocationSampler, MemoryZoneStore,
    NewHomeZone, NotificationGate, PresenceMonitor, ProximityEngine, ProximitySettingsUpdate,
    Position, PushLocationPlatform, WatchOptions, HISTORY_CAPACITY,
};
use tempfile::TempDir;

const HOME: Coordinates = Coordinates::new(40.0, -74.0);
const NEAR: Coordinates = Coordinates::new(40.0001, -74.0);
const FAR: Coordinates = Coordinates::new(40.01, -74.0);

fn home_zone() -> NewHomeZone {
    NewHomeZone {
        name: "Home".to_string(),
        coordinates: HOME,
        radius_meters: 100.0,
        is_active: true,
        address: None,
    }
}

fn memory_engine() -> ProximityEngine {
    ProximityEngine::builder(Arc::new(MemoryZoneStore::new())).build()
}

#[tokio::test]
async fn far_near_near_far_records_enter_then_exit() {
    let engine = memory_engine();
    let zone = engine.create_zone(home_zone()).unwrap();

    for p in [FAR, NEAR, NEAR, FAR] {
        engine.process_sample(Position::now(p)).await.unwrap();
    }

    let history = engine.history().await;
    let types: Vec<_> = history.iter().map(|e| e.event_type).collect();
    // Stored newest first.
    assert_eq!(types, vec![EventType::Exit, EventType::Enter]);
    assert!(history.iter().all(|e| e.home_zone_id == zone.id));
    assert!(!engine.snapshot().await.is_near_home);

    let stats = engine.history_stats().await;
    assert_eq!((stats.total, stats.enter, stats.exit), (2, 1, 1));
}

#[tokio::test]
async fn reference_scenario_at_the_zone_centre() {
    let centre = Coordinates::new(40.0, -74.0);
    let far = Coordinates::new(41.0, -74.0);
    let borderline = Coordinates::new(40.0009, -74.0);

    let engine = memory_engine();
    let zone = engine.create_zone(home_zone()).unwrap();

    // ~100.07m: just outside a 100m radius.
    let check = engine.check(borderline).unwrap();
    assert!(!check.within_radius);
    assert!((check.distance_meters.unwrap() - 100.0).abs() < 1.0);
    assert!(engine.check(centre).unwrap().within_radius);
    assert!(!engine.check(far).unwrap().within_radius);

    engine.process_sample(Position::now(borderline)).await.unwrap();
    assert!(engine.history().await.is_empty());

    for p in [far, centre, centre, far] {
        engine.process_sample(Position::now(p)).await.unwrap();
    }

    let mut history = engine.history().await;
    history.reverse();
    let types: Vec<_> = history.iter().map(|e| e.event_type).collect();
    assert_eq!(types, vec![EventType::Enter, EventType::Exit]);
    assert!(history.iter().all(|e| e.home_zone_id == zone.id));
    assert!(history[0].distance_meters.abs() < 1e-6);
}

#[tokio::test]
async fn unacknowledged_prompt_does_not_block_the_next_visit() {
    let engine = memory_engine();
    engine.create_zone(home_zone()).unwrap();
    let mut gate = NotificationGate::new();

    engine.process_sample(Position::now(NEAR)).await.unwrap();
    assert!(gate.poll(&engine.snapshot().await, &engine.settings()).is_some());

    // The prompt is never dismissed; the user walks away and comes back.
    engine.process_sample(Position::now(FAR)).await.unwrap();
    tokio::time::sleep(Duration::from_millis(5)).await;
    engine.process_sample(Position::now(NEAR)).await.unwrap();
    assert!(gate.poll(&engine.snapshot().await, &engine.settings()).is_some());
}

#[tokio::test]
async fn history_is_capped() {
    let engine = memory_engine();
    engine.create_zone(home_zone()).unwrap();

    // 101 transitions: enter, exit, enter, ...
    for i in 0..101 {
        let p = if i % 2 == 0 { NEAR } else { FAR };
        engine.process_sample(Position::now(p)).await.unwrap();
    }

    let history = engine.history().await;
    assert_eq!(history.len(), HISTORY_CAPACITY);
    assert_eq!(history[0].event_type, EventType::Enter);
}

#[tokio::test]
async fn prompt_shows_once_per_near_episode() {
    let engine = memory_engine();
    engine.create_zone(home_zone()).unwrap();
    let mut gate = NotificationGate::new();

    engine.process_sample(Position::now(NEAR)).await.unwrap();
    let prompt = gate
        .poll(&engine.snapshot().await, &engine.settings())
        .expect("prompt on arrival");
    assert_eq!(prompt.distance_text, "11m");

    gate.dismiss();
    engine.mark_session_notified().await;
    engine.process_sample(Position::now(NEAR)).await.unwrap();
    assert!(gate.poll(&engine.snapshot().await, &engine.settings()).is_none());

    // Leaving and coming back starts a new episode.
    engine.process_sample(Position::now(FAR)).await.unwrap();
    engine.process_sample(Position::now(NEAR)).await.unwrap();
    assert!(gate.poll(&engine.snapshot().await, &engine.settings()).is_some());
}

#[tokio::test]
async fn disabling_detection_freezes_state_and_stops_watch() {
    let engine = memory_engine();
    engine.create_zone(home_zone()).unwrap();
    let platform = PushLocationPlatform::new();
    let sampler = LocationSampler::new(Arc::new(platform.clone()), engine.clone());

    let options = WatchOptions {
        min_distance_meters: 0.0,
        ..WatchOptions::default()
    };
    sampler.start_watching(options).await.unwrap();
    let mut events = engine.subscribe();
    platform.push(Position::now(NEAR));
    assert_eq!(events.recv().await.unwrap().event.event_type(), EventType::Enter);

    engine
        .update_settings(ProximitySettingsUpdate {
            is_enabled: Some(false),
            ..ProximitySettingsUpdate::default()
        })
        .unwrap();
    sampler.sync_lifecycle(true).await.unwrap();
    assert!(!sampler.is_watching());

    let before = engine.snapshot().await;
    engine.process_sample(Position::now(FAR)).await.unwrap();
    assert_eq!(engine.snapshot().await, before);
    assert_eq!(engine.history().await.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn presence_gate_tracks_arrival_and_departure() {
    let engine = memory_engine();
    engine.create_zone(home_zone()).unwrap();
    let monitor = PresenceMonitor::new(Arc::new(HistorySource::new(engine.clone())))
        .with_interval(Duration::from_secs(10));
    monitor.start();

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert!(!monitor.controls_enabled());

    engine.process_sample(Position::now(NEAR)).await.unwrap();
    tokio::time::sleep(Duration::from_secs(10)).await;
    assert!(monitor.controls_enabled());

    engine.process_sample(Position::now(FAR)).await.unwrap();
    tokio::time::sleep(Duration::from_secs(10)).await;
    assert!(!monitor.controls_enabled());
}

#[tokio::test]
async fn file_backed_engine_restores_zones_and_history() {
    let dir = TempDir::new().unwrap();
    let mut config = GeoentryConfig::default();
    config.storage.data_dir = Some(dir.path().to_path_buf());

    let zone_id = {
        let engine = ProximityEngine::from_config(&config).unwrap();
        let zone = engine.create_zone(home_zone()).unwrap();
        engine.process_sample(Position::now(NEAR)).await.unwrap();
        zone.id
    };

    let engine = ProximityEngine::from_config(&config).unwrap();
    let history = engine.history().await;
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].home_zone_id, zone_id);

    engine.delete_zone(zone_id).await.unwrap();
    let reopened = ProximityEngine::from_config(&config).unwrap();
    assert!(reopened.zones().unwrap().is_empty());
    assert!(reopened.history().await.is_empty());
}
