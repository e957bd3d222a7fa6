//! Capped log of confirmed proximity transitions.
//!
//! Entries are stored newest first and the log never holds more than
//! [`HISTORY_CAPACITY`] of them. Past entries are never edited; the only
//! removals are truncation, [`HistoryLog::clear`] and
//! [`HistoryLog::delete_for_zone`].

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::event::EventType;

/// Maximum number of retained history entries.
pub const HISTORY_CAPACITY: usize = 100;

/// One recorded transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
#[schema(example = json!({
    "id": "01936f4e-6a2b-7c3d-9e8f-0a1b2c3d4e60",
    "homeZoneId": "01936f4e-6a2b-7c3d-9e8f-0a1b2c3d4e5f",
    "eventType": "enter",
    "timestampISO": "2025-01-15T03:30:00Z",
    "distanceMeters": 12.5
}))]
pub struct HistoryEntry {
    /// Entry id.
    pub id: Uuid,
    /// Zone the transition refers to.
    pub home_zone_id: Uuid,
    /// Transition direction.
    pub event_type: EventType,
    /// When the transition was recorded.
    #[serde(rename = "timestampISO")]
    pub timestamp: DateTime<Utc>,
    /// Distance to the zone center in meters.
    pub distance_meters: f64,
}

/// Aggregate counts over the log.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct HistoryStats {
    /// Number of entries.
    pub total: usize,
    /// Number of enter entries.
    pub enter: usize,
    /// Number of exit entries.
    pub exit: usize,
    /// Entries recorded on the current UTC day.
    pub today: usize,
}

/// Newest-first, capped transition log.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HistoryLog {
    entries: VecDeque<HistoryEntry>,
}

impl HistoryLog {
    /// Create an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a log from stored entries, newest first. Extra entries past
    /// the capacity are dropped.
    #[must_use]
    pub fn from_entries(entries: Vec<HistoryEntry>) -> Self {
        let mut entries = VecDeque::from(entries);
        entries.truncate(HISTORY_CAPACITY);
        Self { entries }
    }

    /// Record a transition stamped with the current time.
    pub fn record(
        &mut self,
        zone_id: Uuid,
        event_type: EventType,
        distance_meters: f64,
    ) -> HistoryEntry {
        self.record_at(zone_id, event_type, distance_meters, Utc::now())
    }

    /// Record a transition with an explicit timestamp.
    pub fn record_at(
        &mut self,
        zone_id: Uuid,
        event_type: EventType,
        distance_meters: f64,
        timestamp: DateTime<Utc>,
    ) -> HistoryEntry {
        let entry = HistoryEntry {
            id: Uuid::now_v7(),
            home_zone_id: zone_id,
            event_type,
            timestamp,
            distance_meters,
        };
        self.entries.push_front(entry.clone());
        self.entries.truncate(HISTORY_CAPACITY);
        entry
    }

    /// Remove every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Remove every entry for `zone_id`, returning how many were removed.
    pub fn delete_for_zone(&mut self, zone_id: Uuid) -> usize {
        let before = self.entries.len();
        self.entries.retain(|e| e.home_zone_id != zone_id);
        before - self.entries.len()
    }

    /// All entries, newest first.
    pub fn entries(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.entries.iter()
    }

    /// Entries as an owned list, newest first.
    #[must_use]
    pub fn to_vec(&self) -> Vec<HistoryEntry> {
        self.entries.iter().cloned().collect()
    }

    /// Entries for one zone, newest first.
    #[must_use]
    pub fn for_zone(&self, zone_id: Uuid) -> Vec<HistoryEntry> {
        self.entries
            .iter()
            .filter(|e| e.home_zone_id == zone_id)
            .cloned()
            .collect()
    }

    /// Most recent entry.
    #[must_use]
    pub fn latest(&self) -> Option<&HistoryEntry> {
        self.entries.front()
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the log is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Counts by type, plus entries recorded on `now`'s UTC date.
    #[must_use]
    pub fn stats(&self, now: DateTime<Utc>) -> HistoryStats {
        let today = now.date_naive();
        self.entries.iter().fold(
            HistoryStats {
                total: self.entries.len(),
                ..HistoryStats::default()
            },
            |mut stats, e| {
                match e.event_type {
                    EventType::Enter => stats.enter += 1,
                    EventType::Exit => stats.exit += 1,
                }
                if e.timestamp.date_naive() == today {
                    stats.today += 1;
                }
                stats
            },
        )
    }
}
