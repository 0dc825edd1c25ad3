//! Persistence contract used by the poll loop, the resolver and reporting

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;

use crate::lookup::LookupOutcome;
use crate::models::{Hex, Position, VisitSession};
use crate::resolver::RegistrationCacheEntry;

/// Leaderboard time window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TopWindow {
    Last24Hours,
    Last30Days,
    AllTime,
}

impl TopWindow {
    /// Earliest session start counted in this window
    pub fn since(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            TopWindow::Last24Hours => Some(now - TimeDelta::hours(24)),
            TopWindow::Last30Days => Some(now - TimeDelta::days(30)),
            TopWindow::AllTime => None,
        }
    }
}

impl TryFrom<&str> for TopWindow {
    type Error = String;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "24h" => Ok(TopWindow::Last24Hours),
            "30d" => Ok(TopWindow::Last30Days),
            "all" => Ok(TopWindow::AllTime),
            other => Err(format!("unknown window {:?}", other)),
        }
    }
}

/// A persisted session joined with its registration
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecentSession {
    pub hex: Hex,
    /// Looked-up registration, falling back to the broadcast callsign
    pub tail: Option<String>,
    pub session_start: DateTime<Utc>,
    pub session_end: DateTime<Utc>,
    pub sighting_count: u32,
    pub position: Option<Position>,
    pub best_rssi: Option<f64>,
    pub closed: bool,
}

/// One leaderboard row
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TopEntry {
    pub rank: usize,
    pub registration: String,
    pub visits: i64,
}

/// One row of the aircraft-type leaderboard
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TopTypeEntry {
    pub rank: usize,
    /// Normalized type label, e.g. "Boeing 737-800"
    pub aircraft_type: String,
    pub visits: i64,
}

/// Counts over the persisted registration cache
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct RegistryStats {
    pub known: i64,
    pub not_found: i64,
}

#[async_trait]
pub trait PersistenceGateway: Send + Sync {
    /// Durably record a closed session
    async fn record_session_close(&self, session: &VisitSession) -> Result<(), sqlx::Error>;

    /// Checkpoint a still-open session
    async fn upsert_open_session(&self, session: &VisitSession) -> Result<(), sqlx::Error>;

    /// Remember when the feed last produced a snapshot
    async fn upsert_live_snapshot_timestamp(&self, at: DateTime<Utc>) -> Result<(), sqlx::Error>;

    async fn store_registration(
        &self,
        hex: &Hex,
        outcome: &LookupOutcome,
        resolved_at: DateTime<Utc>,
    ) -> Result<(), sqlx::Error>;

    /// Store a registration the feed broadcast, keeping any aircraft details
    /// an earlier lookup stored for the same hex
    async fn store_seeded_registration(
        &self,
        hex: &Hex,
        registration: &str,
        resolved_at: DateTime<Utc>,
    ) -> Result<(), sqlx::Error>;

    async fn get_recent_sessions(&self, limit: u32) -> Result<Vec<RecentSession>, sqlx::Error>;

    async fn get_top_by_window(
        &self,
        window: TopWindow,
        limit: u32,
    ) -> Result<Vec<TopEntry>, sqlx::Error>;

    /// Visits per normalized aircraft type; hexes without a known type are
    /// left out
    async fn get_top_types_by_window(
        &self,
        window: TopWindow,
        limit: u32,
    ) -> Result<Vec<TopTypeEntry>, sqlx::Error>;

    async fn get_registration_cache_stats(&self) -> Result<RegistryStats, sqlx::Error>;

    /// Everything previously resolved, for warming the resolver cache
    async fn load_registrations(&self) -> Result<Vec<RegistrationCacheEntry>, sqlx::Error>;

    /// Sessions that were still open when the process stopped
    async fn load_open_sessions(&self) -> Result<Vec<VisitSession>, sqlx::Error>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn window_bounds() {
        let now = Utc.with_ymd_and_hms(2024, 3, 31, 12, 0, 0).unwrap();
        assert_eq!(
            TopWindow::Last24Hours.since(now),
            Some(Utc.with_ymd_and_hms(2024, 3, 30, 12, 0, 0).unwrap())
        );
        assert_eq!(
            TopWindow::Last30Days.since(now),
            Some(Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap())
        );
        assert_eq!(TopWindow::AllTime.since(now), None);
    }

    #[test]
    fn window_from_query_value() {
        assert_eq!(TopWindow::try_from("30d"), Ok(TopWindow::Last30Days));
        assert!(TopWindow::try_from("7d").is_err());
    }
}
