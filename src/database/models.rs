use chrono::{DateTime, Utc};

use crate::errors::TailRecorderError;
use crate::gateway::{RecentSession, TopEntry, TopTypeEntry};
use crate::models::{Hex, Position, VisitSession};
use crate::resolver::{LookupState, RegistrationCacheEntry};

pub(crate) fn to_millis(at: DateTime<Utc>) -> i64 {
    at.timestamp_millis()
}

pub(crate) fn from_millis(ms: i64) -> Result<DateTime<Utc>, TailRecorderError> {
    DateTime::from_timestamp_millis(ms)
        .ok_or_else(|| TailRecorderError::InvalidRecord(format!("timestamp out of range: {}", ms)))
}

fn position(lat: Option<f64>, lon: Option<f64>) -> Option<Position> {
    match (lat, lon) {
        (Some(lat), Some(lon)) => Some(Position { lat, lon }),
        _ => None,
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct SessionRow {
    hex: String,
    session_start: i64,
    session_end: i64,
    sighting_count: i64,
    lat: Option<f64>,
    lon: Option<f64>,
    best_rssi: Option<f64>,
    callsign: Option<String>,
}

impl TryFrom<SessionRow> for VisitSession {
    type Error = TailRecorderError;

    fn try_from(row: SessionRow) -> Result<Self, Self::Error> {
        Ok(VisitSession {
            hex: Hex::try_from(row.hex.as_str())?,
            session_start: from_millis(row.session_start)?,
            session_end: from_millis(row.session_end)?,
            sighting_count: row.sighting_count.clamp(0, u32::MAX as i64) as u32,
            position: position(row.lat, row.lon),
            best_rssi: row.best_rssi,
            callsign: row.callsign,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct RecentSessionRow {
    hex: String,
    tail: Option<String>,
    session_start: i64,
    session_end: i64,
    sighting_count: i64,
    lat: Option<f64>,
    lon: Option<f64>,
    best_rssi: Option<f64>,
    closed: bool,
}

impl TryFrom<RecentSessionRow> for RecentSession {
    type Error = TailRecorderError;

    fn try_from(row: RecentSessionRow) -> Result<Self, Self::Error> {
        Ok(RecentSession {
            hex: Hex::try_from(row.hex.as_str())?,
            tail: row.tail,
            session_start: from_millis(row.session_start)?,
            session_end: from_millis(row.session_end)?,
            sighting_count: row.sighting_count.clamp(0, u32::MAX as i64) as u32,
            position: position(row.lat, row.lon),
            best_rssi: row.best_rssi,
            closed: row.closed,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct RegistryRow {
    hex: String,
    registration: Option<String>,
    resolved_at: i64,
}

impl TryFrom<RegistryRow> for RegistrationCacheEntry {
    type Error = TailRecorderError;

    fn try_from(row: RegistryRow) -> Result<Self, Self::Error> {
        let state = if row.registration.is_some() {
            LookupState::Resolved
        } else {
            LookupState::NotFound
        };
        Ok(RegistrationCacheEntry {
            hex: Hex::try_from(row.hex.as_str())?,
            registration: row.registration,
            resolved_at: Some(from_millis(row.resolved_at)?),
            expires_at: None,
            state,
            failed_at: None,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct TopRow {
    pub registration: String,
    pub visits: i64,
}

impl TopRow {
    pub fn ranked(self, rank: usize) -> TopEntry {
        TopEntry {
            rank,
            registration: self.registration,
            visits: self.visits,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct TopTypeRow {
    pub aircraft_type: String,
    pub visits: i64,
}

impl TopTypeRow {
    pub fn ranked(self, rank: usize) -> TopTypeEntry {
        TopTypeEntry {
            rank,
            aircraft_type: self.aircraft_type,
            visits: self.visits,
        }
    }
}
