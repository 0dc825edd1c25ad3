//! Data models.

use std::fmt;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use crate::aircraft_type;
use crate::errors::{SightingError, TailRecorderError};
use serde_helpers::*;

/// ICAO 24-bit transponder address, as six upper-case hex digits
///
/// Non-ICAO addresses (reported with a `~` prefix) keep their digits but lose
/// the prefix.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Hex(String);

impl TryFrom<&str> for Hex {
    type Error = TailRecorderError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let trimmed = value.trim().trim_start_matches('~');
        if trimmed.len() != 6 || !trimmed.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(TailRecorderError::InvalidHex(value.to_string()));
        }
        Ok(Self(trimmed.to_ascii_uppercase()))
    }
}

impl Hex {
    /// Get the canonical upper-case form
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Hex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// WGS84 position in decimal degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub lat: f64,
    pub lon: f64,
}

/// One observation of one aircraft in one snapshot
#[derive(Debug, Clone, PartialEq)]
pub struct AircraftSighting {
    pub hex: Hex,
    pub position: Option<Position>,
    /// Track or heading in degrees
    pub track: Option<f64>,
    /// Signal strength in dBFS
    pub rssi: Option<f64>,
    /// Broadcast flight callsign, trimmed
    pub callsign: Option<String>,
    /// Registration broadcast by the feed itself, if any
    pub registration: Option<String>,
    pub observed_at: DateTime<Utc>,
}

/// One poll's worth of sightings
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub captured_at: DateTime<Utc>,
    pub sightings: Vec<AircraftSighting>,
}

impl Snapshot {
    /// Parse a dump1090/readsb `aircraft.json` document
    ///
    /// Records that cannot be turned into a sighting are dropped and returned
    /// alongside the snapshot so the caller can log them; they never fail the
    /// whole snapshot.
    pub fn from_json(
        payload: &[u8],
        fallback_now: DateTime<Utc>,
    ) -> Result<(Self, Vec<SightingError>), serde_json::Error> {
        let raw: RawSnapshot = serde_json::from_slice(payload)?;
        let captured_at = raw
            .now
            .and_then(|now| DateTime::from_timestamp_millis((now * 1000.0).round() as i64))
            .unwrap_or(fallback_now);

        let mut sightings = Vec::with_capacity(raw.aircraft.len());
        let mut rejected = Vec::new();
        for record in raw.aircraft {
            match AircraftSighting::from_record(record, captured_at) {
                Ok(sighting) => sightings.push(sighting),
                Err(e) => rejected.push(e),
            }
        }

        Ok((
            Self {
                captured_at,
                sightings,
            },
            rejected,
        ))
    }
}

impl AircraftSighting {
    fn from_record(
        record: serde_json::Value,
        captured_at: DateTime<Utc>,
    ) -> Result<Self, SightingError> {
        let raw: RawAircraft = serde_json::from_value(record)
            .map_err(|e| SightingError::Malformed(e.to_string()))?;

        let hex_str = raw
            .hex
            .ok_or_else(|| SightingError::Malformed("record without hex".to_string()))?;
        let hex = Hex::try_from(hex_str.as_str())
            .map_err(|_| SightingError::Malformed(format!("invalid hex {:?}", hex_str)))?;

        let position = match (raw.lat, raw.lon) {
            (Some(lat), Some(lon))
                if (-90.0..=90.0).contains(&lat) && (-180.0..=180.0).contains(&lon) =>
            {
                Some(Position { lat, lon })
            }
            _ => None,
        };

        let observed_at = match raw.seen {
            Some(seen) if seen > 0.0 => TimeDelta::try_milliseconds((seen * 1000.0).round() as i64)
                .and_then(|age| captured_at.checked_sub_signed(age))
                .ok_or_else(|| {
                    SightingError::Malformed(format!("{}: seen {} out of range", hex, seen))
                })?,
            _ => captured_at,
        };

        Ok(Self {
            hex,
            position,
            track: raw.track.or(raw.true_heading).or(raw.heading),
            rssi: raw.rssi,
            callsign: normalize_identifier(raw.flight),
            registration: normalize_identifier(raw.registration),
            observed_at,
        })
    }
}

/// Upper-case and trim a broadcast identifier, dropping one-character noise
pub fn normalize_identifier(value: Option<String>) -> Option<String> {
    let s = value?.trim().to_ascii_uppercase();
    if s.len() >= 2 {
        Some(s)
    } else {
        None
    }
}

/// Top-level `aircraft.json` document
#[derive(Debug, Deserialize)]
struct RawSnapshot {
    /// Capture time in seconds from Unix epoch
    #[serde(default, deserialize_with = "lenient_f64")]
    now: Option<f64>,
    #[serde(default, alias = "ac")]
    aircraft: Vec<serde_json::Value>,
}

/// One aircraft record; optional fields of the wrong type become `None`
#[derive(Debug, Deserialize)]
struct RawAircraft {
    #[serde(default, alias = "icao", deserialize_with = "lenient_string")]
    hex: Option<String>,
    #[serde(default, deserialize_with = "lenient_f64")]
    lat: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    lon: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    track: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    true_heading: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    heading: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    rssi: Option<f64>,
    /// Seconds since the last message from this aircraft
    #[serde(default, deserialize_with = "lenient_f64")]
    seen: Option<f64>,
    #[serde(default, deserialize_with = "lenient_string")]
    flight: Option<String>,
    #[serde(default, rename = "r", alias = "reg", deserialize_with = "lenient_string")]
    registration: Option<String>,
}

/// One continuous presence of an aircraft
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VisitSession {
    pub hex: Hex,
    pub session_start: DateTime<Utc>,
    pub session_end: DateTime<Utc>,
    pub sighting_count: u32,
    /// Latest position reported during the visit
    pub position: Option<Position>,
    /// Strongest signal seen during the visit
    pub best_rssi: Option<f64>,
    pub callsign: Option<String>,
}

impl VisitSession {
    /// Open a session from its first sighting
    pub fn open(sighting: &AircraftSighting) -> Self {
        Self {
            hex: sighting.hex.clone(),
            session_start: sighting.observed_at,
            session_end: sighting.observed_at,
            sighting_count: 1,
            position: sighting.position,
            best_rssi: sighting.rssi,
            callsign: sighting.callsign.clone(),
        }
    }

    /// Fold a later sighting into the session
    pub fn extend(&mut self, sighting: &AircraftSighting) {
        self.session_end = sighting.observed_at;
        self.sighting_count += 1;
        if sighting.position.is_some() {
            self.position = sighting.position;
        }
        self.best_rssi = match (self.best_rssi, sighting.rssi) {
            (Some(best), Some(rssi)) => Some(best.max(rssi)),
            (best, rssi) => best.or(rssi),
        };
        if sighting.callsign.is_some() {
            self.callsign = sighting.callsign.clone();
        }
    }
}

/// Aircraft details returned by the registration lookup service
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AircraftDetails {
    pub registration: String,
    pub aircraft_type: Option<String>,
    pub manufacturer: Option<String>,
    pub icao_type: Option<String>,
}

impl AircraftDetails {
    /// Leaderboard label for this airframe, if anything describes it
    pub fn normalized_type(&self) -> Option<String> {
        aircraft_type::normalize(
            self.manufacturer.as_deref(),
            self.aircraft_type.as_deref(),
            self.icao_type.as_deref(),
        )
    }
}

/// Custom deserializers
mod serde_helpers {
    use serde::{self, Deserialize, Deserializer};
    use serde_json::Value;

    /// Accept numbers and numeric strings, anything else is `None`
    pub fn lenient_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        Ok(match value {
            Value::Number(n) => n.as_f64().filter(|v| v.is_finite()),
            Value::String(s) => s.trim().parse::<f64>().ok().filter(|v| v.is_finite()),
            _ => None,
        })
    }

    pub fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        Ok(match value {
            Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            _ => None,
        })
    }
}
