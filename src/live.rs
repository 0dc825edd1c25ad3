//! In-memory picture of currently visible aircraft

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::debug;

use crate::models::{Hex, Position, Snapshot};
use crate::resolver::{RegistrationLookup, Resolution};

/// Live cache shared between the poll loop (writer) and map readers
pub type SharedLiveState = Arc<RwLock<LiveStateCache>>;

/// Last known state of one visible aircraft
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LiveAircraftState {
    pub hex: Hex,
    pub position: Option<Position>,
    pub track: Option<f64>,
    pub rssi: Option<f64>,
    pub callsign: Option<String>,
    pub registration: Option<String>,
    pub last_seen: DateTime<Utc>,
    /// Consecutive snapshots this aircraft has been missing from
    pub staleness: u32,
}

/// Outcome of applying one snapshot
#[derive(Debug, Default, PartialEq)]
pub struct LiveUpdate {
    pub evicted: Vec<Hex>,
    /// True when the snapshot had already been applied
    pub duplicate: bool,
}

pub struct LiveStateCache {
    entries: HashMap<Hex, LiveAircraftState>,
    eviction_ticks: u32,
    last_capture: Option<DateTime<Utc>>,
}

impl LiveStateCache {
    /// `eviction_ticks` is the number of consecutive missed snapshots an
    /// aircraft survives; one more and it is evicted.
    pub fn new(eviction_ticks: u32) -> Self {
        Self {
            entries: HashMap::new(),
            eviction_ticks,
            last_capture: None,
        }
    }

    pub fn shared(eviction_ticks: u32) -> SharedLiveState {
        Arc::new(RwLock::new(Self::new(eviction_ticks)))
    }

    /// Apply a snapshot: upsert sighted aircraft, age and evict the rest
    ///
    /// Registrations are filled from `lookup` without waiting on it; an
    /// aircraft whose lookup is still pending simply stays unnamed.
    pub fn update<L: RegistrationLookup + ?Sized>(
        &mut self,
        snapshot: &Snapshot,
        lookup: &L,
    ) -> LiveUpdate {
        if self.last_capture == Some(snapshot.captured_at) {
            return LiveUpdate {
                duplicate: true,
                ..LiveUpdate::default()
            };
        }
        self.last_capture = Some(snapshot.captured_at);

        let mut sighted = HashSet::with_capacity(snapshot.sightings.len());
        for sighting in &snapshot.sightings {
            let entry = self
                .entries
                .entry(sighting.hex.clone())
                .or_insert_with(|| LiveAircraftState {
                    hex: sighting.hex.clone(),
                    position: None,
                    track: None,
                    rssi: None,
                    callsign: None,
                    registration: None,
                    last_seen: sighting.observed_at,
                    staleness: 0,
                });

            if sighting.position.is_some() {
                entry.position = sighting.position;
            }
            entry.track = sighting.track.or(entry.track);
            entry.rssi = sighting.rssi;
            if sighting.callsign.is_some() {
                entry.callsign = sighting.callsign.clone();
            }
            entry.last_seen = entry.last_seen.max(sighting.observed_at);
            entry.staleness = 0;

            if entry.registration.is_none() {
                if let Resolution::Known(registration) = lookup.lookup(&sighting.hex) {
                    entry.registration = Some(registration);
                }
            }
            sighted.insert(&sighting.hex);
        }

        let mut evicted = Vec::new();
        for (hex, entry) in self.entries.iter_mut() {
            if sighted.contains(hex) {
                continue;
            }
            entry.staleness += 1;
            if entry.staleness > self.eviction_ticks {
                evicted.push(hex.clone());
            }
        }
        for hex in &evicted {
            debug!("Evicting {} from live map", hex);
            self.entries.remove(hex);
        }
        evicted.sort();

        LiveUpdate {
            evicted,
            duplicate: false,
        }
    }

    /// Visible aircraft ordered by hex
    pub fn currently_visible(&self) -> Vec<LiveAircraftState> {
        let mut visible: Vec<_> = self.entries.values().cloned().collect();
        visible.sort_by(|a, b| a.hex.cmp(&b.hex));
        visible
    }

    /// Number of visible aircraft whose registration is still unknown
    pub fn unnamed(&self) -> usize {
        self.entries
            .values()
            .filter(|e| e.registration.is_none())
            .count()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
