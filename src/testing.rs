//! In-memory doubles shared by unit tests

use std::collections::{BTreeMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::errors::FeedError;
use crate::gateway::{
    PersistenceGateway, RecentSession, RegistryStats, TopEntry, TopTypeEntry, TopWindow,
};
use crate::lookup::LookupOutcome;
use crate::models::{AircraftDetails, Hex, Snapshot, VisitSession};
use crate::resolver::{LookupState, RegistrationCacheEntry};
use crate::source::SnapshotSource;

fn cache_entry(hex: &Hex, outcome: &LookupOutcome, at: DateTime<Utc>) -> RegistrationCacheEntry {
    let (registration, state) = match outcome {
        LookupOutcome::Found(d) => (Some(d.registration.clone()), LookupState::Resolved),
        LookupOutcome::NotFound => (None, LookupState::NotFound),
    };
    RegistrationCacheEntry {
        hex: hex.clone(),
        registration,
        resolved_at: Some(at),
        expires_at: None,
        state,
        failed_at: None,
    }
}

/// Gateway keeping everything in maps, with the same close-wins semantics as
/// the SQLite store
#[derive(Default)]
pub struct MemoryGateway {
    sessions: Mutex<BTreeMap<(Hex, DateTime<Utc>), (VisitSession, bool)>>,
    registry: Mutex<BTreeMap<Hex, (LookupOutcome, DateTime<Utc>)>>,
    last_snapshot: Mutex<Option<DateTime<Utc>>>,
}

impl MemoryGateway {
    pub fn sessions(&self) -> Vec<(VisitSession, bool)> {
        self.sessions.lock().unwrap().values().cloned().collect()
    }

    pub fn last_snapshot(&self) -> Option<DateTime<Utc>> {
        *self.last_snapshot.lock().unwrap()
    }

    /// The stored registry row for `hex`, as the resolver would load it
    pub fn registration(&self, hex: &Hex) -> Option<RegistrationCacheEntry> {
        self.registry
            .lock()
            .unwrap()
            .get(hex)
            .map(|(outcome, at)| cache_entry(hex, outcome, *at))
    }

    pub fn details(&self, hex: &Hex) -> Option<AircraftDetails> {
        match self.registry.lock().unwrap().get(hex) {
            Some((LookupOutcome::Found(details), _)) => Some(details.clone()),
            _ => None,
        }
    }

    fn upsert(&self, session: &VisitSession, closed: bool) {
        let mut sessions = self.sessions.lock().unwrap();
        let key = (session.hex.clone(), session.session_start);
        let was_closed = sessions.get(&key).is_some_and(|(_, c)| *c);
        sessions.insert(key, (session.clone(), closed || was_closed));
    }
}

#[async_trait]
impl PersistenceGateway for MemoryGateway {
    async fn record_session_close(&self, session: &VisitSession) -> Result<(), sqlx::Error> {
        self.upsert(session, true);
        Ok(())
    }

    async fn upsert_open_session(&self, session: &VisitSession) -> Result<(), sqlx::Error> {
        self.upsert(session, false);
        Ok(())
    }

    async fn upsert_live_snapshot_timestamp(&self, at: DateTime<Utc>) -> Result<(), sqlx::Error> {
        *self.last_snapshot.lock().unwrap() = Some(at);
        Ok(())
    }

    async fn store_registration(
        &self,
        hex: &Hex,
        outcome: &LookupOutcome,
        resolved_at: DateTime<Utc>,
    ) -> Result<(), sqlx::Error> {
        self.registry
            .lock()
            .unwrap()
            .insert(hex.clone(), (outcome.clone(), resolved_at));
        Ok(())
    }

    async fn store_seeded_registration(
        &self,
        hex: &Hex,
        registration: &str,
        resolved_at: DateTime<Utc>,
    ) -> Result<(), sqlx::Error> {
        let mut registry = self.registry.lock().unwrap();
        let details = match registry.remove(hex) {
            Some((LookupOutcome::Found(details), _)) => AircraftDetails {
                registration: registration.to_string(),
                ..details
            },
            _ => AircraftDetails {
                registration: registration.to_string(),
                ..AircraftDetails::default()
            },
        };
        registry.insert(hex.clone(), (LookupOutcome::Found(details), resolved_at));
        Ok(())
    }

    async fn get_recent_sessions(&self, limit: u32) -> Result<Vec<RecentSession>, sqlx::Error> {
        let registry = self.registry.lock().unwrap();
        let mut recent: Vec<RecentSession> = self
            .sessions()
            .into_iter()
            .map(|(s, closed)| {
                let registered = match registry.get(&s.hex) {
                    Some((LookupOutcome::Found(d), _)) => Some(d.registration.clone()),
                    _ => None,
                };
                RecentSession {
                    tail: registered.or_else(|| s.callsign.clone()),
                    hex: s.hex,
                    session_start: s.session_start,
                    session_end: s.session_end,
                    sighting_count: s.sighting_count,
                    position: s.position,
                    best_rssi: s.best_rssi,
                    closed,
                }
            })
            .collect();
        recent.sort_by(|a, b| b.session_start.cmp(&a.session_start));
        recent.truncate(limit as usize);
        Ok(recent)
    }

    async fn get_top_by_window(
        &self,
        _window: TopWindow,
        _limit: u32,
    ) -> Result<Vec<TopEntry>, sqlx::Error> {
        Ok(Vec::new())
    }

    async fn get_top_types_by_window(
        &self,
        _window: TopWindow,
        _limit: u32,
    ) -> Result<Vec<TopTypeEntry>, sqlx::Error> {
        Ok(Vec::new())
    }

    async fn get_registration_cache_stats(&self) -> Result<RegistryStats, sqlx::Error> {
        let registry = self.registry.lock().unwrap();
        let known = registry
            .values()
            .filter(|(o, _)| matches!(o, LookupOutcome::Found(_)))
            .count() as i64;
        Ok(RegistryStats {
            known,
            not_found: registry.len() as i64 - known,
        })
    }

    async fn load_registrations(&self) -> Result<Vec<RegistrationCacheEntry>, sqlx::Error> {
        Ok(self
            .registry
            .lock()
            .unwrap()
            .iter()
            .map(|(hex, (outcome, at))| cache_entry(hex, outcome, *at))
            .collect())
    }

    async fn load_open_sessions(&self) -> Result<Vec<VisitSession>, sqlx::Error> {
        Ok(self
            .sessions()
            .into_iter()
            .filter(|(_, closed)| !closed)
            .map(|(s, _)| s)
            .collect())
    }
}

/// Source replaying a fixed list of poll results, then failing transiently
pub struct ScriptedSource {
    script: VecDeque<Result<Snapshot, FeedError>>,
}

impl ScriptedSource {
    pub fn new(script: Vec<Result<Snapshot, FeedError>>) -> Self {
        Self {
            script: script.into(),
        }
    }
}

#[async_trait]
impl SnapshotSource for ScriptedSource {
    async fn poll(&mut self) -> Result<Snapshot, FeedError> {
        self.script
            .pop_front()
            .unwrap_or_else(|| Err(FeedError::Transient("script exhausted".to_string())))
    }
}
