//! Turns per-tick sightings into visit sessions
//!
//! Each hex is either without a session or has exactly one open
//! [`VisitSession`]. A sighting less than `gap_threshold` after the open
//! session's end extends it; a gap of the threshold or more closes it and
//! opens a fresh session. Sessions
//! that stop receiving sightings are closed by [`SessionDeduplicator::sweep`].

use std::collections::HashMap;

use chrono::{DateTime, TimeDelta, Utc};
use tracing::{debug, warn};

use crate::errors::SightingError;
use crate::models::{AircraftSighting, Hex, Snapshot, VisitSession};

/// What a single sighting did to session state
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    Opened,
    Extended,
    /// Same timestamp as the session end; nothing changed
    Duplicate,
    /// The previous session was closed and a new one opened
    Split(VisitSession),
}

/// Result of applying one snapshot
#[derive(Debug, Default)]
pub struct SessionUpdate {
    /// Sessions closed by a gap, in the order they closed
    pub closed: Vec<VisitSession>,
    /// Open sessions that changed and should be checkpointed
    pub touched: Vec<VisitSession>,
    /// Hexes that started a new session this tick
    pub opened: Vec<Hex>,
    pub rejected: usize,
}

pub struct SessionDeduplicator {
    open: HashMap<Hex, VisitSession>,
    gap_threshold: TimeDelta,
}

impl SessionDeduplicator {
    pub fn new(gap_threshold: std::time::Duration) -> Self {
        Self {
            open: HashMap::new(),
            gap_threshold: TimeDelta::from_std(gap_threshold).unwrap_or(TimeDelta::MAX),
        }
    }

    /// Re-adopt sessions that were open when the process last stopped
    ///
    /// Sessions whose end is at least the gap threshold before `now` are returned
    /// for closing instead of being restored.
    pub fn restore(
        &mut self,
        sessions: Vec<VisitSession>,
        now: DateTime<Utc>,
    ) -> Vec<VisitSession> {
        let mut expired = Vec::new();
        for session in sessions {
            if now - session.session_end >= self.gap_threshold {
                expired.push(session);
            } else {
                self.open.insert(session.hex.clone(), session);
            }
        }
        expired
    }

    /// Apply one sighting
    pub fn observe(&mut self, sighting: &AircraftSighting) -> Result<SessionEvent, SightingError> {
        let Some(session) = self.open.get_mut(&sighting.hex) else {
            self.open
                .insert(sighting.hex.clone(), VisitSession::open(sighting));
            return Ok(SessionEvent::Opened);
        };

        if sighting.observed_at < session.session_end {
            return Err(SightingError::OutOfOrder {
                hex: sighting.hex.to_string(),
                observed_at: sighting.observed_at,
                session_end: session.session_end,
            });
        }
        if sighting.observed_at == session.session_end {
            return Ok(SessionEvent::Duplicate);
        }

        if sighting.observed_at - session.session_end < self.gap_threshold {
            session.extend(sighting);
            Ok(SessionEvent::Extended)
        } else {
            let closed = std::mem::replace(session, VisitSession::open(sighting));
            Ok(SessionEvent::Split(closed))
        }
    }

    /// Apply every sighting of a snapshot
    ///
    /// Rejected sightings are logged and counted; they never stop the rest
    /// of the snapshot from being applied.
    pub fn process(&mut self, snapshot: &Snapshot) -> SessionUpdate {
        let mut update = SessionUpdate::default();
        let mut touched: Vec<Hex> = Vec::new();

        for sighting in &snapshot.sightings {
            match self.observe(sighting) {
                Ok(SessionEvent::Opened) => {
                    update.opened.push(sighting.hex.clone());
                    touched.push(sighting.hex.clone());
                }
                Ok(SessionEvent::Extended) => touched.push(sighting.hex.clone()),
                Ok(SessionEvent::Split(closed)) => {
                    debug!(
                        "Session for {} closed after {} sightings",
                        closed.hex, closed.sighting_count
                    );
                    update.closed.push(closed);
                    update.opened.push(sighting.hex.clone());
                    touched.push(sighting.hex.clone());
                }
                Ok(SessionEvent::Duplicate) => {}
                Err(e) => {
                    warn!("Dropping sighting: {}", e);
                    update.rejected += 1;
                }
            }
        }

        touched.sort();
        touched.dedup();
        update.touched = touched
            .iter()
            .filter_map(|hex| self.open.get(hex).cloned())
            .collect();
        update
    }

    /// Close every open session whose last sighting is at least the gap
    /// threshold before `now`
    pub fn sweep(&mut self, now: DateTime<Utc>) -> Vec<VisitSession> {
        let expired: Vec<Hex> = self
            .open
            .iter()
            .filter(|(_, s)| now - s.session_end >= self.gap_threshold)
            .map(|(hex, _)| hex.clone())
            .collect();

        let mut closed: Vec<VisitSession> = expired
            .iter()
            .filter_map(|hex| self.open.remove(hex))
            .collect();
        closed.sort_by(|a, b| a.hex.cmp(&b.hex));
        closed
    }

    /// Close all open sessions at `now`, used on shutdown
    pub fn flush(&mut self, now: DateTime<Utc>) -> Vec<VisitSession> {
        let mut closed: Vec<VisitSession> = self
            .open
            .drain()
            .map(|(_, mut session)| {
                session.session_end = session.session_end.max(now);
                session
            })
            .collect();
        closed.sort_by(|a, b| a.hex.cmp(&b.hex));
        closed
    }

    pub fn open_session(&self, hex: &Hex) -> Option<&VisitSession> {
        self.open.get(hex)
    }

    pub fn open_count(&self) -> usize {
        self.open.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::time::Duration;

    const TEN_MINUTES: Duration = Duration::from_secs(600);

    fn hex(s: &str) -> Hex {
        Hex::try_from(s).unwrap()
    }

    fn minute(m: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + m * 60, 0).unwrap()
    }

    fn sighting(h: &str, at: DateTime<Utc>) -> AircraftSighting {
        AircraftSighting {
            hex: hex(h),
            position: None,
            track: None,
            rssi: None,
            callsign: None,
            registration: None,
            observed_at: at,
        }
    }

    fn snapshot(at: DateTime<Utc>, hexes: &[&str]) -> Snapshot {
        Snapshot {
            captured_at: at,
            sightings: hexes.iter().map(|h| sighting(h, at)).collect(),
        }
    }

    #[test]
    fn small_gaps_make_one_session() {
        let mut dedup = SessionDeduplicator::new(TEN_MINUTES);
        for m in [0, 3, 9, 18, 27, 36] {
            let update = dedup.process(&snapshot(minute(m), &["ABC123"]));
            assert!(update.closed.is_empty());
        }
        let session = dedup.open_session(&hex("ABC123")).unwrap();
        assert_eq!(session.session_start, minute(0));
        assert_eq!(session.session_end, minute(36));
        assert_eq!(session.sighting_count, 6);
        assert_eq!(dedup.open_count(), 1);
    }

    #[test]
    fn one_large_gap_makes_two_sessions() {
        let mut dedup = SessionDeduplicator::new(TEN_MINUTES);
        let mut closed = Vec::new();
        for m in [0, 4, 8, 30, 35] {
            closed.extend(dedup.process(&snapshot(minute(m), &["ABC123"])).closed);
        }
        assert_eq!(closed.len(), 1);
        assert_eq!(closed[0].session_start, minute(0));
        assert_eq!(closed[0].session_end, minute(8));
        assert_eq!(closed[0].sighting_count, 3);

        let open = dedup.open_session(&hex("ABC123")).unwrap();
        assert_eq!(open.session_start, minute(30));
        assert_eq!(open.session_end, minute(35));
        assert_eq!(open.sighting_count, 2);
    }

    #[test]
    fn gap_equal_to_threshold_splits() {
        let mut dedup = SessionDeduplicator::new(TEN_MINUTES);
        dedup.process(&snapshot(minute(0), &["ABC123"]));
        let update = dedup.process(&snapshot(minute(9), &["ABC123"]));
        assert!(update.closed.is_empty());

        let update = dedup.process(&snapshot(minute(19), &["ABC123"]));
        assert_eq!(update.closed.len(), 1);
        assert_eq!(update.closed[0].session_end, minute(9));
        assert_eq!(update.opened, vec![hex("ABC123")]);
    }

    #[test]
    fn abc123_scenario() {
        let mut dedup = SessionDeduplicator::new(TEN_MINUTES);
        assert!(dedup.process(&snapshot(minute(0), &["ABC123"])).closed.is_empty());
        assert!(dedup.process(&snapshot(minute(5), &["ABC123"])).closed.is_empty());

        let update = dedup.process(&snapshot(minute(15), &["ABC123"]));
        assert_eq!(update.closed.len(), 1);
        assert_eq!(update.closed[0].session_start, minute(0));
        assert_eq!(update.closed[0].session_end, minute(5));
        assert_eq!(update.opened, vec![hex("ABC123")]);

        let open = dedup.open_session(&hex("ABC123")).unwrap();
        assert_eq!(open.session_start, minute(15));
        assert_eq!(open.session_end, minute(15));

        assert!(dedup.sweep(minute(25) - TimeDelta::seconds(1)).is_empty());
        let swept = dedup.sweep(minute(25));
        assert_eq!(swept.len(), 1);
        assert_eq!(swept[0].session_start, minute(15));
        assert_eq!(swept[0].session_end, minute(15));
        assert_eq!(dedup.open_count(), 0);
    }

    #[test]
    fn reprocessing_a_snapshot_is_idempotent() {
        let mut dedup = SessionDeduplicator::new(TEN_MINUTES);
        let first = snapshot(minute(0), &["ABC123", "DEF456"]);
        let second = snapshot(minute(1), &["ABC123"]);

        dedup.process(&first);
        dedup.process(&second);
        let update = dedup.process(&second);

        assert!(update.opened.is_empty());
        assert!(update.touched.is_empty());
        assert_eq!(update.rejected, 0);
        assert_eq!(dedup.open_session(&hex("ABC123")).unwrap().sighting_count, 2);
        assert_eq!(dedup.open_count(), 2);
    }

    #[test]
    fn out_of_order_sighting_is_rejected() {
        let mut dedup = SessionDeduplicator::new(TEN_MINUTES);
        dedup.process(&snapshot(minute(5), &["ABC123"]));

        let result = dedup.observe(&sighting("ABC123", minute(2)));
        assert!(matches!(result, Err(SightingError::OutOfOrder { .. })));

        let mut late = snapshot(minute(6), &["DEF456"]);
        late.sightings.push(sighting("ABC123", minute(4)));
        let update = dedup.process(&late);
        assert_eq!(update.rejected, 1);
        assert_eq!(update.opened, vec![hex("DEF456")]);

        let session = dedup.open_session(&hex("ABC123")).unwrap();
        assert_eq!(session.session_end, minute(5));
        assert_eq!(session.sighting_count, 1);
    }

    #[test]
    fn sweep_only_closes_expired_sessions() {
        let mut dedup = SessionDeduplicator::new(TEN_MINUTES);
        dedup.process(&snapshot(minute(0), &["AAAAAA"]));
        dedup.process(&snapshot(minute(8), &["BBBBBB"]));

        let closed = dedup.sweep(minute(12));
        assert_eq!(closed.len(), 1);
        assert_eq!(closed[0].hex, hex("AAAAAA"));
        assert!(dedup.open_session(&hex("BBBBBB")).is_some());

        // A reappearance after the sweep opens a fresh session.
        let update = dedup.process(&snapshot(minute(13), &["AAAAAA"]));
        assert_eq!(update.opened, vec![hex("AAAAAA")]);
        assert!(update.closed.is_empty());
    }

    #[test]
    fn flush_closes_everything_at_now() {
        let mut dedup = SessionDeduplicator::new(TEN_MINUTES);
        dedup.process(&snapshot(minute(0), &["BBBBBB", "AAAAAA"]));

        let closed = dedup.flush(minute(3));
        assert_eq!(closed.len(), 2);
        assert_eq!(closed[0].hex, hex("AAAAAA"));
        assert!(closed.iter().all(|s| s.session_end == minute(3)));
        assert_eq!(dedup.open_count(), 0);
    }

    #[test]
    fn restore_skips_expired_sessions() {
        let mut dedup = SessionDeduplicator::new(TEN_MINUTES);
        let fresh = VisitSession::open(&sighting("AAAAAA", minute(0)));
        let stale = VisitSession::open(&sighting("BBBBBB", minute(-30)));

        let expired = dedup.restore(vec![fresh, stale], minute(5));
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].hex, hex("BBBBBB"));

        let update = dedup.process(&snapshot(minute(6), &["AAAAAA"]));
        assert!(update.opened.is_empty());
        assert_eq!(dedup.open_session(&hex("AAAAAA")).unwrap().sighting_count, 2);
    }
}
