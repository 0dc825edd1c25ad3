//! The poll loop tying the feed to sessions, the live map and persistence

use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::config::AppConfig;
use crate::errors::FeedError;
use crate::live::SharedLiveState;
use crate::recorder::RecorderHandle;
use crate::resolver::RegistrationResolver;
use crate::session::SessionDeduplicator;
use crate::source::SnapshotSource;

/// What one tick did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    Applied {
        sightings: usize,
        opened: usize,
        closed: usize,
        evicted: usize,
    },
    /// The feed was temporarily unavailable; only the sweep ran
    Skipped { closed: usize },
    /// The source is misconfigured; the sweep still ran
    Fatal { closed: usize },
}

pub struct Pipeline {
    source: Box<dyn SnapshotSource>,
    sessions: SessionDeduplicator,
    live: SharedLiveState,
    resolver: RegistrationResolver,
    recorder: RecorderHandle,
    interval: Duration,
    fatal_retry_interval: Duration,
    status_every_ticks: u64,
}

impl Pipeline {
    pub fn new(
        source: Box<dyn SnapshotSource>,
        sessions: SessionDeduplicator,
        live: SharedLiveState,
        resolver: RegistrationResolver,
        recorder: RecorderHandle,
        config: &AppConfig,
    ) -> Self {
        Self {
            source,
            sessions,
            live,
            resolver,
            recorder,
            interval: config.feed.interval,
            fatal_retry_interval: config.feed.fatal_retry_interval,
            status_every_ticks: config.status_every_ticks,
        }
    }

    pub fn sessions(&self) -> &SessionDeduplicator {
        &self.sessions
    }

    /// Poll once and apply the result
    pub async fn tick(&mut self, now: DateTime<Utc>) -> TickOutcome {
        let snapshot = match self.source.poll().await {
            Ok(snapshot) => snapshot,
            Err(FeedError::Transient(reason)) => {
                debug!("Skipping tick: {}", reason);
                let closed = self.close_expired(now);
                return TickOutcome::Skipped { closed };
            }
            Err(e @ FeedError::Fatal(_)) => {
                error!("{}", e);
                let closed = self.close_expired(now);
                return TickOutcome::Fatal { closed };
            }
        };

        for sighting in &snapshot.sightings {
            if let Some(registration) = &sighting.registration {
                if self.resolver.seed(&sighting.hex, registration, now) {
                    self.recorder
                        .registration(sighting.hex.clone(), registration.clone(), now);
                }
            }
        }

        let update = self.sessions.process(&snapshot);
        let mut closed = update.closed.len();
        for session in update.closed {
            self.recorder.close(session);
        }
        for session in update.touched {
            self.recorder.upsert(session);
        }

        let live = self.live.write().await.update(&snapshot, &self.resolver);
        if live.duplicate {
            debug!("Snapshot at {} already applied", snapshot.captured_at);
        }

        closed += self.close_expired(now);
        self.recorder.snapshot_at(snapshot.captured_at);

        TickOutcome::Applied {
            sightings: snapshot.sightings.len(),
            opened: update.opened.len(),
            closed,
            evicted: live.evicted.len(),
        }
    }

    fn close_expired(&mut self, now: DateTime<Utc>) -> usize {
        let expired = self.sessions.sweep(now);
        let count = expired.len();
        for session in expired {
            self.recorder.close(session);
        }
        count
    }

    /// Close every open session, used on shutdown
    pub fn flush(&mut self, now: DateTime<Utc>) -> usize {
        let open = self.sessions.flush(now);
        let count = open.len();
        for session in open {
            self.recorder.close(session);
        }
        count
    }

    async fn log_status(&self) {
        let (visible, unnamed) = {
            let live = self.live.read().await;
            (live.len(), live.unnamed())
        };
        let stats = self.resolver.stats();
        info!(
            "Status: {} visible ({} unnamed), {} open sessions, registrations {} known / {} not found / {} pending / {} failed",
            visible,
            unnamed,
            self.sessions.open_count(),
            stats.known,
            stats.not_found,
            stats.pending,
            stats.failed
        );
    }

    /// Poll on the configured cadence until shutdown, then flush open
    /// sessions
    ///
    /// A fatal feed error moves polling to the slower retry cadence until
    /// the source recovers.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        info!("Polling feed every {:?}", self.interval);
        let mut period = self.interval;
        let mut ticker = poll_timer(period, Duration::ZERO);
        let mut ticks: u64 = 0;

        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                _ = ticker.tick() => {
                    let fatal = matches!(self.tick(Utc::now()).await, TickOutcome::Fatal { .. });
                    ticks += 1;

                    let wanted = if fatal {
                        self.fatal_retry_interval
                    } else {
                        self.interval
                    };
                    if wanted != period {
                        if fatal {
                            warn!("Feed misconfigured, retrying every {:?}", wanted);
                        } else {
                            info!("Feed recovered, polling every {:?}", wanted);
                        }
                        period = wanted;
                        ticker = poll_timer(period, period);
                    }

                    if self.status_every_ticks > 0 && ticks % self.status_every_ticks == 0 {
                        self.log_status().await;
                    }
                }
            }
        }

        let flushed = self.flush(Utc::now());
        info!("Poll loop stopped, closed {} open sessions", flushed);
    }
}

fn poll_timer(period: Duration, delay: Duration) -> Interval {
    let mut ticker = interval_at(Instant::now() + delay, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    ticker
}
