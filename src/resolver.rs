//! Cache-first, rate-limited resolution of hex identifiers to registrations
//!
//! [`RegistrationResolver`] is the non-blocking front: callers get an answer
//! from the in-memory cache immediately, and unknown hexes are queued at most
//! once. [`ResolverWorker`] drains that queue in the background with bounded
//! concurrency, a minimum spacing between requests and exponential backoff on
//! transient failures.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;
use tokio::sync::{mpsc, watch, OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::config::ResolverConfig;
use crate::gateway::PersistenceGateway;
use crate::lookup::{LookupOutcome, LookupService};
use crate::models::Hex;
use crate::ratelimit::RateLimiter;

/// What a caller learns about a hex right now
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Known(String),
    NotFound,
    /// A lookup is queued or in flight
    Pending,
    /// Lookups gave up recently; retried after the cool-down
    Failed,
}

/// Read-only registration source for the live map
pub trait RegistrationLookup {
    fn lookup(&self, hex: &Hex) -> Resolution;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LookupState {
    Unresolved,
    Pending,
    Resolved,
    NotFound,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegistrationCacheEntry {
    pub hex: Hex,
    /// `None` together with `NotFound` means "looked up, unknown"
    pub registration: Option<String>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub state: LookupState,
    pub failed_at: Option<DateTime<Utc>>,
}

impl RegistrationCacheEntry {
    fn unresolved(hex: Hex) -> Self {
        Self {
            hex,
            registration: None,
            resolved_at: None,
            expires_at: None,
            state: LookupState::Unresolved,
            failed_at: None,
        }
    }

    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expires| expires <= now)
    }
}

/// Counts for status displays
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct ResolverStats {
    pub known: usize,
    pub not_found: usize,
    pub pending: usize,
    pub failed: usize,
}

struct ResolverShared {
    entries: RwLock<HashMap<Hex, RegistrationCacheEntry>>,
    queue: mpsc::UnboundedSender<Hex>,
    ttl: Option<TimeDelta>,
    cooldown: TimeDelta,
}

/// Handle to the registration cache; cheap to clone
#[derive(Clone)]
pub struct RegistrationResolver {
    shared: Arc<ResolverShared>,
}

impl RegistrationResolver {
    /// Create the cache and the queue its worker drains
    pub fn new(config: &ResolverConfig) -> (Self, mpsc::UnboundedReceiver<Hex>) {
        let (queue, rx) = mpsc::unbounded_channel();
        let resolver = Self {
            shared: Arc::new(ResolverShared {
                entries: RwLock::new(HashMap::new()),
                queue,
                ttl: config.ttl.and_then(|ttl| TimeDelta::from_std(ttl).ok()),
                cooldown: TimeDelta::from_std(config.cooldown).unwrap_or(TimeDelta::MAX),
            }),
        };
        (resolver, rx)
    }

    pub fn resolve(&self, hex: &Hex) -> Resolution {
        self.resolve_at(hex, Utc::now())
    }

    /// Answer from the cache, queueing a lookup when one is due
    pub fn resolve_at(&self, hex: &Hex, now: DateTime<Utc>) -> Resolution {
        let mut entries = self.write_entries();
        let entry = entries
            .entry(hex.clone())
            .or_insert_with(|| RegistrationCacheEntry::unresolved(hex.clone()));

        let due = match entry.state {
            LookupState::Unresolved => true,
            LookupState::Resolved | LookupState::NotFound => entry.is_expired(now),
            LookupState::Failed => entry
                .failed_at
                .map_or(true, |failed_at| now - failed_at >= self.shared.cooldown),
            LookupState::Pending => false,
        };
        if due {
            entry.state = LookupState::Pending;
            if self.shared.queue.send(hex.clone()).is_err() {
                warn!("Resolver queue closed, cannot look up {}", hex);
                entry.state = LookupState::Failed;
                entry.failed_at = Some(now);
            }
        }

        match (entry.state, &entry.registration) {
            (_, Some(registration)) => Resolution::Known(registration.clone()),
            (LookupState::NotFound, None) => Resolution::NotFound,
            (LookupState::Failed, None) => Resolution::Failed,
            _ => Resolution::Pending,
        }
    }

    /// Record a registration broadcast by the feed itself
    ///
    /// Returns `true` when the cached registration changed and should be
    /// persisted.
    pub fn seed(&self, hex: &Hex, registration: &str, now: DateTime<Utc>) -> bool {
        let mut entries = self.write_entries();
        let entry = entries
            .entry(hex.clone())
            .or_insert_with(|| RegistrationCacheEntry::unresolved(hex.clone()));
        if entry.registration.as_deref() == Some(registration) {
            return false;
        }
        entry.registration = Some(registration.to_string());
        // An in-flight lookup still owns the state and will finish it.
        if entry.state != LookupState::Pending {
            entry.state = LookupState::Resolved;
            entry.resolved_at = Some(now);
            entry.expires_at = self.expiry(now);
        }
        true
    }

    /// Warm the cache with entries persisted by an earlier run
    pub fn preload(&self, loaded: Vec<RegistrationCacheEntry>) {
        let mut entries = self.write_entries();
        for mut entry in loaded {
            if entry.expires_at.is_none() {
                entry.expires_at = entry.resolved_at.and_then(|at| self.expiry(at));
            }
            entries.insert(entry.hex.clone(), entry);
        }
    }

    pub fn entry(&self, hex: &Hex) -> Option<RegistrationCacheEntry> {
        self.read_entries().get(hex).cloned()
    }

    pub fn stats(&self) -> ResolverStats {
        let entries = self.read_entries();
        let mut stats = ResolverStats::default();
        for entry in entries.values() {
            match entry.state {
                LookupState::Resolved => stats.known += 1,
                LookupState::NotFound => stats.not_found += 1,
                LookupState::Pending => stats.pending += 1,
                LookupState::Failed => stats.failed += 1,
                LookupState::Unresolved => {}
            }
        }
        stats
    }

    fn read_entries(&self) -> RwLockReadGuard<'_, HashMap<Hex, RegistrationCacheEntry>> {
        self.shared
            .entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn write_entries(&self) -> RwLockWriteGuard<'_, HashMap<Hex, RegistrationCacheEntry>> {
        self.shared
            .entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn expiry(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.shared.ttl.map(|ttl| now + ttl)
    }

    fn complete(&self, hex: &Hex, outcome: &LookupOutcome, now: DateTime<Utc>) {
        let expires_at = self.expiry(now);
        let mut entries = self.write_entries();
        let entry = entries
            .entry(hex.clone())
            .or_insert_with(|| RegistrationCacheEntry::unresolved(hex.clone()));
        match outcome {
            LookupOutcome::Found(details) => {
                entry.registration = Some(details.registration.clone());
                entry.state = LookupState::Resolved;
            }
            LookupOutcome::NotFound => {
                entry.registration = None;
                entry.state = LookupState::NotFound;
            }
        }
        entry.resolved_at = Some(now);
        entry.expires_at = expires_at;
        entry.failed_at = None;
    }

    fn fail(&self, hex: &Hex, now: DateTime<Utc>) {
        let mut entries = self.write_entries();
        if let Some(entry) = entries.get_mut(hex) {
            // A stale-but-known registration stays usable until the cool-down ends.
            if entry.registration.is_some() {
                entry.state = LookupState::Resolved;
                entry.expires_at = now.checked_add_signed(self.shared.cooldown);
            } else {
                entry.state = LookupState::Failed;
            }
            entry.failed_at = Some(now);
        }
    }
}

impl RegistrationLookup for RegistrationResolver {
    fn lookup(&self, hex: &Hex) -> Resolution {
        self.resolve(hex)
    }
}

/// Background task draining the resolution queue
pub struct ResolverWorker<L> {
    resolver: RegistrationResolver,
    rx: mpsc::UnboundedReceiver<Hex>,
    lookup: Arc<L>,
    gateway: Option<Arc<dyn PersistenceGateway>>,
    limiter: Arc<RateLimiter>,
    permits: Arc<Semaphore>,
    max_attempts: u32,
    backoff_base: Duration,
}

impl<L: LookupService + 'static> ResolverWorker<L> {
    pub fn new(
        resolver: RegistrationResolver,
        rx: mpsc::UnboundedReceiver<Hex>,
        lookup: Arc<L>,
        config: &ResolverConfig,
    ) -> Self {
        Self {
            resolver,
            rx,
            lookup,
            gateway: None,
            limiter: Arc::new(RateLimiter::new(config.min_spacing)),
            permits: Arc::new(Semaphore::new(config.concurrency.max(1))),
            max_attempts: config.max_attempts.max(1),
            backoff_base: config.backoff_base,
        }
    }

    /// Persist every resolved entry through `gateway`
    pub fn with_gateway(mut self, gateway: Arc<dyn PersistenceGateway>) -> Self {
        self.gateway = Some(gateway);
        self
    }

    /// Drain the queue until shutdown is signalled or every resolver handle
    /// is dropped
    ///
    /// A hex is only taken off the queue once a concurrency permit is free,
    /// so at most `concurrency` lookups exist at a time. On shutdown in-flight
    /// lookups are abandoned and their entries stay `Pending`. When the queue
    /// closes, in-flight lookups are awaited. Returns the number of abandoned
    /// lookups.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> usize {
        let mut tasks = JoinSet::new();
        let mut abandon = false;

        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        abandon = true;
                        break;
                    }
                }
                job = next_job(&mut self.rx, &self.permits) => match job {
                    Some((hex, permit)) => {
                        tasks.spawn(resolve_one(
                            hex,
                            permit,
                            self.resolver.clone(),
                            self.lookup.clone(),
                            self.gateway.clone(),
                            self.limiter.clone(),
                            self.max_attempts,
                            self.backoff_base,
                        ));
                    }
                    None => break,
                },
                Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                    if let Err(e) = joined {
                        error!("Lookup task failed: {}", e);
                    }
                }
            }
        }

        let abandoned = if abandon {
            info!("Resolver stopping, abandoning {} lookups", tasks.len());
            tasks.abort_all();
            tasks.len()
        } else {
            0
        };
        while tasks.join_next().await.is_some() {}
        abandoned
    }
}

/// Wait for a free permit, then for the next queued hex
async fn next_job(
    rx: &mut mpsc::UnboundedReceiver<Hex>,
    permits: &Arc<Semaphore>,
) -> Option<(Hex, OwnedSemaphorePermit)> {
    let permit = permits.clone().acquire_owned().await.ok()?;
    let hex = rx.recv().await?;
    Some((hex, permit))
}

#[allow(clippy::too_many_arguments)]
async fn resolve_one<L: LookupService>(
    hex: Hex,
    _permit: OwnedSemaphorePermit,
    resolver: RegistrationResolver,
    lookup: Arc<L>,
    gateway: Option<Arc<dyn PersistenceGateway>>,
    limiter: Arc<RateLimiter>,
    max_attempts: u32,
    backoff_base: Duration,
) {

    let mut attempt = 0;
    loop {
        attempt += 1;
        limiter.acquire().await;

        match lookup.lookup_registration(&hex).await {
            Ok(outcome) => {
                let now = Utc::now();
                match &outcome {
                    LookupOutcome::Found(details) => {
                        info!("Resolved {} -> {}", hex, details.registration)
                    }
                    LookupOutcome::NotFound => debug!("No registration known for {}", hex),
                }
                if let Some(gateway) = &gateway {
                    if let Err(e) = gateway.store_registration(&hex, &outcome, now).await {
                        error!("Failed to persist registration for {}: {}", hex, e);
                    }
                }
                resolver.complete(&hex, &outcome, now);
                return;
            }
            Err(e) if e.is_transient() && attempt < max_attempts => {
                let delay = backoff_base.saturating_mul(1 << (attempt - 1).min(16));
                warn!(
                    "Lookup for {} failed (attempt {}/{}), retrying in {:?}: {}",
                    hex, attempt, max_attempts, delay, e
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => {
                warn!("Giving up on {} after {} attempts: {}", hex, attempt, e);
                resolver.fail(&hex, Utc::now());
                return;
            }
        }
    }
}
