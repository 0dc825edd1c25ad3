//! Single writer task that applies session checkpoints in order
//!
//! The poll loop never awaits the database. It hands commands to a
//! [`RecorderHandle`] and a [`SessionRecorder`] task applies them through the
//! [`PersistenceGateway`] in the order they were sent.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tracing::{debug, error, info};

use crate::gateway::PersistenceGateway;
use crate::models::{Hex, VisitSession};

#[derive(Debug, Clone, PartialEq)]
pub enum PersistCommand {
    /// Checkpoint a session that is still open
    Upsert(VisitSession),
    /// Record a session as closed
    Close(VisitSession),
    /// The feed produced a snapshot at this time
    SnapshotAt(DateTime<Utc>),
    /// The feed broadcast a registration for this hex
    Registration {
        hex: Hex,
        registration: String,
        at: DateTime<Utc>,
    },
}

/// Sending side; cheap to clone
#[derive(Clone)]
pub struct RecorderHandle {
    tx: mpsc::UnboundedSender<PersistCommand>,
}

impl RecorderHandle {
    pub fn send(&self, command: PersistCommand) {
        if self.tx.send(command).is_err() {
            error!("Session recorder has stopped, dropping write");
        }
    }

    pub fn upsert(&self, session: VisitSession) {
        self.send(PersistCommand::Upsert(session));
    }

    pub fn close(&self, session: VisitSession) {
        self.send(PersistCommand::Close(session));
    }

    pub fn snapshot_at(&self, at: DateTime<Utc>) {
        self.send(PersistCommand::SnapshotAt(at));
    }

    pub fn registration(&self, hex: Hex, registration: String, at: DateTime<Utc>) {
        self.send(PersistCommand::Registration {
            hex,
            registration,
            at,
        });
    }
}

pub struct SessionRecorder {
    gateway: Arc<dyn PersistenceGateway>,
    rx: mpsc::UnboundedReceiver<PersistCommand>,
}

impl SessionRecorder {
    pub fn new(gateway: Arc<dyn PersistenceGateway>) -> (Self, RecorderHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { gateway, rx }, RecorderHandle { tx })
    }

    /// Apply commands until every handle is dropped, then return the number
    /// of commands that failed
    pub async fn run(mut self) -> usize {
        let mut applied = 0usize;
        let mut failed = 0usize;
        while let Some(command) = self.rx.recv().await {
            match self.apply(&command).await {
                Ok(()) => applied += 1,
                Err(e) => {
                    error!("Failed to persist {:?}: {}", command, e);
                    failed += 1;
                }
            }
        }
        info!(
            "Session recorder drained: {} writes applied, {} failed",
            applied, failed
        );
        failed
    }

    async fn apply(&self, command: &PersistCommand) -> Result<(), sqlx::Error> {
        match command {
            PersistCommand::Upsert(session) => self.gateway.upsert_open_session(session).await,
            PersistCommand::Close(session) => {
                debug!(
                    "Recording closed session for {} ({} sightings)",
                    session.hex, session.sighting_count
                );
                self.gateway.record_session_close(session).await
            }
            PersistCommand::SnapshotAt(at) => {
                self.gateway.upsert_live_snapshot_timestamp(*at).await
            }
            PersistCommand::Registration {
                hex,
                registration,
                at,
            } => {
                self.gateway
                    .store_seeded_registration(hex, registration, *at)
                    .await
            }
        }
    }
}
