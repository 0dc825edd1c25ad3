//! Errors for tail recorder
use thiserror::Error;

/// Process-level errors, returned only while starting up.
#[derive(Error, Debug)]
pub enum TailRecorderError {
    #[error("Configuration error")]
    ConfigError(#[from] config::ConfigError),

    #[error("Configuration error: {message}")]
    ConfigurationError { message: String },

    #[error("Serialization error")]
    SerdeError(#[from] serde_json::Error),

    #[error("IO error")]
    IoError(#[from] std::io::Error),

    #[error("HTTP client error")]
    HttpClientError(#[from] reqwest::Error),

    #[error("Invalid hex identifier: {0}")]
    InvalidHex(String),

    #[error("Invalid stored record: {0}")]
    InvalidRecord(String),

    #[error("Database migration error")]
    MigrationError(#[from] sqlx::migrate::MigrateError),

    #[error("Database error")]
    DatabaseError(#[from] sqlx::Error),
}

/// Snapshot source failures, classified by how the poll loop reacts.
#[derive(Error, Debug)]
pub enum FeedError {
    /// Feed temporarily unavailable; skip this tick and keep live state.
    #[error("Transient feed error: {0}")]
    Transient(String),

    /// Misconfigured source; keep polling on the slower retry cadence.
    #[error("Fatal feed configuration error: {0}")]
    Fatal(String),
}

impl FeedError {
    pub fn is_fatal(&self) -> bool {
        matches!(self, FeedError::Fatal(_))
    }
}

/// A single sighting that was dropped without touching session state.
#[derive(Error, Debug, PartialEq)]
pub enum SightingError {
    #[error("Malformed sighting: {0}")]
    Malformed(String),

    #[error("Out-of-order sighting for {hex}: observed {observed_at}, session ends {session_end}")]
    OutOfOrder {
        hex: String,
        observed_at: chrono::DateTime<chrono::Utc>,
        session_end: chrono::DateTime<chrono::Utc>,
    },
}

/// External registration lookup failures.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LookupError {
    /// Timeout, 5xx, rate limiting or network error; retried with backoff.
    #[error("Transient lookup error: {0}")]
    Transient(String),

    /// The service refused the request; retrying will not help.
    #[error("Lookup rejected: {0}")]
    Rejected(String),
}

impl LookupError {
    pub fn is_transient(&self) -> bool {
        matches!(self, LookupError::Transient(_))
    }
}
