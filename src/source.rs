//! Snapshot sources: a local `aircraft.json` file or an HTTP endpoint

use std::io::ErrorKind;
use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use tracing::{debug, warn};

use crate::config::{FeedConfig, FeedMode};
use crate::errors::{FeedError, TailRecorderError};
use crate::models::Snapshot;

/// Pause before re-reading a file that looked half-written
const PARTIAL_READ_RETRY_DELAY: Duration = Duration::from_millis(150);

#[async_trait]
pub trait SnapshotSource: Send + Sync {
    /// Fetch the current snapshot
    async fn poll(&mut self) -> Result<Snapshot, FeedError>;
}

/// Build the source selected by configuration
pub fn from_config(config: &FeedConfig) -> Result<Box<dyn SnapshotSource>, TailRecorderError> {
    match config.mode {
        FeedMode::File => {
            let path = config.path.clone().ok_or_else(|| {
                TailRecorderError::ConfigurationError {
                    message: "Feed mode 'file' requires feed.path".to_string(),
                }
            })?;
            Ok(Box::new(FileSource::new(path, config.timeout)))
        }
        FeedMode::Http => {
            let url = config.url.clone().unwrap_or_default();
            Ok(Box::new(HttpSource::new(url, config.timeout)?))
        }
    }
}

/// Parses payloads and rejects snapshots that were already delivered
#[derive(Debug, Default)]
struct SnapshotDecoder {
    last_capture: Option<DateTime<Utc>>,
}

impl SnapshotDecoder {
    fn decode(&self, payload: &[u8], now: DateTime<Utc>) -> Result<Snapshot, serde_json::Error> {
        let (snapshot, rejected) = Snapshot::from_json(payload, now)?;
        for e in &rejected {
            debug!("Skipping aircraft record: {}", e);
        }
        if !rejected.is_empty() {
            warn!(
                "Dropped {} malformed aircraft records of {}",
                rejected.len(),
                rejected.len() + snapshot.sightings.len()
            );
        }
        Ok(snapshot)
    }

    /// Remember the capture time, failing if it did not move forward
    fn accept(&mut self, snapshot: Snapshot) -> Result<Snapshot, FeedError> {
        if let Some(last) = self.last_capture {
            if snapshot.captured_at <= last {
                return Err(FeedError::Transient(format!(
                    "snapshot not newer than previous capture at {}",
                    last
                )));
            }
        }
        self.last_capture = Some(snapshot.captured_at);
        Ok(snapshot)
    }
}

pub struct FileSource {
    path: PathBuf,
    timeout: Duration,
    decoder: SnapshotDecoder,
}

impl FileSource {
    pub fn new(path: PathBuf, timeout: Duration) -> Self {
        Self {
            path,
            timeout,
            decoder: SnapshotDecoder::default(),
        }
    }

    async fn read(&self) -> Result<Vec<u8>, FeedError> {
        let read = tokio::time::timeout(self.timeout, tokio::fs::read(&self.path)).await;
        match read {
            Ok(Ok(bytes)) => Ok(bytes),
            Ok(Err(e)) => Err(self.classify_io(e)),
            Err(_) => Err(FeedError::Transient(format!(
                "reading {} timed out",
                self.path.display()
            ))),
        }
    }

    fn classify_io(&self, e: std::io::Error) -> FeedError {
        let parent_exists = self
            .path
            .parent()
            .map_or(true, |p| p.as_os_str().is_empty() || p.is_dir());
        match e.kind() {
            ErrorKind::NotFound if parent_exists => {
                FeedError::Transient(format!("{} not present yet", self.path.display()))
            }
            ErrorKind::NotFound | ErrorKind::PermissionDenied => {
                FeedError::Fatal(format!("cannot read {}: {}", self.path.display(), e))
            }
            _ if self.path.is_dir() => {
                FeedError::Fatal(format!("{} is a directory", self.path.display()))
            }
            _ => FeedError::Transient(format!("reading {}: {}", self.path.display(), e)),
        }
    }
}

#[async_trait]
impl SnapshotSource for FileSource {
    async fn poll(&mut self) -> Result<Snapshot, FeedError> {
        let bytes = self.read().await?;
        let snapshot = match self.decoder.decode(&bytes, Utc::now()) {
            Ok(snapshot) => snapshot,
            Err(first) => {
                debug!("Snapshot unreadable ({}), retrying once", first);
                tokio::time::sleep(PARTIAL_READ_RETRY_DELAY).await;
                let bytes = self.read().await?;
                self.decoder
                    .decode(&bytes, Utc::now())
                    .map_err(|e| FeedError::Transient(format!("malformed snapshot: {}", e)))?
            }
        };
        self.decoder.accept(snapshot)
    }
}

pub struct HttpSource {
    http: reqwest::Client,
    url: String,
    decoder: SnapshotDecoder,
}

impl HttpSource {
    pub fn new(url: String, timeout: Duration) -> Result<Self, TailRecorderError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            url,
            decoder: SnapshotDecoder::default(),
        })
    }

    fn classify_status(status: StatusCode) -> Option<FeedError> {
        if status.is_success() {
            None
        } else if status.is_client_error()
            && status != StatusCode::REQUEST_TIMEOUT
            && status != StatusCode::TOO_MANY_REQUESTS
        {
            Some(FeedError::Fatal(format!("feed answered HTTP {}", status)))
        } else {
            Some(FeedError::Transient(format!("feed answered HTTP {}", status)))
        }
    }
}

#[async_trait]
impl SnapshotSource for HttpSource {
    async fn poll(&mut self) -> Result<Snapshot, FeedError> {
        let response = self.http.get(&self.url).send().await.map_err(|e| {
            if e.is_builder() {
                FeedError::Fatal(format!("invalid feed URL {:?}: {}", self.url, e))
            } else {
                FeedError::Transient(e.to_string())
            }
        })?;

        if let Some(e) = Self::classify_status(response.status()) {
            return Err(e);
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| FeedError::Transient(e.to_string()))?;
        let snapshot = self
            .decoder
            .decode(&body, Utc::now())
            .map_err(|e| FeedError::Transient(format!("malformed snapshot: {}", e)))?;
        self.decoder.accept(snapshot)
    }
}
