//! Application configuration

use std::path::{Path, PathBuf};
use std::time::Duration;

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use serde_with::serde_as;
use tracing::warn;

use crate::errors::TailRecorderError;

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub feed: FeedConfig,
    #[serde(default)]
    pub sessions: SessionConfig,
    #[serde(default)]
    pub live: LiveConfig,
    #[serde(default)]
    pub resolver: ResolverConfig,
    pub database: DatabaseConfig,
    /// Log resolver and live-map counts every this many ticks
    #[serde(default = "default_status_every_ticks")]
    pub status_every_ticks: u64,
}

/// Where snapshots are read from
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FeedMode {
    File,
    Http,
}

#[serde_as]
#[derive(Debug, Deserialize, Clone)]
pub struct FeedConfig {
    pub mode: FeedMode,
    pub path: Option<PathBuf>,
    pub url: Option<String>,
    #[serde_as(as = "serde_with::DurationSeconds<u64>")]
    #[serde(default = "default_poll_interval")]
    pub interval: Duration,
    #[serde_as(as = "serde_with::DurationSeconds<u64>")]
    #[serde(default = "default_feed_timeout")]
    pub timeout: Duration,
    /// Poll cadence while the source is misconfigured
    #[serde_as(as = "serde_with::DurationSeconds<u64>")]
    #[serde(default = "default_fatal_retry_interval")]
    pub fatal_retry_interval: Duration,
}

#[serde_as]
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SessionConfig {
    /// Longest silence that still counts as the same visit
    #[serde_as(as = "serde_with::DurationSeconds<u64>")]
    pub gap_threshold: Duration,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LiveConfig {
    /// Consecutive missed ticks tolerated before an aircraft leaves the live map
    pub eviction_ticks: u32,
}

#[serde_as]
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ResolverConfig {
    pub base_url: String,
    pub concurrency: usize,
    /// Minimum spacing between two outgoing lookup requests
    #[serde_as(as = "serde_with::DurationMilliSeconds<u64>")]
    pub min_spacing: Duration,
    pub max_attempts: u32,
    #[serde_as(as = "serde_with::DurationMilliSeconds<u64>")]
    pub backoff_base: Duration,
    #[serde_as(as = "serde_with::DurationSeconds<u64>")]
    pub cooldown: Duration,
    #[serde_as(as = "Option<serde_with::DurationSeconds<u64>>")]
    pub ttl: Option<Duration>,
    #[serde_as(as = "serde_with::DurationSeconds<u64>")]
    pub timeout: Duration,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub path: PathBuf,
}

fn default_status_every_ticks() -> u64 {
    30
}

fn default_poll_interval() -> Duration {
    Duration::from_secs(10)
}

fn default_feed_timeout() -> Duration {
    Duration::from_secs(3)
}

fn default_fatal_retry_interval() -> Duration {
    Duration::from_secs(60)
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            gap_threshold: Duration::from_secs(600),
        }
    }
}

impl Default for LiveConfig {
    fn default() -> Self {
        Self { eviction_ticks: 20 }
    }
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.adsbdb.com/v0".to_string(),
            concurrency: 2,
            min_spacing: Duration::from_millis(1000),
            max_attempts: 4,
            backoff_base: Duration::from_millis(2000),
            cooldown: Duration::from_secs(1800),
            ttl: None,
            timeout: Duration::from_secs(3),
        }
    }
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(
                Environment::with_prefix("TAILRECORDER")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Validate every section
    pub fn validate(&self) -> Result<(), TailRecorderError> {
        self.feed.validate()?;
        self.sessions.validate()?;
        self.live.validate()?;
        self.resolver.validate()?;
        self.database.validate()?;
        Ok(())
    }
}

fn config_error(message: &str) -> TailRecorderError {
    TailRecorderError::ConfigurationError {
        message: message.to_string(),
    }
}

impl FeedConfig {
    pub fn validate(&self) -> Result<(), TailRecorderError> {
        match self.mode {
            FeedMode::File if self.path.is_none() => {
                return Err(config_error("Feed mode 'file' requires feed.path"));
            }
            FeedMode::Http if self.url.as_deref().unwrap_or("").is_empty() => {
                return Err(config_error("Feed mode 'http' requires feed.url"));
            }
            _ => {}
        }
        if self.interval.is_zero() {
            return Err(config_error("Poll interval must be greater than zero"));
        }
        if self.timeout >= self.interval {
            warn!("Feed timeout is not shorter than the poll interval; ticks may be skipped");
        }
        if self.fatal_retry_interval < self.interval {
            return Err(config_error(
                "Fatal retry interval must not be shorter than the poll interval",
            ));
        }
        Ok(())
    }
}

impl SessionConfig {
    pub fn validate(&self) -> Result<(), TailRecorderError> {
        if self.gap_threshold.is_zero() {
            return Err(config_error("Session gap threshold must be greater than zero"));
        }
        Ok(())
    }
}

impl LiveConfig {
    pub fn validate(&self) -> Result<(), TailRecorderError> {
        if self.eviction_ticks == 0 {
            return Err(config_error("Live eviction bound must be at least one tick"));
        }
        Ok(())
    }
}

impl ResolverConfig {
    pub fn validate(&self) -> Result<(), TailRecorderError> {
        if self.base_url.is_empty() {
            return Err(config_error("Resolver base URL cannot be empty"));
        }
        if self.concurrency == 0 {
            return Err(config_error("Resolver concurrency must be at least one"));
        }
        if self.max_attempts == 0 {
            return Err(config_error("Resolver must make at least one attempt"));
        }
        Ok(())
    }
}

impl DatabaseConfig {
    /// Validate configuration parameters
    pub fn validate(&self) -> Result<(), TailRecorderError> {
        self.validate_path()?;
        if let Some(parent) = self.path.parent() {
            self.ensure_directory_exists(parent)?;
        }
        Ok(())
    }

    fn validate_path(&self) -> Result<(), TailRecorderError> {
        if self.path.to_str().unwrap_or("").is_empty() {
            return Err(config_error("Database path cannot be empty"));
        }
        Ok(())
    }

    fn ensure_directory_exists(&self, dir: &Path) -> Result<(), TailRecorderError> {
        if !dir.as_os_str().is_empty() && !dir.exists() {
            warn!("Database directory does not exist, attempting to create it");
            std::fs::create_dir_all(dir).map_err(|e| TailRecorderError::ConfigurationError {
                message: format!("Could not create database directory: {}", e),
            })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    fn file_feed() -> FeedConfig {
        FeedConfig {
            mode: FeedMode::File,
            path: Some(PathBuf::from("/run/readsb/aircraft.json")),
            url: None,
            interval: Duration::from_secs(10),
            timeout: Duration::from_secs(3),
            fatal_retry_interval: Duration::from_secs(60),
        }
    }

    #[test]
    fn test_load_config() {
        env::set_var("TAILRECORDER__FEED__MODE", "http");
        env::set_var("TAILRECORDER__FEED__URL", "http://localhost:8080/data/aircraft.json");
        env::set_var("TAILRECORDER__FEED__INTERVAL", "5");
        env::set_var("TAILRECORDER__SESSIONS__GAP_THRESHOLD", "300");
        env::set_var("TAILRECORDER__DATABASE__PATH", "/tmp/tail-recorder.sqlite");

        let config = AppConfig::load().unwrap();
        assert_eq!(config.feed.mode, FeedMode::Http);
        assert_eq!(
            config.feed.url.as_deref(),
            Some("http://localhost:8080/data/aircraft.json")
        );
        assert_eq!(config.feed.interval, Duration::from_secs(5));
        assert_eq!(config.feed.timeout, Duration::from_secs(3));
        assert_eq!(config.sessions.gap_threshold, Duration::from_secs(300));
        assert_eq!(config.live.eviction_ticks, 20);
        assert_eq!(config.resolver.max_attempts, 4);
        assert_eq!(
            config.database.path,
            PathBuf::from("/tmp/tail-recorder.sqlite")
        );
    }

    #[test]
    fn test_feed_config_validate() {
        assert!(file_feed().validate().is_ok());
    }

    #[test]
    fn test_feed_config_requires_path_for_file_mode() {
        let config = FeedConfig {
            path: None,
            ..file_feed()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_feed_config_requires_url_for_http_mode() {
        let config = FeedConfig {
            mode: FeedMode::Http,
            url: Some(String::new()),
            ..file_feed()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_feed_config_rejects_fast_fatal_retry() {
        let config = FeedConfig {
            fatal_retry_interval: Duration::from_secs(1),
            ..file_feed()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_session_config_validate_zero_threshold() {
        let config = SessionConfig {
            gap_threshold: Duration::ZERO,
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_resolver_config_defaults_validate() {
        assert!(ResolverConfig::default().validate().is_ok());
        let config = ResolverConfig {
            concurrency: 0,
            ..ResolverConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_database_config_validate_invalid_path() {
        let config = DatabaseConfig {
            path: PathBuf::from(""),
        };

        assert!(config.validate().is_err());
    }
}
