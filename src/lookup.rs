//! Registration lookup service
//!
//! The [`LookupService`] trait abstracts the external hex-to-registration
//! database. [`AdsbdbClient`] talks to the adsbdb.com aircraft API via
//! `reqwest`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::debug;

use crate::errors::{LookupError, TailRecorderError};
use crate::models::{normalize_identifier, AircraftDetails, Hex};

/// Authoritative answer from the lookup service
#[derive(Debug, Clone, PartialEq)]
pub enum LookupOutcome {
    Found(AircraftDetails),
    /// The service does not know this hex
    NotFound,
}

#[async_trait]
pub trait LookupService: Send + Sync {
    async fn lookup_registration(&self, hex: &Hex) -> Result<LookupOutcome, LookupError>;
}

/// `GET {base_url}/aircraft/{hex}` response body
#[derive(Debug, Deserialize)]
struct AdsbdbResponse {
    response: AdsbdbPayload,
}

/// adsbdb answers unknown aircraft with a bare string instead of an object
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum AdsbdbPayload {
    Aircraft { aircraft: AdsbdbAircraft },
    Message(String),
}

#[derive(Debug, Deserialize)]
struct AdsbdbAircraft {
    registration: Option<String>,
    regid: Option<String>,
    #[serde(rename = "type")]
    aircraft_type: Option<String>,
    manufacturer: Option<String>,
    icao_type: Option<String>,
}

pub struct AdsbdbClient {
    http: reqwest::Client,
    base_url: String,
}

impl AdsbdbClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, TailRecorderError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("tail-recorder/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url_for(&self, hex: &Hex) -> String {
        format!(
            "{}/aircraft/{}",
            self.base_url,
            hex.as_str().to_ascii_lowercase()
        )
    }

    /// Map an HTTP status and body to a lookup result
    fn interpret(status: StatusCode, body: &[u8]) -> Result<LookupOutcome, LookupError> {
        if status == StatusCode::NOT_FOUND {
            return Ok(LookupOutcome::NotFound);
        }
        if status.is_server_error()
            || status == StatusCode::TOO_MANY_REQUESTS
            || status == StatusCode::REQUEST_TIMEOUT
        {
            return Err(LookupError::Transient(format!("HTTP {}", status)));
        }
        if !status.is_success() {
            return Err(LookupError::Rejected(format!("HTTP {}", status)));
        }

        let parsed: AdsbdbResponse = serde_json::from_slice(body)
            .map_err(|e| LookupError::Transient(format!("unreadable response: {}", e)))?;

        match parsed.response {
            AdsbdbPayload::Aircraft { aircraft } => {
                match normalize_identifier(aircraft.registration.or(aircraft.regid)) {
                    Some(registration) => Ok(LookupOutcome::Found(AircraftDetails {
                        registration,
                        aircraft_type: aircraft.aircraft_type,
                        manufacturer: aircraft.manufacturer,
                        icao_type: aircraft.icao_type,
                    })),
                    None => Ok(LookupOutcome::NotFound),
                }
            }
            AdsbdbPayload::Message(message) => {
                debug!("Lookup service answered: {}", message);
                Ok(LookupOutcome::NotFound)
            }
        }
    }
}

#[async_trait]
impl LookupService for AdsbdbClient {
    async fn lookup_registration(&self, hex: &Hex) -> Result<LookupOutcome, LookupError> {
        let response = self
            .http
            .get(self.url_for(hex))
            .send()
            .await
            .map_err(|e| LookupError::Transient(e.to_string()))?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| LookupError::Transient(e.to_string()))?;

        Self::interpret(status, &body)
    }
}
