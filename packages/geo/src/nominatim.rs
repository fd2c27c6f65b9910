//! Nominatim / OpenStreetMap reverse-geocoding client.
//!
//! One outbound request per lookup, no retries; retry and rate-limit policy
//! belong to the caller (the public Nominatim instance allows at most
//! **1 request per second**, see [`crate::cache::DEFAULT_THROTTLE`]).
//!
//! See <https://nominatim.org/release-docs/develop/api/Reverse/>

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::Position;

/// Reverse endpoint of the public Nominatim instance.
pub const DEFAULT_BASE_URL: &str = "https://nominatim.openstreetmap.org/reverse";

/// Client-side bound on a single request.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Identifies this project to the service, per the Nominatim usage policy.
const USER_AGENT: &str = "fruit-map (https://github.com/fruktkartan/fruit-map)";

/// Errors from a single reverse-geocoding request.
#[derive(Debug, Error)]
pub enum GeocodeError {
    /// Network-level failure: connect error, timeout, or body read.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The service answered with a non-200 status.
    #[error("service returned HTTP {status}")]
    Status {
        /// HTTP status code of the rejection.
        status: u16,
    },
}

/// A reverse-geocoding backend.
///
/// Implementations resolve a [`Position`] to the service's raw response
/// body; [`crate::cache::ReverseCache`] decides how the bytes are stored
/// and parsed. Tests substitute a deterministic fake.
#[async_trait]
pub trait ReverseGeocode: Send + Sync {
    /// Looks up `pos`, returning the raw response body on HTTP 200.
    ///
    /// # Errors
    ///
    /// [`GeocodeError::Transport`] for network failures,
    /// [`GeocodeError::Status`] for non-200 responses.
    async fn reverse(&self, pos: Position) -> Result<Vec<u8>, GeocodeError>;
}

/// Client for the Nominatim reverse endpoint.
pub struct NominatimClient {
    client: reqwest::Client,
    base_url: String,
}

impl NominatimClient {
    /// Creates a client against the public Nominatim instance.
    ///
    /// # Errors
    ///
    /// Returns [`GeocodeError::Transport`] if the underlying HTTP client
    /// cannot be constructed.
    pub fn new() -> Result<Self, GeocodeError> {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    /// Creates a client against a custom endpoint (self-hosted instances,
    /// tests).
    ///
    /// # Errors
    ///
    /// Returns [`GeocodeError::Transport`] if the underlying HTTP client
    /// cannot be constructed.
    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self, GeocodeError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }
}

#[async_trait]
impl ReverseGeocode for NominatimClient {
    async fn reverse(&self, pos: Position) -> Result<Vec<u8>, GeocodeError> {
        let lat = pos.lat.to_string();
        let lon = pos.lon.to_string();

        let resp = self
            .client
            .get(&self.base_url)
            .header("accept", "application/json")
            .header("accept-language", "sv,en-US,en")
            .query(&[
                ("format", "json"),
                ("lat", lat.as_str()),
                ("lon", lon.as_str()),
            ])
            .send()
            .await?;

        let status = resp.status();
        let body = resp.bytes().await?;

        if status != reqwest::StatusCode::OK {
            return Err(GeocodeError::Status {
                status: status.as_u16(),
            });
        }

        Ok(body.to_vec())
    }
}
