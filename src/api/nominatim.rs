use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

use crate::config::NominatimConfig;

#[derive(Debug, Error)]
pub enum GeocodeError {
    #[error("address is empty")]
    EmptyAddress,

    #[error("address not found: {address}")]
    NotFound { address: String },

    #[error("Nominatim API returned error status: {status}")]
    Status { status: reqwest::StatusCode },

    #[error("failed to reach Nominatim API: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("malformed Nominatim response: {reason}")]
    MalformedResponse { reason: String },
}

#[derive(Debug, Deserialize)]
struct NominatimResult {
    lat: String,
    lon: String,
    #[serde(default)]
    boundingbox: Vec<String>,
    #[serde(default)]
    display_name: String,
}

/// The single best match for an address
#[derive(Debug, Clone, PartialEq)]
pub struct GeocodeResult {
    /// (lat, lon) of the match in WGS84
    pub reference_point: (f64, f64),
    /// `[lat_min, lat_max, lon_min, lon_max]` exactly as returned
    pub raw_bounding_box: Vec<String>,
    pub display_name: String,
}

/// Blocking client for the Nominatim search endpoint
pub struct NominatimClient {
    client: reqwest::blocking::Client,
    url: String,
}

impl NominatimClient {
    pub fn new(config: &NominatimConfig) -> Result<Self, reqwest::Error> {
        // Nominatim's usage policy requires an identifying User-Agent
        let client = reqwest::blocking::Client::builder()
            .user_agent(config.user_agent.as_str())
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            url: config.url.clone(),
        })
    }

    /// Geocode a free-text address to its best match.
    ///
    /// Sends exactly one request asking for at most one result. A response
    /// with zero matches is reported as [`GeocodeError::NotFound`] so callers
    /// can stop cleanly instead of treating it as a failure.
    pub fn geocode(&self, address: &str) -> Result<GeocodeResult, GeocodeError> {
        let address = address.trim();
        if address.is_empty() {
            return Err(GeocodeError::EmptyAddress);
        }

        tracing::debug!(url = %self.url, address, "geocoding address");

        let response = self
            .client
            .get(&self.url)
            .query(&[("q", address), ("format", "json"), ("limit", "1")])
            .send()?;

        if !response.status().is_success() {
            return Err(GeocodeError::Status {
                status: response.status(),
            });
        }

        let body = response.text()?;
        let results: Vec<NominatimResult> =
            serde_json::from_str(&body).map_err(|e| GeocodeError::MalformedResponse {
                reason: e.to_string(),
            })?;

        let result = results
            .into_iter()
            .next()
            .ok_or_else(|| GeocodeError::NotFound {
                address: address.to_string(),
            })?;

        let lat = parse_coordinate(&result.lat, "latitude")?;
        let lon = parse_coordinate(&result.lon, "longitude")?;

        tracing::info!(lat, lon, display_name = %result.display_name, "address geocoded");

        Ok(GeocodeResult {
            reference_point: (lat, lon),
            raw_bounding_box: result.boundingbox,
            display_name: result.display_name,
        })
    }
}

fn parse_coordinate(raw: &str, what: &str) -> Result<f64, GeocodeError> {
    raw.trim()
        .parse()
        .map_err(|_| GeocodeError::MalformedResponse {
            reason: format!("{what} {raw:?} is not a number"),
        })
}
