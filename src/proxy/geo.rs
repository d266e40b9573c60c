//! Geolocation enrichment for probed endpoints
//!
//! A thin collaborator around an external per-IP lookup service;
//! results only decorate reports and never influence probe verdicts.

use crate::Result;
use anyhow::bail;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default endpoint for per-IP lookups
const DEFAULT_GEO_ENDPOINT: &str = "http://ip-api.com/json";

/// Default timeout for lookups in seconds
const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Geographic information for an IP address
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct GeoLocation {
    /// ISO 3166-1 alpha-2 country code (e.g., "US", "DE")
    pub country_code: Option<String>,
    /// Country name in English
    pub country_name: Option<String>,
    /// City name in English
    pub city_name: Option<String>,
    /// Provider operating the address
    pub isp: Option<String>,
    /// Latitude coordinate
    pub latitude: Option<f64>,
    /// Longitude coordinate
    pub longitude: Option<f64>,
}

impl GeoLocation {
    /// Get a short display string for the location
    pub fn short_display(&self) -> String {
        match (&self.country_code, &self.city_name) {
            (Some(cc), Some(city)) => format!("{}, {}", city, cc),
            (Some(cc), None) => cc.clone(),
            (None, Some(city)) => city.clone(),
            (None, None) => String::from("Unknown"),
        }
    }
}

impl std::fmt::Display for GeoLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let parts: Vec<String> = [
            self.city_name.clone(),
            self.country_name.clone(),
            self.isp.clone(),
        ]
        .into_iter()
        .flatten()
        .collect();

        if parts.is_empty() {
            write!(f, "Unknown Location")
        } else {
            write!(f, "{}", parts.join(", "))
        }
    }
}

/// Response shape of the external lookup service
#[derive(Debug, Deserialize)]
struct GeoApiResponse {
    status: String,
    #[serde(default)]
    country: Option<String>,
    #[serde(rename = "countryCode", default)]
    country_code: Option<String>,
    #[serde(default)]
    city: Option<String>,
    #[serde(default)]
    isp: Option<String>,
    #[serde(default)]
    lat: Option<f64>,
    #[serde(default)]
    lon: Option<f64>,
}

/// Client for the external geolocation lookup service
pub struct GeoClient {
    endpoint: String,
    client: Client,
}

impl GeoClient {
    /// Create a client against the default endpoint
    pub fn new() -> Result<Self> {
        Self::with_endpoint(DEFAULT_GEO_ENDPOINT.to_string())
    }

    pub fn with_endpoint(endpoint: String) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()?;
        Ok(Self { endpoint, client })
    }

    /// Look up the geolocation for an IP literal
    pub async fn lookup(&self, ip: &str) -> Result<GeoLocation> {
        // bracketed IPv6 goes over the wire bare
        let ip = ip.trim_start_matches('[').trim_end_matches(']');

        let url = format!("{}/{}", self.endpoint, ip);
        let response: GeoApiResponse = self.client.get(&url).send().await?.json().await?;

        if response.status != "success" {
            bail!("geo lookup for {} returned status {}", ip, response.status);
        }

        Ok(GeoLocation {
            country_code: response.country_code,
            country_name: response.country,
            city_name: response.city,
            isp: response.isp,
            latitude: response.lat,
            longitude: response.lon,
        })
    }
}
