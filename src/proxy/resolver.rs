//! Domain resolution over DNS-over-HTTPS

use crate::proxy::models::ResolutionOutcome;
use crate::proxy::parser::AddressParser;
use crate::Result;
use anyhow::{bail, Context};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

/// Default DoH endpoint to query
const DEFAULT_DOH_ENDPOINT: &str = "https://1.1.1.1/dns-query";

/// Default timeout for DoH requests in seconds
const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// DNS answer record type for A records
const TYPE_A: u16 = 1;

/// DNS answer record type for AAAA records
const TYPE_AAAA: u16 = 28;

/// Configuration for the DoH resolver
#[derive(Debug, Clone)]
pub struct ResolverConfig {
    /// DoH endpoint URL
    pub endpoint: String,
    /// Timeout for each lookup
    pub timeout: Duration,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_DOH_ENDPOINT.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

impl ResolverConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_endpoint(mut self, endpoint: String) -> Self {
        self.endpoint = endpoint;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// JSON answer record as returned by dns-json endpoints
#[derive(Debug, Clone, Deserialize)]
struct DohAnswer {
    #[serde(rename = "type")]
    record_type: u16,
    data: String,
}

/// JSON response body of a dns-json lookup
#[derive(Debug, Clone, Deserialize)]
struct DohResponse {
    #[serde(rename = "Answer", default)]
    answer: Vec<DohAnswer>,
}

/// Resolver turning domain names into candidate IP sets via DoH
pub struct DohResolver {
    config: ResolverConfig,
    client: Client,
}

impl DohResolver {
    /// Create a new resolver with default configuration
    pub fn new() -> Result<Self> {
        Self::with_config(ResolverConfig::default())
    }

    /// Create a new resolver with custom configuration
    pub fn with_config(config: ResolverConfig) -> Result<Self> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { config, client })
    }

    /// Resolve a domain (optionally carrying an embedded port) to its
    /// IP set
    ///
    /// A and AAAA lookups run concurrently; a transport failure on one
    /// side does not abort the other. IPv6 answers come back
    /// bracket-wrapped. Fails when the combined set is empty.
    pub async fn resolve(&self, domain: &str) -> Result<Vec<String>> {
        // strip an embedded port or decoration before lookup
        let name = AddressParser::parse(domain).host;

        let (v4, v6) = tokio::join!(
            self.lookup(&name, TYPE_A),
            self.lookup(&name, TYPE_AAAA)
        );

        merge_lookups(&name, v4, v6)
    }

    /// Resolve into the structured outcome used by the CLI and API
    pub async fn resolve_outcome(&self, domain: &str) -> ResolutionOutcome {
        let name = AddressParser::parse(domain).host;
        match self.resolve(domain).await {
            Ok(ips) => ResolutionOutcome::resolved(name, ips),
            Err(e) => ResolutionOutcome::failed(name, e.to_string()),
        }
    }

    /// Issue a single typed lookup against the DoH endpoint
    async fn lookup(&self, name: &str, record_type: u16) -> Result<Vec<String>> {
        let type_param = match record_type {
            TYPE_AAAA => "AAAA",
            _ => "A",
        };

        let response = self
            .client
            .get(&self.config.endpoint)
            .query(&[("name", name), ("type", type_param)])
            .header("accept", "application/dns-json")
            .send()
            .await
            .with_context(|| format!("{} lookup for {} failed", type_param, name))?;

        let body: DohResponse = response
            .json()
            .await
            .with_context(|| format!("invalid dns-json body for {}", name))?;

        Ok(filter_answers(body.answer, record_type))
    }
}

/// Combine the two family lookups into one candidate set
///
/// A transport failure on one side is tolerated as long as the other
/// produced answers; IPv6 entries are bracket-wrapped. An empty combined
/// set is a resolution failure even when both lookups returned cleanly.
fn merge_lookups(
    name: &str,
    v4: Result<Vec<String>>,
    v6: Result<Vec<String>>,
) -> Result<Vec<String>> {
    let mut ips = Vec::new();
    match v4 {
        Ok(records) => ips.extend(records),
        Err(e) => tracing::debug!("A lookup for {} failed: {}", name, e),
    }
    match v6 {
        Ok(records) => ips.extend(records.into_iter().map(|ip| format!("[{}]", ip))),
        Err(e) => tracing::debug!("AAAA lookup for {} failed: {}", name, e),
    }

    if ips.is_empty() {
        bail!("no usable DNS answer for {}", name);
    }

    Ok(ips)
}

/// Keep only answer records of the requested type
///
/// Answer sets routinely interleave CNAME records with the address
/// records they point at; only the requested family counts.
fn filter_answers(answers: Vec<DohAnswer>, record_type: u16) -> Vec<String> {
    answers
        .into_iter()
        .filter(|a| a.record_type == record_type)
        .map(|a| a.data)
        .collect()
}
