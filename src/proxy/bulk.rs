//! Bulk candidate extraction from remote text resources
//!
//! Supports the bulk notations fed into the probe core:
//! - comma-separated literal lists and range specs
//! - remote `.txt`/`.csv` resources scanned for IP literals

use crate::proxy::checker::dedup_candidates;
use crate::proxy::expander::RangeExpander;
use crate::proxy::models::{Candidate, DEFAULT_PORT};
use crate::proxy::parser::AddressParser;
use crate::Result;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Client;
use std::net::Ipv6Addr;
use std::time::Duration;

/// Default timeout for list fetches in seconds
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Default user agent for list fetches
const DEFAULT_USER_AGENT: &str = "proxy-probe/0.1";

/// Regex pattern to match IPv4 literals with an optional port
static IPV4_CANDIDATE_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(\d{1,3}\.\d{1,3}\.\d{1,3}\.\d{1,3})(?::(\d{1,5}))?\b")
        .expect("Invalid IPv4 regex")
});

/// Regex pattern to match IPv6 literals, bare or bracketed, with an
/// optional port on the bracketed form
static IPV6_CANDIDATE_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\[?([0-9A-Fa-f]{0,4}(?::[0-9A-Fa-f]{0,4}){2,7})\]?(?::(\d{1,5}))?")
        .expect("Invalid IPv6 regex")
});

/// Configuration for the bulk loader
#[derive(Debug, Clone)]
pub struct BulkConfig {
    /// Timeout for HTTP fetches
    pub timeout: Duration,
    /// User agent for HTTP fetches
    pub user_agent: String,
}

impl Default for BulkConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl BulkConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_user_agent(mut self, user_agent: String) -> Self {
        self.user_agent = user_agent;
        self
    }
}

/// Loader extracting probe candidates from remote text resources
pub struct BulkLoader {
    client: Client,
}

impl BulkLoader {
    /// Create a new loader with default configuration
    pub fn new() -> Result<Self> {
        Self::with_config(BulkConfig::default())
    }

    /// Create a new loader with custom configuration
    pub fn with_config(config: BulkConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .build()?;

        Ok(Self { client })
    }

    /// Fetch a remote text resource and extract its candidates
    pub async fn fetch_url(&self, url: &str) -> Result<Vec<Candidate>> {
        let response = self.client.get(url).send().await?;
        let content = response.text().await?;
        Ok(Self::extract_candidates(&content))
    }

    /// Extract candidates from raw text content
    ///
    /// Keeps only literals with no declared port or an explicit `:443`.
    /// IPv6 literals are bracket-wrapped; duplicates are dropped in
    /// first-seen order.
    pub fn extract_candidates(content: &str) -> Vec<Candidate> {
        let mut candidates = Vec::new();

        for caps in IPV4_CANDIDATE_REGEX.captures_iter(content) {
            let Some(host) = caps.get(1).map(|m| m.as_str()) else {
                continue;
            };
            if !valid_ipv4_octets(host) || !port_is_default(caps.get(2).map(|m| m.as_str())) {
                continue;
            }
            candidates.push(Candidate::new(host, DEFAULT_PORT));
        }

        for caps in IPV6_CANDIDATE_REGEX.captures_iter(content) {
            let Some(host) = caps.get(1).map(|m| m.as_str()) else {
                continue;
            };
            if host.parse::<Ipv6Addr>().is_err()
                || !port_is_default(caps.get(2).map(|m| m.as_str()))
            {
                continue;
            }
            candidates.push(Candidate::new(format!("[{}]", host), DEFAULT_PORT));
        }

        dedup_candidates(candidates)
    }

    /// Parse a comma-separated mix of endpoint notations and range specs
    pub fn parse_entries(list: &str) -> Vec<Candidate> {
        let mut candidates = Vec::new();

        for entry in list.split(',') {
            let entry = entry.trim();
            if entry.is_empty() {
                continue;
            }
            if RangeExpander::is_range(entry) {
                candidates.extend(
                    RangeExpander::expand(entry)
                        .into_iter()
                        .map(|ip| Candidate::new(ip, DEFAULT_PORT)),
                );
            } else {
                candidates.push(AddressParser::parse(entry));
            }
        }

        dedup_candidates(candidates)
    }
}

/// Validate each dotted octet parses as u8
fn valid_ipv4_octets(host: &str) -> bool {
    host.split('.').all(|octet| octet.parse::<u8>().is_ok())
}

/// True when no port is declared or the declared port is 443
fn port_is_default(port: Option<&str>) -> bool {
    match port {
        None => true,
        Some(p) => p == "443",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bulk_config_default() {
        let config = BulkConfig::default();
        assert_eq!(config.timeout, Duration::from_secs(DEFAULT_TIMEOUT_SECS));
        assert_eq!(config.user_agent, DEFAULT_USER_AGENT);
    }

    #[test]
    fn test_extract_portless_and_443_entries() {
        let content = "198.51.100.1\n198.51.100.2:443\n198.51.100.3:8080\n";
        let candidates = BulkLoader::extract_candidates(content);
        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].host, "198.51.100.1");
        assert_eq!(candidates[1].host, "198.51.100.2");
        assert!(candidates.iter().all(|c| c.port == 443));
    }

    #[test]
    fn test_extract_from_csv_content() {
        let content = "ip,country\n198.51.100.1,US\n203.0.113.9,DE\n";
        let candidates = BulkLoader::extract_candidates(content);
        assert_eq!(candidates.len(), 2);
    }

    #[test]
    fn test_extract_rejects_invalid_octets() {
        let content = "999.999.999.999\n198.51.100.7\n";
        let candidates = BulkLoader::extract_candidates(content);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].host, "198.51.100.7");
    }

    #[test]
    fn test_extract_wraps_ipv6() {
        let content = "2001:db8::1\n[2001:db8::2]:443\n[2001:db8::3]:8443\n";
        let candidates = BulkLoader::extract_candidates(content);
        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].host, "[2001:db8::1]");
        assert_eq!(candidates[1].host, "[2001:db8::2]");
    }

    #[test]
    fn test_extract_skips_run_on_digits() {
        // a longer digit run is not silently truncated into an address
        let content = "198.51.100.1234\n198.51.100.9\n";
        let candidates = BulkLoader::extract_candidates(content);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].host, "198.51.100.9");
    }

    #[test]
    fn test_extract_skips_clock_like_tokens() {
        let content = "fetched at 12:30:45\n198.51.100.1\n";
        let candidates = BulkLoader::extract_candidates(content);
        assert_eq!(candidates.len(), 1);
    }

    #[test]
    fn test_extract_deduplicates() {
        let content = "198.51.100.1\n198.51.100.1:443\n198.51.100.1\n";
        let candidates = BulkLoader::extract_candidates(content);
        assert_eq!(candidates.len(), 1);
    }

    #[test]
    fn test_parse_entries_mixed() {
        let candidates = BulkLoader::parse_entries("203.0.113.0/24,9.9.9.9");
        assert_eq!(candidates.len(), 257);
        assert_eq!(candidates[0].host, "203.0.113.0");
        assert_eq!(candidates[256].host, "9.9.9.9");
    }

    #[test]
    fn test_parse_entries_octet_range() {
        let candidates = BulkLoader::parse_entries("203.0.113.10-12");
        assert_eq!(candidates.len(), 3);
    }

    #[test]
    fn test_parse_entries_with_ports_and_blanks() {
        let candidates = BulkLoader::parse_entries("198.51.100.1:8080, ,[2001:db8::1]:9443");
        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].port, 8080);
        assert_eq!(candidates[1].host, "[2001:db8::1]");
        assert_eq!(candidates[1].port, 9443);
    }

    #[test]
    fn test_parse_entries_deduplicates_across_notations() {
        let candidates = BulkLoader::parse_entries("203.0.113.5,203.0.113.5:443");
        assert_eq!(candidates.len(), 1);
    }
}
