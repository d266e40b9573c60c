//! Probe data models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Default port assumed when a notation carries none
pub const DEFAULT_PORT: u16 = 443;

/// Candidate model representing a single (host, port) probe target
///
/// The host is an IPv4 literal, a bracketed IPv6 literal, or a domain
/// name awaiting resolution. Bracket decoration is kept on the canonical
/// host and only stripped at socket-connect time.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Candidate {
    pub host: String,
    pub port: u16,
}

impl Candidate {
    /// Create a new candidate
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Create a candidate on the default port
    pub fn with_default_port(host: impl Into<String>) -> Self {
        Self::new(host, DEFAULT_PORT)
    }

    /// Host form used for the socket connect call, brackets stripped
    pub fn connect_host(&self) -> &str {
        self.host.trim_start_matches('[').trim_end_matches(']')
    }

    /// True when the host is an IPv4 or (bracketed) IPv6 literal
    pub fn is_ip_literal(&self) -> bool {
        self.connect_host().parse::<std::net::IpAddr>().is_ok()
    }

    /// Get the endpoint string in HOST:PORT format
    pub fn to_endpoint(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl fmt::Display for Candidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_endpoint())
    }
}

/// Result of a single probe attempt
///
/// Created once per attempt and never mutated afterwards. Failures are
/// data, not errors: `error` carries the reason and `success` is false.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeResult {
    pub candidate: Candidate,
    pub success: bool,
    pub status_code: Option<u16>,
    pub response_size: usize,
    pub checked_at: DateTime<Utc>,
    pub error: Option<String>,
}

impl ProbeResult {
    pub fn ok(candidate: Candidate, status_code: Option<u16>, response_size: usize) -> Self {
        Self {
            candidate,
            success: true,
            status_code,
            response_size,
            checked_at: Utc::now(),
            error: None,
        }
    }

    /// A probe that completed the exchange but failed classification
    pub fn rejected(candidate: Candidate, status_code: Option<u16>, response_size: usize) -> Self {
        Self {
            candidate,
            success: false,
            status_code,
            response_size,
            checked_at: Utc::now(),
            error: None,
        }
    }

    pub fn failed(candidate: Candidate, error: impl Into<String>) -> Self {
        Self {
            candidate,
            success: false,
            status_code: None,
            response_size: 0,
            checked_at: Utc::now(),
            error: Some(error.into()),
        }
    }

    pub fn is_working(&self) -> bool {
        self.success
    }
}

impl fmt::Display for ProbeResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.success {
            write!(
                f,
                "{} ok (status {}, {} bytes)",
                self.candidate,
                self.status_code
                    .map_or_else(|| "-".to_string(), |c| c.to_string()),
                self.response_size
            )
        } else {
            write!(
                f,
                "{} failed ({})",
                self.candidate,
                self.error.as_deref().unwrap_or("not a proxy")
            )
        }
    }
}

/// Result of resolving a domain to its candidate IP set
///
/// IPv6 entries are stored bracket-wrapped so downstream parsing treats
/// them uniformly with the `[v6]:port` notation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolutionOutcome {
    pub domain: String,
    pub ips: Vec<String>,
    pub succeeded: bool,
    pub error: Option<String>,
}

impl ResolutionOutcome {
    pub fn resolved(domain: impl Into<String>, ips: Vec<String>) -> Self {
        Self {
            domain: domain.into(),
            ips,
            succeeded: true,
            error: None,
        }
    }

    pub fn failed(domain: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            ips: Vec::new(),
            succeeded: false,
            error: Some(error.into()),
        }
    }
}
