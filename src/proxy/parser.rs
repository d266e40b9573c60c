//! Address parser for normalizing endpoint notations

use crate::proxy::models::{Candidate, DEFAULT_PORT};

/// Parser turning raw endpoint strings into candidates
///
/// Supported notations, tried in order:
/// - `host.tpPORT.suffix` (port embedded between `.tp` and the next `.`)
/// - `[ipv6]:port`
/// - `ipv4:port`
/// - bare host
pub struct AddressParser;

impl AddressParser {
    /// Parse a single endpoint string
    ///
    /// Total: always yields a candidate. Malformed or missing port
    /// digits fall back to 443 rather than failing, since callers feed
    /// user-supplied notation straight through.
    pub fn parse(raw: &str) -> Candidate {
        let raw = raw.trim();

        if let Some(candidate) = Self::parse_embedded_port(raw) {
            return candidate;
        }

        if let Some(candidate) = Self::parse_bracketed(raw) {
            return candidate;
        }

        if let Some(candidate) = Self::parse_host_port(raw) {
            return candidate;
        }

        Candidate::with_default_port(raw)
    }

    /// Parse `host.tpPORT.suffix` notation
    fn parse_embedded_port(raw: &str) -> Option<Candidate> {
        let idx = raw.find(".tp")?;
        let host = &raw[..idx];

        let rest = &raw[idx + 3..];
        let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
        let terminated = rest[digits.len()..].starts_with('.');

        let port = if terminated {
            digits.parse().unwrap_or(DEFAULT_PORT)
        } else {
            DEFAULT_PORT
        };

        Some(Candidate::new(host, port))
    }

    /// Parse `[ipv6]:port` notation, host keeps its brackets
    fn parse_bracketed(raw: &str) -> Option<Candidate> {
        if !raw.starts_with('[') {
            return None;
        }
        let (host, port_str) = raw.split_once("]:")?;
        let port = port_str.parse().unwrap_or(DEFAULT_PORT);
        Some(Candidate::new(format!("{}]", host), port))
    }

    /// Parse `ipv4:port` notation: exactly two colon-separated segments
    /// with a dotted first segment
    fn parse_host_port(raw: &str) -> Option<Candidate> {
        let parts: Vec<&str> = raw.split(':').collect();
        if parts.len() != 2 || !parts[0].contains('.') {
            return None;
        }
        let port = parts[1].parse().unwrap_or(DEFAULT_PORT);
        Some(Candidate::new(parts[0], port))
    }
}
