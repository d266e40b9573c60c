//! Rotating short-lived token scheme gating the probe API
//!
//! Tokens are recomputed on demand from the request origin, a coarse
//! time window and the client's user agent; nothing is stored server
//! side. This is anti-scripting friction, not a security boundary.

use chrono::Utc;
use sha2::{Digest, Sha256};

/// Window length the token rotates on, in milliseconds (~31 minutes)
const WINDOW_MILLIS: i64 = 31 * 60 * 1000;

/// Digest slice hashed again in the second round
const SLICE_RANGE: std::ops::Range<usize> = 7..27;

/// Issues and validates rotating anti-abuse tokens
#[derive(Debug, Clone)]
pub struct TokenAuthenticator {
    origin: String,
    override_token: Option<String>,
}

impl TokenAuthenticator {
    pub fn new(origin: impl Into<String>, override_token: Option<String>) -> Self {
        Self {
            origin: origin.into(),
            override_token,
        }
    }

    /// Token for the current time window
    pub fn issue(&self, user_agent: &str) -> String {
        self.token_for_window(Self::current_window(), user_agent)
    }

    /// Validate a presented token
    ///
    /// With no override credential configured, validation always
    /// succeeds. With one configured, the override itself or the token
    /// recomputed for the current window is accepted.
    pub fn is_valid(&self, presented: &str, user_agent: &str) -> bool {
        match &self.override_token {
            None => true,
            Some(override_token) => {
                presented == override_token || presented == self.issue(user_agent)
            }
        }
    }

    /// Coarse time-window counter: wall-clock millis divided into
    /// 31-minute buckets, rounded up
    fn current_window() -> i64 {
        let millis = Utc::now().timestamp_millis();
        (millis + WINDOW_MILLIS - 1) / WINDOW_MILLIS
    }

    /// Two-round digest: hash the seed, re-hash a fixed slice of the
    /// first hex digest so a leaked intermediate is not enough to
    /// reconstruct tokens
    fn token_for_window(&self, window: i64, user_agent: &str) -> String {
        let seed = format!("{}{}{}", self.origin, window, user_agent);
        let first = hex::encode(Sha256::digest(seed.as_bytes()));
        let slice = &first[SLICE_RANGE];
        hex::encode(Sha256::digest(slice.as_bytes()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ORIGIN: &str = "https://probe.example.net";
    const UA: &str = "Mozilla/5.0 (X11; Linux x86_64)";

    #[test]
    fn test_token_deterministic_within_window() {
        let auth = TokenAuthenticator::new(ORIGIN, None);
        let a = auth.token_for_window(900_000, UA);
        let b = auth.token_for_window(900_000, UA);
        assert_eq!(a, b);
    }

    #[test]
    fn test_token_differs_across_windows() {
        let auth = TokenAuthenticator::new(ORIGIN, None);
        let a = auth.token_for_window(900_000, UA);
        let b = auth.token_for_window(900_001, UA);
        assert_ne!(a, b);
    }

    #[test]
    fn test_token_bound_to_user_agent_and_origin() {
        let auth = TokenAuthenticator::new(ORIGIN, None);
        assert_ne!(
            auth.token_for_window(900_000, UA),
            auth.token_for_window(900_000, "curl/8.5")
        );

        let other = TokenAuthenticator::new("https://other.example.net", None);
        assert_ne!(
            auth.token_for_window(900_000, UA),
            other.token_for_window(900_000, UA)
        );
    }

    #[test]
    fn test_token_is_lowercase_hex() {
        let auth = TokenAuthenticator::new(ORIGIN, None);
        let token = auth.issue(UA);
        assert_eq!(token.len(), 64);
        assert!(token
            .chars()
            .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c)));
    }

    #[test]
    fn test_validation_permissive_without_override() {
        let auth = TokenAuthenticator::new(ORIGIN, None);
        assert!(auth.is_valid("anything", UA));
        assert!(auth.is_valid("", UA));
    }

    #[test]
    fn test_validation_with_override() {
        let auth = TokenAuthenticator::new(ORIGIN, Some("sesame".to_string()));
        assert!(auth.is_valid("sesame", UA));
        assert!(auth.is_valid(&auth.issue(UA), UA));
        assert!(!auth.is_valid("wrong", UA));
        assert!(!auth.is_valid(&auth.issue("curl/8.5"), UA));
    }
}
