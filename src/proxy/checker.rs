//! Proxy checker probing candidates over raw TCP

use crate::proxy::models::{Candidate, ProbeResult};
use crate::Result;
use anyhow::{anyhow, Context};
use futures::future::join_all;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;

/// Default deadline for the connect and each read, in seconds
const DEFAULT_TIMEOUT_SECS: u64 = 5;

/// Default number of candidates probed concurrently per batch
const DEFAULT_BATCH_SIZE: usize = 20;

/// Cap on accumulated response bytes
const DEFAULT_MAX_RESPONSE: usize = 4096;

/// Default user agent written into the synthetic request
const DEFAULT_USER_AGENT: &str = "proxy-probe/0.1";

/// Diagnostic path requested through the candidate
const PROBE_PATH: &str = "/cdn-cgi/trace";

/// Host header for the diagnostic request
const PROBE_HOST: &str = "speed.cloudflare.com";

/// Marker expected in a genuine edge responder body
const VENDOR_MARKER: &str = "cloudflare";

/// Diagnostic phrases accepted by the classifier, either suffices
const DIAGNOSTIC_PHRASES: [&str; 2] = ["plain HTTP request", "400 Bad Request"];

/// Responses at or below this many bytes never classify as working
const MIN_RESPONSE_BYTES: usize = 100;

/// Regex pattern to extract the status code from the response head
static STATUS_LINE_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^HTTP/[0-9.]+ (\d{3})").expect("Invalid status line regex"));

/// Configuration for proxy checker
#[derive(Debug, Clone)]
pub struct CheckerConfig {
    /// Deadline applied to the connect and to every read
    pub timeout: Duration,
    /// Number of candidates probed concurrently per batch
    pub batch_size: usize,
    /// Cap on accumulated response bytes
    pub max_response: usize,
    /// User agent written into the synthetic request
    pub user_agent: String,
}

impl Default for CheckerConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            batch_size: DEFAULT_BATCH_SIZE,
            max_response: DEFAULT_MAX_RESPONSE,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl CheckerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn with_max_response(mut self, max_response: usize) -> Self {
        self.max_response = max_response;
        self
    }

    pub fn with_user_agent(mut self, user_agent: String) -> Self {
        self.user_agent = user_agent;
        self
    }
}

/// Proxy checker for validating candidates over raw TCP
///
/// A probe opens a TCP connection, writes a fixed diagnostic GET, reads
/// the head of the response under a per-read deadline, and classifies
/// whether the peer looks like a working forward proxy fronting an edge
/// responder.
#[derive(Clone)]
pub struct ProxyChecker {
    config: CheckerConfig,
}

impl ProxyChecker {
    /// Create a new checker with default configuration
    pub fn new() -> Self {
        Self {
            config: CheckerConfig::default(),
        }
    }

    /// Create a new checker with custom configuration
    pub fn with_config(config: CheckerConfig) -> Self {
        Self { config }
    }

    /// Probe a single candidate
    ///
    /// Never fails: every connect, write, read or deadline problem is
    /// captured in the result's `error` field.
    pub async fn check(&self, candidate: &Candidate) -> ProbeResult {
        match self.exchange(candidate).await {
            Ok(response) => self.classify(candidate, &response),
            Err(e) => {
                tracing::debug!("probe {} failed: {:#}", candidate, e);
                ProbeResult::failed(candidate.clone(), format!("{:#}", e))
            }
        }
    }

    /// Probe many candidates in fixed-size concurrent batches
    ///
    /// Candidates are deduplicated by exact (host, port) identity in
    /// first-seen order and probed exactly once each. Batch n+1 does not
    /// start until every probe in batch n has completed, which bounds
    /// peak concurrent sockets to the batch size.
    pub async fn check_all(&self, candidates: Vec<Candidate>) -> Vec<ProbeResult> {
        let unique = dedup_candidates(candidates);
        let mut results = Vec::with_capacity(unique.len());

        for batch in unique.chunks(self.config.batch_size) {
            let probes = batch.iter().map(|candidate| self.check(candidate));
            results.extend(join_all(probes).await);
        }

        results
    }

    /// Probe candidates and separate into working and failed results
    pub async fn check_and_separate(
        &self,
        candidates: Vec<Candidate>,
    ) -> (Vec<ProbeResult>, Vec<ProbeResult>) {
        let results = self.check_all(candidates).await;

        results.into_iter().partition(|r| r.is_working())
    }

    /// Run the raw socket exchange and return the accumulated response
    ///
    /// The stream is dropped on every exit path; close errors cannot
    /// reach the caller.
    async fn exchange(&self, candidate: &Candidate) -> Result<Vec<u8>> {
        let addr = (candidate.connect_host().to_string(), candidate.port);
        let mut stream = timeout(self.config.timeout, TcpStream::connect(addr))
            .await
            .map_err(|_| anyhow!("connect timed out after {:?}", self.config.timeout))?
            .context("connect failed")?;

        let request = format!(
            "GET {} HTTP/1.1\r\nHost: {}\r\nUser-Agent: {}\r\nConnection: close\r\n\r\n",
            PROBE_PATH, PROBE_HOST, self.config.user_agent
        );
        stream
            .write_all(request.as_bytes())
            .await
            .context("write failed")?;

        let mut response = Vec::new();
        let mut chunk = [0u8; 1024];
        loop {
            let n = timeout(self.config.timeout, stream.read(&mut chunk))
                .await
                .map_err(|_| anyhow!("read timed out after {:?}", self.config.timeout))?
                .context("read failed")?;
            if n == 0 {
                break;
            }
            response.extend_from_slice(&chunk[..n]);
            if contains_header_end(&response) || response.len() >= self.config.max_response {
                break;
            }
        }

        Ok(response)
    }

    /// Classify an exchanged response into a verdict
    fn classify(&self, candidate: &Candidate, response: &[u8]) -> ProbeResult {
        let text = String::from_utf8_lossy(response);
        let status_code = extract_status_code(&text);

        let has_marker = text.contains(VENDOR_MARKER);
        let has_phrase = DIAGNOSTIC_PHRASES.iter().any(|p| text.contains(p));
        let success = status_code.is_some()
            && has_marker
            && has_phrase
            && response.len() > MIN_RESPONSE_BYTES;

        if success {
            ProbeResult::ok(candidate.clone(), status_code, response.len())
        } else {
            ProbeResult::rejected(candidate.clone(), status_code, response.len())
        }
    }
}

impl Default for ProxyChecker {
    fn default() -> Self {
        Self::new()
    }
}

/// Deduplicate candidates by exact (host, port) identity, keeping
/// first-seen order
pub fn dedup_candidates(candidates: Vec<Candidate>) -> Vec<Candidate> {
    let mut seen = HashSet::new();
    candidates
        .into_iter()
        .filter(|c| seen.insert(c.clone()))
        .collect()
}

/// Extract the numeric status code from a leading `HTTP/<ver> <code>` line
fn extract_status_code(text: &str) -> Option<u16> {
    STATUS_LINE_REGEX
        .captures(text)
        .and_then(|caps| caps.get(1))
        .and_then(|code| code.as_str().parse().ok())
}

fn contains_header_end(buffer: &[u8]) -> bool {
    buffer.windows(4).any(|w| w == b"\r\n\r\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    /// Bind a one-shot responder and return its port
    async fn spawn_responder(response: Vec<u8>) -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            if let Ok((mut socket, _)) = listener.accept().await {
                let mut buf = [0u8; 1024];
                let _ = socket.read(&mut buf).await;
                let _ = socket.write_all(&response).await;
            }
        });
        port
    }

    /// Reserve a loopback port with nothing listening on it
    async fn closed_port() -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap().port()
    }

    fn edge_style_response() -> Vec<u8> {
        // headers alone clear the 100-byte floor so the verdict does not
        // depend on whether the body arrives in the same read
        let body = "<html><body>The plain HTTP request was sent to HTTPS port. \
                    Please retry over TLS.</body></html>";
        format!(
            "HTTP/1.1 400 Bad Request\r\nServer: cloudflare\r\nConnection: close\r\n\
             Cache-Control: private, max-age=0\r\nCF-RAY: 8f2b3c4d5e6f7890-FRA\r\n\
             Content-Length: {}\r\n\r\n{}",
            body.len(),
            body
        )
        .into_bytes()
    }

    fn quick_checker() -> ProxyChecker {
        ProxyChecker::with_config(
            CheckerConfig::new().with_timeout(Duration::from_millis(500)),
        )
    }

    #[test]
    fn test_checker_config_default() {
        let config = CheckerConfig::default();
        assert_eq!(config.timeout, Duration::from_secs(DEFAULT_TIMEOUT_SECS));
        assert_eq!(config.batch_size, DEFAULT_BATCH_SIZE);
        assert_eq!(config.max_response, DEFAULT_MAX_RESPONSE);
    }

    #[test]
    fn test_checker_config_builder() {
        let config = CheckerConfig::new()
            .with_timeout(Duration::from_secs(2))
            .with_batch_size(50)
            .with_max_response(1024);
        assert_eq!(config.timeout, Duration::from_secs(2));
        assert_eq!(config.batch_size, 50);
        assert_eq!(config.max_response, 1024);
    }

    #[test]
    fn test_batch_size_never_zero() {
        let config = CheckerConfig::new().with_batch_size(0);
        assert_eq!(config.batch_size, 1);
    }

    #[test]
    fn test_extract_status_code() {
        assert_eq!(extract_status_code("HTTP/1.1 400 Bad Request\r\n"), Some(400));
        assert_eq!(extract_status_code("HTTP/2 200\r\n"), Some(200));
        assert_eq!(extract_status_code("HTTP/1.0 503 Unavailable"), Some(503));
        assert_eq!(extract_status_code("SSH-2.0-OpenSSH_9.3"), None);
        assert_eq!(extract_status_code(""), None);
    }

    #[test]
    fn test_contains_header_end() {
        assert!(contains_header_end(b"HTTP/1.1 200 OK\r\n\r\nbody"));
        assert!(!contains_header_end(b"HTTP/1.1 200 OK\r\n"));
    }

    #[test]
    fn test_dedup_candidates_first_seen_order() {
        let candidates = vec![
            Candidate::new("198.51.100.2", 443),
            Candidate::new("198.51.100.1", 443),
            Candidate::new("198.51.100.2", 443),
            Candidate::new("198.51.100.2", 8080),
        ];
        let unique = dedup_candidates(candidates);
        assert_eq!(unique.len(), 3);
        assert_eq!(unique[0].host, "198.51.100.2");
        assert_eq!(unique[1].host, "198.51.100.1");
        assert_eq!(unique[2].port, 8080);
    }

    #[tokio::test]
    async fn test_check_classifies_edge_response_as_working() {
        let port = spawn_responder(edge_style_response()).await;
        let candidate = Candidate::new("127.0.0.1", port);

        let result = quick_checker().check(&candidate).await;
        assert!(result.success, "error: {:?}", result.error);
        assert_eq!(result.status_code, Some(400));
        assert!(result.response_size > MIN_RESPONSE_BYTES);
    }

    #[tokio::test]
    async fn test_check_rejects_short_unmarked_response() {
        let port = spawn_responder(b"HTTP/1.1 200 OK\r\n\r\nok".to_vec()).await;
        let candidate = Candidate::new("127.0.0.1", port);

        let result = quick_checker().check(&candidate).await;
        assert!(!result.success);
        assert_eq!(result.status_code, Some(200));
        assert!(result.error.is_none());
    }

    #[tokio::test]
    async fn test_check_rejects_non_http_banner() {
        let port = spawn_responder(b"SSH-2.0-OpenSSH_9.3\r\n".to_vec()).await;
        let candidate = Candidate::new("127.0.0.1", port);

        let result = quick_checker().check(&candidate).await;
        assert!(!result.success);
        assert_eq!(result.status_code, None);
    }

    #[tokio::test]
    async fn test_check_captures_connection_refused() {
        let candidate = Candidate::new("127.0.0.1", closed_port().await);

        let result = quick_checker().check(&candidate).await;
        assert!(!result.success);
        assert!(result.error.is_some());
    }

    #[tokio::test]
    async fn test_check_flags_silent_peer_as_timeout() {
        // accepts the connection but never writes anything back
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            if let Ok((socket, _)) = listener.accept().await {
                tokio::time::sleep(Duration::from_secs(5)).await;
                drop(socket);
            }
        });

        let checker = ProxyChecker::with_config(
            CheckerConfig::new().with_timeout(Duration::from_millis(200)),
        );
        let result = checker.check(&Candidate::new("127.0.0.1", port)).await;
        assert!(!result.success);
        assert!(result.error.unwrap().contains("timed out"));
    }

    #[tokio::test]
    async fn test_check_all_probes_each_unique_candidate_once() {
        let port = closed_port().await;
        let candidates = vec![
            Candidate::new("127.0.0.1", port),
            Candidate::new("127.0.0.1", port),
            Candidate::new("127.0.0.2", port),
            Candidate::new("127.0.0.1", port),
        ];

        let results = quick_checker().check_all(candidates).await;
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].candidate.host, "127.0.0.1");
        assert_eq!(results[1].candidate.host, "127.0.0.2");
    }

    #[tokio::test]
    async fn test_check_all_covers_full_range_in_batches() {
        use crate::proxy::expander::RangeExpander;

        let port = closed_port().await;
        let candidates: Vec<Candidate> = RangeExpander::expand("127.0.0.0/24")
            .into_iter()
            .map(|ip| Candidate::new(ip, port))
            .collect();

        let results = quick_checker().check_all(candidates).await;
        assert_eq!(results.len(), 256);

        let mut hosts: Vec<String> =
            results.iter().map(|r| r.candidate.host.clone()).collect();
        hosts.sort();
        hosts.dedup();
        assert_eq!(hosts.len(), 256, "every candidate appears exactly once");
    }

    #[tokio::test]
    async fn test_check_and_separate() {
        let good_port = spawn_responder(edge_style_response()).await;
        let bad_port = closed_port().await;
        let candidates = vec![
            Candidate::new("127.0.0.1", good_port),
            Candidate::new("127.0.0.1", bad_port),
        ];

        let (good, bad) = quick_checker().check_and_separate(candidates).await;
        assert_eq!(good.len(), 1);
        assert_eq!(bad.len(), 1);
        assert_eq!(good[0].candidate.port, good_port);
    }
}
