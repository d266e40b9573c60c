//! HTTP routing layer exposing the probe and resolve APIs
//!
//! Thin dispatch over the probe core: every check/resolve call is
//! token-gated before any parsing or probing happens, malformed input
//! is rejected at the boundary, and per-candidate failures come back as
//! data inside the result list.

use crate::proxy::{
    BulkLoader, Candidate, GeoClient, GeoLocation, ProbeResult, ProxyChecker, ResolutionOutcome,
    TokenAuthenticator,
};
use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Shared state handed to every handler
#[derive(Clone)]
pub struct AppState {
    pub checker: ProxyChecker,
    pub resolver: Arc<crate::proxy::DohResolver>,
    pub geo: Arc<GeoClient>,
    pub auth: Arc<TokenAuthenticator>,
}

#[derive(Deserialize)]
pub struct CheckQuery {
    /// Comma-separated endpoint notations and/or range specs
    pub proxyip: Option<String>,
    pub token: Option<String>,
}

#[derive(Deserialize)]
pub struct ResolveQuery {
    pub domain: Option<String>,
    pub token: Option<String>,
}

#[derive(Serialize)]
pub struct CheckResponse {
    pub success: bool,
    pub checked_at: DateTime<Utc>,
    pub results: Vec<ProbeResult>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/check", get(check))
        .route("/resolve", get(resolve))
        .route("/geo/:ip", get(geo))
        .with_state(state)
}

async fn check(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<CheckQuery>,
) -> Result<Json<CheckResponse>, StatusCode> {
    authorize(&state, &headers, params.token.as_deref())?;

    let spec = params.proxyip.ok_or(StatusCode::BAD_REQUEST)?;
    let candidates = BulkLoader::parse_entries(&spec);
    if candidates.is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }

    // domains fan out to one target per resolved IP; a failed resolution
    // becomes a failed result instead of aborting the request
    let mut targets = Vec::new();
    let mut failures = Vec::new();
    for candidate in candidates {
        if candidate.is_ip_literal() {
            targets.push(candidate);
        } else {
            match state.resolver.resolve(&candidate.host).await {
                Ok(ips) => targets.extend(
                    ips.into_iter()
                        .map(|ip| Candidate::new(ip, candidate.port)),
                ),
                Err(e) => failures.push(ProbeResult::failed(candidate, format!("{:#}", e))),
            }
        }
    }

    let mut results = state.checker.check_all(targets).await;
    results.append(&mut failures);

    Ok(Json(CheckResponse {
        success: results.iter().any(|r| r.is_working()),
        checked_at: Utc::now(),
        results,
    }))
}

async fn resolve(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<ResolveQuery>,
) -> Result<Json<ResolutionOutcome>, StatusCode> {
    authorize(&state, &headers, params.token.as_deref())?;

    let domain = params.domain.ok_or(StatusCode::BAD_REQUEST)?;
    Ok(Json(state.resolver.resolve_outcome(&domain).await))
}

async fn geo(
    State(state): State<AppState>,
    Path(ip): Path<String>,
) -> Result<Json<GeoLocation>, StatusCode> {
    state.geo.lookup(&ip).await.map(Json).map_err(|e| {
        tracing::warn!("geo lookup for {} failed: {:#}", ip, e);
        StatusCode::BAD_GATEWAY
    })
}

/// Token gate, applied before the probe/resolve core is touched
///
/// An invalid token is an authorization failure, distinct from every
/// probe failure class.
fn authorize(
    state: &AppState,
    headers: &HeaderMap,
    token: Option<&str>,
) -> Result<(), StatusCode> {
    let user_agent = headers
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    if state.auth.is_valid(token.unwrap_or(""), user_agent) {
        Ok(())
    } else {
        Err(StatusCode::FORBIDDEN)
    }
}
