//! Rate limit layers keyed by client address.
use axum::{
    extract::{ConnectInfo, Request, State},
    http::{header::HeaderName, HeaderValue},
    middleware::Next,
    response::Response,
};
use std::net::SocketAddr;

use crate::error::Result;
use crate::security::rate_limit::{RateLimitDecision, RateLimitScope};
use crate::AppState;

/// Client address: the peer address, or the first `X-Forwarded-For` hop
/// when the deployment trusts its proxy to set that header.
pub fn client_ip(req: &Request, trust_forwarded_for: bool) -> String {
    let forwarded = trust_forwarded_for
        .then(|| {
            req.headers()
                .get("x-forwarded-for")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.split(',').next())
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
        })
        .flatten();

    forwarded
        .or_else(|| {
            req.extensions()
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| addr.ip().to_string())
        })
        .unwrap_or_else(|| "unknown".into())
}

/// Applied to every route; admitted responses carry `X-RateLimit-*` headers.
pub async fn global_rate_limit(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response> {
    let ip = client_ip(&req, state.rate_limits.trust_forwarded_for);
    let decision = state
        .rate_limiter
        .check(RateLimitScope::Global, &ip, state.rate_limits.global_rule())
        .await?;

    let mut response = next.run(req).await;
    apply_headers(&mut response, &decision);
    Ok(response)
}

/// Stricter quota for the credential and token endpoints.
pub async fn auth_rate_limit(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response> {
    let ip = client_ip(&req, state.rate_limits.trust_forwarded_for);
    state
        .rate_limiter
        .check(RateLimitScope::Auth, &ip, state.rate_limits.auth_rule())
        .await?;

    Ok(next.run(req).await)
}

/// Headers already set by an inner, stricter limit are left alone.
fn apply_headers(response: &mut Response, decision: &RateLimitDecision) {
    let headers = response.headers_mut();
    if headers.contains_key("x-ratelimit-limit") {
        return;
    }
    headers.insert(
        HeaderName::from_static("x-ratelimit-limit"),
        HeaderValue::from(decision.limit),
    );
    headers.insert(
        HeaderName::from_static("x-ratelimit-remaining"),
        HeaderValue::from(decision.remaining),
    );
    headers.insert(
        HeaderName::from_static("x-ratelimit-reset"),
        HeaderValue::from(decision.reset_at.timestamp()),
    );
}
