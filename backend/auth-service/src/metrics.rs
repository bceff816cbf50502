use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use once_cell::sync::Lazy;
use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, TextEncoder};

use crate::security::rate_limit::RateLimitScope;

/// Handler that serialises Prometheus metrics in text format.
pub async fn metrics_handler() -> Response {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();

    let mut buffer = Vec::new();
    match encoder.encode(&metric_families, &mut buffer) {
        Ok(_) => (
            [(header::CONTENT_TYPE, encoder.format_type().to_string())],
            buffer,
        )
            .into_response(),
        Err(err) => (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()).into_response(),
    }
}

/// Force registration so every series shows up on the first scrape.
pub fn initialize_auth_metrics() {
    let _ = &*LOGIN_REQUESTS_TOTAL;
    let _ = &*LOGIN_FAILURES_TOTAL;
    let _ = &*TOKEN_REFRESH_TOTAL;
    let _ = &*TOKENS_REVOKED_TOTAL;
    let _ = &*RATE_LIMIT_REJECTIONS_TOTAL;
    let _ = &*REVOKED_TOKENS_ACTIVE;
}

fn counter(name: &str, help: &str) -> IntCounter {
    IntCounter::new(name, help)
        .and_then(|c| {
            prometheus::default_registry().register(Box::new(c.clone()))?;
            Ok(c)
        })
        .unwrap_or_else(|e| {
            tracing::error!("failed to create {} counter: {}", name, e);
            IntCounter::new(format!("dummy_{name}"), "dummy").expect("dummy counter")
        })
}

static LOGIN_REQUESTS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    counter(
        "auth_login_requests_total",
        "Total number of login requests",
    )
});

/// Wrong password or unknown email
static LOGIN_FAILURES_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    counter(
        "auth_login_failures_total",
        "Total number of failed login attempts",
    )
});

static TOKEN_REFRESH_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    counter(
        "auth_token_refresh_total",
        "Total number of successful refresh token rotations",
    )
});

static TOKENS_REVOKED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    counter(
        "auth_tokens_revoked_total",
        "Total number of tokens added to the blacklist",
    )
});

static RATE_LIMIT_REJECTIONS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "auth_rate_limit_rejections_total",
            "Requests rejected by the rate limiter",
        ),
        &["scope"],
    )
    .and_then(|c| {
        prometheus::default_registry().register(Box::new(c.clone()))?;
        Ok(c)
    })
    .unwrap_or_else(|e| {
        tracing::error!("failed to create rate limit rejection counter: {}", e);
        IntCounterVec::new(Opts::new("dummy_rate_limit", "dummy"), &["scope"])
            .expect("dummy counter")
    })
});

static REVOKED_TOKENS_ACTIVE: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "auth_revoked_tokens_active",
        "Revoked tokens currently held in the blacklist",
    )
    .and_then(|g| {
        prometheus::default_registry().register(Box::new(g.clone()))?;
        Ok(g)
    })
    .unwrap_or_else(|e| {
        tracing::error!("failed to create revoked tokens gauge: {}", e);
        IntGauge::new("dummy_revoked_tokens", "dummy").expect("dummy gauge")
    })
});

#[inline]
pub fn inc_login_requests() {
    LOGIN_REQUESTS_TOTAL.inc();
}

#[inline]
pub fn inc_login_failures() {
    LOGIN_FAILURES_TOTAL.inc();
}

#[inline]
pub fn inc_token_refresh() {
    TOKEN_REFRESH_TOTAL.inc();
}

#[inline]
pub fn inc_tokens_revoked() {
    TOKENS_REVOKED_TOTAL.inc();
}

#[inline]
pub fn inc_rate_limit_rejection(scope: RateLimitScope) {
    RATE_LIMIT_REJECTIONS_TOTAL
        .with_label_values(&[scope.as_str()])
        .inc();
}

pub fn set_revoked_tokens_active(count: usize) {
    REVOKED_TOKENS_ACTIVE.set(i64::try_from(count).unwrap_or(i64::MAX));
}
