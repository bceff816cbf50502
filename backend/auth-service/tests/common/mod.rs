//! Shared fixtures for integration tests.
#![allow(dead_code)]

use auth_service::{
    build_router,
    config::RateLimitSettings,
    db::InMemoryUserRepository,
    models::User,
    security::{hash_password, RateLimiter, RevocationStore},
    services::AuthService,
    AppState,
};
use axum::{
    body::{to_bytes, Body},
    http::{header, HeaderMap, Method, Request, StatusCode},
    Router,
};
use chrono::{DateTime, Utc};
use crypto_core::{ManualClock, TokenCodec, TokenTtlPolicy};
use once_cell::sync::Lazy;
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;

pub const PASSWORD: &str = "CorrectHorse1!";
pub const ADMIN_EMAIL: &str = "admin@example.com";

/// Hashing is slow; every fixture user shares one hash of [`PASSWORD`].
static PASSWORD_HASH: Lazy<String> =
    Lazy::new(|| hash_password(PASSWORD).expect("hash fixture password"));

fn fixture(name: &str) -> String {
    format!("{}/tests/fixtures/{}", env!("CARGO_MANIFEST_DIR"), name)
}

pub fn user(id: i64, email: &str, username: &str) -> User {
    User {
        id,
        email: email.to_string(),
        username: username.to_string(),
        password: PASSWORD_HASH.clone(),
        created_at: DateTime::<Utc>::from_timestamp(1_700_000_000, 0).expect("timestamp"),
    }
}

pub struct TestApp {
    pub clock: Arc<ManualClock>,
    pub users: Arc<InMemoryUserRepository>,
    pub revocations: Arc<RevocationStore>,
    pub auth: Arc<AuthService>,
    pub rate_limiter: Arc<RateLimiter>,
    pub state: AppState,
}

impl TestApp {
    /// Limits high enough that tests not about rate limiting never hit them.
    pub fn new() -> Self {
        Self::with_limits(RateLimitSettings {
            global_limit: 10_000,
            auth_limit: 10_000,
            user_limit: 10_000,
            ..RateLimitSettings::default()
        })
    }

    pub fn with_limits(rate_limits: RateLimitSettings) -> Self {
        let clock = Arc::new(ManualClock::starting_now());

        let codec = TokenCodec::from_key_files(
            "RS256",
            fixture("jwt-private.pem"),
            fixture("jwt-public.pem"),
            TokenTtlPolicy::default(),
            clock.clone(),
        )
        .expect("load fixture keys");

        let users = Arc::new(InMemoryUserRepository::new());
        users.insert(user(1, "ada@example.com", "ada"));
        users.insert(user(2, "grace@example.com", "grace"));
        users.insert(user(99, ADMIN_EMAIL, "admin"));

        let revocations = Arc::new(RevocationStore::new(clock.clone(), 7));
        let auth = Arc::new(AuthService::new(
            users.clone(),
            Arc::new(codec),
            revocations.clone(),
        ));
        let rate_limiter = Arc::new(RateLimiter::in_memory(
            rate_limits.key_grace(),
            clock.clone(),
        ));

        let state = AppState::new(auth.clone(), rate_limiter.clone(), rate_limits, ADMIN_EMAIL);

        Self {
            clock,
            users,
            revocations,
            auth,
            rate_limiter,
            state,
        }
    }

    pub fn router(&self) -> Router {
        build_router(self.state.clone())
    }
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

/// Send one request through a fresh router clone.
pub async fn send(
    router: &Router,
    method: Method,
    uri: &str,
    bearer: Option<&str>,
    json: Option<Value>,
) -> TestResponse {
    send_with_headers(router, method, uri, &[], bearer, json).await
}

pub async fn send_with_headers(
    router: &Router,
    method: Method,
    uri: &str,
    extra_headers: &[(&str, &str)],
    bearer: Option<&str>,
    json: Option<Value>,
) -> TestResponse {
    let mut builder = Request::builder().method(method).uri(uri);
    for (name, value) in extra_headers {
        builder = builder.header(*name, *value);
    }
    if let Some(token) = bearer {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }

    let body = match json {
        Some(value) => {
            builder = builder.header(header::CONTENT_TYPE, "application/json");
            Body::from(value.to_string())
        }
        None => Body::empty(),
    };

    let response = router
        .clone()
        .oneshot(builder.body(body).expect("build request"))
        .await
        .expect("router is infallible");

    let status = response.status();
    let headers = response.headers().clone();
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read body");
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or_else(|_| {
            Value::String(String::from_utf8_lossy(&bytes).into_owned())
        })
    };

    TestResponse {
        status,
        headers,
        body,
    }
}
