//! Sliding-window rate limiting.
//!
//! Each `(scope, identity)` pair keeps a log of request timestamps inside the
//! trailing window. A request is admitted while fewer than `limit` timestamps
//! remain after pruning. Counters live behind [`RateLimitStore`], either in
//! process memory or in Redis.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use crypto_core::SharedClock;
use dashmap::DashMap;
use redis::aio::ConnectionManager;
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::warn;
use uuid::Uuid;

use crate::error::{AuthError, Result};
use crate::metrics;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RateLimitScope {
    /// Every request, keyed by client address
    Global,
    /// Authentication endpoints, keyed by client address
    Auth,
    /// Access-protected endpoints, keyed by user id
    User,
}

impl RateLimitScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            RateLimitScope::Global => "global",
            RateLimitScope::Auth => "auth",
            RateLimitScope::User => "user",
        }
    }
}

impl fmt::Display for RateLimitScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Longest supported window: one leap year.
pub const MAX_WINDOW_SECS: u64 = 366 * 24 * 60 * 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitRule {
    pub limit: u32,
    pub window_secs: u64,
}

impl RateLimitRule {
    pub fn new(limit: u32, window_secs: u64) -> Self {
        Self { limit, window_secs }
    }

    /// Window length, capped at [`MAX_WINDOW_SECS`].
    pub fn window(&self) -> Duration {
        let secs = self.window_secs.min(MAX_WINDOW_SECS);
        Duration::seconds(i64::try_from(secs).unwrap_or(0))
    }
}

/// Admitted request, with values for the `X-RateLimit-*` headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitDecision {
    pub limit: u32,
    pub remaining: u32,
    pub reset_at: DateTime<Utc>,
}

/// Result of one prune-count-record step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowOutcome {
    /// Timestamp recorded; `prior` hits were already in the window.
    Recorded { prior: u32 },
    /// Window full, nothing recorded.
    Full,
}

#[derive(Debug, Error)]
pub enum RateLimitStoreError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Redis call timed out after {0:?}")]
    Timeout(std::time::Duration),
}

/// Backend holding the per-key request logs.
///
/// `record` must run prune, count and record as one atomic step per key.
#[async_trait]
pub trait RateLimitStore: Send + Sync {
    async fn record(
        &self,
        key: &str,
        now: DateTime<Utc>,
        rule: RateLimitRule,
    ) -> std::result::Result<WindowOutcome, RateLimitStoreError>;

    /// Drop keys with no activity for `window + grace`. Returns keys removed.
    fn purge_idle(&self, _now: DateTime<Utc>) -> usize {
        0
    }
}

// ============================================================================
// In-memory backend
// ============================================================================

#[derive(Debug)]
struct Window {
    hits: VecDeque<DateTime<Utc>>,
    window: Duration,
    last_seen: DateTime<Utc>,
}

/// Sliding logs in a sharded map; each key's update runs under its shard lock.
pub struct InMemoryRateLimitStore {
    windows: DashMap<String, Window>,
    grace: Duration,
}

impl InMemoryRateLimitStore {
    pub fn new(grace: std::time::Duration) -> Self {
        Self {
            windows: DashMap::new(),
            grace: Duration::from_std(grace).unwrap_or_else(|_| Duration::seconds(10)),
        }
    }

    pub fn len(&self) -> usize {
        self.windows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }
}

#[async_trait]
impl RateLimitStore for InMemoryRateLimitStore {
    async fn record(
        &self,
        key: &str,
        now: DateTime<Utc>,
        rule: RateLimitRule,
    ) -> std::result::Result<WindowOutcome, RateLimitStoreError> {
        let window = rule.window();
        let mut entry = self.windows.entry(key.to_string()).or_insert_with(|| Window {
            hits: VecDeque::new(),
            window,
            last_seen: now,
        });

        let cutoff = now - window;
        while entry.hits.front().is_some_and(|hit| *hit <= cutoff) {
            entry.hits.pop_front();
        }
        entry.window = window;
        entry.last_seen = now;

        let prior = u32::try_from(entry.hits.len()).unwrap_or(u32::MAX);
        if prior >= rule.limit {
            return Ok(WindowOutcome::Full);
        }

        entry.hits.push_back(now);
        Ok(WindowOutcome::Recorded { prior })
    }

    fn purge_idle(&self, now: DateTime<Utc>) -> usize {
        let before = self.windows.len();
        self.windows
            .retain(|_, w| w.last_seen + w.window + self.grace > now);
        before.saturating_sub(self.windows.len())
    }
}

// ============================================================================
// Redis backend
// ============================================================================

/// Prune, count and record in one server-side step.
/// Returns `{admitted, prior_count}`.
const SLIDING_WINDOW_SCRIPT: &str = r#"
    local key = KEYS[1]
    local now = tonumber(ARGV[1])
    local window = tonumber(ARGV[2])
    local limit = tonumber(ARGV[3])
    local ttl = tonumber(ARGV[4])
    local member = ARGV[5]

    redis.call('ZREMRANGEBYSCORE', key, '-inf', now - window)
    local count = redis.call('ZCARD', key)
    if count >= limit then
        return {0, count}
    end

    redis.call('ZADD', key, now, member)
    redis.call('EXPIRE', key, ttl)
    return {1, count}
"#;

/// Sorted set per key, scored by request time in milliseconds.
#[derive(Clone)]
pub struct RedisRateLimitStore {
    redis: ConnectionManager,
    script: Arc<redis::Script>,
    timeout: std::time::Duration,
    grace_secs: u64,
}

impl RedisRateLimitStore {
    pub fn new(
        redis: ConnectionManager,
        timeout: std::time::Duration,
        grace: std::time::Duration,
    ) -> Self {
        Self {
            redis,
            script: Arc::new(redis::Script::new(SLIDING_WINDOW_SCRIPT)),
            timeout,
            grace_secs: grace.as_secs(),
        }
    }
}

#[async_trait]
impl RateLimitStore for RedisRateLimitStore {
    async fn record(
        &self,
        key: &str,
        now: DateTime<Utc>,
        rule: RateLimitRule,
    ) -> std::result::Result<WindowOutcome, RateLimitStoreError> {
        let mut conn = self.redis.clone();
        let now_ms = now.timestamp_millis();
        let member = format!("{now_ms}-{}", Uuid::new_v4());

        let mut invocation = self.script.key(key);
        invocation
            .arg(now_ms)
            .arg(rule.window().num_milliseconds())
            .arg(rule.limit)
            .arg(rule.window_secs.min(MAX_WINDOW_SECS).saturating_add(self.grace_secs))
            .arg(member);

        let (admitted, prior): (i64, i64) =
            tokio::time::timeout(self.timeout, invocation.invoke_async(&mut conn))
                .await
                .map_err(|_| RateLimitStoreError::Timeout(self.timeout))??;

        if admitted == 1 {
            Ok(WindowOutcome::Recorded {
                prior: u32::try_from(prior).unwrap_or(u32::MAX),
            })
        } else {
            Ok(WindowOutcome::Full)
        }
    }
}

// ============================================================================
// Limiter
// ============================================================================

pub struct RateLimiter {
    store: Arc<dyn RateLimitStore>,
    clock: SharedClock,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn RateLimitStore>, clock: SharedClock) -> Self {
        Self { store, clock }
    }

    pub fn in_memory(grace: std::time::Duration, clock: SharedClock) -> Self {
        Self::new(Arc::new(InMemoryRateLimitStore::new(grace)), clock)
    }

    pub fn key(scope: RateLimitScope, identity: &str) -> String {
        format!("rate_limit:{}:{}", scope.as_str(), identity)
    }

    /// Admit or reject one request for `identity` under `scope`.
    ///
    /// Backend failures are logged and the request is admitted.
    pub async fn check(
        &self,
        scope: RateLimitScope,
        identity: &str,
        rule: RateLimitRule,
    ) -> Result<RateLimitDecision> {
        let now = self.clock.now();
        let reset_at = now + rule.window();
        let key = Self::key(scope, identity);

        match self.store.record(&key, now, rule).await {
            Ok(WindowOutcome::Recorded { prior }) => Ok(RateLimitDecision {
                limit: rule.limit,
                remaining: rule.limit.saturating_sub(prior).saturating_sub(1),
                reset_at,
            }),
            Ok(WindowOutcome::Full) => {
                metrics::inc_rate_limit_rejection(scope);
                warn!(%scope, identity, limit = rule.limit, "rate limit exceeded");
                Err(AuthError::RateLimitExceeded {
                    limit: rule.limit,
                    window_secs: rule.window_secs,
                })
            }
            Err(e) => {
                warn!(%scope, identity, error = %e, "rate limit backend unavailable, allowing request");
                Ok(RateLimitDecision {
                    limit: rule.limit,
                    remaining: rule.limit.saturating_sub(1),
                    reset_at,
                })
            }
        }
    }

    pub fn purge_idle(&self) -> usize {
        let removed = self.store.purge_idle(self.clock.now());
        if removed > 0 {
            tracing::debug!(removed, "purged idle rate limit windows");
        }
        removed
    }
}
