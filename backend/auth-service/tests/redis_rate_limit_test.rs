//! Sliding-window limiter against a real Redis.
//!
//! These tests require a running Redis instance.
//! Run with: cargo test --test redis_rate_limit_test -- --ignored

use auth_service::security::rate_limit::RedisRateLimitStore;
use auth_service::security::{RateLimitRule, RateLimitScope, RateLimiter};
use auth_service::AuthError;
use chrono::Duration as ChronoDuration;
use crypto_core::ManualClock;
use redis::aio::ConnectionManager;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

const REDIS_URL: &str = "redis://127.0.0.1:6379";

async fn connect() -> ConnectionManager {
    let client = redis::Client::open(REDIS_URL).expect("Invalid Redis URL");
    ConnectionManager::new(client)
        .await
        .expect("Failed to connect to Redis")
}

async fn limiter(timeout: Duration) -> (Arc<RateLimiter>, Arc<ManualClock>, ConnectionManager) {
    let redis = connect().await;
    let clock = Arc::new(ManualClock::starting_now());
    let store = RedisRateLimitStore::new(redis.clone(), timeout, Duration::from_secs(10));
    let limiter = RateLimiter::new(Arc::new(store), clock.clone());
    (Arc::new(limiter), clock, redis)
}

/// Fresh identity so reruns never share a key.
fn identity() -> String {
    format!("test-{}", Uuid::new_v4())
}

#[tokio::test]
#[ignore] // Requires Redis server
async fn test_limit_three_then_rejected_then_reopens() {
    let (limiter, clock, _redis) = limiter(Duration::from_millis(500)).await;
    let rule = RateLimitRule::new(3, 60);
    let client = identity();

    for expected_remaining in [2, 1, 0] {
        let decision = limiter
            .check(RateLimitScope::Auth, &client, rule)
            .await
            .expect("Request within limit rejected");
        assert_eq!(decision.remaining, expected_remaining);
    }

    let err = limiter
        .check(RateLimitScope::Auth, &client, rule)
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::RateLimitExceeded { limit: 3, .. }));

    // Another client is unaffected.
    limiter
        .check(RateLimitScope::Auth, &identity(), rule)
        .await
        .expect("Independent client rejected");

    clock.advance(ChronoDuration::seconds(60));
    let reopened = limiter
        .check(RateLimitScope::Auth, &client, rule)
        .await
        .expect("Window did not reopen");
    assert_eq!(reopened.remaining, 2);
}

#[tokio::test]
#[ignore] // Requires Redis server
async fn test_key_expires_after_window_and_grace() {
    let (limiter, _clock, mut redis) = limiter(Duration::from_millis(500)).await;
    let rule = RateLimitRule::new(3, 60);
    let client = identity();

    limiter
        .check(RateLimitScope::Global, &client, rule)
        .await
        .expect("Check failed");

    let key = RateLimiter::key(RateLimitScope::Global, &client);
    let ttl: i64 = redis::cmd("TTL")
        .arg(&key)
        .query_async(&mut redis)
        .await
        .expect("TTL failed");
    assert!(ttl > 60 && ttl <= 70, "unexpected TTL {ttl}");

    let members: i64 = redis::cmd("ZCARD")
        .arg(&key)
        .query_async(&mut redis)
        .await
        .expect("ZCARD failed");
    assert_eq!(members, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ignore] // Requires Redis server
async fn test_concurrent_checks_admit_exactly_limit() {
    let (limiter, _clock, _redis) = limiter(Duration::from_secs(2)).await;
    let rule = RateLimitRule::new(5, 60);
    let client = identity();

    let handles: Vec<_> = (0..40)
        .map(|_| {
            let limiter = limiter.clone();
            let client = client.clone();
            tokio::spawn(async move {
                limiter
                    .check(RateLimitScope::Global, &client, rule)
                    .await
                    .is_ok()
            })
        })
        .collect();

    let mut admitted = 0;
    for handle in handles {
        if handle.await.expect("Task panicked") {
            admitted += 1;
        }
    }
    assert_eq!(admitted, 5);
}

#[tokio::test]
#[ignore] // Requires Redis server
async fn test_timed_out_backend_allows_requests() {
    let (limiter, _clock, _redis) = limiter(Duration::ZERO).await;
    let rule = RateLimitRule::new(1, 60);
    let client = identity();

    for _ in 0..3 {
        let decision = limiter
            .check(RateLimitScope::Auth, &client, rule)
            .await
            .expect("Fail-open check rejected");
        assert_eq!(decision.remaining, 0);
    }
}
