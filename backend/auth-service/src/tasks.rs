//! Cancellable background jobs owned by `main`.
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::metrics;
use crate::security::rate_limit::RateLimiter;
use crate::security::token_revocation::RevocationStore;

/// Job running `tick` every `period` until shut down.
///
/// A tick that has started always runs to completion; the shutdown signal is
/// only observed between ticks.
pub struct PeriodicTask {
    name: &'static str,
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl PeriodicTask {
    /// Signal the task and wait for it to exit.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        match self.handle.await {
            Ok(()) => info!(task = self.name, "background task stopped"),
            Err(e) => warn!(task = self.name, error = %e, "background task ended abnormally"),
        }
    }
}

pub fn spawn_periodic<F, Fut>(name: &'static str, period: Duration, mut tick: F) -> PeriodicTask
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let (shutdown, mut stop) = watch::channel(false);

    let handle = tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately.
        interval.tick().await;

        loop {
            tokio::select! {
                changed = stop.changed() => {
                    if changed.is_err() || *stop.borrow() {
                        break;
                    }
                }
                _ = interval.tick() => {
                    debug!(task = name, "running periodic task");
                    tick().await;
                }
            }
        }
    });

    info!(task = name, period_secs = period.as_secs(), "background task started");
    PeriodicTask {
        name,
        shutdown,
        handle,
    }
}

/// Periodically drop blacklist entries whose tokens have expired.
pub fn spawn_revocation_cleanup(store: Arc<RevocationStore>, period: Duration) -> PeriodicTask {
    spawn_periodic("revocation_cleanup", period, move || {
        let store = store.clone();
        async move {
            store.cleanup();
            metrics::set_revoked_tokens_active(store.len());
        }
    })
}

/// Periodically drop idle in-memory rate limit windows.
pub fn spawn_rate_limit_sweep(limiter: Arc<RateLimiter>, period: Duration) -> PeriodicTask {
    spawn_periodic("rate_limit_sweep", period, move || {
        let limiter = limiter.clone();
        async move {
            limiter.purge_idle();
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;
    use crypto_core::{Clock, ManualClock};
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test(start_paused = true)]
    async fn test_periodic_task_ticks_until_shutdown() {
        let ticks = Arc::new(AtomicUsize::new(0));
        let counter = ticks.clone();
        let task = spawn_periodic("counter", Duration::from_secs(10), move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });

        tokio::time::sleep(Duration::from_secs(35)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 3);

        task.shutdown().await;
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_revocation_cleanup_task_removes_expired_entries() {
        let clock = Arc::new(ManualClock::starting_now());
        let store = Arc::new(RevocationStore::new(clock.clone(), 7));
        store.revoke("expired", clock.now() + ChronoDuration::seconds(5), "1");
        store.revoke("live", clock.now() + ChronoDuration::hours(1), "1");

        let task = spawn_revocation_cleanup(store.clone(), Duration::from_secs(60));
        clock.advance(ChronoDuration::seconds(10));

        tokio::time::sleep(Duration::from_secs(61)).await;
        assert!(!store.is_revoked("expired"));
        assert!(store.is_revoked("live"));

        task.shutdown().await;
    }
}
