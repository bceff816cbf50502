//! In-process token blacklist.
//!
//! Revoked tokens are tracked by `jti` until their own expiry. Three indexes
//! live behind a single lock and are always updated together:
//!
//! * `jti -> (subject, expires_at)` for O(1) revocation checks,
//! * per-subject `(expires_at, jti)` sets for the suspicion check,
//! * a global `(expires_at, jti)` set so cleanup only touches expired entries.

use chrono::{DateTime, Utc};
use crypto_core::SharedClock;
use parking_lot::RwLock;
use std::collections::{BTreeSet, HashMap};

use crate::models::RevocationEntry;

/// Entries removed per write-lock acquisition during cleanup.
pub const CLEANUP_BATCH_SIZE: usize = 1024;

#[derive(Debug, Clone)]
struct Revoked {
    subject: String,
    expires_at: DateTime<Utc>,
}

type ExpiryKey = (DateTime<Utc>, String);

#[derive(Debug, Default)]
struct Indexes {
    by_jti: HashMap<String, Revoked>,
    by_subject: HashMap<String, BTreeSet<ExpiryKey>>,
    by_expiry: BTreeSet<ExpiryKey>,
}

impl Indexes {
    fn remove(&mut self, key: &ExpiryKey) {
        self.by_expiry.remove(key);
        if let Some(revoked) = self.by_jti.remove(&key.1) {
            if let Some(set) = self.by_subject.get_mut(&revoked.subject) {
                set.remove(key);
                if set.is_empty() {
                    self.by_subject.remove(&revoked.subject);
                }
            }
        }
    }
}

pub struct RevocationStore {
    inner: RwLock<Indexes>,
    clock: SharedClock,
    suspicion_threshold: usize,
}

impl RevocationStore {
    pub fn new(clock: SharedClock, suspicion_threshold: usize) -> Self {
        Self {
            inner: RwLock::new(Indexes::default()),
            clock,
            suspicion_threshold,
        }
    }

    /// Blacklist `jti` until `expires_at`.
    ///
    /// Returns `true` if the id was not revoked before. Two concurrent callers
    /// revoking the same id see exactly one `true`.
    pub fn revoke(&self, jti: &str, expires_at: DateTime<Utc>, subject: &str) -> bool {
        let mut inner = self.inner.write();
        if inner.by_jti.contains_key(jti) {
            return false;
        }

        let key = (expires_at, jti.to_string());
        inner.by_jti.insert(
            jti.to_string(),
            Revoked {
                subject: subject.to_string(),
                expires_at,
            },
        );
        inner
            .by_subject
            .entry(subject.to_string())
            .or_default()
            .insert(key.clone());
        inner.by_expiry.insert(key);
        true
    }

    pub fn is_revoked(&self, jti: &str) -> bool {
        self.inner.read().by_jti.contains_key(jti)
    }

    /// When `subject` holds more live revoked tokens than the threshold,
    /// returns the earliest of their expiries: the moment the count can next
    /// drop.
    pub fn is_suspicious(&self, subject: &str) -> Option<DateTime<Utc>> {
        let now = self.clock.now();
        let inner = self.inner.read();
        let set = inner.by_subject.get(subject)?;

        let mut live = set.iter().filter(|(expires_at, _)| *expires_at > now);
        let earliest = live.next()?.0;
        let count = 1 + live.count();

        (count > self.suspicion_threshold).then_some(earliest)
    }

    /// Remove at most `max` entries that expired before now.
    pub fn cleanup_batch(&self, max: usize) -> usize {
        let now = self.clock.now();
        let mut inner = self.inner.write();

        let expired: Vec<ExpiryKey> = inner
            .by_expiry
            .iter()
            .take_while(|(expires_at, _)| *expires_at < now)
            .take(max)
            .cloned()
            .collect();

        for key in &expired {
            inner.remove(key);
        }
        expired.len()
    }

    /// Remove every expired entry, one batch per lock hold.
    pub fn cleanup(&self) -> usize {
        let mut removed = 0;
        loop {
            let batch = self.cleanup_batch(CLEANUP_BATCH_SIZE);
            removed += batch;
            if batch < CLEANUP_BATCH_SIZE {
                break;
            }
        }

        if removed > 0 {
            tracing::info!(removed, remaining = self.len(), "revocation cleanup finished");
        } else {
            tracing::debug!("revocation cleanup found nothing to remove");
        }
        removed
    }

    /// Snapshot of the blacklist ordered by expiry.
    pub fn entries(&self) -> Vec<RevocationEntry> {
        let inner = self.inner.read();
        inner
            .by_expiry
            .iter()
            .filter_map(|(_, jti)| {
                inner.by_jti.get(jti).map(|revoked| RevocationEntry {
                    jti: jti.clone(),
                    subject: revoked.subject.clone(),
                    expires_at: revoked.expires_at,
                })
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.inner.read().by_jti.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
