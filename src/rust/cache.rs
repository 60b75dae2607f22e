use std::collections::HashMap;
use std::time::Duration;

use log::debug;
use tokio::time::Instant;

/// Default lifetime of a fetched batch, matching the refresh interval
pub const DEFAULT_TTL: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
pub struct CacheEntry<T> {
    pub value: T,
    pub fetched_at: Instant,
    pub expires_at: Instant,
}

impl<T> CacheEntry<T> {
    pub fn is_fresh(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

/// Fetched batches keyed by source identity, each with an explicit expiry.
///
/// Time is passed in rather than read so that callers and tests control
/// the clock. Entries expire after the TTL or when invalidated by a manual
/// refresh.
#[derive(Debug)]
pub struct SourceCache<T> {
    ttl: Duration,
    entries: HashMap<String, CacheEntry<T>>,
}

impl<T> SourceCache<T> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: HashMap::new(),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// The cached value, if present and not yet expired at `now`.
    pub fn get(&self, key: &str, now: Instant) -> Option<&T> {
        self.entries
            .get(key)
            .filter(|entry| entry.is_fresh(now))
            .map(|entry| &entry.value)
    }

    pub fn entry(&self, key: &str) -> Option<&CacheEntry<T>> {
        self.entries.get(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: T, now: Instant) -> &CacheEntry<T> {
        let key = key.into();
        debug!("Caching '{}' for {:?}", key, self.ttl);
        let entry = CacheEntry {
            value,
            fetched_at: now,
            expires_at: now + self.ttl,
        };
        self.entries.insert(key.clone(), entry);
        &self.entries[&key]
    }

    pub fn expires_at(&self, key: &str) -> Option<Instant> {
        self.entries.get(key).map(|entry| entry.expires_at)
    }

    /// Drops one entry. Returns whether anything was cached.
    pub fn invalidate(&mut self, key: &str) -> bool {
        self.entries.remove(key).is_some()
    }

    pub fn invalidate_all(&mut self) {
        self.entries.clear();
    }

    /// Removes entries that have expired by `now`.
    pub fn purge_expired(&mut self, now: Instant) {
        self.entries.retain(|_, entry| entry.is_fresh(now));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<T> Default for SourceCache<T> {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}
