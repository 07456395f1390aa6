//! Mutex-guarded map backend with an expired-entry sweep.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;
use tracing::debug;

use super::{CacheBackend, CacheKey, CacheStats};
use crate::telemetry;
use crate::types::Payload;

/// One cached response.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub value: Payload,
    pub created_at: Instant,
    pub ttl: Duration,
    /// Number of lookups served by this entry.
    pub hits: u64,
}

impl CacheEntry {
    /// An entry is stale once its age reaches its TTL.
    pub fn is_expired(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.created_at) >= self.ttl
    }
}

/// In-process cache with per-entry TTL.
///
/// When an insert pushes the size past `max_entries`, expired entries are
/// swept. Live entries are never evicted, so under sustained load with
/// long TTLs the map can exceed the threshold; use
/// [`LruCache`](super::LruCache) when a hard bound is required.
pub struct MemoryCache {
    entries: Mutex<HashMap<CacheKey, CacheEntry>>,
    max_entries: usize,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl MemoryCache {
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            max_entries,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<CacheKey, CacheEntry>> {
        // A panic while holding the lock cannot leave the map half-updated.
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Number of stored entries, expired ones included.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Hit counter of a live entry.
    pub fn entry_hits(&self, key: &CacheKey) -> Option<u64> {
        let entries = self.lock();
        entries
            .get(key)
            .filter(|e| !e.is_expired(Instant::now()))
            .map(|e| e.hits)
    }

    /// Remove all expired entries, returning how many were dropped.
    pub fn sweep_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|_, e| !e.is_expired(now));
        before - entries.len()
    }

    fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
        metrics::counter!(telemetry::CACHE_MISSES_TOTAL).increment(1);
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new(super::DEFAULT_MAX_ENTRIES)
    }
}

#[async_trait]
impl CacheBackend for MemoryCache {
    async fn get(&self, key: &CacheKey) -> Option<Payload> {
        let now = Instant::now();
        let found = {
            let mut entries = self.lock();
            match entries.get(key).map(|e| e.is_expired(now)) {
                Some(true) => {
                    entries.remove(key);
                    debug!(%key, "evicted expired cache entry");
                    None
                }
                Some(false) => entries.get_mut(key).map(|entry| {
                    entry.hits += 1;
                    entry.value.clone()
                }),
                None => None,
            }
        };

        match found {
            Some(value) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                metrics::counter!(telemetry::CACHE_HITS_TOTAL).increment(1);
                Some(value)
            }
            None => {
                self.record_miss();
                None
            }
        }
    }

    async fn set(&self, key: CacheKey, value: Payload, ttl: Duration) {
        let over_capacity = {
            let mut entries = self.lock();
            entries.insert(
                key,
                CacheEntry {
                    value,
                    created_at: Instant::now(),
                    ttl,
                    hits: 0,
                },
            );
            entries.len() > self.max_entries
        };

        if over_capacity {
            let removed = self.sweep_expired();
            debug!(removed, "cache over capacity, swept expired entries");
        }
    }

    async fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.len() as u64,
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }

    async fn clear(&self) {
        self.lock().clear();
    }
}
