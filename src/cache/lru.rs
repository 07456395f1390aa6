//! Moka-backed backend with per-entry TTL and size-bounded eviction.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use moka::Expiry;
use moka::future::Cache;

use super::{CacheBackend, CacheKey, CacheStats};
use crate::telemetry;
use crate::types::Payload;

#[derive(Debug, Clone)]
struct TimedPayload {
    value: Payload,
    ttl: Duration,
}

/// Expires each entry after its own TTL, restarting on overwrite.
struct PerEntryTtl;

impl Expiry<CacheKey, TimedPayload> for PerEntryTtl {
    fn expire_after_create(
        &self,
        _key: &CacheKey,
        value: &TimedPayload,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(value.ttl)
    }

    fn expire_after_update(
        &self,
        _key: &CacheKey,
        value: &TimedPayload,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(value.ttl)
    }
}

/// Size-bounded cache; live entries are evicted once `max_entries` is hit.
pub struct LruCache {
    cache: Cache<CacheKey, TimedPayload>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl LruCache {
    pub fn new(max_entries: u64) -> Self {
        let cache = Cache::builder()
            .max_capacity(max_entries)
            .expire_after(PerEntryTtl)
            .build();
        Self {
            cache,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }
}

#[async_trait]
impl CacheBackend for LruCache {
    async fn get(&self, key: &CacheKey) -> Option<Payload> {
        match self.cache.get(key).await {
            Some(entry) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                metrics::counter!(telemetry::CACHE_HITS_TOTAL).increment(1);
                Some(entry.value)
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                metrics::counter!(telemetry::CACHE_MISSES_TOTAL).increment(1);
                None
            }
        }
    }

    async fn set(&self, key: CacheKey, value: Payload, ttl: Duration) {
        self.cache.insert(key, TimedPayload { value, ttl }).await;
    }

    async fn stats(&self) -> CacheStats {
        self.cache.run_pending_tasks().await;
        CacheStats {
            entries: self.cache.entry_count(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }

    async fn clear(&self) {
        self.cache.invalidate_all();
        self.cache.run_pending_tasks().await;
    }
}
