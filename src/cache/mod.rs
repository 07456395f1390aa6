//! Request cache.
//!
//! Maps a normalized request ([`CacheKey`]) to a previously accepted
//! [`Payload`]. The gateway only talks to the cache through
//! [`CacheBackend`], so the per-process map can be swapped for a shared
//! store without touching orchestration logic.
//!
//! Two in-process backends are provided, selected by [`EvictionPolicy`]:
//!
//! - [`MemoryCache`]: mutex-guarded map with per-entry TTL. When the store
//!   grows past its capacity threshold, a sweep removes expired entries
//!   only; live entries are never evicted.
//! - [`LruCache`]: moka-backed, per-entry TTL plus size-bounded eviction
//!   of live entries when capacity is reached.

mod lru;
mod memory;

pub use lru::LruCache;
pub use memory::{CacheEntry, MemoryCache};

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::template::truncate_chars;
use crate::types::Payload;

/// Default capacity threshold.
pub const DEFAULT_MAX_ENTRIES: usize = 1_000;

/// Default time-to-live for cached responses.
pub const DEFAULT_TTL: Duration = Duration::from_secs(3600);

/// Default number of prompt characters that participate in the key.
pub const DEFAULT_KEY_PREFIX_CHARS: usize = 2_000;

/// Request context besides the prompt that changes which reply is acceptable.
///
/// Two requests with the same prompt but a different system prompt or a
/// different set of expected fields never share a cache entry.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeyScope<'a> {
    /// System instructions sent alongside the prompt. Hashed verbatim.
    pub system: Option<&'a str>,
    /// Fields the reply was validated against. Order and duplicates are ignored.
    pub expected_fields: &'a [String],
}

/// Deterministic key derived from (normalized prompt prefix, model,
/// temperature) plus an optional [`KeyScope`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CacheKey(String);

impl CacheKey {
    /// Key using the default prompt prefix length.
    pub fn new(prompt: &str, model: &str, temperature: f32) -> Self {
        Self::with_prefix_len(prompt, model, temperature, DEFAULT_KEY_PREFIX_CHARS)
    }

    /// Key over at most `prefix_chars` characters of the prompt.
    ///
    /// The prompt is trimmed and lowercased. Only the bounded prefix is
    /// normalized and hashed, so key cost does not grow with prompt size.
    pub fn with_prefix_len(prompt: &str, model: &str, temperature: f32, prefix_chars: usize) -> Self {
        Self::scoped(prompt, model, temperature, prefix_chars, KeyScope::default())
    }

    /// [`with_prefix_len`](Self::with_prefix_len) with the request's scope
    /// folded into the hash.
    pub fn scoped(
        prompt: &str,
        model: &str,
        temperature: f32,
        prefix_chars: usize,
        scope: KeyScope<'_>,
    ) -> Self {
        let head = truncate_chars(prompt.trim_start(), prefix_chars).to_lowercase();
        let normalized = truncate_chars(head.trim_end(), prefix_chars);

        let mut hasher = Sha256::new();
        hasher.update(normalized.as_bytes());
        hasher.update([0u8]);
        hasher.update(model.as_bytes());
        hasher.update([0u8]);
        hasher.update(format!("{temperature:.2}").as_bytes());

        // Tagged sections keep unscoped keys stable and sections unambiguous.
        if let Some(system) = scope.system {
            hasher.update([0u8, b's']);
            hasher.update((system.len() as u64).to_le_bytes());
            hasher.update(system.as_bytes());
        }
        if !scope.expected_fields.is_empty() {
            let mut fields: Vec<&str> = scope.expected_fields.iter().map(String::as_str).collect();
            fields.sort_unstable();
            fields.dedup();
            hasher.update([0u8, b'f']);
            for field in fields {
                hasher.update((field.len() as u64).to_le_bytes());
                hasher.update(field.as_bytes());
            }
        }
        Self(format!("{:x}", hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Point-in-time cache counters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheStats {
    pub entries: u64,
    pub hits: u64,
    pub misses: u64,
}

impl CacheStats {
    /// `hits / (hits + misses)`, or 0 before any lookup.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Storage behind the request cache.
///
/// Implementations synchronize internally; callers never mutate entries
/// directly. A `set` that happens after a `get` miss must be visible to
/// later `get`s on the same instance.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    /// Cached payload for `key`. Expired entries are treated as absent.
    async fn get(&self, key: &CacheKey) -> Option<Payload>;

    /// Insert or overwrite `key` with a per-entry `ttl`.
    async fn set(&self, key: CacheKey, value: Payload, ttl: Duration);

    async fn stats(&self) -> CacheStats;

    /// Drop every entry.
    async fn clear(&self);
}

/// What happens once the cache reaches its capacity threshold.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EvictionPolicy {
    /// Remove expired entries only ([`MemoryCache`]).
    #[default]
    ExpiredSweep,
    /// Evict least-recently-used live entries as well ([`LruCache`]).
    Lru,
}

/// Configuration for the request cache.
///
/// ```rust
/// # use sluice::cache::{CacheConfig, EvictionPolicy};
/// # use std::time::Duration;
/// let config = CacheConfig::new()
///     .max_entries(5_000)
///     .default_ttl(Duration::from_secs(600))
///     .eviction(EvictionPolicy::Lru);
/// ```
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Capacity threshold. Default: 1,000.
    pub max_entries: usize,
    /// TTL for operations without their own. Default: 1 hour.
    pub default_ttl: Duration,
    /// Prompt characters hashed into the key. Default: 2,000.
    pub key_prefix_chars: usize,
    pub eviction: EvictionPolicy,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: DEFAULT_MAX_ENTRIES,
            default_ttl: DEFAULT_TTL,
            key_prefix_chars: DEFAULT_KEY_PREFIX_CHARS,
            eviction: EvictionPolicy::default(),
        }
    }
}

impl CacheConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn max_entries(mut self, n: usize) -> Self {
        self.max_entries = n;
        self
    }

    pub fn default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    pub fn key_prefix_chars(mut self, n: usize) -> Self {
        self.key_prefix_chars = n;
        self
    }

    pub fn eviction(mut self, policy: EvictionPolicy) -> Self {
        self.eviction = policy;
        self
    }

    /// Instantiate the backend for the configured policy.
    pub fn build_backend(&self) -> Arc<dyn CacheBackend> {
        match self.eviction {
            EvictionPolicy::ExpiredSweep => Arc::new(MemoryCache::new(self.max_entries)),
            EvictionPolicy::Lru => Arc::new(LruCache::new(self.max_entries as u64)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_ignores_case_and_surrounding_whitespace() {
        let a = CacheKey::new("  Hello World \n", "m", 0.3);
        let b = CacheKey::new("hello world", "m", 0.3);
        assert_eq!(a, b);
    }

    #[test]
    fn key_differs_on_model_and_temperature() {
        let base = CacheKey::new("p", "m", 0.3);
        assert_ne!(base, CacheKey::new("p", "other", 0.3));
        assert_ne!(base, CacheKey::new("p", "m", 0.7));
    }

    #[test]
    fn key_only_sees_prefix() {
        let a = CacheKey::with_prefix_len("abcdef", "m", 0.0, 3);
        let b = CacheKey::with_prefix_len("abcxyz", "m", 0.0, 3);
        assert_eq!(a, b);
    }

    #[test]
    fn key_differs_on_system_prompt() {
        let french = KeyScope {
            system: Some("Reply in French"),
            ..Default::default()
        };
        let german = KeyScope {
            system: Some("Reply in German"),
            ..Default::default()
        };
        let a = CacheKey::scoped("hello", "m", 0.3, 100, french);
        assert_ne!(a, CacheKey::scoped("hello", "m", 0.3, 100, german));
        assert_ne!(a, CacheKey::with_prefix_len("hello", "m", 0.3, 100));
    }

    #[test]
    fn key_differs_on_expected_fields_but_not_their_order() {
        let ab = vec!["a".to_string(), "b".to_string()];
        let ba = vec!["b".to_string(), "a".to_string()];
        fn scope(fields: &[String]) -> KeyScope<'_> {
            KeyScope {
                system: None,
                expected_fields: fields,
            }
        }

        let plain = CacheKey::with_prefix_len("p", "m", 0.0, 100);
        let with_ab = CacheKey::scoped("p", "m", 0.0, 100, scope(&ab));
        assert_ne!(plain, with_ab);
        assert_eq!(with_ab, CacheKey::scoped("p", "m", 0.0, 100, scope(&ba)));
        assert_ne!(with_ab, CacheKey::scoped("p", "m", 0.0, 100, scope(&ab[..1])));
        assert_eq!(plain, CacheKey::scoped("p", "m", 0.0, 100, scope(&[])));
    }

    #[test]
    fn hit_rate_without_lookups_is_zero() {
        assert_eq!(CacheStats::default().hit_rate(), 0.0);
    }
}
