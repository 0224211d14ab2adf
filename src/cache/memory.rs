//! In-process LRU cache with per-entry expiry.
//!
//! Expiry is measured on the tokio clock, so tests can pause time and
//! advance it past the TTL.

use super::CacheBackend;
use crate::error::{Error, Result};
use async_trait::async_trait;
use bytes::Bytes;
use lru::LruCache;
use parking_lot::Mutex;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Default cache capacity (10,000 reference records).
const DEFAULT_CACHE_CAPACITY: usize = 10_000;

struct Entry {
    payload: Bytes,
    expires_at: Instant,
}

/// Bounded LRU cache whose entries expire after their TTL.
#[derive(Clone)]
pub struct MemoryCache {
    inner: Arc<Mutex<LruCache<String, Entry>>>,
    stats: Arc<Mutex<CacheStats>>,
}

/// Cache statistics for monitoring.
#[derive(Debug, Default, Clone)]
pub struct CacheStats {
    /// Number of cache hits.
    pub hits: u64,
    /// Number of cache misses, expired entries included.
    pub misses: u64,
    /// Number of entries added.
    pub additions: u64,
    /// Number of entries found expired on read.
    pub expirations: u64,
}

impl CacheStats {
    /// Calculate hit rate as a percentage.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            (self.hits as f64 / total as f64) * 100.0
        }
    }
}

impl MemoryCache {
    /// Create a new cache with default capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CACHE_CAPACITY)
    }

    /// Create a new cache with the specified capacity (at least one entry).
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let cap = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: Arc::new(Mutex::new(LruCache::new(cap))),
            stats: Arc::new(Mutex::new(CacheStats::default())),
        }
    }

    /// Get current cache statistics.
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        self.stats.lock().clone()
    }

    /// Get the current number of entries, expired ones not yet evicted included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    /// Check if the cache is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    /// Clear all entries from the cache.
    pub fn clear(&self) {
        self.inner.lock().clear();
    }

    fn lookup(&self, key: &str) -> Option<Bytes> {
        let now = Instant::now();
        let mut cache = self.inner.lock();

        let (found, expired) = match cache.get(key) {
            Some(entry) if entry.expires_at > now => (Some(entry.payload.clone()), false),
            Some(_) => (None, true),
            None => (None, false),
        };
        if expired {
            cache.pop(key);
        }
        drop(cache);

        let mut stats = self.stats.lock();
        if found.is_some() {
            stats.hits += 1;
        } else {
            stats.misses += 1;
        }
        if expired {
            stats.expirations += 1;
        }

        found
    }

    fn insert(&self, key: &str, payload: Bytes, ttl: Duration) -> Result<()> {
        let expires_at = Instant::now()
            .checked_add(ttl)
            .ok_or_else(|| Error::Cache(format!("TTL of {ttl:?} is out of range")))?;
        let entry = Entry {
            payload,
            expires_at,
        };
        self.inner.lock().put(key.to_string(), entry);
        self.stats.lock().additions += 1;
        Ok(())
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CacheBackend for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<Bytes>> {
        Ok(self.lookup(key))
    }

    async fn set(&self, key: &str, payload: Bytes, ttl: Duration) -> Result<()> {
        self.insert(key, payload, ttl)
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}
