//! Volatile cache for reference records.
//!
//! The cache is advisory. [`CacheClient`] turns every backend failure or
//! timeout into an explicit [`CacheLookup::Error`] or [`CacheWrite::Failed`]
//! value so the verifier can treat it as a miss and carry on.

mod memory;
mod redis;

pub use self::memory::{CacheStats, MemoryCache};
pub use self::redis::RedisCache;

use crate::error::Result;
use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Default time-to-live for cached reference records.
pub const DEFAULT_TTL: Duration = Duration::from_secs(3600);

/// Longest accepted time-to-live for cached reference records (30 days).
pub const MAX_TTL: Duration = Duration::from_secs(30 * 24 * 3600);

/// Default bound on a single cache call.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(250);

/// Raw key-value cache with per-key expiry.
///
/// Implementations must never return an entry older than the TTL it was
/// stored with.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    /// Fetch the payload stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Cache`] on transport or availability failure.
    async fn get(&self, key: &str) -> Result<Option<Bytes>>;

    /// Store `payload` under `key`, expiring after `ttl`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Cache`] if the write was not accepted.
    async fn set(&self, key: &str, payload: Bytes, ttl: Duration) -> Result<()>;

    /// Check that the cache is reachable.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Cache`] if it is not.
    async fn ping(&self) -> Result<()>;
}

/// Outcome of a cache read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheLookup {
    /// Entry present and unexpired.
    Hit(Bytes),
    /// No entry (or an expired one).
    Miss,
    /// The cache could not answer; treated as a miss.
    Error(String),
}

impl CacheLookup {
    /// Short outcome label for audit records.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Hit(_) => "hit",
            Self::Miss => "miss",
            Self::Error(_) => "error",
        }
    }
}

/// Outcome of a cache write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheWrite {
    /// The entry was accepted.
    Stored,
    /// The write failed; the failure has already been logged.
    Failed(String),
}

/// Best-effort cache client with a bounded call time.
#[derive(Clone)]
pub struct CacheClient {
    backend: Arc<dyn CacheBackend>,
    timeout: Duration,
}

impl CacheClient {
    /// Wrap a backend.
    #[must_use]
    pub fn new(backend: Arc<dyn CacheBackend>, timeout: Duration) -> Self {
        Self { backend, timeout }
    }

    /// The call timeout.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Read `key`. Never fails; errors come back as [`CacheLookup::Error`].
    pub async fn get(&self, key: &str) -> CacheLookup {
        match tokio::time::timeout(self.timeout, self.backend.get(key)).await {
            Ok(Ok(Some(payload))) => CacheLookup::Hit(payload),
            Ok(Ok(None)) => CacheLookup::Miss,
            Ok(Err(e)) => {
                warn!(key = %key, error = %e, "Cache read failed, treating as miss");
                CacheLookup::Error(e.to_string())
            }
            Err(_) => {
                warn!(key = %key, timeout_ms = self.timeout.as_millis(), "Cache read timed out, treating as miss");
                CacheLookup::Error(format!("cache read timed out after {:?}", self.timeout))
            }
        }
    }

    /// Write `payload` under `key`. Never fails; errors are logged.
    pub async fn set(&self, key: &str, payload: Bytes, ttl: Duration) -> CacheWrite {
        match tokio::time::timeout(self.timeout, self.backend.set(key, payload, ttl)).await {
            Ok(Ok(())) => {
                debug!(key = %key, ttl_secs = ttl.as_secs(), "Cache entry stored");
                CacheWrite::Stored
            }
            Ok(Err(e)) => {
                warn!(key = %key, error = %e, "Cache write failed");
                CacheWrite::Failed(e.to_string())
            }
            Err(_) => {
                warn!(key = %key, timeout_ms = self.timeout.as_millis(), "Cache write timed out");
                CacheWrite::Failed(format!("cache write timed out after {:?}", self.timeout))
            }
        }
    }

    /// Whether the cache answers a ping within the timeout.
    pub async fn is_reachable(&self) -> bool {
        matches!(
            tokio::time::timeout(self.timeout, self.backend.ping()).await,
            Ok(Ok(()))
        )
    }
}
