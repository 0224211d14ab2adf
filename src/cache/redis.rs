//! Redis cache backend.
//!
//! Uses the async `ConnectionManager`, which multiplexes one connection and
//! reconnects on its own. Expiry is delegated to Redis via `SET ... EX`.

use super::CacheBackend;
use crate::error::{Error, Result};
use ::redis::aio::ConnectionManager;
use ::redis::AsyncCommands;
use async_trait::async_trait;
use bytes::Bytes;
use std::time::Duration;
use tracing::{debug, info};

/// Redis-backed volatile cache.
#[derive(Clone)]
pub struct RedisCache {
    manager: ConnectionManager,
}

impl RedisCache {
    /// Connect to the Redis server at `url` (e.g. `rediss://host:6379`).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Cache`] if the URL is invalid or the first connection
    /// cannot be established.
    pub async fn connect(url: &str) -> Result<Self> {
        let client = ::redis::Client::open(url)
            .map_err(|e| Error::Cache(format!("Invalid Redis URL: {e}")))?;
        let manager = ConnectionManager::new(client)
            .await
            .map_err(|e| Error::Cache(format!("Failed to connect to Redis: {e}")))?;

        info!("Redis cache connected");
        Ok(Self { manager })
    }
}

/// Whole seconds for `SET ... EX`. Redis rejects `EX 0`, so sub-second
/// TTLs round up to one second.
fn expiry_secs(ttl: Duration) -> u64 {
    ttl.as_secs().max(1)
}

#[async_trait]
impl CacheBackend for RedisCache {
    async fn get(&self, key: &str) -> Result<Option<Bytes>> {
        let mut conn = self.manager.clone();
        let value: Option<Vec<u8>> = conn
            .get(key)
            .await
            .map_err(|e| Error::Cache(format!("Redis GET failed: {e}")))?;
        Ok(value.map(Bytes::from))
    }

    async fn set(&self, key: &str, payload: Bytes, ttl: Duration) -> Result<()> {
        let mut conn = self.manager.clone();
        let ttl_secs = expiry_secs(ttl);
        conn.set_ex::<_, _, ()>(key, payload.as_ref(), ttl_secs)
            .await
            .map_err(|e| Error::Cache(format!("Redis SET failed: {e}")))?;
        debug!(key = %key, ttl_secs, "Redis entry stored");
        Ok(())
    }

    async fn ping(&self) -> Result<()> {
        let mut conn = self.manager.clone();
        let _pong: String = ::redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(|e| Error::Cache(format!("Redis PING failed: {e}")))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expiry_rounds_sub_second_ttls_up() {
        assert_eq!(expiry_secs(Duration::ZERO), 1);
        assert_eq!(expiry_secs(Duration::from_millis(400)), 1);
        assert_eq!(expiry_secs(Duration::from_millis(2_500)), 2);
        assert_eq!(expiry_secs(Duration::from_secs(3600)), 3600);
    }

    #[tokio::test]
    async fn test_connect_rejects_malformed_url() {
        let result = RedisCache::connect("not a redis url").await;
        assert!(matches!(result, Err(Error::Cache(ref msg)) if msg.contains("Invalid Redis URL")));
    }
}
