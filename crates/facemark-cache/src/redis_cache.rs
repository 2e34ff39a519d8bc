//! Redis-backed result cache.

use async_trait::async_trait;
use facemark_models::Fingerprint;
use redis::AsyncCommands;
use tracing::debug;

use crate::cache::ResultCache;
use crate::error::CacheResult;

/// Stores results under `{prefix}{fingerprint}` with plain GET/SET.
pub struct RedisResultCache {
    client: redis::Client,
    prefix: String,
}

impl RedisResultCache {
    /// Create a cache for the given Redis URL. Does not connect yet.
    pub fn new(redis_url: &str, prefix: impl Into<String>) -> CacheResult<Self> {
        let client = redis::Client::open(redis_url)?;
        Ok(Self {
            client,
            prefix: prefix.into(),
        })
    }

    /// Full Redis key for a fingerprint.
    pub fn key(&self, fingerprint: &Fingerprint) -> String {
        format!("{}{}", self.prefix, fingerprint)
    }

    async fn connection(&self) -> CacheResult<redis::aio::MultiplexedConnection> {
        Ok(self.client.get_multiplexed_async_connection().await?)
    }
}

#[async_trait]
impl ResultCache for RedisResultCache {
    async fn get(&self, key: &Fingerprint) -> CacheResult<Option<String>> {
        let mut conn = self.connection().await?;
        let redis_key = self.key(key);
        let value: Option<String> = conn.get(&redis_key).await?;
        debug!(key = %redis_key, hit = value.is_some(), "Redis cache lookup");
        Ok(value)
    }

    async fn set(&self, key: &Fingerprint, value: &str) -> CacheResult<()> {
        let mut conn = self.connection().await?;
        let redis_key = self.key(key);
        conn.set::<_, _, ()>(&redis_key, value).await?;
        debug!(key = %redis_key, bytes = value.len(), "Redis cache store");
        Ok(())
    }

    async fn health_check(&self) -> CacheResult<()> {
        let mut conn = self.connection().await?;
        redis::cmd("PING").query_async::<String>(&mut conn).await?;
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "redis"
    }
}
