//! Result cache abstraction.

use std::sync::Arc;

use async_trait::async_trait;
use facemark_models::{Fingerprint, PipelineResult};
use tracing::{info, warn};

use crate::error::CacheResult;
use crate::memory::InMemoryResultCache;
use crate::redis_cache::RedisResultCache;

/// Default key prefix for stored results.
pub const DEFAULT_KEY_PREFIX: &str = "facemark:result:";

/// Key/value store for serialized pipeline results.
///
/// Plain get/set semantics: no TTL, no compare-and-swap. Concurrent writers
/// of the same key race and the last write wins.
#[async_trait]
pub trait ResultCache: Send + Sync {
    /// Look up a value. Unknown keys return `Ok(None)`.
    async fn get(&self, key: &Fingerprint) -> CacheResult<Option<String>>;

    /// Store a value, overwriting any previous one.
    async fn set(&self, key: &Fingerprint, value: &str) -> CacheResult<()>;

    /// Verify the backing store is reachable.
    async fn health_check(&self) -> CacheResult<()>;

    /// Backend name for logging.
    fn backend(&self) -> &'static str;
}

/// Serialize a result for storage.
pub fn encode_result(result: &PipelineResult) -> CacheResult<String> {
    Ok(serde_json::to_string(result)?)
}

/// Deserialize a stored result.
///
/// Corrupt payloads are logged and reported as `None` so callers treat them
/// as a miss.
pub fn decode_result(key: &Fingerprint, payload: &str) -> Option<PipelineResult> {
    match serde_json::from_str(payload) {
        Ok(result) => Some(result),
        Err(e) => {
            warn!(fingerprint = %key, error = %e, "Discarding undecodable cached result");
            None
        }
    }
}

/// Cache backend selection.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Redis URL. `None` selects the in-process cache.
    pub redis_url: Option<String>,
    pub key_prefix: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            redis_url: None,
            key_prefix: DEFAULT_KEY_PREFIX.to_string(),
        }
    }
}

impl CacheConfig {
    /// Reads `REDIS_URL` and `FACEMARK_CACHE_PREFIX`.
    pub fn from_env() -> Self {
        Self {
            redis_url: std::env::var("REDIS_URL").ok().filter(|s| !s.is_empty()),
            key_prefix: std::env::var("FACEMARK_CACHE_PREFIX")
                .unwrap_or_else(|_| DEFAULT_KEY_PREFIX.to_string()),
        }
    }
}

/// Build the configured cache backend.
pub fn build_cache(config: &CacheConfig) -> CacheResult<Arc<dyn ResultCache>> {
    match &config.redis_url {
        Some(url) => {
            let cache = RedisResultCache::new(url, config.key_prefix.clone())?;
            info!(prefix = %config.key_prefix, "Using Redis result cache");
            Ok(Arc::new(cache))
        }
        None => {
            warn!("REDIS_URL not set, results are cached in process memory only");
            Ok(Arc::new(InMemoryResultCache::new()))
        }
    }
}
