//! Process-local result cache.

use std::collections::HashMap;

use async_trait::async_trait;
use facemark_models::Fingerprint;
use tokio::sync::RwLock;

use crate::cache::ResultCache;
use crate::error::CacheResult;

/// In-memory cache for tests and single-process deployments.
#[derive(Debug, Default)]
pub struct InMemoryResultCache {
    entries: RwLock<HashMap<Fingerprint, String>>,
}

impl InMemoryResultCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl ResultCache for InMemoryResultCache {
    async fn get(&self, key: &Fingerprint) -> CacheResult<Option<String>> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn set(&self, key: &Fingerprint, value: &str) -> CacheResult<()> {
        self.entries
            .write()
            .await
            .insert(key.clone(), value.to_string());
        Ok(())
    }

    async fn health_check(&self) -> CacheResult<()> {
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}
