use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::OfflineResult;
use crate::request::CacheKey;

use super::{CacheEntry, CacheStore};

type Generations = HashMap<String, HashMap<CacheKey, CacheEntry>>;

/// In-process cache store.
#[derive(Debug, Default)]
pub struct MemoryCacheStore {
    inner: RwLock<Generations>,
}

impl MemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CacheStore for MemoryCacheStore {
    async fn generations(&self) -> OfflineResult<Vec<String>> {
        let mut names: Vec<String> = self.inner.read().await.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    async fn create_generation(&self, generation: &str) -> OfflineResult<()> {
        self.inner
            .write()
            .await
            .entry(generation.to_string())
            .or_default();
        Ok(())
    }

    async fn delete_generation(&self, generation: &str) -> OfflineResult<bool> {
        Ok(self.inner.write().await.remove(generation).is_some())
    }

    async fn keys(&self, generation: &str) -> OfflineResult<Vec<CacheKey>> {
        let inner = self.inner.read().await;
        Ok(inner
            .get(generation)
            .map(|entries| entries.keys().cloned().collect())
            .unwrap_or_default())
    }

    async fn get(&self, generation: &str, key: &CacheKey) -> OfflineResult<Option<CacheEntry>> {
        let inner = self.inner.read().await;
        Ok(inner
            .get(generation)
            .and_then(|entries| entries.get(key))
            .cloned())
    }

    async fn put(&self, entry: CacheEntry) -> OfflineResult<()> {
        let mut inner = self.inner.write().await;
        inner
            .entry(entry.generation.clone())
            .or_default()
            .insert(entry.key.clone(), entry);
        Ok(())
    }
}
