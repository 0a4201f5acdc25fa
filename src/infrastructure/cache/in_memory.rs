//! In-memory cache implementation using moka

use async_trait::async_trait;
use moka::future::Cache as MokaCache;

use crate::domain::cache::Cache;
use crate::domain::DomainError;

/// Configuration for in-memory cache
#[derive(Debug, Clone)]
pub struct InMemoryCacheConfig {
    /// Maximum number of entries before moka starts evicting
    pub max_capacity: u64,
}

impl Default for InMemoryCacheConfig {
    fn default() -> Self {
        Self {
            max_capacity: 10_000,
        }
    }
}

impl InMemoryCacheConfig {
    pub fn with_max_capacity(mut self, capacity: u64) -> Self {
        self.max_capacity = capacity;
        self
    }
}

/// Process-local cache backed by moka
///
/// Entries carry no TTL; they stay until overwritten, deleted, or evicted
/// by capacity pressure. Capacity eviction only ever drops derived copies, so
/// the next read simply falls through to the store.
#[derive(Debug, Clone)]
pub struct InMemoryCache {
    cache: MokaCache<String, String>,
}

impl InMemoryCache {
    pub fn new() -> Self {
        Self::with_config(InMemoryCacheConfig::default())
    }

    pub fn with_config(config: InMemoryCacheConfig) -> Self {
        Self {
            cache: MokaCache::builder()
                .max_capacity(config.max_capacity)
                .build(),
        }
    }
}

impl Default for InMemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Cache for InMemoryCache {
    async fn get_raw(&self, key: &str) -> Result<Option<String>, DomainError> {
        Ok(self.cache.get(key).await)
    }

    async fn set_raw(&self, key: &str, value: &str) -> Result<(), DomainError> {
        self.cache.insert(key.to_string(), value.to_string()).await;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, DomainError> {
        Ok(self.cache.remove(key).await.is_some())
    }

    async fn exists(&self, key: &str) -> Result<bool, DomainError> {
        Ok(self.cache.contains_key(key))
    }

    async fn ping(&self) -> Result<(), DomainError> {
        Ok(())
    }
}
