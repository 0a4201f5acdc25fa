//! Cache-first resolver decorator

use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use crate::domain::access_key::{AccessKey, AccessKeyResolver};
use crate::domain::cache::{Cache, CacheExt};
use crate::domain::DomainError;

use super::cache_key;

/// Consults the shared cache before delegating to the wrapped resolver
///
/// Only hits are cached. Misses are always forwarded so a freshly created key
/// is visible immediately.
#[derive(Debug, Clone)]
pub struct CachedAccessKeyResolver {
    inner: Arc<dyn AccessKeyResolver>,
    cache: Arc<dyn Cache>,
}

impl CachedAccessKeyResolver {
    pub fn new(inner: Arc<dyn AccessKeyResolver>, cache: Arc<dyn Cache>) -> Self {
        Self { inner, cache }
    }
}

#[async_trait]
impl AccessKeyResolver for CachedAccessKeyResolver {
    async fn find_by_key(&self, key: &str) -> Result<Option<AccessKey>, DomainError> {
        let cache_key = cache_key(key);

        match self.cache.get::<AccessKey>(&cache_key).await {
            Ok(Some(cached)) => return Ok(Some(cached)),
            Ok(None) => {}
            Err(e) => warn!("Access key cache read failed: {}", e),
        }

        let found = self.inner.find_by_key(key).await?;

        if let Some(ref access_key) = found {
            if let Err(e) = self.cache.set(&cache_key, access_key).await {
                warn!("Failed to cache resolved access key: {}", e);
            }
        }

        Ok(found)
    }
}
