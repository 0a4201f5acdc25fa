//! Storage-backed access key repository implementation

use async_trait::async_trait;
use std::sync::Arc;

use crate::domain::access_key::{AccessKey, AccessKeyFilter, AccessKeyRepository};
use crate::domain::storage::Storage;
use crate::domain::DomainError;

/// Storage-backed implementation of AccessKeyRepository
///
/// Filtering and pagination run over the full document list, ordered by
/// creation time so that `skip`/`limit` pages are stable.
#[derive(Debug)]
pub struct StorageAccessKeyRepository {
    storage: Arc<dyn Storage<AccessKey>>,
}

impl StorageAccessKeyRepository {
    pub fn new(storage: Arc<dyn Storage<AccessKey>>) -> Self {
        Self { storage }
    }

    async fn filtered(&self, filter: &AccessKeyFilter) -> Result<Vec<AccessKey>, DomainError> {
        let mut matching: Vec<AccessKey> = self
            .storage
            .list()
            .await?
            .into_iter()
            .filter(|k| filter.matches(k))
            .collect();

        matching.sort_by(|a, b| {
            a.created_at()
                .cmp(&b.created_at())
                .then_with(|| a.key().cmp(b.key()))
        });

        Ok(matching)
    }
}

#[async_trait]
impl AccessKeyRepository for StorageAccessKeyRepository {
    async fn get(&self, key: &str) -> Result<Option<AccessKey>, DomainError> {
        self.storage.get(&key.to_string()).await
    }

    async fn create(&self, access_key: AccessKey) -> Result<AccessKey, DomainError> {
        self.storage.create(access_key).await
    }

    async fn update(&self, access_key: &AccessKey) -> Result<AccessKey, DomainError> {
        self.storage.update(access_key.clone()).await
    }

    async fn delete(&self, key: &str) -> Result<bool, DomainError> {
        self.storage.delete(&key.to_string()).await
    }

    async fn list(&self, filter: &AccessKeyFilter) -> Result<Vec<AccessKey>, DomainError> {
        let skip = filter.skip.unwrap_or(0);
        let limit = filter.limit.unwrap_or(usize::MAX);

        Ok(self
            .filtered(filter)
            .await?
            .into_iter()
            .skip(skip)
            .take(limit)
            .collect())
    }

    async fn count(&self, filter: &AccessKeyFilter) -> Result<usize, DomainError> {
        Ok(self.filtered(filter).await?.len())
    }

    async fn ping(&self) -> Result<(), DomainError> {
        self.storage.count().await.map(|_| ())
    }
}
