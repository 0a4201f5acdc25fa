//! Access key directory
//!
//! Owns the authoritative lifecycle of access key records. Every mutation
//! writes the store first and only then touches the cache, so the cache never
//! holds a value the store has not committed.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::domain::access_key::{
    AccessKey, AccessKeyFilter, AccessKeyPage, AccessKeyPatch, AccessKeyRepository,
    AccessKeyResolver, AccessKeyWithUser, NewAccessKey,
};
use crate::domain::cache::{Cache, CacheExt};
use crate::domain::user::UserRepository;
use crate::domain::DomainError;

use super::cache_key;
use super::generator::AccessKeyGenerator;

/// Authoritative access key CRUD with a coherent cache
#[derive(Debug)]
pub struct AccessKeyDirectory {
    repository: Arc<dyn AccessKeyRepository>,
    users: Arc<dyn UserRepository>,
    cache: Arc<dyn Cache>,
    generator: AccessKeyGenerator,
}

impl AccessKeyDirectory {
    pub fn new(
        repository: Arc<dyn AccessKeyRepository>,
        users: Arc<dyn UserRepository>,
        cache: Arc<dyn Cache>,
    ) -> Self {
        Self {
            repository,
            users,
            cache,
            generator: AccessKeyGenerator::default(),
        }
    }

    pub fn with_generator(mut self, generator: AccessKeyGenerator) -> Self {
        self.generator = generator;
        self
    }

    /// Create a key for an existing user and prime the cache with it
    pub async fn create(&self, command: NewAccessKey) -> Result<AccessKey, DomainError> {
        if !self.users.exists(&command.user_id).await? {
            return Err(DomainError::not_found("User not found to create access key"));
        }

        let key = command.key.unwrap_or_else(|| self.generator.generate());
        let access_key = AccessKey::new(key, command.user_id)
            .with_rate_limit(command.rate_limit)
            .with_expires_at(command.expires_at)
            .with_disabled(command.disabled);

        let created = self.repository.create(access_key).await?;
        self.write_through(&created).await?;

        info!(
            "Access key created: user_id={}, rate_limit={}",
            created.user_id(),
            created.rate_limit()
        );

        Ok(created)
    }

    /// Apply a patch; an unchanged record is returned without any write
    pub async fn update(&self, key: &str, patch: AccessKeyPatch) -> Result<AccessKey, DomainError> {
        let current = self
            .repository
            .get(key)
            .await?
            .ok_or_else(|| DomainError::not_found("Access key not found"))?;

        let mut updated = current.clone();
        if !updated.apply(&patch) {
            debug!("Access key update is a no-op, skipping write");
            return Ok(current);
        }

        let saved = self.repository.update(&updated).await?;
        self.write_through(&saved).await?;

        info!(
            "Access key updated: rate_limit={}, disabled={}",
            saved.rate_limit(),
            saved.is_disabled()
        );

        Ok(saved)
    }

    /// Enable or disable a key; requesting the current state writes nothing
    pub async fn change_status(&self, key: &str, disabled: bool) -> Result<AccessKey, DomainError> {
        self.update(key, AccessKeyPatch::new().with_disabled(disabled))
            .await
    }

    /// Remove a key from the store and evict its cached copy
    ///
    /// Eviction runs even when the store had nothing to delete. The call only
    /// reports `NotFound` when neither the store nor the cache held the key.
    pub async fn delete(&self, key: &str) -> Result<(), DomainError> {
        let removed = self.repository.delete(key).await?;
        let evicted = self.cache.delete(&cache_key(key)).await?;

        if !removed && !evicted {
            return Err(DomainError::not_found("Access key not found"));
        }

        if !removed {
            warn!("Evicted a cached access key that was missing from the store");
        }

        info!("Access key deleted");
        Ok(())
    }

    /// Cache-first lookup, populating the cache on a store hit
    ///
    /// Cache failures degrade to a store read; the store stays authoritative.
    pub async fn find_by_key(&self, key: &str) -> Result<Option<AccessKey>, DomainError> {
        let cache_key = cache_key(key);

        match self.cache.get::<AccessKey>(&cache_key).await {
            Ok(Some(cached)) => return Ok(Some(cached)),
            Ok(None) => {}
            Err(e) => warn!("Access key cache read failed, falling back to store: {}", e),
        }

        let Some(access_key) = self.repository.get(key).await? else {
            return Ok(None);
        };

        if let Err(e) = self.cache.set(&cache_key, &access_key).await {
            warn!("Failed to populate access key cache: {}", e);
        }

        Ok(Some(access_key))
    }

    /// Read a key straight from the store
    pub async fn get(&self, key: &str) -> Result<AccessKey, DomainError> {
        self.repository
            .get(key)
            .await?
            .ok_or_else(|| DomainError::not_found("Access key not found"))
    }

    /// List keys with owner enrichment
    ///
    /// `count` comes from a separate count query only when a page was
    /// requested; otherwise the listing is complete and its length is exact.
    pub async fn find(&self, filter: &AccessKeyFilter) -> Result<AccessKeyPage, DomainError> {
        let records = self.repository.list(filter).await?;

        let count = if filter.is_paginated() {
            self.repository.count(filter).await?
        } else {
            records.len()
        };

        let user_ids: Vec<String> = records
            .iter()
            .map(|k| k.user_id().to_string())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let owners = match self.users.find_by_ids(&user_ids).await {
            Ok(users) => users
                .into_iter()
                .map(|u| (u.id().to_string(), u))
                .collect::<HashMap<_, _>>(),
            Err(e) => {
                warn!("Failed to load access key owners: {}", e);
                HashMap::new()
            }
        };

        let access_keys = records
            .into_iter()
            .map(|access_key| {
                let user = owners.get(access_key.user_id()).cloned();
                AccessKeyWithUser { access_key, user }
            })
            .collect();

        Ok(AccessKeyPage { count, access_keys })
    }

    /// Verify the store and cache are reachable
    pub async fn ping(&self) -> Result<(), DomainError> {
        self.repository.ping().await?;
        self.cache.ping().await
    }

    /// Overwrite the cached copy after a committed store write
    ///
    /// If the overwrite fails the stale entry is evicted instead; only when
    /// that also fails is the error surfaced.
    async fn write_through(&self, access_key: &AccessKey) -> Result<(), DomainError> {
        let cache_key = cache_key(access_key.key());

        if let Err(e) = self.cache.set(&cache_key, access_key).await {
            warn!("Failed to refresh access key cache, evicting: {}", e);
            self.cache.delete(&cache_key).await?;
        }

        Ok(())
    }
}

#[async_trait]
impl AccessKeyResolver for AccessKeyDirectory {
    async fn find_by_key(&self, key: &str) -> Result<Option<AccessKey>, DomainError> {
        AccessKeyDirectory::find_by_key(self, key).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::access_key::MockAccessKeyRepository;
    use crate::domain::cache::MockCache;
    use crate::domain::user::User;
    use crate::infrastructure::storage::InMemoryStorage;
    use crate::infrastructure::user::StorageUserRepository;
    use chrono::{Duration, Utc};

    struct Fixture {
        repository: Arc<MockAccessKeyRepository>,
        cache: Arc<MockCache>,
        directory: AccessKeyDirectory,
    }

    async fn fixture_with(keys: Vec<AccessKey>) -> Fixture {
        let mut repository = MockAccessKeyRepository::new();
        for key in keys {
            repository = repository.with_key(key).await;
        }
        let repository = Arc::new(repository);
        let cache = Arc::new(MockCache::new());
        let users = Arc::new(StorageUserRepository::new(Arc::new(
            InMemoryStorage::with_entities(vec![User::new("u1", "Ada", "ada@example.com")]),
        )));

        let directory = AccessKeyDirectory::new(repository.clone(), users, cache.clone());

        Fixture {
            repository,
            cache,
            directory,
        }
    }

    async fn fixture() -> Fixture {
        fixture_with(vec![AccessKey::new("k1", "u1").with_rate_limit(10)]).await
    }

    #[tokio::test]
    async fn test_create_generates_key_and_primes_cache() {
        let f = fixture_with(vec![]).await;

        let created = f
            .directory
            .create(NewAccessKey::new("u1", 5))
            .await
            .unwrap();

        assert!(created.key().starts_with("ak_"));
        assert_eq!(created.rate_limit(), 5);
        assert!(f.cache.contains(&cache_key(created.key())));
    }

    #[tokio::test]
    async fn test_create_keeps_supplied_key() {
        let f = fixture_with(vec![]).await;

        let created = f
            .directory
            .create(NewAccessKey::new("u1", 5).with_key("custom"))
            .await
            .unwrap();

        assert_eq!(created.key(), "custom");
    }

    #[tokio::test]
    async fn test_create_requires_existing_user() {
        let f = fixture_with(vec![]).await;

        let result = f.directory.create(NewAccessKey::new("ghost", 5)).await;

        match result {
            Err(DomainError::NotFound { message }) => {
                assert_eq!(message, "User not found to create access key")
            }
            other => panic!("Expected NotFound, got {:?}", other),
        }
        assert_eq!(f.repository.writes(), 0);
        assert_eq!(f.cache.sets(), 0);
    }

    #[tokio::test]
    async fn test_update_missing_key() {
        let f = fixture().await;

        let result = f
            .directory
            .update("nope", AccessKeyPatch::new().with_rate_limit(1))
            .await;

        assert!(matches!(result, Err(DomainError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_update_same_values_writes_nothing() {
        let f = fixture().await;

        let result = f
            .directory
            .update(
                "k1",
                AccessKeyPatch::new().with_rate_limit(10).with_disabled(false),
            )
            .await
            .unwrap();

        assert_eq!(result.rate_limit(), 10);
        assert_eq!(f.repository.writes(), 0);
        assert_eq!(f.cache.sets(), 0);
    }

    #[tokio::test]
    async fn test_update_visible_from_cold_cache() {
        let f = fixture().await;
        let expiry = Utc::now() + Duration::days(7);

        f.directory
            .update(
                "k1",
                AccessKeyPatch::new()
                    .with_rate_limit(42)
                    .with_expires_at(Some(expiry)),
            )
            .await
            .unwrap();

        // Drop the refreshed entry so the next read comes from the store
        f.cache.delete(&cache_key("k1")).await.unwrap();

        let found = f.directory.find_by_key("k1").await.unwrap().unwrap();
        assert_eq!(found.rate_limit(), 42);
        assert_eq!(found.expires_at(), Some(expiry));
    }

    #[tokio::test]
    async fn test_update_refreshes_warm_cache() {
        let f = fixture().await;
        f.directory.find_by_key("k1").await.unwrap();

        f.directory
            .update("k1", AccessKeyPatch::new().with_rate_limit(3))
            .await
            .unwrap();

        let cached: AccessKey = f.cache.get(&cache_key("k1")).await.unwrap().unwrap();
        assert_eq!(cached.rate_limit(), 3);
    }

    #[tokio::test]
    async fn test_update_store_failure_leaves_cache_untouched() {
        let f = fixture().await;
        f.directory.find_by_key("k1").await.unwrap();
        let sets_before = f.cache.sets();
        f.repository.set_should_fail(true).await;

        let result = f
            .directory
            .update("k1", AccessKeyPatch::new().with_rate_limit(99))
            .await;

        assert!(matches!(result, Err(DomainError::Storage { .. })));
        assert_eq!(f.cache.sets(), sets_before);

        let cached: AccessKey = f.cache.get(&cache_key("k1")).await.unwrap().unwrap();
        assert_eq!(cached.rate_limit(), 10);
    }

    #[tokio::test]
    async fn test_change_status_same_value_is_noop() {
        let f = fixture().await;

        let result = f.directory.change_status("k1", false).await.unwrap();

        assert!(!result.is_disabled());
        assert_eq!(f.repository.writes(), 0);
        assert_eq!(f.cache.sets(), 0);
    }

    #[tokio::test]
    async fn test_change_status_disables() {
        let f = fixture().await;

        let result = f.directory.change_status("k1", true).await.unwrap();

        assert!(result.is_disabled());
        assert_eq!(f.repository.writes(), 1);
        assert_eq!(f.cache.sets(), 1);
        assert!(f.directory.get("k1").await.unwrap().is_disabled());
    }

    #[tokio::test]
    async fn test_delete_evicts_warm_cache() {
        let f = fixture().await;
        f.directory.find_by_key("k1").await.unwrap();
        assert!(f.cache.contains(&cache_key("k1")));

        f.directory.delete("k1").await.unwrap();

        assert!(!f.cache.contains(&cache_key("k1")));
        assert!(f.directory.find_by_key("k1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_evicts_even_when_store_has_nothing() {
        let f = fixture_with(vec![]).await;
        let stale = serde_json::to_string(&AccessKey::new("ghost", "u1")).unwrap();
        f.cache.seed(&cache_key("ghost"), &stale);

        f.directory.delete("ghost").await.unwrap();

        assert_eq!(f.cache.deletes(), 1);
        assert!(!f.cache.contains(&cache_key("ghost")));
    }

    #[tokio::test]
    async fn test_delete_unknown_key() {
        let f = fixture().await;

        let result = f.directory.delete("nope").await;

        assert!(matches!(result, Err(DomainError::NotFound { .. })));
        assert_eq!(f.cache.deletes(), 1);
    }

    #[tokio::test]
    async fn test_find_by_key_populates_cache_on_miss_only() {
        let f = fixture().await;

        let first = f.directory.find_by_key("k1").await.unwrap();
        assert!(first.is_some());
        assert_eq!(f.cache.sets(), 1);

        let second = f.directory.find_by_key("k1").await.unwrap();
        assert_eq!(first, second);
        assert_eq!(f.cache.sets(), 1);
    }

    #[tokio::test]
    async fn test_find_by_key_miss_caches_nothing() {
        let f = fixture().await;

        assert!(f.directory.find_by_key("nope").await.unwrap().is_none());
        assert_eq!(f.cache.sets(), 0);
    }

    #[tokio::test]
    async fn test_find_by_key_survives_cache_outage() {
        let f = fixture().await;
        f.cache.set_should_fail(true);

        let found = f.directory.find_by_key("k1").await.unwrap();
        assert_eq!(found.unwrap().key(), "k1");
    }

    #[tokio::test]
    async fn test_find_enriches_with_owner() {
        let f = fixture_with(vec![
            AccessKey::new("k1", "u1"),
            AccessKey::new("k2", "orphan"),
        ])
        .await;

        let page = f.directory.find(&AccessKeyFilter::new()).await.unwrap();

        assert_eq!(page.count, 2);
        for entry in &page.access_keys {
            match entry.access_key.user_id() {
                "u1" => assert_eq!(entry.user.as_ref().unwrap().name(), "Ada"),
                _ => assert!(entry.user.is_none()),
            }
        }
    }

    #[tokio::test]
    async fn test_find_paginated_counts_filtered_set() {
        let f = fixture_with(vec![
            AccessKey::new("k1", "u1"),
            AccessKey::new("k2", "u1"),
            AccessKey::new("k3", "u1").with_disabled(true),
        ])
        .await;

        let page = f
            .directory
            .find(&AccessKeyFilter::new().with_disabled(false).with_limit(1))
            .await
            .unwrap();

        assert_eq!(page.count, 2);
        assert_eq!(page.access_keys.len(), 1);
    }

    #[tokio::test]
    async fn test_ping_reports_store_failure() {
        let f = fixture().await;
        f.directory.ping().await.unwrap();

        f.repository.set_should_fail(true).await;
        let result = f.directory.ping().await;

        assert!(matches!(result, Err(DomainError::Storage { .. })));
    }
}
