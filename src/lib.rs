//! Access Gate
//!
//! Access key management and enforcement for protected HTTP APIs:
//! - A directory that owns access keys (admin CRUD, cache-aside reads)
//! - A gate that validates presented keys and applies per-key rate limits
//! - A request/reply transport between the two (Redis pub/sub or in-process)

pub mod api;
pub mod cli;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use config::AppConfig;

use std::sync::Arc;

use domain::access_key::{AccessKey, AccessKeyResolver};
use domain::access_log::AccessLogRepository;
use domain::cache::Cache;
use domain::storage::Storage;
use domain::user::{User, UserRepository};
use infrastructure::access_key::{
    AccessGate, AccessKeyDirectory, CachedAccessKeyResolver, RateLimiter,
    RemoteDirectoryClient, StorageAccessKeyRepository,
};
use infrastructure::access_log::{InMemoryAccessLogRepository, PostgresAccessLogRepository};
use infrastructure::cache::{CacheFactory, CacheType};
use infrastructure::storage::StorageFactory;
use infrastructure::transport::MessageTransport;
use infrastructure::user::StorageUserRepository;
use tracing::{info, warn};

/// Shared backends every process mode opens
#[derive(Debug, Clone)]
pub struct Backends {
    pub storage: StorageFactory,
    pub cache: Arc<dyn Cache>,
    pub cache_type: CacheType,
    pub access_logs: Arc<dyn AccessLogRepository>,
}

/// Connect storage, cache and the audit log from configuration
pub async fn connect_backends(config: &AppConfig) -> anyhow::Result<Backends> {
    let storage = StorageFactory::connect(&config.storage.to_storage_config()).await?;
    info!("Storage backend: {:?}", storage.storage_type());

    let cache_config = config.cache.to_cache_config()?;
    let cache = CacheFactory::create(&cache_config).await?;

    let access_logs: Arc<dyn AccessLogRepository> = match storage.pool() {
        Some(pool) => {
            let repository = PostgresAccessLogRepository::new(pool.clone());
            repository.ensure_table().await?;
            Arc::new(repository)
        }
        None => Arc::new(
            InMemoryAccessLogRepository::new(config.storage.max_access_logs_per_key)
                .with_retention(config.gate.rate_limit_window()),
        ),
    };

    Ok(Backends {
        storage,
        cache,
        cache_type: cache_config.cache_type,
        access_logs,
    })
}

/// Open the key and user stores and build the directory over them
pub async fn create_directory(
    config: &AppConfig,
    backends: &Backends,
) -> anyhow::Result<Arc<AccessKeyDirectory>> {
    let keys: Arc<dyn Storage<AccessKey>> = backends.storage.create("access_keys").await?;
    let users: Arc<dyn Storage<User>> = backends.storage.create("users").await?;
    let users = Arc::new(StorageUserRepository::new(users));

    seed_users(config, users.as_ref()).await?;

    Ok(Arc::new(AccessKeyDirectory::new(
        Arc::new(StorageAccessKeyRepository::new(keys)),
        users,
        backends.cache.clone(),
    )))
}

async fn seed_users(config: &AppConfig, users: &dyn UserRepository) -> anyhow::Result<()> {
    for seed in &config.users {
        if users.exists(&seed.id).await? {
            continue;
        }

        users.create(seed.to_user()).await?;
        info!("Seeded user: user_id={}", seed.id);
    }

    Ok(())
}

/// Resolver that asks the directory over `transport`, optionally through the cache
pub fn create_remote_resolver(
    config: &AppConfig,
    backends: &Backends,
    transport: Arc<dyn MessageTransport>,
) -> Arc<dyn AccessKeyResolver> {
    let client = Arc::new(
        RemoteDirectoryClient::new(transport).with_timeout(config.transport.timeout()),
    );

    if !config.gate.cache_remote_lookups {
        return client;
    }

    if backends.cache_type == CacheType::InMemory {
        warn!("Caching remote lookups in a process-local cache; directory writes will not evict it");
    }

    Arc::new(CachedAccessKeyResolver::new(client, backends.cache.clone()))
}

/// Gate over `resolver` using the shared audit log
pub fn create_gate(
    config: &AppConfig,
    backends: &Backends,
    resolver: Arc<dyn AccessKeyResolver>,
) -> Arc<AccessGate> {
    let rate_limiter = RateLimiter::new(backends.access_logs.clone())
        .with_window(config.gate.rate_limit_window());

    Arc::new(AccessGate::new(
        resolver,
        rate_limiter,
        backends.access_logs.clone(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SeedUser;
    use crate::domain::access_key::NewAccessKey;

    fn config_with_users() -> AppConfig {
        AppConfig {
            users: vec![SeedUser {
                id: "u1".to_string(),
                name: "Ada".to_string(),
                email: "ada@example.com".to_string(),
            }],
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_in_memory_backends() {
        let backends = connect_backends(&AppConfig::default()).await.unwrap();

        assert!(backends.storage.pool().is_none());
        assert_eq!(backends.cache_type, CacheType::InMemory);
    }

    #[tokio::test]
    async fn test_directory_accepts_keys_for_seeded_users() {
        let config = config_with_users();
        let backends = connect_backends(&config).await.unwrap();
        let directory = create_directory(&config, &backends).await.unwrap();

        let created = directory
            .create(NewAccessKey::new("u1", 10))
            .await
            .unwrap();

        assert_eq!(created.user_id(), "u1");
    }

    #[tokio::test]
    async fn test_local_gate_resolves_directory_keys() {
        let config = config_with_users();
        let backends = connect_backends(&config).await.unwrap();
        let directory = create_directory(&config, &backends).await.unwrap();
        let created = directory
            .create(NewAccessKey::new("u1", 10))
            .await
            .unwrap();

        let gate = create_gate(&config, &backends, directory);
        let grant = gate.check(Some(created.key())).await.unwrap();

        assert_eq!(grant.access_key.key(), created.key());
    }
}
