//! Storage factory for runtime storage selection

use std::sync::Arc;

use sqlx::postgres::PgPool;
use tracing::info;

use crate::domain::storage::{Storage, StorageEntity};
use crate::domain::DomainError;

use super::in_memory::InMemoryStorage;
use super::postgres::{PostgresConfig, PostgresStorage};

/// Supported storage types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageType {
    /// In-memory storage (for testing/development)
    InMemory,
    /// PostgreSQL storage
    Postgres,
}

impl StorageType {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "memory" | "inmemory" | "in-memory" | "in_memory" => Some(Self::InMemory),
            "postgres" | "postgresql" | "pg" => Some(Self::Postgres),
            _ => None,
        }
    }
}

/// Storage configuration
#[derive(Debug, Clone)]
pub enum StorageConfig {
    /// In-memory storage configuration
    InMemory,
    /// PostgreSQL storage configuration
    Postgres(PostgresConfig),
}

impl StorageConfig {
    pub fn in_memory() -> Self {
        Self::InMemory
    }

    pub fn postgres(config: PostgresConfig) -> Self {
        Self::Postgres(config)
    }

    pub fn postgres_url(url: impl Into<String>) -> Self {
        Self::Postgres(PostgresConfig::new(url))
    }

    pub fn storage_type(&self) -> StorageType {
        match self {
            Self::InMemory => StorageType::InMemory,
            Self::Postgres(_) => StorageType::Postgres,
        }
    }
}

/// Connected storage backend from which per-table stores are opened
///
/// PostgreSQL tables opened from the same backend share one pool.
#[derive(Debug, Clone)]
pub enum StorageFactory {
    InMemory,
    Postgres(PgPool),
}

impl StorageFactory {
    /// Connects to the configured backend
    pub async fn connect(config: &StorageConfig) -> Result<Self, DomainError> {
        match config {
            StorageConfig::InMemory => {
                info!("Using in-memory storage");
                Ok(Self::InMemory)
            }
            StorageConfig::Postgres(pg_config) => {
                info!("Connecting to PostgreSQL storage");
                Ok(Self::Postgres(pg_config.connect_pool().await?))
            }
        }
    }

    /// Opens a document store for `E` in `table_name`, creating the table if needed
    pub async fn create<E>(&self, table_name: &str) -> Result<Arc<dyn Storage<E>>, DomainError>
    where
        E: StorageEntity + 'static,
    {
        match self {
            Self::InMemory => Ok(Arc::new(InMemoryStorage::<E>::new())),
            Self::Postgres(pool) => {
                let storage = PostgresStorage::<E>::new(pool.clone(), table_name)?;
                storage.ensure_table().await?;
                Ok(Arc::new(storage))
            }
        }
    }

    /// The shared pool, when backed by PostgreSQL
    pub fn pool(&self) -> Option<&PgPool> {
        match self {
            Self::InMemory => None,
            Self::Postgres(pool) => Some(pool),
        }
    }

    pub fn storage_type(&self) -> StorageType {
        match self {
            Self::InMemory => StorageType::InMemory,
            Self::Postgres(_) => StorageType::Postgres,
        }
    }
}
