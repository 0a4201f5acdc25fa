//! Redis cache implementation

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};

use crate::domain::cache::Cache;
use crate::domain::DomainError;

/// Configuration for Redis cache
#[derive(Debug, Clone)]
pub struct RedisCacheConfig {
    /// Redis connection URL (e.g., "redis://127.0.0.1:6379")
    pub url: String,
    /// Key prefix for namespacing
    pub key_prefix: Option<String>,
    /// Connection timeout
    pub connection_timeout: Duration,
}

impl Default for RedisCacheConfig {
    fn default() -> Self {
        Self {
            url: "redis://127.0.0.1:6379".to_string(),
            key_prefix: None,
            connection_timeout: Duration::from_secs(5),
        }
    }
}

impl RedisCacheConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = Some(prefix.into());
        self
    }

    pub fn with_connection_timeout(mut self, timeout: Duration) -> Self {
        self.connection_timeout = timeout;
        self
    }

    fn prefix_key(&self, key: &str) -> String {
        match &self.key_prefix {
            Some(prefix) => format!("{}:{}", prefix, key),
            None => key.to_string(),
        }
    }
}

/// Redis cache shared between processes
///
/// Values are written with plain `SET` (no expiry). Invalidation is always
/// explicit through `DEL`.
#[derive(Clone)]
pub struct RedisCache {
    connection: ConnectionManager,
    config: RedisCacheConfig,
}

impl fmt::Debug for RedisCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisCache")
            .field("config", &self.config)
            .field("connection", &"<ConnectionManager>")
            .finish()
    }
}

impl RedisCache {
    /// Connects to Redis, bounded by the configured connection timeout
    pub async fn new(config: RedisCacheConfig) -> Result<Self, DomainError> {
        let client = Client::open(config.url.as_str())
            .map_err(|e| DomainError::cache(format!("Failed to create Redis client: {}", e)))?;

        let connection = tokio::time::timeout(
            config.connection_timeout,
            ConnectionManager::new(client),
        )
        .await
        .map_err(|_| DomainError::cache("Timed out connecting to Redis"))?
        .map_err(|e| DomainError::cache(format!("Failed to connect to Redis: {}", e)))?;

        Ok(Self { connection, config })
    }
}

#[async_trait]
impl Cache for RedisCache {
    async fn get_raw(&self, key: &str) -> Result<Option<String>, DomainError> {
        let mut conn = self.connection.clone();

        conn.get(self.config.prefix_key(key))
            .await
            .map_err(|e| DomainError::cache(format!("Failed to get key '{}': {}", key, e)))
    }

    async fn set_raw(&self, key: &str, value: &str) -> Result<(), DomainError> {
        let mut conn = self.connection.clone();

        conn.set::<_, _, ()>(self.config.prefix_key(key), value)
            .await
            .map_err(|e| DomainError::cache(format!("Failed to set key '{}': {}", key, e)))
    }

    async fn delete(&self, key: &str) -> Result<bool, DomainError> {
        let mut conn = self.connection.clone();

        let deleted: i64 = conn
            .del(self.config.prefix_key(key))
            .await
            .map_err(|e| DomainError::cache(format!("Failed to delete key '{}': {}", key, e)))?;

        Ok(deleted > 0)
    }

    async fn exists(&self, key: &str) -> Result<bool, DomainError> {
        let mut conn = self.connection.clone();

        conn.exists(self.config.prefix_key(key)).await.map_err(|e| {
            DomainError::cache(format!("Failed to check existence of key '{}': {}", key, e))
        })
    }

    async fn ping(&self) -> Result<(), DomainError> {
        let mut conn = self.connection.clone();

        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(|e| DomainError::cache(format!("Redis ping failed: {}", e)))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = RedisCacheConfig::default();
        assert_eq!(config.url, "redis://127.0.0.1:6379");
        assert!(config.key_prefix.is_none());
        assert_eq!(config.connection_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_prefix_key() {
        let plain = RedisCacheConfig::new("redis://localhost");
        assert_eq!(plain.prefix_key("access_key:k1"), "access_key:k1");

        let prefixed = plain.with_key_prefix("gate");
        assert_eq!(prefixed.prefix_key("access_key:k1"), "gate:access_key:k1");
    }
}
