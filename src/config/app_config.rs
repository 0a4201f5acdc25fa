use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use serde::Deserialize;

use crate::domain::user::User;
use crate::domain::DomainError;
use crate::infrastructure::auth::JwtConfig;
use crate::infrastructure::cache::{CacheConfig, CacheType};
use crate::infrastructure::observability::ObservabilityConfig;
use crate::infrastructure::storage::{PostgresConfig, StorageConfig};
use crate::infrastructure::transport::RedisTransportConfig;

/// Application configuration
///
/// Layered from `config/default.toml`, `config/local.toml` and `APP__*`
/// environment variables, in that order.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub storage: StorageSettings,
    pub cache: CacheSettings,
    pub transport: TransportSettings,
    pub gate: GateConfig,
    pub auth: AuthConfig,
    pub observability: ObservabilityConfig,
    /// Owners created at startup when missing
    pub users: Vec<SeedUser>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Memory,
    Postgres,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    pub backend: StorageBackend,
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    /// Per-key cap on rejected records the in-memory audit log keeps inside
    /// the rate limit window
    pub max_access_logs_per_key: usize,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    pub backend: String,
    pub url: String,
    pub key_prefix: Option<String>,
    pub max_capacity: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TransportBackend {
    #[default]
    InProcess,
    Redis,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TransportSettings {
    pub backend: TransportBackend,
    pub url: String,
    pub timeout_secs: u64,
}

/// Where the gate resolves keys
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DirectoryMode {
    #[default]
    Local,
    Remote,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GateConfig {
    pub directory: DirectoryMode,
    /// Cache remote lookups in the shared cache
    pub cache_remote_lookups: bool,
    pub rate_limit_window_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub jwt_secret: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SeedUser {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub email: String,
}

impl SeedUser {
    pub fn to_user(&self) -> User {
        User::new(&self.id, &self.name, &self.email)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::default(),
        }
    }
}

impl Default for StorageSettings {
    fn default() -> Self {
        let postgres = PostgresConfig::default();
        Self {
            backend: StorageBackend::default(),
            url: postgres.url,
            max_connections: postgres.max_connections,
            min_connections: postgres.min_connections,
            max_access_logs_per_key: 100_000,
        }
    }
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            backend: "memory".to_string(),
            url: "redis://127.0.0.1:6379".to_string(),
            key_prefix: None,
            max_capacity: 10_000,
        }
    }
}

impl Default for TransportSettings {
    fn default() -> Self {
        Self {
            backend: TransportBackend::default(),
            url: "redis://127.0.0.1:6379".to_string(),
            timeout_secs: 10,
        }
    }
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            directory: DirectoryMode::default(),
            cache_remote_lookups: false,
            rate_limit_window_secs: 60,
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: JwtConfig::default().secret,
        }
    }
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, DomainError> {
        let ip: IpAddr = self.host.parse().map_err(|e| {
            DomainError::configuration(format!("Invalid server host '{}': {}", self.host, e))
        })?;
        Ok(SocketAddr::from((ip, self.port)))
    }
}

impl StorageSettings {
    pub fn to_storage_config(&self) -> StorageConfig {
        match self.backend {
            StorageBackend::Memory => StorageConfig::in_memory(),
            StorageBackend::Postgres => StorageConfig::postgres(
                PostgresConfig::new(&self.url)
                    .with_max_connections(self.max_connections)
                    .with_min_connections(self.min_connections),
            ),
        }
    }
}

impl CacheSettings {
    pub fn to_cache_config(&self) -> Result<CacheConfig, DomainError> {
        let cache_type: CacheType = self.backend.parse()?;

        Ok(CacheConfig {
            cache_type,
            redis_url: Some(self.url.clone()),
            key_prefix: self.key_prefix.clone(),
            max_capacity: Some(self.max_capacity),
        })
    }
}

impl TransportSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn redis_config(&self) -> RedisTransportConfig {
        RedisTransportConfig::new(&self.url)
    }
}

impl GateConfig {
    pub fn rate_limit_window(&self) -> chrono::Duration {
        chrono::Duration::seconds(i64::try_from(self.rate_limit_window_secs).unwrap_or(60))
    }
}

impl AuthConfig {
    pub fn jwt_config(&self) -> JwtConfig {
        JwtConfig::new(&self.jwt_secret)
    }
}

impl AppConfig {
    pub fn load() -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name("config/local").required(false))
            .add_source(
                config::Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}
