//! Application configuration

mod app_config;

pub use app_config::{
    AppConfig, AuthConfig, CacheSettings, DirectoryMode, GateConfig, LogFormat, LoggingConfig,
    SeedUser, ServerConfig, StorageBackend, StorageSettings, TransportBackend, TransportSettings,
};
