//! Access key services: directory, gate and remote access

mod cached_resolver;
mod directory;
mod gate;
mod generator;
mod rate_limiter;
mod remote;
mod responder;
mod storage_repository;

pub use cached_resolver::CachedAccessKeyResolver;
pub use directory::AccessKeyDirectory;
pub use gate::{AccessDenial, AccessGate, AccessGrant, GateOutcome};
pub use generator::AccessKeyGenerator;
pub use rate_limiter::{RateLimitResult, RateLimiter};
pub use remote::{patterns, RemoteDirectoryClient};
pub use responder::DirectoryResponder;
pub use storage_repository::StorageAccessKeyRepository;

/// Shared cache entry for a key, used by every process reading the cache
pub fn cache_key(key: &str) -> String {
    format!("access_key:{}", key)
}
