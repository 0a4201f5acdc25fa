//! Domain layer - Core business logic and entities

pub mod access_key;
pub mod access_log;
pub mod cache;
pub mod error;
pub mod storage;
pub mod user;

pub use access_key::{
    AccessKey, AccessKeyFilter, AccessKeyPage, AccessKeyPatch, AccessKeyRepository,
    AccessKeyResolver, AccessKeyWithUser, NewAccessKey,
};
pub use access_log::{AccessLog, AccessLogId, AccessLogRepository};
pub use cache::{Cache, CacheExt};
pub use error::DomainError;
pub use storage::{Storage, StorageEntity, StorageKey};
pub use user::{User, UserRepository};
