//! Access key repository traits

use async_trait::async_trait;
use std::fmt::Debug;

use super::entity::{AccessKey, AccessKeyFilter};
use crate::domain::DomainError;

/// Authoritative store of access key records
#[async_trait]
pub trait AccessKeyRepository: Send + Sync + Debug {
    /// Get an access key by its key string
    async fn get(&self, key: &str) -> Result<Option<AccessKey>, DomainError>;

    /// Create a new access key, fails with `Conflict` if the key is taken
    async fn create(&self, access_key: AccessKey) -> Result<AccessKey, DomainError>;

    /// Replace an existing access key
    async fn update(&self, access_key: &AccessKey) -> Result<AccessKey, DomainError>;

    /// Delete an access key, returns true if a record was removed
    async fn delete(&self, key: &str) -> Result<bool, DomainError>;

    /// List access keys matching the filter, honouring `limit`/`skip`
    async fn list(&self, filter: &AccessKeyFilter) -> Result<Vec<AccessKey>, DomainError>;

    /// Count access keys matching the filter, ignoring pagination
    async fn count(&self, filter: &AccessKeyFilter) -> Result<usize, DomainError>;

    /// Cheap reachability check for readiness; must not scan the table
    async fn ping(&self) -> Result<(), DomainError>;
}

/// Resolves a presented key string to its record
///
/// Implemented by the local directory, by the message-channel client and by
/// the caching decorator; the gate only depends on this trait.
#[async_trait]
pub trait AccessKeyResolver: Send + Sync + Debug {
    async fn find_by_key(&self, key: &str) -> Result<Option<AccessKey>, DomainError>;
}
