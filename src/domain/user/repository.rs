//! User repository trait

use async_trait::async_trait;
use std::fmt::Debug;

use super::entity::User;
use crate::domain::DomainError;

/// Read access to the user directory
#[async_trait]
pub trait UserRepository: Send + Sync + Debug {
    /// Get a user by ID
    async fn get(&self, id: &str) -> Result<Option<User>, DomainError>;

    /// Get every user whose ID is in `ids`; unknown IDs are skipped
    async fn find_by_ids(&self, ids: &[String]) -> Result<Vec<User>, DomainError>;

    /// Create a new user
    async fn create(&self, user: User) -> Result<User, DomainError>;

    /// Check if a user ID exists
    async fn exists(&self, id: &str) -> Result<bool, DomainError> {
        Ok(self.get(id).await?.is_some())
    }
}
