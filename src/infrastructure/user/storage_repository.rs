//! Storage-backed user repository implementation

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;

use crate::domain::storage::Storage;
use crate::domain::user::{User, UserRepository};
use crate::domain::DomainError;

/// Storage-backed implementation of UserRepository
#[derive(Debug)]
pub struct StorageUserRepository {
    storage: Arc<dyn Storage<User>>,
}

impl StorageUserRepository {
    pub fn new(storage: Arc<dyn Storage<User>>) -> Self {
        Self { storage }
    }
}

#[async_trait]
impl UserRepository for StorageUserRepository {
    async fn get(&self, id: &str) -> Result<Option<User>, DomainError> {
        self.storage.get(&id.to_string()).await
    }

    async fn find_by_ids(&self, ids: &[String]) -> Result<Vec<User>, DomainError> {
        let unique: Vec<String> = ids
            .iter()
            .collect::<HashSet<_>>()
            .into_iter()
            .cloned()
            .collect();

        self.storage.get_many(&unique).await
    }

    async fn create(&self, user: User) -> Result<User, DomainError> {
        self.storage.create(user).await
    }

    async fn exists(&self, id: &str) -> Result<bool, DomainError> {
        self.storage.exists(&id.to_string()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::storage::InMemoryStorage;

    fn repository() -> StorageUserRepository {
        StorageUserRepository::new(Arc::new(InMemoryStorage::with_entities(vec![
            User::new("u1", "Ada", "ada@example.com"),
            User::new("u2", "Grace", "grace@example.com"),
        ])))
    }

    #[tokio::test]
    async fn test_get_and_exists() {
        let repo = repository();

        assert_eq!(repo.get("u1").await.unwrap().unwrap().name(), "Ada");
        assert!(repo.exists("u2").await.unwrap());
        assert!(!repo.exists("u3").await.unwrap());
    }

    #[tokio::test]
    async fn test_find_by_ids_skips_unknown() {
        let repo = repository();

        let mut users = repo
            .find_by_ids(&["u2".to_string(), "missing".to_string()])
            .await
            .unwrap();
        users.sort_by(|a, b| a.id().cmp(b.id()));

        assert_eq!(users.len(), 1);
        assert_eq!(users[0].id(), "u2");
    }

    #[tokio::test]
    async fn test_find_by_ids_empty() {
        assert!(repository().find_by_ids(&[]).await.unwrap().is_empty());
    }
}
