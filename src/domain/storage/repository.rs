//! Storage trait definition

use std::fmt::Debug;

use async_trait::async_trait;

use crate::domain::DomainError;

use super::entity::{StorageEntity, StorageKey};

/// Generic document storage with per-document atomicity and no transactions
#[async_trait]
pub trait Storage<E>: Send + Sync + Debug
where
    E: StorageEntity + 'static,
{
    /// Retrieves an entity by its key
    async fn get(&self, key: &E::Key) -> Result<Option<E>, DomainError>;

    /// Retrieves the entities for `keys`, skipping unknown keys
    async fn get_many(&self, keys: &[E::Key]) -> Result<Vec<E>, DomainError> {
        let mut found = Vec::with_capacity(keys.len());
        for key in keys {
            if let Some(entity) = self.get(key).await? {
                found.push(entity);
            }
        }
        Ok(found)
    }

    /// Retrieves all entities
    async fn list(&self) -> Result<Vec<E>, DomainError>;

    /// Creates a new entity, returns error if already exists
    async fn create(&self, entity: E) -> Result<E, DomainError>;

    /// Updates an existing entity, returns error if not found
    async fn update(&self, entity: E) -> Result<E, DomainError>;

    /// Deletes an entity by its key, returns true if deleted
    async fn delete(&self, key: &E::Key) -> Result<bool, DomainError>;

    /// Checks if an entity exists by its key
    async fn exists(&self, key: &E::Key) -> Result<bool, DomainError> {
        Ok(self.get(key).await?.is_some())
    }

    /// Returns the count of entities
    async fn count(&self) -> Result<usize, DomainError> {
        Ok(self.list().await?.len())
    }
}

#[cfg(test)]
pub mod mock {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Mock storage that counts writes, for asserting short-circuit behaviour
    #[derive(Debug)]
    pub struct MockStorage<E>
    where
        E: StorageEntity,
    {
        entities: Mutex<HashMap<String, E>>,
        error: Mutex<Option<String>>,
        writes: AtomicUsize,
        lists: AtomicUsize,
    }

    impl<E> Default for MockStorage<E>
    where
        E: StorageEntity,
    {
        fn default() -> Self {
            Self::new()
        }
    }

    impl<E> MockStorage<E>
    where
        E: StorageEntity,
    {
        pub fn new() -> Self {
            Self {
                entities: Mutex::new(HashMap::new()),
                error: Mutex::new(None),
                writes: AtomicUsize::new(0),
                lists: AtomicUsize::new(0),
            }
        }

        pub fn with_entity(self, entity: E) -> Self {
            self.entities
                .lock()
                .unwrap()
                .insert(entity.key().as_str().to_string(), entity);
            self
        }

        pub fn set_error(&self, error: Option<&str>) {
            *self.error.lock().unwrap() = error.map(String::from);
        }

        /// Number of create/update/delete calls that reached the mock
        pub fn writes(&self) -> usize {
            self.writes.load(Ordering::SeqCst)
        }

        /// Number of full-table `list` calls
        pub fn lists(&self) -> usize {
            self.lists.load(Ordering::SeqCst)
        }

        fn check_error(&self) -> Result<(), DomainError> {
            if let Some(error) = self.error.lock().unwrap().clone() {
                return Err(DomainError::storage(error));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl<E> Storage<E> for MockStorage<E>
    where
        E: StorageEntity + 'static,
    {
        async fn get(&self, key: &E::Key) -> Result<Option<E>, DomainError> {
            self.check_error()?;
            Ok(self.entities.lock().unwrap().get(key.as_str()).cloned())
        }

        async fn list(&self) -> Result<Vec<E>, DomainError> {
            self.check_error()?;
            self.lists.fetch_add(1, Ordering::SeqCst);
            Ok(self.entities.lock().unwrap().values().cloned().collect())
        }

        async fn create(&self, entity: E) -> Result<E, DomainError> {
            self.check_error()?;
            self.writes.fetch_add(1, Ordering::SeqCst);
            let key = entity.key().as_str().to_string();
            let mut entities = self.entities.lock().unwrap();

            if entities.contains_key(&key) {
                return Err(DomainError::conflict(format!(
                    "Entity with key '{}' already exists",
                    key
                )));
            }

            entities.insert(key, entity.clone());
            Ok(entity)
        }

        async fn update(&self, entity: E) -> Result<E, DomainError> {
            self.check_error()?;
            self.writes.fetch_add(1, Ordering::SeqCst);
            let key = entity.key().as_str().to_string();
            let mut entities = self.entities.lock().unwrap();

            if !entities.contains_key(&key) {
                return Err(DomainError::not_found(format!(
                    "Entity with key '{}' not found",
                    key
                )));
            }

            entities.insert(key, entity.clone());
            Ok(entity)
        }

        async fn delete(&self, key: &E::Key) -> Result<bool, DomainError> {
            self.check_error()?;
            self.writes.fetch_add(1, Ordering::SeqCst);
            Ok(self.entities.lock().unwrap().remove(key.as_str()).is_some())
        }

        async fn count(&self) -> Result<usize, DomainError> {
            self.check_error()?;
            Ok(self.entities.lock().unwrap().len())
        }
    }
}
