//! In-memory document storage

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;

use crate::domain::storage::{Storage, StorageEntity, StorageKey};
use crate::domain::DomainError;

/// Process-local document store for development and tests
///
/// Contents are lost on restart and never shared between processes.
#[derive(Debug)]
pub struct InMemoryStorage<E>
where
    E: StorageEntity,
{
    documents: RwLock<HashMap<String, E>>,
}

impl<E> Default for InMemoryStorage<E>
where
    E: StorageEntity,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<E> InMemoryStorage<E>
where
    E: StorageEntity,
{
    pub fn new() -> Self {
        Self {
            documents: RwLock::new(HashMap::new()),
        }
    }

    /// Store pre-populated with `entities`; later duplicates replace earlier ones
    pub fn with_entities(entities: Vec<E>) -> Self {
        let documents = entities
            .into_iter()
            .map(|entity| (entity.key().as_str().to_string(), entity))
            .collect();

        Self {
            documents: RwLock::new(documents),
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, HashMap<String, E>>, DomainError> {
        self.documents
            .read()
            .map_err(|_| DomainError::storage("In-memory storage lock poisoned"))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, HashMap<String, E>>, DomainError> {
        self.documents
            .write()
            .map_err(|_| DomainError::storage("In-memory storage lock poisoned"))
    }
}

#[async_trait]
impl<E> Storage<E> for InMemoryStorage<E>
where
    E: StorageEntity + 'static,
{
    async fn get(&self, key: &E::Key) -> Result<Option<E>, DomainError> {
        Ok(self.read()?.get(key.as_str()).cloned())
    }

    async fn get_many(&self, keys: &[E::Key]) -> Result<Vec<E>, DomainError> {
        let documents = self.read()?;

        Ok(keys
            .iter()
            .filter_map(|key| documents.get(key.as_str()).cloned())
            .collect())
    }

    async fn list(&self) -> Result<Vec<E>, DomainError> {
        Ok(self.read()?.values().cloned().collect())
    }

    async fn create(&self, entity: E) -> Result<E, DomainError> {
        match self.write()?.entry(entity.key().as_str().to_string()) {
            Entry::Occupied(entry) => Err(DomainError::conflict(format!(
                "Document '{}' already exists",
                entry.key()
            ))),
            Entry::Vacant(entry) => {
                entry.insert(entity.clone());
                Ok(entity)
            }
        }
    }

    async fn update(&self, entity: E) -> Result<E, DomainError> {
        let mut documents = self.write()?;

        match documents.get_mut(entity.key().as_str()) {
            Some(existing) => {
                *existing = entity.clone();
                Ok(entity)
            }
            None => Err(DomainError::not_found(format!(
                "Document '{}' not found",
                entity.key().as_str()
            ))),
        }
    }

    async fn delete(&self, key: &E::Key) -> Result<bool, DomainError> {
        Ok(self.write()?.remove(key.as_str()).is_some())
    }

    async fn exists(&self, key: &E::Key) -> Result<bool, DomainError> {
        Ok(self.read()?.contains_key(key.as_str()))
    }

    async fn count(&self) -> Result<usize, DomainError> {
        Ok(self.read()?.len())
    }
}
