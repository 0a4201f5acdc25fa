//! Cache trait definition

use std::fmt::Debug;

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};

use crate::domain::DomainError;

/// Key-value cache without expiry
///
/// Entries live until they are overwritten or deleted explicitly. This trait
/// uses JSON strings internally to stay dyn-compatible; use [`CacheExt`] for
/// typed access.
#[async_trait]
pub trait Cache: Send + Sync + Debug {
    /// Gets a raw JSON value from the cache
    async fn get_raw(&self, key: &str) -> Result<Option<String>, DomainError>;

    /// Sets a raw JSON value in the cache
    async fn set_raw(&self, key: &str, value: &str) -> Result<(), DomainError>;

    /// Deletes a value from the cache, returns true if an entry was removed
    async fn delete(&self, key: &str) -> Result<bool, DomainError>;

    /// Checks if a key exists in the cache
    async fn exists(&self, key: &str) -> Result<bool, DomainError> {
        Ok(self.get_raw(key).await?.is_some())
    }

    /// Round-trips the backend to verify it is reachable
    async fn ping(&self) -> Result<(), DomainError> {
        self.exists("__ping__").await.map(|_| ())
    }
}

/// Extension trait providing typed get/set operations
pub trait CacheExt: Cache {
    /// Gets a typed value from the cache
    fn get<'a, V>(
        &'a self,
        key: &'a str,
    ) -> impl std::future::Future<Output = Result<Option<V>, DomainError>> + Send
    where
        V: DeserializeOwned + Send,
    {
        async move {
            match self.get_raw(key).await? {
                Some(data) => {
                    let value: V = serde_json::from_str(&data).map_err(|e| {
                        DomainError::cache(format!("Failed to deserialize cache value: {}", e))
                    })?;
                    Ok(Some(value))
                }
                None => Ok(None),
            }
        }
    }

    /// Sets a typed value in the cache
    fn set<'a, V>(
        &'a self,
        key: &'a str,
        value: &'a V,
    ) -> impl std::future::Future<Output = Result<(), DomainError>> + Send
    where
        V: Serialize + Send + Sync,
    {
        async move {
            let data = serde_json::to_string(value).map_err(|e| {
                DomainError::cache(format!("Failed to serialize cache value: {}", e))
            })?;
            self.set_raw(key, &data).await
        }
    }
}

impl<T: Cache + ?Sized> CacheExt for T {}

#[cfg(test)]
pub mod mock {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Mock cache recording set/delete traffic
    #[derive(Debug, Default)]
    pub struct MockCache {
        entries: Mutex<HashMap<String, String>>,
        sets: AtomicUsize,
        deletes: AtomicUsize,
        fail: Mutex<bool>,
    }

    impl MockCache {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn set_should_fail(&self, fail: bool) {
            *self.fail.lock().unwrap() = fail;
        }

        pub fn sets(&self) -> usize {
            self.sets.load(Ordering::SeqCst)
        }

        pub fn deletes(&self) -> usize {
            self.deletes.load(Ordering::SeqCst)
        }

        pub fn contains(&self, key: &str) -> bool {
            self.entries.lock().unwrap().contains_key(key)
        }

        /// Plants an entry without counting it as a write
        pub fn seed(&self, key: &str, value: &str) {
            self.entries
                .lock()
                .unwrap()
                .insert(key.to_string(), value.to_string());
        }

        fn check_fail(&self) -> Result<(), DomainError> {
            if *self.fail.lock().unwrap() {
                return Err(DomainError::cache("Mock cache configured to fail"));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl Cache for MockCache {
        async fn get_raw(&self, key: &str) -> Result<Option<String>, DomainError> {
            self.check_fail()?;
            Ok(self.entries.lock().unwrap().get(key).cloned())
        }

        async fn set_raw(&self, key: &str, value: &str) -> Result<(), DomainError> {
            self.check_fail()?;
            self.sets.fetch_add(1, Ordering::SeqCst);
            self.entries
                .lock()
                .unwrap()
                .insert(key.to_string(), value.to_string());
            Ok(())
        }

        async fn delete(&self, key: &str) -> Result<bool, DomainError> {
            self.check_fail()?;
            self.deletes.fetch_add(1, Ordering::SeqCst);
            Ok(self.entries.lock().unwrap().remove(key).is_some())
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[tokio::test]
        async fn test_typed_round_trip() {
            let cache = MockCache::new();
            cache.set("k", &vec![1, 2, 3]).await.unwrap();

            let value: Option<Vec<i32>> = cache.get("k").await.unwrap();
            assert_eq!(value, Some(vec![1, 2, 3]));
            assert_eq!(cache.sets(), 1);
        }

        #[tokio::test]
        async fn test_get_rejects_malformed_json() {
            let cache = MockCache::new();
            cache.seed("k", "not json");

            let result: Result<Option<Vec<i32>>, _> = cache.get("k").await;
            assert!(matches!(result, Err(DomainError::Cache { .. })));
        }
    }
}
