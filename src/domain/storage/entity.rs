//! Storage entity traits

use std::fmt::Debug;

use serde::{de::DeserializeOwned, Serialize};

/// Trait for types that can be used as storage keys
pub trait StorageKey: Clone + Debug + Send + Sync + Eq + std::hash::Hash {
    /// Returns the key as a string for storage backends that require string keys
    fn as_str(&self) -> &str;
}

impl StorageKey for String {
    fn as_str(&self) -> &str {
        self
    }
}

/// Trait for documents that can be stored
pub trait StorageEntity: Clone + Debug + Send + Sync + Serialize + DeserializeOwned {
    /// The key type for this entity
    type Key: StorageKey;

    /// Returns the entity's key
    fn key(&self) -> &Self::Key;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
    struct Note {
        id: String,
        body: String,
    }

    impl StorageEntity for Note {
        type Key = String;

        fn key(&self) -> &Self::Key {
            &self.id
        }
    }

    #[test]
    fn test_string_key_as_str() {
        let key = "note-1".to_string();
        assert_eq!(StorageKey::as_str(&key), "note-1");
    }

    #[test]
    fn test_storage_entity_key() {
        let note = Note {
            id: "note-1".to_string(),
            body: "hello".to_string(),
        };
        assert_eq!(note.key().as_str(), "note-1");
    }
}
