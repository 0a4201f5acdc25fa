//! User entity

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::storage::StorageEntity;

/// A principal that owns access keys
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    id: String,
    name: String,
    email: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl User {
    /// Create a new user
    pub fn new(id: impl Into<String>, name: impl Into<String>, email: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            name: name.into(),
            email: email.into(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}

impl StorageEntity for User {
    type Key = String;

    fn key(&self) -> &Self::Key {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_serializes_camel_case() {
        let user = User::new("user-1", "Ada", "ada@example.com");
        let json = serde_json::to_value(&user).unwrap();

        assert_eq!(json["id"], "user-1");
        assert!(json.get("createdAt").is_some());
        assert!(json.get("created_at").is_none());
    }
}
