//! Access key entity and related types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::storage::StorageEntity;
use crate::domain::user::User;

/// An API access key owned by a user
///
/// `key` is assigned once and never changes; everything else is
/// administrative state that operators may edit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessKey {
    key: String,
    user_id: String,
    #[serde(default)]
    rate_limit: u32,
    #[serde(default)]
    expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    disabled: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl AccessKey {
    /// Create a new enabled key with a zero rate limit and no expiry
    pub fn new(key: impl Into<String>, user_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            key: key.into(),
            user_id: user_id.into(),
            rate_limit: 0,
            expires_at: None,
            disabled: false,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_rate_limit(mut self, rate_limit: u32) -> Self {
        self.rate_limit = rate_limit;
        self
    }

    pub fn with_expires_at(mut self, expires_at: Option<DateTime<Utc>>) -> Self {
        self.expires_at = expires_at;
        self
    }

    pub fn with_disabled(mut self, disabled: bool) -> Self {
        self.disabled = disabled;
        self
    }

    /// Backdate the record, e.g. when importing keys issued elsewhere
    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self.updated_at = created_at;
        self
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn rate_limit(&self) -> u32 {
        self.rate_limit
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }

    pub fn is_disabled(&self) -> bool {
        self.disabled
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// True when an expiry is set and lies strictly before `now`
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expires_at| expires_at < now)
    }

    /// Apply a patch in place. Returns false, leaving `updated_at` untouched,
    /// when no field actually changes.
    pub fn apply(&mut self, patch: &AccessKeyPatch) -> bool {
        let mut changed = false;

        if let Some(rate_limit) = patch.rate_limit {
            if rate_limit != self.rate_limit {
                self.rate_limit = rate_limit;
                changed = true;
            }
        }

        if let Some(expires_at) = patch.expires_at {
            if expires_at != self.expires_at {
                self.expires_at = expires_at;
                changed = true;
            }
        }

        if let Some(disabled) = patch.disabled {
            if disabled != self.disabled {
                self.disabled = disabled;
                changed = true;
            }
        }

        if changed {
            self.updated_at = Utc::now();
        }

        changed
    }
}

impl StorageEntity for AccessKey {
    type Key = String;

    fn key(&self) -> &Self::Key {
        &self.key
    }
}

/// Partial update of the administrative fields of a key
///
/// `expires_at` is doubly optional: `None` leaves the expiry alone,
/// `Some(None)` clears it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AccessKeyPatch {
    pub rate_limit: Option<u32>,
    pub expires_at: Option<Option<DateTime<Utc>>>,
    pub disabled: Option<bool>,
}

impl AccessKeyPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rate_limit(mut self, rate_limit: u32) -> Self {
        self.rate_limit = Some(rate_limit);
        self
    }

    pub fn with_expires_at(mut self, expires_at: Option<DateTime<Utc>>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    pub fn with_disabled(mut self, disabled: bool) -> Self {
        self.disabled = Some(disabled);
        self
    }
}

/// Input for creating a key; `key` is generated when absent
#[derive(Debug, Clone, PartialEq)]
pub struct NewAccessKey {
    pub key: Option<String>,
    pub user_id: String,
    pub rate_limit: u32,
    pub expires_at: Option<DateTime<Utc>>,
    pub disabled: bool,
}

impl NewAccessKey {
    pub fn new(user_id: impl Into<String>, rate_limit: u32) -> Self {
        Self {
            key: None,
            user_id: user_id.into(),
            rate_limit,
            expires_at: None,
            disabled: false,
        }
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn with_expires_at(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    pub fn with_disabled(mut self, disabled: bool) -> Self {
        self.disabled = disabled;
        self
    }
}

/// Listing filter with optional pagination
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AccessKeyFilter {
    pub disabled: Option<bool>,
    pub user_id: Option<String>,
    pub limit: Option<usize>,
    pub skip: Option<usize>,
}

impl AccessKeyFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_disabled(mut self, disabled: bool) -> Self {
        self.disabled = Some(disabled);
        self
    }

    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_skip(mut self, skip: usize) -> Self {
        self.skip = Some(skip);
        self
    }

    /// Whether the caller asked for a page rather than the whole set
    pub fn is_paginated(&self) -> bool {
        self.limit.is_some() || self.skip.is_some_and(|skip| skip > 0)
    }

    /// Whether a key passes the `disabled`/`user_id` filters (pagination ignored)
    pub fn matches(&self, access_key: &AccessKey) -> bool {
        if let Some(disabled) = self.disabled {
            if access_key.is_disabled() != disabled {
                return false;
            }
        }

        if let Some(ref user_id) = self.user_id {
            if access_key.user_id() != user_id {
                return false;
            }
        }

        true
    }
}

/// An access key enriched with its owner for display
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessKeyWithUser {
    #[serde(flatten)]
    pub access_key: AccessKey,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<User>,
}

/// One page of a key listing; `count` is the size of the filtered set
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessKeyPage {
    pub count: usize,
    pub access_keys: Vec<AccessKeyWithUser>,
}
