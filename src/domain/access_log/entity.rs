//! Access log entity

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier of an audit record, time-ordered
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccessLogId(String);

impl AccessLogId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a fresh UUIDv7 identifier
    pub fn generate() -> Self {
        Self(Uuid::now_v7().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for AccessLogId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One record per access check that resolved a key
///
/// Records are append-only. `success` is what the rate limiter counts, so a
/// rejected check never consumes budget.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessLog {
    id: AccessLogId,
    key: String,
    timestamp: DateTime<Utc>,
    success: bool,
    rate_limited: bool,
}

impl AccessLog {
    /// Start a record for `key` checked at `timestamp`, initially unsuccessful
    pub fn new(key: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            id: AccessLogId::generate(),
            key: key.into(),
            timestamp,
            success: false,
            rate_limited: false,
        }
    }

    pub fn with_success(mut self, success: bool) -> Self {
        self.success = success;
        self
    }

    pub fn with_rate_limited(mut self, rate_limited: bool) -> Self {
        self.rate_limited = rate_limited;
        self
    }

    pub fn id(&self) -> &AccessLogId {
        &self.id
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn is_success(&self) -> bool {
        self.success
    }

    pub fn is_rate_limited(&self) -> bool {
        self.rate_limited
    }

    pub fn mark_success(&mut self) {
        self.success = true;
        self.rate_limited = false;
    }

    pub fn mark_rejected(&mut self) {
        self.success = false;
        self.rate_limited = false;
    }

    pub fn mark_rate_limited(&mut self) {
        self.success = false;
        self.rate_limited = true;
    }
}
