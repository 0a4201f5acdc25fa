//! Access log repository trait

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::fmt::Debug;

use super::entity::AccessLog;
use crate::domain::DomainError;

/// Append-only audit store, queried by key and time range
#[async_trait]
pub trait AccessLogRepository: Send + Sync + Debug {
    /// Append one record
    async fn append(&self, log: AccessLog) -> Result<(), DomainError>;

    /// Count successful records for `key` with `from <= timestamp <= to`
    async fn count_successful(
        &self,
        key: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<usize, DomainError>;
}
