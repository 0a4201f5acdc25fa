//! In-memory audit log

use std::collections::{HashMap, VecDeque};
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};

use crate::domain::access_log::{AccessLog, AccessLogRepository};
use crate::domain::DomainError;

/// In-memory access log repository
///
/// Records are grouped per key and pruned by age: anything older than
/// `retention` before the newest append is dropped. `max_records_per_key`
/// only bounds the rejected records kept inside retention; a successful
/// record inside retention is never evicted, since the rate limiter counts
/// exactly those.
#[derive(Debug)]
pub struct InMemoryAccessLogRepository {
    logs: RwLock<HashMap<String, VecDeque<AccessLog>>>,
    max_records_per_key: usize,
    retention: Duration,
}

impl InMemoryAccessLogRepository {
    pub fn new(max_records_per_key: usize) -> Self {
        Self {
            logs: RwLock::new(HashMap::new()),
            max_records_per_key: max_records_per_key.max(1),
            retention: Duration::seconds(60),
        }
    }

    /// Keep records for at least `retention`; must cover the rate limit window
    pub fn with_retention(mut self, retention: Duration) -> Self {
        self.retention = retention.max(Duration::zero());
        self
    }

    /// Number of records held for `key`
    pub fn len_for(&self, key: &str) -> usize {
        self.logs
            .read()
            .map(|logs| logs.get(key).map_or(0, VecDeque::len))
            .unwrap_or(0)
    }

    fn prune(&self, entries: &mut VecDeque<AccessLog>, newest: DateTime<Utc>) {
        let cutoff = newest - self.retention;

        // Appends arrive in near time order; a straggler behind the front only
        // delays its own removal.
        while entries.front().is_some_and(|log| log.timestamp() < cutoff) {
            entries.pop_front();
        }

        while entries.len() > self.max_records_per_key {
            match entries.iter().position(|log| !log.is_success()) {
                Some(index) => {
                    entries.remove(index);
                }
                None => break,
            }
        }
    }
}

impl Default for InMemoryAccessLogRepository {
    fn default() -> Self {
        Self::new(100_000)
    }
}

#[async_trait]
impl AccessLogRepository for InMemoryAccessLogRepository {
    async fn append(&self, log: AccessLog) -> Result<(), DomainError> {
        let mut logs = self.logs.write().map_err(|e| {
            DomainError::internal(format!("Failed to acquire write lock: {}", e))
        })?;

        let newest = log.timestamp();
        let entries = logs.entry(log.key().to_string()).or_default();
        entries.push_back(log);
        self.prune(entries, newest);

        Ok(())
    }

    async fn count_successful(
        &self,
        key: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<usize, DomainError> {
        let logs = self.logs.read().map_err(|e| {
            DomainError::internal(format!("Failed to acquire read lock: {}", e))
        })?;

        Ok(logs.get(key).map_or(0, |entries| {
            entries
                .iter()
                .filter(|log| log.is_success() && log.timestamp() >= from && log.timestamp() <= to)
                .count()
        }))
    }
}
