//! PostgreSQL audit log

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPool;

use crate::domain::access_log::{AccessLog, AccessLogRepository};
use crate::domain::DomainError;

/// Access logs in a dedicated table indexed by `(key, timestamp)`
#[derive(Debug, Clone)]
pub struct PostgresAccessLogRepository {
    pool: PgPool,
    table_name: String,
}

impl PostgresAccessLogRepository {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            table_name: "access_logs".to_string(),
        }
    }

    pub fn with_table_name(mut self, table_name: impl Into<String>) -> Self {
        self.table_name = table_name.into();
        self
    }

    /// Creates the table and its range index if missing
    pub async fn ensure_table(&self) -> Result<(), DomainError> {
        let table = format!(
            r#"
            CREATE TABLE IF NOT EXISTS {} (
                id VARCHAR(64) PRIMARY KEY,
                key VARCHAR(255) NOT NULL,
                timestamp TIMESTAMPTZ NOT NULL,
                success BOOLEAN NOT NULL,
                rate_limited BOOLEAN NOT NULL
            )
            "#,
            self.table_name
        );
        let index = format!(
            "CREATE INDEX IF NOT EXISTS {0}_key_timestamp_idx ON {0} (key, timestamp)",
            self.table_name
        );

        for query in [table, index] {
            sqlx::query(&query)
                .execute(&self.pool)
                .await
                .map_err(|e| DomainError::storage(format!("Failed to create access log table: {}", e)))?;
        }

        Ok(())
    }
}

#[async_trait]
impl AccessLogRepository for PostgresAccessLogRepository {
    async fn append(&self, log: AccessLog) -> Result<(), DomainError> {
        let query = format!(
            "INSERT INTO {} (id, key, timestamp, success, rate_limited) VALUES ($1, $2, $3, $4, $5)",
            self.table_name
        );

        sqlx::query(&query)
            .bind(log.id().as_str())
            .bind(log.key())
            .bind(log.timestamp())
            .bind(log.is_success())
            .bind(log.is_rate_limited())
            .execute(&self.pool)
            .await
            .map_err(|e| DomainError::storage(format!("Failed to append access log: {}", e)))?;

        Ok(())
    }

    async fn count_successful(
        &self,
        key: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<usize, DomainError> {
        let query = format!(
            "SELECT COUNT(*) FROM {} WHERE key = $1 AND success AND timestamp BETWEEN $2 AND $3",
            self.table_name
        );

        let count: i64 = sqlx::query_scalar(&query)
            .bind(key)
            .bind(from)
            .bind(to)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| DomainError::storage(format!("Failed to count access logs: {}", e)))?;

        Ok(usize::try_from(count).unwrap_or(0))
    }
}
