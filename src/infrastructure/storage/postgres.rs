//! PostgreSQL document storage

use std::fmt::Debug;
use std::marker::PhantomData;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions};

use crate::domain::storage::{Storage, StorageEntity, StorageKey};
use crate::domain::DomainError;

/// PostgreSQL connection settings
#[derive(Debug, Clone)]
pub struct PostgresConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout: Duration,
    pub idle_timeout: Duration,
}

impl Default for PostgresConfig {
    fn default() -> Self {
        Self {
            url: "postgres://localhost/access_gate".to_string(),
            max_connections: 10,
            min_connections: 1,
            acquire_timeout: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(600),
        }
    }
}

impl PostgresConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    pub fn with_max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    pub fn with_min_connections(mut self, min: u32) -> Self {
        self.min_connections = min;
        self
    }

    pub fn with_acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = timeout;
        self
    }

    /// Opens the pool every table of a process shares
    pub async fn connect_pool(&self) -> Result<PgPool, DomainError> {
        PgPoolOptions::new()
            .max_connections(self.max_connections)
            .min_connections(self.min_connections)
            .acquire_timeout(self.acquire_timeout)
            .idle_timeout(self.idle_timeout)
            .connect(&self.url)
            .await
            .map_err(|e| DomainError::storage(format!("Failed to connect to PostgreSQL: {}", e)))
    }
}

/// Statements for one document table, rendered once per store
#[derive(Debug, Clone)]
struct Statements {
    create_table: String,
    get: String,
    get_many: String,
    list: String,
    insert: String,
    update: String,
    delete: String,
    count: String,
}

impl Statements {
    fn for_table(table: &str) -> Self {
        Self {
            create_table: format!(
                "CREATE TABLE IF NOT EXISTS {table} (
                    key TEXT PRIMARY KEY,
                    data JSONB NOT NULL,
                    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
                )"
            ),
            get: format!("SELECT data FROM {table} WHERE key = $1"),
            get_many: format!("SELECT data FROM {table} WHERE key = ANY($1)"),
            list: format!("SELECT data FROM {table} ORDER BY created_at, key"),
            insert: format!(
                "INSERT INTO {table} (key, data) VALUES ($1, $2) ON CONFLICT (key) DO NOTHING"
            ),
            update: format!("UPDATE {table} SET data = $2, updated_at = NOW() WHERE key = $1"),
            delete: format!("DELETE FROM {table} WHERE key = $1"),
            count: format!("SELECT COUNT(*) FROM {table}"),
        }
    }
}

/// Table names are interpolated into SQL, so only plain identifiers are accepted
fn validate_table_name(table: &str) -> Result<(), DomainError> {
    let mut chars = table.chars();
    let starts_ok = chars
        .next()
        .is_some_and(|c| c.is_ascii_lowercase() || c == '_');

    if starts_ok && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_') {
        Ok(())
    } else {
        Err(DomainError::configuration(format!(
            "Invalid table name '{}'",
            table
        )))
    }
}

fn storage_error(action: &'static str) -> impl FnOnce(sqlx::Error) -> DomainError {
    move |e| DomainError::storage(format!("Failed to {}: {}", action, e))
}

fn decode<E: StorageEntity>(data: serde_json::Value) -> Result<E, DomainError> {
    serde_json::from_value(data)
        .map_err(|e| DomainError::storage(format!("Failed to deserialize document: {}", e)))
}

fn encode<E: StorageEntity>(entity: &E) -> Result<serde_json::Value, DomainError> {
    serde_json::to_value(entity)
        .map_err(|e| DomainError::storage(format!("Failed to serialize document: {}", e)))
}

/// JSONB document store, one row per entity
///
/// Each write touches a single row, so per-document atomicity is all callers
/// get.
pub struct PostgresStorage<E>
where
    E: StorageEntity,
{
    pool: PgPool,
    table_name: String,
    statements: Statements,
    _phantom: PhantomData<E>,
}

impl<E> Debug for PostgresStorage<E>
where
    E: StorageEntity,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostgresStorage")
            .field("table_name", &self.table_name)
            .finish_non_exhaustive()
    }
}

impl<E> PostgresStorage<E>
where
    E: StorageEntity,
{
    pub fn new(pool: PgPool, table_name: impl Into<String>) -> Result<Self, DomainError> {
        let table_name = table_name.into();
        validate_table_name(&table_name)?;

        Ok(Self {
            pool,
            statements: Statements::for_table(&table_name),
            table_name,
            _phantom: PhantomData,
        })
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    pub async fn ensure_table(&self) -> Result<(), DomainError> {
        sqlx::query(&self.statements.create_table)
            .execute(&self.pool)
            .await
            .map_err(storage_error("create table"))?;

        Ok(())
    }
}

#[async_trait]
impl<E> Storage<E> for PostgresStorage<E>
where
    E: StorageEntity + 'static,
{
    async fn get(&self, key: &E::Key) -> Result<Option<E>, DomainError> {
        sqlx::query_scalar::<_, serde_json::Value>(&self.statements.get)
            .bind(key.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_error("get document"))?
            .map(decode)
            .transpose()
    }

    async fn get_many(&self, keys: &[E::Key]) -> Result<Vec<E>, DomainError> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }

        let keys: Vec<String> = keys.iter().map(|k| k.as_str().to_string()).collect();

        sqlx::query_scalar::<_, serde_json::Value>(&self.statements.get_many)
            .bind(keys)
            .fetch_all(&self.pool)
            .await
            .map_err(storage_error("get documents"))?
            .into_iter()
            .map(decode)
            .collect()
    }

    async fn list(&self) -> Result<Vec<E>, DomainError> {
        sqlx::query_scalar::<_, serde_json::Value>(&self.statements.list)
            .fetch_all(&self.pool)
            .await
            .map_err(storage_error("list documents"))?
            .into_iter()
            .map(decode)
            .collect()
    }

    async fn create(&self, entity: E) -> Result<E, DomainError> {
        let inserted = sqlx::query(&self.statements.insert)
            .bind(entity.key().as_str())
            .bind(encode(&entity)?)
            .execute(&self.pool)
            .await
            .map_err(storage_error("insert document"))?
            .rows_affected();

        if inserted == 0 {
            return Err(DomainError::conflict(format!(
                "Document '{}' already exists in {}",
                entity.key().as_str(),
                self.table_name
            )));
        }

        Ok(entity)
    }

    async fn update(&self, entity: E) -> Result<E, DomainError> {
        let updated = sqlx::query(&self.statements.update)
            .bind(entity.key().as_str())
            .bind(encode(&entity)?)
            .execute(&self.pool)
            .await
            .map_err(storage_error("update document"))?
            .rows_affected();

        if updated == 0 {
            return Err(DomainError::not_found(format!(
                "Document '{}' not found in {}",
                entity.key().as_str(),
                self.table_name
            )));
        }

        Ok(entity)
    }

    async fn delete(&self, key: &E::Key) -> Result<bool, DomainError> {
        let deleted = sqlx::query(&self.statements.delete)
            .bind(key.as_str())
            .execute(&self.pool)
            .await
            .map_err(storage_error("delete document"))?
            .rows_affected();

        Ok(deleted > 0)
    }

    async fn count(&self) -> Result<usize, DomainError> {
        let count: i64 = sqlx::query_scalar(&self.statements.count)
            .fetch_one(&self.pool)
            .await
            .map_err(storage_error("count documents"))?;

        Ok(usize::try_from(count).unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_builder() {
        let config = PostgresConfig::new("postgres://db/keys")
            .with_max_connections(20)
            .with_min_connections(2)
            .with_acquire_timeout(Duration::from_secs(5));

        assert_eq!(config.url, "postgres://db/keys");
        assert_eq!(config.max_connections, 20);
        assert_eq!(config.min_connections, 2);
        assert_eq!(config.acquire_timeout, Duration::from_secs(5));
        assert_eq!(config.idle_timeout, Duration::from_secs(600));
    }

    #[test]
    fn test_table_name_validation() {
        assert!(validate_table_name("access_keys").is_ok());
        assert!(validate_table_name("_users2").is_ok());
        assert!(validate_table_name("").is_err());
        assert!(validate_table_name("2keys").is_err());
        assert!(validate_table_name("keys; DROP TABLE users").is_err());
        assert!(validate_table_name("AccessKeys").is_err());
    }

    #[test]
    fn test_statements_target_table() {
        let statements = Statements::for_table("access_keys");

        assert!(statements.get.contains("FROM access_keys"));
        assert!(statements.insert.contains("ON CONFLICT (key) DO NOTHING"));
        assert!(statements.get_many.contains("ANY($1)"));
        assert!(statements.list.ends_with("ORDER BY created_at, key"));
    }
}
