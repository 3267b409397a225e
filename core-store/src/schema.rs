//! # Database Pool and Schema
//!
//! SQLite connection pooling and schema initialization for the mirror store.
//!
//! ## Overview
//!
//! - **WAL Mode**: enabled for better concurrency (multiple readers, one writer)
//! - **Foreign Keys**: enforced for referential integrity
//! - **Idempotent Schema**: `initialize` uses `CREATE TABLE IF NOT EXISTS`
//!
//! ## Usage
//!
//! ```rust,ignore
//! use core_store::schema::{create_pool, initialize, DatabaseConfig};
//!
//! let pool = create_pool(DatabaseConfig::new("mirror.db")).await?;
//! initialize(&pool).await?;
//! ```

use crate::{Result, StoreError};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};

/// Database configuration for the SQLite connection pool
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// Database file path or `sqlite::memory:` for an in-memory database
    pub database_url: String,

    /// Maximum number of connections in the pool
    pub max_connections: u32,

    /// Maximum time to wait for a connection from the pool
    pub acquire_timeout: Duration,
}

impl DatabaseConfig {
    /// Create a new database configuration with the given file path
    pub fn new(database_path: impl Into<PathBuf>) -> Self {
        let path = database_path.into();
        Self {
            database_url: format!("sqlite:{}", path.display()),
            max_connections: 5,
            acquire_timeout: Duration::from_secs(30),
        }
    }

    /// Create a configuration for an in-memory database (useful for testing)
    pub fn in_memory() -> Self {
        Self {
            database_url: "sqlite::memory:".to_string(),
            max_connections: 1,
            acquire_timeout: Duration::from_secs(30),
        }
    }
}

/// Create a connection pool from the given configuration
///
/// # Errors
///
/// Returns an error if the database URL is invalid or the connection fails
pub async fn create_pool(config: DatabaseConfig) -> Result<SqlitePool> {
    debug!(url = %config.database_url, "Creating database pool");

    let options = SqliteConnectOptions::from_str(&config.database_url)
        .map_err(|e| StoreError::Database(e.to_string()))?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal)
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(config.acquire_timeout)
        .connect_with(options)
        .await
        .map_err(|e| StoreError::Database(e.to_string()))?;

    Ok(pool)
}

/// Create and initialize the schema of the mirror store.
///
/// Idempotent; safe to run on every startup.
pub async fn initialize(pool: &SqlitePool) -> Result<()> {
    info!("Initializing mirror store schema");

    let statements = [
        r#"
        CREATE TABLE IF NOT EXISTS tenants (
            id TEXT PRIMARY KEY NOT NULL,
            name TEXT NOT NULL,
            api_token TEXT NOT NULL,
            base_id TEXT NOT NULL,
            table_id TEXT NOT NULL,
            sync_interval_minutes INTEGER NOT NULL DEFAULT 15,
            last_sync_at INTEGER,
            sync_enabled INTEGER NOT NULL DEFAULT 1,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS field_mappings (
            id TEXT PRIMARY KEY NOT NULL,
            tenant_id TEXT NOT NULL REFERENCES tenants(id) ON DELETE CASCADE,
            remote_field_id TEXT NOT NULL,
            remote_field_name TEXT NOT NULL,
            remote_field_type TEXT NOT NULL,
            display_name TEXT NOT NULL,
            visible_in_list INTEGER NOT NULL DEFAULT 1,
            visible_in_detail INTEGER NOT NULL DEFAULT 1,
            sort_order INTEGER,
            priority_weight REAL NOT NULL DEFAULT 0,
            created_at INTEGER NOT NULL,
            UNIQUE (tenant_id, remote_field_id)
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS records (
            id TEXT PRIMARY KEY NOT NULL,
            tenant_id TEXT NOT NULL REFERENCES tenants(id) ON DELETE CASCADE,
            remote_record_id TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'pending',
            priority_score REAL,
            custom_fields TEXT NOT NULL,
            key_fields TEXT NOT NULL,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL,
            synced_at INTEGER,
            UNIQUE (tenant_id, remote_record_id)
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS outbound_changes (
            id TEXT PRIMARY KEY NOT NULL,
            tenant_id TEXT NOT NULL REFERENCES tenants(id) ON DELETE CASCADE,
            record_id TEXT,
            remote_record_id TEXT NOT NULL,
            kind TEXT NOT NULL,
            change_data TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'pending',
            attempts INTEGER NOT NULL DEFAULT 0,
            last_attempt_at INTEGER,
            error_message TEXT,
            created_at INTEGER NOT NULL,
            completed_at INTEGER,
            CONSTRAINT outbound_changes_status_check CHECK (
                status IN ('pending', 'completed', 'failed')
            )
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS sync_logs (
            id TEXT PRIMARY KEY NOT NULL,
            tenant_id TEXT NOT NULL REFERENCES tenants(id) ON DELETE CASCADE,
            direction TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'started',
            records_processed INTEGER NOT NULL DEFAULT 0,
            records_failed INTEGER NOT NULL DEFAULT 0,
            error_message TEXT,
            started_at INTEGER NOT NULL,
            completed_at INTEGER,
            CONSTRAINT sync_logs_status_check CHECK (
                status IN ('started', 'completed', 'failed')
            ),
            CONSTRAINT sync_logs_direction_check CHECK (
                direction IN ('pull', 'push')
            )
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS step_results (
            run_id TEXT NOT NULL,
            step_name TEXT NOT NULL,
            output TEXT NOT NULL,
            completed_at INTEGER NOT NULL,
            PRIMARY KEY (run_id, step_name)
        )
        "#,
        r#"
        CREATE INDEX IF NOT EXISTS idx_records_tenant
        ON records (tenant_id)
        "#,
        r#"
        CREATE INDEX IF NOT EXISTS idx_outbound_changes_pending
        ON outbound_changes (tenant_id, status, created_at)
        "#,
        r#"
        CREATE INDEX IF NOT EXISTS idx_sync_logs_tenant
        ON sync_logs (tenant_id, started_at)
        "#,
    ];

    for statement in statements {
        sqlx::query(statement)
            .execute(pool)
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;
    }

    Ok(())
}

/// Create an initialized in-memory pool (useful for testing)
pub async fn create_test_pool() -> Result<SqlitePool> {
    let pool = create_pool(DatabaseConfig::in_memory()).await?;
    initialize(&pool).await?;
    Ok(pool)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_initialize_is_idempotent() {
        let pool = create_test_pool().await.unwrap();
        initialize(&pool).await.unwrap();

        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM sqlite_master WHERE type = 'table'")
                .fetch_one(&pool)
                .await
                .unwrap();
        assert!(count >= 6);
    }
}
