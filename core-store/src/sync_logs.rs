//! # Sync Log Repository
//!
//! Per-run audit trail for pull and push runs.
//!
//! ## Overview
//!
//! A log row is opened when a run starts and driven to a terminal state when
//! the run finishes. The terminal updates are idempotent by design: replayed
//! orchestration steps may apply them more than once.

use crate::models::{
    now_timestamp, SyncDirection, SyncLog, SyncLogId, SyncLogStatus, TenantId,
};
use crate::{Result, StoreError};
use async_trait::async_trait;
use sqlx::{FromRow, SqlitePool};

// ============================================================================
// Repository Trait
// ============================================================================

/// Repository trait for sync log persistence
#[async_trait]
pub trait SyncLogRepository: Send + Sync {
    /// Open a new log row in the `started` state, returning its ID
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails
    async fn open(&self, tenant_id: &TenantId, direction: SyncDirection) -> Result<SyncLogId>;

    /// Drive a log row to `completed` with final counts
    ///
    /// # Errors
    ///
    /// Returns an error if the log doesn't exist or the database operation fails
    async fn complete(
        &self,
        id: &SyncLogId,
        records_processed: i64,
        records_failed: i64,
    ) -> Result<()>;

    /// Drive a log row to `failed` with an error message
    ///
    /// # Errors
    ///
    /// Returns an error if the log doesn't exist or the database operation fails
    async fn fail(&self, id: &SyncLogId, error_message: &str) -> Result<()>;

    /// Find a log by ID
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails
    async fn find_by_id(&self, id: &SyncLogId) -> Result<Option<SyncLog>>;

    /// Get a tenant's log history (most recent first)
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails
    async fn list_for_tenant(&self, tenant_id: &TenantId, limit: u32) -> Result<Vec<SyncLog>>;
}

// ============================================================================
// SQLite Implementation
// ============================================================================

/// SQLite implementation of SyncLogRepository
pub struct SqliteSyncLogRepository {
    pool: SqlitePool,
}

impl SqliteSyncLogRepository {
    /// Create a new SQLite sync log repository
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

/// Database row representation of a sync log
#[derive(Debug, FromRow)]
struct SyncLogRow {
    id: String,
    tenant_id: String,
    direction: String,
    status: String,
    records_processed: i64,
    records_failed: i64,
    error_message: Option<String>,
    started_at: i64,
    completed_at: Option<i64>,
}

impl TryFrom<SyncLogRow> for SyncLog {
    type Error = StoreError;

    fn try_from(row: SyncLogRow) -> Result<Self> {
        Ok(SyncLog {
            id: SyncLogId::from_string(&row.id)?,
            tenant_id: TenantId::from_string(&row.tenant_id)?,
            direction: row.direction.parse::<SyncDirection>()?,
            status: row.status.parse::<SyncLogStatus>()?,
            records_processed: row.records_processed,
            records_failed: row.records_failed,
            error_message: row.error_message,
            started_at: row.started_at,
            completed_at: row.completed_at,
        })
    }
}

const LOG_COLUMNS: &str = r#"
    id, tenant_id, direction, status, records_processed,
    records_failed, error_message, started_at, completed_at
"#;

#[async_trait]
impl SyncLogRepository for SqliteSyncLogRepository {
    async fn open(&self, tenant_id: &TenantId, direction: SyncDirection) -> Result<SyncLogId> {
        let id = SyncLogId::new();

        sqlx::query(
            r#"
            INSERT INTO sync_logs (
                id, tenant_id, direction, status,
                records_processed, records_failed, started_at
            ) VALUES (?, ?, ?, 'started', 0, 0, ?)
            "#,
        )
        .bind(id.as_str())
        .bind(tenant_id.as_str())
        .bind(direction.as_str())
        .bind(now_timestamp())
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(id)
    }

    async fn complete(
        &self,
        id: &SyncLogId,
        records_processed: i64,
        records_failed: i64,
    ) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE sync_logs
            SET status = 'completed',
                records_processed = ?,
                records_failed = ?,
                error_message = NULL,
                completed_at = ?
            WHERE id = ?
            "#,
        )
        .bind(records_processed)
        .bind(records_failed)
        .bind(now_timestamp())
        .bind(id.as_str())
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Database(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::LogNotFound {
                log_id: id.to_string(),
            });
        }

        Ok(())
    }

    async fn fail(&self, id: &SyncLogId, error_message: &str) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE sync_logs
            SET status = 'failed',
                error_message = ?,
                completed_at = ?
            WHERE id = ?
            "#,
        )
        .bind(error_message)
        .bind(now_timestamp())
        .bind(id.as_str())
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Database(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::LogNotFound {
                log_id: id.to_string(),
            });
        }

        Ok(())
    }

    async fn find_by_id(&self, id: &SyncLogId) -> Result<Option<SyncLog>> {
        let row = sqlx::query_as::<_, SyncLogRow>(&format!(
            "SELECT {} FROM sync_logs WHERE id = ?",
            LOG_COLUMNS
        ))
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::Database(e.to_string()))?;

        row.map(SyncLog::try_from).transpose()
    }

    async fn list_for_tenant(&self, tenant_id: &TenantId, limit: u32) -> Result<Vec<SyncLog>> {
        let rows = sqlx::query_as::<_, SyncLogRow>(&format!(
            r#"
            SELECT {}
            FROM sync_logs
            WHERE tenant_id = ?
            ORDER BY started_at DESC, id DESC
            LIMIT ?
            "#,
            LOG_COLUMNS
        ))
        .bind(tenant_id.as_str())
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::Database(e.to_string()))?;

        rows.into_iter()
            .map(SyncLog::try_from)
            .collect::<Result<Vec<_>>>()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Tenant;
    use crate::schema::create_test_pool;
    use crate::tenants::{SqliteTenantRepository, TenantRepository};

    async fn seed_tenant(pool: &SqlitePool) -> TenantId {
        let tenant = Tenant::new(
            "acme".to_string(),
            "pat_test".to_string(),
            "appBase1".to_string(),
            "tblOrders".to_string(),
            15,
        );
        let id = tenant.id;
        SqliteTenantRepository::new(pool.clone())
            .insert(&tenant)
            .await
            .unwrap();
        id
    }

    #[tokio::test]
    async fn test_open_and_complete() {
        let pool = create_test_pool().await.unwrap();
        let tenant_id = seed_tenant(&pool).await;
        let repo = SqliteSyncLogRepository::new(pool);

        let id = repo.open(&tenant_id, SyncDirection::Pull).await.unwrap();

        let log = repo.find_by_id(&id).await.unwrap().unwrap();
        assert_eq!(log.status, SyncLogStatus::Started);
        assert_eq!(log.direction, SyncDirection::Pull);
        assert!(log.completed_at.is_none());

        repo.complete(&id, 12, 1).await.unwrap();

        let log = repo.find_by_id(&id).await.unwrap().unwrap();
        assert_eq!(log.status, SyncLogStatus::Completed);
        assert_eq!(log.records_processed, 12);
        assert_eq!(log.records_failed, 1);
        assert!(log.completed_at.is_some());
    }

    #[tokio::test]
    async fn test_fail_records_error() {
        let pool = create_test_pool().await.unwrap();
        let tenant_id = seed_tenant(&pool).await;
        let repo = SqliteSyncLogRepository::new(pool);

        let id = repo.open(&tenant_id, SyncDirection::Push).await.unwrap();
        repo.fail(&id, "rate limited by remote API").await.unwrap();

        let log = repo.find_by_id(&id).await.unwrap().unwrap();
        assert_eq!(log.status, SyncLogStatus::Failed);
        assert_eq!(log.error_message.as_deref(), Some("rate limited by remote API"));
    }

    #[tokio::test]
    async fn test_terminal_updates_are_idempotent() {
        let pool = create_test_pool().await.unwrap();
        let tenant_id = seed_tenant(&pool).await;
        let repo = SqliteSyncLogRepository::new(pool);

        let id = repo.open(&tenant_id, SyncDirection::Pull).await.unwrap();

        // A replayed step may complete the same log twice
        repo.complete(&id, 5, 0).await.unwrap();
        repo.complete(&id, 5, 0).await.unwrap();

        let log = repo.find_by_id(&id).await.unwrap().unwrap();
        assert_eq!(log.status, SyncLogStatus::Completed);
        assert_eq!(log.records_processed, 5);
    }

    #[tokio::test]
    async fn test_list_for_tenant_most_recent_first() {
        let pool = create_test_pool().await.unwrap();
        let tenant_id = seed_tenant(&pool).await;
        let repo = SqliteSyncLogRepository::new(pool);

        for _ in 0..4 {
            repo.open(&tenant_id, SyncDirection::Pull).await.unwrap();
        }

        let history = repo.list_for_tenant(&tenant_id, 3).await.unwrap();
        assert_eq!(history.len(), 3);
        for i in 0..history.len() - 1 {
            assert!(history[i].started_at >= history[i + 1].started_at);
        }
    }

    #[tokio::test]
    async fn test_complete_missing_log() {
        let pool = create_test_pool().await.unwrap();
        seed_tenant(&pool).await;
        let repo = SqliteSyncLogRepository::new(pool);

        let err = repo.complete(&SyncLogId::new(), 0, 0).await.unwrap_err();
        assert!(matches!(err, StoreError::LogNotFound { .. }));
    }
}
