//! # Outbound Change Queue
//!
//! Durable FIFO queue of local edits awaiting push to the remote.
//!
//! ## Overview
//!
//! Local edits are enqueued as [`ChangeEntry`] rows and drained in batches,
//! oldest first. Each entry is marked individually: one failed push does not
//! block the rest of the batch. Failed entries accumulate attempts and can be
//! requeued until a bounded attempt cap is reached.

use crate::models::{
    now_timestamp, ChangeEntry, ChangeEntryId, ChangeKind, ChangeStatus, NewChange, RecordId,
    TenantId,
};
use crate::{Result, StoreError};
use async_trait::async_trait;
use remote_traits::FieldMap;
use sqlx::{FromRow, SqlitePool};
use tracing::debug;

// ============================================================================
// Repository Trait
// ============================================================================

/// Repository trait for the outbound change queue
#[async_trait]
pub trait ChangeQueueRepository: Send + Sync {
    /// Enqueue a new pending change, returning its ID
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails
    async fn enqueue(&self, change: &NewChange) -> Result<ChangeEntryId>;

    /// Fetch up to `limit` pending changes for a tenant, oldest first
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails
    async fn fetch_pending(&self, tenant_id: &TenantId, limit: u32) -> Result<Vec<ChangeEntry>>;

    /// Mark a change as pushed successfully
    ///
    /// # Errors
    ///
    /// Returns an error if the change doesn't exist or the database operation fails
    async fn mark_completed(&self, id: &ChangeEntryId) -> Result<()>;

    /// Mark a change as failed, recording the error and bumping the attempt count
    ///
    /// # Errors
    ///
    /// Returns an error if the change doesn't exist or the database operation fails
    async fn mark_failed(&self, id: &ChangeEntryId, error_message: &str) -> Result<()>;

    /// Return failed changes below the attempt cap to pending.
    ///
    /// Returns the number of changes requeued.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails
    async fn requeue_retryable(&self, tenant_id: &TenantId, max_attempts: i64) -> Result<u64>;

    /// Find a change by ID
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails
    async fn find_by_id(&self, id: &ChangeEntryId) -> Result<Option<ChangeEntry>>;
}

// ============================================================================
// SQLite Implementation
// ============================================================================

/// SQLite implementation of ChangeQueueRepository
pub struct SqliteChangeQueueRepository {
    pool: SqlitePool,
}

impl SqliteChangeQueueRepository {
    /// Create a new SQLite change queue repository
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

/// Database row representation of a change entry
#[derive(Debug, FromRow)]
struct ChangeEntryRow {
    id: String,
    tenant_id: String,
    record_id: Option<String>,
    remote_record_id: String,
    kind: String,
    change_data: String,
    status: String,
    attempts: i64,
    last_attempt_at: Option<i64>,
    error_message: Option<String>,
    created_at: i64,
    completed_at: Option<i64>,
}

impl TryFrom<ChangeEntryRow> for ChangeEntry {
    type Error = StoreError;

    fn try_from(row: ChangeEntryRow) -> Result<Self> {
        let change_data: FieldMap = serde_json::from_str(&row.change_data)
            .map_err(|e| StoreError::FieldPayload(e.to_string()))?;

        Ok(ChangeEntry {
            id: ChangeEntryId::from_string(&row.id)?,
            tenant_id: TenantId::from_string(&row.tenant_id)?,
            record_id: row
                .record_id
                .as_deref()
                .map(RecordId::from_string)
                .transpose()?,
            remote_record_id: row.remote_record_id,
            kind: row.kind.parse::<ChangeKind>()?,
            change_data,
            status: row.status.parse::<ChangeStatus>()?,
            attempts: row.attempts,
            last_attempt_at: row.last_attempt_at,
            error_message: row.error_message,
            created_at: row.created_at,
            completed_at: row.completed_at,
        })
    }
}

const CHANGE_COLUMNS: &str = r#"
    id, tenant_id, record_id, remote_record_id, kind, change_data,
    status, attempts, last_attempt_at, error_message, created_at, completed_at
"#;

#[async_trait]
impl ChangeQueueRepository for SqliteChangeQueueRepository {
    async fn enqueue(&self, change: &NewChange) -> Result<ChangeEntryId> {
        let id = ChangeEntryId::new();
        let change_data = serde_json::to_string(&change.change_data)
            .map_err(|e| StoreError::FieldPayload(e.to_string()))?;

        sqlx::query(
            r#"
            INSERT INTO outbound_changes (
                id, tenant_id, record_id, remote_record_id, kind,
                change_data, status, attempts, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, 'pending', 0, ?)
            "#,
        )
        .bind(id.as_str())
        .bind(change.tenant_id.as_str())
        .bind(change.record_id.map(|r| r.as_str()))
        .bind(&change.remote_record_id)
        .bind(change.kind.as_str())
        .bind(change_data)
        .bind(now_timestamp())
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Database(e.to_string()))?;

        debug!(change_id = %id, kind = change.kind.as_str(), "Enqueued outbound change");
        Ok(id)
    }

    async fn fetch_pending(&self, tenant_id: &TenantId, limit: u32) -> Result<Vec<ChangeEntry>> {
        let rows = sqlx::query_as::<_, ChangeEntryRow>(&format!(
            r#"
            SELECT {}
            FROM outbound_changes
            WHERE tenant_id = ? AND status = 'pending'
            ORDER BY created_at ASC, id ASC
            LIMIT ?
            "#,
            CHANGE_COLUMNS
        ))
        .bind(tenant_id.as_str())
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::Database(e.to_string()))?;

        rows.into_iter()
            .map(ChangeEntry::try_from)
            .collect::<Result<Vec<_>>>()
    }

    async fn mark_completed(&self, id: &ChangeEntryId) -> Result<()> {
        let now = now_timestamp();
        let result = sqlx::query(
            r#"
            UPDATE outbound_changes
            SET status = 'completed',
                attempts = attempts + 1,
                last_attempt_at = ?,
                error_message = NULL,
                completed_at = ?
            WHERE id = ?
            "#,
        )
        .bind(now)
        .bind(now)
        .bind(id.as_str())
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Database(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::ChangeNotFound {
                change_id: id.to_string(),
            });
        }

        Ok(())
    }

    async fn mark_failed(&self, id: &ChangeEntryId, error_message: &str) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE outbound_changes
            SET status = 'failed',
                attempts = attempts + 1,
                last_attempt_at = ?,
                error_message = ?
            WHERE id = ?
            "#,
        )
        .bind(now_timestamp())
        .bind(error_message)
        .bind(id.as_str())
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Database(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::ChangeNotFound {
                change_id: id.to_string(),
            });
        }

        Ok(())
    }

    async fn requeue_retryable(&self, tenant_id: &TenantId, max_attempts: i64) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE outbound_changes
            SET status = 'pending'
            WHERE tenant_id = ? AND status = 'failed' AND attempts < ?
            "#,
        )
        .bind(tenant_id.as_str())
        .bind(max_attempts)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Database(e.to_string()))?;

        let requeued = result.rows_affected();
        if requeued > 0 {
            debug!(tenant_id = %tenant_id, requeued, "Requeued retryable changes");
        }
        Ok(requeued)
    }

    async fn find_by_id(&self, id: &ChangeEntryId) -> Result<Option<ChangeEntry>> {
        let row = sqlx::query_as::<_, ChangeEntryRow>(&format!(
            "SELECT {} FROM outbound_changes WHERE id = ?",
            CHANGE_COLUMNS
        ))
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::Database(e.to_string()))?;

        row.map(ChangeEntry::try_from).transpose()
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

    fn change(tenant_id: TenantId, remote_record_id: &str) -> NewChange {
        let mut change_data = FieldMap::new();
        change_data.insert("Status".to_string(), serde_json::json!("reviewed"));
        NewChange {
            tenant_id,
            record_id: None,
            remote_record_id: remote_record_id.to_string(),
            kind: ChangeKind::Status,
            change_data,
        }
    }

    #[tokio::test]
    async fn test_enqueue_and_fetch_fifo() {
        let pool = create_test_pool().await.unwrap();
        let tenant_id = seed_tenant(&pool).await;
        let repo = SqliteChangeQueueRepository::new(pool);

        let first = repo.enqueue(&change(tenant_id, "rec1")).await.unwrap();
        let second = repo.enqueue(&change(tenant_id, "rec2")).await.unwrap();

        let pending = repo.fetch_pending(&tenant_id, 50).await.unwrap();
        assert_eq!(pending.len(), 2);
        assert_eq!(pending[0].id, first);
        assert_eq!(pending[1].id, second);
        assert_eq!(pending[0].status, ChangeStatus::Pending);
        assert_eq!(pending[0].attempts, 0);
    }

    #[tokio::test]
    async fn test_fetch_pending_respects_limit() {
        let pool = create_test_pool().await.unwrap();
        let tenant_id = seed_tenant(&pool).await;
        let repo = SqliteChangeQueueRepository::new(pool);

        for i in 0..5 {
            repo.enqueue(&change(tenant_id, &format!("rec{}", i)))
                .await
                .unwrap();
        }

        let pending = repo.fetch_pending(&tenant_id, 3).await.unwrap();
        assert_eq!(pending.len(), 3);
    }

    #[tokio::test]
    async fn test_mark_completed_excludes_from_pending() {
        let pool = create_test_pool().await.unwrap();
        let tenant_id = seed_tenant(&pool).await;
        let repo = SqliteChangeQueueRepository::new(pool);

        let id = repo.enqueue(&change(tenant_id, "rec1")).await.unwrap();
        repo.mark_completed(&id).await.unwrap();

        assert!(repo.fetch_pending(&tenant_id, 50).await.unwrap().is_empty());

        let entry = repo.find_by_id(&id).await.unwrap().unwrap();
        assert_eq!(entry.status, ChangeStatus::Completed);
        assert_eq!(entry.attempts, 1);
        assert!(entry.completed_at.is_some());
    }

    #[tokio::test]
    async fn test_mark_failed_records_error_and_attempts() {
        let pool = create_test_pool().await.unwrap();
        let tenant_id = seed_tenant(&pool).await;
        let repo = SqliteChangeQueueRepository::new(pool);

        let id = repo.enqueue(&change(tenant_id, "rec1")).await.unwrap();
        repo.mark_failed(&id, "record rec1 not found in table tblOrders")
            .await
            .unwrap();

        let entry = repo.find_by_id(&id).await.unwrap().unwrap();
        assert_eq!(entry.status, ChangeStatus::Failed);
        assert_eq!(entry.attempts, 1);
        assert!(entry.error_message.as_deref().unwrap().contains("rec1"));
        assert!(entry.completed_at.is_none());

        // Failed entries are not drained again until requeued
        assert!(repo.fetch_pending(&tenant_id, 50).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_requeue_retryable_honors_attempt_cap() {
        let pool = create_test_pool().await.unwrap();
        let tenant_id = seed_tenant(&pool).await;
        let repo = SqliteChangeQueueRepository::new(pool);

        let retryable = repo.enqueue(&change(tenant_id, "rec1")).await.unwrap();
        repo.mark_failed(&retryable, "timeout").await.unwrap();

        let exhausted = repo.enqueue(&change(tenant_id, "rec2")).await.unwrap();
        for _ in 0..3 {
            repo.mark_failed(&exhausted, "timeout").await.unwrap();
        }

        let requeued = repo.requeue_retryable(&tenant_id, 3).await.unwrap();
        assert_eq!(requeued, 1);

        // Only the entry under the cap comes back
        let pending = repo.fetch_pending(&tenant_id, 50).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, retryable);

        let still_failed = repo.find_by_id(&exhausted).await.unwrap().unwrap();
        assert_eq!(still_failed.status, ChangeStatus::Failed);
    }

    #[tokio::test]
    async fn test_queue_is_tenant_scoped() {
        let pool = create_test_pool().await.unwrap();
        let tenant_a = seed_tenant(&pool).await;
        let tenant_b = seed_tenant(&pool).await;
        let repo = SqliteChangeQueueRepository::new(pool);

        repo.enqueue(&change(tenant_a, "rec1")).await.unwrap();
        repo.enqueue(&change(tenant_b, "rec2")).await.unwrap();

        let for_a = repo.fetch_pending(&tenant_a, 50).await.unwrap();
        assert_eq!(for_a.len(), 1);
        assert_eq!(for_a[0].remote_record_id, "rec1");
    }
}
