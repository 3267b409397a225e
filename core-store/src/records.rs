//! # Record Repository
//!
//! Provides database persistence for mirrored records.
//!
//! ## Overview
//!
//! Records are keyed by the natural key `(tenant_id, remote_record_id)`.
//! Inbound sync upserts on that key: the remote-owned columns
//! (`custom_fields`, `key_fields`, `synced_at`) are refreshed on conflict,
//! while the locally-owned columns (`status`, `priority_score`) are never
//! touched by the upsert itself.

use crate::models::{now_timestamp, MirrorRecord, RecordId, RecordUpsert, TenantId};
use crate::{Result, StoreError};
use async_trait::async_trait;
use remote_traits::FieldMap;
use sqlx::{FromRow, SqlitePool};

// ============================================================================
// Repository Trait
// ============================================================================

/// Repository trait for mirrored record persistence
#[async_trait]
pub trait RecordRepository: Send + Sync {
    /// Insert or refresh a record by its natural key, returning the stored row.
    ///
    /// New records get status `pending` and no priority score. Existing
    /// records keep their status and score; only the remote-owned columns
    /// are refreshed.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails
    async fn upsert(&self, upsert: &RecordUpsert) -> Result<MirrorRecord>;

    /// Find a record by ID
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails
    async fn find_by_id(&self, id: &RecordId) -> Result<Option<MirrorRecord>>;

    /// Find a record by its natural key
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails
    async fn find_by_remote_id(
        &self,
        tenant_id: &TenantId,
        remote_record_id: &str,
    ) -> Result<Option<MirrorRecord>>;

    /// List all records for a tenant, most recently updated first
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails
    async fn list_for_tenant(&self, tenant_id: &TenantId) -> Result<Vec<MirrorRecord>>;

    /// Set a record's priority score
    ///
    /// # Errors
    ///
    /// Returns an error if the record doesn't exist or the database operation fails
    async fn set_priority_score(&self, id: &RecordId, score: Option<f64>) -> Result<()>;

    /// Set a record's local workflow status
    ///
    /// # Errors
    ///
    /// Returns an error if the record doesn't exist or the database operation fails
    async fn set_status(&self, id: &RecordId, status: &str) -> Result<()>;
}

// ============================================================================
// SQLite Implementation
// ============================================================================

/// SQLite implementation of RecordRepository
pub struct SqliteRecordRepository {
    pool: SqlitePool,
}

impl SqliteRecordRepository {
    /// Create a new SQLite record repository
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

/// Parse a JSON object column into a field map
fn parse_field_map(raw: &str) -> Result<FieldMap> {
    serde_json::from_str(raw).map_err(|e| StoreError::FieldPayload(e.to_string()))
}

/// Serialize a field map for a JSON object column
fn encode_field_map(fields: &FieldMap) -> Result<String> {
    serde_json::to_string(fields).map_err(|e| StoreError::FieldPayload(e.to_string()))
}

/// Database row representation of a mirrored record
#[derive(Debug, FromRow)]
struct MirrorRecordRow {
    id: String,
    tenant_id: String,
    remote_record_id: String,
    status: String,
    priority_score: Option<f64>,
    custom_fields: String,
    key_fields: String,
    created_at: i64,
    updated_at: i64,
    synced_at: Option<i64>,
}

impl TryFrom<MirrorRecordRow> for MirrorRecord {
    type Error = StoreError;

    fn try_from(row: MirrorRecordRow) -> Result<Self> {
        Ok(MirrorRecord {
            id: RecordId::from_string(&row.id)?,
            tenant_id: TenantId::from_string(&row.tenant_id)?,
            remote_record_id: row.remote_record_id,
            status: row.status,
            priority_score: row.priority_score,
            custom_fields: parse_field_map(&row.custom_fields)?,
            key_fields: parse_field_map(&row.key_fields)?,
            created_at: row.created_at,
            updated_at: row.updated_at,
            synced_at: row.synced_at,
        })
    }
}

const RECORD_COLUMNS: &str = r#"
    id, tenant_id, remote_record_id, status, priority_score,
    custom_fields, key_fields, created_at, updated_at, synced_at
"#;

#[async_trait]
impl RecordRepository for SqliteRecordRepository {
    async fn upsert(&self, upsert: &RecordUpsert) -> Result<MirrorRecord> {
        let now = now_timestamp();

        // status and priority_score are deliberately absent from the
        // conflict update; inbound sync never overwrites local state.
        sqlx::query(
            r#"
            INSERT INTO records (
                id, tenant_id, remote_record_id, status, priority_score,
                custom_fields, key_fields, created_at, updated_at, synced_at
            ) VALUES (?, ?, ?, 'pending', NULL, ?, ?, ?, ?, ?)
            ON CONFLICT (tenant_id, remote_record_id) DO UPDATE SET
                custom_fields = excluded.custom_fields,
                key_fields = excluded.key_fields,
                synced_at = excluded.synced_at,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(RecordId::new().as_str())
        .bind(upsert.tenant_id.as_str())
        .bind(&upsert.remote_record_id)
        .bind(encode_field_map(&upsert.custom_fields)?)
        .bind(encode_field_map(&upsert.key_fields)?)
        .bind(now)
        .bind(now)
        .bind(upsert.synced_at)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Database(e.to_string()))?;

        self.find_by_remote_id(&upsert.tenant_id, &upsert.remote_record_id)
            .await?
            .ok_or_else(|| StoreError::RecordNotFound {
                record_id: upsert.remote_record_id.clone(),
            })
    }

    async fn find_by_id(&self, id: &RecordId) -> Result<Option<MirrorRecord>> {
        let row = sqlx::query_as::<_, MirrorRecordRow>(&format!(
            "SELECT {} FROM records WHERE id = ?",
            RECORD_COLUMNS
        ))
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::Database(e.to_string()))?;

        row.map(MirrorRecord::try_from).transpose()
    }

    async fn find_by_remote_id(
        &self,
        tenant_id: &TenantId,
        remote_record_id: &str,
    ) -> Result<Option<MirrorRecord>> {
        let row = sqlx::query_as::<_, MirrorRecordRow>(&format!(
            "SELECT {} FROM records WHERE tenant_id = ? AND remote_record_id = ?",
            RECORD_COLUMNS
        ))
        .bind(tenant_id.as_str())
        .bind(remote_record_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::Database(e.to_string()))?;

        row.map(MirrorRecord::try_from).transpose()
    }

    async fn list_for_tenant(&self, tenant_id: &TenantId) -> Result<Vec<MirrorRecord>> {
        let rows = sqlx::query_as::<_, MirrorRecordRow>(&format!(
            r#"
            SELECT {}
            FROM records
            WHERE tenant_id = ?
            ORDER BY updated_at DESC
            "#,
            RECORD_COLUMNS
        ))
        .bind(tenant_id.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::Database(e.to_string()))?;

        rows.into_iter()
            .map(MirrorRecord::try_from)
            .collect::<Result<Vec<_>>>()
    }

    async fn set_priority_score(&self, id: &RecordId, score: Option<f64>) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE records
            SET priority_score = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(score)
        .bind(now_timestamp())
        .bind(id.as_str())
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Database(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::RecordNotFound {
                record_id: id.to_string(),
            });
        }

        Ok(())
    }

    async fn set_status(&self, id: &RecordId, status: &str) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE records
            SET status = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(status)
        .bind(now_timestamp())
        .bind(id.as_str())
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Database(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::RecordNotFound {
                record_id: id.to_string(),
            });
        }

        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
