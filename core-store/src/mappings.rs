//! # Field Mapping Repository
//!
//! Provides database persistence for per-tenant field mappings.

use crate::models::{FieldMapping, MappingId, TenantId};
use crate::{Result, StoreError};
use async_trait::async_trait;
use sqlx::{FromRow, SqlitePool};

// ============================================================================
// Repository Trait
// ============================================================================

/// Repository trait for field mapping persistence
#[async_trait]
pub trait FieldMappingRepository: Send + Sync {
    /// Insert a new field mapping
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails
    async fn insert(&self, mapping: &FieldMapping) -> Result<()>;

    /// List a tenant's mappings ordered by sort order, then name
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails
    async fn list_for_tenant(&self, tenant_id: &TenantId) -> Result<Vec<FieldMapping>>;

    /// Delete a field mapping
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails
    async fn delete(&self, id: &MappingId) -> Result<()>;
}

// ============================================================================
// SQLite Implementation
// ============================================================================

/// SQLite implementation of FieldMappingRepository
pub struct SqliteFieldMappingRepository {
    pool: SqlitePool,
}

impl SqliteFieldMappingRepository {
    /// Create a new SQLite field mapping repository
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

/// Database row representation of a field mapping
#[derive(Debug, FromRow)]
struct FieldMappingRow {
    id: String,
    tenant_id: String,
    remote_field_id: String,
    remote_field_name: String,
    remote_field_type: String,
    display_name: String,
    visible_in_list: bool,
    visible_in_detail: bool,
    sort_order: Option<i64>,
    priority_weight: f64,
    created_at: i64,
}

impl TryFrom<FieldMappingRow> for FieldMapping {
    type Error = StoreError;

    fn try_from(row: FieldMappingRow) -> Result<Self> {
        Ok(FieldMapping {
            id: MappingId::from_string(&row.id)?,
            tenant_id: TenantId::from_string(&row.tenant_id)?,
            remote_field_id: row.remote_field_id,
            remote_field_name: row.remote_field_name,
            remote_field_type: row.remote_field_type,
            display_name: row.display_name,
            visible_in_list: row.visible_in_list,
            visible_in_detail: row.visible_in_detail,
            sort_order: row.sort_order,
            priority_weight: row.priority_weight,
            created_at: row.created_at,
        })
    }
}

#[async_trait]
impl FieldMappingRepository for SqliteFieldMappingRepository {
    async fn insert(&self, mapping: &FieldMapping) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO field_mappings (
                id, tenant_id, remote_field_id, remote_field_name,
                remote_field_type, display_name, visible_in_list,
                visible_in_detail, sort_order, priority_weight, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(mapping.id.as_str())
        .bind(mapping.tenant_id.as_str())
        .bind(&mapping.remote_field_id)
        .bind(&mapping.remote_field_name)
        .bind(&mapping.remote_field_type)
        .bind(&mapping.display_name)
        .bind(mapping.visible_in_list)
        .bind(mapping.visible_in_detail)
        .bind(mapping.sort_order)
        .bind(mapping.priority_weight)
        .bind(mapping.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(())
    }

    async fn list_for_tenant(&self, tenant_id: &TenantId) -> Result<Vec<FieldMapping>> {
        let rows = sqlx::query_as::<_, FieldMappingRow>(
            r#"
            SELECT id, tenant_id, remote_field_id, remote_field_name,
                   remote_field_type, display_name, visible_in_list,
                   visible_in_detail, sort_order, priority_weight, created_at
            FROM field_mappings
            WHERE tenant_id = ?
            ORDER BY sort_order ASC NULLS LAST, remote_field_name ASC
            "#,
        )
        .bind(tenant_id.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::Database(e.to_string()))?;

        rows.into_iter()
            .map(FieldMapping::try_from)
            .collect::<Result<Vec<_>>>()
    }

    async fn delete(&self, id: &MappingId) -> Result<()> {
        sqlx::query("DELETE FROM field_mappings WHERE id = ?")
            .bind(id.as_str())
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
