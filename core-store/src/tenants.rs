//! # Tenant Repository
//!
//! Provides database persistence for tenants.
//!
//! ## Overview
//!
//! This repository handles tenant lookup for sync runs, the scheduler's
//! due-tenant scan, and cursor advancement after a successful pull.

use crate::models::{now_timestamp, Tenant, TenantId};
use crate::{Result, StoreError};
use async_trait::async_trait;
use sqlx::{FromRow, SqlitePool};

// ============================================================================
// Repository Trait
// ============================================================================

/// Repository trait for tenant persistence
#[async_trait]
pub trait TenantRepository: Send + Sync {
    /// Insert a new tenant
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails
    async fn insert(&self, tenant: &Tenant) -> Result<()>;

    /// Find a tenant by ID
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails
    async fn find_by_id(&self, id: &TenantId) -> Result<Option<Tenant>>;

    /// List tenants that are due for a scheduled pull at `now`.
    ///
    /// A tenant is due when sync is enabled and it has either never synced or
    /// its interval has elapsed since the last successful pull.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails
    async fn list_due(&self, now: i64) -> Result<Vec<Tenant>>;

    /// Advance a tenant's cursor to `cursor` after a successful pull
    ///
    /// # Errors
    ///
    /// Returns an error if the tenant doesn't exist or the database operation fails
    async fn advance_cursor(&self, id: &TenantId, cursor: i64) -> Result<()>;

    /// Enable or disable scheduled syncs for a tenant
    ///
    /// # Errors
    ///
    /// Returns an error if the tenant doesn't exist or the database operation fails
    async fn set_sync_enabled(&self, id: &TenantId, enabled: bool) -> Result<()>;
}

// ============================================================================
// SQLite Implementation
// ============================================================================

/// SQLite implementation of TenantRepository
pub struct SqliteTenantRepository {
    pool: SqlitePool,
}

impl SqliteTenantRepository {
    /// Create a new SQLite tenant repository
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

/// Database row representation of a tenant
#[derive(Debug, FromRow)]
struct TenantRow {
    id: String,
    name: String,
    api_token: String,
    base_id: String,
    table_id: String,
    sync_interval_minutes: i64,
    last_sync_at: Option<i64>,
    sync_enabled: bool,
    created_at: i64,
    updated_at: i64,
}

impl TryFrom<TenantRow> for Tenant {
    type Error = StoreError;

    fn try_from(row: TenantRow) -> Result<Self> {
        Ok(Tenant {
            id: TenantId::from_string(&row.id)?,
            name: row.name,
            api_token: row.api_token,
            base_id: row.base_id,
            table_id: row.table_id,
            sync_interval_minutes: row.sync_interval_minutes,
            last_sync_at: row.last_sync_at,
            sync_enabled: row.sync_enabled,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

const TENANT_COLUMNS: &str = r#"
    id, name, api_token, base_id, table_id,
    sync_interval_minutes, last_sync_at, sync_enabled,
    created_at, updated_at
"#;

#[async_trait]
impl TenantRepository for SqliteTenantRepository {
    async fn insert(&self, tenant: &Tenant) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO tenants (
                id, name, api_token, base_id, table_id,
                sync_interval_minutes, last_sync_at, sync_enabled,
                created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(tenant.id.as_str())
        .bind(&tenant.name)
        .bind(&tenant.api_token)
        .bind(&tenant.base_id)
        .bind(&tenant.table_id)
        .bind(tenant.sync_interval_minutes)
        .bind(tenant.last_sync_at)
        .bind(tenant.sync_enabled)
        .bind(tenant.created_at)
        .bind(tenant.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(())
    }

    async fn find_by_id(&self, id: &TenantId) -> Result<Option<Tenant>> {
        let row = sqlx::query_as::<_, TenantRow>(&format!(
            "SELECT {} FROM tenants WHERE id = ?",
            TENANT_COLUMNS
        ))
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::Database(e.to_string()))?;

        row.map(Tenant::try_from).transpose()
    }

    async fn list_due(&self, now: i64) -> Result<Vec<Tenant>> {
        let rows = sqlx::query_as::<_, TenantRow>(&format!(
            r#"
            SELECT {}
            FROM tenants
            WHERE sync_enabled = 1
              AND (last_sync_at IS NULL OR last_sync_at + sync_interval_minutes * 60 <= ?)
            ORDER BY created_at ASC
            "#,
            TENANT_COLUMNS
        ))
        .bind(now)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::Database(e.to_string()))?;

        rows.into_iter()
            .map(Tenant::try_from)
            .collect::<Result<Vec<_>>>()
    }

    async fn advance_cursor(&self, id: &TenantId, cursor: i64) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE tenants
            SET last_sync_at = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(cursor)
        .bind(now_timestamp())
        .bind(id.as_str())
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Database(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::TenantNotFound {
                tenant_id: id.to_string(),
            });
        }

        Ok(())
    }

    async fn set_sync_enabled(&self, id: &TenantId, enabled: bool) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE tenants
            SET sync_enabled = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(enabled)
        .bind(now_timestamp())
        .bind(id.as_str())
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Database(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::TenantNotFound {
                tenant_id: id.to_string(),
            });
        }

        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::create_test_pool;

    fn tenant(name: &str, interval_minutes: i64) -> Tenant {
        Tenant::new(
            name.to_string(),
            "pat_test".to_string(),
            "appBase1".to_string(),
            "tblOrders".to_string(),
            interval_minutes,
        )
    }

    #[tokio::test]
    async fn test_insert_and_find_by_id() {
        let pool = create_test_pool().await.unwrap();
        let repo = SqliteTenantRepository::new(pool);

        let t = tenant("acme", 15);
        let id = t.id;
        repo.insert(&t).await.unwrap();

        let found = repo.find_by_id(&id).await.unwrap().unwrap();
        assert_eq!(found.id, id);
        assert_eq!(found.name, "acme");
        assert_eq!(found.last_sync_at, None);
        assert!(found.sync_enabled);
    }

    #[tokio::test]
    async fn test_list_due_filters_by_cursor_and_interval() {
        let pool = create_test_pool().await.unwrap();
        let repo = SqliteTenantRepository::new(pool);
        let now = now_timestamp();

        // Never synced: due
        let never = tenant("never", 15);
        repo.insert(&never).await.unwrap();

        // Synced long ago: due
        let mut stale = tenant("stale", 15);
        stale.last_sync_at = Some(now - 3600);
        repo.insert(&stale).await.unwrap();

        // Synced recently: not due
        let mut fresh = tenant("fresh", 15);
        fresh.last_sync_at = Some(now - 60);
        repo.insert(&fresh).await.unwrap();

        // Disabled: never due
        let mut disabled = tenant("disabled", 15);
        disabled.sync_enabled = false;
        repo.insert(&disabled).await.unwrap();

        let due = repo.list_due(now).await.unwrap();
        let names: Vec<_> = due.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["never", "stale"]);
    }

    #[tokio::test]
    async fn test_advance_cursor() {
        let pool = create_test_pool().await.unwrap();
        let repo = SqliteTenantRepository::new(pool);

        let t = tenant("acme", 15);
        let id = t.id;
        repo.insert(&t).await.unwrap();

        let cursor = now_timestamp();
        repo.advance_cursor(&id, cursor).await.unwrap();

        let found = repo.find_by_id(&id).await.unwrap().unwrap();
        assert_eq!(found.last_sync_at, Some(cursor));

        // Tenant with an up-to-date cursor is no longer due
        let due = repo.list_due(cursor).await.unwrap();
        assert!(due.is_empty());
    }

    #[tokio::test]
    async fn test_advance_cursor_missing_tenant() {
        let pool = create_test_pool().await.unwrap();
        let repo = SqliteTenantRepository::new(pool);

        let err = repo
            .advance_cursor(&TenantId::new(), now_timestamp())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::TenantNotFound { .. }));
    }

    #[tokio::test]
    async fn test_set_sync_enabled() {
        let pool = create_test_pool().await.unwrap();
        let repo = SqliteTenantRepository::new(pool);

        let t = tenant("acme", 15);
        let id = t.id;
        repo.insert(&t).await.unwrap();

        repo.set_sync_enabled(&id, false).await.unwrap();
        assert!(!repo.find_by_id(&id).await.unwrap().unwrap().sync_enabled);

        let due = repo.list_due(now_timestamp()).await.unwrap();
        assert!(due.is_empty());
    }
}
