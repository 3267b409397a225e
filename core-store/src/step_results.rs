//! # Step Result Repository
//!
//! Durable storage for orchestrated run step outputs.
//!
//! ## Overview
//!
//! Each completed step of a sync run persists its serialized output keyed by
//! `(run_id, step_name)`. When a failed run is retried under the same run ID,
//! already-completed steps replay their stored output instead of re-executing,
//! which is what makes side-effecting steps safe to retry around.

use crate::models::{now_timestamp, SyncRunId};
use crate::{Result, StoreError};
use async_trait::async_trait;
use sqlx::SqlitePool;

// ============================================================================
// Repository Trait
// ============================================================================

/// Repository trait for durable step outputs
#[async_trait]
pub trait StepResultRepository: Send + Sync {
    /// Look up the stored output of a step, if it has completed before
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails
    async fn get(&self, run_id: &SyncRunId, step_name: &str) -> Result<Option<String>>;

    /// Persist a step's serialized output.
    ///
    /// Overwrites any existing output for the same key; a replay that does
    /// execute writes the same logical result.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails
    async fn put(&self, run_id: &SyncRunId, step_name: &str, output: &str) -> Result<()>;

    /// Delete all stored outputs for a run
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails
    async fn clear_run(&self, run_id: &SyncRunId) -> Result<()>;
}

// ============================================================================
// SQLite Implementation
// ============================================================================

/// SQLite implementation of StepResultRepository
pub struct SqliteStepResultRepository {
    pool: SqlitePool,
}

impl SqliteStepResultRepository {
    /// Create a new SQLite step result repository
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl StepResultRepository for SqliteStepResultRepository {
    async fn get(&self, run_id: &SyncRunId, step_name: &str) -> Result<Option<String>> {
        let output = sqlx::query_scalar::<_, String>(
            r#"
            SELECT output
            FROM step_results
            WHERE run_id = ? AND step_name = ?
            "#,
        )
        .bind(run_id.as_str())
        .bind(step_name)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(output)
    }

    async fn put(&self, run_id: &SyncRunId, step_name: &str, output: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT OR REPLACE INTO step_results (run_id, step_name, output, completed_at)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(run_id.as_str())
        .bind(step_name)
        .bind(output)
        .bind(now_timestamp())
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(())
    }

    async fn clear_run(&self, run_id: &SyncRunId) -> Result<()> {
        sqlx::query("DELETE FROM step_results WHERE run_id = ?")
            .bind(run_id.as_str())
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
