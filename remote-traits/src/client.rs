//! Remote record store client trait and its record/schema types.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Dynamic bag of field name to value, as the remote system reports it.
///
/// Field sets vary per tenant and per record; no fixed struct can describe
/// them, so they travel as ordered JSON maps end to end.
pub type FieldMap = serde_json::Map<String, serde_json::Value>;

/// One record as returned by the remote system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteRecord {
    /// Remote-assigned opaque record identifier
    pub id: String,
    /// Full field bag for the record
    pub fields: FieldMap,
    /// Creation time upstream, as Unix epoch seconds, when reported
    pub created_time: Option<i64>,
}

/// Schema descriptor for one field of a remote table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteFieldSchema {
    /// Remote-assigned field identifier
    pub id: String,
    /// Human-facing field name, as used as the key in [`FieldMap`]
    pub name: String,
    /// Remote type tag (e.g. "singleLineText", "number")
    pub field_type: String,
}

/// Capability trait for the external record store.
///
/// Implementations wrap one remote account (one credential, one base). The
/// engine holds them as `Arc<dyn RemoteClient>` so tests can substitute mocks.
#[async_trait]
pub trait RemoteClient: Send + Sync {
    /// List records modified strictly after `since`, or all records when
    /// `since` is `None`.
    ///
    /// Implementations must follow pagination to exhaustion; the returned
    /// vector is the complete changed set.
    async fn list_changed(
        &self,
        table_id: &str,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<RemoteRecord>>;

    /// Patch a subset of one record's fields upstream.
    ///
    /// Fields absent from `fields` are left untouched on the remote side.
    async fn update_fields(&self, table_id: &str, record_id: &str, fields: &FieldMap)
        -> Result<()>;

    /// Fetch the field schema of a table.
    async fn fetch_schema(&self, table_id: &str) -> Result<Vec<RemoteFieldSchema>>;
}
