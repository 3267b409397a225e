//! # Mirror Store
//!
//! Tenant-scoped persistence for the local mirror.
//!
//! ## Overview
//!
//! This crate owns the SQLite schema and the repository traits the engine
//! talks through:
//!
//! - **Tenants**: remote credentials, per-tenant cursor, sync cadence
//! - **Field mappings**: which remote fields each tenant mirrors
//! - **Records**: local copies upserted by natural key
//! - **Outbound changes**: FIFO queue of local edits awaiting push
//! - **Sync logs**: per-run audit trail
//! - **Step results**: durable outputs of orchestrated run steps
//!
//! Repository traits are object-safe so the engine can hold them as
//! `Arc<dyn ...>` and tests can substitute in-memory fakes.

pub mod change_queue;
pub mod error;
pub mod mappings;
pub mod models;
pub mod records;
pub mod schema;
pub mod step_results;
pub mod sync_logs;
pub mod tenants;

pub use change_queue::{ChangeQueueRepository, SqliteChangeQueueRepository};
pub use error::{Result, StoreError};
pub use mappings::{FieldMappingRepository, SqliteFieldMappingRepository};
pub use models::{
    now_timestamp, ChangeEntry, ChangeEntryId, ChangeKind, ChangeStatus, FieldMapping, MappingId,
    MirrorRecord, NewChange, RecordId, RecordUpsert, SyncDirection, SyncLog, SyncLogId,
    SyncLogStatus, SyncRunId, Tenant, TenantId,
};
pub use records::{RecordRepository, SqliteRecordRepository};
pub use step_results::{SqliteStepResultRepository, StepResultRepository};
pub use sync_logs::{SqliteSyncLogRepository, SyncLogRepository};
pub use tenants::{SqliteTenantRepository, TenantRepository};
