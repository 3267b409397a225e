//! # Domain Models
//!
//! Core types persisted by the mirror store.
//!
//! ## Overview
//!
//! Everything here is tenant-scoped. A [`Tenant`] owns its remote credentials
//! and cursor; [`FieldMapping`] rows describe which remote fields the tenant
//! cares about; [`MirrorRecord`] rows are the local copies keyed by the
//! natural key `(tenant_id, remote_record_id)`; [`ChangeEntry`] rows queue
//! local edits awaiting push; [`SyncLog`] rows are the per-run audit trail.
//!
//! Timestamps are Unix epoch seconds throughout.

use crate::{Result, StoreError};
use remote_traits::FieldMap;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

/// Current Unix timestamp in seconds
pub fn now_timestamp() -> i64 {
    chrono::Utc::now().timestamp()
}

// ============================================================================
// ID Types
// ============================================================================

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(Uuid);

        impl $name {
            /// Create a new random ID
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Parse an ID from a string
            ///
            /// # Errors
            ///
            /// Returns an error if the string is not a valid UUID
            pub fn from_string(s: &str) -> Result<Self> {
                Uuid::parse_str(s)
                    .map(Self)
                    .map_err(|e| StoreError::InvalidId(e.to_string()))
            }

            /// Get the string representation of this ID
            pub fn as_str(&self) -> String {
                self.0.to_string()
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

define_id!(
    /// Unique identifier for a tenant
    TenantId
);
define_id!(
    /// Unique identifier for a field mapping
    MappingId
);
define_id!(
    /// Unique identifier for a mirrored record
    RecordId
);
define_id!(
    /// Unique identifier for an outbound change entry
    ChangeEntryId
);
define_id!(
    /// Unique identifier for a sync log entry
    SyncLogId
);
define_id!(
    /// Unique identifier for one orchestrated sync run
    SyncRunId
);

// ============================================================================
// Status Types
// ============================================================================

/// Direction of a sync operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncDirection {
    /// Remote to local (inbound)
    Pull,
    /// Local to remote (outbound)
    Push,
}

impl SyncDirection {
    /// Get the string representation for database storage
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncDirection::Pull => "pull",
            SyncDirection::Push => "push",
        }
    }
}

impl FromStr for SyncDirection {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pull" => Ok(SyncDirection::Pull),
            "push" => Ok(SyncDirection::Push),
            _ => Err(StoreError::InvalidDirection(s.to_string())),
        }
    }
}

impl std::fmt::Display for SyncDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Status of a sync log entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncLogStatus {
    /// Run has started and not yet finished
    Started,
    /// Run completed successfully
    Completed,
    /// Run failed with an error
    Failed,
}

impl SyncLogStatus {
    /// Check if this status represents a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(self, SyncLogStatus::Completed | SyncLogStatus::Failed)
    }

    /// Get the string representation for database storage
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncLogStatus::Started => "started",
            SyncLogStatus::Completed => "completed",
            SyncLogStatus::Failed => "failed",
        }
    }
}

impl FromStr for SyncLogStatus {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "started" => Ok(SyncLogStatus::Started),
            "completed" => Ok(SyncLogStatus::Completed),
            "failed" => Ok(SyncLogStatus::Failed),
            _ => Err(StoreError::InvalidStatus(s.to_string())),
        }
    }
}

/// Status of an outbound change entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeStatus {
    /// Waiting to be pushed
    Pending,
    /// Pushed successfully
    Completed,
    /// Last push attempt failed
    Failed,
}

impl ChangeStatus {
    /// Check if this status represents a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(self, ChangeStatus::Completed)
    }

    /// Get the string representation for database storage
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeStatus::Pending => "pending",
            ChangeStatus::Completed => "completed",
            ChangeStatus::Failed => "failed",
        }
    }
}

impl FromStr for ChangeStatus {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pending" => Ok(ChangeStatus::Pending),
            "completed" => Ok(ChangeStatus::Completed),
            "failed" => Ok(ChangeStatus::Failed),
            _ => Err(StoreError::InvalidStatus(s.to_string())),
        }
    }
}

/// Kind of local edit queued for push
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    /// Status field change
    Status,
    /// Free-text notes change
    Notes,
    /// Tag list change
    Tags,
    /// Arbitrary mapped-field change
    Field,
}

impl ChangeKind {
    /// Get the string representation for database storage
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeKind::Status => "status",
            ChangeKind::Notes => "notes",
            ChangeKind::Tags => "tags",
            ChangeKind::Field => "field",
        }
    }
}

impl FromStr for ChangeKind {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "status" => Ok(ChangeKind::Status),
            "notes" => Ok(ChangeKind::Notes),
            "tags" => Ok(ChangeKind::Tags),
            "field" => Ok(ChangeKind::Field),
            _ => Err(StoreError::InvalidChangeKind(s.to_string())),
        }
    }
}

// ============================================================================
// Domain Types
// ============================================================================

/// A tenant: one remote account mirrored into the local store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tenant {
    /// Unique identifier
    pub id: TenantId,
    /// Display name
    pub name: String,
    /// Remote API credential
    pub api_token: String,
    /// Remote base identifier
    pub base_id: String,
    /// Remote table identifier or name
    pub table_id: String,
    /// Minimum minutes between scheduled pulls
    pub sync_interval_minutes: i64,
    /// Cursor: start instant of the last successful pull, None before first
    pub last_sync_at: Option<i64>,
    /// Whether the scheduler may dispatch this tenant
    pub sync_enabled: bool,
    /// Unix timestamp when created
    pub created_at: i64,
    /// Unix timestamp when last updated
    pub updated_at: i64,
}

impl Tenant {
    /// Create a new tenant with sync enabled and no cursor
    pub fn new(
        name: String,
        api_token: String,
        base_id: String,
        table_id: String,
        sync_interval_minutes: i64,
    ) -> Self {
        let now = now_timestamp();
        Self {
            id: TenantId::new(),
            name,
            api_token,
            base_id,
            table_id,
            sync_interval_minutes,
            last_sync_at: None,
            sync_enabled: true,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether this tenant is due for a scheduled pull at `now`
    pub fn is_due(&self, now: i64) -> bool {
        if !self.sync_enabled {
            return false;
        }
        match self.last_sync_at {
            None => true,
            Some(last) => last + self.sync_interval_minutes * 60 <= now,
        }
    }
}

/// One remote field a tenant has chosen to mirror
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldMapping {
    /// Unique identifier
    pub id: MappingId,
    /// Owning tenant
    pub tenant_id: TenantId,
    /// Remote field identifier
    pub remote_field_id: String,
    /// Remote field name, the key used in record field bags
    pub remote_field_name: String,
    /// Remote field type tag
    pub remote_field_type: String,
    /// Name shown in local UIs
    pub display_name: String,
    /// Whether the field belongs to the record's key-field projection
    pub visible_in_list: bool,
    /// Whether the field is shown in detail views
    pub visible_in_detail: bool,
    /// Ordering hint for display
    pub sort_order: Option<i64>,
    /// Weight contributed to a record's priority score
    pub priority_weight: f64,
    /// Unix timestamp when created
    pub created_at: i64,
}

/// A locally mirrored record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MirrorRecord {
    /// Unique identifier
    pub id: RecordId,
    /// Owning tenant
    pub tenant_id: TenantId,
    /// Remote record identifier, unique per tenant
    pub remote_record_id: String,
    /// Local workflow status, owned by this side
    pub status: String,
    /// Derived score, owned by the scorer
    pub priority_score: Option<f64>,
    /// Full remote field bag as last fetched
    pub custom_fields: FieldMap,
    /// Projection of the mapped key fields
    pub key_fields: FieldMap,
    /// Unix timestamp when first mirrored
    pub created_at: i64,
    /// Unix timestamp when last updated
    pub updated_at: i64,
    /// Unix timestamp of the last inbound refresh
    pub synced_at: Option<i64>,
}

/// Arguments for one record upsert during inbound sync
#[derive(Debug, Clone)]
pub struct RecordUpsert {
    pub tenant_id: TenantId,
    pub remote_record_id: String,
    pub custom_fields: FieldMap,
    pub key_fields: FieldMap,
    pub synced_at: i64,
}

/// A local edit queued for push to the remote
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeEntry {
    /// Unique identifier
    pub id: ChangeEntryId,
    /// Owning tenant
    pub tenant_id: TenantId,
    /// Local record the edit belongs to, if it still exists
    pub record_id: Option<RecordId>,
    /// Remote record the edit targets
    pub remote_record_id: String,
    /// Kind of edit
    pub kind: ChangeKind,
    /// Field bag to patch upstream, keyed by remote field name
    pub change_data: FieldMap,
    /// Current status
    pub status: ChangeStatus,
    /// Number of push attempts so far
    pub attempts: i64,
    /// Unix timestamp of the last attempt
    pub last_attempt_at: Option<i64>,
    /// Error message from the last failed attempt
    pub error_message: Option<String>,
    /// Unix timestamp when enqueued
    pub created_at: i64,
    /// Unix timestamp when pushed successfully
    pub completed_at: Option<i64>,
}

impl ChangeEntry {
    /// Check if this entry is eligible for another push attempt
    pub fn can_retry(&self, max_attempts: i64) -> bool {
        self.status == ChangeStatus::Failed && self.attempts < max_attempts
    }
}

/// Arguments for enqueuing a new outbound change
#[derive(Debug, Clone)]
pub struct NewChange {
    pub tenant_id: TenantId,
    pub record_id: Option<RecordId>,
    pub remote_record_id: String,
    pub kind: ChangeKind,
    pub change_data: FieldMap,
}

/// One row of the per-run audit trail
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncLog {
    /// Unique identifier
    pub id: SyncLogId,
    /// Owning tenant
    pub tenant_id: TenantId,
    /// Direction of the run
    pub direction: SyncDirection,
    /// Current status
    pub status: SyncLogStatus,
    /// Records handled successfully
    pub records_processed: i64,
    /// Records that failed
    pub records_failed: i64,
    /// Error message for failed runs
    pub error_message: Option<String>,
    /// Unix timestamp when the run started
    pub started_at: i64,
    /// Unix timestamp when the run reached a terminal state
    pub completed_at: Option<i64>,
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_roundtrip() {
        let id = TenantId::new();
        let parsed = TenantId::from_string(&id.as_str()).unwrap();
        assert_eq!(id, parsed);

        assert!(matches!(
            TenantId::from_string("not-a-uuid"),
            Err(StoreError::InvalidId(_))
        ));
    }

    #[test]
    fn test_status_string_roundtrip() {
        for status in [
            ChangeStatus::Pending,
            ChangeStatus::Completed,
            ChangeStatus::Failed,
        ] {
            assert_eq!(status.as_str().parse::<ChangeStatus>().unwrap(), status);
        }
        for status in [
            SyncLogStatus::Started,
            SyncLogStatus::Completed,
            SyncLogStatus::Failed,
        ] {
            assert_eq!(status.as_str().parse::<SyncLogStatus>().unwrap(), status);
        }
        assert!("bogus".parse::<ChangeStatus>().is_err());
    }

    #[test]
    fn test_tenant_due_check() {
        let mut tenant = Tenant::new(
            "acme".to_string(),
            "pat_x".to_string(),
            "appX".to_string(),
            "tblX".to_string(),
            15,
        );
        let now = now_timestamp();

        // Never synced: always due
        assert!(tenant.is_due(now));

        // Synced just now: not due
        tenant.last_sync_at = Some(now);
        assert!(!tenant.is_due(now));

        // Interval elapsed exactly: due
        tenant.last_sync_at = Some(now - 15 * 60);
        assert!(tenant.is_due(now));

        // Disabled tenants are never due
        tenant.sync_enabled = false;
        assert!(!tenant.is_due(now));
    }

    #[test]
    fn test_change_retry_eligibility() {
        let entry = ChangeEntry {
            id: ChangeEntryId::new(),
            tenant_id: TenantId::new(),
            record_id: None,
            remote_record_id: "rec1".to_string(),
            kind: ChangeKind::Status,
            change_data: FieldMap::new(),
            status: ChangeStatus::Failed,
            attempts: 2,
            last_attempt_at: Some(now_timestamp()),
            error_message: Some("boom".to_string()),
            created_at: now_timestamp(),
            completed_at: None,
        };

        assert!(entry.can_retry(3));
        assert!(!entry.can_retry(2));

        let done = ChangeEntry {
            status: ChangeStatus::Completed,
            ..entry
        };
        assert!(!done.can_retry(3));
    }
}
