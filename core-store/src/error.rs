use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Tenant {tenant_id} not found")]
    TenantNotFound { tenant_id: String },

    #[error("Record {record_id} not found")]
    RecordNotFound { record_id: String },

    #[error("Change entry {change_id} not found")]
    ChangeNotFound { change_id: String },

    #[error("Sync log {log_id} not found")]
    LogNotFound { log_id: String },

    #[error("Invalid ID: {0}")]
    InvalidId(String),

    #[error("Invalid status: {0}")]
    InvalidStatus(String),

    #[error("Invalid sync direction: {0}")]
    InvalidDirection(String),

    #[error("Invalid change kind: {0}")]
    InvalidChangeKind(String),

    #[error("Invalid field payload: {0}")]
    FieldPayload(String),

    #[error("Database error: {0}")]
    Database(String),
}

pub type Result<T> = std::result::Result<T, StoreError>;
