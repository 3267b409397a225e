use thiserror::Error;

/// Errors returned by the remote system or the transport underneath it.
///
/// The engine uses [`RemoteError::is_retryable`] to decide whether a failed
/// run or queue item should be re-attempted or marked terminally failed.
#[derive(Error, Debug, Clone)]
pub enum RemoteError {
    /// Connection failed, DNS error, or request timed out
    #[error("network error: {0}")]
    Network(String),

    /// The remote API rejected the request for rate-limiting reasons
    #[error("rate limited by remote API")]
    RateLimited { retry_after_secs: Option<u64> },

    /// The remote API returned an unexpected status
    #[error("remote API error (status {status}): {message}")]
    Api { status: u16, message: String },

    /// Credentials rejected or insufficient scope
    #[error("authentication rejected: {0}")]
    Auth(String),

    /// The target record does not exist upstream
    #[error("record {record_id} not found in table {table_id}")]
    RecordNotFound { table_id: String, record_id: String },

    /// The request payload was rejected as invalid
    #[error("invalid request: {0}")]
    Validation(String),

    /// Response body could not be decoded
    #[error("failed to parse remote response: {0}")]
    Parse(String),
}

impl RemoteError {
    /// Whether a retry with the same inputs can reasonably succeed.
    ///
    /// Network failures, rate limits, and server-side (5xx) errors are
    /// transient; auth, validation, and parse failures are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            RemoteError::Network(_) | RemoteError::RateLimited { .. } => true,
            RemoteError::Api { status, .. } => *status >= 500,
            RemoteError::Auth(_)
            | RemoteError::RecordNotFound { .. }
            | RemoteError::Validation(_)
            | RemoteError::Parse(_) => false,
        }
    }

    /// Map an HTTP status and body to the matching error variant.
    pub fn from_status(status: u16, message: String) -> Self {
        match status {
            401 | 403 => RemoteError::Auth(message),
            422 => RemoteError::Validation(message),
            429 => RemoteError::RateLimited {
                retry_after_secs: None,
            },
            _ => RemoteError::Api { status, message },
        }
    }
}

pub type Result<T> = std::result::Result<T, RemoteError>;
