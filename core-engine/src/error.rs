use core_store::StoreError;
use remote_traits::RemoteError;
use thiserror::Error;

/// Errors surfaced by sync runs and the orchestration around them.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("remote error: {0}")]
    Remote(#[from] RemoteError),

    #[error("step '{step}' output could not be serialized: {message}")]
    StepSerialization { step: String, message: String },

    #[error("step '{step}' timed out after {timeout_secs}s")]
    StepTimeout { step: String, timeout_secs: u64 },

    #[error("sync run exhausted {attempts} attempts: {last_error}")]
    RetriesExhausted { attempts: u32, last_error: String },
}

impl EngineError {
    /// Whether retrying the run under the same run ID can reasonably succeed.
    ///
    /// Only transient remote failures and step timeouts qualify; store errors
    /// and serialization bugs repeat deterministically.
    pub fn is_retryable(&self) -> bool {
        match self {
            EngineError::Remote(e) => e.is_retryable(),
            EngineError::StepTimeout { .. } => true,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
