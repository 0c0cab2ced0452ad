use thiserror::Error;

/// Errors raised by a key-value backend.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageError {
    #[error("storage is unavailable")]
    Unavailable,

    #[error("storage quota exceeded")]
    QuotaExceeded,

    #[error("storage I/O error: {0}")]
    Io(String),
}

/// First structural problem found in a form payload.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormValidationError {
    #[error("form payload is not an object")]
    NotAnObject,

    #[error("missing required field '{0}'")]
    MissingField(String),

    #[error("field '{0}' must be a list")]
    NotAList(String),

    #[error("question {index}: {reason}")]
    InvalidQuestion { index: usize, reason: String },
}

/// Tagged failure of a draft store operation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DraftError {
    #[error("draft storage is unavailable")]
    StorageUnavailable,

    #[error("draft rejected: {0}")]
    Validation(#[from] FormValidationError),

    #[error("draft does not fit in storage: needs {required} bytes, {available} available")]
    Quota { required: u64, available: u64 },

    #[error("corrupt draft record: {0}")]
    CorruptRecord(String),

    #[error("failed to serialize draft: {0}")]
    Serialization(String),

    #[error("storage write failed: {0}")]
    Storage(String),
}

impl DraftError {
    /// Whether the failure should be shown as a dismissible notification
    /// rather than only through the passive auto-save indicator.
    pub fn is_notifiable(&self) -> bool {
        matches!(self, DraftError::StorageUnavailable | DraftError::Quota { .. })
    }
}

/// Errors from the remote task-creation collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TaskError {
    #[error("task rejected: {0}")]
    Rejected(String),

    #[error("task service unavailable: {0}")]
    Unavailable(String),
}

/// Errors from configuration validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("invalid config value for '{field}': {reason}")]
    Invalid { field: &'static str, reason: String },
}
