use thiserror::Error;

pub type Result<T> = std::result::Result<T, SecurityError>;

/// Error taxonomy for the access-control core.
///
/// Invalid credentials are never surfaced through this type: credential
/// checks return `Ok(false)` and `authenticate` returns the anonymous
/// principal. Only malformed input and infrastructure failures are errors.
#[derive(Error, Debug)]
pub enum SecurityError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid user record: {0}")]
    InvalidUser(String),

    #[error("Duplicate user: {0}")]
    DuplicateUser(String),

    #[error("User not found: {0}")]
    UserNotFound(String),

    #[error("Invalid credentials format: {0}")]
    InvalidCredentialsFormat(String),

    #[error("Invalid namespace {uri}: {reason}")]
    InvalidNamespace { uri: String, reason: String },

    #[error("Directory unavailable: {0}")]
    DirectoryUnavailable(String),

    #[error("Directory error: {0}")]
    Directory(String),

    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    #[error("Persistence failure: {0}")]
    PersistenceFailure(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl SecurityError {
    /// Whether a directory failure may be retried once end-to-end.
    ///
    /// Only communication-level failures qualify; protocol and
    /// configuration failures surface immediately.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            SecurityError::DirectoryUnavailable(_) | SecurityError::Io(_)
        )
    }
}
