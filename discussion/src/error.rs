//! Error types for discussion operations.

use agora_shared::Target;
use thiserror::Error;

/// Result type alias for discussion operations.
pub type ThreadResult<T> = std::result::Result<T, ThreadError>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ThreadError {
    /// No viewer credential is available.
    #[error("authentication required")]
    AuthenticationRequired,

    /// The viewer may not perform this action (e.g. editing someone else's reply).
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// The id does not exist locally or was already removed remotely.
    #[error("{0} not found")]
    NotFound(Target),

    /// Input rejected before anything was dispatched.
    #[error("validation error: {0}")]
    Validation(String),

    /// Transient transport failure.
    #[error("network error: {0}")]
    Network(String),

    /// Local and remote state have diverged.
    #[error("conflict: {0}")]
    Conflict(String),
}

impl ThreadError {
    pub fn validation(msg: impl Into<String>) -> Self {
        ThreadError::Validation(msg.into())
    }

    pub fn permission_denied(msg: impl Into<String>) -> Self {
        ThreadError::PermissionDenied(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        ThreadError::Conflict(msg.into())
    }

    /// Whether the local tree should be thrown away and re-fetched.
    pub fn requires_resync(&self) -> bool {
        matches!(
            self,
            ThreadError::Network(_) | ThreadError::Conflict(_) | ThreadError::NotFound(_)
        )
    }
}

impl From<reqwest::Error> for ThreadError {
    fn from(err: reqwest::Error) -> Self {
        ThreadError::Network(err.to_string())
    }
}
