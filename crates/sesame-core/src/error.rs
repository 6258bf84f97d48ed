//! Error type shared by every Sesame crate.

use thiserror::Error;

/// Result alias used across the workspace.
pub type Result<T> = std::result::Result<T, SesameError>;

#[derive(Debug, Error)]
pub enum SesameError {
    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    /// A task's own operation failed. Contained to that task.
    #[error("Task error: {0}")]
    Task(String),

    #[error("Timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// The run was stopped through its cancellation token.
    #[error("Cancelled: {0}")]
    Cancelled(String),

    #[error("RPC error: {0}")]
    Rpc(String),

    #[error("Schedule error: {0}")]
    Schedule(String),
}

impl SesameError {
    /// True for the only error kind that is allowed to abort a whole run.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, SesameError::Cancelled(_))
    }
}

impl From<serde_json::Error> for SesameError {
    fn from(e: serde_json::Error) -> Self {
        SesameError::Serialization(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_cancelled_is_cancelled() {
        assert!(SesameError::Cancelled("stop".into()).is_cancelled());
        assert!(!SesameError::Task("boom".into()).is_cancelled());
        assert!(!SesameError::Timeout(std::time::Duration::from_secs(1)).is_cancelled());
    }

    #[test]
    fn test_io_conversion() {
        let err: SesameError = std::io::Error::other("disk").into();
        assert!(err.to_string().contains("disk"));
    }
}
