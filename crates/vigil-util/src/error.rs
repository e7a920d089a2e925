//! Error types for vigil

use thiserror::Error;

/// Errors from the budget engine lifecycle
#[derive(Debug, Error)]
pub enum VigilError {
    #[error("Budget engine is already running")]
    AlreadyRunning,

    #[error("Budget engine is not running")]
    NotRunning,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl VigilError {
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, VigilError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_messages() {
        assert_eq!(
            VigilError::internal("no runtime").to_string(),
            "Internal error: no runtime"
        );
        assert_eq!(
            VigilError::AlreadyRunning.to_string(),
            "Budget engine is already running"
        );
    }
}
