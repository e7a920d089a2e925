//! Host action traits

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// Errors from host actions
#[derive(Debug, Error)]
pub enum HostError {
    #[error("Spawn failed: {0}")]
    SpawnFailed(String),

    #[error("Command '{program}' failed: {status}")]
    CommandFailed { program: String, status: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type HostResult<T> = Result<T, HostError>;

/// Tells the user how much time is left
#[async_trait]
pub trait Announcer: Send + Sync {
    async fn announce_remaining(&self, remaining: Duration) -> HostResult<()>;
}

/// Enforces the budget once it is exhausted (e.g. suspends the device)
#[async_trait]
pub trait Restrictor: Send + Sync {
    async fn restrict(&self) -> HostResult<()>;
}
