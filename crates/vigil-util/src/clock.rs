//! Clock abstraction for background tasks
//!
//! A [`Clock`] supplies wall-clock time, a cancellable wait, and a way to fork
//! an isolated time context for a background task. The daemon runs on
//! [`SystemClock`]; tests drive a [`LockStepClock`](crate::LockStepClock) so
//! that hours of simulated time pass instantly and deterministically.

use async_trait::async_trait;
use chrono::{DateTime, Local};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Returned by [`Clock::wait`] when the wait ended because of cancellation.
///
/// This is a normal termination signal, not a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cancelled;

impl fmt::Display for Cancelled {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "wait cancelled")
    }
}

impl std::error::Error for Cancelled {}

/// Source of time for a background task
#[async_trait]
pub trait Clock: Send + Sync {
    /// Current local wall-clock time as seen by this context
    fn now(&self) -> DateTime<Local>;

    /// Wait for `duration`, returning early with [`Cancelled`] if `cancel` fires
    async fn wait(&self, duration: Duration, cancel: &CancellationToken) -> Result<(), Cancelled>;

    /// Create a child context for a background task.
    ///
    /// Waits on the child do not block the parent. The child must be
    /// [`merge`](Clock::merge)d when the task finishes.
    fn fork(&self) -> Arc<dyn Clock>;

    /// Fold a forked context back into its parent
    fn merge(&self);
}

/// Real time, backed by [`crate::now`] and the tokio timer
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

#[async_trait]
impl Clock for SystemClock {
    fn now(&self) -> DateTime<Local> {
        crate::now()
    }

    async fn wait(&self, duration: Duration, cancel: &CancellationToken) -> Result<(), Cancelled> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(Cancelled),
            _ = tokio::time::sleep(duration) => Ok(()),
        }
    }

    fn fork(&self) -> Arc<dyn Clock> {
        Arc::new(SystemClock)
    }

    fn merge(&self) {}
}
