//! Recording host actions for testing

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use crate::{Announcer, HostError, HostResult, Restrictor};

/// Implements both [`Announcer`] and [`Restrictor`], remembering every call.
///
/// Calls are recorded even when the mock is configured to fail.
#[derive(Debug, Default)]
pub struct RecordingHost {
    announcements: Mutex<Vec<Duration>>,
    restrictions: AtomicUsize,

    /// Configure announce to fail
    fail_announce: AtomicBool,

    /// Configure restrict to fail
    fail_restrict: AtomicBool,
}

impl RecordingHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remaining durations passed to every announce call, in order
    pub fn announcements(&self) -> Vec<Duration> {
        self.announcements.lock().unwrap().clone()
    }

    pub fn announcement_count(&self) -> usize {
        self.announcements.lock().unwrap().len()
    }

    pub fn last_remaining(&self) -> Option<Duration> {
        self.announcements.lock().unwrap().last().copied()
    }

    pub fn restriction_count(&self) -> usize {
        self.restrictions.load(Ordering::SeqCst)
    }

    pub fn set_fail_announce(&self, fail: bool) {
        self.fail_announce.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_restrict(&self, fail: bool) {
        self.fail_restrict.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl Announcer for RecordingHost {
    async fn announce_remaining(&self, remaining: Duration) -> HostResult<()> {
        self.announcements.lock().unwrap().push(remaining);
        if self.fail_announce.load(Ordering::SeqCst) {
            return Err(HostError::Internal("Mock announce failure".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl Restrictor for RecordingHost {
    async fn restrict(&self) -> HostResult<()> {
        self.restrictions.fetch_add(1, Ordering::SeqCst);
        if self.fail_restrict.load(Ordering::SeqCst) {
            return Err(HostError::Internal("Mock restrict failure".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn records_calls() {
        let host = RecordingHost::new();
        host.announce_remaining(Duration::from_secs(900)).await.unwrap();
        host.announce_remaining(Duration::from_secs(600)).await.unwrap();
        host.restrict().await.unwrap();

        assert_eq!(host.announcement_count(), 2);
        assert_eq!(host.last_remaining(), Some(Duration::from_secs(600)));
        assert_eq!(host.restriction_count(), 1);
    }

    #[tokio::test]
    async fn failures_are_still_recorded() {
        let host = RecordingHost::new();
        host.set_fail_announce(true);
        host.set_fail_restrict(true);

        assert!(host.announce_remaining(Duration::from_secs(60)).await.is_err());
        assert!(host.restrict().await.is_err());
        assert_eq!(host.announcement_count(), 1);
        assert_eq!(host.restriction_count(), 1);
    }
}
