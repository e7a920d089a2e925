//! Deterministic lock-step clock
//!
//! [`LockStepClock`] keeps a simulated wall-clock time that only moves when the
//! controlling context calls [`LockStepClock::step`]. Forked contexts share
//! that time. Stepping advances to each pending wait deadline in order, wakes
//! the waiting fork, and then waits until every live fork has parked in
//! another wait (or merged) before moving on. Background loops therefore see
//! exactly the sequence of times they would see in real life, just without the
//! waiting.

use async_trait::async_trait;
use chrono::{DateTime, Local};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::{oneshot, watch};
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::{delta_from_std, Cancelled, Clock};

/// How long (in real time) `step` waits for a woken fork to park again
const SETTLE_LIMIT: Duration = Duration::from_secs(5);

/// Simulated clock whose forks advance in lock step with the controller
#[derive(Clone)]
pub struct LockStepClock {
    shared: Arc<Shared>,
    /// `None` for the controlling context
    fork_id: Option<u64>,
}

struct Shared {
    state: Mutex<State>,
    /// Number of live forks that are not parked in a wait
    running: watch::Sender<usize>,
}

struct State {
    now: DateTime<Local>,
    next_fork_id: u64,
    /// Live forks; `Some` while parked in a wait
    forks: BTreeMap<u64, Option<Waiter>>,
}

struct Waiter {
    deadline: DateTime<Local>,
    wake: oneshot::Sender<()>,
}

impl State {
    fn running(&self) -> usize {
        self.forks.values().filter(|w| w.is_none()).count()
    }
}

impl Shared {
    fn publish(&self, state: &State) {
        self.running.send_replace(state.running());
    }
}

fn advance(at: DateTime<Local>, by: Duration) -> DateTime<Local> {
    at.checked_add_signed(delta_from_std(by)).unwrap_or(at)
}

impl LockStepClock {
    /// Start simulated time at the current wall-clock time
    pub fn new() -> Self {
        Self::starting_at(crate::now())
    }

    /// Start simulated time at `start`
    pub fn starting_at(start: DateTime<Local>) -> Self {
        let (running, _) = watch::channel(0);
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(State {
                    now: start,
                    next_fork_id: 0,
                    forks: BTreeMap::new(),
                }),
                running,
            }),
            fork_id: None,
        }
    }

    /// Advance simulated time by `amount`, letting every fork run each wait
    /// that falls due along the way.
    pub async fn step(&self, amount: Duration) {
        let target = advance(self.now(), amount);
        loop {
            self.settle().await;
            if !self.wake_next(target) {
                break;
            }
        }
    }

    /// Simulate the device sleeping for `amount`: wall time jumps forward and
    /// every pending wait is pushed back by the same amount, like a monotonic
    /// timer that does not run while suspended. Nothing is woken.
    pub async fn suspend(&self, amount: Duration) {
        self.settle().await;
        let mut state = self.lock();
        state.now = advance(state.now, amount);
        for waiter in state.forks.values_mut().flatten() {
            waiter.deadline = advance(waiter.deadline, amount);
        }
    }

    /// Number of forks that have not been merged yet
    pub fn live_forks(&self) -> usize {
        self.lock().forks.len()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.shared.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Wake the earliest waiter due at or before `target`. Returns false (after
    /// moving time to `target`) once nothing else is due.
    fn wake_next(&self, target: DateTime<Local>) -> bool {
        let mut state = self.lock();
        let due = state
            .forks
            .iter()
            .filter_map(|(id, w)| w.as_ref().map(|w| (w.deadline, *id)))
            .filter(|(deadline, _)| *deadline <= target)
            .min();

        let Some((deadline, id)) = due else {
            if target > state.now {
                state.now = target;
            }
            return false;
        };

        if deadline > state.now {
            state.now = deadline;
        }
        if let Some(waiter) = state.forks.get_mut(&id).and_then(Option::take) {
            let _ = waiter.wake.send(());
        }
        self.shared.publish(&state);
        true
    }

    /// Wait until no fork is running
    async fn settle(&self) {
        let mut running = self.shared.running.subscribe();
        let parked = matches!(
            tokio::time::timeout(SETTLE_LIMIT, running.wait_for(|n| *n == 0)).await,
            Ok(Ok(_))
        );
        if !parked {
            warn!(
                limit_secs = SETTLE_LIMIT.as_secs(),
                "Lock-step fork did not park in time, advancing anyway"
            );
        }
    }
}

impl Default for LockStepClock {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Clock for LockStepClock {
    fn now(&self) -> DateTime<Local> {
        self.lock().now
    }

    async fn wait(&self, duration: Duration, cancel: &CancellationToken) -> Result<(), Cancelled> {
        if cancel.is_cancelled() {
            return Err(Cancelled);
        }

        // The controller drives time itself.
        let Some(id) = self.fork_id else {
            self.step(duration).await;
            return Ok(());
        };

        let (wake, woken) = oneshot::channel();
        {
            let mut state = self.lock();
            let deadline = advance(state.now, duration);
            state.forks.insert(id, Some(Waiter { deadline, wake }));
            self.shared.publish(&state);
        }

        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                let mut state = self.lock();
                if let Some(slot) = state.forks.get_mut(&id) {
                    *slot = None;
                }
                self.shared.publish(&state);
                Err(Cancelled)
            }
            _ = woken => Ok(()),
        }
    }

    fn fork(&self) -> Arc<dyn Clock> {
        let mut state = self.lock();
        let id = state.next_fork_id;
        state.next_fork_id += 1;
        state.forks.insert(id, None);
        self.shared.publish(&state);

        Arc::new(LockStepClock {
            shared: Arc::clone(&self.shared),
            fork_id: Some(id),
        })
    }

    fn merge(&self) {
        if let Some(id) = self.fork_id {
            let mut state = self.lock();
            state.forks.remove(&id);
            self.shared.publish(&state);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeDelta, TimeZone};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn start() -> DateTime<Local> {
        Local.with_ymd_and_hms(2025, 6, 18, 12, 0, 0).single().unwrap()
    }

    /// Spawn a loop that records each wake-up and waits `interval` between them
    fn spawn_ticker(
        clock: &LockStepClock,
        interval: Duration,
        cancel: CancellationToken,
    ) -> (Arc<Mutex<Vec<DateTime<Local>>>>, tokio::task::JoinHandle<()>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let fork = clock.fork();
        let handle = tokio::spawn({
            let seen = seen.clone();
            async move {
                loop {
                    seen.lock().unwrap().push(fork.now());
                    if fork.wait(interval, &cancel).await.is_err() {
                        break;
                    }
                }
                fork.merge();
            }
        });
        (seen, handle)
    }

    #[tokio::test]
    async fn step_without_forks_moves_time() {
        let clock = LockStepClock::starting_at(start());
        clock.step(Duration::from_secs(17 * 60)).await;
        assert_eq!(clock.now(), start() + TimeDelta::minutes(17));
    }

    #[tokio::test]
    async fn fork_wakes_at_each_deadline() {
        let clock = LockStepClock::starting_at(start());
        let cancel = CancellationToken::new();
        let (seen, handle) = spawn_ticker(&clock, Duration::from_secs(10), cancel.clone());

        clock.step(Duration::from_secs(35)).await;

        let offsets: Vec<i64> = seen
            .lock()
            .unwrap()
            .iter()
            .map(|t| (*t - start()).num_seconds())
            .collect();
        assert_eq!(offsets, vec![0, 10, 20, 30]);
        assert_eq!(clock.now(), start() + TimeDelta::seconds(35));

        cancel.cancel();
        handle.await.unwrap();
        assert_eq!(clock.live_forks(), 0);
    }

    #[tokio::test]
    async fn deadline_at_target_fires() {
        let clock = LockStepClock::starting_at(start());
        let cancel = CancellationToken::new();
        let (seen, handle) = spawn_ticker(&clock, Duration::from_secs(10), cancel.clone());

        clock.step(Duration::from_secs(10)).await;
        assert_eq!(seen.lock().unwrap().len(), 2);

        cancel.cancel();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn cancelled_fork_is_released() {
        let clock = LockStepClock::starting_at(start());
        let cancel = CancellationToken::new();
        let (_seen, handle) = spawn_ticker(&clock, Duration::from_secs(10), cancel.clone());

        clock.step(Duration::from_secs(5)).await;
        assert_eq!(clock.live_forks(), 1);

        cancel.cancel();
        handle.await.unwrap();
        assert_eq!(clock.live_forks(), 0);

        // Nothing left to wait for; stepping is immediate.
        clock.step(Duration::from_secs(3600)).await;
        assert_eq!(clock.now(), start() + TimeDelta::seconds(3605));
    }

    #[tokio::test]
    async fn suspend_delays_pending_waits() {
        let clock = LockStepClock::starting_at(start());
        let cancel = CancellationToken::new();
        let (seen, handle) = spawn_ticker(&clock, Duration::from_secs(10), cancel.clone());

        clock.step(Duration::from_secs(5)).await;
        clock.suspend(Duration::from_secs(600)).await;
        assert_eq!(clock.now(), start() + TimeDelta::seconds(605));
        assert_eq!(seen.lock().unwrap().len(), 1);

        clock.step(Duration::from_secs(10)).await;
        let offsets: Vec<i64> = seen
            .lock()
            .unwrap()
            .iter()
            .map(|t| (*t - start()).num_seconds())
            .collect();
        assert_eq!(offsets, vec![0, 610]);

        cancel.cancel();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn two_forks_interleave_in_time_order() {
        let clock = LockStepClock::starting_at(start());
        let cancel = CancellationToken::new();
        let order = Arc::new(Mutex::new(Vec::new()));
        let mut handles = Vec::new();

        for (name, secs) in [("fast", 3u64), ("slow", 7u64)] {
            let fork = clock.fork();
            let order = order.clone();
            let cancel = cancel.clone();
            handles.push(tokio::spawn(async move {
                while fork.wait(Duration::from_secs(secs), &cancel).await.is_ok() {
                    order.lock().unwrap().push((name, (fork.now() - start()).num_seconds()));
                }
                fork.merge();
            }));
        }

        clock.step(Duration::from_secs(14)).await;

        let order = order.lock().unwrap().clone();
        assert_eq!(
            order,
            vec![("fast", 3), ("fast", 6), ("slow", 7), ("fast", 9), ("fast", 12), ("slow", 14)]
        );

        cancel.cancel();
        for handle in handles {
            handle.await.unwrap();
        }
    }

    #[tokio::test]
    async fn controller_wait_drives_time() {
        let clock = LockStepClock::starting_at(start());
        let cancel = CancellationToken::new();
        let ticks = Arc::new(AtomicUsize::new(0));

        let fork = clock.fork();
        let handle = tokio::spawn({
            let ticks = ticks.clone();
            let cancel = cancel.clone();
            async move {
                loop {
                    ticks.fetch_add(1, Ordering::SeqCst);
                    if fork.wait(Duration::from_secs(60), &cancel).await.is_err() {
                        break;
                    }
                }
                fork.merge();
            }
        });

        clock.wait(Duration::from_secs(180), &cancel).await.unwrap();
        assert_eq!(ticks.load(Ordering::SeqCst), 4);

        cancel.cancel();
        handle.await.unwrap();
    }
}
