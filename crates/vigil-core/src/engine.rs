//! Budget scheduling engine

use arc_swap::ArcSwapOption;
use chrono::{DateTime, Local, TimeDelta};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use vigil_config::BudgetPolicy;
use vigil_host::{Announcer, Restrictor};
use vigil_store::{RecordStore, StoreResult};
use vigil_util::{delta_from_std, format_delta, Clock, VigilError};

use crate::{elapsed_since, plan_tick, BudgetState, StateFile, TickAction};

/// Result of a single tick, for logging and tests
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Record is disabled; nothing was written or triggered
    Disabled,
    /// Budget exhausted; restrict was invoked
    Restricted,
    /// Sleep gap detected; remaining time was announced without charging the gap
    Recovered { gap: TimeDelta },
    /// Elapsed time was charged
    Advanced { announced: bool },
}

/// Loop registration. Only the loop task itself moves a slot back to `Idle`,
/// so an abandoned `stop()` cannot strand it in `Stopping`.
enum LoopSlot {
    Idle,
    /// Reserved by `start` while the task is being spawned
    Starting {
        id: u64,
    },
    Running {
        id: u64,
        cancel: CancellationToken,
        handle: JoinHandle<()>,
    },
    Stopping {
        id: u64,
    },
}

type SharedSlot = Arc<Mutex<LoopSlot>>;

fn lock_slot(slot: &Mutex<LoopSlot>) -> MutexGuard<'_, LoopSlot> {
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Created at the top of the loop task; runs on normal exit and on unwind.
struct LoopExit {
    id: u64,
    slot: SharedSlot,
    clock: Arc<dyn Clock>,
}

impl Drop for LoopExit {
    fn drop(&mut self) {
        self.clock.merge();

        let mut slot = lock_slot(&self.slot);
        let ours = matches!(
            *slot,
            LoopSlot::Starting { id }
                | LoopSlot::Running { id, .. }
                | LoopSlot::Stopping { id } if id == self.id
        );
        if ours {
            *slot = LoopSlot::Idle;
        }
    }
}

struct EngineShared {
    state_file: StateFile,
    announcer: Arc<dyn Announcer>,
    restrictor: Arc<dyn Restrictor>,
    policy: BudgetPolicy,
    snapshot: ArcSwapOption<BudgetState>,
}

/// Owns the background loop that tracks, announces and enforces the daily
/// budget.
///
/// The engine is the only writer of the budget record. At most one loop runs
/// at a time; [`start`](Self::start) and [`stop`](Self::stop) check and update
/// a single guarded slot.
pub struct BudgetEngine {
    shared: Arc<EngineShared>,
    slot: SharedSlot,
    next_loop_id: AtomicU64,
}

impl BudgetEngine {
    pub fn new(
        store: Arc<dyn RecordStore>,
        location: impl Into<String>,
        announcer: Arc<dyn Announcer>,
        restrictor: Arc<dyn Restrictor>,
        policy: BudgetPolicy,
    ) -> Self {
        let state_file = StateFile::new(store, location);
        info!(
            location = %state_file.location(),
            reset_hour = policy.reset_hour,
            tick_secs = policy.tick_interval.as_secs(),
            "Budget engine initialized"
        );

        Self {
            shared: Arc::new(EngineShared {
                state_file,
                announcer,
                restrictor,
                policy,
                snapshot: ArcSwapOption::empty(),
            }),
            slot: Arc::new(Mutex::new(LoopSlot::Idle)),
            next_loop_id: AtomicU64::new(0),
        }
    }

    pub fn state_file(&self) -> &StateFile {
        &self.shared.state_file
    }

    /// Start the background loop on a fork of `clock`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&self, clock: &dyn Clock) -> vigil_util::Result<()> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| VigilError::internal(format!("No tokio runtime: {}", e)))?;

        let id = {
            let mut slot = self.lock_slot();
            if !matches!(*slot, LoopSlot::Idle) {
                return Err(VigilError::AlreadyRunning);
            }
            let id = self.next_loop_id.fetch_add(1, Ordering::Relaxed);
            *slot = LoopSlot::Starting { id };
            id
        };

        // Spawned without the slot lock held: a task dropped during runtime
        // shutdown releases the slot from its own exit guard.
        let exit = LoopExit {
            id,
            slot: Arc::clone(&self.slot),
            clock: clock.fork(),
        };
        let cancel = CancellationToken::new();
        let handle = runtime.spawn(run_loop(Arc::clone(&self.shared), exit, cancel.clone()));

        let mut slot = self.lock_slot();
        if matches!(*slot, LoopSlot::Starting { id: current } if current == id) {
            *slot = LoopSlot::Running { id, cancel, handle };
        }
        Ok(())
    }

    /// Cancel the loop and wait for it to exit.
    ///
    /// Dropping the returned future early still lets the loop finish and
    /// release the engine; it only skips the wait.
    pub async fn stop(&self) -> vigil_util::Result<()> {
        let (cancel, handle) = {
            let mut slot = self.lock_slot();
            match std::mem::replace(&mut *slot, LoopSlot::Idle) {
                LoopSlot::Running { id, cancel, handle } => {
                    *slot = LoopSlot::Stopping { id };
                    (cancel, handle)
                }
                other => {
                    *slot = other;
                    return Err(VigilError::NotRunning);
                }
            }
        };

        cancel.cancel();
        if let Err(e) = handle.await {
            error!(error = %e, "Budget loop ended abnormally");
        }
        Ok(())
    }

    /// Whether a loop is active (including one that is shutting down)
    pub fn is_running(&self) -> bool {
        !matches!(*self.lock_slot(), LoopSlot::Idle)
    }

    /// The record as loaded by the most recent tick
    pub fn current_state(&self) -> Option<Arc<BudgetState>> {
        self.shared.snapshot.load_full()
    }

    /// Run one tick now, outside the loop.
    ///
    /// The engine is the record's only writer, so this must not be used while
    /// the loop is running.
    pub async fn tick_once(&self, clock: &dyn Clock) -> StoreResult<TickOutcome> {
        self.shared.tick(clock).await
    }

    /// Announce the remaining time from the latest snapshot. Returns false if
    /// no tick has run yet.
    pub async fn announce_current(&self) -> bool {
        match self.current_state() {
            Some(state) => {
                self.shared.announce(&state).await;
                true
            }
            None => false,
        }
    }

    fn lock_slot(&self) -> MutexGuard<'_, LoopSlot> {
        lock_slot(&self.slot)
    }
}

async fn run_loop(shared: Arc<EngineShared>, exit: LoopExit, cancel: CancellationToken) {
    let clock = Arc::clone(&exit.clock);
    info!(loop_id = exit.id, "Budget loop started");

    loop {
        match shared.tick(clock.as_ref()).await {
            Ok(outcome) => debug!(?outcome, "Tick complete"),
            Err(e) => error!(error = %e, "Tick failed"),
        }

        if clock.wait(shared.policy.tick_interval, &cancel).await.is_err() {
            break;
        }
    }

    info!(loop_id = exit.id, "Budget loop stopped");
}

impl EngineShared {
    fn fresh_state(&self, now: DateTime<Local>) -> BudgetState {
        BudgetState::fresh(now, delta_from_std(self.policy.default_allotment))
    }

    async fn load_or_default(&self, now: DateTime<Local>) -> StoreResult<BudgetState> {
        match self.state_file.load().await {
            Ok(Some(state)) => Ok(state),
            Ok(None) => {
                info!("No budget record, starting a fresh day");
                Ok(self.fresh_state(now))
            }
            Err(e) if e.is_malformed() => {
                warn!(error = %e, "Budget record is malformed, starting a fresh day");
                Ok(self.fresh_state(now))
            }
            Err(e) => Err(e),
        }
    }

    async fn tick(&self, clock: &dyn Clock) -> StoreResult<TickOutcome> {
        let now = clock.now();
        let mut state = self.load_or_default(now).await?;
        self.snapshot.store(Some(Arc::new(state.clone())));

        if !state.enabled {
            return Ok(TickOutcome::Disabled);
        }

        let plan = plan_tick(&state, now, &self.policy);
        if plan.reset {
            info!(
                allotment = %format_delta(state.allotment_per_day),
                "Daily budget reset"
            );
            state.remaining_today = state.allotment_per_day;
        }

        match plan.action {
            TickAction::Restrict => {
                warn!(
                    remaining = %format_delta(state.remaining_today),
                    "Budget exhausted, restricting"
                );
                state.last_update_time = now;
                state.clamp_remaining();
                self.state_file.save(&state).await?;

                if let Err(e) = self.restrictor.restrict().await {
                    error!(error = %e, "Restrict action failed");
                }
                Ok(TickOutcome::Restricted)
            }

            TickAction::RecoverFromSleep { gap } => {
                info!(
                    gap = %format_delta(gap),
                    remaining = %format_delta(state.remaining_today),
                    "Resumed after sleep, gap not charged"
                );
                self.announce(&state).await;
                state.last_readout_time = Some(now);
                state.last_update_time = now;
                self.state_file.save(&state).await?;
                Ok(TickOutcome::Recovered { gap })
            }

            TickAction::Advance { readout } => {
                if readout {
                    self.announce(&state).await;
                    state.last_readout_time = Some(now);
                }

                // Charge up to the time the callbacks returned.
                let charged_at = clock.now();
                let elapsed = elapsed_since(state.last_update_time, charged_at);
                state.remaining_today -= elapsed;
                state.clamp_remaining();
                state.last_update_time = charged_at;
                self.state_file.save(&state).await?;

                Ok(TickOutcome::Advanced { announced: readout })
            }
        }
    }

    async fn announce(&self, state: &BudgetState) {
        let remaining = state.remaining();
        info!(remaining = %format_delta(state.remaining_today), "Announcing remaining time");
        if let Err(e) = self.announcer.announce_remaining(remaining).await {
            error!(error = %e, "Announce action failed");
        }
    }
}
