//! Per-tick decision table
//!
//! Evaluated in a fixed order: day-boundary reset, then expiry, then sleep
//! recovery, then the threshold readout check. The result is pure data; the
//! engine applies it.

use chrono::{DateTime, Local, TimeDelta, Timelike};
use vigil_config::BudgetPolicy;
use vigil_util::delta_from_std;

use crate::BudgetState;

/// What a tick should do with an enabled record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickPlan {
    /// Restore the full allotment before acting
    pub reset: bool,
    pub action: TickAction,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickAction {
    /// Budget is exhausted
    Restrict,
    /// The gap since the last update is too long to be usage; announce
    /// without charging it
    RecoverFromSleep { gap: TimeDelta },
    /// Charge elapsed time, announcing first if a threshold is near
    Advance { readout: bool },
}

/// Decide what to do for `state` at `now`
pub fn plan_tick(state: &BudgetState, now: DateTime<Local>, policy: &BudgetPolicy) -> TickPlan {
    let reset = crosses_reset(state.last_update_time, now, policy.reset_hour);
    let remaining = if reset {
        state.allotment_per_day
    } else {
        state.remaining_today
    };

    let action = if remaining <= TimeDelta::zero() {
        TickAction::Restrict
    } else {
        let gap = elapsed_since(state.last_update_time, now);
        if gap > delta_from_std(policy.sleep_threshold) {
            TickAction::RecoverFromSleep { gap }
        } else {
            TickAction::Advance {
                readout: near_threshold(remaining, policy)
                    && readout_allowed(state.last_readout_time, now, policy),
            }
        }
    };

    TickPlan { reset, action }
}

/// Whether the daily budget resets between `last` and `now`.
///
/// True on any change of local calendar date, or on the same date when the
/// hour moved from before `reset_hour` to at or after it.
pub fn crosses_reset(last: DateTime<Local>, now: DateTime<Local>, reset_hour: u32) -> bool {
    if last.date_naive() != now.date_naive() {
        return true;
    }
    last.hour() < reset_hour && reset_hour <= now.hour()
}

/// `now - since`, or zero if the wall clock went backwards
pub fn elapsed_since(since: DateTime<Local>, now: DateTime<Local>) -> TimeDelta {
    (now - since).max(TimeDelta::zero())
}

/// Whether `remaining` is within the readout tolerance of any threshold
pub fn near_threshold(remaining: TimeDelta, policy: &BudgetPolicy) -> bool {
    let tolerance = delta_from_std(policy.readout_tolerance);
    policy
        .readout_thresholds
        .iter()
        .map(|t| (remaining - delta_from_std(*t)).abs())
        .min()
        .is_some_and(|distance| distance < tolerance)
}

/// Whether enough time has passed since the previous readout.
/// A readout time in the future counts as no readout.
pub fn readout_allowed(
    last_readout: Option<DateTime<Local>>,
    now: DateTime<Local>,
    policy: &BudgetPolicy,
) -> bool {
    match last_readout {
        Some(at) if at <= now => now - at > delta_from_std(policy.readout_spacing),
        _ => true,
    }
}
