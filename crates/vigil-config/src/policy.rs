//! Validated configuration structures

use crate::schema::{RawActionsConfig, RawBudgetConfig, RawConfig, RawServiceConfig, StoreKind};
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_ALLOTMENT_SECS: u64 = 2 * 60 * 60;
pub const DEFAULT_RESET_HOUR: u32 = 5;
pub const DEFAULT_TICK_INTERVAL_SECS: u64 = 10;
pub const DEFAULT_SLEEP_THRESHOLD_SECS: u64 = 5 * 60;
pub const DEFAULT_READOUT_SPACING_SECS: u64 = 2 * 60;
pub const DEFAULT_READOUT_TOLERANCE_SECS: u64 = 30;

/// Remaining-time marks that trigger a readout, largest first
pub const DEFAULT_READOUT_THRESHOLDS_SECS: [u64; 15] = [
    5 * 3600,
    4 * 3600 + 1800,
    4 * 3600,
    3 * 3600 + 1800,
    3 * 3600,
    2 * 3600 + 1800,
    2 * 3600,
    3600 + 1800,
    3600,
    45 * 60,
    30 * 60,
    15 * 60,
    10 * 60,
    5 * 60,
    60,
];

pub fn default_restrict_command() -> Vec<String> {
    vec!["systemctl".into(), "suspend".into()]
}

/// Validated configuration ready for use by the daemon
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub service: ServiceConfig,
    pub budget: BudgetPolicy,
    pub actions: ActionsConfig,
}

impl Config {
    /// Convert from raw config (after validation)
    pub fn from_raw(raw: RawConfig) -> Self {
        Self {
            service: ServiceConfig::from_raw(raw.service),
            budget: BudgetPolicy::from_raw(raw.budget),
            actions: ActionsConfig::from_raw(raw.actions),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub data_dir: PathBuf,
    pub state_file: String,
    pub store: StoreKind,
}

impl ServiceConfig {
    fn from_raw(raw: RawServiceConfig) -> Self {
        Self {
            data_dir: raw.data_dir.unwrap_or_else(vigil_util::default_data_dir),
            state_file: raw
                .state_file
                .unwrap_or_else(|| vigil_util::DEFAULT_STATE_FILE.to_string()),
            store: raw.store.unwrap_or_default(),
        }
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self::from_raw(RawServiceConfig::default())
    }
}

/// Rules the scheduling engine applies on every tick
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BudgetPolicy {
    /// Allotment for a freshly created record
    pub default_allotment: Duration,
    /// Local hour at which the budget resets (0-23)
    pub reset_hour: u32,
    pub tick_interval: Duration,
    pub sleep_threshold: Duration,
    pub readout_spacing: Duration,
    pub readout_tolerance: Duration,
    /// Sorted largest first, no duplicates
    pub readout_thresholds: Vec<Duration>,
}

impl BudgetPolicy {
    fn from_raw(raw: RawBudgetConfig) -> Self {
        let secs = |value: Option<u64>, default: u64| Duration::from_secs(value.unwrap_or(default));

        let mut thresholds: Vec<u64> = raw
            .readout_thresholds_seconds
            .unwrap_or_else(|| DEFAULT_READOUT_THRESHOLDS_SECS.to_vec());
        thresholds.sort_unstable_by(|a, b| b.cmp(a));
        thresholds.dedup();

        Self {
            default_allotment: secs(raw.default_allotment_seconds, DEFAULT_ALLOTMENT_SECS),
            reset_hour: raw.reset_hour.unwrap_or(DEFAULT_RESET_HOUR),
            tick_interval: secs(raw.tick_interval_seconds, DEFAULT_TICK_INTERVAL_SECS),
            sleep_threshold: secs(raw.sleep_threshold_seconds, DEFAULT_SLEEP_THRESHOLD_SECS),
            readout_spacing: secs(raw.readout_spacing_seconds, DEFAULT_READOUT_SPACING_SECS),
            readout_tolerance: secs(
                raw.readout_tolerance_seconds,
                DEFAULT_READOUT_TOLERANCE_SECS,
            ),
            readout_thresholds: thresholds.into_iter().map(Duration::from_secs).collect(),
        }
    }
}

impl Default for BudgetPolicy {
    fn default() -> Self {
        Self::from_raw(RawBudgetConfig::default())
    }
}

#[derive(Debug, Clone)]
pub struct ActionsConfig {
    /// `None` means readouts are only logged
    pub announce: Option<Vec<String>>,
    pub restrict: Vec<String>,
}

impl ActionsConfig {
    fn from_raw(raw: RawActionsConfig) -> Self {
        Self {
            announce: raw.announce,
            restrict: raw.restrict.unwrap_or_else(default_restrict_command),
        }
    }
}

impl Default for ActionsConfig {
    fn default() -> Self {
        Self::from_raw(RawActionsConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_policy_matches_builtin_constants() {
        let policy = BudgetPolicy::default();
        assert_eq!(policy.default_allotment, Duration::from_secs(7200));
        assert_eq!(policy.reset_hour, 5);
        assert_eq!(policy.tick_interval, Duration::from_secs(10));
        assert_eq!(policy.sleep_threshold, Duration::from_secs(300));
        assert_eq!(policy.readout_spacing, Duration::from_secs(120));
        assert_eq!(policy.readout_tolerance, Duration::from_secs(30));
        assert_eq!(policy.readout_thresholds.len(), 15);
        assert_eq!(policy.readout_thresholds[0], Duration::from_secs(5 * 3600));
        assert_eq!(policy.readout_thresholds[14], Duration::from_secs(60));
    }

    #[test]
    fn thresholds_are_sorted_descending() {
        let raw = RawBudgetConfig {
            readout_thresholds_seconds: Some(vec![60, 600, 300]),
            ..Default::default()
        };
        let policy = BudgetPolicy::from_raw(raw);
        assert_eq!(
            policy.readout_thresholds,
            vec![
                Duration::from_secs(600),
                Duration::from_secs(300),
                Duration::from_secs(60)
            ]
        );
    }

    #[test]
    fn default_restrict_is_suspend() {
        let actions = ActionsConfig::default();
        assert!(actions.announce.is_none());
        assert_eq!(actions.restrict, vec!["systemctl", "suspend"]);
    }

    #[test]
    fn service_defaults() {
        let service = ServiceConfig::default();
        assert_eq!(service.state_file, "state.json");
        assert_eq!(service.store, StoreKind::File);
    }
}
