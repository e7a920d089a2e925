//! Raw configuration schema (as parsed from TOML)

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Raw configuration as parsed from TOML
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RawConfig {
    /// Config schema version
    pub config_version: u32,

    /// Where and how the budget record is stored
    #[serde(default)]
    pub service: RawServiceConfig,

    /// Budget rules
    #[serde(default)]
    pub budget: RawBudgetConfig,

    /// External commands for readouts and restriction
    #[serde(default)]
    pub actions: RawActionsConfig,
}

/// Service-level settings
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawServiceConfig {
    /// Data directory for the store
    pub data_dir: Option<PathBuf>,

    /// Record location: a path relative to `data_dir`, or a key for sqlite
    pub state_file: Option<String>,

    /// Storage backend
    pub store: Option<StoreKind>,
}

/// Storage backend for the budget record
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreKind {
    /// One JSON file per record under the data directory
    #[default]
    File,
    /// `vigil.db` in the data directory
    Sqlite,
    /// Nothing survives a restart
    Memory,
}

impl std::fmt::Display for StoreKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            StoreKind::File => "file",
            StoreKind::Sqlite => "sqlite",
            StoreKind::Memory => "memory",
        };
        f.write_str(name)
    }
}

/// Budget settings; every field falls back to the built-in default
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawBudgetConfig {
    /// Allotment used when no record exists yet
    pub default_allotment_seconds: Option<u64>,

    /// Local hour (0-23) at which the daily budget resets
    pub reset_hour: Option<u32>,

    pub tick_interval_seconds: Option<u64>,

    /// Tick gap treated as the device having been asleep
    pub sleep_threshold_seconds: Option<u64>,

    /// Minimum spacing between two readouts
    pub readout_spacing_seconds: Option<u64>,

    /// How close remaining time must be to a threshold to trigger a readout
    pub readout_tolerance_seconds: Option<u64>,

    pub readout_thresholds_seconds: Option<Vec<u64>>,
}

/// Action commands (argv, first element is the program)
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawActionsConfig {
    /// Announce command; placeholders `{phrase}`, `{minutes}`, `{seconds}`,
    /// `{remaining}` are substituted per argument. Unset means log only.
    pub announce: Option<Vec<String>>,

    /// Restrict command (default: `systemctl suspend`)
    pub restrict: Option<Vec<String>>,
}
