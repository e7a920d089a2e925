//! Default paths for vigil components
//!
//! Paths are user-writable by default (no root required):
//! - Config: `$XDG_CONFIG_HOME/vigil/config.toml` or `~/.config/vigil/config.toml`
//! - Data: `$XDG_DATA_HOME/vigil` or `~/.local/share/vigil`
//! - Runtime (pid file): `$XDG_RUNTIME_DIR/vigil` or `/tmp/vigil-$USER`

use std::path::PathBuf;

/// Environment variable for overriding the data directory
pub const VIGIL_DATA_DIR_ENV: &str = "VIGIL_DATA_DIR";

/// Name of the budget record inside the data directory
pub const DEFAULT_STATE_FILE: &str = "state.json";

/// Application subdirectory name
const APP_DIR: &str = "vigil";

const CONFIG_FILENAME: &str = "config.toml";
const PID_FILENAME: &str = "vigild.pid";

/// Get the default data directory.
///
/// Order of precedence:
/// 1. `$VIGIL_DATA_DIR` environment variable (if set)
/// 2. `$XDG_DATA_HOME/vigil` (if XDG_DATA_HOME is set)
/// 3. `~/.local/share/vigil` (fallback)
pub fn default_data_dir() -> PathBuf {
    if let Ok(path) = std::env::var(VIGIL_DATA_DIR_ENV) {
        return PathBuf::from(path);
    }

    data_dir_without_env()
}

/// Get the data directory without checking `VIGIL_DATA_DIR`.
/// Used where the env var is handled separately (e.g. by clap).
pub fn data_dir_without_env() -> PathBuf {
    if let Ok(data_home) = std::env::var("XDG_DATA_HOME") {
        return PathBuf::from(data_home).join(APP_DIR);
    }

    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".local").join("share").join(APP_DIR);
    }

    PathBuf::from("/tmp").join(APP_DIR).join("data")
}

/// Get the default config file path.
pub fn default_config_path() -> PathBuf {
    if let Ok(config_home) = std::env::var("XDG_CONFIG_HOME") {
        return PathBuf::from(config_home).join(APP_DIR).join(CONFIG_FILENAME);
    }

    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home)
            .join(".config")
            .join(APP_DIR)
            .join(CONFIG_FILENAME);
    }

    PathBuf::from("/etc").join(APP_DIR).join(CONFIG_FILENAME)
}

/// Directory for per-boot runtime files
pub fn runtime_dir() -> PathBuf {
    // Typically /run/user/<uid>
    if let Ok(runtime_dir) = std::env::var("XDG_RUNTIME_DIR") {
        return PathBuf::from(runtime_dir).join(APP_DIR);
    }

    let username = std::env::var("USER").unwrap_or_else(|_| "unknown".to_string());
    PathBuf::from(format!("/tmp/{}-{}", APP_DIR, username))
}

/// Pid file used as the daemon's single-instance guard
pub fn default_pid_path() -> PathBuf {
    runtime_dir().join(PID_FILENAME)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_dir_contains_vigil() {
        let path = data_dir_without_env();
        assert!(path.to_string_lossy().contains("vigil"));
    }

    #[test]
    fn config_path_is_toml() {
        let path = default_config_path();
        assert!(path.to_string_lossy().contains("vigil"));
        assert_eq!(path.extension().unwrap(), "toml");
    }

    #[test]
    fn pid_file_lives_in_runtime_dir() {
        let pid = default_pid_path();
        assert_eq!(pid.parent().unwrap(), runtime_dir());
        assert!(pid.to_string_lossy().ends_with("vigild.pid"));
    }
}
