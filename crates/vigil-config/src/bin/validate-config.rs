//! Config validation CLI tool
//!
//! Validates a vigil configuration file and reports any errors.

use vigil_util::{default_config_path, format_duration};
use std::path::PathBuf;
use std::process::ExitCode;

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().collect();

    let config_path = match args.get(1) {
        Some(path) => PathBuf::from(path),
        None => {
            let default_path = default_config_path();
            eprintln!("Usage: validate-config [config-file]");
            eprintln!();
            eprintln!("Validates a vigil configuration file.");
            eprintln!();
            eprintln!("Example:");
            eprintln!("  validate-config {}", default_path.display());
            return ExitCode::from(2);
        }
    };

    if !config_path.exists() {
        eprintln!("Error: Configuration file not found: {}", config_path.display());
        return ExitCode::from(1);
    }

    match vigil_config::load_config(&config_path) {
        Ok(config) => {
            let budget = &config.budget;
            println!("✓ Configuration is valid");
            println!();
            println!("Summary:");
            println!("  Config version: {}", vigil_config::CURRENT_CONFIG_VERSION);
            println!(
                "  Store: {} ({})",
                config.service.store,
                config.service.data_dir.join(&config.service.state_file).display()
            );
            println!("  Daily allotment: {}", format_duration(budget.default_allotment));
            println!("  Reset at: {:02}:00", budget.reset_hour);
            println!("  Tick interval: {}", format_duration(budget.tick_interval));
            println!("  Sleep threshold: {}", format_duration(budget.sleep_threshold));
            println!(
                "  Readouts: {} thresholds, ±{}, at least {} apart",
                budget.readout_thresholds.len(),
                format_duration(budget.readout_tolerance),
                format_duration(budget.readout_spacing)
            );
            match &config.actions.announce {
                Some(argv) => println!("  Announce: {}", argv.join(" ")),
                None => println!("  Announce: (log only)"),
            }
            println!("  Restrict: {}", config.actions.restrict.join(" "));

            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("✗ Configuration validation failed");
            eprintln!();
            match &e {
                vigil_config::ConfigError::ReadError(io_err) => {
                    eprintln!("Failed to read file: {}", io_err);
                }
                vigil_config::ConfigError::ParseError(parse_err) => {
                    eprintln!("TOML parse error:");
                    eprintln!("  {}", parse_err);
                }
                vigil_config::ConfigError::ValidationFailed { errors } => {
                    eprintln!("Validation errors ({}):", errors.len());
                    for err in errors {
                        eprintln!("  - {}", err);
                    }
                }
                vigil_config::ConfigError::UnsupportedVersion(ver) => {
                    eprintln!(
                        "Unsupported config version: {} (expected {})",
                        ver,
                        vigil_config::CURRENT_CONFIG_VERSION
                    );
                }
            }
            ExitCode::from(1)
        }
    }
}
