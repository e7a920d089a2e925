//! Configuration validation

use crate::policy::{DEFAULT_READOUT_SPACING_SECS, DEFAULT_READOUT_TOLERANCE_SECS};
use crate::schema::RawConfig;
use std::collections::HashSet;
use thiserror::Error;

/// Validation error
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("reset_hour must be between 0 and 23, got {0}")]
    InvalidResetHour(u32),

    #[error("{field} must be greater than zero")]
    ZeroDuration { field: &'static str },

    #[error("readout_thresholds_seconds must not be empty")]
    EmptyThresholds,

    #[error("Duplicate readout threshold: {0}s")]
    DuplicateThreshold(u64),

    #[error(
        "readout_spacing_seconds ({spacing}) must be greater than readout_tolerance_seconds ({tolerance})"
    )]
    SpacingNotAboveTolerance { spacing: u64, tolerance: u64 },

    #[error("actions.{action} command cannot be empty")]
    EmptyCommand { action: &'static str },

    #[error("service.state_file cannot be empty")]
    EmptyStateFile,
}

/// Validate a raw configuration
pub fn validate_config(config: &RawConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    let budget = &config.budget;

    if let Some(hour) = budget.reset_hour
        && hour >= 24
    {
        errors.push(ValidationError::InvalidResetHour(hour));
    }

    for (field, value) in [
        ("default_allotment_seconds", budget.default_allotment_seconds),
        ("tick_interval_seconds", budget.tick_interval_seconds),
        ("sleep_threshold_seconds", budget.sleep_threshold_seconds),
        ("readout_spacing_seconds", budget.readout_spacing_seconds),
    ] {
        if value == Some(0) {
            errors.push(ValidationError::ZeroDuration { field });
        }
    }

    if let Some(thresholds) = &budget.readout_thresholds_seconds {
        if thresholds.is_empty() {
            errors.push(ValidationError::EmptyThresholds);
        }
        let mut seen = HashSet::new();
        for secs in thresholds {
            if !seen.insert(secs) {
                errors.push(ValidationError::DuplicateThreshold(*secs));
            }
        }
    }

    let spacing = budget
        .readout_spacing_seconds
        .unwrap_or(DEFAULT_READOUT_SPACING_SECS);
    let tolerance = budget
        .readout_tolerance_seconds
        .unwrap_or(DEFAULT_READOUT_TOLERANCE_SECS);
    if spacing != 0 && spacing <= tolerance {
        errors.push(ValidationError::SpacingNotAboveTolerance { spacing, tolerance });
    }

    for (action, argv) in [
        ("announce", &config.actions.announce),
        ("restrict", &config.actions.restrict),
    ] {
        if let Some(argv) = argv
            && argv.first().is_none_or(|program| program.trim().is_empty())
        {
            errors.push(ValidationError::EmptyCommand { action });
        }
    }

    if let Some(state_file) = &config.service.state_file
        && state_file.trim().is_empty()
    {
        errors.push(ValidationError::EmptyStateFile);
    }

    errors
}
