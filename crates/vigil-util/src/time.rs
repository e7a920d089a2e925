//! Wall-clock time and duration rendering
//!
//! [`now`] is the time source behind [`SystemClock`](crate::SystemClock).
//! Debug builds honour `VIGIL_MOCK_TIME=YYYY-MM-DD HH:MM:SS`: the clock starts
//! at that local time and then runs forward normally, which makes it easy to
//! watch the 05:00 reset or a day change happen:
//!
//! ```bash
//! VIGIL_MOCK_TIME="2025-12-25 04:58:00" cargo run -p vigild -- --dry-run
//! ```

use chrono::{DateTime, Local, NaiveDateTime, TimeDelta, TimeZone};
use std::sync::OnceLock;
use std::time::Duration;

/// Environment variable holding the mock start time
pub const MOCK_TIME_ENV_VAR: &str = "VIGIL_MOCK_TIME";

/// Layout of [`MOCK_TIME_ENV_VAR`]
pub const MOCK_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Offset of mock time from real time, fixed on first use
static MOCK_OFFSET: OnceLock<Option<TimeDelta>> = OnceLock::new();

/// Interpret a mock time setting as a local wall-clock time
pub fn parse_mock_time(value: &str) -> Result<DateTime<Local>, String> {
    let naive = NaiveDateTime::parse_from_str(value.trim(), MOCK_TIME_FORMAT)
        .map_err(|e| format!("expected {}: {}", MOCK_TIME_FORMAT, e))?;
    Local
        .from_local_datetime(&naive)
        .earliest()
        .ok_or_else(|| "time does not exist in the local timezone".to_string())
}

fn mock_offset() -> Option<TimeDelta> {
    if !cfg!(debug_assertions) {
        return None;
    }

    *MOCK_OFFSET.get_or_init(|| {
        let value = std::env::var(MOCK_TIME_ENV_VAR).ok()?;
        match parse_mock_time(&value) {
            Ok(mock) => {
                let offset = mock - Local::now();
                tracing::info!(mock_time = %value, offset_secs = offset.num_seconds(), "Mock time enabled");
                Some(offset)
            }
            Err(e) => {
                tracing::warn!(mock_time = %value, error = %e, "Ignoring invalid mock time");
                None
            }
        }
    })
}

/// Current local time (shifted by the mock offset in debug builds)
pub fn now() -> DateTime<Local> {
    let real = Local::now();
    match mock_offset() {
        Some(offset) => real + offset,
        None => real,
    }
}

/// Helper to format durations in human-readable form
pub fn format_duration(d: Duration) -> String {
    let total_secs = d.as_secs();
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;

    if hours > 0 {
        format!("{}h {}m {}s", hours, minutes, seconds)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, seconds)
    } else {
        format!("{}s", seconds)
    }
}

/// Like [`format_duration`], but for signed deltas (a negative budget is
/// rendered with a leading `-`).
pub fn format_delta(d: TimeDelta) -> String {
    let magnitude = d.abs().to_std().unwrap_or_default();
    if d < TimeDelta::zero() {
        format!("-{}", format_duration(magnitude))
    } else {
        format_duration(magnitude)
    }
}

/// Clock-style `[-]H:MM:SS`; hours are not wrapped at 24 and sub-second
/// precision is truncated.
pub fn format_hms(d: TimeDelta) -> String {
    let total = d.num_seconds();
    let sign = if total < 0 { "-" } else { "" };
    let secs = total.unsigned_abs();
    format!(
        "{}{}:{:02}:{:02}",
        sign,
        secs / 3600,
        (secs % 3600) / 60,
        secs % 60
    )
}

/// Convert a std duration into a signed delta, saturating on overflow.
pub fn delta_from_std(d: Duration) -> TimeDelta {
    TimeDelta::from_std(d).unwrap_or(TimeDelta::MAX)
}
