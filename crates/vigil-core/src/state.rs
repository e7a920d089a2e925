//! Persisted budget record

use chrono::{DateTime, Local, TimeDelta};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// The single persisted budget record.
///
/// Field names are camelCase on disk; the PascalCase names written by earlier
/// versions of the tool are accepted when reading.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BudgetState {
    /// Last time the remaining budget was computed
    #[serde(with = "timestamp", alias = "LastUpdateTime")]
    pub last_update_time: DateTime<Local>,

    /// Last time a readout was announced
    #[serde(default, with = "optional_timestamp", alias = "LastReadoutTime")]
    pub last_readout_time: Option<DateTime<Local>>,

    #[serde(with = "duration_format", alias = "TimeAllotmentPerDay")]
    pub allotment_per_day: TimeDelta,

    /// May go negative in memory; persisted clamped at zero
    #[serde(with = "duration_format", alias = "TimeRemainingToday")]
    pub remaining_today: TimeDelta,

    /// When false the engine only observes the record
    #[serde(default = "default_enabled", alias = "Enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

impl BudgetState {
    /// A full day's budget starting at `now`
    pub fn fresh(now: DateTime<Local>, allotment: TimeDelta) -> Self {
        Self {
            last_update_time: now,
            last_readout_time: None,
            allotment_per_day: allotment,
            remaining_today: allotment,
            enabled: true,
        }
    }

    pub fn clamp_remaining(&mut self) {
        if self.remaining_today < TimeDelta::zero() {
            self.remaining_today = TimeDelta::zero();
        }
    }

    /// Remaining budget as a std duration (zero when exhausted)
    pub fn remaining(&self) -> Duration {
        self.remaining_today.to_std().unwrap_or_default()
    }
}

/// Durations as `[-][d.]hh:mm:ss[.fffffff]`.
///
/// The day prefix appears only from 24 hours up. Reading also accepts
/// unpadded hours and hour counts above 23. Fractions are kept to 100ns
/// resolution; further digits are ignored.
pub mod duration_format {
    use chrono::TimeDelta;
    use serde::{Deserialize, Deserializer, Serializer};

    const FRACTION_DIGITS: usize = 7;
    const NANOS_PER_TICK: i64 = 100;

    pub fn format(d: TimeDelta) -> String {
        let magnitude = d.abs();
        let secs = magnitude.num_seconds();
        let ticks = i64::from(magnitude.subsec_nanos()) / NANOS_PER_TICK;

        let mut out = String::new();
        if d < TimeDelta::zero() {
            out.push('-');
        }
        if secs >= 86_400 {
            out.push_str(&format!("{}.", secs / 86_400));
        }
        out.push_str(&format!(
            "{:02}:{:02}:{:02}",
            (secs % 86_400) / 3600,
            (secs % 3600) / 60,
            secs % 60
        ));
        if ticks > 0 {
            out.push_str(&format!(".{:07}", ticks));
        }
        out
    }

    pub fn parse(input: &str) -> Result<TimeDelta, String> {
        let invalid = || format!("invalid duration '{}'", input);
        let trimmed = input.trim();
        let (negative, body) = match trimmed.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, trimmed),
        };

        let mut fields = body.split(':');
        let (Some(lead), Some(minutes), Some(rest), None) =
            (fields.next(), fields.next(), fields.next(), fields.next())
        else {
            return Err(invalid());
        };

        let (days, hours) = match lead.split_once('.') {
            Some((days, hours)) => (number(days).ok_or_else(invalid)?, hours),
            None => (0, lead),
        };
        let hours = number(hours).ok_or_else(invalid)?;
        let minutes = number(minutes).filter(|m| *m < 60).ok_or_else(invalid)?;

        let (seconds, fraction) = match rest.split_once('.') {
            Some((seconds, fraction)) => (seconds, Some(fraction)),
            None => (rest, None),
        };
        let seconds = number(seconds).filter(|s| *s < 60).ok_or_else(invalid)?;

        let nanos = match fraction {
            Some(digits) if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) => {
                let kept: String = digits.chars().take(FRACTION_DIGITS).collect();
                let ticks: i64 = format!("{:0<7}", kept).parse().map_err(|_| invalid())?;
                ticks * NANOS_PER_TICK
            }
            Some(_) => return Err(invalid()),
            None => 0,
        };

        let total_secs = days
            .checked_mul(86_400)
            .and_then(|s| s.checked_add(hours.checked_mul(3600)?))
            .and_then(|s| s.checked_add(minutes * 60 + seconds))
            .ok_or_else(invalid)?;
        let magnitude = TimeDelta::try_seconds(total_secs)
            .and_then(|d| d.checked_add(&TimeDelta::nanoseconds(nanos)))
            .ok_or_else(invalid)?;

        Ok(if negative { -magnitude } else { magnitude })
    }

    fn number(field: &str) -> Option<i64> {
        if field.is_empty() || !field.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        field.parse().ok()
    }

    pub fn serialize<S: Serializer>(d: &TimeDelta, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format(*d))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<TimeDelta, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse(&raw).map_err(serde::de::Error::custom)
    }
}

/// RFC 3339 timestamps; an offset-less value is read as local wall-clock time.
pub mod timestamp {
    use chrono::{DateTime, Local, NaiveDateTime, SecondsFormat, TimeZone};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn format(dt: &DateTime<Local>) -> String {
        dt.to_rfc3339_opts(SecondsFormat::AutoSi, false)
    }

    pub fn parse(input: &str) -> Result<DateTime<Local>, String> {
        if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
            return Ok(dt.with_timezone(&Local));
        }
        NaiveDateTime::parse_from_str(input, "%Y-%m-%dT%H:%M:%S%.f")
            .ok()
            .and_then(|naive| Local.from_local_datetime(&naive).earliest())
            .ok_or_else(|| format!("invalid timestamp '{}'", input))
    }

    pub fn serialize<S: Serializer>(dt: &DateTime<Local>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format(dt))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<DateTime<Local>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse(&raw).map_err(serde::de::Error::custom)
    }
}

/// [`timestamp`], with `null` for absent values
pub mod optional_timestamp {
    use chrono::{DateTime, Local};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        dt: &Option<DateTime<Local>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match dt {
            Some(dt) => serializer.serialize_str(&super::timestamp::format(dt)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<DateTime<Local>>, D::Error> {
        match Option::<String>::deserialize(deserializer)? {
            Some(raw) => super::timestamp::parse(&raw)
                .map(Some)
                .map_err(serde::de::Error::custom),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(h: u32, m: u32, s: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(2025, 6, 18, h, m, s).single().unwrap()
    }

    #[test]
    fn duration_formatting() {
        assert_eq!(duration_format::format(TimeDelta::hours(2)), "02:00:00");
        assert_eq!(duration_format::format(TimeDelta::zero()), "00:00:00");
        assert_eq!(duration_format::format(TimeDelta::seconds(-330)), "-00:05:30");
        assert_eq!(
            duration_format::format(TimeDelta::milliseconds(10_250)),
            "00:00:10.2500000"
        );
        assert_eq!(
            duration_format::format(TimeDelta::milliseconds(-1_500)),
            "-00:00:01.5000000"
        );
    }

    #[test]
    fn day_prefix_from_24_hours() {
        assert_eq!(duration_format::format(TimeDelta::hours(24)), "1.00:00:00");
        assert_eq!(duration_format::format(TimeDelta::hours(26)), "1.02:00:00");
        assert_eq!(
            duration_format::format(-TimeDelta::seconds(2 * 86_400 + 61)),
            "-2.00:01:01"
        );
        assert_eq!(
            duration_format::parse("1.02:00:00"),
            Ok(TimeDelta::hours(26))
        );
    }

    #[test]
    fn duration_parsing_accepts_legacy_forms() {
        let parse = |s| duration_format::parse(s).unwrap();
        assert_eq!(parse("02:00:00"), TimeDelta::hours(2));
        assert_eq!(parse("26:00:00"), TimeDelta::hours(26));
        assert_eq!(parse("1.02:00:00"), TimeDelta::hours(26));
        assert_eq!(parse("-00:05:00"), TimeDelta::minutes(-5));
        assert_eq!(
            parse("01:59:49.9843210"),
            TimeDelta::seconds(7189) + TimeDelta::nanoseconds(984_321_000)
        );
        assert_eq!(parse("0:00:01.123456789"), TimeDelta::nanoseconds(1_123_456_700));
        assert_eq!(parse("0:00:00.5"), TimeDelta::milliseconds(500));
    }

    #[test]
    fn duration_parsing_rejects_garbage() {
        for bad in ["", "2h", "1:2", "00:60:00", "00:00:75", "a:00:00", "1:00:00.x", "1:00:00:00"] {
            assert!(duration_format::parse(bad).is_err(), "accepted '{}'", bad);
        }
    }

    #[test]
    fn record_serializes_camel_case() {
        let state = BudgetState::fresh(at(12, 0, 0), TimeDelta::hours(2));
        let json: serde_json::Value = serde_json::to_value(&state).unwrap();

        assert_eq!(json["allotmentPerDay"], "02:00:00");
        assert_eq!(json["remainingToday"], "02:00:00");
        assert_eq!(json["enabled"], true);
        assert!(json["lastReadoutTime"].is_null());
        assert!(json["lastUpdateTime"].as_str().unwrap().starts_with("2025-06-18T12:00:00"));
    }

    #[test]
    fn record_round_trips() {
        let mut state = BudgetState::fresh(at(12, 0, 0), TimeDelta::hours(2));
        state.remaining_today = TimeDelta::seconds(5000) + TimeDelta::milliseconds(250);
        state.last_readout_time = Some(at(11, 58, 30));

        let json = serde_json::to_string_pretty(&state).unwrap();
        let back: BudgetState = serde_json::from_str(&json).unwrap();
        assert_eq!(back, state);
    }

    #[test]
    fn reads_pascal_case_record() {
        let json = r#"{
            "LastUpdateTime": "2025-06-18T09:30:00.1234567",
            "LastReadoutTime": null,
            "TimeAllotmentPerDay": "02:00:00",
            "TimeRemainingToday": "01:15:00",
            "Enabled": false
        }"#;

        let state: BudgetState = serde_json::from_str(json).unwrap();
        assert_eq!(
            state.last_update_time,
            at(9, 30, 0) + TimeDelta::nanoseconds(123_456_700)
        );
        assert_eq!(state.remaining_today, TimeDelta::minutes(75));
        assert!(!state.enabled);
        assert!(state.last_readout_time.is_none());
    }

    #[test]
    fn enabled_defaults_to_true() {
        let json = r#"{
            "lastUpdateTime": "2025-06-18T09:30:00+00:00",
            "allotmentPerDay": "2:00:00",
            "remainingToday": "2:00:00"
        }"#;
        let state: BudgetState = serde_json::from_str(json).unwrap();
        assert!(state.enabled);
        assert!(state.last_readout_time.is_none());
    }

    #[test]
    fn clamp_and_remaining() {
        let mut state = BudgetState::fresh(at(12, 0, 0), TimeDelta::hours(2));
        state.remaining_today = TimeDelta::minutes(-3);
        assert_eq!(state.remaining(), Duration::ZERO);

        state.clamp_remaining();
        assert_eq!(state.remaining_today, TimeDelta::zero());
    }
}
