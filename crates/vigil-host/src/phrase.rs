//! Spoken phrasing of the remaining time

use std::time::Duration;

fn unit(count: u64, singular: &str) -> String {
    if count == 1 {
        format!("1 {}", singular)
    } else {
        format!("{} {}s", count, singular)
    }
}

/// Human phrase for a remaining budget, e.g. "1 hour and 30 minutes".
///
/// Seconds are only spoken when less than an hour remains.
pub fn describe_remaining(remaining: Duration) -> String {
    let total = remaining.as_secs();
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let seconds = total % 60;

    let mut parts = Vec::new();
    if hours > 0 {
        parts.push(unit(hours, "hour"));
    }
    if minutes > 0 {
        parts.push(unit(minutes, "minute"));
    }
    if hours == 0 && seconds > 0 {
        parts.push(unit(seconds, "second"));
    }

    if parts.is_empty() {
        "no time".to_string()
    } else {
        parts.join(" and ")
    }
}

/// Full sentence announced to the user
pub fn speak_remaining(remaining: Duration) -> String {
    format!("You have {} remaining", describe_remaining(remaining))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phrases() {
        assert_eq!(
            speak_remaining(Duration::from_secs(5400)),
            "You have 1 hour and 30 minutes remaining"
        );
        assert_eq!(
            speak_remaining(Duration::from_secs(45)),
            "You have 45 seconds remaining"
        );
        assert_eq!(speak_remaining(Duration::ZERO), "You have no time remaining");
        assert_eq!(
            speak_remaining(Duration::from_secs(7200)),
            "You have 2 hours remaining"
        );
    }

    #[test]
    fn seconds_dropped_above_an_hour() {
        assert_eq!(describe_remaining(Duration::from_secs(3661)), "1 hour and 1 minute");
        assert_eq!(
            describe_remaining(Duration::from_secs(14 * 60 + 47)),
            "14 minutes and 47 seconds"
        );
        assert_eq!(describe_remaining(Duration::from_secs(61)), "1 minute and 1 second");
    }
}
