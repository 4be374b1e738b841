use super::text::{pluralize, to_sentence};
use chrono::{DateTime, TimeZone};
use std::fmt::Display;
use std::time::Duration;

const UNITS: [(&str, &str, u64); 5] = [
    ("week", "w", 7 * 24 * 3600),
    ("day", "d", 24 * 3600),
    ("hour", "h", 3600),
    ("minute", "m", 60),
    ("second", "s", 1),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DurationStyle {
    /// `1 hour and 5 minutes`
    Long,
    /// `1h 5m`, always limited to the two most significant components.
    Short,
}

/// Formats a duration with whole-second precision.
///
/// `limit` caps the number of non-zero components that are printed; the
/// [`DurationStyle::Short`] style always uses a limit of two.
pub fn format_duration(duration: Duration, style: DurationStyle, limit: Option<usize>) -> String {
    let limit = match style {
        DurationStyle::Short => Some(2),
        DurationStyle::Long => limit,
    };

    let mut remaining = duration.as_secs();
    let mut tokens = Vec::new();
    for (name, abbreviation, seconds) in UNITS {
        let value = remaining / seconds;
        remaining %= seconds;
        if value == 0 {
            continue;
        }
        tokens.push(match style {
            DurationStyle::Short => format!("{}{}", value, abbreviation),
            DurationStyle::Long => format!("{} {}", value, pluralize(name, value)),
        });
        if limit.is_some_and(|l| tokens.len() >= l) {
            break;
        }
    }

    match (style, tokens.is_empty()) {
        (DurationStyle::Short, true) => "0s".to_string(),
        (DurationStyle::Long, true) => "0 seconds".to_string(),
        (DurationStyle::Short, false) => tokens.join(" "),
        (DurationStyle::Long, false) => to_sentence(&tokens),
    }
}

/// Renders a timestamp like C's `ctime`, e.g. `Mon Oct 19 14:03:07 2026`.
pub fn ctime<Tz: TimeZone>(at: &DateTime<Tz>) -> String
where
    Tz::Offset: Display,
{
    at.format("%a %b %e %H:%M:%S %Y").to_string()
}

/// Renders a start time for the status table, e.g. `Oct 19 14:03`.
pub fn short_timestamp<Tz: TimeZone>(at: &DateTime<Tz>) -> String
where
    Tz::Offset: Display,
{
    at.format("%b %d %H:%M").to_string()
}
