//! Shared utilities for CLI commands.

use std::sync::LazyLock;

use anyhow::Context;
use chrono::{DateTime, Duration, NaiveTime, TimeZone, Utc};
use regex::Regex;

/// Pre-compiled regex for relative time parsing.
static RELATIVE_TIME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+)\s+(minute|hour|day|week)s?\s+ago$").unwrap());

/// Conservative bounds for relative time parsing (~1000 years in minutes).
const MAX_RELATIVE_MINUTES: i64 = 1000 * 365 * 24 * 60;

/// Parse a datetime string as either ISO 8601 or relative time.
///
/// Supports:
/// - ISO 8601: "2026-01-15T10:30:00Z"
/// - Relative: "2 hours ago", "30 minutes ago", "1 day ago", "1 week ago"
pub fn parse_datetime(s: &str, now: DateTime<Utc>) -> anyhow::Result<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }

    let Some(caps) = RELATIVE_TIME_RE.captures(s) else {
        anyhow::bail!(
            "Invalid datetime: {s}. Use ISO 8601 (e.g., 2026-01-15T10:30:00Z) or relative (e.g., '2 hours ago')"
        );
    };

    let n: i64 = caps[1]
        .parse()
        .context("failed to parse number in relative time")?;

    let (max_for_unit, minutes_per_unit) = match &caps[2] {
        "minute" => (MAX_RELATIVE_MINUTES, 1),
        "hour" => (MAX_RELATIVE_MINUTES / 60, 60),
        "day" => (MAX_RELATIVE_MINUTES / (60 * 24), 60 * 24),
        "week" => (MAX_RELATIVE_MINUTES / (60 * 24 * 7), 60 * 24 * 7),
        unit => anyhow::bail!("Unknown time unit: {unit}"),
    };

    if n > max_for_unit {
        anyhow::bail!("Relative time value too large: {n} {}", &caps[2]);
    }

    Ok(now - Duration::minutes(n * minutes_per_unit))
}

/// Resolves an optional `--at` argument, defaulting to the current time.
pub fn command_time(at: Option<&str>) -> anyhow::Result<DateTime<Utc>> {
    let now = Utc::now();
    at.map_or(Ok(now), |s| parse_datetime(s, now))
}

/// Parses a wall-clock time as `HH:MM`.
pub fn parse_clock_time(s: &str) -> Result<NaiveTime, String> {
    NaiveTime::parse_from_str(s, "%H:%M").map_err(|_| format!("invalid time '{s}', expected HH:MM"))
}

/// Formats minutes as "Xh Ym" if >= 1 hour, "Xm" if < 1 hour.
/// Negative values are shown as 0m.
pub fn format_minutes(minutes: i64) -> String {
    if minutes < 0 {
        return "0m".to_string();
    }
    let hours = minutes / 60;
    let minutes = minutes % 60;

    if hours >= 1 {
        format!("{hours}h {minutes}m")
    } else {
        format!("{minutes}m")
    }
}

/// Formats hours with one decimal, e.g. "8.0h".
pub fn format_hours(hours: f64) -> String {
    format!("{hours:.1}h")
}

/// Formats a variance with an explicit sign, e.g. "+0.5h".
pub fn format_variance(hours: f64) -> String {
    format!("{hours:+.1}h")
}

/// Formats an instant as local `HH:MM`.
pub fn clock_time<Tz: TimeZone>(instant: DateTime<Utc>, tz: &Tz) -> String
where
    Tz::Offset: std::fmt::Display,
{
    instant.with_timezone(tz).format("%H:%M").to_string()
}

/// Formats an instant as local `YYYY-MM-DD HH:MM`.
pub fn format_timestamp_local<Tz: TimeZone>(instant: DateTime<Utc>, tz: &Tz) -> String
where
    Tz::Offset: std::fmt::Display,
{
    instant.with_timezone(tz).format("%Y-%m-%d %H:%M").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 10, 12, 0, 0)
            .single()
            .expect("valid timestamp")
    }

    #[test]
    fn parses_rfc3339_with_offset() {
        let parsed = parse_datetime("2025-03-10T10:30:00+02:00", now()).unwrap();
        assert_eq!(parsed, Utc.with_ymd_and_hms(2025, 3, 10, 8, 30, 0).unwrap());
    }

    #[test]
    fn parses_relative_times() {
        assert_eq!(
            parse_datetime("2 hours ago", now()).unwrap(),
            now() - Duration::hours(2)
        );
        assert_eq!(
            parse_datetime("1 minute ago", now()).unwrap(),
            now() - Duration::minutes(1)
        );
        assert_eq!(
            parse_datetime("1 week ago", now()).unwrap(),
            now() - Duration::days(7)
        );
    }

    #[test]
    fn rejects_garbage_and_overflow() {
        assert!(parse_datetime("yesterday", now()).is_err());
        assert!(parse_datetime("99999999999999 weeks ago", now()).is_err());
    }

    #[test]
    fn clock_time_requires_hours_and_minutes() {
        assert_eq!(
            parse_clock_time("09:30"),
            Ok(NaiveTime::from_hms_opt(9, 30, 0).unwrap())
        );
        assert!(parse_clock_time("9.30").is_err());
        assert!(parse_clock_time("25:00").is_err());
    }

    #[test]
    fn formats_durations() {
        assert_eq!(format_minutes(0), "0m");
        assert_eq!(format_minutes(45), "45m");
        assert_eq!(format_minutes(300), "5h 0m");
        assert_eq!(format_minutes(-5), "0m");
        assert_eq!(format_hours(8.06), "8.1h");
        assert_eq!(format_variance(0.1), "+0.1h");
        assert_eq!(format_variance(-1.5), "-1.5h");
        assert_eq!(format_variance(0.0), "+0.0h");
    }
}
