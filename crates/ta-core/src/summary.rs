//! Per-employee daily and weekly attendance totals.

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::calendar::{day_range, week_days, week_start};
use crate::entry::TimeEntry;

/// Standard working day, in minutes.
pub const STANDARD_DAY_MINUTES: i64 = 8 * 60;

/// Standard working week, in minutes.
pub const STANDARD_WEEK_MINUTES: i64 = 40 * 60;

/// Attendance of one employee on one local day.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailySummary {
    pub date: NaiveDate,
    pub work_minutes: i64,
    pub break_minutes: i64,
    /// Work entries overlapping the day, open or closed.
    pub session_count: usize,
    pub break_count: usize,
    /// Work beyond [`STANDARD_DAY_MINUTES`].
    pub overtime_minutes: i64,
    pub long_day: bool,
}

/// Attendance of one employee over an ISO week.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeeklySummary {
    pub week_start: NaiveDate,
    pub days: Vec<DailySummary>,
    pub total_work_minutes: i64,
    pub total_break_minutes: i64,
    /// Work beyond [`STANDARD_WEEK_MINUTES`].
    pub overtime_minutes: i64,
}

/// Summarizes `entries` for the local day `date`.
///
/// Each entry contributes only the minutes that fall inside the day, so a
/// shift crossing midnight is split between the two days. Open entries run
/// until `now`.
pub fn summarize_day<Tz: TimeZone>(
    entries: &[TimeEntry],
    date: NaiveDate,
    now: DateTime<Utc>,
    tz: &Tz,
) -> DailySummary {
    let window = day_range(tz, date);
    let mut summary = DailySummary {
        date,
        ..DailySummary::default()
    };

    for entry in entries {
        let span = entry.interval_until(now);
        if !span.overlaps(&window) {
            continue;
        }
        let minutes = span.minutes_within(&window);
        if entry.kind.is_break() {
            summary.break_minutes += minutes;
            summary.break_count += 1;
        } else {
            summary.work_minutes += minutes;
            summary.session_count += 1;
        }
    }

    summary.overtime_minutes = (summary.work_minutes - STANDARD_DAY_MINUTES).max(0);
    summary.long_day = summary.work_minutes > STANDARD_DAY_MINUTES;
    summary
}

/// Summarizes `entries` for the ISO week containing `anchor`.
pub fn summarize_week<Tz: TimeZone>(
    entries: &[TimeEntry],
    anchor: NaiveDate,
    now: DateTime<Utc>,
    tz: &Tz,
) -> WeeklySummary {
    let days: Vec<DailySummary> = week_days(anchor)
        .into_iter()
        .map(|date| summarize_day(entries, date, now, tz))
        .collect();
    let total_work_minutes = days.iter().map(|d| d.work_minutes).sum::<i64>();
    let total_break_minutes = days.iter().map(|d| d.break_minutes).sum();

    tracing::debug!(week = %week_start(anchor), total_work_minutes, "summarized week");

    WeeklySummary {
        week_start: week_start(anchor),
        days,
        total_work_minutes,
        total_break_minutes,
        overtime_minutes: (total_work_minutes - STANDARD_WEEK_MINUTES).max(0),
    }
}
