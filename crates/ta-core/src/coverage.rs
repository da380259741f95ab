//! Schedule coverage: planned shifts reconciled against clocked time.
//!
//! # Algorithm Summary
//!
//! 1. Take the ISO week (Monday start) containing the anchor date.
//! 2. For each day, bucket the operating hours into one-hour windows and
//!    count the distinct employees planned and actually present in each.
//! 3. Classify every bucket by the ratio of present to planned employees.
//! 4. Sum planned and actual hours per day and over the week.
//!
//! The aggregation is pure and bounded (7 days x 16 buckets by default), so
//! callers simply re-run it whenever the underlying entries change.

use std::collections::BTreeSet;

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::calendar::{local_date, week_days, week_start};
use crate::entry::{ScheduleEntry, ScheduleStatus, TimeEntry};
use crate::interval::{Interval, minutes_to_hours, round_tenths};
use crate::types::EmployeeId;

/// Configuration for coverage classification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoverageConfig {
    /// First operating hour (inclusive). Default: 6.
    pub first_hour: u32,

    /// Last operating hour (inclusive). Default: 21.
    pub last_hour: u32,

    /// Below this share of planned staff a bucket is `Low`. Default: 0.7.
    pub low_ratio: f64,

    /// Above this share of planned staff a bucket is `High`. Default: 1.2.
    pub high_ratio: f64,
}

impl Default for CoverageConfig {
    fn default() -> Self {
        Self {
            first_hour: 6,
            last_hour: 21,
            low_ratio: 0.7,
            high_ratio: 1.2,
        }
    }
}

impl CoverageConfig {
    /// The operating hours as bucket start hours, clamped to the day.
    pub fn hours(&self) -> std::ops::RangeInclusive<u32> {
        self.first_hour..=self.last_hour.min(23)
    }
}

/// Staffing adequacy of one hour bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CoverageLevel {
    /// Nobody present.
    None,
    /// Fewer people present than planned.
    Low,
    Optimal,
    /// More people present than planned, including unplanned presence.
    High,
}

impl CoverageLevel {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Low => "low",
            Self::Optimal => "optimal",
            Self::High => "high",
        }
    }

    /// Whether the bucket counts toward the week's coverage percentage.
    pub const fn is_covered(&self) -> bool {
        matches!(self, Self::Optimal | Self::High)
    }
}

impl std::fmt::Display for CoverageLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classifies a bucket from its planned and present head counts.
#[allow(clippy::cast_precision_loss)]
pub fn classify(scheduled_count: usize, active_count: usize, config: &CoverageConfig) -> CoverageLevel {
    if active_count == 0 {
        return CoverageLevel::None;
    }
    if scheduled_count == 0 {
        return CoverageLevel::High;
    }
    let scheduled = scheduled_count as f64;
    let active = active_count as f64;
    if active < config.low_ratio * scheduled {
        CoverageLevel::Low
    } else if active > config.high_ratio * scheduled {
        CoverageLevel::High
    } else {
        CoverageLevel::Optimal
    }
}

/// Coverage of one operating hour.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HourBucket {
    pub hour: u32,
    pub scheduled_count: usize,
    pub active_count: usize,
    pub coverage_level: CoverageLevel,
    /// Planned employees, sorted.
    pub scheduled_employees: Vec<EmployeeId>,
    /// Present employees, sorted.
    pub active_employees: Vec<EmployeeId>,
}

/// Coverage of one calendar day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DayCoverage {
    pub date: NaiveDate,
    pub hours: Vec<HourBucket>,
    pub planned_hours: f64,
    pub actual_hours: f64,
    pub unique_employee_count: usize,
    pub variance_hours: f64,
}

/// Coverage of one ISO week.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeekCoverage {
    pub week_start: NaiveDate,
    pub days: Vec<DayCoverage>,
    pub total_planned: f64,
    pub total_actual: f64,
    pub total_variance: f64,
    /// Share of buckets that are `Optimal` or `High`, 0-100.
    pub average_coverage_pct: u32,
    pub unique_employee_count: usize,
}

/// An employee's interval in local wall-clock time.
type LocalSpan<'a> = (&'a EmployeeId, Interval<NaiveDateTime>);

fn to_local<Tz: TimeZone>(tz: &Tz, instant: DateTime<Utc>) -> NaiveDateTime {
    instant.with_timezone(tz).naive_local()
}

/// Distinct employees whose span overlaps `bucket`.
fn present_in<'a>(spans: &[LocalSpan<'a>], bucket: &Interval<NaiveDateTime>) -> BTreeSet<&'a EmployeeId> {
    spans
        .iter()
        .filter(|(_, span)| span.overlaps(bucket))
        .map(|(employee, _)| *employee)
        .collect()
}

fn day_coverage<Tz: TimeZone>(
    date: NaiveDate,
    schedules: &[&ScheduleEntry],
    entries: &[&TimeEntry],
    now: DateTime<Utc>,
    tz: &Tz,
    config: &CoverageConfig,
) -> DayCoverage {
    let day_schedules: Vec<&ScheduleEntry> = schedules
        .iter()
        .copied()
        .filter(|s| s.scheduled_date == date)
        .collect();
    let day_entries: Vec<&TimeEntry> = entries
        .iter()
        .copied()
        .filter(|e| local_date(tz, e.clock_in) == date)
        .collect();

    let planned: Vec<LocalSpan<'_>> = day_schedules
        .iter()
        .map(|s| (&s.employee_id, s.planned_interval()))
        .collect();
    let actual: Vec<LocalSpan<'_>> = day_entries
        .iter()
        .map(|e| {
            let span = e.interval_until(now);
            (&e.employee_id, Interval::new(to_local(tz, span.start), to_local(tz, span.end)))
        })
        .collect();

    let hours = config
        .hours()
        .filter_map(|hour| {
            let start = date.and_time(NaiveTime::from_hms_opt(hour, 0, 0)?);
            let bucket = Interval::new(start, start + Duration::hours(1));
            let scheduled = present_in(&planned, &bucket);
            let active = present_in(&actual, &bucket);
            let coverage_level = classify(scheduled.len(), active.len(), config);
            tracing::trace!(%date, hour, scheduled = scheduled.len(), active = active.len(), %coverage_level, "bucket");
            Some(HourBucket {
                hour,
                scheduled_count: scheduled.len(),
                active_count: active.len(),
                coverage_level,
                scheduled_employees: scheduled.into_iter().cloned().collect(),
                active_employees: active.into_iter().cloned().collect(),
            })
        })
        .collect();

    let planned_minutes: i64 = day_schedules.iter().map(|s| s.planned_minutes()).sum();
    let actual_minutes: i64 = day_entries
        .iter()
        .filter_map(|e| e.closed_minutes())
        .map(|minutes| minutes.max(0))
        .sum();
    let planned_hours = minutes_to_hours(planned_minutes);
    let actual_hours = minutes_to_hours(actual_minutes);

    let unique_employee_count = day_schedules
        .iter()
        .map(|s| &s.employee_id)
        .chain(day_entries.iter().map(|e| &e.employee_id))
        .collect::<BTreeSet<_>>()
        .len();

    DayCoverage {
        date,
        hours,
        planned_hours,
        actual_hours,
        unique_employee_count,
        variance_hours: round_tenths(actual_hours - planned_hours),
    }
}

/// Reconciles planned shifts against clocked entries for the ISO week that
/// contains `week_anchor`.
///
/// Schedules count on their `scheduled_date`; entries count on the local
/// date of their clock-in. Open entries are treated as running until `now`
/// for presence, but only closed entries contribute to actual hours.
/// Cancelled shifts are ignored. Inputs outside the week are ignored and
/// inverted intervals contribute nothing, so the result is always usable.
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn compute_week_coverage<Tz: TimeZone + Sync>(
    schedules: &[ScheduleEntry],
    entries: &[TimeEntry],
    week_anchor: NaiveDate,
    now: DateTime<Utc>,
    tz: &Tz,
    config: &CoverageConfig,
) -> WeekCoverage {
    let dates = week_days(week_anchor);
    let in_week = |date: NaiveDate| dates.contains(&date);

    let schedules: Vec<&ScheduleEntry> = schedules
        .iter()
        .filter(|s| s.status != ScheduleStatus::Cancelled && in_week(s.scheduled_date))
        .collect();
    let entries: Vec<&TimeEntry> = entries
        .iter()
        .filter(|e| in_week(local_date(tz, e.clock_in)))
        .collect();

    let days: Vec<DayCoverage> = dates
        .par_iter()
        .map(|date| day_coverage(*date, &schedules, &entries, now, tz, config))
        .collect();

    let total_planned = round_tenths(days.iter().map(|d| d.planned_hours).sum());
    let total_actual = round_tenths(days.iter().map(|d| d.actual_hours).sum());
    let total_variance = round_tenths(days.iter().map(|d| d.variance_hours).sum());

    let buckets = days.iter().flat_map(|d| &d.hours);
    let bucket_count = buckets.clone().count();
    let covered = buckets.filter(|b| b.coverage_level.is_covered()).count();
    let average_coverage_pct = if bucket_count == 0 {
        0
    } else {
        (covered as f64 / bucket_count as f64 * 100.0).round() as u32
    };

    let unique_employee_count = schedules
        .iter()
        .map(|s| &s.employee_id)
        .chain(entries.iter().map(|e| &e.employee_id))
        .collect::<BTreeSet<_>>()
        .len();

    tracing::debug!(
        week = %week_start(week_anchor),
        schedules = schedules.len(),
        entries = entries.len(),
        average_coverage_pct,
        "computed week coverage"
    );

    WeekCoverage {
        week_start: week_start(week_anchor),
        days,
        total_planned,
        total_actual,
        total_variance,
        average_coverage_pct,
        unique_employee_count,
    }
}
