//! Coverage command: planned shifts versus clocked presence per hour.
//!
//! The grid shows `present/planned` per hour and day, marked `-` when
//! understaffed and `+` when overstaffed.

use std::fmt::Write as _;
use std::io::Write;

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use serde::Serialize;
use ta_core::calendar::{DAYS_PER_WEEK, week_range, week_start};
use ta_core::{CoverageConfig, CoverageLevel, HourBucket, IntervalStore, TeamId, WeekCoverage, compute_week_coverage};

use super::util::{format_hours, format_variance};

/// Loads the week's schedules and entries and aggregates them.
pub fn generate<S, Tz>(
    store: &S,
    anchor: NaiveDate,
    now: DateTime<Utc>,
    tz: &Tz,
    config: &CoverageConfig,
    team: Option<&TeamId>,
) -> Result<WeekCoverage>
where
    S: IntervalStore,
    Tz: TimeZone + Sync,
{
    let monday = week_start(anchor);
    let schedules = store
        .query_schedules_in_range(monday, monday + Duration::days(DAYS_PER_WEEK), team)
        .context("failed to load schedules")?;
    let entries = store
        .query_entries_in_range(week_range(tz, anchor), team)
        .context("failed to load time entries")?;
    tracing::debug!(schedules = schedules.len(), entries = entries.len(), "loaded coverage inputs");

    Ok(compute_week_coverage(&schedules, &entries, anchor, now, tz, config))
}

fn cell(bucket: &HourBucket) -> String {
    let marker = match bucket.coverage_level {
        CoverageLevel::None if bucket.scheduled_count == 0 => return "·".to_string(),
        CoverageLevel::Low | CoverageLevel::None => "-",
        CoverageLevel::Optimal => "",
        CoverageLevel::High => "+",
    };
    format!("{}/{}{marker}", bucket.active_count, bucket.scheduled_count)
}

/// Formats the human-readable coverage report.
pub fn format_coverage(coverage: &WeekCoverage) -> String {
    let mut output = String::new();

    writeln!(
        output,
        "COVERAGE: Week of {}",
        coverage.week_start.format("%b %-d, %Y")
    )
    .unwrap();
    writeln!(output).unwrap();

    write!(output, "       ").unwrap();
    for day in &coverage.days {
        write!(output, "{:>6}", day.date.format("%a").to_string()).unwrap();
    }
    writeln!(output).unwrap();

    let hours: Vec<u32> = coverage
        .days
        .first()
        .map(|day| day.hours.iter().map(|b| b.hour).collect())
        .unwrap_or_default();
    for (row, hour) in hours.iter().enumerate() {
        write!(output, "{hour:02}:00  ").unwrap();
        for day in &coverage.days {
            let text = day.hours.get(row).map(cell).unwrap_or_default();
            write!(output, "{text:>6}").unwrap();
        }
        writeln!(output).unwrap();
    }

    writeln!(output).unwrap();
    writeln!(output, "DAYS").unwrap();
    writeln!(output, "────").unwrap();
    for day in &coverage.days {
        writeln!(
            output,
            "{}  planned {:>6}  actual {:>6}  variance {:>6}  staff {}",
            day.date.format("%a %b %d"),
            format_hours(day.planned_hours),
            format_hours(day.actual_hours),
            format_variance(day.variance_hours),
            day.unique_employee_count
        )
        .unwrap();
    }

    writeln!(output).unwrap();
    writeln!(output, "SUMMARY").unwrap();
    writeln!(output, "───────").unwrap();
    writeln!(output, "Planned:   {}", format_hours(coverage.total_planned)).unwrap();
    writeln!(output, "Actual:    {}", format_hours(coverage.total_actual)).unwrap();
    writeln!(output, "Variance:  {}", format_variance(coverage.total_variance)).unwrap();
    writeln!(output, "Covered:   {}% of hours", coverage.average_coverage_pct).unwrap();
    writeln!(output, "Staff:     {}", coverage.unique_employee_count).unwrap();

    output
}

/// JSON coverage report.
#[derive(Debug, Serialize)]
pub struct JsonCoverage<'a> {
    pub generated_at: String,
    pub timezone: String,
    #[serde(flatten)]
    pub coverage: &'a WeekCoverage,
}

/// Formats the coverage report as JSON.
pub fn format_coverage_json(
    coverage: &WeekCoverage,
    generated_at: DateTime<Utc>,
    timezone: String,
) -> Result<String> {
    let report = JsonCoverage {
        generated_at: generated_at.to_rfc3339(),
        timezone,
        coverage,
    };
    Ok(serde_json::to_string_pretty(&report)?)
}

#[expect(clippy::too_many_arguments, reason = "mirrors the command's flags")]
pub fn run<W, S, Tz>(
    writer: &mut W,
    store: &S,
    anchor: NaiveDate,
    now: DateTime<Utc>,
    tz: &Tz,
    config: &CoverageConfig,
    team: Option<&TeamId>,
    json: bool,
) -> Result<()>
where
    W: Write,
    S: IntervalStore,
    Tz: TimeZone + Sync,
{
    let coverage = generate(store, anchor, now, tz, config, team)?;
    if json {
        let timezone = iana_time_zone::get_timezone().unwrap_or_else(|_| "UTC".to_string());
        writeln!(writer, "{}", format_coverage_json(&coverage, now, timezone)?)?;
    } else {
        write!(writer, "{}", format_coverage(&coverage))?;
    }
    Ok(())
}
