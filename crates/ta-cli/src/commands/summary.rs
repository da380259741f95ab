//! Summary command: daily and weekly attendance totals for one employee.

use std::fmt::Write as _;
use std::io::Write;

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use serde::Serialize;
use ta_core::calendar::week_range;
use ta_core::{EmployeeId, Interval, IntervalStore, WeeklySummary, summarize_week};

use super::util::format_minutes;

/// Loads the employee's entries around the week and summarizes them.
pub fn generate<S, Tz>(
    store: &S,
    employee_id: &EmployeeId,
    anchor: NaiveDate,
    now: DateTime<Utc>,
    tz: &Tz,
) -> Result<WeeklySummary>
where
    S: IntervalStore,
    Tz: TimeZone,
{
    let week = week_range(tz, anchor);
    // Widen by a day so shifts running into Monday from Sunday are included.
    let range = Interval::new(week.start - Duration::days(1), week.end);
    let mut entries = store
        .query_entries_for_employee_day(employee_id, range)
        .with_context(|| format!("failed to load time entries for {employee_id}"))?;
    // An open entry may have started before the widened range.
    let open = store
        .find_open_entry(employee_id)
        .with_context(|| format!("failed to load open entry for {employee_id}"))?;
    if let Some(open) = open {
        if open.clock_in < week.end && !entries.iter().any(|entry| entry.id == open.id) {
            entries.push(open);
        }
    }

    Ok(summarize_week(&entries, anchor, now, tz))
}

/// Formats the human-readable summary.
pub fn format_summary(employee_id: &EmployeeId, summary: &WeeklySummary) -> String {
    let mut output = String::new();

    writeln!(
        output,
        "SUMMARY: {employee_id}, Week of {}",
        summary.week_start.format("%b %-d, %Y")
    )
    .unwrap();
    writeln!(output).unwrap();

    for day in &summary.days {
        let mut line = format!(
            "{}  {:>7} worked  {:>6} break  {} session(s)",
            day.date.format("%a %b %d"),
            format_minutes(day.work_minutes),
            format_minutes(day.break_minutes),
            day.session_count
        );
        if day.long_day {
            write!(line, "  overtime {}", format_minutes(day.overtime_minutes)).unwrap();
        }
        writeln!(output, "{line}").unwrap();
    }

    writeln!(output).unwrap();
    writeln!(output, "TOTAL").unwrap();
    writeln!(output, "─────").unwrap();
    writeln!(output, "Worked:   {}", format_minutes(summary.total_work_minutes)).unwrap();
    writeln!(output, "Breaks:   {}", format_minutes(summary.total_break_minutes)).unwrap();
    writeln!(output, "Overtime: {}", format_minutes(summary.overtime_minutes)).unwrap();

    output
}

/// JSON summary report.
#[derive(Debug, Serialize)]
pub struct JsonSummary<'a> {
    pub generated_at: String,
    pub timezone: String,
    pub employee_id: &'a EmployeeId,
    #[serde(flatten)]
    pub summary: &'a WeeklySummary,
}

pub fn format_summary_json(
    employee_id: &EmployeeId,
    summary: &WeeklySummary,
    generated_at: DateTime<Utc>,
    timezone: String,
) -> Result<String> {
    let report = JsonSummary {
        generated_at: generated_at.to_rfc3339(),
        timezone,
        employee_id,
        summary,
    };
    Ok(serde_json::to_string_pretty(&report)?)
}

pub fn run<W, S, Tz>(
    writer: &mut W,
    store: &S,
    employee_id: &EmployeeId,
    anchor: NaiveDate,
    now: DateTime<Utc>,
    tz: &Tz,
    json: bool,
) -> Result<()>
where
    W: Write,
    S: IntervalStore,
    Tz: TimeZone,
{
    let summary = generate(store, employee_id, anchor, now, tz)?;
    if json {
        let timezone = iana_time_zone::get_timezone().unwrap_or_else(|_| "UTC".to_string());
        writeln!(writer, "{}", format_summary_json(employee_id, &summary, now, timezone)?)?;
    } else {
        write!(writer, "{}", format_summary(employee_id, &summary))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use insta::assert_snapshot;
    use ta_core::{BreakKind, Command, EmployeeContext, OrganizationId, SessionEngine};
    use ta_db::{Database, Store};

    fn ts(day: u32, hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, day, hour, minute, 0)
            .single()
            .expect("valid timestamp")
    }

    fn worked_week() -> SessionEngine<Store, Utc> {
        let engine = SessionEngine::new(Store::new(Database::open_in_memory().unwrap()).unwrap(), Utc);
        let alice = EmployeeContext {
            employee_id: EmployeeId::new("emp-a").unwrap(),
            organization_id: OrganizationId::new("org-1").unwrap(),
            team_id: None,
        };
        for day in [10, 11] {
            engine.execute(&alice, Command::ClockIn, ts(day, 8, 0)).unwrap();
            engine
                .execute(&alice, Command::StartBreak(BreakKind::Lunch), ts(day, 13, 0))
                .unwrap();
            engine.execute(&alice, Command::ResumeWork, ts(day, 13, 30)).unwrap();
            engine.execute(&alice, Command::ClockOut, ts(day, 18, 0)).unwrap();
        }
        // Sunday night shift crossing into the next week.
        engine.execute(&alice, Command::ClockIn, ts(16, 22, 0)).unwrap();
        engine.execute(&alice, Command::ClockOut, ts(17, 2, 0)).unwrap();
        engine
    }

    #[test]
    fn human_summary() {
        let engine = worked_week();
        let employee = EmployeeId::new("emp-a").unwrap();
        let mut output = Vec::new();
        run(
            &mut output,
            engine.store(),
            &employee,
            NaiveDate::from_ymd_opt(2025, 3, 12).unwrap(),
            ts(17, 12, 0),
            &Utc,
            false,
        )
        .unwrap();

        assert_snapshot!(String::from_utf8(output).unwrap(), @r"
        SUMMARY: emp-a, Week of Mar 10, 2025

        Mon Mar 10   9h 30m worked     30m break  2 session(s)  overtime 1h 30m
        Tue Mar 11   9h 30m worked     30m break  2 session(s)  overtime 1h 30m
        Wed Mar 12       0m worked      0m break  0 session(s)
        Thu Mar 13       0m worked      0m break  0 session(s)
        Fri Mar 14       0m worked      0m break  0 session(s)
        Sat Mar 15       0m worked      0m break  0 session(s)
        Sun Mar 16    2h 0m worked      0m break  1 session(s)

        TOTAL
        ─────
        Worked:   21h 0m
        Breaks:   1h 0m
        Overtime: 0m
        ");
    }

    #[test]
    fn next_week_picks_up_overnight_remainder() {
        let engine = worked_week();
        let employee = EmployeeId::new("emp-a").unwrap();
        let summary = generate(
            engine.store(),
            &employee,
            NaiveDate::from_ymd_opt(2025, 3, 17).unwrap(),
            ts(17, 12, 0),
            &Utc,
        )
        .unwrap();
        assert_eq!(summary.days[0].work_minutes, 120);
        assert_eq!(summary.total_work_minutes, 120);
    }

    #[test]
    fn json_summary_fields() {
        let engine = worked_week();
        let employee = EmployeeId::new("emp-a").unwrap();
        let summary = generate(
            engine.store(),
            &employee,
            NaiveDate::from_ymd_opt(2025, 3, 10).unwrap(),
            ts(17, 12, 0),
            &Utc,
        )
        .unwrap();
        let json = format_summary_json(&employee, &summary, ts(17, 12, 0), "UTC".to_string()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["employee_id"], "emp-a");
        assert_eq!(value["week_start"], "2025-03-10");
        assert_eq!(value["total_work_minutes"], 1260);
        assert_eq!(value["days"][0]["overtime_minutes"], 90);
        assert_eq!(value["days"][0]["long_day"], true);
    }

    #[test]
    fn only_the_requested_employee_is_summarized() {
        let engine = worked_week();
        let bob = EmployeeContext {
            employee_id: EmployeeId::new("emp-b").unwrap(),
            organization_id: OrganizationId::new("org-1").unwrap(),
            team_id: None,
        };
        engine.execute(&bob, Command::ClockIn, ts(12, 9, 0)).unwrap();
        engine.execute(&bob, Command::ClockOut, ts(12, 12, 0)).unwrap();
        let monday = NaiveDate::from_ymd_opt(2025, 3, 10).unwrap();

        let alice = generate(engine.store(), &EmployeeId::new("emp-a").unwrap(), monday, ts(17, 12, 0), &Utc).unwrap();
        assert_eq!(alice.total_work_minutes, 1260);
        assert_eq!(alice.days[2].work_minutes, 0);

        let bob = generate(engine.store(), &bob.employee_id, monday, ts(17, 12, 0), &Utc).unwrap();
        assert_eq!(bob.total_work_minutes, 180);
        assert_eq!(bob.days[2].session_count, 1);
    }

    #[test]
    fn open_entry_from_before_the_week_is_included() {
        let engine = SessionEngine::new(Store::new(Database::open_in_memory().unwrap()).unwrap(), Utc);
        let carol = EmployeeContext {
            employee_id: EmployeeId::new("emp-c").unwrap(),
            organization_id: OrganizationId::new("org-1").unwrap(),
            team_id: None,
        };
        // Saturday evening, two days before the week starts.
        engine.execute(&carol, Command::ClockIn, ts(8, 20, 0)).unwrap();

        let summary = generate(
            engine.store(),
            &carol.employee_id,
            NaiveDate::from_ymd_opt(2025, 3, 10).unwrap(),
            ts(10, 2, 0),
            &Utc,
        )
        .unwrap();
        assert_eq!(summary.days[0].work_minutes, 120);
        assert_eq!(summary.total_work_minutes, 120);
    }
}
