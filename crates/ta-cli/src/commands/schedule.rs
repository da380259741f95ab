//! Planned shift management.

use std::io::Write;

use anyhow::{Context, Result};
use chrono::{Duration, NaiveDate};
use ta_core::calendar::{DAYS_PER_WEEK, week_start};
use ta_core::{IntervalStore, ScheduleEntry, TeamId};
use ta_db::{NewSchedule, Store};

use super::util::format_minutes;

pub fn add<W: Write>(writer: &mut W, store: &Store, schedule: &NewSchedule) -> Result<()> {
    let stored = store
        .add_schedule(schedule)
        .context("failed to add schedule")?;
    writeln!(writer, "Scheduled {}", describe(&stored))?;
    Ok(())
}

pub fn list<W: Write, S: IntervalStore>(
    writer: &mut W,
    store: &S,
    anchor: NaiveDate,
    team: Option<&TeamId>,
) -> Result<()> {
    let monday = week_start(anchor);
    let schedules = store
        .query_schedules_in_range(monday, monday + Duration::days(DAYS_PER_WEEK), team)
        .context("failed to list schedules")?;

    writeln!(writer, "SCHEDULE: Week of {}", monday.format("%b %-d, %Y"))?;
    if schedules.is_empty() {
        writeln!(writer, "No shifts planned.")?;
        return Ok(());
    }
    for schedule in &schedules {
        writeln!(writer, "- {}", describe(schedule))?;
    }
    let planned: i64 = schedules.iter().map(ScheduleEntry::planned_minutes).sum();
    writeln!(writer, "Total planned: {}", format_minutes(planned))?;
    Ok(())
}

fn describe(schedule: &ScheduleEntry) -> String {
    let status = match schedule.status {
        ta_core::ScheduleStatus::Scheduled => String::new(),
        other => format!(" [{other}]"),
    };
    format!(
        "{} on {} {}-{} ({}){status}",
        schedule.employee_id,
        schedule.scheduled_date.format("%a %Y-%m-%d"),
        schedule.scheduled_start.format("%H:%M"),
        schedule.scheduled_end.format("%H:%M"),
        format_minutes(schedule.planned_minutes())
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::NaiveTime;
    use insta::assert_snapshot;
    use ta_core::{EmployeeId, OrganizationId};
    use ta_db::Database;

    fn shift(employee: &str, day: u32, start: u32, end: u32) -> NewSchedule {
        NewSchedule {
            employee_id: EmployeeId::new(employee).unwrap(),
            organization_id: OrganizationId::new("org-1").unwrap(),
            team_id: None,
            scheduled_date: NaiveDate::from_ymd_opt(2025, 3, day).unwrap(),
            scheduled_start: NaiveTime::from_hms_opt(start, 0, 0).unwrap(),
            scheduled_end: NaiveTime::from_hms_opt(end, 0, 0).unwrap(),
        }
    }

    #[test]
    fn add_and_list_week() {
        let store = Store::new(Database::open_in_memory().unwrap()).unwrap();
        let mut output = Vec::new();
        add(&mut output, &store, &shift("emp-a", 10, 9, 17)).unwrap();
        add(&mut output, &store, &shift("emp-b", 12, 22, 6)).unwrap();
        add(&mut output, &store, &shift("emp-a", 17, 9, 17)).unwrap();
        list(&mut output, &store, NaiveDate::from_ymd_opt(2025, 3, 13).unwrap(), None).unwrap();

        assert_snapshot!(String::from_utf8(output).unwrap(), @r"
        Scheduled emp-a on Mon 2025-03-10 09:00-17:00 (8h 0m)
        Scheduled emp-b on Wed 2025-03-12 22:00-06:00 (8h 0m)
        Scheduled emp-a on Mon 2025-03-17 09:00-17:00 (8h 0m)
        SCHEDULE: Week of Mar 10, 2025
        - emp-a on Mon 2025-03-10 09:00-17:00 (8h 0m)
        - emp-b on Wed 2025-03-12 22:00-06:00 (8h 0m)
        Total planned: 16h 0m
        ");
    }

    #[test]
    fn empty_week() {
        let store = Store::new(Database::open_in_memory().unwrap()).unwrap();
        let mut output = Vec::new();
        list(&mut output, &store, NaiveDate::from_ymd_opt(2025, 3, 10).unwrap(), None).unwrap();
        assert_snapshot!(String::from_utf8(output).unwrap(), @r"
        SCHEDULE: Week of Mar 10, 2025
        No shifts planned.
        ");
    }
}
