//! Status command showing the current session and break entitlement.

use std::fmt::Write as _;
use std::io::Write;

use anyhow::Result;
use chrono::{DateTime, TimeZone, Utc};
use ta_core::{BreakRequirements, EmployeeId, IntervalStore, SessionEngine, SessionPhase, SessionState};

use super::util::{clock_time, format_minutes};

pub fn run<W, S, Tz>(
    writer: &mut W,
    engine: &SessionEngine<S, Tz>,
    employee_id: &EmployeeId,
    now: DateTime<Utc>,
) -> Result<()>
where
    W: Write,
    S: IntervalStore,
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    let (state, requirements) = engine.current_state(employee_id, now)?;
    write!(
        writer,
        "{}",
        format_status(employee_id, &state, &requirements, engine.tz())
    )?;
    Ok(())
}

/// One-line session summary used by `watch`.
pub fn format_status_line<Tz>(state: &SessionState, requirements: &BreakRequirements, now: DateTime<Utc>, tz: &Tz) -> String
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    let phase = match state.phase() {
        SessionPhase::Idle => "idle".to_string(),
        SessionPhase::Working => format!("working {}", format_minutes(state.work_elapsed_minutes)),
        SessionPhase::OnBreak(kind) => {
            format!("{kind} break {}", format_minutes(state.break_elapsed_minutes))
        }
    };
    format!(
        "[{}] {phase} | today {} worked, {} break | {}",
        clock_time(now, tz),
        format_minutes(state.total_worked_today),
        format_minutes(state.total_break_today),
        requirements.compliance_message
    )
}

/// Formats the full status block.
pub fn format_status<Tz>(
    employee_id: &EmployeeId,
    state: &SessionState,
    requirements: &BreakRequirements,
    tz: &Tz,
) -> String
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    let mut output = String::new();
    let since = state
        .active_since
        .map(|instant| clock_time(instant, tz))
        .unwrap_or_default();

    writeln!(output, "Employee: {employee_id}").unwrap();
    match state.phase() {
        SessionPhase::Idle => writeln!(output, "State:    idle").unwrap(),
        SessionPhase::Working => writeln!(
            output,
            "State:    working since {since} ({})",
            format_minutes(state.work_elapsed_minutes)
        )
        .unwrap(),
        SessionPhase::OnBreak(kind) => writeln!(
            output,
            "State:    on {kind} break since {since} ({})",
            format_minutes(state.break_elapsed_minutes)
        )
        .unwrap(),
    }
    writeln!(
        output,
        "Today:    {} worked, {} on break",
        format_minutes(state.total_worked_today),
        format_minutes(state.total_break_today)
    )
    .unwrap();

    let suggestion = requirements
        .suggested_break_kind
        .map(|kind| format!(" (suggested: {kind})"))
        .unwrap_or_default();
    writeln!(output, "Breaks:   {}{suggestion}", requirements.compliance_message).unwrap();
    if let Some(minutes) = requirements.next_break_in {
        writeln!(output, "Next break earned in {}", format_minutes(minutes)).unwrap();
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;

    use insta::assert_snapshot;
    use ta_core::{BreakKind, Command, EmployeeContext, OrganizationId};
    use ta_db::{Database, Store};

    fn ts(hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 10, hour, minute, 0)
            .single()
            .expect("valid timestamp")
    }

    fn setup() -> (SessionEngine<Store, Utc>, EmployeeContext) {
        let store = Store::new(Database::open_in_memory().unwrap()).unwrap();
        let who = EmployeeContext {
            employee_id: EmployeeId::new("emp-a").unwrap(),
            organization_id: OrganizationId::new("org-1").unwrap(),
            team_id: None,
        };
        (SessionEngine::new(store, Utc), who)
    }

    fn status_at(engine: &SessionEngine<Store, Utc>, who: &EmployeeContext, now: DateTime<Utc>) -> String {
        let mut output = Vec::new();
        run(&mut output, engine, &who.employee_id, now).unwrap();
        String::from_utf8(output).unwrap()
    }

    #[test]
    fn idle_status() {
        let (engine, who) = setup();
        assert_snapshot!(status_at(&engine, &who, ts(7, 0)), @r"
        Employee: emp-a
        State:    idle
        Today:    0m worked, 0m on break
        Breaks:   work 30+ minutes to earn first break
        Next break earned in 30m
        ");
    }

    #[test]
    fn meal_break_due_after_five_hours() {
        let (engine, who) = setup();
        engine.execute(&who, Command::ClockIn, ts(8, 0)).unwrap();
        assert_snapshot!(status_at(&engine, &who, ts(13, 0)), @r"
        Employee: emp-a
        State:    working since 08:00 (5h 0m)
        Today:    5h 0m worked, 0m on break
        Breaks:   meal break required after 5 hours (suggested: lunch)
        ");
    }

    #[test]
    fn on_break_status() {
        let (engine, who) = setup();
        engine.execute(&who, Command::ClockIn, ts(8, 0)).unwrap();
        engine
            .execute(&who, Command::StartBreak(BreakKind::Coffee), ts(10, 0))
            .unwrap();
        let (state, requirements) = engine.current_state(&who.employee_id, ts(10, 12)).unwrap();
        assert_snapshot!(
            format_status_line(&state, &requirements, ts(10, 12), &Utc),
            @"[10:12] coffee break 12m | today 2h 0m worked, 12m break | you've earned break time"
        );
    }
}
