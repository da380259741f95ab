//! Session commands: clock-in, break, resume and clock-out.

use std::io::Write;

use anyhow::{Context, Result};
use chrono::{DateTime, TimeZone, Utc};
use ta_core::{Command, EmployeeContext, IntervalStore, SessionEngine};

use super::util::{clock_time, format_minutes};

pub fn run<W, S, Tz>(
    writer: &mut W,
    engine: &SessionEngine<S, Tz>,
    who: &EmployeeContext,
    command: Command,
    now: DateTime<Utc>,
) -> Result<()>
where
    W: Write,
    S: IntervalStore,
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    let outcome = engine
        .execute(who, command, now)
        .with_context(|| format!("failed to {command} for {}", who.employee_id))?;
    let tz = engine.tz();
    let at = clock_time(now, tz);

    match (outcome.closed.as_ref(), outcome.opened.as_ref()) {
        (None, Some(_)) => writeln!(writer, "Clocked in at {at}.")?,
        (Some(closed), Some(opened)) => match opened.kind.break_kind() {
            Some(kind) => {
                writeln!(
                    writer,
                    "Started {kind} break at {at} after {} of work.",
                    format_minutes(closed.closed_minutes().unwrap_or(0))
                )?;
            }
            None => {
                let paused = closed
                    .kind
                    .break_kind()
                    .map_or_else(|| closed.kind.to_string(), |kind| format!("{kind} break"));
                writeln!(
                    writer,
                    "Resumed work at {at} after {} {paused}.",
                    format_minutes(closed.closed_minutes().unwrap_or(0))
                )?;
            }
        },
        (Some(closed), None) => {
            let (state, _) = engine.current_state(&who.employee_id, now)?;
            writeln!(
                writer,
                "Clocked out at {at}. Today: {} worked, {} on break.",
                format_minutes(state.total_worked_today),
                format_minutes(state.total_break_today)
            )?;
            if let Some(kind) = closed.kind.break_kind() {
                writeln!(writer, "Ended {kind} break.")?;
            }
        }
        (None, None) => {}
    }

    if let Some(requirements) = &outcome.break_requirements {
        if !requirements.can_take_break {
            writeln!(writer, "Warning: {}.", requirements.compliance_message)?;
        }
    }

    Ok(())
}
