//! Closes sessions whose clock-out was forgotten.

use std::io::Write;

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, TimeZone, Utc};
use ta_core::{IntervalStore, SessionEngine};

use super::util::{format_minutes, format_timestamp_local};

pub fn run<W, S, Tz>(writer: &mut W, engine: &SessionEngine<S, Tz>, now: DateTime<Utc>, max_open: Duration) -> Result<()>
where
    W: Write,
    S: IntervalStore,
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    let closed = engine
        .close_stale_sessions(now, max_open)
        .context("failed to close stale sessions")?;

    if closed.is_empty() {
        writeln!(writer, "No stale sessions.")?;
        return Ok(());
    }

    writeln!(writer, "Closed {} stale session(s):", closed.len())?;
    for entry in &closed {
        let clock_out = entry.clock_out.unwrap_or(now);
        writeln!(
            writer,
            "- {} ({}): {} -> {} ({})",
            entry.employee_id,
            entry.kind,
            format_timestamp_local(entry.clock_in, engine.tz()),
            format_timestamp_local(clock_out, engine.tz()),
            format_minutes(entry.closed_minutes().unwrap_or(0))
        )?;
    }
    Ok(())
}
