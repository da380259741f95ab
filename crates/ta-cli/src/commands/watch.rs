//! Live session view that refreshes when entries change.
//!
//! Entries are re-read only after the store reports a change (debounced so
//! that the two writes of a break switch cause one reload) or when the local
//! day rolls over. Between reloads the state is recomputed from the cached
//! entries on every tick.

use std::io::Write;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, TimeZone, Utc};
use ta_core::calendar::local_date;
use ta_core::notify::debounce;
use ta_core::{EmployeeId, IntervalStore, SessionEngine, compute_session_state};
use ta_db::Store;

use super::status::format_status_line;

#[derive(Debug, Clone, Copy)]
pub struct WatchSettings {
    pub tick: Duration,
    pub debounce: Duration,
    /// Stop after this many refreshes; `None` runs until interrupted.
    pub count: Option<u64>,
}

pub fn run<W, Tz, F>(
    writer: &mut W,
    engine: &SessionEngine<Store, Tz>,
    employee_id: &EmployeeId,
    settings: WatchSettings,
    clock: F,
) -> Result<()>
where
    W: Write,
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
    F: FnMut() -> DateTime<Utc>,
{
    let dirty = Arc::new(AtomicBool::new(true));
    let flag = Arc::clone(&dirty);
    let (listener, worker) = debounce(settings.debounce, move |events| {
        tracing::debug!(events = events.len(), "session inputs changed");
        flag.store(true, Ordering::Release);
    });
    let subscription = engine.store().subscribe_to_changes(listener);

    let result = refresh_loop(writer, engine, employee_id, settings, clock, &dirty);

    engine.store().unsubscribe(subscription);
    worker.join();
    result
}

fn refresh_loop<W, Tz, F>(
    writer: &mut W,
    engine: &SessionEngine<Store, Tz>,
    employee_id: &EmployeeId,
    settings: WatchSettings,
    mut clock: F,
    dirty: &AtomicBool,
) -> Result<()>
where
    W: Write,
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
    F: FnMut() -> DateTime<Utc>,
{
    let mut entries = Vec::new();
    let mut loaded_for = None;
    let mut refreshes = 0_u64;

    loop {
        engine
            .store()
            .poll_external_changes()
            .context("failed to check for external changes")?;

        let now = clock();
        let today = local_date(engine.tz(), now);
        if dirty.swap(false, Ordering::AcqRel) || loaded_for != Some(today) {
            entries = engine
                .entries_for_today(employee_id, now)
                .with_context(|| format!("failed to load entries for {employee_id}"))?;
            loaded_for = Some(today);
            tracing::trace!(entries = entries.len(), "reloaded entries");
        }

        let state = compute_session_state(&entries, now, engine.tz());
        let requirements = state.break_requirements();
        writeln!(
            writer,
            "{}",
            format_status_line(&state, &requirements, now, engine.tz())
        )?;
        writer.flush()?;

        refreshes += 1;
        if settings.count.is_some_and(|count| refreshes >= count) {
            return Ok(());
        }
        thread::sleep(settings.tick);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use insta::assert_snapshot;
    use ta_core::{Command, EmployeeContext, OrganizationId};
    use ta_db::Database;

    fn ts(hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 10, hour, minute, 0)
            .single()
            .expect("valid timestamp")
    }

    fn settings(count: u64) -> WatchSettings {
        WatchSettings {
            tick: Duration::from_millis(1),
            debounce: Duration::from_millis(1),
            count: Some(count),
        }
    }

    #[test]
    fn prints_one_line_per_tick() {
        let engine = SessionEngine::new(Store::new(Database::open_in_memory().unwrap()).unwrap(), Utc);
        let alice = EmployeeContext {
            employee_id: EmployeeId::new("emp-a").unwrap(),
            organization_id: OrganizationId::new("org-1").unwrap(),
            team_id: None,
        };
        engine.execute(&alice, Command::ClockIn, ts(8, 0)).unwrap();

        let mut times = vec![ts(13, 30), ts(11, 0)];
        let mut output = Vec::new();
        run(&mut output, &engine, &alice.employee_id, settings(2), || {
            times.pop().unwrap()
        })
        .unwrap();

        assert_snapshot!(String::from_utf8(output).unwrap(), @r"
        [11:00] working 3h 0m | today 3h 0m worked, 0m break | you've earned break time
        [13:30] working 5h 30m | today 5h 30m worked, 0m break | meal break required after 5 hours
        ");
    }

    #[test]
    fn idle_employee_shows_first_break_hint() {
        let engine = SessionEngine::new(Store::new(Database::open_in_memory().unwrap()).unwrap(), Utc);
        let employee = EmployeeId::new("emp-b").unwrap();

        let mut output = Vec::new();
        run(&mut output, &engine, &employee, settings(1), || ts(9, 0)).unwrap();

        assert_snapshot!(
            String::from_utf8(output).unwrap(),
            @"[09:00] idle | today 0m worked, 0m break | work 30+ minutes to earn first break"
        );
    }
}
