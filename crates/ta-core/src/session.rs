//! Per-employee work/break session state machine.
//!
//! The current state is never cached: it is derived from the stored entries
//! by [`compute_session_state`], which is pure and cheap enough to run on
//! every UI tick. [`SessionEngine`] validates commands against the open
//! entry and turns them into interval store writes.
//!
//! ```text
//!            ClockIn               StartBreak(kind)
//!   Idle ─────────────▶ Working ─────────────────▶ OnBreak(kind)
//!    ▲                   │  ▲                          │
//!    │      ClockOut     │  └──────── ResumeWork ──────┘
//!    └───────────────────┴─────────── ClockOut ────────┘
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Duration, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::calendar::{day_range, local_date};
use crate::compliance::{BreakRequirements, compute_break_requirements};
use crate::entry::{BreakKind, NewTimeEntry, TimeEntry, WorkKind};
use crate::store::{BoxError, IntervalStore, StoreError};
use crate::types::{EmployeeId, EntryId, OrganizationId, TeamId};

/// Which of the three mutually exclusive states an employee is in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "break_kind", rename_all = "snake_case")]
pub enum SessionPhase {
    Idle,
    Working,
    OnBreak(BreakKind),
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => f.write_str("idle"),
            Self::Working => f.write_str("working"),
            Self::OnBreak(kind) => write!(f, "on {kind} break"),
        }
    }
}

/// Session state derived from the entry stream at a given instant.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionState {
    /// True while any entry is open, work or break.
    pub is_active: bool,
    pub is_on_break: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub break_kind: Option<BreakKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_entry_id: Option<EntryId>,
    /// Clock-in of the open entry.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_since: Option<DateTime<Utc>>,
    pub work_elapsed_minutes: i64,
    pub break_elapsed_minutes: i64,
    /// Closed work minutes today plus the open work entry's minutes today.
    pub total_worked_today: i64,
    /// Closed break minutes today plus the open break entry's minutes today.
    pub total_break_today: i64,
}

impl SessionState {
    pub const fn phase(&self) -> SessionPhase {
        match (self.is_active, self.break_kind) {
            (false, _) => SessionPhase::Idle,
            (true, Some(kind)) => SessionPhase::OnBreak(kind),
            (true, None) => SessionPhase::Working,
        }
    }

    pub fn break_requirements(&self) -> BreakRequirements {
        compute_break_requirements(self.total_worked_today, self.total_break_today)
    }
}

/// Derives the session state of one employee at `now`.
///
/// Totals only include entries whose clock-in falls on `now`'s local day
/// in `tz`. An open entry determines the phase even if it started on an
/// earlier day (overnight shift), and its full elapsed time counts toward
/// today's totals so break rules see the whole shift. If several entries are
/// open, which the store should prevent, the most recent one wins.
pub fn compute_session_state<Tz: TimeZone>(
    entries: &[TimeEntry],
    now: DateTime<Utc>,
    tz: &Tz,
) -> SessionState {
    let today = local_date(tz, now);
    let mut state = SessionState::default();
    let mut open: Option<&TimeEntry> = None;

    for entry in entries {
        if entry.is_open() {
            if open.is_none_or(|current| entry.clock_in > current.clock_in) {
                open = Some(entry);
            }
            continue;
        }
        if local_date(tz, entry.clock_in) != today {
            continue;
        }
        let minutes = entry.closed_minutes().unwrap_or(0);
        if entry.kind.is_break() {
            state.total_break_today += minutes;
        } else {
            state.total_worked_today += minutes;
        }
    }

    if let Some(entry) = open {
        let elapsed = entry.elapsed_minutes(now);

        state.is_active = true;
        state.active_entry_id = Some(entry.id.clone());
        state.active_since = Some(entry.clock_in);
        match entry.kind.break_kind() {
            Some(kind) => {
                state.is_on_break = true;
                state.break_kind = Some(kind);
                state.break_elapsed_minutes = elapsed;
                state.total_break_today += elapsed;
            }
            None => {
                state.work_elapsed_minutes = elapsed;
                state.total_worked_today += elapsed;
            }
        }
    }

    state
}

/// Open entries that have been running for longer than `max_open`.
///
/// A non-positive limit matches nothing.
pub fn find_stale_entries(entries: &[TimeEntry], now: DateTime<Utc>, max_open: Duration) -> Vec<&TimeEntry> {
    if max_open <= Duration::zero() {
        return Vec::new();
    }
    entries
        .iter()
        .filter(|entry| entry.is_open() && now - entry.clock_in > max_open)
        .collect()
}

/// A request to change an employee's session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", content = "break_kind", rename_all = "snake_case")]
pub enum Command {
    ClockIn,
    StartBreak(BreakKind),
    ResumeWork,
    ClockOut,
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ClockIn => f.write_str("clock in"),
            Self::StartBreak(kind) => write!(f, "start {kind} break"),
            Self::ResumeWork => f.write_str("resume work"),
            Self::ClockOut => f.write_str("clock out"),
        }
    }
}

/// A command that is not valid in the current state.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum TransitionError {
    #[error("already clocked in; clock out before clocking in again")]
    AlreadyActive,
    #[error("already on a break; resume work first")]
    AlreadyOnBreak,
    #[error("not on a break")]
    NotOnBreak,
    #[error("no active session; clock in first")]
    NoActiveSession,
}

/// Errors from executing a command.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    InvalidTransition(#[from] TransitionError),

    /// Another writer changed the session; re-fetch and retry the command.
    #[error("session changed concurrently: {0}")]
    Conflict(String),

    #[error(transparent)]
    Storage(BoxError),

    #[error("stale session limit must be positive, got {minutes} minutes")]
    InvalidStaleLimit { minutes: i64 },
}

impl From<StoreError> for EngineError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict(message) => Self::Conflict(message),
            StoreError::Backend(source) => Self::Storage(source),
        }
    }
}

/// The writes a valid command translates to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Plan<'a> {
    Open(WorkKind),
    Close(&'a TimeEntry),
    Switch(&'a TimeEntry, WorkKind),
}

/// Validates `command` against the employee's open entry.
fn plan_transition(open: Option<&TimeEntry>, command: Command) -> Result<Plan<'_>, TransitionError> {
    let open_kind = open.map(|entry| entry.kind);
    match (command, open, open_kind) {
        (Command::ClockIn, None, _) => Ok(Plan::Open(WorkKind::Work)),
        (Command::ClockIn, Some(_), _) => Err(TransitionError::AlreadyActive),

        (Command::StartBreak(kind), Some(entry), Some(WorkKind::Work)) => {
            Ok(Plan::Switch(entry, WorkKind::from(kind)))
        }
        (Command::StartBreak(_), Some(_), _) => Err(TransitionError::AlreadyOnBreak),
        (Command::StartBreak(_), None, _) => Err(TransitionError::NoActiveSession),

        (Command::ResumeWork, Some(entry), Some(kind)) if kind.is_break() => {
            Ok(Plan::Switch(entry, WorkKind::Work))
        }
        (Command::ResumeWork, _, _) => Err(TransitionError::NotOnBreak),

        (Command::ClockOut, Some(entry), _) => Ok(Plan::Close(entry)),
        (Command::ClockOut, None, _) => Err(TransitionError::NoActiveSession),
    }
}

/// Who a command is issued for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmployeeContext {
    pub employee_id: EmployeeId,
    pub organization_id: OrganizationId,
    pub team_id: Option<TeamId>,
}

/// What a successful command changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Outcome {
    pub command: Command,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub closed: Option<TimeEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub opened: Option<TimeEntry>,
    /// Break entitlement at the time a break was started. Breaks are never
    /// refused; callers may surface `can_take_break == false` as a warning.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub break_requirements: Option<BreakRequirements>,
}

impl Outcome {
    pub fn phase_after(&self) -> SessionPhase {
        match self.opened.as_ref().map(|entry| entry.kind.break_kind()) {
            None => SessionPhase::Idle,
            Some(None) => SessionPhase::Working,
            Some(Some(kind)) => SessionPhase::OnBreak(kind),
        }
    }
}

/// One mutex per employee, created on first use.
#[derive(Debug, Default)]
struct EmployeeLocks {
    locks: Mutex<HashMap<EmployeeId, Arc<Mutex<()>>>>,
}

impl EmployeeLocks {
    fn handle(&self, employee_id: &EmployeeId) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(locks.entry(employee_id.clone()).or_default())
    }
}

/// Executes session commands against an interval store.
///
/// Commands for the same employee are serialized; different employees
/// proceed in parallel. The engine keeps no session state of its own.
#[derive(Debug)]
pub struct SessionEngine<S, Tz: TimeZone = Utc> {
    store: S,
    tz: Tz,
    locks: EmployeeLocks,
}

impl<S: IntervalStore, Tz: TimeZone> SessionEngine<S, Tz> {
    /// Creates an engine whose calendar days are local to `tz`.
    pub fn new(store: S, tz: Tz) -> Self {
        Self {
            store,
            tz,
            locks: EmployeeLocks::default(),
        }
    }

    pub const fn store(&self) -> &S {
        &self.store
    }

    pub const fn tz(&self) -> &Tz {
        &self.tz
    }

    /// Entries relevant to today's state: today's entries plus the open one,
    /// which may have started on an earlier day.
    pub fn entries_for_today(
        &self,
        employee_id: &EmployeeId,
        now: DateTime<Utc>,
    ) -> Result<Vec<TimeEntry>, EngineError> {
        let day = day_range(&self.tz, local_date(&self.tz, now));
        let mut entries = self.store.query_entries_for_employee_day(employee_id, day)?;
        if let Some(open) = self.store.find_open_entry(employee_id)? {
            if !entries.iter().any(|entry| entry.id == open.id) {
                entries.push(open);
            }
        }
        Ok(entries)
    }

    /// Reads the employee's entries and derives the current state.
    pub fn current_state(
        &self,
        employee_id: &EmployeeId,
        now: DateTime<Utc>,
    ) -> Result<(SessionState, BreakRequirements), EngineError> {
        let entries = self.entries_for_today(employee_id, now)?;
        let state = compute_session_state(&entries, now, &self.tz);
        let requirements = state.break_requirements();
        tracing::debug!(
            employee = %employee_id,
            phase = %state.phase(),
            worked = state.total_worked_today,
            on_break = state.total_break_today,
            "derived session state"
        );
        Ok((state, requirements))
    }

    /// Validates `command` and applies it at `now`.
    ///
    /// Invalid transitions perform no writes. Storage errors are returned
    /// as-is; nothing is retried.
    pub fn execute(
        &self,
        who: &EmployeeContext,
        command: Command,
        now: DateTime<Utc>,
    ) -> Result<Outcome, EngineError> {
        let handle = self.locks.handle(&who.employee_id);
        let _guard = handle.lock().unwrap_or_else(PoisonError::into_inner);

        let open = self.store.find_open_entry(&who.employee_id)?;
        let plan = plan_transition(open.as_ref(), command).inspect_err(|err| {
            tracing::debug!(employee = %who.employee_id, %command, %err, "rejected command");
        })?;

        let mut outcome = Outcome {
            command,
            closed: None,
            opened: None,
            break_requirements: None,
        };

        match plan {
            Plan::Open(kind) => {
                let opened = self.store.insert_entry(NewTimeEntry {
                    employee_id: who.employee_id.clone(),
                    organization_id: who.organization_id.clone(),
                    team_id: who.team_id.clone(),
                    clock_in: now,
                    kind,
                    notes: None,
                })?;
                outcome.opened = Some(opened);
            }
            Plan::Close(entry) => {
                outcome.closed = Some(self.store.close_entry(&entry.id, now)?);
            }
            Plan::Switch(entry, kind) => {
                if kind.is_break() {
                    let entries = self.entries_for_today(&who.employee_id, now)?;
                    let requirements =
                        compute_session_state(&entries, now, &self.tz).break_requirements();
                    if !requirements.can_take_break {
                        tracing::warn!(
                            employee = %who.employee_id,
                            message = %requirements.compliance_message,
                            "break started before it was earned"
                        );
                    }
                    outcome.break_requirements = Some(requirements);
                }
                let next = NewTimeEntry::continuing(entry, now, kind);
                let (closed, opened) = self.store.close_and_insert(&entry.id, now, next)?;
                outcome.closed = Some(closed);
                outcome.opened = Some(opened);
            }
        }

        tracing::info!(
            employee = %who.employee_id,
            %command,
            phase = %outcome.phase_after(),
            "session transition committed"
        );
        Ok(outcome)
    }

    /// Closes entries left open for longer than `max_open`.
    ///
    /// Each stale entry is closed at `clock_in + max_open` rather than at
    /// `now`, so a forgotten clock-out does not count as worked time beyond
    /// the limit. Entries closed concurrently are skipped. A non-positive
    /// `max_open` is rejected, since it would close entries before they began.
    pub fn close_stale_sessions(
        &self,
        now: DateTime<Utc>,
        max_open: Duration,
    ) -> Result<Vec<TimeEntry>, EngineError> {
        if max_open <= Duration::zero() {
            return Err(EngineError::InvalidStaleLimit {
                minutes: max_open.num_minutes(),
            });
        }
        let open = self.store.list_open_entries()?;
        let stale = find_stale_entries(&open, now, max_open);
        let mut closed = Vec::with_capacity(stale.len());

        for entry in stale {
            let handle = self.locks.handle(&entry.employee_id);
            let _guard = handle.lock().unwrap_or_else(PoisonError::into_inner);
            match self.store.close_entry(&entry.id, entry.clock_in + max_open) {
                Ok(entry) => {
                    tracing::info!(
                        employee = %entry.employee_id,
                        entry = %entry.id,
                        "closed stale session"
                    );
                    closed.push(entry);
                }
                Err(StoreError::Conflict(message)) => {
                    tracing::warn!(entry = %entry.id, %message, "stale session already closed");
                }
                Err(err) => return Err(err.into()),
            }
        }

        Ok(closed)
    }
}
