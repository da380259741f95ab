//! Core domain logic for time and attendance.
//!
//! This crate contains the fundamental types and logic for:
//! - Sessions: the clock-in / break / clock-out state machine
//! - Compliance: break eligibility and meal-break rules
//! - Coverage: planned shifts versus clocked presence per hour
//! - Summaries: daily and weekly attendance totals
//!
//! Persistence is abstracted behind [`IntervalStore`].

pub mod calendar;
mod compliance;
pub mod coverage;
mod entry;
pub mod interval;
pub mod notify;
pub mod session;
mod store;
pub mod summary;
#[cfg(test)]
mod testing;
mod types;

pub use compliance::{BreakRequirements, compute_break_requirements};
pub use coverage::{
    CoverageConfig, CoverageLevel, DayCoverage, HourBucket, WeekCoverage, compute_week_coverage,
};
pub use entry::{
    BreakKind, NewTimeEntry, ScheduleEntry, ScheduleStatus, TimeEntry, UnknownWorkKind, WorkKind,
};
pub use interval::{Interval, intervals_overlap};
pub use notify::{ChangeEvent, ChangeFeed, ChangeListener, Subscription};
pub use session::{
    Command, EmployeeContext, EngineError, Outcome, SessionEngine, SessionPhase, SessionState,
    TransitionError, compute_session_state,
};
pub use store::{BoxError, IntervalStore, StoreError};
pub use summary::{DailySummary, WeeklySummary, summarize_day, summarize_week};
pub use types::{EmployeeId, EntryId, OrganizationId, ScheduleId, TeamId, ValidationError};
