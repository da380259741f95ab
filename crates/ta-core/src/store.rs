//! Contract for the persistence layer holding entries and schedules.

use chrono::{DateTime, NaiveDate, Utc};
use thiserror::Error;

use crate::entry::{NewTimeEntry, ScheduleEntry, TimeEntry};
use crate::interval::Interval;
use crate::notify::{ChangeListener, Subscription};
use crate::types::{EmployeeId, EntryId, TeamId};

/// Boxed error from a storage backend.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors returned by an [`IntervalStore`].
#[derive(Debug, Error)]
pub enum StoreError {
    /// A write lost a race with another writer, e.g. the entry to close was
    /// already closed, or a second open entry would have been created.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Transport or persistence failure, including timeouts.
    #[error("storage error: {0}")]
    Backend(#[source] BoxError),
}

impl StoreError {
    pub fn backend(err: impl Into<BoxError>) -> Self {
        Self::Backend(err.into())
    }
}

/// Persistence for time entries and planned shifts.
///
/// Implementations must be safe to share between threads. Writes must
/// publish a change to subscribers once committed.
pub trait IntervalStore: Send + Sync {
    /// Creates a new open entry and returns it with its assigned ID.
    ///
    /// Fails with [`StoreError::Conflict`] if the employee already has an
    /// open entry.
    fn insert_entry(&self, entry: NewTimeEntry) -> Result<TimeEntry, StoreError>;

    /// Closes an open entry, computing its duration.
    ///
    /// Fails with [`StoreError::Conflict`] if the entry does not exist or is
    /// already closed.
    fn close_entry(&self, id: &EntryId, clock_out: DateTime<Utc>) -> Result<TimeEntry, StoreError>;

    /// Closes `id` and opens `next` as one unit.
    ///
    /// The default runs the two writes in order so the close is visible
    /// before the new entry exists. Stores with transactions should override
    /// this to commit both at once.
    fn close_and_insert(
        &self,
        id: &EntryId,
        clock_out: DateTime<Utc>,
        next: NewTimeEntry,
    ) -> Result<(TimeEntry, TimeEntry), StoreError> {
        let closed = self.close_entry(id, clock_out)?;
        let opened = self.insert_entry(next)?;
        Ok((closed, opened))
    }

    /// The employee's open entry, if any.
    fn find_open_entry(&self, employee_id: &EmployeeId) -> Result<Option<TimeEntry>, StoreError>;

    /// Every open entry across all employees.
    fn list_open_entries(&self) -> Result<Vec<TimeEntry>, StoreError>;

    /// Entries of one employee whose clock-in falls inside `day`.
    fn query_entries_for_employee_day(
        &self,
        employee_id: &EmployeeId,
        day: Interval<DateTime<Utc>>,
    ) -> Result<Vec<TimeEntry>, StoreError>;

    /// Entries whose clocked interval overlaps `range`; open entries count
    /// as running indefinitely.
    fn query_entries_in_range(
        &self,
        range: Interval<DateTime<Utc>>,
        team_id: Option<&TeamId>,
    ) -> Result<Vec<TimeEntry>, StoreError>;

    /// Schedules with `start <= scheduled_date < end`.
    fn query_schedules_in_range(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        team_id: Option<&TeamId>,
    ) -> Result<Vec<ScheduleEntry>, StoreError>;

    /// Registers a listener for committed changes.
    fn subscribe_to_changes(&self, listener: ChangeListener) -> Subscription;
}

impl<S: IntervalStore + ?Sized> IntervalStore for std::sync::Arc<S> {
    fn insert_entry(&self, entry: NewTimeEntry) -> Result<TimeEntry, StoreError> {
        (**self).insert_entry(entry)
    }

    fn close_entry(&self, id: &EntryId, clock_out: DateTime<Utc>) -> Result<TimeEntry, StoreError> {
        (**self).close_entry(id, clock_out)
    }

    fn close_and_insert(
        &self,
        id: &EntryId,
        clock_out: DateTime<Utc>,
        next: NewTimeEntry,
    ) -> Result<(TimeEntry, TimeEntry), StoreError> {
        (**self).close_and_insert(id, clock_out, next)
    }

    fn find_open_entry(&self, employee_id: &EmployeeId) -> Result<Option<TimeEntry>, StoreError> {
        (**self).find_open_entry(employee_id)
    }

    fn list_open_entries(&self) -> Result<Vec<TimeEntry>, StoreError> {
        (**self).list_open_entries()
    }

    fn query_entries_for_employee_day(
        &self,
        employee_id: &EmployeeId,
        day: Interval<DateTime<Utc>>,
    ) -> Result<Vec<TimeEntry>, StoreError> {
        (**self).query_entries_for_employee_day(employee_id, day)
    }

    fn query_entries_in_range(
        &self,
        range: Interval<DateTime<Utc>>,
        team_id: Option<&TeamId>,
    ) -> Result<Vec<TimeEntry>, StoreError> {
        (**self).query_entries_in_range(range, team_id)
    }

    fn query_schedules_in_range(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        team_id: Option<&TeamId>,
    ) -> Result<Vec<ScheduleEntry>, StoreError> {
        (**self).query_schedules_in_range(start, end, team_id)
    }

    fn subscribe_to_changes(&self, listener: ChangeListener) -> Subscription {
        (**self).subscribe_to_changes(listener)
    }
}
