//! In-memory interval store for unit tests.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, NaiveDate, Utc};

use crate::entry::{NewTimeEntry, ScheduleEntry, TimeEntry};
use crate::interval::{Interval, whole_minutes};
use crate::notify::{ChangeEvent, ChangeFeed, ChangeListener, Subscription};
use crate::store::{IntervalStore, StoreError};
use crate::types::{EmployeeId, EntryId, TeamId};

#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<Vec<TimeEntry>>,
    schedules: Mutex<Vec<ScheduleEntry>>,
    fail_writes: AtomicBool,
    feed: ChangeFeed,
}

impl MemoryStore {
    pub fn entries(&self) -> Vec<TimeEntry> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn check_writable(&self) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::backend("simulated write failure"));
        }
        Ok(())
    }
}

impl IntervalStore for MemoryStore {
    fn insert_entry(&self, entry: NewTimeEntry) -> Result<TimeEntry, StoreError> {
        self.check_writable()?;
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        if entries
            .iter()
            .any(|e| e.employee_id == entry.employee_id && e.is_open())
        {
            return Err(StoreError::Conflict(format!(
                "{} already has an open entry",
                entry.employee_id
            )));
        }
        let stored = TimeEntry {
            id: EntryId::new(format!("entry-{}", entries.len() + 1)).map_err(StoreError::backend)?,
            employee_id: entry.employee_id,
            organization_id: entry.organization_id,
            team_id: entry.team_id,
            clock_in: entry.clock_in,
            clock_out: None,
            duration_minutes: None,
            kind: entry.kind,
            notes: entry.notes,
        };
        entries.push(stored.clone());
        drop(entries);
        self.feed.publish(&ChangeEvent::EntryInserted {
            entry_id: stored.id.clone(),
            employee_id: stored.employee_id.clone(),
        });
        Ok(stored)
    }

    fn close_entry(&self, id: &EntryId, clock_out: DateTime<Utc>) -> Result<TimeEntry, StoreError> {
        self.check_writable()?;
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let entry = entries
            .iter_mut()
            .find(|e| &e.id == id && e.is_open())
            .ok_or_else(|| StoreError::Conflict(format!("entry {id} is not open")))?;
        entry.clock_out = Some(clock_out);
        entry.duration_minutes = Some(whole_minutes(entry.clock_in, clock_out));
        let closed = entry.clone();
        drop(entries);
        self.feed.publish(&ChangeEvent::EntryClosed {
            entry_id: closed.id.clone(),
            employee_id: closed.employee_id.clone(),
        });
        Ok(closed)
    }

    fn find_open_entry(&self, employee_id: &EmployeeId) -> Result<Option<TimeEntry>, StoreError> {
        Ok(self
            .entries()
            .into_iter()
            .find(|e| &e.employee_id == employee_id && e.is_open()))
    }

    fn list_open_entries(&self) -> Result<Vec<TimeEntry>, StoreError> {
        Ok(self.entries().into_iter().filter(TimeEntry::is_open).collect())
    }

    fn query_entries_for_employee_day(
        &self,
        employee_id: &EmployeeId,
        day: Interval<DateTime<Utc>>,
    ) -> Result<Vec<TimeEntry>, StoreError> {
        Ok(self
            .entries()
            .into_iter()
            .filter(|e| &e.employee_id == employee_id && day.contains(e.clock_in))
            .collect())
    }

    fn query_entries_in_range(
        &self,
        range: Interval<DateTime<Utc>>,
        team_id: Option<&TeamId>,
    ) -> Result<Vec<TimeEntry>, StoreError> {
        Ok(self
            .entries()
            .into_iter()
            .filter(|e| team_id.is_none_or(|team| e.team_id.as_ref() == Some(team)))
            .filter(|e| e.interval_until(DateTime::<Utc>::MAX_UTC).overlaps(&range))
            .collect())
    }

    fn query_schedules_in_range(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        team_id: Option<&TeamId>,
    ) -> Result<Vec<ScheduleEntry>, StoreError> {
        Ok(self
            .schedules
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|s| s.scheduled_date >= start && s.scheduled_date < end)
            .filter(|s| team_id.is_none_or(|team| s.team_id.as_ref() == Some(team)))
            .cloned()
            .collect())
    }

    fn subscribe_to_changes(&self, listener: ChangeListener) -> Subscription {
        self.feed.subscribe(listener)
    }
}
