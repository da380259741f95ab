//! [`IntervalStore`] implementation over a shared [`Database`].

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, NaiveDate, Utc};
use ta_core::{
    ChangeEvent, ChangeFeed, ChangeListener, EmployeeId, EntryId, Interval, IntervalStore,
    NewTimeEntry, ScheduleEntry, StoreError, Subscription, TeamId, TimeEntry,
};

use crate::{Database, DbError, NewSchedule};

impl From<DbError> for StoreError {
    fn from(err: DbError) -> Self {
        if err.is_conflict() {
            Self::Conflict(err.to_string())
        } else {
            Self::backend(err)
        }
    }
}

/// Thread-safe store backed by one SQLite connection.
///
/// Every committed write is published to subscribers. Writes made by other
/// processes are only noticed through [`Store::poll_external_changes`].
pub struct Store {
    db: Mutex<Database>,
    feed: ChangeFeed,
    data_version: AtomicI64,
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("feed", &self.feed)
            .field("data_version", &self.data_version.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl Store {
    pub fn new(db: Database) -> Result<Self, DbError> {
        let data_version = db.data_version()?;
        Ok(Self {
            db: Mutex::new(db),
            feed: ChangeFeed::new(),
            data_version: AtomicI64::new(data_version),
        })
    }

    fn db(&self) -> MutexGuard<'_, Database> {
        self.db.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Inserts a planned shift and notifies subscribers.
    pub fn add_schedule(&self, schedule: &NewSchedule) -> Result<ScheduleEntry, DbError> {
        let stored = self.db().insert_schedule(schedule)?;
        self.feed.publish(&ChangeEvent::ScheduleChanged {
            schedule_id: stored.id.clone(),
        });
        Ok(stored)
    }

    /// Publishes [`ChangeEvent::External`] if another connection committed
    /// since the last poll. Returns whether it did.
    pub fn poll_external_changes(&self) -> Result<bool, DbError> {
        let current = self.db().data_version()?;
        let previous = self.data_version.swap(current, Ordering::SeqCst);
        if previous == current {
            return Ok(false);
        }
        tracing::debug!(previous, current, "database changed externally");
        self.feed.publish(&ChangeEvent::External);
        Ok(true)
    }

    pub fn unsubscribe(&self, subscription: Subscription) -> bool {
        self.feed.unsubscribe(subscription)
    }
}

impl IntervalStore for Store {
    fn insert_entry(&self, entry: NewTimeEntry) -> Result<TimeEntry, StoreError> {
        let opened = self.db().insert_entry(&entry)?;
        self.feed.publish(&ChangeEvent::EntryInserted {
            entry_id: opened.id.clone(),
            employee_id: opened.employee_id.clone(),
        });
        Ok(opened)
    }

    fn close_entry(&self, id: &EntryId, clock_out: DateTime<Utc>) -> Result<TimeEntry, StoreError> {
        let closed = self.db().close_entry(id, clock_out)?;
        self.feed.publish(&ChangeEvent::EntryClosed {
            entry_id: closed.id.clone(),
            employee_id: closed.employee_id.clone(),
        });
        Ok(closed)
    }

    fn close_and_insert(
        &self,
        id: &EntryId,
        clock_out: DateTime<Utc>,
        next: NewTimeEntry,
    ) -> Result<(TimeEntry, TimeEntry), StoreError> {
        let (closed, opened) = self.db().close_and_insert(id, clock_out, &next)?;
        self.feed.publish(&ChangeEvent::EntryClosed {
            entry_id: closed.id.clone(),
            employee_id: closed.employee_id.clone(),
        });
        self.feed.publish(&ChangeEvent::EntryInserted {
            entry_id: opened.id.clone(),
            employee_id: opened.employee_id.clone(),
        });
        Ok((closed, opened))
    }

    fn find_open_entry(&self, employee_id: &EmployeeId) -> Result<Option<TimeEntry>, StoreError> {
        Ok(self.db().find_open_entry(employee_id)?)
    }

    fn list_open_entries(&self) -> Result<Vec<TimeEntry>, StoreError> {
        Ok(self.db().list_open_entries()?)
    }

    fn query_entries_for_employee_day(
        &self,
        employee_id: &EmployeeId,
        day: Interval<DateTime<Utc>>,
    ) -> Result<Vec<TimeEntry>, StoreError> {
        Ok(self
            .db()
            .list_entries_for_employee(employee_id, day.start, day.end)?)
    }

    fn query_entries_in_range(
        &self,
        range: Interval<DateTime<Utc>>,
        team_id: Option<&TeamId>,
    ) -> Result<Vec<TimeEntry>, StoreError> {
        Ok(self
            .db()
            .list_entries_overlapping(range.start, range.end, team_id)?)
    }

    fn query_schedules_in_range(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        team_id: Option<&TeamId>,
    ) -> Result<Vec<ScheduleEntry>, StoreError> {
        Ok(self.db().list_schedules(start, end, team_id)?)
    }

    fn subscribe_to_changes(&self, listener: ChangeListener) -> Subscription {
        self.feed.subscribe(listener)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Arc;

    use chrono::{Duration, TimeZone};
    use ta_core::{Command, EmployeeContext, EngineError, OrganizationId, SessionEngine, WorkKind};

    fn ts(hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 10, hour, minute, 0)
            .single()
            .expect("valid timestamp")
    }

    fn who(employee: &str) -> EmployeeContext {
        EmployeeContext {
            employee_id: EmployeeId::new(employee).unwrap(),
            organization_id: OrganizationId::new("org-1").unwrap(),
            team_id: None,
        }
    }

    fn store() -> Store {
        Store::new(Database::open_in_memory().expect("open in-memory db")).expect("store")
    }

    fn recorder(store: &Store) -> Arc<Mutex<Vec<ChangeEvent>>> {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        store.subscribe_to_changes(Box::new(move |event| sink.lock().unwrap().push(event.clone())));
        events
    }

    #[test]
    fn conflicts_map_to_store_conflict() {
        let store = store();
        let opened = store
            .insert_entry(NewTimeEntry {
                employee_id: EmployeeId::new("emp-a").unwrap(),
                organization_id: OrganizationId::new("org-1").unwrap(),
                team_id: None,
                clock_in: ts(8, 0),
                kind: WorkKind::Work,
                notes: None,
            })
            .expect("insert");
        store.close_entry(&opened.id, ts(9, 0)).expect("close");

        let err = store.close_entry(&opened.id, ts(9, 30)).unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[test]
    fn engine_runs_lunch_break_against_sqlite() {
        let engine = SessionEngine::new(store(), Utc);
        let alice = who("emp-a");

        engine.execute(&alice, Command::ClockIn, ts(8, 0)).expect("clock in");
        engine
            .execute(&alice, Command::StartBreak(ta_core::BreakKind::Lunch), ts(13, 0))
            .expect("lunch");
        engine.execute(&alice, Command::ResumeWork, ts(13, 30)).expect("resume");

        let (state, _) = engine
            .current_state(&alice.employee_id, ts(14, 0))
            .expect("state");
        assert_eq!(state.total_worked_today, 330);
        assert_eq!(state.total_break_today, 30);
        assert!(state.is_active);
        assert!(!state.is_on_break);

        let err = engine.execute(&alice, Command::ClockIn, ts(14, 0)).unwrap_err();
        assert!(matches!(err, EngineError::InvalidTransition(_)));
    }

    #[test]
    fn break_publishes_close_then_insert() {
        let store = store();
        let events = recorder(&store);
        let engine = SessionEngine::new(store, Utc);
        let alice = who("emp-a");

        engine.execute(&alice, Command::ClockIn, ts(8, 0)).expect("clock in");
        engine
            .execute(&alice, Command::StartBreak(ta_core::BreakKind::Coffee), ts(9, 0))
            .expect("break");

        let kinds: Vec<&str> = events
            .lock()
            .unwrap()
            .iter()
            .map(|event| match event {
                ChangeEvent::EntryInserted { .. } => "inserted",
                ChangeEvent::EntryClosed { .. } => "closed",
                ChangeEvent::ScheduleChanged { .. } => "schedule",
                ChangeEvent::External => "external",
            })
            .collect();
        assert_eq!(kinds, vec!["inserted", "closed", "inserted"]);
    }

    #[test]
    fn stale_sessions_close_through_store() {
        let engine = SessionEngine::new(store(), Utc);
        let started = ts(8, 0) - Duration::days(1);
        engine.execute(&who("emp-a"), Command::ClockIn, started).expect("clock in");

        let closed = engine
            .close_stale_sessions(ts(9, 0), Duration::hours(16))
            .expect("close stale");
        assert_eq!(closed.len(), 1);
        assert_eq!(closed[0].duration_minutes, Some(960));
        assert!(engine.store().list_open_entries().expect("list").is_empty());
    }

    #[test]
    fn schedule_changes_are_published() {
        let store = store();
        let events = recorder(&store);
        let stored = store
            .add_schedule(&NewSchedule {
                employee_id: EmployeeId::new("emp-a").unwrap(),
                organization_id: OrganizationId::new("org-1").unwrap(),
                team_id: None,
                scheduled_date: NaiveDate::from_ymd_opt(2025, 3, 10).unwrap(),
                scheduled_start: chrono::NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
                scheduled_end: chrono::NaiveTime::from_hms_opt(17, 0, 0).unwrap(),
            })
            .expect("add schedule");

        assert_eq!(
            *events.lock().unwrap(),
            vec![ChangeEvent::ScheduleChanged {
                schedule_id: stored.id
            }]
        );
    }

    #[test]
    fn external_commits_are_detected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("ta.db");
        let store = Store::new(Database::open(&path).expect("open")).expect("store");
        let events = recorder(&store);

        assert!(!store.poll_external_changes().expect("poll"));

        let other = Database::open(&path).expect("open second connection");
        other
            .insert_entry(&NewTimeEntry {
                employee_id: EmployeeId::new("emp-b").unwrap(),
                organization_id: OrganizationId::new("org-1").unwrap(),
                team_id: None,
                clock_in: ts(8, 0),
                kind: WorkKind::Work,
                notes: None,
            })
            .expect("external insert");

        assert!(store.poll_external_changes().expect("poll"));
        assert!(!store.poll_external_changes().expect("poll again"));
        assert_eq!(*events.lock().unwrap(), vec![ChangeEvent::External]);
        assert_eq!(store.list_open_entries().expect("list").len(), 1);
    }
}
