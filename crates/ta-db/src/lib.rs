//! SQLite storage for time and attendance.
//!
//! Provides persistence for time entries and planned shifts using `rusqlite`.
//!
//! # Thread Safety
//!
//! [`Database`] wraps a `rusqlite::Connection`, which is `Send` but not
//! `Sync`. [`Store`] puts it behind a `Mutex` and implements
//! [`ta_core::IntervalStore`] so it can be shared with the session engine.
//!
//! # Schema
//!
//! ## Timestamp Format
//!
//! Instants are stored as TEXT in RFC 3339 UTC with millisecond precision
//! (e.g., `2025-03-10T08:00:00.000Z`). The fixed width keeps lexicographic
//! ordering identical to chronological ordering, so range filters run on
//! the raw column. Schedule dates are `YYYY-MM-DD` and times `HH:MM`.
//!
//! ## Open Entries
//!
//! A partial unique index allows at most one entry per employee with a NULL
//! `clock_out`. A racing second clock-in fails with
//! [`DbError::OpenEntryExists`] instead of creating a second open entry.

mod store;

use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, NaiveTime, SecondsFormat, Utc};
use rusqlite::{Connection, ErrorCode, OptionalExtension, Params, Row, params};
use ta_core::interval::whole_minutes;
use ta_core::{
    EmployeeId, EntryId, NewTimeEntry, OrganizationId, ScheduleEntry, ScheduleStatus, TeamId,
    TimeEntry, WorkKind,
};
use thiserror::Error;
use uuid::Uuid;

pub use store::Store;

const DATE_FORMAT: &str = "%Y-%m-%d";
const TIME_FORMAT: &str = "%H:%M";

const ENTRY_COLUMNS: &str =
    "id, employee_id, organization_id, team_id, clock_in, clock_out, duration_minutes, work_kind, notes";

const SCHEDULE_COLUMNS: &str = "id, employee_id, organization_id, team_id, scheduled_date, scheduled_start, scheduled_end, status";

/// Database errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// An error from the underlying database.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// The employee already has an open entry.
    #[error("{employee_id} already has an open entry")]
    OpenEntryExists { employee_id: String },
    /// The entry does not exist or was already closed.
    #[error("entry {entry_id} is not open")]
    EntryNotOpen { entry_id: String },
    /// Failed to parse a stored timestamp.
    #[error("invalid timestamp for {id}: {timestamp}")]
    TimestampParse {
        id: String,
        timestamp: String,
        #[source]
        source: chrono::ParseError,
    },
    /// A stored row holds a value the domain types reject.
    #[error("invalid row {id}: {message}")]
    InvalidRow { id: String, message: String },
}

impl DbError {
    /// Whether the error is a lost race rather than a storage failure.
    pub const fn is_conflict(&self) -> bool {
        matches!(self, Self::OpenEntryExists { .. } | Self::EntryNotOpen { .. })
    }
}

/// Database connection wrapper.
///
/// See the [module documentation](self) for thread safety considerations.
pub struct Database {
    conn: Connection,
}

/// A planned shift ready to be stored. The database assigns the ID.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSchedule {
    pub employee_id: EmployeeId,
    pub organization_id: OrganizationId,
    pub team_id: Option<TeamId>,
    pub scheduled_date: NaiveDate,
    pub scheduled_start: NaiveTime,
    pub scheduled_end: NaiveTime,
}

impl Database {
    /// Opens a database at the given path, creating it if necessary.
    ///
    /// The database schema is automatically initialized on first open.
    pub fn open(path: &Path) -> Result<Self, DbError> {
        let conn = Connection::open(path)?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Opens an in-memory database.
    ///
    /// Useful for testing. The database is destroyed when the connection closes.
    pub fn open_in_memory() -> Result<Self, DbError> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Initializes the database schema.
    ///
    /// This is idempotent - safe to call on an already-initialized database.
    fn init(&self) -> Result<(), DbError> {
        self.conn.execute_batch(
            "
            -- Time entries: one row per work or break interval
            -- clock_in/clock_out: RFC 3339 UTC (e.g., '2025-03-10T08:00:00.000Z')
            -- clock_out IS NULL while the entry is open
            CREATE TABLE IF NOT EXISTS time_entries (
                id TEXT PRIMARY KEY,
                employee_id TEXT NOT NULL,
                organization_id TEXT NOT NULL,
                team_id TEXT,
                clock_in TEXT NOT NULL,
                clock_out TEXT,
                duration_minutes INTEGER,
                work_kind TEXT NOT NULL DEFAULT 'work',
                notes TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_time_entries_employee ON time_entries(employee_id, clock_in);
            CREATE INDEX IF NOT EXISTS idx_time_entries_clock_in ON time_entries(clock_in);
            CREATE UNIQUE INDEX IF NOT EXISTS idx_time_entries_one_open
                ON time_entries(employee_id) WHERE clock_out IS NULL;

            -- Planned shifts; scheduled_end <= scheduled_start means the
            -- shift ends on the following day
            CREATE TABLE IF NOT EXISTS schedules (
                id TEXT PRIMARY KEY,
                employee_id TEXT NOT NULL,
                organization_id TEXT NOT NULL,
                team_id TEXT,
                scheduled_date TEXT NOT NULL,
                scheduled_start TEXT NOT NULL,
                scheduled_end TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'scheduled'
            );

            CREATE INDEX IF NOT EXISTS idx_schedules_date ON schedules(scheduled_date);
            CREATE INDEX IF NOT EXISTS idx_schedules_employee ON schedules(employee_id);
            ",
        )?;
        Ok(())
    }

    /// How long a statement waits on a locked database before failing.
    pub fn set_busy_timeout(&self, timeout: Duration) -> Result<(), DbError> {
        self.conn.busy_timeout(timeout)?;
        Ok(())
    }

    /// Inserts a new open entry.
    pub fn insert_entry(&self, entry: &NewTimeEntry) -> Result<TimeEntry, DbError> {
        insert_entry(&self.conn, entry)
    }

    /// Closes an open entry at `clock_out`, recording its duration.
    pub fn close_entry(&self, id: &EntryId, clock_out: DateTime<Utc>) -> Result<TimeEntry, DbError> {
        close_entry(&self.conn, id, clock_out)
    }

    /// Closes `id` and inserts `next` in a single transaction.
    ///
    /// If either write fails, neither is applied.
    pub fn close_and_insert(
        &mut self,
        id: &EntryId,
        clock_out: DateTime<Utc>,
        next: &NewTimeEntry,
    ) -> Result<(TimeEntry, TimeEntry), DbError> {
        let tx = self.conn.transaction()?;
        let closed = close_entry(&tx, id, clock_out)?;
        let opened = insert_entry(&tx, next)?;
        tx.commit()?;
        Ok((closed, opened))
    }

    /// Returns the entry with the given ID.
    pub fn get_entry(&self, id: &EntryId) -> Result<Option<TimeEntry>, DbError> {
        let row = self
            .conn
            .query_row(
                &format!("SELECT {ENTRY_COLUMNS} FROM time_entries WHERE id = ?1"),
                [id.as_str()],
                EntryRow::read,
            )
            .optional()?;
        row.map(EntryRow::into_entry).transpose()
    }

    /// Returns the employee's open entry, if any.
    pub fn find_open_entry(&self, employee_id: &EmployeeId) -> Result<Option<TimeEntry>, DbError> {
        let mut entries = query_entries(
            &self.conn,
            "employee_id = ?1 AND clock_out IS NULL",
            [employee_id.as_str()],
        )?;
        Ok(entries.pop())
    }

    /// Lists open entries of all employees ordered by clock-in.
    pub fn list_open_entries(&self) -> Result<Vec<TimeEntry>, DbError> {
        query_entries(&self.conn, "clock_out IS NULL", [])
    }

    /// Lists an employee's entries whose clock-in is in `[start, end)`.
    pub fn list_entries_for_employee(
        &self,
        employee_id: &EmployeeId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<TimeEntry>, DbError> {
        if end <= start {
            return Ok(Vec::new());
        }
        query_entries(
            &self.conn,
            "employee_id = ?1 AND clock_in >= ?2 AND clock_in < ?3",
            params![employee_id.as_str(), format_timestamp(start), format_timestamp(end)],
        )
    }

    /// Lists entries whose interval overlaps `[start, end)`.
    ///
    /// Open entries are treated as running indefinitely.
    pub fn list_entries_overlapping(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        team_id: Option<&TeamId>,
    ) -> Result<Vec<TimeEntry>, DbError> {
        if end <= start {
            return Ok(Vec::new());
        }
        query_entries(
            &self.conn,
            "clock_in < ?2 AND (clock_out IS NULL OR clock_out > ?1)
             AND (?3 IS NULL OR team_id = ?3)",
            params![
                format_timestamp(start),
                format_timestamp(end),
                team_id.map(TeamId::as_str)
            ],
        )
    }

    /// Inserts a planned shift with status `scheduled`.
    pub fn insert_schedule(&self, schedule: &NewSchedule) -> Result<ScheduleEntry, DbError> {
        let id = Uuid::new_v4().to_string();
        let stored = ScheduleEntry {
            id: parse_id(&id, &id)?,
            employee_id: schedule.employee_id.clone(),
            organization_id: schedule.organization_id.clone(),
            team_id: schedule.team_id.clone(),
            scheduled_date: schedule.scheduled_date,
            scheduled_start: schedule.scheduled_start,
            scheduled_end: schedule.scheduled_end,
            status: ScheduleStatus::Scheduled,
        };
        self.conn.execute(
            "
            INSERT INTO schedules
                (id, employee_id, organization_id, team_id, scheduled_date, scheduled_start, scheduled_end, status)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            ",
            params![
                stored.id.as_str(),
                stored.employee_id.as_str(),
                stored.organization_id.as_str(),
                stored.team_id.as_ref().map(TeamId::as_str),
                stored.scheduled_date.format(DATE_FORMAT).to_string(),
                stored.scheduled_start.format(TIME_FORMAT).to_string(),
                stored.scheduled_end.format(TIME_FORMAT).to_string(),
                stored.status.as_str(),
            ],
        )?;
        tracing::debug!(schedule = %stored.id, employee = %stored.employee_id, "inserted schedule");
        Ok(stored)
    }

    /// Lists schedules with `start <= scheduled_date < end`, ordered by date
    /// then start time.
    pub fn list_schedules(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        team_id: Option<&TeamId>,
    ) -> Result<Vec<ScheduleEntry>, DbError> {
        let mut stmt = self.conn.prepare(&format!(
            "
            SELECT {SCHEDULE_COLUMNS}
            FROM schedules
            WHERE scheduled_date >= ?1 AND scheduled_date < ?2
              AND (?3 IS NULL OR team_id = ?3)
            ORDER BY scheduled_date ASC, scheduled_start ASC, id ASC
            "
        ))?;
        let rows = stmt.query_map(
            params![
                start.format(DATE_FORMAT).to_string(),
                end.format(DATE_FORMAT).to_string(),
                team_id.map(TeamId::as_str)
            ],
            ScheduleRow::read,
        )?;
        let mut schedules = Vec::new();
        for row in rows {
            schedules.push(row?.into_schedule()?);
        }
        Ok(schedules)
    }

    /// SQLite's `data_version`, which changes when another connection
    /// commits to the database file.
    pub fn data_version(&self) -> Result<i64, DbError> {
        Ok(self
            .conn
            .pragma_query_value(None, "data_version", |row| row.get(0))?)
    }
}

fn insert_entry(conn: &Connection, entry: &NewTimeEntry) -> Result<TimeEntry, DbError> {
    let id = Uuid::new_v4().to_string();
    conn.execute(
        "
        INSERT INTO time_entries
            (id, employee_id, organization_id, team_id, clock_in, clock_out, duration_minutes, work_kind, notes)
        VALUES (?1, ?2, ?3, ?4, ?5, NULL, NULL, ?6, ?7)
        ",
        params![
            id,
            entry.employee_id.as_str(),
            entry.organization_id.as_str(),
            entry.team_id.as_ref().map(TeamId::as_str),
            format_timestamp(entry.clock_in),
            entry.kind.as_str(),
            entry.notes,
        ],
    )
    .map_err(|err| match err.sqlite_error_code() {
        Some(ErrorCode::ConstraintViolation) => DbError::OpenEntryExists {
            employee_id: entry.employee_id.to_string(),
        },
        _ => DbError::Sqlite(err),
    })?;

    tracing::debug!(entry = %id, employee = %entry.employee_id, kind = %entry.kind, "inserted entry");
    Ok(TimeEntry {
        id: parse_id(&id, &id)?,
        employee_id: entry.employee_id.clone(),
        organization_id: entry.organization_id.clone(),
        team_id: entry.team_id.clone(),
        clock_in: entry.clock_in,
        clock_out: None,
        duration_minutes: None,
        kind: entry.kind,
        notes: entry.notes.clone(),
    })
}

fn close_entry(conn: &Connection, id: &EntryId, clock_out: DateTime<Utc>) -> Result<TimeEntry, DbError> {
    let not_open = || DbError::EntryNotOpen {
        entry_id: id.to_string(),
    };
    let mut open = query_entries(conn, "id = ?1 AND clock_out IS NULL", [id.as_str()])?;
    let mut entry = open.pop().ok_or_else(not_open)?;
    let duration = whole_minutes(entry.clock_in, clock_out);

    let updated = conn.execute(
        "
        UPDATE time_entries
        SET clock_out = ?2, duration_minutes = ?3
        WHERE id = ?1 AND clock_out IS NULL
        ",
        params![id.as_str(), format_timestamp(clock_out), duration],
    )?;
    if updated == 0 {
        return Err(not_open());
    }

    tracing::debug!(entry = %id, duration, "closed entry");
    entry.clock_out = Some(clock_out);
    entry.duration_minutes = Some(duration);
    Ok(entry)
}

fn query_entries<P: Params>(conn: &Connection, filter: &str, params: P) -> Result<Vec<TimeEntry>, DbError> {
    let mut stmt = conn.prepare(&format!(
        "
        SELECT {ENTRY_COLUMNS}
        FROM time_entries
        WHERE {filter}
        ORDER BY clock_in ASC, id ASC
        "
    ))?;
    let rows = stmt.query_map(params, EntryRow::read)?;
    let mut entries = Vec::new();
    for row in rows {
        entries.push(row?.into_entry()?);
    }
    Ok(entries)
}

/// Raw `time_entries` columns before validation.
struct EntryRow {
    id: String,
    employee_id: String,
    organization_id: String,
    team_id: Option<String>,
    clock_in: String,
    clock_out: Option<String>,
    duration_minutes: Option<i64>,
    work_kind: String,
    notes: Option<String>,
}

impl EntryRow {
    fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            employee_id: row.get(1)?,
            organization_id: row.get(2)?,
            team_id: row.get(3)?,
            clock_in: row.get(4)?,
            clock_out: row.get(5)?,
            duration_minutes: row.get(6)?,
            work_kind: row.get(7)?,
            notes: row.get(8)?,
        })
    }

    fn into_entry(self) -> Result<TimeEntry, DbError> {
        let id = &self.id;
        Ok(TimeEntry {
            id: parse_id(id, id)?,
            employee_id: parse_id(&self.employee_id, id)?,
            organization_id: parse_id(&self.organization_id, id)?,
            team_id: self
                .team_id
                .as_deref()
                .map(|team| parse_id(team, id))
                .transpose()?,
            clock_in: parse_timestamp(&self.clock_in, id)?,
            clock_out: self
                .clock_out
                .as_deref()
                .map(|ts| parse_timestamp(ts, id))
                .transpose()?,
            duration_minutes: self.duration_minutes,
            kind: self
                .work_kind
                .parse::<WorkKind>()
                .map_err(|err| invalid_row(id, err))?,
            notes: self.notes,
        })
    }
}

/// Raw `schedules` columns before validation.
struct ScheduleRow {
    id: String,
    employee_id: String,
    organization_id: String,
    team_id: Option<String>,
    scheduled_date: String,
    scheduled_start: String,
    scheduled_end: String,
    status: String,
}

impl ScheduleRow {
    fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            employee_id: row.get(1)?,
            organization_id: row.get(2)?,
            team_id: row.get(3)?,
            scheduled_date: row.get(4)?,
            scheduled_start: row.get(5)?,
            scheduled_end: row.get(6)?,
            status: row.get(7)?,
        })
    }

    fn into_schedule(self) -> Result<ScheduleEntry, DbError> {
        let id = &self.id;
        Ok(ScheduleEntry {
            id: parse_id(id, id)?,
            employee_id: parse_id(&self.employee_id, id)?,
            organization_id: parse_id(&self.organization_id, id)?,
            team_id: self
                .team_id
                .as_deref()
                .map(|team| parse_id(team, id))
                .transpose()?,
            scheduled_date: NaiveDate::parse_from_str(&self.scheduled_date, DATE_FORMAT)
                .map_err(|err| invalid_row(id, err))?,
            scheduled_start: NaiveTime::parse_from_str(&self.scheduled_start, TIME_FORMAT)
                .map_err(|err| invalid_row(id, err))?,
            scheduled_end: NaiveTime::parse_from_str(&self.scheduled_end, TIME_FORMAT)
                .map_err(|err| invalid_row(id, err))?,
            status: self
                .status
                .parse::<ScheduleStatus>()
                .map_err(|err| invalid_row(id, err))?,
        })
    }
}

fn invalid_row(id: &str, err: impl std::fmt::Display) -> DbError {
    DbError::InvalidRow {
        id: id.to_string(),
        message: err.to_string(),
    }
}

fn parse_id<T: TryFrom<String>>(value: &str, row_id: &str) -> Result<T, DbError>
where
    T::Error: std::fmt::Display,
{
    T::try_from(value.to_string()).map_err(|err| invalid_row(row_id, err))
}

fn parse_timestamp(timestamp: &str, id: &str) -> Result<DateTime<Utc>, DbError> {
    DateTime::parse_from_rfc3339(timestamp)
        .map(|parsed| parsed.with_timezone(&Utc))
        .map_err(|source| DbError::TimestampParse {
            id: id.to_string(),
            timestamp: timestamp.to_string(),
            source,
        })
}

fn format_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
}
