//! Clocked time entries and planned shifts.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use crate::interval::{Interval, whole_minutes};
use crate::types::{EmployeeId, EntryId, OrganizationId, ScheduleId, TeamId};

/// What a time entry records: work, or one of the break kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkKind {
    Work,
    BreakCoffee,
    BreakLunch,
    BreakRest,
}

impl WorkKind {
    /// String representation for storage.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Work => "work",
            Self::BreakCoffee => "break_coffee",
            Self::BreakLunch => "break_lunch",
            Self::BreakRest => "break_rest",
        }
    }

    /// Returns the break kind, or `None` for work.
    #[must_use]
    pub const fn break_kind(&self) -> Option<BreakKind> {
        match self {
            Self::Work => None,
            Self::BreakCoffee => Some(BreakKind::Coffee),
            Self::BreakLunch => Some(BreakKind::Lunch),
            Self::BreakRest => Some(BreakKind::Rest),
        }
    }

    #[must_use]
    pub const fn is_break(&self) -> bool {
        !matches!(self, Self::Work)
    }
}

impl fmt::Display for WorkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WorkKind {
    type Err = UnknownWorkKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "work" => Ok(Self::Work),
            "break_coffee" => Ok(Self::BreakCoffee),
            "break_lunch" => Ok(Self::BreakLunch),
            "break_rest" => Ok(Self::BreakRest),
            _ => Err(UnknownWorkKind(s.to_string())),
        }
    }
}

impl Serialize for WorkKind {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for WorkKind {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

impl From<BreakKind> for WorkKind {
    fn from(kind: BreakKind) -> Self {
        match kind {
            BreakKind::Coffee => Self::BreakCoffee,
            BreakKind::Lunch => Self::BreakLunch,
            BreakKind::Rest => Self::BreakRest,
        }
    }
}

/// Error type for unknown work kind strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownWorkKind(String);

impl fmt::Display for UnknownWorkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown work kind: {}", self.0)
    }
}

impl std::error::Error for UnknownWorkKind {}

/// The kinds of break an employee can take.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BreakKind {
    Coffee,
    Lunch,
    Rest,
}

impl BreakKind {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Coffee => "coffee",
            Self::Lunch => "lunch",
            Self::Rest => "rest",
        }
    }
}

impl fmt::Display for BreakKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BreakKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "coffee" => Ok(Self::Coffee),
            "lunch" => Ok(Self::Lunch),
            "rest" => Ok(Self::Rest),
            _ => Err(format!("invalid break kind: {s}")),
        }
    }
}

/// A clock-in/clock-out pair as persisted by the interval store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeEntry {
    pub id: EntryId,
    pub employee_id: EmployeeId,
    pub organization_id: OrganizationId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub team_id: Option<TeamId>,
    pub clock_in: DateTime<Utc>,
    /// `None` while the entry is open.
    #[serde(default)]
    pub clock_out: Option<DateTime<Utc>>,
    /// Whole minutes, set when the entry is closed.
    #[serde(default)]
    pub duration_minutes: Option<i64>,
    pub kind: WorkKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl TimeEntry {
    #[must_use]
    pub const fn is_open(&self) -> bool {
        self.clock_out.is_none()
    }

    /// The clocked interval, with open entries running until `now`.
    #[must_use]
    pub fn interval_until(&self, now: DateTime<Utc>) -> Interval<DateTime<Utc>> {
        Interval::new(self.clock_in, self.clock_out.unwrap_or(now))
    }

    /// Minutes elapsed since clock-in, floored and never negative.
    #[must_use]
    pub fn elapsed_minutes(&self, now: DateTime<Utc>) -> i64 {
        whole_minutes(self.clock_in, now)
    }

    /// Recorded duration of a closed entry, falling back to the clock span
    /// when the duration column was never filled in.
    #[must_use]
    pub fn closed_minutes(&self) -> Option<i64> {
        let clock_out = self.clock_out?;
        Some(
            self.duration_minutes
                .unwrap_or_else(|| whole_minutes(self.clock_in, clock_out)),
        )
    }
}

/// Fields needed to open a new entry. The store assigns the ID.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTimeEntry {
    pub employee_id: EmployeeId,
    pub organization_id: OrganizationId,
    pub team_id: Option<TeamId>,
    pub clock_in: DateTime<Utc>,
    pub kind: WorkKind,
    pub notes: Option<String>,
}

impl NewTimeEntry {
    /// Opens a follow-up entry for the same employee as `entry`.
    #[must_use]
    pub fn continuing(entry: &TimeEntry, clock_in: DateTime<Utc>, kind: WorkKind) -> Self {
        Self {
            employee_id: entry.employee_id.clone(),
            organization_id: entry.organization_id.clone(),
            team_id: entry.team_id.clone(),
            clock_in,
            kind,
            notes: None,
        }
    }
}

/// Lifecycle status of a planned shift.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleStatus {
    #[default]
    Scheduled,
    Completed,
    Cancelled,
    Missed,
}

impl ScheduleStatus {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Scheduled => "scheduled",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
            Self::Missed => "missed",
        }
    }
}

impl fmt::Display for ScheduleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScheduleStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "scheduled" => Ok(Self::Scheduled),
            "completed" => Ok(Self::Completed),
            "cancelled" => Ok(Self::Cancelled),
            "missed" => Ok(Self::Missed),
            _ => Err(format!("invalid schedule status: {s}")),
        }
    }
}

/// A planned shift in local wall-clock time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleEntry {
    pub id: ScheduleId,
    pub employee_id: EmployeeId,
    pub organization_id: OrganizationId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub team_id: Option<TeamId>,
    pub scheduled_date: NaiveDate,
    pub scheduled_start: NaiveTime,
    pub scheduled_end: NaiveTime,
    #[serde(default)]
    pub status: ScheduleStatus,
}

impl ScheduleEntry {
    /// The planned interval. A shift whose end is not after its start
    /// crosses midnight and ends on the following day.
    #[must_use]
    pub fn planned_interval(&self) -> Interval<NaiveDateTime> {
        let start = self.scheduled_date.and_time(self.scheduled_start);
        let mut end = self.scheduled_date.and_time(self.scheduled_end);
        if end <= start {
            end += Duration::days(1);
        }
        Interval::new(start, end)
    }

    #[must_use]
    pub fn planned_minutes(&self) -> i64 {
        let interval = self.planned_interval();
        whole_minutes(interval.start, interval.end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::TimeZone;

    fn schedule(start: (u32, u32), end: (u32, u32)) -> ScheduleEntry {
        ScheduleEntry {
            id: ScheduleId::new("s-1").unwrap(),
            employee_id: EmployeeId::new("emp-a").unwrap(),
            organization_id: OrganizationId::new("org").unwrap(),
            team_id: None,
            scheduled_date: NaiveDate::from_ymd_opt(2025, 3, 10).unwrap(),
            scheduled_start: NaiveTime::from_hms_opt(start.0, start.1, 0).unwrap(),
            scheduled_end: NaiveTime::from_hms_opt(end.0, end.1, 0).unwrap(),
            status: ScheduleStatus::Scheduled,
        }
    }

    #[test]
    fn work_kind_roundtrips_through_strings() {
        for kind in [
            WorkKind::Work,
            WorkKind::BreakCoffee,
            WorkKind::BreakLunch,
            WorkKind::BreakRest,
        ] {
            let parsed: WorkKind = kind.to_string().parse().expect("should parse");
            assert_eq!(parsed, kind);
        }
        let err = "Resumed from Lunch break".parse::<WorkKind>().unwrap_err();
        assert_eq!(err.to_string(), "unknown work kind: Resumed from Lunch break");
    }

    #[test]
    fn break_kinds_map_to_break_work_kinds() {
        for kind in [BreakKind::Coffee, BreakKind::Lunch, BreakKind::Rest] {
            let work_kind = WorkKind::from(kind);
            assert!(work_kind.is_break());
            assert_eq!(work_kind.break_kind(), Some(kind));
        }
        assert_eq!(WorkKind::Work.break_kind(), None);
    }

    #[test]
    fn planned_minutes_for_day_shift() {
        assert_eq!(schedule((9, 0), (17, 0)).planned_minutes(), 480);
    }

    #[test]
    fn overnight_shift_ends_next_day() {
        let shift = schedule((22, 0), (6, 0));
        let interval = shift.planned_interval();
        assert_eq!(interval.end.date(), NaiveDate::from_ymd_opt(2025, 3, 11).unwrap());
        assert_eq!(shift.planned_minutes(), 480);
    }

    #[test]
    fn closed_minutes_falls_back_to_clock_span() {
        let clock_in = Utc.with_ymd_and_hms(2025, 3, 10, 9, 0, 0).unwrap();
        let entry = TimeEntry {
            id: EntryId::new("e-1").unwrap(),
            employee_id: EmployeeId::new("emp-a").unwrap(),
            organization_id: OrganizationId::new("org").unwrap(),
            team_id: None,
            clock_in,
            clock_out: Some(clock_in + Duration::seconds(95 * 60 + 59)),
            duration_minutes: None,
            kind: WorkKind::Work,
            notes: None,
        };
        assert_eq!(entry.closed_minutes(), Some(95));
        assert!(!entry.is_open());
    }
}
