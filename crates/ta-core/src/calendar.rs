//! Local calendar boundaries (days and ISO weeks) expressed in UTC.

use chrono::{DateTime, Datelike, Duration, LocalResult, NaiveDate, NaiveTime, TimeZone, Utc};

use crate::interval::Interval;

/// Number of days in a coverage/summary week.
pub const DAYS_PER_WEEK: i64 = 7;

/// Converts a local date at the given hour to UTC.
///
/// Ambiguous times (DST fall-back) resolve to the earlier instant. Times
/// inside a spring-forward gap move to the next hour that exists.
pub fn local_to_utc<Tz: TimeZone>(tz: &Tz, date: NaiveDate, time: NaiveTime) -> DateTime<Utc> {
    let mut local = date.and_time(time);
    for _ in 0..3 {
        match tz.from_local_datetime(&local) {
            LocalResult::Single(dt) | LocalResult::Ambiguous(dt, _) => {
                return dt.with_timezone(&Utc);
            }
            LocalResult::None => local += Duration::hours(1),
        }
    }
    // No zone has a gap longer than a few hours; treat the wall time as UTC.
    local.and_utc()
}

/// Local midnight of `date`, in UTC.
pub fn local_midnight<Tz: TimeZone>(tz: &Tz, date: NaiveDate) -> DateTime<Utc> {
    local_to_utc(tz, date, NaiveTime::MIN)
}

/// The local calendar day `[00:00, next 00:00)` as a UTC interval.
pub fn day_range<Tz: TimeZone>(tz: &Tz, date: NaiveDate) -> Interval<DateTime<Utc>> {
    Interval::new(
        local_midnight(tz, date),
        local_midnight(tz, date + Duration::days(1)),
    )
}

/// Monday of the ISO week containing `date`.
pub fn week_start(date: NaiveDate) -> NaiveDate {
    let days_since_monday = date.weekday().num_days_from_monday();
    date - Duration::days(i64::from(days_since_monday))
}

/// The seven local dates of the ISO week containing `anchor`.
pub fn week_days(anchor: NaiveDate) -> Vec<NaiveDate> {
    let monday = week_start(anchor);
    (0..DAYS_PER_WEEK)
        .map(|offset| monday + Duration::days(offset))
        .collect()
}

/// The ISO week containing `anchor` as a UTC interval (Monday 00:00 local
/// through the following Monday 00:00 local).
pub fn week_range<Tz: TimeZone>(tz: &Tz, anchor: NaiveDate) -> Interval<DateTime<Utc>> {
    let monday = week_start(anchor);
    Interval::new(
        local_midnight(tz, monday),
        local_midnight(tz, monday + Duration::days(DAYS_PER_WEEK)),
    )
}

/// The local calendar date of a UTC instant.
pub fn local_date<Tz: TimeZone>(tz: &Tz, instant: DateTime<Utc>) -> NaiveDate {
    instant.with_timezone(tz).date_naive()
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::FixedOffset;

    #[test]
    fn week_start_for_wednesday() {
        // Jan 29, 2025 is a Wednesday
        let wednesday = NaiveDate::from_ymd_opt(2025, 1, 29).unwrap();
        assert_eq!(week_start(wednesday), NaiveDate::from_ymd_opt(2025, 1, 27).unwrap());
    }

    #[test]
    fn week_start_on_monday_and_sunday() {
        let monday = NaiveDate::from_ymd_opt(2025, 1, 27).unwrap();
        let sunday = NaiveDate::from_ymd_opt(2025, 2, 2).unwrap();
        assert_eq!(week_start(monday), monday);
        assert_eq!(week_start(sunday), monday);
    }

    #[test]
    fn week_days_are_monday_through_sunday() {
        let days = week_days(NaiveDate::from_ymd_opt(2025, 1, 30).unwrap());
        assert_eq!(days.len(), 7);
        assert_eq!(days[0], NaiveDate::from_ymd_opt(2025, 1, 27).unwrap());
        assert_eq!(days[6], NaiveDate::from_ymd_opt(2025, 2, 2).unwrap());
    }

    #[test]
    fn day_range_respects_offset() {
        let tz = FixedOffset::east_opt(2 * 3600).unwrap();
        let date = NaiveDate::from_ymd_opt(2025, 1, 29).unwrap();
        let range = day_range(&tz, date);
        assert_eq!(range.start.to_rfc3339(), "2025-01-28T22:00:00+00:00");
        assert_eq!(range.end.to_rfc3339(), "2025-01-29T22:00:00+00:00");
    }

    #[test]
    fn week_range_spans_seven_days() {
        let date = NaiveDate::from_ymd_opt(2025, 1, 29).unwrap();
        let range = week_range(&Utc, date);
        assert_eq!(range.start.to_rfc3339(), "2025-01-27T00:00:00+00:00");
        assert_eq!(range.end.to_rfc3339(), "2025-02-03T00:00:00+00:00");
    }

    #[test]
    fn local_date_uses_zone() {
        let tz = FixedOffset::west_opt(5 * 3600).unwrap();
        let instant = DateTime::parse_from_rfc3339("2025-01-29T03:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(local_date(&tz, instant), NaiveDate::from_ymd_opt(2025, 1, 28).unwrap());
    }
}
