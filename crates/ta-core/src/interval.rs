//! Half-open interval helpers shared by the session engine, coverage and
//! summaries.

use std::ops::Sub;

use chrono::Duration;
use serde::{Deserialize, Serialize};

/// A half-open interval `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interval<T> {
    pub start: T,
    pub end: T,
}

impl<T: Copy + Ord> Interval<T> {
    pub const fn new(start: T, end: T) -> Self {
        Self { start, end }
    }

    /// Empty or inverted intervals contain nothing.
    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    pub fn contains(&self, instant: T) -> bool {
        self.start <= instant && instant < self.end
    }

    pub fn overlaps(&self, other: &Self) -> bool {
        intervals_overlap(self.start, self.end, other.start, other.end)
    }

    /// The common part of two intervals, if any.
    pub fn intersection(&self, other: &Self) -> Option<Self> {
        if !self.overlaps(other) {
            return None;
        }
        Some(Self::new(
            self.start.max(other.start),
            self.end.min(other.end),
        ))
    }
}

impl<T> Interval<T>
where
    T: Copy + Ord + Sub<Output = Duration>,
{
    pub fn minutes(&self) -> i64 {
        whole_minutes(self.start, self.end)
    }

    /// Minutes of `self` that fall inside `window`.
    pub fn minutes_within(&self, window: &Self) -> i64 {
        self.intersection(window).map_or(0, |i| i.minutes())
    }
}

/// Returns true if `[a_start, a_end)` and `[b_start, b_end)` share any instant.
///
/// Containment of one interval in the other is covered by the same test.
/// Empty intervals never overlap anything.
pub fn intervals_overlap<T: PartialOrd>(a_start: T, a_end: T, b_start: T, b_end: T) -> bool {
    a_start < a_end && b_start < b_end && a_start < b_end && a_end > b_start
}

/// Whole minutes from `start` to `end`, floored. Inverted spans count as 0.
pub fn whole_minutes<T>(start: T, end: T) -> i64
where
    T: Copy + Ord + Sub<Output = Duration>,
{
    if end <= start {
        return 0;
    }
    (end - start).num_minutes()
}

/// Rounds hours to one decimal place.
pub fn round_tenths(hours: f64) -> f64 {
    (hours * 10.0).round() / 10.0
}

/// Converts whole minutes to hours rounded to one decimal place.
#[allow(clippy::cast_precision_loss)]
pub fn minutes_to_hours(minutes: i64) -> f64 {
    round_tenths(minutes as f64 / 60.0)
}
