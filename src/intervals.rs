//! Interval Arithmetic
//!
//! Pure helpers for billing-period math. All computations happen in UTC so
//! day counts never shift across DST transitions.

use chrono::{DateTime, Datelike, Duration, Months, NaiveDate, NaiveTime, TimeZone, Utc};

/// Number of complete 24-hour days between two timestamps.
///
/// Partial days are truncated. Returns zero when `end <= start`.
pub fn full_days(start: DateTime<Utc>, end: DateTime<Utc>) -> i64 {
    if end <= start {
        return 0;
    }
    (end - start).num_days()
}

/// Overlapping sub-interval of `[a_start, a_end)` and `[b_start, b_end)`.
///
/// Returns `None` when the intervals are disjoint; intervals that merely
/// touch at an endpoint do not overlap.
pub fn intersect(
    a_start: DateTime<Utc>,
    a_end: DateTime<Utc>,
    b_start: DateTime<Utc>,
    b_end: DateTime<Utc>,
) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
    let start = a_start.max(b_start);
    let end = a_end.min(b_end);
    if start < end {
        Some((start, end))
    } else {
        None
    }
}

/// First instant of the calendar month containing `ts`.
pub fn month_start(ts: DateTime<Utc>) -> DateTime<Utc> {
    let first = NaiveDate::from_ymd_opt(ts.year(), ts.month(), 1).unwrap_or(ts.date_naive());
    Utc.from_utc_datetime(&first.and_time(NaiveTime::MIN))
}

/// Last instant of the calendar month containing `ts`.
///
/// One microsecond before the first instant of the next month, matching the
/// precision invoice timestamps are stored with.
pub fn month_end(ts: DateTime<Utc>) -> DateTime<Utc> {
    let first = NaiveDate::from_ymd_opt(ts.year(), ts.month(), 1).unwrap_or(ts.date_naive());
    let next = first + Months::new(1);
    Utc.from_utc_datetime(&next.and_time(NaiveTime::MIN)) - Duration::microseconds(1)
}
