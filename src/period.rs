//! Calendar period arithmetic
//!
//! Pure date-math helpers shared by the search builder (per-series pagination
//! offsets) and the response formatter (gap filling). All math is calendar
//! aware: a month is a month regardless of its length, and leap days do not
//! shift month-based boundaries.

use chrono::{Datelike, Days, Months, NaiveDate};

use crate::types::Periodicity;

/// Floor a date to the start of its period
///
/// Day periods floor to the date itself; month-based periods floor to the
/// first day of the first month of the period.
pub fn period_start(date: NaiveDate, periodicity: Periodicity) -> NaiveDate {
    match periodicity.months() {
        None => date,
        Some(months) => {
            let month0 = (date.month0() / months) * months;
            // month0 is always a valid month index and day 1 always exists
            NaiveDate::from_ymd_opt(date.year(), month0 + 1, 1)
                .expect("period start is a valid date")
        }
    }
}

/// Smallest period boundary strictly after `date`
pub fn next_period(date: NaiveDate, periodicity: Periodicity) -> NaiveDate {
    let start = period_start(date, periodicity);
    match periodicity.months() {
        None => start + Days::new(1),
        Some(months) => start + Months::new(months),
    }
}

/// Signed count of whole periods of `periodicity` between two dates
///
/// Positive when `a` is later than `b`. Both dates are floored to their
/// period boundary first, so any two dates inside the same period are zero
/// periods apart.
pub fn periods_between(a: NaiveDate, b: NaiveDate, periodicity: Periodicity) -> i64 {
    let a = period_start(a, periodicity);
    let b = period_start(b, periodicity);
    match periodicity.months() {
        None => (a - b).num_days(),
        Some(months) => {
            let month_diff =
                i64::from(a.year() - b.year()) * 12 + i64::from(a.month0()) - i64::from(b.month0());
            month_diff / i64::from(months)
        }
    }
}
