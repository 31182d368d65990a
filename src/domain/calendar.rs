//! Month arithmetic on first-of-month dates.

use chrono::{Datelike, NaiveDate};

/// Truncate a date to the first day of its month.
pub fn first_of_month(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

/// Shift a first-of-month date by `delta` months (may be negative).
pub fn add_months(month: NaiveDate, delta: i32) -> NaiveDate {
    let index = month_index(month) + delta;
    from_month_index(index).unwrap_or(month)
}

/// Signed number of months from `from` to `to`.
pub fn months_between(from: NaiveDate, to: NaiveDate) -> i32 {
    month_index(to) - month_index(from)
}

/// Every first-of-month from `from` to `to` inclusive.
pub fn month_grid(from: NaiveDate, to: NaiveDate) -> Vec<NaiveDate> {
    let n = months_between(from, to);
    if n < 0 {
        return Vec::new();
    }
    (0..=n).map(|i| add_months(first_of_month(from), i)).collect()
}

fn month_index(date: NaiveDate) -> i32 {
    date.year() * 12 + date.month0() as i32
}

fn from_month_index(index: i32) -> Option<NaiveDate> {
    let year = index.div_euclid(12);
    let month0 = index.rem_euclid(12) as u32;
    NaiveDate::from_ymd_opt(year, month0 + 1, 1)
}
