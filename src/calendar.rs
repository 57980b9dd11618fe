//! Date arithmetic for the sync engine.
//!
//! The "effective" date rolls over at a configurable hour instead of
//! midnight, so completing a task at 01:30 still counts for the previous
//! day.

use chrono::{Datelike, Duration, Local, Months, NaiveDate, NaiveDateTime};

/// Source of the current local time
pub trait Clock: Send + Sync {
    fn now(&self) -> NaiveDateTime;
}

/// Wall clock in the local timezone
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

/// Clock frozen at a fixed instant
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub NaiveDateTime);

impl Clock for FixedClock {
    fn now(&self) -> NaiveDateTime {
        self.0
    }
}

/// Calendar date of `now` with the day boundary moved to `boundary_hour`.
pub fn effective_date(now: NaiveDateTime, boundary_hour: u32) -> NaiveDate {
    (now - Duration::hours(i64::from(boundary_hour))).date()
}

/// First day of the month containing `date`.
pub fn first_of_month(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

/// Last day of the month starting at `month`.
pub fn month_end(month: NaiveDate) -> NaiveDate {
    let month = first_of_month(month);
    month
        .checked_add_months(Months::new(1))
        .and_then(|next| next.pred_opt())
        .unwrap_or(month)
}

/// Number of days in the month containing `date`.
pub fn days_in_month(date: NaiveDate) -> u32 {
    month_end(date).day()
}

/// First day of the month `count` months before the month of `date`.
pub fn months_before(date: NaiveDate, count: u32) -> NaiveDate {
    let month = first_of_month(date);
    month
        .checked_sub_months(Months::new(count))
        .unwrap_or(month)
}

/// Current month and the `window` months before it, oldest first.
pub fn window_months(today: NaiveDate, window: u32) -> Vec<NaiveDate> {
    (0..=window)
        .rev()
        .map(|back| months_before(today, back))
        .collect()
}
