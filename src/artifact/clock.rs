//! Time source and period boundaries for the periodic strategies

use chrono::{DateTime, Datelike, Duration, NaiveTime, Utc, Weekday};

#[cfg(test)]
use mockall::automock;

/// Trait for reading the current time
#[cfg_attr(test, automock)]
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Midnight (UTC) of the day containing `now`
pub fn start_of_day(now: DateTime<Utc>) -> DateTime<Utc> {
    now.date_naive().and_time(NaiveTime::MIN).and_utc()
}

/// Midnight (UTC) of the most recent `week_start` day, today included
pub fn start_of_week(now: DateTime<Utc>, week_start: Weekday) -> DateTime<Utc> {
    let days_back = (7 + now.weekday().num_days_from_monday()
        - week_start.num_days_from_monday())
        % 7;
    start_of_day(now) - Duration::days(i64::from(days_back))
}
