//! Model time stamps.
//!
//! Time stamps live on the 365-day (no-leap) calendar used by the coupled
//! model and are written as `YYYY-MM-DD-SSSSS`, where the last group is the
//! number of seconds into the day.

use crate::errors::{AtmError, AtmResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, AddAssign, Sub};
use std::str::FromStr;

pub const SECONDS_PER_DAY: f64 = 86400.0;
const DAYS_PER_YEAR: i64 = 365;
const DAYS_IN_MONTH: [u32; 12] = [31, 28, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31];

/// A point in model time, stored as seconds since 0000-01-01 00:00:00.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct TimeStamp {
    seconds: f64,
}

impl TimeStamp {
    /// Create a time stamp from a `(year, month, day)` date and an
    /// `(hour, minute, second)` time of day.
    pub fn new(date: (u32, u32, u32), time: (u32, u32, u32)) -> AtmResult<Self> {
        let (year, month, day) = date;
        let (hour, minute, second) = time;
        if !(1..=12).contains(&month)
            || day == 0
            || day > DAYS_IN_MONTH[month as usize - 1]
            || hour > 23
            || minute > 59
            || second > 59
        {
            return Err(AtmError::InvalidTimeStamp(format!(
                "{year:04}-{month:02}-{day:02} {hour:02}:{minute:02}:{second:02}"
            )));
        }
        let seconds_of_day = (hour * 3600 + minute * 60 + second) as f64;
        Ok(Self::from_parts(year, month, day, seconds_of_day))
    }

    fn from_parts(year: u32, month: u32, day: u32, seconds_of_day: f64) -> Self {
        let days_before_month: u32 = DAYS_IN_MONTH[..month as usize - 1].iter().sum();
        let days = year as i64 * DAYS_PER_YEAR + (days_before_month + day - 1) as i64;
        Self {
            seconds: days as f64 * SECONDS_PER_DAY + seconds_of_day,
        }
    }

    fn whole_days(&self) -> i64 {
        (self.seconds / SECONDS_PER_DAY).floor() as i64
    }

    pub fn year(&self) -> u32 {
        (self.whole_days() / DAYS_PER_YEAR) as u32
    }

    pub fn month(&self) -> u32 {
        self.month_and_day().0
    }

    pub fn day(&self) -> u32 {
        self.month_and_day().1
    }

    fn month_and_day(&self) -> (u32, u32) {
        let mut day_of_year = (self.whole_days() % DAYS_PER_YEAR) as u32;
        for (idx, days) in DAYS_IN_MONTH.iter().enumerate() {
            if day_of_year < *days {
                return (idx as u32 + 1, day_of_year + 1);
            }
            day_of_year -= days;
        }
        (12, 31)
    }

    pub fn seconds_of_day(&self) -> f64 {
        self.seconds - self.whole_days() as f64 * SECONDS_PER_DAY
    }

    /// Seconds elapsed since the calendar origin.
    pub fn seconds(&self) -> f64 {
        self.seconds
    }
}

impl Add<f64> for TimeStamp {
    type Output = TimeStamp;

    fn add(self, dt: f64) -> TimeStamp {
        TimeStamp {
            seconds: self.seconds + dt,
        }
    }
}

impl AddAssign<f64> for TimeStamp {
    fn add_assign(&mut self, dt: f64) {
        self.seconds += dt;
    }
}

impl Sub for TimeStamp {
    type Output = f64;

    fn sub(self, rhs: TimeStamp) -> f64 {
        self.seconds - rhs.seconds
    }
}

impl FromStr for TimeStamp {
    type Err = AtmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || AtmError::InvalidTimeStamp(s.to_string());

        let parts: Vec<&str> = s.trim().split('-').collect();
        if parts.len() != 4 {
            return Err(invalid());
        }
        let year: u32 = parts[0].parse().map_err(|_| invalid())?;
        let month: u32 = parts[1].parse().map_err(|_| invalid())?;
        let day: u32 = parts[2].parse().map_err(|_| invalid())?;
        let seconds_of_day: u32 = parts[3].parse().map_err(|_| invalid())?;
        if seconds_of_day >= SECONDS_PER_DAY as u32 {
            return Err(invalid());
        }

        let hour = seconds_of_day / 3600;
        let minute = (seconds_of_day % 3600) / 60;
        let second = seconds_of_day % 60;
        TimeStamp::new((year, month, day), (hour, minute, second)).map_err(|_| invalid())
    }
}

impl fmt::Display for TimeStamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (month, day) = self.month_and_day();
        write!(
            f,
            "{:04}-{:02}-{:02}-{:05}",
            self.year(),
            month,
            day,
            self.seconds_of_day().floor() as u64
        )
    }
}
