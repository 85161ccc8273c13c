//! Time coordinates are days since 1970-01-01T00:00:00 (UTC), as f64.

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::types::IndexError;

const SECONDS_PER_DAY: f64 = 86_400.0;

/// Day-of-year numbering used to group days into a climatology.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DayOfYear {
    /// Gregorian ordinal, 1..=366.
    Standard,
    /// 1..=365; in leap years 30 June is removed and later days shift down by one.
    NoLeap,
}

impl DayOfYear {
    /// Number of distinct days in a year under this convention.
    pub fn days_per_year(self) -> usize {
        match self {
            DayOfYear::Standard => 366,
            DayOfYear::NoLeap => 365,
        }
    }

    /// Day-of-year of `date`, or `None` for the day removed by [`DayOfYear::NoLeap`].
    pub fn of(self, date: NaiveDate) -> Option<u32> {
        let ordinal = date.ordinal();
        match self {
            DayOfYear::Standard => Some(ordinal),
            DayOfYear::NoLeap => {
                if !is_leap_year(date.year()) {
                    return Some(ordinal);
                }
                let june30 = NaiveDate::from_ymd_opt(date.year(), 6, 30)?.ordinal();
                match ordinal.cmp(&june30) {
                    std::cmp::Ordering::Less => Some(ordinal),
                    std::cmp::Ordering::Equal => None,
                    std::cmp::Ordering::Greater => Some(ordinal - 1),
                }
            }
        }
    }
}

pub fn is_leap_year(year: i32) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}

/// Convert a time coordinate to a UTC timestamp, rounded to the second.
pub fn days_to_datetime(days: f64) -> Result<DateTime<Utc>, IndexError> {
    if !days.is_finite() {
        return Err(IndexError::InvalidInput(format!(
            "time coordinate {days} is not finite"
        )));
    }
    let secs = (days * SECONDS_PER_DAY).round();
    if secs.abs() > i64::MAX as f64 / 2.0 {
        return Err(IndexError::InvalidInput(format!(
            "time coordinate {days} is out of range"
        )));
    }
    DateTime::from_timestamp(secs as i64, 0).ok_or_else(|| {
        IndexError::InvalidInput(format!("time coordinate {days} is out of range"))
    })
}

/// Time coordinate of midnight UTC on `date`.
pub fn date_to_days(date: NaiveDate) -> f64 {
    // NaiveDate::default() is the epoch
    (date - NaiveDate::default()).num_days() as f64
}

/// Calendar month (1..=12) of a time coordinate.
pub fn month(days: f64) -> Result<u32, IndexError> {
    Ok(days_to_datetime(days)?.month())
}

/// Day-of-year of a time coordinate under `convention`.
pub fn day_of_year(days: f64, convention: DayOfYear) -> Result<Option<u32>, IndexError> {
    Ok(convention.of(days_to_datetime(days)?.date_naive()))
}
