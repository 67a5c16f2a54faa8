use std::fmt::Debug;

use chrono::{Datelike, Days, NaiveDate};
use serde::{Deserialize, Serialize};

/// A simple date.
///
/// Dates are stored as a `chrono::NaiveDate`, which gives us the day arithmetic
/// needed for the fuzzy matching window.
#[derive(Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Date(NaiveDate);

impl Date {
    /// Try to parse a date from a string like "2012-12-12".
    ///
    /// # Errors
    ///
    /// Errors when the string is not a valid `YYYY-MM-DD` date.
    pub fn try_from_str(s: &str) -> Result<Self, ()> {
        if s.len() < 10 {
            return Err(());
        }
        Ok(Date(
            NaiveDate::from_ymd_opt(
                s[0..4].parse().map_err(|_| ())?,
                s[5..7].parse().map_err(|_| ())?,
                s[8..10].parse().map_err(|_| ())?,
            )
            .ok_or(())?,
        ))
    }

    /// Create a date from year, month and day.
    #[must_use]
    pub fn from_ymd_opt(year: i32, month: u32, day: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, day).map(Date)
    }

    #[must_use]
    pub fn year(self) -> i32 {
        self.0.year()
    }

    #[must_use]
    pub fn month(self) -> u32 {
        self.0.month()
    }

    #[must_use]
    pub fn day(self) -> u32 {
        self.0.day()
    }

    /// The date shifted by the given number of days (negative shifts backwards).
    ///
    /// Saturates at the calendar boundaries, which are far outside any ledger.
    #[must_use]
    pub fn offset_days(self, days: i32) -> Self {
        let shifted = if days < 0 {
            self.0.checked_sub_days(Days::new(u64::from(days.unsigned_abs())))
        } else {
            self.0.checked_add_days(Days::new(u64::from(days.unsigned_abs())))
        };
        Date(shifted.unwrap_or(self.0))
    }
}

impl Debug for Date {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let date = format!("{:04}-{:02}-{:02}", self.year(), self.month(), self.day());
        f.debug_tuple("Date").field(&date).finish()
    }
}

impl std::fmt::Display for Date {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:04}-{:02}-{:02}", self.year(), self.month(), self.day())
    }
}
