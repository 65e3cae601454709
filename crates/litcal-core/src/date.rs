//! Recurring calendar dates.
//!
//! An event recurs every year on the same day and month. The year, when
//! known, is stored separately on the event and only narrows validation
//! (a year-specific February 29 must fall in a leap year).

use std::fmt;

use chrono::{DateTime, Datelike, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Leap year used to validate year-independent dates, so that February 29
/// is accepted as an anniversary.
const REFERENCE_LEAP_YEAR: i32 = 2000;

/// A year-independent calendar date.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize,
  Deserialize,
)]
pub struct MonthDay {
  pub month: u32,
  pub day:   u32,
}

impl MonthDay {
  /// Build a date, rejecting anything that is not a real calendar day.
  pub fn new(month: u32, day: u32) -> Result<Self> {
    Self::for_year(month, day, None)
  }

  /// Build a date that must also exist in `year`, when one is given.
  pub fn for_year(month: u32, day: u32, year: Option<i32>) -> Result<Self> {
    validate_month(month)?;
    let check_year = year.unwrap_or(REFERENCE_LEAP_YEAR);
    if NaiveDate::from_ymd_opt(check_year, month, day).is_none() {
      return Err(match year {
        Some(y) => Error::validation(format!(
          "day {day} is not valid for month {month} in year {y}"
        )),
        None => {
          Error::validation(format!("day {day} is not valid for month {month}"))
        }
      });
    }
    Ok(Self { month, day })
  }

  pub fn from_date(date: NaiveDate) -> Self {
    Self { month: date.month(), day: date.day() }
  }

  /// The calendar day that `now` falls on in `zone`.
  pub fn today_in<Z: TimeZone>(zone: &Z, now: DateTime<Utc>) -> Self {
    Self::from_date(now.with_timezone(zone).date_naive())
  }
}

impl fmt::Display for MonthDay {
  /// Renders as `MM-DD`, the format the admin UI has always shown.
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{:02}-{:02}", self.month, self.day)
  }
}

/// Reject months outside `1..=12`.
pub fn validate_month(month: u32) -> Result<()> {
  if (1..=12).contains(&month) {
    Ok(())
  } else {
    Err(Error::validation(format!("month must be between 1 and 12, got {month}")))
  }
}
