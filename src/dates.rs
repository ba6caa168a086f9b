//! Calendar-date helpers
//!
//! Everything in the crate works on [`NaiveDate`]; there is no time of day.
//! "Today" is never read implicitly by the analytics code: it arrives through
//! a [`Clock`] owned by the application controller.

use chrono::{Datelike, Days, Local, Months, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::ValidationError;

/// Date format used by storage, import and export
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Parse a strict `YYYY-MM-DD` date
///
/// Rejects anything that is not exactly four-two-two digits as well as
/// impossible dates such as `2024-02-30`.
pub fn parse_date(input: &str) -> Result<NaiveDate, ValidationError> {
    let trimmed = input.trim();
    let bytes = trimmed.as_bytes();
    let shape_ok = bytes.len() == 10
        && bytes.iter().enumerate().all(|(i, b)| match i {
            4 | 7 => *b == b'-',
            _ => b.is_ascii_digit(),
        });

    if !shape_ok {
        return Err(ValidationError::InvalidDate {
            input: input.to_string(),
        });
    }

    NaiveDate::parse_from_str(trimmed, DATE_FORMAT).map_err(|_| ValidationError::InvalidDate {
        input: input.to_string(),
    })
}

pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

/// Signed number of calendar days from `from` to `to`
pub fn days_between(from: NaiveDate, to: NaiveDate) -> i64 {
    (to - from).num_days()
}

pub fn add_days(date: NaiveDate, days: i64) -> NaiveDate {
    if days >= 0 {
        date.checked_add_days(Days::new(days as u64)).unwrap_or(NaiveDate::MAX)
    } else {
        date.checked_sub_days(Days::new(days.unsigned_abs()))
            .unwrap_or(NaiveDate::MIN)
    }
}

pub fn sub_months(date: NaiveDate, months: u32) -> NaiveDate {
    date.checked_sub_months(Months::new(months))
        .unwrap_or(NaiveDate::MIN)
}

/// Monday of the ISO week containing `date`
pub fn monday_of_week(date: NaiveDate) -> NaiveDate {
    let offset = date.weekday().num_days_from_monday() as i64;
    add_days(date, -offset)
}

/// Index into a seven-slot weekday array, Monday = 0
pub fn weekday_index(date: NaiveDate) -> usize {
    date.weekday().num_days_from_monday() as usize
}

pub const WEEKDAYS: [Weekday; 7] = [
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
    Weekday::Sat,
    Weekday::Sun,
];

/// Calendar month key, ordered chronologically and displayed as `YYYY-MM`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct YearMonth {
    pub year: i32,
    pub month: u32,
}

impl YearMonth {
    pub fn of(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    pub fn previous(&self) -> Self {
        if self.month == 1 {
            Self {
                year: self.year - 1,
                month: 12,
            }
        } else {
            Self {
                year: self.year,
                month: self.month - 1,
            }
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date.year() == self.year && date.month() == self.month
    }
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

/// Inclusive date range filter; open ends match everything
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl DateRange {
    pub fn new(start: Option<NaiveDate>, end: Option<NaiveDate>) -> Self {
        Self { start, end }
    }

    pub fn since(start: NaiveDate) -> Self {
        Self {
            start: Some(start),
            end: None,
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        if let Some(start) = self.start {
            if date < start {
                return false;
            }
        }
        if let Some(end) = self.end {
            if date > end {
                return false;
            }
        }
        true
    }
}

/// Source of "today"
pub trait Clock: Send + Sync {
    fn today(&self) -> NaiveDate;
}

/// Local wall-clock date
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        Local::now().date_naive()
    }
}

/// Pinned date, for tests and reproducible reports
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub NaiveDate);

impl Clock for FixedClock {
    fn today(&self) -> NaiveDate {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_parse_date_strict() {
        assert_eq!(parse_date("2024-01-05").unwrap(), d(2024, 1, 5));
        assert_eq!(parse_date(" 2024-01-05 ").unwrap(), d(2024, 1, 5));
        assert!(parse_date("2024-02-30").is_err());
        assert!(parse_date("2024-1-5").is_err());
        assert!(parse_date("05/01/2024").is_err());
        assert!(parse_date("").is_err());
    }

    #[test]
    fn test_days_between_and_add() {
        assert_eq!(days_between(d(2024, 2, 28), d(2024, 3, 1)), 2);
        assert_eq!(days_between(d(2024, 3, 1), d(2024, 2, 28)), -2);
        assert_eq!(add_days(d(2024, 3, 1), -1), d(2024, 2, 29));
    }

    #[test]
    fn test_monday_of_week() {
        // 2024-01-07 is a Sunday
        assert_eq!(monday_of_week(d(2024, 1, 7)), d(2024, 1, 1));
        assert_eq!(monday_of_week(d(2024, 1, 1)), d(2024, 1, 1));
        assert_eq!(weekday_index(d(2024, 1, 7)), 6);
    }

    #[test]
    fn test_year_month() {
        let ym = YearMonth::of(d(2024, 1, 15));
        assert_eq!(ym.to_string(), "2024-01");
        assert_eq!(ym.previous().to_string(), "2023-12");
        assert!(ym.contains(d(2024, 1, 31)));
        assert!(!ym.contains(d(2024, 2, 1)));
    }

    #[test]
    fn test_date_range() {
        let range = DateRange::new(Some(d(2024, 1, 1)), Some(d(2024, 1, 31)));
        assert!(range.contains(d(2024, 1, 1)));
        assert!(range.contains(d(2024, 1, 31)));
        assert!(!range.contains(d(2024, 2, 1)));
        assert!(DateRange::default().contains(d(1999, 1, 1)));
    }
}
