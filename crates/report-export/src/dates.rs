//! Date arguments, in the same forms the reporting API accepts.

use std::fmt;
use std::str::FromStr;

use chrono::{Days, NaiveDate};

const DAYS_AGO_SUFFIX: &str = "daysAgo";

/// `today`, `yesterday`, `NdaysAgo` or an ISO-8601 `YYYY-MM-DD` date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateSpec {
    Today,
    Yesterday,
    DaysAgo(u32),
    Date(NaiveDate),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("'{0}' isn't a date: expected YYYY-MM-DD, 'today', 'yesterday' or 'NdaysAgo'")]
pub struct InvalidDate(Box<str>);

/// A relative date or backfill span reaching past the earliest representable date.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{days} days before {date} is out of range")]
pub struct DateOutOfRange {
    date: NaiveDate,
    days: u64,
}

impl FromStr for DateSpec {
    type Err = InvalidDate;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();

        match s {
            "today" => return Ok(Self::Today),
            "yesterday" => return Ok(Self::Yesterday),
            _ => (),
        }

        if let Some(days) = s.strip_suffix(DAYS_AGO_SUFFIX) {
            return days
                .parse()
                .map(Self::DaysAgo)
                .map_err(|_| InvalidDate(s.into()));
        }

        NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .map(Self::Date)
            .map_err(|_| InvalidDate(s.into()))
    }
}

impl fmt::Display for DateSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Today => f.write_str("today"),
            Self::Yesterday => f.write_str("yesterday"),
            Self::DaysAgo(days) => write!(f, "{days}{DAYS_AGO_SUFFIX}"),
            Self::Date(date) => write!(f, "{}", date.format("%Y-%m-%d")),
        }
    }
}

impl DateSpec {
    /// Resolves relative forms against `today`.
    pub fn resolve(self, today: NaiveDate) -> Result<NaiveDate, DateOutOfRange> {
        match self {
            Self::Today => Ok(today),
            Self::Yesterday => days_before(today, 1),
            Self::DaysAgo(days) => days_before(today, days.into()),
            Self::Date(date) => Ok(date),
        }
    }
}

pub fn today() -> NaiveDate {
    chrono::Local::now().date_naive()
}

fn days_before(date: NaiveDate, days: u64) -> Result<NaiveDate, DateOutOfRange> {
    date.checked_sub_days(Days::new(days))
        .ok_or(DateOutOfRange { date, days })
}

/// An inclusive date range to export.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl Window {
    pub fn start_str(&self) -> String {
        self.start.format("%Y-%m-%d").to_string()
    }

    pub fn end_str(&self) -> String {
        self.end.format("%Y-%m-%d").to_string()
    }
}

/// `windows` consecutive windows of `window_days` days each, newest first. Window `i` ends
/// `i * window_days` days before `end` and starts `window_days` days before that.
pub fn backfill_windows(
    end: NaiveDate,
    window_days: u32,
    windows: u32,
) -> Result<Vec<Window>, DateOutOfRange> {
    (0..u64::from(windows))
        .map(|i| {
            let window_end = days_before(end, i * u64::from(window_days))?;
            Ok(Window {
                start: days_before(window_end, window_days.into())?,
                end: window_end,
            })
        })
        .collect()
}
