//! Relative timestamps ("3 years ago")
//!
//! Sites render post times relative to the moment of viewing. The grammar is
//! `<integer> <unit> ago` with whitespace between each part. Phrases like
//! "an hour ago" or "just now" are rejected rather than guessed at.

use chrono::{DateTime, Months, TimeDelta, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::errors::ParseError;

static RELATIVE_TIME_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\s*(\d+)\s+(second|minute|hour|day|week|month|year)s?\s+ago\s*$")
        .expect("Invalid relative time regex")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeUnit {
    Second,
    Minute,
    Hour,
    Day,
    Week,
    Month,
    Year,
}

impl TimeUnit {
    pub const ALL: [Self; 7] = [
        Self::Second,
        Self::Minute,
        Self::Hour,
        Self::Day,
        Self::Week,
        Self::Month,
        Self::Year,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Second => "second",
            Self::Minute => "minute",
            Self::Hour => "hour",
            Self::Day => "day",
            Self::Week => "week",
            Self::Month => "month",
            Self::Year => "year",
        }
    }

    fn from_word(word: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|unit| unit.as_str().eq_ignore_ascii_case(word))
    }

    /// Seconds per unit for the fixed-length units.
    const fn fixed_seconds(self) -> Option<i64> {
        match self {
            Self::Second => Some(1),
            Self::Minute => Some(60),
            Self::Hour => Some(3_600),
            Self::Day => Some(86_400),
            Self::Week => Some(604_800),
            Self::Month | Self::Year => None,
        }
    }
}

impl fmt::Display for TimeUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A time offset into the past, as displayed on the page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RelativeTime {
    pub amount: u64,
    pub unit: TimeUnit,
}

impl RelativeTime {
    #[must_use]
    pub const fn new(amount: u64, unit: TimeUnit) -> Self {
        Self { amount, unit }
    }

    /// Best-effort absolute instant this offset points at, seen from
    /// `captured_at`.
    ///
    /// Months and years use calendar arithmetic. `None` when the result is
    /// out of chrono's range.
    #[must_use]
    pub fn approximate_instant(&self, captured_at: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self.unit.fixed_seconds() {
            Some(per_unit) => {
                let amount = i64::try_from(self.amount).ok()?;
                let delta = TimeDelta::try_seconds(amount.checked_mul(per_unit)?)?;
                captured_at.checked_sub_signed(delta)
            }
            None => {
                let per_unit = if self.unit == TimeUnit::Year { 12 } else { 1 };
                let months = u32::try_from(self.amount.checked_mul(per_unit)?).ok()?;
                captured_at.checked_sub_months(Months::new(months))
            }
        }
    }
}

impl fmt::Display for RelativeTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let plural = if self.amount == 1 { "" } else { "s" };
        write!(f, "{} {}{} ago", self.amount, self.unit, plural)
    }
}

impl FromStr for RelativeTime {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_relative_time(s)
    }
}

/// Parse `<integer> <unit-word> ago`.
///
/// Units may be singular or plural and any case; surrounding whitespace is
/// ignored. Anything else, including an amount that overflows `u64`, is an
/// [`UnrecognizedTimeFormat`](super::ParseErrorKind::UnrecognizedTimeFormat)
/// error.
pub fn parse_relative_time(text: &str) -> Result<RelativeTime, ParseError> {
    let captures = RELATIVE_TIME_RE
        .captures(text)
        .ok_or_else(|| ParseError::unrecognized_time(text))?;

    let amount = captures[1].parse::<u64>().map_err(|e| ParseError {
        detail: format!("amount out of range: {e}"),
        ..ParseError::unrecognized_time(text)
    })?;
    let unit = TimeUnit::from_word(&captures[2]).ok_or_else(|| ParseError::unrecognized_time(text))?;

    Ok(RelativeTime { amount, unit })
}

/// Whether `text` is exactly a relative time.
#[must_use]
pub fn is_relative_time(text: &str) -> bool {
    RELATIVE_TIME_RE.is_match(text)
}
