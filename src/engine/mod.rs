//! Consistency engine.
//!
//! Pure, synchronous computation over already-fetched log entries:
//! entries are grouped into local calendar days ([`bucket`]), reduced to one
//! value per day ([`aggregate`]), tested against a [`rule::Rule`] and fed to
//! the streak ([`streak`]) and history ([`history`]) builders. Nothing here
//! touches the store or the clock; callers pass `today` in.

pub mod aggregate;
pub mod bucket;
pub mod history;
pub mod rule;
pub mod streak;

use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

pub use bucket::DayZone;
pub use rule::{Operator, Rule};
pub use streak::StreakStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Interval {
    #[default]
    Day,
    Week,
}

impl Interval {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "day" => Some(Self::Day),
            "week" => Some(Self::Week),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Day => "day",
            Self::Week => "week",
        }
    }

    pub fn step_days(&self) -> i64 {
        match self {
            Self::Day => 1,
            Self::Week => 7,
        }
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A bucket a rule can be evaluated against.
pub trait Measured {
    fn start(&self) -> NaiveDate;
    fn value(&self) -> f64;
    fn entries(&self) -> usize;
    fn done(&self) -> bool;
}

/// Aggregate of one tracker on one local calendar day.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DayValue {
    pub date: NaiveDate,
    pub value: f64,
    pub entries: usize,
    /// Entries holding the literal `"done"` for the tracked field.
    pub done: usize,
}

impl DayValue {
    pub fn empty(date: NaiveDate) -> Self {
        Self {
            date,
            value: 0.0,
            entries: 0,
            done: 0,
        }
    }
}

impl Measured for DayValue {
    fn start(&self) -> NaiveDate {
        self.date
    }
    fn value(&self) -> f64 {
        self.value
    }
    fn entries(&self) -> usize {
        self.entries
    }
    fn done(&self) -> bool {
        self.done > 0
    }
}

/// Sunday-started group of days.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeekValue {
    pub start: NaiveDate,
    pub value: f64,
    pub entries: usize,
    pub done: usize,
    pub days: Vec<DayValue>,
}

impl WeekValue {
    pub fn starting(start: NaiveDate) -> Self {
        Self {
            start,
            value: 0.0,
            entries: 0,
            done: 0,
            days: Vec::new(),
        }
    }

    pub fn push(&mut self, day: DayValue) {
        self.value += day.value;
        self.entries += day.entries;
        self.done += day.done;
        self.days.push(day);
    }
}

impl Measured for WeekValue {
    fn start(&self) -> NaiveDate {
        self.start
    }
    fn value(&self) -> f64 {
        self.value
    }
    fn entries(&self) -> usize {
        self.entries
    }
    fn done(&self) -> bool {
        self.done > 0
    }
}
