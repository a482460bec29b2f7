use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::history::group_into_weeks;
use super::{DayValue, Interval, Measured, Rule};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StreakStatus {
    pub current: u32,
    pub longest: u32,
}

/// Consecutive `true` values ending at `today_index`, walking backward.
///
/// An unsatisfied today means no streak; there is no grace period.
pub fn current_streak(series: &[bool], today_index: usize) -> u32 {
    let Some(window) = series.get(..=today_index) else {
        return 0;
    };
    window.iter().rev().take_while(|satisfied| **satisfied).count() as u32
}

/// Longest run of consecutive `true` values in a dense series. Reference for
/// `longest_dated_streak` over gap-free points.
#[cfg(test)]
pub fn longest_streak(series: &[bool]) -> u32 {
    let mut run = 0;
    let mut best = 0;
    for &satisfied in series {
        if satisfied {
            run += 1;
            best = best.max(run);
        } else {
            run = 0;
        }
    }
    best
}

/// Longest run over dated points that may skip periods.
///
/// A satisfied point extends the run only when it sits exactly `step_days`
/// after the previous satisfied point; a gap restarts the run at 1. Repeated
/// dates are the same period and never extend the run twice.
pub fn longest_dated_streak(points: &[(NaiveDate, bool)], step_days: i64) -> u32 {
    let mut run = 0;
    let mut best = 0;
    let mut last: Option<NaiveDate> = None;
    for &(date, satisfied) in points {
        if !satisfied {
            run = 0;
            last = None;
            continue;
        }
        run = match last {
            Some(prev) if prev == date => run,
            Some(prev) if (date - prev).num_days() == step_days => run + 1,
            _ => 1,
        };
        best = best.max(run);
        last = Some(date);
    }
    best
}

/// Current and longest streak over a dense, oldest-first day window whose
/// last element is today.
pub fn status(days: &[DayValue], rule: &Rule, interval: Interval) -> StreakStatus {
    match interval {
        Interval::Day => status_of(days, rule, interval),
        Interval::Week => status_of(&group_into_weeks(days), rule, interval),
    }
}

fn status_of<M: Measured>(periods: &[M], rule: &Rule, interval: Interval) -> StreakStatus {
    let points: Vec<(NaiveDate, bool)> = periods
        .iter()
        .map(|period| (period.start(), rule.satisfied_by(period)))
        .collect();
    let series: Vec<bool> = points.iter().map(|(_, satisfied)| *satisfied).collect();

    let current = series
        .len()
        .checked_sub(1)
        .map_or(0, |today| current_streak(&series, today));
    let longest = longest_dated_streak(&points, interval.step_days());

    StreakStatus {
        current,
        longest: longest.max(current),
    }
}
