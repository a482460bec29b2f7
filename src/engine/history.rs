use std::collections::HashMap;

use chrono::{Datelike, Days, Duration, NaiveDate};
use serde::Serialize;

use super::aggregate::day_value;
use super::bucket::{bucket_by_day, DayZone};
use super::{DayValue, Interval, Measured, Operator, Rule, WeekValue};
use crate::models::log_entry::{LogEntry, TimeRange};

/// First day of a `days`-long window ending on `today`.
/// Clamped to the earliest representable date.
pub fn window_start(today: NaiveDate, days: usize) -> NaiveDate {
    today
        .checked_sub_days(Days::new(days.saturating_sub(1) as u64))
        .unwrap_or(NaiveDate::MIN)
}

/// Instant range covering the `days`-long window ending on `today`, or
/// `None` when it reaches past the representable calendar.
pub fn window_range(zone: &DayZone, today: NaiveDate, days: usize) -> Option<TimeRange> {
    zone.window(window_start(today, days), today)
}

/// The Sunday on or before `date`.
pub fn week_start(date: NaiveDate) -> NaiveDate {
    date - Duration::days(date.weekday().num_days_from_sunday() as i64)
}

/// Exactly `days` day values ending on `today`, oldest first. Days without
/// entries are zero.
pub fn build_history(
    entries: &[LogEntry],
    field: &str,
    zone: &DayZone,
    today: NaiveDate,
    days: usize,
) -> Vec<DayValue> {
    if days == 0 {
        return Vec::new();
    }
    let first = window_start(today, days);
    let mut by_date: HashMap<NaiveDate, Vec<&LogEntry>> = zone
        .window(first, today)
        .map(|window| bucket_by_day(entries, zone, window))
        .unwrap_or_default()
        .into_iter()
        .map(|bucket| (bucket.date, bucket.entries))
        .collect();

    (0..days)
        .map(|offset| {
            let date = first + Duration::days(offset as i64);
            match by_date.remove(&date) {
                Some(day_entries) => day_value(date, &day_entries, field),
                None => DayValue::empty(date),
            }
        })
        .collect()
}

/// Group consecutive days into Sunday-started weeks.
///
/// The first week can be partial when the window does not start on a Sunday.
pub fn group_into_weeks(days: &[DayValue]) -> Vec<WeekValue> {
    let mut weeks: Vec<WeekValue> = Vec::new();
    for day in days {
        let start = week_start(day.date);
        if weeks.last().map_or(true, |week| week.start != start) {
            weeks.push(WeekValue::starting(start));
        }
        if let Some(week) = weeks.last_mut() {
            week.push(day.clone());
        }
    }
    weeks
}

/// One day of exported history.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryDay {
    pub date: NaiveDate,
    /// Summed field value, or the number of `"done"` entries for existence
    /// rules.
    pub count: f64,
    pub entries: usize,
    /// Whether the period this day belongs to satisfied the rule.
    pub satisfied: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryWeek {
    pub start: NaiveDate,
    pub count: f64,
    pub entries: usize,
    pub satisfied: bool,
    pub days: Vec<HistoryDay>,
}

/// A visualization block: a day for daily trackers, a week with its day
/// breakdown for weekly ones.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Block {
    Day(HistoryDay),
    Week(HistoryWeek),
}

fn count_for<M: Measured>(period: &M, done: usize, rule: &Rule) -> f64 {
    match rule.operator {
        Operator::Exists => done as f64,
        _ => period.value(),
    }
}

fn history_day(day: &DayValue, rule: &Rule, satisfied: bool) -> HistoryDay {
    HistoryDay {
        date: day.date,
        count: count_for(day, day.done, rule),
        entries: day.entries,
        satisfied,
    }
}

fn history_week(week: &WeekValue, rule: &Rule) -> HistoryWeek {
    let satisfied = rule.satisfied_by(week);
    HistoryWeek {
        start: week.start,
        count: count_for(week, week.done, rule),
        entries: week.entries,
        satisfied,
        days: week
            .days
            .iter()
            .map(|day| history_day(day, rule, satisfied))
            .collect(),
    }
}

/// Flat per-day rows. For weekly trackers `satisfied` reflects the
/// containing week.
pub fn history_rows(days: &[DayValue], rule: &Rule, interval: Interval) -> Vec<HistoryDay> {
    match interval {
        Interval::Day => days
            .iter()
            .map(|day| history_day(day, rule, rule.satisfied_by(day)))
            .collect(),
        Interval::Week => group_into_weeks(days)
            .iter()
            .flat_map(|week| history_week(week, rule).days)
            .collect(),
    }
}

pub fn blocks(days: &[DayValue], rule: &Rule, interval: Interval) -> Vec<Block> {
    match interval {
        Interval::Day => days
            .iter()
            .map(|day| Block::Day(history_day(day, rule, rule.satisfied_by(day))))
            .collect(),
        Interval::Week => group_into_weeks(days)
            .iter()
            .map(|week| Block::Week(history_week(week, rule)))
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use chrono::Weekday;
    use uuid::Uuid;

    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn entry(zone: &DayZone, day: NaiveDate, field: &str, value: &str) -> LogEntry {
        let mut values = BTreeMap::new();
        values.insert(field.to_string(), value.to_string());
        LogEntry {
            id: Uuid::new_v4(),
            user_id: "u1".into(),
            type_id: Uuid::nil(),
            timestamp: zone.start_of_day(day).unwrap() + 12 * 3_600_000,
            values,
            notes: None,
        }
    }

    #[test]
    fn always_exactly_n_days_oldest_first() {
        let zone = DayZone::utc();
        let today = date(2024, 6, 15);
        let empty = build_history(&[], "duration", &zone, today, 28);
        assert_eq!(empty.len(), 28);
        assert_eq!(empty[0].date, date(2024, 5, 19));
        assert_eq!(empty[27].date, today);
        assert!(empty.iter().all(|d| d.value == 0.0 && d.entries == 0));

        let many: Vec<LogEntry> = (0..10_000)
            .map(|i| entry(&zone, today - Duration::days(i % 400), "duration", "5"))
            .collect();
        let full = build_history(&many, "duration", &zone, today, 28);
        assert_eq!(full.len(), 28);
        assert!(full.windows(2).all(|w| w[0].date < w[1].date));

        assert!(build_history(&many, "duration", &zone, today, 0).is_empty());
    }

    #[test]
    fn sums_entries_per_day_and_ignores_outside_window() {
        let zone = DayZone::utc();
        let today = date(2024, 6, 15);
        let entries = vec![
            entry(&zone, today, "duration", "20"),
            entry(&zone, today, "duration", "15"),
            entry(&zone, today - Duration::days(2), "duration", "30"),
            entry(&zone, today - Duration::days(10), "duration", "99"),
            entry(&zone, today + Duration::days(1), "duration", "99"),
        ];
        let history = build_history(&entries, "duration", &zone, today, 3);
        let values: Vec<f64> = history.iter().map(|d| d.value).collect();
        assert_eq!(values, vec![30.0, 0.0, 35.0]);
        assert_eq!(history[2].entries, 2);
    }

    #[test]
    fn weeks_start_on_sunday() {
        // 2024-06-13 is a Thursday.
        let first = date(2024, 6, 13);
        let days: Vec<DayValue> = (0..10)
            .map(|i| DayValue {
                date: first + Duration::days(i),
                value: 10.0,
                entries: 1,
                done: 0,
            })
            .collect();
        let weeks = group_into_weeks(&days);
        assert_eq!(weeks.len(), 2);
        assert_eq!(weeks[0].days.len(), 3);
        assert_eq!(weeks[0].start.weekday(), Weekday::Sun);
        assert_eq!(weeks[1].start, date(2024, 6, 16));
        assert_eq!(weeks[1].days.len(), 7);
        assert_eq!(weeks[1].value, 70.0);
    }

    #[test]
    fn weekly_rows_carry_week_satisfaction() {
        let sunday = date(2024, 6, 2);
        let mut days: Vec<DayValue> = (0..14)
            .map(|i| DayValue::empty(sunday + Duration::days(i)))
            .collect();
        for day in days.iter_mut().take(7) {
            day.value = 10.0;
            day.entries = 1;
        }
        let rule = Rule::new(Operator::Gt, Some(60.0));

        let rows = history_rows(&days, &rule, Interval::Week);
        assert_eq!(rows.len(), 14);
        assert!(rows[..7].iter().all(|r| r.satisfied));
        assert!(rows[7..].iter().all(|r| !r.satisfied));

        let weekly = blocks(&days, &rule, Interval::Week);
        assert_eq!(weekly.len(), 2);
        match &weekly[0] {
            Block::Week(week) => {
                assert_eq!(week.count, 70.0);
                assert!(week.satisfied);
                assert_eq!(week.days.len(), 7);
            }
            Block::Day(_) => panic!("expected week block"),
        }
    }

    #[test]
    fn exists_rows_count_done_entries() {
        let zone = DayZone::utc();
        let today = date(2024, 6, 15);
        let entries = vec![
            entry(&zone, today, "completed", "done"),
            entry(&zone, today, "completed", "done"),
            entry(&zone, today, "completed", ""),
            entry(&zone, today - Duration::days(1), "completed", ""),
        ];
        let days = build_history(&entries, "completed", &zone, today, 2);
        let rows = history_rows(&days, &Rule::exists(), Interval::Day);
        assert_eq!(rows[0].count, 0.0);
        assert!(!rows[0].satisfied);
        assert_eq!(rows[1].count, 2.0);
        assert_eq!(rows[1].entries, 3);
        assert!(rows[1].satisfied);
    }

    #[test]
    fn history_serializes_iso_dates() {
        let row = HistoryDay {
            date: date(2024, 6, 15),
            count: 3.0,
            entries: 1,
            satisfied: true,
        };
        let json = serde_json::to_value(Block::Day(row)).unwrap();
        assert_eq!(json["date"], "2024-06-15");
        assert_eq!(json["count"], 3.0);
    }
}
