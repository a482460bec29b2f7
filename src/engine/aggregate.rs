use std::collections::HashSet;

use chrono::NaiveDate;

use super::DayValue;
use crate::models::log_entry::LogEntry;

/// Lenient numeral parsing for stored field values.
///
/// Takes the leading number of the string (`"30min"` is 30); missing,
/// non-numeric and non-finite values are 0.
pub fn parse_number(raw: Option<&str>) -> f64 {
    let Some(raw) = raw else {
        return 0.0;
    };
    let s = raw.trim();
    if let Ok(v) = s.parse::<f64>() {
        return if v.is_finite() { v } else { 0.0 };
    }
    s[..numeric_prefix_len(s)]
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .unwrap_or(0.0)
}

fn numeric_prefix_len(s: &str) -> usize {
    let bytes = s.as_bytes();
    let mut i = usize::from(matches!(bytes.first(), Some(b'+' | b'-')));
    let mut seen_digit = false;
    let mut seen_dot = false;
    while let Some(b) = bytes.get(i) {
        match b {
            b'0'..=b'9' => seen_digit = true,
            b'.' if !seen_dot => seen_dot = true,
            _ => break,
        }
        i += 1;
    }
    if seen_digit {
        i
    } else {
        0
    }
}

/// Sum of the tracked field across one day's entries.
pub fn aggregate_day(entries: &[&LogEntry], field: &str) -> f64 {
    entries
        .iter()
        .map(|entry| parse_number(entry.value(field)))
        .sum()
}

/// Entries storing the literal `"done"` for the field. A day "exists" when
/// this is non-zero.
pub fn done_count(entries: &[&LogEntry], field: &str) -> usize {
    entries.iter().filter(|entry| entry.is_done(field)).count()
}

pub fn day_value(date: NaiveDate, entries: &[&LogEntry], field: &str) -> DayValue {
    DayValue {
        date,
        value: aggregate_day(entries, field),
        entries: entries.len(),
        done: done_count(entries, field),
    }
}

/// Union of entries read for several log types, first occurrence wins.
pub fn pool_entries<I>(sources: I) -> Vec<LogEntry>
where
    I: IntoIterator<Item = Vec<LogEntry>>,
{
    let mut seen = HashSet::new();
    sources
        .into_iter()
        .flatten()
        .filter(|entry| seen.insert(entry.id))
        .collect()
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use uuid::Uuid;

    use super::*;

    fn entry(field: &str, value: &str) -> LogEntry {
        let mut values = BTreeMap::new();
        values.insert(field.to_string(), value.to_string());
        LogEntry {
            id: Uuid::new_v4(),
            user_id: "u1".into(),
            type_id: Uuid::nil(),
            timestamp: 0,
            values,
            notes: None,
        }
    }

    #[test]
    fn parse_number_is_lenient() {
        assert_eq!(parse_number(Some("25")), 25.0);
        assert_eq!(parse_number(Some(" 2.5 ")), 2.5);
        assert_eq!(parse_number(Some("30min")), 30.0);
        assert_eq!(parse_number(Some("-4")), -4.0);
        assert_eq!(parse_number(Some(".5")), 0.5);
        assert_eq!(parse_number(Some("done")), 0.0);
        assert_eq!(parse_number(Some("")), 0.0);
        assert_eq!(parse_number(Some("NaN")), 0.0);
        assert_eq!(parse_number(Some("inf")), 0.0);
        assert_eq!(parse_number(None), 0.0);
    }

    #[test]
    fn sums_field_and_ignores_other_fields() {
        let a = entry("duration", "25");
        let b = entry("duration", "abc");
        let c = entry("distance", "5");
        let day = [&a, &b, &c];
        assert_eq!(aggregate_day(&day, "duration"), 25.0);
        assert_eq!(aggregate_day(&day, "distance"), 5.0);
        assert_eq!(aggregate_day(&day, "missing"), 0.0);
    }

    #[test]
    fn done_is_exact_match_on_any_entry() {
        let a = entry("completed", "");
        let b = entry("completed", "done");
        let c = entry("completed", "Done");
        assert_eq!(done_count(&[&a, &c], "completed"), 0);
        assert_eq!(done_count(&[&a, &b, &c], "completed"), 1);
    }

    #[test]
    fn unparsable_entry_still_counts_as_present() {
        let a = entry("duration", "lots");
        let date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let day = day_value(date, &[&a], "duration");
        assert_eq!(day.value, 0.0);
        assert_eq!(day.entries, 1);
    }

    #[test]
    fn pooling_dedups_by_id() {
        let a = entry("duration", "10");
        let b = entry("duration", "20");
        let pooled = pool_entries(vec![vec![a.clone(), b.clone()], vec![a.clone()]]);
        assert_eq!(pooled.len(), 2);
    }
}
