use std::collections::BTreeMap;
use std::str::FromStr;

use chrono::{DateTime, Duration, FixedOffset, Local, NaiveDate, NaiveDateTime, NaiveTime, Offset, TimeZone, Utc};

use crate::models::log_entry::{LogEntry, TimeRange};

/// Which clock defines where a calendar day starts and ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DayZone {
    /// Local zone of the running process.
    Local,
    Fixed(FixedOffset),
}

impl Default for DayZone {
    fn default() -> Self {
        Self::Local
    }
}

impl DayZone {
    pub fn utc() -> Self {
        Self::Fixed(Utc.fix())
    }

    pub fn date_of(&self, timestamp_ms: i64) -> Option<NaiveDate> {
        let instant = DateTime::<Utc>::from_timestamp_millis(timestamp_ms)?;
        Some(self.today(instant))
    }

    pub fn today(&self, now: DateTime<Utc>) -> NaiveDate {
        match self {
            Self::Local => now.with_timezone(&Local).date_naive(),
            Self::Fixed(offset) => now.with_timezone(offset).date_naive(),
        }
    }

    /// Epoch millis of `00:00:00.000` on `date` in this zone. `None` when
    /// that instant falls outside chrono's range.
    pub fn start_of_day(&self, date: NaiveDate) -> Option<i64> {
        let midnight = date.and_time(NaiveTime::MIN);
        match self {
            Self::Local => Some(local_midnight_millis(midnight)),
            Self::Fixed(offset) => midnight
                .checked_sub_signed(Duration::seconds(offset.local_minus_utc() as i64))
                .map(|utc| utc.and_utc().timestamp_millis()),
        }
    }

    /// `[start of first, start of the day after last)`, or `None` at the
    /// edges of the representable calendar.
    pub fn window(&self, first: NaiveDate, last: NaiveDate) -> Option<TimeRange> {
        Some(TimeRange::new(
            self.start_of_day(first)?,
            self.start_of_day(last.succ_opt()?)?,
        ))
    }
}

// Midnight can fall in a DST gap; the day then starts at the first valid
// instant after it.
fn local_midnight_millis(midnight: NaiveDateTime) -> i64 {
    if let Some(dt) = Local.from_local_datetime(&midnight).earliest() {
        return dt.timestamp_millis();
    }
    midnight
        .checked_add_signed(Duration::hours(1))
        .and_then(|shifted| Local.from_local_datetime(&shifted).earliest())
        .map(|dt| dt.timestamp_millis())
        .unwrap_or_else(|| midnight.and_utc().timestamp_millis())
}

impl FromStr for DayZone {
    type Err = String;

    /// Accepts `local`, `utc`, `z`, `+HH:MM`, `-HHMM` and `+HH`.
    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let s = raw.trim();
        if s.eq_ignore_ascii_case("local") {
            return Ok(Self::Local);
        }
        if s.eq_ignore_ascii_case("utc") || s.eq_ignore_ascii_case("z") {
            return Ok(Self::utc());
        }

        let (sign, rest) = match s.as_bytes().first() {
            Some(b'+') => (1, &s[1..]),
            Some(b'-') => (-1, &s[1..]),
            _ => return Err(format!("unrecognised day zone '{raw}'")),
        };
        let digits: String = rest.chars().filter(|c| *c != ':').collect();
        if !digits.chars().all(|c| c.is_ascii_digit()) || !matches!(digits.len(), 2 | 4) {
            return Err(format!("unrecognised day zone '{raw}'"));
        }
        let hours: i32 = digits[..2].parse().map_err(|_| format!("bad hours in '{raw}'"))?;
        let minutes: i32 = if digits.len() == 4 {
            digits[2..].parse().map_err(|_| format!("bad minutes in '{raw}'"))?
        } else {
            0
        };
        if minutes >= 60 {
            return Err(format!("bad minutes in '{raw}'"));
        }

        FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
            .map(Self::Fixed)
            .ok_or_else(|| format!("offset out of range in '{raw}'"))
    }
}

/// Entries that fall on one local calendar day.
#[derive(Debug, Clone)]
pub struct DayBucket<'a> {
    pub date: NaiveDate,
    pub entries: Vec<&'a LogEntry>,
}

/// Group entries inside `window` by local calendar day, oldest first.
///
/// Only days that have at least one entry are returned.
pub fn bucket_by_day<'a>(
    entries: &'a [LogEntry],
    zone: &DayZone,
    window: TimeRange,
) -> Vec<DayBucket<'a>> {
    let mut days: BTreeMap<NaiveDate, Vec<&'a LogEntry>> = BTreeMap::new();
    for entry in entries.iter().filter(|e| window.contains(e.timestamp)) {
        if let Some(date) = zone.date_of(entry.timestamp) {
            days.entry(date).or_default().push(entry);
        }
    }
    days.into_iter()
        .map(|(date, entries)| DayBucket { date, entries })
        .collect()
}
