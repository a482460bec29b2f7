use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::Measured;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Gt,
    Lt,
    Eq,
    Exists,
    /// Anything we don't recognise. Never satisfied.
    Unknown,
}

impl Operator {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "gt" => Self::Gt,
            "lt" => Self::Lt,
            "eq" => Self::Eq,
            "exists" => Self::Exists,
            _ => Self::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gt => "gt",
            Self::Lt => "lt",
            Self::Eq => "eq",
            Self::Exists => "exists",
            Self::Unknown => "unknown",
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Self::Gt | Self::Lt | Self::Eq)
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Operator {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Operator {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Self::parse(&raw))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    pub operator: Operator,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
}

impl Rule {
    pub fn new(operator: Operator, value: Option<f64>) -> Self {
        Self { operator, value }
    }

    pub fn exists() -> Self {
        Self::new(Operator::Exists, None)
    }

    /// Compare an aggregated number against the threshold.
    ///
    /// `eq` is exact float equality. `exists` and unknown operators never
    /// match a bare number; see [`Rule::satisfied_by`].
    pub fn evaluate(&self, value: f64) -> bool {
        let Some(threshold) = self.value else {
            return false;
        };
        match self.operator {
            Operator::Gt => value > threshold,
            Operator::Lt => value < threshold,
            Operator::Eq => value == threshold,
            Operator::Exists | Operator::Unknown => false,
        }
    }

    /// Whether a day or week bucket counts toward a streak.
    ///
    /// Empty buckets never count. `exists` looks at the raw `"done"` flag
    /// instead of the summed value.
    pub fn satisfied_by<M: Measured>(&self, period: &M) -> bool {
        if period.entries() == 0 {
            return false;
        }
        match self.operator {
            Operator::Exists => period.done(),
            _ => self.evaluate(period.value()),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::engine::DayValue;

    fn day(value: f64, entries: usize, done: usize) -> DayValue {
        DayValue {
            date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            value,
            entries,
            done,
        }
    }

    #[test]
    fn numeric_operators() {
        assert!(Rule::new(Operator::Gt, Some(20.0)).evaluate(25.0));
        assert!(!Rule::new(Operator::Gt, Some(20.0)).evaluate(20.0));
        assert!(Rule::new(Operator::Lt, Some(2000.0)).evaluate(1800.0));
        assert!(!Rule::new(Operator::Lt, Some(2000.0)).evaluate(2000.0));
        assert!(Rule::new(Operator::Eq, Some(8.0)).evaluate(8.0));
    }

    #[test]
    fn eq_has_no_tolerance() {
        let rule = Rule::new(Operator::Eq, Some(30.0));
        assert!(!rule.evaluate(29.999999));
        assert!(!rule.evaluate(30.000001));
        assert!(rule.evaluate(30.0));
    }

    #[test]
    fn missing_threshold_never_matches() {
        assert!(!Rule::new(Operator::Gt, None).evaluate(100.0));
        assert!(!Rule::new(Operator::Eq, None).evaluate(0.0));
    }

    #[test]
    fn unknown_operator_is_false() {
        let rule: Rule = serde_json::from_str(r#"{"operator":"between","value":3}"#).unwrap();
        assert_eq!(rule.operator, Operator::Unknown);
        assert!(!rule.evaluate(3.0));
        assert!(!rule.satisfied_by(&day(3.0, 1, 1)));
    }

    #[test]
    fn exists_uses_done_flag_not_value() {
        let rule = Rule::exists();
        assert!(!rule.evaluate(1.0));
        assert!(rule.satisfied_by(&day(0.0, 3, 1)));
        assert!(!rule.satisfied_by(&day(5.0, 3, 0)));
    }

    #[test]
    fn empty_bucket_never_counts() {
        let lt = Rule::new(Operator::Lt, Some(10.0));
        assert!(!lt.satisfied_by(&day(0.0, 0, 0)));
        assert!(lt.satisfied_by(&day(0.0, 1, 0)));
    }

    #[test]
    fn operator_serializes_lowercase() {
        let json = serde_json::to_string(&Rule::new(Operator::Gt, Some(20.0))).unwrap();
        assert_eq!(json, r#"{"operator":"gt","value":20.0}"#);
        assert_eq!(Operator::parse(" EXISTS "), Operator::Exists);
    }
}
