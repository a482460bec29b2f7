use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::engine::{Interval, Operator, Rule};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackerKind {
    /// Numeric rule summed across one or more log types.
    Habit,
    /// Single log type with an explicit field/operator rule.
    Streak,
}

impl TrackerKind {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "habit" => Some(Self::Habit),
            "streak" => Some(Self::Streak),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Habit => "habit",
            Self::Streak => "streak",
        }
    }
}

/// Saved consistency rule. Holds no computed state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tracker {
    pub id: Uuid,
    pub user_id: String,
    pub name: String,
    pub kind: TrackerKind,
    /// Empty means every log type of the owner.
    pub log_type_ids: Vec<Uuid>,
    pub field: String,
    pub unit: Option<String>,
    pub rule: Rule,
    pub interval: Interval,
    pub icon_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Tracker {
    pub fn from_new(user_id: &str, new: NewTracker) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            name: new.name,
            kind: new.kind,
            log_type_ids: new.log_type_ids,
            field: new.field,
            unit: new.unit,
            rule: new.rule,
            interval: new.interval,
            icon_id: new.icon_id,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn apply(&mut self, new: NewTracker) {
        self.name = new.name;
        self.kind = new.kind;
        self.log_type_ids = new.log_type_ids;
        self.field = new.field;
        self.unit = new.unit;
        self.rule = new.rule;
        self.interval = new.interval;
        self.icon_id = new.icon_id;
        self.updated_at = Utc::now();
    }
}

/// Common shape both request adapters are converted into.
#[derive(Debug, Clone)]
pub struct NewTracker {
    pub name: String,
    pub kind: TrackerKind,
    pub log_type_ids: Vec<Uuid>,
    pub field: String,
    pub unit: Option<String>,
    pub rule: Rule,
    pub interval: Interval,
    pub icon_id: Option<String>,
}

/// Numeric threshold used by habit trackers (`gt`, `lt` or `eq`).
#[derive(Debug, Clone, Deserialize)]
pub struct NumericRule {
    pub operator: Operator,
    pub value: f64,
}

/// POST /api/habits, PUT /api/habits/:id
#[derive(Debug, Deserialize, Validate)]
pub struct HabitRequest {
    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    pub name: String,
    #[validate(length(min = 1, max = 32, message = "Unit must be 1-32 characters"))]
    pub unit: String,
    #[validate(length(min = 1, message = "At least one log type is required"))]
    pub log_type_ids: Vec<Uuid>,
    #[validate(length(min = 1, max = 64, message = "Field must be 1-64 characters"))]
    pub field: String,
    #[serde(default)]
    pub interval: Interval,
    pub rule: NumericRule,
    pub icon_id: Option<String>,
}

impl HabitRequest {
    pub fn into_new_tracker(self) -> Result<NewTracker, String> {
        if !self.rule.operator.is_numeric() {
            return Err(format!(
                "Habit rules must use gt, lt or eq (got {})",
                self.rule.operator
            ));
        }
        if !self.rule.value.is_finite() {
            return Err("Rule value must be a finite number".into());
        }
        Ok(NewTracker {
            name: self.name,
            kind: TrackerKind::Habit,
            log_type_ids: dedup(self.log_type_ids),
            field: self.field,
            unit: Some(self.unit),
            rule: Rule::new(self.rule.operator, Some(self.rule.value)),
            interval: self.interval,
            icon_id: self.icon_id,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StreakRule {
    pub field: String,
    pub operator: Operator,
    pub value: Option<f64>,
}

/// POST /api/streaks
#[derive(Debug, Deserialize, Validate)]
pub struct StreakRequest {
    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    pub name: String,
    pub log_type_id: Uuid,
    #[serde(default)]
    pub interval: Interval,
    pub rule: StreakRule,
    pub icon_id: Option<String>,
}

impl StreakRequest {
    pub fn into_new_tracker(self) -> Result<NewTracker, String> {
        let StreakRule {
            field,
            operator,
            value,
        } = self.rule;
        if field.trim().is_empty() {
            return Err("Rule field is required".into());
        }
        let value = match operator {
            Operator::Exists => None,
            Operator::Unknown => return Err("Unknown rule operator".into()),
            _ => match value {
                Some(v) if v.is_finite() => Some(v),
                _ => return Err(format!("Rule operator {operator} needs a numeric value")),
            },
        };
        Ok(NewTracker {
            name: self.name,
            kind: TrackerKind::Streak,
            log_type_ids: vec![self.log_type_id],
            field,
            unit: None,
            rule: Rule::new(operator, value),
            interval: self.interval,
            icon_id: self.icon_id,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub days: Option<usize>,
}

/// Default history length: four weeks of days, seven weeks for weekly trackers.
pub fn default_history_days(interval: Interval) -> usize {
    match interval {
        Interval::Day => 28,
        Interval::Week => 49,
    }
}

fn dedup(ids: Vec<Uuid>) -> Vec<Uuid> {
    let mut out: Vec<Uuid> = Vec::with_capacity(ids.len());
    for id in ids {
        if !out.contains(&id) {
            out.push(id);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn habit_request_dedups_sources_and_rejects_exists() {
        let id = Uuid::new_v4();
        let req: HabitRequest = serde_json::from_value(serde_json::json!({
            "name": "Move",
            "unit": "minutes",
            "log_type_ids": [id, id],
            "field": "duration",
            "rule": { "operator": "gt", "value": 30 }
        }))
        .unwrap();
        let new = req.into_new_tracker().unwrap();
        assert_eq!(new.log_type_ids, vec![id]);
        assert_eq!(new.interval, Interval::Day);
        assert_eq!(new.rule, Rule::new(Operator::Gt, Some(30.0)));

        let req: HabitRequest = serde_json::from_value(serde_json::json!({
            "name": "Move",
            "unit": "minutes",
            "log_type_ids": [id],
            "field": "duration",
            "rule": { "operator": "exists", "value": 1 }
        }))
        .unwrap();
        assert!(req.into_new_tracker().is_err());
    }

    #[test]
    fn streak_request_requires_value_for_numeric_rules() {
        let req: StreakRequest = serde_json::from_value(serde_json::json!({
            "name": "Meditate",
            "log_type_id": Uuid::new_v4(),
            "interval": "week",
            "rule": { "field": "duration", "operator": "gt" }
        }))
        .unwrap();
        assert!(req.into_new_tracker().is_err());

        let req: Result<StreakRequest, _> = serde_json::from_value(serde_json::json!({
            "name": "Meditate",
            "log_type_id": Uuid::new_v4(),
            "rule": { "field": "completed", "operator": "exists", "value": "ignored" }
        }));
        // Non-numeric `value` is not accepted by the schema.
        assert!(req.is_err());

        let req: StreakRequest = serde_json::from_value(serde_json::json!({
            "name": "Meditate",
            "log_type_id": Uuid::new_v4(),
            "rule": { "field": "completed", "operator": "exists" }
        }))
        .unwrap();
        let new = req.into_new_tracker().unwrap();
        assert_eq!(new.rule, Rule::exists());
        assert_eq!(new.kind, TrackerKind::Streak);
    }
}
