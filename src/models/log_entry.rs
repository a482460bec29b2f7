use std::collections::BTreeMap;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Raw value stored by boolean-style fields when the activity happened.
pub const DONE: &str = "done";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub id: Uuid,
    pub user_id: String,
    pub type_id: Uuid,
    /// Milliseconds since the Unix epoch (UTC instant).
    pub timestamp: i64,
    pub values: BTreeMap<String, String>,
    pub notes: Option<String>,
}

impl LogEntry {
    pub fn value(&self, field: &str) -> Option<&str> {
        self.values.get(field).map(String::as_str)
    }

    pub fn is_done(&self, field: &str) -> bool {
        self.value(field) == Some(DONE)
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateLogEntryRequest {
    pub type_id: Uuid,
    #[serde(default)]
    pub values: BTreeMap<String, String>,
    #[validate(length(max = 2000, message = "Notes must be at most 2000 characters"))]
    pub notes: Option<String>,
    /// Defaults to the time of the request.
    pub timestamp: Option<i64>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateLogEntryRequest {
    pub values: Option<BTreeMap<String, String>>,
    #[validate(length(max = 2000, message = "Notes must be at most 2000 characters"))]
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ExistingLogQuery {
    pub type_id: Uuid,
    pub timestamp: i64,
}

/// Half-open instant range `[from, to)` in epoch milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    pub from: i64,
    pub to: i64,
}

impl TimeRange {
    pub fn new(from: i64, to: i64) -> Self {
        Self { from, to }
    }

    pub fn contains(&self, timestamp: i64) -> bool {
        timestamp >= self.from && timestamp < self.to
    }
}

pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}
