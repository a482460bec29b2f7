use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidationError};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub unit: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub presets: Option<Vec<String>>,
}

impl FieldSpec {
    pub fn new(unit: &str, presets: &[&str]) -> Self {
        Self {
            unit: unit.to_string(),
            presets: if presets.is_empty() {
                None
            } else {
                Some(presets.iter().map(|p| p.to_string()).collect())
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogType {
    pub id: Uuid,
    pub user_id: String,
    pub name: String,
    pub icon_id: Option<String>,
    /// Keyed by field name, so names are unique per log type.
    pub fields: BTreeMap<String, FieldSpec>,
    pub created_at: DateTime<Utc>,
}

impl LogType {
    pub fn has_field(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateLogTypeRequest {
    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    pub name: String,
    pub icon_id: Option<String>,
    #[validate(custom = "validate_fields")]
    #[serde(default)]
    pub fields: BTreeMap<String, FieldSpec>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateLogTypeRequest {
    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    pub name: Option<String>,
    pub icon_id: Option<String>,
    #[validate(custom = "validate_fields")]
    pub fields: Option<BTreeMap<String, FieldSpec>>,
}

fn validate_fields(fields: &BTreeMap<String, FieldSpec>) -> Result<(), ValidationError> {
    for (name, spec) in fields {
        if name.trim().is_empty() {
            return Err(ValidationError::new("empty_field_name"));
        }
        if spec.unit.trim().is_empty() {
            return Err(ValidationError::new("empty_field_unit"));
        }
    }
    Ok(())
}

/// Starter catalogue seeded by `POST /api/log-types/defaults`.
pub fn default_catalogue() -> Vec<(&'static str, BTreeMap<String, FieldSpec>)> {
    fn fields(list: &[(&str, FieldSpec)]) -> BTreeMap<String, FieldSpec> {
        list.iter()
            .map(|(name, spec)| (name.to_string(), spec.clone()))
            .collect()
    }

    vec![
        (
            "Exercise",
            fields(&[
                ("duration", FieldSpec::new("minutes", &["15", "30", "45", "60", "90"])),
                ("distance", FieldSpec::new("km", &["1", "2", "3", "5", "10"])),
                ("calories", FieldSpec::new("kcal", &["100", "200", "300", "500"])),
            ]),
        ),
        (
            "Weight Training",
            fields(&[
                ("sets", FieldSpec::new("sets", &["3", "4", "5"])),
                ("reps", FieldSpec::new("reps", &["8", "10", "12", "15"])),
                ("weight", FieldSpec::new("kg", &["5", "10", "15", "20", "25", "30"])),
            ]),
        ),
        (
            "Food",
            fields(&[
                ("calories", FieldSpec::new("kcal", &["300", "500", "700", "1000"])),
                ("protein", FieldSpec::new("g", &["20", "30", "40", "50"])),
                ("carbs", FieldSpec::new("g", &["30", "50", "75", "100"])),
                ("fat", FieldSpec::new("g", &["10", "20", "30", "40"])),
            ]),
        ),
        (
            "Sleep",
            fields(&[
                ("duration", FieldSpec::new("hours", &["6", "7", "8", "9"])),
                ("quality", FieldSpec::new("rating", &["1", "2", "3", "4", "5"])),
            ]),
        ),
        (
            "Water",
            fields(&[("amount", FieldSpec::new("ml", &["250", "500", "750", "1000"]))]),
        ),
        (
            "Meditation",
            fields(&[
                ("duration", FieldSpec::new("minutes", &["5", "10", "15", "20", "30"])),
                ("completed", FieldSpec::new("boolean", &[])),
            ]),
        ),
        (
            "Reading",
            fields(&[
                ("duration", FieldSpec::new("minutes", &["15", "30", "45", "60"])),
                ("pages", FieldSpec::new("pages", &["10", "25", "50", "100"])),
            ]),
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalogue_has_seven_types_with_units() {
        let catalogue = default_catalogue();
        assert_eq!(catalogue.len(), 7);
        let (_, meditation) = catalogue
            .iter()
            .find(|(name, _)| *name == "Meditation")
            .unwrap();
        assert_eq!(meditation["completed"].unit, "boolean");
        assert!(meditation["completed"].presets.is_none());
    }

    #[test]
    fn rejects_blank_field_names() {
        let mut fields = BTreeMap::new();
        fields.insert("  ".to_string(), FieldSpec::new("minutes", &[]));
        let req = CreateLogTypeRequest {
            name: "Exercise".into(),
            icon_id: None,
            fields,
        };
        assert!(req.validate().is_err());
    }

    #[test]
    fn field_spec_presets_round_trip_through_json() {
        let spec: FieldSpec = serde_json::from_str(r#"{"unit":"km"}"#).unwrap();
        assert_eq!(spec.presets, None);
        let json = serde_json::to_value(FieldSpec::new("km", &["1", "5"])).unwrap();
        assert_eq!(json["presets"], serde_json::json!(["1", "5"]));
    }
}
