//! Structured, serializable validation report.
//!
//! One [`FieldReport`] per failing path, in the order the paths first
//! failed, each listing every rule that failed there. Values are redacted
//! before they enter the report.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ValidationError;

/// Every validation failure of one record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ErrorReport {
    /// Total number of rule failures.
    pub error_count: usize,
    /// Failing paths in first-failure order.
    pub fields: Vec<FieldReport>,
}

/// All failures recorded for one field path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldReport {
    /// Dotted path, e.g. `items[0].sku`.
    pub path: String,
    /// Field name.
    pub field: String,
    /// Redacted field value.
    pub value: Value,
    /// Failed rules, in declaration order.
    pub failures: Vec<RuleFailure>,
}

/// One failed rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleFailure {
    /// Rule name.
    pub rule: String,
    /// Human-readable message.
    pub message: String,
    /// Redacted structured context.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub details: BTreeMap<String, Value>,
}

impl ErrorReport {
    /// Build a report from a list of errors.
    pub fn from_errors<'a>(errors: impl IntoIterator<Item = &'a ValidationError>) -> Self {
        let mut report = Self::default();
        let mut slots: HashMap<&'a str, usize> = HashMap::new();
        for err in errors {
            let failure = RuleFailure {
                rule: err.rule.clone(),
                message: err.message.clone(),
                details: err.sanitized_details(),
            };
            report.error_count += 1;
            match slots.get(err.path.as_str()) {
                Some(&i) => report.fields[i].failures.push(failure),
                None => {
                    slots.insert(err.path.as_str(), report.fields.len());
                    report.fields.push(FieldReport {
                        path: err.path.clone(),
                        field: err.field.clone(),
                        value: err.sanitized_value(),
                        failures: vec![failure],
                    });
                }
            }
        }
        report
    }

    /// Returns true if nothing failed.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// The entry for `path`.
    pub fn field(&self, path: &str) -> Option<&FieldReport> {
        self.fields.iter().find(|f| f.path == path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use vetta_core::REDACTED;

    fn err(path: &str, rule: &str, value: Value) -> ValidationError {
        let field = path.rsplit('.').next().unwrap_or(path);
        ValidationError::new(field, path, value, rule, format!("{rule} failed"))
    }

    #[test]
    fn test_groups_by_path_in_first_failure_order() {
        let errors = vec![
            err("name", "min", json!("a")),
            err("age", "min", json!(3)),
            err("name", "alpha", json!("a")),
        ];
        let report = ErrorReport::from_errors(&errors);
        assert_eq!(report.error_count, 3);
        let paths: Vec<_> = report.fields.iter().map(|f| f.path.as_str()).collect();
        assert_eq!(paths, vec!["name", "age"]);
        assert_eq!(report.field("name").unwrap().failures.len(), 2);
    }

    #[test]
    fn test_many_paths_grouped() {
        let errors: Vec<_> = (0..20_000)
            .flat_map(|i| {
                let path = format!("items[{i}].sku");
                [err(&path, "required", json!("")), err(&path, "alphanum", json!(""))]
            })
            .collect();
        let report = ErrorReport::from_errors(&errors);
        assert_eq!(report.error_count, 40_000);
        assert_eq!(report.fields.len(), 20_000);
        assert_eq!(report.fields[19_999].path, "items[19999].sku");
        assert!(report.fields.iter().all(|f| f.failures.len() == 2));
    }

    #[test]
    fn test_values_redacted() {
        let errors = vec![err("auth.password", "min", json!(12345))];
        let report = ErrorReport::from_errors(&errors);
        assert_eq!(report.fields[0].value, json!(REDACTED));
        let text = serde_json::to_string(&report).unwrap();
        assert!(!text.contains("12345"));
    }

    #[test]
    fn test_serde_shape() {
        let report = ErrorReport::from_errors(&[err("age", "min", json!(3))]);
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["error_count"], json!(1));
        assert_eq!(json["fields"][0]["failures"][0]["rule"], json!("min"));
        assert!(json["fields"][0]["failures"][0].get("details").is_none());
        let back: ErrorReport = serde_json::from_value(json).unwrap();
        assert_eq!(back, report);
    }
}
