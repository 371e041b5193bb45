//! # Validation Engine
//!
//! Runs every declared rule of every field of a record and collects every
//! failure. Nested records are walked through direct, optional, array, and
//! map fields, with paths like `items[2].sku` and `labels.env`.
//!
//! The engine reads a record as a `serde_json::Value` (its `Serialize`
//! output), so field names in metadata must match the serialized names.

use serde_json::Value;
use vetta_core::{limits, ConfigurationError};
use vetta_schema::{FieldKind, RecordMeta};

use crate::error::{ValidationError, ValidationErrors};
use crate::registry::{RecordView, Registry};

/// Rule name attached to errors for records nested too deeply to walk.
pub const DEPTH_RULE: &str = "max_depth";

/// Walks records and applies their rules through a [`Registry`].
#[derive(Debug, Clone, Copy)]
pub struct ValidationEngine<'r> {
    registry: &'r Registry,
    max_depth: usize,
}

impl<'r> ValidationEngine<'r> {
    /// An engine using `registry` and the process-wide depth limit.
    pub fn new(registry: &'r Registry) -> Self {
        Self {
            registry,
            max_depth: limits::max_validation_depth(),
        }
    }

    /// Override the maximum nesting depth.
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Validate `record` against `meta`.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigurationError` if a declared rule is unknown or its
    /// parameters are unusable. Rule failures are returned in the `Ok`
    /// list, which is empty when the record is valid.
    pub fn validate_record(
        &self,
        meta: &RecordMeta,
        record: &Value,
    ) -> Result<ValidationErrors, ConfigurationError> {
        let mut errors = ValidationErrors::new();
        self.walk_record(meta, record, "", 1, &mut errors)?;
        if !errors.is_empty() {
            tracing::debug!(
                record = meta.name(),
                errors = errors.len(),
                "validation failed"
            );
        }
        Ok(errors)
    }

    fn walk_record(
        &self,
        meta: &RecordMeta,
        record: &Value,
        path: &str,
        depth: usize,
        errors: &mut ValidationErrors,
    ) -> Result<(), ConfigurationError> {
        for field in meta.fields() {
            let value = record.get(field.name()).unwrap_or(&Value::Null);
            let field_path = child_path(path, field.name());
            let view = RecordView::new(record, path, field.name()).with_kind(field.kind());

            for rule in field.rules() {
                let validator = self.registry.create(rule.name(), rule.params())?;
                if let Err(violation) = validator.validate_in(value, &view) {
                    errors.push(
                        ValidationError::new(
                            field.name(),
                            field_path.as_str(),
                            value.clone(),
                            rule.name(),
                            violation.message,
                        )
                        .with_details(violation.details),
                    );
                }
            }

            self.descend(field.kind(), field.name(), value, &field_path, depth, errors)?;
        }
        Ok(())
    }

    fn descend(
        &self,
        kind: &FieldKind,
        field: &str,
        value: &Value,
        path: &str,
        depth: usize,
        errors: &mut ValidationErrors,
    ) -> Result<(), ConfigurationError> {
        if kind.nested_record().is_none() || value.is_null() {
            return Ok(());
        }
        if depth >= self.max_depth {
            errors.push(ValidationError::new(
                field,
                path,
                Value::Null,
                DEPTH_RULE,
                format!("nesting exceeds the maximum depth of {}", self.max_depth),
            ));
            return Ok(());
        }

        match (kind, value) {
            (FieldKind::Record(r), Value::Object(_)) => {
                let meta = r.resolve()?;
                self.walk_record(&meta, value, path, depth + 1, errors)
            }
            (FieldKind::Optional(inner), _) => self.descend(inner, field, value, path, depth, errors),
            (FieldKind::Array(inner), Value::Array(items)) => {
                for (i, item) in items.iter().enumerate() {
                    self.descend(inner, field, item, &format!("{path}[{i}]"), depth + 1, errors)?;
                }
                Ok(())
            }
            (FieldKind::Map(inner), Value::Object(entries)) => {
                for (key, item) in entries {
                    self.descend(inner, field, item, &child_path(path, key), depth + 1, errors)?;
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }
}

fn child_path(parent: &str, key: &str) -> String {
    if parent.is_empty() {
        key.to_string()
    } else {
        format!("{parent}.{key}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtin::register_cross_field_rules;
    use serde_json::json;
    use vetta_schema::RecordMeta;

    fn user_meta() -> RecordMeta {
        let mut b = RecordMeta::builder("User");
        b.field("id", FieldKind::I64).validate("required,min=1");
        b.field("username", FieldKind::String).validate("required,min=3,max=50");
        b.field("email", FieldKind::String).validate("required,email");
        b.field("age", FieldKind::U8).validate("min=18");
        b.field("name", FieldKind::String).validate("alpha");
        b.build().unwrap()
    }

    #[test]
    fn test_all_failures_reported() {
        let registry = Registry::with_builtins();
        let errors = ValidationEngine::new(&registry)
            .validate_record(
                &user_meta(),
                &json!({"id":0,"username":"ab","email":"invalid","age":15,"name":"John123"}),
            )
            .unwrap();
        let fields: Vec<_> = errors.group_by_field().into_keys().collect();
        assert_eq!(fields, vec!["age", "email", "id", "name", "username"]);
        // id fails both required (zero) and min.
        assert_eq!(errors.len(), 6);
    }

    #[test]
    fn test_valid_record_has_no_errors() {
        let registry = Registry::with_builtins();
        let errors = ValidationEngine::new(&registry)
            .validate_record(
                &user_meta(),
                &json!({"id":1,"username":"abc","email":"a@b.co","age":18,"name":"John"}),
            )
            .unwrap();
        assert!(errors.is_empty());
    }

    #[test]
    fn test_unknown_rule_is_configuration_error() {
        let mut b = RecordMeta::builder("X");
        b.field("a", FieldKind::String).validate("no_such_rule");
        let meta = b.build().unwrap();
        let registry = Registry::with_builtins();
        let err = ValidationEngine::new(&registry)
            .validate_record(&meta, &json!({"a": "x"}))
            .unwrap_err();
        assert_eq!(err, ConfigurationError::UnknownRule("no_such_rule".to_string()));
    }

    fn nested_meta() -> RecordMeta {
        let mut item = RecordMeta::builder("Item");
        item.field("sku", FieldKind::String).validate("required,alphanum");
        let item = std::sync::Arc::new(item.build().unwrap());

        let mut order = RecordMeta::builder("Order");
        order
            .field("items", FieldKind::array(FieldKind::Record(vetta_schema::RecordRef::Dynamic(item.clone()))))
            .validate("min=1");
        order.field(
            "by_region",
            FieldKind::map(FieldKind::Record(vetta_schema::RecordRef::Dynamic(item.clone()))),
        );
        order.field(
            "primary",
            FieldKind::optional(FieldKind::Record(vetta_schema::RecordRef::Dynamic(item))),
        );
        order.build().unwrap()
    }

    #[test]
    fn test_nested_paths() {
        let registry = Registry::with_builtins();
        let errors = ValidationEngine::new(&registry)
            .validate_record(
                &nested_meta(),
                &json!({
                    "items": [{"sku": "ok1"}, {"sku": "bad-sku"}],
                    "by_region": {"eu": {"sku": ""}},
                    "primary": {"sku": "a b"}
                }),
            )
            .unwrap();
        let paths: Vec<_> = errors.iter().map(|e| e.path.as_str()).collect();
        assert_eq!(
            paths,
            vec!["items[1].sku", "by_region.eu.sku", "by_region.eu.sku", "primary.sku"]
        );
    }

    #[test]
    fn test_optional_nested_null_skipped() {
        let registry = Registry::with_builtins();
        let errors = ValidationEngine::new(&registry)
            .validate_record(&nested_meta(), &json!({"items": [{"sku": "a"}], "primary": null}))
            .unwrap();
        assert!(errors.is_empty());
    }

    #[test]
    fn test_depth_limit_reported() {
        let registry = Registry::with_builtins();
        let errors = ValidationEngine::new(&registry)
            .with_max_depth(1)
            .validate_record(&nested_meta(), &json!({"items": [{"sku": "a"}]}))
            .unwrap();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors.errors()[0].rule, DEPTH_RULE);
        assert_eq!(errors.errors()[0].path, "items");
    }

    #[test]
    fn test_cross_field_sees_siblings() {
        let registry = Registry::with_builtins();
        register_cross_field_rules(&registry).unwrap();
        let mut b = RecordMeta::builder("Signup");
        b.field("password", FieldKind::String).validate("required");
        b.field("confirm", FieldKind::String).validate("eqfield=password");
        let meta = b.build().unwrap();

        let engine = ValidationEngine::new(&registry);
        let ok = engine
            .validate_record(&meta, &json!({"password": "pw", "confirm": "pw"}))
            .unwrap();
        assert!(ok.is_empty());

        let bad = engine
            .validate_record(&meta, &json!({"password": "pw", "confirm": "nope"}))
            .unwrap();
        assert_eq!(bad.len(), 1);
        assert_eq!(bad.errors()[0].rule, "eqfield");
        assert_eq!(bad.errors()[0].message, "must equal password");
    }
}
