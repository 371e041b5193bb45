//! # Validation Errors
//!
//! A [`ValidationError`] is one failed rule on one field. Validation never
//! stops early, so errors travel as a [`ValidationErrors`] list.
//!
//! ## Security Invariant
//!
//! The raw value is kept for programmatic inspection, but every outward
//! rendering (`Serialize`, the report, `to_json`) goes through
//! [`ValidationError::sanitized_value`]. `Display` never includes values.

use std::collections::BTreeMap;
use std::fmt;

use serde::ser::{SerializeStruct, Serializer};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use vetta_core::redact;

use crate::report::ErrorReport;

/// One failed rule on one field.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{path}: {message}")]
pub struct ValidationError {
    /// Field name.
    pub field: String,
    /// Dotted path from the record root.
    pub path: String,
    /// The checked value, unredacted.
    pub value: Value,
    /// Rule name.
    pub rule: String,
    /// Human-readable message.
    pub message: String,
    /// Structured context from the validator.
    pub details: BTreeMap<String, Value>,
}

impl ValidationError {
    /// An error with no details.
    pub fn new(
        field: impl Into<String>,
        path: impl Into<String>,
        value: Value,
        rule: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            field: field.into(),
            path: path.into(),
            value,
            rule: rule.into(),
            message: message.into(),
            details: BTreeMap::new(),
        }
    }

    /// Replace the details.
    pub fn with_details(mut self, details: BTreeMap<String, Value>) -> Self {
        self.details = details;
        self
    }

    /// Returns true if the field matches a sensitive pattern.
    pub fn is_sensitive(&self) -> bool {
        redact::is_sensitive_field(&self.field, &self.path)
    }

    /// The value, or the redaction placeholder for sensitive fields.
    pub fn sanitized_value(&self) -> Value {
        redact::redact_value(&self.field, &self.path, &self.value)
    }

    /// The details, each redacted for sensitive fields.
    pub fn sanitized_details(&self) -> BTreeMap<String, Value> {
        if self.is_sensitive() {
            self.details
                .keys()
                .map(|k| (k.clone(), Value::String(redact::REDACTED.to_string())))
                .collect()
        } else {
            self.details.clone()
        }
    }
}

impl Serialize for ValidationError {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("ValidationError", 6)?;
        s.serialize_field("field", &self.field)?;
        s.serialize_field("path", &self.path)?;
        s.serialize_field("value", &self.sanitized_value())?;
        s.serialize_field("rule", &self.rule)?;
        s.serialize_field("message", &self.message)?;
        s.serialize_field("details", &self.sanitized_details())?;
        s.end()
    }
}

/// Every validation failure of one call, in field order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidationErrors(Vec<ValidationError>);

impl ValidationErrors {
    /// An empty list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one error.
    pub fn push(&mut self, error: ValidationError) {
        self.0.push(error);
    }

    /// The errors in order.
    pub fn errors(&self) -> &[ValidationError] {
        &self.0
    }

    /// Iterate over the errors.
    pub fn iter(&self) -> std::slice::Iter<'_, ValidationError> {
        self.0.iter()
    }

    /// Number of errors.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if nothing failed.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Consume into the underlying list.
    pub fn into_inner(self) -> Vec<ValidationError> {
        self.0
    }

    /// `Ok(())` if empty, otherwise `Err(self)`.
    pub fn into_result(self) -> Result<(), ValidationErrors> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }

    /// Errors keyed by path.
    pub fn group_by_field(&self) -> BTreeMap<String, Vec<&ValidationError>> {
        let mut grouped: BTreeMap<String, Vec<&ValidationError>> = BTreeMap::new();
        for err in &self.0 {
            grouped.entry(err.path.clone()).or_default().push(err);
        }
        grouped
    }

    /// The structured, redacted report.
    pub fn report(&self) -> ErrorReport {
        ErrorReport::from_errors(&self.0)
    }

    /// The report as JSON bytes.
    pub fn to_json(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(&self.report())
    }
}

impl Serialize for ValidationErrors {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.report().serialize(serializer)
    }
}

impl Extend<ValidationError> for ValidationErrors {
    fn extend<I: IntoIterator<Item = ValidationError>>(&mut self, iter: I) {
        self.0.extend(iter);
    }
}

impl FromIterator<ValidationError> for ValidationErrors {
    fn from_iter<I: IntoIterator<Item = ValidationError>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for ValidationErrors {
    type Item = ValidationError;
    type IntoIter = std::vec::IntoIter<ValidationError>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a ValidationErrors {
    type Item = &'a ValidationError;
    type IntoIter = std::slice::Iter<'a, ValidationError>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.as_slice() {
            [] => write!(f, "no validation errors"),
            [only] => write!(f, "{only}"),
            many => {
                write!(f, "multiple errors:")?;
                for err in many {
                    write!(f, "\n  - {err}")?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ValidationErrors {}
