//! # Built-in Rules
//!
//! Registered as factories by [`register_builtins`], so a custom function
//! or cross-field registration under the same name shadows them.
//!
//! | Rule | Parameter | Passes when |
//! |------|-----------|-------------|
//! | `required` | none | value is not null, `""`, `0`, the zero timestamp, or an empty collection (`false` passes) |
//! | `min` | number | number ≥ bound; string/array/object length ≥ bound |
//! | `max` | number | number ≤ bound; string/array/object length ≤ bound |
//! | `length` | integer | string/array/object length = bound |
//! | `email` | none | string is a structurally valid address |
//! | `alpha` | none | string is non-empty ASCII letters |
//! | `alphanum` | none | string is non-empty ASCII letters and digits |
//!
//! Every rule except `required` passes on null, so optional fields that are
//! unset are only checked by `required`. String lengths count characters.
//!
//! [`register_cross_field_rules`] adds the opt-in sibling comparisons
//! `eqfield`, `nefield`, `gtfield`, and `ltfield`.

use std::cmp::Ordering;
use std::sync::Arc;

use serde_json::Value;
use vetta_core::{timestamp, ConfigurationError};
use vetta_schema::{FieldKind, RuleParams};

use crate::registry::{RecordView, Registry, Validator, Violation};

/// Register the default rules on `registry`.
pub fn register_builtins(registry: &Registry) {
    let factories: [(&str, fn(&RuleParams) -> Result<Arc<dyn Validator>, ConfigurationError>); 7] = [
        ("required", |_| Ok(Arc::new(Required))),
        ("min", |p| Ok(Arc::new(Bound::new(BoundKind::Min, p)?))),
        ("max", |p| Ok(Arc::new(Bound::new(BoundKind::Max, p)?))),
        ("length", |p| Ok(Arc::new(Length::new(p)?))),
        ("email", |_| Ok(Arc::new(Email))),
        ("alpha", |_| Ok(Arc::new(CharClass::Alpha))),
        ("alphanum", |_| Ok(Arc::new(CharClass::Alphanum))),
    ];
    for (name, factory) in factories {
        if let Err(e) = registry.register(name, factory) {
            tracing::warn!(rule = name, error = %e, "failed to register built-in rule");
        }
    }
}

/// Register `eqfield`, `nefield`, `gtfield`, and `ltfield` on `registry`.
///
/// Each takes the sibling field name as its value: `eqfield=password`.
///
/// # Errors
///
/// Propagates registration failures.
pub fn register_cross_field_rules(registry: &Registry) -> Result<(), ConfigurationError> {
    registry.register_cross_field("eqfield", |v, r, p| compare_sibling(v, r, p, Comparison::Eq))?;
    registry.register_cross_field("nefield", |v, r, p| compare_sibling(v, r, p, Comparison::Ne))?;
    registry.register_cross_field("gtfield", |v, r, p| compare_sibling(v, r, p, Comparison::Gt))?;
    registry.register_cross_field("ltfield", |v, r, p| compare_sibling(v, r, p, Comparison::Lt))?;
    Ok(())
}

// ---------------------------------------------------------------------------
// required
// ---------------------------------------------------------------------------

struct Required;

impl Validator for Required {
    fn name(&self) -> &str {
        "required"
    }

    fn validate(&self, value: &Value) -> Result<(), Violation> {
        let missing = match value {
            Value::Null => true,
            Value::Bool(_) => false,
            Value::Number(n) => n.as_f64() == Some(0.0),
            Value::String(s) => s.is_empty(),
            Value::Array(items) => items.is_empty(),
            Value::Object(entries) => entries.is_empty(),
        };
        if missing {
            Err(Violation::new("is required"))
        } else {
            Ok(())
        }
    }

    fn validate_in(&self, value: &Value, record: &RecordView<'_>) -> Result<(), Violation> {
        if matches!(record.field_kind(), Some(FieldKind::Timestamp)) && is_zero_timestamp(value) {
            return Err(Violation::new("is required"));
        }
        self.validate(value)
    }
}

/// A non-optional timestamp left unset is coerced to the zero instant.
fn is_zero_timestamp(value: &Value) -> bool {
    value
        .as_str()
        .and_then(|s| timestamp::parse_timestamp(s).ok())
        .is_some_and(|t| t == timestamp::zero_timestamp())
}

// ---------------------------------------------------------------------------
// min / max / length
// ---------------------------------------------------------------------------

/// What a size rule measures on a value.
enum Measure {
    Number(f64),
    Chars(usize),
    Items(usize),
}

fn measure(value: &Value) -> Option<Measure> {
    match value {
        Value::Number(n) => n.as_f64().map(Measure::Number),
        Value::String(s) => Some(Measure::Chars(s.chars().count())),
        Value::Array(items) => Some(Measure::Items(items.len())),
        Value::Object(entries) => Some(Measure::Items(entries.len())),
        Value::Null | Value::Bool(_) => None,
    }
}

fn required_param<T: std::str::FromStr>(rule: &str, params: &RuleParams) -> Result<T, ConfigurationError>
where
    T::Err: std::fmt::Display,
{
    match params.parse_value::<T>() {
        Some(Ok(v)) => Ok(v),
        Some(Err(e)) => Err(ConfigurationError::InvalidRuleParameter {
            rule: rule.to_string(),
            reason: e.to_string(),
        }),
        None => Err(ConfigurationError::InvalidRuleParameter {
            rule: rule.to_string(),
            reason: "a value is required".to_string(),
        }),
    }
}

fn not_applicable(rule: &str, value: &Value) -> Violation {
    let what = match value {
        Value::Bool(_) => "booleans",
        Value::Number(_) => "numbers",
        _ => "values of this kind",
    };
    Violation::new(format!("{rule} does not apply to {what}"))
}

#[derive(Clone, Copy)]
enum BoundKind {
    Min,
    Max,
}

struct Bound {
    kind: BoundKind,
    bound: f64,
}

impl Bound {
    fn new(kind: BoundKind, params: &RuleParams) -> Result<Self, ConfigurationError> {
        let bound: f64 = required_param(kind.rule(), params)?;
        if !bound.is_finite() {
            return Err(ConfigurationError::InvalidRuleParameter {
                rule: kind.rule().to_string(),
                reason: "bound must be finite".to_string(),
            });
        }
        Ok(Self { kind, bound })
    }
}

impl BoundKind {
    fn rule(self) -> &'static str {
        match self {
            Self::Min => "min",
            Self::Max => "max",
        }
    }

    fn word(self) -> &'static str {
        match self {
            Self::Min => "at least",
            Self::Max => "at most",
        }
    }

    fn holds(self, actual: f64, bound: f64) -> bool {
        match self {
            Self::Min => actual >= bound,
            Self::Max => actual <= bound,
        }
    }
}

impl Validator for Bound {
    fn name(&self) -> &str {
        self.kind.rule()
    }

    fn validate(&self, value: &Value) -> Result<(), Violation> {
        if value.is_null() {
            return Ok(());
        }
        let (actual, message) = match measure(value) {
            Some(Measure::Number(n)) => (n, format!("must be {} {}", self.kind.word(), self.bound)),
            Some(Measure::Chars(n)) => (
                n as f64,
                format!("must be {} {} characters long", self.kind.word(), self.bound),
            ),
            Some(Measure::Items(n)) => (
                n as f64,
                format!("must contain {} {} items", self.kind.word(), self.bound),
            ),
            None => return Err(not_applicable(self.kind.rule(), value)),
        };
        if self.kind.holds(actual, self.bound) {
            Ok(())
        } else {
            Err(Violation::new(message)
                .with_detail(self.kind.rule(), self.bound)
                .with_detail("actual", actual))
        }
    }
}

struct Length {
    expected: usize,
}

impl Length {
    fn new(params: &RuleParams) -> Result<Self, ConfigurationError> {
        Ok(Self {
            expected: required_param("length", params)?,
        })
    }
}

impl Validator for Length {
    fn name(&self) -> &str {
        "length"
    }

    fn validate(&self, value: &Value) -> Result<(), Violation> {
        let (actual, message) = match measure(value) {
            _ if value.is_null() => return Ok(()),
            Some(Measure::Chars(n)) => (n, format!("must be exactly {} characters long", self.expected)),
            Some(Measure::Items(n)) => (n, format!("must contain exactly {} items", self.expected)),
            _ => return Err(not_applicable("length", value)),
        };
        if actual == self.expected {
            Ok(())
        } else {
            Err(Violation::new(message)
                .with_detail("length", self.expected)
                .with_detail("actual", actual))
        }
    }
}

// ---------------------------------------------------------------------------
// email / alpha / alphanum
// ---------------------------------------------------------------------------

struct Email;

/// Structural address check: one `@`, non-empty local part and domain, no
/// leading, trailing, or consecutive dots, and a dotted domain.
pub fn is_valid_email(address: &str) -> bool {
    let Some((local, domain)) = address.split_once('@') else {
        return false;
    };
    let well_dotted = |part: &str| {
        !part.is_empty() && !part.starts_with('.') && !part.ends_with('.') && !part.contains("..")
    };
    !domain.contains('@')
        && !address.chars().any(char::is_whitespace)
        && well_dotted(local)
        && well_dotted(domain)
        && domain.contains('.')
}

impl Validator for Email {
    fn name(&self) -> &str {
        "email"
    }

    fn validate(&self, value: &Value) -> Result<(), Violation> {
        match value {
            Value::Null => Ok(()),
            Value::String(s) if is_valid_email(s) => Ok(()),
            Value::String(_) => Err(Violation::new("must be a valid email address")),
            _ => Err(Violation::new("must be a string")),
        }
    }
}

#[derive(Clone, Copy)]
enum CharClass {
    Alpha,
    Alphanum,
}

impl Validator for CharClass {
    fn name(&self) -> &str {
        match self {
            Self::Alpha => "alpha",
            Self::Alphanum => "alphanum",
        }
    }

    fn validate(&self, value: &Value) -> Result<(), Violation> {
        let s = match value {
            Value::Null => return Ok(()),
            Value::String(s) => s,
            _ => return Err(Violation::new("must be a string")),
        };
        let (ok, message) = match self {
            Self::Alpha => (s.chars().all(|c| c.is_ascii_alphabetic()), "must contain only letters"),
            Self::Alphanum => (
                s.chars().all(|c| c.is_ascii_alphanumeric()),
                "must contain only letters and digits",
            ),
        };
        if ok && !s.is_empty() {
            Ok(())
        } else {
            Err(Violation::new(message))
        }
    }
}

// ---------------------------------------------------------------------------
// Cross-field comparisons
// ---------------------------------------------------------------------------

#[derive(Clone, Copy)]
enum Comparison {
    Eq,
    Ne,
    Gt,
    Lt,
}

/// Order two values: numbers numerically, timestamps chronologically,
/// other strings lexically.
fn order(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => {
            match (timestamp::parse_timestamp(x), timestamp::parse_timestamp(y)) {
                (Ok(tx), Ok(ty)) => Some(tx.cmp(&ty)),
                _ => Some(x.cmp(y)),
            }
        }
        _ => None,
    }
}

fn compare_sibling(
    value: &Value,
    record: &RecordView<'_>,
    params: &RuleParams,
    comparison: Comparison,
) -> Result<(), Violation> {
    let Some(other_name) = params.value() else {
        return Err(Violation::new("comparison rule needs a sibling field name"));
    };
    let other = record.field(other_name).unwrap_or(&Value::Null);
    let (ok, relation) = match comparison {
        Comparison::Eq => (value == other, "equal"),
        Comparison::Ne => (value != other, "differ from"),
        Comparison::Gt => (order(value, other) == Some(Ordering::Greater), "be greater than"),
        Comparison::Lt => (order(value, other) == Some(Ordering::Less), "be less than"),
    };
    if ok {
        Ok(())
    } else {
        Err(Violation::new(format!("must {relation} {other_name}")).with_detail("field", other_name))
    }
}
