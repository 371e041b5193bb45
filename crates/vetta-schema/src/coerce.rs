//! # Coercion Engine
//!
//! Walks a decoded [`Document`] against a record's [`RecordMeta`] and
//! converts every source value to its field's declared kind.
//!
//! ## Rules
//!
//! | Target | Accepted source values |
//! |--------|------------------------|
//! | bool | boolean; number `0`/`1`; string `true`/`1`/`yes`, `false`/`0`/`no` (any case) |
//! | integer | number with no fractional part; numeric string. Range-checked |
//! | float | number; numeric string (`NaN`, `inf` accepted). Finite values must fit `f32`/`f64` |
//! | string | string; number (canonical text); boolean (`true`/`false`) |
//! | timestamp | string in a supported layout; Unix seconds as integer or float |
//! | array, map, record | matching container, coerced element by element |
//! | raw | anything: the exact source bytes are captured |
//!
//! Absent fields and explicit nulls leave non-optional fields at their zero
//! value (`false`, `0`, `""`, the epoch, empty container) and optional
//! fields unset. Source keys with no matching field are ignored.
//!
//! ## Error collection
//!
//! A failing field records a [`CoercionError`] under its dotted path and
//! the walk continues, so one call reports every bad field.

use chrono::{DateTime, SecondsFormat, Utc};
#[cfg(test)]
use serde::Deserialize;
use vetta_core::{limits, redact, timestamp, Document, Format, Node, Number, Object, Value};

use crate::de::CoercedValue;
use crate::error::{CoercionError, CoercionErrorKind, CoercionErrors};
use crate::meta::{resolve, FieldKind, FloatWidth, IntWidth, Record, RecordMeta};

/// Tuning for one coercion call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoerceOptions {
    /// Deepest nesting level that is still coerced. The root record's
    /// fields are at depth 1.
    pub max_depth: usize,
}

impl CoerceOptions {
    /// Options taken from the process-wide limits.
    pub fn from_limits() -> Self {
        Self {
            max_depth: limits::max_validation_depth(),
        }
    }

    /// Override the maximum depth.
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }
}

impl Default for CoerceOptions {
    fn default() -> Self {
        Self::from_limits()
    }
}

/// Coerce a document into `T` with default options.
///
/// # Errors
///
/// Returns every field that could not be coerced.
pub fn coerce<T: Record>(doc: &Document<'_>) -> Result<T, CoercionErrors> {
    coerce_with(doc, &CoerceOptions::default())
}

/// Coerce a document into `T`.
///
/// # Errors
///
/// Returns every field that could not be coerced, or a single root error
/// if `T`'s metadata is invalid.
pub fn coerce_with<T: Record>(doc: &Document<'_>, options: &CoerceOptions) -> Result<T, CoercionErrors> {
    let meta = resolve::<T>()
        .map_err(|e| CoercionErrors::from(CoercionError::root(CoercionErrorKind::Metadata(e))))?;
    let value = coerce_value(doc, &meta, options)?;
    T::deserialize(value).map_err(|e| {
        tracing::warn!(record = meta.name(), error = %e, "coerced value rejected by record");
        CoercionErrors::from(CoercionError::root(CoercionErrorKind::Deserialize(e.to_string())))
    })
}

/// Coerce a document against explicit metadata.
///
/// The result is a map keyed by field name, ready for a record's
/// `Deserialize` impl.
///
/// # Errors
///
/// Returns every field that could not be coerced.
pub fn coerce_value(
    doc: &Document<'_>,
    meta: &RecordMeta,
    options: &CoerceOptions,
) -> Result<CoercedValue, CoercionErrors> {
    let mut coercer = Coercer {
        doc,
        format: doc.format(),
        max_depth: options.max_depth,
        errors: Vec::new(),
    };

    let value = match doc.root().value() {
        Value::Object(object) => coercer.record(Some(object), meta, "", 0),
        Value::Null => coercer.record(None, meta, "", 0),
        other => {
            coercer.fail(
                "",
                "",
                CoercionErrorKind::TypeMismatch {
                    expected: format!("record {}", meta.name()),
                    found: other.kind(),
                },
            );
            CoercedValue::Null
        }
    };

    if coercer.errors.is_empty() {
        Ok(value)
    } else {
        tracing::debug!(
            record = meta.name(),
            errors = coercer.errors.len(),
            "coercion failed"
        );
        Err(CoercionErrors::new(coercer.errors))
    }
}

/// RFC 3339 rendering handed to `DateTime<Utc>`'s `Deserialize` impl.
fn timestamp_value(ts: DateTime<Utc>) -> CoercedValue {
    CoercedValue::String(ts.to_rfc3339_opts(SecondsFormat::AutoSi, true))
}

fn child_path(parent: &str, key: &str) -> String {
    if parent.is_empty() {
        key.to_string()
    } else {
        format!("{parent}.{key}")
    }
}

fn index_path(parent: &str, index: usize) -> String {
    format!("{parent}[{index}]")
}

struct Coercer<'d, 'a> {
    doc: &'d Document<'a>,
    format: Format,
    max_depth: usize,
    errors: Vec<CoercionError>,
}

impl Coercer<'_, '_> {
    fn fail(&mut self, path: &str, field: &str, kind: CoercionErrorKind) {
        self.errors.push(CoercionError::new(path, field, kind));
    }

    /// Source text shown in messages, or the placeholder for sensitive paths.
    fn shown(&self, path: &str, field: &str, text: &str) -> String {
        redact::sensitive_fields()
            .redact_text(field, path, text)
            .to_string()
    }

    fn quoted(&self, path: &str, field: &str, text: &str) -> String {
        if redact::is_sensitive_field(field, path) {
            redact::REDACTED.to_string()
        } else {
            format!("{text:?}")
        }
    }

    fn mismatch(&mut self, path: &str, field: &str, kind: &FieldKind, node: &Node) {
        self.fail(
            path,
            field,
            CoercionErrorKind::TypeMismatch {
                expected: kind.type_name(),
                found: node.kind(),
            },
        );
    }

    fn record(
        &mut self,
        object: Option<&Object>,
        meta: &RecordMeta,
        path: &str,
        depth: usize,
    ) -> CoercedValue {
        let mut out = Vec::with_capacity(meta.fields().len());
        for field in meta.fields() {
            let node = object.and_then(|o| o.get(field.key(self.format)));
            let path = child_path(path, field.name());
            let value = self.node(node, field.kind(), field.name(), &path, depth + 1);
            out.push((field.name().to_string(), value));
        }
        CoercedValue::Map(out)
    }

    fn node(
        &mut self,
        node: Option<&Node>,
        kind: &FieldKind,
        field: &str,
        path: &str,
        depth: usize,
    ) -> CoercedValue {
        if depth > self.max_depth {
            self.fail(
                path,
                field,
                CoercionErrorKind::DepthExceeded {
                    max: self.max_depth,
                },
            );
            return CoercedValue::Null;
        }

        match kind {
            FieldKind::Optional(inner) => match node {
                Some(n) if !n.is_null() => self.node(Some(n), inner, field, path, depth),
                _ => CoercedValue::Null,
            },
            FieldKind::Raw => match node {
                Some(n) => CoercedValue::Bytes(self.doc.raw(n).into_owned()),
                None => CoercedValue::Bytes(Vec::new()),
            },
            _ => match node {
                Some(n) if !n.is_null() => self.present(n, kind, field, path, depth),
                _ => self.zero(kind, field, path, depth),
            },
        }
    }

    fn zero(&mut self, kind: &FieldKind, field: &str, path: &str, depth: usize) -> CoercedValue {
        match kind {
            FieldKind::Bool => CoercedValue::Bool(false),
            FieldKind::Int(w) if w.is_signed() => CoercedValue::I64(0),
            FieldKind::Int(_) => CoercedValue::U64(0),
            FieldKind::Float(_) => CoercedValue::F64(0.0),
            FieldKind::String => CoercedValue::String(String::new()),
            FieldKind::Timestamp => timestamp_value(timestamp::zero_timestamp()),
            FieldKind::Optional(_) | FieldKind::Any => CoercedValue::Null,
            FieldKind::Array(_) => CoercedValue::Seq(Vec::new()),
            FieldKind::Map(_) => CoercedValue::Map(Vec::new()),
            FieldKind::Raw => CoercedValue::Bytes(Vec::new()),
            FieldKind::Record(r) => match r.resolve() {
                Ok(meta) => self.record(None, &meta, path, depth),
                Err(e) => {
                    self.fail(path, field, CoercionErrorKind::Metadata(e));
                    CoercedValue::Null
                }
            },
        }
    }

    fn present(
        &mut self,
        node: &Node,
        kind: &FieldKind,
        field: &str,
        path: &str,
        depth: usize,
    ) -> CoercedValue {
        match kind {
            FieldKind::Bool => self.bool(node, field, path),
            FieldKind::Int(width) => self.int(node, *width, field, path),
            FieldKind::Float(width) => self.float(node, *width, field, path),
            FieldKind::String => self.string(node, kind, field, path),
            FieldKind::Timestamp => self.timestamp(node, kind, field, path),
            FieldKind::Array(inner) => match node.value() {
                Value::Array(items) => CoercedValue::Seq(
                    items
                        .iter()
                        .enumerate()
                        .map(|(i, item)| self.node(Some(item), inner, field, &index_path(path, i), depth + 1))
                        .collect(),
                ),
                _ => {
                    self.mismatch(path, field, kind, node);
                    CoercedValue::Null
                }
            },
            FieldKind::Map(inner) => match node.value() {
                Value::Object(object) => CoercedValue::Map(
                    object
                        .iter()
                        .map(|(key, item)| {
                            let value = self.node(Some(item), inner, field, &child_path(path, key), depth + 1);
                            (key.to_string(), value)
                        })
                        .collect(),
                ),
                _ => {
                    self.mismatch(path, field, kind, node);
                    CoercedValue::Null
                }
            },
            FieldKind::Record(r) => match (node.value(), r.resolve()) {
                (Value::Object(object), Ok(meta)) => self.record(Some(object), &meta, path, depth),
                (Value::Object(_), Err(e)) => {
                    self.fail(path, field, CoercionErrorKind::Metadata(e));
                    CoercedValue::Null
                }
                _ => {
                    self.mismatch(path, field, kind, node);
                    CoercedValue::Null
                }
            },
            FieldKind::Any => self.any(node, field, path, depth),
            FieldKind::Optional(_) | FieldKind::Raw => self.node(Some(node), kind, field, path, depth),
        }
    }

    fn bool(&mut self, node: &Node, field: &str, path: &str) -> CoercedValue {
        let parsed = match node.value() {
            Value::Bool(b) => Some(*b),
            Value::Number(n) => match n.as_i128() {
                Some(0) => Some(false),
                Some(1) => Some(true),
                _ => None,
            },
            Value::String(s) => match s.to_ascii_lowercase().as_str() {
                "true" | "1" | "yes" => Some(true),
                "false" | "0" | "no" => Some(false),
                _ => None,
            },
            _ => {
                self.mismatch(path, field, &FieldKind::Bool, node);
                return CoercedValue::Null;
            }
        };
        match parsed {
            Some(b) => CoercedValue::Bool(b),
            None => {
                let input = match node.value() {
                    Value::String(s) => self.quoted(path, field, s),
                    Value::Number(n) => self.shown(path, field, &n.as_text()),
                    _ => String::new(),
                };
                self.fail(path, field, CoercionErrorKind::InvalidBool { input });
                CoercedValue::Null
            }
        }
    }

    fn int(&mut self, node: &Node, width: IntWidth, field: &str, path: &str) -> CoercedValue {
        let target = width.name();
        let parsed = match node.value() {
            Value::Number(n) => match n.as_i128() {
                Some(i) => Ok(i),
                None => Err(self.number_failure(n, target, field, path)),
            },
            Value::String(s) => {
                let trimmed = s.trim();
                match trimmed.parse::<i128>() {
                    Ok(i) => Ok(i),
                    Err(_) if is_integer_text(trimmed) => Err(CoercionErrorKind::OutOfRange {
                        input: self.quoted(path, field, s),
                        target,
                    }),
                    Err(_) => Err(CoercionErrorKind::InvalidNumber {
                        input: self.quoted(path, field, s),
                        target,
                    }),
                }
            }
            _ => {
                self.mismatch(path, field, &FieldKind::Int(width), node);
                return CoercedValue::Null;
            }
        };

        let checked = parsed.and_then(|i| {
            let (lo, hi) = width.bounds();
            let out_of_range = || CoercionErrorKind::OutOfRange {
                input: self.shown(path, field, &i.to_string()),
                target,
            };
            if i < lo || i > hi {
                return Err(out_of_range());
            }
            if width.is_signed() {
                i64::try_from(i).map(CoercedValue::I64).map_err(|_| out_of_range())
            } else {
                u64::try_from(i).map(CoercedValue::U64).map_err(|_| out_of_range())
            }
        });

        match checked {
            Ok(value) => value,
            Err(kind) => {
                self.fail(path, field, kind);
                CoercedValue::Null
            }
        }
    }

    /// Why a number with no exact integral value cannot become an integer.
    fn number_failure(&self, n: &Number, target: &'static str, field: &str, path: &str) -> CoercionErrorKind {
        let f = n.as_f64();
        let input = self.shown(path, field, &n.as_text());
        if f.is_finite() && f.fract() == 0.0 {
            CoercionErrorKind::OutOfRange { input, target }
        } else {
            CoercionErrorKind::InvalidNumber { input, target }
        }
    }

    fn float(&mut self, node: &Node, width: FloatWidth, field: &str, path: &str) -> CoercedValue {
        let target = width.name();
        let parsed = match node.value() {
            Value::Number(n) => {
                let f = n.as_f64();
                if f.is_finite() || n.is_binary_float() {
                    Ok((f, n.as_text().into_owned()))
                } else {
                    Err(CoercionErrorKind::OutOfRange {
                        input: self.shown(path, field, &n.as_text()),
                        target,
                    })
                }
            }
            Value::String(s) => match s.trim().parse::<f64>() {
                Ok(f) => Ok((f, s.clone())),
                Err(_) => Err(CoercionErrorKind::InvalidNumber {
                    input: self.quoted(path, field, s),
                    target,
                }),
            },
            _ => {
                self.mismatch(path, field, &FieldKind::Float(width), node);
                return CoercedValue::Null;
            }
        };

        // Non-finite values came from an explicit NaN/inf literal; a finite
        // value must fit the target without becoming infinite.
        let checked = parsed.and_then(|(f, text)| {
            if f.is_finite() && f.abs() > width.max() {
                Err(CoercionErrorKind::OutOfRange {
                    input: self.shown(path, field, &text),
                    target,
                })
            } else {
                Ok(CoercedValue::F64(f))
            }
        });

        match checked {
            Ok(value) => value,
            Err(kind) => {
                self.fail(path, field, kind);
                CoercedValue::Null
            }
        }
    }

    fn string(&mut self, node: &Node, kind: &FieldKind, field: &str, path: &str) -> CoercedValue {
        match node.value() {
            Value::String(s) => CoercedValue::String(s.clone()),
            Value::Number(n) => CoercedValue::String(n.canonical()),
            Value::Bool(b) => CoercedValue::String(b.to_string()),
            _ => {
                self.mismatch(path, field, kind, node);
                CoercedValue::Null
            }
        }
    }

    fn timestamp(&mut self, node: &Node, kind: &FieldKind, field: &str, path: &str) -> CoercedValue {
        let parsed = match node.value() {
            Value::String(s) => timestamp::parse_timestamp(s).map_err(|_| self.quoted(path, field, s)),
            Value::Number(n) => {
                let result = match n.as_i128().filter(|_| n.is_integer_literal()) {
                    Some(i) => i64::try_from(i)
                        .ok()
                        .and_then(|secs| timestamp::from_unix_seconds(secs).ok()),
                    None => timestamp::from_unix_float(n.as_f64()).ok(),
                };
                result.ok_or_else(|| self.shown(path, field, &n.as_text()))
            }
            _ => {
                self.mismatch(path, field, kind, node);
                return CoercedValue::Null;
            }
        };
        match parsed {
            Ok(ts) => timestamp_value(ts),
            Err(input) => {
                self.fail(path, field, CoercionErrorKind::InvalidTimestamp { input });
                CoercedValue::Null
            }
        }
    }

    fn any(&mut self, node: &Node, field: &str, path: &str, depth: usize) -> CoercedValue {
        match node.value() {
            Value::Null => CoercedValue::Null,
            Value::Bool(b) => CoercedValue::Bool(*b),
            Value::Number(n) => number_value(n),
            Value::String(s) => CoercedValue::String(s.clone()),
            Value::Array(items) => CoercedValue::Seq(
                items
                    .iter()
                    .enumerate()
                    .map(|(i, item)| self.node(Some(item), &FieldKind::Any, field, &index_path(path, i), depth + 1))
                    .collect(),
            ),
            Value::Object(object) => CoercedValue::Map(
                object
                    .iter()
                    .map(|(key, item)| {
                        let value = self.node(Some(item), &FieldKind::Any, field, &child_path(path, key), depth + 1);
                        (key.to_string(), value)
                    })
                    .collect(),
            ),
        }
    }
}

/// Dynamic rendering of a number: integer literals stay integers.
fn number_value(n: &Number) -> CoercedValue {
    if n.is_integer_literal() {
        if let Some(i) = n.as_i128() {
            if let Ok(i) = i64::try_from(i) {
                return CoercedValue::I64(i);
            }
            if let Ok(u) = u64::try_from(i) {
                return CoercedValue::U64(u);
            }
        }
    }
    CoercedValue::F64(n.as_f64())
}

/// Optional sign followed by ASCII digits only.
fn is_integer_text(s: &str) -> bool {
    let digits = s.strip_prefix(['+', '-']).unwrap_or(s);
    !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
}
