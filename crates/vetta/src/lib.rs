//! # vetta — Decode, Coerce, Validate
//!
//! Turns JSON or YAML bytes into a typed record in one call, and reports
//! every problem at once:
//!
//! ```text
//! bytes → detect_format → decode → coerce → validate → T
//!            (vetta-core)            (vetta-schema) (vetta-validate)
//! ```
//!
//! ## Example
//!
//! ```
//! use serde::{Deserialize, Serialize};
//! use vetta::{FieldKind, Record, RecordBuilder};
//!
//! #[derive(Debug, Serialize, Deserialize)]
//! struct User {
//!     id: i64,
//!     email: String,
//! }
//!
//! impl Record for User {
//!     fn describe(record: &mut RecordBuilder) {
//!         record.field("id", FieldKind::I64).validate("required,min=1");
//!         record.field("email", FieldKind::String).validate("required,email");
//!     }
//! }
//!
//! let user: User = vetta::parse_into(br#"{"id": "7", "email": "a@b.co"}"#, None).unwrap();
//! assert_eq!(user.id, 7);
//!
//! let err = vetta::parse_into::<User>(b"id: 0\nemail: nope\n", None).unwrap_err();
//! assert_eq!(err.validation_errors().len(), 3);
//! ```
//!
//! ## Shared state
//!
//! The free functions use [`Registry::global`] and the process-wide
//! [`limits`]. A [`Parser`] can pin a format, carry a private registry, or
//! override the depth limit without touching either.
//!
//! ## Crate Policy
//!
//! - Every call is synchronous and independent; nothing is shared between
//!   calls except the registry and limits, both lock-guarded.
//! - Errors surfaced from this crate are already redacted.

pub mod error;

use std::sync::Arc;

pub use error::{Error, ErrorBody, ErrorDetail};
pub use vetta_core::{
    decode::decode_auto, detect_format, limits, redact, timestamp, ConfigurationError, DecodeError,
    Document, Format, Limits, Node, Number, Object, Value,
};
pub use vetta_schema::{
    CoerceOptions, CoercionError, CoercionErrorKind, CoercionErrors, FieldKind, FloatWidth, IntWidth, RawDocument,
    Record, RecordBuilder, RecordMeta, RecordRef, RuleParams,
};
pub use vetta_validate::{
    register_cross_field_rules, EntryKind, ErrorReport, FieldReport, RecordView, Registry,
    RuleFailure, ValidationEngine, ValidationError, ValidationErrors, Validator, Violation,
};

/// Decode `input` as `format`.
///
/// # Errors
///
/// Returns a `DecodeError` for oversized or malformed input.
pub fn decode(input: &[u8], format: Format) -> Result<Document<'_>, DecodeError> {
    vetta_core::decode(input, format)
}

/// Decode, coerce, and validate `input` into `T` with the global registry.
///
/// The format is detected when `format` is `None`.
///
/// # Errors
///
/// Returns the error of the first stage that failed. Coercion and
/// validation errors list every failing field.
pub fn parse_into<T: Record>(input: &[u8], format: Option<Format>) -> Result<T, Error> {
    let parser = Parser::new();
    match format {
        Some(format) => parser.with_format(format).parse_into(input),
        None => parser.parse_into(input),
    }
}

/// Validate an already populated `T` with the global registry.
///
/// # Errors
///
/// Returns `Error::Validation` listing every failed rule, or
/// `Error::Configuration` for an unknown rule or bad metadata.
pub fn validate<T: Record>(value: &T) -> Result<(), Error> {
    Parser::new().validate(value)
}

/// A configured pipeline.
#[derive(Debug, Clone)]
pub struct Parser {
    format: Option<Format>,
    registry: Arc<Registry>,
    max_depth: Option<usize>,
}

impl Parser {
    /// A parser using format detection, the global registry, and the
    /// process-wide depth limit.
    pub fn new() -> Self {
        Self {
            format: None,
            registry: Registry::global(),
            max_depth: None,
        }
    }

    /// Always decode as `format`.
    pub fn with_format(mut self, format: Format) -> Self {
        self.format = Some(format);
        self
    }

    /// Use `registry` instead of the global one.
    pub fn with_registry(mut self, registry: Arc<Registry>) -> Self {
        self.registry = registry;
        self
    }

    /// Use a fresh private registry seeded with the built-in rules.
    pub fn with_private_registry(self) -> Self {
        self.with_registry(Arc::new(Registry::with_builtins()))
    }

    /// Override the maximum nesting depth.
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = Some(max_depth);
        self
    }

    /// The fixed format, if any.
    pub fn format(&self) -> Option<Format> {
        self.format
    }

    /// The registry rules are resolved through.
    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    fn max_depth(&self) -> usize {
        self.max_depth.unwrap_or_else(limits::max_validation_depth)
    }

    /// Decode `input` with the fixed or detected format.
    ///
    /// # Errors
    ///
    /// Returns a `DecodeError` for oversized or malformed input.
    pub fn decode<'a>(&self, input: &'a [u8]) -> Result<Document<'a>, DecodeError> {
        let format = self.format.unwrap_or_else(|| detect_format(input));
        vetta_core::decode(input, format)
    }

    /// Decode, coerce, and validate `input` into `T`.
    ///
    /// # Errors
    ///
    /// Returns the error of the first stage that failed.
    pub fn parse_into<T: Record>(&self, input: &[u8]) -> Result<T, Error> {
        let doc = self.decode(input)?;
        tracing::debug!(
            format = %doc.format(),
            bytes = input.len(),
            "decoded input"
        );
        let options = CoerceOptions::default().with_max_depth(self.max_depth());
        let value: T = vetta_schema::coerce_with(&doc, &options)?;
        self.validate(&value)?;
        Ok(value)
    }

    /// Validate an already populated `T`.
    ///
    /// # Errors
    ///
    /// Returns `Error::Validation` listing every failed rule, or
    /// `Error::Configuration` for an unknown rule or bad metadata.
    pub fn validate<T: Record>(&self, value: &T) -> Result<(), Error> {
        let meta = vetta_schema::resolve::<T>()?;
        let json = serde_json::to_value(value).map_err(|e| {
            tracing::warn!(record = meta.name(), error = %e, "record serialization failed");
            Error::Serialization(e.to_string())
        })?;
        ValidationEngine::new(&self.registry)
            .with_max_depth(self.max_depth())
            .validate_record(&meta, &json)?
            .into_result()?;
        Ok(())
    }
}

impl Default for Parser {
    fn default() -> Self {
        Self::new()
    }
}
