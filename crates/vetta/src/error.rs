//! # Pipeline Error
//!
//! One error type for the whole decode → coerce → validate pipeline. Each
//! variant wraps the error of the stage that failed.
//!
//! [`Error::to_json`] renders a structured body in the same shape for every
//! variant:
//!
//! ```json
//! { "error": { "code": "VALIDATION_ERROR", "message": "...", "details": { ... } } }
//! ```
//!
//! Every value in the body has already been redacted.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use vetta_core::{ConfigurationError, DecodeError};
use vetta_schema::{CoercionError, CoercionErrors};
use vetta_validate::{ValidationError, ValidationErrors};

/// Structured JSON error body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

/// Inner error detail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorDetail {
    /// Machine-readable code, e.g. `DECODE_ERROR`.
    pub code: String,
    /// Human-readable message.
    pub message: String,
    /// Stage-specific context: the validation report, the failing
    /// coercion paths, or the decode offset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// Failure of a pipeline call.
#[derive(Error, Debug)]
pub enum Error {
    /// The input bytes are malformed for their format.
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// Well-formed input that does not fit the target record.
    #[error(transparent)]
    Coercion(#[from] CoercionErrors),

    /// A well-typed record violates declared rules.
    #[error(transparent)]
    Validation(#[from] ValidationErrors),

    /// Invalid metadata or registry setup.
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    /// A record could not be serialized for validation.
    #[error("record could not be serialized for validation: {0}")]
    Serialization(String),
}

impl Error {
    /// Machine-readable code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Decode(_) => "DECODE_ERROR",
            Self::Coercion(_) => "COERCION_ERROR",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::Configuration(_) => "CONFIGURATION_ERROR",
            Self::Serialization(_) => "SERIALIZATION_ERROR",
        }
    }

    /// Validation failures, empty for other variants.
    pub fn validation_errors(&self) -> &[ValidationError] {
        match self {
            Self::Validation(errors) => errors.errors(),
            _ => &[],
        }
    }

    /// Validation failures grouped by path, empty for other variants.
    pub fn group_by_field(&self) -> BTreeMap<String, Vec<&ValidationError>> {
        match self {
            Self::Validation(errors) => errors.group_by_field(),
            _ => BTreeMap::new(),
        }
    }

    /// Coercion failures, empty for other variants.
    pub fn coercion_errors(&self) -> &[CoercionError] {
        match self {
            Self::Coercion(errors) => errors.errors(),
            _ => &[],
        }
    }

    /// The structured body.
    pub fn body(&self) -> ErrorBody {
        let details = match self {
            Self::Validation(errors) => serde_json::to_value(errors.report()).ok(),
            Self::Coercion(errors) => Some(serde_json::Value::Array(
                errors
                    .iter()
                    .map(|e| {
                        serde_json::json!({
                            "path": e.path,
                            "field": e.field,
                            "message": e.kind.to_string(),
                        })
                    })
                    .collect(),
            )),
            Self::Decode(e) => e.offset().map(|offset| serde_json::json!({ "offset": offset })),
            Self::Configuration(_) | Self::Serialization(_) => None,
        };
        ErrorBody {
            error: ErrorDetail {
                code: self.code().to_string(),
                message: self.to_string(),
                details,
            },
        }
    }

    /// The structured body as JSON bytes.
    pub fn to_json(&self) -> Result<Vec<u8>, serde_json::Error> {
        match self {
            Self::Validation(_) => tracing::debug!(error = %self, "rendering validation error"),
            Self::Configuration(_) => tracing::warn!(error = %self, "rendering configuration error"),
            _ => {}
        }
        serde_json::to_vec(&self.body())
    }
}
