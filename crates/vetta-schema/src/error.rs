//! # Coercion Errors
//!
//! Coercion never stops at the first bad field. Every failure is recorded
//! as a [`CoercionError`] carrying the dotted path of the field, and the
//! whole batch is returned as [`CoercionErrors`].
//!
//! Offending input values embedded in messages are redacted when the field
//! path matches a sensitive pattern.

use std::fmt;

use thiserror::Error;
use vetta_core::ConfigurationError;

/// What went wrong with one field.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoercionErrorKind {
    /// The source value's kind cannot be converted to the target.
    #[error("expected {expected}, found {found}")]
    TypeMismatch {
        /// Target type name.
        expected: String,
        /// Source kind (`string`, `number`, ...).
        found: &'static str,
    },

    /// A value could not be read as a boolean.
    #[error("cannot interpret {input} as a boolean")]
    InvalidBool {
        /// The offending input (possibly redacted).
        input: String,
    },

    /// A value could not be parsed as a number.
    #[error("cannot parse {input} as {target}")]
    InvalidNumber {
        /// The offending input (possibly redacted).
        input: String,
        /// Target type name.
        target: &'static str,
    },

    /// A number does not fit the target type.
    #[error("{input} is out of range for {target}")]
    OutOfRange {
        /// The offending input (possibly redacted).
        input: String,
        /// Target type name.
        target: &'static str,
    },

    /// A timestamp string matched no supported layout, or a Unix timestamp
    /// is not representable.
    #[error("invalid timestamp {input}")]
    InvalidTimestamp {
        /// The offending input (possibly redacted).
        input: String,
    },

    /// Nesting went deeper than the configured maximum.
    #[error("nesting exceeds the maximum depth of {max}")]
    DepthExceeded {
        /// Limit in force.
        max: usize,
    },

    /// Metadata for a nested record could not be resolved.
    #[error("record metadata unavailable: {0}")]
    Metadata(ConfigurationError),

    /// The coerced tree did not fit the record's `Deserialize` impl.
    #[error("{0}")]
    Deserialize(String),
}

/// One field that could not be coerced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoercionError {
    /// Dotted path, e.g. `items[2].price`. Empty for the root.
    pub path: String,
    /// Name of the innermost declared field.
    pub field: String,
    /// What went wrong.
    pub kind: CoercionErrorKind,
}

impl CoercionError {
    /// An error at `path`.
    pub fn new(path: impl Into<String>, field: impl Into<String>, kind: CoercionErrorKind) -> Self {
        Self {
            path: path.into(),
            field: field.into(),
            kind,
        }
    }

    /// An error about the document as a whole.
    pub fn root(kind: CoercionErrorKind) -> Self {
        Self::new("", "", kind)
    }
}

impl fmt::Display for CoercionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_empty() {
            write!(f, "document: {}", self.kind)
        } else {
            write!(f, "field '{}': {}", self.path, self.kind)
        }
    }
}

impl std::error::Error for CoercionError {}

/// Every coercion failure of one call, in document order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CoercionErrors(Vec<CoercionError>);

impl CoercionErrors {
    /// Wrap a list of errors.
    pub fn new(errors: Vec<CoercionError>) -> Self {
        Self(errors)
    }

    /// The errors in document order.
    pub fn errors(&self) -> &[CoercionError] {
        &self.0
    }

    /// Iterate over the errors.
    pub fn iter(&self) -> std::slice::Iter<'_, CoercionError> {
        self.0.iter()
    }

    /// Number of errors.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if there are no errors.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Paths of the failing fields.
    pub fn paths(&self) -> Vec<&str> {
        self.0.iter().map(|e| e.path.as_str()).collect()
    }

    /// The first error recorded for `path`.
    pub fn for_path(&self, path: &str) -> Option<&CoercionError> {
        self.0.iter().find(|e| e.path == path)
    }

    /// Consume into the underlying list.
    pub fn into_inner(self) -> Vec<CoercionError> {
        self.0
    }
}

impl From<CoercionError> for CoercionErrors {
    fn from(err: CoercionError) -> Self {
        Self(vec![err])
    }
}

impl IntoIterator for CoercionErrors {
    type Item = CoercionError;
    type IntoIter = std::vec::IntoIter<CoercionError>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a CoercionErrors {
    type Item = &'a CoercionError;
    type IntoIter = std::slice::Iter<'a, CoercionError>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl fmt::Display for CoercionErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.as_slice() {
            [] => write!(f, "no coercion errors"),
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

impl std::error::Error for CoercionErrors {}
