//! # Error Types — Decode and Configuration Failures
//!
//! Defines the leaf error types shared by every vetta crate. All errors use
//! `thiserror` for derive-based `Display` and `Error` implementations.
//!
//! ## Design
//!
//! - Decode errors are fatal for the call that produced them and carry the
//!   offending byte offset whenever the underlying tokenizer reports one.
//! - Configuration errors describe invalid registry, metadata, or limit
//!   setup. They surface when the configuration is built, never per record.
//! - Timestamp errors name the offending input so the coercion layer can
//!   attach (and redact) it.

use thiserror::Error;

use crate::format::Format;

/// Malformed input bytes for the detected or requested format.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// The tokenizer rejected the input.
    #[error("invalid {format} input{}: {message}", at_offset(.offset))]
    Syntax {
        /// Format the input was decoded as.
        format: Format,
        /// Byte offset of the failure, when the tokenizer reports one.
        offset: Option<usize>,
        /// Tokenizer message.
        message: String,
    },

    /// The input is not valid UTF-8.
    #[error("input is not valid UTF-8 (first invalid byte at offset {offset})")]
    InvalidUtf8 {
        /// Offset of the first byte that is not part of a valid sequence.
        offset: usize,
    },

    /// The input exceeds the configured maximum size.
    #[error("input of {size} bytes exceeds the configured maximum of {max} bytes")]
    InputTooLarge {
        /// Size of the rejected input.
        size: usize,
        /// Limit in force when the input was rejected.
        max: usize,
    },

    /// A mapping key cannot be represented as a string.
    #[error("unsupported {format} mapping key: {key}")]
    UnsupportedKey {
        /// Format the input was decoded as.
        format: Format,
        /// Debug rendering of the offending key.
        key: String,
    },
}

impl DecodeError {
    /// Returns the byte offset of the failure, if known.
    pub fn offset(&self) -> Option<usize> {
        match self {
            Self::Syntax { offset, .. } => *offset,
            Self::InvalidUtf8 { offset } => Some(*offset),
            Self::InputTooLarge { .. } | Self::UnsupportedKey { .. } => None,
        }
    }
}

fn at_offset(offset: &Option<usize>) -> String {
    match offset {
        Some(o) => format!(" at byte {o}"),
        None => String::new(),
    }
}

/// Invalid registry, metadata, or limit setup.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    /// A validation tag could not be parsed.
    #[error("invalid validation tag {tag:?} on field '{field}': {reason}")]
    InvalidTag {
        /// Field carrying the tag.
        field: String,
        /// The raw tag string.
        tag: String,
        /// Why the tag was rejected.
        reason: String,
    },

    /// Two fields of one record share a name or a source key.
    #[error("record '{record}' declares '{name}' more than once")]
    DuplicateField {
        /// Record type name.
        record: String,
        /// Duplicated field name or key.
        name: String,
    },

    /// A rule name is not bound in the registry.
    #[error("unknown validation rule '{0}'")]
    UnknownRule(String),

    /// A rule name is empty or contains characters outside `[A-Za-z0-9_]`.
    #[error("invalid validation rule name {0:?}")]
    InvalidRuleName(String),

    /// A rule was given a parameter it cannot use.
    #[error("invalid parameter for rule '{rule}': {reason}")]
    InvalidRuleParameter {
        /// Rule name.
        rule: String,
        /// Why the parameter was rejected.
        reason: String,
    },

    /// A format name is not supported.
    #[error("unsupported format {0:?}")]
    UnsupportedFormat(String),

    /// A process-wide limit was set to an unusable value.
    #[error("invalid value for limit '{limit}': {reason}")]
    InvalidLimit {
        /// Limit name.
        limit: &'static str,
        /// Why the value was rejected.
        reason: String,
    },
}

/// A timestamp input matched none of the supported layouts.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TimestampError {
    /// No layout matched the string.
    #[error("unrecognized timestamp format: {input:?}")]
    UnrecognizedFormat {
        /// The offending input.
        input: String,
    },

    /// A Unix timestamp is outside the representable range.
    #[error("unix timestamp out of range: {input}")]
    OutOfRange {
        /// The offending input, rendered as text.
        input: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_syntax_display_with_offset() {
        let err = DecodeError::Syntax {
            format: Format::Json,
            offset: Some(12),
            message: "EOF while parsing an object".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "invalid json input at byte 12: EOF while parsing an object"
        );
        assert_eq!(err.offset(), Some(12));
    }

    #[test]
    fn test_syntax_display_without_offset() {
        let err = DecodeError::Syntax {
            format: Format::Yaml,
            offset: None,
            message: "bad".to_string(),
        };
        assert_eq!(err.to_string(), "invalid yaml input: bad");
        assert_eq!(err.offset(), None);
    }

    #[test]
    fn test_input_too_large_display() {
        let err = DecodeError::InputTooLarge { size: 20, max: 10 };
        assert!(err.to_string().contains("20 bytes"));
        assert!(err.offset().is_none());
    }

    #[test]
    fn test_configuration_error_display() {
        let err = ConfigurationError::UnknownRule("nope".to_string());
        assert_eq!(err.to_string(), "unknown validation rule 'nope'");
    }
}
