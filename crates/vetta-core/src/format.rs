//! # Format Detection
//!
//! Classifies a byte buffer as one of the supported serialization formats
//! without parsing it. Detection looks at a bounded prefix only, so its cost
//! does not grow with the input.
//!
//! ## Heuristic
//!
//! After skipping a UTF-8 byte order mark and leading whitespace:
//!
//! 1. `{` or `[` → JSON.
//! 2. A `---` document marker → YAML.
//! 3. A line of the form `key: value` (or `key:` at end of line) → YAML.
//! 4. Anything else, including empty input → [`Format::DEFAULT`].

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConfigurationError;

/// Number of leading bytes inspected by [`detect_format`].
pub const DETECTION_WINDOW: usize = 4096;

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

/// A supported textual serialization format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    /// Bracket-delimited JSON.
    Json,
    /// Indentation-based YAML.
    Yaml,
}

impl Format {
    /// Format used when the input is empty or ambiguous.
    pub const DEFAULT: Format = Format::Json;

    /// All supported formats.
    pub const ALL: [Format; 2] = [Format::Json, Format::Yaml];

    /// Lowercase name used in messages and tags.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Yaml => "yaml",
        }
    }
}

impl Default for Format {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Format {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "yaml" | "yml" => Ok(Self::Yaml),
            other => Err(ConfigurationError::UnsupportedFormat(other.to_string())),
        }
    }
}

/// Classify `input` as one of the supported formats. Never fails.
pub fn detect_format(input: &[u8]) -> Format {
    let window = &input[..input.len().min(DETECTION_WINDOW)];
    let window = window.strip_prefix(UTF8_BOM).unwrap_or(window);
    let trimmed = trim_leading_whitespace(window);

    match trimmed.first() {
        None => Format::DEFAULT,
        Some(b'{') | Some(b'[') => Format::Json,
        _ if trimmed.starts_with(b"---") => Format::Yaml,
        _ if trimmed.split(|b| *b == b'\n').any(is_key_value_line) => Format::Yaml,
        _ => Format::DEFAULT,
    }
}

fn trim_leading_whitespace(bytes: &[u8]) -> &[u8] {
    let start = bytes
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(bytes.len());
    &bytes[start..]
}

/// `key: value` or `key:` where the key is a plain scalar.
fn is_key_value_line(line: &[u8]) -> bool {
    let line = trim_leading_whitespace(line);
    let line = line.strip_prefix(b"- ").unwrap_or(line);
    if line.first() == Some(&b'#') {
        return false;
    }
    let Some(colon) = line.iter().position(|b| *b == b':') else {
        return false;
    };
    let key = &line[..colon];
    if key.is_empty()
        || !key
            .iter()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'_' | b'-' | b'.' | b' '))
    {
        return false;
    }
    match line.get(colon + 1) {
        None => true,
        Some(next) => matches!(next, b' ' | b'\t' | b'\r'),
    }
}
