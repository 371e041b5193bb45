//! # Sensitive-Field Redaction
//!
//! Decides whether a field holds a secret and substitutes a fixed
//! placeholder for its value before the value is logged, returned in an
//! error message, or serialized into a report.
//!
//! ## Matching
//!
//! Patterns are case-insensitive substrings. A field is sensitive if any
//! pattern occurs in its bare name or in any segment of its dotted path
//! (array indices are stripped, so `users[3].password` has the segments
//! `users` and `password`).
//!
//! ## Security Invariant
//!
//! Redaction is the only way a validated value leaves the pipeline. Callers
//! that surface values must go through [`redact_value`] or
//! [`SensitiveFields::redact`]; there is no opt-out per call.

use parking_lot::RwLock;
use serde_json::Value;

/// Placeholder substituted for sensitive values.
pub const REDACTED: &str = "[REDACTED]";

/// Patterns matched when nothing else has been configured.
pub const DEFAULT_SENSITIVE_PATTERNS: &[&str] = &[
    "password",
    "secret",
    "token",
    "api_key",
    "apikey",
    "auth",
    "credential",
    "private",
    "bearer",
];

/// A mutable, thread-safe set of sensitive-field patterns.
#[derive(Debug)]
pub struct SensitiveFields {
    patterns: RwLock<Vec<String>>,
}

impl SensitiveFields {
    /// A set seeded with [`DEFAULT_SENSITIVE_PATTERNS`].
    pub fn new() -> Self {
        Self::with_patterns(DEFAULT_SENSITIVE_PATTERNS.iter().copied())
    }

    /// A set holding exactly `patterns`.
    pub fn with_patterns<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            patterns: RwLock::new(normalize(patterns)),
        }
    }

    /// Current patterns, lowercased, in insertion order.
    pub fn patterns(&self) -> Vec<String> {
        self.patterns.read().clone()
    }

    /// Replace every pattern.
    pub fn set_patterns<I, S>(&self, patterns: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        *self.patterns.write() = normalize(patterns);
    }

    /// Add one pattern. Empty and duplicate patterns are ignored.
    pub fn add_pattern(&self, pattern: &str) {
        let pattern = pattern.trim().to_lowercase();
        if pattern.is_empty() {
            return;
        }
        let mut patterns = self.patterns.write();
        if !patterns.contains(&pattern) {
            patterns.push(pattern);
        }
    }

    /// Returns true if `field` or any segment of `path` matches a pattern.
    pub fn is_sensitive(&self, field: &str, path: &str) -> bool {
        let patterns = self.patterns.read();
        if patterns.is_empty() {
            return false;
        }
        std::iter::once(field)
            .chain(path_segments(path))
            .map(str::to_lowercase)
            .any(|segment| patterns.iter().any(|p| segment.contains(p.as_str())))
    }

    /// `value` unchanged, or the placeholder if the field is sensitive.
    pub fn redact(&self, field: &str, path: &str, value: &Value) -> Value {
        if self.is_sensitive(field, path) {
            Value::String(REDACTED.to_string())
        } else {
            value.clone()
        }
    }

    /// `text` unchanged, or the placeholder if the field is sensitive.
    pub fn redact_text<'a>(&self, field: &str, path: &str, text: &'a str) -> &'a str {
        if self.is_sensitive(field, path) {
            REDACTED
        } else {
            text
        }
    }
}

impl Default for SensitiveFields {
    fn default() -> Self {
        Self::new()
    }
}

fn normalize<I, S>(patterns: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut out: Vec<String> = Vec::new();
    for p in patterns {
        let p = p.as_ref().trim().to_lowercase();
        if !p.is_empty() && !out.contains(&p) {
            out.push(p);
        }
    }
    out
}

/// Dotted-path segments with array indices stripped.
fn path_segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('.')
        .map(|seg| seg.split('[').next().unwrap_or(seg))
        .filter(|seg| !seg.is_empty())
}

fn global() -> &'static SensitiveFields {
    static GLOBAL: std::sync::OnceLock<SensitiveFields> = std::sync::OnceLock::new();
    GLOBAL.get_or_init(SensitiveFields::new)
}

/// The process-wide pattern set.
pub fn sensitive_fields() -> &'static SensitiveFields {
    global()
}

/// Current process-wide patterns.
pub fn sensitive_field_patterns() -> Vec<String> {
    global().patterns()
}

/// Replace the process-wide patterns.
pub fn set_sensitive_field_patterns<I, S>(patterns: I)
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    global().set_patterns(patterns);
    tracing::debug!(count = global().patterns().len(), "sensitive field patterns replaced");
}

/// Add one process-wide pattern.
pub fn add_sensitive_field_pattern(pattern: &str) {
    global().add_pattern(pattern);
}

/// Returns true if the field matches a process-wide pattern.
pub fn is_sensitive_field(field: &str, path: &str) -> bool {
    global().is_sensitive(field, path)
}

/// Redact `value` against the process-wide patterns.
pub fn redact_value(field: &str, path: &str, value: &Value) -> Value {
    global().redact(field, path, value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_defaults_match_common_secrets() {
        let s = SensitiveFields::new();
        for field in [
            "password",
            "Password",
            "user_password",
            "clientSecret",
            "access_token",
            "API_KEY",
            "apikey",
            "Authorization",
            "credentials",
            "private_key",
            "bearer",
        ] {
            assert!(s.is_sensitive(field, field), "{field} should be sensitive");
        }
        assert!(!s.is_sensitive("username", "username"));
        assert!(!s.is_sensitive("email", "contact.email"));
    }

    #[test]
    fn test_path_segments_checked() {
        let s = SensitiveFields::new();
        assert!(s.is_sensitive("value", "credentials.value"));
        assert!(s.is_sensitive("value", "auth[2].value"));
        assert!(!s.is_sensitive("value", "settings[2].value"));
    }

    #[test]
    fn test_redact_preserves_type_when_not_sensitive() {
        let s = SensitiveFields::new();
        assert_eq!(s.redact("age", "age", &json!(42)), json!(42));
        assert_eq!(s.redact("password", "password", &json!(42)), json!(REDACTED));
        assert_eq!(
            s.redact("password", "password", &json!({"nested": true})),
            json!(REDACTED)
        );
    }

    #[test]
    fn test_set_and_add_patterns() {
        let s = SensitiveFields::with_patterns(["SSN"]);
        assert_eq!(s.patterns(), vec!["ssn".to_string()]);
        assert!(s.is_sensitive("user_ssn", "user_ssn"));
        assert!(!s.is_sensitive("password", "password"));

        s.add_pattern("pin");
        s.add_pattern("PIN");
        s.add_pattern("  ");
        assert_eq!(s.patterns(), vec!["ssn".to_string(), "pin".to_string()]);

        s.set_patterns(Vec::<String>::new());
        assert!(!s.is_sensitive("ssn", "ssn"));
    }

    #[test]
    fn test_redact_text() {
        let s = SensitiveFields::new();
        assert_eq!(s.redact_text("token", "token", "abc"), REDACTED);
        assert_eq!(s.redact_text("name", "name", "abc"), "abc");
    }

    #[test]
    fn test_global_add_is_visible() {
        add_sensitive_field_pattern("vetta_test_marker");
        assert!(is_sensitive_field("x_vetta_test_marker", ""));
        assert!(sensitive_field_patterns().contains(&"vetta_test_marker".to_string()));
        assert_eq!(
            redact_value("password", "password", &json!("hunter2")),
            json!(REDACTED)
        );
    }
}
