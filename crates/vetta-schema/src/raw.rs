//! Opaque sub-documents captured byte for byte.

use std::fmt;

use serde::de::{self, Deserialize, Deserializer, Visitor};
use serde::{Serialize, Serializer};

/// The unparsed bytes of one sub-document.
///
/// For JSON input these are the exact source bytes, whitespace included.
/// YAML exposes no byte spans, so the sub-document is re-rendered as
/// compact JSON instead. An explicit `null` is captured as the four bytes
/// `null`; an absent field is empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct RawDocument(Vec<u8>);

impl RawDocument {
    /// Wrap captured bytes.
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    /// The captured bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Consume into the captured bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    /// The captured bytes as text, if they are UTF-8.
    pub fn as_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.0).ok()
    }

    /// Returns true if nothing was captured (the field was absent).
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns true if the capture is the literal `null`.
    pub fn is_null(&self) -> bool {
        self.0 == b"null"
    }

    /// Parse the captured bytes as JSON.
    pub fn to_json(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::from_slice(&self.0)
    }
}

impl AsRef<[u8]> for RawDocument {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<Vec<u8>> for RawDocument {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

impl Serialize for RawDocument {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.as_str() {
            Some(text) => serializer.serialize_str(text),
            None => serializer.serialize_bytes(&self.0),
        }
    }
}

impl<'de> Deserialize<'de> for RawDocument {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct RawVisitor;

        impl<'de> Visitor<'de> for RawVisitor {
            type Value = RawDocument;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("raw document bytes")
            }

            fn visit_bytes<E: de::Error>(self, v: &[u8]) -> Result<Self::Value, E> {
                Ok(RawDocument(v.to_vec()))
            }

            fn visit_byte_buf<E: de::Error>(self, v: Vec<u8>) -> Result<Self::Value, E> {
                Ok(RawDocument(v))
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
                Ok(RawDocument(v.as_bytes().to_vec()))
            }

            fn visit_string<E: de::Error>(self, v: String) -> Result<Self::Value, E> {
                Ok(RawDocument(v.into_bytes()))
            }
        }

        deserializer.deserialize_byte_buf(RawVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::de::CoercedValue;

    #[test]
    fn test_deserialize_from_bytes() {
        let raw = RawDocument::deserialize(CoercedValue::Bytes(b"{ \"a\": 1 }".to_vec())).unwrap();
        assert_eq!(raw.as_bytes(), b"{ \"a\": 1 }");
        assert_eq!(raw.to_json().unwrap(), serde_json::json!({"a": 1}));
    }

    #[test]
    fn test_null_and_empty() {
        assert!(RawDocument::new(b"null".to_vec()).is_null());
        assert!(RawDocument::default().is_empty());
        assert!(!RawDocument::default().is_null());
    }

    #[test]
    fn test_serializes_as_text() {
        let raw = RawDocument::new(b"[1,2]".to_vec());
        assert_eq!(serde_json::to_value(&raw).unwrap(), serde_json::json!("[1,2]"));
    }
}
