//! Deserializer over a coerced value tree.
//!
//! The coercion engine emits a [`CoercedValue`] whose shape already matches
//! the target record's declared fields; the record's own `Deserialize` impl
//! then reads it through this module. Unlike `serde_json::Value` the tree
//! carries non-finite floats and raw byte buffers.

use serde::de::value::{MapAccessDeserializer, MapDeserializer, SeqDeserializer};
use serde::de::{self, Expected, IntoDeserializer, Unexpected, Visitor};
use serde::forward_to_deserialize_any;
use thiserror::Error;

/// A value that has been coerced to its target field kind.
#[derive(Debug, Clone, PartialEq)]
pub enum CoercedValue {
    Null,
    Bool(bool),
    I64(i64),
    U64(u64),
    F64(f64),
    String(String),
    Bytes(Vec<u8>),
    Seq(Vec<CoercedValue>),
    /// Entries in declaration (or source) order.
    Map(Vec<(String, CoercedValue)>),
}

impl CoercedValue {
    /// Convert to JSON. Non-finite floats become `null`; bytes become a
    /// string when they are UTF-8 and an array of numbers otherwise.
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value as Json;
        match self {
            Self::Null => Json::Null,
            Self::Bool(b) => Json::Bool(*b),
            Self::I64(i) => Json::from(*i),
            Self::U64(u) => Json::from(*u),
            Self::F64(f) => serde_json::Number::from_f64(*f).map_or(Json::Null, Json::Number),
            Self::String(s) => Json::String(s.clone()),
            Self::Bytes(b) => match std::str::from_utf8(b) {
                Ok(s) => Json::String(s.to_string()),
                Err(_) => Json::Array(b.iter().map(|byte| Json::from(*byte)).collect()),
            },
            Self::Seq(items) => Json::Array(items.iter().map(Self::to_json).collect()),
            Self::Map(entries) => Json::Object(
                entries
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
        }
    }

    fn unexpected(&self) -> Unexpected<'_> {
        match self {
            Self::Null => Unexpected::Unit,
            Self::Bool(b) => Unexpected::Bool(*b),
            Self::I64(i) => Unexpected::Signed(*i),
            Self::U64(u) => Unexpected::Unsigned(*u),
            Self::F64(f) => Unexpected::Float(*f),
            Self::String(s) => Unexpected::Str(s),
            Self::Bytes(b) => Unexpected::Bytes(b),
            Self::Seq(_) => Unexpected::Seq,
            Self::Map(_) => Unexpected::Map,
        }
    }
}

/// Failure reading a [`CoercedValue`] into a record.
///
/// Messages describe the kind of the offending value, never its content,
/// so they are safe to surface for sensitive fields.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{msg}")]
pub struct DeError {
    msg: String,
}

impl de::Error for DeError {
    fn custom<T>(msg: T) -> Self
    where
        T: std::fmt::Display,
    {
        Self {
            msg: msg.to_string(),
        }
    }

    fn invalid_type(unexp: Unexpected<'_>, exp: &dyn Expected) -> Self {
        Self::custom(format_args!("invalid type: {}, expected {exp}", describe(&unexp)))
    }

    fn invalid_value(unexp: Unexpected<'_>, exp: &dyn Expected) -> Self {
        Self::custom(format_args!("invalid value: {}, expected {exp}", describe(&unexp)))
    }
}

fn describe(unexp: &Unexpected<'_>) -> &'static str {
    match unexp {
        Unexpected::Bool(_) => "a boolean",
        Unexpected::Unsigned(_) | Unexpected::Signed(_) | Unexpected::Float(_) => "a number",
        Unexpected::Char(_) | Unexpected::Str(_) => "a string",
        Unexpected::Bytes(_) => "bytes",
        Unexpected::Unit => "null",
        Unexpected::Option => "an optional value",
        Unexpected::Seq => "a sequence",
        Unexpected::Map => "a map",
        Unexpected::Enum | Unexpected::UnitVariant => "an enum variant",
        _ => "an unexpected value",
    }
}

impl<'de> de::Deserializer<'de> for CoercedValue {
    type Error = DeError;

    fn deserialize_any<V>(self, visitor: V) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        match self {
            Self::Null => visitor.visit_unit(),
            Self::Bool(b) => visitor.visit_bool(b),
            Self::I64(i) => visitor.visit_i64(i),
            Self::U64(u) => visitor.visit_u64(u),
            Self::F64(f) => visitor.visit_f64(f),
            Self::String(s) => visitor.visit_string(s),
            Self::Bytes(b) => visitor.visit_byte_buf(b),
            Self::Seq(items) => {
                let mut seq = SeqDeserializer::<_, DeError>::new(items.into_iter());
                let value = visitor.visit_seq(&mut seq)?;
                seq.end()?;
                Ok(value)
            }
            Self::Map(entries) => {
                let mut map = MapDeserializer::<_, DeError>::new(entries.into_iter());
                let value = visitor.visit_map(&mut map)?;
                map.end()?;
                Ok(value)
            }
        }
    }

    fn deserialize_option<V>(self, visitor: V) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        match self {
            Self::Null => visitor.visit_none(),
            other => visitor.visit_some(other),
        }
    }

    fn deserialize_newtype_struct<V>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        visitor.visit_newtype_struct(self)
    }

    fn deserialize_enum<V>(
        self,
        _name: &'static str,
        _variants: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        match self {
            Self::String(s) => visitor.visit_enum(s.into_deserializer()),
            Self::Map(entries) if entries.len() == 1 => visitor.visit_enum(
                MapAccessDeserializer::new(MapDeserializer::new(entries.into_iter())),
            ),
            other => Err(de::Error::invalid_type(other.unexpected(), &"an enum variant")),
        }
    }

    fn deserialize_ignored_any<V>(self, visitor: V) -> Result<V::Value, Self::Error>
    where
        V: Visitor<'de>,
    {
        drop(self);
        visitor.visit_unit()
    }

    forward_to_deserialize_any! {
        bool i8 i16 i32 i64 i128 u8 u16 u32 u64 u128 f32 f64 char str string
        bytes byte_buf unit unit_struct seq tuple tuple_struct map struct
        identifier
    }
}

impl<'de> IntoDeserializer<'de, DeError> for CoercedValue {
    type Deserializer = Self;

    fn into_deserializer(self) -> Self::Deserializer {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use std::collections::BTreeMap;

    #[derive(Debug, Deserialize, PartialEq)]
    enum Color {
        Red,
        Green,
    }

    #[derive(Debug, Deserialize, PartialEq)]
    struct Sample {
        id: u32,
        ratio: f64,
        name: String,
        nickname: Option<String>,
        tags: Vec<String>,
        labels: BTreeMap<String, i64>,
        color: Color,
    }

    fn sample() -> CoercedValue {
        CoercedValue::Map(vec![
            ("id".to_string(), CoercedValue::U64(7)),
            ("ratio".to_string(), CoercedValue::F64(f64::INFINITY)),
            ("name".to_string(), CoercedValue::String("x".to_string())),
            ("nickname".to_string(), CoercedValue::Null),
            (
                "tags".to_string(),
                CoercedValue::Seq(vec![CoercedValue::String("a".to_string())]),
            ),
            (
                "labels".to_string(),
                CoercedValue::Map(vec![("k".to_string(), CoercedValue::I64(-3))]),
            ),
            ("color".to_string(), CoercedValue::String("Green".to_string())),
        ])
    }

    #[test]
    fn test_deserialize_record() {
        let s = Sample::deserialize(sample()).unwrap();
        assert_eq!(s.id, 7);
        assert!(s.ratio.is_infinite());
        assert_eq!(s.nickname, None);
        assert_eq!(s.tags, vec!["a".to_string()]);
        assert_eq!(s.labels.get("k"), Some(&-3));
        assert_eq!(s.color, Color::Green);
    }

    #[test]
    fn test_out_of_range_integer_rejected() {
        let err = u8::deserialize(CoercedValue::I64(300)).unwrap_err();
        assert!(err.to_string().contains("a number"));
    }

    #[test]
    fn test_error_message_hides_content() {
        let err = i64::deserialize(CoercedValue::String("hunter2".to_string())).unwrap_err();
        assert!(!err.to_string().contains("hunter2"));
        assert!(err.to_string().contains("a string"));
    }

    #[test]
    fn test_into_json_value() {
        let json = serde_json::Value::deserialize(CoercedValue::Map(vec![(
            "a".to_string(),
            CoercedValue::Seq(vec![CoercedValue::Bool(true), CoercedValue::Null]),
        )]))
        .unwrap();
        assert_eq!(json, serde_json::json!({"a": [true, null]}));
    }

    #[test]
    fn test_to_json_non_finite_is_null() {
        assert_eq!(CoercedValue::F64(f64::NAN).to_json(), serde_json::Value::Null);
        assert_eq!(
            CoercedValue::Bytes(b"{}".to_vec()).to_json(),
            serde_json::json!("{}")
        );
    }
}
