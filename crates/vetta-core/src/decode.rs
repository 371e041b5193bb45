//! # Format Decoders
//!
//! Turns raw bytes into a [`Document`]. Tokenization is delegated to the
//! format's existing decoder (`serde_json`, `serde_yaml`); this module only
//! lifts their output into the shared value tree.
//!
//! ## JSON
//!
//! JSON is decoded level by level through `serde_json::value::RawValue`.
//! Every raw value borrows from the input buffer, so each node records the
//! exact byte span it came from. Numbers keep their literal text. Syntax
//! errors are reported with the byte offset derived from serde_json's
//! line and column.
//!
//! ## YAML
//!
//! YAML is decoded through `serde_yaml::Value`. Tags are ignored (the
//! tagged value is kept), mapping keys must be scalars, and nodes carry no
//! span. Syntax errors carry `Location::index()`.
//!
//! ## Limits
//!
//! [`decode`] rejects input larger than [`limits::max_input_size`] before
//! any tokenization happens.

use std::fmt;

use serde::de::{Deserialize, Deserializer, MapAccess, Visitor};
use serde_json::value::RawValue;

use crate::error::DecodeError;
use crate::format::{detect_format, Format};
use crate::limits;
use crate::value::{Document, Node, Number, Object, Span, Value};

/// A decoder for one serialization format.
pub trait Decoder: Send + Sync {
    /// The format this decoder understands.
    fn format(&self) -> Format;

    /// Decode `input` into a value tree.
    fn decode<'a>(&self, input: &'a [u8]) -> Result<Document<'a>, DecodeError>;
}

/// Decoder for JSON input.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonDecoder;

/// Decoder for YAML input.
#[derive(Debug, Clone, Copy, Default)]
pub struct YamlDecoder;

/// The decoder for `format`.
pub fn decoder_for(format: Format) -> &'static dyn Decoder {
    match format {
        Format::Json => &JsonDecoder,
        Format::Yaml => &YamlDecoder,
    }
}

/// Decode `input` as `format`, enforcing the process-wide input size limit.
///
/// # Errors
///
/// Returns `DecodeError::InputTooLarge` if the input exceeds the limit, or
/// the format decoder's error for malformed input.
pub fn decode(input: &[u8], format: Format) -> Result<Document<'_>, DecodeError> {
    let max = limits::max_input_size();
    if input.len() > max {
        tracing::debug!(size = input.len(), max, "input rejected before decoding");
        return Err(DecodeError::InputTooLarge {
            size: input.len(),
            max,
        });
    }
    let doc = decoder_for(format).decode(input)?;
    tracing::debug!(%format, size = input.len(), root = doc.root().kind(), "decoded input");
    Ok(doc)
}

/// Detect the format of `input` and decode it.
pub fn decode_auto(input: &[u8]) -> Result<Document<'_>, DecodeError> {
    decode(input, detect_format(input))
}

// ---------------------------------------------------------------------------
// JSON
// ---------------------------------------------------------------------------

impl Decoder for JsonDecoder {
    fn format(&self) -> Format {
        Format::Json
    }

    fn decode<'a>(&self, input: &'a [u8]) -> Result<Document<'a>, DecodeError> {
        let text = std::str::from_utf8(input).map_err(|e| DecodeError::InvalidUtf8 {
            offset: e.valid_up_to(),
        })?;
        let root: &RawValue =
            serde_json::from_str(text).map_err(|e| json_syntax_error(text, 0, &e))?;
        let root = json_node(text, root)?;
        Ok(Document::new(Format::Json, input, root))
    }
}

/// Object entries that still borrow their values as raw JSON.
struct RawEntries<'a>(Vec<(String, &'a RawValue)>);

impl<'de: 'a, 'a> Deserialize<'de> for RawEntries<'a> {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct EntriesVisitor<'a>(std::marker::PhantomData<&'a ()>);

        impl<'de: 'a, 'a> Visitor<'de> for EntriesVisitor<'a> {
            type Value = RawEntries<'a>;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a JSON object")
            }

            fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut entries = Vec::with_capacity(map.size_hint().unwrap_or(0));
                while let Some((key, value)) = map.next_entry::<String, &'de RawValue>()? {
                    entries.push((key, value));
                }
                Ok(RawEntries(entries))
            }
        }

        deserializer.deserialize_map(EntriesVisitor(std::marker::PhantomData))
    }
}

/// Byte offset of `raw` inside `text`. Raw values always borrow from the
/// buffer they were parsed from, so this is plain address arithmetic.
fn offset_in(text: &str, raw: &str) -> usize {
    (raw.as_ptr() as usize).saturating_sub(text.as_ptr() as usize)
}

fn json_node(text: &str, raw: &RawValue) -> Result<Node, DecodeError> {
    let s = raw.get();
    let start = offset_in(text, s);
    let span = Span::new(start, start + s.len());
    let parse_err = |e: serde_json::Error| json_syntax_error(s, start, &e);

    let value = match s.as_bytes().first() {
        Some(b'{') => {
            let RawEntries(entries) = serde_json::from_str(s).map_err(parse_err)?;
            let mut object = Object::new();
            for (key, child) in entries {
                object.insert(key, json_node(text, child)?);
            }
            Value::Object(object)
        }
        Some(b'[') => {
            let items: Vec<&RawValue> = serde_json::from_str(s).map_err(parse_err)?;
            Value::Array(
                items
                    .into_iter()
                    .map(|item| json_node(text, item))
                    .collect::<Result<_, _>>()?,
            )
        }
        Some(b'"') => Value::String(serde_json::from_str(s).map_err(parse_err)?),
        Some(b't') | Some(b'f') => Value::Bool(serde_json::from_str(s).map_err(parse_err)?),
        Some(b'n') => Value::Null,
        _ => Value::Number(Number::from_text(s)),
    };
    Ok(Node::with_span(value, span))
}

/// Convert serde_json's 1-based line/column into a byte offset into `text`,
/// shifted by `base` when `text` is a slice of a larger buffer.
fn json_syntax_error(text: &str, base: usize, err: &serde_json::Error) -> DecodeError {
    let offset = (err.line() > 0).then(|| {
        let line_start: usize = text
            .split_inclusive('\n')
            .take(err.line() - 1)
            .map(str::len)
            .sum();
        base + line_start + err.column().saturating_sub(1)
    });
    DecodeError::Syntax {
        format: Format::Json,
        offset,
        message: strip_position(&err.to_string()),
    }
}

/// serde_json appends " at line L column C"; the offset replaces it.
fn strip_position(message: &str) -> String {
    match message.rfind(" at line ") {
        Some(idx) => message[..idx].to_string(),
        None => message.to_string(),
    }
}

// ---------------------------------------------------------------------------
// YAML
// ---------------------------------------------------------------------------

impl Decoder for YamlDecoder {
    fn format(&self) -> Format {
        Format::Yaml
    }

    fn decode<'a>(&self, input: &'a [u8]) -> Result<Document<'a>, DecodeError> {
        let yaml: serde_yaml::Value = serde_yaml::from_slice(input).map_err(|e| {
            DecodeError::Syntax {
                format: Format::Yaml,
                offset: e.location().map(|l| l.index()),
                message: e.to_string(),
            }
        })?;
        let root = yaml_node(&yaml)?;
        Ok(Document::new(Format::Yaml, input, root))
    }
}

fn yaml_node(yaml: &serde_yaml::Value) -> Result<Node, DecodeError> {
    let value = match yaml {
        serde_yaml::Value::Null => Value::Null,
        serde_yaml::Value::Bool(b) => Value::Bool(*b),
        serde_yaml::Value::Number(n) => Value::Number(yaml_number(n)),
        serde_yaml::Value::String(s) => Value::String(s.clone()),
        serde_yaml::Value::Sequence(seq) => {
            Value::Array(seq.iter().map(yaml_node).collect::<Result<_, _>>()?)
        }
        serde_yaml::Value::Mapping(map) => {
            let mut object = Object::new();
            for (k, v) in map {
                object.insert(yaml_key(k)?, yaml_node(v)?);
            }
            Value::Object(object)
        }
        serde_yaml::Value::Tagged(tagged) => return yaml_node(&tagged.value),
    };
    Ok(Node::new(value))
}

fn yaml_number(n: &serde_yaml::Number) -> Number {
    if let Some(i) = n.as_i64() {
        Number::from_text(i.to_string())
    } else if let Some(u) = n.as_u64() {
        Number::from_text(u.to_string())
    } else {
        Number::from_f64(n.as_f64().unwrap_or(f64::NAN))
    }
}

fn yaml_key(key: &serde_yaml::Value) -> Result<String, DecodeError> {
    match key {
        serde_yaml::Value::String(s) => Ok(s.clone()),
        serde_yaml::Value::Number(n) => Ok(n.to_string()),
        serde_yaml::Value::Bool(b) => Ok(b.to_string()),
        serde_yaml::Value::Null => Ok("null".to_string()),
        serde_yaml::Value::Tagged(tagged) => yaml_key(&tagged.value),
        other => Err(DecodeError::UnsupportedKey {
            format: Format::Yaml,
            key: format!("{other:?}"),
        }),
    }
}
