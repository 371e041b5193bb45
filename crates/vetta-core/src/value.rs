//! # Decoded Value Tree
//!
//! The format-independent intermediate representation produced by every
//! decoder and consumed by the coercion engine.
//!
//! ## Invariants
//!
//! - A tree is built fresh per decode call and never mutated afterwards.
//! - Object keys are unique. Insertion order is preserved so error paths
//!   are reported deterministically; it carries no meaning for coercion.
//! - Numbers keep their source text whenever the decoder exposes it, so a
//!   later widening to 64-bit integers never goes through a lossy float.
//! - Nodes carry the byte span they were decoded from when the decoder can
//!   report one, which is what raw-passthrough capture relies on.

use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;

use crate::format::Format;

/// Half-open byte range `[start, end)` into a decoded source buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Span {
    /// First byte of the node.
    pub start: usize,
    /// One past the last byte of the node.
    pub end: usize,
}

impl Span {
    /// Create a span covering `start..end`.
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// Length of the span in bytes.
    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    /// Returns true if the span covers no bytes.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, PartialEq)]
enum NumberRepr {
    Text(Box<str>),
    Float(f64),
}

/// A decoded number.
///
/// Either the literal source text (arbitrary precision) or an `f64` when
/// the decoder only exposes a binary float.
#[derive(Debug, Clone, PartialEq)]
pub struct Number(NumberRepr);

/// Largest magnitude an integral float may have and still be handed out
/// as an `i128`.
const I128_FLOAT_BOUND: f64 = 1.7e38;

impl Number {
    /// A number backed by its literal source text.
    ///
    /// The text is expected to be a valid numeric literal; decoders only
    /// call this with tokens their tokenizer already classified as numbers.
    pub fn from_text(text: impl Into<Box<str>>) -> Self {
        Self(NumberRepr::Text(text.into()))
    }

    /// A number backed by a binary float.
    pub fn from_f64(value: f64) -> Self {
        Self(NumberRepr::Float(value))
    }

    /// The number as written in the source, or the float's shortest
    /// round-trip rendering.
    pub fn as_text(&self) -> Cow<'_, str> {
        match &self.0 {
            NumberRepr::Text(t) => Cow::Borrowed(t),
            NumberRepr::Float(f) => Cow::Owned(format_float(*f)),
        }
    }

    /// The exact integral value, if the number has one.
    ///
    /// Integer literals parse exactly. Literals with a fraction or exponent,
    /// and binary floats, are accepted only when they are finite and have
    /// no fractional part (`1.0`, `1e3`). Anything else returns `None`.
    pub fn as_i128(&self) -> Option<i128> {
        match &self.0 {
            NumberRepr::Text(t) => match t.parse::<i128>() {
                Ok(i) => Some(i),
                Err(_) => t.parse::<f64>().ok().and_then(integral_f64),
            },
            NumberRepr::Float(f) => integral_f64(*f),
        }
    }

    /// The value as an `f64`, with standard binary rounding.
    pub fn as_f64(&self) -> f64 {
        match &self.0 {
            NumberRepr::Text(t) => t.parse::<f64>().unwrap_or(f64::NAN),
            NumberRepr::Float(f) => *f,
        }
    }

    /// Returns true if the number was written as an integer literal.
    pub fn is_integer_literal(&self) -> bool {
        match &self.0 {
            NumberRepr::Text(t) => t.parse::<i128>().is_ok(),
            NumberRepr::Float(_) => false,
        }
    }

    /// Returns true if the decoder only exposed a binary float (YAML).
    pub fn is_binary_float(&self) -> bool {
        matches!(self.0, NumberRepr::Float(_))
    }

    /// Canonical textual form: integers without exponent or fraction,
    /// everything else as the shortest float rendering.
    pub fn canonical(&self) -> String {
        if self.is_integer_literal() {
            if let Some(i) = self.as_i128() {
                return i.to_string();
            }
        }
        format_float(self.as_f64())
    }
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_text())
    }
}

fn integral_f64(f: f64) -> Option<i128> {
    if f.is_finite() && f.fract() == 0.0 && f.abs() < I128_FLOAT_BOUND {
        Some(f as i128)
    } else {
        None
    }
}

fn format_float(f: f64) -> String {
    if f.is_nan() {
        "NaN".to_string()
    } else if f == f64::INFINITY {
        "Infinity".to_string()
    } else if f == f64::NEG_INFINITY {
        "-Infinity".to_string()
    } else {
        f.to_string()
    }
}

/// Insertion-ordered mapping of unique string keys to nodes.
///
/// Lookups and inserts go through a key index, so building an object of
/// `n` keys is linear in `n`.
#[derive(Debug, Clone, Default)]
pub struct Object {
    entries: Vec<(String, Node)>,
    index: HashMap<String, usize>,
}

impl PartialEq for Object {
    fn eq(&self, other: &Self) -> bool {
        self.entries == other.entries
    }
}

impl Object {
    /// Create an empty object.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an entry. A repeated key replaces the earlier value in place,
    /// keeping the position of its first occurrence.
    pub fn insert(&mut self, key: String, node: Node) {
        match self.index.get(&key).and_then(|&i| self.entries.get_mut(i)) {
            Some(slot) => slot.1 = node,
            None => {
                self.index.insert(key.clone(), self.entries.len());
                self.entries.push((key, node));
            }
        }
    }

    /// Look up a key.
    pub fn get(&self, key: &str) -> Option<&Node> {
        self.index
            .get(key)
            .and_then(|&i| self.entries.get(i))
            .map(|(_, n)| n)
    }

    /// Returns true if the key is present.
    pub fn contains_key(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }

    /// Iterate entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Node)> {
        self.entries.iter().map(|(k, n)| (k.as_str(), n))
    }

    /// Keys in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if there are no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<(String, Node)> for Object {
    fn from_iter<I: IntoIterator<Item = (String, Node)>>(iter: I) -> Self {
        let mut object = Object::new();
        for (k, v) in iter {
            object.insert(k, v);
        }
        object
    }
}

/// The payload of a decoded node.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Explicit null.
    Null,
    /// Boolean.
    Bool(bool),
    /// Number, textual or binary.
    Number(Number),
    /// String.
    String(String),
    /// Ordered sequence.
    Array(Vec<Node>),
    /// Ordered-key mapping.
    Object(Object),
}

impl Value {
    /// Short kind name used in type-mismatch messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "boolean",
            Self::Number(_) => "number",
            Self::String(_) => "string",
            Self::Array(_) => "array",
            Self::Object(_) => "object",
        }
    }
}

/// One node of the decoded value tree.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    value: Value,
    span: Option<Span>,
}

impl Node {
    /// A node with no source span.
    pub fn new(value: Value) -> Self {
        Self { value, span: None }
    }

    /// A node decoded from `span` of the source buffer.
    pub fn with_span(value: Value, span: Span) -> Self {
        Self {
            value,
            span: Some(span),
        }
    }

    /// The node's payload.
    pub fn value(&self) -> &Value {
        &self.value
    }

    /// The source span, when the decoder reported one.
    pub fn span(&self) -> Option<Span> {
        self.span
    }

    /// Returns true for an explicit null.
    pub fn is_null(&self) -> bool {
        matches!(self.value, Value::Null)
    }

    /// Short kind name of the payload.
    pub fn kind(&self) -> &'static str {
        self.value.kind()
    }

    /// The payload as an object, if it is one.
    pub fn as_object(&self) -> Option<&Object> {
        match &self.value {
            Value::Object(o) => Some(o),
            _ => None,
        }
    }

    /// Convert the subtree into a `serde_json::Value`.
    ///
    /// Numbers that JSON cannot represent (non-finite floats) become `null`.
    pub fn to_json(&self) -> serde_json::Value {
        match &self.value {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Number(n) => number_to_json(n),
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::Array(items) => serde_json::Value::Array(items.iter().map(Node::to_json).collect()),
            Value::Object(o) => serde_json::Value::Object(
                o.iter().map(|(k, v)| (k.to_string(), v.to_json())).collect(),
            ),
        }
    }
}

fn number_to_json(n: &Number) -> serde_json::Value {
    if let Some(i) = n.as_i128().filter(|_| n.is_integer_literal()) {
        if let Ok(i) = i64::try_from(i) {
            return serde_json::Value::from(i);
        }
        if let Ok(u) = u64::try_from(i) {
            return serde_json::Value::from(u);
        }
    }
    serde_json::Number::from_f64(n.as_f64())
        .map(serde_json::Value::Number)
        .unwrap_or(serde_json::Value::Null)
}

/// A decoded document: the value tree plus the buffer it was decoded from.
#[derive(Debug, Clone)]
pub struct Document<'a> {
    format: Format,
    source: &'a [u8],
    root: Node,
}

impl<'a> Document<'a> {
    /// Assemble a document. Used by decoders.
    pub fn new(format: Format, source: &'a [u8], root: Node) -> Self {
        Self {
            format,
            source,
            root,
        }
    }

    /// Format the document was decoded as.
    pub fn format(&self) -> Format {
        self.format
    }

    /// The source buffer.
    pub fn source(&self) -> &'a [u8] {
        self.source
    }

    /// Root node.
    pub fn root(&self) -> &Node {
        &self.root
    }

    /// Consume the document, returning the root node.
    pub fn into_root(self) -> Node {
        self.root
    }

    /// The exact source bytes of `node`.
    ///
    /// When the decoder could not report a span (YAML), the node is rendered
    /// as compact JSON instead.
    pub fn raw(&self, node: &Node) -> Cow<'a, [u8]> {
        match node.span().and_then(|s| self.source.get(s.start..s.end)) {
            Some(bytes) => Cow::Borrowed(bytes),
            None => Cow::Owned(node.to_json().to_string().into_bytes()),
        }
    }
}
