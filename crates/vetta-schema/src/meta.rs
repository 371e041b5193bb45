//! # Field Metadata
//!
//! Describes a target record once per type: which source key feeds each
//! field in each format, the field's kind (and therefore how the coercion
//! engine treats it), and the validation rules parsed from its tag.
//!
//! ## Resolution
//!
//! A Rust type opts in by implementing [`Record`]. [`resolve`] runs
//! [`Record::describe`] the first time a type is seen and caches the
//! resulting [`RecordMeta`] by `TypeId`. Cached metadata is immutable and
//! shared read-only across threads.
//!
//! Nested records are referenced through [`RecordRef`], which resolves
//! lazily. Self-referential types therefore describe themselves without
//! recursing at resolution time.
//!
//! ## Tag grammar
//!
//! ```text
//! tag    := rule ("," rule)*
//! rule   := name ("=" value)?
//! value  := part ("|" part)*
//! part   := ident ":" text      named parameter
//!         | text                appended to the `value` parameter
//! ```
//!
//! `min=3` yields `{value: "3"}`; `between=min:1|max:5` yields
//! `{min: "1", max: "5"}`.

use std::any::TypeId;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::Serialize;
use vetta_core::{ConfigurationError, Format};

/// Name of the parameter holding a rule's positional value.
pub const VALUE_PARAM: &str = "value";

/// Width and signedness of an integer field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IntWidth {
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
}

impl IntWidth {
    /// Inclusive bounds of the target type.
    pub fn bounds(self) -> (i128, i128) {
        match self {
            Self::I8 => (i8::MIN.into(), i8::MAX.into()),
            Self::I16 => (i16::MIN.into(), i16::MAX.into()),
            Self::I32 => (i32::MIN.into(), i32::MAX.into()),
            Self::I64 => (i64::MIN.into(), i64::MAX.into()),
            Self::U8 => (0, u8::MAX.into()),
            Self::U16 => (0, u16::MAX.into()),
            Self::U32 => (0, u32::MAX.into()),
            Self::U64 => (0, u64::MAX.into()),
        }
    }

    /// Returns true for signed widths.
    pub fn is_signed(self) -> bool {
        matches!(self, Self::I8 | Self::I16 | Self::I32 | Self::I64)
    }

    /// Name used in messages, e.g. `int32`, `uint8`.
    pub fn name(self) -> &'static str {
        match self {
            Self::I8 => "int8",
            Self::I16 => "int16",
            Self::I32 => "int32",
            Self::I64 => "int64",
            Self::U8 => "uint8",
            Self::U16 => "uint16",
            Self::U32 => "uint32",
            Self::U64 => "uint64",
        }
    }
}

/// Precision of a floating-point field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FloatWidth {
    F32,
    F64,
}

impl FloatWidth {
    /// Largest finite magnitude the target type can hold.
    pub fn max(self) -> f64 {
        match self {
            Self::F32 => f64::from(f32::MAX),
            Self::F64 => f64::MAX,
        }
    }

    /// Name used in messages, `float32` or `float64`.
    pub fn name(self) -> &'static str {
        match self {
            Self::F32 => "float32",
            Self::F64 => "float64",
        }
    }
}

/// How the coercion engine treats a field.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldKind {
    /// `bool`.
    Bool,
    /// Any primitive integer.
    Int(IntWidth),
    /// `f32` or `f64`.
    Float(FloatWidth),
    /// `String` (or anything deserializable from a string).
    String,
    /// `chrono::DateTime<Utc>`.
    Timestamp,
    /// `Option<T>`: absent and null both leave the field unset.
    Optional(Box<FieldKind>),
    /// `Vec<T>` or another ordered container.
    Array(Box<FieldKind>),
    /// `HashMap<String, T>`, `BTreeMap<String, T>`, ...
    Map(Box<FieldKind>),
    /// A nested record.
    Record(RecordRef),
    /// Opaque sub-document captured verbatim (see `RawDocument`).
    Raw,
    /// Dynamic value, e.g. `serde_json::Value`.
    Any,
}

impl FieldKind {
    pub const I8: FieldKind = FieldKind::Int(IntWidth::I8);
    pub const I16: FieldKind = FieldKind::Int(IntWidth::I16);
    pub const I32: FieldKind = FieldKind::Int(IntWidth::I32);
    pub const I64: FieldKind = FieldKind::Int(IntWidth::I64);
    pub const U8: FieldKind = FieldKind::Int(IntWidth::U8);
    pub const U16: FieldKind = FieldKind::Int(IntWidth::U16);
    pub const U32: FieldKind = FieldKind::Int(IntWidth::U32);
    pub const U64: FieldKind = FieldKind::Int(IntWidth::U64);
    pub const F32: FieldKind = FieldKind::Float(FloatWidth::F32);
    pub const F64: FieldKind = FieldKind::Float(FloatWidth::F64);

    /// `Option<inner>`.
    pub fn optional(inner: FieldKind) -> Self {
        Self::Optional(Box::new(inner))
    }

    /// `Vec<inner>`.
    pub fn array(inner: FieldKind) -> Self {
        Self::Array(Box::new(inner))
    }

    /// String-keyed map of `inner`.
    pub fn map(inner: FieldKind) -> Self {
        Self::Map(Box::new(inner))
    }

    /// Nested record of type `T`.
    pub fn record<T: Record>() -> Self {
        Self::Record(RecordRef::of::<T>())
    }

    /// Returns true for `Optional` kinds.
    pub fn is_optional(&self) -> bool {
        matches!(self, Self::Optional(_))
    }

    /// The nested record reachable through optionals, arrays, and maps.
    pub fn nested_record(&self) -> Option<&RecordRef> {
        match self {
            Self::Record(r) => Some(r),
            Self::Optional(inner) | Self::Array(inner) | Self::Map(inner) => inner.nested_record(),
            _ => None,
        }
    }

    /// Human-readable type name used in mismatch messages.
    pub fn type_name(&self) -> String {
        match self {
            Self::Bool => "boolean".to_string(),
            Self::Int(w) => w.name().to_string(),
            Self::Float(w) => w.name().to_string(),
            Self::String => "string".to_string(),
            Self::Timestamp => "timestamp".to_string(),
            Self::Optional(inner) => format!("optional {}", inner.type_name()),
            Self::Array(inner) => format!("array of {}", inner.type_name()),
            Self::Map(inner) => format!("map of {}", inner.type_name()),
            Self::Record(r) => format!("record {}", r.name()),
            Self::Raw => "raw document".to_string(),
            Self::Any => "any value".to_string(),
        }
    }
}

/// A lazily resolved reference to a nested record's metadata.
#[derive(Clone)]
pub enum RecordRef {
    /// A Rust type implementing [`Record`].
    Typed {
        /// Identity of the type.
        type_id: fn() -> TypeId,
        /// Short type name.
        name: fn() -> &'static str,
        /// Resolver for the type's metadata.
        resolve: fn() -> Result<Arc<RecordMeta>, ConfigurationError>,
    },
    /// Metadata built at runtime without a backing Rust type.
    Dynamic(Arc<RecordMeta>),
}

impl RecordRef {
    /// Reference to the metadata of `T`.
    pub fn of<T: Record>() -> Self {
        Self::Typed {
            type_id: TypeId::of::<T>,
            name: short_type_name::<T>,
            resolve: resolve::<T>,
        }
    }

    /// Record name.
    pub fn name(&self) -> &str {
        match self {
            Self::Typed { name, .. } => name(),
            Self::Dynamic(meta) => meta.name(),
        }
    }

    /// Resolve the referenced metadata.
    pub fn resolve(&self) -> Result<Arc<RecordMeta>, ConfigurationError> {
        match self {
            Self::Typed { resolve, .. } => resolve(),
            Self::Dynamic(meta) => Ok(Arc::clone(meta)),
        }
    }
}

impl fmt::Debug for RecordRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("RecordRef").field(&self.name()).finish()
    }
}

/// Typed references are equal when they name the same Rust type; dynamic
/// references when they share the same metadata allocation.
impl PartialEq for RecordRef {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Typed { type_id: a, .. }, Self::Typed { type_id: b, .. }) => a() == b(),
            (Self::Dynamic(a), Self::Dynamic(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

/// Named parameters of one rule, in key order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleParams(BTreeMap<String, String>);

impl RuleParams {
    /// Empty parameters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parameters holding only a positional value.
    pub fn with_value(value: impl Into<String>) -> Self {
        let mut params = Self::new();
        params.insert(VALUE_PARAM, value);
        params
    }

    /// Set a parameter.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    /// Look up a parameter.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// The positional value.
    pub fn value(&self) -> Option<&str> {
        self.get(VALUE_PARAM)
    }

    /// Parse a parameter. `None` if absent.
    pub fn parse<T: FromStr>(&self, key: &str) -> Option<Result<T, T::Err>> {
        self.get(key).map(|v| v.trim().parse())
    }

    /// Parse the positional value. `None` if absent.
    pub fn parse_value<T: FromStr>(&self) -> Option<Result<T, T::Err>> {
        self.parse(VALUE_PARAM)
    }

    /// Iterate parameters in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Number of parameters.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if there are no parameters.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// One declared validation rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    name: String,
    params: RuleParams,
}

impl Rule {
    /// A rule with explicit parameters.
    pub fn new(name: impl Into<String>, params: RuleParams) -> Self {
        Self {
            name: name.into(),
            params,
        }
    }

    /// Rule name, the registry lookup key.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Rule parameters.
    pub fn params(&self) -> &RuleParams {
        &self.params
    }
}

/// Returns true if `name` is a usable rule name (`[A-Za-z0-9_]+`).
pub fn is_valid_rule_name(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn is_param_ident(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Parse a validation tag into its ordered rule list.
///
/// Returns the reason on failure; the caller attaches field context.
pub fn parse_rules(tag: &str) -> Result<Vec<Rule>, String> {
    let mut rules = Vec::new();
    for segment in tag.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let (name, raw_value) = match segment.split_once('=') {
            Some((name, value)) => (name.trim(), Some(value.trim())),
            None => (segment, None),
        };
        if !is_valid_rule_name(name) {
            return Err(format!("invalid rule name {name:?}"));
        }
        let mut params = RuleParams::new();
        if let Some(raw_value) = raw_value {
            if raw_value.is_empty() {
                return Err(format!("rule '{name}' has an empty value"));
            }
            let mut positional: Vec<&str> = Vec::new();
            for part in raw_value.split('|') {
                match part.split_once(':') {
                    Some((key, value)) if is_param_ident(key.trim()) => {
                        params.insert(key.trim(), value.trim());
                    }
                    _ => positional.push(part),
                }
            }
            if !positional.is_empty() {
                params.insert(VALUE_PARAM, positional.join("|"));
            }
        }
        rules.push(Rule::new(name, params));
    }
    Ok(rules)
}

/// Metadata for one field of a record.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldMeta {
    name: String,
    json_key: String,
    yaml_key: String,
    kind: FieldKind,
    tag: String,
    rules: Vec<Rule>,
}

impl FieldMeta {
    fn new(name: &str, kind: FieldKind) -> Self {
        Self {
            name: name.to_string(),
            json_key: name.to_string(),
            yaml_key: name.to_string(),
            kind,
            tag: String::new(),
            rules: Vec::new(),
        }
    }

    /// Field name, as the record's `Serialize`/`Deserialize` impls spell it.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Source key for `format`.
    pub fn key(&self, format: Format) -> &str {
        match format {
            Format::Json => &self.json_key,
            Format::Yaml => &self.yaml_key,
        }
    }

    /// Field kind.
    pub fn kind(&self) -> &FieldKind {
        &self.kind
    }

    /// The raw validation tag.
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Parsed rules, in tag order.
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// Returns true if a `required` rule is declared.
    pub fn is_required(&self) -> bool {
        self.rules.iter().any(|r| r.name() == "required")
    }

    /// Returns true if the field is optional.
    pub fn is_optional(&self) -> bool {
        self.kind.is_optional()
    }

    /// Returns true if the field captures raw bytes.
    pub fn is_raw(&self) -> bool {
        matches!(self.kind, FieldKind::Raw)
            || matches!(&self.kind, FieldKind::Optional(inner) if **inner == FieldKind::Raw)
    }
}

/// Metadata for a whole record.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordMeta {
    name: String,
    fields: Vec<FieldMeta>,
}

impl RecordMeta {
    /// Start describing a record without a backing Rust type.
    pub fn builder(name: impl Into<String>) -> RecordBuilder {
        RecordBuilder::new(name)
    }

    /// Record name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Fields in declaration order.
    pub fn fields(&self) -> &[FieldMeta] {
        &self.fields
    }

    /// Look up a field by name.
    pub fn field(&self, name: &str) -> Option<&FieldMeta> {
        self.fields.iter().find(|f| f.name == name)
    }
}

/// Collects field metadata for one record.
#[derive(Debug)]
pub struct RecordBuilder {
    name: String,
    fields: Vec<FieldMeta>,
    errors: Vec<ConfigurationError>,
}

impl RecordBuilder {
    /// A builder for a record called `name`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
            errors: Vec::new(),
        }
    }

    /// Declare a field. Its source key defaults to `name` in every format.
    pub fn field(&mut self, name: &str, kind: FieldKind) -> FieldBuilder<'_> {
        self.fields.push(FieldMeta::new(name, kind));
        let index = self.fields.len() - 1;
        FieldBuilder {
            builder: self,
            index,
        }
    }

    /// Finish the record.
    ///
    /// # Errors
    ///
    /// Returns the first invalid tag, or `DuplicateField` if two fields
    /// share a name or a source key in the same format.
    pub fn build(mut self) -> Result<RecordMeta, ConfigurationError> {
        if !self.errors.is_empty() {
            return Err(self.errors.remove(0));
        }
        for (i, field) in self.fields.iter().enumerate() {
            for other in &self.fields[..i] {
                let clash = if other.name == field.name {
                    Some(&field.name)
                } else if other.json_key == field.json_key {
                    Some(&field.json_key)
                } else if other.yaml_key == field.yaml_key {
                    Some(&field.yaml_key)
                } else {
                    None
                };
                if let Some(name) = clash {
                    return Err(ConfigurationError::DuplicateField {
                        record: self.name.clone(),
                        name: name.clone(),
                    });
                }
            }
        }
        Ok(RecordMeta {
            name: self.name,
            fields: self.fields,
        })
    }
}

/// Refines the field just declared on a [`RecordBuilder`].
#[derive(Debug)]
pub struct FieldBuilder<'b> {
    builder: &'b mut RecordBuilder,
    index: usize,
}

impl<'b> FieldBuilder<'b> {
    fn meta(&mut self) -> &mut FieldMeta {
        &mut self.builder.fields[self.index]
    }

    /// Source key in every format.
    pub fn key(mut self, key: &str) -> Self {
        let meta = self.meta();
        meta.json_key = key.to_string();
        meta.yaml_key = key.to_string();
        self
    }

    /// Source key for JSON input.
    pub fn json(mut self, key: &str) -> Self {
        self.meta().json_key = key.to_string();
        self
    }

    /// Source key for YAML input.
    pub fn yaml(mut self, key: &str) -> Self {
        self.meta().yaml_key = key.to_string();
        self
    }

    /// Validation tag, e.g. `"required,min=3,max=50"`.
    pub fn validate(mut self, tag: &str) -> Self {
        match parse_rules(tag) {
            Ok(rules) => {
                let meta = self.meta();
                meta.tag = tag.to_string();
                meta.rules = rules;
            }
            Err(reason) => {
                let field = self.meta().name.clone();
                self.builder.errors.push(ConfigurationError::InvalidTag {
                    field,
                    tag: tag.to_string(),
                    reason,
                });
            }
        }
        self
    }
}

/// A type the pipeline can decode into and validate.
///
/// `describe` must declare every field the type's `Deserialize` impl
/// expects, using the same field names.
///
/// ```
/// use serde::{Deserialize, Serialize};
/// use vetta_schema::{FieldKind, Record, RecordBuilder};
///
/// #[derive(Debug, Serialize, Deserialize)]
/// struct User {
///     id: i64,
///     email: String,
///     nickname: Option<String>,
/// }
///
/// impl Record for User {
///     fn describe(record: &mut RecordBuilder) {
///         record.field("id", FieldKind::I64).validate("required,min=1");
///         record.field("email", FieldKind::String).validate("required,email");
///         record.field("nickname", FieldKind::optional(FieldKind::String)).yaml("nick");
///     }
/// }
/// ```
pub trait Record: Serialize + DeserializeOwned + 'static {
    /// Declare the record's fields.
    fn describe(record: &mut RecordBuilder);
}

static CACHE: RwLock<BTreeMap<TypeId, Arc<RecordMeta>>> =
    parking_lot::const_rwlock(BTreeMap::new());

/// Resolve (and cache) the metadata of `T`.
///
/// # Errors
///
/// Returns the `ConfigurationError` from [`RecordBuilder::build`]. Failed
/// resolutions are not cached.
pub fn resolve<T: Record>() -> Result<Arc<RecordMeta>, ConfigurationError> {
    let id = TypeId::of::<T>();
    if let Some(meta) = CACHE.read().get(&id) {
        return Ok(Arc::clone(meta));
    }

    let mut builder = RecordBuilder::new(short_type_name::<T>());
    T::describe(&mut builder);
    let meta = Arc::new(builder.build()?);
    tracing::debug!(
        record = meta.name(),
        fields = meta.fields().len(),
        "resolved record metadata"
    );

    Ok(Arc::clone(CACHE.write().entry(id).or_insert(meta)))
}

/// `crate::module::Type<Args>` → `Type`.
fn short_type_name<T: ?Sized>() -> &'static str {
    let full = std::any::type_name::<T>();
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}
