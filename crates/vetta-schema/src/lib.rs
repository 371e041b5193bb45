//! # vetta-schema — Record Metadata and Type Coercion
//!
//! Maps a decoded value tree onto a concrete record type.
//!
//! - [`meta`]: per-type field metadata (source keys per format, field kind,
//!   parsed validation rules), resolved once and cached.
//! - [`coerce`]: the lenient coercion engine. Converts source values to the
//!   declared field kinds and collects every failure with its field path.
//! - [`de`]: the serde `Deserializer` that hands the coerced tree to the
//!   record's own `Deserialize` impl.
//! - [`raw`]: [`RawDocument`], a field type that captures a sub-document's
//!   exact bytes.
//!
//! ## Crate Policy
//!
//! - Depends only on `vetta-core` within the workspace.
//! - Coercion is collect-all: a bad field never hides the next one.
//! - Offending values in error messages are redacted for sensitive paths.

pub mod coerce;
pub mod de;
pub mod error;
pub mod meta;
pub mod raw;

pub use coerce::{coerce, coerce_value, coerce_with, CoerceOptions};
pub use de::{CoercedValue, DeError};
pub use error::{CoercionError, CoercionErrorKind, CoercionErrors};
pub use meta::{
    parse_rules, resolve, FieldBuilder, FieldKind, FieldMeta, FloatWidth, IntWidth, Record, RecordBuilder,
    RecordMeta, RecordRef, Rule, RuleParams,
};
pub use raw::RawDocument;
