//! # vetta-core — Foundational Types for vetta
//!
//! The leaf crate of the vetta workspace. It owns everything that sits
//! below record-level coercion: the format-independent value tree, format
//! detection, the JSON and YAML decoders, timestamp layouts, process-wide
//! limits, and sensitive-field redaction.
//!
//! ## Pipeline position
//!
//! ```text
//! bytes → detect_format → decode → Document (value tree) → vetta-schema
//! ```
//!
//! ## Crate Policy
//!
//! - No dependencies on other `vetta-*` crates (this is the leaf of the DAG).
//! - No `unsafe` code.
//! - No `panic!()` or `.unwrap()` outside tests; malformed input is always
//!   an error value.
//! - Shared state (limits, sensitive patterns) is lock-guarded and
//!   accessed only through functions in this crate.

pub mod decode;
pub mod error;
pub mod format;
pub mod limits;
pub mod redact;
pub mod timestamp;
pub mod value;

// Re-export primary types for ergonomic imports.
pub use decode::{decode, decode_auto, decoder_for, Decoder, JsonDecoder, YamlDecoder};
pub use error::{ConfigurationError, DecodeError, TimestampError};
pub use format::{detect_format, Format};
pub use limits::Limits;
pub use redact::{SensitiveFields, REDACTED};
pub use value::{Document, Node, Number, Object, Span, Value};
