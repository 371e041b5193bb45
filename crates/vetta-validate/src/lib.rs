//! # vetta-validate — Rule Registry and Validation Engine
//!
//! Validates coerced records against the rules declared in their field
//! metadata.
//!
//! - [`registry`]: name → validator lookup with three precedence tiers
//!   (cross-field function, single-field function, factory).
//! - [`builtin`]: the default rules and the opt-in cross-field set.
//! - [`engine`]: walks a record and collects every failure in one pass.
//! - [`error`] and [`report`]: the aggregated error list and its redacted,
//!   serializable report.
//!
//! ## Crate Policy
//!
//! - Validation never short-circuits. Every rule of every field runs.
//! - Misconfiguration (unknown rule, bad parameter) is a
//!   `ConfigurationError`, never a per-record validation failure.
//! - Values leave this crate only through redaction.

pub mod builtin;
pub mod engine;
pub mod error;
pub mod registry;
pub mod report;

pub use builtin::{register_builtins, register_cross_field_rules};
pub use engine::ValidationEngine;
pub use error::{ValidationError, ValidationErrors};
pub use registry::{EntryKind, RecordView, Registry, Validator, Violation};
pub use report::{ErrorReport, FieldReport, RuleFailure};
