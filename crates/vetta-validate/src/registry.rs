//! # Validator Registry
//!
//! Maps rule names to validators. Each name owns one slot with three tiers:
//!
//! | Tier | Registered with | Receives |
//! |------|-----------------|----------|
//! | cross-field function | [`Registry::register_cross_field`] | field value + [`RecordView`] |
//! | single-field function | [`Registry::register_fn`] | field value |
//! | factory | [`Registry::register`] | rule parameters, returns a [`Validator`] |
//!
//! Lookup precedence is cross-field, then single-field, then factory,
//! regardless of registration order. Re-registering within a tier replaces
//! the previous entry of that tier only.
//!
//! ## Concurrency
//!
//! Slots live behind a `parking_lot::RwLock`. [`Registry::create`] clones
//! the winning entry under the read lock and builds the validator after
//! releasing it, so registration never blocks on validator construction.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, OnceLock};

use parking_lot::RwLock;
use serde_json::Value;
use vetta_core::ConfigurationError;
use vetta_schema::meta::is_valid_rule_name;
use vetta_schema::{FieldKind, RuleParams};

// ---------------------------------------------------------------------------
// Validator contract
// ---------------------------------------------------------------------------

/// A failed rule check.
#[derive(Debug, Clone, PartialEq)]
pub struct Violation {
    /// Human-readable message. Never contains the checked value.
    pub message: String,
    /// Structured context (bounds, measured length, ...).
    pub details: BTreeMap<String, Value>,
}

impl Violation {
    /// A violation with no details.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            details: BTreeMap::new(),
        }
    }

    /// Attach one detail.
    pub fn with_detail(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.details.insert(key.to_string(), value.into());
        self
    }
}

/// Read-only access to the record enclosing the field being validated.
#[derive(Debug, Clone, Copy)]
pub struct RecordView<'a> {
    record: &'a Value,
    path: &'a str,
    field: &'a str,
    kind: Option<&'a FieldKind>,
}

impl<'a> RecordView<'a> {
    /// A view of `record` (located at `path`) while validating `field`.
    pub fn new(record: &'a Value, path: &'a str, field: &'a str) -> Self {
        Self {
            record,
            path,
            field,
            kind: None,
        }
    }

    /// Attach the declared kind of the field being validated.
    pub fn with_kind(mut self, kind: &'a FieldKind) -> Self {
        self.kind = Some(kind);
        self
    }

    /// Declared kind of the field being validated, when known.
    pub fn field_kind(&self) -> Option<&'a FieldKind> {
        self.kind
    }

    /// The whole record.
    pub fn record(&self) -> &'a Value {
        self.record
    }

    /// Value of a sibling field, by field name.
    pub fn field(&self, name: &str) -> Option<&'a Value> {
        self.record.get(name)
    }

    /// Name of the field being validated.
    pub fn current_field(&self) -> &'a str {
        self.field
    }

    /// Dotted path of the record. Empty for the root record.
    pub fn path(&self) -> &'a str {
        self.path
    }
}

/// A configured rule check.
pub trait Validator: Send + Sync {
    /// Rule name this validator was created for.
    fn name(&self) -> &str;

    /// Check a single field value.
    fn validate(&self, value: &Value) -> Result<(), Violation>;

    /// Check a field value with its enclosing record available.
    fn validate_in(&self, value: &Value, record: &RecordView<'_>) -> Result<(), Violation> {
        let _ = record;
        self.validate(value)
    }

    /// Returns true if [`Validator::validate`] cannot work without a record.
    fn requires_record(&self) -> bool {
        false
    }
}

/// Builds a validator from rule parameters.
pub type ValidatorFactory =
    Arc<dyn Fn(&RuleParams) -> Result<Arc<dyn Validator>, ConfigurationError> + Send + Sync>;

/// Single-field check.
pub type FieldFn = Arc<dyn Fn(&Value, &RuleParams) -> Result<(), Violation> + Send + Sync>;

/// Check with access to the enclosing record.
pub type CrossFieldFn =
    Arc<dyn Fn(&Value, &RecordView<'_>, &RuleParams) -> Result<(), Violation> + Send + Sync>;

/// Which tier answers lookups for a name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Factory,
    Field,
    CrossField,
}

// ---------------------------------------------------------------------------
// Function-backed validators
// ---------------------------------------------------------------------------

struct FnValidator {
    name: String,
    params: RuleParams,
    check: FieldFn,
}

impl Validator for FnValidator {
    fn name(&self) -> &str {
        &self.name
    }

    fn validate(&self, value: &Value) -> Result<(), Violation> {
        (self.check)(value, &self.params)
    }
}

struct CrossFieldValidator {
    name: String,
    params: RuleParams,
    check: CrossFieldFn,
}

impl Validator for CrossFieldValidator {
    fn name(&self) -> &str {
        &self.name
    }

    fn validate(&self, _value: &Value) -> Result<(), Violation> {
        Err(Violation::new(format!(
            "validator '{}' requires full record context and cannot validate a single value",
            self.name
        )))
    }

    fn validate_in(&self, value: &Value, record: &RecordView<'_>) -> Result<(), Violation> {
        (self.check)(value, record, &self.params)
    }

    fn requires_record(&self) -> bool {
        true
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

#[derive(Default, Clone)]
struct Slot {
    factory: Option<ValidatorFactory>,
    field: Option<FieldFn>,
    cross: Option<CrossFieldFn>,
}

enum Winner {
    Factory(ValidatorFactory),
    Field(FieldFn),
    Cross(CrossFieldFn),
}

impl Slot {
    fn winner(&self) -> Option<Winner> {
        if let Some(f) = &self.cross {
            return Some(Winner::Cross(Arc::clone(f)));
        }
        if let Some(f) = &self.field {
            return Some(Winner::Field(Arc::clone(f)));
        }
        self.factory.as_ref().map(|f| Winner::Factory(Arc::clone(f)))
    }

    fn kind(&self) -> Option<EntryKind> {
        if self.cross.is_some() {
            Some(EntryKind::CrossField)
        } else if self.field.is_some() {
            Some(EntryKind::Field)
        } else if self.factory.is_some() {
            Some(EntryKind::Factory)
        } else {
            None
        }
    }
}

/// Thread-safe map from rule name to validator entries.
pub struct Registry {
    slots: RwLock<BTreeMap<String, Slot>>,
}

impl Registry {
    /// An empty registry.
    pub fn new() -> Self {
        Self {
            slots: RwLock::new(BTreeMap::new()),
        }
    }

    /// A registry holding the default built-in rules.
    pub fn with_builtins() -> Self {
        let registry = Self::new();
        crate::builtin::register_builtins(&registry);
        registry
    }

    /// The process-wide registry used by the pipeline entry points.
    ///
    /// Initialized with the built-in rules on first use.
    pub fn global() -> Arc<Registry> {
        static GLOBAL: OnceLock<Arc<Registry>> = OnceLock::new();
        Arc::clone(GLOBAL.get_or_init(|| Arc::new(Registry::with_builtins())))
    }

    fn update(&self, name: &str, apply: impl FnOnce(&mut Slot)) -> Result<(), ConfigurationError> {
        if !is_valid_rule_name(name) {
            tracing::warn!(rule = name, "rejected validator registration with invalid name");
            return Err(ConfigurationError::InvalidRuleName(name.to_string()));
        }
        apply(self.slots.write().entry(name.to_string()).or_default());
        tracing::debug!(rule = name, "validator registered");
        Ok(())
    }

    /// Bind a factory-built validator to `name`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidRuleName` if `name` is not `[A-Za-z0-9_]+`.
    pub fn register<F>(&self, name: &str, factory: F) -> Result<(), ConfigurationError>
    where
        F: Fn(&RuleParams) -> Result<Arc<dyn Validator>, ConfigurationError> + Send + Sync + 'static,
    {
        self.update(name, |slot| slot.factory = Some(Arc::new(factory)))
    }

    /// Bind a single-field function to `name`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidRuleName` if `name` is not `[A-Za-z0-9_]+`.
    pub fn register_fn<F>(&self, name: &str, check: F) -> Result<(), ConfigurationError>
    where
        F: Fn(&Value, &RuleParams) -> Result<(), Violation> + Send + Sync + 'static,
    {
        self.update(name, |slot| slot.field = Some(Arc::new(check)))
    }

    /// Bind a cross-field function to `name`. Shadows any other entry.
    ///
    /// # Errors
    ///
    /// Returns `InvalidRuleName` if `name` is not `[A-Za-z0-9_]+`.
    pub fn register_cross_field<F>(&self, name: &str, check: F) -> Result<(), ConfigurationError>
    where
        F: Fn(&Value, &RecordView<'_>, &RuleParams) -> Result<(), Violation> + Send + Sync + 'static,
    {
        self.update(name, |slot| slot.cross = Some(Arc::new(check)))
    }

    /// Build the validator that answers `name`.
    ///
    /// # Errors
    ///
    /// Returns `UnknownRule` if nothing is bound to `name`, or whatever the
    /// factory returns for unusable parameters.
    pub fn create(&self, name: &str, params: &RuleParams) -> Result<Arc<dyn Validator>, ConfigurationError> {
        let winner = self
            .slots
            .read()
            .get(name)
            .and_then(Slot::winner)
            .ok_or_else(|| ConfigurationError::UnknownRule(name.to_string()))?;

        match winner {
            Winner::Factory(factory) => factory(params),
            Winner::Field(check) => Ok(Arc::new(FnValidator {
                name: name.to_string(),
                params: params.clone(),
                check,
            })),
            Winner::Cross(check) => Ok(Arc::new(CrossFieldValidator {
                name: name.to_string(),
                params: params.clone(),
                check,
            })),
        }
    }

    /// Registered rule names, sorted.
    pub fn list(&self) -> Vec<String> {
        self.slots.read().keys().cloned().collect()
    }

    /// Returns true if `name` is bound.
    pub fn contains(&self, name: &str) -> bool {
        self.slots.read().contains_key(name)
    }

    /// Which tier answers lookups for `name`.
    pub fn entry_kind(&self, name: &str) -> Option<EntryKind> {
        self.slots.read().get(name).and_then(Slot::kind)
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry").field("rules", &self.list()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct AlwaysFails;

    impl Validator for AlwaysFails {
        fn name(&self) -> &str {
            "shadowed"
        }

        fn validate(&self, _value: &Value) -> Result<(), Violation> {
            Err(Violation::new("factory ran"))
        }
    }

    fn always_fails(_: &RuleParams) -> Result<Arc<dyn Validator>, ConfigurationError> {
        Ok(Arc::new(AlwaysFails))
    }

    #[test]
    fn test_unknown_rule() {
        let r = Registry::new();
        let err = r.create("nope", &RuleParams::new()).err().unwrap();
        assert_eq!(err, ConfigurationError::UnknownRule("nope".to_string()));
    }

    #[test]
    fn test_invalid_names_rejected() {
        let r = Registry::new();
        assert!(r.register_fn("", |_, _| Ok(())).is_err());
        assert!(r.register_fn("has-dash", |_, _| Ok(())).is_err());
        assert!(r.register_fn("ok_name_2", |_, _| Ok(())).is_ok());
    }

    #[test]
    fn test_field_fn_shadows_factory() {
        let r = Registry::new();
        r.register("shadowed", always_fails).unwrap();
        assert_eq!(r.entry_kind("shadowed"), Some(EntryKind::Factory));

        r.register_fn("shadowed", |_, _| Ok(())).unwrap();
        assert_eq!(r.entry_kind("shadowed"), Some(EntryKind::Field));
        let v = r.create("shadowed", &RuleParams::new()).unwrap();
        assert!(v.validate(&json!(1)).is_ok());
    }

    #[test]
    fn test_cross_field_shadows_regardless_of_order() {
        let r = Registry::new();
        r.register_cross_field("shadowed", |_, _, _| Ok(())).unwrap();
        r.register("shadowed", always_fails).unwrap();
        r.register_fn("shadowed", |_, _| Ok(())).unwrap();
        assert_eq!(r.entry_kind("shadowed"), Some(EntryKind::CrossField));

        let v = r.create("shadowed", &RuleParams::new()).unwrap();
        assert!(v.requires_record());
        let err = v.validate(&json!("x")).unwrap_err();
        assert!(err.message.contains("requires full record context"));

        let record = json!({"a": 1});
        assert!(v.validate_in(&json!(1), &RecordView::new(&record, "", "a")).is_ok());
    }

    #[test]
    fn test_params_reach_functions() {
        let r = Registry::new();
        r.register_fn("prefix", |value, params| {
            let prefix = params.value().unwrap_or_default();
            match value.as_str() {
                Some(s) if s.starts_with(prefix) => Ok(()),
                _ => Err(Violation::new(format!("must start with {prefix}"))),
            }
        })
        .unwrap();
        let v = r.create("prefix", &RuleParams::with_value("ab")).unwrap();
        assert!(v.validate(&json!("abc")).is_ok());
        assert!(v.validate(&json!("xbc")).is_err());
    }

    #[test]
    fn test_list_sorted() {
        let r = Registry::new();
        r.register_fn("zeta", |_, _| Ok(())).unwrap();
        r.register_fn("alpha", |_, _| Ok(())).unwrap();
        assert_eq!(r.list(), vec!["alpha".to_string(), "zeta".to_string()]);
        assert!(r.contains("zeta"));
        assert!(!r.contains("beta"));
    }

    #[test]
    fn test_concurrent_register_and_create() {
        let r = Arc::new(Registry::with_builtins());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let r = Arc::clone(&r);
                std::thread::spawn(move || {
                    for j in 0..50 {
                        let name = format!("rule_{i}_{j}");
                        r.register_fn(&name, |_, _| Ok(())).unwrap();
                        assert!(r.create("required", &RuleParams::new()).is_ok());
                        assert!(r.create(&name, &RuleParams::new()).is_ok());
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert!(r.list().len() >= 400);
    }
}
