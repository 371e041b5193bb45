//! # Process-Wide Limits
//!
//! Three independent tunables shared by every pipeline call in the
//! process: maximum input size, maximum cache size (consumed by caching
//! layers built on top of this crate), and maximum validation depth.
//!
//! ## Lifecycle
//!
//! Limits start at their defaults, may be loaded once from the environment
//! with [`Limits::from_env`] + [`apply`], and are changed only through the
//! accessor functions below. A change affects calls that start afterwards;
//! calls already in flight keep the values they read.
//!
//! ## Concurrency
//!
//! All accessors go through one `parking_lot::RwLock`. A reader observes
//! either the value before or after a concurrent write, never a torn one.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::error::ConfigurationError;

/// Default maximum input size: 10 MiB.
pub const DEFAULT_MAX_INPUT_SIZE: usize = 10 * 1024 * 1024;

/// Default maximum number of cached results.
pub const DEFAULT_MAX_CACHE_SIZE: usize = 1000;

/// Default maximum nesting depth for coercion and validation.
pub const DEFAULT_MAX_VALIDATION_DEPTH: usize = 32;

/// Environment variable overriding [`Limits::max_input_size`].
pub const ENV_MAX_INPUT_SIZE: &str = "VETTA_MAX_INPUT_SIZE";
/// Environment variable overriding [`Limits::max_cache_size`].
pub const ENV_MAX_CACHE_SIZE: &str = "VETTA_MAX_CACHE_SIZE";
/// Environment variable overriding [`Limits::max_validation_depth`].
pub const ENV_MAX_VALIDATION_DEPTH: &str = "VETTA_MAX_VALIDATION_DEPTH";

/// A snapshot of the process-wide limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Limits {
    /// Largest input, in bytes, a decoder will accept.
    pub max_input_size: usize,
    /// Largest number of entries a result cache may hold.
    pub max_cache_size: usize,
    /// Deepest nesting the coercion and validation engines will walk.
    pub max_validation_depth: usize,
}

impl Limits {
    /// The built-in defaults.
    pub const DEFAULTS: Limits = Limits {
        max_input_size: DEFAULT_MAX_INPUT_SIZE,
        max_cache_size: DEFAULT_MAX_CACHE_SIZE,
        max_validation_depth: DEFAULT_MAX_VALIDATION_DEPTH,
    };

    /// Defaults overridden by any `VETTA_*` environment variables that are set.
    ///
    /// # Errors
    ///
    /// Returns `ConfigurationError::InvalidLimit` if a variable is set but is
    /// not a positive integer.
    pub fn from_env() -> Result<Self, ConfigurationError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigurationError> {
        let mut limits = Self::DEFAULTS;
        let overrides: [(&'static str, &'static str, &mut usize); 3] = [
            (ENV_MAX_INPUT_SIZE, "max_input_size", &mut limits.max_input_size),
            (ENV_MAX_CACHE_SIZE, "max_cache_size", &mut limits.max_cache_size),
            (
                ENV_MAX_VALIDATION_DEPTH,
                "max_validation_depth",
                &mut limits.max_validation_depth,
            ),
        ];
        for (var, limit, slot) in overrides {
            if let Some(raw) = lookup(var) {
                let parsed = raw.trim().parse::<usize>().map_err(|e| {
                    ConfigurationError::InvalidLimit {
                        limit,
                        reason: format!("{var}={raw:?} is not a non-negative integer: {e}"),
                    }
                })?;
                *slot = check_positive(limit, parsed)?;
            }
        }
        Ok(limits)
    }
}

impl Default for Limits {
    fn default() -> Self {
        Self::DEFAULTS
    }
}

static LIMITS: RwLock<Limits> = parking_lot::const_rwlock(Limits::DEFAULTS);

fn check_positive(limit: &'static str, value: usize) -> Result<usize, ConfigurationError> {
    if value == 0 {
        tracing::warn!(limit, "rejected zero value for process-wide limit");
        return Err(ConfigurationError::InvalidLimit {
            limit,
            reason: "must be greater than zero".to_string(),
        });
    }
    Ok(value)
}

/// Current values of all three limits.
pub fn snapshot() -> Limits {
    *LIMITS.read()
}

/// Replace all three limits at once.
///
/// # Errors
///
/// Returns `ConfigurationError::InvalidLimit` if any value is zero; no limit
/// is changed in that case.
pub fn apply(limits: Limits) -> Result<(), ConfigurationError> {
    check_positive("max_input_size", limits.max_input_size)?;
    check_positive("max_cache_size", limits.max_cache_size)?;
    check_positive("max_validation_depth", limits.max_validation_depth)?;
    *LIMITS.write() = limits;
    tracing::debug!(?limits, "process-wide limits applied");
    Ok(())
}

/// Restore the built-in defaults. Intended for tests.
pub fn reset_to_defaults() {
    *LIMITS.write() = Limits::DEFAULTS;
}

/// Largest input, in bytes, a decoder will accept.
pub fn max_input_size() -> usize {
    LIMITS.read().max_input_size
}

/// Set the largest input a decoder will accept.
pub fn set_max_input_size(bytes: usize) -> Result<(), ConfigurationError> {
    let bytes = check_positive("max_input_size", bytes)?;
    LIMITS.write().max_input_size = bytes;
    Ok(())
}

/// Largest number of entries a result cache may hold.
pub fn max_cache_size() -> usize {
    LIMITS.read().max_cache_size
}

/// Set the largest number of entries a result cache may hold.
pub fn set_max_cache_size(entries: usize) -> Result<(), ConfigurationError> {
    let entries = check_positive("max_cache_size", entries)?;
    LIMITS.write().max_cache_size = entries;
    Ok(())
}

/// Deepest nesting the coercion and validation engines will walk.
pub fn max_validation_depth() -> usize {
    LIMITS.read().max_validation_depth
}

/// Set the deepest nesting the coercion and validation engines will walk.
pub fn set_max_validation_depth(depth: usize) -> Result<(), ConfigurationError> {
    let depth = check_positive("max_validation_depth", depth)?;
    LIMITS.write().max_validation_depth = depth;
    Ok(())
}
