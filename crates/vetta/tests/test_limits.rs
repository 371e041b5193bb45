//! # Process-Wide Limits
//!
//! The limits are global, so every test here holds `GUARD` while it changes
//! them and restores the defaults before releasing it.

use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;

use serde::{Deserialize, Serialize};
use vetta::limits::{self, DEFAULT_MAX_INPUT_SIZE, DEFAULT_MAX_VALIDATION_DEPTH};
use vetta::{CoercionErrorKind, DecodeError, Error, FieldKind, Record, RecordBuilder};

static GUARD: Mutex<()> = Mutex::new(());

fn lock() -> MutexGuard<'static, ()> {
    GUARD.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[derive(Debug, Serialize, Deserialize)]
struct Leaf {
    v: i32,
}

impl Record for Leaf {
    fn describe(record: &mut RecordBuilder) {
        record.field("v", FieldKind::I32).validate("min=1");
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Branch {
    leaf: Leaf,
}

impl Record for Branch {
    fn describe(record: &mut RecordBuilder) {
        record.field("leaf", FieldKind::record::<Leaf>());
    }
}

#[test]
fn input_size_limit_rejects_before_decoding() {
    let _guard = lock();
    limits::set_max_input_size(8).unwrap();
    let err = vetta::parse_into::<Leaf>(br#"{"v": 100000}"#, None).unwrap_err();
    limits::reset_to_defaults();

    assert!(matches!(
        err,
        Error::Decode(DecodeError::InputTooLarge { size: 13, max: 8 })
    ));
    assert_eq!(err.code(), "DECODE_ERROR");
}

#[test]
fn depth_limit_applies_to_nested_records() {
    let _guard = lock();
    let ok: Branch = vetta::parse_into(br#"{"leaf":{"v":2}}"#, None).unwrap();
    assert_eq!(ok.leaf.v, 2);

    limits::set_max_validation_depth(1).unwrap();
    let err = vetta::parse_into::<Branch>(br#"{"leaf":{"v":2}}"#, None).unwrap_err();
    limits::reset_to_defaults();

    let [only] = err.coercion_errors() else {
        panic!("expected one coercion error, got {err:?}");
    };
    assert_eq!(only.path, "leaf.v");
    assert!(matches!(only.kind, CoercionErrorKind::DepthExceeded { max: 1 }));
    assert_eq!(limits::max_validation_depth(), DEFAULT_MAX_VALIDATION_DEPTH);
}

#[test]
fn zero_limit_is_rejected_and_leaves_value() {
    let _guard = lock();
    assert!(limits::set_max_input_size(0).is_err());
    assert_eq!(limits::max_input_size(), DEFAULT_MAX_INPUT_SIZE);
}

#[test]
fn concurrent_updates_are_never_torn() {
    let _guard = lock();
    let written: Arc<Vec<usize>> = Arc::new(
        (1..=8)
            .map(|i| DEFAULT_MAX_INPUT_SIZE + i * 4096)
            .collect(),
    );

    let handles: Vec<_> = (0..8)
        .map(|t| {
            let written = Arc::clone(&written);
            thread::spawn(move || {
                for round in 0..200 {
                    limits::set_max_input_size(written[(t + round) % written.len()]).unwrap();
                    let seen = limits::max_input_size();
                    assert!(
                        written.contains(&seen),
                        "read {seen}, which no thread wrote"
                    );
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    limits::reset_to_defaults();
    assert_eq!(limits::max_input_size(), DEFAULT_MAX_INPUT_SIZE);
}
