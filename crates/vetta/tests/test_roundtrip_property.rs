//! # Round-Trip Properties
//!
//! Any record serialized by its own `Serialize` impl, as JSON or YAML, must
//! come back unchanged through `parse_into`.

use chrono::{DateTime, Utc};
use proptest::prelude::*;
use serde::{Deserialize, Serialize};
use vetta::{FieldKind, Format, Record, RecordBuilder};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Sample {
    id: i64,
    count: u32,
    ratio: f64,
    name: String,
    active: bool,
    tags: Vec<String>,
    note: Option<String>,
    at: DateTime<Utc>,
}

impl Record for Sample {
    fn describe(record: &mut RecordBuilder) {
        record.field("id", FieldKind::I64);
        record.field("count", FieldKind::U32);
        record.field("ratio", FieldKind::F64);
        record.field("name", FieldKind::String);
        record.field("active", FieldKind::Bool);
        record.field("tags", FieldKind::array(FieldKind::String));
        record.field("note", FieldKind::optional(FieldKind::String));
        record.field("at", FieldKind::Timestamp);
    }
}

fn instant() -> impl Strategy<Value = DateTime<Utc>> {
    (0i64..4_000_000_000, 0u32..1_000_000_000)
        .prop_map(|(secs, nanos)| DateTime::from_timestamp(secs, nanos).unwrap_or_default())
}

fn sample(text: &'static str) -> impl Strategy<Value = Sample> {
    (
        any::<i64>(),
        any::<u32>(),
        -1e12f64..1e12,
        text,
        any::<bool>(),
        prop::collection::vec(text, 0..4),
        prop::option::of(text),
        instant(),
    )
        .prop_map(|(id, count, ratio, name, active, tags, note, at)| Sample {
            id,
            count,
            ratio,
            name,
            active,
            tags,
            note,
            at,
        })
}

proptest! {
    #[test]
    fn json_round_trip(record in sample("\\PC{0,16}")) {
        let bytes = serde_json::to_vec(&record).unwrap();
        let back: Sample = vetta::parse_into(&bytes, None).unwrap();
        prop_assert_eq!(back, record);
    }

    #[test]
    fn yaml_round_trip(record in sample("[a-z]{0,12}")) {
        let text = serde_yaml::to_string(&record).unwrap();
        let back: Sample = vetta::parse_into(text.as_bytes(), Some(Format::Yaml)).unwrap();
        prop_assert_eq!(back, record);
    }
}
