//! # End-to-End Pipeline
//!
//! Drives `parse_into` and `validate` from raw bytes to typed records,
//! covering each stage's failure mode and the aggregated error surface.

use std::collections::BTreeMap;

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use vetta::redact::REDACTED;
use vetta::{
    CoercionErrorKind, ConfigurationError, Error, FieldKind, Format, Parser, RawDocument, Record,
    RecordBuilder,
};

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct User {
    id: i64,
    username: String,
    email: String,
    age: u8,
    name: String,
}

impl Record for User {
    fn describe(record: &mut RecordBuilder) {
        record.field("id", FieldKind::I64).validate("required,min=1");
        record
            .field("username", FieldKind::String)
            .validate("required,min=3,max=50");
        record.field("email", FieldKind::String).validate("required,email");
        record.field("age", FieldKind::U8).validate("min=18");
        record.field("name", FieldKind::String).validate("alpha");
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Profile {
    nickname: Option<String>,
    score: Option<i32>,
}

impl Record for Profile {
    fn describe(record: &mut RecordBuilder) {
        record.field("nickname", FieldKind::optional(FieldKind::String));
        record.field("score", FieldKind::optional(FieldKind::I32));
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Event {
    at: DateTime<Utc>,
}

impl Record for Event {
    fn describe(record: &mut RecordBuilder) {
        record.field("at", FieldKind::Timestamp);
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Login {
    username: String,
    password: String,
}

impl Record for Login {
    fn describe(record: &mut RecordBuilder) {
        record.field("username", FieldKind::String).validate("required");
        record.field("password", FieldKind::String).validate("required,min=12");
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Envelope {
    kind: String,
    payload: RawDocument,
}

impl Record for Envelope {
    fn describe(record: &mut RecordBuilder) {
        record.field("kind", FieldKind::String).validate("required");
        record.field("payload", FieldKind::Raw);
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct LineItem {
    sku: String,
    qty: u32,
}

impl Record for LineItem {
    fn describe(record: &mut RecordBuilder) {
        record.field("sku", FieldKind::String).validate("required");
        record.field("qty", FieldKind::U32).validate("min=1");
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Order {
    items: Vec<LineItem>,
    labels: BTreeMap<String, String>,
}

impl Record for Order {
    fn describe(record: &mut RecordBuilder) {
        record
            .field("items", FieldKind::array(FieldKind::record::<LineItem>()))
            .validate("min=1");
        record
            .field("labels", FieldKind::map(FieldKind::String))
            .key("meta_labels");
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Misconfigured {
    x: String,
}

impl Record for Misconfigured {
    fn describe(record: &mut RecordBuilder) {
        record.field("x", FieldKind::String).validate("definitely_not_registered");
    }
}

// ---------------------------------------------------------------------------
// Happy paths
// ---------------------------------------------------------------------------

#[test]
fn json_user_parses_with_lenient_scalars() {
    let user: User = vetta::parse_into(
        br#"{"id":"42","username":"alice","email":"alice@example.com","age":"30","name":"Alice","ignored":true}"#,
        None,
    )
    .unwrap();
    assert_eq!(
        user,
        User {
            id: 42,
            username: "alice".to_string(),
            email: "alice@example.com".to_string(),
            age: 30,
            name: "Alice".to_string(),
        }
    );
}

#[test]
fn yaml_user_is_detected_and_parsed() {
    let src = b"# a user\nid: 5\nusername: bob\nemail: bob@example.org\nage: 21\nname: Bob\n";
    assert_eq!(vetta::detect_format(src), Format::Yaml);
    let user: User = vetta::parse_into(src, None).unwrap();
    assert_eq!(user.id, 5);
    assert_eq!(user.name, "Bob");
}

#[test]
fn fixed_yaml_format_accepts_json_flow_syntax() {
    let user: User = Parser::new()
        .with_format(Format::Yaml)
        .parse_into(br#"{"id": 1, "username": "carol", "email": "c@d.io", "age": 40, "name": "Carol"}"#)
        .unwrap();
    assert_eq!(user.username, "carol");
}

#[test]
fn optional_missing_and_null_are_both_unset() {
    let missing: Profile = vetta::parse_into(b"{}", None).unwrap();
    let null: Profile = vetta::parse_into(br#"{"nickname":null,"score":null}"#, None).unwrap();
    let present: Profile = vetta::parse_into(br#"{"nickname":"z","score":"7"}"#, None).unwrap();

    assert_eq!(missing.nickname, None);
    assert_eq!(null.nickname, None);
    assert_eq!(missing.score, null.score);
    assert_eq!(present.nickname.as_deref(), Some("z"));
    assert_eq!(present.score, Some(7));
}

#[test]
fn unix_timestamp_equals_rfc3339_instant() {
    let from_unix: Event = vetta::parse_into(br#"{"at":1703500200}"#, None).unwrap();
    let from_text: Event = vetta::parse_into(br#"{"at":"2023-12-25T10:30:00Z"}"#, None).unwrap();
    assert_eq!(from_unix.at, from_text.at);
    assert_eq!(from_text.at, Utc.with_ymd_and_hms(2023, 12, 25, 10, 30, 0).unwrap());
}

#[test]
fn raw_payload_is_captured_verbatim() {
    let src = br#"{"kind":"note","payload": { "b" : [1,  2], "c": null }}"#;
    let env: Envelope = vetta::parse_into(src, None).unwrap();
    assert_eq!(env.payload.as_bytes(), br#"{ "b" : [1,  2], "c": null }"#);

    let null: Envelope = vetta::parse_into(br#"{"kind":"x","payload":null}"#, None).unwrap();
    assert!(null.payload.is_null());

    let absent: Envelope = vetta::parse_into(br#"{"kind":"x"}"#, None).unwrap();
    assert!(absent.payload.is_empty());
}

#[test]
fn custom_keys_and_maps() {
    let order: Order = vetta::parse_into(
        br#"{"items":[{"sku":"A1","qty":2}],"meta_labels":{"env":"prod","tier":3}}"#,
        None,
    )
    .unwrap();
    assert_eq!(order.items[0].qty, 2);
    assert_eq!(order.labels.get("tier").map(String::as_str), Some("3"));
}

// ---------------------------------------------------------------------------
// Failure modes
// ---------------------------------------------------------------------------

#[test]
fn five_invalid_fields_reported_together() {
    let err = vetta::parse_into::<User>(
        br#"{"id":0,"username":"ab","email":"invalid","age":15,"name":"John123"}"#,
        None,
    )
    .unwrap_err();

    let Error::Validation(errors) = &err else {
        panic!("expected validation error, got {err:?}");
    };
    let fields: Vec<String> = errors.group_by_field().into_keys().collect();
    assert_eq!(fields, vec!["age", "email", "id", "name", "username"]);
    assert!(err.to_string().starts_with("multiple errors:"));
    assert_eq!(errors.len(), 6);
    assert_eq!(err.validation_errors().len(), 6);

    let grouped = err.group_by_field();
    let rules = |path: &str| grouped[path].iter().map(|e| e.rule.as_str()).collect::<Vec<_>>();
    assert_eq!(rules("id"), vec!["required", "min"]);
    assert_eq!(rules("username"), vec!["min"]);
    assert_eq!(rules("email"), vec!["email"]);
    assert_eq!(rules("age"), vec!["min"]);
    assert_eq!(rules("name"), vec!["alpha"]);
}

#[test]
fn required_timestamp_rejects_absent_and_null() {
    #[derive(Debug, Serialize, Deserialize)]
    struct Deadline {
        due: DateTime<Utc>,
    }

    impl Record for Deadline {
        fn describe(record: &mut RecordBuilder) {
            record.field("due", FieldKind::Timestamp).validate("required");
        }
    }

    let inputs: [&[u8]; 3] = [br#"{}"#, br#"{"due":null}"#, br#"{"due":0}"#];
    for src in inputs {
        let err = vetta::parse_into::<Deadline>(src, None).unwrap_err();
        let [only] = err.validation_errors() else {
            panic!("expected one validation error, got {err:?}");
        };
        assert_eq!(only.path, "due");
        assert_eq!(only.rule, "required");
    }

    let set: Deadline = vetta::parse_into(br#"{"due":"2023-12-25T10:30:00Z"}"#, None).unwrap();
    assert_eq!(set.due, Utc.with_ymd_and_hms(2023, 12, 25, 10, 30, 0).unwrap());
}

#[test]
fn f32_overflow_is_out_of_range() {
    #[derive(Debug, Serialize, Deserialize)]
    struct Reading {
        x: f32,
    }

    impl Record for Reading {
        fn describe(record: &mut RecordBuilder) {
            record.field("x", FieldKind::F32);
        }
    }

    let err = vetta::parse_into::<Reading>(br#"{"x":1e39}"#, None).unwrap_err();
    assert!(matches!(
        err.coercion_errors()[0].kind,
        CoercionErrorKind::OutOfRange { target: "float32", .. }
    ));
    let ok: Reading = vetta::parse_into(br#"{"x":"2.5"}"#, None).unwrap();
    assert_eq!(ok.x, 2.5);
}

#[test]
fn non_numeric_id_is_coercion_error_on_id() {
    let err = vetta::parse_into::<User>(br#"{"id": "not-a-number"}"#, None).unwrap_err();
    let [only] = err.coercion_errors() else {
        panic!("expected one coercion error, got {err:?}");
    };
    assert_eq!(only.path, "id");
    assert!(matches!(only.kind, CoercionErrorKind::InvalidNumber { .. }));
}

#[test]
fn out_of_range_is_not_wrapped() {
    let err = vetta::parse_into::<User>(br#"{"id":1,"age":-1}"#, None).unwrap_err();
    assert!(matches!(
        err.coercion_errors()[0].kind,
        CoercionErrorKind::OutOfRange { target: "uint8", .. }
    ));
}

#[test]
fn malformed_input_is_decode_error_with_offset() {
    let err = vetta::parse_into::<User>(b"{\"id\": 1,, }", Some(Format::Json)).unwrap_err();
    match err {
        Error::Decode(decode) => assert!(decode.offset().is_some()),
        other => panic!("expected decode error, got {other:?}"),
    }
}

#[test]
fn nested_rule_failures_carry_paths() {
    let err = vetta::parse_into::<Order>(
        br#"{"items":[{"sku":"A","qty":1},{"sku":"","qty":0}]}"#,
        None,
    )
    .unwrap_err();
    let paths: Vec<&str> = err
        .validation_errors()
        .iter()
        .map(|e| e.path.as_str())
        .collect();
    assert_eq!(paths, vec!["items[1].sku", "items[1].qty"]);
}

#[test]
fn depth_override_stops_nested_coercion() {
    let err = Parser::new()
        .with_max_depth(1)
        .parse_into::<Order>(br#"{"items":[{"sku":"A","qty":1}]}"#)
        .unwrap_err();
    assert!(matches!(
        err.coercion_errors()[0].kind,
        CoercionErrorKind::DepthExceeded { max: 1 }
    ));
}

#[test]
fn unknown_rule_is_configuration_error() {
    let err = vetta::parse_into::<Misconfigured>(br#"{"x":"y"}"#, None).unwrap_err();
    assert!(matches!(
        err,
        Error::Configuration(ConfigurationError::UnknownRule(ref name)) if name == "definitely_not_registered"
    ));
}

// ---------------------------------------------------------------------------
// Direct validation and redaction
// ---------------------------------------------------------------------------

#[test]
fn validate_checks_values_built_elsewhere() {
    let ok = User {
        id: 3,
        username: "dave".to_string(),
        email: "dave@example.com".to_string(),
        age: 50,
        name: "Dave".to_string(),
    };
    assert!(vetta::validate(&ok).is_ok());

    let bad = User { age: 12, ..ok };
    let err = vetta::validate(&bad).unwrap_err();
    assert_eq!(err.validation_errors().len(), 1);
    assert_eq!(err.validation_errors()[0].path, "age");
}

#[test]
fn password_values_never_leave_redacted_surfaces() {
    let err = vetta::parse_into::<Login>(br#"{"username":"eve","password":"hunter2"}"#, None)
        .unwrap_err();
    let failure = &err.validation_errors()[0];
    assert_eq!(failure.field, "password");
    assert_eq!(failure.sanitized_value(), serde_json::json!(REDACTED));

    let body = String::from_utf8(err.to_json().unwrap()).unwrap();
    assert!(!body.contains("hunter2"));
    assert!(!err.to_string().contains("hunter2"));
}

#[test]
fn sensitive_coercion_input_is_redacted() {
    #[derive(Debug, Serialize, Deserialize)]
    struct Pin {
        secret_pin: u16,
    }

    impl Record for Pin {
        fn describe(record: &mut RecordBuilder) {
            record.field("secret_pin", FieldKind::U16);
        }
    }

    let err = vetta::parse_into::<Pin>(br#"{"secret_pin":"12ab34"}"#, None).unwrap_err();
    assert!(!err.to_string().contains("12ab34"));
    assert!(err.to_string().contains(REDACTED));
}
