use super::*;
use chrono::TimeZone;

fn roughly_equal(a: f64, b: f64) -> bool {
    if a == b {
        return true;
    }
    let scale = a.abs().max(b.abs());
    (a - b).abs() <= scale * 1e-9
}

#[test]
fn test_clickhouse_type_mapping() {
    assert_eq!(NeutralType::from_clickhouse("Int64"), NeutralType::Int64);
    assert_eq!(NeutralType::from_clickhouse("UInt32"), NeutralType::Int64);
    assert_eq!(NeutralType::from_clickhouse("Float32"), NeutralType::Float64);
    assert_eq!(
        NeutralType::from_clickhouse("Decimal(18, 4)"),
        NeutralType::Float64
    );
    assert_eq!(NeutralType::from_clickhouse("Bool"), NeutralType::Bool);
    assert_eq!(NeutralType::from_clickhouse("Date"), NeutralType::DateTimeUtc);
    assert_eq!(
        NeutralType::from_clickhouse("DateTime64(3)"),
        NeutralType::DateTimeUtc
    );
    assert_eq!(
        NeutralType::from_clickhouse("String"),
        NeutralType::Utf8String
    );
    // Unsupported types degrade to strings instead of failing.
    assert_eq!(
        NeutralType::from_clickhouse("Map(String, UInt64)"),
        NeutralType::Utf8String
    );
}

#[test]
fn test_wrapped_type_mapping() {
    assert_eq!(
        NeutralType::from_clickhouse("Nullable(Int64)"),
        NeutralType::Int64
    );
    assert_eq!(
        NeutralType::from_clickhouse("LowCardinality(Nullable(String))"),
        NeutralType::Utf8String
    );
    assert!(is_nullable_clickhouse("Nullable(Float64)"));
    assert!(!is_nullable_clickhouse("Float64"));
}

#[test]
fn test_round_trip_law() {
    let timestamp = Value::DateTime(Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 45).unwrap());
    let cases = vec![
        (Value::Int(-42), NeutralType::Int64),
        (Value::Int(i64::MAX), NeutralType::Int64),
        (Value::Str("hello world".to_string()), NeutralType::Utf8String),
        (Value::Bool(true), NeutralType::Bool),
        (Value::Bool(false), NeutralType::Bool),
        (timestamp, NeutralType::DateTimeUtc),
    ];
    for (value, ty) in cases {
        let text = value.to_text();
        let parsed = Value::from_text(&text, ty, false, "c").unwrap();
        assert_eq!(parsed, value, "round trip failed for {:?}", value);
    }
}

#[test]
fn test_round_trip_law_floats() {
    for raw in [0.1_f64, -1234.5678, 1e300, 3.000000001] {
        let text = Value::Float(raw).to_text();
        let Value::Float(parsed) = Value::from_text(&text, NeutralType::Float64, false, "f").unwrap()
        else {
            panic!("expected a float back");
        };
        assert!(roughly_equal(raw, parsed), "{} vs {}", raw, parsed);
    }
}

#[test]
fn test_bool_parsing() {
    for cell in ["true", "TRUE", "True", "1"] {
        assert_eq!(
            Value::from_text(cell, NeutralType::Bool, false, "b").unwrap(),
            Value::Bool(true)
        );
    }
    for cell in ["false", "FALSE", "0"] {
        assert_eq!(
            Value::from_text(cell, NeutralType::Bool, false, "b").unwrap(),
            Value::Bool(false)
        );
    }
    assert!(Value::from_text("yes", NeutralType::Bool, false, "b").is_err());
}

#[test]
fn test_empty_cell_nullability() {
    assert_eq!(
        Value::from_text("", NeutralType::Int64, true, "n").unwrap(),
        Value::Null
    );
    assert!(Value::from_text("", NeutralType::Int64, false, "n").is_err());
    assert!(Value::from_text("", NeutralType::DateTimeUtc, false, "n").is_err());
    // The empty string is a legitimate value for a required string column.
    assert_eq!(
        Value::from_text("", NeutralType::Utf8String, false, "s").unwrap(),
        Value::Str(String::new())
    );
}

#[test]
fn test_malformed_numeric_cells() {
    let err = Value::from_text("abc", NeutralType::Int64, false, "id").unwrap_err();
    match err {
        TypeError::Malformed { column, cell, expected } => {
            assert_eq!(column, "id");
            assert_eq!(cell, "abc");
            assert_eq!(expected, NeutralType::Int64);
        }
    }
    assert!(Value::from_text("1.5.2", NeutralType::Float64, false, "x").is_err());
}

#[test]
fn test_datetime_parsing_forms() {
    let expected = Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 45).unwrap();
    for cell in [
        "2024-05-01 12:30:45",
        "2024-05-01 12:30:45.000",
        "2024-05-01T12:30:45Z",
        "2024-05-01T12:30:45+00:00",
    ] {
        assert_eq!(
            Value::from_text(cell, NeutralType::DateTimeUtc, false, "ts").unwrap(),
            Value::DateTime(expected),
            "failed for {}",
            cell
        );
    }
    let midnight = Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap();
    assert_eq!(
        Value::from_text("2024-05-01", NeutralType::DateTimeUtc, false, "d").unwrap(),
        Value::DateTime(midnight)
    );
}

#[test]
fn test_from_json_quoted_integers() {
    // ClickHouse JSON formats quote 64-bit integers by default.
    let quoted = serde_json::json!("9007199254740993");
    assert_eq!(
        Value::from_json(&quoted, NeutralType::Int64, false, "id").unwrap(),
        Value::Int(9007199254740993)
    );
    let plain = serde_json::json!(7);
    assert_eq!(
        Value::from_json(&plain, NeutralType::Int64, false, "id").unwrap(),
        Value::Int(7)
    );
    let null = serde_json::Value::Null;
    assert_eq!(
        Value::from_json(&null, NeutralType::Int64, true, "id").unwrap(),
        Value::Null
    );
}

#[test]
fn test_coerce_retypes_through_text_rules() {
    assert_eq!(
        Value::Str("12".to_string())
            .coerce(NeutralType::Int64, false, "id")
            .unwrap(),
        Value::Int(12)
    );
    assert_eq!(
        Value::Int(3).coerce(NeutralType::Float64, false, "f").unwrap(),
        Value::Float(3.0)
    );
    assert_eq!(
        Value::Int(3).coerce(NeutralType::Int64, false, "id").unwrap(),
        Value::Int(3)
    );
    assert!(Value::Str("oops".to_string())
        .coerce(NeutralType::Int64, false, "id")
        .is_err());
    assert_eq!(
        Value::Null.coerce(NeutralType::Int64, true, "id").unwrap(),
        Value::Null
    );
    // A null headed for a required column follows the empty-cell rules.
    assert!(Value::Null.coerce(NeutralType::Int64, false, "id").is_err());
    assert_eq!(
        Value::Null
            .coerce(NeutralType::Utf8String, false, "s")
            .unwrap(),
        Value::Str(String::new())
    );
}
