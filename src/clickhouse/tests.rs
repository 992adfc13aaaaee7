use super::*;
use chrono::{TimeZone, Utc};

#[test]
fn test_parse_payload_names_types_rows() {
    let body = concat!(
        "[\"id\", \"name\"]\n",
        "[\"UInt64\", \"Nullable(String)\"]\n",
        "[\"1\", \"a\"]\n",
        "[\"2\", null]\n",
    );
    let payload = parse_payload(body).unwrap();
    assert_eq!(payload.columns, vec!["id", "name"]);
    assert_eq!(payload.types, vec!["UInt64", "Nullable(String)"]);
    assert_eq!(payload.rows.len(), 2);
    assert_eq!(payload.rows[1][1], JsonValue::Null);
}

#[test]
fn test_parse_payload_empty_result_set() {
    let body = "[\"id\"]\n[\"Int32\"]\n";
    let payload = parse_payload(body).unwrap();
    assert_eq!(payload.columns, vec!["id"]);
    assert!(payload.rows.is_empty());
}

#[test]
fn test_parse_payload_rejects_garbage() {
    assert!(parse_payload("not json").is_err());
    // A lone names line without the types line is a protocol violation.
    assert!(parse_payload("[\"id\"]\n").is_err());
}

#[test]
fn test_select_query_building() {
    let columns = vec!["name".to_string(), "id".to_string()];
    assert_eq!(
        build_select_query(&table_ref("db", "events"), &columns, 100, None),
        "SELECT `name`, `id` FROM `db`.`events` LIMIT 100"
    );
    assert_eq!(
        build_select_query(&table_ref("db", "events"), &columns, 1000, Some(2000)),
        "SELECT `name`, `id` FROM `db`.`events` LIMIT 1000 OFFSET 2000"
    );
}

#[test]
fn test_insert_statement_building() {
    let columns = vec!["name".to_string(), "id".to_string()];
    let rows = vec![
        vec![Value::Str("a".to_string()), Value::Int(1)],
        vec![Value::Null, Value::Int(2)],
    ];
    assert_eq!(
        build_insert_statement(&table_ref("db", "events"), &columns, &rows),
        "INSERT INTO `db`.`events` (`name`, `id`) VALUES ('a', 1), (NULL, 2)"
    );
}

#[test]
fn test_value_literals() {
    assert_eq!(value_literal(&Value::Bool(true)), "true");
    assert_eq!(value_literal(&Value::Float(1.5)), "1.5");
    assert_eq!(value_literal(&Value::Float(f64::NAN)), "nan");
    assert_eq!(
        value_literal(&Value::Str("it's".to_string())),
        "'it\\'s'"
    );
    let dt = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
    assert_eq!(
        value_literal(&Value::DateTime(dt)),
        "'2024-05-01 12:00:00'"
    );
}

#[test]
fn test_identifier_quoting() {
    assert_eq!(quote_identifier("events"), "`events`");
    assert_eq!(quote_identifier("odd`name"), "`odd\\`name`");
    assert_eq!(escape_string_literal("a'b\\c"), "a\\'b\\\\c");
}
