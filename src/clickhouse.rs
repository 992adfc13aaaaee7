//! Raw ClickHouse HTTP plumbing.
//!
//! Reads go over plain HTTP with `FORMAT JSONCompactEachRowWithNamesAndTypes`
//! so column names and declared types come back with every result set;
//! writes are batched `INSERT ... VALUES` statements. The native client is
//! only used for the connection probe.

use crate::config::DatabaseEndpoint;
use crate::error::ConnectionError;
use crate::types::Value;
use reqwest::StatusCode;
use serde_json::Value as JsonValue;

/// One parsed result set: names, declared ClickHouse types, and the data rows.
#[derive(Debug, Clone, Default)]
pub(crate) struct QueryPayload {
    pub columns: Vec<String>,
    pub types: Vec<String>,
    pub rows: Vec<Vec<JsonValue>>,
}

pub(crate) fn create_client(endpoint: &DatabaseEndpoint) -> clickhouse::Client {
    clickhouse::Client::default()
        .with_url(endpoint.http_url())
        .with_database(&endpoint.database)
        .with_access_token(&endpoint.access_token)
}

/// Connectivity and authentication check: `SELECT 1` fetched as a scalar.
pub(crate) async fn probe(endpoint: &DatabaseEndpoint) -> Result<(), ConnectionError> {
    let client = create_client(endpoint);
    let result: u8 = client
        .query("SELECT 1")
        .fetch_one()
        .await
        .map_err(map_probe_error)?;

    if result != 1 {
        return Err(ConnectionError::Unreachable(
            "unexpected result during connection probe".to_string(),
        ));
    }
    Ok(())
}

fn map_probe_error(error: clickhouse::error::Error) -> ConnectionError {
    let text = error.to_string();
    if looks_like_auth_failure(&text) {
        ConnectionError::Unauthorized(text)
    } else {
        ConnectionError::Unreachable(text)
    }
}

fn looks_like_auth_failure(text: &str) -> bool {
    text.contains("AUTHENTICATION_FAILED")
        || text.contains("Code: 516")
        || text.contains("REQUIRED_PASSWORD")
}

async fn execute_raw(
    http: &reqwest::Client,
    endpoint: &DatabaseEndpoint,
    query: &str,
) -> Result<String, ConnectionError> {
    let response = http
        .post(endpoint.http_url())
        .query(&[
            ("database", endpoint.database.as_str()),
            ("user", endpoint.user.as_str()),
        ])
        .bearer_auth(&endpoint.access_token)
        .body(query.to_string())
        .send()
        .await
        .map_err(|e| {
            if e.is_connect() || e.is_timeout() {
                ConnectionError::Unreachable(e.to_string())
            } else {
                ConnectionError::Io(e.to_string())
            }
        })?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        if status == StatusCode::UNAUTHORIZED
            || status == StatusCode::FORBIDDEN
            || looks_like_auth_failure(&body)
        {
            return Err(ConnectionError::Unauthorized(format!(
                "ClickHouse rejected credentials ({}): {}",
                status, body
            )));
        }
        return Err(ConnectionError::Io(format!(
            "ClickHouse error ({}): {}",
            status, body
        )));
    }

    response
        .text()
        .await
        .map_err(|e| ConnectionError::Io(format!("failed to read response body: {}", e)))
}

/// Runs a SELECT-shaped query and parses the compact row stream.
pub(crate) async fn query_payload(
    http: &reqwest::Client,
    endpoint: &DatabaseEndpoint,
    query: &str,
) -> Result<QueryPayload, ConnectionError> {
    let base = query.trim().trim_end_matches(';');
    let with_format = format!("{} FORMAT JSONCompactEachRowWithNamesAndTypes", base);
    let body = execute_raw(http, endpoint, &with_format).await?;
    parse_payload(&body).map_err(ConnectionError::Io)
}

/// Runs a statement that produces no rows (INSERT and friends).
pub(crate) async fn execute(
    http: &reqwest::Client,
    endpoint: &DatabaseEndpoint,
    statement: &str,
) -> Result<(), ConnectionError> {
    execute_raw(http, endpoint, statement).await.map(|_| ())
}

/// First line carries column names, second the declared types, the rest data.
pub(crate) fn parse_payload(body: &str) -> Result<QueryPayload, String> {
    let mut payload = QueryPayload::default();
    let mut line_no = 0usize;

    for line in body.lines() {
        if line.trim().is_empty() {
            continue;
        }
        line_no += 1;

        let cells: Vec<JsonValue> = serde_json::from_str(line)
            .map_err(|e| format!("failed to parse result line ({}): {}", line, e))?;

        match line_no {
            1 => payload.columns = string_cells(cells),
            2 => payload.types = string_cells(cells),
            _ => payload.rows.push(cells),
        }
    }

    if line_no == 1 {
        return Err("result set is missing its types line".to_string());
    }
    Ok(payload)
}

fn string_cells(cells: Vec<JsonValue>) -> Vec<String> {
    cells
        .into_iter()
        .map(|cell| cell.as_str().unwrap_or_default().to_string())
        .collect()
}

pub(crate) fn quote_identifier(name: &str) -> String {
    format!("`{}`", name.replace('`', "\\`"))
}

pub(crate) fn escape_string_literal(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

pub(crate) fn table_ref(database: &str, table: &str) -> String {
    format!("{}.{}", quote_identifier(database), quote_identifier(table))
}

pub(crate) fn build_select_query(
    table_ref: &str,
    columns: &[String],
    limit: usize,
    offset: Option<usize>,
) -> String {
    let column_list = columns
        .iter()
        .map(|name| quote_identifier(name))
        .collect::<Vec<_>>()
        .join(", ");
    match offset {
        Some(offset) => format!(
            "SELECT {} FROM {} LIMIT {} OFFSET {}",
            column_list, table_ref, limit, offset
        ),
        None => format!("SELECT {} FROM {} LIMIT {}", column_list, table_ref, limit),
    }
}

/// One multi-row VALUES statement per batch; the batch is the unit of
/// durability on the database side.
pub(crate) fn build_insert_statement(
    table_ref: &str,
    columns: &[String],
    rows: &[Vec<Value>],
) -> String {
    let column_list = columns
        .iter()
        .map(|name| quote_identifier(name))
        .collect::<Vec<_>>()
        .join(", ");

    let values = rows
        .iter()
        .map(|row| {
            let cells = row
                .iter()
                .map(value_literal)
                .collect::<Vec<_>>()
                .join(", ");
            format!("({})", cells)
        })
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        "INSERT INTO {} ({}) VALUES {}",
        table_ref, column_list, values
    )
}

fn value_literal(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Int(n) => n.to_string(),
        Value::Float(f) => {
            if f.is_nan() {
                "nan".to_string()
            } else if f.is_infinite() {
                if *f > 0.0 { "inf" } else { "-inf" }.to_string()
            } else {
                f.to_string()
            }
        }
        Value::Str(s) => format!("'{}'", escape_string_literal(s)),
        Value::Bool(b) => b.to_string(),
        Value::DateTime(dt) => format!("'{}'", dt.format("%Y-%m-%d %H:%M:%S")),
    }
}

#[cfg(test)]
mod tests;
