//! Bounded row sampling for previews, over either endpoint kind.

use crate::clickhouse::{self, build_select_query, table_ref};
use crate::connection::{Connection, DatabaseConnection, FileConnection};
use crate::error::{ConnectionError, SourceError, TransferError};
use crate::flatfile::FileBatchReader;
use crate::types::{is_nullable_clickhouse, NeutralType, Row, Value};

/// Hard cap recommended by the caller contract.
pub const DEFAULT_PREVIEW_LIMIT: usize = 100;

/// Reads at most `limit` rows, with values ordered per `selected_columns`.
///
/// Rows whose cells fail to map are logged and omitted instead of failing
/// the preview. Zero rows is a valid result; zero requested columns is not.
pub async fn preview(
    conn: &Connection,
    table: Option<&str>,
    selected_columns: &[String],
    limit: usize,
) -> Result<Vec<Row>, TransferError> {
    if selected_columns.is_empty() {
        return Err(SourceError::Empty.into());
    }

    match conn {
        Connection::Database(db) => {
            let table = table.ok_or_else(|| {
                ConnectionError::InvalidConfig(
                    "table name is required for a database preview".to_string(),
                )
            })?;
            preview_database(db, table, selected_columns, limit).await
        }
        Connection::File(file) => preview_file(file, selected_columns, limit),
    }
}

async fn preview_database(
    conn: &DatabaseConnection,
    table: &str,
    selected_columns: &[String],
    limit: usize,
) -> Result<Vec<Row>, TransferError> {
    let query = build_select_query(
        &table_ref(&conn.endpoint.database, table),
        selected_columns,
        limit,
        None,
    );
    let payload = clickhouse::query_payload(&conn.http, &conn.endpoint, &query).await?;

    // The types line of the result set is already aligned to the selected
    // column order.
    let column_types = payload
        .types
        .iter()
        .map(|raw| (NeutralType::from_clickhouse(raw), is_nullable_clickhouse(raw)))
        .collect::<Vec<_>>();

    let mut rows = Vec::with_capacity(payload.rows.len().min(limit));
    for raw_row in payload.rows.iter().take(limit) {
        let mut values = Vec::with_capacity(selected_columns.len());
        let mut malformed = None;

        for (index, name) in selected_columns.iter().enumerate() {
            let cell = raw_row.get(index).unwrap_or(&serde_json::Value::Null);
            let (ty, nullable) = column_types
                .get(index)
                .copied()
                .unwrap_or((NeutralType::Utf8String, true));
            match Value::from_json(cell, ty, nullable, name) {
                Ok(value) => values.push(value),
                Err(error) => {
                    malformed = Some(error);
                    break;
                }
            }
        }

        match malformed {
            None => rows.push(Row { values }),
            Some(error) => log::warn!("skipping preview row: {}", error),
        }
    }
    Ok(rows)
}

fn preview_file(
    conn: &FileConnection,
    selected_columns: &[String],
    limit: usize,
) -> Result<Vec<Row>, TransferError> {
    // A fresh handle per call; the preview never disturbs a later full read.
    let mut reader = FileBatchReader::new(&conn.endpoint, selected_columns)?;
    let batch = reader.next_batch(limit)?;
    Ok(batch.into_iter().map(|values| Row { values }).collect())
}
