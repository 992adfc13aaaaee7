//! Catalog introspection against an open database connection.

use crate::clickhouse::{self, escape_string_literal, quote_identifier};
use crate::connection::DatabaseConnection;
use crate::error::{MetadataError, TransferError};
use crate::types::{is_nullable_clickhouse, ColumnDescriptor, NeutralType};

/// Table names in the catalog's natural order, so successive calls are
/// stable within a session.
pub async fn list_tables(conn: &DatabaseConnection) -> Result<Vec<String>, TransferError> {
    let query = format!(
        "SHOW TABLES FROM {}",
        quote_identifier(&conn.endpoint.database)
    );
    let payload = clickhouse::query_payload(&conn.http, &conn.endpoint, &query).await?;

    Ok(payload
        .rows
        .iter()
        .filter_map(|row| row.first().and_then(|v| v.as_str()).map(str::to_string))
        .collect())
}

/// Column descriptors for one table, in declared position order.
///
/// An empty schema means the table vanished (or never existed) and is
/// reported as `TableNotFound` rather than a silent empty list.
pub async fn list_columns(
    conn: &DatabaseConnection,
    table: &str,
) -> Result<Vec<ColumnDescriptor>, TransferError> {
    let query = format!(
        "SELECT name, type FROM system.columns WHERE database = '{}' AND table = '{}' ORDER BY position",
        escape_string_literal(&conn.endpoint.database),
        escape_string_literal(table)
    );
    let payload = clickhouse::query_payload(&conn.http, &conn.endpoint, &query).await?;

    let schema = payload
        .rows
        .iter()
        .map(|row| {
            let name = row.first().and_then(|v| v.as_str()).unwrap_or_default();
            let full_type = row.get(1).and_then(|v| v.as_str()).unwrap_or_default();
            (name.to_string(), full_type.to_string())
        })
        .collect::<Vec<_>>();

    descriptors_from_schema(table, schema).map_err(TransferError::from)
}

pub(crate) fn descriptors_from_schema(
    table: &str,
    schema: Vec<(String, String)>,
) -> Result<Vec<ColumnDescriptor>, MetadataError> {
    if schema.is_empty() {
        return Err(MetadataError::TableNotFound(table.to_string()));
    }

    Ok(schema
        .into_iter()
        .map(|(name, full_type)| ColumnDescriptor {
            name,
            neutral_type: NeutralType::from_clickhouse(&full_type),
            nullable: is_nullable_clickhouse(&full_type),
        })
        .collect())
}
