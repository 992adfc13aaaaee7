//! Bulk data movement between ClickHouse tables and delimited flat files.
//!
//! An [`EndpointConfig`] describes either side; a [`TransferRequest`] pairs a
//! source with a target and names the columns to move. [`TransferEngine`]
//! streams rows in batches, mapping every cell through a small neutral type
//! system ([`NeutralType`], [`Value`]) so that either endpoint kind can sit on
//! either side. [`preview`] and the metadata helpers serve the discovery
//! steps that precede a run.

pub mod config;
pub mod connection;
pub mod engine;
pub mod error;
pub mod metadata;
pub mod preview;
pub mod progress;
pub mod types;

mod clickhouse;
mod flatfile;

pub use config::{
    DatabaseEndpoint, EndpointConfig, FileEndpoint, TransferRequest, TransferResult,
    TransferStatus,
};
pub use connection::{AccessMode, Connection, DatabaseConnection, FileConnection};
pub use engine::{TransferEngine, TransferOptions, DEFAULT_BATCH_SIZE, DEFAULT_BATCH_TIMEOUT};
pub use error::{
    ConnectionError, EngineError, MetadataError, SourceError, TransferError, TypeError,
};
pub use preview::DEFAULT_PREVIEW_LIMIT;
pub use progress::{ProgressTracker, RunStatus};
pub use types::{ColumnDescriptor, NeutralType, Row, Value};

/// Table names visible in the endpoint's database, in catalog order.
pub async fn list_tables(endpoint: &DatabaseEndpoint) -> Result<Vec<String>, TransferError> {
    let conn = DatabaseConnection::open(endpoint).await?;
    metadata::list_tables(&conn).await
}

/// Column descriptors for one table, in declared position order.
pub async fn list_columns(
    endpoint: &DatabaseEndpoint,
    table: &str,
) -> Result<Vec<ColumnDescriptor>, TransferError> {
    let conn = DatabaseConnection::open(endpoint).await?;
    metadata::list_columns(&conn, table).await
}

/// Samples at most `limit` rows from either endpoint kind.
pub async fn preview(
    endpoint: &EndpointConfig,
    table: Option<&str>,
    selected_columns: &[String],
    limit: usize,
) -> Result<Vec<Row>, TransferError> {
    let conn = Connection::open(endpoint, AccessMode::Read).await?;
    preview::preview(&conn, table, selected_columns, limit).await
}
