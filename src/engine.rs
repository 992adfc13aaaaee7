//! The batch transfer loop.
//!
//! Rows stream from the source in bounded batches, get re-typed against the
//! target's expected columns, and land on the target one batch at a time.
//! The batch is the unit of durability: there is no global transaction and
//! no rollback, so a failed or cancelled run leaves every fully written
//! batch in place. Re-running an identical request appends; the engine does
//! not deduplicate.

use crate::clickhouse::{self, build_insert_statement, build_select_query, table_ref};
use crate::config::{TransferRequest, TransferResult, TransferStatus};
use crate::connection::{AccessMode, Connection, DatabaseConnection};
use crate::error::{ConnectionError, EngineError, TransferError};
use crate::flatfile::{self, FileBatchReader, FileSinkWriter};
use crate::metadata;
use crate::progress::{ProgressTracker, RunStatus};
use crate::types::{ColumnDescriptor, Value};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

pub const DEFAULT_BATCH_SIZE: usize = 1_000;
pub const DEFAULT_BATCH_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct TransferOptions {
    /// Rows pulled and pushed per round trip.
    pub batch_size: usize,
    /// Independent cap on each batch read and each batch write.
    pub batch_timeout: Duration,
}

impl Default for TransferOptions {
    fn default() -> Self {
        TransferOptions {
            batch_size: DEFAULT_BATCH_SIZE,
            batch_timeout: DEFAULT_BATCH_TIMEOUT,
        }
    }
}

/// Runs one transfer at a time; progress is pollable from other tasks while
/// a run is in flight.
pub struct TransferEngine {
    options: TransferOptions,
    progress: Arc<ProgressTracker>,
}

impl TransferEngine {
    pub fn new() -> Self {
        TransferEngine::with_options(TransferOptions::default())
    }

    pub fn with_options(options: TransferOptions) -> Self {
        TransferEngine {
            options,
            progress: Arc::new(ProgressTracker::new()),
        }
    }

    pub fn progress(&self) -> Arc<ProgressTracker> {
        Arc::clone(&self.progress)
    }

    /// Moves the requested columns from source to target.
    ///
    /// Pre-flight rejections (a malformed request, or a run already in
    /// flight) return `Err` without touching the tracker. Once the run is
    /// underway every outcome is an `Ok(TransferResult)`: `Failed` results
    /// carry the cause and the count of rows already written, which stay
    /// on the target.
    pub async fn run(
        &self,
        request: &TransferRequest,
        cancel: CancellationToken,
    ) -> Result<TransferResult, TransferError> {
        request.validate()?;
        self.progress.try_begin()?;
        log::info!(
            "transfer started: {} -> {}",
            request.source.label(),
            request.target.label()
        );

        match self.execute(request, cancel).await {
            Ok(records_processed) => {
                self.progress.finish(RunStatus::Completed);
                log::info!("transfer completed: {} records", records_processed);
                Ok(TransferResult {
                    status: TransferStatus::Completed,
                    records_processed,
                    error: None,
                })
            }
            Err(error) => {
                self.progress.finish(RunStatus::Failed);
                let records_processed = self.progress.records_processed();
                log::error!(
                    "transfer failed after {} records: {}",
                    records_processed,
                    error
                );
                Ok(TransferResult {
                    status: TransferStatus::Failed,
                    records_processed,
                    error: Some(error),
                })
            }
        }
    }

    async fn execute(
        &self,
        request: &TransferRequest,
        cancel: CancellationToken,
    ) -> Result<u64, TransferError> {
        let columns = request.normalized_columns();
        let table = request.table_name();

        let source = Connection::open(&request.source, AccessMode::Read).await?;
        let target = Connection::open(&request.target, AccessMode::Write).await?;

        let source_descriptors =
            resolve_descriptors(&source, table.as_deref(), &columns).await?;
        let target_descriptors = match &target {
            Connection::Database(_) => {
                resolve_descriptors(&target, table.as_deref(), &columns).await?
            }
            // A file target has no declared schema; source types are
            // rendered to text as they are.
            Connection::File(_) => source_descriptors.clone(),
        };

        let mut reader = BatchReader::open(source, table.as_deref(), &columns, source_descriptors)?;
        let mut writer = BatchWriter::open(target, table.as_deref(), &columns)?;

        let mut total = 0u64;
        loop {
            if cancel.is_cancelled() {
                return Err(EngineError::Cancelled.into());
            }

            let batch = bounded(
                self.options.batch_timeout,
                "read",
                reader.next_batch(self.options.batch_size),
            )
            .await?;
            if batch.is_empty() {
                break;
            }

            let mapped = remap_batch(batch, &target_descriptors)?;
            let written = mapped.len();
            bounded(self.options.batch_timeout, "write", writer.write_batch(mapped)).await?;

            total += written as u64;
            self.progress.advance(written as u64);
            log::debug!("batch written: {} rows ({} total)", written, total);

            if written < self.options.batch_size {
                break;
            }
        }

        Ok(total)
    }
}

impl Default for TransferEngine {
    fn default() -> Self {
        TransferEngine::new()
    }
}

/// Caps one batch read or write. An elapsed timer surfaces as an I/O error
/// and fails the run like any other endpoint fault.
async fn bounded<T>(
    limit: Duration,
    action: &str,
    fut: impl Future<Output = Result<T, TransferError>>,
) -> Result<T, TransferError> {
    match timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(ConnectionError::Io(format!("batch {} timed out", action)).into()),
    }
}

/// Descriptors for the selected columns, in selected order: from the catalog
/// for a database endpoint, from the header line for a file endpoint.
async fn resolve_descriptors(
    conn: &Connection,
    table: Option<&str>,
    selected_columns: &[String],
) -> Result<Vec<ColumnDescriptor>, TransferError> {
    let available = match conn {
        Connection::Database(db) => {
            let table = table.ok_or_else(|| {
                ConnectionError::InvalidConfig(
                    "table is required for a database endpoint".to_string(),
                )
            })?;
            metadata::list_columns(db, table).await?
        }
        Connection::File(file) => flatfile::resolve_descriptors(file.endpoint())?,
    };

    selected_columns
        .iter()
        .map(|name| {
            available
                .iter()
                .find(|descriptor| &descriptor.name == name)
                .cloned()
                .ok_or_else(|| {
                    ConnectionError::InvalidConfig(format!("column '{}' not found", name))
                        .into()
                })
        })
        .collect()
}

/// Re-types one batch against the target's expected columns. A cell that
/// cannot be represented in the target's type aborts the run.
fn remap_batch(
    batch: Vec<Vec<Value>>,
    target_descriptors: &[ColumnDescriptor],
) -> Result<Vec<Vec<Value>>, TransferError> {
    batch
        .into_iter()
        .map(|row| {
            row.into_iter()
                .zip(target_descriptors)
                .map(|(value, descriptor)| {
                    value
                        .coerce(descriptor.neutral_type, descriptor.nullable, &descriptor.name)
                        .map_err(TransferError::from)
                })
                .collect()
        })
        .collect()
}

enum BatchReader {
    Database(DatabaseBatchReader),
    // The slot is empty only while a blocking read is in flight; a timed-out
    // read leaves it empty, and the run is already failing at that point.
    File(Option<FileBatchReader>),
}

impl BatchReader {
    fn open(
        conn: Connection,
        table: Option<&str>,
        selected_columns: &[String],
        descriptors: Vec<ColumnDescriptor>,
    ) -> Result<Self, TransferError> {
        match conn {
            Connection::Database(db) => {
                let table = table.ok_or_else(|| {
                    ConnectionError::InvalidConfig(
                        "table is required for a database source".to_string(),
                    )
                })?;
                Ok(BatchReader::Database(DatabaseBatchReader {
                    table_ref: table_ref(&db.endpoint().database, table),
                    conn: db,
                    columns: selected_columns.to_vec(),
                    descriptors,
                    offset: 0,
                }))
            }
            Connection::File(file) => Ok(BatchReader::File(Some(FileBatchReader::new(
                file.endpoint(),
                selected_columns,
            )?))),
        }
    }

    async fn next_batch(&mut self, batch_size: usize) -> Result<Vec<Vec<Value>>, TransferError> {
        match self {
            BatchReader::Database(reader) => reader.next_batch(batch_size).await,
            // File reads are synchronous; run them off the async workers so
            // the batch timeout has a suspension point to fire across.
            BatchReader::File(slot) => {
                let mut reader = slot.take().ok_or_else(|| {
                    ConnectionError::Io("file reader lost to an earlier timeout".to_string())
                })?;
                let (reader, result) = tokio::task::spawn_blocking(move || {
                    let result = reader.next_batch(batch_size);
                    (reader, result)
                })
                .await
                .map_err(|e| ConnectionError::Io(format!("file read task failed: {}", e)))?;
                *slot = Some(reader);
                result
            }
        }
    }
}

/// Pages through the source table with LIMIT/OFFSET, the selected columns
/// only, without an ORDER BY. This assumes the server reads parts in a
/// stable order across the paged queries; if that order shifts mid-run,
/// rows can be skipped or repeated.
struct DatabaseBatchReader {
    conn: DatabaseConnection,
    table_ref: String,
    columns: Vec<String>,
    descriptors: Vec<ColumnDescriptor>,
    offset: usize,
}

impl DatabaseBatchReader {
    async fn next_batch(&mut self, batch_size: usize) -> Result<Vec<Vec<Value>>, TransferError> {
        let query = build_select_query(&self.table_ref, &self.columns, batch_size, Some(self.offset));
        let payload =
            clickhouse::query_payload(&self.conn.http, &self.conn.endpoint, &query).await?;

        let mut rows = Vec::with_capacity(payload.rows.len());
        for raw_row in &payload.rows {
            if raw_row.len() != self.descriptors.len() {
                return Err(ConnectionError::Io(format!(
                    "unexpected column count in result row: got {}, expected {}",
                    raw_row.len(),
                    self.descriptors.len()
                ))
                .into());
            }
            let row = raw_row
                .iter()
                .zip(&self.descriptors)
                .map(|(cell, descriptor)| {
                    Value::from_json(
                        cell,
                        descriptor.neutral_type,
                        descriptor.nullable,
                        &descriptor.name,
                    )
                    .map_err(TransferError::from)
                })
                .collect::<Result<Vec<_>, _>>()?;
            rows.push(row);
        }

        self.offset += rows.len();
        Ok(rows)
    }
}

enum BatchWriter {
    Database(DatabaseBatchWriter),
    File(Option<FileSinkWriter>),
}

impl BatchWriter {
    fn open(
        conn: Connection,
        table: Option<&str>,
        selected_columns: &[String],
    ) -> Result<Self, TransferError> {
        match conn {
            Connection::Database(db) => {
                let table = table.ok_or_else(|| {
                    ConnectionError::InvalidConfig(
                        "table is required for a database target".to_string(),
                    )
                })?;
                Ok(BatchWriter::Database(DatabaseBatchWriter {
                    table_ref: table_ref(&db.endpoint().database, table),
                    conn: db,
                    columns: selected_columns.to_vec(),
                }))
            }
            Connection::File(file) => Ok(BatchWriter::File(Some(FileSinkWriter::open(
                file.endpoint(),
                selected_columns,
            )?))),
        }
    }

    async fn write_batch(&mut self, rows: Vec<Vec<Value>>) -> Result<(), TransferError> {
        if rows.is_empty() {
            return Ok(());
        }
        match self {
            BatchWriter::Database(writer) => writer.write_batch(&rows).await,
            BatchWriter::File(slot) => {
                let mut writer = slot.take().ok_or_else(|| {
                    ConnectionError::Io("file writer lost to an earlier timeout".to_string())
                })?;
                let (writer, result) = tokio::task::spawn_blocking(move || {
                    let result = writer.write_batch(&rows);
                    (writer, result)
                })
                .await
                .map_err(|e| ConnectionError::Io(format!("file write task failed: {}", e)))?;
                *slot = Some(writer);
                result.map_err(TransferError::from)
            }
        }
    }
}

/// One multi-row INSERT per batch.
struct DatabaseBatchWriter {
    conn: DatabaseConnection,
    table_ref: String,
    columns: Vec<String>,
}

impl DatabaseBatchWriter {
    async fn write_batch(&mut self, rows: &[Vec<Value>]) -> Result<(), TransferError> {
        let statement = build_insert_statement(&self.table_ref, &self.columns, rows);
        clickhouse::execute(&self.conn.http, &self.conn.endpoint, &statement)
            .await
            .map_err(TransferError::from)
    }
}
