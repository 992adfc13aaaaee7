//! Delimited flat file plumbing: header resolution, batched reads, and the
//! append-mode batch sink.

use crate::config::FileEndpoint;
use crate::error::{ConnectionError, TransferError};
use crate::types::{ColumnDescriptor, NeutralType, Value};
use csv::{ReaderBuilder, StringRecord, WriterBuilder};
use std::fs::{File, OpenOptions};
use std::path::Path;

fn io_error(endpoint: &FileEndpoint, action: &str, error: impl std::fmt::Display) -> ConnectionError {
    ConnectionError::Io(format!("failed to {} '{}': {}", action, endpoint.path, error))
}

/// Every call opens a fresh handle so previews never disturb the state a
/// later full read needs.
pub(crate) fn open_reader(endpoint: &FileEndpoint) -> Result<csv::Reader<File>, ConnectionError> {
    let delimiter = endpoint.delimiter_byte()?;
    let file = File::open(&endpoint.path).map_err(|e| io_error(endpoint, "open", e))?;
    Ok(ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(endpoint.has_header)
        .flexible(true)
        .from_reader(file))
}

/// Checks that the file exists and its first record parses.
pub(crate) fn probe_readable(endpoint: &FileEndpoint) -> Result<(), ConnectionError> {
    let mut reader = open_reader(endpoint)?;
    if endpoint.has_header {
        reader.headers().map_err(|e| io_error(endpoint, "read header of", e))?;
    } else {
        let mut record = StringRecord::new();
        reader
            .read_record(&mut record)
            .map_err(|e| io_error(endpoint, "read", e))?;
    }
    Ok(())
}

/// Checks that the target path can be created or appended to. Parent
/// directories are created on demand.
pub(crate) fn probe_writable(endpoint: &FileEndpoint) -> Result<(), ConnectionError> {
    endpoint.delimiter_byte()?;
    let path = Path::new(&endpoint.path);
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .map_err(|e| io_error(endpoint, "create parent directory of", e))?;
        }
    }
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map(|_| ())
        .map_err(|e| io_error(endpoint, "open for writing", e))
}

/// Column names of a file endpoint: the header line when present, otherwise
/// synthesized `col1..colN` names from the first record's width.
pub(crate) fn resolve_columns(endpoint: &FileEndpoint) -> Result<Vec<String>, ConnectionError> {
    let mut reader = open_reader(endpoint)?;
    if endpoint.has_header {
        let headers = reader.headers().map_err(|e| io_error(endpoint, "read header of", e))?;
        return Ok(headers.iter().map(str::to_string).collect());
    }

    let mut record = StringRecord::new();
    let has_row = reader
        .read_record(&mut record)
        .map_err(|e| io_error(endpoint, "read", e))?;
    if !has_row {
        return Ok(Vec::new());
    }
    Ok((1..=record.len()).map(|i| format!("col{}", i)).collect())
}

/// File columns carry no declared types; cells enter the neutral model as
/// nullable strings and get re-typed against the target.
pub(crate) fn resolve_descriptors(
    endpoint: &FileEndpoint,
) -> Result<Vec<ColumnDescriptor>, ConnectionError> {
    Ok(resolve_columns(endpoint)?
        .into_iter()
        .map(|name| ColumnDescriptor {
            name,
            neutral_type: NeutralType::Utf8String,
            nullable: true,
        })
        .collect())
}

/// Total data record count (excluding the header line).
pub(crate) fn count_records(endpoint: &FileEndpoint) -> Result<u64, ConnectionError> {
    let mut reader = open_reader(endpoint)?;
    let mut record = StringRecord::new();
    let mut count = 0u64;
    while reader
        .read_record(&mut record)
        .map_err(|e| io_error(endpoint, "read", e))?
    {
        count += 1;
    }
    Ok(count)
}

/// Streams a file in bounded batches, projected to the selected columns in
/// the selected order.
pub(crate) struct FileBatchReader {
    endpoint: FileEndpoint,
    reader: csv::Reader<File>,
    indices: Vec<usize>,
}

impl FileBatchReader {
    pub(crate) fn new(
        endpoint: &FileEndpoint,
        selected_columns: &[String],
    ) -> Result<Self, TransferError> {
        let columns = resolve_columns(endpoint)?;
        let indices = selected_columns
            .iter()
            .map(|name| {
                columns.iter().position(|c| c == name).ok_or_else(|| {
                    ConnectionError::InvalidConfig(format!(
                        "column '{}' not present in file '{}'",
                        name, endpoint.path
                    ))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(FileBatchReader {
            endpoint: endpoint.clone(),
            reader: open_reader(endpoint)?,
            indices,
        })
    }

    /// Returns up to `batch_size` rows; an empty vector means the file is
    /// exhausted. Missing trailing cells of ragged rows read as empty.
    pub(crate) fn next_batch(
        &mut self,
        batch_size: usize,
    ) -> Result<Vec<Vec<Value>>, TransferError> {
        let mut rows = Vec::new();
        let mut record = StringRecord::new();

        while rows.len() < batch_size {
            let has_row = self
                .reader
                .read_record(&mut record)
                .map_err(|e| io_error(&self.endpoint, "read", e))?;
            if !has_row {
                break;
            }
            let row = self
                .indices
                .iter()
                .map(|&i| Value::Str(record.get(i).unwrap_or("").to_string()))
                .collect();
            rows.push(row);
        }
        Ok(rows)
    }
}

/// Append-mode batch sink. The header is written only when the file is
/// empty, so re-running a transfer appends data rows without duplicating
/// the header; deduplication is the caller's responsibility.
pub(crate) struct FileSinkWriter {
    endpoint: FileEndpoint,
    writer: csv::Writer<File>,
}

impl FileSinkWriter {
    pub(crate) fn open(
        endpoint: &FileEndpoint,
        columns: &[String],
    ) -> Result<Self, ConnectionError> {
        let delimiter = endpoint.delimiter_byte()?;
        probe_writable(endpoint)?;

        let existing_len = std::fs::metadata(&endpoint.path)
            .map(|meta| meta.len())
            .unwrap_or(0);
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&endpoint.path)
            .map_err(|e| io_error(endpoint, "open for writing", e))?;
        let mut writer = WriterBuilder::new()
            .delimiter(delimiter)
            .has_headers(false)
            .from_writer(file);

        if endpoint.has_header && existing_len == 0 {
            writer
                .write_record(columns)
                .map_err(|e| io_error(endpoint, "write header to", e))?;
        }

        Ok(FileSinkWriter {
            endpoint: endpoint.clone(),
            writer,
        })
    }

    /// Writes and flushes one batch; the flushed batch is the unit of
    /// durability on the file side.
    pub(crate) fn write_batch(&mut self, rows: &[Vec<Value>]) -> Result<(), ConnectionError> {
        for row in rows {
            let cells = row.iter().map(Value::to_text);
            self.writer
                .write_record(cells)
                .map_err(|e| io_error(&self.endpoint, "write to", e))?;
        }
        self.writer
            .flush()
            .map_err(|e| io_error(&self.endpoint, "flush", e))
    }
}
