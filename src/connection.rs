//! Opening and validating endpoints. No retries happen here; callers decide
//! whether a failed open is worth retrying.

use crate::clickhouse;
use crate::config::{DatabaseEndpoint, EndpointConfig, FileEndpoint};
use crate::error::ConnectionError;
use crate::flatfile;

/// Whether an endpoint is opened as the read or the write side of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    Read,
    Write,
}

/// An open ClickHouse endpoint: the probed configuration plus the HTTP
/// client used for all queries against it.
#[derive(Debug, Clone)]
pub struct DatabaseConnection {
    pub(crate) endpoint: DatabaseEndpoint,
    pub(crate) http: reqwest::Client,
}

impl DatabaseConnection {
    pub(crate) async fn open(endpoint: &DatabaseEndpoint) -> Result<Self, ConnectionError> {
        endpoint.validate()?;
        clickhouse::probe(endpoint).await?;

        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| ConnectionError::Io(format!("failed to build HTTP client: {}", e)))?;

        log::info!(
            "opened database connection to {}:{}/{}",
            endpoint.host,
            endpoint.port,
            endpoint.database
        );
        Ok(DatabaseConnection {
            endpoint: endpoint.clone(),
            http,
        })
    }

    pub fn endpoint(&self) -> &DatabaseEndpoint {
        &self.endpoint
    }
}

/// A validated file endpoint. Handles are opened fresh per operation, so the
/// connection itself only carries the checked configuration.
#[derive(Debug, Clone)]
pub struct FileConnection {
    pub(crate) endpoint: FileEndpoint,
}

impl FileConnection {
    pub(crate) fn open(endpoint: &FileEndpoint, mode: AccessMode) -> Result<Self, ConnectionError> {
        endpoint.validate()?;
        match mode {
            AccessMode::Read => flatfile::probe_readable(endpoint)?,
            AccessMode::Write => flatfile::probe_writable(endpoint)?,
        }
        log::info!("opened file endpoint '{}' for {:?}", endpoint.path, mode);
        Ok(FileConnection {
            endpoint: endpoint.clone(),
        })
    }

    pub fn endpoint(&self) -> &FileEndpoint {
        &self.endpoint
    }

    /// Total data record count (excluding the header line).
    pub fn count_records(&self) -> Result<u64, ConnectionError> {
        flatfile::count_records(&self.endpoint)
    }
}

/// An open endpoint of either kind.
#[derive(Debug, Clone)]
pub enum Connection {
    Database(DatabaseConnection),
    File(FileConnection),
}

impl Connection {
    pub async fn open(config: &EndpointConfig, mode: AccessMode) -> Result<Connection, ConnectionError> {
        match config {
            EndpointConfig::Database(endpoint) => {
                DatabaseConnection::open(endpoint).await.map(Connection::Database)
            }
            EndpointConfig::File(endpoint) => {
                FileConnection::open(endpoint, mode).map(Connection::File)
            }
        }
    }
}
