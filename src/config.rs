use crate::error::{ConnectionError, TransferError};
use serde::{Deserialize, Serialize};

/// A ClickHouse endpoint. The access token is opaque and passed through to
/// the connection layer untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseEndpoint {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub user: String,
    pub access_token: String,
}

impl DatabaseEndpoint {
    pub fn validate(&self) -> Result<(), ConnectionError> {
        require_non_empty("host", &self.host)?;
        require_non_empty("database", &self.database)?;
        require_non_empty("user", &self.user)?;
        require_non_empty("accessToken", &self.access_token)?;
        if self.port == 0 {
            return Err(ConnectionError::InvalidConfig(
                "port must be non-zero".to_string(),
            ));
        }
        Ok(())
    }

    pub fn http_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

/// A header-delimited text file endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileEndpoint {
    pub path: String,
    pub delimiter: String,
    #[serde(default)]
    pub has_header: bool,
}

impl FileEndpoint {
    pub fn validate(&self) -> Result<(), ConnectionError> {
        require_non_empty("path", &self.path)?;
        self.delimiter_byte().map(|_| ())
    }

    /// The csv machinery takes a single byte, so the delimiter must be
    /// exactly one ASCII character.
    pub fn delimiter_byte(&self) -> Result<u8, ConnectionError> {
        let mut chars = self.delimiter.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) if c.is_ascii() => Ok(c as u8),
            (Some(_), None) => Err(ConnectionError::InvalidConfig(format!(
                "delimiter '{}' must be an ASCII character",
                self.delimiter
            ))),
            _ => Err(ConnectionError::InvalidConfig(
                "delimiter must be exactly one character".to_string(),
            )),
        }
    }
}

/// Immutable description of one side of a transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EndpointConfig {
    Database(DatabaseEndpoint),
    File(FileEndpoint),
}

impl EndpointConfig {
    pub fn validate(&self) -> Result<(), ConnectionError> {
        match self {
            EndpointConfig::Database(endpoint) => endpoint.validate(),
            EndpointConfig::File(endpoint) => endpoint.validate(),
        }
    }

    pub fn is_database(&self) -> bool {
        matches!(self, EndpointConfig::Database(_))
    }

    pub fn label(&self) -> &'static str {
        match self {
            EndpointConfig::Database(_) => "database",
            EndpointConfig::File(_) => "file",
        }
    }
}

/// Everything one run needs: both endpoints, the database-side table name,
/// and the ordered column selection that defines both what is read and the
/// emitted column order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferRequest {
    pub source: EndpointConfig,
    pub target: EndpointConfig,
    #[serde(default)]
    pub table: Option<String>,
    pub selected_columns: Vec<String>,
}

impl TransferRequest {
    pub fn validate(&self) -> Result<(), ConnectionError> {
        self.source.validate()?;
        self.target.validate()?;

        let columns = self.normalized_columns();
        if columns.is_empty() {
            return Err(ConnectionError::InvalidConfig(
                "at least one selected column is required".to_string(),
            ));
        }
        for (index, name) in columns.iter().enumerate() {
            if columns[..index].contains(name) {
                return Err(ConnectionError::InvalidConfig(format!(
                    "column '{}' selected more than once",
                    name
                )));
            }
        }

        if (self.source.is_database() || self.target.is_database())
            && self.table_name().is_none()
        {
            return Err(ConnectionError::InvalidConfig(
                "table is required when either endpoint is a database".to_string(),
            ));
        }

        Ok(())
    }

    pub fn normalized_columns(&self) -> Vec<String> {
        self.selected_columns
            .iter()
            .map(|value| value.trim())
            .filter(|value| !value.is_empty())
            .map(str::to_string)
            .collect()
    }

    pub fn table_name(&self) -> Option<String> {
        self.table
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferStatus {
    Completed,
    Failed,
}

/// The run's only durable artifact besides the written target data.
#[derive(Debug, Clone, PartialEq)]
pub struct TransferResult {
    pub status: TransferStatus,
    pub records_processed: u64,
    pub error: Option<TransferError>,
}

fn require_non_empty(field: &str, value: &str) -> Result<(), ConnectionError> {
    if value.trim().is_empty() {
        return Err(ConnectionError::InvalidConfig(format!(
            "{} is required",
            field
        )));
    }
    Ok(())
}
