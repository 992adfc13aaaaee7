use crate::types::NeutralType;
use thiserror::Error;

/// Endpoint open/validation failures surfaced before any data moves.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConnectionError {
    #[error("endpoint unreachable: {0}")]
    Unreachable(String),
    #[error("authentication rejected: {0}")]
    Unauthorized(String),
    #[error("invalid endpoint configuration: {0}")]
    InvalidConfig(String),
    #[error("endpoint I/O failure: {0}")]
    Io(String),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MetadataError {
    #[error("table '{0}' not found")]
    TableNotFound(String),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SourceError {
    #[error("no columns requested")]
    Empty,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TypeError {
    #[error("malformed cell '{cell}' for {expected} column '{column}'")]
    Malformed {
        column: String,
        cell: String,
        expected: NeutralType,
    },
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("a transfer is already running on this engine")]
    Busy,
    #[error("transfer cancelled")]
    Cancelled,
}

/// Umbrella error for every operation the crate exposes.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransferError {
    #[error(transparent)]
    Connection(#[from] ConnectionError),
    #[error(transparent)]
    Metadata(#[from] MetadataError),
    #[error(transparent)]
    Source(#[from] SourceError),
    #[error(transparent)]
    Type(#[from] TypeError),
    #[error(transparent)]
    Engine(#[from] EngineError),
}
