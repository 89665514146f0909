//! Error types for the ingestion run.
//!
//! Every failure is fatal. Components return [`IngestError`] and the
//! binaries surface it from `main`; recovery is a full re-run.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum IngestError {
    /// The store connection string could not be parsed, or the store is unreachable
    #[error("connection error: {0}")]
    Connection(String),

    /// The source database could not be opened or its metadata is invalid
    #[error("cannot open source database: {0}")]
    SourceOpen(String),

    /// A payload in the data section could not be decoded
    #[error("cannot decode source record at offset {offset:#x}: {reason}")]
    SourceDecode { offset: u64, reason: String },

    /// A leaf value has a kind that maps to no column type
    #[error("unsupported type {kind} for key {path}")]
    Schema { path: String, kind: &'static str },

    /// Two leaves flatten to the same column name, or a leaf takes a reserved name
    #[error("column {path} is produced by more than one key")]
    DuplicateColumn { path: String },

    /// A schema column has no counterpart in a flattened record
    #[error("record has no value for column {column}")]
    Projection { column: String },

    /// A statement, batch append or batch send failed
    #[error("storage error: {0}")]
    Storage(String),

    /// The network cursor hit a corrupt search tree
    #[error("network enumeration failed: {0}")]
    Enumeration(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, IngestError>;

impl From<reqwest::Error> for IngestError {
    fn from(e: reqwest::Error) -> Self {
        IngestError::Storage(e.to_string())
    }
}

impl From<serde_json::Error> for IngestError {
    fn from(e: serde_json::Error) -> Self {
        IngestError::Storage(format!("cannot encode row: {}", e))
    }
}
