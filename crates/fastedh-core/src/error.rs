//! Error types for Fast EDH

use thiserror::Error;

/// Main error type for Fast EDH operations
#[derive(Error, Debug)]
pub enum TrackerError {
    /// Durable store could not be reached (non-interactive context, locked file)
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    /// A durable record did not parse as the expected JSON shape
    #[error("Malformed record under '{key}': {reason}")]
    MalformedRecord {
        /// Storage key of the rejected record
        key: String,
        /// Parser message
        reason: String,
    },

    /// Database creation/opening error
    #[error("Database error: {0}")]
    Database(#[from] redb::DatabaseError),

    /// Transaction error
    #[error("Transaction error: {0}")]
    Transaction(#[from] redb::TransactionError),

    /// Table error
    #[error("Table error: {0}")]
    Table(#[from] redb::TableError),

    /// Storage operation error
    #[error("Storage operation error: {0}")]
    StorageOp(#[from] redb::StorageError),

    /// Commit error
    #[error("Commit error: {0}")]
    Commit(#[from] redb::CommitError),

    /// Error during serialization/deserialization
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// General I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A request or scope URL could not be parsed
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Fetch rejected before a response was produced
    #[error("Network error: {0}")]
    NetworkFailure(String),

    /// A manifest asset could not be fetched while installing a version
    #[error("Failed to install asset {path}: {reason}")]
    AssetInstallFailure {
        /// Manifest path that failed
        path: String,
        /// Why the fetch failed
        reason: String,
    },

    /// A ticking process needs a tokio runtime and none is running
    #[error("No async runtime available to drive the timer")]
    NoRuntime,

    /// Configuration file could not be parsed
    #[error("Config error: {0}")]
    Config(String),

    /// Remote match-history query failed
    #[error("Query error: {0}")]
    Query(String),

    /// Remote match-history query returned no data
    #[error("No matches")]
    NoMatches,

    /// Invalid operation for current state
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),
}

/// Result type alias using TrackerError
pub type TrackerResult<T> = Result<T, TrackerError>;
