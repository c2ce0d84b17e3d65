//! Error types for session-ingest
//!
//! Two layers:
//! - [`Error`] is the crate-level error returned by store, config and
//!   orchestration calls. A [`DatabaseError`] inside it is a persistence
//!   failure and aborts a batch run.
//! - [`TransferError`] is the per-record taxonomy produced at the worker
//!   boundary. It is converted into a `failed` outcome for that record and
//!   never escapes the orchestrator.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for session-ingest operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for session-ingest
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "batch_size")
        key: Option<String>,
    },

    /// Record store operation failed
    #[error("database error: {0}")]
    Database(#[from] DatabaseError),

    /// A transfer error surfaced outside the worker boundary
    #[error("transfer error: {0}")]
    Transfer(#[from] TransferError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A scraper collaborator failed to produce candidates
    #[error("scrape of {source_name} failed: {message}")]
    Scrape {
        /// Source the scraper was responsible for
        source_name: String,
        /// Failure description
        message: String,
    },

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Shorthand for a configuration error tied to a specific key
    pub fn config(message: impl Into<String>, key: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
            key: Some(key.into()),
        }
    }

    /// Whether this error came from the record store
    pub fn is_persistence(&self) -> bool {
        matches!(self, Error::Database(_))
    }
}

/// Record store errors
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Failed to connect to database
    #[error("failed to connect to database: {0}")]
    ConnectionFailed(String),

    /// Failed to run migrations
    #[error("failed to run migrations: {0}")]
    MigrationFailed(String),

    /// Query failed
    #[error("query failed: {0}")]
    QueryFailed(String),

    /// Record not found
    #[error("record not found: {0}")]
    NotFound(String),

    /// Stored row could not be turned back into a typed record
    #[error("corrupt row: {0}")]
    CorruptRow(String),
}

/// Failures of a single record transfer
///
/// Every variant is caught at the worker boundary and persisted as the
/// record's `error` text via [`TransferError::cause`].
#[derive(Debug, Error)]
pub enum TransferError {
    /// Connection reset, refused, DNS failure or timeout
    #[error("{0}")]
    TransientNetwork(String),

    /// Non-success HTTP status, malformed URL or truncated body
    #[error("{0}")]
    Validation(String),

    /// Throughput stayed below the floor after the grace period
    #[error("throughput {rate_bps} B/s below minimum {min_bps} B/s after {elapsed:?}")]
    Stall {
        /// Measured rolling rate in bytes per second
        rate_bps: u64,
        /// Configured floor in bytes per second
        min_bps: u64,
        /// Time since the transfer started
        elapsed: Duration,
    },

    /// Local filesystem failure while writing or committing
    #[error("{op} {path}: {source}")]
    Io {
        /// What was being attempted ("create", "write", "rename", ...)
        op: &'static str,
        /// Path involved
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// The worker task panicked
    #[error("worker panicked: {0}")]
    Panicked(String),
}

impl TransferError {
    /// Stable machine-readable tag for this failure class
    pub fn kind(&self) -> &'static str {
        match self {
            TransferError::TransientNetwork(_) => "transient_network",
            TransferError::Validation(_) => "validation",
            TransferError::Stall { .. } => "stall",
            TransferError::Io { .. } => "io",
            TransferError::Panicked(_) => "panicked",
        }
    }

    /// Text stored in the record's `error` column: `"<kind>: <message>"`
    pub fn cause(&self) -> String {
        format!("{}: {}", self.kind(), self)
    }

    pub(crate) fn io(op: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        TransferError::Io {
            op,
            path: path.into(),
            source,
        }
    }
}

impl From<reqwest::Error> for TransferError {
    fn from(e: reqwest::Error) -> Self {
        if let Some(status) = e.status() {
            return TransferError::Validation(format!("HTTP {}", status));
        }
        if e.is_timeout() {
            TransferError::TransientNetwork(format!("timed out: {}", e))
        } else if e.is_connect() {
            TransferError::TransientNetwork(format!("connection failed: {}", e))
        } else if e.is_builder() || e.is_decode() {
            TransferError::Validation(e.to_string())
        } else {
            TransferError::TransientNetwork(e.to_string())
        }
    }
}
