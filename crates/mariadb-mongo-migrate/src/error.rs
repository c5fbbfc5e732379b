//! Error types for mariadb-mongo-migrate.
//!
//! Every error is fatal to a run. There is no retry layer: the caller restarts
//! the whole migration.

use thiserror::Error;

/// Result type alias for migration operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Process exit code for argument and configuration errors.
pub const EXIT_USAGE: u8 = 1;

/// Process exit code for any failure once the run has started.
pub const EXIT_RUNTIME: u8 = 100;

/// Errors that can occur while migrating a table.
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid configuration, detected before any connection is attempted.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The MariaDB server is unreachable or rejected the credentials.
    #[error("Source connection error: {0}")]
    SourceConnection(String),

    /// The MongoDB deployment is unreachable or the URI is unusable.
    #[error("Destination connection error: {0}")]
    DestinationConnection(String),

    /// Catalog lookup failed or the table does not exist.
    #[error("Schema error: {0}")]
    Schema(String),

    /// Reading rows from the source cursor failed.
    #[error("Extraction error: {0}")]
    Extraction(String),

    /// Reading rows failed after the load had started.
    #[error("Extraction aborted after {inserted_count} documents were inserted: {message}")]
    ExtractionAborted {
        /// Documents committed to the collection before the failure.
        inserted_count: u64,
        /// Underlying read failure.
        message: String,
    },

    /// A batch insert was rejected by the target.
    #[error("Load failed after {inserted_count} documents were inserted: {message}")]
    Load {
        /// Documents committed to the collection before the failure.
        inserted_count: u64,
        /// Underlying write failure.
        message: String,
    },

    /// The run was cancelled before completion.
    #[error("Migration cancelled after {inserted_count} documents were inserted")]
    Cancelled {
        /// Documents committed to the collection before cancellation.
        inserted_count: u64,
    },
}

impl Error {
    /// Process exit code for this error.
    #[must_use]
    pub fn exit_code(&self) -> u8 {
        match self {
            Error::Config(_) => EXIT_USAGE,
            _ => EXIT_RUNTIME,
        }
    }

    /// Number of documents already written when the run stopped, if known.
    #[must_use]
    pub fn inserted_count(&self) -> Option<u64> {
        match self {
            Error::Load { inserted_count, .. }
            | Error::ExtractionAborted { inserted_count, .. }
            | Error::Cancelled { inserted_count } => Some(*inserted_count),
            _ => None,
        }
    }

    /// Create a Load error.
    pub fn load(inserted_count: u64, message: impl Into<String>) -> Self {
        Error::Load {
            inserted_count,
            message: message.into(),
        }
    }
}
