//! Error types for the bulk engine.

use thiserror::Error;

/// Main error type for bulk operations.
#[derive(Error, Debug)]
pub enum BulkError {
    /// Configuration error (missing connection parameter, bad connection string).
    #[error("Configuration error: {0}")]
    Config(String),

    /// Database connection or query error.
    #[error("Database error: {0}")]
    Connection(#[from] tiberius::error::Error),

    /// Schema introspection produced no usable structure.
    #[error("Schema error: {0}")]
    Schema(String),

    /// The bulk-copy stream was rejected by the server.
    #[error("Bulk copy failed for {destination}: {message}")]
    BulkCopy {
        destination: String,
        message: String,
    },

    /// A staging/join/drop statement failed.
    #[error("SQL execution failed ({statement}): {message}")]
    Sql { statement: String, message: String },

    /// The copy timeout elapsed mid-stream. The session is left inside a
    /// bulk-load exchange and cannot accept further batches.
    #[error("Bulk copy into {destination} timed out after {seconds} seconds; the connection is no longer usable")]
    Timeout { destination: String, seconds: u32 },

    /// IO error (connection-string file operations).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML deserialization error for named connection strings.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl BulkError {
    /// Create a BulkCopy error for a destination table.
    pub fn bulk_copy(destination: impl Into<String>, message: impl Into<String>) -> Self {
        BulkError::BulkCopy {
            destination: destination.into(),
            message: message.into(),
        }
    }

    /// Create a Sql error tagged with the statement kind that failed.
    pub fn sql(statement: impl Into<String>, message: impl Into<String>) -> Self {
        BulkError::Sql {
            statement: statement.into(),
            message: message.into(),
        }
    }
}

/// Result type alias for bulk operations.
pub type Result<T> = std::result::Result<T, BulkError>;
