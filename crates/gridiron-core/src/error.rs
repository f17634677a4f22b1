//! Error types for Gridiron Data Hub.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    // Data errors
    #[error("Unknown dataset: {0}")]
    UnknownDataset(String),

    #[error("Column '{column}' missing from dataset {dataset}")]
    MissingColumn { dataset: String, column: String },

    #[error("Malformed table: {0}")]
    MalformedTable(String),

    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Data quality check failed for {dataset}: {reason}")]
    QualityCheckFailed { dataset: String, reason: String },

    // Source errors
    #[error("Source unavailable: {0}")]
    SourceUnavailable(String),

    #[error("Source error: {0}")]
    Source(String),

    #[error("Circuit breaker open for {service}")]
    CircuitOpen { service: String },

    // Infrastructure errors
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Operation timed out: {0}")]
    Timeout(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Downstream job '{job}' failed: {message}")]
    DownstreamFailed { job: String, message: String },

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    // Generic
    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Whether retrying the same operation may succeed.
    ///
    /// Only connectivity and operational failures qualify; data errors are
    /// deterministic and fail the same way on every attempt.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Error::Connection(_) | Error::SourceUnavailable(_) | Error::Timeout(_)
        )
    }

    /// Whether the error is caused by the data rather than the infrastructure.
    pub fn is_data_error(&self) -> bool {
        matches!(
            self,
            Error::UnknownDataset(_)
                | Error::MissingColumn { .. }
                | Error::MalformedTable(_)
                | Error::InvalidIdentifier(_)
                | Error::InvalidRequest(_)
                | Error::QualityCheckFailed { .. }
        )
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}
