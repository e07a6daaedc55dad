// src/error.rs

//! Unified error handling for the feed engine.

use thiserror::Error;

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Unified application error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// State store unreachable or transport failure. Fatal for the
    /// current cycle; store-level atomicity guarantees no partial writes.
    #[error("State store unavailable: {0}")]
    StorageUnavailable(String),

    /// State present but inconsistent (undecodable row, unknown status
    /// code). Triggers full-refresh degradation for the cycle.
    #[error("State store corrupted: {0}")]
    StorageCorrupted(String),

    /// Entry source failed to produce a snapshot. Fatal for the cycle;
    /// no state mutation has occurred when this is raised.
    #[error("Snapshot unavailable: {0}")]
    SnapshotUnavailable(String),

    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing failed
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// URL parsing failed
    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Data validation error
    #[error("Validation error: {0}")]
    Validation(String),
}

impl AppError {
    /// Create a storage-corrupted error.
    pub fn storage_corrupted(message: impl Into<String>) -> Self {
        Self::StorageCorrupted(message.into())
    }

    /// Create a snapshot-unavailable error.
    pub fn snapshot(message: impl Into<String>) -> Self {
        Self::SnapshotUnavailable(message.into())
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }
}

impl From<sqlx::Error> for AppError {
    /// Classify sqlx failures: rows that exist but cannot be decoded mean
    /// the data on disk is bad; everything else is a transport problem.
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::Decode(_)
            | sqlx::Error::ColumnDecode { .. }
            | sqlx::Error::ColumnNotFound(_)
            | sqlx::Error::ColumnIndexOutOfBounds { .. }
            | sqlx::Error::TypeNotFound { .. }
            | sqlx::Error::Protocol(_) => AppError::StorageCorrupted(e.to_string()),
            other => AppError::StorageUnavailable(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sqlx_decode_errors_read_as_corruption() {
        let err: AppError = sqlx::Error::ColumnNotFound("status".to_string()).into();
        assert!(matches!(err, AppError::StorageCorrupted(_)));
    }

    #[test]
    fn test_sqlx_transport_errors_read_as_unavailable() {
        let err: AppError = sqlx::Error::PoolClosed.into();
        assert!(matches!(err, AppError::StorageUnavailable(_)));
    }
}
