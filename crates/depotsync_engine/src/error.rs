//! Error types for the sync engine.

use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur during sync operations.
#[derive(Error, Debug)]
pub enum SyncError {
    /// The store catalog could not be fetched or parsed.
    ///
    /// No row can be evaluated without a catalog, so this aborts the
    /// entire cycle.
    #[error("catalog unavailable: {message}")]
    CatalogUnavailable {
        /// Underlying cause.
        message: String,
    },

    /// A package download returned a non-success response.
    #[error("download failed for {package}: HTTP {status}")]
    DownloadFailed {
        /// Package that was requested.
        package: String,
        /// HTTP status code returned by the store.
        status: u16,
    },

    /// A package upload returned a non-success response.
    #[error("upload failed: HTTP {status}")]
    UploadFailed {
        /// HTTP status code returned by the store.
        status: u16,
    },

    /// A file's digest did not match the catalog's expected digest.
    #[error("checksum mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch {
        /// Digest the catalog advertises.
        expected: String,
        /// Digest actually computed from the file.
        actual: String,
    },

    /// The record store could not be reached or a write failed.
    #[error("persistence error: {0}")]
    Persistence(String),

    /// File I/O error while staging or placing a package.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SyncError {
    /// Creates a `CatalogUnavailable` error.
    pub fn catalog_unavailable(message: impl Into<String>) -> Self {
        Self::CatalogUnavailable {
            message: message.into(),
        }
    }

    /// Creates a `Persistence` error.
    pub fn persistence(message: impl Into<String>) -> Self {
        Self::Persistence(message.into())
    }

    /// Returns true if this error invalidates the whole cycle rather
    /// than a single row.
    pub fn is_cycle_fatal(&self) -> bool {
        matches!(self, SyncError::CatalogUnavailable { .. })
    }
}

impl From<rusqlite::Error> for SyncError {
    fn from(err: rusqlite::Error) -> Self {
        SyncError::Persistence(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cycle_fatal_classification() {
        assert!(SyncError::catalog_unavailable("connection refused").is_cycle_fatal());
        assert!(!SyncError::DownloadFailed {
            package: "agent.zip".into(),
            status: 404,
        }
        .is_cycle_fatal());
        assert!(!SyncError::persistence("db gone").is_cycle_fatal());
    }

    #[test]
    fn error_display() {
        let err = SyncError::ChecksumMismatch {
            expected: "abc123".into(),
            actual: "def456".into(),
        };
        assert!(err.to_string().contains("abc123"));
        assert!(err.to_string().contains("def456"));

        let err = SyncError::DownloadFailed {
            package: "agent.zip".into(),
            status: 503,
        };
        assert!(err.to_string().contains("503"));
    }
}
