//! Storage error types.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Failed to configure storage client: {0}")]
    ConfigError(String),

    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Local file not found: {}", .0.display())]
    LocalFileMissing(PathBuf),

    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Download failed: {0}")]
    DownloadFailed(String),

    #[error("Delete failed: {0}")]
    DeleteFailed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl StorageError {
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    pub fn not_found(key: impl Into<String>) -> Self {
        Self::NotFound(key.into())
    }

    pub fn upload_failed(msg: impl Into<String>) -> Self {
        Self::UploadFailed(msg.into())
    }

    pub fn download_failed(msg: impl Into<String>) -> Self {
        Self::DownloadFailed(msg.into())
    }

    pub fn delete_failed(msg: impl Into<String>) -> Self {
        Self::DeleteFailed(msg.into())
    }

    /// Connectivity, throttling or credential problems talking to the backend.
    ///
    /// Missing objects, missing local files and local IO are permanent.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            StorageError::UploadFailed(_)
                | StorageError::DownloadFailed(_)
                | StorageError::DeleteFailed(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(StorageError::upload_failed("dispatch failure").is_transient());
        assert!(StorageError::download_failed("timeout").is_transient());
        assert!(StorageError::delete_failed("AccessDenied").is_transient());

        assert!(!StorageError::not_found("raw/abc.mkv").is_transient());
        assert!(!StorageError::LocalFileMissing(PathBuf::from("/tmp/x.m4s")).is_transient());
        assert!(!StorageError::config_error("no region").is_transient());
    }

    #[test]
    fn test_local_missing_message() {
        let err = StorageError::LocalFileMissing(PathBuf::from("/tmp/seg/chunk-1.m4s"));
        assert_eq!(err.to_string(), "Local file not found: /tmp/seg/chunk-1.m4s");
    }
}
