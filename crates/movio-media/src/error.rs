//! Error types for media operations.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for media operations.
pub type MediaResult<T> = Result<T, MediaError>;

/// Errors that can occur during media processing.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("FFmpeg not found in PATH")]
    FfmpegNotFound,

    #[error("FFmpeg command failed: {message}")]
    FfmpegFailed {
        message: String,
        stderr: Option<String>,
        exit_code: Option<i32>,
    },

    #[error("File not found: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("Operation timed out after {0} seconds")]
    Timeout(u64),

    #[error("Malformed manifest: {0}")]
    ManifestMalformed(String),

    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl MediaError {
    /// Create an FFmpeg failure error.
    pub fn ffmpeg_failed(
        message: impl Into<String>,
        stderr: Option<String>,
        exit_code: Option<i32>,
    ) -> Self {
        Self::FfmpegFailed {
            message: message.into(),
            stderr,
            exit_code,
        }
    }

    pub fn manifest_malformed(message: impl Into<String>) -> Self {
        Self::ManifestMalformed(message.into())
    }

    /// The tool ran and did not produce its output.
    pub fn is_tool_failure(&self) -> bool {
        matches!(self, MediaError::FfmpegFailed { .. } | MediaError::Timeout(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_failure_classification() {
        assert!(MediaError::ffmpeg_failed("exit 1", None, Some(1)).is_tool_failure());
        assert!(MediaError::Timeout(30).is_tool_failure());
        assert!(!MediaError::FfmpegNotFound.is_tool_failure());
        assert!(!MediaError::manifest_malformed("no Period").is_tool_failure());
    }
}
