//! Worker error types.

use thiserror::Error;

use movio_media::MediaError;
use movio_models::{FailureKind, ModelError};
use movio_queue::QueueError;
use movio_storage::StorageError;

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Missing local artifact: {0}")]
    MissingArtifact(&'static str),

    #[error("Job failed: {0}")]
    JobFailed(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Media error: {0}")]
    Media(#[from] MediaError),

    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),

    #[error("Invalid job payload: {0}")]
    Model(#[from] ModelError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl WorkerError {
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    pub fn job_failed(msg: impl Into<String>) -> Self {
        Self::JobFailed(msg.into())
    }

    /// Classification recorded on the `StageResult`.
    pub fn failure_kind(&self) -> FailureKind {
        match self {
            WorkerError::Storage(StorageError::Io(_)) => FailureKind::IoError,
            WorkerError::Storage(e) if e.is_transient() => FailureKind::TransientBackendError,
            WorkerError::Storage(_) => FailureKind::UnexpectedError,
            WorkerError::Queue(e) if e.is_transient() => FailureKind::TransientBackendError,
            WorkerError::Queue(_) => FailureKind::UnexpectedError,
            WorkerError::Media(MediaError::Io(_)) => FailureKind::IoError,
            WorkerError::Media(e) if e.is_tool_failure() => FailureKind::ToolFailure,
            WorkerError::Media(_) => FailureKind::UnexpectedError,
            WorkerError::Model(_) => FailureKind::DecodeError,
            WorkerError::Io(_) => FailureKind::IoError,
            WorkerError::ConfigError(_)
            | WorkerError::MissingArtifact(_)
            | WorkerError::JobFailed(_) => FailureKind::UnexpectedError,
        }
    }

    /// Check if error is retryable.
    pub fn is_retryable(&self) -> bool {
        self.failure_kind().is_retryable()
    }
}
