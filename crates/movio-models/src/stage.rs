//! Pipeline context threaded from stage to stage.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::batch::BatchUploadOutcome;
use crate::job::Job;

/// Failure classification recorded on a `StageResult`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Storage or messaging backend unreachable, throttled, or rejecting auth.
    TransientBackendError,
    /// The external media tool exited unsuccessfully.
    ToolFailure,
    /// Local filesystem error.
    IoError,
    /// Payload or document could not be decoded.
    DecodeError,
    /// Anything else; permanent.
    UnexpectedError,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::TransientBackendError => "transient_backend_error",
            FailureKind::ToolFailure => "tool_failure",
            FailureKind::IoError => "io_error",
            FailureKind::DecodeError => "decode_error",
            FailureKind::UnexpectedError => "unexpected_error",
        }
    }

    /// Whether a stage failing with this kind may be attempted again.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            FailureKind::TransientBackendError | FailureKind::ToolFailure
        )
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Local files a job produces along the chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Artifact {
    /// The downloaded upload, e.g. `abc.mkv`.
    SourceVideo,
    /// Extracted WebVTT captions.
    Captions,
    /// Single-rendition MP4 fed to the segmenter.
    TranscodedVideo,
}

impl Artifact {
    pub fn as_str(&self) -> &'static str {
        match self {
            Artifact::SourceVideo => "source_video",
            Artifact::Captions => "captions",
            Artifact::TranscodedVideo => "transcoded_video",
        }
    }
}

/// Aggregate of the fan-out batch outcomes, recorded at finalize.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
pub struct UploadSummary {
    pub total_files: usize,
    pub total_batches: usize,
    pub failed_batches: usize,
}

impl UploadSummary {
    pub fn from_outcomes(total_files: usize, outcomes: &[BatchUploadOutcome]) -> Self {
        Self {
            total_files,
            total_batches: outcomes.len(),
            failed_batches: outcomes.iter().filter(|o| !o.is_success()).count(),
        }
    }

    pub fn all_succeeded(&self) -> bool {
        self.failed_batches == 0
    }
}

/// What the local cleanup managed to remove.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
pub struct CleanupReport {
    /// Source video, transcoded video and captions file.
    pub files_removed: bool,
    /// Whole segment output directory.
    pub segments_removed: bool,
}

/// Context threaded through the stage chain.
///
/// Each stage consumes the previous result and returns a new one. Once
/// `success` is false every later stage hands the value back untouched.
/// The `delete_*` fields are bookkeeping for the source-delete stage only
/// and never influence `success`.
#[derive(Debug, Clone, PartialEq)]
pub struct StageResult {
    pub success: bool,
    pub failure_kind: Option<FailureKind>,
    pub failure_message: Option<String>,
    pub success_message: Option<String>,
    pub delete_success: bool,
    pub delete_failure_kind: Option<FailureKind>,
    pub delete_failure_message: Option<String>,
    pub job: Job,
    pub local_paths: BTreeMap<Artifact, PathBuf>,
    pub segment_output_dir: Option<PathBuf>,
    pub upload_summary: Option<UploadSummary>,
    pub cleanup: Option<CleanupReport>,
}

impl StageResult {
    /// Initial context for a freshly received job.
    pub fn new(job: Job) -> Self {
        Self {
            success: true,
            failure_kind: None,
            failure_message: None,
            success_message: None,
            delete_success: true,
            delete_failure_kind: None,
            delete_failure_message: None,
            job,
            local_paths: BTreeMap::new(),
            segment_output_dir: None,
            upload_summary: None,
            cleanup: None,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.success
    }

    /// Mark the stage as completed with a short machine-readable message.
    pub fn succeed(mut self, message: impl Into<String>) -> Self {
        self.success_message = Some(message.into());
        self
    }

    /// Mark the chain as failed. Later stages pass this value through.
    pub fn fail(mut self, kind: FailureKind, message: impl Into<String>) -> Self {
        self.success = false;
        self.failure_kind = Some(kind);
        self.failure_message = Some(message.into());
        self.success_message = None;
        self
    }

    pub fn with_artifact(mut self, artifact: Artifact, path: impl Into<PathBuf>) -> Self {
        self.local_paths.insert(artifact, path.into());
        self
    }

    pub fn artifact(&self, artifact: Artifact) -> Option<&Path> {
        self.local_paths.get(&artifact).map(PathBuf::as_path)
    }

    pub fn with_segment_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.segment_output_dir = Some(dir.into());
        self
    }

    pub fn record_delete_success(mut self) -> Self {
        self.delete_success = true;
        self.delete_failure_kind = None;
        self.delete_failure_message = None;
        self
    }

    /// Record a failed source delete without touching `success`.
    pub fn record_delete_failure(mut self, kind: FailureKind, message: impl Into<String>) -> Self {
        self.delete_success = false;
        self.delete_failure_kind = Some(kind);
        self.delete_failure_message = Some(message.into());
        self
    }

    pub fn with_upload_summary(mut self, summary: UploadSummary) -> Self {
        self.upload_summary = Some(summary);
        self
    }

    pub fn with_cleanup(mut self, report: CleanupReport) -> Self {
        self.cleanup = Some(report);
        self
    }
}
