//! Shared data models for the Movio worker.
//!
//! This crate provides Serde-serializable types for:
//! - Inbound job messages and the immutable `Job`
//! - The `StageResult` context threaded through the pipeline
//! - Segment upload batches and their outcomes
//! - The outbound processed-video result message

pub mod batch;
pub mod error;
pub mod job;
pub mod result;
pub mod stage;

pub use batch::{BatchUploadOutcome, SegmentBatch, SegmentUpload};
pub use error::{ModelError, ModelResult};
pub use job::{Job, JobId, UserData, VideoJobMessage};
pub use result::ProcessedVideoMessage;
pub use stage::{Artifact, CleanupReport, FailureKind, StageResult, UploadSummary};
