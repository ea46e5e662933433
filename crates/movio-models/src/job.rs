//! Job definitions for inbound video submissions.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{ModelError, ModelResult};

/// Unique identifier for a job. This is the submitted video's ID.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Submitting user, as carried in the inbound message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct UserData {
    pub user_id: String,
    pub email: String,
}

/// Wire format of a video submission published by the API service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct VideoJobMessage {
    pub video_id: String,
    pub s3_file_key: String,
    pub s3_file_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub s3_presigned_url: Option<String>,
    /// Older producers spell this key `video_filename_with_extention`.
    #[serde(alias = "video_filename_with_extention")]
    pub video_filename_with_extension: String,
    pub user_data: UserData,
}

impl VideoJobMessage {
    /// Decode a raw queue payload.
    pub fn decode(payload: &[u8]) -> ModelResult<Self> {
        let message: Self = serde_json::from_slice(payload)?;
        message.validate()?;
        Ok(message)
    }

    fn validate(&self) -> ModelResult<()> {
        if self.video_id.trim().is_empty() {
            return Err(ModelError::MissingField("video_id"));
        }
        if self.video_id.contains('/') || self.video_id.contains("..") {
            return Err(ModelError::invalid_payload(format!(
                "video_id must not contain path separators: {}",
                self.video_id
            )));
        }
        if self.s3_file_key.trim().is_empty() {
            return Err(ModelError::MissingField("s3_file_key"));
        }
        if self.video_filename_with_extension.trim().is_empty() {
            return Err(ModelError::MissingField("video_filename_with_extension"));
        }
        if self.video_filename_with_extension.contains('/')
            || self.video_filename_with_extension.contains("..")
        {
            return Err(ModelError::invalid_payload(format!(
                "filename must be a bare file name: {}",
                self.video_filename_with_extension
            )));
        }
        // The stem names every derived artifact and remote key.
        if file_stem(&self.video_filename_with_extension).trim().is_empty() {
            return Err(ModelError::invalid_payload(format!(
                "filename has no stem: {}",
                self.video_filename_with_extension
            )));
        }
        Ok(())
    }
}

/// One submitted video to process end-to-end. Immutable once received.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Job {
    pub job_id: JobId,
    pub source_object_key: String,
    pub source_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub presigned_url: Option<String>,
    pub filename: String,
    pub user_id: String,
    pub user_email: String,
    pub received_at: DateTime<Utc>,
}

impl Job {
    /// Decode a raw queue payload straight into a job.
    pub fn decode(payload: &[u8]) -> ModelResult<Self> {
        VideoJobMessage::decode(payload).map(Self::from)
    }

    /// File name up to the first `.`; names every derived artifact and key.
    ///
    /// `7317dea7__talk.mkv` → `7317dea7__talk`.
    pub fn stem(&self) -> &str {
        file_stem(&self.filename)
    }
}

/// Filename up to the first `.`.
fn file_stem(filename: &str) -> &str {
    filename
        .split_once('.')
        .map(|(stem, _)| stem)
        .unwrap_or(filename)
}

impl From<VideoJobMessage> for Job {
    fn from(message: VideoJobMessage) -> Self {
        Self {
            job_id: JobId(message.video_id),
            source_object_key: message.s3_file_key,
            source_url: message.s3_file_url,
            presigned_url: message.s3_presigned_url,
            filename: message.video_filename_with_extension,
            user_id: message.user_data.user_id,
            user_email: message.user_data.email,
            received_at: Utc::now(),
        }
    }
}
