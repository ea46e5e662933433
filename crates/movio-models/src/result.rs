//! Outbound result message consumed by the API service.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::job::Job;

/// Published once per job when the segments have been pushed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ProcessedVideoMessage {
    pub video_id: String,
    pub user_id: String,
    pub email: String,
    /// Public URL of the edited DASH manifest.
    #[serde(rename = "s3_manifest_file_url")]
    pub manifest_url: String,
    /// English captions as extracted from the source, if the source had any.
    #[serde(rename = "subtitle_en_vtt_data")]
    pub subtitle_en_vtt: Option<String>,
}

impl ProcessedVideoMessage {
    pub fn for_job(job: &Job, manifest_url: impl Into<String>, subtitle_en_vtt: Option<String>) -> Self {
        Self {
            video_id: job.job_id.to_string(),
            user_id: job.user_id.clone(),
            email: job.user_email.clone(),
            manifest_url: manifest_url.into(),
            subtitle_en_vtt,
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_names() {
        let message = ProcessedVideoMessage {
            video_id: "abc".into(),
            user_id: "u-1".into(),
            email: "u@example.com".into(),
            manifest_url: "https://bucket.s3.amazonaws.com/segments/abc/manifest.mpd".into(),
            subtitle_en_vtt: None,
        };

        let value: serde_json::Value = serde_json::from_str(&message.to_json().unwrap()).unwrap();
        assert_eq!(
            value["s3_manifest_file_url"],
            "https://bucket.s3.amazonaws.com/segments/abc/manifest.mpd"
        );
        assert!(value["subtitle_en_vtt_data"].is_null());
        assert!(value.get("manifest_url").is_none());
    }
}
