//! Segment upload batches.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// One local file and where it lands in the bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct SegmentUpload {
    pub local_path: PathBuf,
    pub destination_key: String,
}

/// Ordered group of segment uploads handled as one unit.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
pub struct SegmentBatch {
    pub index: usize,
    pub items: Vec<SegmentUpload>,
}

impl SegmentBatch {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Result of uploading one batch. `Success` only if every item landed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum BatchUploadOutcome {
    Success,
    Failure,
}

impl BatchUploadOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, BatchUploadOutcome::Success)
    }
}
