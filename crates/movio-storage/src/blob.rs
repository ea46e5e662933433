//! Object storage abstraction used by the pipeline stages.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::error::StorageResult;

/// Download, upload and delete objects by bucket and key.
///
/// Implementations are shared process-wide behind an `Arc` and must pool
/// their own connections.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Fetch `bucket/key` into `dest`, creating parent directories.
    async fn download(&self, bucket: &str, key: &str, dest: &Path) -> StorageResult<PathBuf>;

    /// Put a local file at `bucket/key`. Re-uploading a key overwrites it.
    ///
    /// A missing `local_path` is `StorageError::LocalFileMissing`.
    async fn upload(
        &self,
        local_path: &Path,
        bucket: &str,
        key: &str,
        content_type: &str,
    ) -> StorageResult<()>;

    /// Remove `bucket/key`.
    async fn delete(&self, bucket: &str, key: &str) -> StorageResult<()>;
}

/// Content type for the files the worker uploads, by extension.
pub fn content_type_for(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
    {
        Some("mpd") => "application/dash+xml",
        Some("m4s") => "video/iso.segment",
        Some("mp4") => "video/mp4",
        Some("m4a") => "audio/mp4",
        Some("vtt") => "text/vtt",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_types() {
        assert_eq!(content_type_for(Path::new("a/manifest.mpd")), "application/dash+xml");
        assert_eq!(
            content_type_for(Path::new("chunk-stream0-00001.m4s")),
            "video/iso.segment"
        );
        assert_eq!(content_type_for(Path::new("abc.VTT")), "text/vtt");
        assert_eq!(content_type_for(Path::new("noext")), "application/octet-stream");
    }
}
