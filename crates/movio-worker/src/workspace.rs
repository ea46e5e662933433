//! Per-job local directory layout.
//!
//! ```text
//! {work_dir}/{video_id}/
//!     source/{filename}
//!     captions/{stem}.vtt
//!     transcoded/{stem}.mp4
//!     segments/{stem}/manifest.mpd, init-*.m4s, chunk-*.m4s
//! ```

use std::io;
use std::path::{Path, PathBuf};

use movio_models::Job;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobWorkspace {
    root: PathBuf,
    filename: String,
    stem: String,
}

impl JobWorkspace {
    pub fn new(work_dir: &Path, job: &Job) -> Self {
        Self {
            root: work_dir.join(job.job_id.as_str()),
            filename: job.filename.clone(),
            stem: job.stem().to_string(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn source_path(&self) -> PathBuf {
        self.root.join("source").join(&self.filename)
    }

    pub fn captions_path(&self) -> PathBuf {
        self.root.join("captions").join(format!("{}.vtt", self.stem))
    }

    pub fn transcoded_path(&self) -> PathBuf {
        self.root.join("transcoded").join(format!("{}.mp4", self.stem))
    }

    pub fn segments_dir(&self) -> PathBuf {
        self.root.join("segments").join(&self.stem)
    }

    /// Remove the whole workspace. Returns false if it did not exist.
    pub async fn remove(&self) -> io::Result<bool> {
        match tokio::fs::remove_dir_all(&self.root).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use movio_models::{UserData, VideoJobMessage};

    fn job() -> Job {
        Job::from(VideoJobMessage {
            video_id: "abc".into(),
            s3_file_key: "raw/abc.mkv".into(),
            s3_file_url: "https://raw.example/abc.mkv".into(),
            s3_presigned_url: None,
            video_filename_with_extension: "abc.mkv".into(),
            user_data: UserData {
                user_id: "u-1".into(),
                email: "u@example.com".into(),
            },
        })
    }

    #[test]
    fn test_layout() {
        let ws = JobWorkspace::new(Path::new("/tmp/movio"), &job());

        assert_eq!(ws.root(), Path::new("/tmp/movio/abc"));
        assert_eq!(ws.source_path(), Path::new("/tmp/movio/abc/source/abc.mkv"));
        assert_eq!(ws.captions_path(), Path::new("/tmp/movio/abc/captions/abc.vtt"));
        assert_eq!(ws.transcoded_path(), Path::new("/tmp/movio/abc/transcoded/abc.mp4"));
        assert_eq!(ws.segments_dir(), Path::new("/tmp/movio/abc/segments/abc"));
    }

    #[tokio::test]
    async fn test_remove() {
        let dir = tempfile::tempdir().unwrap();
        let ws = JobWorkspace::new(dir.path(), &job());
        tokio::fs::create_dir_all(ws.segments_dir()).await.unwrap();

        assert!(ws.remove().await.unwrap());
        assert!(!ws.root().exists());
        assert!(!ws.remove().await.unwrap());
    }
}
