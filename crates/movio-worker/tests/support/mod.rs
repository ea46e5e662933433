//! In-memory collaborators for driving the pipeline end to end.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;

use movio_media::{MediaError, MediaResult, MediaTask, Transcoder};
use movio_models::{Job, ProcessedVideoMessage, UserData, VideoJobMessage};
use movio_queue::{Delivery, JobSource, QueueError, QueueResult, ResultSink};
use movio_storage::{BlobStore, StorageError, StorageResult};
use movio_worker::{StageContext, WorkerConfig};

pub const CAPTIONS: &str = "WEBVTT\n\n00:00:00.000 --> 00:00:02.000\nHello there\n";

pub const MANIFEST: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<MPD xmlns="urn:mpeg:dash:schema:mpd:2011" type="static">
	<Period id="0" start="PT0.0S">
		<AdaptationSet id="0" contentType="video"/>
		<AdaptationSet id="1" contentType="audio"/>
	</Period>
</MPD>
"#;

pub fn job(video_id: &str, filename: &str) -> Job {
    Job::from(VideoJobMessage {
        video_id: video_id.into(),
        s3_file_key: format!("raw/{}", filename),
        s3_file_url: format!("https://raw.example/{}", filename),
        s3_presigned_url: None,
        video_filename_with_extension: filename.into(),
        user_data: UserData {
            user_id: "u-1".into(),
            email: "u@example.com".into(),
        },
    })
}

pub fn config(work_dir: &Path) -> WorkerConfig {
    WorkerConfig {
        work_dir: work_dir.to_path_buf(),
        retry_base_delay: Duration::from_millis(1),
        ..WorkerConfig::default()
    }
}

pub fn context(
    work_dir: &Path,
    store: &Arc<FakeBlobStore>,
    transcoder: &Arc<FakeTranscoder>,
    sink: &Arc<RecordingSink>,
) -> StageContext {
    StageContext::new(
        config(work_dir),
        store.clone(),
        transcoder.clone(),
        sink.clone(),
    )
}

#[derive(Debug, Clone)]
pub struct RecordedUpload {
    pub bucket: String,
    pub key: String,
    pub content_type: String,
    pub body: Vec<u8>,
}

/// Blob store backed by the local filesystem and a log of calls.
#[derive(Default)]
pub struct FakeBlobStore {
    pub uploads: Mutex<Vec<RecordedUpload>>,
    pub deletes: Mutex<Vec<(String, String)>>,
    fail_delete: bool,
    /// Remaining transient failures per destination key.
    flaky_keys: Mutex<HashMap<String, u32>>,
}

impl FakeBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_delete() -> Self {
        Self {
            fail_delete: true,
            ..Self::default()
        }
    }

    /// Fail uploads to `key` with a transport error `times` times.
    pub fn flaky(self, key: &str, times: u32) -> Self {
        self.flaky_keys
            .lock()
            .unwrap()
            .insert(key.to_string(), times);
        self
    }

    pub fn uploads_to(&self, bucket: &str) -> Vec<RecordedUpload> {
        self.uploads
            .lock()
            .unwrap()
            .iter()
            .filter(|u| u.bucket == bucket)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl BlobStore for FakeBlobStore {
    async fn download(&self, _bucket: &str, _key: &str, dest: &Path) -> StorageResult<PathBuf> {
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(dest, b"matroska").await?;
        Ok(dest.to_path_buf())
    }

    async fn upload(
        &self,
        local_path: &Path,
        bucket: &str,
        key: &str,
        content_type: &str,
    ) -> StorageResult<()> {
        let body = tokio::fs::read(local_path)
            .await
            .map_err(|_| StorageError::LocalFileMissing(local_path.to_path_buf()))?;

        {
            let mut flaky = self.flaky_keys.lock().unwrap();
            if let Some(remaining) = flaky.get_mut(key) {
                if *remaining > 0 {
                    *remaining -= 1;
                    return Err(StorageError::upload_failed("connection reset by peer"));
                }
            }
        }

        self.uploads.lock().unwrap().push(RecordedUpload {
            bucket: bucket.to_string(),
            key: key.to_string(),
            content_type: content_type.to_string(),
            body,
        });
        Ok(())
    }

    async fn delete(&self, bucket: &str, key: &str) -> StorageResult<()> {
        self.deletes
            .lock()
            .unwrap()
            .push((bucket.to_string(), key.to_string()));
        if self.fail_delete {
            return Err(StorageError::delete_failed("AccessDenied"));
        }
        Ok(())
    }
}

/// Writes plausible outputs instead of running FFmpeg.
pub struct FakeTranscoder {
    pub calls: Mutex<Vec<&'static str>>,
    segment_files: usize,
    fail_transcode: bool,
    segment_delay: Duration,
}

impl FakeTranscoder {
    /// `segment_files` includes the manifest.
    pub fn new(segment_files: usize) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            segment_files: segment_files.max(1),
            fail_transcode: false,
            segment_delay: Duration::ZERO,
        }
    }

    /// Keep the job in flight for `delay` while segmenting.
    pub fn with_segment_delay(mut self, delay: Duration) -> Self {
        self.segment_delay = delay;
        self
    }

    pub fn failing_transcode() -> Self {
        Self {
            fail_transcode: true,
            ..Self::new(3)
        }
    }

    pub fn count(&self, name: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| **c == name).count()
    }
}

#[async_trait]
impl Transcoder for FakeTranscoder {
    async fn run(&self, task: &MediaTask) -> MediaResult<()> {
        self.calls.lock().unwrap().push(task.name());

        match task {
            MediaTask::ExtractCaptions { output, .. } => {
                write(output, CAPTIONS.as_bytes()).await?;
            }
            MediaTask::Transcode { output, .. } => {
                if self.fail_transcode {
                    return Err(MediaError::ffmpeg_failed(
                        "FFmpeg exited with non-zero status",
                        Some("Invalid data found when processing input".into()),
                        Some(1),
                    ));
                }
                write(output, b"mp4").await?;
            }
            MediaTask::Segment { output_dir, .. } => {
                tokio::time::sleep(self.segment_delay).await;
                tokio::fs::create_dir_all(output_dir).await?;
                write(&task.output(), MANIFEST.as_bytes()).await?;
                for i in 1..self.segment_files {
                    let name = format!("chunk-stream0-{:05}.m4s", i);
                    write(&output_dir.join(name), b"moof").await?;
                }
            }
        }
        Ok(())
    }
}

async fn write(path: &Path, body: &[u8]) -> MediaResult<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, body).await?;
    Ok(())
}

/// Result sink that remembers what was published.
#[derive(Default)]
pub struct RecordingSink {
    pub published: Mutex<Vec<ProcessedVideoMessage>>,
    fail: bool,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn messages(&self) -> Vec<ProcessedVideoMessage> {
        self.published.lock().unwrap().clone()
    }
}

#[async_trait]
impl ResultSink for RecordingSink {
    async fn publish(&self, message: &ProcessedVideoMessage) -> QueueResult<()> {
        if self.fail {
            return Err(QueueError::publish_failed("READONLY You can't write against a read only replica"));
        }
        self.published.lock().unwrap().push(message.clone());
        Ok(())
    }
}

pub fn job_payload(video_id: &str, filename: &str) -> Vec<u8> {
    format!(
        r#"{{
            "video_id": "{video_id}",
            "s3_file_key": "raw/{filename}",
            "s3_file_url": "https://raw.example/{filename}",
            "video_filename_with_extension": "{filename}",
            "user_data": {{"user_id": "u-1", "email": "u@example.com"}}
        }}"#
    )
    .into_bytes()
}

/// Hands out prepared batches of deliveries, then nothing.
#[derive(Default)]
pub struct ScriptedSource {
    batches: Mutex<VecDeque<Vec<Delivery>>>,
    /// Notified once the last prepared batch has been handed out.
    pub drained: Notify,
}

impl ScriptedSource {
    pub fn new(batches: Vec<Vec<Delivery>>) -> Self {
        Self {
            batches: Mutex::new(batches.into()),
            drained: Notify::new(),
        }
    }
}

#[async_trait]
impl JobSource for ScriptedSource {
    async fn receive(&self, _max: usize) -> QueueResult<Vec<Delivery>> {
        let next = {
            let mut batches = self.batches.lock().unwrap();
            let next = batches.pop_front();
            if next.is_some() && batches.is_empty() {
                self.drained.notify_one();
            }
            next
        };
        match next {
            Some(batch) => Ok(batch),
            None => {
                // Stands in for the broker's blocking read.
                tokio::time::sleep(Duration::from_millis(10)).await;
                Ok(Vec::new())
            }
        }
    }
}
