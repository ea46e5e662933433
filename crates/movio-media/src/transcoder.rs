//! The `Transcoder` seam and its FFmpeg implementation.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Semaphore;
use tracing::{debug, info};

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};
use crate::profile::{SegmentProfile, TranscodeProfile};

/// One invocation of the external media tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaTask {
    /// First subtitle stream to WebVTT.
    ExtractCaptions { input: PathBuf, output: PathBuf },
    /// Video and audio to a single-rendition MP4.
    Transcode {
        input: PathBuf,
        output: PathBuf,
        profile: TranscodeProfile,
    },
    /// Multi-bitrate DASH into `output_dir`.
    Segment {
        input: PathBuf,
        output_dir: PathBuf,
        profile: SegmentProfile,
    },
}

impl MediaTask {
    pub fn name(&self) -> &'static str {
        match self {
            MediaTask::ExtractCaptions { .. } => "extract_captions",
            MediaTask::Transcode { .. } => "transcode",
            MediaTask::Segment { .. } => "segment",
        }
    }

    pub fn input(&self) -> &Path {
        match self {
            MediaTask::ExtractCaptions { input, .. }
            | MediaTask::Transcode { input, .. }
            | MediaTask::Segment { input, .. } => input,
        }
    }

    /// File the tool writes; for `Segment`, the manifest.
    pub fn output(&self) -> PathBuf {
        match self {
            MediaTask::ExtractCaptions { output, .. } | MediaTask::Transcode { output, .. } => {
                output.clone()
            }
            MediaTask::Segment {
                output_dir,
                profile,
                ..
            } => output_dir.join(profile.manifest_name),
        }
    }

    /// Translate the task into an FFmpeg command line.
    pub fn command(&self) -> FfmpegCommand {
        match self {
            MediaTask::ExtractCaptions { input, output } => FfmpegCommand::new(input, output)
                .map("0:s:0")
                .format("webvtt"),
            MediaTask::Transcode {
                input,
                output,
                profile,
            } => FfmpegCommand::new(input, output)
                .map("0:v")
                .map("0:a")
                .video_bitrate(profile.bitrate())
                .frame_size(profile.frame_size())
                .video_codec(profile.video_codec)
                .audio_codec(profile.audio_codec),
            MediaTask::Segment { input, profile, .. } => {
                let mut cmd =
                    FfmpegCommand::new(input, self.output()).filter_complex(profile.filter_graph());
                for (i, rendition) in profile.renditions.iter().enumerate() {
                    cmd = cmd
                        .map(format!("[{}]", rendition.label))
                        .output_args([format!("-c:v:{}", i), profile.video_codec.to_string()])
                        .output_args([format!("-b:v:{}", i), rendition.bitrate()]);
                }
                cmd.map("0:a?")
                    .output_args(["-init_seg_name", profile.init_segment_template])
                    .output_args(["-media_seg_name", profile.media_segment_template])
                    .output_args(["-use_template", "1"])
                    .output_arg("-seg_duration")
                    .output_arg(profile.segment_duration_secs.to_string())
                    .output_args(["-adaptation_sets", "id=0,streams=v id=1,streams=a"])
                    .format("dash")
            }
        }
    }
}

/// Runs media tasks. `Ok` means the tool exited successfully.
#[async_trait]
pub trait Transcoder: Send + Sync {
    async fn run(&self, task: &MediaTask) -> MediaResult<()>;
}

/// FFmpeg child processes, bounded by a process-wide semaphore.
#[derive(Clone)]
pub struct FfmpegTranscoder {
    runner: FfmpegRunner,
    permits: Arc<Semaphore>,
}

impl FfmpegTranscoder {
    pub fn new(max_processes: usize, timeout_secs: Option<u64>) -> Self {
        let runner = match timeout_secs {
            Some(secs) => FfmpegRunner::new().with_timeout(secs),
            None => FfmpegRunner::new(),
        };
        Self {
            runner,
            permits: Arc::new(Semaphore::new(max_processes.max(1))),
        }
    }
}

#[async_trait]
impl Transcoder for FfmpegTranscoder {
    async fn run(&self, task: &MediaTask) -> MediaResult<()> {
        if !tokio::fs::try_exists(task.input()).await? {
            return Err(MediaError::FileNotFound(task.input().to_path_buf()));
        }

        let output = task.output();
        if let Some(parent) = output.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| MediaError::ffmpeg_failed("process pool closed", None, None))?;

        debug!("Starting {} for {}", task.name(), task.input().display());
        self.runner.run(&task.command()).await?;
        info!("{} wrote {}", task.name(), output.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(task: &MediaTask) -> Vec<String> {
        task.command().build_args()
    }

    fn follows(args: &[String], flag: &str, value: &str) -> bool {
        args.windows(2).any(|w| w[0] == flag && w[1] == value)
    }

    #[test]
    fn test_caption_command() {
        let task = MediaTask::ExtractCaptions {
            input: "/w/abc/source/abc.mkv".into(),
            output: "/w/abc/captions/abc.vtt".into(),
        };
        let args = args(&task);
        assert!(follows(&args, "-map", "0:s:0"));
        assert!(follows(&args, "-f", "webvtt"));
        assert_eq!(args.last().map(String::as_str), Some("/w/abc/captions/abc.vtt"));
    }

    #[test]
    fn test_transcode_command() {
        let task = MediaTask::Transcode {
            input: "abc.mkv".into(),
            output: "abc.mp4".into(),
            profile: TranscodeProfile::default(),
        };
        let args = args(&task);
        assert!(follows(&args, "-map", "0:v"));
        assert!(follows(&args, "-map", "0:a"));
        assert!(follows(&args, "-b:v", "800k"));
        assert!(follows(&args, "-s:v", "640x360"));
        assert!(follows(&args, "-c:v", "libx264"));
        assert!(follows(&args, "-c:a", "aac"));
    }

    #[test]
    fn test_segment_command() {
        let task = MediaTask::Segment {
            input: "abc.mp4".into(),
            output_dir: "/w/abc/segments/abc".into(),
            profile: SegmentProfile::default(),
        };
        let args = args(&task);

        assert!(follows(&args, "-map", "[720p]"));
        assert!(follows(&args, "-b:v:0", "2400k"));
        assert!(follows(&args, "-b:v:1", "1200k"));
        assert!(follows(&args, "-b:v:2", "800k"));
        assert!(follows(&args, "-map", "0:a?"));
        assert!(follows(&args, "-seg_duration", "4"));
        assert!(follows(&args, "-adaptation_sets", "id=0,streams=v id=1,streams=a"));
        assert!(follows(&args, "-f", "dash"));
        assert_eq!(
            args.last().map(String::as_str),
            Some("/w/abc/segments/abc/manifest.mpd")
        );
    }

    #[tokio::test]
    async fn test_missing_input_is_not_a_tool_failure() {
        let dir = tempfile::tempdir().unwrap();
        let task = MediaTask::Transcode {
            input: dir.path().join("missing.mkv"),
            output: dir.path().join("out.mp4"),
            profile: TranscodeProfile::default(),
        };

        let err = FfmpegTranscoder::new(1, None).run(&task).await.unwrap_err();
        assert!(matches!(err, MediaError::FileNotFound(_)));
        assert!(!err.is_tool_failure());
    }
}
