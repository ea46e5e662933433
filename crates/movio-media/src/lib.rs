//! Media tooling for the video worker.
//!
//! This crate provides:
//! - Type-safe FFmpeg command building and a child-process runner
//! - The `Transcoder` seam with caption extraction, transcode and DASH segmentation tasks
//! - The rendition ladder the segmenter produces
//! - Subtitle injection into generated DASH manifests

pub mod command;
pub mod error;
pub mod manifest;
pub mod profile;
pub mod transcoder;

pub use command::{check_ffmpeg, FfmpegCommand, FfmpegRunner};
pub use error::{MediaError, MediaResult};
pub use manifest::{add_subtitle_tracks, add_subtitle_tracks_to_file, subtitle_base_url};
pub use profile::{Rendition, MANIFEST_NAME, SegmentProfile, TranscodeProfile};
pub use transcoder::{FfmpegTranscoder, MediaTask, Transcoder};
