//! Worker configuration.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{WorkerError, WorkerResult};

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Root for per-job workspaces
    pub work_dir: PathBuf,
    /// Maximum concurrent jobs
    pub max_concurrent_jobs: usize,
    /// Maximum concurrent FFmpeg processes across all jobs
    pub max_ffmpeg_processes: usize,
    /// Maximum segment batches uploading at once within a job
    pub max_parallel_batch_uploads: usize,
    /// Files per segment upload batch
    pub segment_batch_size: usize,
    /// Languages the external translator produces
    pub subtitle_languages: Vec<String>,
    /// Bucket holding raw uploads
    pub source_bucket: String,
    /// Bucket the translator watches for extracted captions
    pub raw_captions_bucket: String,
    /// Bucket serving DASH segments
    pub segments_bucket: String,
    /// Key prefix for segments inside `segments_bucket`
    pub segments_root: String,
    /// First retry delay; doubles with every attempt
    pub retry_base_delay: Duration,
    /// Kill FFmpeg after this many seconds
    pub ffmpeg_timeout_secs: Option<u64>,
    /// Health endpoint bind address
    pub health_addr: SocketAddr,
    /// Prometheus exporter bind address
    pub metrics_addr: Option<SocketAddr>,
    /// Graceful shutdown timeout
    pub shutdown_timeout: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            work_dir: PathBuf::from("/tmp/movio"),
            max_concurrent_jobs: 4,
            max_ffmpeg_processes: 2,
            max_parallel_batch_uploads: 8,
            segment_batch_size: 10,
            subtitle_languages: ["en", "bn", "hi", "fr", "es"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            source_bucket: "movio-raw-videos".to_string(),
            raw_captions_bucket: "movio-raw-captions".to_string(),
            segments_bucket: "movio-segments".to_string(),
            segments_root: "segments".to_string(),
            retry_base_delay: Duration::from_secs(1),
            ffmpeg_timeout_secs: None,
            health_addr: SocketAddr::from(([0, 0, 0, 0], 8082)),
            metrics_addr: None,
            shutdown_timeout: Duration::from_secs(60),
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> WorkerResult<Self> {
        let defaults = Self::default();

        let subtitle_languages = match std::env::var("MOVIO_SUBTITLE_LANGUAGES") {
            Ok(raw) => parse_languages(&raw),
            Err(_) => defaults.subtitle_languages,
        };

        Ok(Self {
            work_dir: std::env::var("MOVIO_WORK_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.work_dir),
            max_concurrent_jobs: env_or("MOVIO_MAX_CONCURRENT_JOBS", defaults.max_concurrent_jobs)
                .max(1),
            max_ffmpeg_processes: env_or("MOVIO_MAX_FFMPEG_PROCESSES", defaults.max_ffmpeg_processes)
                .max(1),
            max_parallel_batch_uploads: env_or(
                "MOVIO_MAX_PARALLEL_BATCH_UPLOADS",
                defaults.max_parallel_batch_uploads,
            )
            .max(1),
            segment_batch_size: env_or("MOVIO_SEGMENT_BATCH_SIZE", defaults.segment_batch_size)
                .max(1),
            subtitle_languages,
            source_bucket: required("MOVIO_SOURCE_BUCKET")?,
            raw_captions_bucket: required("MOVIO_RAW_CAPTIONS_BUCKET")?,
            segments_bucket: required("MOVIO_SEGMENTS_BUCKET")?,
            segments_root: std::env::var("MOVIO_SEGMENTS_ROOT").unwrap_or(defaults.segments_root),
            retry_base_delay: Duration::from_millis(env_or("MOVIO_RETRY_BASE_DELAY_MS", 1000)),
            ffmpeg_timeout_secs: std::env::var("MOVIO_FFMPEG_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok()),
            health_addr: match std::env::var("MOVIO_HEALTH_ADDR") {
                Ok(addr) => parse_addr("MOVIO_HEALTH_ADDR", &addr)?,
                Err(_) => defaults.health_addr,
            },
            metrics_addr: match std::env::var("MOVIO_METRICS_ADDR") {
                Ok(addr) => Some(parse_addr("MOVIO_METRICS_ADDR", &addr)?),
                Err(_) => None,
            },
            shutdown_timeout: Duration::from_secs(env_or("MOVIO_SHUTDOWN_TIMEOUT_SECS", 60)),
        })
    }

    /// Public URL of a job's manifest once its segments are uploaded.
    pub fn manifest_url(&self, stem: &str) -> String {
        format!(
            "https://{}.s3.amazonaws.com/{}/{}/manifest.mpd",
            self.segments_bucket, self.segments_root, stem
        )
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

fn required(key: &str) -> WorkerResult<String> {
    std::env::var(key)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| WorkerError::config_error(format!("{} not set", key)))
}

fn parse_addr(key: &str, raw: &str) -> WorkerResult<SocketAddr> {
    raw.parse()
        .map_err(|e| WorkerError::config_error(format!("{}={} is not a socket address: {}", key, raw, e)))
}

fn parse_languages(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|code| !code.is_empty())
        .map(str::to_string)
        .collect()
}
