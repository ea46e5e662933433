//! Prometheus metrics for the worker.

use std::net::SocketAddr;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::error::{WorkerError, WorkerResult};

/// Install the Prometheus recorder and serve `/metrics` on `addr`.
pub fn init_metrics(addr: SocketAddr) -> WorkerResult<()> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| WorkerError::config_error(format!("Failed to install Prometheus exporter: {}", e)))
}

/// Metric names as constants for consistency.
pub mod names {
    pub const JOBS_TOTAL: &str = "movio_jobs_total";
    pub const JOB_DURATION_SECONDS: &str = "movio_job_duration_seconds";
    pub const STAGE_RETRIES_TOTAL: &str = "movio_stage_retries_total";
    pub const STAGE_FAILURES_TOTAL: &str = "movio_stage_failures_total";
    pub const SOURCE_DELETE_FAILURES_TOTAL: &str = "movio_source_delete_failures_total";
    pub const BATCH_UPLOADS_TOTAL: &str = "movio_batch_uploads_total";
}

/// Job outcome labels.
pub mod outcome {
    pub const SUCCEEDED: &str = "succeeded";
    pub const FAILED: &str = "failed";
    pub const MALFORMED: &str = "malformed";
}

/// Record a finished (or dropped) job.
pub fn record_job(outcome: &'static str) {
    counter!(names::JOBS_TOTAL, "outcome" => outcome).increment(1);
}

pub fn record_job_duration(outcome: &'static str, duration_secs: f64) {
    histogram!(names::JOB_DURATION_SECONDS, "outcome" => outcome).record(duration_secs);
}

/// Record a retry about to be scheduled.
pub fn record_retry(operation: &str) {
    let labels = [("operation", operation.to_string())];
    counter!(names::STAGE_RETRIES_TOTAL, &labels).increment(1);
}

pub fn record_stage_failure(stage: &'static str, kind: &'static str) {
    counter!(names::STAGE_FAILURES_TOTAL, "stage" => stage, "kind" => kind).increment(1);
}

pub fn record_source_delete_failure() {
    counter!(names::SOURCE_DELETE_FAILURES_TOTAL).increment(1);
}

pub fn record_batch_upload(success: bool) {
    let outcome = if success { "success" } else { "failure" };
    counter!(names::BATCH_UPLOADS_TOTAL, "outcome" => outcome).increment(1);
}
