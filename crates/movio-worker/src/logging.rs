//! Structured job logging utilities.

use tracing::{error, info, warn, Span};

use movio_models::{JobId, StageResult};

/// Job logger for structured logging with consistent formatting.
///
/// Every line carries the job ID and the operation so a single job can be
/// followed across concurrently running pipelines.
#[derive(Debug, Clone)]
pub struct JobLogger {
    job_id: String,
    operation: String,
}

impl JobLogger {
    pub fn new(job_id: &JobId, operation: &str) -> Self {
        Self {
            job_id: job_id.to_string(),
            operation: operation.to_string(),
        }
    }

    pub fn log_start(&self, message: &str) {
        info!(
            job_id = %self.job_id,
            operation = %self.operation,
            "Job started: {}", message
        );
    }

    pub fn log_warning(&self, message: &str) {
        warn!(
            job_id = %self.job_id,
            operation = %self.operation,
            "Job warning: {}", message
        );
    }

    pub fn log_error(&self, message: &str) {
        error!(
            job_id = %self.job_id,
            operation = %self.operation,
            "Job error: {}", message
        );
    }

    pub fn log_completion(&self, message: &str) {
        info!(
            job_id = %self.job_id,
            operation = %self.operation,
            "Job completed: {}", message
        );
    }

    /// Log where the chain ended up for this job.
    pub fn log_outcome(&self, result: &StageResult) {
        if result.success {
            self.log_completion(result.success_message.as_deref().unwrap_or("done"));
        } else {
            self.log_error(&format!(
                "{}: {}",
                result.failure_kind.map(|k| k.as_str()).unwrap_or("unknown"),
                result.failure_message.as_deref().unwrap_or("no message")
            ));
        }
        if !result.delete_success {
            self.log_warning(&format!(
                "source object was not deleted: {}",
                result.delete_failure_message.as_deref().unwrap_or("no message")
            ));
        }
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn operation(&self) -> &str {
        &self.operation
    }

    /// Create a tracing span for this job.
    pub fn create_span(&self) -> Span {
        tracing::info_span!(
            "job",
            job_id = %self.job_id,
            operation = %self.operation
        )
    }
}
