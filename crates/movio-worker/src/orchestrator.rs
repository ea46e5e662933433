//! Job orchestrator.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{watch, Semaphore};
use tracing::{debug, error, info, warn, Instrument};

use movio_models::{Job, StageResult};
use movio_queue::{Delivery, JobSource};

use crate::cleanup;
use crate::error::{WorkerError, WorkerResult};
use crate::logging::JobLogger;
use crate::metrics::{self, outcome};
use crate::pipeline::{run_chain, StageContext};

/// Most deliveries pulled in one `receive` call.
const MAX_RECEIVE_BATCH: usize = 5;

/// Pulls deliveries from a `JobSource` and runs each job's pipeline.
///
/// Deliveries are acknowledged by the source on receipt, so a job that is
/// in flight when the process dies is lost.
pub struct JobOrchestrator {
    ctx: Arc<StageContext>,
    source: Arc<dyn JobSource>,
    job_semaphore: Arc<Semaphore>,
    max_concurrent_jobs: usize,
    shutdown: watch::Sender<bool>,
}

impl JobOrchestrator {
    pub fn new(ctx: StageContext, source: Arc<dyn JobSource>) -> Self {
        let max_concurrent_jobs = ctx.config.max_concurrent_jobs.max(1);
        let (shutdown, _) = watch::channel(false);

        Self {
            ctx: Arc::new(ctx),
            source,
            job_semaphore: Arc::new(Semaphore::new(max_concurrent_jobs)),
            max_concurrent_jobs,
            shutdown,
        }
    }

    /// Consume until `shutdown` is called, then drain in-flight jobs.
    pub async fn run(&self) -> WorkerResult<()> {
        info!(
            "Starting job orchestrator with {} max concurrent jobs",
            self.max_concurrent_jobs
        );

        let mut shutdown_rx = self.shutdown.subscribe();

        // The receive is never raced against shutdown: deliveries are
        // acknowledged on receipt, so once read they must be scheduled.
        loop {
            if *shutdown_rx.borrow() {
                info!("Shutdown signal received, stopping consumption");
                break;
            }
            if let Err(e) = self.consume_jobs().await {
                error!("Error consuming jobs: {}", e);
                // Back off on error, waking early on shutdown
                tokio::select! {
                    _ = tokio::time::sleep(Duration::from_secs(5)) => {}
                    _ = shutdown_rx.changed() => {}
                }
            }
        }

        info!("Waiting for in-flight jobs to complete...");
        let drained =
            tokio::time::timeout(self.ctx.config.shutdown_timeout, self.wait_for_jobs()).await;
        if drained.is_err() {
            warn!(
                "Shutdown timeout reached with {} jobs still running",
                self.max_concurrent_jobs - self.job_semaphore.available_permits()
            );
        }

        info!("Job orchestrator stopped");
        Ok(())
    }

    /// Signal shutdown. Consumption stops once the current receive returns
    /// and its deliveries are scheduled.
    pub fn shutdown(&self) {
        let _ = self.shutdown.send(true);
    }

    async fn consume_jobs(&self) -> WorkerResult<()> {
        let available = self.job_semaphore.available_permits();
        if available == 0 {
            // All slots busy, wait a bit
            tokio::time::sleep(Duration::from_millis(100)).await;
            return Ok(());
        }

        let deliveries = self
            .source
            .receive(available.min(MAX_RECEIVE_BATCH))
            .await?;

        if deliveries.is_empty() {
            return Ok(());
        }
        debug!("Received {} deliveries", deliveries.len());

        for delivery in deliveries {
            let Some(job) = decode_delivery(&delivery) else {
                continue;
            };

            let permit = Arc::clone(&self.job_semaphore)
                .acquire_owned()
                .await
                .map_err(|_| WorkerError::job_failed("Semaphore closed"))?;
            let ctx = Arc::clone(&self.ctx);

            tokio::spawn(async move {
                let _permit = permit;
                run_job(&ctx, job).await;
            });
        }

        Ok(())
    }

    async fn wait_for_jobs(&self) {
        while self.job_semaphore.available_permits() < self.max_concurrent_jobs {
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }
}

/// Decode a delivery into a job. Malformed payloads are logged and dropped.
pub fn decode_delivery(delivery: &Delivery) -> Option<Job> {
    match Job::decode(&delivery.payload) {
        Ok(job) => Some(job),
        Err(e) => {
            warn!(
                message_id = %delivery.message_id,
                "Dropping malformed job payload: {}",
                e
            );
            metrics::record_job(outcome::MALFORMED);
            None
        }
    }
}

/// Run one job through the whole chain.
///
/// A job that ends failed has its workspace removed here; successful jobs
/// were already cleaned up by finalize.
pub async fn run_job(ctx: &StageContext, job: Job) -> StageResult {
    let logger = JobLogger::new(&job.job_id, "video_pipeline");
    let span = logger.create_span();
    let started = Instant::now();

    async move {
        logger.log_start(&job.filename);

        let result = run_chain(ctx, StageResult::new(job)).await;

        let job_outcome = if result.success {
            outcome::SUCCEEDED
        } else {
            cleanup::remove_workspace(ctx, &result).await;
            outcome::FAILED
        };
        metrics::record_job(job_outcome);
        metrics::record_job_duration(job_outcome, started.elapsed().as_secs_f64());
        logger.log_outcome(&result);

        result
    }
    .instrument(span)
    .await
}
