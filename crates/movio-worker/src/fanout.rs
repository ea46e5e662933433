//! Segment upload fan-out and the finalize barrier.
//!
//! The segment directory is split into fixed-size batches that upload
//! concurrently. Once every batch has an outcome, finalize runs exactly once:
//! it publishes the result and removes the job's local files whatever the
//! upload outcomes were.

use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::Semaphore;
use tracing::{error, info, warn};

use movio_models::{
    Artifact, BatchUploadOutcome, ProcessedVideoMessage, SegmentBatch, SegmentUpload, StageResult,
    UploadSummary,
};
use movio_storage::{content_type_for, BlobStore, StorageError};

use crate::cleanup;
use crate::error::WorkerError;
use crate::metrics;
use crate::pipeline::stages::fail;
use crate::pipeline::{Stage, StageContext};
use crate::retry::{retry_async, RetryPolicy, RetryResult};

/// Every regular file under `dir`, recursively, in directory-listing order.
pub async fn enumerate_segment_files(dir: &Path) -> io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    let mut pending = vec![dir.to_path_buf()];

    while let Some(current) = pending.pop() {
        let mut entries = tokio::fs::read_dir(&current).await?;
        while let Some(entry) = entries.next_entry().await? {
            let file_type = entry.file_type().await?;
            if file_type.is_dir() {
                pending.push(entry.path());
            } else if file_type.is_file() {
                files.push(entry.path());
            }
        }
    }

    Ok(files)
}

/// Pair each file with its key under `{segments_root}/{stem}/`.
pub fn segment_uploads(files: Vec<PathBuf>, dir: &Path, segments_root: &str, stem: &str) -> Vec<SegmentUpload> {
    files
        .into_iter()
        .map(|local_path| {
            let relative = local_path
                .strip_prefix(dir)
                .unwrap_or(&local_path)
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            SegmentUpload {
                destination_key: format!("{}/{}/{}", segments_root, stem, relative),
                local_path,
            }
        })
        .collect()
}

/// Split into batches of `batch_size`, keeping order. The last batch may be short.
pub fn partition_segments(uploads: Vec<SegmentUpload>, batch_size: usize) -> Vec<SegmentBatch> {
    let batch_size = batch_size.max(1);
    let mut batches = Vec::with_capacity(uploads.len().div_ceil(batch_size));
    let mut current = Vec::with_capacity(batch_size);

    for upload in uploads {
        current.push(upload);
        if current.len() == batch_size {
            batches.push(SegmentBatch {
                index: batches.len(),
                items: std::mem::replace(&mut current, Vec::with_capacity(batch_size)),
            });
        }
    }
    if !current.is_empty() {
        batches.push(SegmentBatch {
            index: batches.len(),
            items: current,
        });
    }

    batches
}

/// One pass over a batch.
///
/// `Ok(false)` if some item failed permanently (e.g. vanished locally);
/// `Err` on the first transient error so the whole batch can be retried.
async fn upload_batch_once(
    store: &dyn BlobStore,
    bucket: &str,
    batch: &SegmentBatch,
) -> Result<bool, StorageError> {
    let mut all_uploaded = true;
    for item in &batch.items {
        let uploaded = store
            .upload(
                &item.local_path,
                bucket,
                &item.destination_key,
                content_type_for(&item.local_path),
            )
            .await;
        match uploaded {
            Ok(()) => {}
            Err(e) if e.is_transient() => return Err(e),
            Err(e) => {
                warn!(batch = batch.index, key = %item.destination_key, "Segment not uploaded: {}", e);
                all_uploaded = false;
            }
        }
    }
    Ok(all_uploaded)
}

/// Upload a batch, retrying it whole on transient errors. Re-uploads overwrite.
pub async fn upload_batch(
    store: &dyn BlobStore,
    bucket: &str,
    batch: &SegmentBatch,
    policy: &RetryPolicy,
) -> BatchUploadOutcome {
    let result = retry_async(policy, StorageError::is_transient, move |_| {
        upload_batch_once(store, bucket, batch)
    })
    .await;

    let outcome = match result {
        RetryResult::Success(true) => BatchUploadOutcome::Success,
        RetryResult::Success(false) => BatchUploadOutcome::Failure,
        RetryResult::Failed { error, attempts } => {
            error!(
                batch = batch.index,
                attempts,
                "Segment batch failed: {}",
                error
            );
            BatchUploadOutcome::Failure
        }
    };
    metrics::record_batch_upload(outcome.is_success());
    outcome
}

/// Run `upload` for every batch concurrently (at most `max_parallel` at a
/// time), wait for all of them, then call `finalize` once with the outcomes
/// in batch order.
///
/// A batch task that panics counts as `Failure`.
pub async fn fan_out_fan_in<U, UFut, F, FFut, R>(
    batches: Vec<SegmentBatch>,
    max_parallel: usize,
    upload: U,
    finalize: F,
) -> R
where
    U: Fn(SegmentBatch) -> UFut,
    UFut: Future<Output = BatchUploadOutcome> + Send + 'static,
    F: FnOnce(Vec<BatchUploadOutcome>) -> FFut,
    FFut: Future<Output = R>,
{
    let permits = Arc::new(Semaphore::new(max_parallel.max(1)));

    let handles = batches.into_iter().map(|batch| {
        let permits = Arc::clone(&permits);
        let index = batch.index;
        let work = upload(batch);
        let handle = tokio::spawn(async move {
            let _permit = permits.acquire_owned().await;
            work.await
        });
        (index, handle)
    });
    let (indices, handles): (Vec<_>, Vec<_>) = handles.unzip();

    let outcomes = join_all(handles)
        .await
        .into_iter()
        .zip(indices)
        .map(|(joined, index)| match joined {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(batch = index, "Segment batch task aborted: {}", e);
                BatchUploadOutcome::Failure
            }
        })
        .collect();

    finalize(outcomes).await
}

/// Upload the segment directory, then publish and clean up.
pub async fn publish(ctx: &StageContext, input: StageResult) -> StageResult {
    if !input.success {
        return input;
    }

    let Some(dir) = input.segment_output_dir.clone() else {
        return fail(
            Stage::Publish,
            input,
            WorkerError::MissingArtifact("segment_output_dir"),
        );
    };
    let files = match enumerate_segment_files(&dir).await {
        Ok(files) => files,
        Err(e) => return fail(Stage::Publish, input, e.into()),
    };

    let total_files = files.len();
    let uploads = segment_uploads(files, &dir, &ctx.config.segments_root, input.job.stem());
    let batches = partition_segments(uploads, ctx.config.segment_batch_size);
    info!(
        job_id = %input.job.job_id,
        files = total_files,
        batches = batches.len(),
        "Uploading segments"
    );

    let policy = RetryPolicy::batch_upload(ctx.config.retry_base_delay);
    fan_out_fan_in(
        batches,
        ctx.config.max_parallel_batch_uploads,
        |batch| {
            let store = Arc::clone(&ctx.blob_store);
            let bucket = ctx.config.segments_bucket.clone();
            let policy = policy.clone();
            async move { upload_batch(store.as_ref(), &bucket, &batch, &policy).await }
        },
        |outcomes| finalize(ctx, input, total_files, outcomes),
    )
    .await
}

/// Publish the result and remove local artifacts. Runs once per job.
async fn finalize(
    ctx: &StageContext,
    input: StageResult,
    total_files: usize,
    outcomes: Vec<BatchUploadOutcome>,
) -> StageResult {
    let summary = UploadSummary::from_outcomes(total_files, &outcomes);
    if summary.all_succeeded() {
        info!(
            job_id = %input.job.job_id,
            batches = summary.total_batches,
            "All segment batches uploaded"
        );
    } else {
        error!(
            job_id = %input.job.job_id,
            failed = summary.failed_batches,
            batches = summary.total_batches,
            "Some segment batches failed to upload"
        );
    }

    let subtitle = match input.artifact(Artifact::Captions) {
        Some(path) => tokio::fs::read_to_string(path).await.ok(),
        None => None,
    };
    let message = ProcessedVideoMessage::for_job(
        &input.job,
        ctx.config.manifest_url(input.job.stem()),
        subtitle,
    );
    let published = ctx.result_sink.publish(&message).await;

    let report = cleanup::remove_job_artifacts(ctx, &input).await;
    let input = input.with_upload_summary(summary).with_cleanup(report);

    match published {
        Ok(()) => {
            info!(job_id = %input.job.job_id, url = %message.manifest_url, "Published result");
            input.succeed(Stage::Publish.success_message())
        }
        Err(e) => fail(Stage::Publish, input, e.into()),
    }
}
