//! Stage bodies.
//!
//! Each stage checks `input.success` first and returns the input unchanged
//! when an earlier stage failed. Errors inside a stage are converted to
//! failure data on the returned `StageResult`; nothing here returns `Err`.

use std::future::Future;
use std::path::{Path, PathBuf};

use tracing::{error, info, warn};

use movio_media::{add_subtitle_tracks_to_file, MediaTask, SegmentProfile, TranscodeProfile, MANIFEST_NAME};
use movio_models::{Artifact, StageResult};

use super::{Stage, StageContext};
use crate::error::{WorkerError, WorkerResult};
use crate::metrics;
use crate::retry::{retry_async, RetryPolicy, RetryState};

/// Record `error` on the result as the chain's failure.
pub(crate) fn fail(stage: Stage, input: StageResult, error: WorkerError) -> StageResult {
    let kind = error.failure_kind();
    error!(
        job_id = %input.job.job_id,
        stage = stage.name(),
        kind = %kind,
        "Stage failed: {}",
        error
    );
    input.fail(kind, format!("{}: {}", stage.name(), error))
}

fn required_artifact(input: &StageResult, artifact: Artifact) -> WorkerResult<PathBuf> {
    input
        .artifact(artifact)
        .map(Path::to_path_buf)
        .ok_or(WorkerError::MissingArtifact(artifact.as_str()))
}

async fn with_stage_retry<F, Fut, T>(ctx: &StageContext, stage: Stage, operation: F) -> WorkerResult<T>
where
    F: FnMut(RetryState) -> Fut,
    Fut: Future<Output = WorkerResult<T>>,
{
    let policy = RetryPolicy::stage(stage.name(), ctx.config.retry_base_delay);
    retry_async(&policy, WorkerError::is_retryable, operation)
        .await
        .into_result()
}

async fn run_media_task(ctx: &StageContext, stage: Stage, task: &MediaTask) -> WorkerResult<()> {
    let transcoder = ctx.transcoder.as_ref();
    with_stage_retry(ctx, stage, move |_| async move {
        transcoder.run(task).await.map_err(WorkerError::from)
    })
    .await
}

/// Fetch the uploaded source video into the job workspace.
pub async fn download(ctx: &StageContext, input: StageResult) -> StageResult {
    if !input.success {
        return input;
    }

    let dest = ctx.workspace(&input).source_path();
    let downloaded = ctx
        .blob_store
        .download(&ctx.config.source_bucket, &input.job.source_object_key, &dest)
        .await;

    match downloaded {
        Ok(path) => {
            info!(job_id = %input.job.job_id, "Downloaded source to {}", path.display());
            input
                .with_artifact(Artifact::SourceVideo, path)
                .succeed(Stage::Download.success_message())
        }
        Err(e) => fail(Stage::Download, input, e.into()),
    }
}

/// Delete the source object. A failure is bookkeeping only.
pub async fn delete_source(ctx: &StageContext, input: StageResult) -> StageResult {
    if !input.success {
        return input;
    }

    let deleted = ctx
        .blob_store
        .delete(&ctx.config.source_bucket, &input.job.source_object_key)
        .await;

    match deleted {
        Ok(()) => input
            .record_delete_success()
            .succeed(Stage::DeleteSource.success_message()),
        Err(e) => {
            let e = WorkerError::from(e);
            warn!(
                job_id = %input.job.job_id,
                key = %input.job.source_object_key,
                "Source object not deleted, continuing: {}",
                e
            );
            metrics::record_source_delete_failure();
            input.record_delete_failure(e.failure_kind(), e.to_string())
        }
    }
}

/// Pull the first subtitle stream out as WebVTT.
pub async fn extract_captions(ctx: &StageContext, input: StageResult) -> StageResult {
    if !input.success {
        return input;
    }

    let source = match required_artifact(&input, Artifact::SourceVideo) {
        Ok(path) => path,
        Err(e) => return fail(Stage::ExtractCaptions, input, e),
    };
    let task = MediaTask::ExtractCaptions {
        input: source,
        output: ctx.workspace(&input).captions_path(),
    };

    match run_media_task(ctx, Stage::ExtractCaptions, &task).await {
        Ok(()) => input
            .with_artifact(Artifact::Captions, task.output())
            .succeed(Stage::ExtractCaptions.success_message()),
        Err(e) => fail(Stage::ExtractCaptions, input, e),
    }
}

/// Hand the captions to the translator by dropping them in its bucket.
pub async fn upload_captions(ctx: &StageContext, input: StageResult) -> StageResult {
    if !input.success {
        return input;
    }

    let captions = match required_artifact(&input, Artifact::Captions) {
        Ok(path) => path,
        Err(e) => return fail(Stage::UploadCaptions, input, e),
    };
    let key = format!("{}.vtt", input.job.stem());
    let bucket = ctx.config.raw_captions_bucket.as_str();
    let store = ctx.blob_store.as_ref();
    let (captions_ref, key_ref) = (captions.as_path(), key.as_str());

    let uploaded = with_stage_retry(ctx, Stage::UploadCaptions, move |_| async move {
        store
            .upload(captions_ref, bucket, key_ref, "text/vtt")
            .await
            .map_err(WorkerError::from)
    })
    .await;

    match uploaded {
        Ok(()) => {
            info!(job_id = %input.job.job_id, "Uploaded captions to s3://{}/{}", bucket, key);
            input.succeed(Stage::UploadCaptions.success_message())
        }
        Err(e) => fail(Stage::UploadCaptions, input, e),
    }
}

/// Re-encode the source to the single-rendition MP4 the segmenter expects.
pub async fn transcode(ctx: &StageContext, input: StageResult) -> StageResult {
    if !input.success {
        return input;
    }

    let source = match required_artifact(&input, Artifact::SourceVideo) {
        Ok(path) => path,
        Err(e) => return fail(Stage::Transcode, input, e),
    };
    let task = MediaTask::Transcode {
        input: source,
        output: ctx.workspace(&input).transcoded_path(),
        profile: TranscodeProfile::default(),
    };

    match run_media_task(ctx, Stage::Transcode, &task).await {
        Ok(()) => input
            .with_artifact(Artifact::TranscodedVideo, task.output())
            .succeed(Stage::Transcode.success_message()),
        Err(e) => fail(Stage::Transcode, input, e),
    }
}

/// Produce the DASH ladder. Not retried.
pub async fn segment(ctx: &StageContext, input: StageResult) -> StageResult {
    if !input.success {
        return input;
    }

    let transcoded = match required_artifact(&input, Artifact::TranscodedVideo) {
        Ok(path) => path,
        Err(e) => return fail(Stage::Segment, input, e),
    };
    let output_dir = ctx.workspace(&input).segments_dir();
    let task = MediaTask::Segment {
        input: transcoded,
        output_dir: output_dir.clone(),
        profile: SegmentProfile::default(),
    };

    match ctx.transcoder.run(&task).await {
        Ok(()) => input
            .with_segment_output_dir(output_dir)
            .succeed(Stage::Segment.success_message()),
        Err(e) => fail(Stage::Segment, input, e.into()),
    }
}

/// Reference the translated subtitle tracks from the manifest.
pub async fn edit_manifest(ctx: &StageContext, input: StageResult) -> StageResult {
    if !input.success {
        return input;
    }

    let Some(manifest) = input
        .segment_output_dir
        .as_ref()
        .map(|dir| dir.join(MANIFEST_NAME))
    else {
        return fail(
            Stage::EditManifest,
            input,
            WorkerError::MissingArtifact("segment_output_dir"),
        );
    };

    let edited = add_subtitle_tracks_to_file(
        &manifest,
        input.job.stem(),
        &ctx.config.subtitle_languages,
    )
    .await;

    match edited {
        Ok(()) => input.succeed(Stage::EditManifest.success_message()),
        Err(e) => fail(Stage::EditManifest, input, e.into()),
    }
}
