//! Stage executor.
//!
//! A job is one `StageResult` threaded through a fixed list of stages. Every
//! stage is always invoked; a stage whose input already failed hands it back
//! untouched, so the first failure is what the chain ends with.

pub mod stages;

use std::sync::Arc;

use tracing::{debug, Instrument};

use movio_media::Transcoder;
use movio_models::StageResult;
use movio_queue::ResultSink;
use movio_storage::BlobStore;

use crate::config::WorkerConfig;
use crate::metrics;
use crate::workspace::JobWorkspace;

/// Shared collaborators, built once at startup.
#[derive(Clone)]
pub struct StageContext {
    pub config: Arc<WorkerConfig>,
    pub blob_store: Arc<dyn BlobStore>,
    pub transcoder: Arc<dyn Transcoder>,
    pub result_sink: Arc<dyn ResultSink>,
}

impl StageContext {
    pub fn new(
        config: WorkerConfig,
        blob_store: Arc<dyn BlobStore>,
        transcoder: Arc<dyn Transcoder>,
        result_sink: Arc<dyn ResultSink>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            blob_store,
            transcoder,
            result_sink,
        }
    }

    pub fn workspace(&self, result: &StageResult) -> JobWorkspace {
        JobWorkspace::new(&self.config.work_dir, &result.job)
    }
}

/// Pipeline stages in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Download,
    DeleteSource,
    ExtractCaptions,
    UploadCaptions,
    Transcode,
    Segment,
    EditManifest,
    Publish,
}

impl Stage {
    pub const CHAIN: [Stage; 8] = [
        Stage::Download,
        Stage::DeleteSource,
        Stage::ExtractCaptions,
        Stage::UploadCaptions,
        Stage::Transcode,
        Stage::Segment,
        Stage::EditManifest,
        Stage::Publish,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Stage::Download => "download",
            Stage::DeleteSource => "delete_source",
            Stage::ExtractCaptions => "extract_captions",
            Stage::UploadCaptions => "upload_captions",
            Stage::Transcode => "transcode",
            Stage::Segment => "segment",
            Stage::EditManifest => "edit_manifest",
            Stage::Publish => "publish",
        }
    }

    /// Recorded on the `StageResult` when the stage completes.
    pub fn success_message(&self) -> &'static str {
        match self {
            Stage::Download => "video-file-download-success",
            Stage::DeleteSource => "video-file-delete-success",
            Stage::ExtractCaptions => "subtitle-extraction-success",
            Stage::UploadCaptions => "subtitle-upload-to-translate-lambda-success",
            Stage::Transcode => "transcode-video-to-mp4-success",
            Stage::Segment => "dash-segment-video-success",
            Stage::EditManifest => "edit-manifest-to-add-subtitle-information-success",
            Stage::Publish => "video-process-result-published",
        }
    }

    pub async fn run(self, ctx: &StageContext, input: StageResult) -> StageResult {
        match self {
            Stage::Download => stages::download(ctx, input).await,
            Stage::DeleteSource => stages::delete_source(ctx, input).await,
            Stage::ExtractCaptions => stages::extract_captions(ctx, input).await,
            Stage::UploadCaptions => stages::upload_captions(ctx, input).await,
            Stage::Transcode => stages::transcode(ctx, input).await,
            Stage::Segment => stages::segment(ctx, input).await,
            Stage::EditManifest => stages::edit_manifest(ctx, input).await,
            Stage::Publish => crate::fanout::publish(ctx, input).await,
        }
    }
}

/// Run `stages` in order against one result.
pub async fn run_stages(ctx: &StageContext, stages: &[Stage], initial: StageResult) -> StageResult {
    let mut result = initial;
    for stage in stages {
        let was_ok = result.success;
        result = stage
            .run(ctx, result)
            .instrument(tracing::info_span!("stage", stage = stage.name()))
            .await;

        if was_ok && !result.success {
            let kind = result
                .failure_kind
                .map(|k| k.as_str())
                .unwrap_or("unexpected_error");
            metrics::record_stage_failure(stage.name(), kind);
        } else if result.success {
            debug!(stage = stage.name(), "Stage finished");
        }
    }
    result
}

/// Run the full chain.
pub async fn run_chain(ctx: &StageContext, initial: StageResult) -> StageResult {
    run_stages(ctx, &Stage::CHAIN, initial).await
}
