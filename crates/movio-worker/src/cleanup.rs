//! Local artifact cleanup.

use std::io;
use std::path::Path;

use tracing::{debug, warn};

use movio_models::{CleanupReport, StageResult};

use crate::pipeline::StageContext;

async fn remove_file(path: &Path) -> io::Result<()> {
    match tokio::fs::remove_file(path).await {
        Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}

async fn remove_dir(path: &Path) -> io::Result<()> {
    match tokio::fs::remove_dir_all(path).await {
        Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}

/// Delete the source, captions and transcoded files, the segment directory
/// and finally the job workspace itself. Files already gone count as removed.
pub async fn remove_job_artifacts(ctx: &StageContext, result: &StageResult) -> CleanupReport {
    let mut report = CleanupReport {
        files_removed: true,
        segments_removed: true,
    };

    for (artifact, path) in &result.local_paths {
        if let Err(e) = remove_file(path).await {
            warn!(
                job_id = %result.job.job_id,
                artifact = artifact.as_str(),
                "Failed to remove {}: {}",
                path.display(),
                e
            );
            report.files_removed = false;
        }
    }

    if let Some(dir) = &result.segment_output_dir {
        if let Err(e) = remove_dir(dir).await {
            warn!(job_id = %result.job.job_id, "Failed to remove {}: {}", dir.display(), e);
            report.segments_removed = false;
        }
    }

    remove_workspace(ctx, result).await;
    debug!(job_id = %result.job.job_id, ?report, "Local cleanup finished");
    report
}

/// Drop whatever a job left in its workspace.
pub async fn remove_workspace(ctx: &StageContext, result: &StageResult) -> bool {
    let workspace = ctx.workspace(result);
    match workspace.remove().await {
        Ok(_) => true,
        Err(e) => {
            warn!(
                job_id = %result.job.job_id,
                "Failed to remove workspace {}: {}",
                workspace.root().display(),
                e
            );
            false
        }
    }
}
