//! Video processing worker binary.

use std::sync::Arc;

use anyhow::Context;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use uuid::Uuid;

use movio_media::FfmpegTranscoder;
use movio_queue::JobQueue;
use movio_storage::S3Client;
use movio_worker::{health, metrics, JobOrchestrator, StageContext, WorkerConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Install rustls crypto provider (required for TLS to Redis and S3)
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("Failed to install rustls crypto provider"))?;

    // Load environment variables
    dotenvy::dotenv().ok();

    init_tracing()?;

    info!("Starting movio-worker");

    let config = WorkerConfig::from_env().context("Invalid worker configuration")?;
    info!("Worker config: {:?}", config);

    if let Err(e) = movio_media::check_ffmpeg() {
        error!("{}", e);
    }

    if let Some(addr) = config.metrics_addr {
        metrics::init_metrics(addr)?;
        info!("Prometheus exporter listening on {}", addr);
    }

    let storage = S3Client::from_env()
        .await
        .context("Failed to create S3 client")?;

    let queue = Arc::new(
        JobQueue::from_env(format!("worker-{}", Uuid::new_v4()))
            .context("Failed to create job queue")?,
    );
    queue.init().await.context("Failed to initialize job queue")?;

    let transcoder = FfmpegTranscoder::new(config.max_ffmpeg_processes, config.ffmpeg_timeout_secs);
    let health_addr = config.health_addr;

    let ctx = StageContext::new(config, Arc::new(storage), Arc::new(transcoder), queue.clone());
    let orchestrator = Arc::new(JobOrchestrator::new(ctx, queue));

    let (health_shutdown, health_shutdown_rx) = tokio::sync::watch::channel(false);
    let health_handle = tokio::spawn(async move {
        if let Err(e) = health::serve(health_addr, health_shutdown_rx).await {
            error!("Health endpoint error: {}", e);
        }
    });

    // Setup signal handlers
    let signal_orchestrator = Arc::clone(&orchestrator);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received shutdown signal");
            signal_orchestrator.shutdown();
        }
    });

    orchestrator.run().await.context("Orchestrator error")?;

    let _ = health_shutdown.send(true);
    health_handle.await.ok();

    info!("Worker shutdown complete");
    Ok(())
}

fn init_tracing() -> anyhow::Result<()> {
    // Colored output for dev, JSON for production
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::from_default_env()
        .add_directive("movio=info".parse()?)
        .add_directive("aws_smithy_runtime=warn".parse()?)
        .add_directive("hyper=warn".parse()?);

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }
    Ok(())
}
