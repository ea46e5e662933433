//! Liveness endpoint for the container orchestrator.

use std::net::SocketAddr;

use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use tokio::sync::watch;
use tracing::info;

use crate::error::WorkerResult;

pub const HEALTHCHECK_PATH: &str = "/api/v1/common/healthcheck/";

/// Health response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

/// Health check endpoint (liveness probe).
pub async fn healthcheck() -> Json<HealthResponse> {
    Json(HealthResponse { status: "OK" })
}

pub fn router() -> Router {
    Router::new().route(HEALTHCHECK_PATH, get(healthcheck))
}

/// Serve the health endpoint until `shutdown` flips to true.
pub async fn serve(addr: SocketAddr, mut shutdown: watch::Receiver<bool>) -> WorkerResult<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Health endpoint listening on {}", addr);

    axum::serve(listener, router())
        .with_graceful_shutdown(async move {
            while shutdown.changed().await.is_ok() {
                if *shutdown.borrow() {
                    break;
                }
            }
        })
        .await?;
    Ok(())
}
