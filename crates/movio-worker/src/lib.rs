//! Video processing worker.
//!
//! This crate provides:
//! - The stage executor and stage bodies of the video pipeline
//! - Bounded retry with exponential backoff
//! - Segment upload fan-out with a single finalize step
//! - The job orchestrator with graceful shutdown
//! - Health endpoint and metrics

pub mod cleanup;
pub mod config;
pub mod error;
pub mod fanout;
pub mod health;
pub mod logging;
pub mod metrics;
pub mod orchestrator;
pub mod pipeline;
pub mod retry;
pub mod workspace;

pub use config::WorkerConfig;
pub use error::{WorkerError, WorkerResult};
pub use logging::JobLogger;
pub use orchestrator::{run_job, JobOrchestrator};
pub use pipeline::{run_chain, Stage, StageContext};
pub use retry::{RetryPolicy, RetryState};
pub use workspace::JobWorkspace;
