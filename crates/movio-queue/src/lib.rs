//! Redis Streams job source and result sink.
//!
//! This crate provides:
//! - `JobSource` / `ResultSink` abstractions over inbound and outbound messaging
//! - A Redis Streams implementation that acknowledges deliveries on receipt
//! - Result publication to a separate stream consumed by the API service

pub mod error;
pub mod queue;
pub mod source;

pub use error::{QueueError, QueueResult};
pub use queue::{JobQueue, QueueConfig};
pub use source::{Delivery, JobSource, ResultSink};
