//! Messaging abstractions consumed by the worker.

use async_trait::async_trait;

use movio_models::ProcessedVideoMessage;

use crate::error::QueueResult;

/// One inbound message. Already acknowledged by the time it is returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    /// Broker-assigned identifier, for logging only.
    pub message_id: String,
    /// Undecoded body.
    pub payload: Vec<u8>,
}

/// Inbound job messages.
///
/// Deliveries are acknowledged at receipt, not at pipeline completion; a
/// crash mid-pipeline drops the job.
#[async_trait]
pub trait JobSource: Send + Sync {
    /// Wait up to the implementation's block timeout for at most `max`
    /// deliveries. An empty vec means nothing arrived.
    async fn receive(&self, max: usize) -> QueueResult<Vec<Delivery>>;
}

/// Outbound processed-video results.
#[async_trait]
pub trait ResultSink: Send + Sync {
    async fn publish(&self, message: &ProcessedVideoMessage) -> QueueResult<()>;
}
