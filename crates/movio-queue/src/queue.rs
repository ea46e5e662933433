//! Job source and result sink on Redis Streams.

use async_trait::async_trait;
use redis::AsyncCommands;
use tracing::{debug, info, warn};

use movio_models::{ProcessedVideoMessage, VideoJobMessage};

use crate::error::{QueueError, QueueResult};
use crate::source::{Delivery, JobSource, ResultSink};

/// Stream field carrying an inbound job body.
const JOB_FIELD: &str = "job";
/// Stream field carrying an outbound result body.
const RESULT_FIELD: &str = "result";

/// Queue configuration.
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Redis URL
    pub redis_url: String,
    /// Stream the API service publishes submissions to
    pub job_stream: String,
    /// Consumer group shared by all workers
    pub consumer_group: String,
    /// Stream this worker publishes results to
    pub result_stream: String,
    /// Approximate cap on result stream length
    pub result_stream_max_len: usize,
    /// How long a `receive` call blocks waiting for messages
    pub block_ms: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            redis_url: "redis://localhost:6379".to_string(),
            job_stream: "movio:raw-video-submissions".to_string(),
            consumer_group: "movio:workers".to_string(),
            result_stream: "movio:processed-video-results".to_string(),
            result_stream_max_len: 10_000,
            block_ms: 1000,
        }
    }
}

impl QueueConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            redis_url: std::env::var("REDIS_URL").unwrap_or(defaults.redis_url),
            job_stream: std::env::var("MOVIO_JOB_STREAM").unwrap_or(defaults.job_stream),
            consumer_group: std::env::var("MOVIO_JOB_CONSUMER_GROUP")
                .unwrap_or(defaults.consumer_group),
            result_stream: std::env::var("MOVIO_RESULT_STREAM").unwrap_or(defaults.result_stream),
            result_stream_max_len: std::env::var("MOVIO_RESULT_STREAM_MAX_LEN")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.result_stream_max_len),
            block_ms: std::env::var("MOVIO_QUEUE_BLOCK_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.block_ms),
        }
    }
}

/// Redis Streams client acting as both `JobSource` and `ResultSink`.
pub struct JobQueue {
    client: redis::Client,
    config: QueueConfig,
    consumer_name: String,
}

impl JobQueue {
    /// Create a new job queue.
    pub fn new(config: QueueConfig, consumer_name: impl Into<String>) -> QueueResult<Self> {
        let client = redis::Client::open(config.redis_url.as_str())
            .map_err(|e| QueueError::connection_failed(e.to_string()))?;
        Ok(Self {
            client,
            config,
            consumer_name: consumer_name.into(),
        })
    }

    /// Create from environment variables.
    pub fn from_env(consumer_name: impl Into<String>) -> QueueResult<Self> {
        Self::new(QueueConfig::from_env(), consumer_name)
    }

    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    /// Initialize the queue (create consumer group if not exists).
    pub async fn init(&self) -> QueueResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        let result: Result<(), redis::RedisError> = redis::cmd("XGROUP")
            .arg("CREATE")
            .arg(&self.config.job_stream)
            .arg(&self.config.consumer_group)
            .arg("$")
            .arg("MKSTREAM")
            .query_async(&mut conn)
            .await;

        match result {
            Ok(_) => info!("Created consumer group: {}", self.config.consumer_group),
            Err(e) if e.to_string().contains("BUSYGROUP") => {
                debug!("Consumer group already exists: {}", self.config.consumer_group);
            }
            Err(e) => return Err(QueueError::Redis(e)),
        }

        Ok(())
    }

    /// Submit a job message, as the API service would.
    pub async fn enqueue(&self, message: &VideoJobMessage) -> QueueResult<String> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let payload = serde_json::to_string(message)?;

        let message_id: String = redis::cmd("XADD")
            .arg(&self.config.job_stream)
            .arg("*")
            .arg(JOB_FIELD)
            .arg(&payload)
            .query_async(&mut conn)
            .await?;

        info!("Enqueued video {} with message ID {}", message.video_id, message_id);
        Ok(message_id)
    }

    /// Pending submissions in the job stream.
    pub async fn len(&self) -> QueueResult<u64> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let len: u64 = conn.xlen(&self.config.job_stream).await?;
        Ok(len)
    }

    /// Published results not yet trimmed from the result stream.
    pub async fn result_len(&self) -> QueueResult<u64> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let len: u64 = conn.xlen(&self.config.result_stream).await?;
        Ok(len)
    }
}

#[async_trait]
impl JobSource for JobQueue {
    async fn receive(&self, max: usize) -> QueueResult<Vec<Delivery>> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        // NOACK: entries never enter the pending list, so delivery is
        // acknowledged the moment it is read.
        let reply: redis::streams::StreamReadReply = redis::cmd("XREADGROUP")
            .arg("GROUP")
            .arg(&self.config.consumer_group)
            .arg(&self.consumer_name)
            .arg("COUNT")
            .arg(max.max(1))
            .arg("BLOCK")
            .arg(self.config.block_ms)
            .arg("NOACK")
            .arg("STREAMS")
            .arg(&self.config.job_stream)
            .arg(">")
            .query_async(&mut conn)
            .await?;

        let mut deliveries = Vec::new();
        let mut received_ids = Vec::new();

        for stream_key in reply.keys {
            for entry in stream_key.ids {
                received_ids.push(entry.id.clone());
                match entry.map.get(JOB_FIELD) {
                    Some(redis::Value::BulkString(payload)) => deliveries.push(Delivery {
                        message_id: entry.id.clone(),
                        payload: payload.clone(),
                    }),
                    _ => warn!("Dropping stream entry {} without a '{}' field", entry.id, JOB_FIELD),
                }
            }
        }

        if !received_ids.is_empty() {
            let removed: Result<u64, redis::RedisError> = redis::cmd("XDEL")
                .arg(&self.config.job_stream)
                .arg(&received_ids)
                .query_async(&mut conn)
                .await;
            if let Err(e) = removed {
                warn!("Failed to trim {} received entries: {}", received_ids.len(), e);
            }
            debug!("Received {} deliveries", deliveries.len());
        }

        Ok(deliveries)
    }
}

#[async_trait]
impl ResultSink for JobQueue {
    async fn publish(&self, message: &ProcessedVideoMessage) -> QueueResult<()> {
        let payload = message.to_json()?;
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        let message_id: String = redis::cmd("XADD")
            .arg(&self.config.result_stream)
            .arg("MAXLEN")
            .arg("~")
            .arg(self.config.result_stream_max_len)
            .arg("*")
            .arg(RESULT_FIELD)
            .arg(&payload)
            .query_async(&mut conn)
            .await
            .map_err(|e| QueueError::publish_failed(e.to_string()))?;

        info!(
            video_id = %message.video_id,
            message_id = %message_id,
            "Published processed video result"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = QueueConfig::default();
        assert_eq!(config.block_ms, 1000);
        assert_ne!(config.job_stream, config.result_stream);
    }

    #[test]
    fn test_invalid_url_is_connection_error() {
        let config = QueueConfig {
            redis_url: "not a url".to_string(),
            ..QueueConfig::default()
        };
        assert!(matches!(
            JobQueue::new(config, "worker-test"),
            Err(QueueError::ConnectionFailed(_))
        ));
    }
}
