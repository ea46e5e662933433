//! Redis Streams integration tests.

use std::time::{SystemTime, UNIX_EPOCH};

use movio_models::{ProcessedVideoMessage, UserData, VideoJobMessage};
use movio_queue::{JobQueue, JobSource, QueueConfig, ResultSink};

fn isolated_config() -> QueueConfig {
    dotenvy::dotenv().ok();
    let suffix = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();

    let base = QueueConfig::from_env();
    QueueConfig {
        job_stream: format!("movio:test:jobs:{}", suffix),
        result_stream: format!("movio:test:results:{}", suffix),
        consumer_group: format!("movio:test:group:{}", suffix),
        block_ms: 200,
        ..base
    }
}

fn message() -> VideoJobMessage {
    VideoJobMessage {
        video_id: "abc".into(),
        s3_file_key: "raw/abc.mkv".into(),
        s3_file_url: "https://raw.example/abc.mkv".into(),
        s3_presigned_url: None,
        video_filename_with_extension: "abc.mkv".into(),
        user_data: UserData {
            user_id: "u-1".into(),
            email: "u@example.com".into(),
        },
    }
}

/// Test Redis connection and basic operations.
#[tokio::test]
#[ignore = "requires Redis"]
async fn test_redis_connection() {
    let queue = JobQueue::new(isolated_config(), "test-consumer").expect("Failed to create queue");
    queue.init().await.expect("Failed to initialize queue");
    // Group creation is idempotent
    queue.init().await.expect("Failed to re-initialize queue");

    assert_eq!(queue.len().await.expect("Failed to get queue length"), 0);
}

/// Deliveries are removed from the stream as soon as they are received.
#[tokio::test]
#[ignore = "requires Redis"]
async fn test_receive_acks_on_receipt() {
    let queue = JobQueue::new(isolated_config(), "test-consumer").expect("Failed to create queue");
    queue.init().await.expect("Failed to initialize queue");

    queue.enqueue(&message()).await.expect("Failed to enqueue");
    assert_eq!(queue.len().await.unwrap(), 1);

    let deliveries = queue.receive(5).await.expect("Failed to receive");
    assert_eq!(deliveries.len(), 1);
    let decoded = VideoJobMessage::decode(&deliveries[0].payload).expect("Failed to decode");
    assert_eq!(decoded, message());

    assert_eq!(queue.len().await.unwrap(), 0);
    assert!(queue.receive(5).await.unwrap().is_empty());
}

#[tokio::test]
#[ignore = "requires Redis"]
async fn test_publish_result() {
    let queue = JobQueue::new(isolated_config(), "test-consumer").expect("Failed to create queue");

    let job = movio_models::Job::from(message());
    let result = ProcessedVideoMessage::for_job(
        &job,
        "https://segments.s3.amazonaws.com/segments/abc/manifest.mpd",
        Some("WEBVTT\n".into()),
    );
    queue.publish(&result).await.expect("Failed to publish");

    assert_eq!(queue.result_len().await.unwrap(), 1);
}
