//! S3 client implementation.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_credential_types::Credentials;
use aws_sdk_s3::config::{Builder, Region};
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use crate::blob::BlobStore;
use crate::error::{StorageError, StorageResult};

/// Configuration for the S3 client.
#[derive(Clone)]
pub struct S3Config {
    /// Region, e.g. `ap-south-1`
    pub region: String,
    /// Static credentials; `None` falls back to the default provider chain
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    /// Custom endpoint (MinIO, LocalStack); implies path-style addressing
    pub endpoint_url: Option<String>,
}

impl std::fmt::Debug for S3Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3Config")
            .field("region", &self.region)
            .field("access_key_id", &self.access_key_id.as_ref().map(|_| "<set>"))
            .field("endpoint_url", &self.endpoint_url)
            .finish()
    }
}

impl S3Config {
    /// Create config from environment variables.
    pub fn from_env() -> StorageResult<Self> {
        let access_key_id = std::env::var("AWS_ACCESS_KEY_ID").ok();
        let secret_access_key = std::env::var("AWS_SECRET_ACCESS_KEY").ok();
        if access_key_id.is_some() != secret_access_key.is_some() {
            return Err(StorageError::config_error(
                "AWS_ACCESS_KEY_ID and AWS_SECRET_ACCESS_KEY must be set together",
            ));
        }

        Ok(Self {
            region: std::env::var("AWS_S3_REGION_NAME")
                .map_err(|_| StorageError::config_error("AWS_S3_REGION_NAME not set"))?,
            access_key_id,
            secret_access_key,
            endpoint_url: std::env::var("AWS_S3_ENDPOINT_URL").ok(),
        })
    }
}

/// S3 storage client. Cheap to clone; the SDK pools connections internally.
#[derive(Clone)]
pub struct S3Client {
    client: Client,
}

impl S3Client {
    /// Create a new S3 client from configuration.
    pub async fn new(config: S3Config) -> StorageResult<Self> {
        let region = Region::new(config.region);

        let mut builder = match (config.access_key_id, config.secret_access_key) {
            (Some(key), Some(secret)) => Builder::new()
                .behavior_version(BehaviorVersion::latest())
                .region(region)
                .credentials_provider(Credentials::new(key, secret, None, None, "movio-env")),
            _ => {
                let shared = aws_config::defaults(BehaviorVersion::latest())
                    .region(region)
                    .load()
                    .await;
                Builder::from(&shared)
            }
        };

        if let Some(endpoint) = config.endpoint_url {
            builder = builder.endpoint_url(endpoint).force_path_style(true);
        }

        Ok(Self {
            client: Client::from_conf(builder.build()),
        })
    }

    /// Create from environment variables.
    pub async fn from_env() -> StorageResult<Self> {
        let config = S3Config::from_env()?;
        Self::new(config).await
    }
}

#[async_trait]
impl BlobStore for S3Client {
    async fn download(&self, bucket: &str, key: &str, dest: &Path) -> StorageResult<PathBuf> {
        debug!("Downloading s3://{}/{} to {}", bucket, key, dest.display());

        let response = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                if e.as_service_error().is_some_and(|se| se.is_no_such_key()) {
                    StorageError::not_found(format!("s3://{}/{}", bucket, key))
                } else {
                    StorageError::download_failed(DisplayErrorContext(&e).to_string())
                }
            })?;

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut file = tokio::fs::File::create(dest).await?;
        let mut body = response.body.into_async_read();
        let bytes = tokio::io::copy(&mut body, &mut file)
            .await
            .map_err(|e| StorageError::download_failed(format!("stream interrupted: {}", e)))?;
        file.flush().await?;

        info!("Downloaded s3://{}/{} ({} bytes)", bucket, key, bytes);
        Ok(dest.to_path_buf())
    }

    async fn upload(
        &self,
        local_path: &Path,
        bucket: &str,
        key: &str,
        content_type: &str,
    ) -> StorageResult<()> {
        match tokio::fs::metadata(local_path).await {
            Ok(meta) if meta.is_file() => {}
            Ok(_) => return Err(StorageError::LocalFileMissing(local_path.to_path_buf())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StorageError::LocalFileMissing(local_path.to_path_buf()))
            }
            Err(e) => return Err(StorageError::Io(e)),
        }

        debug!("Uploading {} to s3://{}/{}", local_path.display(), bucket, key);

        let body = ByteStream::from_path(local_path)
            .await
            .map_err(|e| StorageError::upload_failed(e.to_string()))?;

        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(body)
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| StorageError::upload_failed(DisplayErrorContext(&e).to_string()))?;

        debug!("Uploaded {} to s3://{}/{}", local_path.display(), bucket, key);
        Ok(())
    }

    async fn delete(&self, bucket: &str, key: &str) -> StorageResult<()> {
        debug!("Deleting s3://{}/{}", bucket, key);

        self.client
            .delete_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| StorageError::delete_failed(DisplayErrorContext(&e).to_string()))?;

        info!("Deleted s3://{}/{}", bucket, key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn offline_client() -> S3Client {
        let config = Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new("us-east-1"))
            .credentials_provider(Credentials::new("test", "test", None, None, "test"))
            .endpoint_url("http://127.0.0.1:9")
            .force_path_style(true)
            .build();
        S3Client {
            client: Client::from_conf(config),
        }
    }

    #[tokio::test]
    async fn test_upload_missing_local_file_is_permanent() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("chunk-stream0-00001.m4s");

        let err = offline_client()
            .upload(&missing, "segments", "segments/abc/chunk.m4s", "video/iso.segment")
            .await
            .unwrap_err();

        assert!(matches!(err, StorageError::LocalFileMissing(_)));
        assert!(!err.is_transient());
    }

    #[test]
    fn test_config_debug_hides_secret() {
        let config = S3Config {
            region: "ap-south-1".into(),
            access_key_id: Some("AKIA".into()),
            secret_access_key: Some("very-secret".into()),
            endpoint_url: None,
        };
        let rendered = format!("{:?}", config);
        assert!(!rendered.contains("very-secret"));
        assert!(!rendered.contains("AKIA"));
    }
}
