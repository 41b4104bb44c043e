//! Object storage upload (S3 or an S3-compatible store)

use crate::config::StorageConfig;
use crate::error::{Result, ShipperError};
use async_trait::async_trait;
use aws_sdk_s3::{
    config::{Credentials, Region},
    error::DisplayErrorContext,
    primitives::ByteStream,
    Client,
};
use tracing::{debug, info, instrument};

/// Destination for export files
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store `data` under `key`, replacing any existing object
    async fn put(&self, key: &str, data: Vec<u8>, content_type: &str) -> Result<()>;
}

/// S3 bucket client
#[derive(Clone)]
pub struct S3Store {
    client: Client,
    bucket: String,
}

impl S3Store {
    /// Build a client from static credentials; no network traffic happens here
    pub fn new(config: &StorageConfig) -> Self {
        let credentials = Credentials::new(
            &config.access_key_id,
            &config.secret_access_key,
            None,
            None,
            "wsal-shipper",
        );

        let mut s3_config_builder = aws_sdk_s3::Config::builder()
            .credentials_provider(credentials)
            .region(Region::new(config.region.clone()))
            .force_path_style(config.path_style);

        if let Some(endpoint) = &config.endpoint {
            s3_config_builder = s3_config_builder.endpoint_url(endpoint);
        }

        let client = Client::from_conf(s3_config_builder.build());

        debug!(bucket = %config.bucket, region = %config.region, "S3 client initialized");

        Self {
            client,
            bucket: config.bucket.clone(),
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    #[instrument(skip(self, data))]
    async fn put(&self, key: &str, data: Vec<u8>, content_type: &str) -> Result<()> {
        debug!("Uploading {} bytes to s3://{}/{}", data.len(), self.bucket, key);

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .body(ByteStream::from(data))
            .send()
            .await
            .map_err(|e| ShipperError::upload(key, DisplayErrorContext(&e).to_string()))?;

        info!("Uploaded to s3://{}/{}", self.bucket, key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_client_builds_for_custom_endpoint() {
        let config = StorageConfig {
            access_key_id: "minioadmin".to_string(),
            secret_access_key: "minioadmin".to_string(),
            bucket: "audit-logs".to_string(),
            region: "us-east-1".to_string(),
            endpoint: Some("http://localhost:9000".to_string()),
            path_style: true,
        };

        let store = S3Store::new(&config);
        assert_eq!(store.bucket(), "audit-logs");
    }
}
