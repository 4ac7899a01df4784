//! S3-compatible object storage publisher

use async_trait::async_trait;
use aws_sdk_s3::{
    config::{Credentials, Region},
    primitives::ByteStream,
    Client,
};
use nyf_common::checksum::sha256_hex;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info, instrument};

use super::{data_key, metadata_key, DatasetMetadata, Publisher, UploadReceipt};
use crate::error::{IngestError, Result};
use crate::range::DateRange;
use crate::table::Table;

#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StorageConfig {
    pub endpoint: Option<String>,
    pub region: String,
    pub bucket: String,
    /// Key prefix, without leading or trailing slashes
    pub prefix: Option<String>,
    pub access_key: String,
    pub secret_key: String,
    pub path_style: bool,
}

impl fmt::Debug for StorageConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageConfig")
            .field("endpoint", &self.endpoint)
            .field("region", &self.region)
            .field("bucket", &self.bucket)
            .field("prefix", &self.prefix)
            .field("access_key", &self.access_key)
            .field("secret_key", &"<redacted>")
            .field("path_style", &self.path_style)
            .finish()
    }
}

impl StorageConfig {
    /// Read `S3_*` variables, falling back to the standard AWS credential
    /// variables. A bucket is mandatory.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let bucket = var("S3_BUCKET")
            .ok_or_else(|| IngestError::Config("S3_BUCKET must be set for S3 output".to_string()))?;
        let access_key = var("S3_ACCESS_KEY")
            .or_else(|| var("AWS_ACCESS_KEY_ID"))
            .ok_or_else(|| IngestError::Config("S3_ACCESS_KEY or AWS_ACCESS_KEY_ID must be set".to_string()))?;
        let secret_key = var("S3_SECRET_KEY")
            .or_else(|| var("AWS_SECRET_ACCESS_KEY"))
            .ok_or_else(|| {
                IngestError::Config("S3_SECRET_KEY or AWS_SECRET_ACCESS_KEY must be set".to_string())
            })?;

        Ok(Self {
            endpoint: var("S3_ENDPOINT"),
            region: var("S3_REGION").unwrap_or_else(|| "us-east-1".to_string()),
            bucket,
            prefix: var("S3_PREFIX").map(|p| p.trim_matches('/').to_string()),
            access_key,
            secret_key,
            path_style: var("S3_PATH_STYLE")
                .and_then(|v| v.parse().ok())
                .unwrap_or(false),
        })
    }

    fn object_key(&self, key: &str) -> String {
        match self.prefix.as_deref().filter(|p| !p.is_empty()) {
            Some(prefix) => format!("{}/{}", prefix, key),
            None => key.to_string(),
        }
    }
}

#[derive(Clone)]
pub struct S3Publisher {
    client: Client,
    config: StorageConfig,
}

impl S3Publisher {
    pub fn new(config: StorageConfig) -> Self {
        let credentials = Credentials::new(
            &config.access_key,
            &config.secret_key,
            None,
            None,
            "nyf-ingest",
        );

        let mut builder = aws_sdk_s3::Config::builder()
            .credentials_provider(credentials)
            .region(Region::new(config.region.clone()))
            .force_path_style(config.path_style);

        if let Some(endpoint) = &config.endpoint {
            builder = builder.endpoint_url(endpoint);
        }

        let client = Client::from_conf(builder.build());
        info!("Storage client initialized for bucket: {}", config.bucket);

        Self { client, config }
    }

    #[instrument(skip(self, data))]
    async fn put(&self, key: &str, data: Vec<u8>, content_type: &str) -> Result<UploadReceipt> {
        let key = self.config.object_key(key);
        let checksum = sha256_hex(&data);
        let size = data.len() as u64;

        debug!("Uploading {} bytes to s3://{}/{}", size, self.config.bucket, key);

        self.client
            .put_object()
            .bucket(&self.config.bucket)
            .key(&key)
            .content_type(content_type)
            .body(ByteStream::from(data))
            .send()
            .await
            .map_err(|e| {
                IngestError::publish(format!(
                    "Failed to upload s3://{}/{}: {}",
                    self.config.bucket,
                    key,
                    aws_sdk_s3::error::DisplayErrorContext(&e)
                ))
            })?;

        info!("Successfully uploaded to s3://{}/{}", self.config.bucket, key);

        Ok(UploadReceipt {
            key,
            size,
            checksum,
        })
    }
}

#[async_trait]
impl Publisher for S3Publisher {
    async fn upload(&self, dataset_id: &str, range: DateRange, table: &Table) -> Result<UploadReceipt> {
        let bytes = table.to_csv()?;
        self.put(&data_key(dataset_id, range), bytes, "text/csv").await
    }

    async fn publish_metadata(&self, metadata: &DatasetMetadata) -> Result<()> {
        let json = serde_json::to_vec_pretty(metadata)
            .map_err(|e| IngestError::publish(format!("Failed to encode metadata: {}", e)))?;
        self.put(&metadata_key(&metadata.id), json, "application/json")
            .await?;
        Ok(())
    }
}
