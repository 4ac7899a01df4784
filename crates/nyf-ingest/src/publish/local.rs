//! Filesystem publisher

use async_trait::async_trait;
use nyf_common::checksum::sha256_hex;
use std::path::PathBuf;
use tracing::info;

use super::{data_key, metadata_key, DatasetMetadata, Publisher, UploadReceipt};
use crate::error::{IngestError, Result};
use crate::range::DateRange;
use crate::state::write_atomic;
use crate::table::Table;

/// Writes published artifacts below a root directory
#[derive(Debug, Clone)]
pub struct LocalPublisher {
    root: PathBuf,
}

impl LocalPublisher {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    async fn write(&self, key: &str, bytes: &[u8]) -> Result<PathBuf> {
        let path = self.root.join(key);
        write_atomic(&path, bytes)
            .await
            .map_err(|e| IngestError::publish(format!("Failed to write {}: {}", path.display(), e)))?;
        Ok(path)
    }
}

#[async_trait]
impl Publisher for LocalPublisher {
    async fn upload(&self, dataset_id: &str, range: DateRange, table: &Table) -> Result<UploadReceipt> {
        let key = data_key(dataset_id, range);
        let bytes = table.to_csv()?;
        let checksum = sha256_hex(&bytes);

        let path = self.write(&key, &bytes).await?;
        info!(
            dataset = %dataset_id,
            rows = table.len(),
            bytes = bytes.len(),
            path = %path.display(),
            "Published dataset"
        );

        Ok(UploadReceipt {
            key,
            size: bytes.len() as u64,
            checksum,
        })
    }

    async fn publish_metadata(&self, metadata: &DatasetMetadata) -> Result<()> {
        let json = serde_json::to_vec_pretty(metadata)
            .map_err(|e| IngestError::publish(format!("Failed to encode metadata: {}", e)))?;
        self.write(&metadata_key(&metadata.id), &json).await?;
        Ok(())
    }
}
