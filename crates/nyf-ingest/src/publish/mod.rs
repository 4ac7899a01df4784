//! Dataset publication
//!
//! A publisher receives each validated increment once and stores it under
//! `{dataset_id}/{start}_{end}.csv`, keyed by the date range the increment was
//! fetched for, then registers the dataset's descriptive metadata under
//! `{dataset_id}/metadata.json`. Increments never share a key; re-publishing
//! the same range overwrites it.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::Result;
use crate::range::DateRange;
use crate::table::Table;

pub mod local;
pub mod s3;

pub use local::LocalPublisher;
pub use s3::{S3Publisher, StorageConfig};

/// Descriptive catalog entry for a dataset
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetMetadata {
    pub id: String,
    pub title: String,
    pub description: String,
    pub column_descriptions: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadReceipt {
    pub key: String,
    pub size: u64,
    /// Hex sha256 of the uploaded bytes
    pub checksum: String,
}

#[async_trait]
pub trait Publisher: Send + Sync {
    async fn upload(&self, dataset_id: &str, range: DateRange, table: &Table) -> Result<UploadReceipt>;

    async fn publish_metadata(&self, metadata: &DatasetMetadata) -> Result<()>;
}

pub fn data_key(dataset_id: &str, range: DateRange) -> String {
    format!("{}/{}_{}.csv", dataset_id, range.start(), range.end())
}

pub fn metadata_key(dataset_id: &str) -> String {
    format!("{}/metadata.json", dataset_id)
}
