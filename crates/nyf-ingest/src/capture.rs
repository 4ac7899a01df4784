//! Raw payload capture
//!
//! The concatenated chunk results of a fetch are stored per source, together
//! with the range they cover, so a later run can re-normalize them without
//! touching the network. Latest capture wins.

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;
use std::path::PathBuf;
use tracing::debug;

use crate::error::{IngestError, Result};
use crate::range::DateRange;
use crate::state::write_atomic;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawPayload {
    pub source_id: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub items: Vec<Json>,
}

impl RawPayload {
    pub fn new(source_id: impl Into<String>, range: DateRange, items: Vec<Json>) -> Self {
        Self {
            source_id: source_id.into(),
            start_date: range.start(),
            end_date: range.end(),
            items,
        }
    }

    /// Range the payload was fetched for; a hand-edited inverted range
    /// collapses to its start day.
    pub fn range(&self) -> DateRange {
        DateRange::new(self.start_date, self.end_date)
            .unwrap_or_else(|| DateRange::single(self.start_date))
    }
}

#[async_trait]
pub trait RawCapture: Send + Sync {
    async fn save(&self, payload: &RawPayload) -> Result<()>;

    /// Most recent capture for a source, `None` if nothing was captured
    async fn load_latest(&self, source_id: &str) -> Result<Option<RawPayload>>;
}

#[derive(Debug, Clone)]
pub struct FileRawCapture {
    dir: PathBuf,
}

impl FileRawCapture {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, source_id: &str) -> PathBuf {
        self.dir.join(format!("{}.json", source_id))
    }
}

#[async_trait]
impl RawCapture for FileRawCapture {
    async fn save(&self, payload: &RawPayload) -> Result<()> {
        let path = self.path_for(&payload.source_id);
        let json = serde_json::to_vec(payload)
            .map_err(|e| IngestError::persistence(format!("Failed to encode capture: {}", e)))?;

        write_atomic(&path, &json).await.map_err(|e| {
            IngestError::persistence(format!("Failed to write {}: {}", path.display(), e))
        })?;

        debug!(
            source = %payload.source_id,
            items = payload.items.len(),
            bytes = json.len(),
            "Saved raw capture"
        );
        Ok(())
    }

    async fn load_latest(&self, source_id: &str) -> Result<Option<RawPayload>> {
        let path = self.path_for(source_id);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(IngestError::persistence(format!(
                    "Failed to read {}: {}",
                    path.display(),
                    e
                )))
            },
        };

        serde_json::from_slice(&bytes).map(Some).map_err(|e| {
            IngestError::persistence(format!("Corrupt capture {}: {}", path.display(), e))
        })
    }
}
