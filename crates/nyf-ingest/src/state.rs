//! Per-source watermark persistence
//!
//! A watermark is the last date a source was successfully published for. It
//! is read at the start of a run and overwritten only after publish succeeds.

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{IngestError, Result};
use crate::range::DATE_FORMAT;

/// Publication cadence; decides the key the watermark is stored under
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Cadence {
    Daily,
    Weekly,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Watermark {
    pub source_id: String,
    pub cadence: Cadence,
    pub last_processed: Option<NaiveDate>,
}

impl Watermark {
    pub fn empty(source_id: impl Into<String>) -> Self {
        Self {
            source_id: source_id.into(),
            cadence: Cadence::Daily,
            last_processed: None,
        }
    }

    pub fn new(source_id: impl Into<String>, cadence: Cadence, last_processed: NaiveDate) -> Self {
        Self {
            source_id: source_id.into(),
            cadence,
            last_processed: Some(last_processed),
        }
    }
}

/// On-disk shape: `{"last_date": "YYYY-MM-DD"}` or `{"last_week": "YYYY-MM-DD"}`
#[derive(Debug, Default, Serialize, Deserialize)]
struct StateRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    last_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    last_week: Option<String>,
}

impl StateRecord {
    fn from_watermark(watermark: &Watermark) -> Self {
        let date = watermark
            .last_processed
            .map(|d| d.format(DATE_FORMAT).to_string());
        match watermark.cadence {
            Cadence::Daily => Self {
                last_date: date,
                last_week: None,
            },
            Cadence::Weekly => Self {
                last_date: None,
                last_week: date,
            },
        }
    }

    fn into_watermark(self, source_id: &str) -> Watermark {
        let (cadence, raw) = match (self.last_date, self.last_week) {
            (_, Some(week)) => (Cadence::Weekly, Some(week)),
            (date, None) => (Cadence::Daily, date),
        };
        let last_processed = raw.and_then(|s| {
            NaiveDate::parse_from_str(&s, DATE_FORMAT)
                .map_err(|e| warn!(source = %source_id, value = %s, error = %e, "Ignoring unparsable watermark"))
                .ok()
        });
        Watermark {
            source_id: source_id.to_string(),
            cadence,
            last_processed,
        }
    }
}

#[async_trait]
pub trait StateStore: Send + Sync {
    /// Never fails: an absent or unreadable record yields an empty watermark
    async fn load(&self, source_id: &str) -> Watermark;

    /// Replace the stored watermark as a whole
    async fn save(&self, watermark: &Watermark) -> Result<()>;
}

/// One JSON file per source under a state directory
#[derive(Debug, Clone)]
pub struct FileStateStore {
    dir: PathBuf,
}

impl FileStateStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, source_id: &str) -> PathBuf {
        self.dir.join(format!("{}.json", source_id))
    }
}

#[async_trait]
impl StateStore for FileStateStore {
    async fn load(&self, source_id: &str) -> Watermark {
        let path = self.path_for(source_id);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(source = %source_id, "No watermark on disk");
                return Watermark::empty(source_id);
            },
            Err(e) => {
                warn!(source = %source_id, path = %path.display(), error = %e, "Failed to read watermark");
                return Watermark::empty(source_id);
            },
        };

        match serde_json::from_slice::<StateRecord>(&bytes) {
            Ok(record) => record.into_watermark(source_id),
            Err(e) => {
                warn!(source = %source_id, path = %path.display(), error = %e, "Corrupt watermark file");
                Watermark::empty(source_id)
            },
        }
    }

    async fn save(&self, watermark: &Watermark) -> Result<()> {
        let path = self.path_for(&watermark.source_id);
        let json = serde_json::to_vec_pretty(&StateRecord::from_watermark(watermark))
            .map_err(|e| IngestError::persistence(format!("Failed to encode watermark: {}", e)))?;

        write_atomic(&path, &json).await.map_err(|e| {
            IngestError::persistence(format!("Failed to write {}: {}", path.display(), e))
        })?;

        debug!(source = %watermark.source_id, last = ?watermark.last_processed, "Saved watermark");
        Ok(())
    }
}

/// Write to a sibling temporary file, then rename over the target so readers
/// see either the old or the new content.
pub(crate) async fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let tmp = path.with_file_name(format!(".{}.{}.tmp", file_name, Uuid::new_v4()));

    tokio::fs::write(&tmp, bytes).await?;
    if let Err(e) = tokio::fs::rename(&tmp, path).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(e);
    }
    Ok(())
}
