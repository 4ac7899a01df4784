//! Configuration management
//!
//! The process environment is read once, here, and turned into explicit
//! values handed to the pipeline.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{IngestError, Result};
use crate::fetch::{ApiClient, ChunkedRangeFetcher, RetryPolicy, DEFAULT_MAX_CHUNK_DAYS};
use crate::fetch::client::{DEFAULT_BASE_URL, DEFAULT_TIMEOUT_SECS};
use crate::fetch::retry::DEFAULT_MAX_ATTEMPTS;
use crate::publish::{LocalPublisher, Publisher, S3Publisher, StorageConfig};

// ============================================================================
// Ingestion Configuration Constants
// ============================================================================

/// Default root for state files and raw captures.
pub const DEFAULT_DATA_DIR: &str = "./data";

/// Default root for locally published datasets.
pub const DEFAULT_OUTPUT_DIR: &str = "./output";

/// Run identifier tagged on log spans when none is supplied by the scheduler.
pub const DEFAULT_RUN_ID: &str = "local-run";

/// Where published datasets go
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum OutputConfig {
    Local { dir: PathBuf },
    S3(StorageConfig),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IngestConfig {
    pub api_base_url: String,
    pub data_dir: PathBuf,
    pub output: OutputConfig,
    pub request_timeout_secs: u64,
    pub max_chunk_days: u32,
    pub retry_max_attempts: u32,
    pub run_id: String,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_BASE_URL.to_string(),
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            output: OutputConfig::Local {
                dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            },
            request_timeout_secs: DEFAULT_TIMEOUT_SECS,
            max_chunk_days: DEFAULT_MAX_CHUNK_DAYS,
            retry_max_attempts: DEFAULT_MAX_ATTEMPTS,
            run_id: DEFAULT_RUN_ID.to_string(),
        }
    }
}

impl IngestConfig {
    /// Load configuration from `.env`, the environment and defaults
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable source
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        let output = match var("NYF_OUTPUT").as_deref().map(str::to_lowercase).as_deref() {
            None | Some("local") => OutputConfig::Local {
                dir: var("NYF_OUTPUT_DIR")
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR)),
            },
            Some("s3") => OutputConfig::S3(StorageConfig::from_lookup(&lookup)?),
            Some(other) => {
                return Err(IngestError::Config(format!(
                    "NYF_OUTPUT must be 'local' or 's3', got '{}'",
                    other
                )))
            },
        };

        let config = IngestConfig {
            api_base_url: var("NYF_API_BASE_URL").unwrap_or(defaults.api_base_url),
            data_dir: var("NYF_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.data_dir),
            output,
            request_timeout_secs: var("NYF_REQUEST_TIMEOUT_SECS")
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.request_timeout_secs),
            max_chunk_days: var("NYF_MAX_CHUNK_DAYS")
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_chunk_days),
            retry_max_attempts: var("NYF_RETRY_MAX_ATTEMPTS")
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.retry_max_attempts),
            run_id: var("RUN_ID").unwrap_or(defaults.run_id),
        };

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.api_base_url.trim().is_empty() {
            return Err(IngestError::Config("API base URL cannot be empty".to_string()));
        }

        if self.request_timeout_secs == 0 {
            return Err(IngestError::Config(
                "Request timeout must be greater than 0".to_string(),
            ));
        }

        if self.max_chunk_days == 0 {
            return Err(IngestError::Config(
                "Chunk span must be at least one day".to_string(),
            ));
        }

        if self.retry_max_attempts == 0 {
            return Err(IngestError::Config(
                "Retry budget must allow at least one attempt".to_string(),
            ));
        }

        Ok(())
    }

    pub fn state_dir(&self) -> PathBuf {
        self.data_dir.join("state")
    }

    pub fn raw_dir(&self) -> PathBuf {
        self.data_dir.join("raw")
    }

    pub fn api_client(&self) -> Result<ApiClient> {
        ApiClient::new(
            self.api_base_url.clone(),
            Duration::from_secs(self.request_timeout_secs),
        )
    }

    pub fn publisher(&self) -> Arc<dyn Publisher> {
        match &self.output {
            OutputConfig::Local { dir } => Arc::new(LocalPublisher::new(dir.clone())),
            OutputConfig::S3(storage) => Arc::new(S3Publisher::new(storage.clone())),
        }
    }

    pub fn run_context(&self, today: NaiveDate) -> RunContext {
        RunContext {
            run_id: self.run_id.clone(),
            today,
            max_chunk_days: self.max_chunk_days,
            retry: RetryPolicy::default().with_max_attempts(self.retry_max_attempts),
        }
    }
}

/// Per-run values the pipeline needs, resolved before it starts
#[derive(Debug, Clone)]
pub struct RunContext {
    pub run_id: String,
    /// Upper bound of every resolved range (before publication lag)
    pub today: NaiveDate,
    pub max_chunk_days: u32,
    pub retry: RetryPolicy,
}

impl RunContext {
    pub fn new(run_id: impl Into<String>, today: NaiveDate) -> Self {
        Self {
            run_id: run_id.into(),
            today,
            max_chunk_days: DEFAULT_MAX_CHUNK_DAYS,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_max_chunk_days(mut self, days: u32) -> Self {
        self.max_chunk_days = days;
        self
    }

    pub fn fetcher(&self) -> ChunkedRangeFetcher {
        ChunkedRangeFetcher::new(self.max_chunk_days, self.retry.clone())
    }
}
