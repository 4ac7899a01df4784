//! Shared harness for pipeline integration tests
//!
//! Every test gets its own mock upstream API and a scratch directory holding
//! state, raw captures and published output.

#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use chrono::NaiveDate;
use nyf_ingest::capture::FileRawCapture;
use nyf_ingest::config::RunContext;
use nyf_ingest::fetch::{ApiClient, RetryPolicy};
use nyf_ingest::pipeline::{PipelineRunner, RunMode};
use nyf_ingest::publish::LocalPublisher;
use nyf_ingest::state::{FileStateStore, StateStore};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use wiremock::MockServer;

pub const RUN_ID: &str = "it-run";

pub struct TestEnv {
    pub server: MockServer,
    pub dir: TempDir,
    retry: RetryPolicy,
}

impl TestEnv {
    pub async fn start() -> Self {
        Self {
            server: MockServer::start().await,
            dir: TempDir::new().expect("Failed to create temp dir"),
            retry: RetryPolicy::none(),
        }
    }

    /// Retry transient failures without real waiting
    pub fn with_fast_retries(mut self, attempts: u32) -> Self {
        self.retry = RetryPolicy::default()
            .with_max_attempts(attempts)
            .with_backoff(Duration::from_millis(1), Duration::from_millis(5));
        self
    }

    pub fn state_dir(&self) -> PathBuf {
        self.dir.path().join("state")
    }

    pub fn raw_dir(&self) -> PathBuf {
        self.dir.path().join("raw")
    }

    pub fn output_dir(&self) -> PathBuf {
        self.dir.path().join("output")
    }

    /// Data files published for a dataset, in key order
    pub fn published_files(&self, dataset_id: &str) -> Vec<PathBuf> {
        let Ok(entries) = std::fs::read_dir(self.output_dir().join(dataset_id)) else {
            return Vec::new();
        };
        let mut files: Vec<PathBuf> = entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.extension().is_some_and(|ext| ext == "csv"))
            .collect();
        files.sort();
        files
    }

    /// The only data file published for a dataset
    pub fn output_file(&self, dataset_id: &str) -> PathBuf {
        let mut files = self.published_files(dataset_id);
        assert_eq!(files.len(), 1, "expected one data file for {}: {:?}", dataset_id, files);
        files.remove(0)
    }

    pub fn state(&self) -> FileStateStore {
        FileStateStore::new(self.state_dir())
    }

    pub async fn watermark(&self, source_id: &str) -> Option<NaiveDate> {
        self.state().load(source_id).await.last_processed
    }

    pub fn runner(&self, today: NaiveDate, mode: RunMode) -> PipelineRunner {
        let api = ApiClient::new(self.server.uri(), Duration::from_secs(5))
            .expect("Failed to build API client");
        PipelineRunner::new(
            RunContext::new(RUN_ID, today).with_retry(self.retry.clone()),
            api,
            Arc::new(self.state()),
            Arc::new(FileRawCapture::new(self.raw_dir())),
            Arc::new(LocalPublisher::new(self.output_dir())),
        )
        .with_mode(mode)
    }

    /// Query string values of every request received for `path`
    pub async fn start_dates(&self, path: &str) -> Vec<String> {
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .iter()
            .filter(|r| r.url.path() == path)
            .filter_map(|r| {
                r.url
                    .query_pairs()
                    .find(|(k, _)| k == "startDate")
                    .map(|(_, v)| v.into_owned())
            })
            .collect()
    }
}

pub fn ymd(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).unwrap()
}

pub fn csv_lines(path: &std::path::Path) -> Vec<String> {
    std::fs::read_to_string(path)
        .expect("Failed to read published CSV")
        .lines()
        .map(str::to_string)
        .collect()
}
