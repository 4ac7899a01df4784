//! Per-source pipeline state machine
//!
//! ```text
//! Idle -> ResolvingRange -> Fetching -> Captured -> Normalizing -> Validating -> Publishing -> Done
//!                                                                                     any -> Failed
//! ```
//!
//! The watermark is written only after the table and its metadata have been
//! published. A failure anywhere leaves it untouched, so the next run
//! resolves the same start date again.

use chrono::NaiveDate;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::capture::{RawCapture, RawPayload};
use crate::config::RunContext;
use crate::error::{IngestError, Result};
use crate::fetch::ApiClient;
use crate::normalize::normalize;
use crate::publish::{Publisher, UploadReceipt};
use crate::sources::{FetchContext, SourceAdapter};
use crate::state::{StateStore, Watermark};
use crate::validate::validate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PipelineState {
    Idle,
    ResolvingRange,
    Fetching,
    Captured,
    Normalizing,
    Validating,
    Publishing,
    Done,
    Failed,
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipelineState::Idle => "IDLE",
            PipelineState::ResolvingRange => "RESOLVING_RANGE",
            PipelineState::Fetching => "FETCHING",
            PipelineState::Captured => "CAPTURED",
            PipelineState::Normalizing => "NORMALIZING",
            PipelineState::Validating => "VALIDATING",
            PipelineState::Publishing => "PUBLISHING",
            PipelineState::Done => "DONE",
            PipelineState::Failed => "FAILED",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunMode {
    /// Fetch, capture, then transform and publish
    #[default]
    Full,
    /// Fetch and capture only; the watermark never moves
    IngestOnly,
    /// Publish the latest capture without touching the network
    TransformOnly,
}

#[derive(Debug)]
pub enum SourceStatus {
    Published {
        rows: usize,
        dropped: usize,
        watermark: Option<NaiveDate>,
        receipt: UploadReceipt,
    },
    /// Empty range or a capture that normalized to zero rows
    NoNewData,
    /// Ingest-only run finished
    Captured { items: usize },
    Failed {
        /// State the error was raised in
        during: PipelineState,
        error: IngestError,
    },
}

#[derive(Debug)]
pub struct SourceOutcome {
    pub source: String,
    pub transitions: Vec<PipelineState>,
    pub status: SourceStatus,
}

impl SourceOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self.status, SourceStatus::Failed { .. })
    }

    pub fn final_state(&self) -> PipelineState {
        self.transitions
            .last()
            .copied()
            .unwrap_or(PipelineState::Idle)
    }
}

/// Outcome of every source attempted in one batch
#[derive(Debug, Default)]
pub struct BatchReport {
    pub outcomes: Vec<SourceOutcome>,
}

impl BatchReport {
    pub fn failed(&self) -> impl Iterator<Item = &SourceOutcome> {
        self.outcomes.iter().filter(|o| o.is_failed())
    }

    pub fn has_failures(&self) -> bool {
        self.failed().next().is_some()
    }
}

/// Transitions taken so far by one source
struct Machine {
    source: String,
    transitions: Vec<PipelineState>,
}

impl Machine {
    fn new(source: &str) -> Self {
        Self {
            source: source.to_string(),
            transitions: vec![PipelineState::Idle],
        }
    }

    fn enter(&mut self, state: PipelineState) {
        debug!(from = %self.current(), to = %state, "Transition");
        self.transitions.push(state);
    }

    fn current(&self) -> PipelineState {
        self.transitions
            .last()
            .copied()
            .unwrap_or(PipelineState::Idle)
    }

    fn finish(self, status: SourceStatus) -> SourceOutcome {
        SourceOutcome {
            source: self.source,
            transitions: self.transitions,
            status,
        }
    }
}

pub struct PipelineRunner {
    ctx: RunContext,
    fetch: FetchContext,
    state: Arc<dyn StateStore>,
    capture: Arc<dyn RawCapture>,
    publisher: Arc<dyn Publisher>,
    mode: RunMode,
}

impl PipelineRunner {
    pub fn new(
        ctx: RunContext,
        api: ApiClient,
        state: Arc<dyn StateStore>,
        capture: Arc<dyn RawCapture>,
        publisher: Arc<dyn Publisher>,
    ) -> Self {
        let fetch = FetchContext {
            api,
            fetcher: ctx.fetcher(),
        };
        Self {
            ctx,
            fetch,
            state,
            capture,
            publisher,
            mode: RunMode::Full,
        }
    }

    pub fn with_mode(mut self, mode: RunMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn mode(&self) -> RunMode {
        self.mode
    }

    /// Run every source in order; a failed source never stops the batch
    pub async fn run_all(&self, sources: &[Arc<dyn SourceAdapter>]) -> BatchReport {
        let mut report = BatchReport::default();
        for source in sources {
            report.outcomes.push(self.run(source.as_ref()).await);
        }

        let failed = report.failed().count();
        info!(
            run_id = %self.ctx.run_id,
            sources = report.outcomes.len(),
            failed,
            "Batch finished"
        );
        report
    }

    /// Drive one source through the state machine
    pub async fn run(&self, source: &dyn SourceAdapter) -> SourceOutcome {
        let span = info_span!("source", source = %source.id(), run_id = %self.ctx.run_id);

        async {
            let mut machine = Machine::new(source.id());
            let result = match self.mode {
                RunMode::TransformOnly => self.transform_latest(source, &mut machine).await,
                RunMode::Full | RunMode::IngestOnly => self.ingest(source, &mut machine).await,
            };

            match result {
                Ok(status) => {
                    info!(state = %machine.current(), "Source finished");
                    machine.finish(status)
                },
                Err(error) => {
                    let during = machine.current();
                    error!(during = %during, error = %error, "Source failed");
                    machine.enter(PipelineState::Failed);
                    machine.finish(SourceStatus::Failed { during, error })
                },
            }
        }
        .instrument(span)
        .await
    }

    async fn ingest(&self, source: &dyn SourceAdapter, machine: &mut Machine) -> Result<SourceStatus> {
        machine.enter(PipelineState::ResolvingRange);
        let watermark = self.state.load(source.id()).await;
        let Some(range) = source.resolve_range(&watermark, self.ctx.today) else {
            info!(last_processed = ?watermark.last_processed, "Already up to date");
            machine.enter(PipelineState::Done);
            return Ok(SourceStatus::NoNewData);
        };
        info!(range = %range, days = range.days(), "Resolved range");

        machine.enter(PipelineState::Fetching);
        let items = source.fetch(&self.fetch, range).await?;
        let payload = RawPayload::new(source.id(), range, items);
        self.capture.save(&payload).await?;
        machine.enter(PipelineState::Captured);
        info!(items = payload.items.len(), "Captured raw payload");

        if self.mode == RunMode::IngestOnly {
            machine.enter(PipelineState::Done);
            return Ok(SourceStatus::Captured {
                items: payload.items.len(),
            });
        }

        self.transform(source, &payload, &watermark, machine).await
    }

    async fn transform_latest(
        &self,
        source: &dyn SourceAdapter,
        machine: &mut Machine,
    ) -> Result<SourceStatus> {
        let payload = self
            .capture
            .load_latest(source.id())
            .await?
            .ok_or_else(|| IngestError::CaptureMissing(source.id().to_string()))?;
        machine.enter(PipelineState::Captured);
        info!(range = %payload.range(), items = payload.items.len(), "Loaded latest capture");

        let watermark = self.state.load(source.id()).await;
        self.transform(source, &payload, &watermark, machine).await
    }

    async fn transform(
        &self,
        source: &dyn SourceAdapter,
        payload: &RawPayload,
        previous: &Watermark,
        machine: &mut Machine,
    ) -> Result<SourceStatus> {
        machine.enter(PipelineState::Normalizing);
        let normalized = normalize(source, payload);
        let table = normalized.table;

        if table.is_empty() {
            info!(range = %payload.range(), "No rows produced, nothing to publish");
            machine.enter(PipelineState::Done);
            return Ok(SourceStatus::NoNewData);
        }

        machine.enter(PipelineState::Validating);
        validate(&table, &source.validation())?;

        machine.enter(PipelineState::Publishing);
        let receipt = self
            .publisher
            .upload(source.dataset_id(), payload.range(), &table)
            .await?;
        self.publisher.publish_metadata(&source.metadata()).await?;

        let newest = table.max_date(source.watermark_column());
        let next = previous.last_processed.max(newest);
        match next {
            Some(date) => {
                self.state
                    .save(&Watermark::new(source.id(), source.cadence(), date))
                    .await?;
            },
            None => warn!(
                column = %source.watermark_column(),
                "Published rows carry no watermark date, watermark unchanged"
            ),
        }

        machine.enter(PipelineState::Done);
        info!(
            rows = table.len(),
            dropped = normalized.dropped,
            key = %receipt.key,
            watermark = ?next,
            "Published"
        );

        Ok(SourceStatus::Published {
            rows: table.len(),
            dropped: normalized.dropped,
            watermark: next,
            receipt,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::publish::DatasetMetadata;
    use crate::range::DateRange;
    use crate::sources::ymd;
    use crate::state::Cadence;
    use crate::table::{Column, ColumnType, Record, Schema, Table};
    use crate::validate::ValidationSpec;
    use async_trait::async_trait;
    use serde_json::{json, Value as Json};
    use std::collections::HashMap;
    use std::sync::Mutex;
    use super::PipelineState::*;

    #[derive(Default)]
    struct MemoryState(Mutex<HashMap<String, Watermark>>);

    #[async_trait]
    impl StateStore for MemoryState {
        async fn load(&self, source_id: &str) -> Watermark {
            self.0
                .lock()
                .unwrap()
                .get(source_id)
                .cloned()
                .unwrap_or_else(|| Watermark::empty(source_id))
        }

        async fn save(&self, watermark: &Watermark) -> Result<()> {
            self.0
                .lock()
                .unwrap()
                .insert(watermark.source_id.clone(), watermark.clone());
            Ok(())
        }
    }

    #[derive(Default)]
    struct MemoryCapture(Mutex<HashMap<String, RawPayload>>);

    #[async_trait]
    impl RawCapture for MemoryCapture {
        async fn save(&self, payload: &RawPayload) -> Result<()> {
            self.0
                .lock()
                .unwrap()
                .insert(payload.source_id.clone(), payload.clone());
            Ok(())
        }

        async fn load_latest(&self, source_id: &str) -> Result<Option<RawPayload>> {
            Ok(self.0.lock().unwrap().get(source_id).cloned())
        }
    }

    #[derive(Default)]
    struct RecordingPublisher {
        uploads: Mutex<Vec<(String, usize)>>,
        fail: bool,
    }

    #[async_trait]
    impl Publisher for RecordingPublisher {
        async fn upload(&self, dataset_id: &str, range: DateRange, table: &Table) -> Result<UploadReceipt> {
            if self.fail {
                return Err(IngestError::publish("bucket unavailable"));
            }
            self.uploads
                .lock()
                .unwrap()
                .push((dataset_id.to_string(), table.len()));
            Ok(UploadReceipt {
                key: crate::publish::data_key(dataset_id, range),
                size: 0,
                checksum: String::new(),
            })
        }

        async fn publish_metadata(&self, _metadata: &DatasetMetadata) -> Result<()> {
            Ok(())
        }
    }

    /// Serves `{"date", "value"}` items from memory
    struct StubSource {
        items: Vec<Json>,
        min_rows: usize,
        fail: bool,
        ranges: Mutex<Vec<DateRange>>,
    }

    impl StubSource {
        fn new(items: Vec<Json>) -> Self {
            Self {
                items,
                min_rows: 1,
                fail: false,
                ranges: Mutex::new(Vec::new()),
            }
        }

        fn fetches(&self) -> Vec<DateRange> {
            self.ranges.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl SourceAdapter for StubSource {
        fn id(&self) -> &str {
            "stub"
        }

        fn dataset_id(&self) -> &str {
            "nyf_stub"
        }

        fn epoch(&self) -> NaiveDate {
            ymd(2024, 1, 1)
        }

        fn watermark_column(&self) -> &str {
            "date"
        }

        fn schema(&self) -> Schema {
            Schema::new(vec![
                Column::required("date", ColumnType::Date),
                Column::new("value", ColumnType::Double),
            ])
        }

        fn validation(&self) -> ValidationSpec {
            ValidationSpec::for_schema(&self.schema()).min_rows(self.min_rows)
        }

        fn metadata(&self) -> DatasetMetadata {
            DatasetMetadata {
                id: "nyf_stub".to_string(),
                title: "Stub".to_string(),
                description: String::new(),
                column_descriptions: Default::default(),
            }
        }

        async fn fetch(&self, _ctx: &FetchContext, range: DateRange) -> Result<Vec<Json>> {
            self.ranges.lock().unwrap().push(range);
            if self.fail {
                return Err(IngestError::fetch("404 Not Found"));
            }
            Ok(self.items.clone())
        }

        fn normalize(&self, payload: &RawPayload) -> Vec<Record> {
            payload
                .items
                .iter()
                .map(|item| {
                    Record::new()
                        .with("date", crate::normalize::parse::json_date(item.get("date")))
                        .with("value", crate::normalize::parse::json_number(item.get("value")))
                })
                .collect()
        }
    }

    struct Harness {
        state: Arc<MemoryState>,
        capture: Arc<MemoryCapture>,
        publisher: Arc<RecordingPublisher>,
    }

    impl Harness {
        fn new() -> Self {
            Self::with_publisher(RecordingPublisher::default())
        }

        fn with_publisher(publisher: RecordingPublisher) -> Self {
            Self {
                state: Arc::new(MemoryState::default()),
                capture: Arc::new(MemoryCapture::default()),
                publisher: Arc::new(publisher),
            }
        }

        fn runner(&self, today: NaiveDate, mode: RunMode) -> PipelineRunner {
            let api = ApiClient::new("http://127.0.0.1:9", std::time::Duration::from_secs(1)).unwrap();
            PipelineRunner::new(
                RunContext::new("test-run", today),
                api,
                self.state.clone(),
                self.capture.clone(),
                self.publisher.clone(),
            )
            .with_mode(mode)
        }

        async fn watermark(&self) -> Option<NaiveDate> {
            self.state.load("stub").await.last_processed
        }

        async fn set_watermark(&self, date: NaiveDate) {
            self.state
                .save(&Watermark::new("stub", Cadence::Daily, date))
                .await
                .unwrap();
        }
    }

    fn items() -> Vec<Json> {
        vec![
            json!({"date": "2024-06-03", "value": "1.5"}),
            json!({"date": "2024-06-05", "value": "2"}),
            json!({"date": "bad", "value": "3"}),
        ]
    }

    #[tokio::test]
    async fn test_full_run_publishes_and_advances_watermark() {
        let harness = Harness::new();
        let source = StubSource::new(items());

        let outcome = harness
            .runner(ymd(2024, 6, 10), RunMode::Full)
            .run(&source)
            .await;

        assert_eq!(
            outcome.transitions,
            vec![Idle, ResolvingRange, Fetching, Captured, Normalizing, Validating, Publishing, Done]
        );
        match outcome.status {
            SourceStatus::Published {
                rows,
                dropped,
                watermark,
                ..
            } => {
                assert_eq!(rows, 2);
                assert_eq!(dropped, 1);
                assert_eq!(watermark, Some(ymd(2024, 6, 5)));
            },
            other => panic!("unexpected status: {:?}", other),
        }
        assert_eq!(harness.watermark().await, Some(ymd(2024, 6, 5)));
        assert_eq!(source.fetches(), vec![DateRange::new(ymd(2024, 1, 1), ymd(2024, 6, 10)).unwrap()]);
    }

    #[tokio::test]
    async fn test_empty_range_skips_to_done() {
        let harness = Harness::new();
        harness.set_watermark(ymd(2024, 6, 1)).await;
        let source = StubSource::new(items());

        let outcome = harness
            .runner(ymd(2024, 6, 1), RunMode::Full)
            .run(&source)
            .await;

        assert_eq!(outcome.transitions, vec![Idle, ResolvingRange, Done]);
        assert!(matches!(outcome.status, SourceStatus::NoNewData));
        assert!(source.fetches().is_empty());
        assert_eq!(harness.watermark().await, Some(ymd(2024, 6, 1)));
    }

    #[tokio::test]
    async fn test_validation_failure_keeps_watermark_and_skips_publish() {
        let harness = Harness::new();
        harness.set_watermark(ymd(2024, 6, 1)).await;
        let source = StubSource {
            min_rows: 5,
            ..StubSource::new(items())
        };
        let runner = harness.runner(ymd(2024, 6, 10), RunMode::Full);

        let outcome = runner.run(&source).await;
        assert!(outcome.is_failed());
        assert_eq!(outcome.final_state(), Failed);
        assert!(matches!(
            outcome.status,
            SourceStatus::Failed {
                during: Validating,
                error: IngestError::Validation(_)
            }
        ));
        assert!(harness.publisher.uploads.lock().unwrap().is_empty());
        assert_eq!(harness.watermark().await, Some(ymd(2024, 6, 1)));

        // the retry resolves the same start date
        runner.run(&source).await;
        let fetches = source.fetches();
        assert_eq!(fetches.len(), 2);
        assert_eq!(fetches[0].start(), ymd(2024, 6, 2));
        assert_eq!(fetches[1].start(), fetches[0].start());
    }

    #[tokio::test]
    async fn test_publish_failure_keeps_watermark() {
        let harness = Harness::with_publisher(RecordingPublisher {
            fail: true,
            ..Default::default()
        });
        let source = StubSource::new(items());

        let outcome = harness
            .runner(ymd(2024, 6, 10), RunMode::Full)
            .run(&source)
            .await;

        assert!(matches!(
            outcome.status,
            SourceStatus::Failed {
                during: Publishing,
                error: IngestError::Publish(_)
            }
        ));
        assert_eq!(harness.watermark().await, None);
        assert!(harness.capture.load_latest("stub").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_fetch_failure_is_reported() {
        let harness = Harness::new();
        let source = StubSource {
            fail: true,
            ..StubSource::new(items())
        };

        let outcome = harness
            .runner(ymd(2024, 6, 10), RunMode::Full)
            .run(&source)
            .await;

        assert_eq!(outcome.transitions, vec![Idle, ResolvingRange, Fetching, Failed]);
        assert!(harness.capture.load_latest("stub").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_ingest_only_captures_without_publishing() {
        let harness = Harness::new();
        let source = StubSource::new(items());

        let outcome = harness
            .runner(ymd(2024, 6, 10), RunMode::IngestOnly)
            .run(&source)
            .await;

        assert_eq!(outcome.transitions, vec![Idle, ResolvingRange, Fetching, Captured, Done]);
        assert!(matches!(outcome.status, SourceStatus::Captured { items: 3 }));
        assert!(harness.publisher.uploads.lock().unwrap().is_empty());
        assert_eq!(harness.watermark().await, None);
    }

    #[tokio::test]
    async fn test_transform_only_publishes_latest_capture() {
        let harness = Harness::new();
        let source = StubSource::new(items());
        harness
            .runner(ymd(2024, 6, 10), RunMode::IngestOnly)
            .run(&source)
            .await;

        let outcome = harness
            .runner(ymd(2024, 6, 10), RunMode::TransformOnly)
            .run(&source)
            .await;

        assert_eq!(
            outcome.transitions,
            vec![Idle, Captured, Normalizing, Validating, Publishing, Done]
        );
        assert_eq!(source.fetches().len(), 1);
        assert_eq!(harness.watermark().await, Some(ymd(2024, 6, 5)));
    }

    #[tokio::test]
    async fn test_transform_only_never_moves_watermark_backwards() {
        let harness = Harness::new();
        let source = StubSource::new(items());
        harness
            .runner(ymd(2024, 6, 10), RunMode::IngestOnly)
            .run(&source)
            .await;
        harness.set_watermark(ymd(2024, 6, 8)).await;

        harness
            .runner(ymd(2024, 6, 10), RunMode::TransformOnly)
            .run(&source)
            .await;
        assert_eq!(harness.watermark().await, Some(ymd(2024, 6, 8)));
    }

    #[tokio::test]
    async fn test_transform_only_without_capture_fails() {
        let harness = Harness::new();
        let outcome = harness
            .runner(ymd(2024, 6, 10), RunMode::TransformOnly)
            .run(&StubSource::new(items()))
            .await;

        assert_eq!(outcome.transitions, vec![Idle, Failed]);
        assert!(matches!(
            outcome.status,
            SourceStatus::Failed {
                error: IngestError::CaptureMissing(_),
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_zero_rows_is_no_new_data() {
        let harness = Harness::new();
        let source = StubSource::new(vec![]);

        let outcome = harness
            .runner(ymd(2024, 6, 10), RunMode::Full)
            .run(&source)
            .await;

        assert!(matches!(outcome.status, SourceStatus::NoNewData));
        assert_eq!(outcome.final_state(), Done);
        assert!(harness.publisher.uploads.lock().unwrap().is_empty());
        assert_eq!(harness.watermark().await, None);
    }

    #[tokio::test]
    async fn test_batch_continues_past_failures() {
        let harness = Harness::new();
        let sources: Vec<Arc<dyn SourceAdapter>> = vec![
            Arc::new(StubSource {
                fail: true,
                ..StubSource::new(items())
            }),
            Arc::new(StubSource::new(items())),
        ];

        let report = harness
            .runner(ymd(2024, 6, 10), RunMode::Full)
            .run_all(&sources)
            .await;

        assert_eq!(report.outcomes.len(), 2);
        assert!(report.has_failures());
        assert_eq!(report.failed().count(), 1);
        assert!(matches!(report.outcomes[1].status, SourceStatus::Published { .. }));
    }

    #[test]
    fn test_state_names() {
        assert_eq!(ResolvingRange.to_string(), "RESOLVING_RANGE");
        assert_eq!(serde_json::to_value(Done).unwrap(), json!("DONE"));
    }
}
