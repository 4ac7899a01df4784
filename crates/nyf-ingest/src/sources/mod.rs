//! Source adapters
//!
//! Each dataset is described by a [`SourceAdapter`]: where its data comes
//! from, how raw items become rows, and what the resulting table must look
//! like. Six date-ranged operation feeds share the declarative
//! [`operations::OperationsSource`]; SOMA holdings and primary dealer
//! statistics have hand-written adapters.

use async_trait::async_trait;
use chrono::{Duration, NaiveDate};
use serde_json::Value as Json;
use std::sync::Arc;

use crate::capture::RawPayload;
use crate::error::Result;
use crate::fetch::{ApiClient, ChunkedRangeFetcher};
use crate::publish::DatasetMetadata;
use crate::range::DateRange;
use crate::state::{Cadence, Watermark};
use crate::table::{Record, Schema};
use crate::validate::ValidationSpec;

pub mod ambs;
pub mod fx_swaps;
pub mod operations;
pub mod primary_dealer;
pub mod reference_rates;
pub mod repo;
pub mod securities_lending;
pub mod soma;
pub mod treasury;

/// Network collaborators handed to an adapter's fetch
#[derive(Debug, Clone)]
pub struct FetchContext {
    pub api: ApiClient,
    pub fetcher: ChunkedRangeFetcher,
}

#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Key for state and raw capture
    fn id(&self) -> &str;

    /// Key for published output
    fn dataset_id(&self) -> &str;

    fn cadence(&self) -> Cadence {
        Cadence::Daily
    }

    /// First date fetched when there is no watermark
    fn epoch(&self) -> NaiveDate;

    /// Days between an observation and its publication
    fn publication_lag_days(&self) -> i64 {
        0
    }

    /// Date column whose maximum becomes the next watermark
    fn watermark_column(&self) -> &str;

    fn schema(&self) -> Schema;

    fn validation(&self) -> ValidationSpec;

    fn metadata(&self) -> DatasetMetadata;

    /// `[last + 1, today - lag]`, or `None` when that is empty
    fn resolve_range(&self, watermark: &Watermark, today: NaiveDate) -> Option<DateRange> {
        let start = match watermark.last_processed {
            Some(last) => last.succ_opt()?,
            None => self.epoch(),
        };
        let end = today.checked_sub_signed(Duration::days(self.publication_lag_days()))?;
        DateRange::new(start, end)
    }

    async fn fetch(&self, ctx: &FetchContext, range: DateRange) -> Result<Vec<Json>>;

    /// Deterministic mapping from a capture to rows
    fn normalize(&self, payload: &RawPayload) -> Vec<Record>;
}

/// All adapters, in publication order
pub fn registry() -> Vec<Arc<dyn SourceAdapter>> {
    vec![
        Arc::new(reference_rates::source()),
        Arc::new(soma::SomaHoldings),
        Arc::new(primary_dealer::PrimaryDealerStats),
        Arc::new(ambs::source()),
        Arc::new(treasury::source()),
        Arc::new(securities_lending::source()),
        Arc::new(fx_swaps::source()),
        Arc::new(repo::source()),
    ]
}

pub(crate) fn ymd(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).unwrap_or_default()
}
