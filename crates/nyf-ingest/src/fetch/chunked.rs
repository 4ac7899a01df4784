//! Bounded, sequential walk over a date range

use chrono::Duration as Days;
use std::future::Future;
use tracing::{debug, info};

use super::retry::RetryPolicy;
use crate::error::Result;
use crate::range::DateRange;

/// Upstream endpoints reject wider windows
pub const DEFAULT_MAX_CHUNK_DAYS: u32 = 90;

#[derive(Debug, Clone)]
pub struct ChunkedRangeFetcher {
    max_span_days: u32,
    retry: RetryPolicy,
}

impl Default for ChunkedRangeFetcher {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_CHUNK_DAYS, RetryPolicy::default())
    }
}

impl ChunkedRangeFetcher {
    /// A zero span is treated as one day
    pub fn new(max_span_days: u32, retry: RetryPolicy) -> Self {
        Self {
            max_span_days: max_span_days.max(1),
            retry,
        }
    }

    pub fn retry(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Contiguous, non-overlapping chunks covering `range` in ascending order
    pub fn chunks(&self, range: DateRange) -> Vec<DateRange> {
        let span = Days::days(i64::from(self.max_span_days) - 1);
        let mut chunks = Vec::new();
        let mut start = range.start();

        while start <= range.end() {
            let end = (start + span).min(range.end());
            chunks.extend(DateRange::new(start, end));
            match end.succ_opt() {
                Some(next) => start = next,
                None => break,
            }
        }

        chunks
    }

    /// Fetch every chunk in order, retrying each per the policy. The first
    /// chunk that ultimately fails aborts the walk; nothing partial is
    /// returned.
    pub async fn fetch<T, F, Fut>(&self, range: DateRange, mut fetch_chunk: F) -> Result<Vec<T>>
    where
        F: FnMut(DateRange) -> Fut,
        Fut: Future<Output = Result<Vec<T>>>,
    {
        let chunks = self.chunks(range);
        info!(range = %range, chunks = chunks.len(), "Fetching date range");

        let mut items = Vec::new();
        for chunk in chunks {
            let label = format!("chunk {}", chunk);
            let batch = self.retry.run(&label, || fetch_chunk(chunk)).await?;
            debug!(chunk = %chunk, items = batch.len(), "Fetched chunk");
            items.extend(batch);
        }

        Ok(items)
    }
}
