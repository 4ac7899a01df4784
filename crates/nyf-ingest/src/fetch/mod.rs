//! Upstream access: HTTP client, retry policy and range chunking

pub mod chunked;
pub mod client;
pub mod retry;

pub use chunked::{ChunkedRangeFetcher, DEFAULT_MAX_CHUNK_DAYS};
pub use client::ApiClient;
pub use retry::RetryPolicy;
