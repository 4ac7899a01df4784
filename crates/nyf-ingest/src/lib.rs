//! NYF Ingest Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Incremental ingestion of New York Fed market-operations datasets.
//!
//! Each source is driven through the same pipeline: resolve the date range
//! after its watermark, fetch it in bounded chunks, capture the raw payload,
//! normalize to a fixed schema, validate, publish, and only then advance the
//! watermark.
//!
//! # Supported Data Sources
//!
//! - **Reference rates**: SOFR, EFFR, OBFR, TGCR, BGCR
//! - **SOMA holdings**: Treasury and Agency snapshot
//! - **Primary dealer statistics**: weekly positions and financing
//! - **Operations**: agency MBS, Treasury, securities lending, FX swaps, repo
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use nyf_ingest::capture::FileRawCapture;
//! use nyf_ingest::config::IngestConfig;
//! use nyf_ingest::pipeline::PipelineRunner;
//! use nyf_ingest::sources::registry;
//! use nyf_ingest::state::FileStateStore;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = IngestConfig::from_env()?;
//!     let runner = PipelineRunner::new(
//!         config.run_context(chrono::Local::now().date_naive()),
//!         config.api_client()?,
//!         Arc::new(FileStateStore::new(config.state_dir())),
//!         Arc::new(FileRawCapture::new(config.raw_dir())),
//!         config.publisher(),
//!     );
//!     let report = runner.run_all(&registry()).await;
//!     anyhow::ensure!(!report.has_failures(), "some sources failed");
//!     Ok(())
//! }
//! ```

pub mod capture;
pub mod config;
pub mod error;
pub mod fetch;
pub mod normalize;
pub mod pipeline;
pub mod publish;
pub mod range;
pub mod sources;
pub mod state;
pub mod table;
pub mod validate;

pub use error::{IngestError, Result};
