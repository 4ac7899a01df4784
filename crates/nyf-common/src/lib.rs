//! NYF Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared utilities for the NYF connector workspace.
//!
//! - **Logging**: tracing subscriber bootstrap (console, rolling file, JSON)
//! - **Checksums**: content digests recorded for published artifacts
//!
//! # Example
//!
//! ```no_run
//! use nyf_common::checksum::sha256_hex;
//! use nyf_common::logging::{init_logging, LogConfig};
//!
//! fn main() -> anyhow::Result<()> {
//!     let _guard = init_logging(&LogConfig::from_env()?)?;
//!     tracing::info!(digest = %sha256_hex(b"payload"), "computed digest");
//!     Ok(())
//! }
//! ```

pub mod checksum;
pub mod logging;
