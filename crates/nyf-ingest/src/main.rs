//! NYF Ingest - market operations ingestion tool

use anyhow::Result;
use clap::Parser;
use nyf_common::logging::{init_logging, LogConfig, LogLevel};
use nyf_ingest::capture::FileRawCapture;
use nyf_ingest::config::IngestConfig;
use nyf_ingest::pipeline::{PipelineRunner, RunMode, SourceStatus};
use nyf_ingest::sources::{registry, SourceAdapter};
use nyf_ingest::state::FileStateStore;
use std::sync::Arc;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "nyf-ingest")]
#[command(author, version, about = "New York Fed market operations ingestion")]
struct Cli {
    /// Fetch and capture raw payloads without publishing
    #[arg(long, conflicts_with = "transform_only")]
    ingest_only: bool,

    /// Publish the latest raw captures without fetching
    #[arg(long)]
    transform_only: bool,

    /// Restrict the run to these source ids (repeatable)
    #[arg(short, long = "source", value_name = "ID")]
    sources: Vec<String>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn mode(&self) -> RunMode {
        if self.ingest_only {
            RunMode::IngestOnly
        } else if self.transform_only {
            RunMode::TransformOnly
        } else {
            RunMode::Full
        }
    }
}

fn select_sources(requested: &[String]) -> Result<Vec<Arc<dyn SourceAdapter>>> {
    let all = registry();
    if requested.is_empty() {
        return Ok(all);
    }

    if let Some(unknown) = requested
        .iter()
        .find(|id| !all.iter().any(|s| s.id() == id.as_str()))
    {
        let known: Vec<&str> = all.iter().map(|s| s.id()).collect();
        anyhow::bail!("Unknown source '{}'; expected one of: {}", unknown, known.join(", "));
    }

    Ok(all
        .into_iter()
        .filter(|s| requested.iter().any(|id| id == s.id()))
        .collect())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Environment variables take precedence over the defaults; --verbose wins
    let mut log_config = LogConfig::builder()
        .log_file_prefix("nyf-ingest")
        .build()
        .merge_env()?;
    if cli.verbose {
        log_config.level = LogLevel::Debug;
    }
    let guard = init_logging(&log_config)?;

    let config = IngestConfig::from_env()?;
    let sources = select_sources(&cli.sources)?;
    let mode = cli.mode();

    info!(
        run_id = %config.run_id,
        mode = ?mode,
        sources = sources.len(),
        "Starting ingestion"
    );

    let runner = PipelineRunner::new(
        config.run_context(chrono::Local::now().date_naive()),
        config.api_client()?,
        Arc::new(FileStateStore::new(config.state_dir())),
        Arc::new(FileRawCapture::new(config.raw_dir())),
        config.publisher(),
    )
    .with_mode(mode);

    let report = runner.run_all(&sources).await;

    for outcome in &report.outcomes {
        match &outcome.status {
            SourceStatus::Published {
                rows, watermark, receipt, ..
            } => info!(
                source = %outcome.source,
                rows,
                key = %receipt.key,
                watermark = ?watermark,
                "Published"
            ),
            SourceStatus::NoNewData => info!(source = %outcome.source, "No new data"),
            SourceStatus::Captured { items } => {
                info!(source = %outcome.source, items, "Captured")
            },
            SourceStatus::Failed { during, error } => error!(
                source = %outcome.source,
                during = %during,
                error = %error,
                "Failed"
            ),
        }
    }

    if report.has_failures() {
        let failed: Vec<&str> = report.failed().map(|o| o.source.as_str()).collect();
        error!("Ingestion finished with failures: {}", failed.join(", "));
        drop(guard);
        std::process::exit(1);
    }

    info!("Ingestion complete");
    Ok(())
}
