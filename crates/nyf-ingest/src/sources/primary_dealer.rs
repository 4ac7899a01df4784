//! Weekly primary dealer statistics
//!
//! Each series is a small CSV served from its own endpoint. All series are
//! requested concurrently; one that fails contributes no rows instead of
//! failing the whole source.

use async_trait::async_trait;
use chrono::NaiveDate;
use futures::future::join_all;
use serde_json::{json, Value as Json};
use tracing::{debug, warn};

use super::{ymd, FetchContext, SourceAdapter};
use crate::capture::RawPayload;
use crate::error::{IngestError, Result};
use crate::normalize::parse::{json_date, json_number, json_string};
use crate::publish::DatasetMetadata;
use crate::range::DateRange;
use crate::state::Cadence;
use crate::table::{Column, ColumnType, Record, Schema};
use crate::validate::{Domain, ValidationSpec};

/// Reported values are in millions of USD
const MILLIONS_PER_BILLION: f64 = 1000.0;

pub const ASSET_TYPES: &[&str] = &["Treasury", "Agency", "MBS", "Corporate", "Other"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Series {
    pub code: &'static str,
    pub name: &'static str,
    pub asset_type: &'static str,
    pub position_type: Option<&'static str>,
    pub maturity_bucket: Option<&'static str>,
}

const fn series(
    code: &'static str,
    name: &'static str,
    asset_type: &'static str,
    position_type: Option<&'static str>,
    maturity_bucket: Option<&'static str>,
) -> Series {
    Series {
        code,
        name,
        asset_type,
        position_type,
        maturity_bucket,
    }
}

pub const SERIES: &[Series] = &[
    series("PDPOSGS", "Net Positions in U.S. Treasury Securities", "Treasury", Some("Net"), None),
    series(
        "PDPOSGSDS",
        "Net Positions in U.S. Treasury Securities (≤3 years)",
        "Treasury",
        Some("Net"),
        Some("3 years or less"),
    ),
    series(
        "PDPOSGSDL",
        "Net Positions in U.S. Treasury Securities (>6 years)",
        "Treasury",
        Some("Net"),
        Some("6+ years"),
    ),
    series(
        "PDPOSGSDI",
        "Net Positions in U.S. Treasury Securities (3-6 years)",
        "Treasury",
        Some("Net"),
        Some("3-6 years"),
    ),
    series("PDPOSFF", "Net Positions in Agency Securities", "Agency", Some("Net"), None),
    series("PDPOSMBS", "Net Positions in Agency MBS", "MBS", Some("Net"), None),
    series("PDPOSCD", "Positions in Corporate Debt", "Corporate", Some("Long"), None),
    series("PDSOOS", "Securities Sold, Not Yet Purchased", "Treasury", Some("Short"), None),
    series("PDFINRP", "Securities Purchased Under Repo", "Treasury", None, None),
    series("PDFINRR", "Securities Sold Under Repo", "Treasury", None, None),
];

pub fn lookup(code: &str) -> Option<&'static Series> {
    SERIES.iter().find(|s| s.code == code)
}

const COLUMNS: &[(&str, ColumnType, &str)] = &[
    ("week_ending", ColumnType::Date, "Week ending date"),
    ("series_name", ColumnType::String, "Name of the data series"),
    ("series_code", ColumnType::String, "Series code identifier"),
    ("asset_type", ColumnType::String, "Type of asset (Treasury, Agency, MBS, Corporate)"),
    ("maturity_bucket", ColumnType::String, "Maturity range for positions"),
    ("position_type", ColumnType::String, "Type of position (Net, Long, Short)"),
    ("value_billions", ColumnType::Double, "Value in billions USD"),
];

#[derive(Debug, Clone, Copy, Default)]
pub struct PrimaryDealerStats;

/// Rows of a series CSV as `{series_code, as_of_date, value}` items
pub fn parse_series_csv(code: &str, body: &str) -> Result<Vec<Json>> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(body.as_bytes());

    let headers = reader
        .headers()
        .map_err(|e| IngestError::fetch(format!("{}: unreadable CSV header: {}", code, e)))?
        .clone();
    let (Some(date_idx), Some(value_idx)) = (
        headers.iter().position(|h| h == "As Of Date"),
        headers.iter().position(|h| h == "Value"),
    ) else {
        return Err(IngestError::fetch(format!(
            "{}: CSV lacks 'As Of Date' or 'Value' column",
            code
        )));
    };

    let mut items = Vec::new();
    for row in reader.records() {
        let row = row.map_err(|e| IngestError::fetch(format!("{}: malformed CSV row: {}", code, e)))?;
        items.push(json!({
            "series_code": code,
            "as_of_date": row.get(date_idx),
            "value": row.get(value_idx),
        }));
    }
    Ok(items)
}

#[async_trait]
impl SourceAdapter for PrimaryDealerStats {
    fn id(&self) -> &str {
        "primary_dealer_stats"
    }

    fn dataset_id(&self) -> &str {
        "nyf_primary_dealer_stats"
    }

    fn cadence(&self) -> Cadence {
        Cadence::Weekly
    }

    /// Older than any published week
    fn epoch(&self) -> NaiveDate {
        ymd(1990, 1, 1)
    }

    fn watermark_column(&self) -> &str {
        "week_ending"
    }

    fn schema(&self) -> Schema {
        Schema::new(
            COLUMNS
                .iter()
                .map(|(name, column_type, _)| Column::new(*name, *column_type))
                .collect(),
        )
    }

    fn validation(&self) -> ValidationSpec {
        ValidationSpec::for_schema(&self.schema())
            .not_null(["week_ending", "series_code", "asset_type"])
            .min_rows(10)
            .domain("asset_type", Domain::one_of(ASSET_TYPES.iter().copied()))
    }

    fn metadata(&self) -> DatasetMetadata {
        DatasetMetadata {
            id: self.dataset_id().to_string(),
            title: "New York Fed Primary Dealer Statistics".to_string(),
            description: "Weekly statistics on primary dealer positions and financing from the New York Fed. Covers Treasury, Agency, MBS, and corporate securities.".to_string(),
            column_descriptions: COLUMNS
                .iter()
                .map(|(name, _, description)| (name.to_string(), description.to_string()))
                .collect(),
        }
    }

    /// Only the latest release is served; the range is applied in normalize
    async fn fetch(&self, ctx: &FetchContext, _range: DateRange) -> Result<Vec<Json>> {
        let retry = ctx.fetcher.retry();

        let requests = SERIES.iter().map(|series| async move {
            let path = format!("pd/latest/{}.csv", series.code);
            let result = retry
                .run(&path, || ctx.api.get_text(&path, &[]))
                .await
                .and_then(|body| parse_series_csv(series.code, &body));
            match result {
                Ok(items) => {
                    debug!(series = series.code, rows = items.len(), "Fetched series");
                    items
                },
                Err(e) => {
                    warn!(series = series.code, error = %e, "Series fetch failed, skipping");
                    Vec::new()
                },
            }
        });

        Ok(join_all(requests).await.into_iter().flatten().collect())
    }

    fn normalize(&self, payload: &RawPayload) -> Vec<Record> {
        let start = payload.range().start();

        payload
            .items
            .iter()
            .filter_map(|item| {
                let code = json_string(item.get("series_code"))?;
                let week = json_date(item.get("as_of_date")).filter(|w| *w >= start)?;
                let info = lookup(&code);

                Some(
                    Record::new()
                        .with("week_ending", week)
                        .with("series_name", info.map_or(code.as_str(), |s| s.name))
                        .with("series_code", code.as_str())
                        .with("asset_type", info.map_or("Other", |s| s.asset_type))
                        .with("maturity_bucket", info.and_then(|s| s.maturity_bucket))
                        .with("position_type", info.and_then(|s| s.position_type))
                        .with(
                            "value_billions",
                            json_number(item.get("value")).map(|v| v / MILLIONS_PER_BILLION),
                        ),
                )
            })
            .collect()
    }
}
