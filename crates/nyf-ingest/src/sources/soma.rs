//! SOMA holdings snapshot
//!
//! The summary endpoint names the latest as-of date; Treasury and Agency
//! holdings for that date are fetched and captured as a single item. A
//! snapshot dated inside the resolved range is new; anything older has
//! already been published.

use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::{json, Value as Json};
use tracing::info;

use super::{ymd, FetchContext, SourceAdapter};
use crate::capture::RawPayload;
use crate::error::Result;
use crate::normalize::parse::{json_date_lenient, json_number, json_string};
use crate::publish::DatasetMetadata;
use crate::range::{DateRange, DATE_FORMAT};
use crate::table::{Column, ColumnType, Record, Schema};
use crate::validate::ValidationSpec;

const SUMMARY_PATH: &str = "soma/summary.json";

const COLUMNS: &[(&str, ColumnType, &str)] = &[
    ("as_of_date", ColumnType::Date, "Date of holdings snapshot"),
    ("security_type", ColumnType::String, "Type of security (Treasury Bill, Note, Bond, Agency)"),
    ("cusip", ColumnType::String, "CUSIP identifier"),
    ("security_description", ColumnType::String, "Description of the security"),
    ("maturity_date", ColumnType::Date, "Maturity date of the security"),
    ("issuer", ColumnType::String, "Security issuer"),
    ("coupon_rate", ColumnType::Double, "Coupon rate (percent)"),
    ("par_value", ColumnType::Double, "Par value held"),
    ("percent_outstanding", ColumnType::Double, "Percent of total outstanding held by SOMA"),
    ("change_from_prior_week", ColumnType::Double, "Change in holdings from prior week"),
    ("change_from_prior_year", ColumnType::Double, "Change in holdings from prior year"),
];

#[derive(Debug, Clone, Copy, Default)]
pub struct SomaHoldings;

/// Classify a Treasury holding from its description
pub fn treasury_security_type(description: &str) -> &'static str {
    let upper = description.to_uppercase();
    if upper.contains("BILL") {
        "Treasury Bill"
    } else if upper.contains("NOTE") {
        "Treasury Note"
    } else if upper.contains("BOND") {
        "Treasury Bond"
    } else if upper.contains("TIPS") {
        "Treasury Inflation-Protected"
    } else if upper.contains("FRN") {
        "Floating Rate Note"
    } else {
        "Treasury Security"
    }
}

fn holdings(body: &Json) -> Vec<Json> {
    body.pointer("/soma/holdings")
        .and_then(Json::as_array)
        .cloned()
        .unwrap_or_default()
}

fn holding_row(as_of: NaiveDate, holding: &Json, security_type: &str, issuer: Option<String>) -> Record {
    Record::new()
        .with("as_of_date", as_of)
        .with("security_type", security_type)
        .with("cusip", json_string(holding.get("cusip")))
        .with("security_description", json_string(holding.get("securityDescription")))
        .with("maturity_date", json_date_lenient(holding.get("maturityDate")))
        .with("issuer", issuer)
        .with("coupon_rate", json_number(holding.get("couponPercent")))
        .with("par_value", json_number(holding.get("parValue")))
        .with("percent_outstanding", json_number(holding.get("percentOutstanding")))
        .with("change_from_prior_week", json_number(holding.get("changeFromPriorWeek")))
        .with("change_from_prior_year", json_number(holding.get("changeFromPriorYear")))
}

#[async_trait]
impl SourceAdapter for SomaHoldings {
    fn id(&self) -> &str {
        "soma_holdings"
    }

    fn dataset_id(&self) -> &str {
        "nyf_soma_holdings"
    }

    /// Older than any published snapshot
    fn epoch(&self) -> NaiveDate {
        ymd(2003, 1, 1)
    }

    fn watermark_column(&self) -> &str {
        "as_of_date"
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
            .not_null(["as_of_date", "security_type", "cusip"])
            .min_rows(10)
    }

    fn metadata(&self) -> DatasetMetadata {
        DatasetMetadata {
            id: self.dataset_id().to_string(),
            title: "New York Fed SOMA Holdings".to_string(),
            description: "System Open Market Account (SOMA) holdings of Treasury and Agency securities held by the Federal Reserve.".to_string(),
            column_descriptions: COLUMNS
                .iter()
                .map(|(name, _, description)| (name.to_string(), description.to_string()))
                .collect(),
        }
    }

    async fn fetch(&self, ctx: &FetchContext, range: DateRange) -> Result<Vec<Json>> {
        let retry = ctx.fetcher.retry();

        let summary = retry
            .run(SUMMARY_PATH, || ctx.api.get_json(SUMMARY_PATH, &[]))
            .await?;
        let latest = summary
            .pointer("/soma/summary")
            .and_then(Json::as_array)
            .and_then(|entries| entries.last())
            .and_then(|entry| json_date_lenient(entry.get("asOfDate")));

        let Some(as_of) = latest else {
            info!("No SOMA summary available");
            return Ok(Vec::new());
        };
        if !range.contains(as_of) {
            info!(as_of = %as_of, range = %range, "No new SOMA snapshot");
            return Ok(Vec::new());
        }

        let day = as_of.format(DATE_FORMAT).to_string();
        let treasury_path = format!("soma/tsy/get/all/asof/{}.json", day);
        let agency_path = format!("soma/agency/get/asof/{}.json", day);

        let treasury = retry
            .run(&treasury_path, || ctx.api.get_json(&treasury_path, &[]))
            .await?;
        let agency = retry
            .run(&agency_path, || ctx.api.get_json(&agency_path, &[]))
            .await?;

        Ok(vec![json!({
            "as_of_date": day,
            "treasury": holdings(&treasury),
            "agency": holdings(&agency),
        })])
    }

    fn normalize(&self, payload: &RawPayload) -> Vec<Record> {
        let range = payload.range();
        let mut rows = Vec::new();

        for snapshot in &payload.items {
            let Some(as_of) = json_date_lenient(snapshot.get("as_of_date")) else {
                continue;
            };
            if !range.contains(as_of) {
                continue;
            }

            let list = |key: &str| {
                snapshot
                    .get(key)
                    .and_then(Json::as_array)
                    .map(Vec::as_slice)
                    .unwrap_or_default()
            };

            for holding in list("treasury") {
                let description = json_string(holding.get("securityDescription")).unwrap_or_default();
                rows.push(holding_row(
                    as_of,
                    holding,
                    treasury_security_type(&description),
                    Some("U.S. Treasury".to_string()),
                ));
            }
            for holding in list("agency") {
                rows.push(holding_row(
                    as_of,
                    holding,
                    "Agency Debt",
                    json_string(holding.get("issuer")),
                ));
            }
        }

        rows
    }
}
