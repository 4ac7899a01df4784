//! Overnight reference rates (unsecured and secured)

use super::operations::{DateStyle, Endpoint, Field, Flatten, OperationsSource, RowFilter};
use super::ymd;
use crate::table::ColumnType::{Date, Double, String as Text};
use crate::validate::Domain;

pub const RATE_TYPES: &[&str] = &["EFFR", "OBFR", "SOFR", "BGCR", "TGCR"];

pub fn source() -> OperationsSource {
    OperationsSource {
        id: "reference_rates",
        dataset_id: "nyf_reference_rates",
        title: "New York Fed Reference Rates",
        description: "Daily reference rates published by the New York Fed including SOFR, EFFR, OBFR, and other secured/unsecured overnight rates.",
        endpoints: vec![
            Endpoint::new("rates/all/search.json", "/refRates"),
            Endpoint::new("rates/secured/all/search.json", "/refRates"),
        ],
        // SOFR's first publication
        epoch: ymd(2018, 4, 3),
        publication_lag_days: 1,
        status: None,
        flatten: Flatten::Flat,
        dates: DateStyle::Strict,
        fields: vec![
            Field::parent("date", Date, "effectiveDate")
                .required()
                .describe("Effective date of the rate"),
            Field::parent("rate_type", Text, "type")
                .required()
                .describe("Type of rate (SOFR, EFFR, OBFR, BGCR, TGCR)"),
            Field::parent("percentile_1", Double, "percentPercentile1").describe("1st percentile rate"),
            Field::parent("percentile_25", Double, "percentPercentile25").describe("25th percentile rate"),
            Field::parent("percentile_75", Double, "percentPercentile75").describe("75th percentile rate"),
            Field::parent("percentile_99", Double, "percentPercentile99").describe("99th percentile rate"),
            Field::parent("rate", Double, "percentRate")
                .required()
                .describe("Published rate (percent)"),
            Field::parent("volume_billions", Double, "volumeInBillions")
                .describe("Trading volume in billions USD"),
            Field::parent("target_rate_from", Double, "targetRateFrom")
                .describe("Lower bound of target rate range"),
            Field::parent("target_rate_to", Double, "targetRateTo")
                .describe("Upper bound of target rate range"),
        ],
        filters: vec![RowFilter::OneOf("rate_type", RATE_TYPES)],
        watermark_column: "date",
        not_null: vec!["date", "rate_type", "rate"],
        min_rows: 10,
        domains: vec![
            ("rate", Domain::range(-1.0, 20.0)),
            ("rate_type", Domain::one_of(RATE_TYPES.iter().copied())),
        ],
    }
}
