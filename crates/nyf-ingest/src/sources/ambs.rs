//! Agency MBS operations

use super::operations::{DateStyle, Endpoint, Field, Flatten, OnAggregate, OperationsSource};
use super::ymd;
use crate::table::ColumnType::{Date, Double, String as Text};

pub fn source() -> OperationsSource {
    OperationsSource {
        id: "ambs_operations",
        dataset_id: "nyf_ambs_operations",
        title: "New York Fed Agency MBS Operations",
        description: "Agency mortgage-backed securities (MBS) operations conducted by the New York Fed Open Market Trading Desk.",
        endpoints: vec![Endpoint::new(
            "ambs/all/results/details/search.json",
            "/ambs/auctions",
        )],
        epoch: ymd(2020, 1, 1),
        publication_lag_days: 0,
        status: Some(("auctionStatus", "Results")),
        flatten: Flatten::Details {
            key: "details",
            aggregate: true,
        },
        dates: DateStyle::Strict,
        fields: vec![
            Field::parent("operation_date", Date, "operationDate").describe("Date of the operation"),
            Field::parent("operation_id", Text, "operationId").describe("Unique operation identifier"),
            Field::parent("operation_type", Text, "operationType").describe("Type of MBS operation"),
            Field::parent("operation_direction", Text, "operationDirection")
                .describe("Direction of operation (buy/sell)"),
            Field::parent("settlement_date", Date, "settlementDate").describe("Settlement date"),
            Field::detail("security_description", Text, "securityDescription")
                .aggregate(OnAggregate::Label("Aggregate"))
                .describe("Description of the MBS security"),
            Field::parent("class_type", Text, "classType").describe("MBS class type"),
            Field::parent("method", Text, "method").describe("Auction method"),
            Field::parent("amount_submitted_par", Double, "totalAmtSubmittedPar")
                .describe("Total par amount submitted"),
            Field::detail("amount_accepted_par", Double, "amtAcceptedPar")
                .aggregate(OnAggregate::Parent("totalAmtAcceptedPar"))
                .describe("Par amount accepted"),
            Field::parent("release_time", Text, "releaseTime").describe("Time results were released"),
            Field::parent("close_time", Text, "closeTime").describe("Time operation closed"),
            Field::detail("inclusion_flag", Text, "inclusionExclusionFlag")
                .describe("Inclusion/exclusion flag"),
        ],
        filters: vec![],
        watermark_column: "operation_date",
        not_null: vec!["operation_date", "operation_id"],
        min_rows: 10,
        domains: vec![],
    }
}
