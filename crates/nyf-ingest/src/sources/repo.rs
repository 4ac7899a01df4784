//! Repo and reverse repo operations

use super::operations::{DateStyle, Endpoint, Field, Flatten, OnAggregate, OperationsSource};
use super::ymd;
use crate::table::ColumnType::{Date, Double, Int32, String as Text};

pub fn source() -> OperationsSource {
    OperationsSource {
        id: "repo_operations",
        dataset_id: "nyf_repo_operations",
        title: "New York Fed Repo Operations",
        description: "Repurchase agreement (repo) and reverse repo operations conducted by the New York Fed Open Market Trading Desk.",
        endpoints: vec![Endpoint::new("rp/all/all/results/search.json", "/repo/operations")],
        epoch: ymd(2020, 1, 1),
        publication_lag_days: 0,
        status: Some(("auctionStatus", "Results")),
        flatten: Flatten::Details {
            key: "details",
            aggregate: true,
        },
        dates: DateStyle::Lenient,
        fields: vec![
            Field::parent("operation_date", Date, "operationDate").describe("Date of the operation"),
            Field::parent("operation_id", Text, "operationId").describe("Unique operation identifier"),
            Field::parent("operation_type", Text, "operationType")
                .describe("Type of operation (repo, reverse repo)"),
            Field::parent("operation_method", Text, "operationMethod").describe("Method used for operation"),
            Field::parent("settlement_date", Date, "settlementDate").describe("Settlement date"),
            Field::parent("maturity_date", Date, "maturityDate").describe("Maturity date of the operation"),
            Field::parent("term", Text, "term").describe("Term description"),
            // Upstream spells it "Calender"
            Field::parent("term_calendar_days", Int32, "termCalenderDays")
                .describe("Term length in calendar days"),
            Field::parent("settlement_type", Text, "settlementType").describe("Type of settlement"),
            Field::detail("security_type", Text, "securityType")
                .aggregate(OnAggregate::Label("Aggregate"))
                .describe("Type of security accepted"),
            Field::detail("amount_submitted", Double, "amtSubmitted")
                .aggregate(OnAggregate::Parent("totalAmtSubmitted"))
                .describe("Amount submitted by counterparties"),
            Field::detail("amount_accepted", Double, "amtAccepted")
                .aggregate(OnAggregate::Parent("totalAmtAccepted"))
                .describe("Amount accepted by Fed"),
            Field::parent("total_amount_submitted", Double, "totalAmtSubmitted")
                .describe("Total amount submitted across all security types"),
            Field::parent("total_amount_accepted", Double, "totalAmtAccepted")
                .describe("Total amount accepted across all security types"),
            Field::parent("participating_counterparties", Int32, "participatingCpty")
                .describe("Number of participating counterparties"),
            Field::parent("accepted_counterparties", Int32, "acceptedCpty")
                .describe("Number of accepted counterparties"),
            Field::detail("offering_rate", Double, "percentOfferingRate").describe("Offered rate (percent)"),
            Field::detail("award_rate", Double, "percentAwardRate").describe("Award rate (percent)"),
            Field::detail("weighted_average_rate", Double, "percentWeightedAverageRate")
                .describe("Weighted average rate (percent)"),
            Field::detail("minimum_bid_rate", Double, "minimumBidRate").describe("Minimum bid rate"),
            Field::detail("maximum_bid_rate", Double, "maximumBidRate").describe("Maximum bid rate"),
            Field::parent("release_time", Text, "releaseTime").describe("Time results were released"),
            Field::parent("close_time", Text, "closeTime").describe("Time operation closed"),
        ],
        filters: vec![],
        watermark_column: "operation_date",
        not_null: vec!["operation_date", "operation_id"],
        min_rows: 10,
        domains: vec![],
    }
}
