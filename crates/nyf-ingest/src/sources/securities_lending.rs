//! SOMA securities lending operations

use super::operations::{DateStyle, Endpoint, Field, Flatten, OperationsSource};
use super::ymd;
use crate::table::ColumnType::{Date, Double, String as Text};

pub fn source() -> OperationsSource {
    OperationsSource {
        id: "securities_lending",
        dataset_id: "nyf_securities_lending",
        title: "New York Fed Securities Lending Operations",
        description: "Securities lending operations from the New York Fed's SOMA portfolio, providing liquidity in Treasury securities markets.",
        endpoints: vec![Endpoint::new(
            "seclending/all/results/details/search.json",
            "/seclending/operations",
        )],
        epoch: ymd(2020, 1, 1),
        publication_lag_days: 0,
        status: Some(("auctionStatus", "Results")),
        flatten: Flatten::Details {
            key: "details",
            aggregate: false,
        },
        dates: DateStyle::Strict,
        fields: vec![
            Field::parent("operation_date", Date, "operationDate").describe("Date of the operation"),
            Field::parent("operation_id", Text, "operationId").describe("Unique operation identifier"),
            Field::parent("settlement_date", Date, "settlementDate").describe("Settlement date"),
            Field::parent("maturity_date", Date, "maturityDate").describe("Maturity date of the loan"),
            Field::detail("cusip", Text, "cusip").describe("CUSIP identifier of the security"),
            Field::detail("security_description", Text, "securityDescription")
                .describe("Description of the security"),
            Field::detail("par_amount_submitted", Double, "parAmtSubmitted")
                .describe("Par amount submitted by dealers"),
            Field::detail("par_amount_accepted", Double, "parAmtAccepted").describe("Par amount accepted"),
            Field::detail("weighted_average_rate", Double, "weightedAverageRate")
                .describe("Weighted average lending rate"),
            Field::detail("soma_holdings", Double, "somaHoldings")
                .describe("SOMA holdings of the security"),
            Field::detail("theoretical_available", Double, "theoAvailToBorrow")
                .describe("Theoretical amount available to borrow"),
            Field::detail("actual_available", Double, "actualAvailToBorrow")
                .describe("Actual amount available to borrow"),
            Field::detail("outstanding_loans", Double, "outstandingLoans")
                .describe("Outstanding loan amount"),
            Field::parent("release_time", Text, "releaseTime").describe("Time results were released"),
            Field::parent("close_time", Text, "closeTime").describe("Time operation closed"),
        ],
        filters: vec![],
        watermark_column: "operation_date",
        not_null: vec!["operation_date", "operation_id", "cusip"],
        min_rows: 10,
        domains: vec![],
    }
}
