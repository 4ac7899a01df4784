//! Treasury securities purchase and sale operations

use super::operations::{DateStyle, Endpoint, Field, Flatten, OperationsSource, RowFilter};
use super::ymd;
use crate::table::ColumnType::{Date, Double, String as Text};

pub fn source() -> OperationsSource {
    OperationsSource {
        id: "treasury_operations",
        dataset_id: "nyf_treasury_operations",
        title: "New York Fed Treasury Securities Operations",
        description: "Treasury securities purchase and sale operations conducted by the New York Fed Open Market Trading Desk.",
        endpoints: vec![Endpoint::new(
            "tsy/all/results/details/search.json",
            "/treasury/auctions",
        )],
        epoch: ymd(2020, 1, 1),
        publication_lag_days: 0,
        status: Some(("auctionStatus", "Results")),
        // Only securities that were actually bought or sold
        flatten: Flatten::Details {
            key: "details",
            aggregate: false,
        },
        dates: DateStyle::Lenient,
        fields: vec![
            Field::parent("operation_date", Date, "operationDate").describe("Date of the operation"),
            Field::parent("operation_id", Text, "operationId").describe("Unique operation identifier"),
            Field::parent("operation_type", Text, "operationType").describe("Type of operation"),
            Field::parent("operation_direction", Text, "operationDirection")
                .describe("Direction of operation (buy/sell)"),
            Field::parent("settlement_date", Date, "settlementDate").describe("Settlement date"),
            Field::detail("cusip", Text, "cusip").describe("CUSIP identifier"),
            Field::detail("security_description", Text, "securityDescription")
                .describe("Description of the security"),
            Field::parent("maturity_date_start", Date, "maturityRangeStart")
                .describe("Start of maturity range"),
            Field::parent("maturity_date_end", Date, "maturityRangeEnd").describe("End of maturity range"),
            Field::parent("auction_method", Text, "auctionMethod").describe("Auction method used"),
            Field::parent("par_amount_submitted", Double, "totalParAmtSubmitted")
                .describe("Total par amount submitted"),
            Field::detail("par_amount_accepted", Double, "parAmountAccepted")
                .describe("Par amount accepted"),
            Field::detail("weighted_avg_price", Double, "weightedAvgAccptPrice")
                .describe("Weighted average accepted price"),
            Field::detail("least_favorable_price", Double, "leastFavoriteAccptPrice")
                .describe("Least favorable accepted price"),
            Field::parent("release_time", Text, "releaseTime").describe("Time results were released"),
            Field::parent("close_time", Text, "closeTime").describe("Time operation closed"),
        ],
        filters: vec![RowFilter::NonZero("par_amount_accepted")],
        watermark_column: "operation_date",
        not_null: vec!["operation_date", "operation_id", "par_amount_accepted"],
        min_rows: 10,
        domains: vec![],
    }
}
