//! Central bank liquidity swap operations

use super::operations::{DateStyle, Endpoint, Field, Flatten, OperationsSource};
use super::ymd;
use crate::table::ColumnType::{Bool, Date, Double, Int32, String as Text, Timestamp};

pub fn source() -> OperationsSource {
    OperationsSource {
        id: "fx_swaps",
        dataset_id: "nyf_fx_swaps",
        title: "New York Fed Foreign Exchange Swaps",
        description: "Foreign exchange swap operations conducted by the New York Fed, including central bank liquidity swap arrangements.",
        endpoints: vec![Endpoint::new("fxs/all/search.json", "/fxSwaps/operations")],
        epoch: ymd(2020, 1, 1),
        publication_lag_days: 0,
        status: None,
        flatten: Flatten::Flat,
        dates: DateStyle::Strict,
        fields: vec![
            Field::parent("trade_date", Date, "tradeDate").describe("Date the swap was traded"),
            Field::parent("settlement_date", Date, "settlementDate").describe("Settlement date of the swap"),
            Field::parent("maturity_date", Date, "maturityDate").describe("Maturity date of the swap"),
            Field::parent("operation_type", Text, "operationType").describe("Type of FX swap operation"),
            Field::parent("counterparty", Text, "counterparty").describe("Counterparty central bank"),
            Field::parent("currency", Text, "currency").describe("Currency of the swap"),
            Field::parent("term_days", Int32, "termInDays").describe("Term of the swap in days"),
            Field::parent("amount", Double, "amount").describe("Amount of the swap"),
            Field::parent("interest_rate", Double, "interestRate").describe("Interest rate on the swap"),
            Field::parent("is_small_value", Bool, "isSmallValue")
                .describe("Flag indicating small value operation"),
            Field::parent("last_updated", Timestamp, "lastUpdated").describe("Last update timestamp"),
        ],
        filters: vec![],
        watermark_column: "trade_date",
        not_null: vec!["trade_date", "currency"],
        min_rows: 5,
        domains: vec![],
    }
}
