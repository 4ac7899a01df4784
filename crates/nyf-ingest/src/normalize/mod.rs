//! Raw capture to typed table
//!
//! Adapters map raw items to records; this module turns those records into
//! the dataset's [`Table`]. Rows with a null in a non-nullable schema column
//! cannot be represented and are dropped here, counted and logged, so a
//! single malformed upstream field never aborts a whole run.

use tracing::{info, warn};

use crate::capture::RawPayload;
use crate::sources::SourceAdapter;
use crate::table::{Record, Schema, Table};

pub mod parse;

#[derive(Debug, Clone, PartialEq)]
pub struct Normalized {
    pub table: Table,
    /// Rows removed for violating a non-nullable column
    pub dropped: usize,
}

/// Build the table for a capture
pub fn normalize(source: &dyn SourceAdapter, payload: &RawPayload) -> Normalized {
    let records = source.normalize(payload);
    let produced = records.len();
    let normalized = build_table(source.schema(), records);

    if normalized.dropped > 0 {
        warn!(
            source = %source.id(),
            dropped = normalized.dropped,
            "Dropped rows with null required columns"
        );
    }
    info!(
        source = %source.id(),
        items = payload.items.len(),
        rows = produced - normalized.dropped,
        "Normalized capture"
    );

    normalized
}

/// Keep records that satisfy every non-nullable column of `schema`
pub fn build_table(schema: Schema, records: Vec<Record>) -> Normalized {
    let required: Vec<String> = schema.non_nullable().map(|c| c.name.clone()).collect();
    let total = records.len();

    let rows: Vec<Record> = records
        .into_iter()
        .filter(|record| required.iter().all(|column| !record.get(column).is_null()))
        .collect();

    Normalized {
        dropped: total - rows.len(),
        table: Table::new(schema, rows),
    }
}
