//! Declarative adapter for date-ranged operation feeds
//!
//! An [`OperationsSource`] is a table of facts: the endpoints to query per
//! chunk, where the item array sits in each response, which items count as
//! final, how nested details are flattened and how each output column is
//! read. The fetch and normalize logic below is shared by every feed.

use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::Value as Json;
use std::collections::BTreeMap;
use tracing::debug;

use super::{FetchContext, SourceAdapter};
use crate::capture::RawPayload;
use crate::error::{IngestError, Result};
use crate::fetch::ApiClient;
use crate::normalize::parse::{
    json_bool, json_date, json_date_lenient, json_integer, json_number, json_string,
    json_timestamp,
};
use crate::publish::DatasetMetadata;
use crate::range::DateRange;
use crate::table::{Column, ColumnType, Record, Schema, Value};
use crate::validate::{Domain, ValidationSpec};

/// Endpoint path plus a JSON pointer to the item array in its response
#[derive(Debug, Clone, Copy)]
pub struct Endpoint {
    pub path: &'static str,
    pub items: &'static str,
}

impl Endpoint {
    pub const fn new(path: &'static str, items: &'static str) -> Self {
        Self { path, items }
    }

    /// Missing item array means no data; anything other than an array is a
    /// malformed response.
    pub fn extract(&self, body: &Json) -> Result<Vec<Json>> {
        match body.pointer(self.items) {
            None | Some(Json::Null) => Ok(Vec::new()),
            Some(Json::Array(items)) => Ok(items.clone()),
            Some(other) => Err(IngestError::fetch(format!(
                "{}: expected an array at {}, found {}",
                self.path,
                self.items,
                json_kind(other)
            ))),
        }
    }
}

fn json_kind(value: &Json) -> &'static str {
    match value {
        Json::Null => "null",
        Json::Bool(_) => "bool",
        Json::Number(_) => "number",
        Json::String(_) => "string",
        Json::Array(_) => "array",
        Json::Object(_) => "object",
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateStyle {
    /// `YYYY-MM-DD` only
    Strict,
    /// `YYYY-MM-DD` or `MM/DD/YYYY`
    Lenient,
}

/// Where a column's value is read from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// The operation itself
    Parent(&'static str),
    /// One element of the operation's detail list
    Detail(&'static str),
}

/// Value a column takes on a synthesized aggregate row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnAggregate {
    /// Parent-scoped columns keep their value, detail-scoped ones are null
    Inherit,
    Label(&'static str),
    Parent(&'static str),
}

#[derive(Debug, Clone)]
pub struct Field {
    pub column: &'static str,
    pub column_type: ColumnType,
    pub scope: Scope,
    pub on_aggregate: OnAggregate,
    pub required: bool,
    pub description: &'static str,
}

impl Field {
    pub const fn parent(column: &'static str, column_type: ColumnType, key: &'static str) -> Self {
        Self {
            column,
            column_type,
            scope: Scope::Parent(key),
            on_aggregate: OnAggregate::Inherit,
            required: false,
            description: "",
        }
    }

    pub const fn detail(column: &'static str, column_type: ColumnType, key: &'static str) -> Self {
        Self {
            scope: Scope::Detail(key),
            ..Self::parent(column, column_type, key)
        }
    }

    /// Non-nullable schema column
    pub const fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub const fn aggregate(mut self, on_aggregate: OnAggregate) -> Self {
        self.on_aggregate = on_aggregate;
        self
    }

    pub const fn describe(mut self, description: &'static str) -> Self {
        self.description = description;
        self
    }

    fn read(&self, item: &Json, detail: Option<&Json>, dates: DateStyle) -> Value {
        let raw = match (self.scope, detail) {
            (Scope::Parent(key), _) => item.get(key),
            (Scope::Detail(key), Some(detail)) => detail.get(key),
            (Scope::Detail(_), None) => match self.on_aggregate {
                OnAggregate::Label(label) => return Value::from(label),
                OnAggregate::Parent(key) => item.get(key),
                OnAggregate::Inherit => return Value::Null,
            },
        };
        convert(self.column_type, raw, dates)
    }
}

fn convert(column_type: ColumnType, raw: Option<&Json>, dates: DateStyle) -> Value {
    match column_type {
        ColumnType::Date => match dates {
            DateStyle::Strict => json_date(raw).into(),
            DateStyle::Lenient => json_date_lenient(raw).into(),
        },
        ColumnType::String => json_string(raw).into(),
        ColumnType::Double => json_number(raw).into(),
        ColumnType::Int32 => json_integer(raw).into(),
        ColumnType::Bool => json_bool(raw).into(),
        ColumnType::Timestamp => json_timestamp(raw).into(),
    }
}

/// How operations map to rows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flatten {
    /// One row per item
    Flat,
    /// One row per element of `key`; operations without details produce no
    /// rows unless `aggregate` is set, in which case they produce one row
    /// carrying operation totals.
    Details { key: &'static str, aggregate: bool },
}

/// Post-mapping row filter
#[derive(Debug, Clone, Copy)]
pub enum RowFilter {
    /// Keep rows whose numeric column is present and non-zero
    NonZero(&'static str),
    /// Keep rows whose string column is one of the listed values
    OneOf(&'static str, &'static [&'static str]),
}

impl RowFilter {
    fn keep(&self, record: &Record) -> bool {
        match self {
            RowFilter::NonZero(column) => record.get(column).as_f64().is_some_and(|v| v != 0.0),
            RowFilter::OneOf(column, allowed) => record
                .get(column)
                .as_str()
                .is_some_and(|v| allowed.iter().any(|a| *a == v)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct OperationsSource {
    pub id: &'static str,
    pub dataset_id: &'static str,
    pub title: &'static str,
    pub description: &'static str,
    pub endpoints: Vec<Endpoint>,
    pub epoch: NaiveDate,
    pub publication_lag_days: i64,
    /// `(key, value)` an item must carry to be kept
    pub status: Option<(&'static str, &'static str)>,
    pub flatten: Flatten,
    pub dates: DateStyle,
    pub fields: Vec<Field>,
    pub filters: Vec<RowFilter>,
    pub watermark_column: &'static str,
    pub not_null: Vec<&'static str>,
    pub min_rows: usize,
    pub domains: Vec<(&'static str, Domain)>,
}

impl OperationsSource {
    fn is_final(&self, item: &Json) -> bool {
        match self.status {
            Some((key, expected)) => item.get(key).and_then(Json::as_str) == Some(expected),
            None => true,
        }
    }

    fn row(&self, item: &Json, detail: Option<&Json>) -> Record {
        let mut record = Record::new();
        for field in &self.fields {
            record.set(field.column, field.read(item, detail, self.dates));
        }
        record
    }

    fn rows_for(&self, item: &Json) -> Vec<Record> {
        match self.flatten {
            Flatten::Flat => vec![self.row(item, None)],
            Flatten::Details { key, aggregate } => {
                let details = item
                    .get(key)
                    .and_then(Json::as_array)
                    .map(Vec::as_slice)
                    .unwrap_or_default();
                if details.is_empty() {
                    if aggregate {
                        vec![self.row(item, None)]
                    } else {
                        Vec::new()
                    }
                } else {
                    details.iter().map(|d| self.row(item, Some(d))).collect()
                }
            },
        }
    }
}

#[async_trait]
impl SourceAdapter for OperationsSource {
    fn id(&self) -> &str {
        self.id
    }

    fn dataset_id(&self) -> &str {
        self.dataset_id
    }

    fn epoch(&self) -> NaiveDate {
        self.epoch
    }

    fn publication_lag_days(&self) -> i64 {
        self.publication_lag_days
    }

    fn watermark_column(&self) -> &str {
        self.watermark_column
    }

    fn schema(&self) -> Schema {
        Schema::new(
            self.fields
                .iter()
                .map(|f| {
                    if f.required {
                        Column::required(f.column, f.column_type)
                    } else {
                        Column::new(f.column, f.column_type)
                    }
                })
                .collect(),
        )
    }

    fn validation(&self) -> ValidationSpec {
        self.domains.iter().fold(
            ValidationSpec::for_schema(&self.schema())
                .not_null(self.not_null.iter().copied())
                .min_rows(self.min_rows),
            |spec, (column, domain)| spec.domain(*column, domain.clone()),
        )
    }

    fn metadata(&self) -> DatasetMetadata {
        DatasetMetadata {
            id: self.dataset_id.to_string(),
            title: self.title.to_string(),
            description: self.description.to_string(),
            column_descriptions: self
                .fields
                .iter()
                .map(|f| (f.column.to_string(), f.description.to_string()))
                .collect::<BTreeMap<_, _>>(),
        }
    }

    async fn fetch(&self, ctx: &FetchContext, range: DateRange) -> Result<Vec<Json>> {
        ctx.fetcher
            .fetch(range, |chunk| async move {
                let query = ApiClient::range_query(chunk);
                let mut items = Vec::new();
                for endpoint in &self.endpoints {
                    let body = ctx.api.get_json(endpoint.path, &query).await?;
                    let batch = endpoint.extract(&body)?;
                    debug!(endpoint = endpoint.path, chunk = %chunk, items = batch.len(), "Fetched endpoint");
                    items.extend(batch);
                }
                Ok(items)
            })
            .await
    }

    fn normalize(&self, payload: &RawPayload) -> Vec<Record> {
        payload
            .items
            .iter()
            .filter(|item| self.is_final(item))
            .flat_map(|item| self.rows_for(item))
            .filter(|record| self.filters.iter().all(|f| f.keep(record)))
            .collect()
    }
}
