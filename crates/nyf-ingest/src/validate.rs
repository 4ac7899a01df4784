//! Table validation rules
//!
//! A [`ValidationSpec`] states what a published table must look like: the
//! exact column set and types, the columns that may never be null, a minimum
//! row count and optional value domains. [`validate`] reports the first
//! violated rule.

use std::collections::BTreeSet;

use crate::error::ValidationError;
use crate::table::{ColumnType, Schema, Table};

/// Allowed values for a column; nulls are not checked here
#[derive(Debug, Clone, PartialEq)]
pub enum Domain {
    /// Inclusive numeric bounds
    Range { min: f64, max: f64 },
    /// Enumerated categories
    OneOf(BTreeSet<String>),
}

impl Domain {
    pub fn range(min: f64, max: f64) -> Self {
        Domain::Range { min, max }
    }

    pub fn one_of<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Domain::OneOf(values.into_iter().map(Into::into).collect())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValidationSpec {
    pub columns: Vec<(String, ColumnType)>,
    pub not_null: Vec<String>,
    pub min_rows: usize,
    pub domains: Vec<(String, Domain)>,
}

impl ValidationSpec {
    /// Column set taken from a schema; non-nullable schema columns are
    /// required to be non-null.
    pub fn for_schema(schema: &Schema) -> Self {
        Self {
            columns: schema
                .columns()
                .iter()
                .map(|c| (c.name.clone(), c.column_type))
                .collect(),
            not_null: schema.non_nullable().map(|c| c.name.clone()).collect(),
            min_rows: 0,
            domains: Vec::new(),
        }
    }

    pub fn not_null<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for column in columns {
            let column = column.into();
            if !self.not_null.contains(&column) {
                self.not_null.push(column);
            }
        }
        self
    }

    pub fn min_rows(mut self, min_rows: usize) -> Self {
        self.min_rows = min_rows;
        self
    }

    pub fn domain(mut self, column: impl Into<String>, domain: Domain) -> Self {
        self.domains.push((column.into(), domain));
        self
    }
}

pub fn validate(table: &Table, spec: &ValidationSpec) -> Result<(), ValidationError> {
    check_columns(table.schema(), spec)?;
    check_values(table, spec)?;

    if table.len() < spec.min_rows {
        return Err(ValidationError::TooFewRows {
            min: spec.min_rows,
            actual: table.len(),
        });
    }

    Ok(())
}

fn check_columns(schema: &Schema, spec: &ValidationSpec) -> Result<(), ValidationError> {
    for (name, expected) in &spec.columns {
        let column = schema
            .column(name)
            .ok_or_else(|| ValidationError::MissingColumn(name.clone()))?;
        if column.column_type != *expected {
            return Err(ValidationError::ColumnType {
                column: name.clone(),
                expected: expected.to_string(),
                actual: column.column_type.to_string(),
            });
        }
    }

    if let Some(extra) = schema
        .names()
        .find(|name| !spec.columns.iter().any(|(c, _)| c == name))
    {
        return Err(ValidationError::UnexpectedColumn(extra.to_string()));
    }

    Ok(())
}

fn check_values(table: &Table, spec: &ValidationSpec) -> Result<(), ValidationError> {
    for (row, record) in table.rows().iter().enumerate() {
        if let Some(extra) = record.columns().find(|c| table.schema().column(c).is_none()) {
            return Err(ValidationError::UnexpectedColumn(extra.to_string()));
        }

        for (column, expected) in &spec.columns {
            let value = record.get(column);
            if let Some(actual) = value.column_type() {
                if actual != *expected {
                    return Err(ValidationError::ValueType {
                        row,
                        column: column.clone(),
                        expected: expected.to_string(),
                        actual: actual.to_string(),
                    });
                }
            }
        }

        if let Some(column) = spec.not_null.iter().find(|c| record.get(c).is_null()) {
            return Err(ValidationError::NullValue {
                row,
                column: column.clone(),
            });
        }

        for (column, domain) in &spec.domains {
            let value = record.get(column);
            if value.is_null() {
                continue;
            }
            match domain {
                Domain::Range { min, max } => {
                    let Some(v) = value.as_f64() else {
                        return Err(ValidationError::ValueType {
                            row,
                            column: column.clone(),
                            expected: "numeric".to_string(),
                            actual: value.column_type().map(|t| t.to_string()).unwrap_or_default(),
                        });
                    };
                    if v < *min || v > *max {
                        return Err(ValidationError::OutOfRange {
                            row,
                            column: column.clone(),
                            value: v,
                            min: *min,
                            max: *max,
                        });
                    }
                },
                Domain::OneOf(allowed) => {
                    let rendered = value.render();
                    if !allowed.contains(&rendered) {
                        return Err(ValidationError::NotAllowed {
                            row,
                            column: column.clone(),
                            value: rendered,
                        });
                    }
                },
            }
        }
    }

    Ok(())
}
