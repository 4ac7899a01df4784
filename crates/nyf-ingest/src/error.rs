//! Error types for the ingestion pipeline
//!
//! Field-level parse failures never surface here: the parsers in
//! [`crate::normalize::parse`] return `Option` and substitute null.

use thiserror::Error;

/// Result type alias for ingestion operations
pub type Result<T> = std::result::Result<T, IngestError>;

/// Failure of a single source's pipeline run
#[derive(Error, Debug)]
pub enum IngestError {
    /// Timeout, connection failure, 5xx: retried within the attempt budget
    #[error("Transient fetch error for {url}: {message}")]
    TransientFetch { url: String, message: String },

    /// 4xx, malformed response, or an exhausted retry budget
    #[error("Fetch error: {0}")]
    Fetch(String),

    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// State or raw-capture storage failure
    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Publish error: {0}")]
    Publish(String),

    #[error("No raw capture found for source {0}")]
    CaptureMissing(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl IngestError {
    pub fn transient(url: impl Into<String>, message: impl ToString) -> Self {
        IngestError::TransientFetch {
            url: url.into(),
            message: message.to_string(),
        }
    }

    pub fn fetch(message: impl Into<String>) -> Self {
        IngestError::Fetch(message.into())
    }

    pub fn persistence(message: impl Into<String>) -> Self {
        IngestError::Persistence(message.into())
    }

    pub fn publish(message: impl Into<String>) -> Self {
        IngestError::Publish(message.into())
    }

    /// Default retry predicate: only transport-level transient failures
    pub fn is_transient(&self) -> bool {
        matches!(self, IngestError::TransientFetch { .. })
    }
}

/// A schema, row-count or value-domain rule violated by a produced table
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("missing column '{0}'")]
    MissingColumn(String),

    #[error("unexpected column '{0}'")]
    UnexpectedColumn(String),

    #[error("column '{column}' has type {actual}, expected {expected}")]
    ColumnType {
        column: String,
        expected: String,
        actual: String,
    },

    #[error("row {row}: column '{column}' holds a {actual} value, expected {expected}")]
    ValueType {
        row: usize,
        column: String,
        expected: String,
        actual: String,
    },

    #[error("row {row}: column '{column}' must not be null")]
    NullValue { row: usize, column: String },

    #[error("table has {actual} rows, at least {min} required")]
    TooFewRows { min: usize, actual: usize },

    #[error("row {row}: column '{column}' value {value} outside [{min}, {max}]")]
    OutOfRange {
        row: usize,
        column: String,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("row {row}: column '{column}' value '{value}' not in allowed set")]
    NotAllowed {
        row: usize,
        column: String,
        value: String,
    },
}
