//! Field parsers
//!
//! Every parser is total: malformed input becomes `None` (a null cell) and is
//! never reported as an error. Thousands separators are stripped before
//! numeric conversion and `"NA"` is treated as missing.

use chrono::{NaiveDate, NaiveDateTime};
use serde_json::Value as Json;

use crate::range::DATE_FORMAT;
use crate::table::TIMESTAMP_FORMAT;

const FALLBACK_DATE_FORMAT: &str = "%m/%d/%Y";
const SHORT_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M";

/// Trimmed text, `None` for absent, empty or `NA`
fn present(raw: Option<&str>) -> Option<&str> {
    let s = raw?.trim();
    (!s.is_empty() && s != "NA").then_some(s)
}

pub fn parse_number(raw: Option<&str>) -> Option<f64> {
    let cleaned = present(raw)?.replace(',', "");
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}

pub fn parse_integer(raw: Option<&str>) -> Option<i32> {
    let cleaned = present(raw)?.replace(',', "");
    cleaned.parse::<i32>().ok()
}

/// `YYYY-MM-DD` only
pub fn parse_date(raw: Option<&str>) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(present(raw)?, DATE_FORMAT).ok()
}

/// `YYYY-MM-DD`, falling back to `MM/DD/YYYY`
pub fn parse_date_lenient(raw: Option<&str>) -> Option<NaiveDate> {
    let s = present(raw)?;
    NaiveDate::parse_from_str(s, DATE_FORMAT)
        .or_else(|_| NaiveDate::parse_from_str(s, FALLBACK_DATE_FORMAT))
        .ok()
}

/// `true`, `1` or `yes` in any case; any other present value is `false`
pub fn parse_bool(raw: Option<&str>) -> Option<bool> {
    let s = present(raw)?.to_ascii_lowercase();
    Some(matches!(s.as_str(), "true" | "1" | "yes"))
}

pub fn parse_timestamp(raw: Option<&str>) -> Option<NaiveDateTime> {
    let s = present(raw)?;
    NaiveDateTime::parse_from_str(s, TIMESTAMP_FORMAT)
        .or_else(|_| NaiveDateTime::parse_from_str(s, SHORT_TIMESTAMP_FORMAT))
        .ok()
}

/// Text form of a JSON scalar; numbers and booleans are stringified so the
/// same parsers handle `"1,234"` and `1234` alike.
pub fn json_text(value: Option<&Json>) -> Option<String> {
    match value? {
        Json::String(s) => Some(s.clone()),
        Json::Number(n) => Some(n.to_string()),
        Json::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Non-empty string cell
pub fn json_string(value: Option<&Json>) -> Option<String> {
    json_text(value).filter(|s| !s.trim().is_empty())
}

pub fn json_number(value: Option<&Json>) -> Option<f64> {
    match value? {
        Json::Number(n) => n.as_f64().filter(|v| v.is_finite()),
        other => parse_number(json_text(Some(other)).as_deref()),
    }
}

pub fn json_integer(value: Option<&Json>) -> Option<i32> {
    match value? {
        Json::Number(n) => n.as_i64().and_then(|v| i32::try_from(v).ok()),
        other => parse_integer(json_text(Some(other)).as_deref()),
    }
}

pub fn json_date(value: Option<&Json>) -> Option<NaiveDate> {
    parse_date(json_text(value).as_deref())
}

pub fn json_date_lenient(value: Option<&Json>) -> Option<NaiveDate> {
    parse_date_lenient(json_text(value).as_deref())
}

pub fn json_bool(value: Option<&Json>) -> Option<bool> {
    match value? {
        Json::Bool(b) => Some(*b),
        other => parse_bool(json_text(Some(other)).as_deref()),
    }
}

pub fn json_timestamp(value: Option<&Json>) -> Option<NaiveDateTime> {
    parse_timestamp(json_text(value).as_deref())
}
