//! Typed decoding of view rows.
//!
//! View keys and values are positional JSON tuples. Each row is validated once
//! here; a row of the wrong shape becomes a [`RowError`] that callers log and
//! skip.

use serde_json::Value;

use super::schema::{CatalogLayout, MapLayout, ReduceLayout};

/// A view row that does not have the expected shape.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RowError {
    #[error("expected {expected} for {field}")]
    WrongType {
        field: &'static str,
        expected: &'static str,
    },

    #[error("expected at least {expected} fields in {field}, found {found}")]
    TooShort {
        field: &'static str,
        expected: usize,
        found: usize,
    },

    #[error("{field} is not a whole non-negative count")]
    BadCount { field: &'static str },
}

/// Failed counts may be stored negated; the magnitude is what counts.
pub fn normalize_failed(raw: f64) -> f64 {
    raw.abs()
}

fn tuple<'a>(value: &'a Value, width: usize, field: &'static str) -> Result<&'a [Value], RowError> {
    let items = value.as_array().ok_or(RowError::WrongType {
        field,
        expected: "an array",
    })?;
    if items.len() < width {
        return Err(RowError::TooShort {
            field,
            expected: width,
            found: items.len(),
        });
    }
    Ok(items)
}

fn string_at(items: &[Value], idx: usize, field: &'static str) -> Result<String, RowError> {
    items[idx]
        .as_str()
        .map(str::to_string)
        .ok_or(RowError::WrongType {
            field,
            expected: "a string",
        })
}

fn number_at(items: &[Value], idx: usize, field: &'static str) -> Result<f64, RowError> {
    items[idx]
        .as_f64()
        .filter(|n| n.is_finite())
        .ok_or(RowError::WrongType {
            field,
            expected: "a number",
        })
}

fn whole(raw: f64, field: &'static str) -> Result<u64, RowError> {
    if raw < 0.0 || raw.fract() != 0.0 {
        return Err(RowError::BadCount { field });
    }
    Ok(raw as u64)
}

/// Relative percentage. A reduce over zero jobs divides 0/0, which arrives
/// as `null`; that reads as 0%.
fn percent_at(items: &[Value], idx: usize, field: &'static str) -> Result<f64, RowError> {
    match &items[idx] {
        Value::Null => Ok(0.0),
        Value::Number(n) => Ok(n.as_f64().filter(|n| n.is_finite()).unwrap_or(0.0)),
        _ => Err(RowError::WrongType {
            field,
            expected: "a number or null",
        }),
    }
}

/// Count that must already be non-negative.
fn count_at(items: &[Value], idx: usize, field: &'static str) -> Result<u64, RowError> {
    whole(number_at(items, idx, field)?, field)
}

/// Failed count, normalized to its magnitude.
fn failed_at(items: &[Value], idx: usize, field: &'static str) -> Result<u64, RowError> {
    whole(normalize_failed(number_at(items, idx, field)?), field)
}

/// Build identifier of a row key: the first element of an array key, or the
/// key itself when it is a plain string.
pub fn build_of_key(key: &Value) -> Result<String, RowError> {
    match key {
        Value::String(s) => Ok(s.clone()),
        Value::Array(items) if !items.is_empty() => string_at(items, 0, "key.build"),
        _ => Err(RowError::WrongType {
            field: "key",
            expected: "a build string or key tuple",
        }),
    }
}

/// `[build, platform, category]` key of the data index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataKey {
    pub build: String,
    pub platform: String,
    pub category: String,
}

impl DataKey {
    pub fn decode(key: &Value) -> Result<Self, RowError> {
        let items = tuple(key, 3, "key")?;
        Ok(Self {
            build: string_at(items, 0, "key.build")?,
            platform: string_at(items, 1, "key.platform")?,
            category: string_at(items, 2, "key.category")?,
        })
    }
}

/// One raw (unreduced) job result from the data index.
#[derive(Debug, Clone, PartialEq)]
pub struct DataValue {
    pub passed: u64,
    pub failed: u64,
    pub priority: String,
    pub name: String,
    pub result: String,
    pub url: String,
    pub build_id: i64,
}

impl DataValue {
    pub fn decode(value: &Value, layout: &MapLayout) -> Result<Self, RowError> {
        let items = tuple(value, layout.width(), "value")?;
        let build_id = number_at(items, layout.build_id, "value.build_id")?;
        if build_id.fract() != 0.0 {
            return Err(RowError::WrongType {
                field: "value.build_id",
                expected: "an integer",
            });
        }

        Ok(Self {
            passed: count_at(items, layout.passed, "value.passed")?,
            failed: failed_at(items, layout.failed, "value.failed")?,
            priority: string_at(items, layout.priority, "value.priority")?,
            name: string_at(items, layout.name, "value.name")?,
            result: string_at(items, layout.result, "value.result")?,
            url: string_at(items, layout.url, "value.url")?,
            build_id: build_id as i64,
        })
    }

    /// Total is always derived from the two counts.
    pub fn total(&self) -> u64 {
        self.passed + self.failed
    }
}

/// Reduced pass/fail statistics.
#[derive(Debug, Clone, PartialEq)]
pub struct ReduceValue {
    pub abs_passed: u64,
    pub abs_failed: u64,
    pub rel_passed: f64,
    pub rel_failed: f64,
}

impl ReduceValue {
    pub fn decode(value: &Value, layout: &ReduceLayout) -> Result<Self, RowError> {
        let items = tuple(value, layout.width(), "reduce")?;
        Ok(Self {
            abs_passed: count_at(items, layout.abs_passed, "reduce.abs_passed")?,
            abs_failed: failed_at(items, layout.abs_failed, "reduce.abs_failed")?,
            rel_passed: percent_at(items, layout.rel_passed, "reduce.rel_passed")?,
            rel_failed: normalize_failed(percent_at(items, layout.rel_failed, "reduce.rel_failed")?),
        })
    }
}

/// Job metadata from the jobs index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogEntry {
    pub name: String,
    pub platform: String,
    pub category: String,
    pub url: String,
    pub priority: String,
}

impl CatalogEntry {
    pub fn decode(value: &Value, layout: &CatalogLayout) -> Result<Self, RowError> {
        let items = tuple(value, layout.width(), "value")?;
        Ok(Self {
            name: string_at(items, layout.name, "value.name")?,
            platform: string_at(items, layout.platform, "value.platform")?,
            category: string_at(items, layout.category, "value.category")?,
            url: string_at(items, layout.url, "value.url")?,
            priority: string_at(items, layout.priority, "value.priority")?,
        })
    }
}
