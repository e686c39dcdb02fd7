//! Core types for the sensor telemetry pipeline
//! this crate contains the tabular data model shared by the detector and the CLI.
pub mod dataset;
pub mod synthetic;
pub mod timestamp;

pub use dataset::{Dataset, DatasetError};
pub use synthetic::{generate, SampleSpec};

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

// CELL VALUE //

/// A single cell of an uploaded table.
///
/// Uploads come from differently shaped CSVs, so a column is never assumed
/// to hold one type: the same column may mix numbers, text and blanks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Number(f64),
    Timestamp(NaiveDateTime),
    Text(String),
    Null,
}

impl Value {
    /// Parse a raw CSV field: blanks become `Null`, anything that reads as a
    /// float becomes `Number`, the rest stays `Text`.
    pub fn from_field(field: &str) -> Self {
        let trimmed = field.trim();
        if trimmed.is_empty() {
            return Value::Null;
        }
        match trimmed.parse::<f64>() {
            Ok(n) => Value::Number(n),
            Err(_) => Value::Text(field.to_string()),
        }
    }

    /// Numeric coercion. Anything that cannot be used as a finite float
    /// (text, timestamps, blanks, NaN, infinities) is missing.
    pub fn to_numeric(&self) -> Option<f64> {
        let n = match self {
            Value::Number(n) => *n,
            Value::Text(s) => s.trim().parse::<f64>().ok()?,
            Value::Timestamp(_) | Value::Null => return None,
        };
        n.is_finite().then_some(n)
    }

    pub fn as_timestamp(&self) -> Option<NaiveDateTime> {
        match self {
            Value::Timestamp(ts) => Some(*ts),
            Value::Text(s) => timestamp::parse(s),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(ts: NaiveDateTime) -> Self {
        Value::Timestamp(ts)
    }
}
