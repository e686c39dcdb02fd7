//! Tabular dataset - ordered rows addressed by column name

use crate::timestamp;
use crate::Value;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;

// dataset construction error
#[derive(Debug, Clone, PartialEq)]
pub enum DatasetError {
    // row width does not match the header
    RowWidth { expected: usize, found: usize },
    // column replacement with the wrong number of values
    ColumnLength { expected: usize, found: usize },
    DuplicateColumn(String),
}

impl fmt::Display for DatasetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DatasetError::RowWidth { expected, found } => {
                write!(f, "row has {} values, header has {} columns", found, expected)
            }
            DatasetError::ColumnLength { expected, found } => {
                write!(f, "column has {} values, dataset has {} rows", found, expected)
            }
            DatasetError::DuplicateColumn(name) => write!(f, "duplicate column: {}", name),
        }
    }
}

impl std::error::Error for DatasetError {}

/// Parsed upload: a header plus rows stored positionally.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl Dataset {
    pub fn new<I, S>(columns: I) -> Result<Self, DatasetError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut names: Vec<String> = Vec::new();
        for column in columns {
            let column = column.into();
            if names.contains(&column) {
                return Err(DatasetError::DuplicateColumn(column));
            }
            names.push(column);
        }
        Ok(Self {
            columns: names,
            rows: Vec::new(),
        })
    }

    pub fn push_row(&mut self, row: Vec<Value>) -> Result<(), DatasetError> {
        if row.len() != self.columns.len() {
            return Err(DatasetError::RowWidth {
                expected: self.columns.len(),
                found: row.len(),
            });
        }
        self.rows.push(row);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    pub fn value(&self, row: usize, column: &str) -> Option<&Value> {
        let idx = self.column_index(column)?;
        self.rows.get(row).and_then(|r| r.get(idx))
    }

    /// Coerce a column to floats; `None` for the column when it does not
    /// exist, `None` per cell when the cell is not numeric.
    pub fn numeric_column(&self, name: &str) -> Option<Vec<Option<f64>>> {
        let idx = self.column_index(name)?;
        Some(self.rows.iter().map(|r| r[idx].to_numeric()).collect())
    }

    /// Insert a new trailing column or replace an existing one in place.
    pub fn set_column(&mut self, name: &str, values: Vec<Value>) -> Result<(), DatasetError> {
        if values.len() != self.rows.len() {
            return Err(DatasetError::ColumnLength {
                expected: self.rows.len(),
                found: values.len(),
            });
        }
        match self.column_index(name) {
            Some(idx) => {
                for (row, value) in self.rows.iter_mut().zip(values) {
                    row[idx] = value;
                }
            }
            None => {
                self.columns.push(name.to_string());
                for (row, value) in self.rows.iter_mut().zip(values) {
                    row.push(value);
                }
            }
        }
        Ok(())
    }

    /// Make sure `column` holds a parsed timestamp on every row.
    ///
    /// When the column is absent, or any cell fails to parse, the whole column
    /// is regenerated at one-minute spacing ending at `now`. Returns `true`
    /// when the timestamps were generated rather than parsed.
    pub fn ensure_timestamps(&mut self, column: &str, now: NaiveDateTime) -> bool {
        let parsed: Option<Vec<NaiveDateTime>> = self.column_index(column).and_then(|idx| {
            self.rows
                .iter()
                .map(|r| r[idx].as_timestamp())
                .collect::<Option<Vec<_>>>()
        });

        let (series, generated) = match parsed {
            Some(series) => (series, false),
            None => (timestamp::generate_series(self.rows.len(), now), true),
        };

        let values = series.into_iter().map(Value::Timestamp).collect();
        // length always matches the row count here
        let _ = self.set_column(column, values);
        generated
    }

    pub fn timestamps(&self, column: &str) -> Vec<Option<NaiveDateTime>> {
        match self.column_index(column) {
            Some(idx) => self.rows.iter().map(|r| r[idx].as_timestamp()).collect(),
            None => vec![None; self.rows.len()],
        }
    }
}
