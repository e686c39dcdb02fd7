//! Feature resolution - which dataset columns feed the model

use crate::error::FeatureError;
use sensorwatch_core::Dataset;
use serde::{Deserialize, Serialize};

/// Schema of the classic 4-column IoT export
pub const DEFAULT_REQUIRED: [&str; 4] = ["temperature", "humidity", "pressure", "power_consumption"];

/// Known metrics of the flexible 6-metric export
pub const DEFAULT_VOCABULARY: [&str; 6] = [
    "Temperature",
    "Humidity",
    "Air Quality",
    "Light",
    "Loudness",
    "Power Consumption",
];

/// Ordered, non-empty list of feature column names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct FeatureSet(Vec<String>);

impl FeatureSet {
    pub fn new<I, S>(columns: I) -> Result<Self, FeatureError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let columns: Vec<String> = columns.into_iter().map(Into::into).collect();
        if columns.is_empty() {
            return Err(FeatureError::NoUsableFeatures);
        }
        Ok(Self(columns))
    }

    pub fn columns(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    // never true, a FeatureSet cannot be built empty
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// Columns of this set that `dataset` lacks.
    pub fn missing_from(&self, dataset: &Dataset) -> Vec<String> {
        self.0
            .iter()
            .filter(|c| !dataset.has_column(c))
            .cloned()
            .collect()
    }
}

impl TryFrom<Vec<String>> for FeatureSet {
    type Error = FeatureError;

    fn try_from(columns: Vec<String>) -> Result<Self, Self::Error> {
        FeatureSet::new(columns)
    }
}

impl From<FeatureSet> for Vec<String> {
    fn from(set: FeatureSet) -> Self {
        set.0
    }
}

/// How feature columns are picked from an upload
#[derive(Debug, Clone, PartialEq)]
pub enum FeatureMode {
    // every listed column must be present, by exact name
    Fixed(Vec<String>),
    // any column whose name contains one of the keywords
    Flexible(Vec<String>),
}

impl FeatureMode {
    pub fn fixed_default() -> Self {
        FeatureMode::Fixed(DEFAULT_REQUIRED.iter().map(|s| s.to_string()).collect())
    }

    pub fn flexible_default() -> Self {
        FeatureMode::Flexible(DEFAULT_VOCABULARY.iter().map(|s| s.to_string()).collect())
    }
}

// lowercase, with '_', '-' and whitespace runs collapsed to one space
fn normalize(name: &str) -> String {
    name.to_lowercase()
        .split(|c: char| c == '_' || c == '-' || c.is_whitespace())
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Resolve the feature set for a dataset header.
pub fn resolve(columns: &[String], mode: &FeatureMode) -> Result<FeatureSet, FeatureError> {
    match mode {
        FeatureMode::Fixed(required) => {
            let missing: Vec<String> = required
                .iter()
                .filter(|r| !columns.contains(r))
                .cloned()
                .collect();
            if !missing.is_empty() {
                return Err(FeatureError::MissingColumns(missing));
            }
            FeatureSet::new(required.iter().cloned())
        }
        FeatureMode::Flexible(vocabulary) => {
            let keywords: Vec<String> = vocabulary
                .iter()
                .map(|k| normalize(k))
                .filter(|k| !k.is_empty())
                .collect();
            let matched = columns.iter().filter(|column| {
                let name = normalize(column);
                keywords.iter().any(|k| name.contains(k.as_str()))
            });
            FeatureSet::new(matched.cloned())
        }
    }
}
