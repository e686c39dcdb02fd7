//! Scoring a dataset against the active model

use crate::artifact::ModelArtifact;
use crate::error::DetectorError;
use crate::features::FeatureSet;
use sensorwatch_core::Dataset;
use serde::Serialize;
use tracing::{debug, warn};

/// Score given to every row of a batch whose raw scores are all equal.
/// No row stands out relative to the others, so none is ranked above zero.
pub const DEGENERATE_SCORE: f64 = 0.0;

/// Feature columns coerced to floats, restricted to the rows where every
/// feature is numeric.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureMatrix {
    pub valid_rows: Vec<usize>,
    pub values: Vec<Vec<f64>>,
}

/// Project `dataset` onto `features`; `Err` carries the absent columns.
pub fn project(dataset: &Dataset, features: &FeatureSet) -> Result<FeatureMatrix, Vec<String>> {
    let missing = features.missing_from(dataset);
    if !missing.is_empty() {
        return Err(missing);
    }

    let columns: Vec<Vec<Option<f64>>> = features
        .iter()
        .filter_map(|name| dataset.numeric_column(name))
        .collect();

    let mut matrix = FeatureMatrix {
        valid_rows: Vec::new(),
        values: Vec::new(),
    };
    for row in 0..dataset.len() {
        let values: Option<Vec<f64>> = columns.iter().map(|col| col[row]).collect();
        if let Some(values) = values {
            matrix.valid_rows.push(row);
            matrix.values.push(values);
        }
    }
    Ok(matrix)
}

/// Min-max rescale so the most anomalous (lowest) raw score maps to 1.0 and
/// the least anomalous to 0.0.
pub fn normalize_scores(raw: &[f64]) -> Vec<f64> {
    let min = raw.iter().copied().fold(f64::INFINITY, f64::min);
    let max = raw.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let range = max - min;

    if !(range > 0.0) {
        return vec![DEGENERATE_SCORE; raw.len()];
    }
    raw.iter()
        .map(|r| (1.0 - (r - min) / range).clamp(0.0, 1.0))
        .collect()
}

/// Dataset rows plus per-row verdicts. Always one verdict per input row.
#[derive(Debug, Clone, Serialize)]
pub struct PredictionResult {
    pub dataset: Dataset,
    pub features: FeatureSet,
    pub is_anomaly: Vec<bool>,
    pub anomaly_score: Vec<f64>,
    // decision function output, None for rows that failed coercion
    pub raw_score: Vec<Option<f64>>,
}

impl PredictionResult {
    pub fn len(&self) -> usize {
        self.is_anomaly.len()
    }

    pub fn is_empty(&self) -> bool {
        self.is_anomaly.is_empty()
    }

    pub fn num_anomalies(&self) -> usize {
        self.is_anomaly.iter().filter(|a| **a).count()
    }

    /// Rows that were actually scored by the model.
    pub fn scored_rows(&self) -> usize {
        self.raw_score.iter().filter(|s| s.is_some()).count()
    }

    pub fn anomaly_rows(&self) -> impl Iterator<Item = usize> + '_ {
        self.is_anomaly
            .iter()
            .enumerate()
            .filter_map(|(i, a)| a.then_some(i))
    }
}

pub fn predict(
    dataset: &Dataset,
    artifact: &ModelArtifact,
    invalid_row_score: f64,
) -> Result<PredictionResult, DetectorError> {
    let matrix = project(dataset, &artifact.feature_list)
        .map_err(|missing| DetectorError::FeatureMismatch { missing })?;

    let n = dataset.len();
    let mut result = PredictionResult {
        dataset: dataset.clone(),
        features: artifact.feature_list.clone(),
        is_anomaly: vec![false; n],
        anomaly_score: vec![invalid_row_score; n],
        raw_score: vec![None; n],
    };

    if matrix.valid_rows.is_empty() {
        warn!(rows = n, "No valid rows for prediction, every row marked normal");
        return Ok(result);
    }

    let verdicts = artifact.model.predict(&matrix.values)?;

    let raw: Vec<f64> = verdicts.iter().map(|(_, score)| *score).collect();
    let normalized = normalize_scores(&raw);

    for (k, &row) in matrix.valid_rows.iter().enumerate() {
        result.is_anomaly[row] = verdicts[k].0;
        result.raw_score[row] = Some(raw[k]);
        result.anomaly_score[row] = normalized[k];
    }

    debug!(
        rows = n,
        scored = matrix.valid_rows.len(),
        anomalies = result.num_anomalies(),
        "Prediction complete"
    );
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forest::{ForestParams, IsolationForest};
    use sensorwatch_core::Value;

    fn dataset(rows: Vec<(Value, Value)>) -> Dataset {
        let mut ds = Dataset::new(["temperature", "humidity"]).unwrap();
        for (t, h) in rows {
            ds.push_row(vec![t, h]).unwrap();
        }
        ds
    }

    fn artifact() -> ModelArtifact {
        let mut data: Vec<Vec<f64>> = (0..200)
            .map(|i| vec![20.0 + (i % 10) as f64 * 0.1, 50.0 + (i % 13) as f64 * 0.2])
            .collect();
        data.push(vec![90.0, 5.0]);
        ModelArtifact {
            model: IsolationForest::fit(&data, &ForestParams::default()).unwrap(),
            feature_list: FeatureSet::new(["temperature", "humidity"]).unwrap(),
            contamination: 0.03,
            seed: 42,
            training_rows: data.len(),
        }
    }

    #[test]
    fn test_normalize_scores() {
        let scores = normalize_scores(&[-0.2, 0.0, 0.2]);
        assert_eq!(scores, vec![1.0, 0.5, 0.0]);
    }

    #[test]
    fn test_normalize_degenerate_batch() {
        assert_eq!(normalize_scores(&[0.1, 0.1, 0.1]), vec![DEGENERATE_SCORE; 3]);
        assert_eq!(normalize_scores(&[-0.3]), vec![DEGENERATE_SCORE]);
    }

    #[test]
    fn test_project_drops_non_numeric_rows() {
        let ds = dataset(vec![
            (21.0.into(), 50.0.into()),
            ("hot".into(), 50.0.into()),
            ("22.5".into(), Value::Null),
            ("23".into(), "51".into()),
        ]);
        let features = FeatureSet::new(["humidity", "temperature"]).unwrap();
        let matrix = project(&ds, &features).unwrap();
        assert_eq!(matrix.valid_rows, vec![0, 3]);
        assert_eq!(matrix.values, vec![vec![50.0, 21.0], vec![51.0, 23.0]]);
    }

    #[test]
    fn test_predict_flags_outlier_and_keeps_every_row() {
        let ds = dataset(vec![
            (20.3.into(), 50.4.into()),
            ("broken".into(), 50.0.into()),
            (95.0.into(), 2.0.into()),
            (20.5.into(), 50.8.into()),
        ]);
        let result = predict(&ds, &artifact(), 0.0).unwrap();

        assert_eq!(result.len(), 4);
        assert!(result.is_anomaly[2]);
        assert!(!result.is_anomaly[1]);
        assert_eq!(result.anomaly_score[1], 0.0);
        assert_eq!(result.raw_score[1], None);
        assert_eq!(result.anomaly_score[2], 1.0);
        assert_eq!(result.scored_rows(), 3);
        assert_eq!(result.anomaly_rows().collect::<Vec<_>>(), vec![2]);
    }

    #[test]
    fn test_predict_uses_configured_default() {
        let ds = dataset(vec![(20.3.into(), 50.4.into()), (Value::Null, Value::Null)]);
        let result = predict(&ds, &artifact(), -1.0).unwrap();
        assert_eq!(result.anomaly_score[1], -1.0);
        assert!(!result.is_anomaly[1]);
    }

    #[test]
    fn test_predict_with_no_valid_rows() {
        let ds = dataset(vec![("a".into(), "b".into()), ("c".into(), Value::Null)]);
        let result = predict(&ds, &artifact(), 0.0).unwrap();
        assert_eq!(result.len(), 2);
        assert_eq!(result.num_anomalies(), 0);
        assert_eq!(result.anomaly_score, vec![0.0, 0.0]);
    }

    #[test]
    fn test_predict_feature_mismatch() {
        let mut ds = Dataset::new(["temperature"]).unwrap();
        ds.push_row(vec![21.0.into()]).unwrap();
        match predict(&ds, &artifact(), 0.0) {
            Err(DetectorError::FeatureMismatch { missing }) => {
                assert_eq!(missing, vec!["humidity".to_string()]);
            }
            other => panic!("expected FeatureMismatch, got {:?}", other.map(|r| r.len())),
        }
    }
}
