//! Chart downsampling that never drops an anomaly while budget remains

use crate::predict::PredictionResult;
use chrono::NaiveDateTime;
use rand::prelude::*;
use sensorwatch_core::timestamp;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use tracing::{info, warn};

/// Parallel arrays ready for a time-series chart
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartPayload {
    pub timestamps: Vec<Option<String>>,
    // position of each point in the source dataset
    pub row_index: Vec<usize>,
    pub features: Vec<String>,
    pub metrics: BTreeMap<String, Vec<Option<f64>>>,
    pub is_anomaly: Vec<bool>,
    pub anomaly_score: Vec<f64>,
}

impl ChartPayload {
    pub fn len(&self) -> usize {
        self.row_index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.row_index.is_empty()
    }
}

pub fn round_to(value: f64, decimals: u32) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    let scaled = value * factor;
    if !scaled.is_finite() {
        return value;
    }
    scaled.round() / factor
}

#[derive(Debug, Clone)]
pub struct ChartSampler {
    max_points: usize,
    seed: u64,
    metric_decimals: u32,
    score_decimals: u32,
    timestamp_column: String,
}

impl ChartSampler {
    pub fn new(max_points: usize) -> Self {
        Self {
            max_points,
            seed: 42,
            metric_decimals: 2,
            score_decimals: 4,
            timestamp_column: "timestamp".to_string(),
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_precision(mut self, metric_decimals: u32, score_decimals: u32) -> Self {
        self.metric_decimals = metric_decimals;
        self.score_decimals = score_decimals;
        self
    }

    pub fn with_timestamp_column(mut self, column: &str) -> Self {
        self.timestamp_column = column.to_string();
        self
    }

    pub fn max_points(&self) -> usize {
        self.max_points
    }

    /// Pick the rows to plot, ordered by timestamp.
    ///
    /// Every anomaly is kept. When anomalies alone reach the budget they are
    /// all returned, even past `max_points`; otherwise the remaining budget is
    /// filled with a seeded sample of normal rows.
    pub fn select(&self, result: &PredictionResult) -> Vec<usize> {
        let total = result.len();
        let mut selected: Vec<usize> = if total <= self.max_points {
            (0..total).collect()
        } else {
            let (anomalies, normal): (Vec<usize>, Vec<usize>) =
                (0..total).partition(|&i| result.is_anomaly[i]);

            if anomalies.len() >= self.max_points {
                warn!(
                    anomalies = anomalies.len(),
                    max_points = self.max_points,
                    "Anomalies exceed chart budget, sending anomalies only"
                );
                anomalies
            } else {
                let budget = self.max_points - anomalies.len();
                let sampled = self.sample(normal, budget);
                info!(
                    total,
                    sent = anomalies.len() + sampled.len(),
                    anomalies = anomalies.len(),
                    normal = sampled.len(),
                    "Chart data downsampled"
                );
                let mut rows = anomalies;
                rows.extend(sampled);
                rows
            }
        };

        let times = result.dataset.timestamps(&self.timestamp_column);
        selected.sort_by(|&a, &b| compare_time(times[a], times[b]).then(a.cmp(&b)));
        selected
    }

    // seeded partial Fisher-Yates, without replacement
    fn sample(&self, mut rows: Vec<usize>, budget: usize) -> Vec<usize> {
        if rows.len() <= budget {
            return rows;
        }
        let mut rng = StdRng::seed_from_u64(self.seed);
        for i in 0..budget {
            let j = rng.random_range(i..rows.len());
            rows.swap(i, j);
        }
        rows.truncate(budget);
        rows
    }

    pub fn reduce(&self, result: &PredictionResult) -> ChartPayload {
        let rows = self.select(result);
        let dataset = &result.dataset;

        let times = dataset.timestamps(&self.timestamp_column);
        let timestamps = rows
            .iter()
            .map(|&i| times[i].as_ref().map(timestamp::format_display))
            .collect();

        let mut metrics = BTreeMap::new();
        for feature in result.features.iter() {
            let column = dataset
                .numeric_column(feature)
                .unwrap_or_else(|| vec![None; dataset.len()]);
            let values = rows
                .iter()
                .map(|&i| column[i].map(|v| round_to(v, self.metric_decimals)))
                .collect();
            metrics.insert(feature.to_string(), values);
        }

        ChartPayload {
            timestamps,
            features: result.features.columns().to_vec(),
            metrics,
            is_anomaly: rows.iter().map(|&i| result.is_anomaly[i]).collect(),
            anomaly_score: rows
                .iter()
                .map(|&i| round_to(result.anomaly_score[i], self.score_decimals))
                .collect(),
            row_index: rows,
        }
    }
}

// rows without a timestamp go last
fn compare_time(a: Option<NaiveDateTime>, b: Option<NaiveDateTime>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}
