// Response body for an analysis run

use crate::chart::{ChartPayload, round_to};
use crate::predict::PredictionResult;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub success: bool,
    pub message: String,
    pub total_points: usize,
    pub num_anomalies: usize,
    pub anomaly_percentage: f64,
    pub features: Vec<String>,
    // timestamp column was absent or unparsable and got regenerated
    pub timestamps_generated: bool,
    // upload did not fit the schema, synthetic rows were analyzed instead
    pub sample_substituted: bool,
    pub chart_data: ChartPayload,
}

impl AnalysisReport {
    pub fn new(message: &str, result: &PredictionResult, chart_data: ChartPayload) -> Self {
        let total_points = result.len();
        let num_anomalies = result.num_anomalies();
        Self {
            success: true,
            message: message.to_string(),
            total_points,
            num_anomalies,
            anomaly_percentage: anomaly_percentage(num_anomalies, total_points),
            features: result.features.columns().to_vec(),
            timestamps_generated: false,
            sample_substituted: false,
            chart_data,
        }
    }
}

/// Share of anomalous rows in percent, 2 decimals. Zero for an empty batch.
pub fn anomaly_percentage(num_anomalies: usize, total_points: usize) -> f64 {
    if total_points == 0 {
        return 0.0;
    }
    round_to(num_anomalies as f64 / total_points as f64 * 100.0, 2)
}
