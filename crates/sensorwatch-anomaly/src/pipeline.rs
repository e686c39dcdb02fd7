//! Upload analysis: schema check, timestamps, cold-start training, scoring
//! and chart reduction in one call.

use crate::artifact::ModelArtifact;
use crate::chart::ChartSampler;
use crate::config::AppConfig;
use crate::detection::AnomalyDetector;
use crate::error::{ArtifactError, DetectorError};
use crate::features::{self, FeatureMode, FeatureSet};
use crate::forest::ForestParams;
use crate::report::AnalysisReport;
use chrono::{Duration, NaiveDateTime, Utc};
use sensorwatch_core::{Dataset, SampleSpec, synthetic};
use std::sync::Arc;
use tracing::{info, warn};

const ANALYSIS_MESSAGE: &str = "Anomaly detection completed successfully";
const SAMPLE_MESSAGE: &str = "Sample data generated successfully";

// rows generated when an empty upload has to be replaced
const SUBSTITUTE_POINTS: usize = 1000;

/// What to do when an upload does not carry the expected columns
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SchemaMismatchPolicy {
    #[default]
    Reject,
    // analyze synthetic rows of the same length instead
    SubstituteSample,
}

#[derive(Debug, Clone, Default)]
pub struct AnalyzeOptions {
    // train on the upload when no model is active
    pub train_if_missing: bool,
    pub on_schema_mismatch: SchemaMismatchPolicy,
    // reference time for generated timestamps, wall clock when None
    pub now: Option<NaiveDateTime>,
}

pub struct AnalysisPipeline {
    detector: Arc<AnomalyDetector>,
    sampler: ChartSampler,
    feature_mode: FeatureMode,
    params: ForestParams,
    timestamp_column: String,
}

impl AnalysisPipeline {
    pub fn from_config(config: &AppConfig) -> Self {
        Self::with_detector(Arc::new(AnomalyDetector::from_config(config)), config)
    }

    /// Build a pipeline around an existing, possibly shared, detector.
    pub fn with_detector(detector: Arc<AnomalyDetector>, config: &AppConfig) -> Self {
        Self {
            detector,
            sampler: config.chart_sampler(),
            feature_mode: config.features.to_mode(),
            params: config.model.forest_params(),
            timestamp_column: config.timestamp_column.clone(),
        }
    }

    pub fn detector(&self) -> &Arc<AnomalyDetector> {
        &self.detector
    }

    pub fn sampler(&self) -> &ChartSampler {
        &self.sampler
    }

    /// Load the persisted model, or train on `initial` when there is none
    /// (or it cannot be read).
    pub fn bootstrap(&self, initial: &Dataset) -> Result<Arc<ModelArtifact>, DetectorError> {
        match self.detector.load() {
            Ok(artifact) => Ok(artifact),
            Err(DetectorError::Artifact(
                err @ (ArtifactError::NotFound(_) | ArtifactError::Corrupt(_)),
            )) => {
                warn!(error = %err, rows = initial.len(), "No usable model on disk, training initial model");
                self.train(initial)
            }
            Err(e) => Err(e),
        }
    }

    /// Resolve features with the configured mode and train on `dataset`.
    pub fn train(&self, dataset: &Dataset) -> Result<Arc<ModelArtifact>, DetectorError> {
        let features = features::resolve(dataset.columns(), &self.feature_mode)?;
        self.detector.train(dataset, &features, &self.params)
    }

    pub fn analyze(
        &self,
        dataset: &Dataset,
        options: &AnalyzeOptions,
    ) -> Result<AnalysisReport, DetectorError> {
        let now = options.now.unwrap_or_else(|| Utc::now().naive_utc());
        let mut data = dataset.clone();
        let mut substituted = false;

        let features = match self.schema_for(&data) {
            Ok(features) => features,
            Err(err) if options.on_schema_mismatch == SchemaMismatchPolicy::SubstituteSample => {
                warn!(error = %err, rows = data.len(), "Upload does not match schema, using sample data");
                data = self.substitute(data.len(), now);
                substituted = true;
                self.schema_for(&data)?
            }
            Err(err) => return Err(err),
        };

        let generated = data.ensure_timestamps(&self.timestamp_column, now);
        if generated {
            info!(rows = data.len(), column = %self.timestamp_column, "Timestamps generated");
        }

        if !self.detector.is_trained() {
            if !options.train_if_missing {
                return Err(DetectorError::NotTrained);
            }
            warn!(rows = data.len(), "No active model, training on uploaded data");
            self.detector.train(&data, &features, &self.params)?;
        }

        let result = self.detector.predict(&data)?;
        let chart = self.sampler.reduce(&result);

        let mut report = AnalysisReport::new(ANALYSIS_MESSAGE, &result, chart);
        report.timestamps_generated = generated;
        report.sample_substituted = substituted;

        info!(
            anomalies = report.num_anomalies,
            total = report.total_points,
            percentage = report.anomaly_percentage,
            "Analysis complete"
        );
        Ok(report)
    }

    /// Generate `points` synthetic rows ending at `now`, retrain on them and
    /// report the result.
    pub fn analyze_sample(
        &self,
        points: usize,
        now: NaiveDateTime,
    ) -> Result<AnalysisReport, DetectorError> {
        let data = self.substitute(points, now);
        self.train(&data)?;

        let result = self.detector.predict(&data)?;
        let chart = self.sampler.reduce(&result);
        Ok(AnalysisReport::new(SAMPLE_MESSAGE, &result, chart))
    }

    // feature set the upload will be scored with: the active model's, or the
    // configured resolution when nothing is trained yet
    fn schema_for(&self, data: &Dataset) -> Result<FeatureSet, DetectorError> {
        match self.detector.active() {
            Some(artifact) => {
                let missing = artifact.feature_list.missing_from(data);
                if missing.is_empty() {
                    Ok(artifact.feature_list.clone())
                } else {
                    Err(DetectorError::FeatureMismatch { missing })
                }
            }
            None => Ok(features::resolve(data.columns(), &self.feature_mode)?),
        }
    }

    fn substitute(&self, rows: usize, now: NaiveDateTime) -> Dataset {
        let points = if rows == 0 { SUBSTITUTE_POINTS } else { rows };
        synthetic::generate(&SampleSpec {
            points,
            seed: self.params.seed,
            start: now - Duration::minutes(points as i64),
            ..SampleSpec::default()
        })
    }
}
