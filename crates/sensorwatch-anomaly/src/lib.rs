//! Sensorwatch anomaly detection
//!
//! Resolves feature columns from an upload, trains and persists an isolation
//! forest, scores rows against the active model and reduces the result to a
//! chartable payload.

pub mod artifact;
pub mod chart;
pub mod config;
pub mod detection;
pub mod error;
pub mod features;
pub mod forest;
pub mod pipeline;
pub mod predict;
pub mod report;

pub use artifact::{ArtifactStore, ModelArtifact};
pub use chart::{ChartPayload, ChartSampler};
pub use config::{AppConfig, ConfigError, load_config};
pub use detection::{AnomalyDetector, DetectorStatus};
pub use error::{ArtifactError, DetectorError, FeatureError};
pub use features::{FeatureMode, FeatureSet};
pub use forest::{ForestParams, IsolationForest};
pub use pipeline::{AnalysisPipeline, AnalyzeOptions, SchemaMismatchPolicy};
pub use predict::PredictionResult;
pub use report::AnalysisReport;
