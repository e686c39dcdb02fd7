//! Configuration parsing for the detection pipeline

use crate::chart::ChartSampler;
use crate::features::{DEFAULT_REQUIRED, DEFAULT_VOCABULARY, FeatureMode};
use crate::forest::ForestParams;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Read(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

// Main config structure
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    // column holding row timestamps (generated when absent)
    #[serde(default = "default_timestamp_column")]
    pub timestamp_column: String,

    #[serde(default)]
    pub model: ModelConfig,

    #[serde(default)]
    pub features: FeatureConfig,

    #[serde(default)]
    pub scoring: ScoringConfig,

    #[serde(default)]
    pub chart: ChartConfig,
}

// Outlier model and artifact location
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ModelConfig {
    // where the trained bundle is persisted
    #[serde(default = "default_model_path")]
    pub path: PathBuf,

    // expected share of anomalous rows
    #[serde(default = "default_contamination")]
    pub contamination: f64,

    #[serde(default = "default_seed")]
    pub seed: u64,

    #[serde(default = "default_estimators")]
    pub n_estimators: usize,

    // rows drawn per tree
    #[serde(default = "default_max_samples")]
    pub max_samples: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FeatureModeKind {
    Fixed,    // exact column names
    Flexible, // keyword match on column names
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FeatureConfig {
    #[serde(default = "default_mode")]
    pub mode: FeatureModeKind,

    // used in fixed mode
    #[serde(default = "default_required")]
    pub required: Vec<String>,

    // used in flexible mode
    #[serde(default = "default_vocabulary")]
    pub vocabulary: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ScoringConfig {
    // score given to rows whose features are not numeric
    #[serde(default)]
    pub invalid_row_score: f64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ChartConfig {
    #[serde(default = "default_max_points")]
    pub max_points: usize,

    // seed for sampling normal rows
    #[serde(default = "default_seed")]
    pub seed: u64,

    #[serde(default = "default_metric_decimals")]
    pub metric_decimals: u32,

    #[serde(default = "default_score_decimals")]
    pub score_decimals: u32,
}

// defualt value helpers for serde
fn default_timestamp_column() -> String {
    "timestamp".to_string()
}

fn default_model_path() -> PathBuf {
    PathBuf::from("models/isolation_forest.json")
}

fn default_contamination() -> f64 {
    0.03
}

fn default_seed() -> u64 {
    42
}

fn default_estimators() -> usize {
    100
}

fn default_max_samples() -> usize {
    256
}

fn default_mode() -> FeatureModeKind {
    FeatureModeKind::Fixed
}

fn default_required() -> Vec<String> {
    DEFAULT_REQUIRED.iter().map(|s| s.to_string()).collect()
}

fn default_vocabulary() -> Vec<String> {
    DEFAULT_VOCABULARY.iter().map(|s| s.to_string()).collect()
}

fn default_max_points() -> usize {
    2000
}

fn default_metric_decimals() -> u32 {
    2
}

fn default_score_decimals() -> u32 {
    4
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            timestamp_column: default_timestamp_column(),
            model: ModelConfig::default(),
            features: FeatureConfig::default(),
            scoring: ScoringConfig::default(),
            chart: ChartConfig::default(),
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            path: default_model_path(),
            contamination: default_contamination(),
            seed: default_seed(),
            n_estimators: default_estimators(),
            max_samples: default_max_samples(),
        }
    }
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            mode: default_mode(),
            required: default_required(),
            vocabulary: default_vocabulary(),
        }
    }
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            invalid_row_score: 0.0,
        }
    }
}

impl Default for ChartConfig {
    fn default() -> Self {
        Self {
            max_points: default_max_points(),
            seed: default_seed(),
            metric_decimals: default_metric_decimals(),
            score_decimals: default_score_decimals(),
        }
    }
}

impl ModelConfig {
    pub fn forest_params(&self) -> ForestParams {
        ForestParams {
            n_estimators: self.n_estimators,
            max_samples: self.max_samples,
            contamination: self.contamination,
            seed: self.seed,
        }
    }
}

impl FeatureConfig {
    pub fn to_mode(&self) -> FeatureMode {
        match self.mode {
            FeatureModeKind::Fixed => FeatureMode::Fixed(self.required.clone()),
            FeatureModeKind::Flexible => FeatureMode::Flexible(self.vocabulary.clone()),
        }
    }
}

impl AppConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.model
            .forest_params()
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;

        if self.timestamp_column.trim().is_empty() {
            return Err(ConfigError::Invalid("timestamp_column is empty".to_string()));
        }
        match self.features.mode {
            FeatureModeKind::Fixed if self.features.required.is_empty() => {
                return Err(ConfigError::Invalid(
                    "fixed feature mode needs at least one required column".to_string(),
                ));
            }
            FeatureModeKind::Flexible if self.features.vocabulary.is_empty() => {
                return Err(ConfigError::Invalid(
                    "flexible feature mode needs a vocabulary".to_string(),
                ));
            }
            _ => {}
        }
        if self.chart.max_points == 0 {
            return Err(ConfigError::Invalid("chart.max_points must be at least 1".to_string()));
        }
        if self.chart.metric_decimals > 10 || self.chart.score_decimals > 10 {
            return Err(ConfigError::Invalid("chart decimals must be at most 10".to_string()));
        }
        Ok(())
    }

    pub fn chart_sampler(&self) -> ChartSampler {
        ChartSampler::new(self.chart.max_points)
            .with_seed(self.chart.seed)
            .with_precision(self.chart.metric_decimals, self.chart.score_decimals)
            .with_timestamp_column(&self.timestamp_column)
    }
}

// Load configuration from a TOML file
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<AppConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    let config: AppConfig = toml::from_str(&content)?;
    config.validate()?;
    Ok(config)
}
