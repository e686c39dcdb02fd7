// Error types for the detection pipeline

use crate::forest::ForestError;
use std::path::PathBuf;
use thiserror::Error;

/// Schema resolution failures
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FeatureError {
    #[error("required columns not found: {}", .0.join(", "))]
    MissingColumns(Vec<String>),

    #[error("no usable feature columns found")]
    NoUsableFeatures,
}

/// Persisted model bundle failures
#[derive(Error, Debug)]
pub enum ArtifactError {
    #[error("no model artifact at {}", .0.display())]
    NotFound(PathBuf),

    #[error("model artifact is corrupt: {0}")]
    Corrupt(String),

    #[error("artifact I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Error, Debug)]
pub enum DetectorError {
    #[error(transparent)]
    Feature(#[from] FeatureError),

    #[error("no rows left for training after numeric cleaning")]
    EmptyTrainingSet,

    #[error("dataset is missing columns the model was trained on: {}", .missing.join(", "))]
    FeatureMismatch { missing: Vec<String> },

    #[error(transparent)]
    Artifact(#[from] ArtifactError),

    #[error("model inference failed: {0}")]
    Inference(#[from] ForestError),

    #[error("training failed: {0}")]
    TrainingFailed(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("no model has been trained or loaded")]
    NotTrained,
}

impl DetectorError {
    pub(crate) fn training_failed<E>(cause: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        DetectorError::TrainingFailed(Box::new(cause))
    }
}
