//! The detector service: owns the single active model

use crate::artifact::{ArtifactStore, ModelArtifact};
use crate::config::AppConfig;
use crate::error::{DetectorError, FeatureError};
use crate::features::FeatureSet;
use crate::forest::{ForestParams, IsolationForest};
use crate::predict::{self, PredictionResult};
use parking_lot::{Mutex, RwLock};
use sensorwatch_core::Dataset;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

/// Health view of the detector
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetectorStatus {
    pub model_loaded: bool,
    pub features: Vec<String>,
    pub training_rows: usize,
    pub contamination: Option<f64>,
    pub model_path: PathBuf,
}

/// Trains, persists, reloads and serves one isolation forest.
///
/// Readers clone the active `Arc` and score without holding the lock, so a
/// concurrent retrain never blocks or tears an in-flight prediction.
pub struct AnomalyDetector {
    store: ArtifactStore,
    invalid_row_score: f64,
    active: RwLock<Option<Arc<ModelArtifact>>>,
    // serializes persist + swap so disk and memory agree on the last writer
    publish: Mutex<()>,
}

impl AnomalyDetector {
    pub fn new(store: ArtifactStore) -> Self {
        Self {
            store,
            invalid_row_score: 0.0,
            active: RwLock::new(None),
            publish: Mutex::new(()),
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(ArtifactStore::new(config.model.path.clone()))
            .with_invalid_row_score(config.scoring.invalid_row_score)
    }

    pub fn with_invalid_row_score(mut self, score: f64) -> Self {
        self.invalid_row_score = score;
        self
    }

    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    pub fn train(
        &self,
        dataset: &Dataset,
        features: &FeatureSet,
        params: &ForestParams,
    ) -> Result<Arc<ModelArtifact>, DetectorError> {
        let matrix = predict::project(dataset, features)
            .map_err(|missing| DetectorError::Feature(FeatureError::MissingColumns(missing)))?;

        if matrix.values.is_empty() {
            warn!(rows = dataset.len(), "Training aborted, no fully numeric rows");
            return Err(DetectorError::EmptyTrainingSet);
        }

        let model =
            IsolationForest::fit(&matrix.values, params).map_err(DetectorError::training_failed)?;
        let artifact = Arc::new(ModelArtifact {
            model,
            feature_list: features.clone(),
            contamination: params.contamination,
            seed: params.seed,
            training_rows: matrix.values.len(),
        });

        {
            let _guard = self.publish.lock();
            self.store
                .save(&artifact)
                .map_err(DetectorError::training_failed)?;
            *self.active.write() = Some(Arc::clone(&artifact));
        }

        info!(
            rows = artifact.training_rows,
            dropped = dataset.len() - artifact.training_rows,
            features = ?features.columns(),
            contamination = params.contamination,
            path = %self.store.path().display(),
            "Model trained and saved"
        );
        Ok(artifact)
    }

    /// Re-read the persisted artifact and make it active. A failed load leaves
    /// the current model in place.
    pub fn load(&self) -> Result<Arc<ModelArtifact>, DetectorError> {
        let _guard = self.publish.lock();
        let artifact = Arc::new(self.store.load()?);
        *self.active.write() = Some(Arc::clone(&artifact));

        info!(
            features = ?artifact.feature_list.columns(),
            path = %self.store.path().display(),
            "Model loaded"
        );
        Ok(artifact)
    }

    pub fn predict(&self, dataset: &Dataset) -> Result<PredictionResult, DetectorError> {
        let artifact = self.active().ok_or(DetectorError::NotTrained)?;
        predict::predict(dataset, &artifact, self.invalid_row_score)
    }

    pub fn active(&self) -> Option<Arc<ModelArtifact>> {
        self.active.read().clone()
    }

    pub fn is_trained(&self) -> bool {
        self.active.read().is_some()
    }

    pub fn status(&self) -> DetectorStatus {
        let active = self.active();
        DetectorStatus {
            model_loaded: active.is_some(),
            features: active
                .as_ref()
                .map(|a| a.feature_list.columns().to_vec())
                .unwrap_or_default(),
            training_rows: active.as_ref().map_or(0, |a| a.training_rows),
            contamination: active.as_ref().map(|a| a.contamination),
            model_path: self.store.path().to_path_buf(),
        }
    }
}
