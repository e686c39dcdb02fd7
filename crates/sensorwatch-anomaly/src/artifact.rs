//! Persisted model bundle
//!
//! The fitted forest and the feature list it was trained on always travel
//! together: column order and identity must match training, so a model read
//! back without its features is rejected as corrupt.

use crate::error::ArtifactError;
use crate::features::FeatureSet;
use crate::forest::IsolationForest;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub model: IsolationForest,
    pub feature_list: FeatureSet,
    pub contamination: f64,
    pub seed: u64,
    pub training_rows: usize,
}

// on-disk shape, every field optional so a partial bundle can be reported
#[derive(Deserialize)]
struct StoredBundle {
    model: Option<IsolationForest>,
    feature_list: Option<FeatureSet>,
    contamination: Option<f64>,
    seed: Option<u64>,
    training_rows: Option<usize>,
}

impl TryFrom<StoredBundle> for ModelArtifact {
    type Error = ArtifactError;

    fn try_from(bundle: StoredBundle) -> Result<Self, Self::Error> {
        let model = bundle
            .model
            .ok_or_else(|| ArtifactError::Corrupt("bundle has no model".to_string()))?;
        let feature_list = bundle
            .feature_list
            .ok_or_else(|| ArtifactError::Corrupt("bundle has no feature list".to_string()))?;

        if model.n_features() != feature_list.len() {
            return Err(ArtifactError::Corrupt(format!(
                "model expects {} features, feature list has {}",
                model.n_features(),
                feature_list.len()
            )));
        }

        Ok(Self {
            model,
            feature_list,
            contamination: bundle.contamination.unwrap_or_default(),
            seed: bundle.seed.unwrap_or_default(),
            training_rows: bundle.training_rows.unwrap_or_default(),
        })
    }
}

/// File-backed slot for the single persisted artifact
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    path: PathBuf,
}

impl ArtifactStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Write the bundle next to its final location, then rename over it so a
    /// reader never sees a half-written file.
    pub fn save(&self, artifact: &ModelArtifact) -> Result<(), ArtifactError> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)?;
        }

        let bytes = serde_json::to_vec(artifact)
            .map_err(|e| ArtifactError::Corrupt(format!("failed to encode bundle: {}", e)))?;

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        fs::write(&tmp, &bytes)?;
        if let Err(e) = fs::rename(&tmp, &self.path) {
            let _ = fs::remove_file(&tmp);
            return Err(e.into());
        }

        debug!(path = %self.path.display(), bytes = bytes.len(), "Model artifact written");
        Ok(())
    }

    pub fn load(&self) -> Result<ModelArtifact, ArtifactError> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ArtifactError::NotFound(self.path.clone()));
            }
            Err(e) => return Err(e.into()),
        };

        let bundle: StoredBundle = serde_json::from_slice(&bytes)
            .map_err(|e| ArtifactError::Corrupt(e.to_string()))?;
        ModelArtifact::try_from(bundle)
    }
}
