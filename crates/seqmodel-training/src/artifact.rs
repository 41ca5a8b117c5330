//! Versioned, atomically persisted model artifacts.

use crate::error::{TrainError, TrainResult};
use crate::optimize::{FittedModel, OptimizationConfig};
use chrono::{DateTime, Utc};
use seqmodel_core::KmerFeatureExtractor;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::Path;
use tracing::debug;

/// Current artifact schema version. Bump on any incompatible layout change;
/// loading rejects every other version.
pub const SCHEMA_VERSION: u32 = 1;

/// The serialized result of a successful optimization run.
///
/// Created by `fit`, consumed by `estimate`/`predict`, never mutated in
/// place; retraining produces a new artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub schema_version: u32,
    pub created_at: DateTime<Utc>,
    pub weights: Vec<f64>,
    pub bias: f64,
    pub feature_params: KmerFeatureExtractor,
    pub training_config: OptimizationConfig,
    pub dataset_fingerprint: String,
}

impl ModelArtifact {
    #[must_use]
    pub fn new(
        model: FittedModel,
        feature_params: KmerFeatureExtractor,
        training_config: OptimizationConfig,
        dataset_fingerprint: String,
    ) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            created_at: Utc::now(),
            weights: model.weights,
            bias: model.bias,
            feature_params,
            training_config,
            dataset_fingerprint,
        }
    }

    /// The in-memory model this artifact encodes.
    #[must_use]
    pub fn model(&self) -> FittedModel {
        FittedModel { weights: self.weights.clone(), bias: self.bias }
    }

    /// Write the artifact to `path` via temporary-then-rename so an
    /// interrupted write never leaves a partial file under the final name.
    pub fn save(&self, path: &Path) -> TrainResult<()> {
        let dir = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        serde_json::to_writer_pretty(&mut tmp, self)?;
        tmp.flush()?;
        tmp.persist(path).map_err(|e| TrainError::Io(e.error))?;
        debug!(path = %path.display(), "wrote model artifact");
        Ok(())
    }

    /// Load an artifact, rejecting incompatible schema versions before
    /// attempting to interpret the rest of the payload.
    pub fn load(path: &Path) -> TrainResult<Self> {
        if !path.is_file() {
            return Err(TrainError::InputNotFound(path.to_path_buf()));
        }
        let bytes = std::fs::read(path)?;
        let value: serde_json::Value = serde_json::from_slice(&bytes)?;

        let found = value
            .get("schema_version")
            .and_then(serde_json::Value::as_u64)
            .ok_or_else(|| TrainError::IncompatibleModel { found: 0, supported: SCHEMA_VERSION })?
            as u32;
        if found != SCHEMA_VERSION {
            return Err(TrainError::IncompatibleModel { found, supported: SCHEMA_VERSION });
        }

        Ok(serde_json::from_value(value)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn artifact() -> ModelArtifact {
        ModelArtifact::new(
            FittedModel { weights: vec![0.25, -1.5, 3.0], bias: 0.125 },
            KmerFeatureExtractor::new(4, 8),
            OptimizationConfig::default(),
            "abc123".to_string(),
        )
    }

    #[test]
    fn test_save_load_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("model.json");

        let a = artifact();
        a.save(&path).unwrap();
        let b = ModelArtifact::load(&path).unwrap();

        assert_eq!(a.weights, b.weights);
        assert_eq!(a.bias, b.bias);
        assert_eq!(a.feature_params, b.feature_params);
        assert_eq!(a.dataset_fingerprint, b.dataset_fingerprint);
    }

    #[test]
    fn test_round_trip_scores_match_in_process_model() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("model.json");

        let a = artifact();
        let features = vec![0.5, 0.5, -0.25];
        let fresh = a.model().score(&features);

        a.save(&path).unwrap();
        let loaded = ModelArtifact::load(&path).unwrap();
        assert_eq!(loaded.model().score(&features), fresh);
    }

    #[test]
    fn test_wrong_schema_version_is_incompatible() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("model.json");

        let a = artifact();
        a.save(&path).unwrap();

        let mut value: serde_json::Value =
            serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        value["schema_version"] = serde_json::json!(99);
        std::fs::write(&path, serde_json::to_vec(&value).unwrap()).unwrap();

        let err = ModelArtifact::load(&path).unwrap_err();
        assert!(matches!(
            err,
            TrainError::IncompatibleModel { found: 99, supported: SCHEMA_VERSION }
        ));
    }

    #[test]
    fn test_missing_artifact_is_input_not_found() {
        let err = ModelArtifact::load(Path::new("/no/such/model.json")).unwrap_err();
        assert!(matches!(err, TrainError::InputNotFound(_)));
    }

    #[test]
    fn test_save_leaves_no_stray_temp_files() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("model.json");
        artifact().save(&path).unwrap();

        let entries: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 1, "only the final artifact should remain");
    }
}
