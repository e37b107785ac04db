//! Model artifact serialization
//!
//! Binary layout: 4-byte magic `CVBM`, little-endian `u32` format
//! version, then the bincode-encoded [`ModelArtifact`]. A JSON sidecar
//! with the metadata alone can be written next to it.

use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use crate::error::{CvBoostError, Result};
use crate::training::{CatBoostRegressor, TrainingConfig};

pub const MAGIC: &[u8; 4] = b"CVBM";
pub const FORMAT_VERSION: u32 = 1;

/// Describes how a saved model was trained
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetadata {
    pub crate_version: String,
    pub target: String,
    pub feature_names: Vec<String>,
    pub categorical_features: Vec<String>,
    pub tree_count: usize,
    pub best_iteration: Option<usize>,
    /// Mean held-out RMSE after the last cross-validation iteration
    pub cv_rmse: Option<f64>,
}

impl ModelMetadata {
    pub fn new(config: &TrainingConfig, model: &CatBoostRegressor) -> Self {
        Self {
            crate_version: env!("CARGO_PKG_VERSION").to_string(),
            target: config.target_column.clone(),
            feature_names: model.feature_names().to_vec(),
            categorical_features: config.features.categorical().to_vec(),
            tree_count: model.tree_count(),
            best_iteration: model.best_iteration(),
            cv_rmse: None,
        }
    }

    pub fn with_cv_rmse(mut self, rmse: Option<f64>) -> Self {
        self.cv_rmse = rmse;
        self
    }
}

/// A fitted regressor plus its metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub metadata: ModelMetadata,
    pub model: CatBoostRegressor,
}

impl ModelArtifact {
    pub fn new(model: CatBoostRegressor, metadata: ModelMetadata) -> Self {
        Self { metadata, model }
    }

    /// Write the artifact, creating parent directories as needed
    pub fn save(&self, path: &Path) -> Result<PathBuf> {
        if !self.model.is_fitted() {
            return Err(CvBoostError::ModelNotFitted);
        }
        ensure_parent(path)?;

        let payload = bincode::serialize(self)?;
        let mut writer = BufWriter::new(File::create(path)?);
        writer.write_all(MAGIC)?;
        writer.write_all(&FORMAT_VERSION.to_le_bytes())?;
        writer.write_all(&payload)?;
        writer.flush()?;

        Ok(path.to_path_buf())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let mut reader = BufReader::new(File::open(path)?);

        let mut magic = [0u8; 4];
        reader.read_exact(&mut magic).map_err(|_| truncated(path))?;
        if &magic != MAGIC {
            return Err(CvBoostError::SerializationError(format!(
                "{} is not a cvboost model",
                path.display()
            )));
        }

        let mut version = [0u8; 4];
        reader.read_exact(&mut version).map_err(|_| truncated(path))?;
        let version = u32::from_le_bytes(version);
        if version != FORMAT_VERSION {
            return Err(CvBoostError::SerializationError(format!(
                "unsupported model format version {} (expected {})",
                version, FORMAT_VERSION
            )));
        }

        let mut payload = Vec::new();
        reader.read_to_end(&mut payload)?;
        Ok(bincode::deserialize(&payload)?)
    }

    /// Write the metadata as pretty JSON
    pub fn save_metadata_json(&self, path: &Path) -> Result<PathBuf> {
        ensure_parent(path)?;
        let file = File::create(path)?;
        serde_json::to_writer_pretty(BufWriter::new(file), &self.metadata)?;
        Ok(path.to_path_buf())
    }
}

/// Sidecar path for a model file: the full file name plus `.json`.
///
/// `model.cbm` gets `model.cbm.json`, so the sidecar never lands on the
/// model itself even when the model name already ends in `.json`.
pub fn metadata_path(model_path: &Path) -> PathBuf {
    let mut name = model_path.as_os_str().to_os_string();
    name.push(".json");
    PathBuf::from(name)
}

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    Ok(())
}

fn truncated(path: &Path) -> CvBoostError {
    CvBoostError::SerializationError(format!("{} is truncated", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::training::{CatBoostConfig, FeatureColumn, FeatureSpec, Hyperparameters, Pool};
    use ndarray::Array1;
    use tempfile::tempdir;

    fn fitted_artifact() -> (ModelArtifact, Pool) {
        let labels: Vec<String> = (0..20).map(|i| ["a", "b"][i % 2].to_string()).collect();
        let price: Vec<f64> = (0..20).map(|i| i as f64).collect();
        let target: Vec<f64> = (0..20).map(|i| 80.0 + (i % 2) as f64 * 5.0 + i as f64 * 0.1).collect();
        let pool = Pool::new(
            vec!["price".to_string(), "winery".to_string()],
            vec![FeatureColumn::Numeric(price), FeatureColumn::Categorical(labels)],
            Some(Array1::from_vec(target)),
        )
        .unwrap();

        let spec = FeatureSpec::new(["price", "winery"], ["winery"]).unwrap();
        let config = TrainingConfig::new("points", spec, Hyperparameters::new(0.1, 3, 1.0));

        let mut model = CatBoostRegressor::new(CatBoostConfig {
            iterations: 20,
            ..config.model_config()
        });
        model.fit(&pool).unwrap();

        let metadata = ModelMetadata::new(&config, &model).with_cv_rmse(Some(1.25));
        (ModelArtifact::new(model, metadata), pool)
    }

    #[test]
    fn test_save_load_predictions_match() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("model.cbm");
        let (artifact, pool) = fitted_artifact();

        artifact.save(&path).unwrap();
        let loaded = ModelArtifact::load(&path).unwrap();

        assert_eq!(loaded.metadata, artifact.metadata);
        assert_eq!(loaded.metadata.tree_count, 20);
        assert_eq!(
            loaded.model.predict(&pool).unwrap(),
            artifact.model.predict(&pool).unwrap()
        );
    }

    #[test]
    fn test_rejects_foreign_files() {
        let dir = tempdir().unwrap();

        let path = dir.path().join("other.bin");
        fs::write(&path, b"NOPE\x01\x00\x00\x00rest").unwrap();
        assert!(matches!(
            ModelArtifact::load(&path),
            Err(CvBoostError::SerializationError(_))
        ));

        let path = dir.path().join("future.cbm");
        fs::write(&path, b"CVBM\x09\x00\x00\x00").unwrap();
        assert!(matches!(
            ModelArtifact::load(&path),
            Err(CvBoostError::SerializationError(_))
        ));

        let path = dir.path().join("short.cbm");
        fs::write(&path, b"CV").unwrap();
        assert!(ModelArtifact::load(&path).is_err());
    }

    #[test]
    fn test_unfitted_model_is_not_saved() {
        let dir = tempdir().unwrap();
        let spec = FeatureSpec::new(["price"], Vec::<String>::new()).unwrap();
        let config = TrainingConfig::new("points", spec, Hyperparameters::default());
        let model = CatBoostRegressor::new(config.model_config());
        let artifact = ModelArtifact::new(model.clone(), ModelMetadata::new(&config, &model));

        assert!(matches!(
            artifact.save(&dir.path().join("m.cbm")),
            Err(CvBoostError::ModelNotFitted)
        ));
    }

    #[test]
    fn test_metadata_json() {
        let dir = tempdir().unwrap();
        let (artifact, _) = fitted_artifact();
        let path = artifact.save_metadata_json(&dir.path().join("model.json")).unwrap();

        let json: serde_json::Value = serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(json["target"], "points");
        assert_eq!(json["categorical_features"][0], "winery");
    }

    #[test]
    fn test_metadata_path_keeps_model_name() {
        assert_eq!(metadata_path(Path::new("out/model.cbm")), PathBuf::from("out/model.cbm.json"));
        assert_eq!(metadata_path(Path::new("out/model.tar.gz")), PathBuf::from("out/model.tar.gz.json"));
        assert_eq!(metadata_path(Path::new("model")), PathBuf::from("model.json"));
    }

    #[test]
    fn test_sidecar_does_not_replace_json_named_model() {
        let dir = tempdir().unwrap();
        let (artifact, _) = fitted_artifact();

        let model_path = artifact.save(&dir.path().join("model.json")).unwrap();
        artifact.save_metadata_json(&metadata_path(&model_path)).unwrap();

        let loaded = ModelArtifact::load(&model_path).unwrap();
        assert_eq!(loaded.metadata.tree_count, artifact.metadata.tree_count);
        assert!(dir.path().join("model.json.json").exists());
    }
}
