use crate::model::error::ModelError;
use crate::model::training::ModelMetrics;
use bincode::config::{Configuration, Fixint, LittleEndian};
use chrono::{DateTime, Utc};
use log::info;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

const ARTIFACT_FILE_NAME: &str = "model.bin";
const METADATA_FILE_NAME: &str = "metadata.json";
const BINCODE_CONFIG: Configuration<LittleEndian, Fixint> =
    bincode::config::standard().with_fixed_int_encoding();

/// Which registered version of a model to load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelVersion {
    Latest,
    Exact(u32),
}

/// What the registry records next to every artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegisteredModel {
    pub name: String,
    pub version: u32,
    /// [`crate::Regressor::name`] of the stored model.
    pub regressor: String,
    pub metrics: ModelMetrics,
    pub registered_at: DateTime<Utc>,
}

/// Versioned storage of trained model artifacts and their evaluation metrics.
pub trait ModelRegistry {
    /// Stores a new version of `name` and returns its version number.
    fn register<M: Serialize>(
        &self,
        name: &str,
        regressor: &str,
        model: &M,
        metrics: &ModelMetrics,
    ) -> Result<RegisteredModel, ModelError>;

    /// Loads an artifact together with its registry record.
    fn load<M: DeserializeOwned>(
        &self,
        name: &str,
        version: ModelVersion,
    ) -> Result<(RegisteredModel, M), ModelError>;

    /// Reads only the registry record of a version.
    fn describe(&self, name: &str, version: ModelVersion) -> Result<RegisteredModel, ModelError>;
}

/// A [`ModelRegistry`] laid out as `<root>/<name>/v<N>/{model.bin,metadata.json}`.
/// Versions start at 1 and increase by one per registration.
#[derive(Debug, Clone)]
pub struct LocalModelRegistry {
    root: PathBuf,
}

impl LocalModelRegistry {
    pub fn new(root: &Path) -> Result<Self, ModelError> {
        fs::create_dir_all(root).map_err(|e| ModelError::DirCreation(root.to_path_buf(), e))?;
        Ok(Self {
            root: root.to_path_buf(),
        })
    }

    fn version_dir(&self, name: &str, version: u32) -> PathBuf {
        self.root.join(name).join(format!("v{version}"))
    }

    /// All registered versions of `name`, ascending.
    pub fn versions(&self, name: &str) -> Result<Vec<u32>, ModelError> {
        let model_dir = self.root.join(name);
        if !model_dir.exists() {
            return Ok(Vec::new());
        }
        let entries =
            fs::read_dir(&model_dir).map_err(|e| ModelError::RegistryRead(model_dir.clone(), e))?;
        let mut versions = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| ModelError::RegistryRead(model_dir.clone(), e))?;
            let file_name = entry.file_name();
            if let Some(version) = file_name
                .to_str()
                .and_then(|n| n.strip_prefix('v'))
                .and_then(|n| n.parse::<u32>().ok())
            {
                if entry.path().join(METADATA_FILE_NAME).exists() {
                    versions.push(version);
                }
            }
        }
        versions.sort_unstable();
        Ok(versions)
    }

    fn resolve(&self, name: &str, version: ModelVersion) -> Result<u32, ModelError> {
        let versions = self.versions(name)?;
        match version {
            ModelVersion::Latest => versions
                .last()
                .copied()
                .ok_or_else(|| ModelError::ModelNotFound(name.to_string())),
            ModelVersion::Exact(v) if versions.contains(&v) => Ok(v),
            ModelVersion::Exact(v) => Err(ModelError::VersionNotFound {
                name: name.to_string(),
                version: v,
            }),
        }
    }
}

impl ModelRegistry for LocalModelRegistry {
    fn register<M: Serialize>(
        &self,
        name: &str,
        regressor: &str,
        model: &M,
        metrics: &ModelMetrics,
    ) -> Result<RegisteredModel, ModelError> {
        let version = self.versions(name)?.last().map_or(1, |v| v + 1);
        let dir = self.version_dir(name, version);
        fs::create_dir_all(&dir).map_err(|e| ModelError::DirCreation(dir.clone(), e))?;

        let artifact = bincode::serde::encode_to_vec(model, BINCODE_CONFIG)
            .map_err(|e| ModelError::ArtifactEncode(Box::new(e)))?;
        let artifact_path = dir.join(ARTIFACT_FILE_NAME);
        fs::write(&artifact_path, artifact)
            .map_err(|e| ModelError::RegistryWrite(artifact_path, e))?;

        let record = RegisteredModel {
            name: name.to_string(),
            version,
            regressor: regressor.to_string(),
            metrics: metrics.clone(),
            registered_at: Utc::now(),
        };
        // Metadata goes last: a version only counts once this file exists.
        let metadata_path = dir.join(METADATA_FILE_NAME);
        fs::write(&metadata_path, serde_json::to_vec_pretty(&record)?)
            .map_err(|e| ModelError::RegistryWrite(metadata_path, e))?;

        info!(
            "Registered {} v{} ({}), MAE {:.3}",
            name, version, regressor, metrics.mae
        );
        Ok(record)
    }

    fn load<M: DeserializeOwned>(
        &self,
        name: &str,
        version: ModelVersion,
    ) -> Result<(RegisteredModel, M), ModelError> {
        let record = self.describe(name, version)?;
        let artifact_path = self
            .version_dir(name, record.version)
            .join(ARTIFACT_FILE_NAME);
        let bytes = fs::read(&artifact_path)
            .map_err(|e| ModelError::RegistryRead(artifact_path.clone(), e))?;
        let (model, _) = bincode::serde::decode_from_slice::<M, _>(&bytes, BINCODE_CONFIG)
            .map_err(|e| ModelError::ArtifactDecode(artifact_path, Box::new(e)))?;
        Ok((record, model))
    }

    fn describe(&self, name: &str, version: ModelVersion) -> Result<RegisteredModel, ModelError> {
        let version = self.resolve(name, version)?;
        let metadata_path = self.version_dir(name, version).join(METADATA_FILE_NAME);
        let bytes = fs::read(&metadata_path)
            .map_err(|e| ModelError::RegistryRead(metadata_path.clone(), e))?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::regressor::BaselineModel;

    fn metrics(mae: f64) -> ModelMetrics {
        ModelMetrics {
            mae,
            rmse: mae * 1.5,
            n_train: 80,
            n_test: 20,
        }
    }

    #[test]
    fn test_versions_increment_and_latest_loads_newest() {
        let dir = tempfile::tempdir().unwrap();
        let registry = LocalModelRegistry::new(dir.path()).unwrap();

        let first = registry
            .register("bikes", "baseline", &BaselineModel::PreviousHour, &metrics(3.0))
            .unwrap();
        let second = registry
            .register(
                "bikes",
                "baseline",
                &BaselineModel::LagMean { window: 3 },
                &metrics(2.0),
            )
            .unwrap();
        assert_eq!((first.version, second.version), (1, 2));
        assert_eq!(registry.versions("bikes").unwrap(), [1, 2]);

        let (record, model): (_, BaselineModel) =
            registry.load("bikes", ModelVersion::Latest).unwrap();
        assert_eq!(record.version, 2);
        assert_eq!(model, BaselineModel::LagMean { window: 3 });

        let (record, model): (_, BaselineModel) =
            registry.load("bikes", ModelVersion::Exact(1)).unwrap();
        assert_eq!(record.metrics, metrics(3.0));
        assert_eq!(model, BaselineModel::PreviousHour);
    }

    #[test]
    fn test_unknown_model_and_version() {
        let dir = tempfile::tempdir().unwrap();
        let registry = LocalModelRegistry::new(dir.path()).unwrap();
        assert!(matches!(
            registry.describe("bikes", ModelVersion::Latest),
            Err(ModelError::ModelNotFound(_))
        ));
        registry
            .register("bikes", "baseline", &BaselineModel::PreviousHour, &metrics(1.0))
            .unwrap();
        assert!(matches!(
            registry.describe("bikes", ModelVersion::Exact(4)),
            Err(ModelError::VersionNotFound { version: 4, .. })
        ));
    }
}
