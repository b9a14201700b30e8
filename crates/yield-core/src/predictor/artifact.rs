//! JSON model artifacts: attribution metadata plus a model description

use super::linear::LinearRegressor;
use super::tree::TreeEnsemble;
use super::inference::OnnxRegressor;
use super::Regressor;
use crate::models::ModelMetadata;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ModelSpec {
    TreeEnsemble(TreeEnsemble),
    Linear(LinearRegressor),
    /// Graph stored next to the artifact; relative paths resolve against it
    Onnx { path: PathBuf, n_features: usize },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub metadata: ModelMetadata,
    pub model: ModelSpec,
}

impl ModelArtifact {
    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read model artifact {}", path.display()))?;
        let artifact: Self = serde_json::from_str(&json)
            .with_context(|| format!("Failed to parse model artifact {}", path.display()))?;
        Ok(artifact)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let json =
            serde_json::to_string_pretty(self).context("Failed to serialize model artifact")?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write model artifact {}", path.display()))?;
        Ok(())
    }

    /// Validate the description and build an executable regressor.
    ///
    /// `base_dir` anchors relative ONNX paths.
    pub fn build_regressor(&self, base_dir: &Path) -> Result<Arc<dyn Regressor>> {
        let regressor: Arc<dyn Regressor> = match &self.model {
            ModelSpec::TreeEnsemble(ensemble) => {
                ensemble.validate().context("Invalid tree ensemble")?;
                Arc::new(ensemble.clone())
            }
            ModelSpec::Linear(linear) => {
                linear.validate().context("Invalid linear model")?;
                Arc::new(linear.clone())
            }
            ModelSpec::Onnx { path, n_features } => {
                let resolved = if path.is_absolute() {
                    path.clone()
                } else {
                    base_dir.join(path)
                };
                Arc::new(OnnxRegressor::from_file(&resolved, *n_features)?)
            }
        };

        if !self.metadata.feature_names.is_empty()
            && self.metadata.feature_names.len() != regressor.n_features()
        {
            anyhow::bail!(
                "metadata lists {} feature names but the model takes {}",
                self.metadata.feature_names.len(),
                regressor.n_features()
            );
        }

        info!(
            model_name = %self.metadata.model_name,
            kind = regressor.kind(),
            n_features = regressor.n_features(),
            "Model artifact loaded"
        );
        Ok(regressor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn linear_artifact() -> ModelArtifact {
        ModelArtifact {
            metadata: ModelMetadata {
                model_name: "ridge-v1".to_string(),
                training_date: Some("2024-06-01".to_string()),
                metrics: BTreeMap::from([("r2".to_string(), 0.71)]),
                feature_names: vec!["a".to_string(), "b".to_string()],
            },
            model: ModelSpec::Linear(LinearRegressor {
                intercept: 3.0,
                coefficients: vec![0.2, 0.1],
            }),
        }
    }

    #[test]
    fn test_save_load_and_build() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");
        linear_artifact().save(&path).unwrap();

        let loaded = ModelArtifact::load(&path).unwrap();
        assert_eq!(loaded.metadata.model_name, "ridge-v1");
        let regressor = loaded.build_regressor(dir.path()).unwrap();
        assert_eq!(regressor.kind(), "linear");
        assert!((regressor.predict(&[1.0, 1.0]).unwrap() - 3.3).abs() < 1e-12);
    }

    #[test]
    fn test_tagged_json_format() {
        let json = r#"{
            "metadata": {"model_name": "forest"},
            "model": {
                "kind": "tree_ensemble",
                "n_features": 1,
                "aggregation": "mean",
                "trees": [{"nodes": [{"type": "leaf", "value": 2.5}]}],
                "feature_importances": [1.0]
            }
        }"#;
        let artifact: ModelArtifact = serde_json::from_str(json).unwrap();
        let regressor = artifact.build_regressor(Path::new(".")).unwrap();
        assert_eq!(regressor.feature_importances(), Some(&[1.0][..]));
        assert!((regressor.predict(&[0.0]).unwrap() - 2.5).abs() < 1e-12);
    }

    #[test]
    fn test_metadata_width_must_match_model() {
        let mut artifact = linear_artifact();
        artifact.metadata.feature_names.push("c".to_string());
        assert!(artifact.build_regressor(Path::new(".")).is_err());
    }

    #[test]
    fn test_missing_onnx_graph_fails_to_build() {
        let artifact = ModelArtifact {
            metadata: ModelMetadata::default(),
            model: ModelSpec::Onnx {
                path: PathBuf::from("missing.onnx"),
                n_features: 3,
            },
        };
        let dir = tempfile::tempdir().unwrap();
        assert!(artifact.build_regressor(dir.path()).is_err());
    }
}
