//! Model adapter over interchangeable regressors

mod artifact;
mod inference;
mod linear;
mod tree;

pub use artifact::{ModelArtifact, ModelSpec};
pub use inference::OnnxRegressor;
pub use linear::LinearRegressor;
pub use tree::{Aggregation, Tree, TreeEnsemble, TreeNode};

use crate::error::{CoreError, CoreResult};
use crate::models::{FeatureAttribution, FeatureVector, ModelMetadata};
use crate::observability::{CoreMetrics, StructuredLogger};
use std::sync::Arc;

/// Number of attributions reported per prediction
pub const DEFAULT_TOP_K: usize = 5;

/// Importance given to each feature when the model exposes none
pub const NOMINAL_IMPORTANCE: f64 = 0.1;

/// A trained regression model over a scaled feature vector
pub trait Regressor: Send + Sync {
    fn predict(&self, features: &[f64]) -> anyhow::Result<f64>;

    /// Width of the input vector the model was trained on
    fn n_features(&self) -> usize;

    /// Per-feature importances in input order, if the algorithm has them
    fn feature_importances(&self) -> Option<&[f64]> {
        None
    }

    fn kind(&self) -> &'static str;
}

/// What the bound model can report beyond a point estimate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    Importances,
    PointOnly,
}

/// Point estimate plus explanation for one vector
#[derive(Debug, Clone, PartialEq)]
pub struct ModelOutput {
    /// Never negative
    pub estimate: f64,
    pub attributions: Vec<FeatureAttribution>,
    /// Sum of all clamped importances; `None` for point-only models
    pub importance_sum: Option<f64>,
}

struct BoundModel {
    regressor: Arc<dyn Regressor>,
    metadata: ModelMetadata,
    capability: Capability,
    importances: Vec<f64>,
}

/// Wraps whichever regressor is bound behind one `predict` contract.
///
/// Capability is resolved once in [`bind`](Self::bind); the adapter is
/// immutable afterwards and safe to share across threads.
pub struct ModelAdapter {
    bound: Option<BoundModel>,
    top_k: usize,
}

impl ModelAdapter {
    pub fn unbound() -> Self {
        Self {
            bound: None,
            top_k: DEFAULT_TOP_K,
        }
    }

    pub fn bind(regressor: Arc<dyn Regressor>, metadata: ModelMetadata) -> Self {
        let (capability, importances) = match regressor.feature_importances() {
            Some(imp) if imp.len() == regressor.n_features() => (
                Capability::Importances,
                imp.iter().map(|v| if v.is_finite() { v.max(0.0) } else { 0.0 }).collect(),
            ),
            _ => (Capability::PointOnly, Vec::new()),
        };

        StructuredLogger::new("model_adapter").log_model_bound(
            &metadata.model_name,
            regressor.kind(),
            regressor.n_features(),
            capability == Capability::Importances,
        );
        CoreMetrics::new().set_model_info(&metadata.model_name, regressor.kind());

        Self {
            bound: Some(BoundModel {
                regressor,
                metadata,
                capability,
                importances,
            }),
            top_k: DEFAULT_TOP_K,
        }
    }

    /// Build from a JSON artifact on disk
    pub fn from_artifact_file(path: &std::path::Path) -> anyhow::Result<Self> {
        let artifact = ModelArtifact::load(path)?;
        let base_dir = path.parent().unwrap_or_else(|| std::path::Path::new("."));
        let regressor = artifact.build_regressor(base_dir)?;
        Ok(Self::bind(regressor, artifact.metadata))
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k.max(1);
        self
    }

    pub fn is_bound(&self) -> bool {
        self.bound.is_some()
    }

    pub fn capability(&self) -> Option<Capability> {
        self.bound.as_ref().map(|b| b.capability)
    }

    pub fn metadata(&self) -> Option<&ModelMetadata> {
        self.bound.as_ref().map(|b| &b.metadata)
    }

    pub fn n_features(&self) -> Option<usize> {
        self.bound.as_ref().map(|b| b.regressor.n_features())
    }

    pub fn kind(&self) -> Option<&'static str> {
        self.bound.as_ref().map(|b| b.regressor.kind())
    }

    pub fn predict(&self, features: &FeatureVector) -> CoreResult<ModelOutput> {
        let bound = self.bound.as_ref().ok_or(CoreError::ModelNotLoaded)?;
        let expected = bound.regressor.n_features();
        if features.len() != expected {
            return Err(CoreError::FeatureSchemaMismatch {
                expected,
                got: features.len(),
            });
        }

        let raw = bound
            .regressor
            .predict(&features.values)
            .map_err(|e| CoreError::Inference(format!("{e:#}")))?;
        if !raw.is_finite() {
            return Err(CoreError::Inference(format!(
                "model returned non-finite estimate {raw}"
            )));
        }

        let attributions = match bound.capability {
            Capability::Importances => ranked_indices(&bound.importances)
                .into_iter()
                .take(self.top_k)
                .map(|i| attribution(features, i, bound.importances[i]))
                .collect(),
            Capability::PointOnly => (0..features.len().min(self.top_k))
                .map(|i| attribution(features, i, NOMINAL_IMPORTANCE))
                .collect(),
        };
        let importance_sum = match bound.capability {
            Capability::Importances => Some(bound.importances.iter().sum()),
            Capability::PointOnly => None,
        };

        Ok(ModelOutput {
            estimate: raw.max(0.0),
            attributions,
            importance_sum,
        })
    }

    /// Every feature with its importance, most important first.
    ///
    /// `None` when unbound or the model exposes no importances.
    pub fn importance_report(&self, names: &[String]) -> Option<Vec<(String, f64)>> {
        let bound = self.bound.as_ref()?;
        if bound.capability != Capability::Importances {
            return None;
        }
        Some(
            ranked_indices(&bound.importances)
                .into_iter()
                .map(|i| {
                    let name = names
                        .get(i)
                        .cloned()
                        .unwrap_or_else(|| format!("feature_{i}"));
                    (name, bound.importances[i])
                })
                .collect(),
        )
    }
}

/// Indices sorted by importance descending; ties keep input order
fn ranked_indices(importances: &[f64]) -> Vec<usize> {
    let mut idx: Vec<usize> = (0..importances.len()).collect();
    idx.sort_by(|&a, &b| importances[b].total_cmp(&importances[a]).then(a.cmp(&b)));
    idx
}

fn attribution(features: &FeatureVector, i: usize, importance: f64) -> FeatureAttribution {
    FeatureAttribution {
        feature: features.schema.names[i].clone(),
        value: features.raw_values[i],
        importance,
    }
}
