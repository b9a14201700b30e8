//! Subcommand implementations

pub mod fit;
pub mod inspect;
pub mod predict;

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use std::path::Path;
use std::sync::Arc;
use tracing::info;
use yield_core::{FeatureEngineerState, ModelAdapter, YieldPipeline};

use crate::config::CliConfig;

/// Load the frozen feature state and model artifact into a ready pipeline
pub fn load_pipeline(
    config: &CliConfig,
    state_path: &Path,
    model_path: &Path,
) -> Result<YieldPipeline> {
    let state = FeatureEngineerState::load(state_path)?;
    let adapter = ModelAdapter::from_artifact_file(model_path)
        .with_context(|| format!("Failed to load model artifact {}", model_path.display()))?
        .with_top_k(config.top_k);

    info!(
        state = %state_path.display(),
        model = %model_path.display(),
        fingerprint = %state.fingerprint(),
        "Loaded pipeline artifacts"
    );

    let pipeline = YieldPipeline::new(Arc::new(state), Arc::new(adapter), config.pipeline.clone())?;
    Ok(pipeline)
}

pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))
}
