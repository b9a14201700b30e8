//! Configuration management for the CLI

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use yield_core::predictor::DEFAULT_TOP_K;
use yield_core::{FeatureConfig, PipelineConfig};

/// Settings shared by every subcommand.
///
/// Read from an optional file (JSON, TOML or YAML by extension), then
/// overridden by `YIELD_`-prefixed environment variables with `__` between
/// nesting levels, e.g. `YIELD_PIPELINE__VALIDATION__MIN_YEAR=2005`.
#[derive(Debug, Clone, Deserialize)]
pub struct CliConfig {
    #[serde(default)]
    pub pipeline: PipelineConfig,

    #[serde(default)]
    pub features: FeatureConfig,

    /// Attributions reported per prediction
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

fn default_top_k() -> usize {
    DEFAULT_TOP_K
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            pipeline: PipelineConfig::default(),
            features: FeatureConfig::default(),
            top_k: default_top_k(),
        }
    }
}

impl CliConfig {
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }
        let config = builder
            .add_source(
                config::Environment::with_prefix("YIELD")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to read configuration")?;

        config
            .try_deserialize()
            .context("Failed to parse configuration")
    }
}
