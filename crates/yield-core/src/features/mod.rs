//! Feature engineering: raw records to fixed-schema numeric vectors

mod derived;
mod encoding;
mod engineer;
mod scaling;
mod selection;
mod state;

pub use derived::{default_raw_values, FeatureFrame, YearRange};
pub use encoding::{normalize_category, CategoryEncoder, CATEGORICAL_FIELDS, UNKNOWN_CATEGORY};
pub use engineer::FeatureEngineer;
pub use scaling::{ColumnScaling, UNSCALED_SUFFIXES};
pub use selection::{f_regression, select_k_best};
pub use state::{ColumnParams, FeatureEngineerState, STATE_FORMAT_VERSION};

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Number of features kept by univariate selection
pub const DEFAULT_SELECT_K: usize = 50;

/// Feature engineer configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureConfig {
    /// Fallback values for absent raw numeric fields
    #[serde(default = "default_raw_values")]
    pub defaults: BTreeMap<String, f64>,

    #[serde(default = "default_select_k")]
    pub select_k: usize,
}

fn default_select_k() -> usize {
    DEFAULT_SELECT_K
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            defaults: default_raw_values(),
            select_k: DEFAULT_SELECT_K,
        }
    }
}
