//! Frozen output of a feature engineer fit

use super::derived::{FeatureFrame, YearRange};
use super::encoding::CategoryEncoder;
use super::scaling::ColumnScaling;
use crate::error::{CoreError, CoreResult};
use crate::models::{FeatureSchema, FeatureVector};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

pub const STATE_FORMAT_VERSION: u32 = 1;

/// Serve-time parameters of one selected column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnParams {
    pub name: String,
    pub median: f64,
    pub scaling: ColumnScaling,
}

/// How a column the frame does not carry is treated during assembly
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum AbsentColumn {
    /// Fit time: a record lacking a column gets the median
    FillMedian,
    /// Serve time: the schema cannot be produced
    Reject,
}

/// Everything fixed at fit time and needed to transform one record.
///
/// Immutable after construction; share it behind an `Arc`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureEngineerState {
    pub format_version: u32,
    pub schema: Arc<FeatureSchema>,
    pub columns: Vec<ColumnParams>,
    pub encoders: Vec<CategoryEncoder>,
    pub defaults: BTreeMap<String, f64>,
    pub year_range: Option<YearRange>,
    pub n_samples: usize,
    pub fitted_at: i64,
}

impl FeatureEngineerState {
    pub fn fingerprint(&self) -> &str {
        &self.schema.fingerprint
    }

    pub fn feature_names(&self) -> &[String] {
        &self.schema.names
    }

    pub fn encoder(&self, field: &str) -> Option<&CategoryEncoder> {
        self.encoders.iter().find(|e| e.field == field)
    }

    /// Check internal consistency of a state that came from disk
    pub fn validate(&self) -> CoreResult<()> {
        if self.format_version != STATE_FORMAT_VERSION {
            return Err(CoreError::Artifact(format!(
                "unsupported feature state version {}",
                self.format_version
            )));
        }
        if self.columns.len() != self.schema.len() {
            return Err(CoreError::Artifact(format!(
                "feature state has {} column parameters for {} features",
                self.columns.len(),
                self.schema.len()
            )));
        }
        if self
            .columns
            .iter()
            .zip(&self.schema.names)
            .any(|(c, n)| &c.name != n)
        {
            return Err(CoreError::Artifact(
                "column parameters are out of schema order".to_string(),
            ));
        }
        let expected = FeatureSchema::new(self.schema.names.clone());
        if expected.fingerprint != self.schema.fingerprint {
            return Err(CoreError::Artifact(format!(
                "schema fingerprint {} does not match feature names",
                self.schema.fingerprint
            )));
        }
        if self.encoders.iter().any(|e| e.classes.is_empty()) {
            return Err(CoreError::Artifact("encoder without classes".to_string()));
        }
        Ok(())
    }

    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(self).context("Failed to serialize feature state")?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write feature state to {}", path.display()))?;
        Ok(())
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read feature state from {}", path.display()))?;
        let state: Self = serde_json::from_str(&json).context("Failed to parse feature state")?;
        state.validate()?;
        Ok(state)
    }

    /// Project a frame onto the frozen schema, filling gaps and scaling.
    pub(crate) fn assemble(
        &self,
        frame: &FeatureFrame,
        absent: AbsentColumn,
    ) -> CoreResult<FeatureVector> {
        let mut raw_values = Vec::with_capacity(self.columns.len());
        let mut missing = Vec::new();

        for column in &self.columns {
            match frame.get(&column.name) {
                Some(v) if v.is_finite() => raw_values.push(v),
                Some(_) => raw_values.push(column.median),
                None if absent == AbsentColumn::FillMedian => raw_values.push(column.median),
                None => missing.push(column.name.clone()),
            }
        }

        if !missing.is_empty() {
            return Err(CoreError::SchemaMismatch {
                missing,
                fingerprint: self.schema.fingerprint.clone(),
            });
        }

        let values = raw_values
            .iter()
            .zip(&self.columns)
            .map(|(v, c)| c.scaling.apply(*v))
            .collect();

        Ok(FeatureVector {
            schema: Arc::clone(&self.schema),
            values,
            raw_values,
        })
    }
}
