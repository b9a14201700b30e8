//! Advisory rule engine: prediction and inputs to per-domain guidance
//!
//! Each domain is evaluated independently. A domain that fails is replaced
//! by its generic fallback text; the others are unaffected.

mod fertilizer;
mod general;
mod irrigation;
mod pest;
mod rules;

pub use rules::{
    AdvisoryRules, FertilizerPlan, IrrigationRules, PestRules, SeasonWindow, SoilRules,
    SplitSchedule, ValueDefaults, YieldThresholds,
};

use crate::models::{AdvisoryBundle, PredictionResult, RawInputRecord};
use crate::observability::{CoreMetrics, StructuredLogger};
use crate::uncertainty::advisory_confidence;
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;

/// Features listed as the basis of the advice
const BASED_ON_FEATURES: usize = 3;

pub const IRRIGATION_FALLBACK: &str =
    "Monitor soil moisture and irrigate when top 5cm soil is dry.";
pub const FERTILIZER_FALLBACK: &str =
    "Apply balanced NPK fertilizer as per soil test recommendations.";
pub const PEST_FALLBACK: &str =
    "Monitor crops regularly for pests and diseases. Use IPM practices.";
pub const GENERAL_FALLBACK: &str =
    "Follow recommended agricultural practices for your region and crop.";
pub const LIMITED_DATA_DISCLAIMER: &str =
    "Recommendations are based on limited data. Consider consulting local agricultural experts.";

#[derive(Debug, Error)]
pub enum AdvisoryError {
    #[error("{field} is not a finite number")]
    NonFinite { field: &'static str },

    #[error("no {table} table for crop {crop}")]
    MissingTable { table: &'static str, crop: String },
}

/// Read-only view over one prediction and its record
pub struct AdvisoryContext<'a> {
    pub prediction: &'a PredictionResult,
    pub record: &'a RawInputRecord,
    /// Normalized crop identifier, empty when absent
    pub crop: String,
    pub month: u32,
    attributed: BTreeMap<&'a str, f64>,
}

impl<'a> AdvisoryContext<'a> {
    pub fn new(prediction: &'a PredictionResult, record: &'a RawInputRecord, month: u32) -> Self {
        Self {
            prediction,
            record,
            crop: record.crop_key().unwrap_or_default(),
            month,
            attributed: prediction.feature_values(),
        }
    }

    /// Attribution value, then raw record value, then `default`
    pub fn value(&self, name: &'static str, default: f64) -> Result<f64, AdvisoryError> {
        let value = self
            .attributed
            .get(name)
            .copied()
            .or_else(|| self.record_value(name))
            .unwrap_or(default);
        if value.is_finite() {
            Ok(value)
        } else {
            Err(AdvisoryError::NonFinite { field: name })
        }
    }

    fn record_value(&self, name: &str) -> Option<f64> {
        self.record
            .weather
            .get(name)
            .or_else(|| self.record.soil.get(name))
    }
}

/// Stateless advisory generator over shared rules
#[derive(Clone)]
pub struct AdvisoryEngine {
    rules: Arc<AdvisoryRules>,
    metrics: CoreMetrics,
    logger: StructuredLogger,
}

impl Default for AdvisoryEngine {
    fn default() -> Self {
        Self::new(Arc::new(AdvisoryRules::default()))
    }
}

impl AdvisoryEngine {
    pub fn new(rules: Arc<AdvisoryRules>) -> Self {
        Self {
            rules,
            metrics: CoreMetrics::new(),
            logger: StructuredLogger::new("advisory"),
        }
    }

    pub fn rules(&self) -> &AdvisoryRules {
        &self.rules
    }

    /// Build the advisory bundle for one prediction; `month` is 1-12
    pub fn generate(
        &self,
        prediction: &PredictionResult,
        record: &RawInputRecord,
        month: u32,
    ) -> AdvisoryBundle {
        let ctx = AdvisoryContext::new(prediction, record, month);
        let rules = self.rules.as_ref();

        let irrigation = self.or_fallback(
            "irrigation",
            irrigation::advise(&ctx, rules),
            IRRIGATION_FALLBACK,
        );
        let fertilizer = self.or_fallback(
            "fertilizer",
            fertilizer::advise(&ctx, rules),
            FERTILIZER_FALLBACK,
        );
        let pest = self.or_fallback("pest", pest::advise(&ctx, rules), PEST_FALLBACK);
        let general = self.or_fallback("general", general::advise(&ctx, rules), GENERAL_FALLBACK);

        let disclaimer = (prediction.confidence < rules.disclaimer_confidence)
            .then(|| LIMITED_DATA_DISCLAIMER.to_string());

        AdvisoryBundle {
            irrigation,
            fertilizer,
            pest,
            general,
            disclaimer,
            based_on_features: prediction
                .top_features
                .iter()
                .take(BASED_ON_FEATURES)
                .map(|f| f.feature.clone())
                .collect(),
            confidence: advisory_confidence(prediction.confidence, prediction.data_quality),
        }
    }

    fn or_fallback(
        &self,
        domain: &str,
        result: Result<String, AdvisoryError>,
        fallback: &str,
    ) -> String {
        match result {
            Ok(text) if !text.trim().is_empty() => text,
            Ok(_) => {
                self.logger.log_advisory_fallback(domain, "empty advisory text");
                self.metrics.inc_advisory_fallback(domain);
                fallback.to_string()
            }
            Err(e) => {
                self.logger.log_advisory_fallback(domain, &e.to_string());
                self.metrics.inc_advisory_fallback(domain);
                fallback.to_string()
            }
        }
    }
}
