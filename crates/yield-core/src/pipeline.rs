//! Request orchestration: validate, engineer, predict, score, advise

use crate::advisory::{AdvisoryEngine, AdvisoryRules};
use crate::error::{CoreError, CoreResult};
use crate::features::{FeatureEngineer, FeatureEngineerState};
use crate::gap::YieldGap;
use crate::models::{
    FarmerInputs, ModelMetadata, PipelineOutput, PredictionResult, RawInputRecord,
    WeatherObservations,
};
use crate::observability::{CoreMetrics, StructuredLogger};
use crate::predictor::ModelAdapter;
use crate::uncertainty::{data_quality, model_dispersion, EstimatorProfile, UncertaintyEstimator};
use chrono::Datelike;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

const MAX_CROP_ID_LEN: usize = 64;

/// Request validation bounds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    pub min_year: i32,
    /// Latest accepted year, relative to the current year
    pub max_years_ahead: i32,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            min_year: 2000,
            max_years_ahead: 1,
        }
    }
}

/// Settings for one pipeline instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub advisory: AdvisoryRules,
    pub validation: ValidationConfig,
    pub pipeline_profile: EstimatorProfile,
    pub simple_profile: EstimatorProfile,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            advisory: AdvisoryRules::default(),
            validation: ValidationConfig::default(),
            pipeline_profile: EstimatorProfile::pipeline(),
            simple_profile: EstimatorProfile::simple(),
        }
    }
}

/// Minimal inputs of the quick-estimate path
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuickEstimateRequest {
    pub crop: String,
    #[serde(default)]
    pub soil_type: Option<String>,
    pub rainfall_mm: f64,
    pub temperature_c: f64,
    pub humidity_pct: f64,
    #[serde(default)]
    pub year: Option<i32>,
}

/// Default NPK (kg/ha) assumed by the quick-estimate path
const QUICK_NPK: (f64, f64, f64) = (80.0, 40.0, 40.0);

impl QuickEstimateRequest {
    pub fn validate(&self) -> CoreResult<()> {
        if !self.rainfall_mm.is_finite() || self.rainfall_mm < 0.0 {
            return Err(CoreError::invalid_input(
                "rainfall_mm",
                format!("{} is not a non-negative amount", self.rainfall_mm),
            ));
        }
        if !self.temperature_c.is_finite() || !(-50.0..=60.0).contains(&self.temperature_c) {
            return Err(CoreError::invalid_input(
                "temperature_c",
                format!("{} is outside [-50, 60]", self.temperature_c),
            ));
        }
        if !self.humidity_pct.is_finite() || !(0.0..=100.0).contains(&self.humidity_pct) {
            return Err(CoreError::invalid_input(
                "humidity_pct",
                format!("{} is outside [0, 100]", self.humidity_pct),
            ));
        }
        Ok(())
    }

    /// Expand into a record; temperature extremes are mean ± 5 °C and an
    /// absent year means the current season
    pub fn to_record(&self) -> RawInputRecord {
        RawInputRecord {
            crop: Some(self.crop.clone()),
            soil_type: self.soil_type.clone(),
            year: Some(self.year.unwrap_or_else(|| chrono::Utc::now().year())),
            farmer: FarmerInputs {
                fertilizer_n_kg: Some(QUICK_NPK.0),
                fertilizer_p_kg: Some(QUICK_NPK.1),
                fertilizer_k_kg: Some(QUICK_NPK.2),
                ..Default::default()
            },
            weather: WeatherObservations {
                precip_sum: Some(self.rainfall_mm),
                temp_mean: Some(self.temperature_c),
                temp_max: Some(self.temperature_c + 5.0),
                temp_min: Some(self.temperature_c - 5.0),
                humidity_mean: Some(self.humidity_pct),
                ..Default::default()
            },
            ..Default::default()
        }
    }
}

/// Description of the bound model and feature state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelInfo {
    pub metadata: ModelMetadata,
    pub kind: String,
    pub n_features: usize,
    pub schema_fingerprint: String,
    pub has_importances: bool,
    /// Crops the feature state was fitted on
    pub supported_crops: Vec<String>,
    /// Crops with their own advisory tables; others use the generic ones
    pub advisory_crops: Vec<String>,
}

/// Sequences feature engineering, inference, scoring and advice for one request.
///
/// Holds only read-only shared state; one instance serves any number of
/// concurrent callers.
pub struct YieldPipeline {
    engineer: FeatureEngineer,
    state: Arc<FeatureEngineerState>,
    adapter: Arc<ModelAdapter>,
    estimator: UncertaintyEstimator,
    quick_estimator: UncertaintyEstimator,
    advisory: AdvisoryEngine,
    validation: ValidationConfig,
    metrics: CoreMetrics,
    logger: StructuredLogger,
}

impl YieldPipeline {
    pub fn new(
        state: Arc<FeatureEngineerState>,
        adapter: Arc<ModelAdapter>,
        config: PipelineConfig,
    ) -> CoreResult<Self> {
        let expected = adapter.n_features().ok_or(CoreError::ModelNotLoaded)?;
        if expected != state.schema.len() {
            return Err(CoreError::FeatureSchemaMismatch {
                expected,
                got: state.schema.len(),
            });
        }
        if let Some(meta) = adapter.metadata() {
            if !meta.feature_names.is_empty() && meta.feature_names != state.schema.names {
                return Err(CoreError::SchemaMismatch {
                    missing: schema_disagreement(&meta.feature_names, &state.schema.names),
                    fingerprint: state.schema.fingerprint.clone(),
                });
            }
        }

        Ok(Self {
            engineer: FeatureEngineer::default(),
            state,
            adapter,
            estimator: UncertaintyEstimator::new(config.pipeline_profile),
            quick_estimator: UncertaintyEstimator::new(config.simple_profile),
            advisory: AdvisoryEngine::new(Arc::new(config.advisory)),
            validation: config.validation,
            metrics: CoreMetrics::new(),
            logger: StructuredLogger::new("pipeline"),
        })
    }

    pub fn state(&self) -> &FeatureEngineerState {
        &self.state
    }

    pub fn advisory(&self) -> &AdvisoryEngine {
        &self.advisory
    }

    /// Reject requests the pipeline cannot meaningfully answer
    pub fn validate(&self, record: &RawInputRecord) -> CoreResult<()> {
        if let Some(lat) = record.latitude {
            if !lat.is_finite() || !(-90.0..=90.0).contains(&lat) {
                return Err(CoreError::invalid_input(
                    "latitude",
                    format!("{lat} is outside [-90, 90]"),
                ));
            }
        }
        if let Some(lon) = record.longitude {
            if !lon.is_finite() || !(-180.0..=180.0).contains(&lon) {
                return Err(CoreError::invalid_input(
                    "longitude",
                    format!("{lon} is outside [-180, 180]"),
                ));
            }
        }
        if let Some(year) = record.year {
            let max_year = chrono::Utc::now().year() + self.validation.max_years_ahead;
            if year < self.validation.min_year || year > max_year {
                return Err(CoreError::invalid_input(
                    "year",
                    format!("{year} is outside [{}, {max_year}]", self.validation.min_year),
                ));
            }
        }
        if let Some(crop) = &record.crop {
            validate_crop_id(crop)?;
        }

        let farmer = &record.farmer;
        for (field, value) in [
            ("area_ha", farmer.area_ha),
            ("fertilizer_n_kg", farmer.fertilizer_n_kg),
            ("fertilizer_p_kg", farmer.fertilizer_p_kg),
            ("fertilizer_k_kg", farmer.fertilizer_k_kg),
        ] {
            if let Some(v) = value {
                if !v.is_finite() || v < 0.0 {
                    return Err(CoreError::invalid_input(
                        field,
                        format!("{v} is not a non-negative amount"),
                    ));
                }
            }
        }
        Ok(())
    }

    /// Full request: prediction under the pipeline profile plus advisory
    pub fn run(&self, record: &RawInputRecord) -> CoreResult<PipelineOutput> {
        self.run_for_month(record, chrono::Utc::now().month())
    }

    /// As [`run`](Self::run) with an explicit calendar month for seasonal advice
    pub fn run_for_month(&self, record: &RawInputRecord, month: u32) -> CoreResult<PipelineOutput> {
        let start = Instant::now();
        let result = self.predict_with(record, &self.estimator).map(|prediction| {
            let advisory = self.advisory.generate(&prediction, record, month);
            PipelineOutput {
                prediction,
                advisory,
            }
        });
        self.metrics
            .observe_prediction_latency(start.elapsed().as_secs_f64());
        result
    }

    /// Prediction only, under the pipeline profile
    pub fn predict(&self, record: &RawInputRecord) -> CoreResult<PredictionResult> {
        self.predict_with(record, &self.estimator)
    }

    /// Quick estimate from a handful of inputs, scored with the simple profile
    pub fn quick_estimate(&self, request: &QuickEstimateRequest) -> CoreResult<PredictionResult> {
        if let Err(e) = request.validate() {
            self.reject(&e);
            return Err(e);
        }
        self.predict_with(&request.to_record(), &self.quick_estimator)
    }

    fn predict_with(
        &self,
        record: &RawInputRecord,
        estimator: &UncertaintyEstimator,
    ) -> CoreResult<PredictionResult> {
        let outcome = self.predict_inner(record, estimator);
        if let Err(e) = &outcome {
            self.reject(e);
        }
        outcome
    }

    fn predict_inner(
        &self,
        record: &RawInputRecord,
        estimator: &UncertaintyEstimator,
    ) -> CoreResult<PredictionResult> {
        self.validate(record)?;

        if record.weather.is_empty() {
            self.metrics.inc_upstream_fallback("weather");
        }
        if record.soil.is_empty() {
            self.metrics.inc_upstream_fallback("soil");
        }

        let features = self.engineer.transform(&self.state, record)?;
        let output = self.adapter.predict(&features)?;
        let quality = data_quality(record);
        let dispersion = model_dispersion(output.importance_sum);
        let scored = estimator.estimate(output.estimate, dispersion, quality);

        debug!(
            estimate = output.estimate,
            dispersion = dispersion,
            quality = quality,
            "Scored prediction"
        );

        let profile = estimator.profile();
        let low_confidence_reason = estimator.low_confidence_reason(scored.confidence, quality);
        if let Some(reason) = &low_confidence_reason {
            self.metrics.inc_low_confidence();
            debug!(confidence = scored.confidence, reason = %reason, "Low confidence prediction");
        }
        self.metrics.inc_predictions(&profile.name);

        let model_version = self
            .adapter
            .metadata()
            .map(|m| m.model_name.clone())
            .unwrap_or_default();
        self.logger.log_prediction(
            &record.crop_key().unwrap_or_default(),
            output.estimate,
            scored.confidence,
            quality,
            &profile.name,
            &model_version,
        );

        Ok(PredictionResult {
            predicted_yield_t_ha: output.estimate,
            interval: scored.interval,
            confidence: scored.confidence,
            top_features: output.attributions,
            data_quality: quality,
            model_version,
            estimator_profile: profile.name.clone(),
            low_confidence_reason,
            generated_at: chrono::Utc::now().timestamp(),
        })
    }

    fn reject(&self, error: &CoreError) {
        self.metrics.inc_prediction_errors(error.kind());
        self.logger
            .log_prediction_rejected(error.kind(), &error.to_string());
    }

    pub fn model_info(&self) -> ModelInfo {
        let supported_crops = self
            .state
            .encoder("crop")
            .map(|e| e.classes.clone())
            .unwrap_or_default();
        ModelInfo {
            metadata: self.adapter.metadata().cloned().unwrap_or_default(),
            kind: self.adapter.kind().unwrap_or("unbound").to_string(),
            n_features: self.state.schema.len(),
            schema_fingerprint: self.state.schema.fingerprint.clone(),
            has_importances: self.importance_report().is_some(),
            supported_crops,
            advisory_crops: self
                .advisory
                .rules()
                .supported_crops()
                .into_iter()
                .map(str::to_string)
                .collect(),
        }
    }

    pub fn importance_report(&self) -> Option<Vec<(String, f64)>> {
        self.adapter.importance_report(&self.state.schema.names)
    }

    pub fn yield_gap(&self, prediction: &PredictionResult, potential: Option<f64>) -> YieldGap {
        YieldGap::analyze(prediction.predicted_yield_t_ha, potential)
    }
}

/// Model feature names the state cannot supply at the same position.
///
/// Names absent from the state are listed as-is; names present but
/// misplaced are listed with both positions.
fn schema_disagreement(model: &[String], state: &[String]) -> Vec<String> {
    model
        .iter()
        .enumerate()
        .filter_map(|(i, name)| match state.iter().position(|n| n == name) {
            None => Some(name.clone()),
            Some(j) if j != i => Some(format!("{name} (model position {i}, state position {j})")),
            Some(_) => None,
        })
        .collect()
}

fn validate_crop_id(crop: &str) -> CoreResult<()> {
    let trimmed = crop.trim();
    if trimmed.is_empty() {
        return Err(CoreError::invalid_input("crop", "identifier is empty"));
    }
    if trimmed.len() > MAX_CROP_ID_LEN {
        return Err(CoreError::invalid_input(
            "crop",
            format!("identifier is longer than {MAX_CROP_ID_LEN} characters"),
        ));
    }
    if !trimmed
        .chars()
        .all(|c| c.is_alphanumeric() || matches!(c, ' ' | '-' | '_'))
    {
        return Err(CoreError::invalid_input(
            "crop",
            format!("{trimmed:?} contains unsupported characters"),
        ));
    }
    Ok(())
}
