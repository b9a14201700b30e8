//! Confidence scoring and prediction intervals
//!
//! Combines model dispersion, input completeness and value plausibility
//! into a bounded confidence, then derives a heuristic interval from it.

use crate::models::{PredictionInterval, RawInputRecord};
use serde::{Deserialize, Serialize};

/// Dispersion assumed for models that expose no importances
pub const DEFAULT_DISPERSION: f64 = 0.3;

/// Lower bound on dispersion for importance-exposing models
pub const MIN_DISPERSION: f64 = 0.2;

/// z-score of the two-sided 95% band
const Z_95: f64 = 1.96;

const QUALITY_FLOOR: f64 = 0.1;
const WEATHER_ABSENT_PENALTY: f64 = 0.3;
const WEATHER_PARTIAL_PENALTY: f64 = 0.2;
const SOIL_ABSENT_PENALTY: f64 = 0.2;
const SOIL_PARTIAL_PENALTY: f64 = 0.1;
const KEY_WEATHER_FIELDS: [&str; 3] = ["precip_sum", "temp_mean", "gdd"];
const KEY_SOIL_FIELDS: [&str; 3] = ["soil_phh2o", "soil_soc", "soil_clay"];

/// Named confidence clamp and plausibility settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EstimatorProfile {
    pub name: String,
    pub min_confidence: f64,
    pub max_confidence: f64,
    /// Estimates outside [plausible_min, plausible_max] t/ha are penalized
    pub plausible_min: f64,
    pub plausible_max: f64,
    pub plausibility_penalty: f64,
    pub low_confidence_threshold: f64,
}

impl EstimatorProfile {
    /// Clamp used by the quick-estimate path
    pub fn simple() -> Self {
        Self {
            name: "simple".to_string(),
            min_confidence: 0.5,
            max_confidence: 0.95,
            ..Self::pipeline()
        }
    }

    /// Clamp used by the full pipeline
    pub fn pipeline() -> Self {
        Self {
            name: "pipeline".to_string(),
            min_confidence: 0.1,
            max_confidence: 1.0,
            plausible_min: 0.5,
            plausible_max: 15.0,
            plausibility_penalty: 0.8,
            low_confidence_threshold: 0.7,
        }
    }
}

impl Default for EstimatorProfile {
    fn default() -> Self {
        Self::pipeline()
    }
}

/// Model-level dispersion from the sum of importances
pub fn model_dispersion(importance_sum: Option<f64>) -> f64 {
    match importance_sum {
        Some(sum) if sum.is_finite() => (1.0 - sum).max(MIN_DISPERSION),
        _ => DEFAULT_DISPERSION,
    }
}

/// Completeness score of the externally sourced inputs, in [0.1, 1.0]
pub fn data_quality(record: &RawInputRecord) -> f64 {
    let mut quality = 1.0;

    if record.weather.is_empty() {
        quality -= WEATHER_ABSENT_PENALTY;
    } else {
        let missing = KEY_WEATHER_FIELDS
            .iter()
            .filter(|f| record.weather.get(f).is_none())
            .count();
        quality -= WEATHER_PARTIAL_PENALTY * missing as f64 / KEY_WEATHER_FIELDS.len() as f64;
    }

    if record.soil.is_empty() {
        quality -= SOIL_ABSENT_PENALTY;
    } else {
        let missing = KEY_SOIL_FIELDS
            .iter()
            .filter(|f| record.soil.get(f).is_none())
            .count();
        quality -= SOIL_PARTIAL_PENALTY * missing as f64 / KEY_SOIL_FIELDS.len() as f64;
    }

    quality.max(QUALITY_FLOOR)
}

/// Confidence advertised alongside advisory texts
pub fn advisory_confidence(confidence: f64, data_quality: f64) -> f64 {
    confidence.min(data_quality) * 0.9
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConfidenceEstimate {
    pub confidence: f64,
    pub interval: PredictionInterval,
}

/// Scores estimates under one profile
#[derive(Debug, Clone, Default)]
pub struct UncertaintyEstimator {
    profile: EstimatorProfile,
}

impl UncertaintyEstimator {
    pub fn new(profile: EstimatorProfile) -> Self {
        Self { profile }
    }

    pub fn profile(&self) -> &EstimatorProfile {
        &self.profile
    }

    pub fn estimate(&self, estimate: f64, dispersion: f64, quality: f64) -> ConfidenceEstimate {
        let confidence = self.confidence(estimate, dispersion, quality);
        ConfidenceEstimate {
            confidence,
            interval: interval(estimate, confidence),
        }
    }

    /// `clamp(base × quality × plausibility)` under the profile bounds
    pub fn confidence(&self, estimate: f64, dispersion: f64, quality: f64) -> f64 {
        let base = if estimate > 0.0 {
            (1.0 - dispersion / estimate).max(0.0)
        } else {
            0.5
        };
        let quality = if quality.is_finite() {
            quality.clamp(0.0, 1.0)
        } else {
            0.0
        };
        let plausibility =
            if estimate < self.profile.plausible_min || estimate > self.profile.plausible_max {
                self.profile.plausibility_penalty
            } else {
                1.0
            };

        let raw = base * quality * plausibility;
        let raw = if raw.is_finite() { raw } else { 0.0 };
        raw.clamp(self.profile.min_confidence, self.profile.max_confidence)
    }

    pub fn is_low_confidence(&self, confidence: f64) -> bool {
        confidence < self.profile.low_confidence_threshold
    }

    pub fn low_confidence_reason(&self, confidence: f64, quality: f64) -> Option<String> {
        if !self.is_low_confidence(confidence) {
            None
        } else if quality < 0.8 {
            Some("Incomplete weather or soil data for this location".to_string())
        } else {
            Some("High model uncertainty for these conditions".to_string())
        }
    }
}

/// `[max(0, e − 1.96σ), e + 1.96σ]` with `σ = e × (1 − confidence) × 0.5`
pub fn interval(estimate: f64, confidence: f64) -> PredictionInterval {
    let estimate = estimate.max(0.0);
    let sigma = estimate * (1.0 - confidence.clamp(0.0, 1.0)) * 0.5;
    PredictionInterval {
        low: (estimate - Z_95 * sigma).max(0.0),
        high: estimate + Z_95 * sigma,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{SoilObservations, WeatherObservations};

    #[test]
    fn test_dispersion() {
        assert_eq!(model_dispersion(None), 0.3);
        assert!((model_dispersion(Some(0.5)) - 0.5).abs() < 1e-12);
        assert_eq!(model_dispersion(Some(0.95)), 0.2);
    }

    #[test]
    fn test_quality_all_absent() {
        let q = data_quality(&RawInputRecord::default());
        assert!((q - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_quality_partial_families() {
        let record = RawInputRecord {
            weather: WeatherObservations {
                precip_sum: Some(900.0),
                ..Default::default()
            },
            soil: SoilObservations {
                soil_phh2o: Some(6.2),
                soil_soc: Some(1.1),
                soil_clay: Some(20.0),
                ..Default::default()
            },
            ..Default::default()
        };
        // two of three key weather fields missing
        let expected = 1.0 - 0.2 * 2.0 / 3.0;
        assert!((data_quality(&record) - expected).abs() < 1e-12);
    }

    #[test]
    fn test_confidence_formula() {
        let est = UncertaintyEstimator::new(EstimatorProfile::pipeline());
        // base = 1 - 0.3/3 = 0.9
        assert!((est.confidence(3.0, 0.3, 1.0) - 0.9).abs() < 1e-12);
        assert!((est.confidence(3.0, 0.3, 0.5) - 0.45).abs() < 1e-12);
        // implausible estimate
        assert!((est.confidence(0.4, 0.2, 1.0) - 0.4).abs() < 1e-12);
        // zero estimate uses base 0.5
        assert!((est.confidence(0.0, 0.3, 1.0) - 0.4).abs() < 1e-12);
    }

    #[test]
    fn test_profiles_clamp_differently() {
        let simple = UncertaintyEstimator::new(EstimatorProfile::simple());
        let pipeline = UncertaintyEstimator::new(EstimatorProfile::pipeline());
        assert_eq!(simple.confidence(0.1, 0.3, 0.1), 0.5);
        assert_eq!(pipeline.confidence(0.1, 0.3, 0.1), 0.1);
        assert_eq!(simple.confidence(10.0, 0.0, 1.0), 0.95);
        assert_eq!(pipeline.confidence(10.0, 0.0, 1.0), 1.0);
    }

    #[test]
    fn test_confidence_always_within_profile_bounds() {
        for profile in [EstimatorProfile::simple(), EstimatorProfile::pipeline()] {
            let est = UncertaintyEstimator::new(profile.clone());
            for e in [0.0, 0.01, 0.5, 1.0, 3.3, 7.0, 15.0, 20.0, 1e6] {
                for q in [0.0, 0.1, 0.33, 0.5, 0.9, 1.0] {
                    for d in [0.2, 0.3, 0.8] {
                        let c = est.confidence(e, d, q);
                        assert!(c >= profile.min_confidence && c <= profile.max_confidence);
                    }
                }
            }
        }
    }

    #[test]
    fn test_interval_contains_estimate() {
        for e in [0.0, 0.2, 1.0, 4.5, 12.0] {
            for c in [0.1, 0.5, 0.95, 1.0] {
                let i = interval(e, c);
                assert!(i.low >= 0.0);
                assert!(i.low <= e && e <= i.high);
            }
        }
        let i = interval(4.0, 0.5);
        assert!((i.low - 2.04).abs() < 1e-12);
        assert!((i.high - 5.96).abs() < 1e-12);
    }

    #[test]
    fn test_advisory_confidence() {
        assert!((advisory_confidence(0.9, 0.6) - 0.54).abs() < 1e-12);
    }

    #[test]
    fn test_low_confidence_reason() {
        let est = UncertaintyEstimator::default();
        assert!(est.low_confidence_reason(0.8, 1.0).is_none());
        assert!(est
            .low_confidence_reason(0.5, 0.5)
            .unwrap()
            .contains("Incomplete"));
    }
}
