//! Core data models for the yield prediction pipeline

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Seasonal weather aggregates supplied by the external data provider
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WeatherObservations {
    pub precip_sum: Option<f64>,
    pub precip_mean: Option<f64>,
    pub temp_mean: Option<f64>,
    pub temp_max: Option<f64>,
    pub temp_min: Option<f64>,
    pub humidity_mean: Option<f64>,
    pub solar_mean: Option<f64>,
    pub gdd: Option<f64>,
}

impl WeatherObservations {
    /// Raw feature names of the weather family, in emission order
    pub const FIELDS: [&'static str; 8] = [
        "precip_sum",
        "precip_mean",
        "temp_mean",
        "temp_max",
        "temp_min",
        "humidity_mean",
        "solar_mean",
        "gdd",
    ];

    pub fn get(&self, name: &str) -> Option<f64> {
        match name {
            "precip_sum" => self.precip_sum,
            "precip_mean" => self.precip_mean,
            "temp_mean" => self.temp_mean,
            "temp_max" => self.temp_max,
            "temp_min" => self.temp_min,
            "humidity_mean" => self.humidity_mean,
            "solar_mean" => self.solar_mean,
            "gdd" => self.gdd,
            _ => None,
        }
    }

    fn slot(&mut self, name: &str) -> Option<&mut Option<f64>> {
        match name {
            "precip_sum" => Some(&mut self.precip_sum),
            "precip_mean" => Some(&mut self.precip_mean),
            "temp_mean" => Some(&mut self.temp_mean),
            "temp_max" => Some(&mut self.temp_max),
            "temp_min" => Some(&mut self.temp_min),
            "humidity_mean" => Some(&mut self.humidity_mean),
            "solar_mean" => Some(&mut self.solar_mean),
            "gdd" => Some(&mut self.gdd),
            _ => None,
        }
    }

    /// Build from a provider map; unknown keys are ignored
    pub fn from_map(map: &BTreeMap<String, f64>) -> Self {
        let mut obs = Self::default();
        obs.merge_map(map);
        obs
    }

    /// Fill absent fields from a provider map, keeping values already set
    pub fn merge_map(&mut self, map: &BTreeMap<String, f64>) -> usize {
        let mut merged = 0;
        for (key, value) in map {
            match self.slot(key) {
                Some(target) if target.is_none() => {
                    *target = Some(*value);
                    merged += 1;
                }
                Some(_) => {}
                None => tracing::debug!(key = %key, "Ignoring unknown external data key"),
            }
        }
        merged
    }

    pub fn is_empty(&self) -> bool {
        Self::FIELDS.iter().all(|f| self.get(f).is_none())
    }
}

/// Topsoil properties supplied by the external data provider
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SoilObservations {
    pub soil_phh2o: Option<f64>,
    pub soil_soc: Option<f64>,
    pub soil_clay: Option<f64>,
    pub soil_sand: Option<f64>,
    pub soil_silt: Option<f64>,
    pub soil_cec: Option<f64>,
    pub soil_nitrogen: Option<f64>,
}

impl SoilObservations {
    /// Raw feature names of the soil family, in emission order
    pub const FIELDS: [&'static str; 7] = [
        "soil_phh2o",
        "soil_soc",
        "soil_clay",
        "soil_sand",
        "soil_silt",
        "soil_cec",
        "soil_nitrogen",
    ];

    pub fn get(&self, name: &str) -> Option<f64> {
        match name {
            "soil_phh2o" => self.soil_phh2o,
            "soil_soc" => self.soil_soc,
            "soil_clay" => self.soil_clay,
            "soil_sand" => self.soil_sand,
            "soil_silt" => self.soil_silt,
            "soil_cec" => self.soil_cec,
            "soil_nitrogen" => self.soil_nitrogen,
            _ => None,
        }
    }

    fn slot(&mut self, name: &str) -> Option<&mut Option<f64>> {
        match name {
            "soil_phh2o" => Some(&mut self.soil_phh2o),
            "soil_soc" => Some(&mut self.soil_soc),
            "soil_clay" => Some(&mut self.soil_clay),
            "soil_sand" => Some(&mut self.soil_sand),
            "soil_silt" => Some(&mut self.soil_silt),
            "soil_cec" => Some(&mut self.soil_cec),
            "soil_nitrogen" => Some(&mut self.soil_nitrogen),
            _ => None,
        }
    }

    pub fn from_map(map: &BTreeMap<String, f64>) -> Self {
        let mut obs = Self::default();
        obs.merge_map(map);
        obs
    }

    pub fn merge_map(&mut self, map: &BTreeMap<String, f64>) -> usize {
        let mut merged = 0;
        for (key, value) in map {
            match self.slot(key) {
                Some(target) if target.is_none() => {
                    *target = Some(*value);
                    merged += 1;
                }
                Some(_) => {}
                None => tracing::debug!(key = %key, "Ignoring unknown external data key"),
            }
        }
        merged
    }

    pub fn is_empty(&self) -> bool {
        Self::FIELDS.iter().all(|f| self.get(f).is_none())
    }
}

/// Agronomic values entered by the farmer
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FarmerInputs {
    pub area_ha: Option<f64>,
    pub fertilizer_n_kg: Option<f64>,
    pub fertilizer_p_kg: Option<f64>,
    pub fertilizer_k_kg: Option<f64>,
    pub irrigation_events: Option<u32>,
    pub cultivar: Option<String>,
}

/// Lagged yields for the same district and crop
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct YieldHistory {
    pub yield_lag1: Option<f64>,
    pub yield_lag2: Option<f64>,
    pub yield_lag3: Option<f64>,
    pub yield_lag3_mean: Option<f64>,
    pub yield_trend: Option<f64>,
}

/// One field's raw inputs. Any optional part may be absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawInputRecord {
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    #[serde(default)]
    pub crop: Option<String>,
    #[serde(default)]
    pub soil_type: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub district: Option<String>,
    #[serde(default)]
    pub year: Option<i32>,
    #[serde(default)]
    pub farmer: FarmerInputs,
    #[serde(default)]
    pub weather: WeatherObservations,
    #[serde(default)]
    pub soil: SoilObservations,
    #[serde(default)]
    pub history: YieldHistory,
}

impl RawInputRecord {
    /// Merge externally fetched data into the record at the ingestion boundary.
    ///
    /// A family whose fetch failed (`None`) is left absent; the feature
    /// engineer fills defaults and the confidence estimator lowers the
    /// data-quality score.
    pub fn with_external(mut self, external: &ExternalData) -> Self {
        match &external.weather {
            Some(map) => {
                self.weather.merge_map(map);
            }
            None => tracing::warn!(family = "weather", "Upstream data unavailable, using defaults"),
        }
        match &external.soil {
            Some(map) => {
                self.soil.merge_map(map);
            }
            None => tracing::warn!(family = "soil", "Upstream data unavailable, using defaults"),
        }
        self
    }

    /// Lowercased, trimmed crop identifier
    pub fn crop_key(&self) -> Option<String> {
        self.crop
            .as_deref()
            .map(|c| c.trim().to_lowercase())
            .filter(|c| !c.is_empty())
    }
}

/// Weather and soil maps as returned by the external data provider.
///
/// `None` means the fetch failed; an empty map means it succeeded with no data.
/// Both are handled the same way and neither is an error.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExternalData {
    #[serde(default)]
    pub weather: Option<BTreeMap<String, f64>>,
    #[serde(default)]
    pub soil: Option<BTreeMap<String, f64>>,
}

/// Ordered feature names of one engineer state plus their fingerprint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureSchema {
    pub names: Vec<String>,
    pub fingerprint: String,
}

impl FeatureSchema {
    pub fn new(names: Vec<String>) -> Self {
        let mut hasher = Sha256::new();
        for name in &names {
            hasher.update(name.as_bytes());
            hasher.update([0u8]);
        }
        let fingerprint = hex::encode(&hasher.finalize()[..8]);
        Self { names, fingerprint }
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// Feature vector for ML inference
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureVector {
    pub schema: Arc<FeatureSchema>,
    /// Model-ready values (scaled where the state says so)
    pub values: Vec<f64>,
    /// The same features before scaling, after default and median filling
    pub raw_values: Vec<f64>,
}

impl FeatureVector {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn names(&self) -> &[String] {
        &self.schema.names
    }

}

/// One ranked contributor to an estimate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureAttribution {
    pub feature: String,
    /// Unscaled feature value
    pub value: f64,
    pub importance: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PredictionInterval {
    pub low: f64,
    pub high: f64,
}

/// Yield estimate with its uncertainty and explanation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionResult {
    pub predicted_yield_t_ha: f64,
    pub interval: PredictionInterval,
    pub confidence: f64,
    pub top_features: Vec<FeatureAttribution>,
    pub data_quality: f64,
    pub model_version: String,
    pub estimator_profile: String,
    /// Set when confidence falls under the profile's low-confidence threshold
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub low_confidence_reason: Option<String>,
    pub generated_at: i64,
}

impl PredictionResult {
    /// Attribution values keyed by feature name
    pub fn feature_values(&self) -> BTreeMap<&str, f64> {
        self.top_features
            .iter()
            .map(|f| (f.feature.as_str(), f.value))
            .collect()
    }
}

/// Per-domain advisory texts derived from one prediction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdvisoryBundle {
    pub irrigation: String,
    pub fertilizer: String,
    pub pest: String,
    pub general: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disclaimer: Option<String>,
    pub based_on_features: Vec<String>,
    /// `min(prediction confidence, data quality) × 0.9`
    pub confidence: f64,
}

/// Attribution-only description of a trained model artifact
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelMetadata {
    pub model_name: String,
    #[serde(default)]
    pub training_date: Option<String>,
    #[serde(default)]
    pub metrics: BTreeMap<String, f64>,
    #[serde(default)]
    pub feature_names: Vec<String>,
}

/// Complete answer for one request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineOutput {
    pub prediction: PredictionResult,
    pub advisory: AdvisoryBundle,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_weather_from_map_ignores_unknown_keys() {
        let mut map = BTreeMap::new();
        map.insert("precip_sum".to_string(), 640.0);
        map.insert("wind_speed".to_string(), 3.0);
        let weather = WeatherObservations::from_map(&map);
        assert_eq!(weather.precip_sum, Some(640.0));
        assert_eq!(weather.gdd, None);
        assert!(!weather.is_empty());
    }

    #[test]
    fn test_external_data_keeps_record_values() {
        let record = RawInputRecord {
            soil: SoilObservations {
                soil_phh2o: Some(5.2),
                ..Default::default()
            },
            ..Default::default()
        };
        let mut soil = BTreeMap::new();
        soil.insert("soil_phh2o".to_string(), 7.0);
        soil.insert("soil_soc".to_string(), 0.8);
        let merged = record.with_external(&ExternalData {
            weather: None,
            soil: Some(soil),
        });
        assert_eq!(merged.soil.soil_phh2o, Some(5.2));
        assert_eq!(merged.soil.soil_soc, Some(0.8));
        assert!(merged.weather.is_empty());
    }

    #[test]
    fn test_crop_key_normalizes() {
        let record = RawInputRecord {
            crop: Some("  Rice ".to_string()),
            ..Default::default()
        };
        assert_eq!(record.crop_key().as_deref(), Some("rice"));
        let blank = RawInputRecord {
            crop: Some("   ".to_string()),
            ..Default::default()
        };
        assert_eq!(blank.crop_key(), None);
    }

    #[test]
    fn test_schema_fingerprint_depends_on_order() {
        let a = FeatureSchema::new(vec!["gdd".into(), "precip_sum".into()]);
        let b = FeatureSchema::new(vec!["precip_sum".into(), "gdd".into()]);
        let c = FeatureSchema::new(vec!["gdd".into(), "precip_sum".into()]);
        assert_ne!(a.fingerprint, b.fingerprint);
        assert_eq!(a.fingerprint, c.fingerprint);
        assert_eq!(a.fingerprint.len(), 16);
    }
}
