//! Advisory thresholds and crop tables
//!
//! Loaded once and shared read-only by every advisory call.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IrrigationRules {
    pub low_rainfall_mm: f64,
    pub high_rainfall_mm: f64,
    pub optimal_events: u32,
    /// Extra events recommended under low rainfall
    pub low_rainfall_extra_events: u32,
}

impl Default for IrrigationRules {
    fn default() -> Self {
        Self {
            low_rainfall_mm: 500.0,
            high_rainfall_mm: 1200.0,
            optimal_events: 8,
            low_rainfall_extra_events: 2,
        }
    }
}

/// Nutrient targets (kg/ha) and split schedule for one crop
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FertilizerPlan {
    pub nitrogen: f64,
    pub phosphorus: f64,
    pub potassium: f64,
    pub splits: u32,
    pub schedule: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SoilRules {
    pub ph_low: f64,
    pub ph_high: f64,
    /// Nitrogen added to the target on acidic soil
    pub low_ph_nitrogen_boost: f64,
    pub organic_low: f64,
    pub low_organic_nitrogen_boost: f64,
    /// |target − applied| within this band counts as adequate
    pub nitrogen_neutral_band: f64,
}

impl Default for SoilRules {
    fn default() -> Self {
        Self {
            ph_low: 6.0,
            ph_high: 7.5,
            low_ph_nitrogen_boost: 10.0,
            organic_low: 1.0,
            low_organic_nitrogen_boost: 20.0,
            nitrogen_neutral_band: 10.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PestRules {
    pub high_humidity_pct: f64,
    pub high_temp_c: f64,
    pub excessive_rainfall_mm: f64,
}

impl Default for PestRules {
    fn default() -> Self {
        Self {
            high_humidity_pct: 80.0,
            high_temp_c: 30.0,
            excessive_rainfall_mm: 1000.0,
        }
    }
}

/// Yield bucket bounds (t/ha) for one crop
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct YieldThresholds {
    pub low: f64,
    pub medium: f64,
}

/// Month window in which a crop gets season-preparation advice
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeasonWindow {
    pub crop: String,
    pub start_month: u32,
    pub end_month: u32,
    pub advice: String,
}

impl SeasonWindow {
    pub fn contains(&self, month: u32) -> bool {
        (self.start_month..=self.end_month).contains(&month)
    }
}

/// Application split used for crops without their own fertilizer plan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SplitSchedule {
    pub splits: u32,
    pub schedule: String,
}

impl Default for SplitSchedule {
    fn default() -> Self {
        Self {
            splits: 2,
            schedule: "basal (60%), tillering/jointing (40%)".to_string(),
        }
    }
}

/// Fallback values used when neither attributions nor the record carry a field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueDefaults {
    pub precip_sum: f64,
    pub humidity_mean: f64,
    pub temp_max: f64,
    pub soil_phh2o: f64,
    pub soil_soc: f64,
}

impl Default for ValueDefaults {
    fn default() -> Self {
        Self {
            precip_sum: 800.0,
            humidity_mean: 75.0,
            temp_max: 30.0,
            soil_phh2o: 6.5,
            soil_soc: 1.5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdvisoryRules {
    pub irrigation: IrrigationRules,
    pub fertilizer: BTreeMap<String, FertilizerPlan>,
    pub soil: SoilRules,
    pub pest: PestRules,
    pub yield_thresholds: BTreeMap<String, YieldThresholds>,
    pub seasons: Vec<SeasonWindow>,
    /// Crop whose tables stand in for crops without their own
    pub default_crop: String,
    pub generic_split: SplitSchedule,
    pub caveat_confidence: f64,
    pub disclaimer_confidence: f64,
    pub value_defaults: ValueDefaults,
}

impl Default for AdvisoryRules {
    fn default() -> Self {
        let fertilizer = BTreeMap::from([
            (
                "rice".to_string(),
                FertilizerPlan {
                    nitrogen: 120.0,
                    phosphorus: 60.0,
                    potassium: 40.0,
                    splits: 3,
                    schedule: "basal (50%), tillering (25%), panicle initiation (25%)".to_string(),
                },
            ),
            (
                "wheat".to_string(),
                FertilizerPlan {
                    nitrogen: 100.0,
                    phosphorus: 50.0,
                    potassium: 30.0,
                    splits: 2,
                    schedule: "basal (60%), tillering/jointing (40%)".to_string(),
                },
            ),
        ]);
        let yield_thresholds = BTreeMap::from([
            ("rice".to_string(), YieldThresholds { low: 2.0, medium: 3.5 }),
            ("wheat".to_string(), YieldThresholds { low: 1.5, medium: 2.5 }),
        ]);
        let seasons = vec![
            SeasonWindow {
                crop: "rice".to_string(),
                start_month: 4,
                end_month: 6,
                advice: "Prepare for kharif season: check seed quality, repair equipment."
                    .to_string(),
            },
            SeasonWindow {
                crop: "wheat".to_string(),
                start_month: 10,
                end_month: 12,
                advice: "Prepare for rabi season: ensure timely sowing for optimal yield."
                    .to_string(),
            },
        ];
        Self {
            irrigation: IrrigationRules::default(),
            fertilizer,
            soil: SoilRules::default(),
            pest: PestRules::default(),
            yield_thresholds,
            seasons,
            default_crop: "rice".to_string(),
            generic_split: SplitSchedule::default(),
            caveat_confidence: 0.6,
            disclaimer_confidence: 0.7,
            value_defaults: ValueDefaults::default(),
        }
    }
}

impl AdvisoryRules {
    pub fn fertilizer_plan(&self, crop: &str) -> Option<&FertilizerPlan> {
        self.fertilizer
            .get(crop)
            .or_else(|| self.fertilizer.get(&self.default_crop))
    }

    /// Split count and schedule text; only crops with their own plan get a crop-specific split
    pub fn split_schedule(&self, crop: &str) -> (u32, &str) {
        match self.fertilizer.get(crop) {
            Some(plan) => (plan.splits, plan.schedule.as_str()),
            None => (self.generic_split.splits, self.generic_split.schedule.as_str()),
        }
    }

    pub fn thresholds(&self, crop: &str) -> Option<YieldThresholds> {
        self.yield_thresholds
            .get(crop)
            .or_else(|| self.yield_thresholds.get(&self.default_crop))
            .copied()
    }

    pub fn season_advice(&self, crop: &str, month: u32) -> Option<&str> {
        self.seasons
            .iter()
            .find(|s| s.crop == crop && s.contains(month))
            .map(|s| s.advice.as_str())
    }

    pub fn supported_crops(&self) -> Vec<&str> {
        self.fertilizer.keys().map(String::as_str).collect()
    }
}
