//! Raw-field assembly and derived feature families
//!
//! Every raw numeric field is default-filled before any family runs, so a
//! family only checks that its inputs exist in the frame. Inputs without a
//! configured default stay absent and switch off the families that need them.

use crate::models::{RawInputRecord, SoilObservations, WeatherObservations};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::f64::consts::PI;

const HEAT_STRESS_C: f64 = 35.0;
const COLD_STRESS_C: f64 = 15.0;
const DROUGHT_PRECIP_MM: f64 = 500.0;
const FLOOD_PRECIP_MM: f64 = 1500.0;
const HUMIDITY_STRESS_PCT: f64 = 85.0;
const SOLAR_DEFICIT_MJ: f64 = 15.0;
const GDD_OPTIMAL_LOW: f64 = 2000.0;
const GDD_OPTIMAL_HIGH: f64 = 3000.0;
const PH_OPTIMAL_LOW: f64 = 6.0;
const PH_OPTIMAL_HIGH: f64 = 7.0;
const PH_TARGET: f64 = 6.5;
const ORGANIC_HIGH_PCT: f64 = 2.0;
const ORGANIC_LOW_PCT: f64 = 1.0;
const EPS: f64 = 1e-6;

/// Farmer and history fields that enter the frame, with their record accessors
const FARMER_FIELDS: [&str; 4] = [
    "fertilizer_n",
    "fertilizer_p",
    "fertilizer_k",
    "irrigation_freq",
];
const HISTORY_FIELDS: [&str; 5] = [
    "yield_lag1",
    "yield_lag2",
    "yield_lag3",
    "yield_lag3_mean",
    "yield_trend",
];

/// Documented fallback values for every optional raw numeric field
pub fn default_raw_values() -> BTreeMap<String, f64> {
    [
        ("precip_sum", 800.0),
        ("precip_mean", 4.5),
        ("temp_mean", 26.0),
        ("temp_max", 32.0),
        ("temp_min", 20.0),
        ("humidity_mean", 75.0),
        ("solar_mean", 18.0),
        ("gdd", 2500.0),
        ("soil_phh2o", 6.5),
        ("soil_soc", 1.5),
        ("soil_clay", 25.0),
        ("soil_sand", 45.0),
        ("soil_silt", 30.0),
        ("soil_cec", 15.0),
        ("soil_nitrogen", 0.15),
        ("yield_lag1", 3.0),
        ("yield_lag2", 2.9),
        ("yield_lag3", 3.1),
        ("yield_lag3_mean", 3.0),
        ("yield_trend", 0.05),
        ("fertilizer_n", 80.0),
        ("fertilizer_p", 40.0),
        ("fertilizer_k", 40.0),
        ("irrigation_freq", 8.0),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v))
    .collect()
}

/// Fit-time year bounds used by `year_normalized`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct YearRange {
    pub min: i32,
    pub max: i32,
}

impl YearRange {
    pub fn from_years(years: impl Iterator<Item = i32>) -> Option<Self> {
        years.fold(None, |acc, y| match acc {
            None => Some(YearRange { min: y, max: y }),
            Some(r) => Some(YearRange {
                min: r.min.min(y),
                max: r.max.max(y),
            }),
        })
    }

    fn normalize(&self, year: i32) -> f64 {
        let span = (self.max - self.min) as f64;
        if span <= 0.0 {
            0.0
        } else {
            (year - self.min) as f64 / span
        }
    }
}

/// Insertion-ordered name → value map for one record
#[derive(Debug, Clone, Default)]
pub struct FeatureFrame {
    entries: Vec<(String, f64)>,
}

impl FeatureFrame {
    pub fn get(&self, name: &str) -> Option<f64> {
        self.entries.iter().find(|(n, _)| n == name).map(|(_, v)| *v)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|(n, _)| n == name)
    }

    /// Insert a new feature or overwrite an existing one in place
    pub fn set(&mut self, name: &str, value: f64) {
        match self.entries.iter_mut().find(|(n, _)| n == name) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((name.to_string(), value)),
        }
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(n, _)| n.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn all3(&self, a: &str, b: &str, c: &str) -> Option<(f64, f64, f64)> {
        Some((self.get(a)?, self.get(b)?, self.get(c)?))
    }

    fn all2(&self, a: &str, b: &str) -> Option<(f64, f64)> {
        Some((self.get(a)?, self.get(b)?))
    }
}

/// Build the numeric frame for one record: raw fields with defaults,
/// missingness flags for external fields, then every derived family.
pub fn build_frame(
    record: &RawInputRecord,
    defaults: &BTreeMap<String, f64>,
    year_range: Option<YearRange>,
) -> FeatureFrame {
    let mut frame = FeatureFrame::default();

    let farmer = [
        record.farmer.fertilizer_n_kg,
        record.farmer.fertilizer_p_kg,
        record.farmer.fertilizer_k_kg,
        record.farmer.irrigation_events.map(f64::from),
    ];
    for (name, value) in FARMER_FIELDS.iter().zip(farmer) {
        push_with_default(&mut frame, name, value, defaults);
    }
    for name in WeatherObservations::FIELDS {
        push_with_default(&mut frame, name, record.weather.get(name), defaults);
    }
    for name in SoilObservations::FIELDS {
        push_with_default(&mut frame, name, record.soil.get(name), defaults);
    }
    let history = [
        record.history.yield_lag1,
        record.history.yield_lag2,
        record.history.yield_lag3,
        record.history.yield_lag3_mean,
        record.history.yield_trend,
    ];
    for (name, value) in HISTORY_FIELDS.iter().zip(history) {
        push_with_default(&mut frame, name, value, defaults);
    }

    for name in WeatherObservations::FIELDS {
        let missing = record.weather.get(name).is_none();
        frame.set(&format!("{name}_missing"), flag(missing));
    }
    for name in SoilObservations::FIELDS {
        let missing = record.soil.get(name).is_none();
        frame.set(&format!("{name}_missing"), flag(missing));
    }

    add_weather_features(&mut frame);
    add_soil_features(&mut frame);
    // absent years fall back to the latest fitted year
    let year = record.year.or(year_range.map(|r| r.max));
    add_temporal_features(&mut frame, year, year_range);
    add_interaction_features(&mut frame);
    frame
}

fn push_with_default(
    frame: &mut FeatureFrame,
    name: &str,
    value: Option<f64>,
    defaults: &BTreeMap<String, f64>,
) {
    if let Some(v) = value.or_else(|| defaults.get(name).copied()) {
        frame.set(name, v);
    }
}

fn flag(on: bool) -> f64 {
    if on {
        1.0
    } else {
        0.0
    }
}

fn excess(value: f64, threshold: f64) -> f64 {
    (value - threshold).max(0.0)
}

fn shortfall(value: f64, threshold: f64) -> f64 {
    (threshold - value).max(0.0)
}

fn add_weather_features(frame: &mut FeatureFrame) {
    if let Some((_, max, min)) = frame.all3("temp_mean", "temp_max", "temp_min") {
        frame.set("temp_range", max - min);
        frame.set("temp_stress", excess(max, HEAT_STRESS_C));
        frame.set("temp_cold_stress", shortfall(min, COLD_STRESS_C));
    }

    if let Some((sum, mean)) = frame.all2("precip_sum", "precip_mean") {
        frame.set("precip_intensity", sum / (mean + EPS));
        frame.set("drought_stress", shortfall(sum, DROUGHT_PRECIP_MM));
        frame.set("flood_risk", excess(sum, FLOOD_PRECIP_MM));
    }

    if let Some(humidity) = frame.get("humidity_mean") {
        frame.set("humidity_stress", excess(humidity, HUMIDITY_STRESS_PCT));
    }

    if let Some(solar) = frame.get("solar_mean") {
        frame.set("solar_deficit", shortfall(solar, SOLAR_DEFICIT_MJ));
    }

    if let Some(gdd) = frame.get("gdd") {
        let optimal = (GDD_OPTIMAL_LOW..=GDD_OPTIMAL_HIGH).contains(&gdd);
        frame.set("gdd_optimal", flag(optimal));
        frame.set("gdd_deficit", shortfall(gdd, GDD_OPTIMAL_LOW));
        frame.set("gdd_excess", excess(gdd, GDD_OPTIMAL_HIGH));
    }
}

fn add_soil_features(frame: &mut FeatureFrame) {
    if let Some((clay, sand, silt)) = frame.all3("soil_clay", "soil_sand", "soil_silt") {
        frame.set("clay_sand_ratio", clay / (sand + EPS));
        frame.set("silt_clay_ratio", silt / (clay + EPS));
        frame.set("soil_texture_score", clay * 0.3 + silt * 0.5 + sand * 0.2);
    }

    if let Some(ph) = frame.get("soil_phh2o") {
        let optimal = (PH_OPTIMAL_LOW..=PH_OPTIMAL_HIGH).contains(&ph);
        frame.set("soil_ph_optimal", flag(optimal));
        frame.set("soil_ph_stress", (ph - PH_TARGET).abs());
    }

    if let Some(soc) = frame.get("soil_soc") {
        frame.set("soil_organic_high", flag(soc > ORGANIC_HIGH_PCT));
        frame.set("soil_organic_low", flag(soc < ORGANIC_LOW_PCT));
    }

    if let Some((cec, ph_stress)) = frame.all2("soil_cec", "soil_ph_stress") {
        frame.set("nutrient_availability", cec * (1.0 - ph_stress));
    }
}

fn add_temporal_features(frame: &mut FeatureFrame, year: Option<i32>, range: Option<YearRange>) {
    let Some(year) = year else {
        return;
    };
    if let Some(range) = range {
        frame.set("year_normalized", range.normalize(year));
    }
    let y = year as f64;
    frame.set("year_cycle_3", (2.0 * PI * y / 3.0).sin());
    frame.set("year_cycle_5", (2.0 * PI * y / 5.0).sin());
}

fn add_interaction_features(frame: &mut FeatureFrame) {
    if let Some((precip, clay)) = frame.all2("precip_sum", "soil_clay") {
        frame.set("water_retention", precip * clay / 100.0);
    }
    if let Some((temp, soc)) = frame.all2("temp_mean", "soil_soc") {
        frame.set("temp_organic_interaction", temp * soc);
    }
    if let Some((gdd, ph_optimal)) = frame.all2("gdd", "soil_ph_optimal") {
        frame.set("gdd_ph_interaction", gdd * ph_optimal);
    }

    let stress: Vec<f64> = frame
        .entries
        .iter()
        .filter(|(n, _)| n.contains("stress") && n != "total_stress")
        .map(|(_, v)| *v)
        .collect();
    if stress.len() > 1 {
        frame.set("total_stress", stress.iter().sum());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_record() -> RawInputRecord {
        RawInputRecord {
            crop: Some("rice".to_string()),
            year: Some(2021),
            weather: WeatherObservations {
                precip_sum: Some(420.0),
                precip_mean: Some(2.3),
                temp_mean: Some(28.0),
                temp_max: Some(38.0),
                temp_min: Some(12.0),
                humidity_mean: Some(90.0),
                solar_mean: Some(14.0),
                gdd: Some(1800.0),
            },
            soil: SoilObservations {
                soil_phh2o: Some(5.5),
                soil_soc: Some(0.8),
                soil_clay: Some(30.0),
                soil_sand: Some(40.0),
                soil_silt: Some(30.0),
                soil_cec: Some(12.0),
                soil_nitrogen: Some(0.1),
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_stress_thresholds() {
        let frame = build_frame(&full_record(), &default_raw_values(), None);
        assert_eq!(frame.get("temp_range"), Some(26.0));
        assert_eq!(frame.get("temp_stress"), Some(3.0));
        assert_eq!(frame.get("temp_cold_stress"), Some(3.0));
        assert_eq!(frame.get("drought_stress"), Some(80.0));
        assert_eq!(frame.get("flood_risk"), Some(0.0));
        assert_eq!(frame.get("humidity_stress"), Some(5.0));
        assert_eq!(frame.get("solar_deficit"), Some(1.0));
        assert_eq!(frame.get("gdd_optimal"), Some(0.0));
        assert_eq!(frame.get("gdd_deficit"), Some(200.0));
        assert_eq!(frame.get("gdd_excess"), Some(0.0));
    }

    #[test]
    fn test_soil_features() {
        let frame = build_frame(&full_record(), &default_raw_values(), None);
        assert_eq!(frame.get("soil_ph_optimal"), Some(0.0));
        assert!((frame.get("soil_ph_stress").unwrap() - 1.0).abs() < 1e-9);
        assert_eq!(frame.get("soil_organic_low"), Some(1.0));
        assert_eq!(frame.get("soil_organic_high"), Some(0.0));
        assert!((frame.get("soil_texture_score").unwrap() - 32.0).abs() < 1e-9);
        assert!((frame.get("nutrient_availability").unwrap() - 0.0).abs() < 1e-9);
    }

    #[test]
    fn test_total_stress_sums_stress_family() {
        let frame = build_frame(&full_record(), &default_raw_values(), None);
        // temp 3 + cold 3 + drought 80 + humidity 5 + ph 1
        assert!((frame.get("total_stress").unwrap() - 92.0).abs() < 1e-9);
    }

    #[test]
    fn test_missing_families_are_default_filled_and_flagged() {
        let record = RawInputRecord {
            crop: Some("wheat".to_string()),
            ..Default::default()
        };
        let frame = build_frame(&record, &default_raw_values(), None);
        assert_eq!(frame.get("precip_sum"), Some(800.0));
        assert_eq!(frame.get("soil_phh2o"), Some(6.5));
        assert_eq!(frame.get("precip_sum_missing"), Some(1.0));
        assert_eq!(frame.get("soil_phh2o_missing"), Some(1.0));
        assert_eq!(frame.get("gdd_optimal"), Some(1.0));
        assert!(frame.contains("total_stress"));
    }

    #[test]
    fn test_family_without_default_is_skipped() {
        let mut defaults = default_raw_values();
        defaults.remove("gdd");
        let record = RawInputRecord::default();
        let frame = build_frame(&record, &defaults, None);
        assert!(!frame.contains("gdd"));
        assert!(!frame.contains("gdd_deficit"));
        assert!(!frame.contains("gdd_ph_interaction"));
        assert_eq!(frame.get("gdd_missing"), Some(1.0));
    }

    #[test]
    fn test_temporal_features() {
        let range = YearRange { min: 2000, max: 2050 };
        let mut record = full_record();
        record.year = Some(2025);
        let frame = build_frame(&record, &default_raw_values(), Some(range));
        assert!((frame.get("year_normalized").unwrap() - 0.5).abs() < 1e-9);
        assert!(frame.get("year_cycle_3").unwrap().abs() < 1e-9);
        assert!(frame.get("year_cycle_5").unwrap().abs() < 1e-9);
    }

    #[test]
    fn test_year_range_degenerate_span() {
        let range = YearRange::from_years([2020, 2020].into_iter()).unwrap();
        assert_eq!(range.normalize(2020), 0.0);
        assert!(YearRange::from_years(std::iter::empty()).is_none());
    }

    #[test]
    fn test_frame_order_is_stable() {
        let range = Some(YearRange { min: 2000, max: 2030 });
        let a = build_frame(&full_record(), &default_raw_values(), range);
        let b = build_frame(&RawInputRecord::default(), &default_raw_values(), range);
        let names_a: Vec<&str> = a.names().collect();
        let names_b: Vec<&str> = b.names().collect();
        assert_eq!(names_a, names_b);
    }

    #[test]
    fn test_absent_year_uses_latest_fitted_year() {
        let range = YearRange { min: 2010, max: 2020 };
        let mut record = full_record();
        record.year = None;
        let absent = build_frame(&record, &default_raw_values(), Some(range));
        record.year = Some(2020);
        let latest = build_frame(&record, &default_raw_values(), Some(range));

        assert_eq!(absent.get("year_normalized"), Some(1.0));
        for name in ["year_normalized", "year_cycle_3", "year_cycle_5"] {
            assert_eq!(absent.get(name), latest.get(name), "{name}");
        }

        let unfitted = build_frame(&RawInputRecord::default(), &default_raw_values(), None);
        assert!(unfitted.get("year_cycle_3").is_none());
    }
}
