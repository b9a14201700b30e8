//! Fit/transform entry points of the feature engineer

use super::derived::{build_frame, FeatureFrame, YearRange};
use super::encoding::{normalize_category, CategoryEncoder, CATEGORICAL_FIELDS};
use super::scaling::ColumnScaling;
use super::selection::select_k_best;
use super::state::{AbsentColumn, ColumnParams, FeatureEngineerState, STATE_FORMAT_VERSION};
use super::FeatureConfig;
use crate::error::{CoreError, CoreResult};
use crate::models::{FeatureSchema, FeatureVector, RawInputRecord};
use crate::observability::{CoreMetrics, StructuredLogger};
use std::sync::Arc;
use tracing::debug;

/// Turns raw records into fixed-schema numeric vectors.
///
/// Stateless apart from its configuration: everything learned from
/// training data lives in the returned [`FeatureEngineerState`].
pub struct FeatureEngineer {
    config: FeatureConfig,
    metrics: CoreMetrics,
    logger: StructuredLogger,
}

impl Default for FeatureEngineer {
    fn default() -> Self {
        Self::new(FeatureConfig::default())
    }
}

impl FeatureEngineer {
    pub fn new(config: FeatureConfig) -> Self {
        Self {
            config,
            metrics: CoreMetrics::new(),
            logger: StructuredLogger::new("feature_engineer"),
        }
    }

    /// Derive, encode, select and scale a training set.
    pub fn fit_transform(
        &self,
        records: &[RawInputRecord],
        targets: &[f64],
    ) -> CoreResult<(Vec<FeatureVector>, FeatureEngineerState)> {
        if records.is_empty() {
            return Err(CoreError::Fit("no training records".to_string()));
        }
        if records.len() != targets.len() {
            return Err(CoreError::Fit(format!(
                "{} records but {} targets",
                records.len(),
                targets.len()
            )));
        }
        if let Some(i) = targets.iter().position(|t| !t.is_finite()) {
            return Err(CoreError::Fit(format!("target {i} is not finite")));
        }
        if self.config.select_k == 0 {
            return Err(CoreError::Fit("select_k must be positive".to_string()));
        }

        let year_range = YearRange::from_years(records.iter().filter_map(|r| r.year));
        let mut frames: Vec<FeatureFrame> = records
            .iter()
            .map(|r| build_frame(r, &self.config.defaults, year_range))
            .collect();

        let mut encoders = Vec::with_capacity(CATEGORICAL_FIELDS.len());
        for field in CATEGORICAL_FIELDS {
            let values: Vec<String> = records
                .iter()
                .map(|r| normalize_category(categorical_value(r, field)))
                .collect();
            let encoder = CategoryEncoder::fit(field, values.iter().map(String::as_str))?;
            let name = encoder.feature_name();
            for (frame, value) in frames.iter_mut().zip(&values) {
                frame.set(&name, encoder.encode(value).code as f64);
            }
            encoders.push(encoder);
        }

        let candidates = candidate_names(&frames);
        let filled: Vec<(Vec<f64>, f64)> = candidates
            .iter()
            .map(|name| {
                let column: Vec<f64> = frames
                    .iter()
                    .map(|f| f.get(name).filter(|v| v.is_finite()).unwrap_or(f64::NAN))
                    .collect();
                let median = median(&column);
                let column = column
                    .into_iter()
                    .map(|v| if v.is_nan() { median } else { v })
                    .collect();
                (column, median)
            })
            .collect();

        let matrix: Vec<Vec<f64>> = filled.iter().map(|(c, _)| c.clone()).collect();
        let selected = select_k_best(&matrix, targets, self.config.select_k);

        let columns: Vec<ColumnParams> = selected
            .iter()
            .map(|&i| ColumnParams {
                name: candidates[i].clone(),
                median: filled[i].1,
                scaling: ColumnScaling::fit(&candidates[i], &filled[i].0),
            })
            .collect();
        let names = columns.iter().map(|c| c.name.clone()).collect();

        let state = FeatureEngineerState {
            format_version: STATE_FORMAT_VERSION,
            schema: Arc::new(FeatureSchema::new(names)),
            columns,
            encoders,
            defaults: self.config.defaults.clone(),
            year_range,
            n_samples: records.len(),
            fitted_at: chrono::Utc::now().timestamp(),
        };

        let vectors = frames
            .iter()
            .map(|f| state.assemble(f, AbsentColumn::FillMedian))
            .collect::<CoreResult<Vec<_>>>()?;

        self.logger.log_fit_complete(
            records.len(),
            candidates.len(),
            state.schema.len(),
            state.fingerprint(),
        );
        Ok((vectors, state))
    }

    /// Transform one record with a frozen state.
    ///
    /// Fails with [`CoreError::SchemaMismatch`] naming every selected
    /// feature this record cannot produce.
    pub fn transform(
        &self,
        state: &FeatureEngineerState,
        record: &RawInputRecord,
    ) -> CoreResult<FeatureVector> {
        let mut frame = build_frame(record, &state.defaults, state.year_range);
        for encoder in &state.encoders {
            let value = normalize_category(categorical_value(record, &encoder.field));
            let encoded = encoder.encode(&value);
            if encoded.fell_back {
                self.logger
                    .log_unseen_category(&encoder.field, &value, encoder.fallback());
                self.metrics.inc_unseen_category(&encoder.field);
            }
            frame.set(&encoder.feature_name(), encoded.code as f64);
        }
        debug!(
            n_derived = frame.len(),
            fingerprint = %state.fingerprint(),
            "Assembling feature vector"
        );
        state.assemble(&frame, AbsentColumn::Reject)
    }

    /// Encode a categorical value with the frozen encoder of `field`
    pub fn encode_category(
        &self,
        state: &FeatureEngineerState,
        field: &str,
        value: Option<&str>,
    ) -> Option<usize> {
        let encoder = state.encoder(field)?;
        Some(encoder.encode(&normalize_category(value)).code)
    }
}

fn categorical_value<'a>(record: &'a RawInputRecord, field: &str) -> Option<&'a str> {
    match field {
        "crop" => record.crop.as_deref(),
        "soil_type" => record.soil_type.as_deref(),
        "state" => record.state.as_deref(),
        "district" => record.district.as_deref(),
        _ => None,
    }
}

/// Union of frame names in first-seen order
fn candidate_names(frames: &[FeatureFrame]) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for frame in frames {
        for name in frame.names() {
            if !names.iter().any(|n| n == name) {
                names.push(name.to_string());
            }
        }
    }
    names
}

/// Median of the finite values; zero when there are none
fn median(values: &[f64]) -> f64 {
    let mut finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if finite.is_empty() {
        return 0.0;
    }
    finite.sort_by(f64::total_cmp);
    let mid = finite.len() / 2;
    if finite.len() % 2 == 0 {
        (finite[mid - 1] + finite[mid]) / 2.0
    } else {
        finite[mid]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{SoilObservations, WeatherObservations};

    fn record(crop: &str, precip: f64, ph: f64, year: i32) -> RawInputRecord {
        RawInputRecord {
            crop: Some(crop.to_string()),
            soil_type: Some("loam".to_string()),
            state: Some("punjab".to_string()),
            district: Some("ludhiana".to_string()),
            year: Some(year),
            weather: WeatherObservations {
                precip_sum: Some(precip),
                precip_mean: Some(precip / 180.0),
                temp_mean: Some(26.0 + precip / 1000.0),
                temp_max: Some(33.0),
                temp_min: Some(19.0),
                humidity_mean: Some(70.0),
                solar_mean: Some(18.0),
                gdd: Some(2400.0 + precip / 10.0),
            },
            soil: SoilObservations {
                soil_phh2o: Some(ph),
                soil_soc: Some(1.2),
                soil_clay: Some(24.0),
                soil_sand: Some(46.0),
                soil_silt: Some(30.0),
                soil_cec: Some(14.0),
                soil_nitrogen: Some(0.12),
            },
            ..Default::default()
        }
    }

    fn training_set() -> (Vec<RawInputRecord>, Vec<f64>) {
        let records = vec![
            record("rice", 600.0, 6.2, 2015),
            record("wheat", 750.0, 6.8, 2016),
            record("rice", 900.0, 5.9, 2017),
            record("wheat", 1100.0, 7.1, 2018),
            record("rice", 1300.0, 6.5, 2019),
            record("maize", 1000.0, 6.0, 2020),
        ];
        let targets = vec![2.1, 2.6, 3.0, 3.4, 3.9, 3.2];
        (records, targets)
    }

    #[test]
    fn test_fit_transform_is_consistent_with_transform() {
        let engineer = FeatureEngineer::default();
        let (records, targets) = training_set();
        let (vectors, state) = engineer.fit_transform(&records, &targets).unwrap();

        assert_eq!(vectors.len(), records.len());
        for (record, fitted) in records.iter().zip(&vectors) {
            let served = engineer.transform(&state, record).unwrap();
            assert_eq!(served.schema.fingerprint, fitted.schema.fingerprint);
            for (a, b) in served.values.iter().zip(&fitted.values) {
                assert!((a - b).abs() < 1e-9);
            }
        }
    }

    #[test]
    fn test_schema_is_capped_by_select_k() {
        let engineer = FeatureEngineer::new(FeatureConfig {
            select_k: 10,
            ..Default::default()
        });
        let (records, targets) = training_set();
        let (_, state) = engineer.fit_transform(&records, &targets).unwrap();
        assert_eq!(state.schema.len(), 10);
        assert_eq!(state.columns.len(), 10);
        assert!(state.validate().is_ok());
    }

    #[test]
    fn test_transform_is_deterministic() {
        let engineer = FeatureEngineer::default();
        let (records, targets) = training_set();
        let (_, state) = engineer.fit_transform(&records, &targets).unwrap();
        let a = engineer.transform(&state, &records[0]).unwrap();
        let b = engineer.transform(&state, &records[0]).unwrap();
        assert_eq!(a.values, b.values);
    }

    #[test]
    fn test_unseen_category_uses_fallback_class() {
        let engineer = FeatureEngineer::default();
        let (records, targets) = training_set();
        let (_, state) = engineer.fit_transform(&records, &targets).unwrap();

        assert_eq!(engineer.encode_category(&state, "crop", Some("maize")), Some(0));
        assert_eq!(engineer.encode_category(&state, "crop", Some("Wheat")), Some(2));
        assert_eq!(engineer.encode_category(&state, "crop", Some("sorghum")), Some(0));

        let mut unseen = records[0].clone();
        unseen.crop = Some("sorghum".to_string());
        assert!(engineer.transform(&state, &unseen).is_ok());
    }

    #[test]
    fn test_missing_selected_feature_reports_all_names() {
        // keep every candidate so the gdd family is always selected
        let engineer = FeatureEngineer::new(FeatureConfig {
            select_k: usize::MAX,
            ..Default::default()
        });
        let (records, targets) = training_set();
        let (_, mut state) = engineer.fit_transform(&records, &targets).unwrap();

        // without defaults, a record lacking gdd cannot derive the gdd family
        state.defaults.remove("gdd");
        let mut record = records[0].clone();
        record.weather.gdd = None;

        let mut expected = vec![
            "gdd".to_string(),
            "gdd_deficit".to_string(),
            "gdd_excess".to_string(),
            "gdd_optimal".to_string(),
            "gdd_ph_interaction".to_string(),
        ];
        for name in &expected {
            assert!(state.feature_names().contains(name), "{name} not selected");
        }

        let (mut missing, fingerprint) = match engineer.transform(&state, &record) {
            Err(CoreError::SchemaMismatch { missing, fingerprint }) => (missing, fingerprint),
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("record without gdd should not assemble"),
        };
        assert_eq!(fingerprint, state.fingerprint());
        missing.sort();
        expected.sort();
        assert_eq!(missing, expected);
    }

    #[test]
    fn test_fit_rejects_mismatched_targets() {
        let engineer = FeatureEngineer::default();
        let (records, _) = training_set();
        let err = engineer.fit_transform(&records, &[1.0]).unwrap_err();
        assert!(matches!(err, CoreError::Fit(_)));
        assert!(matches!(
            engineer.fit_transform(&[], &[]),
            Err(CoreError::Fit(_))
        ));
    }

    #[test]
    fn test_state_round_trip_gives_identical_vectors() {
        let engineer = FeatureEngineer::default();
        let (records, targets) = training_set();
        let (_, state) = engineer.fit_transform(&records, &targets).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("features.json");
        state.save(&path).unwrap();
        let loaded = FeatureEngineerState::load(&path).unwrap();

        let a = engineer.transform(&state, &records[2]).unwrap();
        let b = engineer.transform(&loaded, &records[2]).unwrap();
        assert_eq!(a.schema.fingerprint, b.schema.fingerprint);
        for (x, y) in a.values.iter().zip(&b.values) {
            assert!((x - y).abs() < 1e-9);
        }
    }

    #[test]
    fn test_median_ignores_non_finite() {
        assert_eq!(median(&[3.0, f64::NAN, 1.0, 2.0]), 2.0);
        assert_eq!(median(&[4.0, 1.0, 2.0, 3.0]), 2.5);
        assert_eq!(median(&[f64::NAN]), 0.0);
    }
}
