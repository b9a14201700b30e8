//! Fit the feature engineer on a labelled training set

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;
use yield_core::{ExternalData, FeatureEngineer, RawInputRecord};

use crate::config::CliConfig;
use crate::output::{print_heading, print_json, print_rows, print_success, FieldRow, OutputFormat};

/// One labelled training example
#[derive(Debug, Deserialize)]
pub struct TrainingRow {
    pub record: RawInputRecord,
    /// Provider data merged into `record` before fitting
    #[serde(default)]
    pub external: Option<ExternalData>,
    pub yield_t_ha: f64,
}

#[derive(Debug, Serialize)]
struct FitSummary {
    samples: usize,
    features: usize,
    fingerprint: String,
    feature_names: Vec<String>,
    output: String,
}

/// Read a JSON array or JSON-lines file of training rows
pub fn read_training_rows(path: &Path) -> Result<Vec<TrainingRow>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read training data {}", path.display()))?;

    if content.trim_start().starts_with('[') {
        return serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse training data {}", path.display()));
    }

    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| {
            serde_json::from_str(line)
                .with_context(|| format!("Failed to parse line {} of {}", i + 1, path.display()))
        })
        .collect()
}

pub fn fit(config: &CliConfig, data: &Path, out: &Path, format: OutputFormat) -> Result<()> {
    let rows = read_training_rows(data)?;
    if rows.is_empty() {
        bail!("No training rows in {}", data.display());
    }

    let (records, targets): (Vec<RawInputRecord>, Vec<f64>) = rows
        .into_iter()
        .map(|row| {
            let record = match &row.external {
                Some(external) => row.record.with_external(external),
                None => row.record,
            };
            (record, row.yield_t_ha)
        })
        .unzip();

    let engineer = FeatureEngineer::new(config.features.clone());
    let (_, state) = engineer.fit_transform(&records, &targets)?;
    state.save(out)?;
    info!(output = %out.display(), samples = state.n_samples, "Saved feature state");

    let summary = FitSummary {
        samples: state.n_samples,
        features: state.schema.len(),
        fingerprint: state.fingerprint().to_string(),
        feature_names: state.feature_names().to_vec(),
        output: out.display().to_string(),
    };

    match format {
        OutputFormat::Json => print_json(&summary)?,
        OutputFormat::Table => {
            print_heading("Feature Engineer Fit");
            print_rows(vec![
                FieldRow::new("Samples", summary.samples.to_string()),
                FieldRow::new("Features", summary.features.to_string()),
                FieldRow::new("Fingerprint", summary.fingerprint.clone()),
            ]);
            print_success(&format!("Feature state written to {}", summary.output));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reads_json_lines_and_arrays() {
        let dir = tempfile::tempdir().unwrap();

        let lines = dir.path().join("train.jsonl");
        std::fs::write(
            &lines,
            "{\"record\": {\"crop\": \"rice\"}, \"yield_t_ha\": 3.1}\n\n\
             {\"record\": {\"crop\": \"wheat\"}, \"yield_t_ha\": 2.4}\n",
        )
        .unwrap();
        let rows = read_training_rows(&lines).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].record.crop.as_deref(), Some("wheat"));

        let array = dir.path().join("train.json");
        std::fs::write(
            &array,
            r#"[{"record": {},
                 "external": {"weather": null, "soil": {"soil_phh2o": 6.1}},
                 "yield_t_ha": 1.0}]"#,
        )
        .unwrap();
        let rows = read_training_rows(&array).unwrap();
        assert_eq!(rows.len(), 1);
        assert!(rows[0].external.as_ref().unwrap().weather.is_none());
    }

    #[test]
    fn test_bad_line_names_its_position() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("train.jsonl");
        std::fs::write(&path, "{\"record\": {}, \"yield_t_ha\": 1.0}\nnot json\n").unwrap();
        let err = read_training_rows(&path).unwrap_err();
        assert!(format!("{err:#}").contains("line 2"));
    }
}
