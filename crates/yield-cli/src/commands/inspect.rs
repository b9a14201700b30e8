//! Model and feature-state inspection

use anyhow::Result;
use serde::Serialize;
use tabled::Tabled;
use yield_core::{CoreMetrics, ModelInfo, YieldPipeline};

use crate::output::{print_heading, print_json, print_rows, print_warning, FieldRow, OutputFormat};

#[derive(Tabled)]
struct ImportanceRow {
    #[tabled(rename = "Rank")]
    rank: usize,
    #[tabled(rename = "Feature")]
    feature: String,
    #[tabled(rename = "Importance")]
    importance: String,
}

#[derive(Serialize)]
struct InspectReport {
    #[serde(flatten)]
    info: ModelInfo,
    #[serde(skip_serializing_if = "Option::is_none")]
    importances: Option<Vec<(String, f64)>>,
}

pub fn inspect(
    pipeline: &YieldPipeline,
    importances: Option<usize>,
    format: OutputFormat,
) -> Result<()> {
    let info = pipeline.model_info();
    let report = importances.and_then(|limit| {
        pipeline
            .importance_report()
            .map(|all| all.into_iter().take(limit).collect::<Vec<_>>())
    });

    match format {
        OutputFormat::Json => print_json(&InspectReport {
            info,
            importances: report,
        })?,
        OutputFormat::Table => {
            print_heading("Model");
            let mut rows = vec![
                FieldRow::new("Name", info.metadata.model_name.clone()),
                FieldRow::new("Kind", info.kind.clone()),
                FieldRow::new(
                    "Trained",
                    info.metadata.training_date.clone().unwrap_or_else(|| "-".to_string()),
                ),
                FieldRow::new("Features", info.n_features.to_string()),
                FieldRow::new("Fingerprint", info.schema_fingerprint.clone()),
                FieldRow::new("Importances", info.has_importances.to_string()),
                FieldRow::new("Crops", info.supported_crops.join(", ")),
                FieldRow::new("Advisory crops", info.advisory_crops.join(", ")),
            ];
            rows.extend(
                info.metadata
                    .metrics
                    .iter()
                    .map(|(name, value)| FieldRow::new(name, format!("{value:.4}"))),
            );
            print_rows(rows);

            if importances.is_some() {
                println!();
                match report {
                    Some(report) => print_rows(
                        report
                            .into_iter()
                            .enumerate()
                            .map(|(i, (feature, importance))| ImportanceRow {
                                rank: i + 1,
                                feature,
                                importance: format!("{importance:.4}"),
                            })
                            .collect(),
                    ),
                    None => print_warning("Model exposes no feature importances"),
                }
            }
        }
    }
    Ok(())
}

/// Print the process metrics in Prometheus text format
pub fn print_metrics() {
    print!("{}", CoreMetrics::new().render());
}
