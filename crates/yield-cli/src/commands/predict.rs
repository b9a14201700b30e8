//! Prediction commands: full pipeline run and quick estimate

use anyhow::Result;
use colored::Colorize;
use serde::Serialize;
use std::path::Path;
use tabled::Tabled;
use yield_core::{
    ExternalData, PipelineOutput, PredictionResult, QuickEstimateRequest, RawInputRecord, YieldGap,
    YieldPipeline,
};

use super::read_json;
use crate::output::{
    color_confidence, format_yield, print_heading, print_json, print_rows, print_warning, FieldRow,
    OutputFormat,
};

/// Row for the attribution table
#[derive(Tabled)]
struct AttributionRow {
    #[tabled(rename = "Feature")]
    feature: String,
    #[tabled(rename = "Value")]
    value: String,
    #[tabled(rename = "Importance")]
    importance: String,
}

#[derive(Serialize)]
struct PredictReport<'a> {
    #[serde(flatten)]
    output: &'a PipelineOutput,
    #[serde(skip_serializing_if = "Option::is_none")]
    yield_gap: Option<&'a YieldGap>,
}

pub struct PredictArgs<'a> {
    pub input: &'a Path,
    pub external: Option<&'a Path>,
    pub month: Option<u32>,
    pub potential_yield: Option<f64>,
    pub with_gap: bool,
}

pub fn predict(
    pipeline: &YieldPipeline,
    args: PredictArgs<'_>,
    format: OutputFormat,
) -> Result<()> {
    let mut record: RawInputRecord = read_json(args.input)?;
    if let Some(path) = args.external {
        let external: ExternalData = read_json(path)?;
        record = record.with_external(&external);
    }

    let output = match args.month {
        Some(month) => pipeline.run_for_month(&record, month)?,
        None => pipeline.run(&record)?,
    };
    let gap = (args.with_gap || args.potential_yield.is_some())
        .then(|| pipeline.yield_gap(&output.prediction, args.potential_yield));

    match format {
        OutputFormat::Json => print_json(&PredictReport {
            output: &output,
            yield_gap: gap.as_ref(),
        })?,
        OutputFormat::Table => {
            print_prediction(&output.prediction);

            println!();
            print_heading("Advisory");
            for (domain, text) in [
                ("Irrigation", &output.advisory.irrigation),
                ("Fertilizer", &output.advisory.fertilizer),
                ("Pest", &output.advisory.pest),
                ("General", &output.advisory.general),
            ] {
                println!("{}\n  {}\n", domain.cyan().bold(), text);
            }
            if let Some(disclaimer) = &output.advisory.disclaimer {
                print_warning(disclaimer);
            }

            if let Some(gap) = &gap {
                println!();
                print_heading("Yield Gap");
                print_rows(vec![
                    FieldRow::new("Potential", format_yield(gap.potential_yield)),
                    FieldRow::new("Gap", format_yield(gap.yield_gap)),
                    FieldRow::new("Gap %", format!("{:.1}%", gap.yield_gap_percent)),
                    FieldRow::new("Efficiency", format!("{:.1}%", gap.efficiency_percent)),
                ]);
                for suggestion in gap.suggestions(record.soil.soil_phh2o) {
                    println!("  - {}", suggestion);
                }
            }
        }
    }
    Ok(())
}

pub fn quick(
    pipeline: &YieldPipeline,
    request: &QuickEstimateRequest,
    format: OutputFormat,
) -> Result<()> {
    let prediction = pipeline.quick_estimate(request)?;
    match format {
        OutputFormat::Json => print_json(&prediction)?,
        OutputFormat::Table => print_prediction(&prediction),
    }
    Ok(())
}

fn print_prediction(prediction: &PredictionResult) {
    print_heading("Yield Prediction");
    print_rows(vec![
        FieldRow::new("Predicted yield", format_yield(prediction.predicted_yield_t_ha)),
        FieldRow::new(
            "Interval",
            format!(
                "{} - {}",
                format_yield(prediction.interval.low),
                format_yield(prediction.interval.high)
            ),
        ),
        FieldRow::new("Confidence", color_confidence(prediction.confidence)),
        FieldRow::new("Data quality", color_confidence(prediction.data_quality)),
        FieldRow::new("Model", prediction.model_version.clone()),
        FieldRow::new("Profile", prediction.estimator_profile.clone()),
    ]);
    if let Some(reason) = &prediction.low_confidence_reason {
        print_warning(&format!("Low confidence: {reason}"));
    }

    if prediction.top_features.is_empty() {
        return;
    }
    println!();
    let rows: Vec<AttributionRow> = prediction
        .top_features
        .iter()
        .map(|f| AttributionRow {
            feature: f.feature.clone(),
            value: format!("{:.3}", f.value),
            importance: format!("{:.3}", f.importance),
        })
        .collect();
    print_rows(rows);
}
