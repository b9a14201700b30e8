use super::rules::AdvisoryRules;
use super::{AdvisoryContext, AdvisoryError};

const MARKET: &str = "Monitor market prices and consider value addition opportunities. \
                      Maintain harvest and post-harvest records for better planning.";

pub(super) fn advise(
    ctx: &AdvisoryContext<'_>,
    rules: &AdvisoryRules,
) -> Result<String, AdvisoryError> {
    let predicted = ctx.prediction.predicted_yield_t_ha;
    if !predicted.is_finite() {
        return Err(AdvisoryError::NonFinite {
            field: "predicted_yield_t_ha",
        });
    }
    let thresholds = rules
        .thresholds(&ctx.crop)
        .ok_or_else(|| AdvisoryError::MissingTable {
            table: "yield threshold",
            crop: ctx.crop.clone(),
        })?;

    let (category, potential, suggestion) = if predicted < thresholds.low {
        (
            "below average",
            "high",
            "Significant improvement possible through: soil testing, balanced nutrition, \
             timely operations, and improved varieties. ",
        )
    } else if predicted < thresholds.medium {
        (
            "average",
            "medium",
            "Moderate improvement possible through: \
             precision nutrient management and pest control. ",
        )
    } else {
        (
            "above average",
            "low",
            "Maintain current good practices. \
             Focus on cost optimization and sustainability. ",
        )
    };

    let mut text = format!(
        "Predicted yield is {category} ({predicted:.1} t/ha). \
         Improvement potential: {potential}. {suggestion}"
    );

    if ctx.prediction.confidence < rules.caveat_confidence {
        text.push_str(
            "Prediction confidence is moderate. \
             Consider multiple information sources for decision making. ",
        );
    }
    if let Some(season) = rules.season_advice(&ctx.crop, ctx.month) {
        text.push_str(season);
        text.push(' ');
    }
    text.push_str(MARKET);
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::advisory::test_support::prediction;
    use crate::models::RawInputRecord;

    fn run(crop: &str, yield_t_ha: f64, confidence: f64, month: u32) -> String {
        let p = prediction(yield_t_ha, confidence, &[]);
        let r = RawInputRecord {
            crop: Some(crop.to_string()),
            ..Default::default()
        };
        advise(&AdvisoryContext::new(&p, &r, month), &AdvisoryRules::default()).unwrap()
    }

    #[test]
    fn test_low_rice_yield() {
        let text = run("rice", 1.2, 0.9, 1);
        assert!(text.starts_with("Predicted yield is below average (1.2 t/ha)."));
        assert!(text.contains("Improvement potential: high."));
        assert!(text.ends_with(MARKET));
    }

    #[test]
    fn test_wheat_thresholds() {
        assert!(run("wheat", 2.0, 0.9, 1).starts_with("Predicted yield is average"));
        assert!(run("wheat", 3.0, 0.9, 1).contains("above average"));
        assert!(run("rice", 3.0, 0.9, 1).starts_with("Predicted yield is average"));
    }

    #[test]
    fn test_confidence_caveat() {
        assert!(run("rice", 3.0, 0.55, 1).contains("Prediction confidence is moderate."));
        assert!(!run("rice", 3.0, 0.6, 1).contains("Prediction confidence is moderate."));
    }

    #[test]
    fn test_season_preparation_is_month_gated() {
        assert!(run("rice", 3.0, 0.9, 5).contains("kharif"));
        assert!(!run("rice", 3.0, 0.9, 8).contains("kharif"));
        assert!(run("wheat", 2.0, 0.9, 11).contains("rabi"));
        assert!(!run("sorghum", 2.0, 0.9, 5).contains("kharif"));
    }
}
