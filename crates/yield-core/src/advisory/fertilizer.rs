use super::rules::AdvisoryRules;
use super::{AdvisoryContext, AdvisoryError};
use std::fmt::Write;

pub(super) fn advise(
    ctx: &AdvisoryContext<'_>,
    rules: &AdvisoryRules,
) -> Result<String, AdvisoryError> {
    let soil = &rules.soil;
    let plan = rules
        .fertilizer_plan(&ctx.crop)
        .ok_or_else(|| AdvisoryError::MissingTable {
            table: "fertilizer",
            crop: ctx.crop.clone(),
        })?;

    let ph = ctx.value("soil_phh2o", rules.value_defaults.soil_phh2o)?;
    let organic = ctx.value("soil_soc", rules.value_defaults.soil_soc)?;

    let farmer = &ctx.record.farmer;
    let applied_n = farmer.fertilizer_n_kg.unwrap_or(0.0);
    let applied_p = farmer.fertilizer_p_kg.unwrap_or(0.0);
    let applied_k = farmer.fertilizer_k_kg.unwrap_or(0.0);
    if ![applied_n, applied_p, applied_k].iter().all(|v| v.is_finite()) {
        return Err(AdvisoryError::NonFinite { field: "fertilizer" });
    }

    let mut target_n = plan.nitrogen;
    let mut text = String::new();

    if ph < soil.ph_low {
        target_n += soil.low_ph_nitrogen_boost;
        let _ = write!(
            text,
            "Soil pH is low ({ph:.1}). Apply lime before fertilization. \
             Nitrogen target raised to {target_n:.0} kg/ha. "
        );
    } else if ph > soil.ph_high {
        let _ = write!(text, "Soil pH is high ({ph:.1}). Consider sulfur application. ");
    } else {
        let _ = write!(text, "Soil pH is optimal ({ph:.1}). ");
    }

    if organic < soil.organic_low {
        target_n += soil.low_organic_nitrogen_boost;
        let _ = write!(
            text,
            "Low organic matter detected. Increase nitrogen to {target_n:.0} kg/ha. "
        );
    }

    let gap = target_n - applied_n;
    if gap > soil.nitrogen_neutral_band {
        let _ = write!(text, "Apply additional {gap:.0} kg/ha nitrogen. ");
    } else if gap < -soil.nitrogen_neutral_band {
        let _ = write!(text, "Reduce nitrogen by {:.0} kg/ha to avoid lodging. ", gap.abs());
    } else {
        text.push_str("Current nitrogen level is adequate. ");
    }

    if applied_p < plan.phosphorus {
        let _ = write!(text, "Apply {:.0} kg/ha phosphorus. ", plan.phosphorus - applied_p);
    }
    if applied_k < plan.potassium {
        let _ = write!(text, "Apply {:.0} kg/ha potassium. ", plan.potassium - applied_k);
    }

    let (splits, schedule) = rules.split_schedule(&ctx.crop);
    let _ = write!(text, "Split fertilizer application into {splits} doses: {schedule}.");
    Ok(text)
}
