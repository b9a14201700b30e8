use super::rules::AdvisoryRules;
use super::{AdvisoryContext, AdvisoryError};
use std::fmt;

const IPM: &str = "Use integrated pest management: \
                   biological control, resistant varieties, and targeted pesticide use.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub(super) enum RiskLevel {
    Low,
    Medium,
    High,
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RiskLevel::Low => write!(f, "Low"),
            RiskLevel::Medium => write!(f, "Medium"),
            RiskLevel::High => write!(f, "High"),
        }
    }
}

pub(super) fn advise(
    ctx: &AdvisoryContext<'_>,
    rules: &AdvisoryRules,
) -> Result<String, AdvisoryError> {
    let r = &rules.pest;
    let d = &rules.value_defaults;
    let humidity = ctx.value("humidity_mean", d.humidity_mean)?;
    let temp_max = ctx.value("temp_max", d.temp_max)?;
    let precip = ctx.value("precip_sum", d.precip_sum)?;

    let mut level = RiskLevel::Low;
    let mut factors = Vec::new();
    if humidity > r.high_humidity_pct {
        level = RiskLevel::High;
        factors.push("high humidity");
    }
    if temp_max > r.high_temp_c {
        level = level.max(RiskLevel::Medium);
        factors.push("high temperature");
    }
    if precip > r.excessive_rainfall_mm {
        level = RiskLevel::High;
        factors.push("excessive rainfall");
    }

    let mut text = format!("{level} pest risk detected");
    if factors.is_empty() {
        text.push_str(". ");
    } else {
        text.push_str(&format!(" due to {}. ", factors.join(", ")));
    }

    let guidance = match (ctx.crop.as_str(), level) {
        ("rice", RiskLevel::High) => {
            "Monitor for blast, brown spot, and stem borer. Apply preventive fungicide spray. \
             Use pheromone traps for stem borer control. "
        }
        ("rice", RiskLevel::Medium) => {
            "Regular field monitoring recommended. \
             Watch for early signs of blast and bacterial blight. "
        }
        ("rice", RiskLevel::Low) => "Continue regular field inspection. Maintain field hygiene. ",
        (_, RiskLevel::High) => {
            "Increase field monitoring frequency. \
             Consider preventive spray if weather continues. "
        }
        _ => "Regular monitoring sufficient. Maintain good field sanitation. ",
    };
    text.push_str(guidance);
    text.push_str(IPM);
    Ok(text)
}
