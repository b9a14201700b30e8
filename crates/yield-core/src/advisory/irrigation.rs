use super::rules::AdvisoryRules;
use super::{AdvisoryContext, AdvisoryError};

const TIMING: &str = "Best irrigation times: early morning (6-8 AM) or evening (6-8 PM).";

pub(super) fn advise(
    ctx: &AdvisoryContext<'_>,
    rules: &AdvisoryRules,
) -> Result<String, AdvisoryError> {
    let r = &rules.irrigation;
    let precip = ctx.value("precip_sum", rules.value_defaults.precip_sum)?;

    let mut text = if precip < r.low_rainfall_mm {
        format!(
            "Low rainfall detected ({precip:.0}mm). Increase irrigation to {} events. \
             Apply 50-60mm per irrigation. \
             Focus on critical growth stages: tillering and flowering.",
            r.optimal_events + r.low_rainfall_extra_events
        )
    } else if precip > r.high_rainfall_mm {
        format!(
            "High rainfall detected ({precip:.0}mm). Reduce irrigation frequency. \
             Monitor for waterlogging. Ensure proper drainage. \
             Apply irrigation only during dry spells."
        )
    } else {
        format!(
            "Normal rainfall pattern ({precip:.0}mm). Maintain {} irrigation events. \
             Apply 40-50mm per irrigation. Monitor soil moisture at 15cm depth.",
            r.optimal_events
        )
    };

    text.push(' ');
    text.push_str(TIMING);
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::advisory::test_support::prediction;
    use crate::models::RawInputRecord;

    fn run(precip: f64) -> String {
        let p = prediction(3.0, 0.9, &[("precip_sum", precip)]);
        let r = RawInputRecord::default();
        advise(&AdvisoryContext::new(&p, &r, 1), &AdvisoryRules::default()).unwrap()
    }

    #[test]
    fn test_low_rainfall_increases_events() {
        let text = run(300.0);
        assert!(text.starts_with("Low rainfall detected (300mm)."));
        assert!(text.contains("Increase irrigation to 10 events"));
        assert!(text.ends_with(TIMING));
    }

    #[test]
    fn test_high_rainfall() {
        let text = run(1500.0);
        assert!(text.starts_with("High rainfall detected (1500mm)."));
        assert!(text.contains("drainage"));
    }

    #[test]
    fn test_normal_rainfall_and_boundaries() {
        assert!(run(800.0).contains("Maintain 8 irrigation events"));
        assert!(run(500.0).starts_with("Normal rainfall"));
        assert!(run(1200.0).starts_with("Normal rainfall"));
    }
}
