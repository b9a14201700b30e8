//! Yield gap analysis against a potential yield

use serde::{Deserialize, Serialize};

/// Attainable yield (t/ha) used when no crop-specific potential is given
pub const DEFAULT_POTENTIAL_YIELD: f64 = 6.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct YieldGap {
    pub predicted_yield: f64,
    pub potential_yield: f64,
    /// Negative when the estimate exceeds the potential
    pub yield_gap: f64,
    pub yield_gap_percent: f64,
    pub efficiency_percent: f64,
}

impl YieldGap {
    pub fn analyze(predicted_yield: f64, potential_yield: Option<f64>) -> Self {
        let potential_yield = potential_yield.unwrap_or(DEFAULT_POTENTIAL_YIELD);
        let yield_gap = potential_yield - predicted_yield;
        let (yield_gap_percent, efficiency_percent) = if potential_yield > 0.0 {
            (
                yield_gap / potential_yield * 100.0,
                predicted_yield / potential_yield * 100.0,
            )
        } else {
            (0.0, 0.0)
        };
        Self {
            predicted_yield,
            potential_yield,
            yield_gap,
            yield_gap_percent,
            efficiency_percent,
        }
    }

    /// Improvement suggestions scaled to the size of the gap
    pub fn suggestions(&self, soil_ph: Option<f64>) -> Vec<&'static str> {
        let mut out = Vec::new();
        if self.yield_gap_percent > 20.0 {
            out.extend([
                "Consider soil testing and nutrient management",
                "Optimize irrigation scheduling",
                "Use improved seed varieties",
            ]);
        }
        if self.yield_gap_percent > 30.0 {
            out.extend([
                "Implement integrated pest management",
                "Consider precision agriculture techniques",
            ]);
        }
        match soil_ph {
            Some(ph) if ph < 6.0 => out.push("Apply lime to increase soil pH"),
            Some(ph) if ph > 7.5 => out.push("Apply organic matter to reduce soil pH"),
            _ => {}
        }
        out
    }
}
