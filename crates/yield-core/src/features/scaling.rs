//! Per-column standardization parameters

use serde::{Deserialize, Serialize};

/// Name suffixes of indicator-style columns that are never standardized
pub const UNSCALED_SUFFIXES: [&str; 5] = ["_encoded", "_optimal", "_high", "_low", "_missing"];

const MIN_STD: f64 = 1e-12;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ColumnScaling {
    Unscaled,
    Standard { mean: f64, std: f64 },
}

impl ColumnScaling {
    /// Fit on a fully filled column.
    ///
    /// Columns named like indicators, with two or fewer distinct values,
    /// or with zero variance pass through unchanged.
    pub fn fit(name: &str, values: &[f64]) -> Self {
        if UNSCALED_SUFFIXES.iter().any(|s| name.ends_with(s)) || distinct_at_most_two(values) {
            return ColumnScaling::Unscaled;
        }
        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
        let std = var.sqrt();
        if !std.is_finite() || std < MIN_STD {
            return ColumnScaling::Unscaled;
        }
        ColumnScaling::Standard { mean, std }
    }

    pub fn apply(&self, value: f64) -> f64 {
        match *self {
            ColumnScaling::Unscaled => value,
            ColumnScaling::Standard { mean, std } => (value - mean) / std,
        }
    }

    pub fn is_scaled(&self) -> bool {
        matches!(self, ColumnScaling::Standard { .. })
    }
}

fn distinct_at_most_two(values: &[f64]) -> bool {
    let mut seen: Vec<f64> = Vec::with_capacity(3);
    for v in values {
        if !seen.iter().any(|s| s.to_bits() == v.to_bits()) {
            seen.push(*v);
            if seen.len() > 2 {
                return false;
            }
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_scaling() {
        let scaling = ColumnScaling::fit("precip_sum", &[1.0, 2.0, 3.0, 4.0]);
        let ColumnScaling::Standard { mean, std } = scaling else {
            panic!("expected standard scaling");
        };
        assert!((mean - 2.5).abs() < 1e-12);
        assert!((std - 1.25f64.sqrt()).abs() < 1e-12);
        assert!((scaling.apply(2.5)).abs() < 1e-12);
    }

    #[test]
    fn test_indicator_suffixes_pass_through() {
        for name in ["crop_encoded", "gdd_optimal", "soil_organic_low", "gdd_missing"] {
            assert_eq!(
                ColumnScaling::fit(name, &[0.0, 1.0, 2.0, 5.0]),
                ColumnScaling::Unscaled
            );
        }
    }

    #[test]
    fn test_binary_and_constant_columns_pass_through() {
        assert!(!ColumnScaling::fit("flood_risk", &[0.0, 1.0, 0.0, 1.0]).is_scaled());
        assert!(!ColumnScaling::fit("temp_mean", &[26.0, 26.0, 26.0]).is_scaled());
        assert_eq!(ColumnScaling::Unscaled.apply(3.5), 3.5);
    }
}
