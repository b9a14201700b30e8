//! Categorical label encoding with a deterministic fallback class

use crate::error::{CoreError, CoreResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Stand-in for an absent categorical value
pub const UNKNOWN_CATEGORY: &str = "unknown";

/// Categorical record fields, in emission order
pub const CATEGORICAL_FIELDS: [&str; 4] = ["crop", "soil_type", "state", "district"];

/// Normalize a raw categorical value; absent or blank becomes [`UNKNOWN_CATEGORY`]
pub fn normalize_category(value: Option<&str>) -> String {
    value
        .map(|v| v.trim().to_lowercase())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| UNKNOWN_CATEGORY.to_string())
}

/// Result of encoding one value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Encoded {
    pub code: usize,
    pub fell_back: bool,
}

/// Label encoder frozen at fit time.
///
/// Classes are sorted so the code of a category does not depend on
/// training record order. Unseen values map to the first class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryEncoder {
    pub field: String,
    pub classes: Vec<String>,
}

impl CategoryEncoder {
    pub fn fit<'a>(field: &str, values: impl IntoIterator<Item = &'a str>) -> CoreResult<Self> {
        let classes: BTreeSet<String> = values.into_iter().map(str::to_string).collect();
        if classes.is_empty() {
            return Err(CoreError::Fit(format!("no values to encode for {field}")));
        }
        Ok(Self {
            field: field.to_string(),
            classes: classes.into_iter().collect(),
        })
    }

    pub fn feature_name(&self) -> String {
        format!("{}_encoded", self.field)
    }

    pub fn fallback(&self) -> &str {
        // fit rejects empty class lists
        self.classes.first().map(String::as_str).unwrap_or(UNKNOWN_CATEGORY)
    }

    pub fn encode(&self, value: &str) -> Encoded {
        match self.classes.binary_search_by(|c| c.as_str().cmp(value)) {
            Ok(code) => Encoded {
                code,
                fell_back: false,
            },
            Err(_) => Encoded {
                code: 0,
                fell_back: true,
            },
        }
    }
}
