//! Error types for the yield prediction core

use thiserror::Error;

pub type CoreResult<T> = std::result::Result<T, CoreError>;

/// Failures the core surfaces to its caller.
///
/// Missing or failed external weather/soil data is deliberately absent from
/// this list: it is recovered with defaults and a lower data-quality score.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Request rejected before any computation
    #[error("invalid input for {field}: {reason}")]
    InvalidInput { field: &'static str, reason: String },

    /// Features selected at fit time cannot be produced at serve time
    #[error("feature schema mismatch: missing {missing:?} (state fingerprint {fingerprint})")]
    SchemaMismatch {
        missing: Vec<String>,
        fingerprint: String,
    },

    #[error("no model artifact is bound")]
    ModelNotLoaded,

    /// Vector width disagrees with the bound model
    #[error("feature count mismatch: model expects {expected}, got {got}")]
    FeatureSchemaMismatch { expected: usize, got: usize },

    #[error("cannot fit feature engineer: {0}")]
    Fit(String),

    #[error("model inference failed: {0}")]
    Inference(String),

    #[error("invalid model artifact: {0}")]
    Artifact(String),
}

impl CoreError {
    pub fn invalid_input(field: &'static str, reason: impl Into<String>) -> Self {
        CoreError::InvalidInput {
            field,
            reason: reason.into(),
        }
    }

    /// Stable label for metrics and logs
    pub fn kind(&self) -> &'static str {
        match self {
            CoreError::InvalidInput { .. } => "invalid_input",
            CoreError::SchemaMismatch { .. } => "schema_mismatch",
            CoreError::ModelNotLoaded => "model_not_loaded",
            CoreError::FeatureSchemaMismatch { .. } => "feature_schema_mismatch",
            CoreError::Fit(_) => "fit",
            CoreError::Inference(_) => "inference",
            CoreError::Artifact(_) => "artifact",
        }
    }

    /// Whether retrying the same request could ever succeed
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            CoreError::SchemaMismatch { .. }
                | CoreError::ModelNotLoaded
                | CoreError::FeatureSchemaMismatch { .. }
                | CoreError::Artifact(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_input_display() {
        let err = CoreError::invalid_input("latitude", "95 is outside [-90, 90]");
        assert_eq!(
            err.to_string(),
            "invalid input for latitude: 95 is outside [-90, 90]"
        );
        assert!(!err.is_fatal());
        assert_eq!(err.kind(), "invalid_input");
    }

    #[test]
    fn test_schema_mismatch_is_fatal() {
        let err = CoreError::SchemaMismatch {
            missing: vec!["gdd_deficit".to_string()],
            fingerprint: "abcd".to_string(),
        };
        assert!(err.is_fatal());
        assert!(err.to_string().contains("gdd_deficit"));
    }

    #[test]
    fn test_feature_count_mismatch_display() {
        let err = CoreError::FeatureSchemaMismatch {
            expected: 12,
            got: 10,
        };
        assert!(err.to_string().contains("expects 12, got 10"));
    }
}
