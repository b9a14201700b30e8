//! Core library for crop yield prediction and advisory
//!
//! This crate contains:
//! - Data models for field records, feature vectors and results
//! - Feature engineering with frozen fit-time state
//! - Model adapter over tree, linear and ONNX regressors
//! - Confidence and interval estimation
//! - Advisory rule engine
//! - Pipeline orchestration
//! - Observability infrastructure (metrics and structured logging)

pub mod advisory;
pub mod error;
pub mod features;
pub mod gap;
pub mod models;
pub mod observability;
pub mod pipeline;
pub mod predictor;
pub mod translation;
pub mod uncertainty;

pub use advisory::{AdvisoryEngine, AdvisoryRules};
pub use error::{CoreError, CoreResult};
pub use features::{FeatureConfig, FeatureEngineer, FeatureEngineerState};
pub use gap::YieldGap;
pub use models::*;
pub use observability::{CoreMetrics, StructuredLogger};
pub use pipeline::{
    ModelInfo, PipelineConfig, QuickEstimateRequest, ValidationConfig, YieldPipeline,
};
pub use predictor::{ModelAdapter, ModelArtifact, ModelSpec, Regressor};
pub use translation::{IdentityTranslator, Translator};
pub use uncertainty::{EstimatorProfile, UncertaintyEstimator};
