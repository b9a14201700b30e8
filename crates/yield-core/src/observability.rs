//! Observability infrastructure for the yield pipeline
//!
//! Provides:
//! - Prometheus metrics (prediction latency, error kinds, fallbacks, model info)
//! - Structured JSON logging with tracing

use prometheus::{
    register_gauge_vec_with_registry, register_histogram_with_registry,
    register_int_counter_vec_with_registry, register_int_counter_with_registry, Encoder, GaugeVec,
    Histogram, IntCounter, IntCounterVec, Registry, TextEncoder,
};
use std::sync::OnceLock;
use tracing::{info, warn};

/// Histogram buckets for latency measurements (in seconds)
const LATENCY_BUCKETS: &[f64] = &[
    0.0001, 0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0,
];

/// Global metrics instance. `None` if registration failed; recording is then a no-op.
static GLOBAL_METRICS: OnceLock<Option<CoreMetricsInner>> = OnceLock::new();

struct CoreMetricsInner {
    registry: Registry,
    prediction_latency_seconds: Histogram,
    predictions_total: IntCounterVec,
    prediction_errors: IntCounterVec,
    low_confidence_total: IntCounter,
    unseen_categories: IntCounterVec,
    upstream_fallbacks: IntCounterVec,
    advisory_fallbacks: IntCounterVec,
    model_info: GaugeVec,
}

impl CoreMetricsInner {
    fn new() -> prometheus::Result<Self> {
        let registry = Registry::new();
        Ok(Self {
            prediction_latency_seconds: register_histogram_with_registry!(
                "yield_prediction_latency_seconds",
                "Time spent producing one prediction and advisory",
                LATENCY_BUCKETS.to_vec(),
                registry
            )?,
            predictions_total: register_int_counter_vec_with_registry!(
                "yield_predictions_total",
                "Predictions produced, by confidence profile",
                &["profile"],
                registry
            )?,
            prediction_errors: register_int_counter_vec_with_registry!(
                "yield_prediction_errors_total",
                "Rejected or failed prediction requests, by error kind",
                &["kind"],
                registry
            )?,
            low_confidence_total: register_int_counter_with_registry!(
                "yield_low_confidence_predictions_total",
                "Predictions whose confidence fell below the disclaimer threshold",
                registry
            )?,
            unseen_categories: register_int_counter_vec_with_registry!(
                "yield_unseen_categories_total",
                "Categorical values remapped to the fallback class",
                &["field"],
                registry
            )?,
            upstream_fallbacks: register_int_counter_vec_with_registry!(
                "yield_upstream_fallbacks_total",
                "Requests served with default-filled weather or soil data",
                &["family"],
                registry
            )?,
            advisory_fallbacks: register_int_counter_vec_with_registry!(
                "yield_advisory_fallbacks_total",
                "Advisory domains that fell back to generic guidance",
                &["domain"],
                registry
            )?,
            model_info: register_gauge_vec_with_registry!(
                "yield_model_info",
                "Information about the currently bound model artifact",
                &["model_name", "kind"],
                registry
            )?,
            registry,
        })
    }
}

/// Handle to the process-wide pipeline metrics.
///
/// Clones share the same underlying metrics.
#[derive(Clone)]
pub struct CoreMetrics {
    _private: (),
}

impl Default for CoreMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl CoreMetrics {
    /// Create a metrics handle (registers the metrics on first call)
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(|| match CoreMetricsInner::new() {
            Ok(inner) => Some(inner),
            Err(e) => {
                warn!(error = %e, "Failed to register metrics, recording disabled");
                None
            }
        });
        Self { _private: () }
    }

    fn inner(&self) -> Option<&CoreMetricsInner> {
        GLOBAL_METRICS.get().and_then(Option::as_ref)
    }

    pub fn observe_prediction_latency(&self, duration_secs: f64) {
        if let Some(m) = self.inner() {
            m.prediction_latency_seconds.observe(duration_secs);
        }
    }

    pub fn inc_predictions(&self, profile: &str) {
        if let Some(m) = self.inner() {
            m.predictions_total.with_label_values(&[profile]).inc();
        }
    }

    pub fn inc_prediction_errors(&self, kind: &str) {
        if let Some(m) = self.inner() {
            m.prediction_errors.with_label_values(&[kind]).inc();
        }
    }

    pub fn inc_low_confidence(&self) {
        if let Some(m) = self.inner() {
            m.low_confidence_total.inc();
        }
    }

    pub fn inc_unseen_category(&self, field: &str) {
        if let Some(m) = self.inner() {
            m.unseen_categories.with_label_values(&[field]).inc();
        }
    }

    pub fn inc_upstream_fallback(&self, family: &str) {
        if let Some(m) = self.inner() {
            m.upstream_fallbacks.with_label_values(&[family]).inc();
        }
    }

    pub fn inc_advisory_fallback(&self, domain: &str) {
        if let Some(m) = self.inner() {
            m.advisory_fallbacks.with_label_values(&[domain]).inc();
        }
    }

    /// Replace the bound-model info series
    pub fn set_model_info(&self, model_name: &str, kind: &str) {
        if let Some(m) = self.inner() {
            m.model_info.reset();
            m.model_info.with_label_values(&[model_name, kind]).set(1.0);
        }
    }

    pub fn unseen_category_count(&self, field: &str) -> u64 {
        self.inner()
            .map(|m| m.unseen_categories.with_label_values(&[field]).get())
            .unwrap_or(0)
    }

    pub fn advisory_fallback_count(&self, domain: &str) -> u64 {
        self.inner()
            .map(|m| m.advisory_fallbacks.with_label_values(&[domain]).get())
            .unwrap_or(0)
    }

    /// Prometheus text exposition of every pipeline metric
    pub fn render(&self) -> String {
        let Some(m) = self.inner() else {
            return String::new();
        };
        let mut buffer = Vec::new();
        if let Err(e) = TextEncoder::new().encode(&m.registry.gather(), &mut buffer) {
            warn!(error = %e, "Failed to encode metrics");
            return String::new();
        }
        String::from_utf8_lossy(&buffer).into_owned()
    }
}

/// Structured logger for pipeline events
#[derive(Clone)]
pub struct StructuredLogger {
    component: String,
}

impl StructuredLogger {
    pub fn new(component: impl Into<String>) -> Self {
        Self {
            component: component.into(),
        }
    }

    pub fn log_prediction(
        &self,
        crop: &str,
        predicted_yield: f64,
        confidence: f64,
        data_quality: f64,
        profile: &str,
        model_version: &str,
    ) {
        info!(
            event = "prediction_generated",
            component = %self.component,
            crop = %crop,
            predicted_yield_t_ha = predicted_yield,
            confidence = confidence,
            data_quality = data_quality,
            profile = %profile,
            model_version = %model_version,
            "Generated yield prediction"
        );
    }

    pub fn log_prediction_rejected(&self, kind: &str, details: &str) {
        warn!(
            event = "prediction_rejected",
            component = %self.component,
            kind = %kind,
            details = %details,
            "Prediction request rejected"
        );
    }

    pub fn log_unseen_category(&self, field: &str, value: &str, fallback: &str) {
        warn!(
            event = "unseen_category",
            component = %self.component,
            field = %field,
            value = %value,
            fallback = %fallback,
            "Unseen category remapped to fallback class"
        );
    }

    pub fn log_advisory_fallback(&self, domain: &str, reason: &str) {
        warn!(
            event = "advisory_fallback",
            component = %self.component,
            domain = %domain,
            reason = %reason,
            "Advisory domain fell back to generic guidance"
        );
    }

    pub fn log_fit_complete(
        &self,
        n_samples: usize,
        n_candidates: usize,
        n_selected: usize,
        fingerprint: &str,
    ) {
        info!(
            event = "feature_fit_complete",
            component = %self.component,
            n_samples = n_samples,
            n_candidates = n_candidates,
            n_selected = n_selected,
            fingerprint = %fingerprint,
            "Feature engineer fitted"
        );
    }

    pub fn log_model_bound(
        &self,
        model_name: &str,
        kind: &str,
        n_features: usize,
        has_importances: bool,
    ) {
        info!(
            event = "model_bound",
            component = %self.component,
            model_name = %model_name,
            kind = %kind,
            n_features = n_features,
            has_importances = has_importances,
            "Model artifact bound"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_handles_share_state() {
        let a = CoreMetrics::new();
        let b = a.clone();
        let before = b.unseen_category_count("test_field");
        a.inc_unseen_category("test_field");
        assert_eq!(b.unseen_category_count("test_field"), before + 1);
    }

    #[test]
    fn test_render_contains_registered_series() {
        let metrics = CoreMetrics::new();
        metrics.inc_predictions("simple");
        let text = metrics.render();
        assert!(text.contains("yield_predictions_total"));
        assert!(text.contains("profile=\"simple\""));
    }
}
