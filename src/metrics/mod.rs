//! Prometheus metrics for the inference models.
//!
//! Covers query volume and latency per model, recommendation fallbacks,
//! the lifecycle phase of every model, and how long initialization took.
//!
//! # Example
//! ```no_run
//! use tickit_inference::metrics::{self, INFERENCE_REQUESTS_TOTAL};
//!
//! metrics::init_metrics().ok();
//! INFERENCE_REQUESTS_TOTAL
//!     .with_label_values(&["recommendation", "success"])
//!     .inc();
//! println!("{}", metrics::gather_metrics());
//! ```

use crate::lifecycle::LifecyclePhase;
use lazy_static::lazy_static;
use prometheus::{
    CounterVec, GaugeVec, HistogramOpts, HistogramVec, IntCounter, Opts, Registry,
};
use std::sync::Once;
use std::time::Duration;

const NAMESPACE: &str = "tickit_inference";

lazy_static! {
    /// Global Prometheus registry for all metrics
    pub static ref PROMETHEUS_REGISTRY: Registry = Registry::new();

    // ============================================================================
    // Query Metrics
    // ============================================================================

    /// Total number of inference queries
    ///
    /// Labels: model, outcome (success, fallback, invalid, unavailable, error)
    pub static ref INFERENCE_REQUESTS_TOTAL: CounterVec = CounterVec::new(
        Opts::new("inference_requests_total", "Total number of inference queries")
            .namespace(NAMESPACE),
        &["model", "outcome"]
    ).expect("Failed to create INFERENCE_REQUESTS_TOTAL metric");

    /// Inference query duration in seconds
    ///
    /// Labels: model
    pub static ref INFERENCE_DURATION_SECONDS: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            "inference_duration_seconds",
            "Inference query duration in seconds"
        )
        .namespace(NAMESPACE)
        .buckets(vec![0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5]),
        &["model"]
    ).expect("Failed to create INFERENCE_DURATION_SECONDS metric");

    /// Recommendation responses served from the random fallback
    pub static ref RECOMMENDATION_FALLBACKS_TOTAL: IntCounter = IntCounter::with_opts(
        Opts::new(
            "recommendation_fallbacks_total",
            "Recommendation responses served from the random fallback"
        )
        .namespace(NAMESPACE)
    ).expect("Failed to create RECOMMENDATION_FALLBACKS_TOTAL metric");

    // ============================================================================
    // Lifecycle Metrics
    // ============================================================================

    /// Current lifecycle phase per model
    ///
    /// Labels: model. Values: 0 uninitialized, 1 loading, 2 building, 3 ready, 4 unavailable
    pub static ref MODEL_LIFECYCLE_PHASE: GaugeVec = GaugeVec::new(
        Opts::new("model_lifecycle_phase", "Current lifecycle phase per model")
            .namespace(NAMESPACE),
        &["model"]
    ).expect("Failed to create MODEL_LIFECYCLE_PHASE metric");

    /// Time to make a model ready, in seconds
    ///
    /// Labels: model, origin (loaded, built)
    pub static ref MODEL_INIT_DURATION_SECONDS: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            "model_init_duration_seconds",
            "Time to make a model ready in seconds"
        )
        .namespace(NAMESPACE)
        .buckets(vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0]),
        &["model", "origin"]
    ).expect("Failed to create MODEL_INIT_DURATION_SECONDS metric");

    /// Model initialization or rebuild failures
    ///
    /// Labels: model
    pub static ref MODEL_INIT_FAILURES_TOTAL: CounterVec = CounterVec::new(
        Opts::new("model_init_failures_total", "Model initialization or rebuild failures")
            .namespace(NAMESPACE),
        &["model"]
    ).expect("Failed to create MODEL_INIT_FAILURES_TOTAL metric");
}

static INIT: Once = Once::new();

/// Register all metrics with the registry.
///
/// Safe to call more than once; only the first call registers.
pub fn init_metrics() -> Result<(), prometheus::Error> {
    let mut result = Ok(());

    INIT.call_once(|| {
        result = register_all();
        if result.is_ok() {
            tracing::info!("Prometheus metrics initialized successfully");
        }
    });

    result
}

fn register_all() -> Result<(), prometheus::Error> {
    PROMETHEUS_REGISTRY.register(Box::new(INFERENCE_REQUESTS_TOTAL.clone()))?;
    PROMETHEUS_REGISTRY.register(Box::new(INFERENCE_DURATION_SECONDS.clone()))?;
    PROMETHEUS_REGISTRY.register(Box::new(RECOMMENDATION_FALLBACKS_TOTAL.clone()))?;

    PROMETHEUS_REGISTRY.register(Box::new(MODEL_LIFECYCLE_PHASE.clone()))?;
    PROMETHEUS_REGISTRY.register(Box::new(MODEL_INIT_DURATION_SECONDS.clone()))?;
    PROMETHEUS_REGISTRY.register(Box::new(MODEL_INIT_FAILURES_TOTAL.clone()))?;

    Ok(())
}

/// Record the outcome and latency of one query
pub fn record_query(model: &str, outcome: &str, elapsed: Duration) {
    INFERENCE_REQUESTS_TOTAL
        .with_label_values(&[model, outcome])
        .inc();
    INFERENCE_DURATION_SECONDS
        .with_label_values(&[model])
        .observe(elapsed.as_secs_f64());
}

/// Publish a model's lifecycle phase
pub fn set_lifecycle_phase(model: &str, phase: LifecyclePhase) {
    MODEL_LIFECYCLE_PHASE
        .with_label_values(&[model])
        .set(phase.as_gauge());
}

/// Generate Prometheus text format metrics
pub fn gather_metrics() -> String {
    use prometheus::Encoder;
    let encoder = prometheus::TextEncoder::new();
    let metric_families = PROMETHEUS_REGISTRY.gather();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!("Failed to encode metrics: {}", e);
        return String::from("# Error encoding metrics\n");
    }

    String::from_utf8(buffer).unwrap_or_else(|e| {
        tracing::error!("Failed to convert metrics to string: {}", e);
        String::from("# Error converting metrics\n")
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_is_idempotent() {
        assert!(init_metrics().is_ok());
        assert!(init_metrics().is_ok());
    }

    #[test]
    fn test_record_query() {
        record_query("unit_test_model", "success", Duration::from_millis(3));

        let value = INFERENCE_REQUESTS_TOTAL
            .with_label_values(&["unit_test_model", "success"])
            .get();
        assert!(value >= 1.0);
    }

    #[test]
    fn test_gather_metrics() {
        init_metrics().ok();
        set_lifecycle_phase("unit_test_gauge", LifecyclePhase::Ready);

        let metrics = gather_metrics();
        assert!(metrics.contains("tickit_inference_model_lifecycle_phase"));
    }
}
