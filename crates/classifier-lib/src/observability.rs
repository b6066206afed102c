//! Observability infrastructure for the predictor app
//!
//! Provides:
//! - Prometheus metrics (prediction latency, outcomes, loaded pipeline)
//! - Structured JSON logging with tracing

use crate::adapter::OutcomeStatus;
use crate::estimator::PipelineKind;
use prometheus::{
    register_gauge, register_gauge_vec, register_histogram, register_int_counter_vec, Gauge,
    GaugeVec, Histogram, IntCounterVec,
};
use std::path::Path;
use std::sync::OnceLock;
use tracing::{info, warn};

/// Histogram buckets for prediction latency (in seconds)
const LATENCY_BUCKETS: &[f64] = &[
    0.0001, 0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0,
];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<AppMetricsInner> = OnceLock::new();

struct AppMetricsInner {
    prediction_latency_seconds: Histogram,
    predictions_total: IntCounterVec,
    pipeline_info: GaugeVec,
    pipeline_load_seconds: Gauge,
}

impl AppMetricsInner {
    fn new() -> Self {
        Self {
            prediction_latency_seconds: register_histogram!(
                "drug_app_prediction_latency_seconds",
                "Time spent in the prediction adapter per request",
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register prediction_latency_seconds"),

            predictions_total: register_int_counter_vec!(
                "drug_app_predictions_total",
                "Prediction requests by outcome",
                &["outcome"]
            )
            .expect("Failed to register predictions_total"),

            pipeline_info: register_gauge_vec!(
                "drug_app_pipeline_info",
                "Information about the pipeline installed at startup",
                &["kind", "version"]
            )
            .expect("Failed to register pipeline_info"),

            pipeline_load_seconds: register_gauge!(
                "drug_app_pipeline_load_seconds",
                "Time spent loading the pipeline at startup"
            )
            .expect("Failed to register pipeline_load_seconds"),
        }
    }
}

/// App metrics for Prometheus exposition
///
/// Lightweight handle to the global metrics instance; clones share the same
/// underlying metrics.
#[derive(Clone)]
pub struct AppMetrics {
    _private: (),
}

impl Default for AppMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl AppMetrics {
    /// Create a new metrics handle (initializes global metrics if needed)
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(AppMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &AppMetricsInner {
        GLOBAL_METRICS.get_or_init(AppMetricsInner::new)
    }

    /// Record one served prediction
    pub fn observe_prediction(&self, status: OutcomeStatus, duration_secs: f64) {
        let inner = self.inner();
        inner.prediction_latency_seconds.observe(duration_secs);
        inner
            .predictions_total
            .with_label_values(&[status.as_str()])
            .inc();
    }

    /// Record the installed pipeline
    pub fn set_pipeline(&self, kind: PipelineKind, version: &str, load_secs: f64) {
        let inner = self.inner();
        inner.pipeline_info.reset();
        inner
            .pipeline_info
            .with_label_values(&[kind.as_str(), version])
            .set(1.0);
        inner.pipeline_load_seconds.set(load_secs);
    }
}

/// Structured logger for app lifecycle and prediction events
#[derive(Clone)]
pub struct StructuredLogger {
    instance: String,
}

impl StructuredLogger {
    pub fn new(instance: impl Into<String>) -> Self {
        Self {
            instance: instance.into(),
        }
    }

    pub fn log_startup(&self, version: &str, model_path: &Path) {
        info!(
            event = "app_started",
            instance = %self.instance,
            app_version = %version,
            model_path = %model_path.display(),
            "Drug classification predictor starting"
        );
    }

    pub fn log_pipeline_loaded(
        &self,
        kind: PipelineKind,
        version: &str,
        model_path: &Path,
        load_secs: f64,
    ) {
        match kind {
            PipelineKind::Onnx => info!(
                event = "pipeline_loaded",
                instance = %self.instance,
                kind = kind.as_str(),
                model_version = %version,
                model_path = %model_path.display(),
                load_secs = load_secs,
                "Pipeline loaded"
            ),
            PipelineKind::StandIn => warn!(
                event = "stand_in_active",
                instance = %self.instance,
                kind = kind.as_str(),
                model_path = %model_path.display(),
                "Using a stand-in pipeline; predictions are not real"
            ),
        }
    }

    pub fn log_prediction(&self, channel: &str, status: OutcomeStatus, result: &str, latency_ms: f64) {
        if status == OutcomeStatus::Predicted {
            info!(
                event = "prediction_served",
                instance = %self.instance,
                channel = %channel,
                outcome = status.as_str(),
                result = %result,
                latency_ms = latency_ms,
                "Prediction served"
            );
        } else {
            warn!(
                event = "prediction_served",
                instance = %self.instance,
                channel = %channel,
                outcome = status.as_str(),
                result = %result,
                latency_ms = latency_ms,
                "Prediction served with error"
            );
        }
    }

    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "app_shutdown",
            instance = %self.instance,
            reason = %reason,
            "Drug classification predictor shutting down"
        );
    }
}
