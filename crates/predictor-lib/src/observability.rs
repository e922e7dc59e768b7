//! Observability infrastructure for the flood predictor
//!
//! Provides:
//! - Prometheus metrics (evaluation latency, inference latency, alert counts, model variant)
//! - Structured JSON logging with tracing

use prometheus::{
    register_gauge, register_gauge_vec, register_histogram, register_int_counter, Gauge,
    GaugeVec, Histogram, IntCounter,
};
use std::sync::OnceLock;
use tracing::{error, info, warn};

/// Default histogram buckets for latency measurements (in seconds)
const LATENCY_BUCKETS: &[f64] = &[
    0.0001, 0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<EngineMetricsInner> = OnceLock::new();

struct EngineMetricsInner {
    evaluation_latency_seconds: Histogram,
    inference_latency_seconds: Histogram,
    evaluations: IntCounter,
    evaluation_failures: IntCounter,
    data_unavailable: IntCounter,
    alerts_dispatched: IntCounter,
    alert_failures: IntCounter,
    model_variant_info: GaugeVec,
    last_flood_probability: Gauge,
}

impl EngineMetricsInner {
    fn new() -> Self {
        Self {
            evaluation_latency_seconds: register_histogram!(
                "flood_predictor_evaluation_latency_seconds",
                "Time spent on a full evaluation, including store queries and dispatch",
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register evaluation_latency_seconds"),

            inference_latency_seconds: register_histogram!(
                "flood_predictor_inference_latency_seconds",
                "Time spent computing the flood probability",
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register inference_latency_seconds"),

            evaluations: register_int_counter!(
                "flood_predictor_evaluations_total",
                "Total number of completed evaluations"
            )
            .expect("Failed to register evaluations_total"),

            evaluation_failures: register_int_counter!(
                "flood_predictor_evaluation_failures_total",
                "Total number of evaluations that returned an error result"
            )
            .expect("Failed to register evaluation_failures_total"),

            data_unavailable: register_int_counter!(
                "flood_predictor_data_unavailable_total",
                "Total number of reading store queries treated as no data"
            )
            .expect("Failed to register data_unavailable_total"),

            alerts_dispatched: register_int_counter!(
                "flood_predictor_alerts_dispatched_total",
                "Total number of alert notifications published"
            )
            .expect("Failed to register alerts_dispatched_total"),

            alert_failures: register_int_counter!(
                "flood_predictor_alert_failures_total",
                "Total number of alert notifications that failed to publish"
            )
            .expect("Failed to register alert_failures_total"),

            model_variant_info: register_gauge_vec!(
                "flood_predictor_model_info",
                "Information about the active predictor",
                &["variant", "version"]
            )
            .expect("Failed to register model_info"),

            last_flood_probability: register_gauge!(
                "flood_predictor_last_flood_probability",
                "Flood probability from the most recent evaluation"
            )
            .expect("Failed to register last_flood_probability"),
        }
    }
}

/// Engine metrics for Prometheus exposition
///
/// A lightweight handle to the global metrics instance; clones share the
/// same underlying metrics.
#[derive(Clone)]
pub struct EngineMetrics {
    _private: (),
}

impl Default for EngineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineMetrics {
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(EngineMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &EngineMetricsInner {
        GLOBAL_METRICS.get().expect("Metrics not initialized")
    }

    pub fn observe_evaluation_latency(&self, duration_secs: f64) {
        self.inner().evaluation_latency_seconds.observe(duration_secs);
    }

    pub fn observe_inference_latency(&self, duration_secs: f64) {
        self.inner().inference_latency_seconds.observe(duration_secs);
    }

    pub fn record_evaluation(&self, probability: f64) {
        self.inner().evaluations.inc();
        self.inner().last_flood_probability.set(probability);
    }

    pub fn inc_evaluation_failures(&self) {
        self.inner().evaluation_failures.inc();
    }

    pub fn inc_data_unavailable(&self) {
        self.inner().data_unavailable.inc();
    }

    pub fn inc_alerts_dispatched(&self) {
        self.inner().alerts_dispatched.inc();
    }

    pub fn inc_alert_failures(&self) {
        self.inner().alert_failures.inc();
    }

    /// Replace the active predictor labels
    pub fn set_model_variant(&self, variant: &str, version: &str) {
        self.inner().model_variant_info.reset();
        self.inner()
            .model_variant_info
            .with_label_values(&[variant, version])
            .set(1.0);
    }
}

/// Structured logger for engine events
///
/// Every event carries the monitored site and a stable `event` field.
#[derive(Clone)]
pub struct StructuredLogger {
    site: String,
}

impl StructuredLogger {
    pub fn new(site: impl Into<String>) -> Self {
        Self { site: site.into() }
    }

    pub fn log_prediction(
        &self,
        gauge_id: &str,
        station_id: &str,
        flood_probability: f64,
        alert_level: &str,
        model_variant: &str,
    ) {
        info!(
            event = "prediction_generated",
            site = %self.site,
            gauge_id = %gauge_id,
            station_id = %station_id,
            flood_probability = flood_probability,
            alert_level = %alert_level,
            model_variant = %model_variant,
            "Generated flood prediction"
        );
    }

    pub fn log_alert_dispatched(&self, alert_level: &str, topic: &str) {
        info!(
            event = "alert_dispatched",
            site = %self.site,
            alert_level = %alert_level,
            topic = %topic,
            "Flood alert published"
        );
    }

    pub fn log_alert_failed(&self, alert_level: &str, topic: &str, error: &str) {
        warn!(
            event = "alert_dispatch_failed",
            site = %self.site,
            alert_level = %alert_level,
            topic = %topic,
            error = %error,
            "Flood alert could not be published"
        );
    }

    pub fn log_data_unavailable(&self, kind: &str, sensor_id: &str, reason: &str) {
        warn!(
            event = "data_unavailable",
            site = %self.site,
            kind = %kind,
            sensor_id = %sensor_id,
            reason = %reason,
            "Readings unavailable, continuing with defaults"
        );
    }

    pub fn log_model_selected(&self, variant: &str, version: &str, fallback_reason: Option<&str>) {
        match fallback_reason {
            None => info!(
                event = "model_loaded",
                site = %self.site,
                variant = %variant,
                version = %version,
                "Flood prediction model active"
            ),
            Some(reason) => warn!(
                event = "model_fallback",
                site = %self.site,
                variant = %variant,
                reason = %reason,
                "Heuristic predictor active"
            ),
        }
    }

    pub fn log_evaluation_failed(&self, error: &str) {
        error!(
            event = "evaluation_failed",
            site = %self.site,
            error = %error,
            "Flood evaluation failed"
        );
    }

    pub fn log_startup(&self, version: &str, gauge_id: &str, station_id: &str) {
        info!(
            event = "service_started",
            site = %self.site,
            service_version = %version,
            gauge_id = %gauge_id,
            station_id = %station_id,
            "Flood predictor started"
        );
    }

    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "service_shutdown",
            site = %self.site,
            reason = %reason,
            "Flood predictor shutting down"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_metrics_creation() {
        // Metrics live in the global Prometheus registry, so every handle
        // shares the same instance.
        let metrics = EngineMetrics::new();
        let other = EngineMetrics::new();

        metrics.observe_evaluation_latency(0.01);
        metrics.observe_inference_latency(0.001);
        metrics.record_evaluation(0.4);
        other.inc_alerts_dispatched();
        metrics.set_model_variant("heuristic", "heuristic");

        let families = prometheus::gather();
        assert!(families
            .iter()
            .any(|f| f.get_name() == "flood_predictor_evaluations_total"));
    }

    #[test]
    fn test_structured_logger_creation() {
        let logger = StructuredLogger::new("Potomac River");
        assert_eq!(logger.site, "Potomac River");
    }
}
