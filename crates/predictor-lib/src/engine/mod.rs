//! Evaluation orchestrator
//!
//! One evaluation reads the latest gauge and weather records, computes a
//! flood probability, maps it to a tier, notifies when the tier warrants
//! it, and reports the outcome. Missing data and a missing model degrade
//! the evaluation; anything else is returned as an error result.

use crate::alert::{alert_message, AlertDispatcher, DispatchOutcome};
use crate::error::{EngineError, StoreError};
use crate::health::{components, HealthRegistry};
use crate::models::{AlertTier, EvaluationRequest, EvaluationResponse, PredictionResult};
use crate::observability::{EngineMetrics, StructuredLogger};
use crate::predictor::{classify, LoadedModel, ModelProvider, ModelVariant, RiskClassifier};
use crate::store::{ReadingStore, SensorKind};
use chrono::{DateTime, SecondsFormat, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;


/// Site and default sensors evaluated by the engine
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub site_name: String,
    pub gauge_id: String,
    pub station_id: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            site_name: "Potomac River".to_string(),
            gauge_id: "01646500".to_string(),
            station_id: "KDCA".to_string(),
        }
    }
}

pub struct FloodEngine {
    config: EngineConfig,
    store: Arc<dyn ReadingStore>,
    provider: Arc<ModelProvider>,
    classifier: RiskClassifier,
    dispatcher: AlertDispatcher,
    health: HealthRegistry,
    metrics: EngineMetrics,
    logger: StructuredLogger,
    model_reported: AtomicBool,
}

impl FloodEngine {
    pub fn new(
        config: EngineConfig,
        store: Arc<dyn ReadingStore>,
        provider: Arc<ModelProvider>,
        dispatcher: AlertDispatcher,
        health: HealthRegistry,
        metrics: EngineMetrics,
    ) -> Self {
        let logger = StructuredLogger::new(config.site_name.clone());
        Self {
            classifier: RiskClassifier::new(provider.clone()),
            config,
            store,
            provider,
            dispatcher,
            health,
            metrics,
            logger,
            model_reported: AtomicBool::new(false),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn logger(&self) -> &StructuredLogger {
        &self.logger
    }

    /// Acquire the model ahead of the first evaluation
    pub async fn warm_up(&self) -> ModelVariant {
        let model = self.provider.get_model().await;
        self.report_model(model).await;
        model.variant()
    }

    pub async fn evaluate(&self, request: &EvaluationRequest) -> EvaluationResponse {
        self.evaluate_at(request, Utc::now()).await
    }

    /// Evaluate as of `now`; never fails, errors become an error result
    pub async fn evaluate_at(
        &self,
        request: &EvaluationRequest,
        now: DateTime<Utc>,
    ) -> EvaluationResponse {
        let start = Instant::now();
        let response = match self.try_evaluate(request, now).await {
            Ok(result) => EvaluationResponse::Success(result),
            Err(e) => {
                let error = e.to_string();
                self.logger.log_evaluation_failed(&error);
                self.metrics.inc_evaluation_failures();
                EvaluationResponse::Failure { error }
            }
        };
        self.metrics
            .observe_evaluation_latency(start.elapsed().as_secs_f64());
        response
    }

    async fn try_evaluate(
        &self,
        request: &EvaluationRequest,
        now: DateTime<Utc>,
    ) -> Result<PredictionResult, EngineError> {
        let gauge_id = request.gauge_id.as_deref().unwrap_or(&self.config.gauge_id);
        let station_id = request
            .station_id
            .as_deref()
            .unwrap_or(&self.config.station_id);

        let gauge = self
            .recover_unavailable(
                SensorKind::Gauge,
                gauge_id,
                self.store.gauge_readings(gauge_id).await,
            )
            .await?;
        let weather = self
            .recover_unavailable(
                SensorKind::Weather,
                station_id,
                self.store.weather_observations(station_id).await,
            )
            .await?;
        debug!(
            gauge_records = gauge.len(),
            weather_records = weather.len(),
            "Fetched latest readings"
        );

        let model = self.classifier.model().await;
        self.report_model(model).await;

        let inference_start = Instant::now();
        let probability = self.classifier.predict(&gauge, &weather, now).await?;
        self.metrics
            .observe_inference_latency(inference_start.elapsed().as_secs_f64());

        let tier = classify(probability);
        let alert_sent = self.notify(tier, probability).await;

        self.metrics.record_evaluation(probability);
        self.logger.log_prediction(
            gauge_id,
            station_id,
            probability,
            tier.as_str(),
            model.variant().as_str(),
        );

        Ok(PredictionResult {
            flood_probability: probability,
            alert_level: tier,
            message: alert_message(tier, probability),
            timestamp: now.to_rfc3339_opts(SecondsFormat::Millis, true),
            alert_sent,
        })
    }

    /// Treat a timed-out or unreachable store as "no readings"
    async fn recover_unavailable<T>(
        &self,
        kind: SensorKind,
        sensor_id: &str,
        result: Result<Vec<T>, StoreError>,
    ) -> Result<Vec<T>, EngineError> {
        match result {
            Ok(records) => {
                self.health.set_healthy(components::STORE).await;
                Ok(records)
            }
            Err(e) if e.is_data_unavailable() => {
                let reason = e.to_string();
                self.logger
                    .log_data_unavailable(&kind.to_string(), sensor_id, &reason);
                self.metrics.inc_data_unavailable();
                self.health.set_degraded(components::STORE, reason).await;
                Ok(Vec::new())
            }
            Err(e) => {
                self.health
                    .set_unhealthy(components::STORE, e.to_string())
                    .await;
                Err(e.into())
            }
        }
    }

    async fn notify(&self, tier: AlertTier, probability: f64) -> bool {
        match self.dispatcher.dispatch(tier, probability).await {
            DispatchOutcome::Skipped => false,
            DispatchOutcome::Sent { topic } => {
                self.logger.log_alert_dispatched(tier.as_str(), &topic);
                self.metrics.inc_alerts_dispatched();
                self.health.set_healthy(components::NOTIFIER).await;
                true
            }
            DispatchOutcome::Failed { topic, error } => {
                let error = error.to_string();
                self.logger.log_alert_failed(tier.as_str(), &topic, &error);
                self.metrics.inc_alert_failures();
                self.health.set_degraded(components::NOTIFIER, error).await;
                false
            }
        }
    }

    /// Publish the selected model once per engine
    async fn report_model(&self, model: &LoadedModel) {
        if self.model_reported.swap(true, Ordering::SeqCst) {
            return;
        }

        let variant = model.variant();
        let version = model.predictor.model_version();
        self.logger.log_model_selected(
            variant.as_str(),
            version,
            model.fallback_reason.as_deref(),
        );
        self.metrics.set_model_variant(variant.as_str(), version);

        if model.is_heuristic() {
            let reason = model
                .fallback_reason
                .as_deref()
                .unwrap_or("heuristic predictor active");
            self.health.set_degraded(components::MODEL, reason).await;
        } else {
            self.health.set_healthy(components::MODEL).await;
        }
    }
}
