//! HTTP API for evaluations, health checks and Prometheus metrics

use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use predictor_lib::{
    health::{ComponentStatus, HealthRegistry},
    models::{EvaluationRequest, EvaluationResponse},
    observability::EngineMetrics,
    FloodEngine,
};
use prometheus::{Encoder, TextEncoder};
use std::future::Future;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<FloodEngine>,
    pub health_registry: HealthRegistry,
    pub metrics: EngineMetrics,
}

impl AppState {
    pub fn new(
        engine: Arc<FloodEngine>,
        health_registry: HealthRegistry,
        metrics: EngineMetrics,
    ) -> Self {
        Self {
            engine,
            health_registry,
            metrics,
        }
    }
}

/// Run one evaluation; a non-empty body overrides the configured sensors
async fn evaluate(State(state): State<Arc<AppState>>, body: Bytes) -> impl IntoResponse {
    let request = match parse_request(&body) {
        Ok(request) => request,
        Err(e) => {
            warn!(error = %e, "Rejected evaluation request");
            let response = EvaluationResponse::Failure {
                error: format!("invalid request body: {}", e),
            };
            return (StatusCode::BAD_REQUEST, Json(response));
        }
    };
    let response = state.engine.evaluate(&request).await;

    let status_code = match &response {
        EvaluationResponse::Success(_) => StatusCode::OK,
        EvaluationResponse::Failure { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    };

    (status_code, Json(response))
}

/// Blank body means no overrides; anything else must be a valid request
fn parse_request(body: &[u8]) -> Result<EvaluationRequest, serde_json::Error> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(EvaluationRequest::default());
    }
    serde_json::from_slice(body)
}

/// Health check response - returns 200 if healthy, 503 if unhealthy
async fn healthz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let health = state.health_registry.health().await;

    let status_code = match health.status {
        ComponentStatus::Healthy => StatusCode::OK,
        ComponentStatus::Degraded => StatusCode::OK, // Still evaluating
        ComponentStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (status_code, Json(health))
}

/// Readiness check response - returns 200 if ready, 503 if not ready
async fn readyz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let readiness = state.health_registry.readiness().await;

    let status_code = if readiness.ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(readiness))
}

/// Prometheus metrics endpoint
async fn metrics() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        error!(error = %e, "Failed to encode metrics");
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            [("content-type", "text/plain; charset=utf-8")],
            Vec::new(),
        );
    }

    (
        StatusCode::OK,
        [("content-type", "text/plain; charset=utf-8")],
        buffer,
    )
}

/// Create the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/evaluate", post(evaluate))
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics))
        .with_state(state)
}

/// Start the API server and run until `shutdown` resolves
pub async fn serve<F>(port: u16, state: Arc<AppState>, shutdown: F) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = create_router(state);

    let addr = format!("0.0.0.0:{}", port);
    info!(addr = %addr, "Starting API server");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    Ok(())
}
