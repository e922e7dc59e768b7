//! Integration tests for the service API endpoints

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use flood_predictor::api::{create_router, AppState};
use predictor_lib::{
    alert::{AlertDispatcher, LogTransport, TopicSet},
    engine::EngineConfig,
    health::{components, ComponentStatus, HealthRegistry},
    models::{GaugeReading, Trend, WeatherObservation},
    observability::EngineMetrics,
    predictor::ModelProvider,
    store::{InMemoryReadingStore, ReadingStore},
    FloodEngine, StoreError,
};
use std::sync::Arc;
use tower::ServiceExt;

/// Store that returns a body it cannot decode
struct CorruptStore;

#[async_trait]
impl ReadingStore for CorruptStore {
    async fn gauge_readings(&self, _gauge_id: &str) -> Result<Vec<GaugeReading>, StoreError> {
        Err(StoreError::Decode("expected value at line 1 column 1".to_string()))
    }

    async fn weather_observations(
        &self,
        _station_id: &str,
    ) -> Result<Vec<WeatherObservation>, StoreError> {
        Ok(Vec::new())
    }
}

async fn setup_app(store: Arc<dyn ReadingStore>) -> (Router, Arc<AppState>) {
    let health_registry = HealthRegistry::for_engine().await;
    let metrics = EngineMetrics::new();
    let dispatcher = AlertDispatcher::new(
        Arc::new(LogTransport),
        TopicSet::for_account("us-east-1", "123456789012"),
        "Potomac River",
    );
    let engine = Arc::new(FloodEngine::new(
        EngineConfig::default(),
        store,
        Arc::new(ModelProvider::heuristic_only()),
        dispatcher,
        health_registry.clone(),
        metrics.clone(),
    ));

    let state = Arc::new(AppState::new(engine, health_registry, metrics));
    let router = create_router(state.clone());

    (router, state)
}

async fn setup_test_app() -> (Router, Arc<AppState>) {
    setup_app(Arc::new(InMemoryReadingStore::new())).await
}

fn gauge(gauge_id: &str, level: f64) -> GaugeReading {
    GaugeReading {
        gauge_id: gauge_id.to_string(),
        timestamp: "2024-05-01T12:00:00Z".to_string(),
        water_level: Some(level),
        flood_stage: Some(10.0),
        location_name: None,
        trend: Trend::Rising,
        ttl: None,
    }
}

async fn json_body(response: axum::response::Response) -> serde_json::Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn test_evaluate_without_body_uses_configured_sensors() {
    let (app, _state) = setup_test_app().await;

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/evaluate")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let result = json_body(response).await;
    assert_eq!(result["alert_level"], "NORMAL");
    assert_eq!(result["flood_probability"], 0.1);
    assert_eq!(result["message"], "Normal conditions - 10.0% flood probability");
    assert!(result["timestamp"].is_string());
    assert!(result.get("error").is_none());
}

#[tokio::test]
async fn test_evaluate_with_overrides() {
    let store = Arc::new(InMemoryReadingStore::new());
    store.insert_gauge(gauge("01638500", 8.5)).await;
    let (app, _state) = setup_app(store).await;

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/evaluate")
                .header("content-type", "application/json")
                .body(Body::from(r#"{"gauge_id":"01638500"}"#))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let result = json_body(response).await;
    assert_eq!(result["alert_level"], "WATCH");
    assert_eq!(
        result["message"],
        "WATCH: ML model predicts 40.0% flood probability in next 6 hours"
    );
}

#[tokio::test]
async fn test_evaluate_rejects_malformed_overrides() {
    // Any evaluation against this store would fail and mark it unhealthy
    let (app, state) = setup_app(Arc::new(CorruptStore)).await;

    for body in [r#"{"gauge_id": 1638500}"#, r#"{"gauge_id": "01638500""#] {
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/evaluate")
                    .header("content-type", "application/json")
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "body {}", body);

        let result = json_body(response).await;
        let error = result["error"].as_str().unwrap();
        assert!(error.starts_with("invalid request body:"), "got {}", error);
        assert!(result.get("alert_level").is_none());
    }

    assert_eq!(
        state.health_registry.status_of(components::STORE).await,
        Some(ComponentStatus::Healthy)
    );
}

#[tokio::test]
async fn test_evaluate_blank_json_body_uses_configured_sensors() {
    let store = Arc::new(InMemoryReadingStore::new());
    store.insert_gauge(gauge("01646500", 9.5)).await;
    let (app, _state) = setup_app(store).await;

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/evaluate")
                .header("content-type", "application/json")
                .body(Body::from("  \n"))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let result = json_body(response).await;
    assert_eq!(result["alert_level"], "WARNING");
}

#[tokio::test]
async fn test_evaluate_failure_returns_500_with_error() {
    let (app, _state) = setup_app(Arc::new(CorruptStore)).await;

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/evaluate")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let body = json_body(response).await;
    let error = body["error"].as_str().unwrap();
    assert!(error.starts_with("store error:"), "got {}", error);
    assert!(body.get("alert_level").is_none());

    let response = app.oneshot(get("/healthz")).await.unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let health = json_body(response).await;
    assert_eq!(health["components"]["store"]["status"], "unhealthy");
}

#[tokio::test]
async fn test_healthz_returns_ok_when_healthy() {
    let (app, _state) = setup_test_app().await;

    let response = app.oneshot(get("/healthz")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let health = json_body(response).await;
    assert_eq!(health["status"], "healthy");
    assert!(health["components"]["store"].is_object());
    assert!(health["components"]["model"].is_object());
    assert!(health["components"]["notifier"].is_object());
}

#[tokio::test]
async fn test_healthz_reports_heuristic_model_as_degraded() {
    let (app, state) = setup_test_app().await;

    state.engine.warm_up().await;

    let response = app.oneshot(get("/healthz")).await.unwrap();

    // Degraded still returns 200 (operational)
    assert_eq!(response.status(), StatusCode::OK);

    let health = json_body(response).await;
    assert_eq!(health["status"], "degraded");
    assert_eq!(health["components"]["model"]["status"], "degraded");
}

#[tokio::test]
async fn test_healthz_returns_503_when_unhealthy() {
    let (app, state) = setup_test_app().await;

    state
        .health_registry
        .set_unhealthy(components::NOTIFIER, "webhook unreachable")
        .await;

    let response = app.oneshot(get("/healthz")).await.unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

    let health = json_body(response).await;
    assert_eq!(health["status"], "unhealthy");
}

#[tokio::test]
async fn test_readyz_returns_503_when_not_ready() {
    let (app, _state) = setup_test_app().await;

    let response = app.oneshot(get("/readyz")).await.unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

    let readiness = json_body(response).await;
    assert_eq!(readiness["ready"], false);
}

#[tokio::test]
async fn test_readyz_returns_ok_when_ready() {
    let (app, state) = setup_test_app().await;

    state.health_registry.set_ready(true).await;

    let response = app.oneshot(get("/readyz")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let readiness = json_body(response).await;
    assert_eq!(readiness["ready"], true);
}

#[tokio::test]
async fn test_metrics_endpoint_returns_prometheus_format() {
    let (app, state) = setup_test_app().await;

    state.engine.warm_up().await;
    state.metrics.observe_inference_latency(0.002);
    state.metrics.record_evaluation(0.4);

    let response = app.oneshot(get("/metrics")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let content_type = response.headers().get("content-type").unwrap();
    assert!(content_type.to_str().unwrap().contains("text/plain"));

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let metrics_text = String::from_utf8(body.to_vec()).unwrap();

    assert!(metrics_text.contains("flood_predictor_inference_latency_seconds_bucket"));
    assert!(metrics_text.contains("flood_predictor_evaluations_total"));
    assert!(metrics_text.contains("flood_predictor_last_flood_probability"));
    assert!(metrics_text.contains("flood_predictor_model_info"));
}
