//! Flood Predictor - flood risk evaluation and alerting service
//!
//! Serves on-demand evaluations for one monitored river site and
//! publishes tiered alerts when the predicted flood probability rises.

use anyhow::Result;
use flood_predictor::{api, config::ServiceConfig};
use predictor_lib::{
    alert::AlertDispatcher, health::HealthRegistry, observability::EngineMetrics, FloodEngine,
};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const SERVICE_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and env filter
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    info!("Starting flood-predictor");

    // Load configuration
    let config = ServiceConfig::load()?;
    info!(site = %config.site_name, "Service configured");

    let health_registry = HealthRegistry::for_engine().await;
    let metrics = EngineMetrics::new();

    let dispatcher = AlertDispatcher::new(
        config.build_transport()?,
        config.topics(),
        config.site_name.clone(),
    );
    let engine = Arc::new(FloodEngine::new(
        config.engine_config(),
        config.build_store()?,
        Arc::new(config.build_provider()?),
        dispatcher,
        health_registry.clone(),
        metrics.clone(),
    ));

    let logger = engine.logger().clone();
    logger.log_startup(SERVICE_VERSION, &config.gauge_id, &config.station_id);

    // Acquire the model before accepting requests
    let variant = engine.warm_up().await;
    info!(variant = %variant, "Model warm-up complete");
    health_registry.set_ready(true).await;

    let app_state = Arc::new(api::AppState::new(
        engine,
        health_registry.clone(),
        metrics,
    ));

    api::serve(config.api_port, app_state, async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for shutdown signal");
        }
        logger.log_shutdown("SIGINT received");
    })
    .await?;

    info!("Shutting down");
    Ok(())
}
