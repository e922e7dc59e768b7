//! Flood risk prediction and alerting engine
//!
//! This crate provides the core functionality for:
//! - Reading the latest gauge and weather records
//! - ML-based flood probability with a heuristic fallback
//! - Alert tier classification and notification dispatch
//! - Health checks and observability

pub mod alert;
pub mod engine;
pub mod error;
pub mod health;
pub mod models;
pub mod observability;
pub mod predictor;
pub mod store;

pub use engine::{EngineConfig, FloodEngine};
pub use error::{EngineError, ModelError, StoreError, TransportError};
pub use health::{
    ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse, ReadinessResponse,
};
pub use models::*;
pub use observability::{EngineMetrics, StructuredLogger};
