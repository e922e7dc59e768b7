//! Flood probability prediction
//!
//! A [`ModelProvider`] selects one [`Predictor`] per process: the ONNX
//! model from the artifact store when it loads, the stage-ratio heuristic
//! otherwise. The [`RiskClassifier`] calls whichever is active.

mod classifier;
mod features;
mod inference;
mod provider;

pub use classifier::{
    classify, RiskClassifier, EMERGENCY_THRESHOLD, WARNING_THRESHOLD, WATCH_THRESHOLD,
};
pub use features::{FeatureBuilder, DEFAULT_FEATURES};
pub use inference::{HeuristicPredictor, OnnxPredictor, DEFAULT_FLOOD_STAGE};
pub use provider::{
    ArtifactStore, FileArtifactStore, HttpArtifactStore, LoadedModel, ModelProvider,
    ModelProviderConfig,
};

use crate::error::ModelError;
use crate::models::{GaugeReading, WeatherObservation};
use chrono::{DateTime, Utc};

/// Which predictor implementation is active
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelVariant {
    Heuristic,
    Onnx,
}

impl ModelVariant {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelVariant::Heuristic => "heuristic",
            ModelVariant::Onnx => "onnx",
        }
    }
}

impl std::fmt::Display for ModelVariant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Readings for one evaluation, both sorted oldest first
#[derive(Debug, Clone, Copy)]
pub struct PredictionInput<'a> {
    pub gauge: &'a [GaugeReading],
    pub weather: &'a [WeatherObservation],
    pub evaluated_at: DateTime<Utc>,
}

/// Trait for flood probability predictors
pub trait Predictor: Send + Sync {
    /// Probability of flooding in [0, 1]
    fn predict(&self, input: &PredictionInput<'_>) -> Result<f64, ModelError>;

    fn variant(&self) -> ModelVariant;

    fn model_version(&self) -> &str;
}
