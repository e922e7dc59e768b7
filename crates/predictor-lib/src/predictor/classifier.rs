//! Flood probability and alert tier classification

use super::{LoadedModel, ModelProvider, PredictionInput};
use crate::error::ModelError;
use crate::models::{AlertTier, GaugeReading, WeatherObservation};
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Probability above which the tier is EMERGENCY
pub const EMERGENCY_THRESHOLD: f64 = 0.8;
/// Probability above which the tier is WARNING
pub const WARNING_THRESHOLD: f64 = 0.5;
/// Probability above which the tier is WATCH
pub const WATCH_THRESHOLD: f64 = 0.2;

/// Map a probability to its alert tier; a boundary value takes the lower tier
pub fn classify(probability: f64) -> AlertTier {
    if probability > EMERGENCY_THRESHOLD {
        AlertTier::Emergency
    } else if probability > WARNING_THRESHOLD {
        AlertTier::Warning
    } else if probability > WATCH_THRESHOLD {
        AlertTier::Watch
    } else {
        AlertTier::Normal
    }
}

/// Computes flood probability with whichever predictor the provider selected
pub struct RiskClassifier {
    provider: Arc<ModelProvider>,
}

impl RiskClassifier {
    pub fn new(provider: Arc<ModelProvider>) -> Self {
        Self { provider }
    }

    /// The active model, acquiring it if this is the first use
    pub async fn model(&self) -> &LoadedModel {
        self.provider.get_model().await
    }

    pub async fn predict(
        &self,
        gauge: &[GaugeReading],
        weather: &[WeatherObservation],
        evaluated_at: DateTime<Utc>,
    ) -> Result<f64, ModelError> {
        let model = self.provider.get_model().await;
        let input = PredictionInput {
            gauge,
            weather,
            evaluated_at,
        };
        model.predictor.predict(&input)
    }
}
