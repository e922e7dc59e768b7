//! Predictor implementations
//!
//! [`OnnxPredictor`] runs a trained classifier through tract;
//! [`HeuristicPredictor`] maps the gauge's stage ratio to a fixed
//! probability when no model is available.

use super::{FeatureBuilder, ModelVariant, PredictionInput, Predictor};
use crate::error::ModelError;
use crate::models::{FeatureVector, NUM_FEATURES};
use anyhow::Context;
use std::time::Instant;
use tract_onnx::prelude::*;
use tracing::{debug, warn};

/// Maximum inference latency before warning
const MAX_INFERENCE_MS: u128 = 50;

/// Flood stage assumed when a gauge reading carries none (feet)
pub const DEFAULT_FLOOD_STAGE: f64 = 10.0;

/// Water level assumed when a gauge reading carries none (feet)
const DEFAULT_WATER_LEVEL: f64 = 5.0;

/// Probability reported when there are no gauge readings at all
const NO_DATA_PROBABILITY: f64 = 0.1;

type TractModel = SimplePlan<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

/// ONNX-backed predictor using tract for lightweight inference
pub struct OnnxPredictor {
    model: TractModel,
    model_version: String,
    features: FeatureBuilder,
}

impl std::fmt::Debug for OnnxPredictor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OnnxPredictor")
            .field("model_version", &self.model_version)
            .finish_non_exhaustive()
    }
}

impl OnnxPredictor {
    /// Parse and optimize a model taking a `[1, 12]` f32 input
    pub fn from_bytes(
        model_bytes: &[u8],
        model_version: impl Into<String>,
    ) -> Result<Self, ModelError> {
        let model =
            Self::load_model(model_bytes).map_err(|e| ModelError::Load(format!("{:#}", e)))?;
        Ok(Self {
            model,
            model_version: model_version.into(),
            features: FeatureBuilder::new(),
        })
    }

    fn load_model(model_bytes: &[u8]) -> anyhow::Result<TractModel> {
        let model = tract_onnx::onnx()
            .model_for_read(&mut std::io::Cursor::new(model_bytes))
            .context("Failed to parse ONNX model")?
            .with_input_fact(0, f32::fact([1, NUM_FEATURES]).into())
            .context("Failed to set input shape")?
            .into_optimized()
            .context("Failed to optimize model")?
            .into_runnable()
            .context("Failed to create runnable model")?;
        Ok(model)
    }

    fn features_to_tensor(&self, features: &FeatureVector) -> Result<Tensor, ModelError> {
        let data = features.to_array().to_vec();
        let array = tract_ndarray::Array2::from_shape_vec((1, NUM_FEATURES), data)
            .map_err(|e| ModelError::Inference(e.to_string()))?;
        Ok(array.into())
    }

    fn tensor_to_probability(&self, output: &Tensor) -> Result<f64, ModelError> {
        let view = output
            .to_array_view::<f32>()
            .map_err(|e| ModelError::InvalidOutput(e.to_string()))?;
        let value = view
            .iter()
            .next()
            .copied()
            .ok_or_else(|| ModelError::InvalidOutput("empty output tensor".to_string()))?;

        if value.is_nan() {
            return Err(ModelError::InvalidOutput("NaN probability".to_string()));
        }
        Ok((value as f64).clamp(0.0, 1.0))
    }
}

impl Predictor for OnnxPredictor {
    fn predict(&self, input: &PredictionInput<'_>) -> Result<f64, ModelError> {
        let start = Instant::now();

        let features = self.features.build_from(input);
        let tensor = self.features_to_tensor(&features)?;

        let result = self
            .model
            .run(tvec!(tensor.into()))
            .map_err(|e| ModelError::Inference(format!("{:#}", e)))?;
        let output = result
            .first()
            .ok_or_else(|| ModelError::InvalidOutput("no output from model".to_string()))?;
        let probability = self.tensor_to_probability(output)?;

        let elapsed = start.elapsed();
        if elapsed.as_millis() > MAX_INFERENCE_MS {
            warn!(
                elapsed_ms = elapsed.as_millis(),
                "Inference exceeded {}ms target",
                MAX_INFERENCE_MS
            );
        } else {
            debug!(elapsed_us = elapsed.as_micros(), probability, "Inference completed");
        }

        Ok(probability)
    }

    fn variant(&self) -> ModelVariant {
        ModelVariant::Onnx
    }

    fn model_version(&self) -> &str {
        &self.model_version
    }
}

/// Stage-ratio predictor used when no trained model is available
///
/// Breakpoints are fixed: ratio > 0.9 gives 0.8, ratio > 0.7 gives 0.4,
/// anything lower gives 0.1.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicPredictor;

impl HeuristicPredictor {
    pub fn new() -> Self {
        Self
    }

    pub fn probability_for_ratio(ratio: f64) -> f64 {
        if ratio > 0.9 {
            0.8
        } else if ratio > 0.7 {
            0.4
        } else {
            0.1
        }
    }

    /// Water level over flood stage for a reading, with defaults
    pub fn stage_ratio(water_level: Option<f64>, flood_stage: Option<f64>) -> f64 {
        let level = water_level
            .filter(|v| v.is_finite())
            .unwrap_or(DEFAULT_WATER_LEVEL);
        let stage = flood_stage
            .filter(|v| v.is_finite() && *v > 0.0)
            .unwrap_or(DEFAULT_FLOOD_STAGE);
        level / stage
    }
}

impl Predictor for HeuristicPredictor {
    fn predict(&self, input: &PredictionInput<'_>) -> Result<f64, ModelError> {
        let Some(latest) = input.gauge.last() else {
            debug!("No gauge readings, heuristic reports baseline probability");
            return Ok(NO_DATA_PROBABILITY);
        };

        let ratio = Self::stage_ratio(latest.water_level, latest.flood_stage);
        let probability = Self::probability_for_ratio(ratio);
        debug!(ratio, probability, gauge_id = %latest.gauge_id, "Heuristic prediction");
        Ok(probability)
    }

    fn variant(&self) -> ModelVariant {
        ModelVariant::Heuristic
    }

    fn model_version(&self) -> &str {
        "heuristic"
    }
}
