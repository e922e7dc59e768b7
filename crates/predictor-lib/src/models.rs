//! Core data models for the flood predictor

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Number of inputs in a feature vector
pub const NUM_FEATURES: usize = 12;

/// Water level trend reported by the gauge collector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Rising,
    Falling,
    #[default]
    Stable,
}

/// Stream gauge reading as persisted by the gauge collector
///
/// Numeric fields are optional because the store does not enforce a
/// schema; consumers substitute defaults for anything missing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GaugeReading {
    pub gauge_id: String,
    /// ISO-8601 timestamp
    pub timestamp: String,
    /// Water level in feet
    #[serde(default)]
    pub water_level: Option<f64>,
    /// Flood stage in feet for this gauge
    #[serde(default)]
    pub flood_stage: Option<f64>,
    #[serde(default)]
    pub location_name: Option<String>,
    #[serde(default)]
    pub trend: Trend,
    /// Expiry as epoch seconds
    #[serde(default)]
    pub ttl: Option<i64>,
}

/// Weather observation as persisted by the weather collector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherObservation {
    pub station_id: String,
    pub timestamp: String,
    /// Precipitation over the last hour, inches
    #[serde(default)]
    pub precipitation_1hr: Option<f64>,
    /// Forecast precipitation over the next 24 hours, inches
    #[serde(default)]
    pub precipitation_forecast_24hr: Option<f64>,
    #[serde(default)]
    pub temperature: Option<f64>,
    #[serde(default)]
    pub location_name: Option<String>,
    #[serde(default)]
    pub ttl: Option<i64>,
}

/// Common view over persisted records, used for expiry and ordering
pub trait Timestamped {
    fn timestamp(&self) -> &str;
    fn ttl(&self) -> Option<i64>;

    /// Whether the record's retention has run out at `now`
    fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.ttl().map(|ttl| ttl <= now.timestamp()).unwrap_or(false)
    }
}

impl Timestamped for GaugeReading {
    fn timestamp(&self) -> &str {
        &self.timestamp
    }

    fn ttl(&self) -> Option<i64> {
        self.ttl
    }
}

impl Timestamped for WeatherObservation {
    fn timestamp(&self) -> &str {
        &self.timestamp
    }

    fn ttl(&self) -> Option<i64> {
        self.ttl
    }
}

/// Feature vector for ML inference, in model input order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    pub water_level: f32,
    pub water_level_lag_1h: f32,
    pub water_level_lag_6h: f32,
    pub water_level_change_1h: f32,
    pub water_level_change_6h: f32,
    pub precip_1h: f32,
    pub precip_cumulative_6h: f32,
    pub precip_cumulative_24h: f32,
    pub precip_forecast_24h: f32,
    pub hour_of_day: f32,
    pub day_of_year: f32,
    pub month: f32,
}

impl FeatureVector {
    /// Values in the order the model was trained on
    pub fn to_array(&self) -> [f32; NUM_FEATURES] {
        [
            self.water_level,
            self.water_level_lag_1h,
            self.water_level_lag_6h,
            self.water_level_change_1h,
            self.water_level_change_6h,
            self.precip_1h,
            self.precip_cumulative_6h,
            self.precip_cumulative_24h,
            self.precip_forecast_24h,
            self.hour_of_day,
            self.day_of_year,
            self.month,
        ]
    }
}

/// Alert tiers, ordered by severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AlertTier {
    Normal,
    Watch,
    Warning,
    Emergency,
}

impl AlertTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertTier::Normal => "NORMAL",
            AlertTier::Watch => "WATCH",
            AlertTier::Warning => "WARNING",
            AlertTier::Emergency => "EMERGENCY",
        }
    }
}

impl std::fmt::Display for AlertTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one successful evaluation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    pub flood_probability: f64,
    pub alert_level: AlertTier,
    pub message: String,
    /// Evaluation time, ISO-8601
    pub timestamp: String,
    /// Whether a notification was published for this evaluation
    #[serde(skip)]
    pub alert_sent: bool,
}

/// Response body of the evaluate operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EvaluationResponse {
    Success(PredictionResult),
    Failure { error: String },
}

impl EvaluationResponse {
    pub fn is_success(&self) -> bool {
        matches!(self, EvaluationResponse::Success(_))
    }

    pub fn result(&self) -> Option<&PredictionResult> {
        match self {
            EvaluationResponse::Success(result) => Some(result),
            EvaluationResponse::Failure { .. } => None,
        }
    }
}

/// Optional overrides for a single evaluation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvaluationRequest {
    #[serde(default)]
    pub gauge_id: Option<String>,
    #[serde(default)]
    pub station_id: Option<String>,
}
