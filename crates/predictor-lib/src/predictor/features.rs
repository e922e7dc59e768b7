//! Feature construction for ML inference
//!
//! Builds the 12-value model input from the latest gauge reading and the
//! latest weather observation. Lag, change and cumulative precipitation
//! slots are fixed offsets from the current reading rather than lookups
//! over the stored history.

use super::PredictionInput;
use crate::models::{FeatureVector, GaugeReading, WeatherObservation, NUM_FEATURES};
use chrono::{DateTime, Datelike, Timelike, Utc};

/// Placeholder input used when either collection has no readings
pub const DEFAULT_FEATURES: [f32; NUM_FEATURES] =
    [5.0, 4.8, 4.5, 0.2, 0.5, 0.1, 0.3, 0.8, 0.5, 12.0, 180.0, 6.0];

const DEFAULT_WATER_LEVEL: f64 = 5.0;
const DEFAULT_PRECIP_1H: f64 = 0.1;
const DEFAULT_PRECIP_FORECAST_24H: f64 = 0.5;

const LAG_1H_OFFSET: f64 = 0.2;
const LAG_6H_OFFSET: f64 = 0.5;
const CHANGE_1H: f32 = 0.2;
const CHANGE_6H: f32 = 0.5;
const PRECIP_CUMULATIVE_6H: f32 = 0.3;
const PRECIP_CUMULATIVE_24H: f32 = 0.8;

/// Builds feature vectors; never fails
#[derive(Debug, Clone, Copy, Default)]
pub struct FeatureBuilder;

impl FeatureBuilder {
    pub fn new() -> Self {
        Self
    }

    pub fn build_from(&self, input: &PredictionInput<'_>) -> FeatureVector {
        self.build(input.gauge, input.weather, input.evaluated_at)
    }

    /// Feature vector for readings sorted oldest first
    ///
    /// Calendar slots always come from `evaluated_at`.
    pub fn build(
        &self,
        gauge: &[GaugeReading],
        weather: &[WeatherObservation],
        evaluated_at: DateTime<Utc>,
    ) -> FeatureVector {
        let (Some(latest_gauge), Some(latest_weather)) = (gauge.last(), weather.last()) else {
            return self.fallback(evaluated_at);
        };

        let level = finite_or(latest_gauge.water_level, DEFAULT_WATER_LEVEL);
        let (hour_of_day, day_of_year, month) = calendar(evaluated_at);

        FeatureVector {
            water_level: level as f32,
            water_level_lag_1h: (level - LAG_1H_OFFSET) as f32,
            water_level_lag_6h: (level - LAG_6H_OFFSET) as f32,
            water_level_change_1h: CHANGE_1H,
            water_level_change_6h: CHANGE_6H,
            precip_1h: finite_or(latest_weather.precipitation_1hr, DEFAULT_PRECIP_1H) as f32,
            precip_cumulative_6h: PRECIP_CUMULATIVE_6H,
            precip_cumulative_24h: PRECIP_CUMULATIVE_24H,
            precip_forecast_24h: finite_or(
                latest_weather.precipitation_forecast_24hr,
                DEFAULT_PRECIP_FORECAST_24H,
            ) as f32,
            hour_of_day,
            day_of_year,
            month,
        }
    }

    /// The insufficient-data vector, with calendar slots at `evaluated_at`
    pub fn fallback(&self, evaluated_at: DateTime<Utc>) -> FeatureVector {
        let d = DEFAULT_FEATURES;
        let (hour_of_day, day_of_year, month) = calendar(evaluated_at);

        FeatureVector {
            water_level: d[0],
            water_level_lag_1h: d[1],
            water_level_lag_6h: d[2],
            water_level_change_1h: d[3],
            water_level_change_6h: d[4],
            precip_1h: d[5],
            precip_cumulative_6h: d[6],
            precip_cumulative_24h: d[7],
            precip_forecast_24h: d[8],
            hour_of_day,
            day_of_year,
            month,
        }
    }
}

fn finite_or(value: Option<f64>, default: f64) -> f64 {
    value.filter(|v| v.is_finite()).unwrap_or(default)
}

fn calendar(at: DateTime<Utc>) -> (f32, f32, f32) {
    (at.hour() as f32, at.ordinal() as f32, at.month() as f32)
}
