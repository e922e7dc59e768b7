//! Read-only access to persisted gauge and weather readings
//!
//! The collectors write readings with an expiry; this module only
//! queries them. An empty result is a normal state (first run, all
//! data expired) and is never reported as an error.

mod http;
mod memory;

pub use http::HttpReadingStore;
pub use memory::InMemoryReadingStore;

use crate::error::StoreError;
use crate::models::{GaugeReading, Timestamped, WeatherObservation};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};

/// How long the collectors keep a reading queryable
pub const RETENTION_DAYS: i64 = 14;

/// Retention window as a duration
pub fn retention_window() -> Duration {
    Duration::days(RETENTION_DAYS)
}

/// The two observation collections
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorKind {
    Gauge,
    Weather,
}

impl SensorKind {
    /// Collection (table) name in the store
    pub fn collection(&self) -> &'static str {
        match self {
            SensorKind::Gauge => "FloodGaugeReadings",
            SensorKind::Weather => "WeatherObservations",
        }
    }

    /// Attribute the sensor id is stored under
    pub fn id_key(&self) -> &'static str {
        match self {
            SensorKind::Gauge => "gauge_id",
            SensorKind::Weather => "station_id",
        }
    }
}

impl std::fmt::Display for SensorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SensorKind::Gauge => write!(f, "gauge"),
            SensorKind::Weather => write!(f, "weather"),
        }
    }
}

/// Query surface over the readings store
///
/// Implementations return non-expired readings for one sensor, sorted by
/// timestamp ascending.
#[async_trait]
pub trait ReadingStore: Send + Sync {
    async fn gauge_readings(&self, gauge_id: &str) -> Result<Vec<GaugeReading>, StoreError>;

    async fn weather_observations(
        &self,
        station_id: &str,
    ) -> Result<Vec<WeatherObservation>, StoreError>;
}

/// Drop expired records and order the rest chronologically
///
/// Timestamps that parse as RFC 3339 are compared as instants; anything
/// else sorts first, lexicographically.
pub fn prepare_readings<T: Timestamped>(mut records: Vec<T>, now: DateTime<Utc>) -> Vec<T> {
    records.retain(|r| !r.is_expired_at(now));
    records.sort_by_cached_key(|r| {
        let parsed = DateTime::parse_from_rfc3339(r.timestamp())
            .ok()
            .map(|dt| dt.with_timezone(&Utc));
        (parsed, r.timestamp().to_string())
    });
    records
}
