//! In-process readings store for local runs and tests

use super::{prepare_readings, retention_window, ReadingStore};
use crate::error::StoreError;
use crate::models::{GaugeReading, WeatherObservation};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Readings held in memory, keyed by sensor id
///
/// Records inserted without a `ttl` get one at the end of the retention
/// window, the same expiry the collectors stamp on writes.
#[derive(Default)]
pub struct InMemoryReadingStore {
    gauges: RwLock<HashMap<String, Vec<GaugeReading>>>,
    weather: RwLock<HashMap<String, Vec<WeatherObservation>>>,
}

impl InMemoryReadingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_gauge(&self, mut reading: GaugeReading) {
        if reading.ttl.is_none() {
            reading.ttl = Some((Utc::now() + retention_window()).timestamp());
        }
        self.gauges
            .write()
            .await
            .entry(reading.gauge_id.clone())
            .or_default()
            .push(reading);
    }

    pub async fn insert_weather(&self, mut observation: WeatherObservation) {
        if observation.ttl.is_none() {
            observation.ttl = Some((Utc::now() + retention_window()).timestamp());
        }
        self.weather
            .write()
            .await
            .entry(observation.station_id.clone())
            .or_default()
            .push(observation);
    }
}

#[async_trait]
impl ReadingStore for InMemoryReadingStore {
    async fn gauge_readings(&self, gauge_id: &str) -> Result<Vec<GaugeReading>, StoreError> {
        let records = self.gauges.read().await.get(gauge_id).cloned().unwrap_or_default();
        Ok(prepare_readings(records, Utc::now()))
    }

    async fn weather_observations(
        &self,
        station_id: &str,
    ) -> Result<Vec<WeatherObservation>, StoreError> {
        let records = self
            .weather
            .read()
            .await
            .get(station_id)
            .cloned()
            .unwrap_or_default();
        Ok(prepare_readings(records, Utc::now()))
    }
}
