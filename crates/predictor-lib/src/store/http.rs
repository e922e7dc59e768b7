//! HTTP client for the readings store

use super::{prepare_readings, ReadingStore, SensorKind};
use crate::error::StoreError;
use crate::models::{GaugeReading, Timestamped, WeatherObservation};
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Queries `GET {endpoint}/{collection}?{id_key}={sensor_id}`
pub struct HttpReadingStore {
    client: Client,
    base_url: Url,
}

impl HttpReadingStore {
    /// Create a store client with a bounded request timeout
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;

        let base_url = Url::parse(endpoint).context("Invalid reading store URL")?;
        if base_url.cannot_be_a_base() {
            anyhow::bail!("Reading store URL cannot be a base: {}", endpoint);
        }

        Ok(Self { client, base_url })
    }

    fn collection_url(&self, kind: SensorKind, sensor_id: &str) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push(kind.collection());
        }
        url.query_pairs_mut().append_pair(kind.id_key(), sensor_id);
        url
    }

    async fn query<T>(&self, kind: SensorKind, sensor_id: &str) -> Result<Vec<T>, StoreError>
    where
        T: DeserializeOwned + Timestamped,
    {
        let url = self.collection_url(kind, sensor_id);
        debug!(kind = %kind, sensor_id = %sensor_id, url = %url, "Querying reading store");

        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            return Err(StoreError::Unavailable(format!(
                "HTTP {} for {} {}",
                response.status(),
                kind,
                sensor_id
            )));
        }

        let body = response.bytes().await?;
        let records: Vec<T> =
            serde_json::from_slice(&body).map_err(|e| StoreError::Decode(e.to_string()))?;

        Ok(prepare_readings(records, chrono::Utc::now()))
    }
}

#[async_trait]
impl ReadingStore for HttpReadingStore {
    async fn gauge_readings(&self, gauge_id: &str) -> Result<Vec<GaugeReading>, StoreError> {
        self.query(SensorKind::Gauge, gauge_id).await
    }

    async fn weather_observations(
        &self,
        station_id: &str,
    ) -> Result<Vec<WeatherObservation>, StoreError> {
        self.query(SensorKind::Weather, station_id).await
    }
}
