//! API client for communicating with the Flood Predictor service

use anyhow::{Context, Result};
use reqwest::{Client, RequestBuilder};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::collections::BTreeMap;
use url::Url;

/// API client for the Flood Predictor service
pub struct ApiClient {
    client: Client,
    base_url: Url,
}

impl ApiClient {
    /// Create a new API client
    pub fn new(base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;

        let base_url = Url::parse(base_url).context("Invalid API URL")?;

        Ok(Self { client, base_url })
    }

    /// Make a GET request
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = self.base_url.join(path).context("Invalid path")?;
        Self::send(self.client.get(url)).await
    }

    /// Make a POST request with JSON body
    pub async fn post<T: DeserializeOwned, B: Serialize>(&self, path: &str, body: &B) -> Result<T> {
        let url = self.base_url.join(path).context("Invalid path")?;
        Self::send(self.client.post(url).json(body)).await
    }

    /// The service answers error statuses with JSON too, so any status
    /// whose body parses as `T` is returned
    async fn send<T: DeserializeOwned>(request: RequestBuilder) -> Result<T> {
        let response = request.send().await.context("Failed to send request")?;

        let status = response.status();
        let body = response.text().await.context("Failed to read response")?;

        match serde_json::from_str(&body) {
            Ok(value) => Ok(value),
            Err(_) if !status.is_success() => anyhow::bail!("API error ({}): {}", status, body),
            Err(e) => Err(e).context("Failed to parse response"),
        }
    }

    pub async fn evaluate(&self, request: &EvaluateRequest) -> Result<EvaluationResult> {
        self.post("evaluate", request).await
    }

    pub async fn health(&self) -> Result<HealthReport> {
        self.get("healthz").await
    }

    pub async fn readiness(&self) -> Result<Readiness> {
        self.get("readyz").await
    }
}

// API request and response types

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EvaluateRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gauge_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub station_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prediction {
    pub flood_probability: f64,
    pub alert_level: String,
    pub message: String,
    pub timestamp: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EvaluationResult {
    Prediction(Prediction),
    Error { error: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentReport {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub last_check_timestamp: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthReport {
    pub status: String,
    pub components: BTreeMap<String, ComponentReport>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Readiness {
    pub ready: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}
