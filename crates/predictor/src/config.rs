//! Service configuration

use anyhow::{Context, Result};
use predictor_lib::alert::{LogTransport, NotificationTransport, TopicSet, WebhookTransport};
use predictor_lib::engine::EngineConfig;
use predictor_lib::predictor::{
    FileArtifactStore, HttpArtifactStore, ModelProvider, ModelProviderConfig,
};
use predictor_lib::store::{HttpReadingStore, InMemoryReadingStore, ReadingStore};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// Service configuration, read from `FLOOD_*` environment variables
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    /// Human-readable name of the monitored site, used in alert subjects
    #[serde(default = "default_site_name")]
    pub site_name: String,

    #[serde(default = "default_gauge_id")]
    pub gauge_id: String,

    #[serde(default = "default_station_id")]
    pub station_id: String,

    /// API server port for evaluate/health/metrics
    #[serde(default = "default_api_port")]
    pub api_port: u16,

    /// Reading store base URL; readings are kept in memory when unset
    #[serde(default)]
    pub store_endpoint: Option<String>,

    /// Artifact store base URL
    #[serde(default)]
    pub artifact_endpoint: Option<String>,

    /// Local directory holding model artifacts, used when no endpoint is set
    #[serde(default)]
    pub artifact_dir: Option<String>,

    /// Account that scopes the artifact bucket and alert topics
    #[serde(default = "default_account_id")]
    pub account_id: String,

    #[serde(default = "default_region")]
    pub region: String,

    #[serde(default = "default_model_key")]
    pub model_key: String,

    #[serde(default = "default_features_key")]
    pub features_key: String,

    /// Expected SHA256 of the model artifact, hex encoded
    #[serde(default)]
    pub model_checksum: Option<String>,

    /// Maximum model size in bytes
    #[serde(default = "default_max_model_size")]
    pub max_model_size: usize,

    #[serde(default = "default_model_version")]
    pub model_version: String,

    /// Notification webhook; alerts are only logged when unset
    #[serde(default)]
    pub notify_endpoint: Option<String>,

    /// Timeout for every outbound call, in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_site_name() -> String {
    "Potomac River".to_string()
}

fn default_gauge_id() -> String {
    "01646500".to_string()
}

fn default_station_id() -> String {
    "KDCA".to_string()
}

fn default_api_port() -> u16 {
    8080
}

fn default_account_id() -> String {
    "000000000000".to_string()
}

fn default_region() -> String {
    "us-east-1".to_string()
}

fn default_model_key() -> String {
    ModelProviderConfig::default().model_key
}

fn default_features_key() -> String {
    ModelProviderConfig::default().features_key
}

fn default_max_model_size() -> usize {
    ModelProviderConfig::default().max_model_size
}

fn default_model_version() -> String {
    ModelProviderConfig::default().model_version
}

fn default_request_timeout() -> u64 {
    10
}

impl ServiceConfig {
    /// Load configuration from the process environment
    pub fn load() -> Result<Self> {
        Self::from_env(None)
    }

    /// Load configuration from the given variables instead of the process environment
    pub fn from_env(vars: Option<HashMap<String, String>>) -> Result<Self> {
        let config = config::Config::builder()
            .add_source(config::Environment::with_prefix("FLOOD").source(vars))
            .build()
            .context("Failed to read FLOOD_* configuration")?;

        config
            .try_deserialize()
            .context("Invalid FLOOD_* configuration")
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            site_name: self.site_name.clone(),
            gauge_id: self.gauge_id.clone(),
            station_id: self.station_id.clone(),
        }
    }

    pub fn topics(&self) -> TopicSet {
        TopicSet::for_account(&self.region, &self.account_id)
    }

    pub fn provider_config(&self) -> ModelProviderConfig {
        ModelProviderConfig {
            model_key: self.model_key.clone(),
            features_key: self.features_key.clone(),
            expected_checksum: self.model_checksum.clone(),
            max_model_size: self.max_model_size,
            model_version: self.model_version.clone(),
        }
    }

    pub fn build_store(&self) -> Result<Arc<dyn ReadingStore>> {
        match &self.store_endpoint {
            Some(endpoint) => Ok(Arc::new(HttpReadingStore::new(
                endpoint,
                self.request_timeout(),
            )?)),
            None => {
                warn!("FLOOD_STORE_ENDPOINT not set, using empty in-memory reading store");
                Ok(Arc::new(InMemoryReadingStore::new()))
            }
        }
    }

    /// Model provider over the configured artifact source
    pub fn build_provider(&self) -> Result<ModelProvider> {
        if let Some(endpoint) = &self.artifact_endpoint {
            let store = HttpArtifactStore::new(endpoint, &self.account_id, self.request_timeout())?;
            return Ok(ModelProvider::new(Arc::new(store), self.provider_config()));
        }
        if let Some(dir) = &self.artifact_dir {
            let store = FileArtifactStore::new(dir);
            return Ok(ModelProvider::new(Arc::new(store), self.provider_config()));
        }
        Ok(ModelProvider::heuristic_only())
    }

    pub fn build_transport(&self) -> Result<Arc<dyn NotificationTransport>> {
        match &self.notify_endpoint {
            Some(endpoint) => Ok(Arc::new(WebhookTransport::new(
                endpoint,
                self.request_timeout(),
            )?)),
            None => Ok(Arc::new(LogTransport)),
        }
    }
}
