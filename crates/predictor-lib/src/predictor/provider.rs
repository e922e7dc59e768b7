//! Model acquisition and process-lifetime caching
//!
//! The first call to [`ModelProvider::get_model`] fetches the model
//! artifact and its feature manifest, validates them, and builds the
//! predictor. Any failure selects the heuristic instead. Whichever
//! outcome wins is kept for the life of the provider; concurrent first
//! callers wait on the same acquisition.

use super::{HeuristicPredictor, ModelVariant, OnnxPredictor, Predictor};
use crate::error::ModelError;
use crate::models::NUM_FEATURES;
use anyhow::Context;
use async_trait::async_trait;
use reqwest::Client;
use sha2::{Digest, Sha256};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::debug;
use url::Url;

/// Source of model artifacts, addressed by key
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    async fn fetch(&self, key: &str) -> Result<Vec<u8>, ModelError>;
}

/// Configuration for model acquisition
#[derive(Debug, Clone)]
pub struct ModelProviderConfig {
    /// Key of the ONNX model artifact
    pub model_key: String,
    /// Key of the JSON feature-name manifest
    pub features_key: String,
    /// Expected SHA256 of the model artifact, hex encoded
    pub expected_checksum: Option<String>,
    /// Maximum model size in bytes
    pub max_model_size: usize,
    /// Version label reported for the loaded model
    pub model_version: String,
}

impl Default for ModelProviderConfig {
    fn default() -> Self {
        Self {
            model_key: "models/flood_prediction_model.onnx".to_string(),
            features_key: "models/model_features.json".to_string(),
            expected_checksum: None,
            max_model_size: 16 * 1024 * 1024, // 16MB
            model_version: "v1".to_string(),
        }
    }
}

/// The predictor selected for this process, with its feature manifest
pub struct LoadedModel {
    pub predictor: Arc<dyn Predictor>,
    /// Empty when the heuristic is active
    pub feature_names: Vec<String>,
    /// Why acquisition fell back to the heuristic, if it did
    pub fallback_reason: Option<String>,
}

impl LoadedModel {
    fn heuristic(reason: Option<String>) -> Self {
        Self {
            predictor: Arc::new(HeuristicPredictor::new()),
            feature_names: Vec::new(),
            fallback_reason: reason,
        }
    }

    pub fn variant(&self) -> ModelVariant {
        self.predictor.variant()
    }

    pub fn is_heuristic(&self) -> bool {
        self.variant() == ModelVariant::Heuristic
    }
}

/// Lazily acquires the model once and hands out the cached result
pub struct ModelProvider {
    store: Option<Arc<dyn ArtifactStore>>,
    config: ModelProviderConfig,
    model: OnceCell<LoadedModel>,
}

impl ModelProvider {
    pub fn new(store: Arc<dyn ArtifactStore>, config: ModelProviderConfig) -> Self {
        Self {
            store: Some(store),
            config,
            model: OnceCell::new(),
        }
    }

    /// Provider with no artifact store; always the heuristic
    pub fn heuristic_only() -> Self {
        Self {
            store: None,
            config: ModelProviderConfig::default(),
            model: OnceCell::new_with(Some(LoadedModel::heuristic(Some(
                "no artifact store configured".to_string(),
            )))),
        }
    }

    /// The process-wide model, acquiring it on first use
    pub async fn get_model(&self) -> &LoadedModel {
        self.model.get_or_init(|| self.acquire()).await
    }

    /// Whether acquisition has already completed
    pub fn is_initialized(&self) -> bool {
        self.model.initialized()
    }

    async fn acquire(&self) -> LoadedModel {
        let Some(store) = self.store.as_ref() else {
            return LoadedModel::heuristic(Some("no artifact store configured".to_string()));
        };

        match self.try_acquire(store.as_ref()).await {
            Ok(model) => {
                debug!(
                    version = %model.predictor.model_version(),
                    features = model.feature_names.len(),
                    "Model artifact validated"
                );
                model
            }
            Err(e) => {
                debug!(error = %e, "Model acquisition failed");
                LoadedModel::heuristic(Some(e.to_string()))
            }
        }
    }

    async fn try_acquire(&self, store: &dyn ArtifactStore) -> Result<LoadedModel, ModelError> {
        debug!(key = %self.config.model_key, "Fetching model artifact");
        let weights = store.fetch(&self.config.model_key).await?;
        self.validate_weights(&weights)?;

        let manifest = store.fetch(&self.config.features_key).await?;
        let feature_names = parse_manifest(&manifest)?;

        // tract can panic on malformed graphs; contain it on a blocking task
        let version = self.config.model_version.clone();
        let predictor =
            tokio::task::spawn_blocking(move || OnnxPredictor::from_bytes(&weights, version))
                .await
                .map_err(|e| ModelError::Load(format!("model build aborted: {}", e)))??;

        Ok(LoadedModel {
            predictor: Arc::new(predictor),
            feature_names,
            fallback_reason: None,
        })
    }

    fn validate_weights(&self, weights: &[u8]) -> Result<(), ModelError> {
        if weights.len() > self.config.max_model_size {
            return Err(ModelError::TooLarge {
                size: weights.len(),
                max: self.config.max_model_size,
            });
        }

        if let Some(expected) = &self.config.expected_checksum {
            let actual = compute_checksum(weights);
            if !actual.eq_ignore_ascii_case(expected) {
                return Err(ModelError::ChecksumMismatch {
                    expected: expected.clone(),
                    actual,
                });
            }
            debug!(checksum = %actual, "Model checksum validated");
        }

        Ok(())
    }
}

/// Feature names from a JSON array; a non-empty list must match the model input
fn parse_manifest(bytes: &[u8]) -> Result<Vec<String>, ModelError> {
    let names: Vec<String> =
        serde_json::from_slice(bytes).map_err(|e| ModelError::InvalidManifest(e.to_string()))?;
    if !names.is_empty() && names.len() != NUM_FEATURES {
        return Err(ModelError::InvalidManifest(format!(
            "expected {} feature names, got {}",
            NUM_FEATURES,
            names.len()
        )));
    }
    Ok(names)
}

/// Compute SHA256 checksum of data
fn compute_checksum(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Artifact store reached over HTTP
///
/// Artifacts live in the account-scoped bucket
/// `flood-prediction-models-{account_id}` at `{endpoint}/{bucket}/{key}`.
pub struct HttpArtifactStore {
    client: Client,
    base_url: Url,
    bucket: String,
}

impl HttpArtifactStore {
    pub fn new(endpoint: &str, account_id: &str, timeout: Duration) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;
        let base_url = Url::parse(endpoint).context("Invalid artifact store URL")?;
        if base_url.cannot_be_a_base() {
            anyhow::bail!("Artifact store URL cannot be a base: {}", endpoint);
        }

        Ok(Self {
            client,
            base_url,
            bucket: Self::bucket_name(account_id),
        })
    }

    pub fn bucket_name(account_id: &str) -> String {
        format!("flood-prediction-models-{}", account_id)
    }

    fn artifact_url(&self, key: &str) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments
                .pop_if_empty()
                .push(&self.bucket)
                .extend(key.split('/').filter(|s| !s.is_empty()));
        }
        url
    }
}

#[async_trait]
impl ArtifactStore for HttpArtifactStore {
    async fn fetch(&self, key: &str) -> Result<Vec<u8>, ModelError> {
        let fetch_error = |reason: String| ModelError::Fetch {
            key: key.to_string(),
            reason,
        };

        let response = self
            .client
            .get(self.artifact_url(key))
            .send()
            .await
            .map_err(|e| fetch_error(e.to_string()))?;
        if !response.status().is_success() {
            return Err(fetch_error(format!("HTTP {}", response.status())));
        }

        let body = response.bytes().await.map_err(|e| fetch_error(e.to_string()))?;
        Ok(body.to_vec())
    }
}

/// Artifact store backed by a local directory, keys are relative paths
pub struct FileArtifactStore {
    root: PathBuf,
}

impl FileArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl ArtifactStore for FileArtifactStore {
    async fn fetch(&self, key: &str) -> Result<Vec<u8>, ModelError> {
        let path = self.root.join(key);
        tokio::fs::read(&path).await.map_err(|e| ModelError::Fetch {
            key: key.to_string(),
            reason: format!("{}: {}", path.display(), e),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{GaugeReading, Trend, WeatherObservation};
    use crate::predictor::PredictionInput;
    use chrono::Utc;
    use prost::Message;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;
    use tract_onnx::pb;

    const WATER_LEVEL_WEIGHT: f32 = 0.1;

    /// Serves fixed artifacts and counts every fetch
    #[derive(Default)]
    struct CountingStore {
        artifacts: HashMap<String, Vec<u8>>,
        fetches: AtomicUsize,
    }

    impl CountingStore {
        fn with(mut self, key: &str, bytes: &[u8]) -> Self {
            self.artifacts.insert(key.to_string(), bytes.to_vec());
            self
        }

        fn fetches(&self) -> usize {
            self.fetches.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ArtifactStore for CountingStore {
        async fn fetch(&self, key: &str) -> Result<Vec<u8>, ModelError> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            // Widen the race window for concurrent first calls
            tokio::task::yield_now().await;
            self.artifacts.get(key).cloned().ok_or_else(|| ModelError::Fetch {
                key: key.to_string(),
                reason: "NoSuchKey".to_string(),
            })
        }
    }

    fn config() -> ModelProviderConfig {
        ModelProviderConfig::default()
    }

    fn manifest() -> Vec<u8> {
        serde_json::to_vec(&vec!["f"; NUM_FEATURES]).unwrap()
    }

    fn float_tensor_type(dims: &[i64]) -> pb::TypeProto {
        pb::TypeProto {
            value: Some(pb::type_proto::Value::TensorType(pb::type_proto::Tensor {
                elem_type: pb::tensor_proto::DataType::Float as i32,
                shape: Some(pb::TensorShapeProto {
                    dim: dims
                        .iter()
                        .map(|d| pb::tensor_shape_proto::Dimension {
                            value: Some(pb::tensor_shape_proto::dimension::Value::DimValue(*d)),
                            ..Default::default()
                        })
                        .collect(),
                }),
            })),
            ..Default::default()
        }
    }

    /// Encoded `y = MatMul(x, w)` graph weighting only the water level slot
    fn matmul_model(typed_input: bool) -> Vec<u8> {
        let mut weights = vec![0.0f32; NUM_FEATURES];
        weights[0] = WATER_LEVEL_WEIGHT;

        let graph = pb::GraphProto {
            name: "flood_risk".to_string(),
            node: vec![pb::NodeProto {
                input: vec!["x".to_string(), "w".to_string()],
                output: vec!["y".to_string()],
                op_type: "MatMul".to_string(),
                ..Default::default()
            }],
            initializer: vec![pb::TensorProto {
                name: "w".to_string(),
                dims: vec![NUM_FEATURES as i64, 1],
                data_type: pb::tensor_proto::DataType::Float as i32,
                float_data: weights,
                ..Default::default()
            }],
            input: vec![pb::ValueInfoProto {
                name: "x".to_string(),
                r#type: typed_input.then(|| float_tensor_type(&[1, NUM_FEATURES as i64])),
                ..Default::default()
            }],
            output: vec![pb::ValueInfoProto {
                name: "y".to_string(),
                r#type: Some(float_tensor_type(&[1, 1])),
                ..Default::default()
            }],
            ..Default::default()
        };

        pb::ModelProto {
            ir_version: 7,
            opset_import: vec![pb::OperatorSetIdProto {
                domain: String::new(),
                version: 13,
            }],
            graph: Some(graph),
            ..Default::default()
        }
        .encode_to_vec()
    }

    fn gauge_at(level: f64) -> GaugeReading {
        GaugeReading {
            gauge_id: "01646500".to_string(),
            timestamp: "2024-05-01T12:00:00Z".to_string(),
            water_level: Some(level),
            flood_stage: Some(10.0),
            location_name: None,
            trend: Trend::Rising,
            ttl: None,
        }
    }

    fn weather() -> WeatherObservation {
        WeatherObservation {
            station_id: "KDCA".to_string(),
            timestamp: "2024-05-01T12:00:00Z".to_string(),
            precipitation_1hr: Some(0.4),
            precipitation_forecast_24hr: Some(1.2),
            temperature: Some(61.0),
            location_name: None,
            ttl: None,
        }
    }

    #[tokio::test]
    async fn test_failed_fetch_falls_back_once() {
        let store = Arc::new(CountingStore::default());
        let provider = ModelProvider::new(store.clone(), config());

        for _ in 0..5 {
            let model = provider.get_model().await;
            assert!(model.is_heuristic());
            assert!(model.feature_names.is_empty());
            assert!(model.fallback_reason.as_deref().unwrap().contains("NoSuchKey"));
        }
        assert_eq!(store.fetches(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_first_calls_fetch_once() {
        let store = Arc::new(CountingStore::default());
        let provider = Arc::new(ModelProvider::new(store.clone(), config()));

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let provider = provider.clone();
                tokio::spawn(async move { provider.get_model().await.variant() })
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.await.unwrap(), ModelVariant::Heuristic);
        }
        assert_eq!(store.fetches(), 1);
    }

    #[tokio::test]
    async fn test_undeserializable_model_falls_back() {
        let cfg = config();
        let store = Arc::new(
            CountingStore::default()
                .with(&cfg.model_key, b"not an onnx graph")
                .with(&cfg.features_key, &manifest()),
        );
        let provider = ModelProvider::new(store.clone(), cfg);

        let model = provider.get_model().await;
        assert!(model.is_heuristic());
        assert!(model.fallback_reason.as_deref().unwrap().contains("failed to load model"));

        provider.get_model().await;
        // model + manifest, never repeated
        assert_eq!(store.fetches(), 2);
    }

    #[tokio::test]
    async fn test_valid_model_is_loaded_once_and_predicts() {
        let cfg = config();
        let store = Arc::new(
            CountingStore::default()
                .with(&cfg.model_key, &matmul_model(true))
                .with(&cfg.features_key, &manifest()),
        );
        let provider = ModelProvider::new(store.clone(), cfg);

        let gauge = vec![gauge_at(8.5)];
        let weather = vec![weather()];
        for _ in 0..4 {
            let model = provider.get_model().await;
            assert_eq!(model.variant(), ModelVariant::Onnx);
            assert!(model.fallback_reason.is_none());
            assert_eq!(model.feature_names.len(), NUM_FEATURES);

            let input = PredictionInput {
                gauge: &gauge,
                weather: &weather,
                evaluated_at: Utc::now(),
            };
            let probability = model.predictor.predict(&input).unwrap();
            assert!((probability - 0.85).abs() < 1e-6, "got {}", probability);
        }

        // Default vector carries a 5.0 ft water level
        let input = PredictionInput {
            gauge: &[],
            weather: &[],
            evaluated_at: Utc::now(),
        };
        let probability = provider.get_model().await.predictor.predict(&input).unwrap();
        assert!((probability - 0.5).abs() < 1e-6, "got {}", probability);

        // model + manifest, never repeated
        assert_eq!(store.fetches(), 2);
    }

    #[tokio::test]
    async fn test_model_rejected_by_parser_falls_back_once() {
        let cfg = config();
        let store = Arc::new(
            CountingStore::default()
                .with(&cfg.model_key, &matmul_model(false))
                .with(&cfg.features_key, &manifest()),
        );
        let provider = ModelProvider::new(store.clone(), cfg);

        for _ in 0..3 {
            let model = provider.get_model().await;
            assert!(model.is_heuristic());
            assert!(model.feature_names.is_empty());
            assert!(model
                .fallback_reason
                .as_deref()
                .unwrap()
                .contains("failed to load model"));
        }
        assert_eq!(store.fetches(), 2);
    }

    #[tokio::test]
    async fn test_oversized_model_rejected_before_manifest() {
        let cfg = ModelProviderConfig {
            max_model_size: 4,
            ..config()
        };
        let store = Arc::new(CountingStore::default().with(&cfg.model_key, b"0123456789"));
        let provider = ModelProvider::new(store.clone(), cfg);

        let model = provider.get_model().await;
        assert!(model.is_heuristic());
        assert!(model.fallback_reason.as_deref().unwrap().contains("exceeds maximum"));
        assert_eq!(store.fetches(), 1);
    }

    #[tokio::test]
    async fn test_checksum_mismatch_falls_back() {
        let cfg = ModelProviderConfig {
            expected_checksum: Some(compute_checksum(b"the real weights")),
            ..config()
        };
        let store = Arc::new(CountingStore::default().with(&cfg.model_key, b"tampered weights"));
        let provider = ModelProvider::new(store, cfg);

        let model = provider.get_model().await;
        assert!(model.is_heuristic());
        assert!(model.fallback_reason.as_deref().unwrap().contains("checksum mismatch"));
    }

    #[tokio::test]
    async fn test_heuristic_only_provider_is_preinitialized() {
        let provider = ModelProvider::heuristic_only();
        assert!(provider.is_initialized());
        assert!(provider.get_model().await.is_heuristic());
    }

    #[test]
    fn test_manifest_validation() {
        assert!(parse_manifest(b"[]").unwrap().is_empty());
        let names = serde_json::to_vec(&vec!["water_level"; NUM_FEATURES]).unwrap();
        assert_eq!(parse_manifest(&names).unwrap().len(), NUM_FEATURES);
        assert!(matches!(
            parse_manifest(br#"["water_level", "precip_1h"]"#),
            Err(ModelError::InvalidManifest(_))
        ));
        assert!(matches!(
            parse_manifest(b"{}"),
            Err(ModelError::InvalidManifest(_))
        ));
    }

    #[test]
    fn test_compute_checksum() {
        let checksum = compute_checksum(b"test model weights");
        assert_eq!(checksum.len(), 64); // SHA256 hex is 64 chars
        assert_eq!(checksum, compute_checksum(b"test model weights"));
    }

    #[test]
    fn test_http_artifact_url_is_account_scoped() {
        let store =
            HttpArtifactStore::new("http://artifacts.local/", "123456789012", Duration::from_secs(1))
                .unwrap();
        assert_eq!(
            store.artifact_url("models/flood_prediction_model.onnx").as_str(),
            "http://artifacts.local/flood-prediction-models-123456789012/models/flood_prediction_model.onnx"
        );
    }

    #[tokio::test]
    async fn test_http_artifact_fetch() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/flood-prediction-models-42/models/model_features.json")
            .with_status(200)
            .with_body("[]")
            .create_async()
            .await;
        server
            .mock("GET", "/flood-prediction-models-42/models/flood_prediction_model.onnx")
            .with_status(404)
            .create_async()
            .await;

        let store = HttpArtifactStore::new(&server.url(), "42", Duration::from_secs(2)).unwrap();
        assert_eq!(store.fetch("models/model_features.json").await.unwrap(), b"[]");
        let err = store.fetch("models/flood_prediction_model.onnx").await.unwrap_err();
        assert!(matches!(err, ModelError::Fetch { .. }), "got {:?}", err);
    }

    #[tokio::test]
    async fn test_file_artifact_store() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::create_dir_all(temp_dir.path().join("models")).unwrap();
        std::fs::write(temp_dir.path().join("models/model_features.json"), b"[]").unwrap();

        let store = FileArtifactStore::new(temp_dir.path());
        assert_eq!(store.fetch("models/model_features.json").await.unwrap(), b"[]");
        assert!(store.fetch("models/missing.onnx").await.is_err());
    }
}
