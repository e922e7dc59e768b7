//! Error kinds at each engine boundary
//!
//! Data-unavailable store errors and any model acquisition error are
//! recovered locally; only [`EngineError`] reaches the caller of an
//! evaluation.

use thiserror::Error;

/// Reading store query failures
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("reading store timed out")]
    Timeout,
    #[error("reading store unavailable: {0}")]
    Unavailable(String),
    #[error("malformed reading store response: {0}")]
    Decode(String),
}

impl StoreError {
    /// Timeouts and unreachable stores mean "no data", not a fault
    pub fn is_data_unavailable(&self) -> bool {
        matches!(self, StoreError::Timeout | StoreError::Unavailable(_))
    }
}

/// Model acquisition and inference failures
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("failed to fetch artifact {key}: {reason}")]
    Fetch { key: String, reason: String },
    #[error("model size {size} exceeds maximum {max}")]
    TooLarge { size: usize, max: usize },
    #[error("checksum mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch { expected: String, actual: String },
    #[error("invalid feature manifest: {0}")]
    InvalidManifest(String),
    #[error("failed to load model: {0}")]
    Load(String),
    #[error("inference failed: {0}")]
    Inference(String),
    #[error("model produced invalid output: {0}")]
    InvalidOutput(String),
}

/// Notification publish failures
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("notification transport timed out")]
    Timeout,
    #[error("notification rejected with status {status}")]
    Rejected { status: u16 },
    #[error("notification transport unavailable: {0}")]
    Unavailable(String),
}

/// Unexpected failures surfaced by the orchestrator
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("model error: {0}")]
    Model(#[from] ModelError),
}

impl From<reqwest::Error> for StoreError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            StoreError::Timeout
        } else if e.is_decode() {
            StoreError::Decode(e.to_string())
        } else {
            StoreError::Unavailable(e.to_string())
        }
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            TransportError::Timeout
        } else if let Some(status) = e.status() {
            TransportError::Rejected {
                status: status.as_u16(),
            }
        } else {
            TransportError::Unavailable(e.to_string())
        }
    }
}
