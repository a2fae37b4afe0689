//! Error types.
//!
//! Modality-level failures (`GatewayError`, `ParseError`) are recovered by
//! the combiner into degraded results. Only `AnalyzeError` reaches callers.

use thiserror::Error;

/// Failure talking to the model API or fetching the image to analyze.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("invalid image URL: {0}")]
    ImageValidation(String),

    #[error("request timed out after {0}s")]
    Timeout(u64),

    #[error("cannot connect to {0}")]
    Connect(String),

    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("model API error {status}: {body}")]
    Api { status: u16, body: String },

    #[error("model returned no content")]
    EmptyResponse,

    #[error("failed to decode model API response: {0}")]
    Decode(String),
}

/// The model replied, but not with a usable analysis.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("response is not valid analysis JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("score {0} is outside 0..=100")]
    ScoreOutOfRange(String),

    #[error("score {0} is not an integer")]
    ScoreNotInteger(String),

    #[error("reasoning is empty")]
    EmptyReasoning,
}

/// Why a single modality produced no real analysis.
#[derive(Debug, Error)]
pub enum ModalityFailure {
    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error(transparent)]
    Parse(#[from] ParseError),
}

/// Request-level failure surfaced to the caller.
#[derive(Debug, Error)]
pub enum AnalyzeError {
    /// The service started without a model API credential.
    #[error("Service not ready: {0}")]
    NotConfigured(String),

    /// Something went wrong outside the per-modality boundary.
    #[error("Analysis failed: {0}")]
    Orchestration(String),
}
