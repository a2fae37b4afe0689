//! HTTP API.
//!
//! Exposes service info, a health check, and the analyze endpoint. The
//! analyzer is built once at startup; when no model credential is configured
//! the server still runs but reports not-ready and rejects analysis.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::{Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::analysis::RelevanceAnalyzer;
use crate::config::Config;
use crate::error::AnalyzeError;
use crate::gateway::{GatewayConfig, ModelGateway, OpenAiGateway};
use crate::models::{
    AnalyzeRequest, AnalyzeResult, ErrorBody, HealthResponse, PostContent, ServiceInfo,
};

const SERVICE_NAME: &str = "Social Media Content Relevance API";
const SERVICE_DESCRIPTION: &str = "AI-powered service to analyze social media posts and score \
topic relevance (e.g., raincoat, sunscreen, umbrella, etc.)";
const MISSING_KEY_REASON: &str = "OPENAI_API_KEY environment variable is required";

/// Whether the service can analyze posts.
pub enum AnalyzerState {
    Ready(Arc<RelevanceAnalyzer>),
    NotConfigured { reason: String },
}

impl AnalyzerState {
    /// Build the analyzer from configuration, or record why it can't be built.
    pub fn from_config(config: &Config) -> Self {
        let Some(gateway_config) = GatewayConfig::from_config(config) else {
            error!("Configuration error: {}", MISSING_KEY_REASON);
            warn!("Model API is not configured - analysis requests will be rejected");
            return Self::NotConfigured {
                reason: MISSING_KEY_REASON.to_string(),
            };
        };

        match OpenAiGateway::new(gateway_config) {
            Ok(gateway) => Self::with_gateway(Arc::new(gateway)),
            Err(e) => {
                error!("Failed to create model gateway: {}", e);
                Self::NotConfigured {
                    reason: format!("model gateway unavailable: {}", e),
                }
            }
        }
    }

    pub fn with_gateway(gateway: Arc<dyn ModelGateway>) -> Self {
        Self::Ready(Arc::new(RelevanceAnalyzer::new(gateway)))
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready(_))
    }

    /// Best-effort startup check; failure is logged, never fatal.
    pub async fn check_connection(&self) {
        if let Self::Ready(analyzer) = self {
            match analyzer.gateway().test_connection().await {
                Ok(()) => info!("Model API connection successful"),
                Err(e) => warn!("Model API connection test failed: {}", e),
            }
        }
    }
}

/// State shared across handlers.
#[derive(Clone)]
pub struct AppState {
    analyzer: Arc<AnalyzerState>,
    default_topic: Arc<str>,
}

impl AppState {
    pub fn new(analyzer: AnalyzerState, default_topic: &str) -> Self {
        Self {
            analyzer: Arc::new(analyzer),
            default_topic: Arc::from(default_topic),
        }
    }
}

/// Build the API router.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any);

    Router::new()
        .route("/", get(service_info))
        .route("/health", get(health_check))
        .route("/analyze", post(analyze_post))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind and serve until Ctrl-C.
pub async fn serve(config: &Config, state: AppState) -> anyhow::Result<()> {
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to bind {}: {}", addr, e))?;

    info!("Listening on {}", addr);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Shutting down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
    }
}

/// Failure response with a `{"detail": ...}` body.
#[derive(Debug)]
pub enum ApiError {
    /// The request body was well-formed JSON but not a valid request.
    Unprocessable(String),
    Analyze(AnalyzeError),
}

impl From<AnalyzeError> for ApiError {
    fn from(e: AnalyzeError) -> Self {
        ApiError::Analyze(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, detail) = match self {
            ApiError::Unprocessable(detail) => (StatusCode::UNPROCESSABLE_ENTITY, detail),
            ApiError::Analyze(e @ AnalyzeError::NotConfigured(_)) => {
                (StatusCode::SERVICE_UNAVAILABLE, e.to_string())
            }
            // The cause was logged where it happened.
            ApiError::Analyze(AnalyzeError::Orchestration(_)) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Analysis failed".to_string(),
            ),
        };

        (status, Json(ErrorBody { detail })).into_response()
    }
}

async fn service_info() -> Json<ServiceInfo> {
    let endpoints = [("health", "/health"), ("analyze", "/analyze")]
        .into_iter()
        .map(|(name, path)| (name.to_string(), path.to_string()))
        .collect::<BTreeMap<_, _>>();

    Json(ServiceInfo {
        name: SERVICE_NAME.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        description: SERVICE_DESCRIPTION.to_string(),
        endpoints,
    })
}

async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let openai_status = if state.analyzer.is_ready() {
        "ready"
    } else {
        "configuration_error"
    };

    Json(HealthResponse {
        status: "healthy".to_string(),
        timestamp: Utc::now().to_rfc3339(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        openai_status: openai_status.to_string(),
    })
}

async fn analyze_post(
    State(state): State<AppState>,
    payload: Result<Json<AnalyzeRequest>, JsonRejection>,
) -> Result<Json<AnalyzeResult>, ApiError> {
    let analyzer = match state.analyzer.as_ref() {
        AnalyzerState::Ready(analyzer) => analyzer,
        AnalyzerState::NotConfigured { reason } => {
            return Err(AnalyzeError::NotConfigured(reason.clone()).into());
        }
    };

    let Json(request) = payload.map_err(|rejection| {
        warn!("Rejected analyze request: {}", rejection.body_text());
        ApiError::Unprocessable(rejection.body_text())
    })?;

    validate_image_urls(&request.content).map_err(ApiError::Unprocessable)?;

    let topic = request.topic_or(&state.default_topic);

    info!(
        "Analysis request: text={}, hashtags={}, images={}, topic={}",
        request.content.caption().is_some(),
        request.content.hashtags().len(),
        request.content.image_urls().len(),
        topic
    );

    let result = analyzer.analyze(&request.content, topic).await?;
    Ok(Json(result))
}

/// Image URLs must be absolute http(s) URLs.
fn validate_image_urls(content: &PostContent) -> Result<(), String> {
    for url in content.image_urls() {
        match reqwest::Url::parse(url) {
            Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => {}
            Ok(parsed) => {
                return Err(format!(
                    "image_urls: unsupported URL scheme '{}' in {}",
                    parsed.scheme(),
                    url
                ));
            }
            Err(e) => return Err(format!("image_urls: invalid URL {}: {}", url, e)),
        }
    }
    Ok(())
}
