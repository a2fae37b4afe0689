//! OpenAI-compatible chat completions gateway.
//!
//! Text prompts go to the text model; image prompts go to the vision model
//! with a low-detail hint, after checking the image URL is reachable,
//! really an image, and under the configured size ceiling.

use async_trait::async_trait;
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error, info};

use super::ModelGateway;
use crate::config::Config;
use crate::error::GatewayError;

const TEXT_SYSTEM_PROMPT: &str =
    "Analyze social media content for the configured topic. Respond with JSON only.";

const IMAGE_SYSTEM_PROMPT: &str = "You are an expert at analyzing images for specific content. \
Always respond with valid JSON as requested.";

const BYTES_PER_MB: u64 = 1024 * 1024;

/// Settings for the gateway. Only exists when an API key is configured.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub api_key: String,
    pub base_url: String,
    pub text_model: String,
    pub vision_model: String,
    pub temperature: f32,
    pub text_max_tokens: u32,
    pub image_max_tokens: u32,
    pub timeout_seconds: u64,
    pub max_image_size_mb: u64,
}

impl GatewayConfig {
    /// Build gateway settings, or `None` when there is no API key.
    pub fn from_config(config: &Config) -> Option<Self> {
        let api_key = config.model.api_key()?;

        Some(Self {
            api_key: api_key.to_string(),
            base_url: config.model.base_url.trim_end_matches('/').to_string(),
            text_model: config.model.text_model.clone(),
            vision_model: config.model.vision_model.clone(),
            temperature: config.model.temperature,
            text_max_tokens: config.model.text_max_tokens,
            image_max_tokens: config.model.image_max_tokens,
            timeout_seconds: config.model.timeout_seconds,
            max_image_size_mb: config.image.max_image_size_mb,
        })
    }
}

/// Chat completions request.
#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: MessageContent<'a>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum MessageContent<'a> {
    Text(&'a str),
    Parts(Vec<ContentPart<'a>>),
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart<'a> {
    Text { text: &'a str },
    ImageUrl { image_url: ImageUrl<'a> },
}

#[derive(Debug, Serialize)]
struct ImageUrl<'a> {
    url: &'a str,
    detail: &'static str,
}

/// Chat completions response.
#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    total_tokens: u64,
}

/// Gateway backed by an OpenAI-compatible HTTP API.
pub struct OpenAiGateway {
    config: GatewayConfig,
    http_client: reqwest::Client,
}

impl OpenAiGateway {
    /// Create a gateway. Every outbound request shares the configured timeout.
    pub fn new(config: GatewayConfig) -> Result<Self, GatewayError> {
        info!(
            "Initializing model gateway: text={}, vision={}, base_url={}",
            config.text_model, config.vision_model, config.base_url
        );

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;

        Ok(Self {
            config,
            http_client,
        })
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.config.base_url)
    }

    fn map_send_error(&self, e: reqwest::Error, target: &str) -> GatewayError {
        if e.is_timeout() {
            GatewayError::Timeout(self.config.timeout_seconds)
        } else if e.is_connect() {
            GatewayError::Connect(target.to_string())
        } else {
            GatewayError::Http(e)
        }
    }

    /// Send one chat completion and return the reply text.
    async fn send_chat(&self, request: &ChatRequest<'_>, kind: &str) -> Result<String, GatewayError> {
        let url = self.completions_url();

        debug!("Sending {} request to model {}", kind, request.model);

        let response = self
            .http_client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(request)
            .send()
            .await
            .map_err(|e| self.map_send_error(e, &self.config.base_url))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(GatewayError::Api { status, body });
        }

        let chat_response: ChatResponse = response
            .json()
            .await
            .map_err(|e| GatewayError::Decode(e.to_string()))?;

        let content = chat_response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or(GatewayError::EmptyResponse)?;

        let tokens = chat_response.usage.map(|u| u.total_tokens).unwrap_or(0);
        info!("{} analysis completed, tokens: {}", kind, tokens);

        Ok(content)
    }

    /// Check the image is reachable, declares an image type, and isn't too big.
    async fn validate_image_url(&self, image_url: &str) -> Result<(), GatewayError> {
        let response = self
            .http_client
            .get(image_url)
            .send()
            .await
            .map_err(|e| match self.map_send_error(e, image_url) {
                GatewayError::Http(e) => {
                    GatewayError::ImageValidation(format!("failed to access image URL: {}", e))
                }
                other => other,
            })?;

        if response.status() != StatusCode::OK {
            return Err(GatewayError::ImageValidation(format!(
                "image URL returned status {}",
                response.status().as_u16()
            )));
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");
        if !content_type.starts_with("image/") {
            return Err(GatewayError::ImageValidation(format!(
                "URL does not point to an image (content-type: {})",
                content_type
            )));
        }

        let content_length = response
            .headers()
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok());
        if let Some(bytes) = content_length {
            if bytes > self.config.max_image_size_mb * BYTES_PER_MB {
                return Err(GatewayError::ImageValidation(format!(
                    "image too large: {:.1}MB > {}MB",
                    bytes as f64 / BYTES_PER_MB as f64,
                    self.config.max_image_size_mb
                )));
            }
        }

        Ok(())
    }
}

#[async_trait]
impl ModelGateway for OpenAiGateway {
    async fn analyze_text(&self, prompt: &str) -> Result<String, GatewayError> {
        let request = ChatRequest {
            model: &self.config.text_model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: MessageContent::Text(TEXT_SYSTEM_PROMPT),
                },
                ChatMessage {
                    role: "user",
                    content: MessageContent::Text(prompt),
                },
            ],
            max_tokens: self.config.text_max_tokens,
            temperature: Some(self.config.temperature),
        };

        self.send_chat(&request, "Text").await.map_err(|e| {
            error!("Model text analysis failed: {}", e);
            e
        })
    }

    async fn analyze_image(&self, image_url: &str, prompt: &str) -> Result<String, GatewayError> {
        let result = async {
            self.validate_image_url(image_url).await?;

            let request = ChatRequest {
                model: &self.config.vision_model,
                messages: vec![
                    ChatMessage {
                        role: "system",
                        content: MessageContent::Text(IMAGE_SYSTEM_PROMPT),
                    },
                    ChatMessage {
                        role: "user",
                        content: MessageContent::Parts(vec![
                            ContentPart::Text { text: prompt },
                            ContentPart::ImageUrl {
                                image_url: ImageUrl {
                                    url: image_url,
                                    detail: "low",
                                },
                            },
                        ]),
                    },
                ],
                max_tokens: self.config.image_max_tokens,
                temperature: Some(self.config.temperature),
            };

            self.send_chat(&request, "Image").await
        }
        .await;

        result.map_err(|e| {
            error!("Model image analysis failed: {}", e);
            e
        })
    }

    async fn test_connection(&self) -> Result<(), GatewayError> {
        let request = ChatRequest {
            model: &self.config.text_model,
            messages: vec![ChatMessage {
                role: "user",
                content: MessageContent::Text("Hello"),
            }],
            max_tokens: 5,
            temperature: None,
        };

        self.send_chat(&request, "Connection test").await.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_config(base_url: &str) -> GatewayConfig {
        GatewayConfig {
            api_key: "sk-test".to_string(),
            base_url: base_url.to_string(),
            text_model: "gpt-3.5-turbo".to_string(),
            vision_model: "gpt-4o-mini".to_string(),
            temperature: 0.1,
            text_max_tokens: 100,
            image_max_tokens: 150,
            timeout_seconds: 2,
            max_image_size_mb: 1,
        }
    }

    fn completion(content: &str) -> serde_json::Value {
        json!({
            "choices": [{"message": {"role": "assistant", "content": content}}],
            "usage": {"prompt_tokens": 40, "completion_tokens": 20, "total_tokens": 60}
        })
    }

    #[test]
    fn test_gateway_config_requires_key() {
        let mut config = Config::default();
        assert!(GatewayConfig::from_config(&config).is_none());

        config.model.api_key = Some("sk-live".to_string());
        config.model.base_url = "https://api.example.com/v1/".to_string();
        let gateway_config = GatewayConfig::from_config(&config).unwrap();
        assert_eq!(gateway_config.api_key, "sk-live");
        assert_eq!(gateway_config.base_url, "https://api.example.com/v1");
        assert_eq!(gateway_config.max_image_size_mb, 10);
    }

    #[tokio::test]
    async fn test_analyze_text_returns_reply() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("authorization", "Bearer sk-test"))
            .and(body_partial_json(json!({
                "model": "gpt-3.5-turbo",
                "max_tokens": 100
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion("{\"score\": 5}")))
            .expect(1)
            .mount(&server)
            .await;

        let gateway = OpenAiGateway::new(test_config(&server.uri())).unwrap();
        let reply = gateway.analyze_text("prompt").await.unwrap();
        assert_eq!(reply, "{\"score\": 5}");
    }

    #[tokio::test]
    async fn test_api_error_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(429).set_body_string("rate limited"))
            .mount(&server)
            .await;

        let gateway = OpenAiGateway::new(test_config(&server.uri())).unwrap();
        let err = gateway.analyze_text("prompt").await.unwrap_err();
        match err {
            GatewayError::Api { status, body } => {
                assert_eq!(status, 429);
                assert_eq!(body, "rate limited");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_null_content_is_empty_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"message": {"role": "assistant", "content": null}}]
            })))
            .mount(&server)
            .await;

        let gateway = OpenAiGateway::new(test_config(&server.uri())).unwrap();
        let err = gateway.analyze_text("prompt").await.unwrap_err();
        assert!(matches!(err, GatewayError::EmptyResponse));
    }

    #[tokio::test]
    async fn test_slow_reply_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(completion("{}"))
                    .set_delay(Duration::from_secs(5)),
            )
            .mount(&server)
            .await;

        let mut config = test_config(&server.uri());
        config.timeout_seconds = 1;
        let gateway = OpenAiGateway::new(config).unwrap();
        let err = gateway.analyze_text("prompt").await.unwrap_err();
        assert!(matches!(err, GatewayError::Timeout(1)));
    }

    #[tokio::test]
    async fn test_analyze_image_validates_then_calls_model() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/photo.jpg"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(vec![0u8; 1024], "image/jpeg"))
            .expect(1)
            .mount(&server)
            .await;

        let image_url = format!("{}/photo.jpg", server.uri());
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(body_partial_json(json!({
                "model": "gpt-4o-mini",
                "max_tokens": 150,
                "messages": [
                    {"role": "system"},
                    {"role": "user", "content": [
                        {"type": "text"},
                        {"type": "image_url", "image_url": {"url": image_url, "detail": "low"}}
                    ]}
                ]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion("ok")))
            .expect(1)
            .mount(&server)
            .await;

        let gateway = OpenAiGateway::new(test_config(&server.uri())).unwrap();
        let reply = gateway.analyze_image(&image_url, "prompt").await.unwrap();
        assert_eq!(reply, "ok");
    }

    #[tokio::test]
    async fn test_non_image_url_skips_model_call() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/page.html"))
            .respond_with(ResponseTemplate::new(200).set_body_raw("<html></html>", "text/html"))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion("ok")))
            .expect(0)
            .mount(&server)
            .await;

        let gateway = OpenAiGateway::new(test_config(&server.uri())).unwrap();
        let err = gateway
            .analyze_image(&format!("{}/page.html", server.uri()), "prompt")
            .await
            .unwrap_err();
        match err {
            GatewayError::ImageValidation(msg) => assert!(msg.contains("text/html")),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_missing_image_is_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/gone.jpg"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let gateway = OpenAiGateway::new(test_config(&server.uri())).unwrap();
        let err = gateway
            .analyze_image(&format!("{}/gone.jpg", server.uri()), "prompt")
            .await
            .unwrap_err();
        match err {
            GatewayError::ImageValidation(msg) => assert!(msg.contains("404")),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_oversized_image_is_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/huge.png"))
            .respond_with(
                ResponseTemplate::new(200).set_body_raw(vec![0u8; 2 * 1024 * 1024], "image/png"),
            )
            .mount(&server)
            .await;

        let gateway = OpenAiGateway::new(test_config(&server.uri())).unwrap();
        let err = gateway
            .analyze_image(&format!("{}/huge.png", server.uri()), "prompt")
            .await
            .unwrap_err();
        match err {
            GatewayError::ImageValidation(msg) => assert!(msg.contains("too large")),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_connection_check() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(body_partial_json(json!({"max_tokens": 5})))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion("Hi")))
            .mount(&server)
            .await;

        let gateway = OpenAiGateway::new(test_config(&server.uri())).unwrap();
        tokio_test::assert_ok!(gateway.test_connection().await);
    }
}
