//! Model gateway.
//!
//! The gateway sends analysis prompts to the model API and hands back the
//! raw reply text. It does no interpretation; see `analysis::parser`.

pub mod openai;

use async_trait::async_trait;

use crate::error::GatewayError;

pub use openai::{GatewayConfig, OpenAiGateway};

/// Access to a text and image understanding model.
///
/// Object-safe so the analyzer can hold an `Arc<dyn ModelGateway>`.
#[async_trait]
pub trait ModelGateway: Send + Sync {
    /// Run a text-only prompt and return the raw reply.
    async fn analyze_text(&self, prompt: &str) -> Result<String, GatewayError>;

    /// Run a prompt against a single image and return the raw reply.
    async fn analyze_image(&self, image_url: &str, prompt: &str) -> Result<String, GatewayError>;

    /// Cheap round-trip used at startup to confirm the credential works.
    async fn test_connection(&self) -> Result<(), GatewayError>;
}
