//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.postscore.toml` files. CLI flags and their environment variables
//! take precedence over the file.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default configuration file name, looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = ".postscore.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// HTTP listener settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Model API settings.
    #[serde(default)]
    pub model: ModelConfig,

    /// Image fetch limits.
    #[serde(default)]
    pub image: ImageConfig,

    /// Scoring settings.
    #[serde(default)]
    pub analysis: AnalysisConfig,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Log verbosity (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// HTTP listener settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

/// Model API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// API key. Without it the service runs but reports not-ready.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Base URL of the OpenAI-compatible API.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Model used for caption/hashtag analysis.
    #[serde(default = "default_text_model")]
    pub text_model: String,

    /// Model used for image analysis.
    #[serde(default = "default_vision_model")]
    pub vision_model: String,

    /// Temperature for generation.
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Output token ceiling for text analysis.
    #[serde(default = "default_text_max_tokens")]
    pub text_max_tokens: u32,

    /// Output token ceiling for image analysis.
    #[serde(default = "default_image_max_tokens")]
    pub image_max_tokens: u32,

    /// Timeout applied to every outbound request, in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_base_url(),
            text_model: default_text_model(),
            vision_model: default_vision_model(),
            temperature: default_temperature(),
            text_max_tokens: default_text_max_tokens(),
            image_max_tokens: default_image_max_tokens(),
            timeout_seconds: default_timeout(),
        }
    }
}

impl ModelConfig {
    /// The API key, treating blank values as absent.
    pub fn api_key(&self) -> Option<&str> {
        self.api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
    }
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_text_model() -> String {
    "gpt-3.5-turbo".to_string()
}

fn default_vision_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_temperature() -> f32 {
    0.1
}

fn default_text_max_tokens() -> u32 {
    100
}

fn default_image_max_tokens() -> u32 {
    150 // enough room for a complete JSON reply
}

fn default_timeout() -> u64 {
    30
}

/// Image fetch limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageConfig {
    /// Largest image accepted for analysis, in megabytes.
    #[serde(default = "default_max_image_size_mb")]
    pub max_image_size_mb: u64,
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            max_image_size_mb: default_max_image_size_mb(),
        }
    }
}

fn default_max_image_size_mb() -> u64 {
    10
}

/// Scoring settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Topic used when a request doesn't name one.
    #[serde(default = "default_topic")]
    pub default_topic: String,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            default_topic: default_topic(),
        }
    }
}

fn default_topic() -> String {
    "raincoat".to_string()
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        Self::load_from_dir(Path::new("."))
    }

    /// Try to load `.postscore.toml` from a directory.
    pub fn load_from_dir(dir: &Path) -> Result<Option<Self>> {
        let config_path = dir.join(DEFAULT_CONFIG_FILE);

        if config_path.exists() {
            Ok(Some(Self::load(&config_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments (and the environment variables backing them) take
    /// precedence over config file settings. Only explicit values override.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(ref key) = args.openai_api_key {
            self.model.api_key = Some(key.clone());
        }
        if let Some(ref base_url) = args.base_url {
            self.model.base_url = base_url.clone();
        }
        if let Some(timeout) = args.timeout {
            self.model.timeout_seconds = timeout;
        }
        if let Some(ref host) = args.host {
            self.server.host = host.clone();
        }
        if let Some(port) = args.port {
            self.server.port = port;
        }
        if let Some(max_mb) = args.max_image_size_mb {
            self.image.max_image_size_mb = max_mb;
        }
        if let Some(ref topic) = args.default_topic {
            self.analysis.default_topic = topic.clone();
        }
        if let Some(ref level) = args.log_level {
            self.general.log_level = level.clone();
        }
    }

    /// Check values that serde can't.
    pub fn validate(&self) -> Result<(), String> {
        if !self.model.base_url.starts_with("http://")
            && !self.model.base_url.starts_with("https://")
        {
            return Err("Model base URL must start with 'http://' or 'https://'".to_string());
        }

        if !(0.0..=1.0).contains(&self.model.temperature) {
            return Err("Temperature must be between 0.0 and 1.0".to_string());
        }

        if self.model.timeout_seconds == 0 {
            return Err("Timeout must be at least 1 second".to_string());
        }

        if self.image.max_image_size_mb == 0 {
            return Err("Max image size must be at least 1 MB".to_string());
        }

        if self.analysis.default_topic.trim().is_empty() {
            return Err("Default topic must not be empty".to_string());
        }

        Ok(())
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.model.text_model, "gpt-3.5-turbo");
        assert_eq!(config.model.vision_model, "gpt-4o-mini");
        assert_eq!(config.model.timeout_seconds, 30);
        assert_eq!(config.image.max_image_size_mb, 10);
        assert_eq!(config.analysis.default_topic, "raincoat");
        assert_eq!(config.server.port, 8080);
        assert!(config.model.api_key().is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_config() {
        let toml_content = r#"
[general]
log_level = "debug"

[model]
api_key = "sk-test"
temperature = 0.2
timeout_seconds = 12

[analysis]
default_topic = "sunscreen"
"#;

        let config: Config = toml::from_str(toml_content).unwrap();
        assert_eq!(config.general.log_level, "debug");
        assert_eq!(config.model.api_key(), Some("sk-test"));
        assert_eq!(config.model.temperature, 0.2);
        assert_eq!(config.model.timeout_seconds, 12);
        assert_eq!(config.model.text_max_tokens, 100);
        assert_eq!(config.analysis.default_topic, "sunscreen");
        assert_eq!(config.image.max_image_size_mb, 10);
    }

    #[test]
    fn test_blank_api_key_is_absent() {
        let mut config = Config::default();
        config.model.api_key = Some("   ".to_string());
        assert!(config.model.api_key().is_none());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = Config::default();
        config.model.timeout_seconds = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.model.base_url = "ftp://example.com".to_string();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.image.max_image_size_mb = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_dir() {
        let temp_dir = TempDir::new().unwrap();
        assert!(Config::load_from_dir(temp_dir.path()).unwrap().is_none());

        std::fs::write(
            temp_dir.path().join(DEFAULT_CONFIG_FILE),
            "[image]\nmax_image_size_mb = 4\n",
        )
        .unwrap();
        let config = Config::load_from_dir(temp_dir.path()).unwrap().unwrap();
        assert_eq!(config.image.max_image_size_mb, 4);

        std::fs::write(temp_dir.path().join(DEFAULT_CONFIG_FILE), "not = [valid").unwrap();
        assert!(Config::load_from_dir(temp_dir.path()).is_err());
    }

    #[test]
    fn test_default_toml_generation() {
        let toml_str = Config::default_toml();
        assert!(!toml_str.is_empty());
        assert!(toml_str.contains("[general]"));
        assert!(toml_str.contains("[model]"));
        assert!(toml_str.contains("[analysis]"));
        assert!(!toml_str.contains("api_key"));
    }
}
