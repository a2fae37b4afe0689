//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation. Every setting can also come from the
//! environment, which is how the service is usually configured
//! in containers.

use clap::Parser;
use std::path::PathBuf;

/// PostScore - topic relevance scoring for social media posts
///
/// Serves an HTTP API that scores how relevant a post's caption,
/// hashtags, and image are to a topic, using an OpenAI-compatible
/// model API for the text and image understanding.
///
/// Examples:
///   postscore
///   postscore --port 9000 --default-topic sunscreen
///   OPENAI_API_KEY=sk-... postscore --verbose
///   postscore --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Model API key
    ///
    /// Without a key the server still starts, but reports not-ready
    /// and rejects analysis requests.
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub openai_api_key: Option<String>,

    /// Base URL of the OpenAI-compatible model API
    #[arg(long, env = "OPENAI_BASE_URL", value_name = "URL")]
    pub base_url: Option<String>,

    /// Address to bind the HTTP server to
    #[arg(long, env = "HOST")]
    pub host: Option<String>,

    /// Port to listen on
    #[arg(short, long, env = "PORT")]
    pub port: Option<u16>,

    /// Timeout for every outbound request, in seconds
    #[arg(long, env = "REQUEST_TIMEOUT_SECONDS", value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Largest image accepted for analysis, in megabytes
    #[arg(long, env = "MAX_IMAGE_SIZE_MB", value_name = "MB")]
    pub max_image_size_mb: Option<u64>,

    /// Topic used when a request doesn't specify one
    #[arg(long, env = "DEFAULT_TOPIC", value_name = "TOPIC")]
    pub default_topic: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Path to configuration file
    ///
    /// If not specified, looks for .postscore.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (errors only)
    #[arg(short, long)]
    pub quiet: bool,

    /// Generate a default .postscore.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        if self.init_config {
            return Ok(());
        }

        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if let Some(timeout) = self.timeout {
            if timeout == 0 {
                return Err("Timeout must be at least 1 second".to_string());
            }
        }

        if let Some(ref level) = self.log_level {
            if parse_level(level).is_none() {
                return Err(format!("Unknown log level: {}", level));
            }
        }

        if let Some(ref config_path) = self.config {
            if !config_path.is_file() {
                return Err(format!(
                    "Config file does not exist: {}",
                    config_path.display()
                ));
            }
        }

        Ok(())
    }

    /// Returns the log level, letting --verbose/--quiet win over the
    /// configured level.
    pub fn log_level(&self, configured: &str) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            parse_level(configured).unwrap_or(tracing::Level::INFO)
        }
    }
}

fn parse_level(level: &str) -> Option<tracing::Level> {
    level.trim().parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_args() -> Args {
        Args {
            openai_api_key: None,
            base_url: None,
            host: None,
            port: None,
            timeout: None,
            max_image_size_mb: None,
            default_topic: None,
            log_level: None,
            config: None,
            verbose: false,
            quiet: false,
            init_config: false,
        }
    }

    #[test]
    fn test_validation_conflicting_options() {
        let mut args = make_args();
        args.verbose = true;
        args.quiet = true;
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_zero_timeout() {
        let mut args = make_args();
        args.timeout = Some(0);
        assert!(args.validate().is_err());

        args.timeout = Some(5);
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_validation_unknown_log_level() {
        let mut args = make_args();
        args.log_level = Some("loud".to_string());
        assert!(args.validate().is_err());

        args.log_level = Some("WARN".to_string());
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_log_level() {
        let mut args = make_args();
        assert_eq!(args.log_level("info"), tracing::Level::INFO);
        assert_eq!(args.log_level("DEBUG"), tracing::Level::DEBUG);
        assert_eq!(args.log_level("nonsense"), tracing::Level::INFO);

        args.verbose = true;
        assert_eq!(args.log_level("error"), tracing::Level::DEBUG);

        args.verbose = false;
        args.quiet = true;
        assert_eq!(args.log_level("debug"), tracing::Level::ERROR);
    }

    #[test]
    fn test_parse_from_flags() {
        let args = Args::try_parse_from([
            "postscore",
            "--port",
            "9000",
            "--default-topic",
            "umbrella",
        ])
        .unwrap();
        assert_eq!(args.port, Some(9000));
        assert_eq!(args.default_topic.as_deref(), Some("umbrella"));
    }
}
