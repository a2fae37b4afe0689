//! PostScore - topic relevance scoring for social media posts
//!
//! An HTTP service that scores how relevant a post's caption, hashtags,
//! and image are to a configurable topic, delegating text and image
//! understanding to an OpenAI-compatible model API.
//!
//! Exit codes:
//!   0 - Clean shutdown
//!   1 - Startup error (invalid arguments or config, bind failure)

mod analysis;
mod cli;
mod config;
mod error;
mod gateway;
mod models;
mod server;

use anyhow::{Context, Result};
use cli::Args;
use config::{Config, DEFAULT_CONFIG_FILE};
use server::{AnalyzerState, AppState};
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    let config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    };

    init_logging(&args, &config);

    info!("Starting PostScore v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);

    if let Err(e) = run_server(config).await {
        error!("Server failed: {:#}", e);
        std::process::exit(1);
    }

    Ok(())
}

/// Handle --init-config: generate a default .postscore.toml.
fn handle_init_config() -> Result<()> {
    let path = std::path::Path::new(DEFAULT_CONFIG_FILE);

    if path.exists() {
        eprintln!(
            "{} already exists. Remove it first or edit it manually.",
            DEFAULT_CONFIG_FILE
        );
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content)
        .with_context(|| format!("Failed to write {}", DEFAULT_CONFIG_FILE))?;

    println!("Created {} with default settings.", DEFAULT_CONFIG_FILE);
    println!("   Set OPENAI_API_KEY (or model.api_key) before starting the server.");
    Ok(())
}

/// Initialize logging based on verbosity settings.
fn init_logging(args: &Args, config: &Config) {
    let level = args.log_level(&config.general.log_level);

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}

/// Load configuration from file or defaults, then apply CLI/env overrides.
fn load_config(args: &Args) -> Result<Config> {
    let mut config = if let Some(ref config_path) = args.config {
        Config::load(config_path)?
    } else {
        match Config::load_default() {
            Ok(Some(config)) => config,
            Ok(None) => Config::default(),
            Err(e) => {
                // Logging isn't up yet.
                eprintln!("Warning: {:#}; using defaults", e);
                Config::default()
            }
        }
    };

    config.merge_with_args(args);
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("Invalid configuration: {}", e))?;

    Ok(config)
}

/// Build the analyzer and serve the API until shutdown.
async fn run_server(config: Config) -> Result<()> {
    let analyzer = AnalyzerState::from_config(&config);

    if analyzer.is_ready() {
        info!(
            "Model API: {} (text: {}, vision: {}, timeout: {}s)",
            config.model.base_url,
            config.model.text_model,
            config.model.vision_model,
            config.model.timeout_seconds
        );
        analyzer.check_connection().await;
    } else {
        warn!("Starting in not-ready mode");
    }

    info!("Default topic: {}", config.analysis.default_topic);

    let state = AppState::new(analyzer, &config.analysis.default_topic);
    server::serve(&config, state).await
}
