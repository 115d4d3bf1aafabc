//! JD Bridge - Main Application Entry Point

use anyhow::{Context, Result};
use clap::Parser;
use config::{ConfigLoader, ConfigValidator, LoggingConfig};
use std::{env, path::PathBuf};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod api;
mod app;
mod cnl;
mod database;
mod dispatcher;
mod intake;
mod scheduler;
mod storage;

use app::Application;

/// Store-and-forward bridge between download sources and JDownloader
#[derive(Debug, Parser)]
#[command(name = "jd-bridge", version, about)]
struct Args {
    /// Configuration file; falls back to CONFIG_PATH, then config.yaml
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Write the default configuration to the config path and exit
    #[arg(long)]
    write_example_config: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Load .env file if it exists
    let dotenv_result = dotenv::dotenv();

    let config_path = args
        .config
        .or_else(|| env::var("CONFIG_PATH").ok().map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("config.yaml"));

    if args.write_example_config {
        ConfigLoader::create_example(&config_path)?;
        println!("Wrote example configuration to {}", config_path.display());
        return Ok(());
    }

    // Load configuration
    let config = if config_path.exists() {
        ConfigLoader::load(&config_path).context("Failed to load configuration")?
    } else {
        ConfigLoader::load_from_env().context("Failed to load configuration from environment")?
    };

    // Initialize logging
    init_logging(&config.logging)?;

    if let Err(e) = dotenv_result {
        if !e.not_found() {
            warn!("Could not load .env file: {}", e);
        }
    }

    info!("Starting JD Bridge v{}", env!("CARGO_PKG_VERSION"));
    if config_path.exists() {
        info!("Configuration loaded from: {}", config_path.display());
    } else {
        info!(
            "No configuration file at {}, using defaults and {}* environment overrides",
            config_path.display(),
            config::loader::ENV_PREFIX
        );
    }

    let report = ConfigValidator::validate(&config);
    for issue in &report.warnings {
        warn!(field = %issue.field, "{}", issue.message);
    }

    info!(
        jdownloader = %config.jdownloader.api_url(),
        mode = ?config.jdownloader.mode,
        database = %config.database.url,
        "Bridge configuration"
    );

    // Create and start the application
    let mut app = Application::new(config).await
        .context("Failed to create application")?;

    // Setup signal handling
    let shutdown_signal = async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Shutdown signal received"),
            Err(e) => {
                tracing::error!("Failed to listen for shutdown signal: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    // Run the application
    info!("Application starting...");
    tokio::select! {
        result = app.run() => {
            if let Err(e) = result {
                tracing::error!("Application error: {}", e);
                return Err(e);
            }
        }
        _ = shutdown_signal => {
            info!("Initiating graceful shutdown...");
            app.shutdown().await?;
        }
    }

    info!("JD Bridge shutdown complete");
    Ok(())
}

/// Initialize logging; RUST_LOG takes precedence over the configured level
fn init_logging(config: &LoggingConfig) -> Result<()> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.level));

    let registry = tracing_subscriber::registry().with(env_filter);

    match config.format.as_str() {
        "pretty" => {
            registry
                .with(tracing_subscriber::fmt::layer().pretty())
                .try_init()
                .context("Failed to initialize pretty logging")?;
        }
        _ => {
            registry
                .with(tracing_subscriber::fmt::layer().json())
                .try_init()
                .context("Failed to initialize JSON logging")?;
        }
    }

    info!("Logging initialized");
    info!("Log level: {}", config.level);
    info!("Log format: {}", config.format);

    if config.level == "trace" || config.level == "debug" {
        warn!("Debug/trace logging enabled - may impact performance in production");
    }

    Ok(())
}
