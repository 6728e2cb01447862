//! Straylight CLI entry point.
//!
//! Provides `serve`, `parse`, and `check` subcommands for running the HTTP
//! service, resolving a single query from the shell, or probing the model.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use straylight::booking::{BookingPipeline, PipelineSettings, SystemClock};
use straylight::config::{self, Config, LoadedConfig};
use straylight::providers::ollama::OllamaProvider;
use straylight::providers::{parse_provider_string, provider_from_config};
use straylight::server::{self, AppState, ErrorBody};

/// Straylight: natural-language flight booking parser.
#[derive(Parser)]
#[command(name = "straylight", version, about)]
struct Cli {
    /// Path to config.toml (default: $STRAYLIGHT_CONFIG or ~/.straylight/config.toml).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Subcommand to execute.
    #[command(subcommand)]
    command: Command,
}

/// Available CLI subcommands.
#[derive(Subcommand)]
enum Command {
    /// Run the HTTP service.
    Serve,
    /// Resolve one booking query and print the outcome as JSON.
    Parse {
        /// The booking request, e.g. "fly from Delhi to Mumbai after 5 days".
        #[arg(required = true, num_args = 1..)]
        query: Vec<String>,
    },
    /// Check whether the configured model server is reachable.
    Check,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    let loaded = config::load_effective(cli.config.as_deref()).context("failed to load config")?;

    match cli.command {
        Command::Serve => handle_serve(loaded).await,
        Command::Parse { query } => handle_parse(loaded, &query.join(" ")).await,
        Command::Check => handle_check(loaded).await,
    }
}

fn build_pipeline(config: &Config) -> anyhow::Result<BookingPipeline> {
    let provider = provider_from_config(&config.model).context("failed to create completer")?;
    Ok(BookingPipeline::new(
        provider,
        Arc::new(SystemClock),
        PipelineSettings::from_config(config),
    ))
}

/// Run the HTTP service until Ctrl-C.
async fn handle_serve(loaded: LoadedConfig) -> anyhow::Result<()> {
    let config = &loaded.config;
    let logs_dir = config::logs_dir(config)?;
    let _logging_guard = straylight::logging::init_production(&logs_dir, &config.logging.level)?;
    loaded.report();

    let addr = config.bind_addr()?;
    let pipeline = Arc::new(build_pipeline(config)?);
    info!(
        logs = %logs_dir.display(),
        timeout_secs = config.model.timeout_secs,
        "starting straylight"
    );
    server::serve(addr, AppState { pipeline }).await
}

/// Resolve one query, printing the outcome (or error) JSON to stdout.
async fn handle_parse(loaded: LoadedConfig, query: &str) -> anyhow::Result<()> {
    straylight::logging::init_cli(&loaded.config.logging.level);
    loaded.report();
    let pipeline = build_pipeline(&loaded.config)?;

    match pipeline.parse(query).await {
        Ok(outcome) => {
            println!("{}", serde_json::to_string_pretty(&outcome)?);
            Ok(())
        }
        Err(e) => {
            let body = ErrorBody {
                error: e.to_string(),
            };
            println!("{}", serde_json::to_string_pretty(&body)?);
            Err(e.into())
        }
    }
}

/// Check that the model server is reachable and has the model.
async fn handle_check(loaded: LoadedConfig) -> anyhow::Result<()> {
    straylight::logging::init_cli(&loaded.config.logging.level);
    loaded.report();
    let config = loaded.config;
    let (_, model) = parse_provider_string(&config.model.default)?;
    let provider = OllamaProvider::new(config.model.default.clone(), model.to_owned())
        .with_base_url(&config.model.base_url);

    if provider.is_available().await {
        info!(url = %provider.base_url, model = %config.model.default, "model server reachable");
        Ok(())
    } else {
        warn!(url = %provider.base_url, "model server unreachable");
        anyhow::bail!("model server at {} is unreachable", provider.base_url)
    }
}
