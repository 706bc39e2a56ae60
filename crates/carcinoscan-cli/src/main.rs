//! carcinoscan command line.
//!
//! Logs go to stderr; stdout carries only the JSON response.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use carcinoscan_core::IngredientSpec;
use carcinoscan_runtime::{
    LlmProvider, OfflineProvider, Orchestrator, ProviderRegistry, RuntimeConfig,
};

#[derive(Parser)]
#[command(name = "carcinoscan")]
#[command(about = "Assess food ingredients for carcinogen risk", long_about = None)]
#[command(version)]
struct Cli {
    /// YAML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log at debug level
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze a comma-separated ingredient list
    Analyze {
        /// Ingredients, e.g. "bacon, lettuce, tomato"
        ingredients: String,
    },

    /// Run a raw JSON request (single or batch) from a file or stdin
    Request {
        /// Request file; reads stdin when omitted
        file: Option<PathBuf>,
    },

    /// Show configured providers and model
    Health,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = load_config(cli.config.as_deref())?;
    let provider = reasoning_provider(&config);
    let orchestrator = Orchestrator::builder()
        .provider(provider)
        .config(config)
        .build()
        .context("Failed to build orchestrator")?;

    let output = match cli.command {
        Commands::Analyze { ingredients } => {
            let envelope = orchestrator.analyze(&IngredientSpec::Text(ingredients)).await;
            serde_json::to_string_pretty(&envelope)?
        }
        Commands::Request { file } => {
            let body = read_request(file.as_deref())?;
            let response = orchestrator.handle_json(&body).await;
            serde_json::to_string_pretty(&response)?
        }
        Commands::Health => serde_json::to_string_pretty(&orchestrator.health().await)?,
    };

    println!("{}", output);
    Ok(())
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(path: Option<&Path>) -> Result<RuntimeConfig> {
    match path {
        Some(path) => RuntimeConfig::from_yaml_file(path)
            .with_context(|| format!("Failed to load config {}", path.display())),
        None => Ok(RuntimeConfig::default()),
    }
}

/// Build the configured reasoning provider, or run offline on known values.
fn reasoning_provider(config: &RuntimeConfig) -> Arc<dyn LlmProvider> {
    let registry = ProviderRegistry::with_defaults();
    let reasoning = &config.reasoning;

    match registry.create(&reasoning.provider, &reasoning.to_provider_json()) {
        Ok(provider) => provider,
        Err(e) => {
            tracing::warn!(
                provider = %reasoning.provider,
                available = ?registry.available_types(),
                error = %e,
                "Reasoning provider unavailable, using known values only"
            );
            Arc::new(OfflineProvider)
        }
    }
}

fn read_request(file: Option<&Path>) -> Result<String> {
    match file {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read request {}", path.display())),
        None => {
            let mut body = String::new();
            std::io::stdin()
                .read_to_string(&mut body)
                .context("Failed to read request from stdin")?;
            Ok(body)
        }
    }
}
