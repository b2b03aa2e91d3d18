//! lyref-detect - cultural reference extraction over an annotation corpus
//!
//! Reads a corpus JSON file, asks the completion model for the references
//! behind every annotation and writes the per-song result (and optionally
//! the reference graph) as JSON.

use anyhow::{Context, Result};
use clap::Parser;
use lyref_common::config::{locate_config, resolve_api_key, resolve_toml_config};
use lyref_detect::{run_files, ExecutionMode, FileJob, ReferenceDetector};
use std::path::PathBuf;
use tracing::info;

/// Command-line arguments for lyref-detect
#[derive(Parser, Debug)]
#[command(name = "lyref-detect")]
#[command(about = "Extract cultural references from lyric annotations")]
#[command(version)]
struct Args {
    /// Corpus JSON file (list of songs with annotations)
    #[arg(short, long)]
    input: PathBuf,

    /// Where to write the per-song references
    #[arg(short, long)]
    output: PathBuf,

    /// Execution mode
    #[arg(short, long, value_enum, default_value_t = ExecutionMode::Concurrent)]
    mode: ExecutionMode,

    /// TOML config file (defaults to <config dir>/lyref/lyref.toml)
    #[arg(short, long, env = "LYREF_CONFIG")]
    config: Option<PathBuf>,

    /// Also write the deduplicated reference graph here
    #[arg(long)]
    graph: Option<PathBuf>,

    /// Override [concurrency] max_in_flight
    #[arg(long)]
    max_in_flight: Option<usize>,

    /// Override [model] name
    #[arg(long, env = "LYREF_MODEL")]
    model: Option<String>,
}

fn init_tracing(default_level: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // The log level comes from the config, so load it before the subscriber exists
    let config_path = locate_config(args.config.as_deref());
    let mut config =
        resolve_toml_config(config_path.as_deref()).context("Failed to load configuration")?;
    init_tracing(&config.logging.level);

    info!("Starting lyref-detect v{}", env!("CARGO_PKG_VERSION"));
    match &config_path {
        Some(path) => info!("Loaded config from {}", path.display()),
        None => info!("No config file found, using built-in defaults"),
    }

    if let Some(model) = args.model {
        config.model.name = model;
    }
    if let Some(max_in_flight) = args.max_in_flight {
        config.concurrency.max_in_flight = max_in_flight;
    }

    let api_key = resolve_api_key(&config)?;
    let detector = ReferenceDetector::from_config(&config, api_key)?;
    info!(model = %config.model.name, mode = ?args.mode, "Detector ready");

    let job = FileJob {
        input: args.input,
        output: args.output,
        graph: args.graph,
    };
    run_files(&detector, args.mode, &job).await?;

    Ok(())
}
