//! Batch entry point for the multi-timeframe pipeline.
//!
//! Subcommands:
//!   - `merge`    load both raw bar series, align them, write the merged table
//!   - `prepare`  window and split the merged table, fit the scaler, write the
//!     preprocessing artifact and partition CSVs
//!   - `evaluate` score a model on the rebuilt test partition
//!   - `predict`  serve the latest window and write the signal file

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use mtf_core::Config;
use tracing_subscriber::EnvFilter;

mod pipeline;

#[derive(Parser, Debug)]
#[command(name = "mtf-pipeline", author, version, about)]
struct Cli {
    /// Pipeline config (JSON). Built-in defaults are used when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log at debug level unless RUST_LOG is set.
    #[arg(long, short, global = true, default_value_t = false)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Align the fast and slow bar files into the merged table
    Merge,
    /// Build windows, fit the scaler and export partitions
    Prepare,
    /// Score a model on the test partition
    Evaluate {
        /// Logistic model JSON
        #[arg(long)]
        model: PathBuf,
    },
    /// Predict from the latest merged row and write the signal file
    Predict {
        /// Logistic model JSON
        #[arg(long)]
        model: PathBuf,

        /// Rebuild the merged table from the raw bar files first
        #[arg(long, default_value_t = false)]
        remerge: bool,
    },
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)))
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(path: Option<&PathBuf>) -> Result<Config> {
    let config = match path {
        Some(path) => Config::from_json_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => Config::default(),
    };
    config.validate().context("Invalid config")?;
    Ok(config)
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = load_config(cli.config.as_ref())?;
    match cli.command {
        Command::Merge => pipeline::run_merge(&config).map(|_| ()),
        Command::Prepare => pipeline::run_prepare(&config),
        Command::Evaluate { model } => pipeline::run_evaluate(&config, &model),
        Command::Predict { model, remerge } => pipeline::run_predict(&config, &model, remerge),
    }
}
