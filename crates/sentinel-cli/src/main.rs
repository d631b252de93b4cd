//! Sentinel CLI - operator and batch front end for the sync engine
//!
//! Runs the engine with live status output, performs offline outbreak
//! detection over exported records, and manages the persisted cache.

mod cli;
mod commands;
mod error;
#[cfg(test)]
mod tests;

use clap::Parser;
use sentinel_core::cache::PersistedCache;
use sentinel_core::{DetectorConfig, EngineConfig};
use tracing_subscriber::EnvFilter;

use crate::cli::{CacheAction, Cli, Commands};
use crate::commands::cache::{run_cache_clear, run_cache_show};
use crate::commands::common::{load_engine_config, resolve_cache_path, resolve_detector_config};
use crate::commands::completions::run_completions;
use crate::commands::detect::run_detect;
use crate::commands::run::{run_engine, StartMode};
use crate::commands::seed::run_seed;
use crate::error::CliError;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("sentinel=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            offline,
            online,
            duration,
            status_every,
        } => {
            let config = load_engine_config(cli.config.as_deref(), cli.cache_path)?;
            let mode = StartMode::from_flags(offline, online);
            run_engine(config, mode, duration, status_every).await?;
        }
        Commands::Detect {
            file,
            json,
            cell_size,
            window_days,
            min_cases,
        } => {
            let base = match cli.config.as_deref() {
                Some(path) => EngineConfig::load_from_path(path)?.detector,
                None => DetectorConfig::default(),
            };
            let detector = resolve_detector_config(base, cell_size, window_days, min_cases)?;
            run_detect(&file, json, &detector)?;
        }
        Commands::Seed { seed, output } => run_seed(seed, output.as_deref())?,
        Commands::Cache { action } => {
            let cache = PersistedCache::new(resolve_cache_path(
                cli.config.as_deref(),
                cli.cache_path,
            )?);
            match action {
                CacheAction::Show { json } => run_cache_show(&cache, json)?,
                CacheAction::Clear => run_cache_clear(&cache)?,
            }
        }
        Commands::Completions { shell, output } => {
            run_completions(shell, output.as_deref())?;
        }
    }

    Ok(())
}
