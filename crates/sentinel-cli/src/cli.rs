use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "sentinel")]
#[command(about = "Field-surveillance sync engine and outbreak detector")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Optional JSON engine config (environment variables are used when omitted)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Override the persisted cache location
    #[arg(long, global = true, value_name = "PATH")]
    pub cache_path: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the sync engine and print periodic status lines
    Run {
        /// Start in offline mode (no network I/O)
        #[arg(long, conflicts_with = "online")]
        offline: bool,
        /// Leave offline mode restored from the cache and reconnect
        #[arg(long)]
        online: bool,
        /// Stop after this many seconds (runs until Ctrl-C when omitted)
        #[arg(long, value_name = "SECS")]
        duration: Option<u64>,
        /// Seconds between status lines
        #[arg(long, value_name = "SECS", default_value = "10")]
        status_every: u64,
    },
    /// Detect outbreaks in a JSON array of case or sighting records
    Detect {
        /// Input file (`-` for stdin)
        file: PathBuf,
        /// Output as JSON
        #[arg(long)]
        json: bool,
        /// Grid cell size in degrees
        #[arg(long, value_name = "DEG")]
        cell_size: Option<f64>,
        /// Sliding window length in days
        #[arg(long, value_name = "N")]
        window_days: Option<u32>,
        /// Minimum records per window
        #[arg(long, value_name = "N")]
        min_cases: Option<u32>,
    },
    /// Emit a complete synthetic dataset as JSON
    Seed {
        /// Seed for reproducible output
        #[arg(long)]
        seed: Option<u64>,
        /// Optional output path (stdout when omitted)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
    /// Inspect or clear the persisted cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
    /// Generate shell completion scripts
    Completions {
        /// Target shell
        #[arg(value_enum)]
        shell: CompletionShell,
        /// Optional output path (stdout when omitted)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
pub enum CacheAction {
    /// Show cache location and per-kind counts
    Show {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete the cache file
    Clear,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum CompletionShell {
    Bash,
    Zsh,
    Fish,
}
