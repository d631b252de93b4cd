use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] sentinel_core::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("Input must be a JSON array of records")]
    NotAnArray,
    #[error("No valid case or sighting records in input ({0} rows skipped)")]
    NoRecords(usize),
    #[error("Could not resolve a data directory; pass --cache-path or set SENTINEL_CACHE_PATH")]
    NoDataDir,
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}
