use std::path::Path;

use sentinel_core::{detect_outbreaks, DetectorConfig};

use crate::commands::common::{format_outbreak_lines, parse_observations, read_input};
use crate::error::CliError;

pub fn run_detect(file: &Path, as_json: bool, detector: &DetectorConfig) -> Result<(), CliError> {
    let raw = read_input(file)?;
    let (observations, skipped) = parse_observations(&raw)?;
    if observations.is_empty() {
        return Err(CliError::NoRecords(skipped));
    }
    if skipped > 0 {
        tracing::warn!("Skipped {skipped} rows that were neither cases nor sightings");
    }

    let outbreaks = detect_outbreaks(&observations, detector);

    if as_json {
        println!("{}", serde_json::to_string_pretty(&outbreaks)?);
        return Ok(());
    }

    if outbreaks.is_empty() {
        println!("No outbreaks detected in {} records.", observations.len());
        return Ok(());
    }
    for line in format_outbreak_lines(&outbreaks) {
        println!("{line}");
    }
    Ok(())
}
