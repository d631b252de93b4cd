use std::io::{self, Read};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use sentinel_core::cache::CACHE_FILE_NAME;
use sentinel_core::detect::Observation;
use sentinel_core::models::{Case, Outbreak, OutbreakStatus, Record, Sighting};
use sentinel_core::store::StoreSnapshot;
use sentinel_core::{DetectorConfig, EngineConfig, EntityKind};

use crate::error::CliError;

/// Engine config from `--config` or the environment, with the cache path
/// resolved (flag, then config/env, then the platform data directory).
pub fn load_engine_config(
    config_path: Option<&Path>,
    cache_path: Option<PathBuf>,
) -> Result<EngineConfig, CliError> {
    let mut config = match config_path {
        Some(path) => EngineConfig::load_from_path(path)?,
        None => EngineConfig::from_env()?,
    };
    config.cache_path = cache_path.or(config.cache_path).or_else(default_cache_path);
    Ok(config)
}

pub fn resolve_cache_path(
    config_path: Option<&Path>,
    cache_path: Option<PathBuf>,
) -> Result<PathBuf, CliError> {
    load_engine_config(config_path, cache_path)?
        .cache_path
        .ok_or(CliError::NoDataDir)
}

pub fn default_cache_path() -> Option<PathBuf> {
    dirs::data_dir().map(|dir| dir.join("sentinel").join(CACHE_FILE_NAME))
}

/// Apply command-line overrides on top of a base detector config.
pub fn resolve_detector_config(
    base: DetectorConfig,
    cell_size: Option<f64>,
    window_days: Option<u32>,
    min_cases: Option<u32>,
) -> Result<DetectorConfig, CliError> {
    let config = DetectorConfig {
        cell_size_deg: cell_size.unwrap_or(base.cell_size_deg),
        window_days: window_days.unwrap_or(base.window_days),
        min_cases: min_cases.unwrap_or(base.min_cases),
    };
    config.validate()?;
    Ok(config)
}

/// Read a file, or stdin when the path is `-`.
pub fn read_input(path: &Path) -> Result<String, CliError> {
    if path.as_os_str() == "-" {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        return Ok(buffer);
    }
    Ok(std::fs::read_to_string(path)?)
}

/// Parse a JSON array into detector observations.
///
/// Rows are tried as cases first, then as sightings. Returns the
/// observations and the number of rows that matched neither.
pub fn parse_observations(raw: &str) -> Result<(Vec<Observation>, usize), CliError> {
    let value: serde_json::Value = serde_json::from_str(raw)?;
    let serde_json::Value::Array(rows) = value else {
        return Err(CliError::NotAnArray);
    };

    let mut observations = Vec::with_capacity(rows.len());
    let mut skipped = 0usize;
    for row in rows {
        if let Ok(case) = Case::parse(row.clone()) {
            observations.push(Observation::from(&case));
        } else if let Ok(sighting) = Sighting::parse(row) {
            observations.push(Observation::from(&sighting));
        } else {
            skipped += 1;
        }
    }
    Ok((observations, skipped))
}

pub fn format_outbreak_lines(outbreaks: &[Outbreak]) -> Vec<String> {
    outbreaks
        .iter()
        .map(|outbreak| {
            format!(
                "{} | {} | {} to {} | {} records | severity {} | {}",
                outbreak.id,
                outbreak.region.as_deref().unwrap_or("unknown"),
                outbreak.start.format("%Y-%m-%d"),
                outbreak.end.format("%Y-%m-%d"),
                outbreak.case_count,
                outbreak.severity,
                status_label(outbreak.status),
            )
        })
        .collect()
}

const fn status_label(status: OutbreakStatus) -> &'static str {
    match status {
        OutbreakStatus::Active => "active",
        OutbreakStatus::Contained => "contained",
        OutbreakStatus::Resolved => "resolved",
    }
}

/// One-line connectivity and count summary.
pub fn format_status_line(snapshot: &StoreSnapshot, now: DateTime<Utc>) -> String {
    let status = &snapshot.status;
    let unacknowledged = snapshot
        .alerts
        .iter()
        .filter(|alert| !alert.acknowledged)
        .count();
    let last_attempt = status.last_connection_attempt.map_or_else(
        || "never".to_string(),
        |attempt| format_relative_time(attempt.timestamp_millis(), now.timestamp_millis()),
    );

    format!(
        "[{}] colonies={} sightings={} cases={} paths={} outbreaks={} weather={} alerts={} ({} unacked) | last attempt {}",
        status.connection_state(),
        snapshot.count(EntityKind::Colony),
        snapshot.count(EntityKind::Sighting),
        snapshot.count(EntityKind::Case),
        snapshot.count(EntityKind::MovementPath),
        snapshot.count(EntityKind::Outbreak),
        snapshot.count(EntityKind::WeatherReading),
        snapshot.count(EntityKind::Alert),
        unacknowledged,
        last_attempt,
    )
}

pub fn format_relative_time(timestamp_ms: i64, now_ms: i64) -> String {
    let diff = now_ms.saturating_sub(timestamp_ms);
    let second = 1_000;
    let minute = 60 * second;
    let hour = 60 * minute;
    let day = 24 * hour;

    if diff < second {
        "just now".to_string()
    } else if diff < minute {
        format!("{}s ago", diff / second)
    } else if diff < hour {
        format!("{}m ago", diff / minute)
    } else if diff < day {
        format!("{}h ago", diff / hour)
    } else {
        format!("{}d ago", diff / day)
    }
}
