use sentinel_core::cache::{CachedSnapshot, PersistedCache};
use serde::Serialize;

use crate::error::CliError;

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct CacheSummary {
    pub path: String,
    pub offline_mode: bool,
    pub colonies: usize,
    pub sightings: usize,
    pub cases: usize,
    pub paths: usize,
    pub outbreaks: usize,
    pub weather_readings: usize,
}

impl CacheSummary {
    pub fn new(cache: &PersistedCache, snapshot: &CachedSnapshot) -> Self {
        Self {
            path: cache.path().display().to_string(),
            offline_mode: snapshot.is_offline_mode,
            colonies: snapshot.colonies.len(),
            sightings: snapshot.sightings.len(),
            cases: snapshot.cases.len(),
            paths: snapshot.paths.len(),
            outbreaks: snapshot.outbreaks.len(),
            weather_readings: snapshot.weather_readings.len(),
        }
    }
}

pub fn run_cache_show(cache: &PersistedCache, as_json: bool) -> Result<(), CliError> {
    let Some(snapshot) = cache.load()? else {
        println!("No cache at {}", cache.path().display());
        return Ok(());
    };
    let summary = CacheSummary::new(cache, &snapshot);

    if as_json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    println!("Cache: {}", summary.path);
    println!("Offline mode: {}", summary.offline_mode);
    println!("Colonies: {}", summary.colonies);
    println!("Sightings: {}", summary.sightings);
    println!("Cases: {}", summary.cases);
    println!("Movement paths: {}", summary.paths);
    println!("Outbreaks: {}", summary.outbreaks);
    println!("Weather readings: {}", summary.weather_readings);
    Ok(())
}

pub fn run_cache_clear(cache: &PersistedCache) -> Result<(), CliError> {
    if cache.clear()? {
        println!("Removed {}", cache.path().display());
    } else {
        println!("No cache at {}", cache.path().display());
    }
    Ok(())
}
