//! Weather reading model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{EntityKind, Record};
use crate::error::{Error, Result};
use crate::util::deserialize_timestamp;

/// A point-in-time weather observation for a region.
///
/// Readings carry no identity of their own; `(region, recorded_at)` is unique in practice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherReading {
    pub region: String,
    #[serde(alias = "temperature")]
    pub temperature_c: f64,
    #[serde(alias = "humidity")]
    pub humidity_pct: f64,
    #[serde(alias = "rainfall")]
    pub rainfall_mm: f64,
    #[serde(alias = "wind_speed")]
    pub wind_speed_kmh: f64,
    #[serde(alias = "timestamp", deserialize_with = "deserialize_timestamp")]
    pub recorded_at: DateTime<Utc>,
}

impl Record for WeatherReading {
    const KIND: EntityKind = EntityKind::WeatherReading;

    fn validate(&self) -> Result<()> {
        if self.region.trim().is_empty() {
            return Err(Error::invalid(Self::KIND, "region must not be empty"));
        }
        let values = [
            self.temperature_c,
            self.humidity_pct,
            self.rainfall_mm,
            self.wind_speed_kmh,
        ];
        if values.iter().any(|value| !value.is_finite()) {
            return Err(Error::invalid(Self::KIND, "measurements must be finite"));
        }
        Ok(())
    }
}
