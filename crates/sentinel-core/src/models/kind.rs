//! Entity kinds and the tagged record/collection wrappers the store accepts.

use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::{Alert, Case, Colony, MovementPath, Outbreak, Sighting, WeatherReading};
use crate::error::{Error, Result};

/// The closed set of entity kinds held by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Sighting,
    Case,
    WeatherReading,
    Colony,
    MovementPath,
    Outbreak,
    Alert,
}

impl EntityKind {
    /// Kinds fetched by the bootstrap loader, in fetch order.
    pub const BOOTSTRAP: [Self; 6] = [
        Self::Colony,
        Self::Sighting,
        Self::Case,
        Self::MovementPath,
        Self::Outbreak,
        Self::WeatherReading,
    ];

    /// Kinds with a live insert channel.
    pub const PUSHABLE: [Self; 3] = [Self::Sighting, Self::Case, Self::WeatherReading];

    /// Backend table name.
    pub const fn table(self) -> &'static str {
        match self {
            Self::Sighting => "sightings",
            Self::Case => "cases",
            Self::WeatherReading => "weather_readings",
            Self::Colony => "colonies",
            Self::MovementPath => "movement_paths",
            Self::Outbreak => "outbreaks",
            Self::Alert => "alerts",
        }
    }

    /// Column used for newest-first ordering and push cursors.
    pub const fn time_column(self) -> &'static str {
        match self {
            Self::Sighting => "observed_at",
            Self::Case => "reported_on",
            Self::WeatherReading => "recorded_at",
            Self::Colony => "surveyed_on",
            Self::MovementPath => "observed_on",
            Self::Outbreak => "start",
            Self::Alert => "raised_at",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Sighting => "sighting",
            Self::Case => "case",
            Self::WeatherReading => "weather reading",
            Self::Colony => "colony",
            Self::MovementPath => "movement path",
            Self::Outbreak => "outbreak",
            Self::Alert => "alert",
        };
        f.write_str(label)
    }
}

/// A typed record that can be parsed and validated at the system boundary.
pub trait Record: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    const KIND: EntityKind;

    /// Check invariants serde cannot express (coordinate ranges, severity bounds).
    fn validate(&self) -> Result<()>;

    /// Parse an untyped JSON row into a validated record.
    fn parse(value: serde_json::Value) -> Result<Self> {
        let record: Self = serde_json::from_value(value)
            .map_err(|error| Error::invalid(Self::KIND, error.to_string()))?;
        record.validate()?;
        Ok(record)
    }
}

/// Reject non-finite or out-of-range coordinates.
pub(crate) fn validate_coordinates(kind: EntityKind, latitude: f64, longitude: f64) -> Result<()> {
    if !latitude.is_finite() || !longitude.is_finite() {
        return Err(Error::invalid(kind, "coordinates must be finite"));
    }
    if !(-90.0..=90.0).contains(&latitude) {
        return Err(Error::invalid(kind, format!("latitude {latitude} out of range")));
    }
    if !(-180.0..=180.0).contains(&longitude) {
        return Err(Error::invalid(kind, format!("longitude {longitude} out of range")));
    }
    Ok(())
}

/// A single record of any kind, as handed to `EntityStore::append`.
#[derive(Debug, Clone, PartialEq)]
pub enum EntityRecord {
    Sighting(Sighting),
    Case(Case),
    WeatherReading(WeatherReading),
    Colony(Colony),
    MovementPath(MovementPath),
    Outbreak(Outbreak),
    Alert(Alert),
}

impl EntityRecord {
    pub const fn kind(&self) -> EntityKind {
        match self {
            Self::Sighting(_) => EntityKind::Sighting,
            Self::Case(_) => EntityKind::Case,
            Self::WeatherReading(_) => EntityKind::WeatherReading,
            Self::Colony(_) => EntityKind::Colony,
            Self::MovementPath(_) => EntityKind::MovementPath,
            Self::Outbreak(_) => EntityKind::Outbreak,
            Self::Alert(_) => EntityKind::Alert,
        }
    }

    /// Parse a JSON payload as a record of the given kind.
    pub fn parse(kind: EntityKind, value: serde_json::Value) -> Result<Self> {
        Ok(match kind {
            EntityKind::Sighting => Self::Sighting(Sighting::parse(value)?),
            EntityKind::Case => Self::Case(Case::parse(value)?),
            EntityKind::WeatherReading => Self::WeatherReading(WeatherReading::parse(value)?),
            EntityKind::Colony => Self::Colony(Colony::parse(value)?),
            EntityKind::MovementPath => Self::MovementPath(MovementPath::parse(value)?),
            EntityKind::Outbreak => Self::Outbreak(Outbreak::parse(value)?),
            EntityKind::Alert => Self::Alert(Alert::parse(value)?),
        })
    }
}

/// A whole collection of one kind, as handed to `EntityStore::replace`.
#[derive(Debug, Clone, PartialEq)]
pub enum EntityCollection {
    Sightings(Vec<Sighting>),
    Cases(Vec<Case>),
    WeatherReadings(Vec<WeatherReading>),
    Colonies(Vec<Colony>),
    MovementPaths(Vec<MovementPath>),
    Outbreaks(Vec<Outbreak>),
    Alerts(Vec<Alert>),
}

impl EntityCollection {
    pub const fn kind(&self) -> EntityKind {
        match self {
            Self::Sightings(_) => EntityKind::Sighting,
            Self::Cases(_) => EntityKind::Case,
            Self::WeatherReadings(_) => EntityKind::WeatherReading,
            Self::Colonies(_) => EntityKind::Colony,
            Self::MovementPaths(_) => EntityKind::MovementPath,
            Self::Outbreaks(_) => EntityKind::Outbreak,
            Self::Alerts(_) => EntityKind::Alert,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Sightings(items) => items.len(),
            Self::Cases(items) => items.len(),
            Self::WeatherReadings(items) => items.len(),
            Self::Colonies(items) => items.len(),
            Self::MovementPaths(items) => items.len(),
            Self::Outbreaks(items) => items.len(),
            Self::Alerts(items) => items.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Parse untyped rows of the given kind, dropping rows that fail validation.
    pub fn parse_rows(kind: EntityKind, rows: Vec<serde_json::Value>) -> Self {
        match kind {
            EntityKind::Sighting => Self::Sightings(parse_valid(rows)),
            EntityKind::Case => Self::Cases(parse_valid(rows)),
            EntityKind::WeatherReading => Self::WeatherReadings(parse_valid(rows)),
            EntityKind::Colony => Self::Colonies(parse_valid(rows)),
            EntityKind::MovementPath => Self::MovementPaths(parse_valid(rows)),
            EntityKind::Outbreak => Self::Outbreaks(parse_valid(rows)),
            EntityKind::Alert => Self::Alerts(parse_valid(rows)),
        }
    }
}

fn parse_valid<T: Record>(rows: Vec<serde_json::Value>) -> Vec<T> {
    rows.into_iter()
        .filter_map(|row| match T::parse(row) {
            Ok(record) => Some(record),
            Err(error) => {
                tracing::debug!("Dropping row: {}", error);
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn coordinates_must_be_finite_and_in_range() {
        assert!(validate_coordinates(EntityKind::Case, 10.0, 76.0).is_ok());
        assert!(validate_coordinates(EntityKind::Case, f64::NAN, 76.0).is_err());
        assert!(validate_coordinates(EntityKind::Case, 91.0, 76.0).is_err());
        assert!(validate_coordinates(EntityKind::Case, 10.0, -181.0).is_err());
    }

    #[test]
    fn parse_rows_drops_invalid_entries() {
        let rows = vec![
            json!({
                "id": "c-1",
                "latitude": 11.2,
                "longitude": 75.8,
                "reported_on": "2024-06-01",
                "severity": 3,
                "confirmed": true
            }),
            json!({ "id": "c-2", "latitude": 11.2 }),
        ];

        let collection = EntityCollection::parse_rows(EntityKind::Case, rows);
        assert_eq!(collection.kind(), EntityKind::Case);
        assert_eq!(collection.len(), 1);
    }

    #[test]
    fn record_parse_reports_kind() {
        let error = EntityRecord::parse(EntityKind::Sighting, json!({})).unwrap_err();
        assert!(error.to_string().contains("sighting"));
    }
}
