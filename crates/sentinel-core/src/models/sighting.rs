//! Field sighting model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::kind::validate_coordinates;
use super::{EntityId, EntityKind, Record};
use crate::error::Result;
use crate::util::deserialize_timestamp;

/// A field report of animals observed at a location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sighting {
    pub id: EntityId,
    /// Colony the sighting was attributed to, if any
    #[serde(default, alias = "colony_id")]
    pub colony_ref: Option<String>,
    #[serde(alias = "lat")]
    pub latitude: f64,
    #[serde(alias = "lon", alias = "lng")]
    pub longitude: f64,
    #[serde(
        alias = "timestamp",
        alias = "date",
        deserialize_with = "deserialize_timestamp"
    )]
    pub observed_at: DateTime<Utc>,
    /// Estimated head count
    #[serde(default, alias = "population_count", alias = "count")]
    pub population: Option<u32>,
    #[serde(default)]
    pub region: Option<String>,
}

impl Record for Sighting {
    const KIND: EntityKind = EntityKind::Sighting;

    fn validate(&self) -> Result<()> {
        validate_coordinates(Self::KIND, self.latitude, self.longitude)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_backend_aliases() {
        let sighting = Sighting::parse(json!({
            "id": 7,
            "colony_id": "COL-003",
            "lat": 11.25,
            "lng": 75.78,
            "timestamp": "2024-05-02T08:00:00Z",
            "population_count": 120
        }))
        .unwrap();

        assert_eq!(sighting.id.as_str(), "7");
        assert_eq!(sighting.colony_ref.as_deref(), Some("COL-003"));
        assert_eq!(sighting.population, Some(120));
        assert_eq!(sighting.region, None);
    }
}
