//! Colony and movement path models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::kind::validate_coordinates;
use super::{EntityId, EntityKind, Record};
use crate::error::{Error, Result};
use crate::util::{deserialize_optional_timestamp, deserialize_timestamp};

/// Spillover risk tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskTier {
    Low,
    #[serde(alias = "medium")]
    Moderate,
    High,
}

/// A long-lived roost whose risk tier drifts over time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Colony {
    pub id: EntityId,
    /// Human-facing colony reference, e.g. `COL-014`
    #[serde(alias = "colony_id")]
    pub colony_ref: String,
    #[serde(alias = "lat")]
    pub latitude: f64,
    #[serde(alias = "lon", alias = "lng")]
    pub longitude: f64,
    #[serde(alias = "date", deserialize_with = "deserialize_timestamp")]
    pub surveyed_on: DateTime<Utc>,
    #[serde(alias = "population_count")]
    pub population: u32,
    #[serde(alias = "risk_level")]
    pub risk: RiskTier,
    #[serde(default, deserialize_with = "deserialize_optional_timestamp")]
    pub last_active: Option<DateTime<Utc>>,
}

impl Record for Colony {
    const KIND: EntityKind = EntityKind::Colony;

    fn validate(&self) -> Result<()> {
        if self.colony_ref.trim().is_empty() {
            return Err(Error::invalid(Self::KIND, "colony reference must not be empty"));
        }
        validate_coordinates(Self::KIND, self.latitude, self.longitude)
    }
}

/// A directed movement edge between two colonies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MovementPath {
    pub id: EntityId,
    #[serde(alias = "from_colony_id")]
    pub from_colony: String,
    #[serde(alias = "to_colony_id")]
    pub to_colony: String,
    /// Relative traffic along the path, 0.0 to 1.0
    pub intensity: f64,
    #[serde(default)]
    pub active: bool,
    #[serde(alias = "date", deserialize_with = "deserialize_timestamp")]
    pub observed_on: DateTime<Utc>,
}

impl Record for MovementPath {
    const KIND: EntityKind = EntityKind::MovementPath;

    fn validate(&self) -> Result<()> {
        if !self.intensity.is_finite() || self.intensity < 0.0 {
            return Err(Error::invalid(
                Self::KIND,
                format!("intensity {} must be finite and non-negative", self.intensity),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn risk_tier_accepts_medium_alias() {
        let tier: RiskTier = serde_json::from_str(r#""medium""#).unwrap();
        assert_eq!(tier, RiskTier::Moderate);
        assert!(RiskTier::High > RiskTier::Moderate);
    }

    #[test]
    fn colony_last_active_is_optional() {
        let colony = Colony::parse(json!({
            "id": "c1",
            "colony_id": "COL-001",
            "lat": 11.6,
            "lon": 76.1,
            "date": "2024-01-10",
            "population_count": 800,
            "risk_level": "high",
            "last_active": null
        }))
        .unwrap();
        assert_eq!(colony.risk, RiskTier::High);
        assert!(colony.last_active.is_none());
    }

    #[test]
    fn path_rejects_negative_intensity() {
        let result = MovementPath::parse(json!({
            "id": "p1",
            "from_colony": "COL-001",
            "to_colony": "COL-002",
            "intensity": -0.5,
            "date": "2024-01-10"
        }));
        assert!(result.is_err());
    }
}
