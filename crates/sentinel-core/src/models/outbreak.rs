//! Outbreak model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::kind::validate_coordinates;
use super::{EntityId, EntityKind, Record};
use crate::error::{Error, Result};
use crate::util::deserialize_timestamp;

/// Outbreak lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutbreakStatus {
    Active,
    Contained,
    Resolved,
}

/// A localized case-density spike, either pushed by the backend or derived
/// by the outbreak detector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Outbreak {
    pub id: EntityId,
    /// Centroid latitude
    #[serde(alias = "lat")]
    pub latitude: f64,
    /// Centroid longitude
    #[serde(alias = "lon", alias = "lng")]
    pub longitude: f64,
    #[serde(alias = "start_date", deserialize_with = "deserialize_timestamp")]
    pub start: DateTime<Utc>,
    #[serde(alias = "end_date", deserialize_with = "deserialize_timestamp")]
    pub end: DateTime<Utc>,
    pub case_count: u32,
    /// 0 (negligible) to 5
    pub severity: u8,
    pub status: OutbreakStatus,
    #[serde(default, alias = "colony_id")]
    pub colony_ref: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
}

impl Record for Outbreak {
    const KIND: EntityKind = EntityKind::Outbreak;

    fn validate(&self) -> Result<()> {
        validate_coordinates(Self::KIND, self.latitude, self.longitude)?;
        if self.severity > 5 {
            return Err(Error::invalid(
                Self::KIND,
                format!("severity {} above 5", self.severity),
            ));
        }
        if self.end < self.start {
            return Err(Error::invalid(Self::KIND, "end precedes start"));
        }
        Ok(())
    }
}
