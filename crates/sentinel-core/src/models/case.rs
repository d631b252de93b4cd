//! Disease case model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::kind::validate_coordinates;
use super::{EntityId, EntityKind, Record};
use crate::error::{Error, Result};
use crate::util::deserialize_timestamp;

/// A reported disease case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Case {
    pub id: EntityId,
    #[serde(alias = "lat")]
    pub latitude: f64,
    #[serde(alias = "lon", alias = "lng")]
    pub longitude: f64,
    #[serde(alias = "date", deserialize_with = "deserialize_timestamp")]
    pub reported_on: DateTime<Utc>,
    /// Clinical severity, 1 (mild) to 5 (fatal)
    pub severity: u8,
    /// Laboratory confirmed
    #[serde(default)]
    pub confirmed: bool,
    #[serde(default)]
    pub region: Option<String>,
}

impl Record for Case {
    const KIND: EntityKind = EntityKind::Case;

    fn validate(&self) -> Result<()> {
        validate_coordinates(Self::KIND, self.latitude, self.longitude)?;
        if !(1..=5).contains(&self.severity) {
            return Err(Error::invalid(
                Self::KIND,
                format!("severity {} outside 1-5", self.severity),
            ));
        }
        Ok(())
    }
}
