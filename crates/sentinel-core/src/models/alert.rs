//! Operator alert model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{EntityId, EntityKind, Record};
use crate::error::{Error, Result};
use crate::util::deserialize_timestamp;

/// Alert severity class
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertSeverity {
    Info,
    Warning,
    Critical,
}

/// An operator-facing notification.
///
/// The only entity with an in-place mutation: `acknowledged` goes from
/// `false` to `true` once and never back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alert {
    pub id: EntityId,
    pub severity: AlertSeverity,
    pub message: String,
    #[serde(alias = "timestamp", deserialize_with = "deserialize_timestamp")]
    pub raised_at: DateTime<Utc>,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub acknowledged: bool,
}

impl Alert {
    /// Create a new, unacknowledged alert raised now
    #[must_use]
    pub fn new(severity: AlertSeverity, message: impl Into<String>, region: Option<String>) -> Self {
        Self {
            id: EntityId::generate("alert"),
            severity,
            message: message.into(),
            raised_at: Utc::now(),
            region,
            acknowledged: false,
        }
    }
}

impl Record for Alert {
    const KIND: EntityKind = EntityKind::Alert;

    fn validate(&self) -> Result<()> {
        if self.message.trim().is_empty() {
            return Err(Error::invalid(Self::KIND, "message must not be empty"));
        }
        Ok(())
    }
}
