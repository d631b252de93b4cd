//! Entity identifiers

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use uuid::Uuid;

/// Identifier of any stored entity.
///
/// Backends hand out either text or integer keys; both are normalized to
/// their string form. Locally generated ids are `<prefix>-<uuid v7>` so they
/// sort by creation time within a prefix.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct EntityId(String);

impl EntityId {
    /// Create a new unique, time-sortable id with the given prefix
    #[must_use]
    pub fn generate(prefix: &str) -> Self {
        Self(format!("{prefix}-{}", Uuid::now_v7()))
    }

    /// Get the string representation of this ID
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for EntityId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for EntityId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
    Text(String),
    Integer(i64),
}

impl<'de> Deserialize<'de> for EntityId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let id = match RawId::deserialize(deserializer)? {
            RawId::Text(text) => text.trim().to_string(),
            RawId::Integer(value) => value.to_string(),
        };
        if id.is_empty() {
            return Err(serde::de::Error::custom("id must not be empty"));
        }
        Ok(Self(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_ids_are_unique_and_prefixed() {
        let first = EntityId::generate("alert");
        let second = EntityId::generate("alert");
        assert_ne!(first, second);
        assert!(first.as_str().starts_with("alert-"));
    }

    #[test]
    fn integer_ids_deserialize_as_text() {
        let id: EntityId = serde_json::from_str("42").unwrap();
        assert_eq!(id.as_str(), "42");
    }

    #[test]
    fn blank_ids_are_rejected() {
        assert!(serde_json::from_str::<EntityId>(r#""  ""#).is_err());
    }
}
