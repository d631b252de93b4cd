//! Data models for Sentinel

mod alert;
mod case;
mod colony;
mod ids;
mod kind;
mod outbreak;
mod sighting;
mod weather;

pub use alert::{Alert, AlertSeverity};
pub use case::Case;
pub use colony::{Colony, MovementPath, RiskTier};
pub use ids::EntityId;
pub use kind::{EntityCollection, EntityKind, EntityRecord, Record};
pub use outbreak::{Outbreak, OutbreakStatus};
pub use sighting::Sighting;
pub use weather::WeatherReading;
