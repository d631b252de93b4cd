//! In-memory entity store.
//!
//! The single source of truth for every live collection plus connectivity
//! metadata. Readers take cloned snapshots; writers go through the mutators,
//! each of which bumps `last_updated` and publishes a new revision on a
//! watch channel so observers can react without polling.

use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use tokio::sync::watch;

use crate::models::{
    Alert, Case, Colony, EntityCollection, EntityId, EntityKind, EntityRecord, MovementPath,
    Outbreak, Sighting, WeatherReading,
};
use crate::state::ConnectionState;

/// Connectivity and freshness metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreStatus {
    pub is_connected: bool,
    pub is_offline_mode: bool,
    /// A connection attempt is in flight
    pub connecting: bool,
    pub last_updated: DateTime<Utc>,
    pub last_connection_attempt: Option<DateTime<Utc>>,
}

impl Default for StoreStatus {
    fn default() -> Self {
        Self {
            is_connected: false,
            is_offline_mode: false,
            connecting: false,
            last_updated: DateTime::<Utc>::MIN_UTC,
            last_connection_attempt: None,
        }
    }
}

impl StoreStatus {
    pub const fn connection_state(&self) -> ConnectionState {
        if self.is_offline_mode {
            ConnectionState::OfflineMode
        } else if self.is_connected {
            ConnectionState::Connected
        } else if self.connecting {
            ConnectionState::Connecting
        } else {
            ConnectionState::Disconnected
        }
    }
}

/// A point-in-time copy of the whole store.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StoreSnapshot {
    pub sightings: Vec<Sighting>,
    pub cases: Vec<Case>,
    pub weather_readings: Vec<WeatherReading>,
    pub colonies: Vec<Colony>,
    pub paths: Vec<MovementPath>,
    pub outbreaks: Vec<Outbreak>,
    pub alerts: Vec<Alert>,
    pub status: StoreStatus,
}

impl StoreSnapshot {
    /// Number of records held for a kind.
    pub fn count(&self, kind: EntityKind) -> usize {
        match kind {
            EntityKind::Sighting => self.sightings.len(),
            EntityKind::Case => self.cases.len(),
            EntityKind::WeatherReading => self.weather_readings.len(),
            EntityKind::Colony => self.colonies.len(),
            EntityKind::MovementPath => self.paths.len(),
            EntityKind::Outbreak => self.outbreaks.len(),
            EntityKind::Alert => self.alerts.len(),
        }
    }

    /// True when none of the bootstrap kinds hold any data.
    pub fn has_no_entities(&self) -> bool {
        EntityKind::BOOTSTRAP
            .iter()
            .all(|kind| self.count(*kind) == 0)
    }
}

/// Thread-safe entity store.
pub struct EntityStore {
    state: RwLock<StoreSnapshot>,
    revision: watch::Sender<u64>,
}

impl Default for EntityStore {
    fn default() -> Self {
        Self::new()
    }
}

impl EntityStore {
    pub fn new() -> Self {
        let (revision, _) = watch::channel(0);
        Self {
            state: RwLock::new(StoreSnapshot::default()),
            revision,
        }
    }

    /// Prepend a single record to its collection (most-recent-first).
    pub fn append(&self, record: EntityRecord) {
        self.mutate(|state| match record {
            EntityRecord::Sighting(item) => state.sightings.insert(0, item),
            EntityRecord::Case(item) => state.cases.insert(0, item),
            EntityRecord::WeatherReading(item) => state.weather_readings.insert(0, item),
            EntityRecord::Colony(item) => state.colonies.insert(0, item),
            EntityRecord::MovementPath(item) => state.paths.insert(0, item),
            EntityRecord::Outbreak(item) => state.outbreaks.insert(0, item),
            EntityRecord::Alert(item) => state.alerts.insert(0, item),
        });
    }

    /// Replace a whole collection verbatim.
    pub fn replace(&self, collection: EntityCollection) {
        self.mutate(|state| match collection {
            EntityCollection::Sightings(items) => state.sightings = items,
            EntityCollection::Cases(items) => state.cases = items,
            EntityCollection::WeatherReadings(items) => state.weather_readings = items,
            EntityCollection::Colonies(items) => state.colonies = items,
            EntityCollection::MovementPaths(items) => state.paths = items,
            EntityCollection::Outbreaks(items) => state.outbreaks = items,
            EntityCollection::Alerts(items) => state.alerts = items,
        });
    }

    /// Mark an alert as acknowledged.
    ///
    /// Returns `false` when no alert has the id. Acknowledging twice is a no-op.
    pub fn acknowledge_alert(&self, id: &EntityId) -> bool {
        let already_acknowledged = {
            let state = self.read();
            match state.alerts.iter().find(|alert| &alert.id == id) {
                Some(alert) => alert.acknowledged,
                None => return false,
            }
        };
        if !already_acknowledged {
            self.mutate(|state| {
                if let Some(alert) = state.alerts.iter_mut().find(|alert| &alert.id == id) {
                    alert.acknowledged = true;
                }
            });
        }
        true
    }

    /// Set the connected flag; connecting clears offline mode.
    pub fn set_connected(&self, connected: bool) {
        self.mutate(|state| {
            state.status.is_connected = connected;
            if connected {
                state.status.is_offline_mode = false;
                state.status.connecting = false;
            }
        });
    }

    /// Set the offline-mode flag; entering offline mode clears the connected flag.
    pub fn set_offline_mode(&self, enabled: bool) {
        self.mutate(|state| {
            state.status.is_offline_mode = enabled;
            if enabled {
                state.status.is_connected = false;
            }
        });
    }

    /// Record the start of a connection attempt.
    pub fn begin_connection_attempt(&self) {
        self.mutate(|state| {
            state.status.connecting = true;
            state.status.last_connection_attempt = Some(Utc::now());
        });
    }

    /// Clear the in-flight attempt marker.
    pub fn end_connection_attempt(&self) {
        self.mutate(|state| state.status.connecting = false);
    }

    pub fn snapshot(&self) -> StoreSnapshot {
        self.read().clone()
    }

    pub fn status(&self) -> StoreStatus {
        self.read().status.clone()
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.read().status.connection_state()
    }

    pub fn is_connected(&self) -> bool {
        self.read().status.is_connected
    }

    pub fn is_offline_mode(&self) -> bool {
        self.read().status.is_offline_mode
    }

    pub fn last_updated(&self) -> DateTime<Utc> {
        self.read().status.last_updated
    }

    pub fn last_connection_attempt(&self) -> Option<DateTime<Utc>> {
        self.read().status.last_connection_attempt
    }

    pub fn sightings(&self) -> Vec<Sighting> {
        self.read().sightings.clone()
    }

    pub fn cases(&self) -> Vec<Case> {
        self.read().cases.clone()
    }

    pub fn weather_readings(&self) -> Vec<WeatherReading> {
        self.read().weather_readings.clone()
    }

    pub fn colonies(&self) -> Vec<Colony> {
        self.read().colonies.clone()
    }

    pub fn paths(&self) -> Vec<MovementPath> {
        self.read().paths.clone()
    }

    pub fn outbreaks(&self) -> Vec<Outbreak> {
        self.read().outbreaks.clone()
    }

    pub fn alerts(&self) -> Vec<Alert> {
        self.read().alerts.clone()
    }

    pub fn count(&self, kind: EntityKind) -> usize {
        self.read().count(kind)
    }

    pub fn has_no_entities(&self) -> bool {
        self.read().has_no_entities()
    }

    /// Subscribe to mutation notifications; the value is a revision counter.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }

    pub fn revision(&self) -> u64 {
        *self.revision.borrow()
    }

    fn mutate(&self, apply: impl FnOnce(&mut StoreSnapshot)) {
        {
            let mut state = self.write();
            apply(&mut state);
            let now = Utc::now();
            if now > state.status.last_updated {
                state.status.last_updated = now;
            }
        }
        self.revision.send_modify(|revision| *revision += 1);
    }

    fn read(&self) -> RwLockReadGuard<'_, StoreSnapshot> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, StoreSnapshot> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}
