//! Persisted snapshot cache.
//!
//! A single JSON blob holding the durable subset of the store. Alerts and
//! live connection flags are deliberately left out; only the operator's
//! offline-mode choice survives a restart.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;

use crate::error::Result;
use crate::models::{
    Case, Colony, EntityCollection, MovementPath, Outbreak, Record, Sighting, WeatherReading,
};
use crate::store::EntityStore;

/// Fixed storage name of the cache blob.
pub const CACHE_FILE_NAME: &str = "sentinel-store.json";

const WRITE_DEBOUNCE: Duration = Duration::from_millis(500);

/// The persisted subset of the store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CachedSnapshot {
    #[serde(default)]
    pub sightings: Vec<Sighting>,
    #[serde(default)]
    pub cases: Vec<Case>,
    #[serde(default)]
    pub weather_readings: Vec<WeatherReading>,
    #[serde(default)]
    pub colonies: Vec<Colony>,
    #[serde(default)]
    pub paths: Vec<MovementPath>,
    #[serde(default)]
    pub outbreaks: Vec<Outbreak>,
    #[serde(default)]
    pub is_offline_mode: bool,
}

impl CachedSnapshot {
    pub fn from_store(store: &EntityStore) -> Self {
        let snapshot = store.snapshot();
        Self {
            sightings: snapshot.sightings,
            cases: snapshot.cases,
            weather_readings: snapshot.weather_readings,
            colonies: snapshot.colonies,
            paths: snapshot.paths,
            outbreaks: snapshot.outbreaks,
            is_offline_mode: snapshot.status.is_offline_mode,
        }
    }

    /// True when the blob carries no entity data.
    pub fn is_empty(&self) -> bool {
        self.sightings.is_empty()
            && self.cases.is_empty()
            && self.weather_readings.is_empty()
            && self.colonies.is_empty()
            && self.paths.is_empty()
            && self.outbreaks.is_empty()
    }

    /// Write every cached collection into the store and restore offline mode
    /// if it was set. A cleared flag never overrides an offline mode already
    /// chosen for this session.
    ///
    /// Records that fail validation are dropped; the blob is treated as
    /// untrusted input like any other boundary.
    pub fn apply_to(self, store: &EntityStore) {
        store.replace(EntityCollection::Sightings(retain_valid(self.sightings)));
        store.replace(EntityCollection::Cases(retain_valid(self.cases)));
        store.replace(EntityCollection::WeatherReadings(retain_valid(
            self.weather_readings,
        )));
        store.replace(EntityCollection::Colonies(retain_valid(self.colonies)));
        store.replace(EntityCollection::MovementPaths(retain_valid(self.paths)));
        store.replace(EntityCollection::Outbreaks(retain_valid(self.outbreaks)));
        if self.is_offline_mode {
            store.set_offline_mode(true);
        }
    }
}

fn retain_valid<T: Record>(records: Vec<T>) -> Vec<T> {
    records
        .into_iter()
        .filter(|record| record.validate().is_ok())
        .collect()
}

/// File-backed cache at a fixed path.
#[derive(Debug, Clone)]
pub struct PersistedCache {
    path: PathBuf,
}

impl PersistedCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Cache rooted in a directory, using the fixed file name.
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        Self::new(dir.as_ref().join(CACHE_FILE_NAME))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the blob. Missing file is `Ok(None)`.
    ///
    /// An unparseable blob is moved aside to `<name>.corrupt-<millis>` so the
    /// next write starts clean, and the parse error is returned.
    pub fn load(&self) -> Result<Option<CachedSnapshot>> {
        if !self.path.exists() {
            return Ok(None);
        }

        let raw = std::fs::read_to_string(&self.path)?;
        match serde_json::from_str::<CachedSnapshot>(&raw) {
            Ok(snapshot) => Ok(Some(snapshot)),
            Err(error) => {
                self.quarantine()?;
                Err(error.into())
            }
        }
    }

    /// Write the blob atomically (temp file + rename).
    pub fn save(&self, snapshot: &CachedSnapshot) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let serialized = serde_json::to_vec(snapshot)?;
        let temp_path = self.path.with_extension("json.tmp");
        std::fs::write(&temp_path, serialized)?;
        std::fs::rename(&temp_path, &self.path)?;
        Ok(())
    }

    /// Delete the blob. Returns whether a file was removed.
    pub fn clear(&self) -> Result<bool> {
        if !self.path.exists() {
            return Ok(false);
        }
        std::fs::remove_file(&self.path)?;
        Ok(true)
    }

    /// Best-effort rehydration; returns whether any entity data was restored.
    pub fn rehydrate(&self, store: &EntityStore) -> bool {
        match self.load() {
            Ok(Some(snapshot)) => {
                let restored = !snapshot.is_empty();
                tracing::info!(
                    "Rehydrated store from cache at {} (offline_mode={})",
                    self.path.display(),
                    snapshot.is_offline_mode
                );
                snapshot.apply_to(store);
                restored
            }
            Ok(None) => {
                tracing::debug!("No cache found at {}", self.path.display());
                false
            }
            Err(error) => {
                tracing::warn!(
                    "Ignoring unreadable cache at {}: {}",
                    self.path.display(),
                    error
                );
                false
            }
        }
    }

    /// Persist the store's current state, logging instead of failing.
    pub fn flush(&self, store: &EntityStore) {
        if let Err(error) = self.save(&CachedSnapshot::from_store(store)) {
            tracing::warn!("Failed to write cache at {}: {}", self.path.display(), error);
        }
    }

    /// Spawn a task that writes the cache after store mutations.
    ///
    /// Bursts of mutations within the debounce window coalesce into one write.
    /// The task ends when the store is dropped.
    pub fn spawn_writer(&self, store: Arc<EntityStore>) -> JoinHandle<()> {
        let cache = self.clone();
        let mut revisions = store.subscribe();
        let store = Arc::downgrade(&store);

        tokio::spawn(async move {
            while revisions.changed().await.is_ok() {
                tokio::time::sleep(WRITE_DEBOUNCE).await;
                revisions.borrow_and_update();

                let Some(store) = store.upgrade() else {
                    break;
                };
                let snapshot = CachedSnapshot::from_store(&store);
                drop(store);

                let writer = cache.clone();
                let result = tokio::task::spawn_blocking(move || writer.save(&snapshot)).await;
                match result {
                    Ok(Ok(())) => tracing::debug!("Cache written to {}", cache.path.display()),
                    Ok(Err(error)) => tracing::warn!("Failed to write cache: {}", error),
                    Err(error) => tracing::warn!("Cache writer task failed: {}", error),
                }
            }
        })
    }

    fn quarantine(&self) -> Result<()> {
        let timestamp = chrono::Utc::now().timestamp_millis();
        let file_name = self
            .path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or(CACHE_FILE_NAME);
        let backup_path = self
            .path
            .with_file_name(format!("{file_name}.corrupt-{timestamp}"));
        std::fs::rename(&self.path, &backup_path)?;
        tracing::warn!(
            "Moved corrupted cache from {} to {}",
            self.path.display(),
            backup_path.display()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Alert, AlertSeverity, EntityId, EntityRecord};
    use chrono::Utc;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    fn sample_sighting(id: &str, latitude: f64) -> Sighting {
        Sighting {
            id: EntityId::from(id),
            colony_ref: None,
            latitude,
            longitude: 76.0,
            observed_at: Utc::now(),
            population: Some(40),
            region: None,
        }
    }

    #[test]
    fn save_then_load_preserves_subset() {
        let dir = tempdir().unwrap();
        let cache = PersistedCache::in_dir(dir.path());

        let store = EntityStore::new();
        store.append(EntityRecord::Sighting(sample_sighting("s-1", 11.0)));
        store.append(EntityRecord::Alert(Alert::new(
            AlertSeverity::Info,
            "not persisted",
            None,
        )));
        store.set_offline_mode(true);

        cache.save(&CachedSnapshot::from_store(&store)).unwrap();
        let loaded = cache.load().unwrap().unwrap();

        assert_eq!(loaded.sightings.len(), 1);
        assert!(loaded.is_offline_mode);

        let raw = std::fs::read_to_string(cache.path()).unwrap();
        assert!(!raw.contains("alerts"));
        assert!(!raw.contains("is_connected"));
    }

    #[test]
    fn missing_cache_loads_as_none() {
        let dir = tempdir().unwrap();
        let cache = PersistedCache::in_dir(dir.path());
        assert!(cache.load().unwrap().is_none());
        assert!(!cache.clear().unwrap());
    }

    #[test]
    fn corrupted_cache_is_quarantined() {
        let dir = tempdir().unwrap();
        let cache = PersistedCache::in_dir(dir.path());
        std::fs::write(cache.path(), b"{not json").unwrap();

        assert!(cache.load().is_err());
        assert!(!cache.path().exists());

        let quarantined = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(std::result::Result::ok)
            .any(|entry| {
                entry
                    .file_name()
                    .to_string_lossy()
                    .starts_with("sentinel-store.json.corrupt-")
            });
        assert!(quarantined);
    }

    #[test]
    fn rehydrate_drops_invalid_records() {
        let dir = tempdir().unwrap();
        let cache = PersistedCache::in_dir(dir.path());
        let snapshot = CachedSnapshot {
            sightings: vec![sample_sighting("ok", 11.0), sample_sighting("bad", 123.0)],
            ..Default::default()
        };
        cache.save(&snapshot).unwrap();

        let store = EntityStore::new();
        assert!(cache.rehydrate(&store));
        let sightings = store.sightings();
        assert_eq!(sightings.len(), 1);
        assert_eq!(sightings[0].id.as_str(), "ok");
    }

    #[tokio::test]
    async fn writer_persists_mutations() {
        let dir = tempdir().unwrap();
        let cache = PersistedCache::in_dir(dir.path());
        let store = Arc::new(EntityStore::new());
        let writer = cache.spawn_writer(Arc::clone(&store));

        store.append(EntityRecord::Sighting(sample_sighting("s-1", 11.0)));

        let mut persisted = None;
        for _ in 0..40 {
            tokio::time::sleep(Duration::from_millis(100)).await;
            if let Ok(Some(snapshot)) = cache.load() {
                persisted = Some(snapshot);
                break;
            }
        }
        writer.abort();

        assert_eq!(persisted.map(|snapshot| snapshot.sightings.len()), Some(1));
    }
}
