//! Initial concurrent load of every bootstrap kind.

use crate::backend::Backend;
use crate::error::Result;
use crate::models::{EntityCollection, EntityKind};
use crate::store::EntityStore;

/// Outcome of one bootstrap pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BootstrapReport {
    /// Kinds whose fetch succeeded, with the number of valid records
    pub loaded: Vec<(EntityKind, usize)>,
    /// Kinds whose fetch failed
    pub failed: Vec<EntityKind>,
}

impl BootstrapReport {
    pub fn total_records(&self) -> usize {
        self.loaded.iter().map(|(_, count)| count).sum()
    }

    /// No fetch produced any record.
    pub fn is_empty(&self) -> bool {
        self.total_records() == 0
    }

    pub fn replaced(&self, kind: EntityKind) -> bool {
        !self.is_empty() && self.loaded.iter().any(|(loaded, _)| *loaded == kind)
    }
}

/// Fetch all bootstrap kinds concurrently and replace the collections that
/// loaded.
///
/// Fetches are independent: a failure is logged and leaves that kind's
/// collection untouched. When no fetch yields a record the store is left
/// entirely unchanged so the caller can fall back to cached or synthetic
/// data.
pub async fn load(backend: &dyn Backend, store: &EntityStore, history_limit: usize) -> BootstrapReport {
    let [colony, sighting, case, path, outbreak, weather] = EntityKind::BOOTSTRAP;
    let results = tokio::join!(
        fetch_kind(backend, colony, history_limit),
        fetch_kind(backend, sighting, history_limit),
        fetch_kind(backend, case, history_limit),
        fetch_kind(backend, path, history_limit),
        fetch_kind(backend, outbreak, history_limit),
        fetch_kind(backend, weather, history_limit),
    );
    let results = [results.0, results.1, results.2, results.3, results.4, results.5];

    let mut report = BootstrapReport::default();
    let mut collections = Vec::with_capacity(results.len());
    for (kind, result) in results {
        match result {
            Ok(collection) => {
                report.loaded.push((kind, collection.len()));
                collections.push(collection);
            }
            Err(error) => {
                tracing::warn!("Bootstrap fetch for {kind} failed: {error}");
                report.failed.push(kind);
            }
        }
    }

    if report.is_empty() {
        tracing::warn!(
            "Bootstrap produced no records ({} of {} fetches failed)",
            report.failed.len(),
            EntityKind::BOOTSTRAP.len()
        );
        return report;
    }

    for collection in collections {
        store.replace(collection);
    }
    tracing::info!(
        "Bootstrap loaded {} records across {} kinds",
        report.total_records(),
        report.loaded.len()
    );
    report
}

/// Row cap for a kind: time-series history is capped, reference data is not.
pub const fn fetch_limit(kind: EntityKind, history_limit: usize) -> Option<usize> {
    match kind {
        EntityKind::Sighting | EntityKind::Case | EntityKind::WeatherReading => Some(history_limit),
        _ => None,
    }
}

async fn fetch_kind(
    backend: &dyn Backend,
    kind: EntityKind,
    history_limit: usize,
) -> (EntityKind, Result<EntityCollection>) {
    let result = backend
        .fetch(kind, fetch_limit(kind, history_limit))
        .await
        .map(|rows| EntityCollection::parse_rows(kind, rows));
    (kind, result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::memory::MemoryBackend;
    use crate::models::{Case, Record};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn colony_row(id: &str) -> serde_json::Value {
        json!({
            "id": id,
            "colony_id": format!("COL-{id}"),
            "latitude": 11.25,
            "longitude": 75.78,
            "surveyed_on": "2024-05-01",
            "population": 300,
            "risk": "high"
        })
    }

    fn case_row(id: &str) -> serde_json::Value {
        json!({
            "id": id,
            "latitude": 9.98,
            "longitude": 76.28,
            "reported_on": "2024-05-02",
            "severity": 2
        })
    }

    #[tokio::test]
    async fn partial_failure_replaces_only_loaded_kinds() {
        let backend = MemoryBackend::new();
        backend.set_rows(EntityKind::Colony, vec![colony_row("a"), colony_row("b")]);
        backend.set_rows(EntityKind::Case, vec![case_row("c")]);
        backend.fail_kind(EntityKind::Sighting);

        let store = EntityStore::new();
        let report = load(&backend, &store, 100).await;

        assert_eq!(report.failed, vec![EntityKind::Sighting]);
        assert_eq!(report.total_records(), 3);
        assert!(report.replaced(EntityKind::Case));
        assert!(!report.replaced(EntityKind::Sighting));
        assert_eq!(store.colonies().len(), 2);
        assert_eq!(store.cases().len(), 1);
        assert!(store.sightings().is_empty());
    }

    #[tokio::test]
    async fn empty_bootstrap_leaves_store_untouched() {
        let backend = MemoryBackend::new();
        for kind in EntityKind::BOOTSTRAP {
            backend.fail_kind(kind);
        }
        backend.heal(EntityKind::Colony);

        let store = EntityStore::new();
        store.replace(EntityCollection::Cases(vec![
            Case::parse(case_row("cached")).unwrap()
        ]));
        let revision = store.revision();

        let report = load(&backend, &store, 100).await;
        assert!(report.is_empty());
        assert_eq!(report.failed.len(), 5);
        assert_eq!(store.revision(), revision);
        assert_eq!(store.cases().len(), 1);
    }

    #[tokio::test]
    async fn invalid_rows_are_dropped_individually() {
        let backend = MemoryBackend::new();
        backend.set_rows(
            EntityKind::Case,
            vec![case_row("ok"), json!({ "id": "bad", "latitude": 200.0 })],
        );

        let store = EntityStore::new();
        let report = load(&backend, &store, 100).await;
        assert!(report.loaded.contains(&(EntityKind::Case, 1)));
        assert_eq!(store.cases().len(), 1);
    }

    #[test]
    fn history_kinds_are_capped() {
        assert_eq!(fetch_limit(EntityKind::Case, 100), Some(100));
        assert_eq!(fetch_limit(EntityKind::Sighting, 50), Some(50));
        assert_eq!(fetch_limit(EntityKind::Colony, 100), None);
        assert_eq!(fetch_limit(EntityKind::Outbreak, 100), None);
    }
}
