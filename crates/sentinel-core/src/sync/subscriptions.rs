//! Push subscriptions and the shared ingest path.

use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::backend::{Backend, InsertEvent, Subscription, SubscriptionId};
use crate::models::{Alert, AlertSeverity, Case, EntityKind, EntityRecord, Sighting};
use crate::regions;
use crate::store::EntityStore;

/// A live subscription plus the task draining its events into the store.
pub(crate) struct AttachedSubscription {
    pub id: SubscriptionId,
    pub kind: EntityKind,
    pub pump: JoinHandle<()>,
}

/// Subscribe to every pushable kind. Kinds that fail to subscribe are
/// logged and skipped.
pub(crate) async fn attach(
    backend: &dyn Backend,
    store: &Arc<EntityStore>,
) -> Vec<AttachedSubscription> {
    let mut attached = Vec::with_capacity(EntityKind::PUSHABLE.len());
    for kind in EntityKind::PUSHABLE {
        match backend.subscribe(kind).await {
            Ok(subscription) => attached.push(spawn_pump(subscription, Arc::clone(store))),
            Err(error) => tracing::warn!("Failed to subscribe to {kind} inserts: {error}"),
        }
    }
    tracing::debug!("Attached {} push subscriptions", attached.len());
    attached
}

fn spawn_pump(subscription: Subscription, store: Arc<EntityStore>) -> AttachedSubscription {
    let Subscription {
        id,
        kind,
        mut events,
    } = subscription;

    let pump = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            ingest_event(&store, event);
        }
        tracing::debug!(subscription = id, "Insert stream for {kind} closed");
    });

    AttachedSubscription { id, kind, pump }
}

/// Validate a pushed payload and ingest it. Invalid payloads are dropped.
pub fn ingest_event(store: &EntityStore, event: InsertEvent) -> bool {
    match EntityRecord::parse(event.kind, event.payload) {
        Ok(record) => {
            ingest_record(store, record);
            true
        }
        Err(error) => {
            tracing::warn!("Dropping pushed {} row: {error}", event.kind);
            false
        }
    }
}

/// Append a record and raise the alert it implies, if any.
pub fn ingest_record(store: &EntityStore, record: EntityRecord) {
    let alert = alert_for(&record);
    store.append(record);
    if let Some(alert) = alert {
        store.append(EntityRecord::Alert(alert));
    }
}

/// Alert raised for a newly inserted record.
///
/// Sightings raise `info`, confirmed cases `critical`, suspected cases
/// `warning`. Other kinds raise nothing.
pub fn alert_for(record: &EntityRecord) -> Option<Alert> {
    match record {
        EntityRecord::Sighting(sighting) => Some(sighting_alert(sighting)),
        EntityRecord::Case(case) => Some(case_alert(case)),
        _ => None,
    }
}

fn sighting_alert(sighting: &Sighting) -> Alert {
    let region = region_label(sighting.region.as_deref(), sighting.latitude, sighting.longitude);
    let message = match sighting.population {
        Some(population) => format!("Bat sighting in {region} (about {population} individuals)"),
        None => format!("Bat sighting in {region}"),
    };
    Alert::new(AlertSeverity::Info, message, Some(region))
}

fn case_alert(case: &Case) -> Alert {
    let region = region_label(case.region.as_deref(), case.latitude, case.longitude);
    if case.confirmed {
        Alert::new(
            AlertSeverity::Critical,
            format!("Confirmed case in {region} (severity {})", case.severity),
            Some(region),
        )
    } else {
        Alert::new(
            AlertSeverity::Warning,
            format!("Suspected case in {region} (severity {})", case.severity),
            Some(region),
        )
    }
}

fn region_label(region: Option<&str>, latitude: f64, longitude: f64) -> String {
    region
        .map(str::trim)
        .filter(|region| !region.is_empty())
        .map_or_else(
            || regions::nearest(latitude, longitude).name.to_string(),
            ToString::to_string,
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn case_payload(id: &str, confirmed: bool) -> serde_json::Value {
        json!({
            "id": id,
            "latitude": 11.25,
            "longitude": 75.78,
            "reported_on": "2024-06-01T08:00:00Z",
            "severity": 4,
            "confirmed": confirmed,
            "region": "Kozhikode"
        })
    }

    #[test]
    fn confirmed_case_raises_critical_alert() {
        let store = EntityStore::new();
        assert!(ingest_event(
            &store,
            InsertEvent {
                kind: EntityKind::Case,
                payload: case_payload("c-1", true),
            }
        ));

        let alerts = store.alerts();
        assert_eq!(store.cases().len(), 1);
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].severity, AlertSeverity::Critical);
        assert_eq!(alerts[0].region.as_deref(), Some("Kozhikode"));
        assert!(!alerts[0].acknowledged);
    }

    #[test]
    fn unconfirmed_case_raises_warning() {
        let store = EntityStore::new();
        ingest_event(
            &store,
            InsertEvent {
                kind: EntityKind::Case,
                payload: case_payload("c-2", false),
            },
        );
        assert_eq!(store.alerts()[0].severity, AlertSeverity::Warning);
    }

    #[test]
    fn sighting_without_region_uses_nearest() {
        let store = EntityStore::new();
        ingest_event(
            &store,
            InsertEvent {
                kind: EntityKind::Sighting,
                payload: json!({
                    "id": "s-1",
                    "lat": 9.97,
                    "lng": 76.29,
                    "timestamp": "2024-06-01T08:00:00Z"
                }),
            },
        );
        let alerts = store.alerts();
        assert_eq!(alerts[0].severity, AlertSeverity::Info);
        assert_eq!(alerts[0].region.as_deref(), Some("Ernakulam"));
    }

    #[test]
    fn weather_reading_raises_no_alert() {
        let store = EntityStore::new();
        ingest_event(
            &store,
            InsertEvent {
                kind: EntityKind::WeatherReading,
                payload: json!({
                    "region": "Wayanad",
                    "temperature_c": 24.5,
                    "humidity_pct": 80.0,
                    "rainfall_mm": 12.0,
                    "wind_speed_kmh": 9.0,
                    "recorded_at": "2024-06-01T08:00:00Z"
                }),
            },
        );
        assert_eq!(store.weather_readings().len(), 1);
        assert!(store.alerts().is_empty());
    }

    #[test]
    fn malformed_payload_is_dropped() {
        let store = EntityStore::new();
        let accepted = ingest_event(
            &store,
            InsertEvent {
                kind: EntityKind::Case,
                payload: json!({ "id": "c-3", "latitude": "north" }),
            },
        );
        assert!(!accepted);
        assert!(store.has_no_entities());
        assert!(store.alerts().is_empty());
    }
}
