//! In-process backend used by tests, demos, and the CLI's local mode.
//!
//! Supports per-kind fetch failure injection and manual pushes to
//! subscribers.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::{Backend, Connector, InsertEvent, Subscription, SubscriptionId, EVENT_BUFFER};
use crate::error::{Error, Result};
use crate::models::EntityKind;

/// In-memory tables plus subscriber registry.
#[derive(Default)]
pub struct MemoryBackend {
    tables: Mutex<HashMap<EntityKind, Vec<serde_json::Value>>>,
    failing: Mutex<HashSet<EntityKind>>,
    subscribers: Mutex<HashMap<SubscriptionId, (EntityKind, mpsc::Sender<InsertEvent>)>>,
    next_id: AtomicU64,
    fetches: AtomicUsize,
    fail_unsubscribe: AtomicBool,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the rows returned for a kind.
    pub fn set_rows(&self, kind: EntityKind, rows: Vec<serde_json::Value>) {
        lock(&self.tables).insert(kind, rows);
    }

    /// Make every fetch of `kind` fail until [`MemoryBackend::heal`] is called.
    pub fn fail_kind(&self, kind: EntityKind) {
        lock(&self.failing).insert(kind);
    }

    pub fn heal(&self, kind: EntityKind) {
        lock(&self.failing).remove(&kind);
    }

    /// Make `unsubscribe` report an error (the channel is still closed).
    pub fn fail_unsubscribe(&self, fail: bool) {
        self.fail_unsubscribe.store(fail, Ordering::SeqCst);
    }

    /// Deliver an insert event to every subscriber of `kind`.
    ///
    /// Returns the number of subscribers that received it.
    pub async fn push(&self, kind: EntityKind, payload: serde_json::Value) -> usize {
        let senders: Vec<mpsc::Sender<InsertEvent>> = lock(&self.subscribers)
            .values()
            .filter(|(subscribed, _)| *subscribed == kind)
            .map(|(_, sender)| sender.clone())
            .collect();

        let mut delivered = 0;
        for sender in senders {
            let event = InsertEvent {
                kind,
                payload: payload.clone(),
            };
            if sender.send(event).await.is_ok() {
                delivered += 1;
            }
        }
        delivered
    }

    pub fn subscriber_count(&self) -> usize {
        lock(&self.subscribers).len()
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Backend for MemoryBackend {
    async fn fetch(
        &self,
        kind: EntityKind,
        limit: Option<usize>,
    ) -> Result<Vec<serde_json::Value>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if lock(&self.failing).contains(&kind) {
            return Err(Error::Backend(format!("{} fetch failed", kind.table())));
        }

        let mut rows = lock(&self.tables).get(&kind).cloned().unwrap_or_default();
        if let Some(limit) = limit {
            rows.truncate(limit);
        }
        Ok(rows)
    }

    async fn subscribe(&self, kind: EntityKind) -> Result<Subscription> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let (sender, events) = mpsc::channel(EVENT_BUFFER);
        lock(&self.subscribers).insert(id, (kind, sender));
        Ok(Subscription { id, kind, events })
    }

    async fn unsubscribe(&self, id: SubscriptionId) -> Result<()> {
        let removed = lock(&self.subscribers).remove(&id);
        if removed.is_none() {
            return Err(Error::SubscriptionNotFound(id));
        }
        if self.fail_unsubscribe.load(Ordering::SeqCst) {
            return Err(Error::Backend(format!("unsubscribe {id} failed")));
        }
        Ok(())
    }
}

/// Connector handing out a shared [`MemoryBackend`], with switchable
/// availability and an optional artificial connect latency.
pub struct MemoryConnector {
    backend: Arc<MemoryBackend>,
    available: AtomicBool,
    latency: Mutex<Option<Duration>>,
    attempts: AtomicUsize,
}

impl MemoryConnector {
    pub fn new(backend: Arc<MemoryBackend>) -> Self {
        Self {
            backend,
            available: AtomicBool::new(true),
            latency: Mutex::new(None),
            attempts: AtomicUsize::new(0),
        }
    }

    /// A connector whose backend is unreachable until made available.
    pub fn unavailable(backend: Arc<MemoryBackend>) -> Self {
        let connector = Self::new(backend);
        connector.set_available(false);
        connector
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    pub fn set_latency(&self, latency: Option<Duration>) {
        *lock(&self.latency) = latency;
    }

    /// Number of `connect` calls so far.
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn backend(&self) -> Arc<MemoryBackend> {
        Arc::clone(&self.backend)
    }
}

#[async_trait]
impl Connector for MemoryConnector {
    async fn connect(&self) -> Result<Arc<dyn Backend>> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let latency = *lock(&self.latency);
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        if !self.available.load(Ordering::SeqCst) {
            return Err(Error::Backend("backend unreachable".to_string()));
        }
        Ok(Arc::clone(&self.backend) as Arc<dyn Backend>)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
