//! Backend abstraction: per-kind fetch and insert-event subscriptions.
//!
//! The engine never constructs a client itself; it asks a [`Connector`] for
//! one on every connection attempt, so credentials and transport are
//! injected rather than held in global state.

mod http;
pub mod memory;

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::Result;
use crate::models::EntityKind;

pub use http::{HttpBackend, HttpConnector};

/// Identifier of a live subscription, unique per backend.
pub type SubscriptionId = u64;

/// Capacity of each subscription's event queue.
pub const EVENT_BUFFER: usize = 256;

/// A backend-pushed insert, carrying the new row as untyped JSON.
#[derive(Debug, Clone, PartialEq)]
pub struct InsertEvent {
    pub kind: EntityKind,
    pub payload: serde_json::Value,
}

/// A live insert channel for one entity kind.
///
/// Events arrive in delivery order on `events`.
#[derive(Debug)]
pub struct Subscription {
    pub id: SubscriptionId,
    pub kind: EntityKind,
    pub events: mpsc::Receiver<InsertEvent>,
}

/// Remote data source.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Fetch rows of one kind, newest first, optionally capped.
    async fn fetch(&self, kind: EntityKind, limit: Option<usize>)
        -> Result<Vec<serde_json::Value>>;

    /// Open an insert-event channel for one kind.
    async fn subscribe(&self, kind: EntityKind) -> Result<Subscription>;

    /// Close a channel opened by [`Backend::subscribe`].
    async fn unsubscribe(&self, id: SubscriptionId) -> Result<()>;
}

/// Factory for backend clients.
///
/// Failing to connect (missing credentials, unreachable host) is reported
/// as an error and treated by the engine as a connection failure.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self) -> Result<Arc<dyn Backend>>;
}
