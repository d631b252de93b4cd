//! sentinel-core - Core library for Sentinel
//!
//! Live entity synchronization for a zoonotic-outbreak monitoring dashboard:
//! an in-memory entity store fed by a remote backend, with cache and
//! synthetic fallbacks, plus a pure spatiotemporal outbreak detector used by
//! both the engine and the CLI.

pub mod backend;
pub mod cache;
pub mod config;
pub mod detect;
pub mod error;
pub mod fallback;
pub mod models;
pub mod regions;
pub mod state;
pub mod store;
pub mod sync;
pub mod util;

pub use config::{BackendConfig, DetectorConfig, EngineConfig};
pub use detect::{detect_outbreaks, Observation};
pub use error::{Error, Result};
pub use models::{EntityId, EntityKind};
pub use state::ConnectionState;
pub use store::EntityStore;
pub use sync::{ReconnectOutcome, SyncEngine, SyncHandle};
