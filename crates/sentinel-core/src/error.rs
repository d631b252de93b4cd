//! Error types for sentinel-core

use thiserror::Error;

use crate::models::EntityKind;

/// Result type alias using sentinel-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in sentinel-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// Backend rejected or failed a request
    #[error("Backend error: {0}")]
    Backend(String),

    /// HTTP transport error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A record failed boundary validation
    #[error("Invalid {kind} record: {reason}")]
    InvalidRecord { kind: EntityKind, reason: String },

    /// No backend credentials/endpoint are available
    #[error("Backend is not configured: {0}")]
    NotConfigured(String),

    /// Invalid configuration value
    #[error("Configuration error: {0}")]
    Config(String),

    /// A connection attempt was overtaken by offline mode or teardown
    #[error("Connection attempt cancelled: {0}")]
    Cancelled(String),

    /// Unsubscribe was called for an unknown subscription
    #[error("Subscription not found: {0}")]
    SubscriptionNotFound(u64),
}

impl Error {
    pub(crate) fn invalid(kind: EntityKind, reason: impl Into<String>) -> Self {
        Self::InvalidRecord {
            kind,
            reason: reason.into(),
        }
    }
}
