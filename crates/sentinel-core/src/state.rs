//! Connectivity state shared by the engine and its consumers.

use std::fmt;

/// Connection state derived from the store's status flags.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    /// Operator-selected; sticky until explicitly disabled
    OfflineMode,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::OfflineMode => "offline",
        };
        f.write_str(label)
    }
}
