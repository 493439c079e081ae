//! Offline detection and state management.

use chrono::{DateTime, Utc};

// Re-export from shared types module
pub use crate::types::ConnectivityState;

/// Connectivity as observed by the last fetch.
///
/// A failed fetch marks the client offline and a successful one marks it
/// online again.
#[derive(Debug, Default)]
pub struct OfflineMode {
    state: ConnectivityState,
    last_synced_at: Option<DateTime<Utc>>,
    last_error: Option<String>,
}

impl OfflineMode {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> ConnectivityState {
        self.state
    }

    pub fn last_synced_at(&self) -> Option<DateTime<Utc>> {
        self.last_synced_at
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Mark the client as offline.
    pub fn set_offline(&mut self, reason: impl Into<String>) {
        self.state = ConnectivityState::Offline;
        self.last_error = Some(reason.into());
    }

    /// Mark the client as online after a successful sync.
    pub fn set_online(&mut self, at: DateTime<Utc>) {
        self.state = ConnectivityState::Online;
        self.last_synced_at = Some(at);
        self.last_error = None;
    }

    pub fn is_offline(&self) -> bool {
        self.state == ConnectivityState::Offline
    }
}
