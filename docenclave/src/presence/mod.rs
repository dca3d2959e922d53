//! Presence: who is connected right now.
//!
//! Each application instance registers one [`ActiveSession`] record and renews
//! it on a heartbeat timer. Any instance may expire records whose heartbeat is
//! older than the staleness threshold; there is no intermediate state between
//! active and expired.

mod tracker;

pub use tracker::{CleanupTask, PresenceTracker, SessionHandle};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique id of one connected session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(Uuid);

impl SessionId {
    /// Fresh random id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A presence record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveSession {
    /// Owner of the record.
    pub session_id: SessionId,
    /// When the session registered.
    pub connected_at: DateTime<Utc>,
    /// Last renewal.
    pub last_heartbeat: DateTime<Utc>,
}

impl ActiveSession {
    /// Record for a session connecting at `at`.
    pub fn new(session_id: SessionId, at: DateTime<Utc>) -> Self {
        Self {
            session_id,
            connected_at: at,
            last_heartbeat: at,
        }
    }

    /// Same record, renewed at `at`.
    pub fn renewed(&self, at: DateTime<Utc>) -> Self {
        Self {
            last_heartbeat: at,
            ..self.clone()
        }
    }

    /// Check whether the record is stale at `cutoff`.
    pub fn is_stale(&self, cutoff: DateTime<Utc>) -> bool {
        self.last_heartbeat < cutoff
    }
}
