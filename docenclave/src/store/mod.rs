//! The remote real-time store seam.
//!
//! Counters are only ever changed through atomic increments; nobody writes an
//! absolute value. Presence records are written by their owning session and
//! expired by whichever client runs the cleanup.

mod memory;

pub use memory::InMemoryStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::fmt;
use tokio::sync::watch;

use crate::error::{DocEnclaveError, Result};
use crate::presence::{ActiveSession, SessionId};
use crate::stats::GlobalStats;
use crate::tools::ToolId;

/// A named counter in the shared stats tree.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Counter {
    /// `stats/visits`
    Visits,
    /// `stats/filesDownloaded`
    FilesDownloaded,
    /// `stats/toolsUsed`
    ToolsUsed,
    /// `stats/totalUsers`
    TotalUsers,
    /// `stats/toolUsage/<toolId>`
    ToolUsage(ToolId),
}

impl Counter {
    /// Path of the counter in the store.
    pub fn path(&self) -> String {
        match self {
            Counter::Visits => "stats/visits".to_string(),
            Counter::FilesDownloaded => "stats/filesDownloaded".to_string(),
            Counter::ToolsUsed => "stats/toolsUsed".to_string(),
            Counter::TotalUsers => "stats/totalUsers".to_string(),
            Counter::ToolUsage(tool) => format!("stats/toolUsage/{tool}"),
        }
    }
}

impl fmt::Display for Counter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path())
    }
}

/// Remote live key/value store shared by every client.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Read the current counters once.
    async fn load_stats(&self) -> Result<GlobalStats>;

    /// Atomically add `delta` to `counter`.
    ///
    /// Concurrent increments from any number of clients all land.
    async fn increment(&self, counter: &Counter, delta: u64) -> Result<()>;

    /// Live view of the counters, pushed by the store on every change.
    async fn watch_stats(&self) -> Result<watch::Receiver<GlobalStats>>;

    /// Create or renew the presence record of `session.session_id`.
    async fn put_presence(&self, session: &ActiveSession) -> Result<()>;

    /// Delete a presence record. Deleting a missing record is not an error.
    async fn remove_presence(&self, session_id: &SessionId) -> Result<()>;

    /// Delete every record whose last heartbeat is before `cutoff`.
    ///
    /// Returns how many records were removed.
    async fn expire_presence(&self, cutoff: DateTime<Utc>) -> Result<usize>;

    /// Live number of presence records.
    async fn watch_presence_count(&self) -> Result<watch::Receiver<usize>>;
}

/// A store that is never reachable.
///
/// Hosts without a remote backend use it; every service then runs in its
/// local fallback mode.
#[derive(Debug, Default, Clone, Copy)]
pub struct OfflineStore;

impl OfflineStore {
    fn unavailable<T>() -> Result<T> {
        Err(DocEnclaveError::store_unavailable(
            "no remote store configured",
        ))
    }
}

#[async_trait]
impl RemoteStore for OfflineStore {
    async fn load_stats(&self) -> Result<GlobalStats> {
        Self::unavailable()
    }

    async fn increment(&self, _counter: &Counter, _delta: u64) -> Result<()> {
        Self::unavailable()
    }

    async fn watch_stats(&self) -> Result<watch::Receiver<GlobalStats>> {
        Self::unavailable()
    }

    async fn put_presence(&self, _session: &ActiveSession) -> Result<()> {
        Self::unavailable()
    }

    async fn remove_presence(&self, _session_id: &SessionId) -> Result<()> {
        Self::unavailable()
    }

    async fn expire_presence(&self, _cutoff: DateTime<Utc>) -> Result<usize> {
        Self::unavailable()
    }

    async fn watch_presence_count(&self) -> Result<watch::Receiver<usize>> {
        Self::unavailable()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_counter_paths() {
        assert_eq!(Counter::Visits.path(), "stats/visits");
        assert_eq!(Counter::FilesDownloaded.path(), "stats/filesDownloaded");
        assert_eq!(Counter::ToolsUsed.to_string(), "stats/toolsUsed");
        assert_eq!(Counter::TotalUsers.path(), "stats/totalUsers");
        assert_eq!(
            Counter::ToolUsage(ToolId::from("pdf-merge")).path(),
            "stats/toolUsage/pdf-merge"
        );
    }

    #[tokio::test]
    async fn test_offline_store_is_unreachable() {
        let store = OfflineStore;
        let err = store.load_stats().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Connectivity);
        assert!(store.increment(&Counter::Visits, 1).await.is_err());
        assert!(store.watch_presence_count().await.is_err());
    }
}
