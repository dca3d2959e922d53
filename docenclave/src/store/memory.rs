use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::watch;

use super::{Counter, RemoteStore};
use crate::error::{DocEnclaveError, Result};
use crate::presence::{ActiveSession, SessionId};
use crate::stats::GlobalStats;

struct Shared {
    online: AtomicBool,
    stats: watch::Sender<GlobalStats>,
    presence: Mutex<HashMap<SessionId, ActiveSession>>,
    presence_count: watch::Sender<usize>,
}

/// In-process stand-in for the remote store.
///
/// Clones share one underlying store, so each clone behaves like a separate
/// client connected to the same backend.
#[derive(Clone)]
pub struct InMemoryStore {
    shared: Arc<Shared>,
}

impl InMemoryStore {
    /// Empty, reachable store.
    pub fn new() -> Self {
        Self::with_stats(GlobalStats::default())
    }

    /// Reachable store seeded with `stats`.
    pub fn with_stats(stats: GlobalStats) -> Self {
        let (stats, _) = watch::channel(stats);
        let (presence_count, _) = watch::channel(0);
        Self {
            shared: Arc::new(Shared {
                online: AtomicBool::new(true),
                stats,
                presence: Mutex::new(HashMap::new()),
                presence_count,
            }),
        }
    }

    /// Simulate losing or regaining the connection.
    pub fn set_online(&self, online: bool) {
        self.shared.online.store(online, Ordering::SeqCst);
    }

    /// Current counters, regardless of connectivity.
    pub fn snapshot(&self) -> GlobalStats {
        self.shared.stats.borrow().clone()
    }

    /// Current presence records, regardless of connectivity.
    pub fn presence_records(&self) -> Vec<ActiveSession> {
        self.shared.presence.lock().values().cloned().collect()
    }

    fn ensure_online(&self) -> Result<()> {
        if self.shared.online.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(DocEnclaveError::store_unavailable("connection lost"))
        }
    }

    fn publish_presence_count(&self, records: &HashMap<SessionId, ActiveSession>) {
        let count = records.len();
        self.shared.presence_count.send_if_modified(|current| {
            let changed = *current != count;
            *current = count;
            changed
        });
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for InMemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryStore")
            .field("online", &self.shared.online.load(Ordering::SeqCst))
            .field("stats", &*self.shared.stats.borrow())
            .field("presence", &*self.shared.presence_count.borrow())
            .finish()
    }
}

#[async_trait]
impl RemoteStore for InMemoryStore {
    async fn load_stats(&self) -> Result<GlobalStats> {
        self.ensure_online()?;
        Ok(self.snapshot())
    }

    async fn increment(&self, counter: &Counter, delta: u64) -> Result<()> {
        self.ensure_online()?;
        // send_modify holds the channel's write lock for the whole update.
        self.shared
            .stats
            .send_modify(|stats| stats.apply(counter, delta));
        Ok(())
    }

    async fn watch_stats(&self) -> Result<watch::Receiver<GlobalStats>> {
        self.ensure_online()?;
        Ok(self.shared.stats.subscribe())
    }

    async fn put_presence(&self, session: &ActiveSession) -> Result<()> {
        self.ensure_online()?;
        let mut records = self.shared.presence.lock();
        records.insert(session.session_id, session.clone());
        self.publish_presence_count(&records);
        Ok(())
    }

    async fn remove_presence(&self, session_id: &SessionId) -> Result<()> {
        self.ensure_online()?;
        let mut records = self.shared.presence.lock();
        records.remove(session_id);
        self.publish_presence_count(&records);
        Ok(())
    }

    async fn expire_presence(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        self.ensure_online()?;
        let mut records = self.shared.presence.lock();
        let before = records.len();
        records.retain(|_, session| !session.is_stale(cutoff));
        let removed = before - records.len();
        if removed > 0 {
            self.publish_presence_count(&records);
        }
        Ok(removed)
    }

    async fn watch_presence_count(&self) -> Result<watch::Receiver<usize>> {
        self.ensure_online()?;
        Ok(self.shared.presence_count.subscribe())
    }
}
