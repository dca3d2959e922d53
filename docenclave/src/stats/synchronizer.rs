use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::{Mutex, watch};
use tracing::{debug, info, instrument, warn};

use super::{GlobalStats, SyncMode, UsageRecorder};
use crate::error::Result;
use crate::storage::{self, KeyValueStorage};
use crate::store::{Counter, RemoteStore};
use crate::subscription::Subscription;
use crate::tools::ToolId;

enum SyncState {
    Connected {
        live: watch::Receiver<GlobalStats>,
    },
    Degraded {
        local: watch::Sender<GlobalStats>,
    },
}

/// Process-wide view of the global counters.
///
/// The mode is decided once in [`StatsSynchronizer::start`] and never changes
/// afterwards. In degraded mode every delta is also buffered under
/// `<storage_key>.pending`; the next instance that connects claims the buffer
/// and replays it as atomic increments before serving. Deltas a connected
/// instance fails to send are buffered the same way.
pub struct StatsSynchronizer {
    store: Arc<dyn RemoteStore>,
    storage: Arc<dyn KeyValueStorage>,
    storage_key: String,
    state: SyncState,
    // Serializes local writes and pending-buffer updates.
    writes: Mutex<()>,
}

impl StatsSynchronizer {
    /// Connect to the remote counters, or fall back to on-device storage.
    ///
    /// Never fails: every connectivity problem ends in degraded mode.
    #[instrument(skip(store, storage))]
    pub async fn start(
        store: Arc<dyn RemoteStore>,
        storage: Arc<dyn KeyValueStorage>,
        storage_key: &str,
    ) -> Self {
        let state = match Self::connect(store.as_ref()).await {
            Ok(live) => {
                info!(mode = %SyncMode::Connected, "stats synchronizer started");
                SyncState::Connected { live }
            }
            Err(err) => {
                warn!(error = %err, "remote stats unavailable, using local storage");
                let snapshot = Self::load_local(storage.as_ref(), storage_key).await;
                let (local, _) = watch::channel(snapshot);
                SyncState::Degraded { local }
            }
        };

        let sync = Self {
            store,
            storage,
            storage_key: storage_key.to_string(),
            state,
            writes: Mutex::new(()),
        };

        if sync.is_connected() {
            sync.replay_pending().await;
        }

        sync
    }

    async fn connect(store: &dyn RemoteStore) -> Result<watch::Receiver<GlobalStats>> {
        let initial = store.load_stats().await?;
        debug!(?initial, "loaded remote stats");
        store.watch_stats().await
    }

    fn pending_key(&self) -> String {
        pending_key(&self.storage_key)
    }

    async fn load_local(storage: &dyn KeyValueStorage, key: &str) -> GlobalStats {
        match storage::load_json::<GlobalStats>(storage, key).await {
            Ok(value) => value.unwrap_or_default(),
            Err(err) => {
                warn!(key = %key, error = %err, "ignoring unreadable local stats");
                GlobalStats::default()
            }
        }
    }

    /// Send deltas buffered by earlier sessions.
    ///
    /// The buffer is claimed first, so two instances connecting at once never
    /// replay the same deltas. Whatever fails to send goes back into the
    /// buffer for the next connected session.
    async fn replay_pending(&self) {
        let _writes = self.writes.lock().await;
        let key = self.pending_key();
        let pending = match storage::take_json::<GlobalStats>(self.storage.as_ref(), &key).await {
            Ok(Some(pending)) if !pending.is_empty() => pending,
            Ok(_) => return,
            Err(err) => {
                warn!(key = %key, error = %err, "skipping pending stats");
                return;
            }
        };

        let mut remaining = Vec::new();
        for (counter, delta) in pending.counters() {
            if remaining.is_empty() {
                match self.store.increment(&counter, delta).await {
                    Ok(()) => continue,
                    Err(err) => warn!(%counter, error = %err, "replay interrupted"),
                }
            }
            remaining.push((counter, delta));
        }

        if remaining.is_empty() {
            info!("replayed offline stats");
        } else {
            self.add_pending(&remaining).await;
        }
    }

    /// Merge `deltas` into the pending buffer. Callers hold `writes`.
    async fn add_pending(&self, deltas: &[(Counter, u64)]) {
        let storage = self.storage.as_ref();
        let key = self.pending_key();
        let mut pending = match storage::load_json::<GlobalStats>(storage, &key).await {
            Ok(pending) => pending.unwrap_or_default(),
            Err(err) => {
                warn!(key = %key, error = %err, "replacing unreadable pending stats");
                GlobalStats::default()
            }
        };
        for (counter, delta) in deltas {
            pending.apply(counter, *delta);
        }
        if let Err(err) = storage::store_json(storage, &key, &pending).await {
            warn!(key = %key, error = %err, "failed to persist pending stats");
        }
    }

    /// Current mode.
    pub fn mode(&self) -> SyncMode {
        match self.state {
            SyncState::Connected { .. } => SyncMode::Connected,
            SyncState::Degraded { .. } => SyncMode::Degraded,
        }
    }

    /// Check whether the remote store is in use.
    pub fn is_connected(&self) -> bool {
        self.mode() == SyncMode::Connected
    }

    /// Current snapshot.
    ///
    /// In connected mode this is the last value pushed by the store.
    pub fn current_stats(&self) -> GlobalStats {
        match &self.state {
            SyncState::Connected { live } => live.borrow().clone(),
            SyncState::Degraded { local, .. } => local.borrow().clone(),
        }
    }

    /// Call `callback` with the current snapshot and on every change.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: FnMut(GlobalStats) + Send + 'static,
    {
        let rx = match &self.state {
            SyncState::Connected { live } => live.clone(),
            SyncState::Degraded { local, .. } => local.subscribe(),
        };
        Subscription::watch_with(rx, callback)
    }

    /// Add `count` processed files.
    pub async fn increment_files_processed(&self, count: u64) -> Result<()> {
        self.record(&[(Counter::FilesDownloaded, count)]).await
    }

    /// Add `count` uses of `tool`, both to the total and to the tool's own
    /// counter.
    ///
    /// The two counters are separate increments. If the second one fails in
    /// connected mode, it is buffered for replay and the error is returned,
    /// so the totals catch up once a later session connects.
    pub async fn increment_tools_used(&self, count: u64, tool: &ToolId) -> Result<()> {
        self.record(&[
            (Counter::ToolsUsed, count),
            (Counter::ToolUsage(tool.clone()), count),
        ])
        .await
    }

    /// Count one visit.
    pub async fn record_visit(&self) -> Result<()> {
        self.record(&[(Counter::Visits, 1)]).await
    }

    /// Add `count` happy users.
    pub async fn increment_total_users(&self, count: u64) -> Result<()> {
        self.record(&[(Counter::TotalUsers, count)]).await
    }

    async fn record(&self, deltas: &[(Counter, u64)]) -> Result<()> {
        match &self.state {
            SyncState::Connected { .. } => {
                for (sent, (counter, delta)) in deltas.iter().enumerate() {
                    if let Err(err) = self.store.increment(counter, *delta).await {
                        warn!(
                            %counter,
                            sent,
                            unsent = deltas.len() - sent,
                            error = %err,
                            "increment failed, buffering unsent deltas"
                        );
                        let _writes = self.writes.lock().await;
                        self.add_pending(&deltas[sent..]).await;
                        return Err(err);
                    }
                }
                Ok(())
            }
            SyncState::Degraded { local } => {
                let _writes = self.writes.lock().await;
                local.send_modify(|stats| {
                    for (counter, delta) in deltas {
                        stats.apply(counter, *delta);
                    }
                });

                let snapshot = local.borrow().clone();
                let storage = self.storage.as_ref();
                if let Err(err) = storage::store_json(storage, &self.storage_key, &snapshot).await {
                    warn!(key = %self.storage_key, error = %err, "failed to persist local stats");
                }
                self.add_pending(deltas).await;
                Ok(())
            }
        }
    }
}

fn pending_key(storage_key: &str) -> String {
    format!("{storage_key}.pending")
}

#[async_trait]
impl UsageRecorder for StatsSynchronizer {
    async fn increment_files_processed(&self, count: u64) -> Result<()> {
        StatsSynchronizer::increment_files_processed(self, count).await
    }

    async fn increment_tools_used(&self, count: u64, tool: &ToolId) -> Result<()> {
        StatsSynchronizer::increment_tools_used(self, count, tool).await
    }
}

impl std::fmt::Debug for StatsSynchronizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatsSynchronizer")
            .field("mode", &self.mode())
            .field("storage_key", &self.storage_key)
            .finish_non_exhaustive()
    }
}
