use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tracing::{debug, info, instrument, warn};

use super::{ActiveSession, SessionId};
use crate::clock::Clock;
use crate::config::PresenceConfig;
use crate::error::{DocEnclaveError, ErrorKind, Result};
use crate::store::RemoteStore;
use crate::subscription::Subscription;

/// Registers this instance as active and counts everyone else.
///
/// If the store cannot be reached, at startup or later, the tracker disables
/// itself for the rest of the session: no record is written or renewed, the
/// active count is unknown (`None`), and cleanup does nothing.
pub struct PresenceTracker {
    store: Arc<dyn RemoteStore>,
    clock: Arc<dyn Clock>,
    config: PresenceConfig,
    count: Option<watch::Receiver<usize>>,
    // Only ever flips from `true` to `false`.
    enabled: Arc<watch::Sender<bool>>,
}

fn disable(enabled: &watch::Sender<bool>) {
    if enabled.send_if_modified(|on| std::mem::replace(on, false)) {
        warn!("presence disabled after store failure");
    }
}

fn note_failure(enabled: &watch::Sender<bool>, err: &DocEnclaveError) {
    if err.kind() == ErrorKind::Connectivity {
        disable(enabled);
    }
}

impl PresenceTracker {
    /// Subscribe to the live active count.
    ///
    /// Never fails; an unreachable store yields a disabled tracker.
    #[instrument(skip(store, clock))]
    pub async fn start(
        store: Arc<dyn RemoteStore>,
        clock: Arc<dyn Clock>,
        config: PresenceConfig,
    ) -> Self {
        let count = match store.watch_presence_count().await {
            Ok(rx) => Some(rx),
            Err(err) => {
                warn!(error = %err, "presence disabled");
                None
            }
        };

        let (enabled, _) = watch::channel(count.is_some());
        Self {
            store,
            clock,
            config,
            count,
            enabled: Arc::new(enabled),
        }
    }

    /// Check whether presence features are running.
    pub fn is_enabled(&self) -> bool {
        *self.enabled.borrow()
    }

    /// Register this instance.
    ///
    /// The record is written before the handle exists, so no renewal can
    /// overtake registration. Returns `None` when presence is disabled.
    pub async fn register_active_session(&self) -> Option<SessionHandle> {
        if !self.is_enabled() {
            return None;
        }

        let session = ActiveSession::new(SessionId::new(), self.clock.now());
        if let Err(err) = self.store.put_presence(&session).await {
            warn!(error = %err, "failed to register session");
            disable(&self.enabled);
            return None;
        }

        info!(session = %session.session_id, "session registered");
        Some(SessionHandle::spawn(
            Arc::clone(&self.store),
            Arc::clone(&self.clock),
            Arc::clone(&self.enabled),
            session,
            self.config.heartbeat_interval,
        ))
    }

    /// Live number of active sessions, `None` when unknown.
    pub fn active_count(&self) -> Option<usize> {
        if !self.is_enabled() {
            return None;
        }
        self.count.as_ref().map(|rx| *rx.borrow())
    }

    /// Call `callback` with the active count and on every change.
    ///
    /// A disabled tracker reports `None` once. If presence gets disabled later,
    /// subscribers receive a final `None`.
    pub fn subscribe_active_count<F>(&self, mut callback: F) -> Subscription
    where
        F: FnMut(Option<usize>) + Send + 'static,
    {
        let Some(mut count) = self.count.clone().filter(|_| self.is_enabled()) else {
            callback(None);
            return Subscription::inert();
        };

        let mut enabled = self.enabled.subscribe();
        Subscription::spawn(async move {
            loop {
                if !*enabled.borrow_and_update() {
                    callback(None);
                    break;
                }
                let current = *count.borrow_and_update();
                callback(Some(current));

                tokio::select! {
                    changed = count.changed() => if changed.is_err() { break },
                    changed = enabled.changed() => if changed.is_err() { break },
                }
            }
        })
    }

    fn cutoff(&self) -> DateTime<Utc> {
        let now = self.clock.now();
        chrono::Duration::from_std(self.config.staleness_threshold)
            .ok()
            .and_then(|threshold| now.checked_sub_signed(threshold))
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }

    /// Remove every record older than the staleness threshold.
    ///
    /// Idempotent. Returns how many records were removed. A connectivity
    /// failure disables presence.
    pub async fn cleanup_stale(&self) -> Result<usize> {
        if !self.is_enabled() {
            return Ok(0);
        }

        let removed = self
            .store
            .expire_presence(self.cutoff())
            .await
            .inspect_err(|err| note_failure(&self.enabled, err))?;
        if removed > 0 {
            debug!(removed, "expired stale sessions");
        }
        Ok(removed)
    }

    /// Run [`PresenceTracker::cleanup_stale`] every `every`.
    ///
    /// The first run happens one period after the call.
    pub fn spawn_cleanup(self: &Arc<Self>, every: Duration) -> CleanupTask {
        let tracker = Arc::clone(self);
        let task = tokio::spawn(async move {
            let mut ticks = interval_at(Instant::now() + every, every);
            ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticks.tick().await;
                if let Err(err) = tracker.cleanup_stale().await {
                    warn!(error = %err, "presence cleanup failed");
                }
            }
        });

        CleanupTask { task: Some(task) }
    }
}

impl std::fmt::Debug for PresenceTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PresenceTracker")
            .field("enabled", &self.is_enabled())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

struct SessionState {
    store: Arc<dyn RemoteStore>,
    clock: Arc<dyn Clock>,
    enabled: Arc<watch::Sender<bool>>,
    session_id: SessionId,
    // `None` once released.
    record: Mutex<Option<ActiveSession>>,
}

impl SessionState {
    fn is_enabled(&self) -> bool {
        *self.enabled.borrow()
    }

    async fn renew(&self) -> Result<()> {
        let mut record = self.record.lock().await;
        let Some(current) = record.as_ref() else {
            return Ok(());
        };
        if !self.is_enabled() {
            return Ok(());
        }

        let renewed = current.renewed(self.clock.now());
        self.store
            .put_presence(&renewed)
            .await
            .inspect_err(|err| note_failure(&self.enabled, err))?;
        *record = Some(renewed);
        Ok(())
    }
}

/// Ownership of this instance's presence record.
///
/// Dropping the handle stops the heartbeat; the record then expires through
/// the regular staleness cleanup. [`SessionHandle::release`] removes it at
/// once.
pub struct SessionHandle {
    state: Arc<SessionState>,
    heartbeat: Option<JoinHandle<()>>,
}

impl SessionHandle {
    fn spawn(
        store: Arc<dyn RemoteStore>,
        clock: Arc<dyn Clock>,
        enabled: Arc<watch::Sender<bool>>,
        session: ActiveSession,
        period: Duration,
    ) -> Self {
        let state = Arc::new(SessionState {
            store,
            clock,
            enabled,
            session_id: session.session_id,
            record: Mutex::new(Some(session)),
        });

        let beat = Arc::clone(&state);
        let heartbeat = tokio::spawn(async move {
            let mut ticks = interval_at(Instant::now() + period, period);
            ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticks.tick().await;
                if !beat.is_enabled() {
                    break;
                }
                if let Err(err) = beat.renew().await {
                    warn!(session = %beat.session_id, error = %err, "heartbeat failed");
                }
            }
        });

        Self {
            state,
            heartbeat: Some(heartbeat),
        }
    }

    /// Id of the registered session.
    pub fn session_id(&self) -> SessionId {
        self.state.session_id
    }

    /// Renew the record now.
    ///
    /// Does nothing after release or once presence is disabled. A
    /// connectivity failure disables presence.
    pub async fn heartbeat(&self) -> Result<()> {
        self.state.renew().await
    }

    /// Stop the heartbeat and delete the record.
    ///
    /// With presence disabled the record is left to expire.
    pub async fn release(mut self) -> Result<()> {
        self.stop_heartbeat();

        let mut record = self.state.record.lock().await;
        if record.take().is_some() && self.state.is_enabled() {
            self.state.store.remove_presence(&self.state.session_id).await?;
            info!(session = %self.state.session_id, "session released");
        }
        Ok(())
    }

    fn stop_heartbeat(&mut self) {
        if let Some(task) = self.heartbeat.take() {
            task.abort();
        }
    }
}

impl Drop for SessionHandle {
    fn drop(&mut self) {
        self.stop_heartbeat();
    }
}

impl std::fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionHandle")
            .field("session_id", &self.state.session_id)
            .finish_non_exhaustive()
    }
}

/// Handle of the repeating cleanup timer.
#[must_use = "dropping a CleanupTask stops the timer"]
#[derive(Debug)]
pub struct CleanupTask {
    task: Option<JoinHandle<()>>,
}

impl CleanupTask {
    /// Stop the timer.
    pub fn stop(mut self) {
        self.abort();
    }

    fn abort(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for CleanupTask {
    fn drop(&mut self) {
        self.abort();
    }
}
