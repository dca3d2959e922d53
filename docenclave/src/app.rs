//! Application wiring.
//!
//! [`AppServices`] owns every long-lived service of one application instance.
//! Hosts build it once at startup from a [`Config`] and a [`Backend`], pass it
//! (or the pieces they need) to their views, and call
//! [`AppServices::shutdown`] when the instance goes away.

use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, instrument, warn};

use crate::analytics::{AnalyticsSink, TracingAnalytics};
use crate::clock::{Clock, SystemClock};
use crate::config::Config;
use crate::error::{DocEnclaveError, Result};
use crate::identity::{AuthService, IdentityProvider, LocalIdentityProvider};
use crate::merge::MergeTool;
use crate::presence::{CleanupTask, PresenceTracker, SessionHandle};
use crate::stats::{GlobalStats, StatsSynchronizer, SyncMode};
use crate::storage::{FileStorage, KeyValueStorage};
use crate::store::{OfflineStore, RemoteStore};
use crate::tier::{Tier, TierResolver};

/// External collaborators of an application instance.
#[derive(Clone)]
pub struct Backend {
    /// Shared real-time store.
    pub store: Arc<dyn RemoteStore>,
    /// On-device key/value storage.
    pub storage: Arc<dyn KeyValueStorage>,
    /// Identity service.
    pub identity: Arc<dyn IdentityProvider>,
    /// Time source.
    pub clock: Arc<dyn Clock>,
    /// Analytics destination.
    pub analytics: Arc<dyn AnalyticsSink>,
}

impl Backend {
    /// Backend without a remote store, keeping state in `storage_dir`.
    pub fn offline(storage_dir: impl Into<PathBuf>, identity: LocalIdentityProvider) -> Self {
        Self {
            store: Arc::new(OfflineStore),
            storage: Arc::new(FileStorage::new(storage_dir)),
            identity: Arc::new(identity),
            clock: Arc::new(SystemClock),
            analytics: Arc::new(TracingAnalytics),
        }
    }
}

/// Snapshot of the usage dashboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Dashboard {
    /// Global counters.
    pub stats: GlobalStats,
    /// Sessions currently connected, `None` when unknown.
    pub active_users: Option<usize>,
    /// Size of the tool catalog.
    pub tools_available: usize,
    /// Whether the counters are live or cached on this device.
    pub mode: SyncMode,
    /// Tier of the current user.
    pub tier: Tier,
}

impl Dashboard {
    /// Check whether the numbers are live.
    pub fn is_live(&self) -> bool {
        self.mode == SyncMode::Connected
    }
}

/// Every service of one running application instance.
pub struct AppServices {
    config: Config,
    auth: Arc<AuthService>,
    stats: Arc<StatsSynchronizer>,
    presence: Arc<PresenceTracker>,
    analytics: Arc<dyn AnalyticsSink>,
    session: Option<SessionHandle>,
    cleanup: Option<CleanupTask>,
}

impl AppServices {
    /// Validate `config` and start every service.
    ///
    /// Counts one visit, registers this instance as active, and starts the
    /// presence cleanup timer. Connectivity problems only degrade the
    /// services; only an invalid configuration fails.
    #[instrument(skip_all)]
    pub async fn start(config: Config, backend: Backend) -> Result<Self> {
        config
            .validate()
            .map_err(|err| DocEnclaveError::invalid_config(err.to_string()))?;

        let auth = Arc::new(AuthService::new(
            backend.identity,
            TierResolver::new(config.admin_email.clone()),
        ));

        let stats = Arc::new(
            StatsSynchronizer::start(
                Arc::clone(&backend.store),
                backend.storage,
                &config.storage_key,
            )
            .await,
        );
        if let Err(err) = stats.record_visit().await {
            warn!(error = %err, "failed to record visit");
        }

        let presence = Arc::new(
            PresenceTracker::start(backend.store, backend.clock, config.presence).await,
        );
        let session = presence.register_active_session().await;
        let cleanup = presence
            .is_enabled()
            .then(|| presence.spawn_cleanup(config.presence.cleanup_interval));

        info!(
            mode = %stats.mode(),
            presence = presence.is_enabled(),
            "application services started"
        );

        Ok(Self {
            config,
            auth,
            stats,
            presence,
            analytics: backend.analytics,
            session,
            cleanup,
        })
    }

    /// Active configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Authentication service.
    pub fn auth(&self) -> &Arc<AuthService> {
        &self.auth
    }

    /// Stats synchronizer.
    pub fn stats(&self) -> &Arc<StatsSynchronizer> {
        &self.stats
    }

    /// Presence tracker.
    pub fn presence(&self) -> &Arc<PresenceTracker> {
        &self.presence
    }

    /// Presence handle of this instance, if registered.
    pub fn session(&self) -> Option<&SessionHandle> {
        self.session.as_ref()
    }

    /// Open the merge tool bound to these services.
    pub fn merge_tool(&self) -> MergeTool {
        MergeTool::new(
            Arc::clone(&self.auth),
            self.stats.clone(),
            Arc::clone(&self.analytics),
        )
    }

    /// Current dashboard numbers.
    pub fn dashboard(&self) -> Dashboard {
        Dashboard {
            stats: self.stats.current_stats(),
            active_users: self.presence.active_count(),
            tools_available: self.config.tools_available,
            mode: self.stats.mode(),
            tier: self.auth.tier(),
        }
    }

    /// Stop timers and release this instance's presence record.
    pub async fn shutdown(mut self) -> Result<()> {
        if let Some(cleanup) = self.cleanup.take() {
            cleanup.stop();
        }

        if let Some(session) = self.session.take() {
            session.release().await?;
        }

        info!("application services stopped");
        Ok(())
    }
}

impl std::fmt::Debug for AppServices {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppServices")
            .field("config", &self.config)
            .field("stats", &self.stats)
            .field("presence", &self.presence)
            .finish_non_exhaustive()
    }
}
