use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, instrument, warn};

use super::{Identity, IdentityProvider};
use crate::error::Result;
use crate::subscription::Subscription;
use crate::tier::{Tier, TierProfile, TierResolver};

struct TierCache {
    rx: watch::Receiver<Option<Identity>>,
    identity: Option<Identity>,
    tier: Tier,
}

/// Authentication state of one application instance.
///
/// The tier is derived from the provider's identity stream and recomputed
/// only when that stream reports a change.
pub struct AuthService {
    provider: Arc<dyn IdentityProvider>,
    resolver: TierResolver,
    cache: Mutex<TierCache>,
}

impl AuthService {
    /// Wrap `provider`, resolving tiers with `resolver`.
    pub fn new(provider: Arc<dyn IdentityProvider>, resolver: TierResolver) -> Self {
        let mut rx = provider.watch_identity();
        let identity = rx.borrow_and_update().clone();
        let tier = resolver.resolve(identity.as_ref());

        Self {
            provider,
            resolver,
            cache: Mutex::new(TierCache { rx, identity, tier }),
        }
    }

    fn with_cache<R>(&self, read: impl FnOnce(&TierCache) -> R) -> R {
        let mut cache = self.cache.lock();
        if cache.rx.has_changed().unwrap_or(false) {
            let identity = cache.rx.borrow_and_update().clone();
            cache.tier = self.resolver.resolve(identity.as_ref());
            cache.identity = identity;
        }
        read(&cache)
    }

    /// Identity currently signed in, if any.
    pub fn current_identity(&self) -> Option<Identity> {
        self.with_cache(|cache| cache.identity.clone())
    }

    /// Tier of the current identity.
    pub fn tier(&self) -> Tier {
        self.with_cache(|cache| cache.tier)
    }

    /// Capability profile of the current identity.
    pub fn limits(&self) -> &'static TierProfile {
        self.tier().profile()
    }

    /// Check whether the current tier may open `tool_id`.
    pub fn can_use(&self, tool_id: &str) -> bool {
        self.limits().tools_access.allows(tool_id)
    }

    /// Call `callback` with the current identity and on every change.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: FnMut(Option<Identity>) + Send + 'static,
    {
        Subscription::watch_with(self.provider.watch_identity(), callback)
    }

    /// Interactive sign-in.
    #[instrument(skip(self))]
    pub async fn sign_in_interactive(&self) -> Result<Identity> {
        let identity = self.provider.sign_in_interactive().await.inspect_err(|err| {
            warn!(error = %err, "interactive sign-in failed");
        })?;
        info!(id = %identity.id, tier = %self.tier(), "signed in");
        Ok(identity)
    }

    /// Start an anonymous session.
    #[instrument(skip(self))]
    pub async fn sign_in_anonymously(&self) -> Result<Identity> {
        self.provider.sign_in_anonymously().await.inspect_err(|err| {
            warn!(error = %err, "anonymous sign-in failed");
        })
    }

    /// Sign out. The tier falls back to anonymous.
    #[instrument(skip(self))]
    pub async fn sign_out(&self) -> Result<()> {
        self.provider.sign_out().await.inspect_err(|err| {
            warn!(error = %err, "sign-out failed");
        })
    }
}

impl std::fmt::Debug for AuthService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthService")
            .field("resolver", &self.resolver)
            .field("tier", &self.tier())
            .finish_non_exhaustive()
    }
}
