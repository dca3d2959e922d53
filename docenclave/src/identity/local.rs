use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::watch;
use tracing::debug;
use uuid::Uuid;

use super::{Identity, IdentityProvider};
use crate::error::{DocEnclaveError, Result};

/// In-process identity provider.
///
/// Interactive sign-in succeeds with the account configured through
/// [`LocalIdentityProvider::with_account`]; anonymous sessions get a fresh
/// UUID. [`LocalIdentityProvider::set_reachable`] simulates an outage.
#[derive(Debug)]
pub struct LocalIdentityProvider {
    account: Option<Identity>,
    current: watch::Sender<Option<Identity>>,
    reachable: AtomicBool,
}

impl LocalIdentityProvider {
    /// Provider with nobody signed in and no interactive account.
    pub fn new() -> Self {
        let (current, _) = watch::channel(None);
        Self {
            account: None,
            current,
            reachable: AtomicBool::new(true),
        }
    }

    /// Account returned by interactive sign-in.
    pub fn with_account(mut self, account: Identity) -> Self {
        self.account = Some(account);
        self
    }

    /// Toggle whether the service answers.
    pub fn set_reachable(&self, reachable: bool) {
        self.reachable.store(reachable, Ordering::SeqCst);
    }

    fn ensure_reachable(&self) -> Result<()> {
        if self.reachable.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(DocEnclaveError::auth_failed("identity service unreachable"))
        }
    }
}

impl Default for LocalIdentityProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl IdentityProvider for LocalIdentityProvider {
    async fn sign_in_interactive(&self) -> Result<Identity> {
        self.ensure_reachable()?;
        let account = self
            .account
            .clone()
            .ok_or_else(|| DocEnclaveError::auth_failed("no account available for sign-in"))?;

        debug!(id = %account.id, "signed in");
        self.current.send_replace(Some(account.clone()));
        Ok(account)
    }

    async fn sign_in_anonymously(&self) -> Result<Identity> {
        self.ensure_reachable()?;
        let identity = Identity::anonymous(Uuid::new_v4().to_string());

        debug!(id = %identity.id, "anonymous session started");
        self.current.send_replace(Some(identity.clone()));
        Ok(identity)
    }

    async fn sign_out(&self) -> Result<()> {
        self.ensure_reachable()?;
        self.current.send_replace(None);
        Ok(())
    }

    fn watch_identity(&self) -> watch::Receiver<Option<Identity>> {
        self.current.subscribe()
    }
}
