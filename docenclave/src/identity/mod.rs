//! Identities and the identity-provider seam.
//!
//! The identity provider is an external collaborator: it signs users in,
//! hands out anonymous sessions, and announces every identity change.
//! [`AuthService`] sits on top of it and derives the caller's tier.

mod auth;
mod local;

pub use auth::AuthService;
pub use local::LocalIdentityProvider;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::error::Result;

/// The current user, as reported by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    /// Provider-assigned unique id.
    pub id: String,
    /// Display name, if the provider has one.
    pub display_name: Option<String>,
    /// Email address, if the provider has one.
    pub email: Option<String>,
    /// Avatar URL, if the provider has one.
    pub photo_url: Option<String>,
    /// Set for implicit anonymous sessions.
    pub is_anonymous: bool,
}

impl Identity {
    /// An anonymous session.
    pub fn anonymous(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: None,
            email: None,
            photo_url: None,
            is_anonymous: true,
        }
    }

    /// A signed-in account.
    pub fn authenticated(id: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: None,
            email: Some(email.into()),
            photo_url: None,
            is_anonymous: false,
        }
    }

    /// Set the display name.
    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    /// Name to greet the user with.
    pub fn label(&self) -> &str {
        self.display_name
            .as_deref()
            .or(self.email.as_deref())
            .unwrap_or(if self.is_anonymous { "Guest" } else { "User" })
    }
}

/// External identity service.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Interactive sign-in (account chooser, popup, ...).
    async fn sign_in_interactive(&self) -> Result<Identity>;

    /// Start an anonymous session.
    async fn sign_in_anonymously(&self) -> Result<Identity>;

    /// End the current session.
    async fn sign_out(&self) -> Result<()>;

    /// Stream of the current identity; `None` when signed out.
    fn watch_identity(&self) -> watch::Receiver<Option<Identity>>;
}
