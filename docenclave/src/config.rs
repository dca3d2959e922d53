//! Configuration module for docenclave.
//!
//! The host builds a [`Config`] (from flags, environment or defaults) and
//! validates it once before any service starts. Validation uses `anyhow`
//! internally; [`crate::app::AppServices::start`] turns a failure into
//! [`crate::DocEnclaveError::InvalidConfig`].

use anyhow::{Result, bail};
use std::time::Duration;

/// Administrator account recognized by default.
pub const DEFAULT_ADMIN_EMAIL: &str = "admin@docenclave.com";

/// On-device storage key of the degraded-mode stats snapshot.
pub const DEFAULT_STORAGE_KEY: &str = "docenclave-stats";

/// Timing of the presence subsystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PresenceConfig {
    /// A record whose last heartbeat is older than this is expired.
    pub staleness_threshold: Duration,

    /// How often a registered session renews its record.
    pub heartbeat_interval: Duration,

    /// How often stale records are collected.
    pub cleanup_interval: Duration,
}

impl Default for PresenceConfig {
    fn default() -> Self {
        Self {
            staleness_threshold: Duration::from_secs(5 * 60),
            heartbeat_interval: Duration::from_secs(60),
            cleanup_interval: Duration::from_secs(60),
        }
    }
}

impl PresenceConfig {
    /// Validate the timing values.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Any interval is zero
    /// - The heartbeat is not strictly shorter than the staleness threshold
    pub fn validate(&self) -> Result<()> {
        if self.staleness_threshold.is_zero() {
            bail!("Staleness threshold must be greater than zero");
        }

        if self.heartbeat_interval.is_zero() {
            bail!("Heartbeat interval must be greater than zero");
        }

        if self.cleanup_interval.is_zero() {
            bail!("Cleanup interval must be greater than zero");
        }

        // A live session must renew before it can be considered stale.
        if self.heartbeat_interval >= self.staleness_threshold {
            bail!(
                "Heartbeat interval ({:?}) must be shorter than the staleness threshold ({:?})",
                self.heartbeat_interval,
                self.staleness_threshold
            );
        }

        Ok(())
    }
}

/// Complete configuration of an application instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Email address that resolves to the admin tier.
    pub admin_email: String,

    /// Key of the stats snapshot in on-device storage.
    pub storage_key: String,

    /// Presence timings.
    pub presence: PresenceConfig,

    /// Number advertised as "tools available" on the dashboard.
    pub tools_available: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            admin_email: DEFAULT_ADMIN_EMAIL.to_string(),
            storage_key: DEFAULT_STORAGE_KEY.to_string(),
            presence: PresenceConfig::default(),
            tools_available: crate::tools::tool_count(),
        }
    }
}

impl Config {
    /// Replace the administrator email, trimming whitespace.
    pub fn with_admin_email(mut self, email: impl AsRef<str>) -> Self {
        self.admin_email = email.as_ref().trim().to_string();
        self
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The admin email is empty or not an address
    /// - The storage key is empty
    /// - The presence timings are inconsistent
    pub fn validate(&self) -> Result<()> {
        let email = self.admin_email.trim();
        if email.is_empty() {
            bail!("Admin email cannot be empty");
        }

        match email.split_once('@') {
            Some((user, domain)) if !user.is_empty() && !domain.is_empty() => {}
            _ => bail!("Admin email is not a valid address: {email}"),
        }

        if self.storage_key.trim().is_empty() {
            bail!("Storage key cannot be empty");
        }

        self.presence.validate()
    }
}
