//! User tiers and their capability profiles.
//!
//! A [`Tier`] is derived from the current [`Identity`] by the
//! [`TierResolver`]; it is never stored on its own. Each tier maps to exactly
//! one immutable [`TierProfile`] through an exhaustive match, so there is no
//! fall-through to a default profile.
//!
//! # Examples
//!
//! ```
//! use docenclave::identity::Identity;
//! use docenclave::tier::{Limit, Tier, TierResolver};
//!
//! let resolver = TierResolver::new("admin@docenclave.com");
//! let user = Identity::authenticated("uid-1", "reader@example.com");
//!
//! assert_eq!(resolver.resolve(Some(&user)), Tier::Free);
//! assert_eq!(resolver.resolve(None), Tier::Anonymous);
//! assert_eq!(Tier::Free.profile().max_files, Limit::Bounded(3));
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::identity::Identity;
use crate::tools::{IMAGE_COMPRESS, PDF_MERGE, PDF_SPLIT};

const BYTES_PER_MB: u64 = 1024 * 1024;

/// Capability class of a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    /// Anonymous session (also the safe default for a missing identity).
    Anonymous,
    /// Signed-in user without a subscription.
    Free,
    /// Signed-in user with a subscription.
    Premium,
    /// Site administrator.
    Admin,
}

impl Tier {
    /// All tiers, from least to most capable.
    pub const ALL: [Tier; 4] = [Tier::Anonymous, Tier::Free, Tier::Premium, Tier::Admin];

    /// Fixed profile for this tier.
    pub fn profile(self) -> &'static TierProfile {
        match self {
            Tier::Anonymous => &ANONYMOUS,
            Tier::Free => &FREE,
            Tier::Premium => &PREMIUM,
            Tier::Admin => &ADMIN,
        }
    }

    /// Lowercase name, as shown to users.
    pub fn as_str(self) -> &'static str {
        match self {
            Tier::Anonymous => "anonymous",
            Tier::Free => "free",
            Tier::Premium => "premium",
            Tier::Admin => "admin",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A numeric limit that may be lifted entirely.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Limit {
    /// At most this many units.
    Bounded(u64),
    /// No limit.
    Unlimited,
}

impl Limit {
    /// Check whether `value` stays within the limit.
    pub fn allows(self, value: u64) -> bool {
        match self {
            Limit::Bounded(max) => value <= max,
            Limit::Unlimited => true,
        }
    }

    /// The bound, if there is one.
    pub fn bound(self) -> Option<u64> {
        match self {
            Limit::Bounded(max) => Some(max),
            Limit::Unlimited => None,
        }
    }
}

impl fmt::Display for Limit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Limit::Bounded(max) => write!(f, "{max}"),
            Limit::Unlimited => f.write_str("unlimited"),
        }
    }
}

/// Which tools a tier may open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolAccess {
    /// Only the listed tool ids.
    Only(&'static [&'static str]),
    /// Every tool in the catalog.
    All,
}

impl ToolAccess {
    /// Check whether `tool_id` is accessible.
    pub fn allows(&self, tool_id: &str) -> bool {
        match self {
            ToolAccess::Only(ids) => ids.iter().any(|id| *id == tool_id),
            ToolAccess::All => true,
        }
    }
}

/// Immutable capability profile of a tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TierProfile {
    /// Maximum number of files per operation.
    pub max_files: Limit,
    /// Maximum size of a single file, in megabytes.
    pub max_file_size_mb: Limit,
    /// Accessible tools.
    pub tools_access: ToolAccess,
}

impl TierProfile {
    /// Maximum size of a single file, in bytes.
    pub fn max_file_size_bytes(&self) -> Limit {
        match self.max_file_size_mb {
            Limit::Bounded(mb) => Limit::Bounded(mb.saturating_mul(BYTES_PER_MB)),
            Limit::Unlimited => Limit::Unlimited,
        }
    }

    /// Check whether a file of `size` bytes is accepted.
    pub fn accepts_file_size(&self, size: u64) -> bool {
        self.max_file_size_bytes().allows(size)
    }

    /// Check whether `count` files are accepted in one operation.
    pub fn accepts_file_count(&self, count: usize) -> bool {
        self.max_files.allows(count as u64)
    }
}

static ANONYMOUS: TierProfile = TierProfile {
    max_files: Limit::Bounded(1),
    max_file_size_mb: Limit::Bounded(10),
    tools_access: ToolAccess::Only(&[PDF_MERGE]),
};

static FREE: TierProfile = TierProfile {
    max_files: Limit::Bounded(3),
    max_file_size_mb: Limit::Bounded(20),
    tools_access: ToolAccess::Only(&[PDF_MERGE, PDF_SPLIT, IMAGE_COMPRESS]),
};

static PREMIUM: TierProfile = TierProfile {
    max_files: Limit::Bounded(10),
    max_file_size_mb: Limit::Bounded(100),
    tools_access: ToolAccess::All,
};

static ADMIN: TierProfile = TierProfile {
    max_files: Limit::Unlimited,
    max_file_size_mb: Limit::Unlimited,
    tools_access: ToolAccess::All,
};

/// Maps identities to tiers.
///
/// Policy: an anonymous identity (or none at all) is [`Tier::Anonymous`], the
/// configured administrator email is [`Tier::Admin`], every other signed-in
/// identity is [`Tier::Free`]. No subscription check exists yet, so
/// [`Tier::Premium`] is never produced here.
#[derive(Debug, Clone)]
pub struct TierResolver {
    admin_email: String,
}

impl TierResolver {
    /// Create a resolver recognizing `admin_email` as the administrator.
    pub fn new(admin_email: impl Into<String>) -> Self {
        Self {
            admin_email: admin_email.into(),
        }
    }

    /// Derive the tier of `identity`.
    pub fn resolve(&self, identity: Option<&Identity>) -> Tier {
        let Some(identity) = identity else {
            return Tier::Anonymous;
        };

        if identity.is_anonymous {
            return Tier::Anonymous;
        }

        match identity.email.as_deref() {
            Some(email) if email.eq_ignore_ascii_case(&self.admin_email) => Tier::Admin,
            _ => Tier::Free,
        }
    }

    /// Profile of `identity`.
    pub fn profile_for(&self, identity: Option<&Identity>) -> &'static TierProfile {
        self.resolve(identity).profile()
    }
}
