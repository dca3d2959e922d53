//! docenclave - tiered document tools with live usage statistics.
//!
//! This library is the core of the DocEnclave tool site:
//!
//! - Tier resolution: identity to capability profile (file count, file
//!   size, tool access)
//! - Stats synchronization: shared counters mirrored from a remote real-time
//!   store, with an on-device fallback
//! - Presence tracking: live count of connected sessions with heartbeat
//!   renewal and stale-record expiry
//! - The PDF merge tool, built on `lopdf`
//!
//! Collaborators (remote store, identity provider, on-device storage, clock)
//! are traits; in-process implementations ship with the crate.
//!
//! # Examples
//!
//! ## Starting the services
//!
//! ```no_run
//! use docenclave::app::{AppServices, Backend};
//! use docenclave::identity::LocalIdentityProvider;
//! use docenclave::Config;
//!
//! # async fn example() -> docenclave::Result<()> {
//! let backend = Backend::offline(".docenclave", LocalIdentityProvider::new());
//! let app = AppServices::start(Config::default(), backend).await?;
//!
//! let dashboard = app.dashboard();
//! println!("{} files downloaded", dashboard.stats.files_downloaded);
//!
//! app.shutdown().await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Merging files
//!
//! ```no_run
//! use docenclave::app::AppServices;
//! use docenclave::merge::FileDescriptor;
//!
//! # async fn example(app: &AppServices) -> docenclave::Result<()> {
//! let mut tool = app.merge_tool();
//! tool.handle_files(vec![
//!     FileDescriptor::from_path("a.pdf").await?,
//!     FileDescriptor::from_path("b.pdf").await?,
//! ])?;
//!
//! let merged = tool.merge_pdfs().await?;
//! tokio::fs::write(merged.file_name, &merged.bytes).await?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod analytics;
pub mod app;
pub mod clock;
pub mod config;
pub mod error;
pub mod identity;
pub mod merge;
pub mod output;
pub mod presence;
pub mod stats;
pub mod storage;
pub mod store;
pub mod subscription;
pub mod tier;
pub mod tools;
pub mod utils;

// Re-export commonly used types
pub use app::{AppServices, Backend, Dashboard};
pub use config::Config;
pub use error::{DocEnclaveError, ErrorKind, Result};
pub use stats::{GlobalStats, StatsSynchronizer, SyncMode, UsageRecorder};
pub use subscription::Subscription;
pub use tier::{Tier, TierProfile, TierResolver};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name.
pub const NAME: &str = env!("CARGO_PKG_NAME");
