//! Global usage statistics.
//!
//! [`GlobalStats`] is the shared counter tree. The [`StatsSynchronizer`]
//! keeps a live view of it, either mirrored from the remote store
//! ([`SyncMode::Connected`]) or kept on the device ([`SyncMode::Degraded`]).

mod synchronizer;

pub use synchronizer::StatsSynchronizer;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::error::Result;
use crate::store::Counter;
use crate::tools::ToolId;

/// Shared usage counters.
///
/// Every counter only grows. The serialized form uses the same field names as
/// the remote stats tree.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GlobalStats {
    /// Page visits.
    pub visits: u64,
    /// Files processed and handed back to users.
    pub files_downloaded: u64,
    /// Successful tool runs.
    pub tools_used: u64,
    /// Users counted as happy users.
    pub total_users: u64,
    /// Successful runs per tool id.
    pub tool_usage: BTreeMap<String, u64>,
}

impl GlobalStats {
    /// Add `delta` to `counter`.
    ///
    /// A tool id seen for the first time starts at `delta`.
    pub fn apply(&mut self, counter: &Counter, delta: u64) {
        let slot = match counter {
            Counter::Visits => &mut self.visits,
            Counter::FilesDownloaded => &mut self.files_downloaded,
            Counter::ToolsUsed => &mut self.tools_used,
            Counter::TotalUsers => &mut self.total_users,
            Counter::ToolUsage(tool) => self.tool_usage.entry(tool.to_string()).or_insert(0),
        };
        *slot = slot.saturating_add(delta);
    }

    /// Every non-zero counter with its value.
    pub fn counters(&self) -> Vec<(Counter, u64)> {
        let fixed = [
            (Counter::Visits, self.visits),
            (Counter::FilesDownloaded, self.files_downloaded),
            (Counter::ToolsUsed, self.tools_used),
            (Counter::TotalUsers, self.total_users),
        ];
        let per_tool = self
            .tool_usage
            .iter()
            .map(|(tool, count)| (Counter::ToolUsage(ToolId::new(tool.as_str())), *count));

        fixed
            .into_iter()
            .chain(per_tool)
            .filter(|(_, value)| *value > 0)
            .collect()
    }

    /// Check if every counter is zero.
    pub fn is_empty(&self) -> bool {
        self.counters().is_empty()
    }

    /// Usage count of one tool.
    pub fn tool_count(&self, tool: &str) -> u64 {
        self.tool_usage.get(tool).copied().unwrap_or(0)
    }
}

/// Where the synchronizer's view comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncMode {
    /// Mirrors the remote store; increments are remote atomic operations.
    Connected,
    /// Remote store unreachable; increments stay on this device.
    Degraded,
}

impl fmt::Display for SyncMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncMode::Connected => f.write_str("connected"),
            SyncMode::Degraded => f.write_str("degraded"),
        }
    }
}

/// Records successful tool runs.
#[async_trait]
pub trait UsageRecorder: Send + Sync {
    /// Count `count` processed files.
    async fn increment_files_processed(&self, count: u64) -> Result<()>;

    /// Count `count` runs of `tool`.
    async fn increment_tools_used(&self, count: u64, tool: &ToolId) -> Result<()>;
}
