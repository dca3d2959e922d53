//! Product analytics events.
//!
//! Events go to an [`AnalyticsSink`]. The default sink writes them as
//! structured `tracing` events under the `docenclave::analytics` target, so a
//! subscriber can route them anywhere.

use serde::Serialize;
use tracing::info;

use crate::tools::ToolId;

/// One analytics event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum AnalyticsEvent {
    /// A tool page was opened.
    ToolVisit {
        /// Tool opened.
        tool_id: ToolId,
    },
    /// A tool run succeeded.
    ToolUsage {
        /// Tool used.
        tool_id: ToolId,
        /// Number of input files.
        file_count: usize,
        /// Combined input size, in bytes.
        total_size: u64,
    },
    /// A result was handed to the user.
    FileDownload {
        /// Tool that produced the file.
        tool_id: ToolId,
        /// Output size, in bytes.
        output_size: u64,
    },
}

impl AnalyticsEvent {
    /// Event name.
    pub fn name(&self) -> &'static str {
        match self {
            AnalyticsEvent::ToolVisit { .. } => "tool_visit",
            AnalyticsEvent::ToolUsage { .. } => "tool_usage",
            AnalyticsEvent::FileDownload { .. } => "file_download",
        }
    }
}

/// Destination of analytics events.
///
/// Tracking is best effort: sinks swallow their own failures.
pub trait AnalyticsSink: Send + Sync {
    /// Record `event`.
    fn track(&self, event: AnalyticsEvent);
}

/// Sink that logs events through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAnalytics;

impl AnalyticsSink for TracingAnalytics {
    fn track(&self, event: AnalyticsEvent) {
        let payload = serde_json::to_string(&event).unwrap_or_default();
        info!(target: "docenclave::analytics", event = event.name(), %payload);
    }
}

/// Sink that drops every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoAnalytics;

impl AnalyticsSink for NoAnalytics {
    fn track(&self, _event: AnalyticsEvent) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_wire_format() {
        let event = AnalyticsEvent::ToolUsage {
            tool_id: ToolId::from("pdf-merge"),
            file_count: 2,
            total_size: 2048,
        };
        let json = serde_json::to_value(&event).unwrap();

        assert_eq!(json["event"], "tool_usage");
        assert_eq!(json["tool_id"], "pdf-merge");
        assert_eq!(json["file_count"], 2);
        assert_eq!(json["total_size"], 2048);
        assert_eq!(event.name(), "tool_usage");
    }

    #[test]
    fn test_names() {
        let tool_id = ToolId::from("pdf-merge");
        assert_eq!(
            AnalyticsEvent::ToolVisit {
                tool_id: tool_id.clone()
            }
            .name(),
            "tool_visit"
        );
        assert_eq!(
            AnalyticsEvent::FileDownload {
                tool_id,
                output_size: 1
            }
            .name(),
            "file_download"
        );
    }
}
