//! User-facing output.
//!
//! The `display_*` functions print through an [`OutputFormatter`]; the
//! matching `*_lines` functions build the same text without printing it.
//!
//! # Examples
//!
//! ```
//! use docenclave::output::{OutputFormatter, profile_lines};
//! use docenclave::tier::Tier;
//!
//! let lines = profile_lines(Tier::Anonymous);
//! assert_eq!(lines[1], ("Max files".to_string(), "1".to_string()));
//!
//! let formatter = OutputFormatter::quiet();
//! docenclave::output::display_profile(&formatter, Tier::Anonymous);
//! ```

pub mod formatter;

pub use formatter::{MessageLevel, OutputFormatter};

use crate::app::Dashboard;
use crate::merge::MergedPdf;
use crate::tier::{Limit, Tier, ToolAccess};
use crate::tools;
use crate::utils::{format_count, format_file_size};

fn limit_mb(limit: Limit) -> String {
    match limit {
        Limit::Bounded(mb) => format!("{mb} MB"),
        Limit::Unlimited => limit.to_string(),
    }
}

/// Label/value rows of the usage dashboard.
pub fn dashboard_lines(dashboard: &Dashboard) -> Vec<(String, String)> {
    let active = dashboard
        .active_users
        .map(|count| count.to_string())
        .unwrap_or_else(|| "unknown".to_string());
    let source = if dashboard.is_live() {
        "Live Data"
    } else {
        "Cached Data"
    };

    vec![
        ("Files Secured".to_string(), format_count(dashboard.stats.visits)),
        (
            "Files Downloaded".to_string(),
            format_count(dashboard.stats.files_downloaded),
        ),
        ("Active Users".to_string(), active),
        ("Tools Used".to_string(), format_count(dashboard.stats.tools_used)),
        (
            "Tools Available".to_string(),
            dashboard.tools_available.to_string(),
        ),
        ("Source".to_string(), source.to_string()),
    ]
}

/// Print the usage dashboard.
pub fn display_dashboard(formatter: &OutputFormatter, dashboard: &Dashboard) {
    formatter.section("Usage");
    for (label, value) in dashboard_lines(dashboard) {
        formatter.field(&label, &value);
    }

    if !dashboard.stats.tool_usage.is_empty() {
        formatter.section("Per tool");
        for (tool, count) in &dashboard.stats.tool_usage {
            formatter.field(tool, &format_count(*count));
        }
    }
}

/// Label/value rows describing the profile of `tier`.
pub fn profile_lines(tier: Tier) -> Vec<(String, String)> {
    let profile = tier.profile();
    let tools = match profile.tools_access {
        ToolAccess::All => "all".to_string(),
        ToolAccess::Only(ids) => ids.join(", "),
    };

    vec![
        ("Tier".to_string(), tier.to_string()),
        ("Max files".to_string(), profile.max_files.to_string()),
        ("Max file size".to_string(), limit_mb(profile.max_file_size_mb)),
        ("Tools".to_string(), tools),
    ]
}

/// Print the capability profile of `tier`.
pub fn display_profile(formatter: &OutputFormatter, tier: Tier) {
    formatter.section("Limits");
    for (label, value) in profile_lines(tier) {
        formatter.field(&label, &value);
    }
}

/// Print the tool catalog, marking what `tier` can use.
pub fn display_catalog(formatter: &OutputFormatter, tier: Tier) {
    let access = tier.profile().tools_access;
    for category in tools::categories() {
        formatter.section(category.name);
        for (index, tool) in category.tools.iter().enumerate() {
            let status = match (tool.is_available(), access.allows(tool.id)) {
                (false, _) => "coming soon",
                (true, true) => "available",
                (true, false) => "upgrade required",
            };
            formatter.list_item(index + 1, &format!("{} ({}) - {status}", tool.name, tool.id));
            formatter.detail("description", tool.description);
            if let Some((files, size)) = tool.hints_for(tier) {
                formatter.detail("limits", &format!("{files} files, {size} MB each"));
            }
        }
    }
}

/// Print the outcome of a merge.
pub fn display_merge_result(formatter: &OutputFormatter, merged: &MergedPdf, target: &str) {
    formatter.success(&format!(
        "Merged {} files ({} pages) into {}",
        merged.source_count, merged.page_count, target
    ));
    formatter.detail("input size", &merged.statistics.format_input_size());
    formatter.detail("output size", &format_file_size(merged.bytes.len() as u64));
    formatter.detail(
        "merge time",
        &format!("{:.2}s", merged.statistics.merge_time.as_secs_f64()),
    );
}
