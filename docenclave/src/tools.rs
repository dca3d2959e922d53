//! Static catalog of document tools.
//!
//! The catalog groups tools into categories. Only tools whose status is
//! [`ToolStatus::Available`] have a working implementation; the rest are
//! announced as coming soon.

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;

use crate::tier::Tier;

/// Identifier of the PDF merge tool.
pub const PDF_MERGE: &str = "pdf-merge";
/// Identifier of the PDF split tool.
pub const PDF_SPLIT: &str = "pdf-split";
/// Identifier of the image compression tool.
pub const IMAGE_COMPRESS: &str = "image-compress";

/// Identifier of a tool, as used in usage counters.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ToolId(String);

impl ToolId {
    /// Create a tool id.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The raw identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ToolId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl Borrow<str> for ToolId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ToolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Whether a tool can be used yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolStatus {
    /// Implemented and usable.
    Available,
    /// Announced, not implemented.
    Soon,
}

/// Per-tool hint for signed-in tiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TierPair {
    /// Value for free accounts.
    pub free: u32,
    /// Value for premium accounts.
    pub premium: u32,
}

/// A single tool.
#[derive(Debug, Clone, Copy)]
pub struct ToolSpec {
    /// Identifier used in routes and usage counters.
    pub id: &'static str,
    /// Display name.
    pub name: &'static str,
    /// One-line description.
    pub description: &'static str,
    /// Implementation status.
    pub status: ToolStatus,
    /// Suggested file-count limits.
    pub max_files: TierPair,
    /// Suggested file-size limits, in megabytes.
    pub max_file_size_mb: TierPair,
}

impl ToolSpec {
    /// Typed identifier of this tool.
    pub fn tool_id(&self) -> ToolId {
        ToolId::from(self.id)
    }

    /// Suggested `(max_files, max_file_size_mb)` for `tier`.
    ///
    /// Only free and premium accounts have per-tool hints.
    pub fn hints_for(&self, tier: Tier) -> Option<(u32, u32)> {
        match tier {
            Tier::Free => Some((self.max_files.free, self.max_file_size_mb.free)),
            Tier::Premium => Some((self.max_files.premium, self.max_file_size_mb.premium)),
            Tier::Anonymous | Tier::Admin => None,
        }
    }

    /// Check whether this tool is usable.
    pub fn is_available(&self) -> bool {
        self.status == ToolStatus::Available
    }
}

/// A group of related tools.
#[derive(Debug, Clone, Copy)]
pub struct ToolCategory {
    /// Category key.
    pub id: &'static str,
    /// Display name.
    pub name: &'static str,
    /// One-line description.
    pub description: &'static str,
    /// Tools in display order.
    pub tools: &'static [ToolSpec],
}

const fn limits(free: u32, premium: u32) -> TierPair {
    TierPair { free, premium }
}

const STANDARD_SIZE: TierPair = limits(20, 100);

const fn tool(
    id: &'static str,
    name: &'static str,
    description: &'static str,
    status: ToolStatus,
    max_files: TierPair,
) -> ToolSpec {
    ToolSpec {
        id,
        name,
        description,
        status,
        max_files,
        max_file_size_mb: STANDARD_SIZE,
    }
}

static CATEGORIES: [ToolCategory; 4] = [
    ToolCategory {
        id: "pdf",
        name: "PDF Tools",
        description: "Convert, compress, merge PDF files",
        tools: &[
            tool(
                PDF_MERGE,
                "Merge PDF",
                "Combine multiple PDF files into one",
                ToolStatus::Available,
                limits(3, 10),
            ),
            tool(
                PDF_SPLIT,
                "Split PDF",
                "Extract pages from PDF files",
                ToolStatus::Soon,
                limits(1, 5),
            ),
            tool(
                "pdf-compress",
                "Compress PDF",
                "Reduce PDF file size without losing quality",
                ToolStatus::Soon,
                limits(3, 10),
            ),
            tool(
                "pdf-to-image",
                "PDF to Image",
                "Convert PDF pages to JPG or PNG images",
                ToolStatus::Soon,
                limits(1, 5),
            ),
            tool(
                "pdf-to-word",
                "PDF to Word",
                "Convert PDF files to editable Word documents",
                ToolStatus::Soon,
                limits(1, 5),
            ),
            tool(
                "word-to-pdf",
                "Word to PDF",
                "Convert Word documents to PDF format",
                ToolStatus::Soon,
                limits(3, 10),
            ),
        ],
    },
    ToolCategory {
        id: "image",
        name: "Image Tools",
        description: "Resize, compress, convert images",
        tools: &[
            tool(
                IMAGE_COMPRESS,
                "Compress Image",
                "Reduce image file size while maintaining quality",
                ToolStatus::Soon,
                limits(5, 20),
            ),
            tool(
                "image-resize",
                "Resize Image",
                "Change image dimensions and resolution",
                ToolStatus::Soon,
                limits(5, 20),
            ),
            tool(
                "image-convert",
                "Convert Image",
                "Convert between JPG, PNG, WebP, and other formats",
                ToolStatus::Soon,
                limits(5, 20),
            ),
            tool(
                "image-to-pdf",
                "Image to PDF",
                "Convert images to PDF documents",
                ToolStatus::Soon,
                limits(10, 50),
            ),
        ],
    },
    ToolCategory {
        id: "document",
        name: "Document Tools",
        description: "Convert and process various document formats",
        tools: &[
            tool(
                "excel-to-pdf",
                "Excel to PDF",
                "Convert Excel spreadsheets to PDF format",
                ToolStatus::Soon,
                limits(3, 10),
            ),
            tool(
                "powerpoint-to-pdf",
                "PowerPoint to PDF",
                "Convert PowerPoint presentations to PDF",
                ToolStatus::Soon,
                limits(3, 10),
            ),
            tool(
                "text-to-pdf",
                "Text to PDF",
                "Convert plain text files to PDF documents",
                ToolStatus::Soon,
                limits(5, 15),
            ),
        ],
    },
    ToolCategory {
        id: "security",
        name: "Security Tools",
        description: "Protect and secure your documents",
        tools: &[
            tool(
                "pdf-protect",
                "Protect PDF",
                "Add password protection to PDF files",
                ToolStatus::Soon,
                limits(3, 10),
            ),
            tool(
                "pdf-unlock",
                "Unlock PDF",
                "Remove password protection from PDF files",
                ToolStatus::Soon,
                limits(3, 10),
            ),
        ],
    },
];

/// All categories in display order.
pub fn categories() -> &'static [ToolCategory] {
    &CATEGORIES
}

/// Every tool with its category.
pub fn all_tools() -> impl Iterator<Item = (&'static ToolCategory, &'static ToolSpec)> {
    CATEGORIES
        .iter()
        .flat_map(|category| category.tools.iter().map(move |tool| (category, tool)))
}

/// Look up a tool by identifier.
pub fn find_tool(id: &str) -> Option<&'static ToolSpec> {
    all_tools().map(|(_, tool)| tool).find(|tool| tool.id == id)
}

/// Tools that are usable today.
pub fn available_tools() -> impl Iterator<Item = &'static ToolSpec> {
    all_tools()
        .map(|(_, tool)| tool)
        .filter(|tool| tool.is_available())
}

/// Number of tools in the catalog.
pub fn tool_count() -> usize {
    CATEGORIES.iter().map(|category| category.tools.len()).sum()
}
