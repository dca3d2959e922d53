//! The PDF merge tool.
//!
//! - [`request`]: the ordered file selection and its tier validation
//! - [`merger`]: byte-level combination with `lopdf`
//! - [`tool`]: the tool workflow tying selection, combination and usage
//!   recording together

pub mod merger;
pub mod request;
pub mod tool;

pub use merger::{MergeOutput, MergeStatistics, PdfMerger};
pub use request::{FileContent, FileDescriptor, MergeRequest, PDF_MEDIA_TYPE};
pub use tool::{MERGED_FILE_NAME, MergeTool, MergedPdf};
