//! Byte-level combination of PDF documents.
//!
//! Every source is parsed with `lopdf`, its objects are renumbered past the
//! objects already collected, and its pages are appended to the first
//! document's page tree. The result is pruned, compressed and serialized.

use lopdf::{Document, Object, ObjectId};
use std::time::{Duration, Instant};
use tracing::debug;

use crate::error::{DocEnclaveError, Result};
use crate::utils::format_file_size;

/// Statistics about a merge operation.
#[derive(Debug, Clone)]
pub struct MergeStatistics {
    /// Number of source documents combined.
    pub files_merged: usize,

    /// Total number of pages in the combined document.
    pub total_pages: usize,

    /// Total size of the sources, in bytes.
    pub input_size: u64,

    /// Size of the combined document, in bytes.
    pub output_size: u64,

    /// Time spent combining.
    pub merge_time: Duration,
}

impl MergeStatistics {
    /// Input size as a human-readable string.
    pub fn format_input_size(&self) -> String {
        format_file_size(self.input_size)
    }

    /// Output size as a human-readable string.
    pub fn format_output_size(&self) -> String {
        format_file_size(self.output_size)
    }
}

/// A combined document.
#[derive(Debug, Clone)]
pub struct MergeOutput {
    /// Serialized PDF.
    pub bytes: Vec<u8>,

    /// Statistics about the merge.
    pub statistics: MergeStatistics,
}

/// PDF combiner.
#[derive(Debug, Default, Clone, Copy)]
pub struct PdfMerger;

impl PdfMerger {
    /// Create a new merger.
    pub fn new() -> Self {
        Self
    }

    /// Combine `sources` in order into one document.
    ///
    /// Pages keep their order within each source; sources follow each other
    /// in slice order. This is CPU-bound; async callers should run it on a
    /// blocking thread.
    ///
    /// # Errors
    ///
    /// Any malformed input, or an empty `sources`, yields
    /// [`DocEnclaveError::MergeFailed`].
    pub fn merge_bytes(&self, sources: &[Vec<u8>]) -> Result<MergeOutput> {
        let started = Instant::now();
        let (first, rest) = sources
            .split_first()
            .ok_or_else(|| DocEnclaveError::merge_failed("no documents to merge"))?;

        let mut merged = load(first, 0)?;
        let mut max_id = merged.max_id;

        for (index, source) in rest.iter().enumerate() {
            let mut doc = load(source, index + 1)?;

            // Renumber objects to avoid ID conflicts
            doc.renumber_objects_with(max_id + 1);
            max_id = doc.max_id;

            let doc_pages: Vec<ObjectId> = doc.get_pages().into_values().collect();
            merged.objects.extend(doc.objects);
            self.add_pages_to_tree(&mut merged, &doc_pages)?;
        }
        merged.max_id = max_id;

        merged.prune_objects();
        merged.renumber_objects();
        merged.compress();

        let total_pages = merged.get_pages().len();
        let mut bytes = Vec::new();
        merged
            .save_to(&mut bytes)
            .map_err(|e| DocEnclaveError::merge_failed(format!("Failed to save merged PDF: {e}")))?;

        let statistics = MergeStatistics {
            files_merged: sources.len(),
            total_pages,
            input_size: sources.iter().map(|s| s.len() as u64).sum(),
            output_size: bytes.len() as u64,
            merge_time: started.elapsed(),
        };
        debug!(?statistics, "documents combined");

        Ok(MergeOutput { bytes, statistics })
    }

    /// Append `page_ids` to the root page tree of `merged`.
    fn add_pages_to_tree(&self, merged: &mut Document, page_ids: &[ObjectId]) -> Result<()> {
        let pages_id = merged
            .catalog()
            .and_then(|catalog| catalog.get(b"Pages"))
            .and_then(|pages| pages.as_reference())
            .map_err(|e| {
                DocEnclaveError::merge_failed(format!("Failed to get pages reference: {e}"))
            })?;

        for &page_id in page_ids {
            if let Ok(Object::Dictionary(page)) = merged.get_object_mut(page_id) {
                page.set("Parent", Object::Reference(pages_id));
            }
        }

        let pages_dict = merged
            .get_object_mut(pages_id)
            .and_then(|pages| pages.as_dict_mut())
            .map_err(|e| DocEnclaveError::merge_failed(format!("Failed to get pages object: {e}")))?;

        match pages_dict.get_mut(b"Kids") {
            Ok(Object::Array(kids)) => {
                kids.extend(page_ids.iter().map(|&id| Object::Reference(id)));
            }
            _ => return Err(DocEnclaveError::merge_failed("Kids is not an array")),
        }

        let current_count = pages_dict
            .get(b"Count")
            .and_then(|c| c.as_i64())
            .unwrap_or(0);
        pages_dict.set("Count", Object::Integer(current_count + page_ids.len() as i64));

        Ok(())
    }
}

fn load(bytes: &[u8], index: usize) -> Result<Document> {
    Document::load_mem(bytes).map_err(|e| {
        DocEnclaveError::merge_failed(format!("Failed to load document {}: {e}", index + 1))
    })
}
