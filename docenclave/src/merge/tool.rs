use futures::future::try_join_all;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use super::merger::{MergeStatistics, PdfMerger};
use super::request::{FileDescriptor, MergeRequest, ensure_file_size};
use crate::analytics::{AnalyticsEvent, AnalyticsSink};
use crate::error::{DocEnclaveError, Result};
use crate::identity::AuthService;
use crate::stats::UsageRecorder;
use crate::tools::{PDF_MERGE, ToolId};

/// File name of every merge result.
pub const MERGED_FILE_NAME: &str = "merged-document.pdf";

/// Minimum number of files a merge needs.
const MIN_FILES: usize = 2;

/// Result of a successful merge.
#[derive(Debug, Clone)]
pub struct MergedPdf {
    /// Serialized PDF.
    pub bytes: Vec<u8>,
    /// Suggested download name.
    pub file_name: &'static str,
    /// Pages in the result.
    pub page_count: usize,
    /// Number of documents combined.
    pub source_count: usize,
    /// Merge statistics.
    pub statistics: MergeStatistics,
}

/// State and workflow of the merge tool page.
///
/// Failed operations leave their message in [`MergeTool::error`] and never
/// touch the selection or the usage counters.
pub struct MergeTool {
    auth: Arc<AuthService>,
    recorder: Arc<dyn UsageRecorder>,
    analytics: Arc<dyn AnalyticsSink>,
    merger: PdfMerger,
    request: MergeRequest,
    error: Option<String>,
}

impl MergeTool {
    /// Open the tool. Records a visit event.
    pub fn new(
        auth: Arc<AuthService>,
        recorder: Arc<dyn UsageRecorder>,
        analytics: Arc<dyn AnalyticsSink>,
    ) -> Self {
        analytics.track(AnalyticsEvent::ToolVisit {
            tool_id: ToolId::from(PDF_MERGE),
        });

        Self {
            auth,
            recorder,
            analytics,
            merger: PdfMerger::new(),
            request: MergeRequest::new(),
            error: None,
        }
    }

    /// Inline error message of the last failed operation.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Current selection.
    pub fn request(&self) -> &MergeRequest {
        &self.request
    }

    /// Selected files in order.
    pub fn files(&self) -> &[FileDescriptor] {
        self.request.files()
    }

    fn track<T>(&mut self, result: Result<T>) -> Result<T> {
        match &result {
            Ok(_) => self.error = None,
            Err(err) => self.error = Some(err.user_message()),
        }
        result
    }

    /// Validate `files` against the caller's tier and add them.
    pub fn handle_files(&mut self, files: Vec<FileDescriptor>) -> Result<()> {
        self.error = None;
        let tier = self.auth.tier();
        let result = self.request.add_files(files, tier);
        self.track(result)
    }

    /// Remove a file from the selection.
    pub fn remove_file(&mut self, id: Uuid) -> Option<FileDescriptor> {
        self.request.remove(id)
    }

    /// Move the file at `from` to position `to`.
    pub fn move_file(&mut self, from: usize, to: usize) -> Result<()> {
        let result = self.request.move_file(from, to);
        self.track(result)
    }

    /// Move the file at `index` one position up.
    pub fn move_up(&mut self, index: usize) -> Result<()> {
        let result = self.request.move_up(index);
        self.track(result)
    }

    /// Move the file at `index` one position down.
    pub fn move_down(&mut self, index: usize) -> Result<()> {
        let result = self.request.move_down(index);
        self.track(result)
    }

    /// Combine the selection into one PDF.
    ///
    /// On success the usage counters are bumped exactly once
    /// (`files processed += n`, `tools used += 1` for `pdf-merge`) and the
    /// selection is cleared. On failure nothing is recorded and the
    /// selection is kept.
    #[instrument(skip(self), fields(files = self.request.len()))]
    pub async fn merge_pdfs(&mut self) -> Result<MergedPdf> {
        self.error = None;
        let result = self.run_merge().await;
        let merged = self.track(result)?;

        self.record_usage(&merged).await;
        self.request.clear();
        Ok(merged)
    }

    async fn run_merge(&self) -> Result<MergedPdf> {
        let selected = self.request.len();
        if selected < MIN_FILES {
            return Err(DocEnclaveError::NotEnoughFiles { selected });
        }

        let tier = self.auth.tier();
        let profile = tier.profile();
        if !profile.tools_access.allows(PDF_MERGE) {
            return Err(DocEnclaveError::ToolNotAvailable {
                tool: PDF_MERGE.to_string(),
                tier,
            });
        }
        self.request.revalidate(tier)?;

        let sources = try_join_all(self.request.files().iter().map(|file| file.content.read()))
            .await
            .inspect_err(|err| error!(error = %err, "failed to read selected files"))?;
        // Declared sizes can be stale; check what was actually read.
        for (file, bytes) in self.request.files().iter().zip(&sources) {
            ensure_file_size(&file.name, bytes.len() as u64, tier)?;
        }

        let merger = self.merger;
        let output = tokio::task::spawn_blocking(move || merger.merge_bytes(&sources))
            .await
            .map_err(|err| DocEnclaveError::merge_failed(err.to_string()))?
            .inspect_err(|err| error!(error = ?err, "PDF merge error"))?;

        Ok(MergedPdf {
            page_count: output.statistics.total_pages,
            source_count: output.statistics.files_merged,
            file_name: MERGED_FILE_NAME,
            bytes: output.bytes,
            statistics: output.statistics,
        })
    }

    async fn record_usage(&self, merged: &MergedPdf) {
        let tool_id = ToolId::from(PDF_MERGE);
        let files = merged.source_count as u64;

        if let Err(err) = self.recorder.increment_files_processed(files).await {
            warn!(error = %err, "failed to record processed files");
        }
        if let Err(err) = self.recorder.increment_tools_used(1, &tool_id).await {
            warn!(error = %err, "failed to record tool usage");
        }

        self.analytics.track(AnalyticsEvent::ToolUsage {
            tool_id: tool_id.clone(),
            file_count: merged.source_count,
            total_size: merged.statistics.input_size,
        });
        self.analytics.track(AnalyticsEvent::FileDownload {
            tool_id,
            output_size: merged.bytes.len() as u64,
        });

        info!(
            files,
            pages = merged.page_count,
            size = %merged.statistics.format_output_size(),
            "merge complete"
        );
    }
}

impl std::fmt::Debug for MergeTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MergeTool")
            .field("request", &self.request)
            .field("error", &self.error)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::NoAnalytics;
    use crate::identity::{Identity, LocalIdentityProvider};
    use crate::merge::PDF_MEDIA_TYPE;
    use crate::tier::{Tier, TierResolver};
    use async_trait::async_trait;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct Recorded {
        calls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl UsageRecorder for Recorded {
        async fn increment_files_processed(&self, count: u64) -> Result<()> {
            self.calls.lock().push(format!("files:{count}"));
            Ok(())
        }

        async fn increment_tools_used(&self, count: u64, tool: &ToolId) -> Result<()> {
            self.calls.lock().push(format!("tools:{count}:{tool}"));
            Ok(())
        }
    }

    async fn tool_for(tier: Tier) -> (MergeTool, Arc<Recorded>) {
        let email = match tier {
            Tier::Admin => "admin@docenclave.com",
            _ => "user@example.com",
        };
        let provider = Arc::new(
            LocalIdentityProvider::new().with_account(Identity::authenticated("u1", email)),
        );
        let auth = Arc::new(AuthService::new(
            provider,
            TierResolver::new("admin@docenclave.com"),
        ));
        if tier != Tier::Anonymous {
            auth.sign_in_interactive().await.unwrap();
        }
        assert_eq!(auth.tier(), tier);

        let recorder = Arc::new(Recorded::default());
        let tool = MergeTool::new(auth, recorder.clone(), Arc::new(NoAnalytics));
        (tool, recorder)
    }

    fn garbage_pdf(name: &str) -> FileDescriptor {
        FileDescriptor::from_bytes(name, PDF_MEDIA_TYPE, b"%PDF-garbage".to_vec())
    }

    #[tokio::test]
    async fn test_needs_two_files() {
        let (mut tool, recorder) = tool_for(Tier::Free).await;
        tool.handle_files(vec![garbage_pdf("a.pdf")]).unwrap();

        let err = tool.merge_pdfs().await.unwrap_err();
        assert!(matches!(err, DocEnclaveError::NotEnoughFiles { selected: 1 }));
        assert_eq!(
            tool.error(),
            Some("Please select at least 2 PDF files to merge")
        );
        assert_eq!(tool.files().len(), 1);
        assert!(recorder.calls.lock().is_empty());
    }

    #[tokio::test]
    async fn test_processing_failure_records_nothing() {
        let (mut tool, recorder) = tool_for(Tier::Free).await;
        tool.handle_files(vec![garbage_pdf("a.pdf"), garbage_pdf("b.pdf")])
            .unwrap();

        let err = tool.merge_pdfs().await.unwrap_err();
        assert!(matches!(err, DocEnclaveError::MergeFailed { .. }));
        assert_eq!(tool.error(), Some("Error merging PDFs. Please try again."));
        assert_eq!(tool.files().len(), 2);
        assert!(recorder.calls.lock().is_empty());
    }

    #[tokio::test]
    async fn test_selection_is_rechecked_against_current_tier() {
        let (mut tool, recorder) = tool_for(Tier::Admin).await;
        let oversized = |name: &str| {
            let mut file = garbage_pdf(name);
            file.size = 50 * 1024 * 1024;
            file
        };
        tool.handle_files(vec![oversized("a.pdf"), oversized("b.pdf")])
            .unwrap();

        tool.auth.sign_out().await.unwrap();
        let err = tool.merge_pdfs().await.unwrap_err();

        assert!(matches!(
            err,
            DocEnclaveError::FileTooLarge { ref name, tier: Tier::Anonymous, max_mb: 10 }
                if name == "a.pdf"
        ));
        assert_eq!(tool.files().len(), 2);
        assert!(recorder.calls.lock().is_empty());
    }

    #[tokio::test]
    async fn test_content_larger_than_declared_is_rejected() {
        let (mut tool, recorder) = tool_for(Tier::Free).await;
        let mut big = FileDescriptor::from_bytes("big.pdf", PDF_MEDIA_TYPE, vec![0u8; 21 * 1024 * 1024]);
        big.size = 1024;
        tool.handle_files(vec![garbage_pdf("a.pdf"), big]).unwrap();

        let err = tool.merge_pdfs().await.unwrap_err();

        assert!(matches!(
            err,
            DocEnclaveError::FileTooLarge { ref name, tier: Tier::Free, max_mb: 20 }
                if name == "big.pdf"
        ));
        assert_eq!(
            tool.error(),
            Some("File size must be less than 20MB for free users")
        );
        assert!(recorder.calls.lock().is_empty());
    }

    #[tokio::test]
    async fn test_handle_files_sets_and_clears_error() {
        let (mut tool, _) = tool_for(Tier::Anonymous).await;

        let err = tool
            .handle_files(vec![garbage_pdf("a.pdf"), garbage_pdf("b.pdf")])
            .unwrap_err();
        assert!(matches!(err, DocEnclaveError::TooManyFiles { .. }));
        assert_eq!(
            tool.error(),
            Some("anonymous users can merge up to 1 PDF files")
        );
        assert!(tool.files().is_empty());

        tool.handle_files(vec![garbage_pdf("a.pdf")]).unwrap();
        assert_eq!(tool.error(), None);
        assert_eq!(tool.files().len(), 1);
    }

    #[tokio::test]
    async fn test_reorder_through_tool() {
        let (mut tool, _) = tool_for(Tier::Admin).await;
        tool.handle_files(vec![garbage_pdf("a.pdf"), garbage_pdf("b.pdf")])
            .unwrap();

        tool.move_down(0).unwrap();
        assert_eq!(tool.files()[0].name, "b.pdf");

        assert!(tool.move_file(0, 9).is_err());
        assert!(tool.error().is_some());

        let id = tool.files()[0].id;
        assert!(tool.remove_file(id).is_some());
        assert_eq!(tool.request().len(), 1);
    }
}
