//! End-to-end merge tool scenarios.

use docenclave::analytics::NoAnalytics;
use docenclave::app::{AppServices, Backend};
use docenclave::clock::ManualClock;
use docenclave::identity::{Identity, LocalIdentityProvider};
use docenclave::merge::{FileDescriptor, MERGED_FILE_NAME, MergeTool};
use docenclave::storage::MemoryStorage;
use docenclave::store::InMemoryStore;
use docenclave::{Config, DocEnclaveError, Tier};
use std::sync::Arc;
use tempfile::TempDir;

use crate::common::{ADMIN_EMAIL, RecordingRecorder, auth_as, page_texts, pdf_file, write_pdf};

async fn tool_as(email: Option<&str>) -> (MergeTool, Arc<RecordingRecorder>) {
    let recorder = Arc::new(RecordingRecorder::default());
    let tool = MergeTool::new(auth_as(email).await, recorder.clone(), Arc::new(NoAnalytics));
    (tool, recorder)
}

#[tokio::test]
async fn test_merge_two_pdfs_records_usage_once() {
    let (mut tool, recorder) = tool_as(Some("reader@example.com")).await;
    tool.handle_files(vec![pdf_file("first.pdf", 1), pdf_file("second.pdf", 2)])
        .unwrap();

    let merged = tool.merge_pdfs().await.unwrap();

    assert_eq!(merged.file_name, MERGED_FILE_NAME);
    assert_eq!(merged.source_count, 2);
    assert_eq!(merged.page_count, 3);
    assert_eq!(
        recorder.calls(),
        vec![
            ("files_processed", 2, None),
            ("tools_used", 1, Some("pdf-merge".to_string())),
        ]
    );
    assert!(tool.files().is_empty());
    assert_eq!(tool.error(), None);
}

#[tokio::test]
async fn test_output_follows_selection_order() {
    let (mut tool, _) = tool_as(Some("reader@example.com")).await;
    tool.handle_files(vec![
        pdf_file("a.pdf", 1),
        pdf_file("b.pdf", 1),
        pdf_file("c.pdf", 1),
    ])
    .unwrap();
    tool.move_file(2, 0).unwrap();

    let merged = tool.merge_pdfs().await.unwrap();
    let texts = page_texts(&merged.bytes);

    assert_eq!(texts.len(), 3);
    assert!(texts[0].contains("c.pdf-1"));
    assert!(texts[1].contains("a.pdf-1"));
    assert!(texts[2].contains("b.pdf-1"));
}

#[tokio::test]
async fn test_non_pdf_in_batch_leaves_selection_unchanged() {
    let (mut tool, recorder) = tool_as(Some(ADMIN_EMAIL)).await;
    tool.handle_files(vec![pdf_file("kept.pdf", 1)]).unwrap();

    let batch = vec![
        pdf_file("one.pdf", 1),
        FileDescriptor::from_bytes("photo.png", "image/png", vec![0x89, 0x50]),
        pdf_file("two.pdf", 1),
    ];
    let err = tool.handle_files(batch).unwrap_err();

    assert!(matches!(err, DocEnclaveError::NotPdf { .. }));
    assert_eq!(tool.error(), Some("Please select only PDF files"));
    assert_eq!(tool.files().len(), 1);
    assert_eq!(tool.files()[0].name, "kept.pdf");
    assert!(recorder.calls().is_empty());
}

#[tokio::test]
async fn test_anonymous_tier_limit() {
    let (mut tool, recorder) = tool_as(None).await;

    let err = tool
        .handle_files(vec![pdf_file("a.pdf", 1), pdf_file("b.pdf", 1)])
        .unwrap_err();

    assert!(matches!(
        err,
        DocEnclaveError::TooManyFiles {
            tier: Tier::Anonymous,
            max_files: 1
        }
    ));
    assert!(tool.files().is_empty());
    assert!(recorder.calls().is_empty());
}

#[tokio::test]
async fn test_corrupt_pdf_is_processing_error() {
    let (mut tool, recorder) = tool_as(Some("reader@example.com")).await;
    let broken = FileDescriptor::from_bytes("broken.pdf", "application/pdf", b"this is not a pdf".to_vec());
    tool.handle_files(vec![pdf_file("ok.pdf", 1), broken]).unwrap();

    let err = tool.merge_pdfs().await.unwrap_err();

    assert!(matches!(err, DocEnclaveError::MergeFailed { .. }));
    assert_eq!(tool.error(), Some("Error merging PDFs. Please try again."));
    assert_eq!(tool.files().len(), 2);
    assert!(recorder.calls().is_empty());
}

#[tokio::test]
async fn test_merge_files_from_disk() {
    let dir = TempDir::new().unwrap();
    let first = write_pdf(dir.path(), "first.pdf", 2);
    let second = write_pdf(dir.path(), "second.pdf", 2);

    let (mut tool, _) = tool_as(Some("reader@example.com")).await;
    tool.handle_files(vec![
        FileDescriptor::from_path(&first).await.unwrap(),
        FileDescriptor::from_path(&second).await.unwrap(),
    ])
    .unwrap();

    let merged = tool.merge_pdfs().await.unwrap();
    assert_eq!(merged.page_count, 4);
}

#[tokio::test]
async fn test_merge_through_app_updates_shared_stats() {
    let store = InMemoryStore::new();
    let provider =
        LocalIdentityProvider::new().with_account(Identity::authenticated("u1", "reader@example.com"));
    let backend = Backend {
        store: Arc::new(store.clone()),
        storage: Arc::new(MemoryStorage::new()),
        identity: Arc::new(provider),
        clock: Arc::new(ManualClock::default()),
        analytics: Arc::new(NoAnalytics),
    };
    let app = AppServices::start(Config::default(), backend).await.unwrap();
    app.auth().sign_in_interactive().await.unwrap();

    let mut tool = app.merge_tool();
    tool.handle_files(vec![pdf_file("a.pdf", 1), pdf_file("b.pdf", 1)])
        .unwrap();
    tool.merge_pdfs().await.unwrap();

    let remote = store.snapshot();
    assert_eq!(remote.files_downloaded, 2);
    assert_eq!(remote.tools_used, 1);
    assert_eq!(remote.tool_count("pdf-merge"), 1);

    let dashboard = app.dashboard();
    assert_eq!(dashboard.stats.files_downloaded, 2);
    assert_eq!(dashboard.tier, Tier::Free);

    app.shutdown().await.unwrap();
}
