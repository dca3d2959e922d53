//! Shared helpers for the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use docenclave::identity::{AuthService, Identity, LocalIdentityProvider};
use docenclave::merge::{FileDescriptor, PDF_MEDIA_TYPE};
use docenclave::tools::ToolId;
use docenclave::{Result, TierResolver, UsageRecorder};
use lopdf::{Dictionary, Document, Object, Stream};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub const ADMIN_EMAIL: &str = "admin@docenclave.com";

/// Build a PDF with `pages` pages, each showing `<label>-<n>`.
pub fn sample_pdf(pages: u32, label: &str) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let kids: Vec<Object> = (1..=pages)
        .map(|n| {
            let content = format!("BT /F1 12 Tf 72 720 Td ({label}-{n}) Tj ET");
            let content_id = doc.add_object(Stream::new(Dictionary::new(), content.into_bytes()));

            let mut page = Dictionary::new();
            page.set("Type", Object::Name(b"Page".to_vec()));
            page.set("Parent", Object::Reference(pages_id));
            page.set("Contents", Object::Reference(content_id));
            let media_box = [0, 0, 612, 792].into_iter().map(Object::Integer).collect();
            page.set("MediaBox", Object::Array(media_box));
            Object::Reference(doc.add_object(page))
        })
        .collect();

    let mut tree = Dictionary::new();
    tree.set("Type", Object::Name(b"Pages".to_vec()));
    tree.set("Count", Object::Integer(i64::from(pages)));
    tree.set("Kids", Object::Array(kids));
    doc.objects.insert(pages_id, Object::Dictionary(tree));

    let mut catalog = Dictionary::new();
    catalog.set("Type", Object::Name(b"Catalog".to_vec()));
    catalog.set("Pages", Object::Reference(pages_id));
    let catalog_id = doc.add_object(catalog);
    doc.trailer.set("Root", Object::Reference(catalog_id));

    let mut buffer = Vec::new();
    doc.save_to(&mut buffer).expect("failed to build sample PDF");
    buffer
}

/// In-memory PDF descriptor.
pub fn pdf_file(name: &str, pages: u32) -> FileDescriptor {
    FileDescriptor::from_bytes(name, PDF_MEDIA_TYPE, sample_pdf(pages, name))
}

/// Write a sample PDF into `dir`.
pub fn write_pdf(dir: &Path, name: &str, pages: u32) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, sample_pdf(pages, name)).expect("failed to write sample PDF");
    path
}

/// Text of every page of `bytes`, in page order.
pub fn page_texts(bytes: &[u8]) -> Vec<String> {
    let doc = Document::load_mem(bytes).expect("output is not a PDF");
    doc.get_pages()
        .into_values()
        .map(|id| {
            let content = doc.get_page_content(id).expect("page without content");
            String::from_utf8_lossy(&content).into_owned()
        })
        .collect()
}

/// Auth service, signed in as `email` when given.
pub async fn auth_as(email: Option<&str>) -> Arc<AuthService> {
    let mut provider = LocalIdentityProvider::new();
    if let Some(email) = email {
        provider = provider.with_account(Identity::authenticated("uid-test", email));
    }

    let auth = Arc::new(AuthService::new(
        Arc::new(provider),
        TierResolver::new(ADMIN_EMAIL),
    ));
    if email.is_some() {
        auth.sign_in_interactive().await.expect("sign-in failed");
    }
    auth
}

/// Usage recorder that remembers every call.
#[derive(Default)]
pub struct RecordingRecorder {
    calls: Mutex<Vec<(&'static str, u64, Option<String>)>>,
}

impl RecordingRecorder {
    pub fn calls(&self) -> Vec<(&'static str, u64, Option<String>)> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl UsageRecorder for RecordingRecorder {
    async fn increment_files_processed(&self, count: u64) -> Result<()> {
        self.calls.lock().push(("files_processed", count, None));
        Ok(())
    }

    async fn increment_tools_used(&self, count: u64, tool: &ToolId) -> Result<()> {
        self.calls
            .lock()
            .push(("tools_used", count, Some(tool.to_string())));
        Ok(())
    }
}
