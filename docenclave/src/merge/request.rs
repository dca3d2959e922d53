//! The ordered file selection of one merge.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use crate::error::{DocEnclaveError, Result};
use crate::tier::Tier;

/// Media type accepted by the merge tool.
pub const PDF_MEDIA_TYPE: &str = "application/pdf";

/// Where a file's bytes live.
#[derive(Debug, Clone)]
pub enum FileContent {
    /// Already in memory.
    Bytes(Arc<[u8]>),
    /// On disk, read when the merge runs.
    Path(PathBuf),
}

impl FileContent {
    /// Read the full content.
    pub async fn read(&self) -> Result<Vec<u8>> {
        match self {
            FileContent::Bytes(bytes) => Ok(bytes.to_vec()),
            FileContent::Path(path) => tokio::fs::read(path)
                .await
                .map_err(|err| DocEnclaveError::file_access(path, err)),
        }
    }
}

/// A selected file.
#[derive(Debug, Clone)]
pub struct FileDescriptor {
    /// Unique id within the selection.
    pub id: Uuid,
    /// File name as shown to the user.
    pub name: String,
    /// Size in bytes.
    pub size: u64,
    /// Declared media type.
    pub media_type: String,
    /// Content handle.
    pub content: FileContent,
}

impl FileDescriptor {
    /// Describe an in-memory file.
    pub fn from_bytes(
        name: impl Into<String>,
        media_type: impl Into<String>,
        bytes: impl Into<Arc<[u8]>>,
    ) -> Self {
        let bytes = bytes.into();
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            size: bytes.len() as u64,
            media_type: media_type.into(),
            content: FileContent::Bytes(bytes),
        }
    }

    /// Describe a file on disk.
    ///
    /// The media type is derived from the extension, the way a browser file
    /// picker does it.
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let metadata = tokio::fs::metadata(path)
            .await
            .map_err(|err| DocEnclaveError::file_access(path, err))?;
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        Ok(Self {
            id: Uuid::new_v4(),
            name,
            size: metadata.len(),
            media_type: media_type_for(path).to_string(),
            content: FileContent::Path(path.to_path_buf()),
        })
    }

    /// Check whether the declared media type is PDF.
    pub fn is_pdf(&self) -> bool {
        self.media_type == PDF_MEDIA_TYPE
    }
}

/// Reject a file of `size` bytes that `tier` does not accept.
pub(crate) fn ensure_file_size(name: &str, size: u64, tier: Tier) -> Result<()> {
    let profile = tier.profile();
    if profile.accepts_file_size(size) {
        return Ok(());
    }
    Err(DocEnclaveError::FileTooLarge {
        name: name.to_string(),
        tier,
        max_mb: profile.max_file_size_mb.bound().unwrap_or(u64::MAX),
    })
}

fn ensure_file_count(count: usize, tier: Tier) -> Result<()> {
    let profile = tier.profile();
    if profile.accepts_file_count(count) {
        return Ok(());
    }
    Err(DocEnclaveError::TooManyFiles {
        tier,
        max_files: profile.max_files.bound().unwrap_or(u64::MAX),
    })
}

fn media_type_for(path: &Path) -> &'static str {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("pdf") => PDF_MEDIA_TYPE,
        _ => "application/octet-stream",
    }
}

/// Ordered selection of files awaiting a merge.
///
/// The list order is the output page order.
#[derive(Debug, Clone, Default)]
pub struct MergeRequest {
    files: Vec<FileDescriptor>,
}

impl MergeRequest {
    /// Empty selection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate `new_files` against `tier` and append them.
    ///
    /// Checks run in a fixed order: every file must be a PDF, every file
    /// must fit the size limit, and the grown list must fit the file-count
    /// limit. The first failing check rejects the whole batch and the
    /// selection stays unchanged.
    pub fn add_files(&mut self, new_files: Vec<FileDescriptor>, tier: Tier) -> Result<()> {
        if let Some(file) = new_files.iter().find(|file| !file.is_pdf()) {
            return Err(DocEnclaveError::NotPdf {
                name: file.name.clone(),
            });
        }

        for file in &new_files {
            ensure_file_size(&file.name, file.size, tier)?;
        }

        let total = self.files.len() + new_files.len();
        ensure_file_count(total, tier)?;

        debug!(added = new_files.len(), total, "files selected");
        self.files.extend(new_files);
        Ok(())
    }

    /// Check the current selection against `tier` again.
    ///
    /// The tier may have changed since the files were added. Sizes are
    /// checked before the count, the same order as [`MergeRequest::add_files`].
    pub fn revalidate(&self, tier: Tier) -> Result<()> {
        for file in &self.files {
            ensure_file_size(&file.name, file.size, tier)?;
        }
        ensure_file_count(self.files.len(), tier)
    }

    /// Remove the file with `id`.
    pub fn remove(&mut self, id: Uuid) -> Option<FileDescriptor> {
        let index = self.files.iter().position(|file| file.id == id)?;
        Some(self.files.remove(index))
    }

    /// Move the file at `from` so it ends up at `to`.
    pub fn move_file(&mut self, from: usize, to: usize) -> Result<()> {
        let len = self.files.len();
        for index in [from, to] {
            if index >= len {
                return Err(DocEnclaveError::IndexOutOfRange { index, len });
            }
        }

        let file = self.files.remove(from);
        self.files.insert(to, file);
        Ok(())
    }

    /// Swap the file at `index` with its predecessor. No-op at the top.
    pub fn move_up(&mut self, index: usize) -> Result<()> {
        if index == 0 {
            return self.check_index(index);
        }
        self.move_file(index, index - 1)
    }

    /// Swap the file at `index` with its successor. No-op at the bottom.
    pub fn move_down(&mut self, index: usize) -> Result<()> {
        self.check_index(index)?;
        if index + 1 == self.files.len() {
            return Ok(());
        }
        self.move_file(index, index + 1)
    }

    fn check_index(&self, index: usize) -> Result<()> {
        let len = self.files.len();
        if index < len {
            Ok(())
        } else {
            Err(DocEnclaveError::IndexOutOfRange { index, len })
        }
    }

    /// Drop every selected file.
    pub fn clear(&mut self) {
        self.files.clear();
    }

    /// Selected files in order.
    pub fn files(&self) -> &[FileDescriptor] {
        &self.files
    }

    /// Number of selected files.
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Check if nothing is selected.
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Combined size of the selection, in bytes.
    pub fn total_size(&self) -> u64 {
        self.files.iter().map(|file| file.size).sum()
    }
}
