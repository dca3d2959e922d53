//! Error types for docenclave.
//!
//! Every failure in the crate is a [`DocEnclaveError`]. Each variant belongs to
//! exactly one [`ErrorKind`], which tells the caller how to recover:
//!
//! - **Validation**: bad user input (non-PDF file, tier limit exceeded, too few
//!   files). Surfaced inline, no state is mutated.
//! - **Connectivity**: remote store, identity service or on-device storage
//!   unreachable. Logged and recovered by falling back to local behavior.
//! - **Processing**: a selected file could not be read, the PDF library
//!   failed while combining documents, or the result could not be written.
//!   No partial output exists.
//! - **Auth**: sign-in or sign-out failed. Surfaced in the auth flow only.
//! - **Unexpected**: anything else. Rendered as a generic recovery message.

use std::io;
use std::path::PathBuf;

use crate::tier::Tier;

/// Result type alias for docenclave operations.
pub type Result<T> = std::result::Result<T, DocEnclaveError>;

/// Coarse classification of an error, used to pick a recovery strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// User input was rejected.
    Validation,
    /// A collaborator service could not be reached.
    Connectivity,
    /// Reading inputs, combining them, or writing the result failed.
    Processing,
    /// Sign-in or sign-out failed.
    Auth,
    /// Anything not covered above.
    Unexpected,
}

/// Main error type for docenclave operations.
#[derive(Debug, thiserror::Error)]
pub enum DocEnclaveError {
    /// At least one selected file is not a PDF.
    #[error("Please select only PDF files")]
    NotPdf {
        /// Name of the first offending file.
        name: String,
    },

    /// A selected file exceeds the tier's size limit.
    #[error("File size must be less than {max_mb}MB for {tier} users")]
    FileTooLarge {
        /// Name of the first oversized file.
        name: String,
        /// Tier whose limit was exceeded.
        tier: Tier,
        /// Size limit in megabytes.
        max_mb: u64,
    },

    /// The selection would exceed the tier's file-count limit.
    #[error("{tier} users can merge up to {max_files} PDF files")]
    TooManyFiles {
        /// Tier whose limit was exceeded.
        tier: Tier,
        /// File-count limit.
        max_files: u64,
    },

    /// Fewer than two files were selected for a merge.
    #[error("Please select at least 2 PDF files to merge")]
    NotEnoughFiles {
        /// Number of files currently selected.
        selected: usize,
    },

    /// The tool is not part of the tier's tool set.
    #[error("{tool} is not available for {tier} users")]
    ToolNotAvailable {
        /// Tool identifier.
        tool: String,
        /// Tier of the caller.
        tier: Tier,
    },

    /// A list position does not exist.
    #[error("File position {index} is out of range ({len} file(s) selected)")]
    IndexOutOfRange {
        /// Requested position.
        index: usize,
        /// Current list length.
        len: usize,
    },

    /// Input file was not found.
    #[error("File not found: {}", .path.display())]
    FileNotFound {
        /// Path to the file that was not found.
        path: PathBuf,
    },

    /// Input file exists but could not be read.
    #[error("Cannot access file: {}\n  Reason: {source}", .path.display())]
    FileNotAccessible {
        /// Path to the inaccessible file.
        path: PathBuf,
        /// Underlying I/O error.
        source: io::Error,
    },

    /// The merged document could not be written.
    #[error("Failed to write output: {}\n  Reason: {source}", .path.display())]
    FailedToWrite {
        /// Path being written to.
        path: PathBuf,
        /// Underlying I/O error.
        source: io::Error,
    },

    /// Output file already exists and overwrite is not allowed.
    #[error("Output file already exists: {}\n  Use --force to overwrite or choose a different output path", .path.display())]
    OutputExists {
        /// Path to the existing output file.
        path: PathBuf,
    },

    /// Invalid configuration.
    #[error("Invalid configuration: {message}")]
    InvalidConfig {
        /// Description of what's wrong with the configuration.
        message: String,
    },

    /// The remote real-time store could not be reached.
    #[error("Remote store unavailable: {reason}")]
    StoreUnavailable {
        /// Details about the failure.
        reason: String,
    },

    /// On-device storage could not be read or written.
    #[error("Local storage failed for key '{key}': {reason}")]
    LocalStorage {
        /// Storage key involved.
        key: String,
        /// Details about the failure.
        reason: String,
    },

    /// Combining the documents failed.
    #[error("Error merging PDFs. Please try again.")]
    MergeFailed {
        /// Underlying reason, kept for logs.
        reason: String,
    },

    /// The identity provider rejected or could not complete an operation.
    #[error("Authentication failed: {reason}")]
    Auth {
        /// Details about the failure.
        reason: String,
    },

    /// Generic I/O error.
    #[error("I/O error: {source}")]
    Io {
        /// Underlying I/O error.
        #[from]
        source: io::Error,
    },

    /// Serialization or deserialization failed.
    #[error("Serialization error: {source}")]
    Serialization {
        /// Underlying serde_json error.
        #[from]
        source: serde_json::Error,
    },

    /// Generic error with a custom message.
    #[error("{message}")]
    Other {
        /// Error message.
        message: String,
    },
}

impl From<lopdf::Error> for DocEnclaveError {
    fn from(err: lopdf::Error) -> Self {
        Self::merge_failed(err.to_string())
    }
}

impl From<anyhow::Error> for DocEnclaveError {
    fn from(err: anyhow::Error) -> Self {
        Self::other(err.to_string())
    }
}

impl DocEnclaveError {
    /// Create a FileNotFound error.
    pub fn file_not_found(path: impl Into<PathBuf>) -> Self {
        Self::FileNotFound { path: path.into() }
    }

    /// Error for a failed read of `path`: FileNotFound when it is missing,
    /// FileNotAccessible otherwise.
    pub fn file_access(path: impl Into<PathBuf>, source: io::Error) -> Self {
        let path = path.into();
        if source.kind() == io::ErrorKind::NotFound {
            Self::FileNotFound { path }
        } else {
            Self::FileNotAccessible { path, source }
        }
    }

    /// Create a FailedToWrite error.
    pub fn failed_to_write(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::FailedToWrite {
            path: path.into(),
            source,
        }
    }

    /// Create a MergeFailed error.
    pub fn merge_failed(reason: impl Into<String>) -> Self {
        Self::MergeFailed {
            reason: reason.into(),
        }
    }

    /// Create a StoreUnavailable error.
    pub fn store_unavailable(reason: impl Into<String>) -> Self {
        Self::StoreUnavailable {
            reason: reason.into(),
        }
    }

    /// Create a LocalStorage error.
    pub fn local_storage(key: impl Into<String>, reason: impl ToString) -> Self {
        Self::LocalStorage {
            key: key.into(),
            reason: reason.to_string(),
        }
    }

    /// Create an Auth error.
    pub fn auth_failed(reason: impl Into<String>) -> Self {
        Self::Auth {
            reason: reason.into(),
        }
    }

    /// Create an InvalidConfig error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Create an Other error with a custom message.
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other {
            message: message.into(),
        }
    }

    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotPdf { .. }
            | Self::FileTooLarge { .. }
            | Self::TooManyFiles { .. }
            | Self::NotEnoughFiles { .. }
            | Self::ToolNotAvailable { .. }
            | Self::IndexOutOfRange { .. }
            | Self::FileNotFound { .. }
            | Self::OutputExists { .. }
            | Self::InvalidConfig { .. } => ErrorKind::Validation,
            Self::StoreUnavailable { .. } | Self::LocalStorage { .. } => ErrorKind::Connectivity,
            Self::FileNotAccessible { .. }
            | Self::FailedToWrite { .. }
            | Self::MergeFailed { .. } => ErrorKind::Processing,
            Self::Auth { .. } => ErrorKind::Auth,
            Self::Io { .. } | Self::Serialization { .. } | Self::Other { .. } => {
                ErrorKind::Unexpected
            }
        }
    }

    /// Check if the caller can carry on after this error.
    ///
    /// Everything except unexpected failures is recovered at the boundary
    /// where it was raised.
    pub fn is_recoverable(&self) -> bool {
        self.kind() != ErrorKind::Unexpected
    }

    /// Message suitable for showing to an end user.
    ///
    /// Unexpected errors collapse into the generic recovery text.
    pub fn user_message(&self) -> String {
        match self.kind() {
            ErrorKind::Unexpected => {
                "Something went wrong. Please reload and try again.".to_string()
            }
            _ => self.to_string(),
        }
    }

    /// Get the exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::FileNotFound { .. } | Self::FileNotAccessible { .. } => 2,
            Self::OutputExists { .. } => 4,
            Self::FailedToWrite { .. } | Self::Io { .. } => 5,
            _ => match self.kind() {
                ErrorKind::Validation => 1,
                ErrorKind::Connectivity => 3,
                ErrorKind::Processing => 6,
                ErrorKind::Auth => 7,
                ErrorKind::Unexpected => 1,
            },
        }
    }
}
