//! Error types for dtmerge.
//!
//! Every failure that can surface from reading a source, assembling frames
//! or writing the merged TIFF is represented by [`DtMergeError`]. Messages
//! always name the offending file so they can be shown to the user as-is.
//!
//! # Error Categories
//!
//! - **Source errors**: unreadable files, unsupported kinds, out-of-range pages
//! - **Decode errors**: corrupt or unsupported raster data
//! - **Write errors**: the output container could not be produced
//! - **Release errors**: a compound document could not be closed (logged only)
//! - **Front-end errors**: invalid configuration, refused overwrite, cancellation

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Result type alias for dtmerge operations.
pub type Result<T> = std::result::Result<T, DtMergeError>;

/// Main error type for dtmerge operations.
#[derive(Debug, Error)]
pub enum DtMergeError {
    /// The file could not be opened, is not a valid document of its kind,
    /// or has an unsupported extension.
    #[error("Cannot read source: {path}\n  Reason: {reason}")]
    SourceUnreadable {
        /// Path to the unreadable source.
        path: PathBuf,
        /// Reason for the failure.
        reason: String,
    },

    /// A page reference points past the end of its source.
    #[error(
        "Page {} does not exist in {path}\n  The source has {page_count} page(s)",
        .page_index + 1
    )]
    PageIndexOutOfRange {
        /// Path to the source document.
        path: PathBuf,
        /// Zero-based index that was requested.
        page_index: usize,
        /// Number of pages the source actually has.
        page_count: usize,
    },

    /// Page data is corrupt or uses a pixel layout that cannot be decoded.
    #[error("Failed to decode page {} of {path}\n  Reason: {reason}", .page_index + 1)]
    DecodeFailure {
        /// Path to the source document.
        path: PathBuf,
        /// Zero-based index of the page being decoded.
        page_index: usize,
        /// Details about the failure.
        reason: String,
    },

    /// A merge was requested with an empty page list.
    #[error("No pages selected for merging")]
    NoPagesSelected,

    /// The output container could not be encoded or written.
    #[error("Failed to write output file: {path}\n  Reason: {reason}")]
    WriteFailure {
        /// Path being written to.
        path: PathBuf,
        /// Reason for the failure.
        reason: String,
    },

    /// A compound document handle could not be closed cleanly.
    #[error("Failed to release document: {path}\n  Reason: {reason}")]
    ResourceReleaseFailure {
        /// Path of the document whose handle failed to close.
        path: PathBuf,
        /// Reason for the failure.
        reason: String,
    },

    /// Invalid configuration.
    #[error("Invalid configuration: {message}")]
    InvalidConfig {
        /// Description of what's wrong with the configuration.
        message: String,
    },

    /// Output file already exists and overwrite is not allowed.
    #[error(
        "Output file already exists: {path}\n  Use --force to overwrite or choose a different output path"
    )]
    OutputExists {
        /// Path to the existing output file.
        path: PathBuf,
    },

    /// User cancelled the operation.
    #[error("Operation cancelled by user")]
    Cancelled,

    /// Generic I/O error.
    #[error("I/O error: {source}")]
    Io {
        /// Underlying I/O error.
        #[from]
        source: io::Error,
    },

    /// Generic error with a custom message.
    #[error("{message}")]
    Other {
        /// Error message.
        message: String,
    },
}

impl DtMergeError {
    /// Create a SourceUnreadable error.
    pub fn source_unreadable(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::SourceUnreadable {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create a PageIndexOutOfRange error.
    pub fn page_out_of_range(path: impl Into<PathBuf>, page_index: usize, page_count: usize) -> Self {
        Self::PageIndexOutOfRange {
            path: path.into(),
            page_index,
            page_count,
        }
    }

    /// Create a DecodeFailure error.
    pub fn decode_failure(
        path: impl Into<PathBuf>,
        page_index: usize,
        reason: impl Into<String>,
    ) -> Self {
        Self::DecodeFailure {
            path: path.into(),
            page_index,
            reason: reason.into(),
        }
    }

    /// Create a WriteFailure error.
    pub fn write_failure(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::WriteFailure {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create a ResourceReleaseFailure error.
    pub fn release_failure(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::ResourceReleaseFailure {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create an OutputExists error.
    pub fn output_exists(path: impl Into<PathBuf>) -> Self {
        Self::OutputExists { path: path.into() }
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

    /// Path of the file this error is about, if any.
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::SourceUnreadable { path, .. }
            | Self::PageIndexOutOfRange { path, .. }
            | Self::DecodeFailure { path, .. }
            | Self::WriteFailure { path, .. }
            | Self::ResourceReleaseFailure { path, .. }
            | Self::OutputExists { path } => Some(path),
            _ => None,
        }
    }

    /// File name component of [`path`](Self::path), lossily converted.
    pub fn file_name(&self) -> Option<String> {
        self.path()
            .and_then(Path::file_name)
            .map(|name| name.to_string_lossy().into_owned())
    }

    /// Check if this error only affects a single source file.
    ///
    /// Recoverable errors are collected into a batch report while the
    /// remaining files are still added to the catalog.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::SourceUnreadable { .. }
                | Self::PageIndexOutOfRange { .. }
                | Self::DecodeFailure { .. }
                | Self::ResourceReleaseFailure { .. }
        )
    }

    /// Check if this error should stop all processing immediately.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::NoPagesSelected | Self::WriteFailure { .. } | Self::Cancelled
        )
    }

    /// Get the process exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::SourceUnreadable { .. } => 2,
            Self::PageIndexOutOfRange { .. } => 3,
            Self::DecodeFailure { .. } => 3,
            Self::NoPagesSelected => 1,
            Self::OutputExists { .. } => 4,
            Self::WriteFailure { .. } => 5,
            Self::ResourceReleaseFailure { .. } => 6,
            Self::InvalidConfig { .. } => 1,
            Self::Cancelled => 130, // Standard exit code for SIGINT
            Self::Io { .. } => 5,
            Self::Other { .. } => 1,
        }
    }
}
