//! Source kinds and page references.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::{DtMergeError, Result};

/// Extensions handled by the raster reader.
pub const RASTER_EXTENSIONS: &[&str] = &["tif", "tiff"];

/// Extensions handled by the compound document engine.
pub const COMPOUND_EXTENSIONS: &[&str] = &["xdw", "xbd", "xct"];

/// Kind of document a page comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SourceKind {
    /// Multi-frame TIFF container.
    #[serde(rename = "raster")]
    RasterMultiFrame,
    /// DocuWorks document or binder.
    #[serde(rename = "compound")]
    CompoundDocument,
}

impl SourceKind {
    /// Determine the kind from a file extension, ignoring case.
    ///
    /// Returns `None` for unsupported or missing extensions.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        if RASTER_EXTENSIONS.contains(&ext.as_str()) {
            Some(Self::RasterMultiFrame)
        } else if COMPOUND_EXTENSIONS.contains(&ext.as_str()) {
            Some(Self::CompoundDocument)
        } else {
            None
        }
    }

    /// Like [`from_path`](Self::from_path), but unsupported files are an error.
    ///
    /// # Errors
    ///
    /// Returns [`DtMergeError::SourceUnreadable`] for unsupported extensions.
    pub fn detect(path: &Path) -> Result<Self> {
        Self::from_path(path).ok_or_else(|| {
            DtMergeError::source_unreadable(path, "unsupported file type (expected .tif, .tiff, .xdw, .xbd or .xct)")
        })
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RasterMultiFrame => write!(f, "TIFF"),
            Self::CompoundDocument => write!(f, "DocuWorks"),
        }
    }
}

/// Check whether a path has a supported extension.
pub fn is_supported(path: &Path) -> bool {
    SourceKind::from_path(path).is_some()
}

/// One page of one source document.
///
/// The index is only checked against the real page count when the page is
/// extracted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PageReference {
    /// Document the page belongs to.
    pub source_path: PathBuf,
    /// Zero-based page index.
    pub page_index: usize,
    /// Kind of the source document.
    pub source_kind: SourceKind,
}

impl PageReference {
    /// Create a reference to page `page_index` of `source_path`.
    pub fn new(source_path: impl Into<PathBuf>, page_index: usize, source_kind: SourceKind) -> Self {
        Self {
            source_path: source_path.into(),
            page_index,
            source_kind,
        }
    }

    /// Display label in the form `name.ext-p001`.
    pub fn label(&self) -> String {
        let name = self
            .source_path
            .file_name()
            .map(|name| name.to_string_lossy())
            .unwrap_or_else(|| self.source_path.to_string_lossy());
        format!("{name}-p{:03}", self.page_index + 1)
    }
}

impl fmt::Display for PageReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("scan.tif", Some(SourceKind::RasterMultiFrame))]
    #[case("scan.TIFF", Some(SourceKind::RasterMultiFrame))]
    #[case("report.xdw", Some(SourceKind::CompoundDocument))]
    #[case("binder.XBD", Some(SourceKind::CompoundDocument))]
    #[case("container.xct", Some(SourceKind::CompoundDocument))]
    #[case("notes.pdf", None)]
    #[case("README", None)]
    fn test_kind_from_path(#[case] path: &str, #[case] expected: Option<SourceKind>) {
        assert_eq!(SourceKind::from_path(Path::new(path)), expected);
    }

    #[test]
    fn test_detect_unsupported() {
        let err = SourceKind::detect(Path::new("photo.png")).unwrap_err();
        assert!(matches!(err, DtMergeError::SourceUnreadable { .. }));
    }

    #[test]
    fn test_label() {
        let page = PageReference::new("/scans/docA.tiff", 0, SourceKind::RasterMultiFrame);
        assert_eq!(page.label(), "docA.tiff-p001");

        let page = PageReference::new("docB.xdw", 11, SourceKind::CompoundDocument);
        assert_eq!(page.to_string(), "docB.xdw-p012");
    }

    #[test]
    fn test_serialize() {
        let page = PageReference::new("docB.xdw", 2, SourceKind::CompoundDocument);
        let json = serde_json::to_value(&page).unwrap();
        assert_eq!(json["source_kind"], "compound");
        assert_eq!(json["page_index"], 2);
    }
}
