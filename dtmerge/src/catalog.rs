//! Ordered page catalog.
//!
//! The catalog is the user's working list of pages. Adding a file appends
//! one [`PageReference`] per page in natural order; entries can then be
//! reordered, inserted or removed before the list is handed to the merge
//! pipeline as a [`snapshot`](PageCatalog::snapshot).
//!
//! # Examples
//!
//! ```no_run
//! use dtmerge::catalog::{Direction, PageCatalog};
//! use dtmerge::config::RendererConfig;
//! use dtmerge::io::PageSources;
//! use std::path::PathBuf;
//!
//! let sources = PageSources::from_renderer(RendererConfig::default());
//! let mut catalog = PageCatalog::new();
//! let report = catalog.add_files(&sources, &[PathBuf::from("a.tif"), PathBuf::from("b.tif")]);
//! if !report.is_clean() {
//!     eprintln!("{}", report.summary());
//! }
//! catalog.move_entry(1, Direction::Up);
//! let pages = catalog.snapshot();
//! ```

use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, error, warn};

use crate::error::{DtMergeError, Result};
use crate::io::PageSources;
use crate::source::{PageReference, SourceKind};

/// Direction for [`PageCatalog::move_entry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Towards the start of the list.
    Up,
    /// Towards the end of the list.
    Down,
}

/// Outcome of adding several files at once.
#[derive(Debug, Default)]
pub struct BatchReport {
    /// Files that contributed pages.
    pub files_added: usize,
    /// Total pages appended to the catalog.
    pub pages_added: usize,
    /// One error per file that could not be added.
    pub errors: Vec<DtMergeError>,
}

impl BatchReport {
    /// Whether every file was added.
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }

    /// Multi-line description of the failed files, one per line.
    pub fn summary(&self) -> String {
        self.errors
            .iter()
            .map(|err| {
                let name = err.file_name().unwrap_or_else(|| "<unknown>".to_string());
                let reason = match err {
                    DtMergeError::SourceUnreadable { reason, .. } => reason.clone(),
                    other => other.to_string(),
                };
                format!("{name}: {reason}")
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Ordered list of page references with an optional selection anchor.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PageCatalog {
    entries: Vec<PageReference>,
    #[serde(skip)]
    selected: Option<usize>,
}

impl PageCatalog {
    /// Create an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append every page of `path`.
    ///
    /// The source kind is taken from the file extension.
    ///
    /// # Returns
    ///
    /// The number of pages appended.
    ///
    /// # Errors
    ///
    /// Returns `SourceUnreadable` if the extension is unsupported or the
    /// document cannot be opened. The catalog is unchanged on error.
    pub fn add_pages(&mut self, sources: &PageSources, path: &Path) -> Result<usize> {
        let kind = SourceKind::detect(path)?;
        let count = sources.page_count(path, kind)?;

        self.entries
            .extend((0..count).map(|index| PageReference::new(path, index, kind)));

        debug!(path = %path.display(), %kind, pages = count, "added pages to catalog");
        Ok(count)
    }

    /// Append the pages of several files, collecting failures per file.
    ///
    /// A file that fails with a recoverable error contributes no pages; the
    /// remaining files are still added in order. Any other error is recorded
    /// and ends the batch.
    pub fn add_files(&mut self, sources: &PageSources, paths: &[PathBuf]) -> BatchReport {
        let mut report = BatchReport::default();

        for path in paths {
            match self.add_pages(sources, path) {
                Ok(count) => {
                    report.files_added += 1;
                    report.pages_added += count;
                }
                Err(err) if err.is_recoverable() => {
                    warn!(path = %path.display(), error = %err, "skipping source");
                    report.errors.push(err);
                }
                Err(err) => {
                    error!(path = %path.display(), error = %err, "stopping batch");
                    report.errors.push(err);
                    break;
                }
            }
        }

        report
    }

    /// Swap the entry at `index` with its neighbour.
    ///
    /// Moving the first entry up, the last entry down, or an index outside
    /// the list is a no-op. A selection anchored on the moved entry follows
    /// it.
    ///
    /// # Returns
    ///
    /// The entry's new index, or `None` if nothing moved.
    pub fn move_entry(&mut self, index: usize, direction: Direction) -> Option<usize> {
        if index >= self.entries.len() {
            return None;
        }

        let target = match direction {
            Direction::Up => index.checked_sub(1)?,
            Direction::Down => {
                let next = index + 1;
                if next >= self.entries.len() {
                    return None;
                }
                next
            }
        };

        self.entries.swap(index, target);
        self.selected = match self.selected {
            Some(selected) if selected == index => Some(target),
            Some(selected) if selected == target => Some(index),
            other => other,
        };
        Some(target)
    }

    /// Move the selected entry, if any.
    pub fn move_selected(&mut self, direction: Direction) -> Option<usize> {
        let index = self.selected?;
        self.move_entry(index, direction)
    }

    /// Insert a reference at `index`, clamped to the end of the list.
    pub fn insert(&mut self, index: usize, reference: PageReference) {
        let index = index.min(self.entries.len());
        self.entries.insert(index, reference);
        if let Some(selected) = self.selected.as_mut()
            && *selected >= index
        {
            *selected += 1;
        }
    }

    /// Remove and return the entry at `index`.
    pub fn remove(&mut self, index: usize) -> Option<PageReference> {
        if index >= self.entries.len() {
            return None;
        }

        let removed = self.entries.remove(index);
        self.selected = match self.selected {
            Some(selected) if selected == index => None,
            Some(selected) if selected > index => Some(selected - 1),
            other => other,
        };
        Some(removed)
    }

    /// Anchor the selection on `index`; out-of-range indices clear it.
    pub fn select(&mut self, index: usize) {
        self.selected = (index < self.entries.len()).then_some(index);
    }

    /// Currently selected index.
    pub fn selected(&self) -> Option<usize> {
        self.selected
    }

    /// Remove every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.selected = None;
    }

    /// Entry at `index`.
    pub fn get(&self, index: usize) -> Option<&PageReference> {
        self.entries.get(index)
    }

    /// Entries in order.
    pub fn entries(&self) -> &[PageReference] {
        &self.entries
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the catalog is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Ordered copy of the entries for a merge.
    pub fn snapshot(&self) -> Vec<PageReference> {
        self.entries.clone()
    }
}
