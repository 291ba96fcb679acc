//! Per-merge ownership of compound document handles and scratch files.
//!
//! A [`ResourceTracker`] lives for exactly one merge. It opens each compound
//! document at most once, hands out the cached handle for later pages, and
//! owns a private scratch directory for rendered page artifacts. Dropping
//! the tracker closes every handle exactly once and deletes the scratch
//! directory, whether the merge succeeded or not. Failures during release
//! are logged and never replace the merge's own result.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tempfile::TempDir;
use tracing::{debug, warn};

use crate::error::{DtMergeError, Result};
use crate::io::{CompoundDocument, CompoundEngine};

/// Scoped cache of open compound documents plus a scratch directory.
pub struct ResourceTracker {
    engine: Arc<dyn CompoundEngine>,
    handles: HashMap<PathBuf, Box<dyn CompoundDocument>>,
    scratch: Option<TempDir>,
}

impl ResourceTracker {
    /// Create a tracker with a fresh private scratch directory.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the scratch directory cannot be created.
    pub fn new(engine: Arc<dyn CompoundEngine>) -> Result<Self> {
        let scratch = tempfile::Builder::new().prefix("dtmerge-").tempdir()?;
        debug!(scratch = %scratch.path().display(), "created scratch directory");

        Ok(Self {
            engine,
            handles: HashMap::new(),
            scratch: Some(scratch),
        })
    }

    /// Handle for `path`, opening the document on first use.
    ///
    /// # Errors
    ///
    /// Returns `SourceUnreadable` if the document cannot be opened. Nothing
    /// is cached in that case.
    pub fn handle_for(&mut self, path: &Path) -> Result<&mut (dyn CompoundDocument + 'static)> {
        let handle = match self.handles.entry(path.to_path_buf()) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                let handle = self.engine.open(path)?;
                debug!(path = %path.display(), "opened compound document");
                entry.insert(handle)
            }
        };

        Ok(handle.as_mut())
    }

    /// Location for the rendered artifact of the page at merge position `order`.
    pub fn artifact_path(&self, order: usize) -> PathBuf {
        self.scratch_dir().join(format!("compound_{order:05}.tif"))
    }

    /// Scratch directory owned by this tracker.
    pub fn scratch_dir(&self) -> &Path {
        self.scratch
            .as_ref()
            .map(TempDir::path)
            .unwrap_or_else(|| Path::new(""))
    }

    /// Number of documents opened so far.
    pub fn opened_count(&self) -> usize {
        self.handles.len()
    }

    /// Close every handle and remove the scratch directory.
    ///
    /// Called automatically on drop; calling it twice is harmless.
    pub fn release(&mut self) {
        for (path, mut handle) in self.handles.drain() {
            match handle.close() {
                Ok(()) => debug!(path = %path.display(), "closed compound document"),
                Err(err) => {
                    let err = DtMergeError::release_failure(&path, err.to_string());
                    warn!(error = %err, "ignoring release failure");
                }
            }
        }

        if let Some(scratch) = self.scratch.take() {
            let scratch_path = scratch.path().to_path_buf();
            if let Err(err) = scratch.close() {
                warn!(scratch = %scratch_path.display(), error = %err, "failed to remove scratch directory");
            }
        }
    }
}

impl Drop for ResourceTracker {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for ResourceTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceTracker")
            .field("opened", &self.handles.keys().collect::<Vec<_>>())
            .field("scratch", &self.scratch.as_ref().map(TempDir::path))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Counters {
        opened: AtomicUsize,
        closed: AtomicUsize,
    }

    struct FakeEngine {
        counters: Arc<Counters>,
        fail_close: bool,
    }

    struct FakeDocument {
        path: PathBuf,
        counters: Arc<Counters>,
        fail_close: bool,
    }

    impl CompoundDocument for FakeDocument {
        fn path(&self) -> &Path {
            &self.path
        }

        fn page_count(&self) -> usize {
            2
        }

        fn export_page(&mut self, _page_index: usize, destination: &Path, _dpi: u32) -> Result<()> {
            std::fs::write(destination, b"artifact")?;
            Ok(())
        }

        fn close(&mut self) -> Result<()> {
            self.counters.closed.fetch_add(1, Ordering::SeqCst);
            if self.fail_close {
                Err(DtMergeError::other("handle busy"))
            } else {
                Ok(())
            }
        }
    }

    impl CompoundEngine for FakeEngine {
        fn open(&self, path: &Path) -> Result<Box<dyn CompoundDocument>> {
            if path.ends_with("missing.xdw") {
                return Err(DtMergeError::source_unreadable(path, "no such document"));
            }
            self.counters.opened.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(FakeDocument {
                path: path.to_path_buf(),
                counters: Arc::clone(&self.counters),
                fail_close: self.fail_close,
            }))
        }
    }

    fn tracker(fail_close: bool) -> (ResourceTracker, Arc<Counters>) {
        let counters = Arc::new(Counters::default());
        let engine = FakeEngine {
            counters: Arc::clone(&counters),
            fail_close,
        };
        (ResourceTracker::new(Arc::new(engine)).unwrap(), counters)
    }

    #[test]
    fn test_handle_is_opened_once_per_path() {
        let (mut tracker, counters) = tracker(false);

        tracker.handle_for(Path::new("a.xdw")).unwrap();
        tracker.handle_for(Path::new("b.xdw")).unwrap();
        tracker.handle_for(Path::new("a.xdw")).unwrap();

        assert_eq!(counters.opened.load(Ordering::SeqCst), 2);
        assert_eq!(tracker.opened_count(), 2);
    }

    #[test]
    fn test_drop_closes_each_handle_once_and_removes_scratch() {
        let (mut tracker, counters) = tracker(false);
        tracker.handle_for(Path::new("a.xdw")).unwrap();
        tracker.handle_for(Path::new("b.xdw")).unwrap();

        let artifact = tracker.artifact_path(3);
        tracker
            .handle_for(Path::new("a.xdw"))
            .unwrap()
            .export_page(0, &artifact, 400)
            .unwrap();
        let scratch = tracker.scratch_dir().to_path_buf();
        assert!(artifact.exists());

        drop(tracker);

        assert_eq!(counters.closed.load(Ordering::SeqCst), 2);
        assert!(!scratch.exists());
    }

    #[test]
    fn test_release_failure_is_swallowed() {
        let (mut tracker, counters) = tracker(true);
        tracker.handle_for(Path::new("a.xdw")).unwrap();

        tracker.release();
        tracker.release();

        assert_eq!(counters.closed.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_open_failure_is_not_cached() {
        let (mut tracker, counters) = tracker(false);

        assert!(tracker.handle_for(Path::new("missing.xdw")).is_err());
        assert_eq!(tracker.opened_count(), 0);
        assert_eq!(counters.opened.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_artifact_names() {
        let (tracker, _) = tracker(false);
        let path = tracker.artifact_path(7);
        assert_eq!(path.file_name().unwrap(), "compound_00007.tif");
        assert!(path.starts_with(tracker.scratch_dir()));
    }
}
