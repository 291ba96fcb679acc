//! Ordered page assembly.
//!
//! The pipeline walks a page list in order, extracts each page through the
//! reader for its source kind, adapts it to the compression scheme and
//! collects the frames. Compound pages are rendered into the tracker's
//! scratch directory first and then decoded like any other TIFF.
//!
//! Any failure aborts the whole merge. The tracker is dropped before the
//! error reaches the caller, so open documents are closed and scratch files
//! are gone by the time the caller sees the error, and no output file is
//! written.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::task;
use tracing::{debug, info, instrument};

use crate::config::{CompressionScheme, Config, OUTPUT_DPI};
use crate::error::{DtMergeError, Result};
use crate::frame::Frame;
use crate::io::{PageSources, TiffWriter, WriteStatistics};
use crate::merge::normalize::FrameNormalizer;
use crate::merge::tracker::ResourceTracker;
use crate::source::{PageReference, SourceKind};

/// Statistics about a merge operation.
#[derive(Debug, Clone, Default)]
pub struct MergeStatistics {
    /// Pages in the merged sequence.
    pub total_pages: usize,

    /// Pages read from TIFF containers.
    pub raster_pages: usize,

    /// Pages rendered from compound documents.
    pub compound_pages: usize,

    /// Distinct compound documents opened.
    pub documents_opened: usize,

    /// Frames that had to be binarized.
    pub frames_converted: usize,

    /// Time spent extracting and normalizing pages.
    pub merge_time: Duration,
}

/// Frames produced by a merge, in output order.
#[derive(Debug)]
pub struct MergeOutput {
    /// Normalized frames.
    pub frames: Vec<Frame>,

    /// Merge statistics.
    pub statistics: MergeStatistics,
}

/// Result of a merge that was written to disk.
#[derive(Debug, Clone)]
pub struct MergeReport {
    /// Merge statistics.
    pub statistics: MergeStatistics,

    /// Write statistics.
    pub write: WriteStatistics,
}

/// Turns page lists into merged TIFF files.
#[derive(Debug, Clone)]
pub struct MergePipeline {
    sources: PageSources,
    normalizer: FrameNormalizer,
    writer: TiffWriter,
}

impl MergePipeline {
    /// Create a pipeline reading from `sources` with default settings.
    pub fn new(sources: PageSources) -> Self {
        Self {
            sources,
            normalizer: FrameNormalizer::default(),
            writer: TiffWriter::new(),
        }
    }

    /// Create a pipeline from a merge configuration.
    pub fn from_config(config: &Config) -> Self {
        Self::new(PageSources::from_renderer(config.renderer.clone()))
            .with_normalizer(FrameNormalizer::new(config.binarization))
    }

    /// Use a different frame normalizer.
    pub fn with_normalizer(mut self, normalizer: FrameNormalizer) -> Self {
        self.normalizer = normalizer;
        self
    }

    /// Use a different output writer.
    pub fn with_writer(mut self, writer: TiffWriter) -> Self {
        self.writer = writer;
        self
    }

    /// Readers used by this pipeline.
    pub fn sources(&self) -> &PageSources {
        &self.sources
    }

    /// Extract and normalize every page in order.
    ///
    /// # Errors
    ///
    /// Returns `NoPagesSelected` for an empty list, or the first
    /// `SourceUnreadable`, `PageIndexOutOfRange` or `DecodeFailure` raised
    /// while extracting a page.
    pub fn merge(&self, pages: &[PageReference], scheme: CompressionScheme) -> Result<MergeOutput> {
        self.merge_with_progress(pages, scheme, |_, _, _| {})
    }

    /// Like [`merge`](Self::merge), reporting `(done, total, page)` after each page.
    #[instrument(skip(self, pages, progress), fields(pages = pages.len(), %scheme))]
    pub fn merge_with_progress<F>(
        &self,
        pages: &[PageReference],
        scheme: CompressionScheme,
        mut progress: F,
    ) -> Result<MergeOutput>
    where
        F: FnMut(usize, usize, &PageReference),
    {
        if pages.is_empty() {
            return Err(DtMergeError::NoPagesSelected);
        }

        let start = Instant::now();
        let mut tracker = ResourceTracker::new(Arc::clone(&self.sources.compound))?;
        let mut frames = Vec::with_capacity(pages.len());
        let mut statistics = MergeStatistics::default();

        for (order, page) in pages.iter().enumerate() {
            let frame = self.extract(&mut tracker, page, order)?;

            match page.source_kind {
                SourceKind::RasterMultiFrame => statistics.raster_pages += 1,
                SourceKind::CompoundDocument => statistics.compound_pages += 1,
            }
            if self.normalizer.needs_conversion(&frame, scheme) {
                statistics.frames_converted += 1;
            }

            frames.push(self.normalizer.normalize(frame, scheme));
            debug!(order, page = %page, "assembled page");
            progress(order + 1, pages.len(), page);
        }

        statistics.documents_opened = tracker.opened_count();
        drop(tracker);

        statistics.total_pages = frames.len();
        statistics.merge_time = start.elapsed();
        info!(
            pages = statistics.total_pages,
            converted = statistics.frames_converted,
            "assembled all pages"
        );

        Ok(MergeOutput { frames, statistics })
    }

    /// Merge pages and write them to `output`.
    ///
    /// # Errors
    ///
    /// Any error from [`merge`](Self::merge), or `WriteFailure` from the
    /// writer. The output file is only created if every page succeeded.
    pub fn merge_to_file(
        &self,
        pages: &[PageReference],
        output: &Path,
        scheme: CompressionScheme,
    ) -> Result<MergeReport> {
        self.merge_to_file_with_progress(pages, output, scheme, |_, _, _| {})
    }

    /// Like [`merge_to_file`](Self::merge_to_file) with a progress callback.
    pub fn merge_to_file_with_progress<F>(
        &self,
        pages: &[PageReference],
        output: &Path,
        scheme: CompressionScheme,
        progress: F,
    ) -> Result<MergeReport>
    where
        F: FnMut(usize, usize, &PageReference),
    {
        let merged = self.merge_with_progress(pages, scheme, progress)?;
        let write = self.writer.write(&merged.frames, output, scheme)?;

        Ok(MergeReport {
            statistics: merged.statistics,
            write,
        })
    }

    fn extract(&self, tracker: &mut ResourceTracker, page: &PageReference, order: usize) -> Result<Frame> {
        let path = page.source_path.as_path();

        match page.source_kind {
            SourceKind::RasterMultiFrame => self.sources.raster.extract_frame(path, page.page_index),
            SourceKind::CompoundDocument => {
                let artifact = tracker.artifact_path(order);
                tracker
                    .handle_for(path)?
                    .export_page(page.page_index, &artifact, OUTPUT_DPI)?;

                self.sources
                    .raster
                    .extract_frame(&artifact, 0)
                    .map_err(|err| DtMergeError::decode_failure(path, page.page_index, err.to_string()))
            }
        }
    }
}

/// Run [`MergePipeline::merge_to_file_with_progress`] on the blocking thread pool.
///
/// # Errors
///
/// Same as [`MergePipeline::merge_to_file`].
pub async fn run_merge<F>(
    pipeline: MergePipeline,
    pages: Vec<PageReference>,
    output: PathBuf,
    scheme: CompressionScheme,
    progress: F,
) -> Result<MergeReport>
where
    F: FnMut(usize, usize, &PageReference) + Send + 'static,
{
    task::spawn_blocking(move || pipeline.merge_to_file_with_progress(&pages, &output, scheme, progress))
        .await
        .map_err(|e| DtMergeError::other(format!("Merge task failed: {e}")))?
}
