//! Source readers and the output writer.
//!
//! - [`raster`]: multi-frame TIFF decoding
//! - [`compound`]: DocuWorks document handles and page rendering
//! - [`writer`]: multi-page TIFF encoding
//!
//! [`PageSources`] bundles both readers so callers can ask for page counts
//! without caring about the source kind.

pub mod compound;
pub mod raster;
pub mod writer;

pub use compound::{CommandEngine, CompoundDocument, CompoundEngine};
pub use raster::RasterReader;
pub use writer::{TiffWriter, WriteOptions, WriteStatistics};

use std::path::Path;
use std::sync::Arc;

use crate::config::RendererConfig;
use crate::error::Result;
use crate::source::SourceKind;

/// Readers for every supported source kind.
#[derive(Clone)]
pub struct PageSources {
    /// Reader for TIFF containers.
    pub raster: RasterReader,
    /// Engine for compound documents.
    pub compound: Arc<dyn CompoundEngine>,
}

impl PageSources {
    /// Bundle a raster reader with the given compound engine.
    pub fn new(compound: Arc<dyn CompoundEngine>) -> Self {
        Self {
            raster: RasterReader::new(),
            compound,
        }
    }

    /// Sources using an external renderer for compound documents.
    pub fn from_renderer(config: RendererConfig) -> Self {
        Self::new(Arc::new(CommandEngine::new(config)))
    }

    /// Number of pages in `path`, read with the reader for `kind`.
    ///
    /// # Errors
    ///
    /// Returns `SourceUnreadable` if the document cannot be opened.
    pub fn page_count(&self, path: &Path, kind: SourceKind) -> Result<usize> {
        match kind {
            SourceKind::RasterMultiFrame => self.raster.page_count(path),
            SourceKind::CompoundDocument => self.compound.page_count(path),
        }
    }
}

impl std::fmt::Debug for PageSources {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageSources")
            .field("raster", &self.raster)
            .finish_non_exhaustive()
    }
}
