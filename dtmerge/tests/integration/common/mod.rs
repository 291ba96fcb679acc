//! Shared fixtures for the integration tests.
//!
//! TIFF fixtures are generated on the fly. DocuWorks documents are simulated
//! by [`FakeEngine`], which renders every page as a flat gray TIFF and
//! counts how often documents are opened and closed.

#![allow(dead_code)]

use std::collections::HashMap;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use dtmerge::error::{DtMergeError, Result};
use dtmerge::frame::Frame;
use dtmerge::io::{CompoundDocument, CompoundEngine, PageSources, RasterReader};
use tiff::decoder::{Decoder, ifd::Value};
use tiff::encoder::{TiffEncoder, colortype};
use tiff::tags::Tag;

/// Width of every generated page.
pub const PAGE_WIDTH: u32 = 8;
/// Height of every generated page.
pub const PAGE_HEIGHT: u32 = 6;

/// Write a grayscale TIFF with one flat page per shade.
pub fn write_gray_tiff(path: &Path, shades: &[u8]) {
    let pixels = (PAGE_WIDTH * PAGE_HEIGHT) as usize;
    let mut buffer = Cursor::new(Vec::new());
    {
        let mut encoder = TiffEncoder::new(&mut buffer).expect("create encoder");
        for shade in shades {
            encoder
                .write_image::<colortype::Gray8>(PAGE_WIDTH, PAGE_HEIGHT, &vec![*shade; pixels])
                .expect("encode page");
        }
    }
    std::fs::write(path, buffer.into_inner()).expect("write fixture");
}

/// Decode every page of a written TIFF.
pub fn read_pages(path: &Path) -> Vec<Frame> {
    let reader = RasterReader::new();
    let count = reader.page_count(path).expect("count pages");
    (0..count)
        .map(|index| reader.extract_frame(path, index).expect("decode page"))
        .collect()
}

/// Compression, bits per sample and X resolution of every page.
pub fn page_tags(path: &Path) -> Vec<(u16, u16, Value)> {
    let mut decoder = Decoder::new(std::fs::File::open(path).expect("open output")).expect("decode");
    let mut tags = Vec::new();
    loop {
        tags.push((
            decoder.get_tag_unsigned::<u16>(Tag::Compression).expect("compression"),
            decoder.get_tag_unsigned::<u16>(Tag::BitsPerSample).expect("bits"),
            decoder.get_tag(Tag::XResolution).expect("resolution"),
        ));
        if !decoder.more_images() {
            break;
        }
        decoder.next_image().expect("next page");
    }
    tags
}

/// First pixel value of a gray frame.
pub fn shade(frame: &Frame) -> u8 {
    frame.data()[0]
}

/// What a [`FakeDocument`] does when asked for a particular page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFault {
    /// Report a rendering failure.
    Crash,
    /// Write something that is not a TIFF.
    Garbage,
}

/// Open/close bookkeeping shared between an engine and its documents.
#[derive(Debug, Default)]
pub struct Counters {
    pub opened: AtomicUsize,
    pub closed: AtomicUsize,
    pub artifacts: Mutex<Vec<PathBuf>>,
}

impl Counters {
    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn artifacts(&self) -> Vec<PathBuf> {
        self.artifacts.lock().expect("artifact list").clone()
    }
}

/// In-memory DocuWorks stand-in. Documents need not exist on disk.
#[derive(Debug, Default)]
pub struct FakeEngine {
    documents: HashMap<PathBuf, Vec<u8>>,
    faults: HashMap<(PathBuf, usize), ExportFault>,
    counters: Arc<Counters>,
}

impl FakeEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a document whose pages render as the given shades.
    pub fn with_document(mut self, path: impl Into<PathBuf>, shades: &[u8]) -> Self {
        self.documents.insert(path.into(), shades.to_vec());
        self
    }

    /// Make one page fail when exported.
    pub fn with_fault(mut self, path: impl Into<PathBuf>, page_index: usize, fault: ExportFault) -> Self {
        self.faults.insert((path.into(), page_index), fault);
        self
    }

    pub fn counters(&self) -> Arc<Counters> {
        Arc::clone(&self.counters)
    }

    /// Wrap the engine into page sources, keeping a handle on the counters.
    pub fn into_sources(self) -> (PageSources, Arc<Counters>) {
        let counters = self.counters();
        (PageSources::new(Arc::new(self)), counters)
    }
}

impl CompoundEngine for FakeEngine {
    fn open(&self, path: &Path) -> Result<Box<dyn CompoundDocument>> {
        let shades = self
            .documents
            .get(path)
            .ok_or_else(|| DtMergeError::source_unreadable(path, "document is locked"))?;

        self.counters.opened.fetch_add(1, Ordering::SeqCst);
        let faults = self
            .faults
            .iter()
            .filter(|((doc, _), _)| doc == path)
            .map(|((_, index), fault)| (*index, *fault))
            .collect();

        Ok(Box::new(FakeDocument {
            path: path.to_path_buf(),
            shades: shades.clone(),
            faults,
            counters: Arc::clone(&self.counters),
        }))
    }
}

struct FakeDocument {
    path: PathBuf,
    shades: Vec<u8>,
    faults: HashMap<usize, ExportFault>,
    counters: Arc<Counters>,
}

impl CompoundDocument for FakeDocument {
    fn path(&self) -> &Path {
        &self.path
    }

    fn page_count(&self) -> usize {
        self.shades.len()
    }

    fn export_page(&mut self, page_index: usize, destination: &Path, _dpi: u32) -> Result<()> {
        let shade = *self
            .shades
            .get(page_index)
            .ok_or_else(|| DtMergeError::page_out_of_range(&self.path, page_index, self.shades.len()))?;

        match self.faults.get(&page_index) {
            Some(ExportFault::Crash) => {
                return Err(DtMergeError::decode_failure(&self.path, page_index, "renderer crashed"));
            }
            Some(ExportFault::Garbage) => std::fs::write(destination, b"not a tiff")?,
            None => write_gray_tiff(destination, &[shade]),
        }

        self.counters
            .artifacts
            .lock()
            .expect("artifact list")
            .push(destination.to_path_buf());
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.counters.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
