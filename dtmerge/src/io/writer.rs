//! Multi-page TIFF writing.
//!
//! This module serializes an ordered frame set into one TIFF container:
//! - One compression scheme for every page
//! - 400 DPI resolution tags on every page
//! - Atomic writes (encode in memory, write a temp file, then rename)
//! - Write statistics
//!
//! Group 4 pages are encoded with the `fax` crate and stored as a single
//! strip per page with `PhotometricInterpretation = WhiteIsZero`. Bi-level
//! LZW pages keep one bit per pixel in a single LZW strip. Gray and RGB LZW
//! pages go through the `tiff` crate's image encoder.
//!
//! # Examples
//!
//! ```no_run
//! use dtmerge::config::CompressionScheme;
//! use dtmerge::frame::Frame;
//! use dtmerge::io::TiffWriter;
//! use std::path::Path;
//!
//! # fn example() -> dtmerge::Result<()> {
//! let frames = vec![Frame::blank(3400, 4400)];
//! let stats = TiffWriter::new().write(&frames, Path::new("merged.tif"), CompressionScheme::Group4)?;
//! println!("Wrote {} page(s), {}", stats.pages, stats.format_file_size());
//! # Ok(())
//! # }
//! ```

use std::convert::Infallible;
use std::io::{Cursor, Seek, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use fax::encoder::Encoder as FaxEncoder;
use fax::{Color, VecWriter};
use tiff::encoder::compression::{CompressionAlgorithm, Lzw};
use tiff::encoder::{Compression, Rational, TiffEncoder, colortype};
use tiff::tags::{CompressionMethod, PhotometricInterpretation, ResolutionUnit, Tag};
use tokio::task;
use tracing::{debug, info, instrument};

use crate::config::{CompressionScheme, OUTPUT_DPI};
use crate::error::{DtMergeError, Result};
use crate::frame::{Frame, PixelFormat};
use crate::utils::format_file_size;

/// Options for writing TIFF files.
#[derive(Debug, Clone)]
pub struct WriteOptions {
    /// Use atomic writes (write to temp file, then rename).
    pub atomic: bool,

    /// Resolution written to every page, in dots per inch.
    pub dpi: u32,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            atomic: true,
            dpi: OUTPUT_DPI,
        }
    }
}

/// Statistics about a write operation.
#[derive(Debug, Clone)]
pub struct WriteStatistics {
    /// Time taken to encode and write the file.
    pub write_time: Duration,

    /// Size of the written file in bytes.
    pub file_size: u64,

    /// Path where the file was written.
    pub output_path: PathBuf,

    /// Number of pages in the container.
    pub pages: usize,

    /// Compression applied to every page.
    pub compression: CompressionScheme,
}

impl WriteStatistics {
    /// Format file size as human-readable string.
    pub fn format_file_size(&self) -> String {
        format_file_size(self.file_size)
    }
}

/// TIFF writer with configurable behavior.
#[derive(Debug, Clone, Default)]
pub struct TiffWriter {
    options: WriteOptions,
}

impl TiffWriter {
    /// Create a new writer with default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a writer with custom options.
    pub fn with_options(options: WriteOptions) -> Self {
        Self { options }
    }

    /// Create a writer without atomic writes.
    pub fn non_atomic() -> Self {
        Self {
            options: WriteOptions {
                atomic: false,
                ..Default::default()
            },
        }
    }

    /// Write frames as one multi-page TIFF.
    ///
    /// # Arguments
    ///
    /// * `frames` - Pages in output order
    /// * `path` - Output file path
    /// * `scheme` - Compression applied to every page
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - `frames` is empty (`NoPagesSelected`, nothing is created)
    /// - A frame cannot be encoded with `scheme` (`WriteFailure`)
    /// - The file cannot be created or renamed into place (`WriteFailure`)
    #[instrument(skip(self, frames, path), fields(path = %path.display(), pages = frames.len()))]
    pub fn write(&self, frames: &[Frame], path: &Path, scheme: CompressionScheme) -> Result<WriteStatistics> {
        if frames.is_empty() {
            return Err(DtMergeError::NoPagesSelected);
        }

        let start = Instant::now();
        let bytes = self
            .encode(frames, scheme)
            .map_err(|reason| DtMergeError::write_failure(path, reason))?;
        debug!(bytes = bytes.len(), "encoded TIFF container");

        if self.options.atomic {
            write_atomic(path, &bytes)?;
        } else {
            std::fs::write(path, &bytes).map_err(|err| DtMergeError::write_failure(path, err.to_string()))?;
        }

        let stats = WriteStatistics {
            write_time: start.elapsed(),
            file_size: bytes.len() as u64,
            output_path: path.to_path_buf(),
            pages: frames.len(),
            compression: scheme,
        };
        info!(size = %stats.format_file_size(), "wrote merged TIFF");
        Ok(stats)
    }

    /// Write frames on the blocking thread pool.
    ///
    /// # Errors
    ///
    /// Same as [`write`](Self::write).
    pub async fn write_async(
        &self,
        frames: Vec<Frame>,
        path: PathBuf,
        scheme: CompressionScheme,
    ) -> Result<WriteStatistics> {
        let writer = self.clone();
        task::spawn_blocking(move || writer.write(&frames, &path, scheme))
            .await
            .map_err(|e| DtMergeError::other(format!("Write task failed: {e}")))?
    }

    /// Encode frames into an in-memory TIFF container.
    ///
    /// # Errors
    ///
    /// Returns a description of the problem if a frame cannot be encoded.
    pub fn encode(&self, frames: &[Frame], scheme: CompressionScheme) -> std::result::Result<Vec<u8>, String> {
        let mut buffer = Cursor::new(Vec::new());
        match scheme {
            CompressionScheme::Group4 => encode_group4(&mut buffer, frames, self.options.dpi)?,
            CompressionScheme::Lzw => encode_lzw(&mut buffer, frames, self.options.dpi)?,
        }
        Ok(buffer.into_inner())
    }
}

fn tiff_err(err: tiff::TiffError) -> String {
    err.to_string()
}

fn encode_lzw(buffer: &mut Cursor<Vec<u8>>, frames: &[Frame], dpi: u32) -> std::result::Result<(), String> {
    let mut encoder = TiffEncoder::new(buffer)
        .map_err(tiff_err)?
        .with_compression(Compression::Lzw);
    let resolution = Rational { n: dpi, d: 1 };

    for frame in frames {
        let (width, height) = (frame.width(), frame.height());
        match frame.format() {
            PixelFormat::Rgb8 => {
                let mut image = encoder
                    .new_image::<colortype::RGB8>(width, height)
                    .map_err(tiff_err)?;
                image.resolution(ResolutionUnit::Inch, resolution.clone());
                image.write_data(frame.data()).map_err(tiff_err)?;
            }
            PixelFormat::Gray8 => {
                let mut image = encoder
                    .new_image::<colortype::Gray8>(width, height)
                    .map_err(tiff_err)?;
                image.resolution(ResolutionUnit::Inch, resolution.clone());
                image.write_data(frame.data()).map_err(tiff_err)?;
            }
            PixelFormat::BiLevel => {
                // Packed rows already use 1 = white, which is BlackIsZero at one bit.
                let mut strip = Vec::new();
                Lzw.write_to(&mut strip, frame.data())
                    .map_err(|err| err.to_string())?;
                let page = BilevelPage {
                    frame,
                    strip: &strip,
                    compression: CompressionMethod::LZW,
                    photometric: PhotometricInterpretation::BlackIsZero,
                };
                page.write(&mut encoder, dpi)?;
            }
        }
    }

    Ok(())
}

fn encode_group4(buffer: &mut Cursor<Vec<u8>>, frames: &[Frame], dpi: u32) -> std::result::Result<(), String> {
    let mut encoder = TiffEncoder::new(buffer).map_err(tiff_err)?;

    for (index, frame) in frames.iter().enumerate() {
        if !frame.is_bilevel() {
            return Err(format!(
                "page {} is {:?}; Group 4 requires bi-level pages",
                index + 1,
                frame.format()
            ));
        }
        let strip = group4_strip(frame)
            .ok_or_else(|| format!("page {} is wider than 65535 pixels", index + 1))?;
        let page = BilevelPage {
            frame,
            strip: &strip,
            compression: CompressionMethod::Fax4,
            photometric: PhotometricInterpretation::WhiteIsZero,
        };
        page.write(&mut encoder, dpi)?;
    }

    Ok(())
}

/// One-bit page stored as a single pre-compressed strip.
struct BilevelPage<'a> {
    frame: &'a Frame,
    strip: &'a [u8],
    compression: CompressionMethod,
    photometric: PhotometricInterpretation,
}

impl BilevelPage<'_> {
    fn write<W: Write + Seek>(&self, encoder: &mut TiffEncoder<W>, dpi: u32) -> std::result::Result<(), String> {
        let strip_len = u32::try_from(self.strip.len()).map_err(|err| err.to_string())?;
        let (width, height) = (self.frame.width(), self.frame.height());

        let mut directory = encoder.image_directory().map_err(tiff_err)?;
        let offset = directory.write_data(self.strip).map_err(tiff_err)?;
        let offset = u32::try_from(offset).map_err(|err| err.to_string())?;

        directory.write_tag(Tag::ImageWidth, width).map_err(tiff_err)?;
        directory.write_tag(Tag::ImageLength, height).map_err(tiff_err)?;
        directory.write_tag(Tag::BitsPerSample, 1u16).map_err(tiff_err)?;
        directory
            .write_tag(Tag::Compression, self.compression.to_u16())
            .map_err(tiff_err)?;
        directory
            .write_tag(Tag::PhotometricInterpretation, self.photometric.to_u16())
            .map_err(tiff_err)?;
        directory.write_tag(Tag::StripOffsets, offset).map_err(tiff_err)?;
        directory.write_tag(Tag::SamplesPerPixel, 1u16).map_err(tiff_err)?;
        directory.write_tag(Tag::RowsPerStrip, height).map_err(tiff_err)?;
        directory.write_tag(Tag::StripByteCounts, strip_len).map_err(tiff_err)?;
        directory
            .write_tag(Tag::XResolution, Rational { n: dpi, d: 1 })
            .map_err(tiff_err)?;
        directory
            .write_tag(Tag::YResolution, Rational { n: dpi, d: 1 })
            .map_err(tiff_err)?;
        directory
            .write_tag(Tag::ResolutionUnit, ResolutionUnit::Inch.to_u16())
            .map_err(tiff_err)?;
        directory.finish().map_err(tiff_err)
    }
}

/// Encode a bi-level frame as one CCITT Group 4 strip.
///
/// Returns `None` if the frame is too wide for the fax encoder.
fn group4_strip(frame: &Frame) -> Option<Vec<u8>> {
    let width = u16::try_from(frame.width()).ok()?;
    let mut encoder = FaxEncoder::new(VecWriter::new());

    for row in frame.rows() {
        let pels = fax::slice_bits(row)
            .take(usize::from(width))
            .map(|white| if white { Color::White } else { Color::Black });
        if let Err(never) = encoder.encode_line(pels, width) {
            match never {}
        }
    }

    let writer: std::result::Result<VecWriter, Infallible> = encoder.finish();
    match writer {
        Ok(writer) => Some(writer.finish()),
        Err(never) => match never {},
    }
}

/// Write `bytes` next to `path` and rename the result into place.
///
/// Nothing is left at `path` if any step before the rename fails. A new file
/// gets the usual umask-derived mode; an overwritten file keeps its mode.
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let write_err = |err: std::io::Error| DtMergeError::write_failure(path, err.to_string());

    let mut builder = tempfile::Builder::new();
    builder.prefix(".dtmerge-").suffix(".tif.tmp");
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        builder.permissions(std::fs::Permissions::from_mode(0o666));
    }
    let mut temp = builder.tempfile_in(parent).map_err(write_err)?;

    if let Ok(existing) = std::fs::metadata(path) {
        temp.as_file()
            .set_permissions(existing.permissions())
            .map_err(write_err)?;
    }

    temp.write_all(bytes).and_then(|()| temp.flush()).map_err(write_err)?;

    temp.persist(path).map_err(|err| write_err(err.error))?;
    Ok(())
}
