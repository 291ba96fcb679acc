//! Multi-frame TIFF reading.
//!
//! Frames are decoded with the `tiff` crate directly because the `image`
//! crate only exposes the first page of a container. Every call opens the
//! file, walks the IFD chain to the requested page and drops the handle
//! before returning, so extracted frames never borrow from the source.
//!
//! Palette pages are not understood by the `tiff` decoder. Their strips are
//! decoded as plain gray indices from an in-memory copy whose photometric
//! tag is rewritten, and the indices are then looked up in `ColorMap`.
//!
//! # Examples
//!
//! ```no_run
//! use dtmerge::io::RasterReader;
//! use std::path::Path;
//!
//! # fn example() -> dtmerge::Result<()> {
//! let reader = RasterReader::new();
//! let pages = reader.page_count(Path::new("scan.tiff"))?;
//! let last = reader.extract_frame(Path::new("scan.tiff"), pages - 1)?;
//! println!("{}x{}", last.width(), last.height());
//! # Ok(())
//! # }
//! ```

use image::{DynamicImage, ImageBuffer};
use std::fs::File;
use std::io::{BufReader, Cursor, Read, Seek};
use std::path::Path;
use tiff::ColorType;
use tiff::decoder::{Decoder, DecodingResult, Limits};
use tiff::tags::{PhotometricInterpretation, Tag};
use tracing::{debug, instrument};

use crate::error::{DtMergeError, Result};
use crate::frame::{Frame, PixelFormat};

/// Reader for multi-frame TIFF files.
#[derive(Debug, Clone, Default)]
pub struct RasterReader {
    _private: (),
}

impl RasterReader {
    /// Create a new raster reader.
    pub fn new() -> Self {
        Self::default()
    }

    /// Count the frames in a TIFF container.
    ///
    /// # Errors
    ///
    /// Returns [`DtMergeError::SourceUnreadable`] if the file cannot be opened
    /// or its IFD chain is broken.
    #[instrument(skip(self, path), fields(path = %path.display()))]
    pub fn page_count(&self, path: &Path) -> Result<usize> {
        let mut decoder = open_decoder(path)?;
        let mut count = 1;

        while decoder.more_images() {
            decoder
                .next_image()
                .map_err(|err| DtMergeError::source_unreadable(path, err.to_string()))?;
            count += 1;
        }

        debug!(count, "counted TIFF frames");
        Ok(count)
    }

    /// Decode one frame of a TIFF container.
    ///
    /// # Arguments
    ///
    /// * `path` - TIFF file to read
    /// * `page_index` - Zero-based frame index
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The file cannot be opened (`SourceUnreadable`)
    /// - The container has `page_index` frames or fewer (`PageIndexOutOfRange`)
    /// - The frame data is corrupt or uses an unsupported layout (`DecodeFailure`)
    #[instrument(skip(self, path), fields(path = %path.display()))]
    pub fn extract_frame(&self, path: &Path, page_index: usize) -> Result<Frame> {
        let mut decoder = open_decoder(path)?;

        for current in 0..page_index {
            if !decoder.more_images() {
                return Err(DtMergeError::page_out_of_range(path, page_index, current + 1));
            }
            decoder
                .next_image()
                .map_err(|err| DtMergeError::decode_failure(path, current + 1, err.to_string()))?;
        }

        let decode_err = |err: tiff::TiffError| DtMergeError::decode_failure(path, page_index, err.to_string());
        let photometric = decoder
            .find_tag_unsigned::<u16>(Tag::PhotometricInterpretation)
            .map_err(decode_err)?;

        let frame = if photometric == Some(PhotometricInterpretation::RGBPalette.to_u16()) {
            read_palette_frame(&mut decoder, path, page_index)
        } else {
            let (width, height) = decoder.dimensions().map_err(decode_err)?;
            let color = decoder.colortype().map_err(decode_err)?;
            let pixels = decoder.read_image().map_err(decode_err)?;
            convert(width, height, color, pixels)
        }
        .map_err(|reason| DtMergeError::decode_failure(path, page_index, reason))?;

        debug!(
            width = frame.width(),
            height = frame.height(),
            format = ?frame.format(),
            "decoded TIFF frame"
        );
        Ok(frame)
    }
}

fn open_decoder(path: &Path) -> Result<Decoder<BufReader<File>>> {
    let file = File::open(path).map_err(|err| DtMergeError::source_unreadable(path, err.to_string()))?;

    // Engineering drawings at 400 DPI easily exceed the default buffer limits.
    Decoder::new(BufReader::new(file))
        .map(|decoder| decoder.with_limits(Limits::unlimited()))
        .map_err(|err| DtMergeError::source_unreadable(path, format!("not a valid TIFF file: {err}")))
}

/// Map a decoded TIFF buffer onto one of the frame layouts.
fn convert(
    width: u32,
    height: u32,
    color: ColorType,
    pixels: DecodingResult,
) -> std::result::Result<Frame, String> {
    let image = match (color, pixels) {
        (ColorType::Gray(1), DecodingResult::U8(data)) => {
            return Frame::new(width, height, PixelFormat::BiLevel, data).map_err(|err| err.to_string());
        }
        (ColorType::Gray(bits @ (2 | 4)), DecodingResult::U8(data)) => {
            let max = (1u16 << bits) - 1;
            let gray = unpack_samples(&data, width, height, bits)
                .into_iter()
                .map(|sample| (u16::from(sample) * 255 / max) as u8)
                .collect();
            return Frame::new(width, height, PixelFormat::Gray8, gray).map_err(|err| err.to_string());
        }
        (ColorType::Gray(8), DecodingResult::U8(data)) => {
            ImageBuffer::from_raw(width, height, data).map(DynamicImage::ImageLuma8)
        }
        (ColorType::Gray(16), DecodingResult::U16(data)) => {
            ImageBuffer::from_raw(width, height, data).map(DynamicImage::ImageLuma16)
        }
        (ColorType::GrayA(8), DecodingResult::U8(data)) => {
            ImageBuffer::from_raw(width, height, data).map(DynamicImage::ImageLumaA8)
        }
        (ColorType::GrayA(16), DecodingResult::U16(data)) => {
            ImageBuffer::from_raw(width, height, data).map(DynamicImage::ImageLumaA16)
        }
        (ColorType::RGB(8), DecodingResult::U8(data)) => {
            ImageBuffer::from_raw(width, height, data).map(DynamicImage::ImageRgb8)
        }
        (ColorType::RGB(16), DecodingResult::U16(data)) => {
            ImageBuffer::from_raw(width, height, data).map(DynamicImage::ImageRgb16)
        }
        (ColorType::RGBA(8), DecodingResult::U8(data)) => {
            ImageBuffer::from_raw(width, height, data).map(DynamicImage::ImageRgba8)
        }
        (ColorType::RGBA(16), DecodingResult::U16(data)) => {
            ImageBuffer::from_raw(width, height, data).map(DynamicImage::ImageRgba16)
        }
        (ColorType::CMYK(8), DecodingResult::U8(data)) => {
            ImageBuffer::from_raw(width, height, cmyk_to_rgb(&data)).map(DynamicImage::ImageRgb8)
        }
        (other, _) => return Err(format!("unsupported pixel layout {other:?}")),
    }
    .ok_or_else(|| format!("decoded buffer does not match {width}x{height}"))?;

    let frame = if image.color().has_color() {
        Frame::new(width, height, PixelFormat::Rgb8, image.into_rgb8().into_raw())
    } else {
        Frame::new(width, height, PixelFormat::Gray8, image.into_luma8().into_raw())
    };
    frame.map_err(|err| err.to_string())
}

/// Decode the current palette page of `decoder` into an RGB frame.
fn read_palette_frame<R: Read + Seek>(
    decoder: &mut Decoder<R>,
    path: &Path,
    page_index: usize,
) -> std::result::Result<Frame, String> {
    let tiff_err = |err: tiff::TiffError| err.to_string();
    let (width, height) = decoder.dimensions().map_err(tiff_err)?;
    let bits = decoder
        .get_tag_unsigned::<u8>(Tag::BitsPerSample)
        .map_err(tiff_err)?;
    if !matches!(bits, 1 | 2 | 4 | 8) {
        return Err(format!("unsupported palette depth of {bits} bits"));
    }
    let colormap = decoder.get_tag_u16_vec(Tag::ColorMap).map_err(tiff_err)?;
    let entries = 1usize << bits;
    if colormap.len() != 3 * entries {
        return Err(format!(
            "color map has {} values, expected {}",
            colormap.len(),
            3 * entries
        ));
    }
    let ifd = decoder
        .ifd_pointer()
        .ok_or_else(|| "palette page has no directory".to_string())?;

    let mut bytes = std::fs::read(path).map_err(|err| err.to_string())?;
    patch_photometric(&mut bytes, ifd.0, PhotometricInterpretation::BlackIsZero.to_u16())
        .ok_or_else(|| "palette directory could not be rewritten".to_string())?;

    let mut indexed = Decoder::new(Cursor::new(bytes))
        .map_err(tiff_err)?
        .with_limits(Limits::unlimited());
    indexed.seek_to_image(page_index).map_err(tiff_err)?;
    let indices = match indexed.read_image().map_err(tiff_err)? {
        DecodingResult::U8(data) => unpack_samples(&data, width, height, bits),
        _ => return Err("palette indices did not decode as bytes".to_string()),
    };

    let (reds, rest) = colormap.split_at(entries);
    let (greens, blues) = rest.split_at(entries);
    let rgb = indices
        .iter()
        .flat_map(|&index| {
            let i = usize::from(index);
            [reds[i], greens[i], blues[i]].map(|value| (value >> 8) as u8)
        })
        .collect();
    Frame::new(width, height, PixelFormat::Rgb8, rgb).map_err(|err| err.to_string())
}

/// Overwrite the `PhotometricInterpretation` entry of the IFD at `offset`.
///
/// Returns `None` if the directory or the entry cannot be located.
fn patch_photometric(bytes: &mut [u8], offset: u64, value: u16) -> Option<()> {
    let little = match bytes.get(..2)? {
        b"II" => true,
        b"MM" => false,
        _ => return None,
    };
    let bigtiff = read_u16(bytes, 2, little)? == 43;
    let offset = usize::try_from(offset).ok()?;
    let (count, first, entry_len) = if bigtiff {
        (usize::try_from(read_u64(bytes, offset, little)?).ok()?, offset + 8, 20)
    } else {
        (usize::from(read_u16(bytes, offset, little)?), offset + 2, 12)
    };

    for n in 0..count {
        let entry = first + n * entry_len;
        if read_u16(bytes, entry, little)? != Tag::PhotometricInterpretation.to_u16() {
            continue;
        }
        let at = entry + if bigtiff { 12 } else { 8 };
        // SHORT (3) or LONG (4), stored inline.
        return match read_u16(bytes, entry + 2, little)? {
            3 => {
                let raw = if little { value.to_le_bytes() } else { value.to_be_bytes() };
                bytes.get_mut(at..at + 2)?.copy_from_slice(&raw);
                Some(())
            }
            4 => {
                let value = u32::from(value);
                let raw = if little { value.to_le_bytes() } else { value.to_be_bytes() };
                bytes.get_mut(at..at + 4)?.copy_from_slice(&raw);
                Some(())
            }
            _ => None,
        };
    }
    None
}

fn read_u16(bytes: &[u8], at: usize, little: bool) -> Option<u16> {
    let raw: [u8; 2] = bytes.get(at..at + 2)?.try_into().ok()?;
    Some(if little { u16::from_le_bytes(raw) } else { u16::from_be_bytes(raw) })
}

fn read_u64(bytes: &[u8], at: usize, little: bool) -> Option<u64> {
    let raw: [u8; 8] = bytes.get(at..at + 8)?.try_into().ok()?;
    Some(if little { u64::from_le_bytes(raw) } else { u64::from_be_bytes(raw) })
}

/// Split packed rows of `bits`-wide samples into one byte per sample.
fn unpack_samples(data: &[u8], width: u32, height: u32, bits: u8) -> Vec<u8> {
    if bits == 8 {
        return data.to_vec();
    }
    let bits = usize::from(bits);
    let width = width as usize;
    let row_bytes = (width * bits).div_ceil(8);
    if row_bytes == 0 {
        return Vec::new();
    }
    let mask = (1u8 << bits) - 1;

    data.chunks(row_bytes)
        .take(height as usize)
        .flat_map(|row| {
            (0..width).map(move |x| {
                let bit = x * bits;
                let byte = row.get(bit / 8).copied().unwrap_or(0);
                (byte >> (8 - bits - bit % 8)) & mask
            })
        })
        .collect()
}

fn cmyk_to_rgb(data: &[u8]) -> Vec<u8> {
    data.chunks_exact(4)
        .flat_map(|px| {
            let k = 255 - u16::from(px[3]);
            let channel = |c: u8| ((255 - u16::from(c)) * k / 255) as u8;
            [channel(px[0]), channel(px[1]), channel(px[2])]
        })
        .collect()
}
