//! In-memory raster pages.
//!
//! A [`Frame`] is one decoded page, independent of the file it came from.
//! Every source format is mapped onto one of three pixel layouts:
//!
//! - [`PixelFormat::BiLevel`]: 1 bit per pixel, most significant bit first,
//!   each row padded to a whole byte, `1` = white and `0` = black.
//! - [`PixelFormat::Gray8`]: 1 byte per pixel, `0` = black.
//! - [`PixelFormat::Rgb8`]: 3 bytes per pixel.

use image::{DynamicImage, GrayImage, Luma, RgbImage};
use serde::Serialize;

use crate::error::{DtMergeError, Result};

/// Pixel layout of a [`Frame`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PixelFormat {
    /// Packed 1-bit black and white.
    BiLevel,
    /// 8-bit grayscale.
    Gray8,
    /// 8-bit per channel RGB.
    Rgb8,
}

impl PixelFormat {
    /// Number of bytes in one row of `width` pixels.
    pub fn row_bytes(&self, width: u32) -> usize {
        let width = width as usize;
        match self {
            Self::BiLevel => width.div_ceil(8),
            Self::Gray8 => width,
            Self::Rgb8 => width * 3,
        }
    }
}

/// A decoded raster page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    width: u32,
    height: u32,
    format: PixelFormat,
    data: Vec<u8>,
}

impl Frame {
    /// Create a frame from raw pixel bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if `data` does not hold exactly `height` rows of the
    /// given format.
    pub fn new(width: u32, height: u32, format: PixelFormat, data: Vec<u8>) -> Result<Self> {
        let expected = format.row_bytes(width) * height as usize;
        if data.len() != expected {
            return Err(DtMergeError::other(format!(
                "{width}x{height} {format:?} frame needs {expected} bytes, got {}",
                data.len()
            )));
        }

        Ok(Self {
            width,
            height,
            format,
            data,
        })
    }

    /// A bi-level frame where every pixel is white.
    pub fn blank(width: u32, height: u32) -> Self {
        let data = vec![0xFF; PixelFormat::BiLevel.row_bytes(width) * height as usize];
        Self {
            width,
            height,
            format: PixelFormat::BiLevel,
            data,
        }
    }

    /// Width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Pixel layout.
    pub fn format(&self) -> PixelFormat {
        self.format
    }

    /// Raw pixel bytes.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Whether the frame is already 1 bit per pixel.
    pub fn is_bilevel(&self) -> bool {
        self.format == PixelFormat::BiLevel
    }

    /// Bytes per row.
    pub fn row_bytes(&self) -> usize {
        self.format.row_bytes(self.width)
    }

    /// Iterate over the rows of the frame.
    pub fn rows(&self) -> impl Iterator<Item = &[u8]> {
        // chunks() rejects a zero size; an empty row set still yields nothing
        self.data.chunks(self.row_bytes().max(1)).take(self.height as usize)
    }

    /// Whether the bi-level pixel at (`x`, `y`) is white.
    ///
    /// Returns `None` for other formats or coordinates outside the frame.
    pub fn is_white(&self, x: u32, y: u32) -> Option<bool> {
        if !self.is_bilevel() || x >= self.width || y >= self.height {
            return None;
        }
        let byte = self.data[y as usize * self.row_bytes() + (x / 8) as usize];
        Some(byte & (0x80 >> (x % 8)) != 0)
    }

    /// Luma rendition of the frame.
    ///
    /// Bi-level pixels expand to 0 and 255; RGB uses the `image` crate's
    /// Rec. 709 luma weights.
    pub fn to_luma(&self) -> GrayImage {
        match self.format {
            PixelFormat::Gray8 => GrayImage::from_raw(self.width, self.height, self.data.clone())
                .unwrap_or_else(|| GrayImage::new(self.width, self.height)),
            PixelFormat::Rgb8 => RgbImage::from_raw(self.width, self.height, self.data.clone())
                .map(|rgb| DynamicImage::ImageRgb8(rgb).into_luma8())
                .unwrap_or_else(|| GrayImage::new(self.width, self.height)),
            PixelFormat::BiLevel => GrayImage::from_fn(self.width, self.height, |x, y| {
                match self.is_white(x, y) {
                    Some(true) => Luma([255]),
                    _ => Luma([0]),
                }
            }),
        }
    }

    /// Pack a luma image into a bi-level frame.
    ///
    /// Pixels brighter than mid-gray become white, so an image that already
    /// only contains 0 and 255 is packed losslessly.
    pub fn from_luma_bilevel(image: &GrayImage) -> Self {
        let (width, height) = image.dimensions();
        let row_bytes = PixelFormat::BiLevel.row_bytes(width);
        let mut data = vec![0u8; row_bytes * height as usize];

        for (x, y, Luma([value])) in image.enumerate_pixels() {
            if *value > 127 {
                data[y as usize * row_bytes + (x / 8) as usize] |= 0x80 >> (x % 8);
            }
        }

        Self {
            width,
            height,
            format: PixelFormat::BiLevel,
            data,
        }
    }

    /// Gray8 copy of a bi-level frame; other formats are returned as-is.
    pub fn expand_to_gray8(&self) -> Self {
        if !self.is_bilevel() {
            return self.clone();
        }

        let luma = self.to_luma();
        Self {
            width: self.width,
            height: self.height,
            format: PixelFormat::Gray8,
            data: luma.into_raw(),
        }
    }
}
