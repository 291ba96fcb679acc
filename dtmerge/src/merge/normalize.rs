//! Pixel format adaptation for compression constraints.
//!
//! Group 4 only stores bi-level pages, so grayscale and color frames are
//! reduced to luma and binarized before encoding. Frames that are already
//! bi-level pass through untouched, which makes normalization idempotent.

use image::GrayImage;
use image::imageops::{self, BiLevel};
use imageproc::contrast::{ThresholdType, otsu_level, threshold};
use tracing::{debug, instrument};

use crate::config::{Binarization, CompressionScheme};
use crate::frame::Frame;

/// Adapts frames to the pixel formats a compression scheme accepts.
#[derive(Debug, Clone, Copy, Default)]
pub struct FrameNormalizer {
    binarization: Binarization,
}

impl FrameNormalizer {
    /// Create a normalizer using the given binarization method.
    pub fn new(binarization: Binarization) -> Self {
        Self { binarization }
    }

    /// Binarization method in use.
    pub fn binarization(&self) -> Binarization {
        self.binarization
    }

    /// Whether `frame` would be changed by [`normalize`](Self::normalize).
    pub fn needs_conversion(&self, frame: &Frame, scheme: CompressionScheme) -> bool {
        scheme.requires_bilevel() && !frame.is_bilevel()
    }

    /// Adapt `frame` to `scheme`.
    ///
    /// For Group 4 the result is always bi-level. For LZW the frame is
    /// returned unchanged.
    #[instrument(skip(self, frame), fields(width = frame.width(), height = frame.height()))]
    pub fn normalize(&self, frame: Frame, scheme: CompressionScheme) -> Frame {
        if !self.needs_conversion(&frame, scheme) {
            return frame;
        }

        debug!(format = ?frame.format(), method = ?self.binarization, "binarizing frame");
        let luma = frame.to_luma();
        Frame::from_luma_bilevel(&self.binarize(luma))
    }

    /// Reduce a luma image to pure black (0) and white (255).
    fn binarize(&self, mut luma: GrayImage) -> GrayImage {
        let (width, height) = luma.dimensions();
        if width == 0 || height == 0 {
            return luma;
        }

        match self.binarization {
            Binarization::Dither => {
                imageops::dither(&mut luma, &BiLevel);
                luma
            }
            Binarization::Otsu => {
                let level = otsu_level(&luma);
                threshold(&luma, level, ThresholdType::Binary)
            }
            Binarization::Threshold(level) => threshold(&luma, level, ThresholdType::Binary),
        }
    }
}
