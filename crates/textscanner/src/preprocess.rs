//! Image preprocessing ahead of OCR.
//!
//! Every mode starts from the same base: convert to 8-bit grayscale and run a
//! median blur to knock out sensor noise. The mode then decides what happens
//! to the denoised image.

use std::fmt;
use std::str::FromStr;

use image::{DynamicImage, GrayImage, Luma};
use imageproc::distance_transform::Norm;
use imageproc::filter::{gaussian_blur_f32, median_filter};
use imageproc::morphology::{close, open};
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::config::OcrConfig;
use crate::error::Error;

/// How an image is prepared before it is handed to the OCR engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PreprocessMode {
    /// Denoised grayscale.
    #[default]
    Grayscale,
    /// Global binary threshold.
    Threshold,
    /// Gaussian-weighted local threshold, for uneven lighting.
    AdaptiveThreshold,
    /// Binary threshold cleaned up with closing then opening.
    Morphological,
}

impl PreprocessMode {
    /// All modes, in menu order.
    pub const ALL: [Self; 4] = [
        Self::Grayscale,
        Self::Threshold,
        Self::AdaptiveThreshold,
        Self::Morphological,
    ];

    /// Whether the mode uses the binary threshold value.
    #[must_use]
    pub fn uses_threshold(self) -> bool {
        matches!(self, Self::Threshold | Self::Morphological)
    }
}

impl fmt::Display for PreprocessMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Grayscale => write!(f, "Grayscale"),
            Self::Threshold => write!(f, "Threshold"),
            Self::AdaptiveThreshold => write!(f, "Adaptive Threshold"),
            Self::Morphological => write!(f, "Morphological"),
        }
    }
}

impl FromStr for PreprocessMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .trim()
            .chars()
            .filter(|c| !matches!(c, ' ' | '-' | '_'))
            .flat_map(char::to_lowercase)
            .collect();

        match normalized.as_str() {
            "grayscale" | "greyscale" | "gray" | "grey" => Ok(Self::Grayscale),
            "threshold" | "binary" => Ok(Self::Threshold),
            "adaptivethreshold" | "adaptive" => Ok(Self::AdaptiveThreshold),
            "morphological" | "morph" => Ok(Self::Morphological),
            _ => Err(Error::config_validation(format!(
                "unknown preprocessing mode '{s}'"
            ))),
        }
    }
}

/// Applies the configured preprocessing pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Preprocessor {
    median_radius: u32,
    block_size: u32,
    adaptive_c: i16,
    morphology_iterations: u8,
}

impl Default for Preprocessor {
    fn default() -> Self {
        Self::from_config(&OcrConfig::default())
    }
}

impl Preprocessor {
    /// Build a preprocessor from the `[ocr]` settings.
    #[must_use]
    pub fn from_config(config: &OcrConfig) -> Self {
        Self {
            median_radius: config.noise_filter_kernel / 2,
            block_size: config.adaptive_threshold_block_size.max(3),
            adaptive_c: config.adaptive_threshold_c,
            morphology_iterations: u8::try_from(config.morphology_iterations)
                .unwrap_or(u8::MAX),
        }
    }

    /// Run `mode` over `image`.
    ///
    /// An image with no pixels comes back as an empty grayscale image.
    #[must_use]
    pub fn apply(&self, image: &DynamicImage, mode: PreprocessMode, threshold: u8) -> GrayImage {
        let gray = image.to_luma8();
        if gray.width() == 0 || gray.height() == 0 {
            return gray;
        }

        trace!(
            %mode,
            threshold,
            width = gray.width(),
            height = gray.height(),
            "Preprocessing image"
        );

        let denoised = self.denoise(&gray);
        match mode {
            PreprocessMode::Grayscale => denoised,
            PreprocessMode::Threshold => binary_threshold(&denoised, threshold),
            PreprocessMode::AdaptiveThreshold => {
                adaptive_gaussian_threshold(&denoised, self.block_size, self.adaptive_c)
            }
            PreprocessMode::Morphological => {
                let binary = binary_threshold(&denoised, threshold);
                self.morph_clean(&binary)
            }
        }
    }

    fn denoise(&self, gray: &GrayImage) -> GrayImage {
        if self.median_radius == 0 {
            return gray.clone();
        }
        median_filter(gray, self.median_radius, self.median_radius)
    }

    /// Close small gaps in strokes, then drop specks, with a 3x3 square.
    ///
    /// Repeating a 3x3 pass `n` times is the same as one pass with a square
    /// of radius `n`.
    fn morph_clean(&self, binary: &GrayImage) -> GrayImage {
        let k = self.morphology_iterations;
        if k == 0 {
            return binary.clone();
        }
        let closed = close(binary, Norm::LInf, k);
        open(&closed, Norm::LInf, k)
    }
}

/// Set pixels brighter than `threshold` to white and the rest to black.
#[must_use]
pub fn binary_threshold(image: &GrayImage, threshold: u8) -> GrayImage {
    let mut out = image.clone();
    for pixel in out.pixels_mut() {
        pixel.0[0] = if pixel.0[0] > threshold { 255 } else { 0 };
    }
    out
}

/// Threshold each pixel against a Gaussian-weighted mean of its neighbourhood.
///
/// A pixel turns white when it is brighter than the local mean minus `c`.
/// The Gaussian sigma is derived from `block_size` so that the weights cover
/// the block.
#[must_use]
pub fn adaptive_gaussian_threshold(image: &GrayImage, block_size: u32, c: i16) -> GrayImage {
    #[allow(clippy::cast_precision_loss)]
    let sigma = 0.3 * ((block_size as f32 - 1.0) * 0.5 - 1.0) + 0.8;
    let mean = gaussian_blur_f32(image, sigma);

    GrayImage::from_fn(image.width(), image.height(), |x, y| {
        let value = i16::from(image.get_pixel(x, y).0[0]);
        let local = i16::from(mean.get_pixel(x, y).0[0]);
        if value > local - c {
            Luma([255])
        } else {
            Luma([0])
        }
    })
}
