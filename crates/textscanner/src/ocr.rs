//! Text recognition through an external OCR engine.
//!
//! Recognition itself is delegated: [`TesseractEngine`] runs the `tesseract`
//! executable via `rusty-tesseract`. The [`OcrEngine`] trait is the seam the
//! rest of the crate talks to, so scanning logic does not care which engine
//! sits behind it.

use std::collections::HashMap;

use image::{DynamicImage, GrayImage};
use rusty_tesseract::{Args, Image};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::config::TesseractConfig;
use crate::error::Result;

/// A word-level detection reported by the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextBox {
    /// Left edge in pixels.
    pub x: u32,
    /// Top edge in pixels.
    pub y: u32,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Engine confidence, 0-100.
    pub confidence: f32,
    /// Recognized text for this box.
    pub text: String,
}

/// Something that can turn a preprocessed image into text.
pub trait OcrEngine: Send + Sync {
    /// Short engine name for logs.
    fn name(&self) -> &'static str;

    /// Recognize all text in `image`, trimmed of surrounding whitespace.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine fails or cannot be run.
    fn recognize(&self, image: &GrayImage) -> Result<String>;

    /// Detect word boxes in `image`.
    ///
    /// Only detections with a positive confidence are returned.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine fails or cannot be run.
    fn detect_boxes(&self, image: &GrayImage) -> Result<Vec<TextBox>>;
}

/// OCR engine backed by the `tesseract` command-line program.
#[derive(Debug, Clone)]
pub struct TesseractEngine {
    config: TesseractConfig,
}

impl TesseractEngine {
    /// Create an engine using the given tesseract settings.
    #[must_use]
    pub fn new(config: TesseractConfig) -> Self {
        Self { config }
    }

    /// Query the installed tesseract version.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::OcrUnavailable`] if tesseract is not installed.
    pub fn version() -> Result<String> {
        let raw = rusty_tesseract::get_tesseract_version()?;
        Ok(raw.lines().next().unwrap_or_default().trim().to_string())
    }

    fn args(&self) -> Args {
        Args {
            lang: self.config.lang.clone(),
            config_variables: HashMap::new(),
            dpi: self.config.dpi,
            psm: Some(self.config.psm),
            oem: Some(self.config.oem),
        }
    }

    fn to_tess_image(image: &GrayImage) -> Result<Image> {
        let dynamic = DynamicImage::ImageLuma8(image.clone());
        Ok(Image::from_dynamic_image(&dynamic)?)
    }
}

impl Default for TesseractEngine {
    fn default() -> Self {
        Self::new(TesseractConfig::default())
    }
}

impl OcrEngine for TesseractEngine {
    fn name(&self) -> &'static str {
        "tesseract"
    }

    fn recognize(&self, image: &GrayImage) -> Result<String> {
        if image.width() == 0 || image.height() == 0 {
            return Ok(String::new());
        }

        let input = Self::to_tess_image(image)?;
        let text = rusty_tesseract::image_to_string(&input, &self.args())?;
        let text = text.trim().to_string();
        debug!(chars = text.len(), "Tesseract recognition finished");
        Ok(text)
    }

    fn detect_boxes(&self, image: &GrayImage) -> Result<Vec<TextBox>> {
        if image.width() == 0 || image.height() == 0 {
            return Ok(Vec::new());
        }

        let input = Self::to_tess_image(image)?;
        let output = rusty_tesseract::image_to_data(&input, &self.args())?;
        let boxes = collect_boxes(output.data.into_iter().map(|d| RawDetection {
            left: d.left,
            top: d.top,
            width: d.width,
            height: d.height,
            conf: d.conf,
            text: d.text,
        }));
        debug!(boxes = boxes.len(), "Tesseract box detection finished");
        Ok(boxes)
    }
}

/// One row of engine layout data before filtering.
#[derive(Debug, Clone, PartialEq)]
struct RawDetection {
    left: i32,
    top: i32,
    width: i32,
    height: i32,
    conf: f32,
    text: String,
}

/// Keep rows with a whole-number confidence of at least 1 and a real box.
///
/// Tesseract reports page, block and line rows with confidence -1; those are
/// structural and dropped here. Words below 1% are noise.
fn collect_boxes(rows: impl IntoIterator<Item = RawDetection>) -> Vec<TextBox> {
    rows.into_iter()
        .filter(|row| row.conf >= 1.0)
        .filter_map(|row| {
            let x = u32::try_from(row.left).ok()?;
            let y = u32::try_from(row.top).ok()?;
            let width = u32::try_from(row.width).ok().filter(|w| *w > 0)?;
            let height = u32::try_from(row.height).ok().filter(|h| *h > 0)?;
            trace!(x, y, width, height, conf = row.conf, text = %row.text, "Text box");
            Some(TextBox {
                x,
                y,
                width,
                height,
                confidence: row.conf,
                text: row.text.trim().to_string(),
            })
        })
        .collect()
}
