//! Preprocess-then-recognize pipeline.
//!
//! [`Scanner`] ties a [`Preprocessor`] to an [`OcrEngine`] and is what the
//! CLI and the interactive session call into.

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use image::{DynamicImage, GrayImage, RgbImage};
use serde::Serialize;
use tracing::{debug, info};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::ocr::{OcrEngine, TesseractEngine, TextBox};
use crate::overlay::{draw_boxes, BoxStyle};
use crate::preprocess::{PreprocessMode, Preprocessor};
use crate::region::Roi;

/// Per-call preprocessing parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ScanParams {
    /// Preprocessing mode.
    pub mode: PreprocessMode,
    /// Binary threshold (used by the threshold-based modes).
    pub threshold: u8,
}

impl ScanParams {
    /// Defaults from the `[ocr]` section.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            mode: config.ocr.default_mode,
            threshold: config.ocr.default_threshold,
        }
    }
}

/// Result of recognizing text in an image or region.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OcrOutcome {
    /// Recognized text, trimmed. Empty when nothing was found.
    pub text: String,
    /// Parameters the image was preprocessed with.
    #[serde(flatten)]
    pub params: ScanParams,
    /// The region scanned, if not the full image.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub roi: Option<Roi>,
    /// Wall time spent preprocessing and recognizing.
    #[serde(serialize_with = "serialize_millis")]
    pub elapsed: Duration,
}

impl OcrOutcome {
    /// Whether the engine found any text.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

/// Result of detecting text boxes.
#[derive(Debug, Clone, PartialEq)]
pub struct OverlayOutcome {
    /// Source image with boxes drawn on it.
    pub image: RgbImage,
    /// The boxes that were drawn.
    pub boxes: Vec<TextBox>,
}

/// Preprocesses images and hands them to the OCR engine.
#[derive(Clone)]
pub struct Scanner {
    preprocessor: Preprocessor,
    engine: Arc<dyn OcrEngine>,
    style: BoxStyle,
    max_dimension: u32,
}

impl std::fmt::Debug for Scanner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scanner")
            .field("preprocessor", &self.preprocessor)
            .field("engine", &self.engine.name())
            .field("style", &self.style)
            .field("max_dimension", &self.max_dimension)
            .finish()
    }
}

impl Scanner {
    /// Build a scanner backed by tesseract, configured from `config`.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self::with_engine(
            config,
            Arc::new(TesseractEngine::new(config.tesseract.clone())),
        )
    }

    /// Build a scanner around a specific engine.
    #[must_use]
    pub fn with_engine(config: &Config, engine: Arc<dyn OcrEngine>) -> Self {
        Self {
            preprocessor: Preprocessor::from_config(&config.ocr),
            engine,
            style: BoxStyle::from_config(&config.display),
            max_dimension: config.files.max_image_dimension,
        }
    }

    /// Name of the engine behind this scanner.
    #[must_use]
    pub fn engine_name(&self) -> &'static str {
        self.engine.name()
    }

    /// Run preprocessing only, for previews.
    #[must_use]
    pub fn preprocess(&self, image: &RgbImage, params: ScanParams) -> GrayImage {
        self.preprocessor.apply(
            &DynamicImage::ImageRgb8(image.clone()),
            params.mode,
            params.threshold,
        )
    }

    /// Recognize text in the whole image.
    ///
    /// # Errors
    ///
    /// Returns an error if the OCR engine fails.
    pub fn scan(&self, image: &RgbImage, params: ScanParams) -> Result<OcrOutcome> {
        self.scan_inner(image, params, None)
    }

    /// Recognize text inside `roi` only.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EmptyRoi`] if the region covers no pixels, or an
    /// error if the OCR engine fails.
    pub fn scan_roi(&self, image: &RgbImage, roi: Roi, params: ScanParams) -> Result<OcrOutcome> {
        let cropped = roi.crop(image).ok_or(Error::EmptyRoi)?;
        self.scan_inner(&cropped, params, Some(roi))
    }

    fn scan_inner(
        &self,
        image: &RgbImage,
        params: ScanParams,
        roi: Option<Roi>,
    ) -> Result<OcrOutcome> {
        let started = Instant::now();
        let processed = self.preprocess(image, params);
        let text = self.engine.recognize(&processed)?;
        let elapsed = started.elapsed();

        info!(
            engine = self.engine_name(),
            mode = %params.mode,
            threshold = params.threshold,
            width = image.width(),
            height = image.height(),
            chars = text.len(),
            elapsed_ms = elapsed.as_millis(),
            "OCR complete"
        );

        Ok(OcrOutcome {
            text,
            params,
            roi,
            elapsed,
        })
    }

    /// Detect word boxes in the whole image.
    ///
    /// # Errors
    ///
    /// Returns an error if the OCR engine fails.
    pub fn detect(&self, image: &RgbImage, params: ScanParams) -> Result<Vec<TextBox>> {
        let processed = self.preprocess(image, params);
        let boxes = self.engine.detect_boxes(&processed)?;
        debug!(count = boxes.len(), "Detected text regions");
        Ok(boxes)
    }

    /// Detect word boxes and draw them onto a copy of `image`.
    ///
    /// # Errors
    ///
    /// Returns an error if the OCR engine fails.
    pub fn overlay(&self, image: &RgbImage, params: ScanParams) -> Result<OverlayOutcome> {
        let boxes = self.detect(image, params)?;
        let annotated = draw_boxes(image, &boxes, self.style);
        Ok(OverlayOutcome {
            image: annotated,
            boxes,
        })
    }

    /// Load an image file, enforcing the configured size limit.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be decoded or is too large.
    pub fn load_image(&self, path: &Path) -> Result<RgbImage> {
        load_image(path, self.max_dimension)
    }
}

/// Decode an image file into RGB, rejecting images larger than `max_dimension`.
///
/// # Errors
///
/// Returns [`Error::ImageLoad`] if the file cannot be read or decoded, and
/// [`Error::ImageTooLarge`] if either side exceeds `max_dimension`.
pub fn load_image(path: &Path, max_dimension: u32) -> Result<RgbImage> {
    let decoded = image::open(path).map_err(|source| Error::ImageLoad {
        path: path.to_path_buf(),
        source,
    })?;

    let (width, height) = (decoded.width(), decoded.height());
    if width > max_dimension || height > max_dimension {
        return Err(Error::ImageTooLarge {
            width,
            height,
            max: max_dimension,
        });
    }

    debug!(path = %path.display(), width, height, "Loaded image");
    Ok(decoded.to_rgb8())
}

/// Encode `image` to `path`, picking the format from the extension.
///
/// # Errors
///
/// Returns [`Error::ImageSave`] if encoding or writing fails.
pub fn save_image<P, C>(image: &image::ImageBuffer<P, C>, path: &Path) -> Result<()>
where
    P: image::PixelWithColorType,
    [P::Subpixel]: image::EncodableLayout,
    C: std::ops::Deref<Target = [P::Subpixel]>,
{
    image.save(path).map_err(|source| Error::ImageSave {
        path: path.to_path_buf(),
        source,
    })?;
    debug!(path = %path.display(), "Saved image");
    Ok(())
}

fn serialize_millis<S: serde::Serializer>(d: &Duration, s: S) -> std::result::Result<S::Ok, S::Error> {
    #[allow(clippy::cast_possible_truncation)]
    s.serialize_u64(d.as_millis() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ocr::tests::{text_box, FakeEngine};
    use std::sync::atomic::Ordering;

    fn scanner(engine: FakeEngine) -> (Scanner, Arc<FakeEngine>) {
        let engine = Arc::new(engine);
        let scanner = Scanner::with_engine(&Config::default(), engine.clone());
        (scanner, engine)
    }

    fn page() -> RgbImage {
        RgbImage::from_pixel(50, 40, image::Rgb([240, 240, 240]))
    }

    fn params() -> ScanParams {
        ScanParams::from_config(&Config::default())
    }

    #[test]
    fn test_params_from_config() {
        let params = params();
        assert_eq!(params.mode, PreprocessMode::Grayscale);
        assert_eq!(params.threshold, 127);
    }

    #[test]
    fn test_scan_full_image() {
        let (scanner, engine) = scanner(FakeEngine::with_text("Hello World\n"));
        let outcome = scanner.scan(&page(), params()).unwrap();
        assert_eq!(outcome.text, "Hello World");
        assert!(outcome.roi.is_none());
        assert_eq!(engine.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_scan_roi_records_region() {
        let (scanner, _) = scanner(FakeEngine::with_text("ROI text"));
        let roi = Roi::new(5, 5, 10, 10);
        let outcome = scanner.scan_roi(&page(), roi, params()).unwrap();
        assert_eq!(outcome.roi, Some(roi));
        assert_eq!(outcome.text, "ROI text");
    }

    #[test]
    fn test_scan_roi_outside_image_is_empty() {
        let (scanner, engine) = scanner(FakeEngine::with_text("unused"));
        let err = scanner
            .scan_roi(&page(), Roi::new(100, 100, 5, 5), params())
            .unwrap_err();
        assert!(matches!(err, Error::EmptyRoi));
        assert_eq!(engine.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_scan_propagates_engine_error() {
        let (scanner, _) = scanner(FakeEngine::failing());
        let err = scanner.scan(&page(), params()).unwrap_err();
        assert!(err.to_string().contains("engine exploded"));
    }

    #[test]
    fn test_overlay_draws_boxes() {
        let boxes = vec![text_box(2, 2, 10, 8, 88.0), text_box(20, 10, 12, 8, 70.0)];
        let (scanner, _) = scanner(FakeEngine::with_boxes(boxes.clone()));
        let outcome = scanner.overlay(&page(), params()).unwrap();
        assert_eq!(outcome.boxes, boxes);
        assert_eq!(*outcome.image.get_pixel(2, 2), image::Rgb([0, 255, 0]));
        assert_eq!(*outcome.image.get_pixel(45, 35), image::Rgb([240, 240, 240]));
    }

    #[test]
    fn test_preprocess_threshold_preview() {
        let (scanner, _) = scanner(FakeEngine::default());
        let params = ScanParams {
            mode: PreprocessMode::Threshold,
            threshold: 200,
        };
        let preview = scanner.preprocess(&page(), params);
        assert_eq!(preview.dimensions(), (50, 40));
        assert!(preview.pixels().all(|p| p.0[0] == 255));
    }

    #[test]
    fn test_outcome_serializes_elapsed_as_millis() {
        let outcome = OcrOutcome {
            text: "x".to_string(),
            params: params(),
            roi: None,
            elapsed: Duration::from_millis(42),
        };
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["elapsed"], 42);
        assert_eq!(json["mode"], "grayscale");
        assert_eq!(json["threshold"], 127);
        assert!(json.get("roi").is_none());
    }

    #[test]
    fn test_load_and_save_image() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("page.png");
        save_image(&page(), &path).unwrap();

        let loaded = load_image(&path, 4096).unwrap();
        assert_eq!(loaded.dimensions(), (50, 40));
    }

    #[test]
    fn test_load_image_too_large() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("page.png");
        save_image(&page(), &path).unwrap();

        let err = load_image(&path, 45).unwrap_err();
        assert!(matches!(err, Error::ImageTooLarge { width: 50, .. }));
    }

    #[test]
    fn test_load_image_missing_file() {
        let err = load_image(Path::new("/nonexistent/page.png"), 4096).unwrap_err();
        assert!(matches!(err, Error::ImageLoad { .. }));
    }
}
