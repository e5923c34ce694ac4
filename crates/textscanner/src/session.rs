//! Interactive scanning session.
//!
//! A [`Session`] is the state behind the scanner window: the image on
//! screen, the selected region, the preprocessing controls, whether the
//! camera is streaming, the status line and the text pane. Every user
//! action is a method that updates that state and sets the status line.

use std::path::Path;

use image::{GrayImage, RgbImage};
use tracing::{debug, info, warn};

use crate::camera::Frame;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::ocr::TextBox;
use crate::preprocess::PreprocessMode;
use crate::region::{DisplayRect, DisplaySize, Roi};
use crate::scanner::{save_image, ScanParams, Scanner};

/// Status shown before any action.
pub const STATUS_READY: &str = "Ready";

/// State of one scanning session.
#[derive(Debug)]
pub struct Session {
    scanner: Scanner,
    current_image: Option<RgbImage>,
    display_image: Option<RgbImage>,
    roi: Option<Roi>,
    params: ScanParams,
    camera_active: bool,
    status: String,
    text: String,
    boxes: Vec<TextBox>,
}

impl Session {
    /// Start a session with the configured default mode and threshold.
    #[must_use]
    pub fn new(config: &Config, scanner: Scanner) -> Self {
        Self {
            scanner,
            current_image: None,
            display_image: None,
            roi: None,
            params: ScanParams::from_config(config),
            camera_active: false,
            status: STATUS_READY.to_string(),
            text: String::new(),
            boxes: Vec::new(),
        }
    }

    /// The status line.
    #[must_use]
    pub fn status(&self) -> &str {
        &self.status
    }

    /// Contents of the text pane.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// The image OCR runs on.
    #[must_use]
    pub fn current_image(&self) -> Option<&RgbImage> {
        self.current_image.as_ref()
    }

    /// The image on screen, which may carry an overlay.
    #[must_use]
    pub fn display_image(&self) -> Option<&RgbImage> {
        self.display_image.as_ref()
    }

    /// Selected region in image coordinates.
    #[must_use]
    pub fn roi(&self) -> Option<Roi> {
        self.roi
    }

    /// Boxes from the last overlay.
    #[must_use]
    pub fn boxes(&self) -> &[TextBox] {
        &self.boxes
    }

    /// Current mode and threshold.
    #[must_use]
    pub fn params(&self) -> ScanParams {
        self.params
    }

    /// Whether the camera is streaming.
    #[must_use]
    pub fn camera_active(&self) -> bool {
        self.camera_active
    }

    fn set_status(&mut self, status: impl Into<String>) {
        self.status = status.into();
        debug!(status = %self.status, "Status changed");
    }

    fn set_image(&mut self, image: RgbImage) {
        self.display_image = Some(image.clone());
        self.current_image = Some(image);
        self.roi = None;
        self.boxes.clear();
    }

    /// Load an image file, replacing the current image.
    pub fn load_image(&mut self, path: &Path) {
        match self.scanner.load_image(path) {
            Ok(image) => {
                self.set_image(image);
                self.text.clear();
                let name = path
                    .file_name()
                    .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned());
                self.set_status(format!("Image loaded: {name}"));
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to load image");
                self.set_status("Error: Could not load image");
            }
        }
    }

    /// The camera delivered a frame.
    pub fn on_camera_frame(&mut self, frame: Frame) {
        self.set_image(frame.image);
    }

    /// The camera started streaming.
    pub fn camera_started(&mut self) {
        self.camera_active = true;
        self.set_status("Camera started");
    }

    /// The camera was stopped by the user.
    pub fn camera_stopped(&mut self) {
        self.camera_active = false;
        self.set_status("Camera stopped");
    }

    /// The camera failed or could not be opened.
    pub fn on_camera_error(&mut self, message: &str) {
        self.camera_active = false;
        self.set_status(format!("Camera error: {message}"));
    }

    /// Change the preprocessing mode.
    pub fn set_mode(&mut self, mode: PreprocessMode) {
        self.params.mode = mode;
    }

    /// Change the threshold, limited to 0-255.
    pub fn set_threshold(&mut self, value: i64) {
        self.params.threshold = u8::try_from(value.clamp(0, 255)).unwrap_or(u8::MAX);
    }

    /// Select a region given in image coordinates.
    ///
    /// The region is clamped into the current image when there is one.
    pub fn select_roi(&mut self, roi: Roi) {
        let roi = match &self.current_image {
            Some(image) => roi.clamp_to(image.width(), image.height()),
            None => roi,
        };
        self.roi = Some(roi);
        self.set_status(format!("Region selected: {roi}"));
    }

    /// Select a region dragged on a preview of size `display`.
    pub fn select_display_roi(&mut self, rect: DisplayRect, display: DisplaySize) {
        let Some(image) = &self.current_image else {
            self.set_status("No image loaded");
            return;
        };
        let (width, height) = image.dimensions();
        match Roi::from_display(rect, display, width, height) {
            Some(roi) => {
                self.roi = Some(roi);
                self.set_status(format!("Region selected: {roi}"));
            }
            None => self.set_status("Invalid ROI selection"),
        }
    }

    /// Drop the selected region.
    pub fn clear_roi(&mut self) {
        self.roi = None;
        self.set_status("ROI cleared");
    }

    /// Recognize text in the whole current image.
    pub fn ocr_full_image(&mut self) {
        let Some(image) = &self.current_image else {
            self.set_status("No image loaded");
            return;
        };

        self.text = match self.scanner.scan(image, self.params) {
            Ok(outcome) if outcome.is_empty() => "No text detected".to_string(),
            Ok(outcome) => outcome.text,
            Err(e) => engine_error_text(&e),
        };
        self.set_status("OCR complete - Full image processed");
    }

    /// Recognize text in the selected region.
    pub fn ocr_roi(&mut self) {
        let Some(roi) = self.roi else {
            self.set_status("Please select a region first");
            return;
        };
        let Some(image) = &self.current_image else {
            self.set_status("No image loaded");
            return;
        };

        self.text = match self.scanner.scan_roi(image, roi, self.params) {
            Ok(outcome) if outcome.is_empty() => "No text detected in ROI".to_string(),
            Ok(outcome) => outcome.text,
            Err(Error::EmptyRoi) => {
                self.set_status("Invalid ROI selection");
                return;
            }
            Err(e) => engine_error_text(&e),
        };
        self.set_status("OCR complete - ROI processed");
    }

    /// Outline detected words on a copy of the current image.
    pub fn show_overlay(&mut self) {
        let Some(image) = &self.current_image else {
            self.set_status("No image loaded");
            return;
        };

        let (annotated, boxes) = match self.scanner.overlay(image, self.params) {
            Ok(outcome) => (outcome.image, outcome.boxes),
            Err(e) => {
                warn!(error = %e, "Text box detection failed");
                (image.clone(), Vec::new())
            }
        };
        info!(count = boxes.len(), "Overlay drawn");
        self.set_status(format!(
            "Overlay complete - {} text regions detected",
            boxes.len()
        ));
        self.display_image = Some(annotated);
        self.boxes = boxes;
    }

    /// The current image after preprocessing.
    #[must_use]
    pub fn preview(&self) -> Option<GrayImage> {
        self.current_image
            .as_ref()
            .map(|image| self.scanner.preprocess(image, self.params))
    }

    /// Write the on-screen image to `path`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoImage`] if nothing is loaded, or an error if the
    /// file cannot be written.
    pub fn save_display(&self, path: &Path) -> Result<()> {
        let image = self.display_image.as_ref().ok_or(Error::NoImage)?;
        save_image(image, path)
    }

    /// Write the preprocessed preview to `path`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoImage`] if nothing is loaded, or an error if the
    /// file cannot be written.
    pub fn save_preview(&self, path: &Path) -> Result<()> {
        let preview = self.preview().ok_or(Error::NoImage)?;
        save_image(&preview, path)
    }
}

fn engine_error_text(error: &Error) -> String {
    warn!(error = %error, "OCR failed");
    format!("Error: {error}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ocr::tests::{text_box, FakeEngine};
    use std::sync::Arc;
    use std::sync::atomic::Ordering;

    fn session(engine: FakeEngine) -> (Session, Arc<FakeEngine>) {
        let config = Config::default();
        let engine = Arc::new(engine);
        let scanner = Scanner::with_engine(&config, engine.clone());
        (Session::new(&config, scanner), engine)
    }

    fn with_image(engine: FakeEngine) -> (Session, Arc<FakeEngine>) {
        let (mut session, engine) = session(engine);
        session.on_camera_frame(Frame::new(1, RgbImage::new(40, 30)));
        (session, engine)
    }

    #[test]
    fn test_initial_state() {
        let (session, _) = session(FakeEngine::default());
        assert_eq!(session.status(), "Ready");
        assert_eq!(session.params().mode, PreprocessMode::Grayscale);
        assert_eq!(session.params().threshold, 127);
        assert!(session.current_image().is_none());
        assert!(!session.camera_active());
    }

    #[test]
    fn test_load_image_success_and_failure() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("page.png");
        RgbImage::new(12, 8).save(&path).unwrap();

        let (mut session, _) = session(FakeEngine::default());
        session.load_image(&path);
        assert_eq!(session.status(), "Image loaded: page.png");
        assert_eq!(session.current_image().unwrap().dimensions(), (12, 8));

        session.load_image(&dir.path().join("missing.png"));
        assert_eq!(session.status(), "Error: Could not load image");
        // The previous image stays
        assert!(session.current_image().is_some());
    }

    #[test]
    fn test_load_image_clears_previous_results() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blank.png");
        RgbImage::new(12, 8).save(&path).unwrap();

        let (mut session, _) = with_image(FakeEngine::with_text("Invoice 42"));
        session.ocr_full_image();
        assert_eq!(session.text(), "Invoice 42");
        session.load_image(&path);
        assert_eq!(session.text(), "");

        let boxes = vec![text_box(1, 1, 10, 5, 91.0)];
        let (mut session, _) = with_image(FakeEngine::with_boxes(boxes));
        session.show_overlay();
        assert_eq!(session.boxes().len(), 1);
        session.load_image(&path);
        assert!(session.boxes().is_empty());
    }

    #[test]
    fn test_failed_load_keeps_text() {
        let dir = tempfile::tempdir().unwrap();
        let (mut session, _) = with_image(FakeEngine::with_text("Invoice 42"));
        session.ocr_full_image();
        session.load_image(&dir.path().join("missing.png"));
        assert_eq!(session.text(), "Invoice 42");
    }

    #[test]
    fn test_camera_frame_keeps_text() {
        let (mut session, _) = with_image(FakeEngine::with_text("Invoice 42"));
        session.ocr_full_image();
        session.on_camera_frame(Frame::new(2, RgbImage::new(40, 30)));
        assert_eq!(session.text(), "Invoice 42");
    }

    #[test]
    fn test_new_image_clears_roi() {
        let (mut session, _) = with_image(FakeEngine::default());
        session.select_roi(Roi::new(1, 1, 5, 5));
        assert!(session.roi().is_some());
        session.on_camera_frame(Frame::new(2, RgbImage::new(40, 30)));
        assert!(session.roi().is_none());
    }

    #[test]
    fn test_ocr_without_image() {
        let (mut session, engine) = session(FakeEngine::with_text("hello"));
        session.ocr_full_image();
        assert_eq!(session.status(), "No image loaded");
        session.show_overlay();
        assert_eq!(session.status(), "No image loaded");
        assert_eq!(engine.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_ocr_full_image() {
        let (mut session, _) = with_image(FakeEngine::with_text("Invoice 42"));
        session.ocr_full_image();
        assert_eq!(session.text(), "Invoice 42");
        assert_eq!(session.status(), "OCR complete - Full image processed");
    }

    #[test]
    fn test_ocr_full_image_no_text() {
        let (mut session, _) = with_image(FakeEngine::with_text("   "));
        session.ocr_full_image();
        assert_eq!(session.text(), "No text detected");
    }

    #[test]
    fn test_ocr_engine_error_goes_to_text_pane() {
        let (mut session, _) = with_image(FakeEngine::failing());
        session.ocr_full_image();
        assert!(session.text().starts_with("Error: "));
        assert!(session.text().contains("engine exploded"));
        assert_eq!(session.status(), "OCR complete - Full image processed");
    }

    #[test]
    fn test_ocr_roi_requires_region_before_image() {
        let (mut session, _) = session(FakeEngine::with_text("x"));
        session.ocr_roi();
        assert_eq!(session.status(), "Please select a region first");

        session.select_roi(Roi::new(0, 0, 5, 5));
        session.ocr_roi();
        assert_eq!(session.status(), "No image loaded");
    }

    #[test]
    fn test_ocr_roi() {
        let (mut session, _) = with_image(FakeEngine::with_text("Total"));
        session.select_roi(Roi::new(2, 3, 10, 5));
        assert_eq!(session.status(), "Region selected: 2,3 10x5");
        session.ocr_roi();
        assert_eq!(session.text(), "Total");
        assert_eq!(session.status(), "OCR complete - ROI processed");
    }

    #[test]
    fn test_ocr_roi_no_text() {
        let (mut session, _) = with_image(FakeEngine::with_text(""));
        session.select_roi(Roi::new(0, 0, 4, 4));
        session.ocr_roi();
        assert_eq!(session.text(), "No text detected in ROI");
    }

    #[test]
    fn test_ocr_roi_outside_image_is_invalid() {
        let (mut session, engine) = session(FakeEngine::with_text("x"));
        // Selected before any image, so it is not clamped
        session.select_roi(Roi::new(100, 100, 5, 5));
        session.on_camera_frame(Frame::new(1, RgbImage::new(40, 30)));
        session.select_roi(Roi::new(100, 100, 5, 5));
        // Clamped onto the last pixel
        assert_eq!(session.roi(), Some(Roi::new(39, 29, 1, 1)));

        session.roi = Some(Roi::new(100, 100, 5, 5));
        session.ocr_roi();
        assert_eq!(session.status(), "Invalid ROI selection");
        assert_eq!(engine.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_select_display_roi_scales() {
        let (mut session, _) = session(FakeEngine::default());
        session.on_camera_frame(Frame::new(1, RgbImage::new(200, 100)));
        let rect = DisplayRect::from_corners((50, 40), (10, 20));
        session.select_display_roi(rect, DisplaySize { width: 100, height: 50 });
        assert_eq!(session.roi(), Some(Roi::new(20, 40, 80, 40)));
        assert_eq!(session.status(), "Region selected: 20,40 80x40");
    }

    #[test]
    fn test_select_display_roi_without_image() {
        let (mut session, _) = session(FakeEngine::default());
        let rect = DisplayRect::from_corners((0, 0), (5, 5));
        session.select_display_roi(rect, DisplaySize { width: 10, height: 10 });
        assert_eq!(session.status(), "No image loaded");
        assert!(session.roi().is_none());
    }

    #[test]
    fn test_clear_roi() {
        let (mut session, _) = with_image(FakeEngine::default());
        session.select_roi(Roi::new(0, 0, 3, 3));
        session.clear_roi();
        assert!(session.roi().is_none());
        assert_eq!(session.status(), "ROI cleared");
    }

    #[test]
    fn test_show_overlay() {
        let boxes = vec![text_box(1, 1, 10, 5, 91.0), text_box(20, 10, 8, 6, 60.0)];
        let (mut session, _) = with_image(FakeEngine::with_boxes(boxes));
        session.show_overlay();
        assert_eq!(session.status(), "Overlay complete - 2 text regions detected");
        assert_eq!(session.boxes().len(), 2);
        // Overlay goes on screen, the OCR source stays clean
        assert_ne!(session.display_image(), session.current_image());
        assert!(session.current_image().unwrap().pixels().all(|p| p.0 == [0, 0, 0]));
    }

    #[test]
    fn test_show_overlay_engine_failure_reports_zero() {
        let (mut session, _) = with_image(FakeEngine::failing());
        session.show_overlay();
        assert_eq!(session.status(), "Overlay complete - 0 text regions detected");
    }

    #[test]
    fn test_camera_state_messages() {
        let (mut session, _) = session(FakeEngine::default());
        session.camera_started();
        assert!(session.camera_active());
        assert_eq!(session.status(), "Camera started");

        session.on_camera_error("device busy");
        assert!(!session.camera_active());
        assert_eq!(session.status(), "Camera error: device busy");

        session.camera_started();
        session.camera_stopped();
        assert!(!session.camera_active());
        assert_eq!(session.status(), "Camera stopped");
    }

    #[test]
    fn test_set_threshold_is_limited() {
        let (mut session, _) = session(FakeEngine::default());
        session.set_threshold(300);
        assert_eq!(session.params().threshold, 255);
        session.set_threshold(-4);
        assert_eq!(session.params().threshold, 0);
        session.set_threshold(90);
        assert_eq!(session.params().threshold, 90);
    }

    #[test]
    fn test_set_mode_changes_preview() {
        let (mut session, _) = with_image(FakeEngine::default());
        session.set_mode(PreprocessMode::Threshold);
        session.set_threshold(0);
        assert_eq!(session.params().mode, PreprocessMode::Threshold);
        let preview = session.preview().unwrap();
        assert_eq!(preview.dimensions(), (40, 30));
        // Black image is at or below any threshold
        assert!(preview.pixels().all(|p| p.0[0] == 0));
    }

    #[test]
    fn test_save_requires_image() {
        let dir = tempfile::tempdir().unwrap();
        let (session, _) = session(FakeEngine::default());
        let err = session.save_display(&dir.path().join("out.png")).unwrap_err();
        assert!(matches!(err, Error::NoImage));
    }

    #[test]
    fn test_save_display_and_preview() {
        let dir = tempfile::tempdir().unwrap();
        let (session, _) = with_image(FakeEngine::default());
        let shown = dir.path().join("shown.png");
        let preview = dir.path().join("preview.png");
        session.save_display(&shown).unwrap();
        session.save_preview(&preview).unwrap();
        assert!(shown.exists());
        assert!(preview.exists());
    }
}
