//! Error types for textscanner.
//!
//! This module defines all error types used throughout the textscanner crate,
//! providing detailed context for debugging and user-friendly error messages.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for textscanner operations.
#[derive(Error, Debug)]
pub enum Error {
    // === Image Errors ===
    /// Failed to read or decode an image file.
    #[error("failed to load image {path}: {source}")]
    ImageLoad {
        /// Path to the image file.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: image::ImageError,
    },

    /// Failed to encode or write an image file.
    #[error("failed to save image {path}: {source}")]
    ImageSave {
        /// Path to the output file.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: image::ImageError,
    },

    /// The image exceeds the configured maximum dimension.
    #[error("image is {width}x{height}, larger than the {max}px limit")]
    ImageTooLarge {
        /// Image width in pixels.
        width: u32,
        /// Image height in pixels.
        height: u32,
        /// Configured maximum width or height.
        max: u32,
    },

    /// The file extension is not one of the supported image formats.
    #[error("unsupported image format: {path}")]
    UnsupportedFormat {
        /// Path to the rejected file.
        path: PathBuf,
    },

    // === Region Errors ===
    /// A region of interest could not be parsed or is malformed.
    #[error("invalid region: {message}")]
    InvalidRoi {
        /// Description of the problem.
        message: String,
    },

    /// The region of interest covers no pixels of the image.
    #[error("region selection is empty")]
    EmptyRoi,

    /// An operation needed an image but none is loaded.
    #[error("no image loaded")]
    NoImage,

    // === OCR Errors ===
    /// The OCR engine failed.
    #[error("OCR failed: {0}")]
    Ocr(String),

    /// The OCR engine is not installed or cannot be run.
    #[error("OCR engine unavailable: {0}")]
    OcrUnavailable(String),

    // === Camera Errors ===
    /// The camera could not be opened.
    #[error("failed to open camera '{device}': {message}")]
    CameraOpen {
        /// Device the camera was opened from.
        device: String,
        /// Description of what went wrong.
        message: String,
    },

    /// Reading a frame from the camera failed.
    #[error("failed to read camera frame: {0}")]
    CameraRead(String),

    /// The frame pump is already running.
    #[error("camera already running")]
    CameraAlreadyRunning,

    /// The frame pump is not running.
    #[error("camera not running")]
    CameraNotRunning,

    // === Configuration Errors ===
    /// Failed to load configuration.
    #[error("failed to load configuration: {0}")]
    ConfigLoad(Box<figment::Error>),

    /// Configuration validation failed.
    #[error("invalid configuration: {message}")]
    ConfigValidation {
        /// Description of the validation failure.
        message: String,
    },

    // === I/O Errors ===
    /// File system operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // === Generic Errors ===
    /// An internal error occurred (bug).
    #[error("internal error: {0}")]
    Internal(String),
}

/// A specialized Result type for textscanner operations.
pub type Result<T> = std::result::Result<T, Error>;

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Self::ConfigLoad(Box::new(err))
    }
}

impl From<rusty_tesseract::TessError> for Error {
    fn from(err: rusty_tesseract::TessError) -> Self {
        match err {
            rusty_tesseract::TessError::TesseractNotFoundError => {
                Self::OcrUnavailable("tesseract executable not found in PATH".to_string())
            }
            other => Self::Ocr(other.to_string()),
        }
    }
}

impl Error {
    /// Create a new OCR error.
    #[must_use]
    pub fn ocr(message: impl Into<String>) -> Self {
        Self::Ocr(message.into())
    }

    /// Create a new internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Create an invalid region error.
    #[must_use]
    pub fn invalid_roi(message: impl Into<String>) -> Self {
        Self::InvalidRoi {
            message: message.into(),
        }
    }

    /// Create a camera open error.
    #[must_use]
    pub fn camera_open(device: impl Into<String>, message: impl Into<String>) -> Self {
        Self::CameraOpen {
            device: device.into(),
            message: message.into(),
        }
    }

    /// Create a camera read error.
    #[must_use]
    pub fn camera_read(message: impl Into<String>) -> Self {
        Self::CameraRead(message.into())
    }

    /// Create a configuration validation error.
    #[must_use]
    pub fn config_validation(message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            message: message.into(),
        }
    }

    /// Check if this error means the OCR engine cannot be used at all.
    #[must_use]
    pub fn is_ocr_unavailable(&self) -> bool {
        matches!(self, Self::OcrUnavailable(_))
    }

    /// Check if this error is a camera problem.
    #[must_use]
    pub fn is_camera_error(&self) -> bool {
        matches!(
            self,
            Self::CameraOpen { .. }
                | Self::CameraRead(_)
                | Self::CameraAlreadyRunning
                | Self::CameraNotRunning
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::NoImage;
        assert_eq!(err.to_string(), "no image loaded");

        let err = Error::ocr("bad page");
        assert_eq!(err.to_string(), "OCR failed: bad page");
    }

    #[test]
    fn test_is_ocr_unavailable() {
        assert!(Error::OcrUnavailable("missing".to_string()).is_ocr_unavailable());
        assert!(!Error::ocr("other").is_ocr_unavailable());
    }

    #[test]
    fn test_tesseract_not_found_maps_to_unavailable() {
        let err: Error = rusty_tesseract::TessError::TesseractNotFoundError.into();
        assert!(err.is_ocr_unavailable());
        assert!(err.to_string().contains("tesseract"));
    }

    #[test]
    fn test_is_camera_error() {
        assert!(Error::camera_open("/dev/video0", "busy").is_camera_error());
        assert!(Error::camera_read("short read").is_camera_error());
        assert!(Error::CameraAlreadyRunning.is_camera_error());
        assert!(Error::CameraNotRunning.is_camera_error());
        assert!(!Error::EmptyRoi.is_camera_error());
    }

    #[test]
    fn test_camera_open_error_display() {
        let err = Error::camera_open("/dev/video2", "device busy");
        let msg = err.to_string();
        assert!(msg.contains("/dev/video2"));
        assert!(msg.contains("device busy"));
    }

    #[test]
    fn test_invalid_roi_display() {
        let err = Error::invalid_roi("expected four values");
        assert_eq!(err.to_string(), "invalid region: expected four values");
    }

    #[test]
    fn test_image_too_large_display() {
        let err = Error::ImageTooLarge {
            width: 5000,
            height: 300,
            max: 4096,
        };
        let msg = err.to_string();
        assert!(msg.contains("5000x300"));
        assert!(msg.contains("4096"));
    }

    #[test]
    fn test_unsupported_format_display() {
        let err = Error::UnsupportedFormat {
            path: PathBuf::from("/tmp/notes.txt"),
        };
        assert!(err.to_string().contains("/tmp/notes.txt"));
    }

    #[test]
    fn test_config_validation_error_display() {
        let err = Error::config_validation("fps out of range");
        assert!(err.to_string().contains("fps out of range"));
    }

    #[test]
    fn test_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();
        assert!(err.to_string().contains("file not found"));
    }

    #[test]
    fn test_image_load_error_display() {
        let result = image::open("/nonexistent/picture.png");
        if let Err(source) = result {
            let err = Error::ImageLoad {
                path: PathBuf::from("/nonexistent/picture.png"),
                source,
            };
            assert!(err.to_string().contains("/nonexistent/picture.png"));
        }
    }

    #[test]
    fn test_internal_error() {
        let err = Error::internal("something went wrong");
        assert_eq!(err.to_string(), "internal error: something went wrong");
    }
}
