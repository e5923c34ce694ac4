//! `textscanner` - Optical character recognition for images and camera frames
//!
//! This library loads images or reads frames from a camera, applies one of
//! several preprocessing filters, and hands the result to the tesseract OCR
//! engine. An interactive [`Session`] keeps the state of a scanning window.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

pub mod camera;
pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod ocr;
pub mod overlay;
pub mod preprocess;
pub mod region;
pub mod scanner;
pub mod session;
pub mod shell;

pub use camera::{Frame, FrameSource, FramePump, PumpEvent};
pub use config::Config;
pub use error::{Error, Result};
pub use logging::init_logging;
pub use ocr::{OcrEngine, TesseractEngine, TextBox};
pub use preprocess::{PreprocessMode, Preprocessor};
pub use region::Roi;
pub use scanner::{OcrOutcome, ScanParams, Scanner};
pub use session::Session;
