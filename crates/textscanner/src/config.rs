//! Configuration management for textscanner.
//!
//! This module provides configuration loading and validation using figment,
//! supporting TOML config files, environment variables, and defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::preprocess::PreprocessMode;

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Default config directory name.
const CONFIG_DIR_NAME: &str = "textscanner";

/// Prefix for environment variable overrides.
const ENV_PREFIX: &str = "TEXTSCANNER_";

/// Valid camera index range.
const CAMERA_INDEX_RANGE: std::ops::RangeInclusive<u32> = 0..=10;

/// Valid frame width range in pixels.
const FRAME_WIDTH_RANGE: std::ops::RangeInclusive<u32> = 320..=4096;

/// Valid frame height range in pixels.
const FRAME_HEIGHT_RANGE: std::ops::RangeInclusive<u32> = 240..=4096;

/// Valid frame rate range.
const FPS_RANGE: std::ops::RangeInclusive<u32> = 10..=120;

/// Application configuration.
///
/// Configuration is loaded from (in order of precedence, highest first):
/// 1. Environment variables (prefixed with `TEXTSCANNER_`, `__` between levels)
/// 2. TOML config file at `~/.config/textscanner/config.toml`
/// 3. Default values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Camera configuration.
    pub camera: CameraConfig,
    /// Preprocessing configuration.
    pub ocr: OcrConfig,
    /// Tesseract invocation settings.
    pub tesseract: TesseractConfig,
    /// Overlay drawing settings.
    pub display: DisplayConfig,
    /// Image file settings.
    pub files: FileConfig,
}

/// Camera-related configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// Camera device index (0 for the primary camera).
    pub camera_index: u32,
    /// Frame width in pixels.
    pub frame_width: u32,
    /// Frame height in pixels.
    pub frame_height: u32,
    /// Target frames per second.
    pub fps: u32,
    /// Path to the ffmpeg executable. Uses `PATH` when unset.
    pub ffmpeg_path: Option<PathBuf>,
}

/// Preprocessing configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrConfig {
    /// Preprocessing mode used when none is given.
    pub default_mode: PreprocessMode,
    /// Binary threshold used when none is given.
    pub default_threshold: u8,
    /// Median blur kernel size (odd).
    pub noise_filter_kernel: u32,
    /// Repetitions of each morphological close/open pass.
    pub morphology_iterations: u32,
    /// Neighbourhood size for adaptive thresholding (odd).
    pub adaptive_threshold_block_size: u32,
    /// Constant subtracted from the local mean in adaptive thresholding.
    pub adaptive_threshold_c: i16,
}

/// Tesseract invocation settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TesseractConfig {
    /// Recognition language(s), e.g. `eng` or `eng+deu`.
    pub lang: String,
    /// Page segmentation mode (0-13).
    pub psm: i32,
    /// OCR engine mode (0-3).
    pub oem: i32,
    /// Input resolution hint.
    pub dpi: Option<i32>,
}

/// Overlay drawing settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// Text box outline color as RGB.
    pub box_color: [u8; 3],
    /// Text box outline thickness in pixels.
    pub box_thickness: u32,
}

/// Image file settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    /// Accepted file extensions, lowercase without the dot.
    pub supported_image_formats: Vec<String>,
    /// Maximum accepted width or height in pixels.
    pub max_image_dimension: u32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            camera_index: 0,
            frame_width: 640,
            frame_height: 480,
            fps: 30,
            ffmpeg_path: None,
        }
    }
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            default_mode: PreprocessMode::Grayscale,
            default_threshold: 127,
            noise_filter_kernel: 5,
            morphology_iterations: 1,
            adaptive_threshold_block_size: 11,
            adaptive_threshold_c: 2,
        }
    }
}

impl Default for TesseractConfig {
    fn default() -> Self {
        Self {
            lang: "eng".to_string(),
            psm: 3,
            oem: 3,
            dpi: None,
        }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            box_color: [0, 255, 0],
            box_thickness: 2,
        }
    }
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            supported_image_formats: default_image_formats(),
            max_image_dimension: 4096,
        }
    }
}

/// Default accepted image extensions.
fn default_image_formats() -> Vec<String> {
    ["jpg", "jpeg", "png", "bmp", "tiff", "tif"]
        .into_iter()
        .map(String::from)
        .collect()
}

impl Config {
    /// Load configuration from all sources.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load configuration with an optional custom config path.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load_from(config_path: Option<PathBuf>) -> Result<Self> {
        let config_file = config_path.unwrap_or_else(Self::default_config_path);

        let figment = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(&config_file))
            .merge(Env::prefixed(ENV_PREFIX).split("__"));

        let config: Config = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Get the default configuration file path.
    #[must_use]
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join(CONFIG_DIR_NAME)
            .join(CONFIG_FILE_NAME)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid.
    pub fn validate(&self) -> Result<()> {
        let camera = &self.camera;
        check_range("camera_index", camera.camera_index, &CAMERA_INDEX_RANGE)?;
        check_range("frame_width", camera.frame_width, &FRAME_WIDTH_RANGE)?;
        check_range("frame_height", camera.frame_height, &FRAME_HEIGHT_RANGE)?;
        check_range("fps", camera.fps, &FPS_RANGE)?;

        let ocr = &self.ocr;
        check_odd("noise_filter_kernel", ocr.noise_filter_kernel, 1)?;
        check_odd(
            "adaptive_threshold_block_size",
            ocr.adaptive_threshold_block_size,
            3,
        )?;

        let tess = &self.tesseract;
        if tess.lang.trim().is_empty() {
            return Err(Error::config_validation("tesseract lang must not be empty"));
        }
        if !(0..=13).contains(&tess.psm) {
            return Err(Error::config_validation(format!(
                "psm must be between 0 and 13, got {}",
                tess.psm
            )));
        }
        if !(0..=3).contains(&tess.oem) {
            return Err(Error::config_validation(format!(
                "oem must be between 0 and 3, got {}",
                tess.oem
            )));
        }
        if tess.dpi.is_some_and(|dpi| dpi <= 0) {
            return Err(Error::config_validation("dpi must be greater than 0"));
        }

        if self.display.box_thickness == 0 {
            return Err(Error::config_validation(
                "box_thickness must be greater than 0",
            ));
        }

        if self.files.max_image_dimension == 0 {
            return Err(Error::config_validation(
                "max_image_dimension must be greater than 0",
            ));
        }
        if self.files.supported_image_formats.is_empty() {
            return Err(Error::config_validation(
                "supported_image_formats must not be empty",
            ));
        }

        Ok(())
    }

    /// Check whether `path` has one of the supported image extensions.
    #[must_use]
    pub fn is_supported_image(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase)
            .is_some_and(|ext| {
                self.files
                    .supported_image_formats
                    .iter()
                    .any(|f| f.eq_ignore_ascii_case(&ext))
            })
    }

    /// Get the delay between camera frames.
    #[must_use]
    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(1000 / u64::from(self.camera.fps.max(1)))
    }

    /// Render the tesseract options as command-line flags.
    #[must_use]
    pub fn tesseract_args_string(&self) -> String {
        format!(
            "--psm {} --oem {} -l {}",
            self.tesseract.psm, self.tesseract.oem, self.tesseract.lang
        )
    }
}

fn check_range(
    name: &str,
    value: u32,
    range: &std::ops::RangeInclusive<u32>,
) -> Result<()> {
    if range.contains(&value) {
        Ok(())
    } else {
        Err(Error::config_validation(format!(
            "{name} must be between {} and {}, got {value}",
            range.start(),
            range.end()
        )))
    }
}

fn check_odd(name: &str, value: u32, min: u32) -> Result<()> {
    if value < min || value % 2 == 0 {
        return Err(Error::config_validation(format!(
            "{name} must be an odd number of at least {min}, got {value}"
        )));
    }
    Ok(())
}
