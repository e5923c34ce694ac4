//! macOS-specific camera plumbing for textscanner.
//!
//! Cameras are read through ffmpeg's `avfoundation` input, which addresses
//! video devices by their numeric index.

#![cfg(target_os = "macos")]
#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

/// Initialize macOS-specific components.
///
/// The first camera read triggers the system camera permission prompt, so
/// there is nothing to check up front.
///
/// # Errors
///
/// Returns an error if initialization fails.
pub fn init() -> Result<(), Box<dyn std::error::Error>> {
    tracing::info!("Initializing macOS platform components");
    Ok(())
}

/// Get the platform name.
#[must_use]
pub fn platform_name() -> &'static str {
    "macOS"
}

/// The ffmpeg input format used for cameras.
#[must_use]
pub fn capture_format() -> &'static str {
    "avfoundation"
}

/// The ffmpeg input name for camera `index`.
///
/// `avfoundation` takes `video:audio`; audio is not captured.
#[must_use]
pub fn device_name(index: u32) -> String {
    format!("{index}:none")
}
