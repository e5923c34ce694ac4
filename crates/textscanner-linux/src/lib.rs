//! Linux-specific camera plumbing for textscanner
//!
//! Cameras are exposed by Video4Linux as `/dev/videoN` character devices and
//! read through ffmpeg's `v4l2` demuxer.

#![cfg(target_os = "linux")]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

/// Directory holding the video device nodes.
const DEVICE_DIR: &str = "/dev";

/// Initialize Linux-specific components
///
/// # Errors
///
/// Returns an error if initialization fails
pub fn init() -> Result<(), Box<dyn std::error::Error>> {
    let devices = list_devices();
    if devices.is_empty() {
        tracing::warn!("No /dev/video* devices found; live camera will be unavailable");
    } else {
        tracing::debug!(count = devices.len(), "Found video devices");
    }
    Ok(())
}

/// Get platform name
#[must_use]
pub fn platform_name() -> &'static str {
    "Linux"
}

/// The ffmpeg input format used for cameras.
#[must_use]
pub fn capture_format() -> &'static str {
    "v4l2"
}

/// The ffmpeg input name for camera `index`.
#[must_use]
pub fn device_name(index: u32) -> String {
    format!("{DEVICE_DIR}/video{index}")
}

/// List the video device nodes present, sorted.
#[must_use]
pub fn list_devices() -> Vec<String> {
    let Ok(entries) = std::fs::read_dir(DEVICE_DIR) else {
        return Vec::new();
    };

    let mut devices: Vec<String> = entries
        .filter_map(Result::ok)
        .filter_map(|entry| entry.file_name().into_string().ok())
        .filter(|name| {
            name.strip_prefix("video")
                .is_some_and(|n| !n.is_empty() && n.chars().all(|c| c.is_ascii_digit()))
        })
        .map(|name| format!("{DEVICE_DIR}/{name}"))
        .collect();
    devices.sort();
    devices
}
