//! Camera capture through an ffmpeg child process.
//!
//! ffmpeg opens the platform capture device and writes raw `rgb24` frames to
//! stdout, one `width * height * 3` byte block per frame.

use std::path::PathBuf;
use std::process::Stdio;

use image::RgbImage;
use tokio::io::AsyncReadExt;
use tokio::process::{Child, ChildStdout, Command};
use tracing::{debug, info, warn};

use super::{Frame, FrameSource};
use crate::config::CameraConfig;
use crate::error::{Error, Result};

const DEFAULT_FFMPEG: &str = "ffmpeg";

/// Where and how to capture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CameraDevice {
    /// ffmpeg input format (`v4l2`, `avfoundation`).
    pub input_format: String,
    /// Device name as ffmpeg expects it.
    pub device: String,
    /// Requested frame width.
    pub width: u32,
    /// Requested frame height.
    pub height: u32,
    /// Requested frames per second.
    pub fps: u32,
    /// ffmpeg binary; `None` searches `PATH`.
    pub ffmpeg_path: Option<PathBuf>,
}

impl CameraDevice {
    /// Build a device from the `[camera]` settings and the platform's naming.
    #[must_use]
    pub fn from_config(
        config: &CameraConfig,
        input_format: impl Into<String>,
        device: impl Into<String>,
    ) -> Self {
        Self {
            input_format: input_format.into(),
            device: device.into(),
            width: config.frame_width,
            height: config.frame_height,
            fps: config.fps,
            ffmpeg_path: config.ffmpeg_path.clone(),
        }
    }

    /// Bytes in one raw frame.
    #[must_use]
    pub fn frame_len(&self) -> usize {
        self.width as usize * self.height as usize * 3
    }

    /// The ffmpeg program to run.
    #[must_use]
    pub fn program(&self) -> PathBuf {
        self.ffmpeg_path
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_FFMPEG))
    }

    /// Command-line arguments for ffmpeg.
    #[must_use]
    pub fn ffmpeg_args(&self) -> Vec<String> {
        vec![
            "-hide_banner".to_string(),
            "-loglevel".to_string(),
            "error".to_string(),
            "-f".to_string(),
            self.input_format.clone(),
            "-video_size".to_string(),
            format!("{}x{}", self.width, self.height),
            "-framerate".to_string(),
            self.fps.to_string(),
            "-i".to_string(),
            self.device.clone(),
            // Force the output size even if the device picked another mode
            "-vf".to_string(),
            format!("scale={}:{}", self.width, self.height),
            "-f".to_string(),
            "rawvideo".to_string(),
            "-pix_fmt".to_string(),
            "rgb24".to_string(),
            "-".to_string(),
        ]
    }
}

/// A camera read through ffmpeg.
#[derive(Debug)]
pub struct FfmpegCamera {
    device: CameraDevice,
    child: Option<Child>,
    stdout: Option<ChildStdout>,
    read: u64,
}

impl FfmpegCamera {
    /// Create a closed camera for `device`.
    #[must_use]
    pub fn new(device: CameraDevice) -> Self {
        Self {
            device,
            child: None,
            stdout: None,
            read: 0,
        }
    }

    /// The device this camera captures from.
    #[must_use]
    pub fn device(&self) -> &CameraDevice {
        &self.device
    }
}

#[async_trait::async_trait]
impl FrameSource for FfmpegCamera {
    fn name(&self) -> &str {
        &self.device.device
    }

    async fn open(&mut self) -> Result<()> {
        if self.child.is_some() {
            return Err(Error::CameraAlreadyRunning);
        }

        let program = self.device.program();
        let args = self.device.ffmpeg_args();
        debug!(program = %program.display(), ?args, "Spawning ffmpeg");

        let mut child = Command::new(&program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                Error::camera_open(
                    self.device.device.clone(),
                    format!("failed to start {}: {e}", program.display()),
                )
            })?;

        let Some(stdout) = child.stdout.take() else {
            let _ = child.kill().await;
            return Err(Error::camera_open(
                self.device.device.clone(),
                "ffmpeg stdout was not captured",
            ));
        };

        info!(
            device = %self.device.device,
            format = %self.device.input_format,
            width = self.device.width,
            height = self.device.height,
            fps = self.device.fps,
            "Camera opened"
        );
        self.child = Some(child);
        self.stdout = Some(stdout);
        self.read = 0;
        Ok(())
    }

    async fn next_frame(&mut self) -> Result<Option<Frame>> {
        let Some(stdout) = self.stdout.as_mut() else {
            return Err(Error::CameraNotRunning);
        };

        let mut buf = vec![0u8; self.device.frame_len()];
        match stdout.read_exact(&mut buf).await {
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                if self.read == 0 {
                    // ffmpeg exited before producing anything: the device did not open
                    return Err(Error::camera_open(
                        self.device.device.clone(),
                        "ffmpeg produced no frames",
                    ));
                }
                debug!(device = %self.device.device, "Camera stream ended");
                return Ok(None);
            }
            Err(e) => return Err(Error::camera_read(e.to_string())),
        }

        let image = RgbImage::from_raw(self.device.width, self.device.height, buf)
            .ok_or_else(|| Error::camera_read("frame buffer size mismatch"))?;
        self.read += 1;
        Ok(Some(Frame::new(self.read, image)))
    }

    async fn close(&mut self) {
        self.stdout = None;
        if let Some(mut child) = self.child.take() {
            if let Err(e) = child.kill().await {
                warn!(error = %e, "Failed to stop ffmpeg");
            }
            debug!(device = %self.device.device, frames = self.read, "Camera closed");
        }
    }

    fn is_open(&self) -> bool {
        self.child.is_some()
    }

    fn resolution(&self) -> (u32, u32) {
        if self.is_open() {
            (self.device.width, self.device.height)
        } else {
            (0, 0)
        }
    }

    fn frame_count(&self) -> u64 {
        self.read
    }
}

/// Whether an ffmpeg binary can be run.
pub async fn ffmpeg_available(path: Option<&std::path::Path>) -> bool {
    let program = path.map_or_else(|| PathBuf::from(DEFAULT_FFMPEG), std::path::Path::to_path_buf);
    Command::new(program)
        .arg("-version")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await
        .is_ok_and(|status| status.success())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn device() -> CameraDevice {
        CameraDevice::from_config(&CameraConfig::default(), "v4l2", "/dev/video0")
    }

    #[test]
    fn test_device_from_config() {
        let dev = device();
        assert_eq!(dev.width, 640);
        assert_eq!(dev.height, 480);
        assert_eq!(dev.fps, 30);
        assert_eq!(dev.frame_len(), 640 * 480 * 3);
        assert_eq!(dev.program(), PathBuf::from("ffmpeg"));
    }

    #[test]
    fn test_ffmpeg_args() {
        let args = device().ffmpeg_args();
        let joined = args.join(" ");
        assert!(joined.contains("-f v4l2"));
        assert!(joined.contains("-video_size 640x480"));
        assert!(joined.contains("-framerate 30"));
        assert!(joined.contains("-i /dev/video0"));
        assert!(joined.contains("-pix_fmt rgb24"));
        assert_eq!(args.last().map(String::as_str), Some("-"));
    }

    #[test]
    fn test_custom_ffmpeg_path() {
        let mut config = CameraConfig::default();
        config.ffmpeg_path = Some(PathBuf::from("/opt/ffmpeg/bin/ffmpeg"));
        let dev = CameraDevice::from_config(&config, "avfoundation", "0:none");
        assert_eq!(dev.program(), PathBuf::from("/opt/ffmpeg/bin/ffmpeg"));
    }

    #[tokio::test]
    async fn test_open_missing_binary_fails() {
        let mut dev = device();
        dev.ffmpeg_path = Some(PathBuf::from("/nonexistent/ffmpeg"));
        let mut camera = FfmpegCamera::new(dev);

        let err = camera.open().await.unwrap_err();
        assert!(err.is_camera_error());
        assert!(!camera.is_open());
        assert_eq!(camera.resolution(), (0, 0));
    }

    #[tokio::test]
    async fn test_read_before_open_fails() {
        let mut camera = FfmpegCamera::new(device());
        let err = camera.next_frame().await.unwrap_err();
        assert!(matches!(err, Error::CameraNotRunning));
    }

    #[tokio::test]
    async fn test_close_when_not_open() {
        let mut camera = FfmpegCamera::new(device());
        camera.close().await;
        assert!(!camera.is_open());
    }

    /// A camera whose ffmpeg is a shell script with `body`.
    #[cfg(unix)]
    fn scripted_camera(dir: &tempfile::TempDir, body: &str) -> FfmpegCamera {
        use std::os::unix::fs::PermissionsExt;

        let script = dir.path().join("ffmpeg");
        std::fs::write(&script, format!("#!/bin/sh\n{body}\n")).unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let mut dev = device();
        dev.width = 320;
        dev.height = 240;
        dev.ffmpeg_path = Some(script);
        FfmpegCamera::new(dev)
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_reads_frames_until_stream_ends() {
        let dir = tempfile::tempdir().unwrap();
        // One 320x240 rgb24 frame
        let mut camera = scripted_camera(&dir, "head -c 230400 /dev/zero");

        camera.open().await.unwrap();
        assert!(camera.is_open());
        assert_eq!(camera.resolution(), (320, 240));

        let frame = camera.next_frame().await.unwrap().expect("one frame");
        assert_eq!(frame.sequence, 1);
        assert_eq!(frame.image.dimensions(), (320, 240));

        assert!(camera.next_frame().await.unwrap().is_none());
        assert_eq!(camera.frame_count(), 1);
        camera.close().await;
        assert!(!camera.is_open());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_no_output_is_an_open_failure() {
        let dir = tempfile::tempdir().unwrap();
        let mut camera = scripted_camera(&dir, "exit 0");

        camera.open().await.unwrap();
        let err = camera.next_frame().await.unwrap_err();
        assert!(matches!(err, Error::CameraOpen { .. }), "{err:?}");
        camera.close().await;
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_partial_frame_ends_stream() {
        let dir = tempfile::tempdir().unwrap();
        // A frame and a half
        let mut camera = scripted_camera(&dir, "head -c 345600 /dev/zero");

        camera.open().await.unwrap();
        assert!(camera.next_frame().await.unwrap().is_some());
        assert!(camera.next_frame().await.unwrap().is_none());
        camera.close().await;
    }

    #[tokio::test]
    async fn test_ffmpeg_available_missing_binary() {
        assert!(!ffmpeg_available(Some(std::path::Path::new("/nonexistent/ffmpeg"))).await);
    }
}
