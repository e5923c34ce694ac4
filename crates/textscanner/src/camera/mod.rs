//! Live frame capture.
//!
//! A [`FrameSource`] produces frames on demand: a camera read through ffmpeg
//! ([`FfmpegCamera`]) or a directory of images replayed as a stream
//! ([`ImageSequence`]). The [`FramePump`] polls one source on a background
//! task and feeds frames to a single consumer.

mod ffmpeg;
mod pump;
mod sequence;

use std::time::Duration;

use chrono::{DateTime, Utc};
use image::RgbImage;

use crate::error::Result;

pub use ffmpeg::{ffmpeg_available, CameraDevice, FfmpegCamera};
pub use pump::{FramePump, PumpEvent, PumpHandle, PumpStats};
pub use sequence::ImageSequence;

/// Default delay between frame reads (about 30 frames per second).
pub const DEFAULT_FRAME_INTERVAL: Duration = Duration::from_millis(33);

/// One captured frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    /// Position of this frame in the source's output, starting at 1.
    pub sequence: u64,
    /// When the frame was read.
    pub captured_at: DateTime<Utc>,
    /// The pixels.
    pub image: RgbImage,
}

impl Frame {
    /// Wrap an image read just now.
    #[must_use]
    pub fn new(sequence: u64, image: RgbImage) -> Self {
        Self {
            sequence,
            captured_at: Utc::now(),
            image,
        }
    }

    /// Frame width and height.
    #[must_use]
    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }
}

/// A producer of frames.
///
/// Sources are opened once, read until they return `Ok(None)` or fail, and
/// closed. Closing must be safe to call more than once.
#[async_trait::async_trait]
pub trait FrameSource: Send {
    /// Name of this source (for logging).
    fn name(&self) -> &str;

    /// Acquire the underlying device or files.
    ///
    /// # Errors
    ///
    /// Returns an error if the source cannot be opened.
    async fn open(&mut self) -> Result<()>;

    /// Read the next frame. `Ok(None)` marks the end of the stream.
    ///
    /// # Errors
    ///
    /// Returns an error if reading fails.
    async fn next_frame(&mut self) -> Result<Option<Frame>>;

    /// Release the underlying device or files.
    async fn close(&mut self);

    /// Whether the source is open.
    fn is_open(&self) -> bool;

    /// Frame size, or `(0, 0)` when not open.
    fn resolution(&self) -> (u32, u32);

    /// Number of frames read since opening.
    fn frame_count(&self) -> u64;
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::error::Error;

    /// Source that yields `total` solid frames, optionally failing at one.
    #[derive(Debug)]
    pub(crate) struct SyntheticSource {
        pub total: u64,
        pub fail_open: bool,
        pub fail_at: Option<u64>,
        pub read: u64,
        pub open: bool,
        pub closed_calls: u32,
    }

    impl SyntheticSource {
        pub(crate) fn new(total: u64) -> Self {
            Self {
                total,
                fail_open: false,
                fail_at: None,
                read: 0,
                open: false,
                closed_calls: 0,
            }
        }
    }

    #[async_trait::async_trait]
    impl FrameSource for SyntheticSource {
        fn name(&self) -> &str {
            "synthetic"
        }

        async fn open(&mut self) -> Result<()> {
            if self.fail_open {
                return Err(Error::camera_open("synthetic", "no such device"));
            }
            self.open = true;
            Ok(())
        }

        async fn next_frame(&mut self) -> Result<Option<Frame>> {
            if self.fail_at == Some(self.read + 1) {
                return Err(Error::camera_read("sensor unplugged"));
            }
            if self.read >= self.total {
                return Ok(None);
            }
            self.read += 1;
            #[allow(clippy::cast_possible_truncation)]
            let shade = self.read as u8;
            Ok(Some(Frame::new(
                self.read,
                RgbImage::from_pixel(4, 3, image::Rgb([shade; 3])),
            )))
        }

        async fn close(&mut self) {
            self.open = false;
            self.closed_calls += 1;
        }

        fn is_open(&self) -> bool {
            self.open
        }

        fn resolution(&self) -> (u32, u32) {
            if self.open {
                (4, 3)
            } else {
                (0, 0)
            }
        }

        fn frame_count(&self) -> u64 {
            self.read
        }
    }

    #[test]
    fn test_frame_new() {
        let frame = Frame::new(7, RgbImage::new(8, 6));
        assert_eq!(frame.sequence, 7);
        assert_eq!(frame.dimensions(), (8, 6));
    }

    #[test]
    fn test_default_frame_interval() {
        assert_eq!(DEFAULT_FRAME_INTERVAL, Duration::from_millis(33));
    }
}
