//! Replaying a directory of images as a frame stream.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use super::{Frame, FrameSource};
use crate::error::{Error, Result};
use crate::scanner::load_image;

/// Treats the image files in a directory as consecutive frames.
///
/// Files are read in name order. Files whose extension is not accepted are
/// skipped when the directory is listed; files that fail to decode are
/// skipped when read.
#[derive(Debug)]
pub struct ImageSequence {
    dir: PathBuf,
    extensions: Vec<String>,
    max_dimension: u32,
    looping: bool,
    files: Vec<PathBuf>,
    position: usize,
    read: u64,
    open: bool,
    resolution: (u32, u32),
}

impl ImageSequence {
    /// Create a sequence over `dir`, accepting files with `extensions`.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>, extensions: &[String], max_dimension: u32) -> Self {
        Self {
            dir: dir.into(),
            extensions: extensions.iter().map(|e| e.to_ascii_lowercase()).collect(),
            max_dimension,
            looping: false,
            files: Vec::new(),
            position: 0,
            read: 0,
            open: false,
            resolution: (0, 0),
        }
    }

    /// Start over from the first file when the last one has been read.
    #[must_use]
    pub fn looping(mut self, looping: bool) -> Self {
        self.looping = looping;
        self
    }

    /// Files found when the sequence was opened.
    #[must_use]
    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    fn accepts(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| self.extensions.iter().any(|e| e.eq_ignore_ascii_case(ext)))
    }
}

#[async_trait::async_trait]
impl FrameSource for ImageSequence {
    fn name(&self) -> &str {
        "image-sequence"
    }

    async fn open(&mut self) -> Result<()> {
        let mut entries = tokio::fs::read_dir(&self.dir).await.map_err(|e| {
            Error::camera_open(self.dir.display().to_string(), e.to_string())
        })?;

        let mut files = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.is_file() && self.accepts(&path) {
                files.push(path);
            }
        }
        files.sort();

        if files.is_empty() {
            return Err(Error::camera_open(
                self.dir.display().to_string(),
                "directory contains no supported images",
            ));
        }

        debug!(dir = %self.dir.display(), count = files.len(), "Opened image sequence");
        self.files = files;
        self.position = 0;
        self.read = 0;
        self.open = true;
        Ok(())
    }

    async fn next_frame(&mut self) -> Result<Option<Frame>> {
        if !self.open {
            return Err(Error::CameraNotRunning);
        }

        let mut skipped = 0;
        loop {
            if self.position >= self.files.len() {
                if !self.looping || skipped >= self.files.len() {
                    return Ok(None);
                }
                self.position = 0;
            }

            let path = self.files[self.position].clone();
            self.position += 1;

            let max_dimension = self.max_dimension;
            let decoded = tokio::task::spawn_blocking(move || load_image(&path, max_dimension))
                .await
                .map_err(|e| Error::internal(format!("image decode task failed: {e}")))?;

            match decoded {
                Ok(image) => {
                    self.read += 1;
                    self.resolution = image.dimensions();
                    return Ok(Some(Frame::new(self.read, image)));
                }
                Err(e) => {
                    warn!(error = %e, "Skipping unreadable frame");
                    skipped += 1;
                    if skipped >= self.files.len() {
                        return Ok(None);
                    }
                }
            }
        }
    }

    async fn close(&mut self) {
        self.open = false;
        self.resolution = (0, 0);
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn resolution(&self) -> (u32, u32) {
        self.resolution
    }

    fn frame_count(&self) -> u64 {
        self.read
    }
}
