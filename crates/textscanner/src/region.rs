//! Regions of interest.
//!
//! A region is always stored in image pixel coordinates. Selections made on a
//! scaled-down preview are converted with [`Roi::from_display`], which scales
//! by the image/preview ratio and clamps the result into the image.

use std::fmt;
use std::str::FromStr;

use image::RgbImage;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A rectangular region in image coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Roi {
    /// Left edge.
    pub x: u32,
    /// Top edge.
    pub y: u32,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

/// Size of the surface a selection was drawn on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplaySize {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

/// A rectangle dragged on a preview surface, normalized from two corners.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplayRect {
    /// Left edge.
    pub x: u32,
    /// Top edge.
    pub y: u32,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl DisplayRect {
    /// Build a rectangle from the press and release points of a drag.
    ///
    /// The corners may be given in any order.
    #[must_use]
    pub fn from_corners(start: (u32, u32), end: (u32, u32)) -> Self {
        let (x0, x1) = (start.0.min(end.0), start.0.max(end.0));
        let (y0, y1) = (start.1.min(end.1), start.1.max(end.1));
        Self {
            x: x0,
            y: y0,
            width: x1 - x0,
            height: y1 - y0,
        }
    }
}

impl Roi {
    /// Create a region.
    #[must_use]
    pub const fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Clamp the region into an image of `img_w` x `img_h`.
    ///
    /// The origin is pulled inside the image and the size is kept at least
    /// one pixel, so any region maps onto some pixel of a non-empty image.
    #[must_use]
    pub fn clamp_to(&self, img_w: u32, img_h: u32) -> Self {
        let x = self.x.min(img_w.saturating_sub(1));
        let y = self.y.min(img_h.saturating_sub(1));
        let width = self.width.min(img_w.saturating_sub(x)).max(1);
        let height = self.height.min(img_h.saturating_sub(y)).max(1);
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Convert a selection drawn on a preview back into image coordinates.
    ///
    /// Returns `None` when the preview has no area.
    #[must_use]
    pub fn from_display(
        rect: DisplayRect,
        display: DisplaySize,
        img_w: u32,
        img_h: u32,
    ) -> Option<Self> {
        if display.width == 0 || display.height == 0 {
            return None;
        }

        let scale_x = f64::from(img_w) / f64::from(display.width);
        let scale_y = f64::from(img_h) / f64::from(display.height);

        // Truncation matches how the preview maps back to source pixels
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let scaled = Self {
            x: (f64::from(rect.x) * scale_x) as u32,
            y: (f64::from(rect.y) * scale_y) as u32,
            width: (f64::from(rect.width) * scale_x) as u32,
            height: (f64::from(rect.height) * scale_y) as u32,
        };

        Some(scaled.clamp_to(img_w, img_h))
    }

    /// Crop this region out of `image`.
    ///
    /// The region is intersected with the image bounds first. Returns `None`
    /// when nothing of the region lies inside the image.
    #[must_use]
    pub fn crop(&self, image: &RgbImage) -> Option<RgbImage> {
        let (img_w, img_h) = image.dimensions();
        if self.x >= img_w || self.y >= img_h {
            return None;
        }
        let width = self.width.min(img_w - self.x);
        let height = self.height.min(img_h - self.y);
        if width == 0 || height == 0 {
            return None;
        }
        Some(image::imageops::crop_imm(image, self.x, self.y, width, height).to_image())
    }
}

impl fmt::Display for Roi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{} {}x{}", self.x, self.y, self.width, self.height)
    }
}

impl FromStr for Roi {
    type Err = Error;

    /// Parse `x,y,w,h`.
    fn from_str(s: &str) -> Result<Self> {
        let parts: Vec<&str> = s.split(',').map(str::trim).collect();
        let [x, y, w, h] = parts.as_slice() else {
            return Err(Error::invalid_roi(format!(
                "expected x,y,width,height but got '{s}'"
            )));
        };

        let parse = |name: &str, v: &str| {
            v.parse::<u32>()
                .map_err(|_| Error::invalid_roi(format!("{name} '{v}' is not a whole number")))
        };

        Ok(Self::new(
            parse("x", *x)?,
            parse("y", *y)?,
            parse("width", *w)?,
            parse("height", *h)?,
        ))
    }
}

impl FromStr for DisplaySize {
    type Err = Error;

    /// Parse `WxH`.
    fn from_str(s: &str) -> Result<Self> {
        let Some((w, h)) = s.trim().split_once(|c| c == 'x' || c == 'X') else {
            return Err(Error::invalid_roi(format!(
                "expected WIDTHxHEIGHT but got '{s}'"
            )));
        };
        let width = w
            .trim()
            .parse::<u32>()
            .map_err(|_| Error::invalid_roi(format!("display width '{w}' is not a whole number")))?;
        let height = h
            .trim()
            .parse::<u32>()
            .map_err(|_| Error::invalid_roi(format!("display height '{h}' is not a whole number")))?;
        if width == 0 || height == 0 {
            return Err(Error::invalid_roi("display size must be non-zero"));
        }
        Ok(Self { width, height })
    }
}
