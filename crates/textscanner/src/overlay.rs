//! Drawing detected text boxes onto images.

use image::{Rgb, RgbImage};
use imageproc::drawing::draw_hollow_rect_mut;
use imageproc::rect::Rect;

use crate::config::DisplayConfig;
use crate::ocr::TextBox;

/// Outline style for text boxes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoxStyle {
    /// Outline color.
    pub color: Rgb<u8>,
    /// Outline thickness in pixels, drawn inward from the box edge.
    pub thickness: u32,
}

impl Default for BoxStyle {
    fn default() -> Self {
        Self::from_config(&DisplayConfig::default())
    }
}

impl BoxStyle {
    /// Take the style from the `[display]` settings.
    #[must_use]
    pub fn from_config(config: &DisplayConfig) -> Self {
        Self {
            color: Rgb(config.box_color),
            thickness: config.box_thickness.max(1),
        }
    }
}

/// Return a copy of `image` with every box outlined.
#[must_use]
pub fn draw_boxes(image: &RgbImage, boxes: &[TextBox], style: BoxStyle) -> RgbImage {
    let mut canvas = image.clone();
    for text_box in boxes {
        draw_box(&mut canvas, text_box, style);
    }
    canvas
}

/// Outline one box in place.
///
/// The box is clipped to the canvas. Boxes entirely outside, or with no
/// area, draw nothing.
pub fn draw_box(canvas: &mut RgbImage, text_box: &TextBox, style: BoxStyle) {
    let (img_w, img_h) = canvas.dimensions();
    if text_box.x >= img_w || text_box.y >= img_h {
        return;
    }
    let width = text_box.width.min(img_w - text_box.x);
    let height = text_box.height.min(img_h - text_box.y);

    for inset in 0..style.thickness {
        let (Some(w), Some(h)) = (
            width.checked_sub(inset * 2).filter(|w| *w > 0),
            height.checked_sub(inset * 2).filter(|h| *h > 0),
        ) else {
            break;
        };
        let (Ok(x), Ok(y)) = (
            i32::try_from(text_box.x + inset),
            i32::try_from(text_box.y + inset),
        ) else {
            break;
        };
        draw_hollow_rect_mut(canvas, Rect::at(x, y).of_size(w, h), style.color);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ocr::tests::text_box;

    const GREEN: Rgb<u8> = Rgb([0, 255, 0]);
    const BLACK: Rgb<u8> = Rgb([0, 0, 0]);

    #[test]
    fn test_default_style() {
        let style = BoxStyle::default();
        assert_eq!(style.color, GREEN);
        assert_eq!(style.thickness, 2);
    }

    #[test]
    fn test_draw_box_outline_and_thickness() {
        let image = RgbImage::new(30, 30);
        let out = draw_boxes(&image, &[text_box(5, 5, 10, 10, 90.0)], BoxStyle::default());

        // Outer and inner ring are colored, the interior is not
        assert_eq!(*out.get_pixel(5, 5), GREEN);
        assert_eq!(*out.get_pixel(6, 6), GREEN);
        assert_eq!(*out.get_pixel(14, 10), GREEN);
        assert_eq!(*out.get_pixel(10, 10), BLACK);
        assert_eq!(*out.get_pixel(20, 20), BLACK);
    }

    #[test]
    fn test_draw_boxes_leaves_source_untouched() {
        let image = RgbImage::new(10, 10);
        let _ = draw_boxes(&image, &[text_box(0, 0, 5, 5, 50.0)], BoxStyle::default());
        assert!(image.pixels().all(|p| *p == BLACK));
    }

    #[test]
    fn test_box_clipped_to_canvas() {
        let image = RgbImage::new(10, 10);
        let out = draw_boxes(&image, &[text_box(6, 6, 50, 50, 50.0)], BoxStyle::default());
        assert_eq!(*out.get_pixel(6, 6), GREEN);
        assert_eq!(*out.get_pixel(9, 9), GREEN);
    }

    #[test]
    fn test_box_outside_canvas_is_ignored() {
        let image = RgbImage::new(10, 10);
        let out = draw_boxes(&image, &[text_box(20, 20, 5, 5, 50.0)], BoxStyle::default());
        assert_eq!(out, image);
    }

    #[test]
    fn test_thin_box_with_thick_style() {
        let image = RgbImage::new(10, 10);
        let style = BoxStyle {
            color: GREEN,
            thickness: 4,
        };
        let out = draw_boxes(&image, &[text_box(2, 2, 3, 1, 50.0)], style);
        assert_eq!(*out.get_pixel(2, 2), GREEN);
        assert_eq!(*out.get_pixel(4, 2), GREEN);
    }
}
