//! Shared pixel and geometry types used by every pipeline stage.

use image::{Rgb, RgbImage, Rgba, RgbaImage};

/// Bytes per pixel on the wire: red, green, blue and one unused channel.
pub const BYTES_PER_PIXEL: usize = 4;

/// A rendered color. The wire format's padding channel is never carried here.
pub type Pixel = Rgb<u8>;

/// A raw source frame as delivered by a frame source (`rgb0` layout).
pub type RawFrame = RgbaImage;

/// A downscaled frame, one pixel per half terminal cell.
pub type CellFrame = RgbImage;

/// Color returned for regions that contain no source pixels.
pub const ZERO_COLOR: Pixel = Rgb([0, 0, 0]);

/// Number of bytes in one raw frame of the given size.
pub fn frame_len(width: u32, height: u32) -> usize {
    width as usize * height as usize * BYTES_PER_PIXEL
}

/// Build a raw frame filled with one color. The padding channel is zeroed.
pub fn solid_raw_frame(width: u32, height: u32, color: Pixel) -> RawFrame {
    RgbaImage::from_pixel(width, height, Rgba([color[0], color[1], color[2], 0]))
}

/// An axis-aligned rectangle of source pixels, `min` inclusive and `max` exclusive.
///
/// A region may reach past the frame it addresses; call [`Region::clamp_to`]
/// before sampling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    pub min_x: u32,
    pub min_y: u32,
    pub max_x: u32,
    pub max_y: u32,
}

impl Region {
    pub fn new(min_x: u32, min_y: u32, max_x: u32, max_y: u32) -> Self {
        Self {
            min_x,
            min_y,
            max_x: max_x.max(min_x),
            max_y: max_y.max(min_y),
        }
    }

    /// Intersect with the bounds of a `width` x `height` frame.
    ///
    /// A region lying entirely outside the frame collapses to zero area
    /// rather than inverting.
    pub fn clamp_to(self, width: u32, height: u32) -> Self {
        let max_x = self.max_x.min(width);
        let max_y = self.max_y.min(height);
        Self {
            min_x: self.min_x.min(max_x),
            min_y: self.min_y.min(max_y),
            max_x,
            max_y,
        }
    }

    pub fn width(&self) -> u32 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> u32 {
        self.max_y - self.min_y
    }

    pub fn area(&self) -> u64 {
        self.width() as u64 * self.height() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.area() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_len() {
        assert_eq!(frame_len(120, 80), 120 * 80 * 4);
        assert_eq!(frame_len(0, 80), 0);
    }

    #[test]
    fn test_solid_frame_zero_fills_padding() {
        let frame = solid_raw_frame(3, 2, Rgb([9, 8, 7]));
        assert_eq!(frame.as_raw().len(), frame_len(3, 2));
        assert!(frame.pixels().all(|p| *p == Rgba([9, 8, 7, 0])));
    }

    #[test]
    fn test_region_inside_bounds_is_unchanged() {
        let region = Region::new(1, 1, 3, 4);
        assert_eq!(region.clamp_to(10, 10), region);
        assert_eq!(region.area(), 6);
    }

    #[test]
    fn test_region_clamped_at_edge() {
        let clamped = Region::new(8, 9, 12, 12).clamp_to(10, 10);
        assert_eq!(clamped, Region::new(8, 9, 10, 10));
        assert_eq!(clamped.area(), 2);
    }

    #[test]
    fn test_region_outside_bounds_collapses() {
        let clamped = Region::new(20, 30, 22, 33).clamp_to(10, 10);
        assert!(clamped.is_empty());
        assert_eq!(clamped.width(), 0);
        assert_eq!(clamped.height(), 0);
    }

    #[test]
    fn test_inverted_region_has_no_area() {
        assert!(Region::new(5, 5, 2, 2).is_empty());
    }
}
