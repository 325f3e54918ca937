use crate::frame::{CellFrame, Pixel, RawFrame, Region, BYTES_PER_PIXEL, ZERO_COLOR};
use crate::{PlayerError, Result};
use image::Rgb;
use log::debug;

/// Number of source pixels that map onto one target pixel, on both axes.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct ScaleFactor(f64);

impl ScaleFactor {
    /// Pick the factor for a source/target size pair.
    ///
    /// A wide source is keyed to the target width, a tall one to the target
    /// height, and a square one to the smaller target side.
    pub fn select(source: (u32, u32), target: (u32, u32)) -> Result<Self> {
        let (src_width, src_height) = source;
        let (target_width, target_height) = target;

        if src_width == 0 || src_height == 0 {
            return Err(PlayerError::InvalidConfig(format!(
                "source dimensions must be positive, got {}x{}",
                src_width, src_height
            )));
        }
        if target_width == 0 || target_height == 0 {
            return Err(PlayerError::InvalidConfig(format!(
                "target dimensions must be positive, got {}x{}",
                target_width, target_height
            )));
        }

        let factor = if src_width == src_height {
            src_width as f64 / target_width.min(target_height) as f64
        } else if src_width > src_height {
            src_width as f64 / target_width as f64
        } else {
            src_height as f64 / target_height as f64
        };

        Ok(Self(factor))
    }

    pub fn value(self) -> f64 {
        self.0
    }

    /// Source region sampled for the target pixel at (`x`, `y`), before clamping.
    pub fn region_for(self, x: u32, y: u32) -> Region {
        let origin_x = (x as f64 * self.0).floor();
        let origin_y = (y as f64 * self.0).floor();
        Region::new(
            origin_x as u32,
            origin_y as u32,
            (origin_x + self.0).ceil() as u32,
            (origin_y + self.0).ceil() as u32,
        )
    }
}

/// Box-filter downscaler for one fixed source/target size pair.
#[derive(Debug, Clone)]
pub struct Downscaler {
    factor: ScaleFactor,
    source_width: u32,
    source_height: u32,
    target_width: u32,
    target_height: u32,
}

impl Downscaler {
    pub fn new(source: (u32, u32), target: (u32, u32)) -> Result<Self> {
        let factor = ScaleFactor::select(source, target)?;
        debug!(
            "Scale factor {:.3} for {}x{} -> {}x{}",
            factor.value(),
            source.0,
            source.1,
            target.0,
            target.1
        );

        Ok(Self {
            factor,
            source_width: source.0,
            source_height: source.1,
            target_width: target.0,
            target_height: target.1,
        })
    }

    pub fn factor(&self) -> ScaleFactor {
        self.factor
    }

    pub fn source_dimensions(&self) -> (u32, u32) {
        (self.source_width, self.source_height)
    }

    pub fn target_dimensions(&self) -> (u32, u32) {
        (self.target_width, self.target_height)
    }

    /// Downscale into a freshly allocated frame.
    pub fn downscale(&self, source: &RawFrame) -> CellFrame {
        let mut target = CellFrame::new(self.target_width, self.target_height);
        self.downscale_into(source, &mut target);
        target
    }

    /// Downscale into `target`, overwriting every pixel.
    ///
    /// `target` is reallocated if its size does not match the configured grid.
    pub fn downscale_into(&self, source: &RawFrame, target: &mut CellFrame) {
        if target.dimensions() != (self.target_width, self.target_height) {
            *target = CellFrame::new(self.target_width, self.target_height);
        }

        for y in 0..self.target_height {
            for x in 0..self.target_width {
                let region = self.factor.region_for(x, y);
                target.put_pixel(x, y, box_filter(source, region));
            }
        }
    }
}

/// Average every pixel of `source` inside `region`.
///
/// The region is clamped to the frame first; an empty result yields
/// [`ZERO_COLOR`].
pub fn box_filter(source: &RawFrame, region: Region) -> Pixel {
    let (width, height) = source.dimensions();
    let region = region.clamp_to(width, height);
    let count = region.area();
    if count == 0 {
        return ZERO_COLOR;
    }

    let raw = source.as_raw();
    let stride = width as usize * BYTES_PER_PIXEL;
    let (mut r, mut g, mut b) = (0u64, 0u64, 0u64);

    for y in region.min_y..region.max_y {
        let row_start = y as usize * stride;
        let start = row_start + region.min_x as usize * BYTES_PER_PIXEL;
        let end = row_start + region.max_x as usize * BYTES_PER_PIXEL;
        for px in raw[start..end].chunks_exact(BYTES_PER_PIXEL) {
            r += px[0] as u64;
            g += px[1] as u64;
            b += px[2] as u64;
        }
    }

    Rgb([(r / count) as u8, (g / count) as u8, (b / count) as u8])
}

/// Downscale `source` to exactly `target_width` x `target_height` pixels.
pub fn downscale(source: &RawFrame, target_width: u32, target_height: u32) -> Result<CellFrame> {
    let downscaler = Downscaler::new(source.dimensions(), (target_width, target_height))?;
    Ok(downscaler.downscale(source))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::solid_raw_frame;
    use image::Rgba;

    fn gradient_frame(width: u32, height: u32) -> RawFrame {
        RawFrame::from_fn(width, height, |x, y| {
            Rgba([(x * 10) as u8, (y * 10) as u8, ((x + y) * 5) as u8, 0])
        })
    }

    #[test]
    fn test_factor_wide_source() {
        let factor = ScaleFactor::select((200, 100), (120, 80)).unwrap();
        assert!((factor.value() - 200.0 / 120.0).abs() < 1e-9);
    }

    #[test]
    fn test_factor_square_source_uses_smaller_target_side() {
        let factor = ScaleFactor::select((100, 100), (120, 80)).unwrap();
        assert_eq!(factor.value(), 1.25);
    }

    #[test]
    fn test_factor_tall_source() {
        let factor = ScaleFactor::select((100, 400), (120, 80)).unwrap();
        assert_eq!(factor.value(), 5.0);
    }

    #[test]
    fn test_factor_rejects_zero_dimensions() {
        assert!(ScaleFactor::select((0, 100), (120, 80)).is_err());
        assert!(ScaleFactor::select((100, 100), (120, 0)).is_err());
    }

    #[test]
    fn test_region_for_fractional_factor() {
        let factor = ScaleFactor::select((200, 100), (120, 80)).unwrap();
        // 1 * 1.667 floors to 1, 1 + 1.667 ceils to 3
        assert_eq!(factor.region_for(1, 1), Region::new(1, 1, 3, 3));
        assert_eq!(factor.region_for(0, 0), Region::new(0, 0, 2, 2));
    }

    #[test]
    fn test_output_dimensions_match_target() {
        let cases = [
            ((200, 100), (120, 80)),
            ((100, 100), (120, 80)),
            ((90, 300), (40, 20)),
            ((7, 3), (5, 9)),
            ((1, 1), (1, 1)),
            ((640, 360), (1, 2)),
        ];

        for ((sw, sh), (tw, th)) in cases {
            let source = gradient_frame(sw, sh);
            let result = downscale(&source, tw, th).unwrap();
            assert_eq!(result.dimensions(), (tw, th), "source {}x{}", sw, sh);
        }
    }

    #[test]
    fn test_uniform_source_is_lossless() {
        let color = Rgb([17, 200, 99]);
        let source = solid_raw_frame(64, 48, color);
        let result = downscale(&source, 16, 12).unwrap();
        assert!(result.pixels().all(|p| *p == color));
    }

    #[test]
    fn test_uniform_source_with_fractional_factor() {
        let color = Rgb([255, 128, 1]);
        let source = solid_raw_frame(200, 100, color);
        let result = downscale(&source, 120, 60).unwrap();
        assert!(result.pixels().all(|p| *p == color));
    }

    #[test]
    fn test_box_filter_averages_region() {
        let mut source = solid_raw_frame(2, 2, Rgb([0, 0, 0]));
        source.put_pixel(0, 0, Rgba([100, 40, 0, 0]));
        source.put_pixel(1, 0, Rgba([100, 0, 0, 0]));
        source.put_pixel(0, 1, Rgba([0, 40, 8, 0]));
        source.put_pixel(1, 1, Rgba([0, 0, 8, 255]));

        assert_eq!(box_filter(&source, Region::new(0, 0, 2, 2)), Rgb([50, 20, 4]));
    }

    #[test]
    fn test_box_filter_outside_bounds_is_zero() {
        let source = solid_raw_frame(4, 4, Rgb([255, 255, 255]));
        assert_eq!(box_filter(&source, Region::new(10, 10, 12, 12)), ZERO_COLOR);
    }

    #[test]
    fn test_box_filter_partially_outside_bounds() {
        let source = solid_raw_frame(4, 4, Rgb([30, 60, 90]));
        assert_eq!(box_filter(&source, Region::new(3, 3, 8, 8)), Rgb([30, 60, 90]));
    }

    #[test]
    fn test_wide_source_leaves_unreached_rows_black() {
        // 200x100 keyed to width: rows past 100 / 1.667 sample nothing.
        let source = solid_raw_frame(200, 100, Rgb([10, 20, 30]));
        let result = downscale(&source, 120, 80).unwrap();
        assert_eq!(*result.get_pixel(0, 0), Rgb([10, 20, 30]));
        assert_eq!(*result.get_pixel(119, 59), Rgb([10, 20, 30]));
        assert_eq!(*result.get_pixel(0, 79), ZERO_COLOR);
    }

    #[test]
    fn test_downscale_into_overwrites_scratch() {
        let downscaler = Downscaler::new((4, 4), (2, 2)).unwrap();
        let mut scratch = CellFrame::from_pixel(2, 2, Rgb([1, 2, 3]));

        downscaler.downscale_into(&solid_raw_frame(4, 4, Rgb([7, 7, 7])), &mut scratch);
        assert!(scratch.pixels().all(|p| *p == Rgb([7, 7, 7])));
    }

    #[test]
    fn test_downscale_into_resizes_mismatched_scratch() {
        let downscaler = Downscaler::new((4, 4), (2, 2)).unwrap();
        let mut scratch = CellFrame::new(5, 5);

        downscaler.downscale_into(&solid_raw_frame(4, 4, Rgb([7, 7, 7])), &mut scratch);
        assert_eq!(scratch.dimensions(), (2, 2));
    }

    #[test]
    fn test_downscale_is_deterministic() {
        let source = gradient_frame(37, 23);
        let a = downscale(&source, 11, 6).unwrap();
        let b = downscale(&source, 11, 6).unwrap();
        assert_eq!(a.as_raw(), b.as_raw());
    }
}
