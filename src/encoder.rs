use crate::frame::{CellFrame, Pixel};
use crate::{PlayerError, Result};
use image::Rgb;
use std::fmt::Write as _;

/// Upper half block: the foreground paints the top pixel, the cell background the bottom one.
pub const UPPER_HALF_BLOCK: char = '\u{2580}';

/// Resets all SGR attributes.
pub const RESET: &str = "\x1b[0m";

/// Moves the cursor to the top-left cell so the next frame overdraws the last.
pub const CURSOR_HOME: &str = "\x1b[H";

/// Which color layer an escape sequence targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layer {
    Foreground = 38,
    Background = 48,
}

impl Layer {
    pub fn code(self) -> u8 {
        self as u8
    }
}

/// Wrap `content` in a truecolor escape for `layer`, closed by a reset.
pub fn esc_sequence(layer: Layer, color: Pixel, content: &str) -> String {
    format!(
        "\x1b[{};2;{};{};{}m{}{}",
        layer.code(),
        color[0],
        color[1],
        color[2],
        content,
        RESET
    )
}

/// Encode one vertical pixel pair as a single terminal cell.
///
/// The background sequence wraps the foreground one so the inner reset
/// does not end the cell early.
pub fn stack_pixels(top: Pixel, bottom: Pixel) -> String {
    let fg = esc_sequence(Layer::Foreground, top, &UPPER_HALF_BLOCK.to_string());
    esc_sequence(Layer::Background, bottom, &fg)
}

/// Same output as [`stack_pixels`], appended to `buf` without allocating.
#[inline]
pub fn push_stacked(buf: &mut String, top: Pixel, bottom: Pixel) {
    // Writing into a String cannot fail.
    let _ = write!(
        buf,
        "\x1b[48;2;{};{};{}m\x1b[38;2;{};{};{}m{}{}{}",
        bottom[0], bottom[1], bottom[2], top[0], top[1], top[2], UPPER_HALF_BLOCK, RESET, RESET
    );
}

/// Turns downscaled frames into text blocks, two pixel rows per line.
#[derive(Debug, Clone)]
pub struct RowPairEncoder {
    width: u32,
    height: u32,
}

impl RowPairEncoder {
    pub fn new(width: u32, height: u32) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(PlayerError::InvalidConfig(format!(
                "grid dimensions must be positive, got {}x{}",
                width, height
            )));
        }
        if height % 2 != 0 {
            return Err(PlayerError::OddHeight(height));
        }
        Ok(Self { width, height })
    }

    /// Size of the longest text block this encoder can produce.
    pub fn block_capacity(&self) -> usize {
        let widest = stack_pixels(Rgb([255, 255, 255]), Rgb([255, 255, 255])).len();
        let lines = self.height as usize / 2;
        widest * self.width as usize * lines + lines
    }

    /// A text buffer sized for this encoder's frames.
    pub fn text_buffer(&self) -> String {
        String::with_capacity(self.block_capacity())
    }

    /// Encode `frame` into `buf`, replacing whatever it held.
    ///
    /// `frame` must match the grid this encoder was built for.
    pub fn encode_into(&self, frame: &CellFrame, buf: &mut String) -> Result<()> {
        if frame.dimensions() != (self.width, self.height) {
            return Err(PlayerError::InvalidConfig(format!(
                "frame is {}x{}, encoder expects {}x{}",
                frame.width(),
                frame.height(),
                self.width,
                self.height
            )));
        }
        buf.clear();
        encode_rows(frame, buf)
    }

    pub fn encode(&self, frame: &CellFrame) -> Result<String> {
        let mut buf = self.text_buffer();
        self.encode_into(frame, &mut buf)?;
        Ok(buf)
    }
}

/// Encode a frame of any even height into a new text block.
pub fn encode(frame: &CellFrame) -> Result<String> {
    let mut buf = String::new();
    encode_rows(frame, &mut buf)?;
    Ok(buf)
}

fn encode_rows(frame: &CellFrame, buf: &mut String) -> Result<()> {
    let (width, height) = frame.dimensions();
    if height % 2 != 0 {
        return Err(PlayerError::OddHeight(height));
    }

    for y in (0..height).step_by(2) {
        for x in 0..width {
            push_stacked(buf, *frame.get_pixel(x, y), *frame.get_pixel(x, y + 1));
        }
        buf.push('\n');
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const RED: Pixel = Rgb([255, 0, 0]);
    const BLUE: Pixel = Rgb([0, 0, 255]);

    #[test]
    fn test_esc_sequence_format() {
        assert_eq!(
            esc_sequence(Layer::Foreground, Rgb([1, 22, 255]), "x"),
            "\x1b[38;2;1;22;255mx\x1b[0m"
        );
        assert_eq!(
            esc_sequence(Layer::Background, Rgb([0, 0, 0]), ""),
            "\x1b[48;2;0;0;0m\x1b[0m"
        );
    }

    #[test]
    fn test_stack_pixels_background_wraps_foreground() {
        assert_eq!(
            stack_pixels(RED, BLUE),
            "\x1b[48;2;0;0;255m\x1b[38;2;255;0;0m\u{2580}\x1b[0m\x1b[0m"
        );
    }

    #[test]
    fn test_push_stacked_matches_stack_pixels() {
        let mut buf = String::new();
        push_stacked(&mut buf, Rgb([12, 34, 56]), Rgb([200, 100, 0]));
        assert_eq!(buf, stack_pixels(Rgb([12, 34, 56]), Rgb([200, 100, 0])));
    }

    #[test]
    fn test_encode_line_and_glyph_counts() {
        let frame = CellFrame::from_pixel(7, 6, BLUE);
        let text = encode(&frame).unwrap();

        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        for line in lines {
            assert_eq!(line.matches(UPPER_HALF_BLOCK).count(), 7);
        }
        assert!(text.ends_with('\n'));
    }

    #[test]
    fn test_encode_pairs_top_and_bottom_rows() {
        let mut frame = CellFrame::new(1, 2);
        frame.put_pixel(0, 0, RED);
        frame.put_pixel(0, 1, BLUE);

        assert_eq!(encode(&frame).unwrap(), format!("{}\n", stack_pixels(RED, BLUE)));
    }

    #[test]
    fn test_encode_rejects_odd_height() {
        let frame = CellFrame::new(4, 3);
        assert!(matches!(encode(&frame), Err(PlayerError::OddHeight(3))));
    }

    #[test]
    fn test_encoder_rejects_odd_grid() {
        assert!(matches!(RowPairEncoder::new(120, 79), Err(PlayerError::OddHeight(79))));
        assert!(RowPairEncoder::new(0, 80).is_err());
    }

    #[test]
    fn test_encode_into_discards_previous_content() {
        let encoder = RowPairEncoder::new(2, 2).unwrap();
        let mut buf = String::from("stale frame");

        encoder.encode_into(&CellFrame::from_pixel(2, 2, RED), &mut buf).unwrap();
        assert!(!buf.contains("stale"));
        assert_eq!(buf.lines().count(), 1);
    }

    #[test]
    fn test_encode_into_rejects_other_grid_sizes() {
        let encoder = RowPairEncoder::new(4, 4).unwrap();
        let mut buf = String::from("previous");

        let wider = encoder.encode_into(&CellFrame::from_pixel(6, 4, RED), &mut buf);
        assert!(matches!(wider, Err(PlayerError::InvalidConfig(_))));
        let shorter = encoder.encode(&CellFrame::from_pixel(4, 2, RED));
        assert!(matches!(shorter, Err(PlayerError::InvalidConfig(_))));
        assert_eq!(buf, "previous");
    }

    #[test]
    fn test_block_capacity_fits_brightest_frame() {
        let encoder = RowPairEncoder::new(120, 80).unwrap();
        let white = CellFrame::from_pixel(120, 80, Rgb([255, 255, 255]));
        let text = encoder.encode(&white).unwrap();
        assert_eq!(text.len(), encoder.block_capacity());
    }
}
