use super::vec2d::Vec2D;
use image::{Rgba, RgbaImage};

/// Drawing primitives the instrument overlay needs from a surface.
///
/// Coordinates are signed so that ticks scrolled partially off the surface can be passed
/// through unchanged; implementations clip.
pub(crate) trait HudCanvas {
    /// Width and height of the surface in pixels.
    fn size(&self) -> Vec2D<u32>;

    /// Draws a vertical tick whose top end sits at `top`.
    fn draw_tick(&mut self, x: i32, top: i32, length: u32);

    /// Draws `text` horizontally centered on `x_center` with its top row at `top`.
    fn draw_label(&mut self, x_center: i32, top: i32, text: &str);

    /// Draws the fixed indicator marking the current value, pointing up at `tip`.
    fn draw_center_marker(&mut self, x: i32, tip: i32);
}

/// Color of everything the overlay draws on a frame.
pub(crate) const HUD_COLOR: Rgba<u8> = Rgba([80, 255, 120, 255]);
/// Pixel scale applied to the built-in glyphs.
pub(crate) const GLYPH_SCALE: u32 = 2;
const GLYPH_W: u32 = 3;
const GLYPH_H: u32 = 5;
const MARKER_HALF_WIDTH: i32 = 4;

/// Height of a rendered label in pixels.
pub(crate) const fn label_height() -> u32 { GLYPH_H * GLYPH_SCALE }

/// Width of `text` when rendered with the built-in glyphs.
#[allow(clippy::cast_possible_truncation)]
pub(crate) fn label_width(text: &str) -> u32 {
    let chars = text.chars().count() as u32;
    (chars * (GLYPH_W + 1)).saturating_sub(1) * GLYPH_SCALE
}

/// 3x5 bitmap rows, most significant of the low three bits is the left column.
fn glyph(c: char) -> [u8; 5] {
    match c {
        '0' => [0b111, 0b101, 0b101, 0b101, 0b111],
        '1' => [0b010, 0b110, 0b010, 0b010, 0b111],
        '2' => [0b111, 0b001, 0b111, 0b100, 0b111],
        '3' => [0b111, 0b001, 0b111, 0b001, 0b111],
        '4' => [0b101, 0b101, 0b111, 0b001, 0b001],
        '5' => [0b111, 0b100, 0b111, 0b001, 0b111],
        '6' => [0b111, 0b100, 0b111, 0b101, 0b111],
        '7' => [0b111, 0b001, 0b001, 0b001, 0b001],
        '8' => [0b111, 0b101, 0b111, 0b101, 0b111],
        '9' => [0b111, 0b101, 0b111, 0b001, 0b111],
        '-' => [0b000, 0b000, 0b111, 0b000, 0b000],
        '.' => [0b000, 0b000, 0b000, 0b000, 0b010],
        '%' => [0b101, 0b001, 0b010, 0b100, 0b101],
        'm' => [0b000, 0b110, 0b111, 0b101, 0b101],
        _ => [0; 5],
    }
}

#[allow(clippy::cast_sign_loss)]
fn put(image: &mut RgbaImage, x: i32, y: i32) {
    if x < 0 || y < 0 {
        return;
    }
    let (x, y) = (x as u32, y as u32);
    if x < image.width() && y < image.height() {
        image.put_pixel(x, y, HUD_COLOR);
    }
}

impl HudCanvas for RgbaImage {
    fn size(&self) -> Vec2D<u32> { Vec2D::new(self.width(), self.height()) }

    #[allow(clippy::cast_possible_wrap)]
    fn draw_tick(&mut self, x: i32, top: i32, length: u32) {
        for dy in 0..length as i32 {
            put(self, x, top + dy);
        }
    }

    #[allow(clippy::cast_possible_wrap, clippy::cast_possible_truncation)]
    fn draw_label(&mut self, x_center: i32, top: i32, text: &str) {
        let scale = GLYPH_SCALE as i32;
        let mut left = x_center - label_width(text) as i32 / 2;
        for c in text.chars() {
            for (row, bits) in glyph(c).iter().enumerate() {
                for col in 0..GLYPH_W as i32 {
                    if bits & (0b100 >> col) == 0 {
                        continue;
                    }
                    for sx in 0..scale {
                        for sy in 0..scale {
                            put(self, left + col * scale + sx, top + row as i32 * scale + sy);
                        }
                    }
                }
            }
            left += (GLYPH_W as i32 + 1) * scale;
        }
    }

    fn draw_center_marker(&mut self, x: i32, tip: i32) {
        for row in 0..=MARKER_HALF_WIDTH {
            for dx in -row..=row {
                put(self, x + dx, tip + row);
            }
        }
    }
}
