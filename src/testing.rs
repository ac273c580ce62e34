//! Shared fixtures for unit tests.

use image::{Rgba, RgbaImage};

use crate::ops::text::{FontStyle, GlyphRun, TextMetrics, TextRasterizer};

/// Draws every non-space character as a solid block 0.6·size wide, from
/// 0.8·size above the baseline to 0.2·size below it.
pub struct BlockGlyphs;

impl TextRasterizer for BlockGlyphs {
    fn measure(&self, text: &str, size: f32, _style: FontStyle) -> TextMetrics {
        TextMetrics {
            width: text.chars().count() as f32 * size * 0.6,
            ascent: size * 0.8,
            descent: -size * 0.2,
        }
    }

    fn rasterize(&self, text: &str, size: f32, style: FontStyle) -> Option<GlyphRun> {
        if text.trim().is_empty() {
            return None;
        }
        let metrics = self.measure(text, size, style);
        let cell = size * 0.6;
        let w = metrics.width.ceil().max(1.0) as u32;
        let h = size.ceil().max(1.0) as u32;
        let mut coverage = RgbaImage::new(w, h);
        for (i, ch) in text.chars().enumerate() {
            if ch.is_whitespace() {
                continue;
            }
            let x0 = (i as f32 * cell).floor() as u32;
            let x1 = (((i + 1) as f32) * cell).ceil().min(w as f32) as u32;
            for y in 0..h {
                for x in x0..x1 {
                    coverage.put_pixel(x, y, Rgba([255, 255, 255, 255]));
                }
            }
        }
        Some(GlyphRun { coverage, left: 0.0, top: -metrics.ascent, metrics })
    }
}

/// A `w`×`h` opaque image whose pixel at (x, y) is `(x, y, 0)`, wrapping at 256.
pub fn gradient(w: u32, h: u32) -> RgbaImage {
    RgbaImage::from_fn(w, h, |x, y| Rgba([(x % 256) as u8, (y % 256) as u8, 0, 255]))
}
