//! Fixtures shared by the integration tests.
#![allow(dead_code)]

use image::{Rgba, RgbaImage};

use studioplay::ops::text::{FontStyle, GlyphRun, TextMetrics, TextRasterizer};

/// Every non-space character is a solid block 0.6·size wide spanning
/// 0.8·size above to 0.2·size below the baseline.
pub struct BlockGlyphs;

impl TextRasterizer for BlockGlyphs {
    fn measure(&self, text: &str, size: f32, _style: FontStyle) -> TextMetrics {
        TextMetrics { width: text.chars().count() as f32 * size * 0.6, ascent: size * 0.8, descent: -size * 0.2 }
    }

    fn rasterize(&self, text: &str, size: f32, style: FontStyle) -> Option<GlyphRun> {
        if text.trim().is_empty() {
            return None;
        }
        let metrics = self.measure(text, size, style);
        let w = metrics.width.ceil().max(1.0) as u32;
        let h = size.ceil().max(1.0) as u32;
        let coverage = RgbaImage::from_pixel(w, h, Rgba([255, 255, 255, 255]));
        Some(GlyphRun { coverage, left: 0.0, top: -metrics.ascent, metrics })
    }
}

pub fn gradient(w: u32, h: u32) -> RgbaImage {
    RgbaImage::from_fn(w, h, |x, y| Rgba([(x % 256) as u8, (y % 256) as u8, 0, 255]))
}

/// Black `w`×`h` image with an opaque white rectangle.
pub fn white_block(w: u32, h: u32, x0: u32, y0: u32, bw: u32, bh: u32) -> RgbaImage {
    RgbaImage::from_fn(w, h, |x, y| {
        if x >= x0 && x < x0 + bw && y >= y0 && y < y0 + bh {
            Rgba([255, 255, 255, 255])
        } else {
            Rgba([0, 0, 0, 255])
        }
    })
}
