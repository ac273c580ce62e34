use ab_glyph::{point, Font, FontArc, GlyphId, ScaleFont};
use image::{Rgba, RgbaImage};
use std::path::Path;

use crate::error::{EngineError, Result};

/// Horizontal extent and vertical metrics of a line at a given pixel size.
/// `descent` is negative (below the baseline), following ab_glyph.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct TextMetrics {
    pub width: f32,
    pub ascent: f32,
    pub descent: f32,
}

/// Weight/slant requested for a run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FontStyle {
    pub bold: bool,
    pub italic: bool,
}

impl FontStyle {
    pub const REGULAR: FontStyle = FontStyle { bold: false, italic: false };
    pub const BOLD: FontStyle = FontStyle { bold: true, italic: false };
    pub const ITALIC: FontStyle = FontStyle { bold: false, italic: true };
}

/// A rasterized single line of text.
///
/// `coverage` is white with the glyph coverage in alpha. Its top-left corner
/// sits at (`left`, `top`) relative to the pen origin on the baseline.
#[derive(Clone, Debug)]
pub struct GlyphRun {
    pub coverage: RgbaImage,
    pub left: f32,
    pub top: f32,
    pub metrics: TextMetrics,
}

/// Turns strings into coverage bitmaps.
pub trait TextRasterizer: Sync {
    fn measure(&self, text: &str, size: f32, style: FontStyle) -> TextMetrics;

    /// `None` when there is nothing to draw (empty or whitespace-only text).
    fn rasterize(&self, text: &str, size: f32, style: FontStyle) -> Option<GlyphRun>;
}

/// Lay out a single line of text left-aligned at x=0 on the baseline.
/// Returns `(glyphs, total_width)`.
fn layout_line(font: &FontArc, text: &str, font_size: f32) -> (Vec<(GlyphId, f32)>, f32) {
    let scaled = font.as_scaled(font_size);
    let mut glyphs = Vec::with_capacity(text.len());
    let mut cursor_x = 0.0f32;
    let mut last_glyph: Option<GlyphId> = None;

    for ch in text.chars() {
        let glyph_id = font.glyph_id(ch);
        if let Some(prev) = last_glyph {
            cursor_x += scaled.kern(prev, glyph_id);
        }
        glyphs.push((glyph_id, cursor_x));
        cursor_x += scaled.h_advance(glyph_id);
        last_glyph = Some(glyph_id);
    }
    (glyphs, cursor_x)
}

/// `TextRasterizer` backed by an outline font.
#[derive(Clone)]
pub struct FontRasterizer {
    font: FontArc,
}

impl std::fmt::Debug for FontRasterizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FontRasterizer").finish_non_exhaustive()
    }
}

/// Families tried after the requested one.
const FALLBACK_FAMILIES: &[&str] = &["Heebo", "Inter", "DejaVu Sans", "Liberation Sans", "Arial", "Helvetica"];

impl FontRasterizer {
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self> {
        let font = FontArc::try_from_vec(bytes).map_err(|e| EngineError::Font(e.to_string()))?;
        Ok(Self { font })
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        Self::from_bytes(bytes)
    }

    /// Load a system font by family name and CSS weight, falling back through
    /// common sans-serif families.
    pub fn system(family: &str, weight: u16) -> Result<Self> {
        use font_kit::family_name::FamilyName;
        use font_kit::properties::{Properties, Weight};
        use font_kit::source::SystemSource;

        let mut props = Properties::new();
        props.weight = Weight(weight as f32);

        let mut names: Vec<FamilyName> = Vec::with_capacity(FALLBACK_FAMILIES.len() + 2);
        names.push(FamilyName::Title(family.to_string()));
        names.extend(FALLBACK_FAMILIES.iter().map(|f| FamilyName::Title(f.to_string())));
        names.push(FamilyName::SansSerif);

        let source = SystemSource::new();
        let handle = source
            .select_best_match(&names, &props)
            .map_err(|e| EngineError::Font(format!("no system font for '{}': {}", family, e)))?;
        let loaded = handle
            .load()
            .map_err(|e| EngineError::Font(format!("cannot load '{}': {}", family, e)))?;
        let data = loaded
            .copy_font_data()
            .ok_or_else(|| EngineError::Font(format!("'{}' has no font data", family)))?;
        log::info!("using system font '{}' for '{}'", loaded.family_name(), family);
        Self::from_bytes((*data).clone())
    }
}

impl TextRasterizer for FontRasterizer {
    fn measure(&self, text: &str, size: f32, style: FontStyle) -> TextMetrics {
        let scaled = self.font.as_scaled(size);
        let (_, width) = layout_line(&self.font, text, size);
        TextMetrics {
            width: width + if style.bold { bold_extra(size) } else { 0.0 },
            ascent: scaled.ascent(),
            descent: scaled.descent(),
        }
    }

    fn rasterize(&self, text: &str, size: f32, style: FontStyle) -> Option<GlyphRun> {
        let metrics = self.measure(text, size, style);
        let (glyphs, _) = layout_line(&self.font, text, size);

        let mut min_x = f32::MAX;
        let mut min_y = f32::MAX;
        let mut max_x = f32::MIN;
        let mut max_y = f32::MIN;
        let mut outlined = Vec::with_capacity(glyphs.len());
        for &(id, gx) in &glyphs {
            let glyph = id.with_scale_and_position(size, point(gx, 0.0));
            if let Some(o) = self.font.outline_glyph(glyph) {
                let b = o.px_bounds();
                min_x = min_x.min(b.min.x);
                min_y = min_y.min(b.min.y);
                max_x = max_x.max(b.max.x);
                max_y = max_y.max(b.max.y);
                outlined.push(o);
            }
        }
        if outlined.is_empty() || min_x >= max_x || min_y >= max_y {
            return None;
        }

        let extra = if style.bold { bold_extra(size).ceil() as u32 } else { 0 };
        let shear = if style.italic { 0.2 } else { 0.0 };
        let slant = (shear * (-min_y).max(0.0)).ceil() as u32;
        let pad = 1u32;
        let buf_w = (max_x - min_x).ceil() as u32 + extra + slant + pad * 2;
        let buf_h = (max_y - min_y).ceil() as u32 + pad * 2;
        let mut coverage = vec![0.0f32; buf_w as usize * buf_h as usize];

        for o in &outlined {
            let b = o.px_bounds();
            o.draw(|px, py, cov| {
                let y_rel = b.min.y + py as f32;
                // Italic shear: shift right proportionally to height above the baseline.
                let shift = shear * (-y_rel).max(0.0);
                let ix = (b.min.x - min_x + px as f32 + shift).round() as i64 + pad as i64;
                let iy = (y_rel - min_y).round() as i64 + pad as i64;
                if ix < 0 || iy < 0 || ix >= buf_w as i64 || iy >= buf_h as i64 {
                    return;
                }
                let row = iy as usize * buf_w as usize;
                for dx in 0..=extra as i64 {
                    let x = ix + dx;
                    if x >= buf_w as i64 {
                        break;
                    }
                    let idx = row + x as usize;
                    coverage[idx] = coverage[idx].max(cov);
                }
            });
        }

        let mut image = RgbaImage::new(buf_w, buf_h);
        for (p, &cov) in image.pixels_mut().zip(coverage.iter()) {
            if cov > 0.001 {
                *p = Rgba([255, 255, 255, (cov * 255.0).round().min(255.0) as u8]);
            }
        }

        Some(GlyphRun {
            coverage: image,
            left: min_x - pad as f32,
            top: min_y - pad as f32,
            metrics,
        })
    }
}

/// Horizontal smear used for faux bold.
fn bold_extra(size: f32) -> f32 {
    (size / 24.0).max(1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn garbage_font_bytes_are_rejected() {
        let err = FontRasterizer::from_bytes(vec![0, 1, 2, 3]).unwrap_err();
        assert!(matches!(err, EngineError::Font(_)));
    }

    #[test]
    fn missing_font_file_is_io_error() {
        let err = FontRasterizer::from_file(Path::new("/definitely/not/here.ttf")).unwrap_err();
        assert!(matches!(err, EngineError::Io(_)));
    }
}
