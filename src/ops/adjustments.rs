// ============================================================================
// ADJUSTMENT OPERATIONS: CSS-compatible colour filter chain
// ============================================================================
//
// The live preview is described with a CSS `filter` string; the exact pass
// runs the same functions on pixels. Both are produced from one `FilterChain`,
// so the order (brightness → contrast → saturate → sepia) cannot diverge.
// Per-pixel work is parallelized via rayon.
// ============================================================================

use image::RgbaImage;
use rayon::prelude::*;

/// One colour function, with its amount as a fraction (1.0 = 100%).
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum FilterOp {
    Brightness(f32),
    Contrast(f32),
    Saturate(f32),
    Sepia(f32),
}

impl FilterOp {
    /// True when the op leaves every colour unchanged.
    pub fn is_identity(&self) -> bool {
        match *self {
            FilterOp::Brightness(v) | FilterOp::Contrast(v) | FilterOp::Saturate(v) => {
                (v - 1.0).abs() < 1e-6
            }
            FilterOp::Sepia(v) => v.abs() < 1e-6,
        }
    }

    /// CSS function text, e.g. `brightness(120%)`.
    pub fn css(&self) -> String {
        let (name, v) = match *self {
            FilterOp::Brightness(v) => ("brightness", v),
            FilterOp::Contrast(v) => ("contrast", v),
            FilterOp::Saturate(v) => ("saturate", v),
            FilterOp::Sepia(v) => ("sepia", v),
        };
        format!("{}({}%)", name, fmt_percent(v * 100.0))
    }

    /// Apply to normalized RGB in [0, 1]. Output is clamped to [0, 1].
    #[inline]
    pub fn apply(&self, rgb: [f32; 3]) -> [f32; 3] {
        let [r, g, b] = rgb;
        let out = match *self {
            FilterOp::Brightness(k) => [r * k, g * k, b * k],
            FilterOp::Contrast(k) => {
                let i = 0.5 - 0.5 * k;
                [r * k + i, g * k + i, b * k + i]
            }
            FilterOp::Saturate(s) => [
                (0.213 + 0.787 * s) * r + (0.715 - 0.715 * s) * g + (0.072 - 0.072 * s) * b,
                (0.213 - 0.213 * s) * r + (0.715 + 0.285 * s) * g + (0.072 - 0.072 * s) * b,
                (0.213 - 0.213 * s) * r + (0.715 - 0.715 * s) * g + (0.072 + 0.928 * s) * b,
            ],
            FilterOp::Sepia(amount) => {
                let a = amount.clamp(0.0, 1.0);
                let n = 1.0 - a;
                [
                    (0.393 + 0.607 * n) * r + (0.769 - 0.769 * n) * g + (0.189 - 0.189 * n) * b,
                    (0.349 - 0.349 * n) * r + (0.686 + 0.314 * n) * g + (0.168 - 0.168 * n) * b,
                    (0.272 - 0.272 * n) * r + (0.534 - 0.534 * n) * g + (0.131 + 0.869 * n) * b,
                ]
            }
        };
        [out[0].clamp(0.0, 1.0), out[1].clamp(0.0, 1.0), out[2].clamp(0.0, 1.0)]
    }
}

fn fmt_percent(v: f32) -> String {
    if (v - v.round()).abs() < 1e-4 {
        format!("{}", v.round() as i64)
    } else {
        format!("{:.2}", v).trim_end_matches('0').trim_end_matches('.').to_string()
    }
}

/// An ordered list of colour functions.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FilterChain {
    ops: Vec<FilterOp>,
}

impl FilterChain {
    pub fn new(ops: Vec<FilterOp>) -> Self {
        Self { ops }
    }

    pub fn ops(&self) -> &[FilterOp] {
        &self.ops
    }

    pub fn is_identity(&self) -> bool {
        self.ops.iter().all(FilterOp::is_identity)
    }

    /// The CSS `filter` property value; `none` for an empty chain.
    pub fn css(&self) -> String {
        if self.ops.is_empty() {
            return "none".to_string();
        }
        self.ops.iter().map(FilterOp::css).collect::<Vec<_>>().join(" ")
    }

    /// Run the chain over one RGBA pixel (alpha untouched).
    #[inline]
    pub fn apply_pixel(&self, px: [u8; 4]) -> [u8; 4] {
        let mut rgb = [px[0] as f32 / 255.0, px[1] as f32 / 255.0, px[2] as f32 / 255.0];
        for op in &self.ops {
            rgb = op.apply(rgb);
        }
        [
            (rgb[0] * 255.0).round().clamp(0.0, 255.0) as u8,
            (rgb[1] * 255.0).round().clamp(0.0, 255.0) as u8,
            (rgb[2] * 255.0).round().clamp(0.0, 255.0) as u8,
            px[3],
        ]
    }

    /// Filter a bitmap in place. Fully transparent pixels are skipped.
    pub fn apply_to(&self, image: &mut RgbaImage) {
        if self.is_identity() {
            return;
        }
        let w = image.width() as usize;
        if w == 0 {
            return;
        }
        let stride = w * 4;
        image.as_mut().par_chunks_mut(stride).for_each(|row| {
            for px in row.chunks_exact_mut(4) {
                if px[3] == 0 {
                    continue;
                }
                let out = self.apply_pixel([px[0], px[1], px[2], px[3]]);
                px.copy_from_slice(&out);
            }
        });
    }
}
