// ============================================================================
// BLUR & SHADOW: separable Gaussian blur and canvas-style drop shadows
// ============================================================================

use image::{imageops, Rgba, RgbaImage};
use rayon::prelude::*;

use crate::surface::{PixelRect, Surface};

/// Above this sigma the image is blurred at reduced resolution.
const DOWNSAMPLE_SIGMA: f32 = 8.0;

fn build_gaussian_kernel(sigma: f32) -> Vec<f32> {
    let radius = (sigma * 3.0).ceil() as usize;
    if radius == 0 {
        return vec![1.0];
    }
    let len = radius * 2 + 1;
    let mut kernel = vec![0.0f32; len];
    let s2 = 2.0 * sigma * sigma;
    let mut sum = 0.0f32;
    for (i, k) in kernel.iter_mut().enumerate() {
        let x = i as f32 - radius as f32;
        let v = (-x * x / s2).exp();
        *k = v;
        sum += v;
    }
    let inv = 1.0 / sum;
    for v in &mut kernel {
        *v *= inv;
    }
    kernel
}

/// Rayon-parallelized separable Gaussian blur with clamp-to-edge sampling.
pub fn gaussian_blur(src: &RgbaImage, sigma: f32) -> RgbaImage {
    let w = src.width() as usize;
    let h = src.height() as usize;
    if w == 0 || h == 0 || sigma <= 0.0 {
        return src.clone();
    }

    let kernel = build_gaussian_kernel(sigma);
    let radius = kernel.len() / 2;
    let buf_in: Vec<f32> = src.as_raw().iter().map(|&b| b as f32).collect();
    let pixel_count = w * h * 4;

    // --- Horizontal pass (parallel by row) ---
    let mut buf_h = vec![0.0f32; pixel_count];
    buf_h.par_chunks_mut(w * 4).enumerate().for_each(|(y, row_out)| {
        let row_in_start = y * w * 4;
        for x in 0..w {
            let mut acc = [0.0f32; 4];
            for (ki, &kv) in kernel.iter().enumerate() {
                let sx = (x as isize + ki as isize - radius as isize).clamp(0, w as isize - 1) as usize;
                let idx = row_in_start + sx * 4;
                for c in 0..4 {
                    acc[c] += buf_in[idx + c] * kv;
                }
            }
            row_out[x * 4..x * 4 + 4].copy_from_slice(&acc);
        }
    });

    // --- Vertical pass (parallel by row) ---
    let mut buf_v = vec![0.0f32; pixel_count];
    buf_v.par_chunks_mut(w * 4).enumerate().for_each(|(y, row_out)| {
        for x in 0..w {
            let mut acc = [0.0f32; 4];
            for (ki, &kv) in kernel.iter().enumerate() {
                let sy = (y as isize + ki as isize - radius as isize).clamp(0, h as isize - 1) as usize;
                let idx = sy * w * 4 + x * 4;
                for c in 0..4 {
                    acc[c] += buf_h[idx + c] * kv;
                }
            }
            row_out[x * 4..x * 4 + 4].copy_from_slice(&acc);
        }
    });

    let dst_raw: Vec<u8> = buf_v.iter().map(|&v| v.round().clamp(0.0, 255.0) as u8).collect();
    RgbaImage::from_raw(w as u32, h as u32, dst_raw).unwrap_or_else(|| src.clone())
}

/// Gaussian blur for large radii (CSS `blur(40px)` and friends).
///
/// Big sigmas are blurred on a reduced copy and scaled back up; at those radii
/// the result is visually indistinguishable and an order of magnitude cheaper.
pub fn large_blur(src: &RgbaImage, sigma: f32) -> RgbaImage {
    let (w, h) = src.dimensions();
    if sigma <= DOWNSAMPLE_SIGMA || w < 8 || h < 8 {
        return gaussian_blur(src, sigma);
    }
    let factor = (sigma / (DOWNSAMPLE_SIGMA / 2.0)).floor().max(1.0);
    let sw = ((w as f32 / factor).round() as u32).max(1);
    let sh = ((h as f32 / factor).round() as u32).max(1);
    let small = imageops::resize(src, sw, sh, imageops::FilterType::Triangle);
    let blurred = gaussian_blur(&small, sigma / factor);
    imageops::resize(&blurred, w, h, imageops::FilterType::Triangle)
}

/// Canvas-style drop shadow parameters (device space, not affected by the
/// layer transform).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Shadow {
    pub color: Rgba<u8>,
    /// `shadowBlur`; the Gaussian sigma is half of it.
    pub blur: f32,
    pub offset_x: f32,
    pub offset_y: f32,
}

/// Smallest rectangle containing every non-transparent pixel.
pub fn alpha_bounds(img: &RgbaImage) -> Option<PixelRect> {
    let (w, h) = img.dimensions();
    let mut min_x = u32::MAX;
    let mut min_y = u32::MAX;
    let mut max_x = 0u32;
    let mut max_y = 0u32;
    for (x, y, p) in img.enumerate_pixels() {
        if p[3] > 0 {
            min_x = min_x.min(x);
            min_y = min_y.min(y);
            max_x = max_x.max(x);
            max_y = max_y.max(y);
        }
    }
    if min_x == u32::MAX {
        return None;
    }
    PixelRect::new(min_x, min_y, max_x - min_x + 1, max_y - min_y + 1).clipped_to(w, h)
}

/// Paint the shadow cast by `layer` (same size as `dst`) onto `dst`.
///
/// Only the region around the layer's visible pixels is blurred.
pub fn draw_shadow(dst: &mut Surface, layer: &RgbaImage, shadow: &Shadow) {
    if shadow.color[3] == 0 || layer.dimensions() != dst.dimensions() {
        return;
    }
    let Some(bounds) = alpha_bounds(layer) else { return };
    let sigma = shadow.blur / 2.0;
    let pad = (sigma * 3.0).ceil() as u32 + 1;
    let (w, h) = layer.dimensions();
    let x0 = bounds.x.saturating_sub(pad);
    let y0 = bounds.y.saturating_sub(pad);
    let x1 = (bounds.x + bounds.width + pad).min(w);
    let y1 = (bounds.y + bounds.height + pad).min(h);

    // Shadow silhouette: shadow colour with the layer's alpha scaled by the
    // colour's own alpha.
    let region = imageops::crop_imm(layer, x0, y0, x1 - x0, y1 - y0).to_image();
    let mut silhouette = RgbaImage::new(region.width(), region.height());
    for (s, p) in silhouette.pixels_mut().zip(region.pixels()) {
        let a = p[3] as u32 * shadow.color[3] as u32 / 255;
        *s = Rgba([shadow.color[0], shadow.color[1], shadow.color[2], a as u8]);
    }
    let silhouette = if sigma > 0.0 { large_blur(&silhouette, sigma) } else { silhouette };

    dst.draw_image(
        &silhouette,
        x0 as i64 + shadow.offset_x.round() as i64,
        y0 as i64 + shadow.offset_y.round() as i64,
    );
}
