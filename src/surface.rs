// ============================================================================
// SURFACE: owned offscreen RGBA raster with canvas-style drawing primitives
// ============================================================================
//
// Every render path allocates its scratch rasters through `Surface::new`, draws
// into them, then either extracts the bitmap (`into_image`) or drops them.
// Allocation failure (zero or oversized dimensions) is reported as
// `EngineError::Surface` instead of panicking inside `image`.
// ============================================================================

use image::{Rgba, RgbaImage};
use rayon::prelude::*;

use crate::error::{EngineError, Result};
use crate::ops::transform::{self, Affine, FitRect, Sampling};

/// Largest side length a surface may have.
pub const MAX_SURFACE_SIDE: u32 = 32_768;

/// An integer pixel rectangle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PixelRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl PixelRect {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    pub fn contains(&self, px: u32, py: u32) -> bool {
        px >= self.x && py >= self.y && px < self.x + self.width && py < self.y + self.height
    }

    /// Intersection with a `w`×`h` raster.
    pub fn clipped_to(&self, w: u32, h: u32) -> Option<PixelRect> {
        let x1 = (self.x + self.width).min(w);
        let y1 = (self.y + self.height).min(h);
        if self.x >= x1 || self.y >= y1 {
            return None;
        }
        Some(PixelRect::new(self.x, self.y, x1 - self.x, y1 - self.y))
    }
}

/// Source-over blend of one non-premultiplied RGBA pixel onto `dst`.
#[inline]
pub fn blend_over(dst: &mut [u8], src: [u8; 4]) {
    let sa = src[3] as f32 / 255.0;
    if sa <= 0.0 {
        return;
    }
    if sa >= 1.0 {
        dst[..4].copy_from_slice(&src);
        return;
    }
    let da = dst[3] as f32 / 255.0;
    let oa = sa + da * (1.0 - sa);
    if oa <= 0.0 {
        dst[..4].copy_from_slice(&[0, 0, 0, 0]);
        return;
    }
    for c in 0..3 {
        let v = (src[c] as f32 * sa + dst[c] as f32 * da * (1.0 - sa)) / oa;
        dst[c] = v.round().clamp(0.0, 255.0) as u8;
    }
    dst[3] = (oa * 255.0).round().clamp(0.0, 255.0) as u8;
}

/// Owned drawing surface.
#[derive(Clone, Debug)]
pub struct Surface {
    pixels: RgbaImage,
}

impl Surface {
    /// Acquire a transparent surface.
    pub fn new(width: u32, height: u32) -> Result<Self> {
        if width == 0 || height == 0 || width > MAX_SURFACE_SIDE || height > MAX_SURFACE_SIDE {
            log::warn!("refusing to allocate {}x{} surface", width, height);
            return Err(EngineError::Surface { width, height });
        }
        Ok(Self { pixels: RgbaImage::new(width, height) })
    }

    /// Acquire a surface pre-filled with a solid color.
    pub fn filled(width: u32, height: u32, color: Rgba<u8>) -> Result<Self> {
        let mut s = Self::new(width, height)?;
        s.clear_to(color);
        Ok(s)
    }

    /// Wrap an existing bitmap.
    pub fn from_image(image: RgbaImage) -> Result<Self> {
        let (w, h) = image.dimensions();
        if w == 0 || h == 0 {
            return Err(EngineError::Surface { width: w, height: h });
        }
        Ok(Self { pixels: image })
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.pixels.dimensions()
    }

    pub fn image(&self) -> &RgbaImage {
        &self.pixels
    }

    pub fn image_mut(&mut self) -> &mut RgbaImage {
        &mut self.pixels
    }

    /// Overwrite every pixel (no blending).
    pub fn clear_to(&mut self, color: Rgba<u8>) {
        self.pixels
            .as_mut()
            .par_chunks_mut(4)
            .for_each(|px| px.copy_from_slice(&color.0));
    }

    /// Source-over fill of a rectangle.
    pub fn fill_rect(&mut self, rect: PixelRect, color: Rgba<u8>) {
        let Some(r) = rect.clipped_to(self.width(), self.height()) else { return };
        let stride = self.width() as usize * 4;
        self.pixels
            .as_mut()
            .par_chunks_mut(stride)
            .enumerate()
            .skip(r.y as usize)
            .take(r.height as usize)
            .for_each(|(_, row)| {
                for x in r.x..r.x + r.width {
                    let i = x as usize * 4;
                    blend_over(&mut row[i..i + 4], color.0);
                }
            });
    }

    /// Source-over fill where the color of each pixel comes from `paint(x, y)`.
    /// Used for gradients.
    pub fn fill_with<F>(&mut self, paint: F)
    where
        F: Fn(u32, u32) -> [u8; 4] + Sync,
    {
        let w = self.width();
        let stride = w as usize * 4;
        self.pixels
            .as_mut()
            .par_chunks_mut(stride)
            .enumerate()
            .for_each(|(y, row)| {
                for x in 0..w {
                    let i = x as usize * 4;
                    blend_over(&mut row[i..i + 4], paint(x, y as u32));
                }
            });
    }

    /// Replace every pixel that `coverage` marks as present (alpha > 0) with
    /// `color`; other pixels are left untouched. This is the "source-in" fill
    /// used to collapse translucent strokes into a hard selection.
    pub fn fill_where_covered(&mut self, coverage: &RgbaImage, color: Rgba<u8>) {
        if coverage.dimensions() != self.dimensions() {
            log::warn!(
                "coverage {:?} does not match surface {:?}; skipping fill",
                coverage.dimensions(),
                self.dimensions()
            );
            return;
        }
        self.pixels
            .as_mut()
            .par_chunks_mut(4)
            .zip(coverage.as_raw().par_chunks(4))
            .for_each(|(dst, cov)| {
                if cov[3] > 0 {
                    dst.copy_from_slice(&color.0);
                }
            });
    }

    /// Source-over blit with the top-left corner at (`x`, `y`).
    pub fn draw_image(&mut self, src: &RgbaImage, x: i64, y: i64) {
        let (dw, dh) = (self.width() as i64, self.height() as i64);
        let (sw, sh) = (src.width() as i64, src.height() as i64);
        let x0 = x.max(0);
        let y0 = y.max(0);
        let x1 = (x + sw).min(dw);
        let y1 = (y + sh).min(dh);
        if x0 >= x1 || y0 >= y1 {
            return;
        }
        let stride = dw as usize * 4;
        let src_raw = src.as_raw();
        let src_stride = sw as usize * 4;
        self.pixels
            .as_mut()
            .par_chunks_mut(stride)
            .enumerate()
            .skip(y0 as usize)
            .take((y1 - y0) as usize)
            .for_each(|(dy, row)| {
                let sy = (dy as i64 - y) as usize;
                for dx in x0..x1 {
                    let sx = (dx - x) as usize;
                    let si = sy * src_stride + sx * 4;
                    let px = [src_raw[si], src_raw[si + 1], src_raw[si + 2], src_raw[si + 3]];
                    let di = dx as usize * 4;
                    blend_over(&mut row[di..di + 4], px);
                }
            });
    }

    /// Draw `src` through the affine matrix `m` (source space → surface space).
    pub fn draw_transformed(
        &mut self,
        src: &RgbaImage,
        m: &Affine,
        sampling: Sampling,
        clip: Option<PixelRect>,
    ) {
        transform::draw_transformed(&mut self.pixels, src, m, sampling, clip);
    }

    /// Draw `src` stretched into `dest`, clipped to `clip`.
    pub fn draw_scaled(&mut self, src: &RgbaImage, dest: FitRect, clip: Option<PixelRect>) {
        transform::draw_scaled(&mut self.pixels, src, dest, clip);
    }

    /// Copy out a sub-rectangle as a new surface.
    pub fn crop(&self, rect: PixelRect) -> Result<Surface> {
        let r = rect
            .clipped_to(self.width(), self.height())
            .ok_or(EngineError::Surface { width: rect.width, height: rect.height })?;
        let view = image::imageops::crop_imm(&self.pixels, r.x, r.y, r.width, r.height);
        Surface::from_image(view.to_image())
    }

    /// Extract the finished bitmap, consuming the surface.
    pub fn into_image(self) -> RgbaImage {
        self.pixels
    }

    /// Release the backing raster.
    pub fn dispose(self) {
        drop(self);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_sized_surface_is_an_error() {
        assert!(matches!(Surface::new(0, 10), Err(EngineError::Surface { .. })));
        assert!(matches!(Surface::new(10, 0), Err(EngineError::Surface { .. })));
        assert!(Surface::new(MAX_SURFACE_SIDE + 1, 1).is_err());
    }

    #[test]
    fn blend_over_opaque_and_translucent() {
        let mut dst = [0u8, 0, 0, 255];
        blend_over(&mut dst, [255, 255, 255, 255]);
        assert_eq!(dst, [255, 255, 255, 255]);

        let mut dst = [0u8, 0, 0, 255];
        blend_over(&mut dst, [255, 255, 255, 128]);
        assert_eq!(dst[3], 255);
        assert!((dst[0] as i32 - 128).abs() <= 1);

        let mut dst = [10u8, 20, 30, 40];
        blend_over(&mut dst, [200, 200, 200, 0]);
        assert_eq!(dst, [10, 20, 30, 40]);
    }

    #[test]
    fn fill_rect_is_clipped() {
        let mut s = Surface::filled(4, 4, Rgba([0, 0, 0, 255])).unwrap();
        s.fill_rect(PixelRect::new(2, 2, 10, 10), Rgba([255, 0, 0, 255]));
        assert_eq!(s.image().get_pixel(3, 3), &Rgba([255, 0, 0, 255]));
        assert_eq!(s.image().get_pixel(1, 1), &Rgba([0, 0, 0, 255]));
    }

    #[test]
    fn draw_image_handles_negative_offsets() {
        let mut s = Surface::new(3, 3).unwrap();
        let src = RgbaImage::from_pixel(2, 2, Rgba([9, 9, 9, 255]));
        s.draw_image(&src, -1, -1);
        assert_eq!(s.image().get_pixel(0, 0)[0], 9);
        assert_eq!(s.image().get_pixel(1, 1)[3], 0);
    }

    #[test]
    fn fill_where_covered_keeps_uncovered_pixels() {
        let mut s = Surface::filled(2, 1, Rgba([0, 0, 0, 255])).unwrap();
        let mut cov = RgbaImage::new(2, 1);
        cov.put_pixel(1, 0, Rgba([236, 72, 153, 10]));
        s.fill_where_covered(&cov, Rgba([255, 255, 255, 255]));
        assert_eq!(s.image().get_pixel(0, 0), &Rgba([0, 0, 0, 255]));
        assert_eq!(s.image().get_pixel(1, 0), &Rgba([255, 255, 255, 255]));
    }

    #[test]
    fn crop_copies_subrect() {
        let mut s = Surface::new(4, 4).unwrap();
        s.fill_rect(PixelRect::new(1, 1, 2, 2), Rgba([1, 2, 3, 255]));
        let c = s.crop(PixelRect::new(1, 1, 2, 2)).unwrap();
        assert_eq!(c.dimensions(), (2, 2));
        assert!(c.image().pixels().all(|p| p.0 == [1, 2, 3, 255]));
    }
}
