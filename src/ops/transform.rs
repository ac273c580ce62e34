// ============================================================================
// TRANSFORM OPERATIONS: affine draw, fit rectangles, centered crop
// ============================================================================

use image::{imageops, RgbaImage};
use rayon::prelude::*;

use crate::surface::{blend_over, PixelRect};

/// 2D affine matrix laid out like a canvas transform:
/// `(x, y) → (a·x + c·y + e, b·x + d·y + f)`.
///
/// The builder methods post-multiply, so `m.translate(..).rotate_deg(..)`
/// reads in the same order as successive `ctx.translate`/`ctx.rotate` calls.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Affine {
    pub a: f32,
    pub b: f32,
    pub c: f32,
    pub d: f32,
    pub e: f32,
    pub f: f32,
}

impl Default for Affine {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Affine {
    pub const IDENTITY: Affine = Affine { a: 1.0, b: 0.0, c: 0.0, d: 1.0, e: 0.0, f: 0.0 };

    /// `self · other`: `other` is applied to points first.
    pub fn multiply(&self, o: &Affine) -> Affine {
        Affine {
            a: self.a * o.a + self.c * o.b,
            b: self.b * o.a + self.d * o.b,
            c: self.a * o.c + self.c * o.d,
            d: self.b * o.c + self.d * o.d,
            e: self.a * o.e + self.c * o.f + self.e,
            f: self.b * o.e + self.d * o.f + self.f,
        }
    }

    pub fn translate(self, tx: f32, ty: f32) -> Affine {
        self.multiply(&Affine { e: tx, f: ty, ..Affine::IDENTITY })
    }

    pub fn scale(self, sx: f32, sy: f32) -> Affine {
        self.multiply(&Affine { a: sx, d: sy, ..Affine::IDENTITY })
    }

    /// Clockwise rotation in degrees (y axis points down).
    pub fn rotate_deg(self, degrees: f32) -> Affine {
        let (s, c) = exact_sin_cos(degrees);
        self.multiply(&Affine { a: c, b: s, c: -s, d: c, e: 0.0, f: 0.0 })
    }

    pub fn apply(&self, x: f32, y: f32) -> (f32, f32) {
        (self.a * x + self.c * y + self.e, self.b * x + self.d * y + self.f)
    }

    /// Inverse matrix; `None` when singular (e.g. zero scale).
    pub fn invert(&self) -> Option<Affine> {
        let det = self.a * self.d - self.b * self.c;
        if det.abs() < 1e-12 {
            return None;
        }
        let inv = 1.0 / det;
        let a = self.d * inv;
        let b = -self.b * inv;
        let c = -self.c * inv;
        let d = self.a * inv;
        Some(Affine {
            a,
            b,
            c,
            d,
            e: -(a * self.e + c * self.f),
            f: -(b * self.e + d * self.f),
        })
    }
}

/// sin/cos with exact values on quarter turns, so 90° steps resample
/// pixel-for-pixel.
fn exact_sin_cos(degrees: f32) -> (f32, f32) {
    let turns = degrees / 90.0;
    if (turns - turns.round()).abs() < 1e-6 {
        match (turns.round() as i64).rem_euclid(4) {
            0 => (0.0, 1.0),
            1 => (1.0, 0.0),
            2 => (0.0, -1.0),
            _ => (-1.0, 0.0),
        }
    } else {
        degrees.to_radians().sin_cos()
    }
}

/// Resampling used when drawing through a matrix.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Sampling {
    Nearest,
    #[default]
    Bilinear,
}

/// Draw `src` onto `dst` through `m` (source space → destination space) with
/// source-over blending. Destination pixel centres are inverse-mapped; pixels
/// whose centre falls outside the source are left untouched, which gives the
/// drawn image hard edges.
pub fn draw_transformed(
    dst: &mut RgbaImage,
    src: &RgbaImage,
    m: &Affine,
    sampling: Sampling,
    clip: Option<PixelRect>,
) {
    let Some(inv) = m.invert() else {
        log::debug!("draw_transformed: singular matrix, nothing drawn");
        return;
    };
    let (dw, dh) = dst.dimensions();
    let (sw, sh) = src.dimensions();
    if dw == 0 || dh == 0 || sw == 0 || sh == 0 {
        return;
    }

    // Destination bounding box of the source rectangle.
    let corners = [
        m.apply(0.0, 0.0),
        m.apply(sw as f32, 0.0),
        m.apply(0.0, sh as f32),
        m.apply(sw as f32, sh as f32),
    ];
    let min_x = corners.iter().map(|c| c.0).fold(f32::MAX, f32::min).floor().max(0.0) as u32;
    let min_y = corners.iter().map(|c| c.1).fold(f32::MAX, f32::min).floor().max(0.0) as u32;
    let max_x = (corners.iter().map(|c| c.0).fold(f32::MIN, f32::max).ceil().max(0.0) as u32).min(dw);
    let max_y = (corners.iter().map(|c| c.1).fold(f32::MIN, f32::max).ceil().max(0.0) as u32).min(dh);
    let mut bounds = PixelRect::new(min_x, min_y, max_x.saturating_sub(min_x), max_y.saturating_sub(min_y));
    if let Some(c) = clip {
        let x0 = bounds.x.max(c.x);
        let y0 = bounds.y.max(c.y);
        let x1 = (bounds.x + bounds.width).min(c.x + c.width);
        let y1 = (bounds.y + bounds.height).min(c.y + c.height);
        bounds = PixelRect::new(x0, y0, x1.saturating_sub(x0), y1.saturating_sub(y0));
    }
    if bounds.width == 0 || bounds.height == 0 {
        return;
    }

    let stride = dw as usize * 4;
    let src_w = sw as f32;
    let src_h = sh as f32;

    dst.as_mut()
        .par_chunks_mut(stride)
        .enumerate()
        .skip(bounds.y as usize)
        .take(bounds.height as usize)
        .for_each(|(dy, row)| {
            let cy = dy as f32 + 0.5;
            for dx in bounds.x..bounds.x + bounds.width {
                let cx = dx as f32 + 0.5;
                let (sx, sy) = inv.apply(cx, cy);
                if sx < 0.0 || sy < 0.0 || sx >= src_w || sy >= src_h {
                    continue;
                }
                let px = match sampling {
                    Sampling::Nearest => src.get_pixel(sx as u32, sy as u32).0,
                    Sampling::Bilinear => bilinear_sample(src, sx - 0.5, sy - 0.5),
                };
                let i = dx as usize * 4;
                blend_over(&mut row[i..i + 4], px);
            }
        });
}

/// Bilinear interpolation at pixel-centre coordinates, clamping to the edge.
fn bilinear_sample(img: &RgbaImage, x: f32, y: f32) -> [u8; 4] {
    let max_x = img.width() as i32 - 1;
    let max_y = img.height() as i32 - 1;
    let x0 = x.floor() as i32;
    let y0 = y.floor() as i32;
    let fx = x - x0 as f32;
    let fy = y - y0 as f32;

    let sample = |sx: i32, sy: i32| -> [f32; 4] {
        let p = img.get_pixel(sx.clamp(0, max_x) as u32, sy.clamp(0, max_y) as u32);
        [p[0] as f32, p[1] as f32, p[2] as f32, p[3] as f32]
    };

    let tl = sample(x0, y0);
    let tr = sample(x0 + 1, y0);
    let bl = sample(x0, y0 + 1);
    let br = sample(x0 + 1, y0 + 1);

    let lerp = |a: f32, b: f32, t: f32| a + (b - a) * t;
    let mut out = [0u8; 4];
    for c in 0..4 {
        let top = lerp(tl[c], tr[c], fx);
        let bot = lerp(bl[c], br[c], fx);
        out[c] = lerp(top, bot, fy).round().clamp(0.0, 255.0) as u8;
    }
    out
}

// ---------------------------------------------------------------------------
//  Fit rectangles
// ---------------------------------------------------------------------------

/// A destination rectangle in float pixels.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FitRect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

/// Cover-fit: scale = max(dw/sw, dh/sh), centred over the destination.
/// The result covers the destination entirely and may overflow it.
pub fn fit_cover(src_w: u32, src_h: u32, dest: FitRect) -> FitRect {
    let scale = (dest.width / src_w as f32).max(dest.height / src_h as f32);
    centred(src_w, src_h, scale, dest)
}

/// Contain-fit: scale = min(dw/sw, dh/sh) · `padding`, centred.
pub fn fit_contain(src_w: u32, src_h: u32, dest: FitRect, padding: f32) -> FitRect {
    let scale = (dest.width / src_w as f32).min(dest.height / src_h as f32) * padding;
    centred(src_w, src_h, scale, dest)
}

fn centred(src_w: u32, src_h: u32, scale: f32, dest: FitRect) -> FitRect {
    let w = src_w as f32 * scale;
    let h = src_h as f32 * scale;
    FitRect {
        x: dest.x + (dest.width - w) / 2.0,
        y: dest.y + (dest.height - h) / 2.0,
        width: w,
        height: h,
    }
}

/// Part of a scaled draw that actually lands inside the clip.
#[derive(Clone, Copy, Debug, PartialEq)]
struct ScaledWindow {
    /// Source pixels feeding the visible part (plus a one-pixel filter margin).
    source: PixelRect,
    /// Resampled size of `source`.
    width: u32,
    height: u32,
    /// Destination position of the resampled patch.
    x: i64,
    y: i64,
}

/// Map the visible part of a `w`×`h` target placed at (`ox`, `oy`) back onto a
/// `sw`×`sh` source. `None` when nothing of the target is inside `clip`.
fn scaled_window(sw: u32, sh: u32, ox: i64, oy: i64, w: u32, h: u32, clip: PixelRect) -> Option<ScaledWindow> {
    let (x0, x1) = visible_span(ox, w, clip.x, clip.width)?;
    let (y0, y1) = visible_span(oy, h, clip.y, clip.height)?;
    let (sx0, sx1, px, pw) = source_span(x0, x1, w, sw);
    let (sy0, sy1, py, ph) = source_span(y0, y1, h, sh);
    Some(ScaledWindow {
        source: PixelRect::new(sx0, sy0, sx1 - sx0, sy1 - sy0),
        width: pw,
        height: ph,
        x: ox + px,
        y: oy + py,
    })
}

/// Target-relative `[start, end)` of a `len` run at `origin` that falls
/// within `[clip_start, clip_start + clip_len)`.
fn visible_span(origin: i64, len: u32, clip_start: u32, clip_len: u32) -> Option<(u64, u64)> {
    let start = (clip_start as i64 - origin).clamp(0, len as i64);
    let end = (clip_start as i64 + clip_len as i64 - origin).clamp(0, len as i64);
    (start < end).then_some((start as u64, end as u64))
}

/// Source run covering target run `[t0, t1)` of a `target` long axis drawn from
/// a `source` long one. Returns the source bounds, the patch offset within the
/// target and the patch length.
fn source_span(t0: u64, t1: u64, target: u32, source: u32) -> (u32, u32, i64, u32) {
    let scale = target as f64 / source as f64;
    let s0 = ((t0 as f64 / scale).floor() as u32).saturating_sub(1).min(source - 1);
    let s1 = ((t1 as f64 / scale).ceil() as u32).saturating_add(1).clamp(s0 + 1, source);
    let offset = (s0 as f64 * scale).round() as i64;
    let end = (s1 as f64 * scale).round() as i64;
    (s0, s1, offset, (end - offset).max(1) as u32)
}

/// Draw `src` stretched to `dest` (usually a fit rectangle), clipped to `clip`.
///
/// Only the source pixels behind the visible part are resampled, once, to
/// their target size with a triangle filter and blitted. That avoids the
/// aliasing a per-pixel bilinear lookup shows on large reductions, and a
/// cover fit of an extreme panorama never materialises its overflow.
pub fn draw_scaled(dst: &mut RgbaImage, src: &RgbaImage, dest: FitRect, clip: Option<PixelRect>) {
    if src.width() == 0 || src.height() == 0 || !(dest.width > 0.0) || !(dest.height > 0.0) {
        return;
    }
    let (dw, dh) = dst.dimensions();
    let clip = clip.unwrap_or(PixelRect::new(0, 0, dw, dh));
    let Some(clip) = clip.clipped_to(dw, dh) else { return };

    let x0 = dest.x.floor();
    let y0 = dest.y.floor();
    let w = ((dest.x + dest.width).ceil() - x0).max(1.0) as u32;
    let h = ((dest.y + dest.height).ceil() - y0).max(1.0) as u32;
    let Some(window) = scaled_window(src.width(), src.height(), x0 as i64, y0 as i64, w, h, clip) else {
        return;
    };

    let s = window.source;
    let patch;
    let whole = (s.width, s.height) == src.dimensions();
    let img = if whole && (window.width, window.height) == src.dimensions() {
        src
    } else {
        let cropped = imageops::crop_imm(src, s.x, s.y, s.width, s.height).to_image();
        patch = if (window.width, window.height) == cropped.dimensions() {
            cropped
        } else {
            imageops::resize(&cropped, window.width, window.height, imageops::FilterType::Triangle)
        };
        &patch
    };

    let ox = window.x;
    let oy = window.y;
    let stride = dw as usize * 4;
    let img_w = img.width() as i64;
    let img_h = img.height() as i64;

    dst.as_mut()
        .par_chunks_mut(stride)
        .enumerate()
        .skip(clip.y as usize)
        .take(clip.height as usize)
        .for_each(|(dy, row)| {
            let sy = dy as i64 - oy;
            if sy < 0 || sy >= img_h {
                return;
            }
            for dx in clip.x..clip.x + clip.width {
                let sx = dx as i64 - ox;
                if sx < 0 || sx >= img_w {
                    continue;
                }
                let px = img.get_pixel(sx as u32, sy as u32).0;
                let i = dx as usize * 4;
                blend_over(&mut row[i..i + 4], px);
            }
        });
}

// ---------------------------------------------------------------------------
//  Crop
// ---------------------------------------------------------------------------

/// Centred crop of a `w`×`h` raster to `ratio` (width / height).
///
/// Wider than the ratio → full height, width = h·ratio; otherwise full width,
/// height = w / ratio. The crop is never stretched.
pub fn centered_crop(w: u32, h: u32, ratio: f32) -> PixelRect {
    if w == 0 || h == 0 || !(ratio > 0.0) || !ratio.is_finite() {
        return PixelRect::new(0, 0, w, h);
    }
    let (cw, ch) = if w as f32 / h as f32 > ratio {
        ((h as f32 * ratio).floor().max(1.0) as u32, h)
    } else {
        (w, (w as f32 / ratio).floor().max(1.0) as u32)
    };
    let cw = cw.min(w);
    let ch = ch.min(h);
    PixelRect::new((w - cw) / 2, (h - ch) / 2, cw, ch)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn approx(a: (f32, f32), b: (f32, f32)) -> bool {
        (a.0 - b.0).abs() < 1e-4 && (a.1 - b.1).abs() < 1e-4
    }

    #[test]
    fn affine_builder_order_matches_canvas() {
        // translate then scale: points are scaled first, then translated
        let m = Affine::IDENTITY.translate(10.0, 20.0).scale(2.0, 3.0);
        assert!(approx(m.apply(1.0, 1.0), (12.0, 23.0)));
    }

    #[test]
    fn quarter_turn_is_exact() {
        let m = Affine::IDENTITY.rotate_deg(90.0);
        assert_eq!(m.apply(1.0, 0.0), (0.0, 1.0));
        let m = Affine::IDENTITY.rotate_deg(-90.0);
        assert_eq!(m.apply(1.0, 0.0), (0.0, -1.0));
    }

    #[test]
    fn invert_round_trips() {
        let m = Affine::IDENTITY.translate(5.0, -3.0).rotate_deg(33.0).scale(1.5, -0.5);
        let inv = m.invert().unwrap();
        let p = m.apply(7.0, 11.0);
        assert!(approx(inv.apply(p.0, p.1), (7.0, 11.0)));
        assert!(Affine::IDENTITY.scale(0.0, 1.0).invert().is_none());
    }

    #[test]
    fn identity_draw_copies_pixels() {
        let mut src = RgbaImage::new(3, 2);
        for (i, p) in src.pixels_mut().enumerate() {
            *p = Rgba([i as u8 * 10, 0, 0, 255]);
        }
        let mut dst = RgbaImage::new(3, 2);
        draw_transformed(&mut dst, &src, &Affine::IDENTITY, Sampling::Bilinear, None);
        assert_eq!(dst, src);
    }

    #[test]
    fn cover_fit_fills_and_centres() {
        let r = fit_cover(200, 100, FitRect { x: 0.0, y: 0.0, width: 100.0, height: 100.0 });
        assert!((r.height - 100.0).abs() < 1e-4);
        assert!((r.width - 200.0).abs() < 1e-4);
        assert!((r.x + 50.0).abs() < 1e-4);
    }

    #[test]
    fn contain_fit_pads() {
        let r = fit_contain(100, 100, FitRect { x: 0.0, y: 0.0, width: 1080.0, height: 1920.0 }, 0.9);
        assert!((r.width - 972.0).abs() < 1e-3);
        assert!((r.y - (1920.0 - 972.0) / 2.0).abs() < 1e-3);
    }

    #[test]
    fn centered_crop_both_branches() {
        // wide image, square crop
        assert_eq!(centered_crop(1600, 900, 1.0), PixelRect::new(350, 0, 900, 900));
        // tall target on a square image
        assert_eq!(centered_crop(1000, 1000, 16.0 / 9.0), PixelRect::new(0, 219, 1000, 562));
        // bad ratio leaves the raster whole
        assert_eq!(centered_crop(10, 10, 0.0), PixelRect::new(0, 0, 10, 10));
    }

    #[test]
    fn extreme_cover_fit_only_resamples_the_visible_window() {
        // 4000x4 panorama cover-fitted into a 1080x1920 story frame: the
        // full fit would be 1,920,000 px wide.
        let fit = fit_cover(4000, 4, FitRect { x: 0.0, y: 0.0, width: 1080.0, height: 1920.0 });
        let x0 = fit.x.floor();
        let w = ((fit.x + fit.width).ceil() - x0) as u32;
        let window = scaled_window(4000, 4, x0 as i64, 0, w, 1920, PixelRect::new(0, 0, 1080, 1920)).unwrap();
        assert!(window.source.width <= 6);
        assert_eq!(window.source.height, 4);
        // visible width plus at most two source pixels of margin per side
        assert!(window.width <= 1080 + 4 * 480);
        assert_eq!(window.height, 1920);
        assert!(window.x <= 0 && window.x + window.width as i64 >= 1080);

        let src = RgbaImage::from_fn(4000, 4, |x, _| Rgba([(x / 16) as u8, 90, 30, 255]));
        let mut dst = RgbaImage::new(108, 192);
        let fit = fit_cover(4000, 4, FitRect { x: 0.0, y: 0.0, width: 108.0, height: 192.0 });
        draw_scaled(&mut dst, &src, fit, None);
        assert!(dst.pixels().all(|p| p[3] >= 254 && p[1].abs_diff(90) <= 1));
        // centre of the panorama: column ~2000 → red ~125
        let mid = dst.get_pixel(54, 96)[0];
        assert!((120..=130).contains(&mid), "{mid}");
    }

    #[test]
    fn window_is_the_whole_source_when_everything_is_visible() {
        let window = scaled_window(10, 10, 5, 0, 30, 20, PixelRect::new(0, 0, 100, 100)).unwrap();
        assert_eq!(window.source, PixelRect::new(0, 0, 10, 10));
        assert_eq!((window.width, window.height, window.x, window.y), (30, 20, 5, 0));
        assert!(scaled_window(10, 10, 200, 0, 30, 20, PixelRect::new(0, 0, 100, 100)).is_none());
    }

    #[test]
    fn draw_scaled_respects_clip() {
        let src = RgbaImage::from_pixel(10, 10, Rgba([200, 0, 0, 255]));
        let mut dst = RgbaImage::new(20, 20);
        draw_scaled(
            &mut dst,
            &src,
            FitRect { x: -5.0, y: 0.0, width: 30.0, height: 20.0 },
            Some(PixelRect::new(0, 0, 10, 20)),
        );
        assert_eq!(dst.get_pixel(9, 19)[3], 255);
        assert_eq!(dst.get_pixel(10, 0)[3], 0);
    }
}
