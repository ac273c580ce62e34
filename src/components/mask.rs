// ============================================================================
// MASK PAINTER: freehand selection strokes and their binary derivation
// ============================================================================
//
// Strokes are stored as polylines in canvas pixels at the source's natural
// resolution and rasterized immediately into a translucent preview raster.
// Coverage is hard-edged (pixel centre within half the brush width of the
// path), so the derived mask depends on stroke geometry only.
// ============================================================================

use image::{Rgba, RgbaImage};

use crate::coords::{CanvasPx, ClientPx, ClientRect};
use crate::error::Result;
use crate::surface::Surface;

pub const DEFAULT_BRUSH_SIZE: f32 = 30.0;
pub const BRUSH_SIZE_RANGE: (f32, f32) = (5.0, 100.0);
/// rgba(236, 72, 153, 0.6)
pub const DEFAULT_BRUSH_COLOR: Rgba<u8> = Rgba([236, 72, 153, 153]);

const MASK_SELECTED: Rgba<u8> = Rgba([255, 255, 255, 255]);
const MASK_UNSELECTED: Rgba<u8> = Rgba([0, 0, 0, 255]);

#[derive(Clone, Debug, PartialEq)]
pub struct Stroke {
    pub points: Vec<CanvasPx>,
    pub size: f32,
}

#[derive(Clone, Debug)]
pub struct MaskPainter {
    raster: RgbaImage,
    strokes: Vec<Stroke>,
    drawing: bool,
    brush_size: f32,
    brush_color: Rgba<u8>,
}

impl MaskPainter {
    /// A blank mask for a `width`×`height` source.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            raster: RgbaImage::new(width, height),
            strokes: Vec::new(),
            drawing: false,
            brush_size: DEFAULT_BRUSH_SIZE,
            brush_color: DEFAULT_BRUSH_COLOR,
        }
    }

    pub fn with_brush(mut self, size: f32, color: Rgba<u8>) -> Self {
        self.set_brush_size(size);
        self.set_brush_color(color);
        self
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.raster.dimensions()
    }

    pub fn brush_size(&self) -> f32 {
        self.brush_size
    }

    /// Clamped to the brush slider range. Affects strokes started afterwards.
    pub fn set_brush_size(&mut self, size: f32) {
        self.brush_size = size.clamp(BRUSH_SIZE_RANGE.0, BRUSH_SIZE_RANGE.1);
    }

    pub fn brush_color(&self) -> Rgba<u8> {
        self.brush_color
    }

    /// Alpha is raised to at least 1 so every stroke stays visible to the
    /// mask derivation.
    pub fn set_brush_color(&mut self, color: Rgba<u8>) {
        let Rgba([r, g, b, a]) = color;
        self.brush_color = Rgba([r, g, b, a.max(1)]);
    }

    /// Resize for a new source image. Existing strokes are discarded.
    pub fn reset_to(&mut self, width: u32, height: u32) {
        self.raster = RgbaImage::new(width, height);
        self.strokes.clear();
        self.drawing = false;
    }

    pub fn strokes(&self) -> &[Stroke] {
        &self.strokes
    }

    /// The translucent stroke raster shown over the image while painting.
    pub fn stroke_raster(&self) -> &RgbaImage {
        &self.raster
    }

    pub fn is_drawing(&self) -> bool {
        self.drawing
    }

    /// Start a stroke. The start point is stamped, so a tap leaves a dot.
    pub fn begin_stroke(&mut self, p: CanvasPx) {
        let size = self.brush_size;
        self.strokes.push(Stroke { points: vec![p], size });
        self.drawing = true;
        self.paint_segment(p, p, size);
    }

    /// Continue the current stroke with a round-joined segment.
    /// Ignored when no stroke is in progress.
    pub fn extend_stroke(&mut self, p: CanvasPx) {
        if !self.drawing {
            return;
        }
        let Some(stroke) = self.strokes.last_mut() else { return };
        let Some(&last) = stroke.points.last() else { return };
        stroke.points.push(p);
        let size = stroke.size;
        self.paint_segment(last, p, size);
    }

    pub fn end_stroke(&mut self) {
        self.drawing = false;
    }

    /// `begin_stroke` with a client-space point over the displayed element.
    /// Returns false when the element has no size.
    pub fn begin_stroke_client(&mut self, p: ClientPx, displayed: &ClientRect) -> bool {
        let (w, h) = self.dimensions();
        match displayed.to_canvas(p, w, h) {
            Some(c) => {
                self.begin_stroke(c);
                true
            }
            None => false,
        }
    }

    pub fn extend_stroke_client(&mut self, p: ClientPx, displayed: &ClientRect) -> bool {
        let (w, h) = self.dimensions();
        match displayed.to_canvas(p, w, h) {
            Some(c) => {
                self.extend_stroke(c);
                true
            }
            None => false,
        }
    }

    pub fn has_content(&self) -> bool {
        !self.strokes.is_empty()
    }

    pub fn clear(&mut self) {
        let (w, h) = self.dimensions();
        self.reset_to(w, h);
    }

    /// Derive the strictly two-tone selection: black everywhere, white where
    /// any stroke covers the pixel. Alpha is always 255.
    pub fn to_binary_mask(&self) -> Result<RgbaImage> {
        let (w, h) = self.dimensions();
        let mut surface = Surface::filled(w, h, MASK_UNSELECTED)?;
        surface.draw_image(&self.raster, 0, 0);
        surface.fill_where_covered(&self.raster, MASK_SELECTED);
        Ok(surface.into_image())
    }

    /// Paint a round-capped segment of width `size` into the stroke raster.
    fn paint_segment(&mut self, a: CanvasPx, b: CanvasPx, size: f32) {
        let r = size / 2.0;
        let (w, h) = self.raster.dimensions();
        if w == 0 || h == 0 {
            return;
        }
        let x0 = (a.x.min(b.x) - r).floor().max(0.0) as u32;
        let y0 = (a.y.min(b.y) - r).floor().max(0.0) as u32;
        let x1 = ((a.x.max(b.x) + r).ceil().max(0.0) as u32).min(w);
        let y1 = ((a.y.max(b.y) + r).ceil().max(0.0) as u32).min(h);
        let r2 = r * r;
        let color = self.brush_color;

        for y in y0..y1 {
            for x in x0..x1 {
                let c = CanvasPx::new(x as f32 + 0.5, y as f32 + 0.5);
                if segment_distance_sq(c, a, b) <= r2 {
                    self.raster.put_pixel(x, y, color);
                }
            }
        }
    }
}

/// Squared distance from `p` to the segment `a`–`b`.
fn segment_distance_sq(p: CanvasPx, a: CanvasPx, b: CanvasPx) -> f32 {
    let (dx, dy) = (b.x - a.x, b.y - a.y);
    let len2 = dx * dx + dy * dy;
    let t = if len2 <= f32::EPSILON {
        0.0
    } else {
        (((p.x - a.x) * dx + (p.y - a.y) * dy) / len2).clamp(0.0, 1.0)
    };
    let qx = a.x + t * dx - p.x;
    let qy = a.y + t * dy - p.y;
    qx * qx + qy * qy
}
