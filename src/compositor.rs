// ============================================================================
// COMPOSITE RENDERER: live preview description and the exact raster passes
// ============================================================================
//
// Both paths read their geometry and colour functions from `EditState`
// (`transform()` and `filter_chain()`), so the description the editor shows
// and the pixels that get exported cannot drift apart.
//
// Exact pass:  source → flip/rotate matrix → filter chain → centred crop
// Design pass: exact bitmap → style background → title → price → discount
//              → watermark
// ============================================================================

use std::sync::Arc;

use image::{Rgba, RgbaImage};
use serde::{Deserialize, Serialize};

use crate::components::layers::{LayerId, LayerSet, TextTransform, TextTransforms, WatermarkPosition};
use crate::coords::Percent;
use crate::edit_state::EditState;
use crate::error::Result;
use crate::ops::filters::{self, Shadow};
use crate::ops::text::{FontStyle, GlyphRun, TextRasterizer};
use crate::ops::transform::{Affine, Sampling};
use crate::surface::{PixelRect, Surface};

pub const DEFAULT_WATERMARK_TEXT: &str = "StudioPlay AI";

const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);
const DISCOUNT_RED: Rgba<u8> = Rgba([0xef, 0x44, 0x44, 255]);
const GOLD_DARK: Rgba<u8> = Rgba([0xBF, 0x95, 0x3F, 255]);
const GOLD_LIGHT: Rgba<u8> = Rgba([0xFC, 0xF6, 0xBA, 255]);

/// Gold title gradient stops.
const GOLD_STOPS: [(f32, [u8; 3]); 5] = [
    (0.0, [0xBF, 0x95, 0x3F]),
    (0.2, [0xFC, 0xF6, 0xBA]),
    (0.4, [0xB3, 0x87, 0x28]),
    (0.6, [0xFB, 0xF5, 0xB7]),
    (1.0, [0xAA, 0x77, 0x1C]),
];

/// `rgba(r, g, b, a)` with a fractional alpha, rounded like a canvas does.
const fn rgba(r: u8, g: u8, b: u8, a: f32) -> Rgba<u8> {
    Rgba([r, g, b, (a * 255.0 + 0.5) as u8])
}

// ---------------------------------------------------------------------------
//  Text campaign data
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TextStyle {
    #[default]
    Classic,
    Modern,
    LuxuryGold,
}

impl TextStyle {
    /// Any style id without a dedicated treatment renders as `Classic`.
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "modern" => TextStyle::Modern,
            "luxury-gold" | "luxury_gold" | "luxury" | "gold" => TextStyle::LuxuryGold,
            _ => TextStyle::Classic,
        }
    }
}

/// The marketing text burned into a design.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TextLayers {
    pub title: String,
    pub price: String,
    pub discount: Option<String>,
    pub style: TextStyle,
    pub transforms: TextTransforms,
}

impl TextLayers {
    pub fn new(title: impl Into<String>, price: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            price: price.into(),
            discount: None,
            style: TextStyle::default(),
            transforms: TextTransforms::default(),
        }
    }

    pub fn with_discount(mut self, discount: impl Into<String>) -> Self {
        let d = discount.into();
        self.discount = if d.trim().is_empty() { None } else { Some(d) };
        self
    }

    pub fn with_style(mut self, style: TextStyle) -> Self {
        self.style = style;
        self
    }

    pub fn with_transforms(mut self, transforms: TextTransforms) -> Self {
        self.transforms = transforms;
        self
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Watermark {
    pub text: String,
    pub position: WatermarkPosition,
}

impl Default for Watermark {
    fn default() -> Self {
        Self { text: DEFAULT_WATERMARK_TEXT.to_string(), position: WatermarkPosition::default() }
    }
}

// ---------------------------------------------------------------------------
//  Preview description
// ---------------------------------------------------------------------------

/// Where an overlay sits in the preview, in percent of the container.
#[derive(Clone, Debug, PartialEq)]
pub struct OverlayPlacement {
    pub layer: LayerId,
    pub position: Percent,
    pub scale: f32,
    pub rotation: f32,
    /// CSS transform applied around the anchor.
    pub css_transform: String,
    pub active: bool,
}

/// What the editor needs to show the current state without rasterizing.
#[derive(Clone, Debug, PartialEq)]
pub struct PreviewDescription {
    /// CSS `filter` value, `none` while showing the original.
    pub filter: String,
    /// CSS `transform` value for the image element.
    pub transform: String,
    pub output_width: u32,
    pub output_height: u32,
    pub crop: Option<PixelRect>,
    pub overlays: Vec<OverlayPlacement>,
}

// ---------------------------------------------------------------------------
//  Paints
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq)]
enum Paint {
    Solid(Rgba<u8>),
    /// Linear gradient between two points in layer space.
    Linear { from: (f32, f32), to: (f32, f32), stops: &'static [(f32, [u8; 3])] },
}

impl Paint {
    fn color_at(&self, x: f32, y: f32) -> Rgba<u8> {
        match *self {
            Paint::Solid(c) => c,
            Paint::Linear { from, to, stops } => {
                let (vx, vy) = (to.0 - from.0, to.1 - from.1);
                let len2 = vx * vx + vy * vy;
                let t = if len2 > 0.0 {
                    (((x - from.0) * vx + (y - from.1) * vy) / len2).clamp(0.0, 1.0)
                } else {
                    0.0
                };
                let rgb = sample_stops(stops, t);
                Rgba([rgb[0], rgb[1], rgb[2], 255])
            }
        }
    }
}

fn sample_stops(stops: &[(f32, [u8; 3])], t: f32) -> [u8; 3] {
    let Some(first) = stops.first() else { return [0, 0, 0] };
    if t <= first.0 {
        return first.1;
    }
    for pair in stops.windows(2) {
        let (t0, c0) = pair[0];
        let (t1, c1) = pair[1];
        if t <= t1 {
            let f = if t1 > t0 { (t - t0) / (t1 - t0) } else { 0.0 };
            let mix = |a: u8, b: u8| (a as f32 + (b as f32 - a as f32) * f).round() as u8;
            return [mix(c0[0], c1[0]), mix(c0[1], c1[1]), mix(c0[2], c1[2])];
        }
    }
    stops[stops.len() - 1].1
}

/// Decoration drawn behind a text item.
#[derive(Clone, Copy, Debug, PartialEq)]
enum TextBox {
    /// Filled rectangle `text + pad_w` wide and `height` tall.
    Filled { color: Rgba<u8>, pad_w: f32, height: f32 },
    /// Stroked rectangle outline.
    Outline { color: Rgba<u8>, line: f32, pad_w: f32, height: f32 },
}

/// Everything needed to paint one text item.
#[derive(Clone, Copy, Debug)]
struct TextItemStyle {
    size: f32,
    font: FontStyle,
    paint: Paint,
    shadow: Option<Shadow>,
    decoration: Option<TextBox>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum TextRole {
    Title,
    Price,
    Discount,
}

fn item_style(role: TextRole, style: TextStyle, base: f32) -> TextItemStyle {
    let shadow = |alpha: f32, blur: f32, offset_y: f32| Shadow {
        color: rgba(0, 0, 0, alpha),
        blur,
        offset_x: 0.0,
        offset_y,
    };
    match (role, style) {
        (TextRole::Title, TextStyle::LuxuryGold) => TextItemStyle {
            size: base * 1.8,
            font: FontStyle::BOLD,
            paint: Paint::Linear { from: (-150.0, -25.0), to: (150.0, 25.0), stops: &GOLD_STOPS },
            shadow: Some(shadow(0.6, 15.0, 10.0)),
            decoration: None,
        },
        (TextRole::Title, _) => TextItemStyle {
            size: base * 1.5,
            font: FontStyle::BOLD,
            paint: Paint::Solid(WHITE),
            shadow: Some(shadow(0.6, 30.0, 0.0)),
            decoration: None,
        },
        (TextRole::Price, TextStyle::LuxuryGold) => TextItemStyle {
            size: base * 0.9,
            font: FontStyle::ITALIC,
            paint: Paint::Solid(GOLD_LIGHT),
            shadow: Some(shadow(0.4, 8.0, 0.0)),
            decoration: None,
        },
        (TextRole::Price, _) => TextItemStyle {
            size: base,
            font: FontStyle::BOLD,
            paint: Paint::Solid(rgba(255, 255, 255, 0.9)),
            shadow: None,
            decoration: None,
        },
        (TextRole::Discount, TextStyle::LuxuryGold) => TextItemStyle {
            size: base * 0.75,
            font: FontStyle::BOLD,
            paint: Paint::Solid(GOLD_LIGHT),
            shadow: None,
            decoration: Some(TextBox::Outline { color: GOLD_DARK, line: 3.0, pad_w: 60.0, height: 70.0 }),
        },
        (TextRole::Discount, _) => TextItemStyle {
            size: base * 0.8,
            font: FontStyle::BOLD,
            paint: Paint::Solid(WHITE),
            shadow: None,
            decoration: Some(TextBox::Filled { color: DISCOUNT_RED, pad_w: 40.0, height: 50.0 }),
        },
    }
}

/// Horizontal text alignment relative to the anchor.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HAlign {
    Left,
    Center,
    Right,
}

/// Which line of the em box sits on the anchor.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VAlign {
    Top,
    Middle,
    Bottom,
}

/// Pen origin (x, baseline y) relative to the anchor for a line of text.
fn pen_origin(run_width: f32, ascent: f32, descent: f32, h: HAlign, v: VAlign) -> (f32, f32) {
    let x = match h {
        HAlign::Left => 0.0,
        HAlign::Center => -run_width / 2.0,
        HAlign::Right => -run_width,
    };
    let y = match v {
        VAlign::Top => ascent,
        VAlign::Middle => (ascent + descent) / 2.0,
        VAlign::Bottom => descent,
    };
    (x, y)
}

/// Tint a coverage run with `paint`, evaluated in layer space where the run's
/// top-left corner sits at (`ox`, `oy`).
fn colorize(run: &GlyphRun, paint: &Paint, ox: f32, oy: f32) -> RgbaImage {
    let mut out = RgbaImage::new(run.coverage.width(), run.coverage.height());
    for (x, y, p) in run.coverage.enumerate_pixels() {
        let cov = p[3];
        if cov == 0 {
            continue;
        }
        let c = paint.color_at(ox + x as f32 + 0.5, oy + y as f32 + 0.5);
        let a = (cov as u32 * c[3] as u32 + 127) / 255;
        out.put_pixel(x, y, Rgba([c[0], c[1], c[2], a as u8]));
    }
    out
}

/// Build the pixels of a text box decoration, returning the image and its
/// top-left corner in layer space.
fn box_image(decoration: &TextBox, text_width: f32, scale: f32) -> (RgbaImage, f32, f32) {
    match *decoration {
        TextBox::Filled { color, pad_w, height } => {
            let w = (text_width + pad_w * scale).round().max(1.0) as u32;
            let h = (height * scale).round().max(1.0) as u32;
            (RgbaImage::from_pixel(w, h, color), -(w as f32) / 2.0, -(h as f32) / 2.0)
        }
        TextBox::Outline { color, line, pad_w, height } => {
            // The stroke straddles the rectangle path.
            let rw = text_width + pad_w * scale;
            let rh = height * scale;
            let lw = (line * scale).max(1.0);
            let w = (rw + lw).round().max(1.0) as u32;
            let h = (rh + lw).round().max(1.0) as u32;
            let band = lw.round().max(1.0) as u32;
            let img = RgbaImage::from_fn(w, h, |x, y| {
                let edge = x < band || y < band || x + band >= w || y + band >= h;
                if edge { color } else { Rgba([0, 0, 0, 0]) }
            });
            (img, -(w as f32) / 2.0, -(h as f32) / 2.0)
        }
    }
}

// ---------------------------------------------------------------------------
//  Renderer
// ---------------------------------------------------------------------------

/// Produces previews and exact rasters. Cheap to clone.
#[derive(Clone)]
pub struct CompositeRenderer {
    text: Arc<dyn TextRasterizer + Send>,
}

impl std::fmt::Debug for CompositeRenderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompositeRenderer").finish_non_exhaustive()
    }
}

impl CompositeRenderer {
    pub fn new<R: TextRasterizer + Send + 'static>(rasterizer: R) -> Self {
        Self { text: Arc::new(rasterizer) }
    }

    pub fn shared(rasterizer: Arc<dyn TextRasterizer + Send>) -> Self {
        Self { text: rasterizer }
    }

    pub fn rasterizer(&self) -> &dyn TextRasterizer {
        self.text.as_ref()
    }

    /// Describe the current state for the live editor.
    pub fn preview(
        &self,
        state: &EditState,
        src_w: u32,
        src_h: u32,
        show_original: bool,
        layers: &LayerSet,
        text: Option<&TextLayers>,
        show_watermark: bool,
    ) -> PreviewDescription {
        let (ow, oh) = state.output_dimensions(src_w, src_h);
        let mut overlays = Vec::new();

        if let Some(text) = text {
            let t = layers.text_transforms();
            let mut items = vec![(LayerId::Title, t.title), (LayerId::Price, t.price)];
            if text.discount.is_some() {
                items.push((LayerId::Discount, t.discount));
            }
            for (id, tr) in items {
                overlays.push(OverlayPlacement {
                    layer: id,
                    position: Percent::new(tr.x, tr.y),
                    scale: tr.scale,
                    rotation: tr.rotation,
                    css_transform: format!(
                        "translate(-50%, -50%) scale({}) rotate({}deg)",
                        tr.scale, tr.rotation
                    ),
                    active: layers.is_active(id),
                });
            }
        }
        if show_watermark {
            let wm = layers.watermark_position();
            overlays.push(OverlayPlacement {
                layer: LayerId::Watermark,
                position: Percent::new(wm.x, wm.y),
                scale: 1.0,
                rotation: 0.0,
                css_transform: format!(
                    "translate({}, {})",
                    if wm.x > 50.0 { "-100%" } else { "0%" },
                    if wm.y > 50.0 { "-100%" } else { "0%" }
                ),
                active: layers.is_active(LayerId::Watermark),
            });
        }

        PreviewDescription {
            filter: state.filter_css(show_original),
            transform: state.transform().css(),
            output_width: ow,
            output_height: oh,
            crop: state.crop_rect(ow, oh),
            overlays,
        }
    }

    /// Pixel-accurate render of `source` under `state`.
    pub fn render_exact(&self, source: &RgbaImage, state: &EditState) -> Result<RgbaImage> {
        let (sw, sh) = source.dimensions();
        let (ow, oh) = state.output_dimensions(sw, sh);
        let mut surface = Surface::new(ow, oh)?;
        let m = state.transform().matrix(sw, sh, ow, oh);
        surface.draw_transformed(source, &m, Sampling::Bilinear, None);
        state.filter_chain().apply_to(surface.image_mut());

        match state.crop_rect(ow, oh) {
            Some(rect) => Ok(surface.crop(rect)?.into_image()),
            None => Ok(surface.into_image()),
        }
    }

    /// Carry a binary mask through the same geometry as `render_exact`
    /// (no colour filters, nearest sampling). Uncovered pixels are black.
    pub fn render_mask_geometry(&self, mask: &RgbaImage, state: &EditState) -> Result<RgbaImage> {
        let (sw, sh) = mask.dimensions();
        let (ow, oh) = state.output_dimensions(sw, sh);
        let mut surface = Surface::filled(ow, oh, Rgba([0, 0, 0, 255]))?;
        let m = state.transform().matrix(sw, sh, ow, oh);
        surface.draw_transformed(mask, &m, Sampling::Nearest, None);
        let out = match state.crop_rect(ow, oh) {
            Some(rect) => surface.crop(rect)?,
            None => surface,
        };
        Ok(binarize(out.into_image()))
    }

    /// Burn text and/or the watermark into `base`.
    pub fn render_design(
        &self,
        base: &RgbaImage,
        text: Option<&TextLayers>,
        watermark: Option<&Watermark>,
    ) -> Result<RgbaImage> {
        let mut surface = Surface::from_image(base.clone())?;

        if let Some(text) = text {
            paint_style_background(&mut surface, text.style);
            let base_size = surface.width() as f32 / 20.0;
            self.draw_text_item(&mut surface, &text.title, &text.transforms.title, TextRole::Title, text.style, base_size)?;
            self.draw_text_item(&mut surface, &text.price, &text.transforms.price, TextRole::Price, text.style, base_size)?;
            if let Some(discount) = &text.discount {
                self.draw_text_item(
                    &mut surface,
                    discount,
                    &text.transforms.discount,
                    TextRole::Discount,
                    text.style,
                    base_size,
                )?;
            }
        }

        if let Some(wm) = watermark {
            let (w, h) = surface.dimensions();
            let size = w as f32 * 0.02;
            let x = w as f32 * wm.position.x / 100.0;
            let y = h as f32 * wm.position.y / 100.0;
            let halign = if wm.position.x > 50.0 { HAlign::Right } else { HAlign::Left };
            let valign = if wm.position.y > 50.0 { VAlign::Bottom } else { VAlign::Top };
            self.draw_label(&mut surface, &wm.text, size, rgba(255, 255, 255, 0.4), x, y, halign, valign);
        }

        Ok(surface.into_image())
    }

    /// Draw one untransformed line of bold text aligned to (`x`, `y`).
    pub fn draw_label(
        &self,
        surface: &mut Surface,
        text: &str,
        size: f32,
        color: Rgba<u8>,
        x: f32,
        y: f32,
        halign: HAlign,
        valign: VAlign,
    ) {
        if text.trim().is_empty() || size <= 0.0 {
            return;
        }
        let Some(run) = self.text.rasterize(text, size, FontStyle::BOLD) else {
            log::warn!("no glyphs produced for label '{}'", text);
            return;
        };
        let m = run.metrics;
        let (px, py) = pen_origin(m.width, m.ascent, m.descent, halign, valign);
        let img = colorize(&run, &Paint::Solid(color), 0.0, 0.0);
        let left = (x + px + run.left).round() as i64;
        let top = (y + py + run.top).round() as i64;
        surface.draw_image(&img, left, top);
    }

    /// Paint one text item: decoration box, fill and its shadow, anchored at
    /// the transform's position, rotated, then scaled.
    ///
    /// Content is built at device scale (font size and box multiplied by the
    /// layer scale) so only the rotation is resampled.
    fn draw_text_item(
        &self,
        surface: &mut Surface,
        text: &str,
        transform: &TextTransform,
        role: TextRole,
        style: TextStyle,
        base_size: f32,
    ) -> Result<()> {
        if text.trim().is_empty() {
            return Ok(());
        }
        let (w, h) = surface.dimensions();
        let look = item_style(role, style, base_size);
        let s = transform.scale;
        let Some(run) = self.text.rasterize(text, look.size * s, look.font) else {
            log::warn!("text rasterizer produced no glyphs for {:?}; layer skipped", role);
            return Ok(());
        };

        let anchor = Affine::IDENTITY
            .translate(w as f32 * transform.x / 100.0, h as f32 * transform.y / 100.0)
            .rotate_deg(transform.rotation);

        let mut layer = Surface::new(w, h)?;

        if let Some(decoration) = &look.decoration {
            let (img, bx, by) = box_image(decoration, run.metrics.width, s);
            layer.draw_transformed(&img, &anchor.translate(bx, by), Sampling::Bilinear, None);
        }

        let m = run.metrics;
        let (px, py) = pen_origin(m.width, m.ascent, m.descent, HAlign::Center, VAlign::Middle);
        let ox = px + run.left;
        let oy = py + run.top;
        let paint = match look.paint {
            Paint::Linear { from, to, stops } => Paint::Linear {
                from: (from.0 * s, from.1 * s),
                to: (to.0 * s, to.1 * s),
                stops,
            },
            solid => solid,
        };
        let glyphs = colorize(&run, &paint, ox, oy);
        let mut text_layer = Surface::new(w, h)?;
        text_layer.draw_transformed(&glyphs, &anchor.translate(ox, oy), Sampling::Bilinear, None);

        // The shadow belongs to the fill only; boxes are drawn without one.
        if let Some(shadow) = &look.shadow {
            filters::draw_shadow(&mut layer, text_layer.image(), shadow);
        }
        layer.draw_image(text_layer.image(), 0, 0);
        text_layer.dispose();

        surface.draw_image(layer.image(), 0, 0);
        Ok(())
    }
}

/// Force every pixel to opaque black or white (threshold at half intensity).
pub fn binarize(mut img: RgbaImage) -> RgbaImage {
    for p in img.pixels_mut() {
        let on = p[3] >= 128 && (p[0] as u32 + p[1] as u32 + p[2] as u32) >= 3 * 128;
        *p = if on { Rgba([255, 255, 255, 255]) } else { Rgba([0, 0, 0, 255]) };
    }
    img
}

/// Style-specific wash painted under the text.
fn paint_style_background(surface: &mut Surface, style: TextStyle) {
    let (w, h) = surface.dimensions();
    let (wf, hf) = (w as f32, h as f32);
    match style {
        TextStyle::Classic => {}
        TextStyle::Modern => {
            // Gradient runs 0 → 0.85 from 0.6H to H; the fill starts at 0.5H.
            let g0 = hf * 0.6;
            let g1 = hf;
            let fill_top = (hf * 0.5).floor() as u32;
            surface.fill_with(|_, y| {
                if y < fill_top {
                    return [0, 0, 0, 0];
                }
                let cy = y as f32 + 0.5;
                let t = ((cy - g0) / (g1 - g0)).clamp(0.0, 1.0);
                [0, 0, 0, (t * 0.85 * 255.0).round() as u8]
            });
        }
        TextStyle::LuxuryGold => {
            let (cx, cy) = (wf / 2.0, hf / 2.0);
            surface.fill_with(|x, y| {
                let dx = x as f32 + 0.5 - cx;
                let dy = y as f32 + 0.5 - cy;
                let t = ((dx * dx + dy * dy).sqrt() / wf).clamp(0.0, 1.0);
                [0, 0, 0, (t * 0.25 * 255.0).round() as u8]
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{gradient, BlockGlyphs};

    fn renderer() -> CompositeRenderer {
        CompositeRenderer::new(BlockGlyphs)
    }

    #[test]
    fn neutral_exact_pass_is_identity() {
        let src = gradient(33, 17);
        let out = renderer().render_exact(&src, &EditState::default()).unwrap();
        assert_eq!(out, src);
    }

    #[test]
    fn quarter_turn_moves_corners() {
        let src = gradient(4, 2);
        let state = EditState::default().with_rotation(90);
        let out = renderer().render_exact(&src, &state).unwrap();
        assert_eq!(out.dimensions(), (2, 4));
        // clockwise: source top-left ends up top-right
        assert_eq!(out.get_pixel(1, 0), src.get_pixel(0, 0));
        assert_eq!(out.get_pixel(0, 3), src.get_pixel(3, 1));
    }

    #[test]
    fn flip_x_mirrors() {
        let src = gradient(5, 3);
        let out = renderer().render_exact(&src, &EditState::default().with_flip_x(true)).unwrap();
        for y in 0..3 {
            for x in 0..5 {
                assert_eq!(out.get_pixel(x, y), src.get_pixel(4 - x, y));
            }
        }
    }

    #[test]
    fn filter_runs_after_geometry() {
        let src = RgbaImage::from_pixel(6, 4, Rgba([100, 100, 100, 255]));
        let state = EditState::default().with_brightness(120.0).with_rotation(180);
        let out = renderer().render_exact(&src, &state).unwrap();
        assert!(out.pixels().all(|p| p.0 == [120, 120, 120, 255]));
    }

    #[test]
    fn crop_is_centred() {
        let src = gradient(200, 100);
        let state = EditState::default().with_aspect_ratio(Some(1.0));
        let out = renderer().render_exact(&src, &state).unwrap();
        assert_eq!(out.dimensions(), (100, 100));
        assert_eq!(out.get_pixel(0, 0), src.get_pixel(50, 0));
    }

    #[test]
    fn mask_geometry_follows_image_geometry() {
        let mut mask = RgbaImage::from_pixel(4, 2, Rgba([0, 0, 0, 255]));
        mask.put_pixel(0, 0, Rgba([255, 255, 255, 255]));
        let state = EditState::default().with_rotation(90).with_brightness(150.0);
        let out = renderer().render_mask_geometry(&mask, &state).unwrap();
        assert_eq!(out.dimensions(), (2, 4));
        assert_eq!(out.get_pixel(1, 0).0, [255, 255, 255, 255]);
        assert_eq!(out.get_pixel(0, 0).0, [0, 0, 0, 255]);
    }

    #[test]
    fn preview_mirrors_state_and_layers() {
        let state = EditState::default().with_rotation(270).with_aspect_ratio(Some(1.0));
        let mut layers = LayerSet::default();
        layers.select(LayerId::Price);
        let text = TextLayers::new("Sale", "$10");
        let p = renderer().preview(&state, 300, 200, false, &layers, Some(&text), true);
        assert_eq!((p.output_width, p.output_height), (200, 300));
        assert_eq!(p.crop, Some(PixelRect::new(0, 50, 200, 200)));
        assert_eq!(p.transform, "scaleX(1) scaleY(1) rotate(270deg)");
        let ids: Vec<LayerId> = p.overlays.iter().map(|o| o.layer).collect();
        assert_eq!(ids, vec![LayerId::Title, LayerId::Price, LayerId::Watermark]);
        assert!(p.overlays[1].active && !p.overlays[0].active);
        assert_eq!(p.overlays[2].css_transform, "translate(0%, -100%)");
        let p = renderer().preview(&state, 300, 200, true, &layers, None, false);
        assert_eq!(p.filter, "none");
        assert!(p.overlays.is_empty());
    }

    #[test]
    fn title_is_painted_at_its_anchor() {
        let base = RgbaImage::from_pixel(400, 200, Rgba([0, 0, 255, 255]));
        let text = TextLayers::new("AB", "");
        let out = renderer().render_design(&base, Some(&text), None).unwrap();
        // title anchor at (200, 60); block glyphs are white
        assert_eq!(out.get_pixel(200, 60).0, [255, 255, 255, 255]);
        // far corner untouched by text (shadow is faint there)
        assert_eq!(out.get_pixel(2, 198).0, [0, 0, 255, 255]);
    }

    #[test]
    fn discount_box_is_red_under_classic() {
        let base = RgbaImage::from_pixel(400, 400, Rgba([0, 0, 0, 255]));
        let text = TextLayers::new("", "").with_discount("X");
        let out = renderer().render_design(&base, Some(&text), None).unwrap();
        // discount anchor (200, 280); text block is ~10px wide, box is ~52px
        assert_eq!(out.get_pixel(200 - 20, 280).0, [0xef, 0x44, 0x44, 255]);
        assert_eq!(out.get_pixel(200, 280).0, [255, 255, 255, 255]);
    }

    #[test]
    fn empty_discount_is_not_a_layer() {
        let t = TextLayers::new("a", "b").with_discount("  ");
        assert!(t.discount.is_none());
    }

    #[test]
    fn modern_background_darkens_bottom_only() {
        let base = RgbaImage::from_pixel(10, 100, Rgba([200, 200, 200, 255]));
        let text = TextLayers::new("", "").with_style(TextStyle::Modern);
        let out = renderer().render_design(&base, Some(&text), None).unwrap();
        assert_eq!(out.get_pixel(5, 10).0, [200, 200, 200, 255]);
        assert_eq!(out.get_pixel(5, 55).0, [200, 200, 200, 255]);
        assert!(out.get_pixel(5, 99)[0] < 50);
    }

    #[test]
    fn watermark_alignment_follows_quadrant() {
        let base = RgbaImage::from_pixel(1000, 500, Rgba([0, 0, 0, 255]));
        // bottom-right: text ends at x=900 and its em box bottom sits on y=450
        let wm = Watermark { text: "W".into(), position: WatermarkPosition::new(90.0, 90.0) };
        let out = renderer().render_design(&base, None, Some(&wm)).unwrap();
        // size 20 → block 12 wide, spans y in [430, 450)
        assert!(out.get_pixel(895, 440)[0] > 0);
        assert_eq!(out.get_pixel(905, 440)[0], 0);
        assert_eq!(out.get_pixel(895, 455)[0], 0);
    }

    #[test]
    fn gold_gradient_interpolates_stops() {
        assert_eq!(sample_stops(&GOLD_STOPS, 0.0), [0xBF, 0x95, 0x3F]);
        assert_eq!(sample_stops(&GOLD_STOPS, 1.0), [0xAA, 0x77, 0x1C]);
        assert_eq!(sample_stops(&GOLD_STOPS, 0.2), [0xFC, 0xF6, 0xBA]);
    }

    #[test]
    fn text_style_parsing_falls_back_to_classic() {
        assert_eq!(TextStyle::parse("luxury-gold"), TextStyle::LuxuryGold);
        assert_eq!(TextStyle::parse("Modern"), TextStyle::Modern);
        assert_eq!(TextStyle::parse("glass-box"), TextStyle::Classic);
    }

    #[test]
    fn binarize_is_two_tone() {
        let img = RgbaImage::from_fn(4, 1, |x, _| Rgba([x as u8 * 80, x as u8 * 80, x as u8 * 80, 255]));
        let out = binarize(img);
        assert_eq!(out.get_pixel(0, 0).0, [0, 0, 0, 255]);
        assert_eq!(out.get_pixel(3, 0).0, [255, 255, 255, 255]);
    }
}
