// ============================================================================
// EDIT STATE: non-destructive adjustment snapshot and its two descriptions
// ============================================================================
//
// An `EditState` is a plain `Copy` value. Everything downstream (the CSS-style
// preview strings, the exact-pass matrix, output size and crop) is derived
// from it here, so the preview and the exact pass read the same numbers.
// ============================================================================

use serde::{Deserialize, Serialize};

use crate::ops::adjustments::{FilterChain, FilterOp};
use crate::ops::transform::{self, Affine};
use crate::surface::PixelRect;

/// Adjustment and geometry snapshot. Percentages use 100 as neutral for
/// brightness/contrast/saturation and 0 for warmth.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct EditState {
    pub brightness: f32,
    pub contrast: f32,
    pub saturation: f32,
    /// Sepia amount in percent.
    pub warmth: f32,
    /// Quarter turns only: 0, 90, 180 or 270.
    pub rotation: u32,
    pub fine_rotation: f32,
    pub flip_x: bool,
    pub flip_y: bool,
    /// Crop ratio (width / height); `None` keeps the full frame.
    pub aspect_ratio: Option<f32>,
}

impl Default for EditState {
    fn default() -> Self {
        Self {
            brightness: 100.0,
            contrast: 100.0,
            saturation: 100.0,
            warmth: 0.0,
            rotation: 0,
            fine_rotation: 0.0,
            flip_x: false,
            flip_y: false,
            aspect_ratio: None,
        }
    }
}

impl EditState {
    pub fn with_brightness(self, brightness: f32) -> Self {
        Self { brightness, ..self }
    }

    pub fn with_contrast(self, contrast: f32) -> Self {
        Self { contrast, ..self }
    }

    pub fn with_saturation(self, saturation: f32) -> Self {
        Self { saturation, ..self }
    }

    pub fn with_warmth(self, warmth: f32) -> Self {
        Self { warmth, ..self }
    }

    /// Snap to the nearest quarter turn and normalize into [0, 360).
    pub fn with_rotation(self, degrees: i32) -> Self {
        let quarter = ((degrees as f32 / 90.0).round() as i32).rem_euclid(4);
        Self { rotation: quarter as u32 * 90, ..self }
    }

    pub fn with_fine_rotation(self, fine_rotation: f32) -> Self {
        Self { fine_rotation, ..self }
    }

    pub fn with_flip_x(self, flip_x: bool) -> Self {
        Self { flip_x, ..self }
    }

    pub fn with_flip_y(self, flip_y: bool) -> Self {
        Self { flip_y, ..self }
    }

    /// Non-positive or non-finite ratios clear the crop.
    pub fn with_aspect_ratio(self, aspect_ratio: Option<f32>) -> Self {
        let aspect_ratio = aspect_ratio.filter(|r| r.is_finite() && *r > 0.0);
        Self { aspect_ratio, ..self }
    }

    pub fn with_aspect(self, preset: AspectPreset) -> Self {
        self.with_aspect_ratio(preset.ratio())
    }

    /// The editor's rotate button: one quarter turn clockwise.
    pub fn rotated_cw(self) -> Self {
        Self { rotation: (self.rotation + 90) % 360, ..self }
    }

    pub fn toggled_flip_x(self) -> Self {
        Self { flip_x: !self.flip_x, ..self }
    }

    pub fn toggled_flip_y(self) -> Self {
        Self { flip_y: !self.flip_y, ..self }
    }

    /// Total rotation applied by both paths, in degrees.
    pub fn total_rotation(&self) -> f32 {
        self.rotation as f32 + self.fine_rotation
    }

    /// The colour functions in their fixed order.
    pub fn filter_chain(&self) -> FilterChain {
        FilterChain::new(vec![
            FilterOp::Brightness(self.brightness / 100.0),
            FilterOp::Contrast(self.contrast / 100.0),
            FilterOp::Saturate(self.saturation / 100.0),
            FilterOp::Sepia(self.warmth / 100.0),
        ])
    }

    /// Preview filter text; `none` while the user holds "show original".
    pub fn filter_css(&self, show_original: bool) -> String {
        if show_original {
            return "none".to_string();
        }
        self.filter_chain().css()
    }

    pub fn transform(&self) -> TransformDescription {
        TransformDescription {
            scale_x: if self.flip_x { -1.0 } else { 1.0 },
            scale_y: if self.flip_y { -1.0 } else { 1.0 },
            rotate_deg: self.total_rotation(),
        }
    }

    /// Size of the exact-pass raster before cropping. Width and height swap on
    /// 90° and 270°; fine rotation never grows the frame.
    pub fn output_dimensions(&self, src_w: u32, src_h: u32) -> (u32, u32) {
        if self.rotation % 180 != 0 { (src_h, src_w) } else { (src_w, src_h) }
    }

    /// Centred crop of a `w`×`h` post-transform raster, if a ratio is set.
    pub fn crop_rect(&self, w: u32, h: u32) -> Option<PixelRect> {
        self.aspect_ratio.map(|r| transform::centered_crop(w, h, r))
    }

    /// Final output size after transform and crop.
    pub fn final_dimensions(&self, src_w: u32, src_h: u32) -> (u32, u32) {
        let (w, h) = self.output_dimensions(src_w, src_h);
        match self.crop_rect(w, h) {
            Some(r) => (r.width, r.height),
            None => (w, h),
        }
    }

    pub fn is_neutral(&self) -> bool {
        *self == EditState::default()
    }
}

/// Flip and rotation as one description shared by the preview and exact pass.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TransformDescription {
    pub scale_x: f32,
    pub scale_y: f32,
    pub rotate_deg: f32,
}

impl TransformDescription {
    /// CSS `transform` text, e.g. `scaleX(-1) scaleY(1) rotate(90deg)`.
    pub fn css(&self) -> String {
        format!(
            "scaleX({}) scaleY({}) rotate({}deg)",
            self.scale_x, self.scale_y, self.rotate_deg
        )
    }

    /// Source → output matrix for a `src_w`×`src_h` bitmap drawn into an
    /// `out_w`×`out_h` raster:
    /// `translate(centre) · scale(flip) · rotate · translate(-src/2)`.
    pub fn matrix(&self, src_w: u32, src_h: u32, out_w: u32, out_h: u32) -> Affine {
        Affine::IDENTITY
            .translate(out_w as f32 / 2.0, out_h as f32 / 2.0)
            .scale(self.scale_x, self.scale_y)
            .rotate_deg(self.rotate_deg)
            .translate(-(src_w as f32) / 2.0, -(src_h as f32) / 2.0)
    }
}

/// The crop presets offered next to the free ratio.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AspectPreset {
    Story,
    Portrait,
    Square,
    Cover,
    Free,
}

impl AspectPreset {
    pub const ALL: [AspectPreset; 5] = [
        AspectPreset::Story,
        AspectPreset::Portrait,
        AspectPreset::Square,
        AspectPreset::Cover,
        AspectPreset::Free,
    ];

    pub fn ratio(self) -> Option<f32> {
        match self {
            AspectPreset::Story => Some(9.0 / 16.0),
            AspectPreset::Portrait => Some(4.0 / 5.0),
            AspectPreset::Square => Some(1.0),
            AspectPreset::Cover => Some(16.0 / 9.0),
            AspectPreset::Free => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            AspectPreset::Story => "Story",
            AspectPreset::Portrait => "Portrait",
            AspectPreset::Square => "Square",
            AspectPreset::Cover => "Cover",
            AspectPreset::Free => "Free",
        }
    }

    /// Parse a CLI/settings value: a preset name or `w:h`.
    pub fn parse_ratio(s: &str) -> Option<Option<f32>> {
        let lower = s.trim().to_ascii_lowercase();
        for p in Self::ALL {
            if p.label().to_ascii_lowercase() == lower {
                return Some(p.ratio());
            }
        }
        let (w, h) = lower.split_once(':')?;
        let w: f32 = w.trim().parse().ok()?;
        let h: f32 = h.trim().parse().ok()?;
        if w > 0.0 && h > 0.0 { Some(Some(w / h)) } else { None }
    }
}

/// Slider-driven fields and their editor ranges.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Adjustment {
    Brightness,
    Contrast,
    Saturation,
    Warmth,
    FineRotation,
}

impl Adjustment {
    pub fn range(self) -> (f32, f32) {
        match self {
            Adjustment::Brightness | Adjustment::Contrast => (50.0, 150.0),
            Adjustment::Saturation => (0.0, 200.0),
            Adjustment::Warmth => (0.0, 100.0),
            Adjustment::FineRotation => (-45.0, 45.0),
        }
    }

    /// Set the slider's field, clamped to its range.
    pub fn apply(self, state: EditState, value: f32) -> EditState {
        let (lo, hi) = self.range();
        let v = value.clamp(lo, hi);
        match self {
            Adjustment::Brightness => state.with_brightness(v),
            Adjustment::Contrast => state.with_contrast(v),
            Adjustment::Saturation => state.with_saturation(v),
            Adjustment::Warmth => state.with_warmth(v),
            Adjustment::FineRotation => state.with_fine_rotation(v),
        }
    }

    pub fn read(self, state: &EditState) -> f32 {
        match self {
            Adjustment::Brightness => state.brightness,
            Adjustment::Contrast => state.contrast,
            Adjustment::Saturation => state.saturation,
            Adjustment::Warmth => state.warmth,
            Adjustment::FineRotation => state.fine_rotation,
        }
    }
}
