// ============================================================================
// EXPORT PIPELINE: clean / design downloads and platform-sized assets
// ============================================================================

use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use image::{Rgba, RgbaImage};
use serde::{Deserialize, Serialize};

use crate::collage::{self, CollageLayout};
use crate::compositor::{CompositeRenderer, HAlign, TextLayers, VAlign, Watermark, DEFAULT_WATERMARK_TEXT};
use crate::error::{EngineError, Result};
use crate::io::{self, ExportFormat};
use crate::ops::adjustments::{FilterChain, FilterOp};
use crate::ops::filters::{self, Shadow};
use crate::ops::transform::{fit_contain, fit_cover, FitRect};
use crate::surface::Surface;

pub const DEFAULT_EXPORT_QUALITY: u8 = 90;

const AMBIENCE_BLUR: f32 = 40.0;
const AMBIENCE_BRIGHTNESS: f32 = 0.7;
const FOREGROUND_PADDING: f32 = 0.9;

/// Social platform targets for `smart_export`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Platform {
    #[serde(rename = "sq")]
    Square,
    #[serde(rename = "st")]
    Story,
    #[serde(rename = "ls")]
    Landscape,
    #[serde(rename = "pt")]
    Portrait,
}

impl Platform {
    pub const ALL: [Platform; 4] = [Platform::Square, Platform::Story, Platform::Landscape, Platform::Portrait];

    pub fn id(self) -> &'static str {
        match self {
            Platform::Square => "sq",
            Platform::Story => "st",
            Platform::Landscape => "ls",
            Platform::Portrait => "pt",
        }
    }

    pub fn size(self) -> (u32, u32) {
        match self {
            Platform::Square => (1080, 1080),
            Platform::Story => (1080, 1920),
            Platform::Landscape => (1920, 1080),
            Platform::Portrait => (1080, 1350),
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        let key = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|p| {
                p.id() == key || format!("{:?}", p).eq_ignore_ascii_case(&key)
            })
            .ok_or_else(|| EngineError::UnknownPlatform(s.to_string()))
    }
}

/// Output size of a smart export.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExportTarget {
    Platform(Platform),
    Size { width: u32, height: u32 },
}

impl ExportTarget {
    pub fn size(self) -> (u32, u32) {
        match self {
            ExportTarget::Platform(p) => p.size(),
            ExportTarget::Size { width, height } => (width, height),
        }
    }

    fn variant(self) -> String {
        match self {
            ExportTarget::Platform(p) => p.id().to_string(),
            ExportTarget::Size { width, height } => format!("{}x{}", width, height),
        }
    }
}

/// What kind of asset a file holds; drives the file name.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ExportVariant {
    Clean,
    Design,
    Smart(ExportTarget),
    Collage(CollageLayout),
    Mask,
}

impl ExportVariant {
    pub fn tag(&self) -> String {
        match self {
            ExportVariant::Clean => "clean".to_string(),
            ExportVariant::Design => "design".to_string(),
            ExportVariant::Smart(t) => t.variant(),
            ExportVariant::Collage(layout) => format!("collage-{}", layout.id()),
            ExportVariant::Mask => "mask".to_string(),
        }
    }
}

/// `studioplay-<variant>-<epoch_ms>.<ext>`
pub fn export_file_name(variant: &ExportVariant, format: ExportFormat, epoch_ms: u128) -> String {
    format!("studioplay-{}-{}.{}", variant.tag(), epoch_ms, format.extension())
}

pub fn now_epoch_ms() -> u128 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_millis()).unwrap_or(0)
}

/// An encoded export ready to be saved or handed to a share sheet.
#[derive(Clone, Debug)]
pub struct ExportedFile {
    pub file_name: String,
    pub format: ExportFormat,
    pub width: u32,
    pub height: u32,
    pub bytes: Vec<u8>,
}

impl ExportedFile {
    pub fn data_url(&self) -> String {
        io::to_data_url(&self.bytes, self.format.mime())
    }

    /// Write into `dir` under `file_name`. Returns the full path.
    pub fn save_in(&self, dir: &Path) -> Result<PathBuf> {
        let path = dir.join(&self.file_name);
        std::fs::write(&path, &self.bytes)?;
        log::info!("saved export {}", path.display());
        Ok(path)
    }
}

/// Turns exact bitmaps into downloadable assets.
#[derive(Clone, Debug)]
pub struct ExportPipeline {
    renderer: CompositeRenderer,
    pub format: ExportFormat,
    pub quality: u8,
    pub watermark_text: String,
}

impl ExportPipeline {
    pub fn new(renderer: CompositeRenderer) -> Self {
        Self {
            renderer,
            format: ExportFormat::Png,
            quality: DEFAULT_EXPORT_QUALITY,
            watermark_text: DEFAULT_WATERMARK_TEXT.to_string(),
        }
    }

    pub fn with_format(mut self, format: ExportFormat, quality: u8) -> Self {
        self.format = format;
        self.quality = quality;
        self
    }

    pub fn with_watermark_text(mut self, text: impl Into<String>) -> Self {
        self.watermark_text = text.into();
        self
    }

    /// The exact bitmap with no overlays.
    pub fn download_clean(&self, exact: &RgbaImage) -> Result<ExportedFile> {
        self.package(exact, ExportVariant::Clean)
    }

    /// The exact bitmap with text and/or watermark burned in.
    pub fn download_design(
        &self,
        exact: &RgbaImage,
        text: Option<&TextLayers>,
        watermark: Option<&Watermark>,
    ) -> Result<ExportedFile> {
        let design = self.renderer.render_design(exact, text, watermark)?;
        self.package(&design, ExportVariant::Design)
    }

    /// Platform asset: blurred cover-fit ambience behind a contain-fit,
    /// shadowed foreground, with an optional corner watermark.
    pub fn smart_export(
        &self,
        source: &RgbaImage,
        text: Option<&TextLayers>,
        target: ExportTarget,
        show_watermark: bool,
    ) -> Result<ExportedFile> {
        let image = self.render_smart(source, text, target, show_watermark)?;
        self.package(&image, ExportVariant::Smart(target))
    }

    pub fn render_smart(
        &self,
        source: &RgbaImage,
        text: Option<&TextLayers>,
        target: ExportTarget,
        show_watermark: bool,
    ) -> Result<RgbaImage> {
        let (w, h) = target.size();
        let flattened;
        let src = match text {
            Some(t) => {
                flattened = self.renderer.render_design(source, Some(t), None)?;
                &flattened
            }
            None => source,
        };
        let (sw, sh) = src.dimensions();
        if sw == 0 || sh == 0 {
            return Err(EngineError::Surface { width: sw, height: sh });
        }
        let full = FitRect { x: 0.0, y: 0.0, width: w as f32, height: h as f32 };

        // Ambience
        let mut background = Surface::new(w, h)?;
        background.draw_scaled(src, fit_cover(sw, sh, full), None);
        let mut ambience = filters::large_blur(background.image(), AMBIENCE_BLUR);
        FilterChain::new(vec![FilterOp::Brightness(AMBIENCE_BRIGHTNESS)]).apply_to(&mut ambience);
        let mut canvas = Surface::from_image(ambience)?;
        background.dispose();

        // Foreground with its drop shadow
        let mut foreground = Surface::new(w, h)?;
        foreground.draw_scaled(src, fit_contain(sw, sh, full, FOREGROUND_PADDING), None);
        let shadow = Shadow { color: Rgba([0, 0, 0, 128]), blur: 40.0, offset_x: 0.0, offset_y: 20.0 };
        filters::draw_shadow(&mut canvas, foreground.image(), &shadow);
        canvas.draw_image(foreground.image(), 0, 0);
        foreground.dispose();

        if show_watermark {
            let size = (w as f32 * 0.025).round().max(20.0);
            let margin_x = w as f32 * 0.04;
            let margin_y = h as f32 * 0.04;
            self.renderer.draw_label(
                &mut canvas,
                &self.watermark_text,
                size,
                Rgba([255, 255, 255, 204]),
                w as f32 - margin_x,
                h as f32 - margin_y,
                HAlign::Right,
                VAlign::Bottom,
            );
        }
        log::debug!("smart export {}x{} from {}x{}", w, h, sw, sh);
        Ok(canvas.into_image())
    }

    /// Square collage of `images` in `layout`.
    pub fn export_collage(&self, layout: CollageLayout, images: &[RgbaImage], size: u32) -> Result<ExportedFile> {
        let image = collage::compose(layout, images, size)?;
        self.package(&image, ExportVariant::Collage(layout))
    }

    /// Binary masks are always PNG; lossy formats would break the two-level
    /// invariant.
    pub fn export_mask(&self, mask: &RgbaImage) -> Result<ExportedFile> {
        self.package_as(mask, ExportVariant::Mask, ExportFormat::Png)
    }

    fn package(&self, image: &RgbaImage, variant: ExportVariant) -> Result<ExportedFile> {
        self.package_as(image, variant, self.format)
    }

    fn package_as(&self, image: &RgbaImage, variant: ExportVariant, format: ExportFormat) -> Result<ExportedFile> {
        let bytes = io::encode_image(image, format, self.quality)?;
        Ok(ExportedFile {
            file_name: export_file_name(&variant, format, now_epoch_ms()),
            format,
            width: image.width(),
            height: image.height(),
            bytes,
        })
    }
}
