// ============================================================================
// COLLAGE: fixed layouts, cover-fit cells on a white square canvas
// ============================================================================

use image::{Rgba, RgbaImage};
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result, ValidationError};
use crate::ops::transform::{fit_cover, FitRect};
use crate::surface::{PixelRect, Surface};

pub const DEFAULT_COLLAGE_SIZE: u32 = 2048;
const BACKGROUND: Rgba<u8> = Rgba([255, 255, 255, 255]);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CollageLayout {
    #[serde(rename = "grid-2x2")]
    Grid2x2,
    #[serde(rename = "split-v")]
    SplitV,
    #[serde(rename = "split-h")]
    SplitH,
    #[serde(rename = "mix-3")]
    Mix3,
}

impl CollageLayout {
    pub const ALL: [CollageLayout; 4] =
        [CollageLayout::Grid2x2, CollageLayout::SplitV, CollageLayout::SplitH, CollageLayout::Mix3];

    pub fn id(self) -> &'static str {
        match self {
            CollageLayout::Grid2x2 => "grid-2x2",
            CollageLayout::SplitV => "split-v",
            CollageLayout::SplitH => "split-h",
            CollageLayout::Mix3 => "mix-3",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|l| l.id().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| EngineError::UnknownLayout(s.to_string()))
    }

    pub fn max_images(self) -> usize {
        self.cells(DEFAULT_COLLAGE_SIZE).len()
    }

    /// Cell rectangles for a `size`×`size` canvas, in fill order.
    pub fn cells(self, size: u32) -> Vec<PixelRect> {
        let half = size / 2;
        let rest = size - half;
        match self {
            CollageLayout::Grid2x2 => vec![
                PixelRect::new(0, 0, half, half),
                PixelRect::new(half, 0, rest, half),
                PixelRect::new(0, half, half, rest),
                PixelRect::new(half, half, rest, rest),
            ],
            CollageLayout::SplitV => {
                vec![PixelRect::new(0, 0, half, size), PixelRect::new(half, 0, rest, size)]
            }
            CollageLayout::SplitH => {
                vec![PixelRect::new(0, 0, size, half), PixelRect::new(0, half, size, rest)]
            }
            CollageLayout::Mix3 => vec![
                PixelRect::new(0, 0, half, size),
                PixelRect::new(half, 0, rest, half),
                PixelRect::new(half, half, rest, rest),
            ],
        }
    }
}

/// One cell of a layout and the index of the image it shows, if any.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CellPlacement {
    pub rect: PixelRect,
    pub image: Option<usize>,
}

/// Cell rects with their assigned image for an editor grid.
pub fn cell_placements(layout: CollageLayout, size: u32, image_count: usize) -> Vec<CellPlacement> {
    layout
        .cells(size)
        .into_iter()
        .enumerate()
        .map(|(i, rect)| CellPlacement { rect, image: (i < image_count).then_some(i) })
        .collect()
}

/// Compose `images` into a `size`×`size` collage.
pub fn compose(layout: CollageLayout, images: &[RgbaImage], size: u32) -> Result<RgbaImage> {
    if images.is_empty() {
        return Err(ValidationError::NotEnoughImages {
            layout: layout.id().to_string(),
            required: 1,
            supplied: 0,
        }
        .into());
    }
    let placements = cell_placements(layout, size, images.len());
    if images.len() > placements.len() {
        log::warn!(
            "collage '{}' holds {} image(s); ignoring {} extra",
            layout.id(),
            placements.len(),
            images.len() - placements.len()
        );
    }

    let mut surface = Surface::filled(size, size, BACKGROUND)?;
    for cell in &placements {
        let Some(idx) = cell.image else { continue };
        let img = &images[idx];
        if img.width() == 0 || img.height() == 0 {
            log::warn!("collage image {} is empty; cell left blank", idx);
            continue;
        }
        let dest = FitRect {
            x: cell.rect.x as f32,
            y: cell.rect.y as f32,
            width: cell.rect.width as f32,
            height: cell.rect.height as f32,
        };
        let fit = fit_cover(img.width(), img.height(), dest);
        surface.draw_scaled(img, fit, Some(cell.rect));
    }
    log::debug!("collage '{}' composed at {}px from {} image(s)", layout.id(), size, images.len());
    Ok(surface.into_image())
}
