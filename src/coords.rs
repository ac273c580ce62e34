// ============================================================================
// COORDINATE SPACES: client pixels, canvas pixels, percent of container
// ============================================================================
//
// Pointer input arrives in client (on-screen) pixels. Rasters are addressed in
// canvas pixels at the source's natural resolution. Overlay layers are placed
// in percent of their container. Every crossing between these goes through a
// function in this module.
// ============================================================================

use serde::{Deserialize, Serialize};

/// A point in on-screen pixels, as reported by pointer/touch events.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ClientPx {
    pub x: f32,
    pub y: f32,
}

/// A point in raster pixels at the image's natural resolution.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct CanvasPx {
    pub x: f32,
    pub y: f32,
}

/// A point in percent of a container (0 = left/top edge, 100 = right/bottom).
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Percent {
    pub x: f32,
    pub y: f32,
}

impl ClientPx {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

impl CanvasPx {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Express this raster point as a percentage of a `width`×`height` raster.
    pub fn to_percent(self, width: u32, height: u32) -> Option<Percent> {
        if width == 0 || height == 0 {
            return None;
        }
        Some(Percent {
            x: self.x / width as f32 * 100.0,
            y: self.y / height as f32 * 100.0,
        })
    }

    pub fn distance(self, other: CanvasPx) -> f32 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }
}

impl Percent {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Map into a `width`×`height` raster.
    pub fn to_canvas(self, width: u32, height: u32) -> CanvasPx {
        CanvasPx {
            x: self.x / 100.0 * width as f32,
            y: self.y / 100.0 * height as f32,
        }
    }

    pub fn clamped(self, min: f32, max: f32) -> Self {
        Self {
            x: self.x.clamp(min, max),
            y: self.y.clamp(min, max),
        }
    }
}

/// The on-screen bounding box of an element, in client pixels.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ClientRect {
    pub left: f32,
    pub top: f32,
    pub width: f32,
    pub height: f32,
}

impl ClientRect {
    pub fn new(left: f32, top: f32, width: f32, height: f32) -> Self {
        Self { left, top, width, height }
    }

    fn is_degenerate(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }

    /// Map a client point over this element into the raster it displays.
    ///
    /// The raster may be shown at any scale, so each axis is rescaled by
    /// `raster_size / displayed_size`. Returns `None` for a collapsed element.
    pub fn to_canvas(&self, p: ClientPx, raster_w: u32, raster_h: u32) -> Option<CanvasPx> {
        if self.is_degenerate() {
            return None;
        }
        let scale_x = raster_w as f32 / self.width;
        let scale_y = raster_h as f32 / self.height;
        Some(CanvasPx {
            x: (p.x - self.left) * scale_x,
            y: (p.y - self.top) * scale_y,
        })
    }

    /// Client point → percent of this container.
    pub fn to_percent(&self, p: ClientPx) -> Option<Percent> {
        if self.is_degenerate() {
            return None;
        }
        Some(Percent {
            x: (p.x - self.left) / self.width * 100.0,
            y: (p.y - self.top) / self.height * 100.0,
        })
    }

    /// Percent of this container → client point.
    pub fn from_percent(&self, p: Percent) -> ClientPx {
        ClientPx {
            x: self.left + p.x / 100.0 * self.width,
            y: self.top + p.y / 100.0 * self.height,
        }
    }

    /// A client-pixel movement expressed in percent of this container.
    pub fn delta_to_percent(&self, dx: f32, dy: f32) -> Option<Percent> {
        if self.is_degenerate() {
            return None;
        }
        Some(Percent {
            x: dx / self.width * 100.0,
            y: dy / self.height * 100.0,
        })
    }
}
