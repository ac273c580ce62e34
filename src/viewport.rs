// ============================================================================
// VIEWPORT: workspace zoom, pan and before/after compare slider
// ============================================================================

use crate::components::layers::LayerSet;
use crate::coords::{ClientPx, ClientRect};

pub const WHEEL_ZOOM_RANGE: (f32, f32) = (0.1, 5.0);
pub const BUTTON_ZOOM_RANGE: (f32, f32) = (0.5, 5.0);
const WHEEL_SENSITIVITY: f32 = 0.001;
const ZOOM_STEP: f32 = 0.5;

#[derive(Clone, Debug, PartialEq)]
pub struct Viewport {
    scale: f32,
    offset: ClientPx,
    pan_start: Option<ClientPx>,
    /// Compare divider position in percent of the container width.
    compare: f32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self { scale: 1.0, offset: ClientPx::default(), pan_start: None, compare: 50.0 }
    }
}

impl Viewport {
    pub fn scale(&self) -> f32 {
        self.scale
    }

    pub fn offset(&self) -> ClientPx {
        self.offset
    }

    pub fn is_panning(&self) -> bool {
        self.pan_start.is_some()
    }

    pub fn compare_position(&self) -> f32 {
        self.compare
    }

    pub fn zoom_by_wheel(&mut self, delta_y: f32) {
        let (lo, hi) = WHEEL_ZOOM_RANGE;
        self.scale = (self.scale - delta_y * WHEEL_SENSITIVITY).clamp(lo, hi);
    }

    pub fn zoom_in(&mut self) {
        let (lo, hi) = BUTTON_ZOOM_RANGE;
        self.scale = (self.scale + ZOOM_STEP).clamp(lo, hi);
    }

    pub fn zoom_out(&mut self) {
        let (lo, hi) = BUTTON_ZOOM_RANGE;
        self.scale = (self.scale - ZOOM_STEP).clamp(lo, hi);
    }

    /// Begin panning from `pointer`. Clicking the canvas background also
    /// drops any layer selection.
    pub fn start_pan(&mut self, pointer: ClientPx, layers: &mut LayerSet) {
        layers.deselect();
        self.pan_start = Some(ClientPx::new(pointer.x - self.offset.x, pointer.y - self.offset.y));
    }

    /// Returns false when no pan is in progress.
    pub fn pan_to(&mut self, pointer: ClientPx) -> bool {
        let Some(start) = self.pan_start else { return false };
        self.offset = ClientPx::new(pointer.x - start.x, pointer.y - start.y);
        true
    }

    pub fn end_pan(&mut self) {
        self.pan_start = None;
    }

    /// Move the compare divider to the pointer's x within `container`.
    pub fn set_compare_from_pointer(&mut self, pointer: ClientPx, container: &ClientRect) {
        if container.width <= 0.0 {
            return;
        }
        self.compare = ((pointer.x - container.left) / container.width * 100.0).clamp(0.0, 100.0);
    }

    pub fn reset(&mut self) {
        self.scale = 1.0;
        self.offset = ClientPx::default();
        self.pan_start = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::layers::LayerId;

    #[test]
    fn wheel_zoom_is_clamped() {
        let mut v = Viewport::default();
        v.zoom_by_wheel(-500.0);
        assert!((v.scale() - 1.5).abs() < 1e-6);
        v.zoom_by_wheel(100_000.0);
        assert_eq!(v.scale(), 0.1);
        v.zoom_by_wheel(-100_000.0);
        assert_eq!(v.scale(), 5.0);
    }

    #[test]
    fn buttons_step_by_half() {
        let mut v = Viewport::default();
        v.zoom_out();
        v.zoom_out();
        assert_eq!(v.scale(), 0.5);
        for _ in 0..20 {
            v.zoom_in();
        }
        assert_eq!(v.scale(), 5.0);
    }

    #[test]
    fn pan_tracks_pointer_and_deselects() {
        let mut layers = LayerSet::default();
        layers.select(LayerId::Title);
        let mut v = Viewport::default();
        assert!(!v.pan_to(ClientPx::new(1.0, 1.0)));
        v.start_pan(ClientPx::new(100.0, 100.0), &mut layers);
        assert_eq!(layers.selected(), None);
        assert!(v.pan_to(ClientPx::new(130.0, 90.0)));
        assert_eq!(v.offset(), ClientPx::new(30.0, -10.0));
        v.end_pan();
        // a second pan continues from the current offset
        v.start_pan(ClientPx::new(0.0, 0.0), &mut layers);
        v.pan_to(ClientPx::new(5.0, 5.0));
        assert_eq!(v.offset(), ClientPx::new(35.0, -5.0));
        v.reset();
        assert_eq!((v.scale(), v.offset(), v.is_panning()), (1.0, ClientPx::default(), false));
    }

    #[test]
    fn compare_slider_follows_pointer() {
        let mut v = Viewport::default();
        let rect = ClientRect::new(100.0, 0.0, 400.0, 300.0);
        v.set_compare_from_pointer(ClientPx::new(200.0, 10.0), &rect);
        assert_eq!(v.compare_position(), 25.0);
        v.set_compare_from_pointer(ClientPx::new(900.0, 10.0), &rect);
        assert_eq!(v.compare_position(), 100.0);
        v.set_compare_from_pointer(ClientPx::new(0.0, 10.0), &rect);
        assert_eq!(v.compare_position(), 0.0);
    }
}
