// ============================================================================
// OVERLAY LAYERS: percent-positioned text/watermark with drag & resize
// ============================================================================
//
// Each overlay owns a `LayerTransformController`. A gesture snapshots the
// transform and the pointer once at start; every move recomputes from that
// snapshot, so rapid move events cannot accumulate drift. Pointer input is
// pulled from a `PointerSource`; nothing here listens globally.
// ============================================================================

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::coords::{ClientPx, ClientRect, Percent};

/// Position range for text layers (partially off-canvas placement allowed).
pub const TEXT_POSITION_RANGE: (f32, f32) = (-50.0, 150.0);
/// Position range for the watermark.
pub const WATERMARK_POSITION_RANGE: (f32, f32) = (0.0, 100.0);
pub const SCALE_RANGE: (f32, f32) = (0.2, 5.0);
/// Pointer pixels per unit of scale for the axis-sum resize metric.
pub const RESIZE_SENSITIVITY: f32 = 300.0;

/// Placement of a text layer: position in percent of the container, a scale
/// multiplier and a rotation in degrees.
///
/// Deserialized values go through the same clamps as gestures.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawTextTransform")]
pub struct TextTransform {
    pub x: f32,
    pub y: f32,
    pub scale: f32,
    pub rotation: f32,
}

impl TextTransform {
    pub fn at(x: f32, y: f32) -> Self {
        Self { x, y, scale: 1.0, rotation: 0.0 }.clamped()
    }

    pub fn with_rotation(self, rotation: f32) -> Self {
        Self { rotation, ..self }
    }

    fn clamped(self) -> Self {
        let (lo, hi) = TEXT_POSITION_RANGE;
        Self {
            x: self.x.clamp(lo, hi),
            y: self.y.clamp(lo, hi),
            scale: self.scale.clamp(SCALE_RANGE.0, SCALE_RANGE.1),
            rotation: self.rotation,
        }
    }
}

impl Default for TextTransform {
    fn default() -> Self {
        Self::at(50.0, 50.0)
    }
}

#[derive(Deserialize)]
struct RawTextTransform {
    x: f32,
    y: f32,
    scale: f32,
    rotation: f32,
}

impl From<RawTextTransform> for TextTransform {
    fn from(raw: RawTextTransform) -> Self {
        Self { x: raw.x, y: raw.y, scale: raw.scale, rotation: raw.rotation }.clamped()
    }
}

/// Watermark anchor in percent. Not scalable or rotatable.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawWatermarkPosition")]
pub struct WatermarkPosition {
    pub x: f32,
    pub y: f32,
}

#[derive(Deserialize)]
struct RawWatermarkPosition {
    x: f32,
    y: f32,
}

impl From<RawWatermarkPosition> for WatermarkPosition {
    fn from(raw: RawWatermarkPosition) -> Self {
        WatermarkPosition::new(raw.x, raw.y)
    }
}

impl WatermarkPosition {
    pub fn new(x: f32, y: f32) -> Self {
        let (lo, hi) = WATERMARK_POSITION_RANGE;
        Self { x: x.clamp(lo, hi), y: y.clamp(lo, hi) }
    }
}

impl Default for WatermarkPosition {
    fn default() -> Self {
        Self { x: 3.0, y: 97.0 }
    }
}

/// Anything the controller can move around.
pub trait OverlayTransform: Copy + std::fmt::Debug {
    fn position(&self) -> Percent;

    /// Move to `p`, clamped to this overlay's allowed range.
    fn with_position(self, p: Percent) -> Self;

    /// `None` for overlays that cannot be resized.
    fn scale(&self) -> Option<f32> {
        None
    }

    /// Set the scale, clamped. No-op for fixed-size overlays.
    fn with_scale(self, _scale: f32) -> Self {
        self
    }
}

impl OverlayTransform for TextTransform {
    fn position(&self) -> Percent {
        Percent::new(self.x, self.y)
    }

    fn with_position(self, p: Percent) -> Self {
        Self { x: p.x, y: p.y, ..self }.clamped()
    }

    fn scale(&self) -> Option<f32> {
        Some(self.scale)
    }

    fn with_scale(self, scale: f32) -> Self {
        Self { scale, ..self }.clamped()
    }
}

impl OverlayTransform for WatermarkPosition {
    fn position(&self) -> Percent {
        Percent::new(self.x, self.y)
    }

    fn with_position(self, p: Percent) -> Self {
        WatermarkPosition::new(p.x, p.y)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum GestureMode {
    Drag,
    Resize,
}

/// How a resize gesture turns pointer movement into scale.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResizeMetric {
    /// `scale = start + (dx + dy) / 300`.
    #[default]
    AxisSum,
    /// `scale = start · |pointer − anchor| / |start_pointer − anchor|`.
    AnchorDistance,
}

impl ResizeMetric {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "axis_sum" | "axis-sum" | "axissum" => Some(ResizeMetric::AxisSum),
            "anchor_distance" | "anchor-distance" | "anchordistance" => Some(ResizeMetric::AnchorDistance),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ResizeMetric::AxisSum => "axis_sum",
            ResizeMetric::AnchorDistance => "anchor_distance",
        }
    }
}

#[derive(Clone, Copy, Debug)]
struct Gesture<T> {
    mode: GestureMode,
    start_pointer: ClientPx,
    start_transform: T,
}

/// Drag/resize state machine for one overlay.
#[derive(Clone, Debug)]
pub struct LayerTransformController<T: OverlayTransform> {
    transform: T,
    gesture: Option<Gesture<T>>,
    resize_metric: ResizeMetric,
}

impl<T: OverlayTransform> LayerTransformController<T> {
    pub fn new(transform: T) -> Self {
        Self { transform, gesture: None, resize_metric: ResizeMetric::default() }
    }

    pub fn with_resize_metric(mut self, metric: ResizeMetric) -> Self {
        self.resize_metric = metric;
        self
    }

    pub fn set_resize_metric(&mut self, metric: ResizeMetric) {
        self.resize_metric = metric;
    }

    pub fn transform(&self) -> T {
        self.transform
    }

    /// Replace the transform outright (layout presets, resets). Any gesture in
    /// progress is abandoned.
    pub fn set_transform(&mut self, transform: T) {
        self.transform = transform.with_position(transform.position());
        self.gesture = None;
    }

    pub fn mode(&self) -> Option<GestureMode> {
        self.gesture.map(|g| g.mode)
    }

    pub fn is_dragging(&self) -> bool {
        self.mode() == Some(GestureMode::Drag)
    }

    pub fn is_resizing(&self) -> bool {
        self.mode() == Some(GestureMode::Resize)
    }

    /// Snapshot the transform and pointer. Resizing a fixed-size overlay
    /// degrades to a drag.
    pub fn on_gesture_start(&mut self, pointer: ClientPx, mode: GestureMode) {
        let mode = match (mode, self.transform.scale()) {
            (GestureMode::Resize, None) => GestureMode::Drag,
            (m, _) => m,
        };
        self.gesture = Some(Gesture { mode, start_pointer: pointer, start_transform: self.transform });
    }

    /// Recompute the transform from the gesture snapshot. Returns the new
    /// transform, or `None` when no gesture is active or the container is
    /// collapsed.
    pub fn on_gesture_move(&mut self, pointer: ClientPx, container: &ClientRect) -> Option<T> {
        let g = self.gesture?;
        let dx = pointer.x - g.start_pointer.x;
        let dy = pointer.y - g.start_pointer.y;

        let next = match g.mode {
            GestureMode::Drag => {
                let d = container.delta_to_percent(dx, dy)?;
                let start = g.start_transform.position();
                g.start_transform.with_position(Percent::new(start.x + d.x, start.y + d.y))
            }
            GestureMode::Resize => {
                let start_scale = g.start_transform.scale()?;
                let scale = match self.resize_metric {
                    ResizeMetric::AxisSum => start_scale + (dx + dy) / RESIZE_SENSITIVITY,
                    ResizeMetric::AnchorDistance => {
                        let anchor = container.from_percent(g.start_transform.position());
                        let d0 = distance(g.start_pointer, anchor);
                        if d0 < 1.0 {
                            start_scale + (dx + dy) / RESIZE_SENSITIVITY
                        } else {
                            start_scale * distance(pointer, anchor) / d0
                        }
                    }
                };
                g.start_transform.with_scale(scale)
            }
        };
        self.transform = next;
        Some(next)
    }

    pub fn on_gesture_end(&mut self) {
        self.gesture = None;
    }
}

fn distance(a: ClientPx, b: ClientPx) -> f32 {
    ((a.x - b.x).powi(2) + (a.y - b.y).powi(2)).sqrt()
}

// ---------------------------------------------------------------------------
//  Layer set
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LayerId {
    Title,
    Price,
    Discount,
    Watermark,
}

/// Transforms of the three text layers.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct TextTransforms {
    pub title: TextTransform,
    pub price: TextTransform,
    pub discount: TextTransform,
}

impl Default for TextTransforms {
    fn default() -> Self {
        Self {
            title: TextTransform::at(50.0, 30.0),
            price: TextTransform::at(50.0, 50.0),
            discount: TextTransform::at(50.0, 70.0),
        }
    }
}

/// Vertical arrangements of the text block.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum LayoutPreset {
    Top,
    Center,
    Bottom,
}

impl LayoutPreset {
    /// y positions of title, price and discount.
    pub fn rows(self) -> [f32; 3] {
        match self {
            LayoutPreset::Top => [20.0, 35.0, 50.0],
            LayoutPreset::Center => [45.0, 55.0, 65.0],
            LayoutPreset::Bottom => [70.0, 80.0, 90.0],
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "top" => Some(LayoutPreset::Top),
            "center" | "centre" => Some(LayoutPreset::Center),
            "bottom" => Some(LayoutPreset::Bottom),
            _ => None,
        }
    }
}

/// Pointer input delivered to the layer set.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PointerEvent {
    /// Press; `target` is the layer and handle under the pointer, if any.
    Down {
        pos: ClientPx,
        target: Option<(LayerId, GestureMode)>,
    },
    Move {
        pos: ClientPx,
    },
    Up,
}

/// Where pointer events come from.
pub trait PointerSource {
    fn next_event(&mut self) -> Option<PointerEvent>;
}

impl PointerSource for VecDeque<PointerEvent> {
    fn next_event(&mut self) -> Option<PointerEvent> {
        self.pop_front()
    }
}

/// The four overlays of a design, with exclusive selection.
#[derive(Clone, Debug)]
pub struct LayerSet {
    pub title: LayerTransformController<TextTransform>,
    pub price: LayerTransformController<TextTransform>,
    pub discount: LayerTransformController<TextTransform>,
    pub watermark: LayerTransformController<WatermarkPosition>,
    selected: Option<LayerId>,
}

impl Default for LayerSet {
    fn default() -> Self {
        Self::new(TextTransforms::default(), WatermarkPosition::default())
    }
}

impl LayerSet {
    pub fn new(text: TextTransforms, watermark: WatermarkPosition) -> Self {
        Self {
            title: LayerTransformController::new(text.title),
            price: LayerTransformController::new(text.price),
            discount: LayerTransformController::new(text.discount),
            watermark: LayerTransformController::new(watermark),
            selected: None,
        }
    }

    pub fn set_resize_metric(&mut self, metric: ResizeMetric) {
        self.title.set_resize_metric(metric);
        self.price.set_resize_metric(metric);
        self.discount.set_resize_metric(metric);
    }

    pub fn text_transforms(&self) -> TextTransforms {
        TextTransforms {
            title: self.title.transform(),
            price: self.price.transform(),
            discount: self.discount.transform(),
        }
    }

    pub fn watermark_position(&self) -> WatermarkPosition {
        self.watermark.transform()
    }

    pub fn set_text_transforms(&mut self, t: TextTransforms) {
        self.title.set_transform(t.title);
        self.price.set_transform(t.price);
        self.discount.set_transform(t.discount);
    }

    /// Move the text block to a preset, keeping x, scale and rotation.
    pub fn apply_preset(&mut self, preset: LayoutPreset) {
        let [ty, py, dy] = preset.rows();
        for (ctl, y) in [(&mut self.title, ty), (&mut self.price, py), (&mut self.discount, dy)] {
            let t = ctl.transform();
            ctl.set_transform(t.with_position(Percent::new(t.x, y)));
        }
    }

    /// Default placements and no selection; the resize metric is kept.
    pub fn reset(&mut self) {
        let metric = self.title.resize_metric;
        *self = Self::default();
        self.set_resize_metric(metric);
    }

    pub fn selected(&self) -> Option<LayerId> {
        self.selected
    }

    /// Select `id`, deselecting whatever was selected before.
    pub fn select(&mut self, id: LayerId) {
        if self.selected != Some(id) {
            self.end_all();
        }
        self.selected = Some(id);
    }

    pub fn deselect(&mut self) {
        self.end_all();
        self.selected = None;
    }

    /// Selected, dragging or resizing.
    pub fn is_active(&self, id: LayerId) -> bool {
        self.selected == Some(id) || self.gesture_mode(id).is_some()
    }

    pub fn gesture_mode(&self, id: LayerId) -> Option<GestureMode> {
        match id {
            LayerId::Title => self.title.mode(),
            LayerId::Price => self.price.mode(),
            LayerId::Discount => self.discount.mode(),
            LayerId::Watermark => self.watermark.mode(),
        }
    }

    fn end_all(&mut self) {
        self.title.on_gesture_end();
        self.price.on_gesture_end();
        self.discount.on_gesture_end();
        self.watermark.on_gesture_end();
    }

    /// Feed one event. Returns true when a transform changed.
    pub fn handle(&mut self, event: PointerEvent, container: &ClientRect) -> bool {
        match event {
            PointerEvent::Down { pos, target: Some((id, mode)) } => {
                self.select(id);
                match id {
                    LayerId::Title => self.title.on_gesture_start(pos, mode),
                    LayerId::Price => self.price.on_gesture_start(pos, mode),
                    LayerId::Discount => self.discount.on_gesture_start(pos, mode),
                    LayerId::Watermark => self.watermark.on_gesture_start(pos, mode),
                }
                false
            }
            PointerEvent::Down { target: None, .. } => {
                self.deselect();
                false
            }
            PointerEvent::Move { pos } => {
                let Some(id) = self.selected else { return false };
                match id {
                    LayerId::Title => self.title.on_gesture_move(pos, container).is_some(),
                    LayerId::Price => self.price.on_gesture_move(pos, container).is_some(),
                    LayerId::Discount => self.discount.on_gesture_move(pos, container).is_some(),
                    LayerId::Watermark => self.watermark.on_gesture_move(pos, container).is_some(),
                }
            }
            PointerEvent::Up => {
                self.end_all();
                false
            }
        }
    }

    /// Drain `source`, returning how many events changed a transform.
    pub fn pump<S: PointerSource>(&mut self, source: &mut S, container: &ClientRect) -> usize {
        let mut changed = 0;
        while let Some(ev) = source.next_event() {
            if self.handle(ev, container) {
                changed += 1;
            }
        }
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn container() -> ClientRect {
        ClientRect::new(0.0, 0.0, 400.0, 200.0)
    }

    #[test]
    fn deserialized_transforms_are_clamped() {
        let t: TextTransform =
            serde_json::from_str(r#"{"x": 400.0, "y": -90.0, "scale": 12.0, "rotation": 30.0}"#).unwrap();
        assert_eq!(t, TextTransform { x: 150.0, y: -50.0, scale: 5.0, rotation: 30.0 });
        let t: TextTransform =
            serde_json::from_str(r#"{"x": 20.0, "y": 80.0, "scale": 0.0, "rotation": 0.0}"#).unwrap();
        assert_eq!(t.scale, 0.2);

        let w: WatermarkPosition = serde_json::from_str(r#"{"x": -5.0, "y": 120.0}"#).unwrap();
        assert_eq!(w, WatermarkPosition { x: 0.0, y: 100.0 });

        let kept = TextTransform::at(12.0, 34.0).with_rotation(-15.0);
        let json = serde_json::to_string(&kept).unwrap();
        assert_eq!(serde_json::from_str::<TextTransform>(&json).unwrap(), kept);
    }

    #[test]
    fn drag_uses_start_snapshot() {
        let mut c = LayerTransformController::new(TextTransform::at(50.0, 50.0));
        c.on_gesture_start(ClientPx::new(100.0, 100.0), GestureMode::Drag);
        c.on_gesture_move(ClientPx::new(110.0, 100.0), &container());
        c.on_gesture_move(ClientPx::new(140.0, 120.0), &container());
        let t = c.transform();
        assert!((t.x - 60.0).abs() < 1e-4);
        assert!((t.y - 60.0).abs() < 1e-4);
        c.on_gesture_end();
        assert!(c.on_gesture_move(ClientPx::new(0.0, 0.0), &container()).is_none());
    }

    #[test]
    fn drag_clamps_text_range() {
        let mut c = LayerTransformController::new(TextTransform::default());
        c.on_gesture_start(ClientPx::new(0.0, 0.0), GestureMode::Drag);
        let t = c.on_gesture_move(ClientPx::new(10_000.0, -10_000.0), &container()).unwrap();
        assert_eq!((t.x, t.y), (150.0, -50.0));
    }

    #[test]
    fn resize_axis_sum_and_clamp() {
        let mut c = LayerTransformController::new(TextTransform::default());
        c.on_gesture_start(ClientPx::new(0.0, 0.0), GestureMode::Resize);
        let t = c.on_gesture_move(ClientPx::new(150.0, 150.0), &container()).unwrap();
        assert!((t.scale - 2.0).abs() < 1e-5);
        let t = c.on_gesture_move(ClientPx::new(-5000.0, 0.0), &container()).unwrap();
        assert_eq!(t.scale, 0.2);
        let t = c.on_gesture_move(ClientPx::new(5000.0, 5000.0), &container()).unwrap();
        assert_eq!(t.scale, 5.0);
    }

    #[test]
    fn resize_anchor_distance_is_ratio() {
        let mut c = LayerTransformController::new(TextTransform::at(50.0, 50.0))
            .with_resize_metric(ResizeMetric::AnchorDistance);
        // anchor at (200, 100)
        c.on_gesture_start(ClientPx::new(250.0, 100.0), GestureMode::Resize);
        let t = c.on_gesture_move(ClientPx::new(300.0, 100.0), &container()).unwrap();
        assert!((t.scale - 2.0).abs() < 1e-5);
    }

    #[test]
    fn watermark_clamps_and_cannot_resize() {
        let mut c = LayerTransformController::new(WatermarkPosition::default());
        c.on_gesture_start(ClientPx::new(0.0, 0.0), GestureMode::Resize);
        assert!(c.is_dragging());
        let p = c.on_gesture_move(ClientPx::new(-1000.0, 1000.0), &container()).unwrap();
        assert_eq!(p, WatermarkPosition { x: 0.0, y: 100.0 });
    }

    #[test]
    fn selection_is_exclusive() {
        let mut set = LayerSet::default();
        set.handle(
            PointerEvent::Down { pos: ClientPx::new(0.0, 0.0), target: Some((LayerId::Title, GestureMode::Drag)) },
            &container(),
        );
        assert!(set.is_active(LayerId::Title));
        set.handle(PointerEvent::Up, &container());
        set.select(LayerId::Price);
        assert!(!set.is_active(LayerId::Title));
        assert!(set.is_active(LayerId::Price));
        set.handle(PointerEvent::Down { pos: ClientPx::new(5.0, 5.0), target: None }, &container());
        assert_eq!(set.selected(), None);
    }

    #[test]
    fn scripted_pointer_source_drives_drag() {
        let mut set = LayerSet::default();
        let mut events: VecDeque<PointerEvent> = VecDeque::from(vec![
            PointerEvent::Down { pos: ClientPx::new(200.0, 60.0), target: Some((LayerId::Title, GestureMode::Drag)) },
            PointerEvent::Move { pos: ClientPx::new(220.0, 60.0) },
            PointerEvent::Move { pos: ClientPx::new(240.0, 80.0) },
            PointerEvent::Up,
            PointerEvent::Move { pos: ClientPx::new(400.0, 200.0) },
        ]);
        let changed = set.pump(&mut events, &container());
        assert_eq!(changed, 2);
        let t = set.text_transforms().title;
        assert!((t.x - 60.0).abs() < 1e-4 && (t.y - 40.0).abs() < 1e-4);
        assert!(events.is_empty());
    }

    #[test]
    fn preset_moves_rows_only() {
        let mut set = LayerSet::default();
        set.title.set_transform(TextTransform { x: 20.0, y: 30.0, scale: 2.0, rotation: 15.0 });
        set.apply_preset(LayoutPreset::Bottom);
        let t = set.text_transforms();
        assert_eq!((t.title.x, t.title.y, t.title.scale, t.title.rotation), (20.0, 70.0, 2.0, 15.0));
        assert_eq!(t.price.y, 80.0);
        assert_eq!(t.discount.y, 90.0);
        set.reset();
        assert_eq!(set.text_transforms(), TextTransforms::default());
    }
}
