// ============================================================================
// EDITING SESSION: one source image and everything edited on top of it
// ============================================================================
//
// Owns the source bitmap, the adjustment history, the mask, the overlay
// layers and the text campaign. Generated results re-enter through
// `replace_source`, which starts a fresh history and clears the mask.
// ============================================================================

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use image::RgbaImage;

use crate::compositor::{CompositeRenderer, PreviewDescription, TextLayers, Watermark};
use crate::components::history::EditHistory;
use crate::components::layers::LayerSet;
use crate::components::mask::MaskPainter;
use crate::edit_state::EditState;
use crate::error::{EngineError, GenerationError, Result, ValidationError};
use crate::generation::{
    prepare_dispatch, retry_with_backoff, GenerationRequest, GenerationService, RetryPolicy, Sleeper, ToolMode,
};
use crate::settings::EngineSettings;
use crate::store::{BestEffortStore, GeneratedItem, HistoryStore, MediaType};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ProcessingStatus {
    #[default]
    Idle,
    Processing,
    Success,
    Error,
}

/// Shared "a generation is in flight" flag.
#[derive(Clone, Debug, Default)]
pub struct ProcessingFlag(Arc<AtomicBool>);

impl ProcessingFlag {
    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    /// Set the flag, or fail if it is already set. The flag clears when the
    /// guard drops, whichever way the work ends.
    pub fn try_acquire(&self) -> std::result::Result<ProcessingGuard, ValidationError> {
        self.0
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| ProcessingGuard(Arc::clone(&self.0)))
            .map_err(|_| ValidationError::AlreadyProcessing)
    }
}

#[derive(Debug)]
pub struct ProcessingGuard(Arc<AtomicBool>);

impl Drop for ProcessingGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Dispatch parameters taken from settings.
#[derive(Clone, Copy, Debug, PartialEq)]
struct DispatchConfig {
    max_dimension: u32,
    quality: u8,
    retry: RetryPolicy,
}

pub struct EditingSession {
    source: RgbaImage,
    history: EditHistory,
    max_undo_steps: usize,
    working: EditState,
    mask: MaskPainter,
    pub layers: LayerSet,
    text: Option<TextLayers>,
    watermark: Watermark,
    show_watermark: bool,
    renderer: CompositeRenderer,
    status: ProcessingStatus,
    error_message: Option<String>,
    processing: ProcessingFlag,
    local_items: Vec<GeneratedItem>,
    dispatch: DispatchConfig,
}

impl std::fmt::Debug for EditingSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EditingSession")
            .field("source", &self.source.dimensions())
            .field("working", &self.working)
            .field("status", &self.status)
            .finish_non_exhaustive()
    }
}

impl EditingSession {
    pub fn new(source: RgbaImage, renderer: CompositeRenderer, settings: &EngineSettings) -> Result<Self> {
        let (w, h) = source.dimensions();
        if w == 0 || h == 0 {
            return Err(EngineError::Surface { width: w, height: h });
        }
        let mut layers = LayerSet::default();
        layers.set_resize_metric(settings.resize_metric);
        log::info!("session opened on {}x{} source", w, h);
        Ok(Self {
            source,
            history: EditHistory::new(settings.max_undo_steps),
            max_undo_steps: settings.max_undo_steps,
            working: EditState::default(),
            mask: MaskPainter::new(w, h).with_brush(settings.brush_size, settings.brush_color),
            layers,
            text: None,
            watermark: Watermark { text: settings.watermark_text.clone(), ..Watermark::default() },
            show_watermark: settings.show_watermark,
            renderer,
            status: ProcessingStatus::Idle,
            error_message: None,
            processing: ProcessingFlag::default(),
            local_items: Vec::new(),
            dispatch: DispatchConfig {
                max_dimension: settings.dispatch_max_dimension,
                quality: settings.dispatch_quality,
                retry: settings.retry_policy(),
            },
        })
    }

    pub fn source(&self) -> &RgbaImage {
        &self.source
    }

    pub fn renderer(&self) -> &CompositeRenderer {
        &self.renderer
    }

    pub fn history(&self) -> &EditHistory {
        &self.history
    }

    /// The state shown in the preview; may be ahead of the history.
    pub fn state(&self) -> EditState {
        self.working
    }

    pub fn status(&self) -> ProcessingStatus {
        self.status
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    pub fn processing_flag(&self) -> ProcessingFlag {
        self.processing.clone()
    }

    // -- adjustments ------------------------------------------------------

    /// Live slider movement: updates the preview without a history entry.
    pub fn set_preview(&mut self, state: EditState) {
        self.working = state;
    }

    /// Record the previewed state as an undo step.
    pub fn commit_preview(&mut self) {
        if self.working != self.history.current() {
            self.history.commit(self.working);
        }
    }

    /// `set_preview` followed by `commit_preview`.
    pub fn apply(&mut self, state: EditState) {
        self.set_preview(state);
        self.commit_preview();
    }

    pub fn undo(&mut self) -> bool {
        let moved = self.history.undo();
        self.working = self.history.current();
        moved
    }

    pub fn redo(&mut self) -> bool {
        let moved = self.history.redo();
        self.working = self.history.current();
        moved
    }

    /// Back to neutral as a new undo step. The mask is cleared separately.
    pub fn reset(&mut self) {
        self.working = EditState::default();
        self.history.commit(self.working);
        self.mask.clear();
    }

    // -- mask -------------------------------------------------------------

    pub fn mask(&self) -> &MaskPainter {
        &self.mask
    }

    pub fn mask_mut(&mut self) -> &mut MaskPainter {
        &mut self.mask
    }

    // -- overlays ---------------------------------------------------------

    /// Text layers with the current on-canvas placements.
    pub fn text(&self) -> Option<TextLayers> {
        self.text.clone().map(|t| t.with_transforms(self.layers.text_transforms()))
    }

    pub fn set_text(&mut self, text: Option<TextLayers>) {
        if let Some(t) = &text {
            self.layers.set_text_transforms(t.transforms);
        }
        self.text = text;
    }

    pub fn watermark(&self) -> Option<Watermark> {
        self.show_watermark.then(|| Watermark {
            text: self.watermark.text.clone(),
            position: self.layers.watermark_position(),
        })
    }

    pub fn set_show_watermark(&mut self, show: bool) {
        self.show_watermark = show;
    }

    pub fn set_watermark_text(&mut self, text: impl Into<String>) {
        self.watermark.text = text.into();
    }

    // -- rendering --------------------------------------------------------

    pub fn preview(&self, show_original: bool) -> PreviewDescription {
        let (w, h) = self.source.dimensions();
        let text = self.text();
        self.renderer
            .preview(&self.working, w, h, show_original, &self.layers, text.as_ref(), self.show_watermark)
    }

    pub fn render_exact(&self) -> Result<RgbaImage> {
        self.renderer.render_exact(&self.source, &self.working).inspect_err(|e| {
            log::warn!("exact render failed: {}", e);
        })
    }

    pub fn render_design(&self) -> Result<RgbaImage> {
        let exact = self.render_exact()?;
        let text = self.text();
        let watermark = self.watermark();
        self.renderer.render_design(&exact, text.as_ref(), watermark.as_ref())
    }

    /// Swap in a new source bitmap. History starts over and the mask is
    /// resized and emptied.
    pub fn replace_source(&mut self, source: RgbaImage) -> Result<()> {
        let (w, h) = source.dimensions();
        if w == 0 || h == 0 {
            return Err(EngineError::Surface { width: w, height: h });
        }
        self.source = source;
        self.history = EditHistory::new(self.max_undo_steps);
        self.working = EditState::default();
        self.mask.reset_to(w, h);
        log::info!("source replaced ({}x{}); history reset", w, h);
        Ok(())
    }

    // -- generation -------------------------------------------------------

    /// Regenerate the painted area according to `instruction`.
    pub async fn magic_brush<G, S>(&mut self, service: &G, sleeper: &S, instruction: &str) -> Result<()>
    where
        G: GenerationService,
        S: Sleeper,
    {
        if !self.mask.has_content() {
            return Err(ValidationError::EmptyMask.into());
        }
        if instruction.trim().is_empty() {
            return Err(ValidationError::EmptyInstruction.into());
        }
        self.generate(service, sleeper, ToolMode::MagicBrush, instruction).await
    }

    /// Send the exact render (plus the mask for masking tools) to `service`
    /// and replace the source with the result.
    pub async fn generate<G, S>(&mut self, service: &G, sleeper: &S, tool: ToolMode, instruction: &str) -> Result<()>
    where
        G: GenerationService,
        S: Sleeper,
    {
        let _guard = self.processing.try_acquire()?;

        // Local preparation: failures here leave the session untouched.
        let exact = self.render_exact()?;
        let mask = if tool.uses_mask() {
            let binary = self.mask.to_binary_mask()?;
            Some(self.renderer.render_mask_geometry(&binary, &self.working)?)
        } else {
            None
        };
        let prepared = prepare_dispatch(&exact, mask.as_ref(), self.dispatch.max_dimension, self.dispatch.quality)?;
        let mut request = GenerationRequest::new(prepared.image, tool, instruction.trim());
        request.mask = prepared.mask;

        self.status = ProcessingStatus::Processing;
        self.error_message = None;
        log::info!("dispatching {:?} at {}x{}", tool, prepared.width, prepared.height);

        let outcome = async {
            let response = retry_with_backoff(&self.dispatch.retry, sleeper, || service.generate(&request)).await?;
            let resolved = response.resolve()?;
            let bitmap = resolved.image.decode()?;
            Ok::<_, GenerationError>((resolved.image, bitmap))
        }
        .await;

        match outcome {
            Ok((encoded, bitmap)) => {
                self.replace_source(bitmap)?;
                self.local_items.push(GeneratedItem::new(
                    encoded.to_data_url(),
                    MediaType::Image,
                    tool,
                    instruction.trim(),
                ));
                self.status = ProcessingStatus::Success;
                Ok(())
            }
            Err(e) => {
                log::error!("{:?} failed: {}", tool, e);
                self.status = ProcessingStatus::Error;
                self.error_message = Some(e.user_message().to_string());
                Err(e.into())
            }
        }
    }

    // -- gallery ----------------------------------------------------------

    /// Items produced in this session, oldest first.
    pub fn local_items(&self) -> &[GeneratedItem] {
        &self.local_items
    }

    /// Keep `item` locally and persist it unless it is inline.
    pub async fn record_item<S: HistoryStore>(&mut self, store: &BestEffortStore<S>, user: &str, item: GeneratedItem) {
        store.insert(user, &item).await;
        self.local_items.push(item);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coords::CanvasPx;
    use crate::generation::{EncodedImage, GenerationResponse, RemoteError};
    use crate::io::ExportFormat;
    use crate::testing::{gradient, BlockGlyphs};
    use image::Rgba;
    use std::cell::RefCell;
    use std::time::Duration;

    struct NoSleep;
    impl Sleeper for NoSleep {
        async fn sleep(&self, _: Duration) {}
    }

    /// Returns a solid image of the requested size; records requests.
    struct EchoService {
        seen: RefCell<Vec<GenerationRequest>>,
        fail: Option<RemoteError>,
    }

    impl EchoService {
        fn ok() -> Self {
            Self { seen: RefCell::new(Vec::new()), fail: None }
        }
    }

    impl GenerationService for EchoService {
        async fn generate(&self, req: &GenerationRequest) -> std::result::Result<GenerationResponse, RemoteError> {
            self.seen.borrow_mut().push(req.clone());
            if let Some(e) = &self.fail {
                return Err(e.clone());
            }
            let src = req.source.decode().map_err(|e| RemoteError::new(Some(400), e.to_string()))?;
            let out = RgbaImage::from_pixel(src.width(), src.height(), Rgba([0, 200, 0, 255]));
            let enc = EncodedImage::encode(&out, ExportFormat::Png, 100).map_err(|e| RemoteError::new(None, e.to_string()))?;
            Ok(GenerationResponse::Bitmap(enc))
        }
    }

    fn session(w: u32, h: u32) -> EditingSession {
        EditingSession::new(gradient(w, h), CompositeRenderer::new(BlockGlyphs), &EngineSettings::default()).unwrap()
    }

    #[test]
    fn preview_does_not_touch_history_until_commit() {
        let mut s = session(10, 10);
        s.set_preview(EditState::default().with_brightness(130.0));
        assert_eq!(s.history().len(), 1);
        s.commit_preview();
        assert_eq!(s.history().len(), 2);
        // committing the same state twice adds nothing
        s.commit_preview();
        assert_eq!(s.history().len(), 2);
        assert!(s.undo());
        assert_eq!(s.state(), EditState::default());
        assert!(s.redo());
        assert_eq!(s.state().brightness, 130.0);
    }

    #[test]
    fn reset_is_undoable_and_clears_mask() {
        let mut s = session(20, 20);
        s.apply(EditState::default().with_contrast(120.0));
        s.mask_mut().begin_stroke(CanvasPx::new(5.0, 5.0));
        s.reset();
        assert!(!s.mask().has_content());
        assert!(s.state().is_neutral());
        assert!(s.undo());
        assert_eq!(s.state().contrast, 120.0);
    }

    #[test]
    fn magic_brush_validates_before_dispatch() {
        let mut s = session(20, 20);
        let svc = EchoService::ok();
        let err = pollster::block_on(s.magic_brush(&svc, &NoSleep, "add a hat")).unwrap_err();
        assert!(matches!(err, EngineError::Validation(ValidationError::EmptyMask)));
        s.mask_mut().begin_stroke(CanvasPx::new(5.0, 5.0));
        let err = pollster::block_on(s.magic_brush(&svc, &NoSleep, "   ")).unwrap_err();
        assert!(matches!(err, EngineError::Validation(ValidationError::EmptyInstruction)));
        assert!(svc.seen.borrow().is_empty());
        assert_eq!(s.status(), ProcessingStatus::Idle);
    }

    #[test]
    fn magic_brush_sends_aligned_mask_and_replaces_source() {
        let mut s = session(40, 20);
        s.apply(EditState::default().with_rotation(90));
        s.mask_mut().set_brush_size(6.0);
        s.mask_mut().begin_stroke(CanvasPx::new(2.0, 2.0));
        s.mask_mut().end_stroke();
        let svc = EchoService::ok();
        pollster::block_on(s.magic_brush(&svc, &NoSleep, "make it green")).unwrap();

        let seen = svc.seen.borrow();
        let req = &seen[0];
        let src = req.source.decode().unwrap();
        let mask = req.mask.as_ref().unwrap().decode().unwrap();
        assert_eq!(src.dimensions(), (20, 40));
        assert_eq!(mask.dimensions(), src.dimensions());
        // top-left stroke lands top-right after a clockwise quarter turn
        assert_eq!(mask.get_pixel(17, 2).0, [255, 255, 255, 255]);
        assert_eq!(mask.get_pixel(2, 2).0, [0, 0, 0, 255]);

        assert_eq!(s.status(), ProcessingStatus::Success);
        assert_eq!(s.source().dimensions(), (20, 40));
        assert_eq!(s.source().get_pixel(0, 0).0, [0, 200, 0, 255]);
        assert_eq!(s.history().len(), 1);
        assert!(!s.mask().has_content());
        assert_eq!(s.mask().dimensions(), (20, 40));
        assert_eq!(s.local_items().len(), 1);
        assert!(s.local_items()[0].is_inline());
        assert!(!s.processing_flag().is_set());
    }

    #[test]
    fn remote_failure_keeps_last_good_image() {
        let mut s = session(16, 16);
        let before = s.source().clone();
        s.mask_mut().begin_stroke(CanvasPx::new(8.0, 8.0));
        let svc = EchoService { seen: RefCell::new(Vec::new()), fail: Some(RemoteError::new(Some(401), "unauthorized")) };
        let err = pollster::block_on(s.magic_brush(&svc, &NoSleep, "x")).unwrap_err();
        assert!(matches!(err, EngineError::Generation(GenerationError::ActivationRequired(_))));
        assert_eq!(s.status(), ProcessingStatus::Error);
        assert_eq!(s.error_message(), Some("Activation required"));
        assert_eq!(s.source(), &before);
        assert!(s.mask().has_content());
        assert!(!s.processing_flag().is_set());
    }

    #[test]
    fn second_submission_is_rejected_while_flag_is_held() {
        let mut s = session(16, 16);
        let flag = s.processing_flag();
        let guard = flag.try_acquire().unwrap();
        let svc = EchoService::ok();
        let err = pollster::block_on(s.generate(&svc, &NoSleep, ToolMode::Upscale, "")).unwrap_err();
        assert!(matches!(err, EngineError::Validation(ValidationError::AlreadyProcessing)));
        drop(guard);
        assert!(!flag.is_set());
        pollster::block_on(s.generate(&svc, &NoSleep, ToolMode::Upscale, "")).unwrap();
        assert!(svc.seen.borrow()[0].mask.is_none());
    }

    #[test]
    fn text_follows_layer_placement() {
        let mut s = session(10, 10);
        s.set_text(Some(TextLayers::new("T", "P")));
        s.layers.title.set_transform(crate::components::layers::TextTransform::at(10.0, 20.0));
        let t = s.text().unwrap();
        assert_eq!((t.transforms.title.x, t.transforms.title.y), (10.0, 20.0));
        s.set_show_watermark(false);
        assert!(s.watermark().is_none());
    }
}
