// ============================================================================
// GENERATION BOUNDARY: remote edit service, retry policy, payload shapes
// ============================================================================
//
// The remote model is reached only through `GenerationService`. Everything
// that crosses the boundary is an `EncodedImage` (bytes + mime) or a raw JSON
// value; responses are resolved into one bitmap exactly once, here.
// ============================================================================

use std::collections::BTreeMap;
use std::future::Future;
use std::time::Duration;

use image::{imageops, RgbaImage};
use serde::{Deserialize, Serialize};

use crate::compositor::binarize;
use crate::error::{GenerationError, Result, ValidationError};
use crate::io::{self, ExportFormat};

pub const DISPATCH_MAX_DIMENSION: u32 = 1024;
pub const DISPATCH_JPEG_QUALITY: u8 = 82;
/// Ceiling for a single backoff wait.
pub const MAX_RETRY_DELAY: Duration = Duration::from_secs(60);

/// Which tool issued a request. Serialized with the service's names.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ToolMode {
    BackgroundRemove,
    BackgroundBlend,
    Upscale,
    LightingFix,
    BackgroundBlur,
    Recolor,
    Retouch,
    MagicBrush,
    AiSmartIdeas,
    SocialPost,
    GenerateAngles,
    CampaignShot,
    ArtisticStyle,
    MoodBoard,
    MoodCreator,
    AiEmotionPainter,
    TemplateBuilder,
    HeroProduct,
    ProductCollage,
    MockupGenerator,
    ReelsGenerator,
    ReelsCoverCreator,
    AiEditor,
}

impl ToolMode {
    /// Tools that send a painted selection along with the image.
    pub fn uses_mask(self) -> bool {
        matches!(self, ToolMode::MagicBrush)
    }
}

// ---------------------------------------------------------------------------
//  Payloads
// ---------------------------------------------------------------------------

/// Encoded image bytes with their mime type.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EncodedImage {
    pub mime: String,
    pub bytes: Vec<u8>,
}

impl EncodedImage {
    pub fn encode(image: &RgbaImage, format: ExportFormat, quality: u8) -> Result<Self> {
        Ok(Self { mime: format.mime().to_string(), bytes: io::encode_image(image, format, quality)? })
    }

    /// Parse a data URL or bare base64 string. Bare payloads are assumed PNG.
    pub fn from_data_url(s: &str) -> Option<Self> {
        let (mime, bytes) = io::decode_data_url(s)?;
        Some(Self { mime: mime.unwrap_or_else(|| "image/png".to_string()), bytes })
    }

    pub fn to_data_url(&self) -> String {
        io::to_data_url(&self.bytes, &self.mime)
    }

    pub fn decode(&self) -> std::result::Result<RgbaImage, GenerationError> {
        io::decode_image(&self.bytes).map_err(|e| GenerationError::Decode(e.to_string()))
    }
}

/// Everything the remote service needs for one edit.
#[derive(Clone, Debug)]
pub struct GenerationRequest {
    pub source: EncodedImage,
    /// Binary PNG with the same dimensions as `source`.
    pub mask: Option<EncodedImage>,
    pub instruction: String,
    pub tool: ToolMode,
    pub settings: BTreeMap<String, String>,
    pub extra_images: Vec<EncodedImage>,
}

impl GenerationRequest {
    pub fn new(source: EncodedImage, tool: ToolMode, instruction: impl Into<String>) -> Self {
        Self {
            source,
            mask: None,
            instruction: instruction.into(),
            tool,
            settings: BTreeMap::new(),
            extra_images: Vec::new(),
        }
    }

    pub fn with_mask(mut self, mask: EncodedImage) -> Self {
        self.mask = Some(mask);
        self
    }

    pub fn with_setting(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.settings.insert(key.into(), value.into());
        self
    }
}

/// Raw service response before resolution.
#[derive(Clone, Debug, PartialEq)]
pub enum GenerationResponse {
    Bitmap(EncodedImage),
    Structured(serde_json::Value),
}

/// A response reduced to one bitmap plus any accompanying copy.
#[derive(Clone, Debug, PartialEq)]
pub struct ResolvedOutput {
    pub image: EncodedImage,
    /// Remaining fields of a structured response (e.g. a generated post).
    pub side: Option<serde_json::Value>,
}

/// Fields checked, in order, for the image of a structured response.
const IMAGE_FIELDS: [&str; 4] = ["enhancedImage", "enhancedDataUrl", "image", "url"];

impl GenerationResponse {
    /// `{`-prefixed text is JSON, `data:` text is a bitmap.
    pub fn from_text(text: &str) -> std::result::Result<Self, GenerationError> {
        let t = text.trim();
        if t.starts_with('{') {
            return serde_json::from_str(t)
                .map(GenerationResponse::Structured)
                .map_err(|e| GenerationError::UnwrappablePayload(format!("invalid JSON: {}", e)));
        }
        if io::is_data_url(t) {
            return EncodedImage::from_data_url(t)
                .map(GenerationResponse::Bitmap)
                .ok_or_else(|| GenerationError::UnwrappablePayload("malformed data URL".to_string()));
        }
        Err(GenerationError::UnwrappablePayload("response is neither JSON nor a data URL".to_string()))
    }

    pub fn resolve(self) -> std::result::Result<ResolvedOutput, GenerationError> {
        match self {
            GenerationResponse::Bitmap(image) => Ok(ResolvedOutput { image, side: None }),
            GenerationResponse::Structured(value) => {
                let serde_json::Value::Object(mut map) = value else {
                    return Err(GenerationError::UnwrappablePayload("expected a JSON object".to_string()));
                };
                let found = IMAGE_FIELDS.iter().find_map(|&key| {
                    let s = map.get(key)?.as_str()?;
                    EncodedImage::from_data_url(s).map(|img| (key, img))
                });
                let Some((key, image)) = found else {
                    let keys: Vec<&str> = map.keys().map(String::as_str).collect();
                    return Err(GenerationError::UnwrappablePayload(format!(
                        "no image field among [{}]",
                        keys.join(", ")
                    )));
                };
                map.remove(key);
                let side = (!map.is_empty()).then_some(serde_json::Value::Object(map));
                Ok(ResolvedOutput { image, side })
            }
        }
    }
}

// ---------------------------------------------------------------------------
//  Service seam
// ---------------------------------------------------------------------------

/// A failure as reported by the remote side, before classification.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RemoteError {
    pub status: Option<u16>,
    pub message: String,
}

impl RemoteError {
    pub fn new(status: Option<u16>, message: impl Into<String>) -> Self {
        Self { status, message: message.into() }
    }

    /// Overload conditions worth retrying.
    pub fn is_transient(&self) -> bool {
        matches!(self.status, Some(503) | Some(429))
            || self.message.contains("overloaded")
            || self.message.contains("503")
    }

    pub fn is_activation(&self) -> bool {
        const MARKERS: [&str; 4] = [
            "API key not valid",
            "permission denied",
            "API_KEY_REQUIRED",
            "Requested entity was not found",
        ];
        matches!(self.status, Some(401) | Some(403)) || MARKERS.iter().any(|m| self.message.contains(m))
    }

    /// Classification used once retries are done.
    pub fn classify(&self) -> GenerationError {
        if self.is_transient() {
            GenerationError::ServerOverloaded
        } else if self.is_activation() {
            GenerationError::ActivationRequired(self.message.clone())
        } else {
            GenerationError::Failed(self.message.clone())
        }
    }
}

impl std::fmt::Display for RemoteError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.status {
            Some(s) => write!(f, "{} ({})", self.message, s),
            None => f.write_str(&self.message),
        }
    }
}

/// The remote generative-image service.
#[allow(async_fn_in_trait)]
pub trait GenerationService {
    async fn generate(&self, request: &GenerationRequest) -> std::result::Result<GenerationResponse, RemoteError>;
}

/// Waits between retries. Tests substitute a recorder.
#[allow(async_fn_in_trait)]
pub trait Sleeper {
    async fn sleep(&self, duration: Duration);
}

/// Blocks the calling thread; fine under `pollster`.
#[derive(Clone, Copy, Debug, Default)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    async fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub retries: u32,
    pub initial_delay: Duration,
    pub backoff: f32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { retries: 3, initial_delay: Duration::from_millis(1000), backoff: 2.0 }
    }
}

/// Run `op`, retrying transient failures with exponential backoff. Non-transient
/// failures return immediately; exhausting the retries on a transient failure
/// yields `ServerOverloaded`.
pub async fn retry_with_backoff<T, F, Fut, S>(
    policy: &RetryPolicy,
    sleeper: &S,
    mut op: F,
) -> std::result::Result<T, GenerationError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::result::Result<T, RemoteError>>,
    S: Sleeper,
{
    let mut delay = policy.initial_delay;
    let mut retries_left = policy.retries;
    loop {
        match op().await {
            Ok(v) => return Ok(v),
            Err(e) if e.is_transient() && retries_left > 0 => {
                log::warn!("transient generation failure ({}); retrying in {:?}", e, delay);
                sleeper.sleep(delay).await;
                retries_left -= 1;
                delay = next_delay(delay, policy.backoff);
            }
            Err(e) => {
                let classified = e.classify();
                log::error!("generation failed: {} → {:?}", e, classified);
                return Err(classified);
            }
        }
    }
}

/// `delay * backoff`, capped at `MAX_RETRY_DELAY`. A NaN or sub-1 factor
/// keeps the delay flat.
fn next_delay(delay: Duration, backoff: f32) -> Duration {
    let factor = if backoff.is_nan() { 1.0 } else { f64::from(backoff.max(1.0)) };
    Duration::try_from_secs_f64(delay.as_secs_f64() * factor)
        .map_or(MAX_RETRY_DELAY, |d| d.min(MAX_RETRY_DELAY))
}

// ---------------------------------------------------------------------------
//  Dispatch preparation
// ---------------------------------------------------------------------------

/// Downscaled, encoded image (and mask) ready for a request.
#[derive(Clone, Debug)]
pub struct DispatchImages {
    pub image: EncodedImage,
    pub mask: Option<EncodedImage>,
    pub width: u32,
    pub height: u32,
}

/// Dimensions after `scale = min(max/w, max/h, 1)`, rounded, at least 1.
pub fn dispatch_dimensions(w: u32, h: u32, max_dimension: u32) -> (u32, u32) {
    if w == 0 || h == 0 {
        return (w, h);
    }
    let scale = (max_dimension as f32 / w as f32).min(max_dimension as f32 / h as f32).min(1.0);
    (
        ((w as f32 * scale).round() as u32).max(1),
        ((h as f32 * scale).round() as u32).max(1),
    )
}

/// Downscale `image` for upload as JPEG; the mask gets identical dimensions
/// with nearest sampling and stays two-tone (PNG).
pub fn prepare_dispatch(
    image: &RgbaImage,
    mask: Option<&RgbaImage>,
    max_dimension: u32,
    quality: u8,
) -> Result<DispatchImages> {
    let (w, h) = image.dimensions();
    if let Some(m) = mask
        && m.dimensions() != (w, h)
    {
        return Err(ValidationError::MaskSizeMismatch {
            mask_w: m.width(),
            mask_h: m.height(),
            image_w: w,
            image_h: h,
        }
        .into());
    }
    let (tw, th) = dispatch_dimensions(w, h, max_dimension);
    let scaled = if (tw, th) == (w, h) {
        image.clone()
    } else {
        imageops::resize(image, tw, th, imageops::FilterType::Triangle)
    };
    let mask = match mask {
        Some(m) => {
            let resized = if (tw, th) == (w, h) {
                m.clone()
            } else {
                imageops::resize(m, tw, th, imageops::FilterType::Nearest)
            };
            Some(EncodedImage::encode(&binarize(resized), ExportFormat::Png, 100)?)
        }
        None => None,
    };
    log::debug!("dispatch {}x{} → {}x{}", w, h, tw, th);
    Ok(DispatchImages {
        image: EncodedImage::encode(&scaled, ExportFormat::Jpeg, quality)?,
        mask,
        width: tw,
        height: th,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;
    use std::cell::RefCell;

    #[derive(Default)]
    struct RecordingSleeper {
        slept: RefCell<Vec<Duration>>,
    }

    impl Sleeper for RecordingSleeper {
        async fn sleep(&self, d: Duration) {
            self.slept.borrow_mut().push(d);
        }
    }

    type Outcome = (std::result::Result<u32, GenerationError>, usize, Vec<Duration>);

    fn run_script(script: Vec<std::result::Result<u32, RemoteError>>) -> Outcome {
        run_script_with(&RetryPolicy::default(), script)
    }

    fn run_script_with(policy: &RetryPolicy, script: Vec<std::result::Result<u32, RemoteError>>) -> Outcome {
        let sleeper = RecordingSleeper::default();
        let calls = RefCell::new(script.into_iter());
        let count = RefCell::new(0usize);
        let out = pollster::block_on(retry_with_backoff(policy, &sleeper, || {
            *count.borrow_mut() += 1;
            let next = calls.borrow_mut().next();
            async move { next.unwrap_or(Ok(0)) }
        }));
        (out, count.into_inner(), sleeper.slept.into_inner())
    }

    #[test]
    fn transient_failures_back_off_exponentially() {
        let busy = || Err(RemoteError::new(Some(503), "busy"));
        let (out, calls, slept) = run_script(vec![busy(), busy(), Ok(7)]);
        assert_eq!(out, Ok(7));
        assert_eq!(calls, 3);
        assert_eq!(slept, vec![Duration::from_millis(1000), Duration::from_millis(2000)]);
    }

    #[test]
    fn exhausted_retries_report_overload() {
        let busy = || Err(RemoteError::new(None, "model is overloaded"));
        let (out, calls, slept) = run_script(vec![busy(), busy(), busy(), busy(), busy()]);
        assert_eq!(out, Err(GenerationError::ServerOverloaded));
        assert_eq!(calls, 4);
        assert_eq!(slept.len(), 3);
        assert_eq!(slept[2], Duration::from_millis(4000));
    }

    #[test]
    fn runaway_backoff_is_capped_instead_of_overflowing() {
        let busy = || Err(RemoteError::new(Some(503), "busy"));
        for backoff in [f32::INFINITY, f32::MAX, f32::NAN] {
            let policy = RetryPolicy { backoff, ..RetryPolicy::default() };
            let (out, calls, slept) = run_script_with(&policy, vec![busy(), busy(), busy(), busy()]);
            assert_eq!(out, Err(GenerationError::ServerOverloaded));
            assert_eq!(calls, 4);
            assert_eq!(slept[0], Duration::from_millis(1000));
            assert!(slept.iter().all(|d| *d <= MAX_RETRY_DELAY));
        }

        let policy = RetryPolicy { initial_delay: Duration::from_secs(50), ..RetryPolicy::default() };
        let (_, _, slept) = run_script_with(&policy, vec![busy(), busy(), busy()]);
        assert_eq!(slept, vec![Duration::from_secs(50), MAX_RETRY_DELAY, MAX_RETRY_DELAY]);
    }

    #[test]
    fn non_transient_is_not_retried() {
        let (out, calls, slept) = run_script(vec![Err(RemoteError::new(Some(403), "nope"))]);
        assert!(matches!(out, Err(GenerationError::ActivationRequired(_))));
        assert_eq!(calls, 1);
        assert!(slept.is_empty());
        let (out, _, _) = run_script(vec![Err(RemoteError::new(Some(400), "bad prompt"))]);
        assert_eq!(out, Err(GenerationError::Failed("bad prompt".into())));
    }

    #[test]
    fn activation_markers_in_message() {
        assert!(RemoteError::new(None, "API key not valid. Please pass a valid key").is_activation());
        assert!(RemoteError::new(Some(404), "Requested entity was not found.").is_activation());
        assert!(!RemoteError::new(Some(500), "internal").is_activation());
    }

    #[test]
    fn structured_response_unwraps_first_image_field() {
        let url = io::to_data_url(b"png-bytes", "image/png");
        let json = format!(r#"{{"post": {{"caption": "hi"}}, "enhancedImage": "{}"}}"#, url);
        let out = GenerationResponse::from_text(&json).unwrap().resolve().unwrap();
        assert_eq!(out.image.bytes, b"png-bytes");
        assert_eq!(out.side.unwrap()["post"]["caption"], "hi");
    }

    #[test]
    fn structured_response_without_image_fails() {
        let resp = GenerationResponse::from_text(r#"{"text": "sorry"}"#).unwrap();
        assert!(matches!(resp.resolve(), Err(GenerationError::UnwrappablePayload(_))));
        assert!(GenerationResponse::from_text("hello").is_err());
        assert!(matches!(
            GenerationResponse::from_text("data:image/png;base64,aGk="),
            Ok(GenerationResponse::Bitmap(_))
        ));
    }

    #[test]
    fn dispatch_bounds() {
        assert_eq!(dispatch_dimensions(4000, 3000, 1024), (1024, 768));
        assert_eq!(dispatch_dimensions(600, 2048, 1024), (300, 1024));
        assert_eq!(dispatch_dimensions(800, 600, 1024), (800, 600));
    }

    #[test]
    fn dispatch_mask_matches_image_and_stays_binary() {
        let img = RgbaImage::from_pixel(2048, 1024, Rgba([90, 90, 90, 255]));
        let mask = RgbaImage::from_fn(2048, 1024, |x, _| {
            if x < 1024 { Rgba([255, 255, 255, 255]) } else { Rgba([0, 0, 0, 255]) }
        });
        let d = prepare_dispatch(&img, Some(&mask), 1024, 82).unwrap();
        assert_eq!((d.width, d.height), (1024, 512));
        assert_eq!(d.image.mime, "image/jpeg");
        let m = d.mask.unwrap().decode().unwrap();
        assert_eq!(m.dimensions(), (1024, 512));
        assert!(m.pixels().all(|p| p.0 == [0, 0, 0, 255] || p.0 == [255, 255, 255, 255]));
    }

    #[test]
    fn dispatch_rejects_mismatched_mask() {
        let img = RgbaImage::new(10, 10);
        let mask = RgbaImage::new(5, 5);
        assert!(prepare_dispatch(&img, Some(&mask), 1024, 82).is_err());
    }
}
