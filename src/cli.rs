// ============================================================================
// StudioPlay CLI: headless editing, design and export via subcommands
// ============================================================================
//
// Usage examples:
//   studioplay edit photo.jpg --brightness 120 --rotate 90 --aspect 1:1
//   studioplay design shot.png --title "Summer Sale" --price "$19" --discount "-30%" --style luxury-gold
//   studioplay collage -l mix-3 a.jpg b.jpg c.jpg --output-dir out/
//   studioplay smart "shots/*.jpg" --platform st --format jpeg --quality 85
//   studioplay mask photo.png --stroke "10,10;200,40;220,180" --brush-size 40
//
// Everything runs on the current thread. Flags override the saved settings
// for this invocation only.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;

use clap::{Args, Parser, Subcommand};
use image::RgbaImage;

use crate::collage::CollageLayout;
use crate::components::layers::{LayerSet, LayoutPreset, WatermarkPosition};
use crate::components::mask::MaskPainter;
use crate::compositor::{CompositeRenderer, TextLayers, TextStyle};
use crate::coords::CanvasPx;
use crate::edit_state::{AspectPreset, EditState};
use crate::error::Result;
use crate::export::{ExportPipeline, ExportTarget, ExportedFile, Platform};
use crate::io::{self, ExportFormat};
use crate::ops::text::{FontRasterizer, FontStyle, GlyphRun, TextMetrics, TextRasterizer};
use crate::session::EditingSession;
use crate::settings::EngineSettings;

// ============================================================================
// CLI argument definition (clap Derive)
// ============================================================================

/// StudioPlay headless image editor.
#[derive(Parser, Debug)]
#[command(
    name = "studioplay",
    version,
    about = "StudioPlay headless editing and export",
    long_about = "Apply non-destructive edits, burn in product text, build collages,\n\
                  render platform-sized assets and paint binary masks without a UI.\n\n\
                  Example:\n  \
                  studioplay edit photo.jpg --brightness 120 --aspect story\n  \
                  studioplay smart \"shots/*.jpg\" --platform sq --output-dir out/"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[command(flatten)]
    pub output: OutputArgs,
}

/// Flags shared by every subcommand.
#[derive(Args, Debug)]
pub struct OutputArgs {
    /// Directory the results are written to. Created if missing.
    #[arg(long, global = true, default_value = ".", value_name = "DIR")]
    pub output_dir: PathBuf,

    /// Output format: png, jpeg or webp. Defaults to the saved setting.
    #[arg(short, long, global = true, value_parser = parse_format, value_name = "FORMAT")]
    pub format: Option<ExportFormat>,

    /// JPEG and WebP quality (1-100). Defaults to the saved setting.
    #[arg(short, long, global = true, value_parser = clap::value_parser!(u8).range(1..=100), value_name = "1-100")]
    pub quality: Option<u8>,

    /// Font file used for text and watermarks.
    #[arg(long, global = true, value_name = "FILE")]
    pub font: Option<PathBuf>,

    /// System font family used when --font is not given.
    #[arg(long, global = true, value_name = "NAME")]
    pub font_family: Option<String>,

    /// Print per-file timing information.
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Apply adjustments and geometry, then save the exact bitmap.
    Edit {
        /// Input file(s). Glob patterns accepted.
        #[arg(required = true, num_args = 1..)]
        input: Vec<String>,

        #[command(flatten)]
        adjust: AdjustArgs,
    },

    /// Burn text layers and the watermark into the edited image.
    Design {
        #[arg(required = true, num_args = 1..)]
        input: Vec<String>,

        #[command(flatten)]
        adjust: AdjustArgs,

        #[command(flatten)]
        text: TextArgs,

        #[command(flatten)]
        watermark: WatermarkArgs,
    },

    /// Arrange several images into one square collage.
    Collage {
        /// grid-2x2, split-v, split-h or mix-3.
        #[arg(short, long, default_value = "grid-2x2", value_parser = parse_layout)]
        layout: CollageLayout,

        /// Side length in pixels. Defaults to the saved setting.
        #[arg(long)]
        size: Option<u32>,

        #[arg(required = true, num_args = 1..)]
        input: Vec<String>,
    },

    /// Platform-sized asset: blurred ambience behind the contained image.
    Smart {
        #[arg(required = true, num_args = 1..)]
        input: Vec<String>,

        /// sq, st, ls or pt (or the full name).
        #[arg(short, long, value_parser = parse_platform, conflicts_with = "size")]
        platform: Option<Platform>,

        /// Custom output size as WIDTHxHEIGHT.
        #[arg(long, value_parser = parse_size, value_name = "WxH")]
        size: Option<(u32, u32)>,

        #[command(flatten)]
        adjust: AdjustArgs,

        #[command(flatten)]
        text: TextArgs,

        /// Skip the corner watermark.
        #[arg(long)]
        no_watermark: bool,

        #[arg(long, value_name = "TEXT")]
        watermark_text: Option<String>,
    },

    /// Paint strokes and save the strict black/white selection mask.
    Mask {
        /// Image the mask is painted over.
        input: PathBuf,

        /// Stroke as "x,y;x,y;..." in image pixels. Repeatable.
        #[arg(long = "stroke", required = true, value_parser = parse_stroke, value_name = "POINTS")]
        strokes: Vec<StrokeArg>,

        #[arg(long)]
        brush_size: Option<f32>,

        #[command(flatten)]
        adjust: AdjustArgs,
    },
}

#[derive(Args, Debug, Clone, Default)]
pub struct AdjustArgs {
    /// Percent, 100 is neutral.
    #[arg(long)]
    pub brightness: Option<f32>,
    #[arg(long)]
    pub contrast: Option<f32>,
    #[arg(long)]
    pub saturation: Option<f32>,
    /// Sepia percent.
    #[arg(long)]
    pub warmth: Option<f32>,
    /// Quarter-turn rotation in degrees.
    #[arg(long, allow_hyphen_values = true, value_parser = parse_quarter_turn)]
    pub rotate: Option<i32>,
    /// Straighten angle in degrees.
    #[arg(long, allow_hyphen_values = true)]
    pub fine_rotate: Option<f32>,
    #[arg(long)]
    pub flip_x: bool,
    #[arg(long)]
    pub flip_y: bool,
    /// story, portrait, square, cover, free or W:H.
    #[arg(long, value_parser = parse_aspect)]
    pub aspect: Option<AspectArg>,
}

impl AdjustArgs {
    pub fn to_state(&self) -> EditState {
        let mut state = EditState::default();
        if let Some(v) = self.brightness {
            state = state.with_brightness(v);
        }
        if let Some(v) = self.contrast {
            state = state.with_contrast(v);
        }
        if let Some(v) = self.saturation {
            state = state.with_saturation(v);
        }
        if let Some(v) = self.warmth {
            state = state.with_warmth(v);
        }
        if let Some(v) = self.rotate {
            state = state.with_rotation(v);
        }
        if let Some(v) = self.fine_rotate {
            state = state.with_fine_rotation(v);
        }
        if let Some(AspectArg(ratio)) = self.aspect {
            state = state.with_aspect_ratio(ratio);
        }
        state.with_flip_x(self.flip_x).with_flip_y(self.flip_y)
    }
}

#[derive(Args, Debug, Clone, Default)]
pub struct TextArgs {
    #[arg(long)]
    pub title: Option<String>,
    #[arg(long)]
    pub price: Option<String>,
    #[arg(long, allow_hyphen_values = true)]
    pub discount: Option<String>,
    /// classic, modern or luxury-gold.
    #[arg(long, default_value = "classic")]
    pub style: String,
    /// top, center or bottom.
    #[arg(long, value_parser = parse_layout_preset)]
    pub layout: Option<LayoutPreset>,
}

impl TextArgs {
    /// `None` when neither title nor price was given.
    pub fn to_layers(&self) -> Option<TextLayers> {
        if self.title.is_none() && self.price.is_none() {
            return None;
        }
        let mut layers = TextLayers::new(self.title.clone().unwrap_or_default(), self.price.clone().unwrap_or_default())
            .with_style(TextStyle::parse(&self.style));
        if let Some(d) = &self.discount {
            layers = layers.with_discount(d.clone());
        }
        if let Some(preset) = self.layout {
            let mut set = LayerSet::default();
            set.apply_preset(preset);
            layers = layers.with_transforms(set.text_transforms());
        }
        Some(layers)
    }
}

#[derive(Args, Debug, Clone, Default)]
pub struct WatermarkArgs {
    #[arg(long)]
    pub no_watermark: bool,
    #[arg(long, value_name = "TEXT")]
    pub watermark_text: Option<String>,
    /// Anchor in percent as "x,y".
    #[arg(long, value_parser = parse_point, value_name = "X,Y")]
    pub watermark_pos: Option<(f32, f32)>,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AspectArg(pub Option<f32>);

#[derive(Clone, Debug, PartialEq)]
pub struct StrokeArg(pub Vec<CanvasPx>);

// ============================================================================
// Public entry point
// ============================================================================

/// Run one subcommand and return an OS exit code.
/// `0` = every file succeeded, `1` = one or more failed.
pub fn run(cli: Cli, settings: EngineSettings) -> ExitCode {
    let settings = cli.output.apply_to(settings);

    if let Err(e) = std::fs::create_dir_all(&cli.output.output_dir) {
        eprintln!(
            "error: could not create output directory '{}': {}",
            cli.output.output_dir.display(),
            e
        );
        return ExitCode::FAILURE;
    }

    let needs_text = match &cli.command {
        Command::Design { text, watermark, .. } => text.to_layers().is_some() || !watermark.no_watermark,
        Command::Smart { text, no_watermark, .. } => text.to_layers().is_some() || !no_watermark,
        _ => false,
    };
    let renderer = match build_renderer(&cli.output, &settings, needs_text) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("error: {}", e);
            return ExitCode::FAILURE;
        }
    };
    let pipeline = ExportPipeline::new(renderer.clone())
        .with_format(settings.export_format, settings.export_quality)
        .with_watermark_text(settings.watermark_text.clone());
    let out = &cli.output;

    match &cli.command {
        Command::Edit { input, adjust } => {
            let state = adjust.to_state();
            for_each_input(input, out, |path| {
                let mut session = EditingSession::new(io::load_image(path)?, renderer.clone(), &settings)?;
                session.apply(state);
                pipeline.download_clean(&session.render_exact()?)
            })
        }
        Command::Design { input, adjust, text, watermark } => {
            let state = adjust.to_state();
            let layers = text.to_layers();
            for_each_input(input, out, |path| {
                let mut session = EditingSession::new(io::load_image(path)?, renderer.clone(), &settings)?;
                if let Some((x, y)) = watermark.watermark_pos {
                    session.layers = LayerSet::new(session.layers.text_transforms(), WatermarkPosition::new(x, y));
                    session.layers.set_resize_metric(settings.resize_metric);
                }
                session.apply(state);
                session.set_text(layers.clone());
                session.set_show_watermark(!watermark.no_watermark);
                if let Some(t) = &watermark.watermark_text {
                    session.set_watermark_text(t.clone());
                }
                let text = session.text();
                let mark = session.watermark();
                pipeline.download_design(&session.render_exact()?, text.as_ref(), mark.as_ref())
            })
        }
        Command::Collage { layout, size, input } => {
            let inputs = resolve_inputs(input);
            if inputs.is_empty() {
                eprintln!("error: no input files matched the given pattern(s).");
                return ExitCode::FAILURE;
            }
            let start = Instant::now();
            let result = inputs
                .iter()
                .map(|p| io::load_image(p))
                .collect::<Result<Vec<RgbaImage>>>()
                .and_then(|images| {
                    pipeline.export_collage(*layout, &images, size.unwrap_or(settings.collage_size))
                })
                .and_then(|file| file.save_in(&out.output_dir));
            report(result, start, out.verbose)
        }
        Command::Smart { input, platform, size, adjust, text, no_watermark, watermark_text } => {
            let target = match (platform, size) {
                (_, Some((width, height))) => ExportTarget::Size { width: *width, height: *height },
                (Some(p), None) => ExportTarget::Platform(*p),
                (None, None) => ExportTarget::Platform(Platform::Square),
            };
            let state = adjust.to_state();
            let layers = text.to_layers();
            let pipeline = match watermark_text {
                Some(t) => pipeline.clone().with_watermark_text(t.clone()),
                None => pipeline.clone(),
            };
            for_each_input(input, out, |path| {
                let exact = renderer.render_exact(&io::load_image(path)?, &state)?;
                pipeline.smart_export(&exact, layers.as_ref(), target, !no_watermark)
            })
        }
        Command::Mask { input, strokes, brush_size, adjust } => {
            if settings.export_format != ExportFormat::Png && cli.output.format.is_some() {
                log::warn!("masks are always written as PNG; --format ignored");
            }
            let start = Instant::now();
            let result = paint_mask(input, strokes, brush_size.unwrap_or(settings.brush_size), &settings)
                .and_then(|mask| renderer.render_mask_geometry(&mask, &adjust.to_state()))
                .and_then(|mask| pipeline.export_mask(&mask))
                .and_then(|file| file.save_in(&out.output_dir));
            report(result, start, out.verbose)
        }
    }
}

impl OutputArgs {
    fn apply_to(&self, mut settings: EngineSettings) -> EngineSettings {
        if let Some(f) = self.format {
            settings.export_format = f;
        }
        if let Some(q) = self.quality {
            settings.export_quality = q;
        }
        if let Some(family) = &self.font_family {
            settings.font_family = family.clone();
        }
        settings
    }
}

// ============================================================================
// Per-command helpers
// ============================================================================

/// Rasterizer for commands that never draw text, so they run on hosts
/// without any fonts installed.
struct NoText;

impl TextRasterizer for NoText {
    fn measure(&self, _text: &str, _size: f32, _style: FontStyle) -> TextMetrics {
        TextMetrics::default()
    }

    fn rasterize(&self, _text: &str, _size: f32, _style: FontStyle) -> Option<GlyphRun> {
        None
    }
}

fn build_renderer(args: &OutputArgs, settings: &EngineSettings, needs_text: bool) -> Result<CompositeRenderer> {
    if let Some(path) = &args.font {
        return Ok(CompositeRenderer::new(FontRasterizer::from_file(path)?));
    }
    if !needs_text {
        return Ok(CompositeRenderer::new(NoText));
    }
    Ok(CompositeRenderer::new(FontRasterizer::system(&settings.font_family, 700)?))
}

fn paint_mask(input: &Path, strokes: &[StrokeArg], brush_size: f32, settings: &EngineSettings) -> Result<RgbaImage> {
    let (w, h) = io::load_image(input)?.dimensions();
    let mut painter = MaskPainter::new(w, h).with_brush(brush_size, settings.brush_color);
    for StrokeArg(points) in strokes {
        let Some((first, rest)) = points.split_first() else { continue };
        painter.begin_stroke(*first);
        for p in rest {
            painter.extend_stroke(*p);
        }
        painter.end_stroke();
    }
    painter.to_binary_mask()
}

/// Run `job` for every resolved input and save its export. Batch outputs are
/// prefixed with the input stem so same-millisecond names cannot collide.
fn for_each_input<F>(patterns: &[String], out: &OutputArgs, mut job: F) -> ExitCode
where
    F: FnMut(&Path) -> Result<ExportedFile>,
{
    let inputs = resolve_inputs(patterns);
    if inputs.is_empty() {
        eprintln!("error: no input files matched the given pattern(s).");
        return ExitCode::FAILURE;
    }

    let total = inputs.len();
    let multi = total > 1;
    let mut any_failure = false;

    for (idx, input_path) in inputs.iter().enumerate() {
        if multi || out.verbose {
            println!("[{}/{}] {}", idx + 1, total, input_path.display());
        }
        let file_start = Instant::now();

        let saved = job(input_path).and_then(|mut file| {
            if multi && let Some(stem) = input_path.file_stem() {
                file.file_name = format!("{}-{}", stem.to_string_lossy(), file.file_name);
            }
            file.save_in(&out.output_dir)
        });
        match saved {
            Ok(path) => {
                if out.verbose || multi {
                    println!("  → {} ({:.0}ms)", path.display(), file_start.elapsed().as_secs_f64() * 1000.0);
                }
            }
            Err(e) => {
                eprintln!("  error: {}", e);
                any_failure = true;
            }
        }
    }

    if any_failure { ExitCode::FAILURE } else { ExitCode::SUCCESS }
}

fn report(result: Result<PathBuf>, start: Instant, verbose: bool) -> ExitCode {
    match result {
        Ok(path) => {
            if verbose {
                println!("  → {} ({:.0}ms)", path.display(), start.elapsed().as_secs_f64() * 1000.0);
            } else {
                println!("{}", path.display());
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Expand glob patterns and literal paths into a deduplicated, ordered list.
fn resolve_inputs(patterns: &[String]) -> Vec<PathBuf> {
    let mut result: Vec<PathBuf> = Vec::new();

    for pattern in patterns {
        let as_path = Path::new(pattern);

        if as_path.exists() {
            if !result.iter().any(|p| p.as_path() == as_path) {
                result.push(as_path.to_path_buf());
            }
            continue;
        }

        match glob::glob(pattern) {
            Ok(entries) => {
                let mut matched = false;
                for entry in entries.flatten() {
                    if !result.contains(&entry) {
                        result.push(entry);
                    }
                    matched = true;
                }
                if !matched {
                    eprintln!("warning: pattern '{}' matched no files.", pattern);
                }
            }
            Err(e) => {
                eprintln!("warning: invalid glob '{}': {}", pattern, e);
            }
        }
    }

    result
}

fn parse_format(s: &str) -> std::result::Result<ExportFormat, String> {
    ExportFormat::parse(s).map_err(|e| e.to_string())
}

fn parse_layout(s: &str) -> std::result::Result<CollageLayout, String> {
    CollageLayout::parse(s).map_err(|e| e.to_string())
}

fn parse_platform(s: &str) -> std::result::Result<Platform, String> {
    Platform::parse(s).map_err(|e| e.to_string())
}

fn parse_layout_preset(s: &str) -> std::result::Result<LayoutPreset, String> {
    LayoutPreset::parse(s).ok_or_else(|| format!("unknown layout '{}' (top, center, bottom)", s))
}

fn parse_aspect(s: &str) -> std::result::Result<AspectArg, String> {
    AspectPreset::parse_ratio(s)
        .map(AspectArg)
        .ok_or_else(|| format!("invalid aspect '{}' (story, portrait, square, cover, free or W:H)", s))
}

fn parse_quarter_turn(s: &str) -> std::result::Result<i32, String> {
    let deg: i32 = s.trim().parse().map_err(|_| format!("invalid rotation '{}'", s))?;
    if deg.rem_euclid(90) != 0 {
        return Err(format!("rotation must be a multiple of 90, got {}", deg));
    }
    Ok(deg)
}

/// "WIDTHxHEIGHT", both positive.
fn parse_size(s: &str) -> std::result::Result<(u32, u32), String> {
    let (w, h) = s
        .trim()
        .to_ascii_lowercase()
        .split_once('x')
        .map(|(w, h)| (w.trim().parse::<u32>(), h.trim().parse::<u32>()))
        .ok_or_else(|| format!("size must look like 1080x1920, got '{}'", s))?;
    match (w, h) {
        (Ok(w), Ok(h)) if w > 0 && h > 0 => Ok((w, h)),
        _ => Err(format!("invalid size '{}'", s)),
    }
}

fn parse_point(s: &str) -> std::result::Result<(f32, f32), String> {
    let (x, y) = s.split_once(',').ok_or_else(|| format!("expected x,y, got '{}'", s))?;
    let x: f32 = x.trim().parse().map_err(|_| format!("invalid x in '{}'", s))?;
    let y: f32 = y.trim().parse().map_err(|_| format!("invalid y in '{}'", s))?;
    Ok((x, y))
}

fn parse_stroke(s: &str) -> std::result::Result<StrokeArg, String> {
    let points = s
        .split(';')
        .filter(|p| !p.trim().is_empty())
        .map(|p| parse_point(p).map(|(x, y)| CanvasPx::new(x, y)))
        .collect::<std::result::Result<Vec<_>, _>>()?;
    if points.is_empty() {
        return Err("a stroke needs at least one point".to_string());
    }
    Ok(StrokeArg(points))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_subcommands_and_global_flags() {
        let cli = Cli::try_parse_from([
            "studioplay",
            "edit",
            "a.png",
            "--brightness",
            "120",
            "--rotate",
            "-90",
            "--fine-rotate",
            "-4.5",
            "--aspect",
            "4:5",
            "--flip-x",
            "--format",
            "jpg",
            "-q",
            "70",
        ])
        .unwrap();
        assert_eq!(cli.output.format, Some(ExportFormat::Jpeg));
        assert_eq!(cli.output.quality, Some(70));
        let Command::Edit { input, adjust } = cli.command else { panic!("not edit") };
        assert_eq!(input, vec!["a.png".to_string()]);
        let state = adjust.to_state();
        assert_eq!(state.brightness, 120.0);
        assert_eq!(state.rotation, 270);
        assert_eq!(state.fine_rotation, -4.5);
        assert!(state.flip_x && !state.flip_y);
        assert!((state.aspect_ratio.unwrap() - 0.8).abs() < 1e-6);
    }

    #[test]
    fn rejects_bad_values() {
        assert!(Cli::try_parse_from(["studioplay", "edit", "a.png", "--rotate", "45"]).is_err());
        assert!(Cli::try_parse_from(["studioplay", "smart", "a.png", "--size", "10by10"]).is_err());
        assert!(Cli::try_parse_from(["studioplay", "smart", "a.png", "-p", "sq", "--size", "5x5"]).is_err());
        assert!(Cli::try_parse_from(["studioplay", "collage", "-l", "grid-9", "a.png"]).is_err());
        assert!(Cli::try_parse_from(["studioplay", "mask", "a.png"]).is_err());
    }

    #[test]
    fn text_args_build_layers_only_when_given() {
        assert!(TextArgs::default().to_layers().is_none());
        let args = TextArgs {
            title: Some("Sale".into()),
            discount: Some("  ".into()),
            style: "luxury-gold".into(),
            layout: Some(LayoutPreset::Bottom),
            ..TextArgs::default()
        };
        let layers = args.to_layers().unwrap();
        assert_eq!(layers.style, TextStyle::LuxuryGold);
        assert_eq!(layers.discount, None);
        assert_eq!(layers.transforms.title.y, LayoutPreset::Bottom.rows()[0]);
    }

    #[test]
    fn stroke_and_size_parsing() {
        let s = parse_stroke("1,2; 3.5,4;").unwrap();
        assert_eq!(s.0, vec![CanvasPx::new(1.0, 2.0), CanvasPx::new(3.5, 4.0)]);
        assert!(parse_stroke(";").is_err());
        assert!(parse_stroke("1;2").is_err());
        assert_eq!(parse_size("1080X1920"), Ok((1080, 1920)));
        assert!(parse_size("0x10").is_err());
    }

    #[test]
    fn flags_override_settings() {
        let cli = Cli::try_parse_from(["studioplay", "--font-family", "Heebo", "collage", "x.png", "-f", "webp"]).unwrap();
        let s = cli.output.apply_to(EngineSettings::default());
        assert_eq!(s.export_format, ExportFormat::Webp);
        assert_eq!(s.font_family, "Heebo");
        assert_eq!(s.export_quality, EngineSettings::default().export_quality);
    }

    #[test]
    fn edit_and_mask_commands_write_files() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src.png");
        io::write_image(&crate::testing::gradient(40, 20), &src, ExportFormat::Png, 90).unwrap();
        let out = dir.path().join("out");

        let args = |cmd: &[&str]| {
            let mut v = vec!["studioplay".to_string()];
            v.extend(cmd.iter().map(|s| s.to_string()));
            v.extend(["--output-dir".to_string(), out.display().to_string()]);
            Cli::try_parse_from(v).unwrap()
        };

        let code = run(args(&["edit", src.to_str().unwrap(), "--rotate", "90"]), EngineSettings::default());
        assert_eq!(code, ExitCode::SUCCESS);
        let code = run(
            args(&["mask", src.to_str().unwrap(), "--stroke", "5,5;30,10", "--brush-size", "6"]),
            EngineSettings::default(),
        );
        assert_eq!(code, ExitCode::SUCCESS);

        let mut files: Vec<PathBuf> = std::fs::read_dir(&out).unwrap().map(|e| e.unwrap().path()).collect();
        files.sort();
        assert_eq!(files.len(), 2);
        let clean = files.iter().find(|p| p.to_string_lossy().contains("-clean-")).unwrap();
        assert_eq!(io::load_image(clean).unwrap().dimensions(), (20, 40));
        let mask = files.iter().find(|p| p.to_string_lossy().contains("-mask-")).unwrap();
        let mask = io::load_image(mask).unwrap();
        assert_eq!(mask.dimensions(), (40, 20));
        assert!(mask.pixels().all(|p| p.0 == [0, 0, 0, 255] || p.0 == [255, 255, 255, 255]));
        assert_eq!(mask.get_pixel(5, 5).0, [255, 255, 255, 255]);
    }

    #[test]
    fn missing_inputs_fail() {
        let dir = tempfile::tempdir().unwrap();
        let pattern = dir.path().join("*.png").display().to_string();
        let cli = Cli::try_parse_from([
            "studioplay",
            "edit",
            &pattern,
            "--output-dir",
            &dir.path().display().to_string(),
        ])
        .unwrap();
        assert_eq!(run(cli, EngineSettings::default()), ExitCode::FAILURE);
    }
}
