// ============================================================================
// ENGINE SETTINGS: persistent key=value configuration
// ============================================================================
//
// Plain `key=value` lines. Unknown keys are ignored and unparsable values
// (or out-of-range) values fall back to the default, so an old or
// hand-edited file always loads.
// ============================================================================

use std::path::{Path, PathBuf};
use std::time::Duration;

use image::Rgba;

use crate::collage::DEFAULT_COLLAGE_SIZE;
use crate::components::history::DEFAULT_MAX_UNDO_STEPS;
use crate::components::layers::ResizeMetric;
use crate::components::mask::{DEFAULT_BRUSH_COLOR, DEFAULT_BRUSH_SIZE};
use crate::compositor::DEFAULT_WATERMARK_TEXT;
use crate::error::{EngineError, Result};
use crate::export::DEFAULT_EXPORT_QUALITY;
use crate::generation::{RetryPolicy, DISPATCH_JPEG_QUALITY, DISPATCH_MAX_DIMENSION, MAX_RETRY_DELAY};
use crate::io::ExportFormat;

const MAX_RETRY_ATTEMPTS: u32 = 10;
const MAX_RETRY_BACKOFF: f32 = 10.0;

#[derive(Clone, Debug, PartialEq)]
pub struct EngineSettings {
    pub brush_size: f32,
    pub brush_color: Rgba<u8>,
    pub max_undo_steps: usize,
    pub dispatch_max_dimension: u32,
    pub dispatch_quality: u8,
    pub retry_attempts: u32,
    pub retry_delay_ms: u64,
    pub retry_backoff: f32,
    pub export_quality: u8,
    pub export_format: ExportFormat,
    pub collage_size: u32,
    pub watermark_text: String,
    pub show_watermark: bool,
    /// Empty means the system default sans-serif.
    pub font_family: String,
    pub resize_metric: ResizeMetric,
    pub log_level: log::LevelFilter,
}

impl Default for EngineSettings {
    fn default() -> Self {
        let retry = RetryPolicy::default();
        Self {
            brush_size: DEFAULT_BRUSH_SIZE,
            brush_color: DEFAULT_BRUSH_COLOR,
            max_undo_steps: DEFAULT_MAX_UNDO_STEPS,
            dispatch_max_dimension: DISPATCH_MAX_DIMENSION,
            dispatch_quality: DISPATCH_JPEG_QUALITY,
            retry_attempts: retry.retries,
            retry_delay_ms: retry.initial_delay.as_millis() as u64,
            retry_backoff: retry.backoff,
            export_quality: DEFAULT_EXPORT_QUALITY,
            export_format: ExportFormat::Png,
            collage_size: DEFAULT_COLLAGE_SIZE,
            watermark_text: DEFAULT_WATERMARK_TEXT.to_string(),
            show_watermark: true,
            font_family: String::new(),
            resize_metric: ResizeMetric::default(),
            log_level: log::LevelFilter::Info,
        }
    }
}

/// Serialize a colour as "r,g,b,a"
fn color_to_str(c: Rgba<u8>) -> String {
    format!("{},{},{},{}", c[0], c[1], c[2], c[3])
}

/// Parse a colour from "r,g,b,a"
pub fn parse_rgba(s: &str) -> Option<Rgba<u8>> {
    let parts: Vec<&str> = s.split(',').collect();
    if parts.len() != 4 {
        return None;
    }
    let mut c = [0u8; 4];
    for (dst, p) in c.iter_mut().zip(&parts) {
        *dst = p.trim().parse::<u8>().ok()?;
    }
    Some(Rgba(c))
}

impl EngineSettings {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            retries: self.retry_attempts,
            initial_delay: Duration::from_millis(self.retry_delay_ms),
            backoff: self.retry_backoff,
        }
    }

    /// `<config>/studioplay/studioplay_settings.cfg`
    pub fn settings_path() -> Option<PathBuf> {
        #[cfg(target_os = "windows")]
        {
            let appdata = std::env::var("APPDATA").or_else(|_| std::env::var("USERPROFILE")).ok()?;
            return Some(PathBuf::from(appdata).join("StudioPlay").join("studioplay_settings.cfg"));
        }
        #[cfg(target_os = "macos")]
        {
            let home = std::env::var("HOME").ok()?;
            return Some(
                PathBuf::from(home)
                    .join("Library")
                    .join("Application Support")
                    .join("StudioPlay")
                    .join("studioplay_settings.cfg"),
            );
        }
        #[cfg(not(any(target_os = "windows", target_os = "macos")))]
        {
            let config_dir = std::env::var("XDG_CONFIG_HOME").map(PathBuf::from).or_else(|_| {
                std::env::var("HOME").map(|home| PathBuf::from(home).join(".config"))
            });
            config_dir.ok().map(|d| d.join("studioplay").join("studioplay_settings.cfg"))
        }
    }

    pub fn to_config_string(&self) -> String {
        format!(
            "brush_size={}\n\
             brush_color={}\n\
             max_undo_steps={}\n\
             dispatch_max_dimension={}\n\
             dispatch_quality={}\n\
             retry_attempts={}\n\
             retry_delay_ms={}\n\
             retry_backoff={}\n\
             export_quality={}\n\
             export_format={}\n\
             collage_size={}\n\
             watermark_text={}\n\
             show_watermark={}\n\
             font_family={}\n\
             resize_metric={}\n\
             log_level={}\n",
            self.brush_size,
            color_to_str(self.brush_color),
            self.max_undo_steps,
            self.dispatch_max_dimension,
            self.dispatch_quality,
            self.retry_attempts,
            self.retry_delay_ms,
            self.retry_backoff,
            self.export_quality,
            self.export_format.extension(),
            self.collage_size,
            self.watermark_text,
            self.show_watermark,
            self.font_family,
            self.resize_metric.as_str(),
            self.log_level.as_str().to_ascii_lowercase(),
        )
    }

    pub fn from_config_str(content: &str) -> Self {
        let mut s = Self::default();
        let d = Self::default();
        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((key, val)) = line.split_once('=') else { continue };
            let val = val.trim();
            match key.trim() {
                "brush_size" => s.brush_size = val.parse().unwrap_or(d.brush_size),
                "brush_color" => s.brush_color = parse_rgba(val).unwrap_or(d.brush_color),
                "max_undo_steps" => {
                    s.max_undo_steps = val.parse().ok().filter(|&n| n > 0).unwrap_or(d.max_undo_steps)
                }
                "dispatch_max_dimension" => {
                    s.dispatch_max_dimension =
                        val.parse().ok().filter(|&n| n > 0).unwrap_or(d.dispatch_max_dimension)
                }
                "dispatch_quality" => s.dispatch_quality = val.parse().unwrap_or(d.dispatch_quality),
                "retry_attempts" => {
                    s.retry_attempts =
                        val.parse().ok().filter(|&n| n <= MAX_RETRY_ATTEMPTS).unwrap_or(d.retry_attempts)
                }
                "retry_delay_ms" => {
                    s.retry_delay_ms = val
                        .parse()
                        .ok()
                        .filter(|&ms| Duration::from_millis(ms) <= MAX_RETRY_DELAY)
                        .unwrap_or(d.retry_delay_ms)
                }
                "retry_backoff" => {
                    s.retry_backoff = val
                        .parse()
                        .ok()
                        .filter(|b: &f32| b.is_finite() && (1.0..=MAX_RETRY_BACKOFF).contains(b))
                        .unwrap_or(d.retry_backoff)
                }
                "export_quality" => s.export_quality = val.parse().unwrap_or(d.export_quality),
                "export_format" => s.export_format = ExportFormat::parse(val).unwrap_or(d.export_format),
                "collage_size" => {
                    s.collage_size = val.parse().ok().filter(|&n| n > 0).unwrap_or(d.collage_size)
                }
                "watermark_text" => s.watermark_text = val.to_string(),
                "show_watermark" => s.show_watermark = val.parse().unwrap_or(d.show_watermark),
                "font_family" => s.font_family = val.to_string(),
                "resize_metric" => s.resize_metric = ResizeMetric::parse(val).unwrap_or(d.resize_metric),
                "log_level" => s.log_level = val.parse().unwrap_or(d.log_level),
                other => log::debug!("ignoring unknown setting '{}'", other),
            }
        }
        s
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(Self::from_config_str(&content))
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_config_string())?;
        Ok(())
    }

    /// Settings from the platform path; defaults when missing or unreadable.
    pub fn load() -> Self {
        let Some(path) = Self::settings_path() else { return Self::default() };
        match Self::load_from(&path) {
            Ok(s) => s,
            Err(EngineError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => Self::default(),
            Err(e) => {
                log::warn!("could not read settings {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::settings_path()
            .ok_or_else(|| EngineError::Settings("no configuration directory".to_string()))?;
        self.save_to(&path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("studioplay_settings.cfg");
        let s = EngineSettings {
            brush_size: 42.0,
            brush_color: Rgba([1, 2, 3, 4]),
            export_format: ExportFormat::Webp,
            watermark_text: "Shop = Co".to_string(),
            show_watermark: false,
            resize_metric: ResizeMetric::AnchorDistance,
            log_level: log::LevelFilter::Debug,
            ..EngineSettings::default()
        };
        s.save_to(&path).unwrap();
        assert_eq!(EngineSettings::load_from(&path).unwrap(), s);
    }

    #[test]
    fn bad_values_fall_back_and_unknown_keys_are_ignored() {
        let s = EngineSettings::from_config_str(
            "brush_size=huge\nbrush_color=1,2,3\nmax_undo_steps=0\ntheme=dark\nexport_format=tiff\n# note\nretry_attempts=5\n",
        );
        let d = EngineSettings::default();
        assert_eq!(s.brush_size, d.brush_size);
        assert_eq!(s.brush_color, d.brush_color);
        assert_eq!(s.max_undo_steps, d.max_undo_steps);
        assert_eq!(s.export_format, d.export_format);
        assert_eq!(s.retry_attempts, 5);
        assert_eq!(s.retry_policy().retries, 5);
    }

    #[test]
    fn retry_values_out_of_range_fall_back() {
        let d = EngineSettings::default();
        for cfg in [
            "retry_backoff=inf\nretry_attempts=4294967295\nretry_delay_ms=18446744073709551615\n",
            "retry_backoff=NaN\nretry_attempts=-1\nretry_delay_ms=600000\n",
            "retry_backoff=0.5\n",
            "retry_backoff=1e30\n",
        ] {
            let s = EngineSettings::from_config_str(cfg);
            assert_eq!(s.retry_policy(), d.retry_policy(), "{cfg:?}");
        }

        let s = EngineSettings::from_config_str("retry_backoff=1.5\nretry_attempts=0\nretry_delay_ms=250\n");
        let policy = s.retry_policy();
        assert_eq!(policy.backoff, 1.5);
        assert_eq!(policy.retries, 0);
        assert_eq!(policy.initial_delay, Duration::from_millis(250));
    }

    #[test]
    fn rgba_parsing() {
        assert_eq!(parse_rgba(" 236, 72,153 ,153"), Some(Rgba([236, 72, 153, 153])));
        assert_eq!(parse_rgba("300,0,0,0"), None);
        assert_eq!(parse_rgba("a,b,c,d"), None);
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            EngineSettings::load_from(&dir.path().join("absent.cfg")),
            Err(EngineError::Io(_))
        ));
    }
}
