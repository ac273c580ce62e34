use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::codecs::webp::{WebPEncoder, WebPQuality};
use image::{DynamicImage, ImageEncoder, Rgba, RgbaImage};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::error::{EngineError, Result};
use crate::surface::Surface;

// ============================================================================
// FORMATS
// ============================================================================

/// Encodings the engine writes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    Png,
    Jpeg,
    Webp,
}

impl ExportFormat {
    pub fn parse(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "png" => Ok(ExportFormat::Png),
            "jpg" | "jpeg" => Ok(ExportFormat::Jpeg),
            "webp" => Ok(ExportFormat::Webp),
            other => Err(EngineError::UnsupportedFormat(other.to_string())),
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Png => "png",
            ExportFormat::Jpeg => "jpg",
            ExportFormat::Webp => "webp",
        }
    }

    pub fn mime(self) -> &'static str {
        match self {
            ExportFormat::Png => "image/png",
            ExportFormat::Jpeg => "image/jpeg",
            ExportFormat::Webp => "image/webp",
        }
    }
}

// ============================================================================
// DECODING
// ============================================================================

/// Open any raster the `image` crate can read, as RGBA.
pub fn load_image(path: &Path) -> Result<RgbaImage> {
    let img = image::open(path)?.to_rgba8();
    log::debug!("loaded {} ({}x{})", path.display(), img.width(), img.height());
    Ok(img)
}

/// Decode an in-memory PNG/JPEG/WebP.
pub fn decode_image(bytes: &[u8]) -> Result<RgbaImage> {
    Ok(image::load_from_memory(bytes)?.to_rgba8())
}

// ============================================================================
// ENCODING
// ============================================================================

/// Composite onto opaque white. JPEG has no alpha channel, so transparent
/// regions would otherwise come out black.
pub fn flatten_onto_white(image: &RgbaImage) -> Result<RgbaImage> {
    let (w, h) = image.dimensions();
    let mut surface = Surface::filled(w, h, Rgba([255, 255, 255, 255]))?;
    surface.draw_image(image, 0, 0);
    Ok(surface.into_image())
}

/// Encode `image` into `out`. `quality` drives the lossy JPEG and WebP
/// encoders and is ignored for PNG.
pub fn encode_into<W: Write>(
    image: &RgbaImage,
    out: &mut W,
    format: ExportFormat,
    quality: u8,
) -> Result<()> {
    match format {
        ExportFormat::Png => {
            PngEncoder::new(out).write_image(
                image.as_raw(),
                image.width(),
                image.height(),
                image::ColorType::Rgba8,
            )?;
        }
        ExportFormat::Jpeg => {
            let flat = flatten_onto_white(image)?;
            let rgb = DynamicImage::ImageRgba8(flat).to_rgb8();
            JpegEncoder::new_with_quality(out, quality.clamp(1, 100)).write_image(
                rgb.as_raw(),
                rgb.width(),
                rgb.height(),
                image::ColorType::Rgb8,
            )?;
        }
        ExportFormat::Webp => {
            // libwebp lossy path; image marks it deprecated in favour of
            // the pure-Rust lossless encoder.
            #[allow(deprecated)]
            let encoder = WebPEncoder::new_with_quality(out, WebPQuality::lossy(quality.clamp(1, 100)));
            encoder.encode(image.as_raw(), image.width(), image.height(), image::ColorType::Rgba8)?;
        }
    }
    Ok(())
}

pub fn encode_image(image: &RgbaImage, format: ExportFormat, quality: u8) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    encode_into(image, &mut bytes, format, quality)?;
    Ok(bytes)
}

/// Encode and write an image to a file.
pub fn write_image(image: &RgbaImage, path: &Path, format: ExportFormat, quality: u8) -> Result<()> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    encode_into(image, &mut writer, format, quality)?;
    writer.flush()?;
    log::info!(
        "wrote {} ({}x{}, {})",
        path.display(),
        image.width(),
        image.height(),
        format.extension()
    );
    Ok(())
}

// ============================================================================
// DATA URLS
// ============================================================================

pub fn to_data_url(bytes: &[u8], mime: &str) -> String {
    format!("data:{};base64,{}", mime, BASE64.encode(bytes))
}

/// Payload of a `data:<mime>;base64,<payload>` URL or a bare base64 string.
/// Returns the mime type (if any) and the decoded bytes.
pub fn decode_data_url(s: &str) -> Option<(Option<String>, Vec<u8>)> {
    let s = s.trim();
    let (mime, payload) = match s.strip_prefix("data:") {
        Some(rest) => {
            let (header, payload) = rest.split_once(',')?;
            let mime = header.strip_suffix(";base64")?;
            (Some(mime.to_string()).filter(|m| !m.is_empty()), payload)
        }
        None => (None, s),
    };
    if payload.is_empty() {
        return None;
    }
    BASE64.decode(payload.as_bytes()).ok().map(|bytes| (mime, bytes))
}

pub fn is_data_url(s: &str) -> bool {
    s.trim_start().starts_with("data:")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_parsing_and_names() {
        assert_eq!(ExportFormat::parse("JPG").unwrap(), ExportFormat::Jpeg);
        assert_eq!(ExportFormat::parse("webp").unwrap().extension(), "webp");
        assert!(matches!(ExportFormat::parse("tiff"), Err(EngineError::UnsupportedFormat(_))));
    }

    #[test]
    fn png_keeps_alpha() {
        let img = RgbaImage::from_fn(3, 2, |x, _| Rgba([10, 20, 30, x as u8 * 100]));
        let bytes = encode_image(&img, ExportFormat::Png, 90).unwrap();
        assert_eq!(decode_image(&bytes).unwrap(), img);
    }

    #[test]
    fn jpeg_fills_transparency_with_white() {
        let img = RgbaImage::new(16, 16);
        let bytes = encode_image(&img, ExportFormat::Jpeg, 90).unwrap();
        let back = decode_image(&bytes).unwrap();
        assert!(back.pixels().all(|p| p[0] > 245 && p[1] > 245 && p[2] > 245 && p[3] == 255));
    }

    #[test]
    fn webp_is_lossy_and_follows_quality() {
        let img = RgbaImage::from_fn(64, 64, |x, y| {
            Rgba([(x * 4) as u8, (y * 4) as u8, ((x ^ y) * 4) as u8, 255])
        });
        let low = encode_image(&img, ExportFormat::Webp, 10).unwrap();
        let high = encode_image(&img, ExportFormat::Webp, 100).unwrap();
        assert_ne!(low, high);
        assert!(low.len() < high.len());

        let back = decode_image(&low).unwrap();
        assert_eq!(back.dimensions(), (64, 64));
        assert_ne!(back, img);
    }

    #[test]
    fn data_url_round_trip() {
        let url = to_data_url(b"hello", "image/png");
        assert!(url.starts_with("data:image/png;base64,"));
        let (mime, bytes) = decode_data_url(&url).unwrap();
        assert_eq!(mime.as_deref(), Some("image/png"));
        assert_eq!(bytes, b"hello");
        let (mime, bytes) = decode_data_url("aGVsbG8=").unwrap();
        assert!(mime.is_none());
        assert_eq!(bytes, b"hello");
        assert!(decode_data_url("data:image/png,plain").is_none());
        assert!(decode_data_url("not base64 !!").is_none());
    }

    #[test]
    fn write_image_creates_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.png");
        write_image(&RgbaImage::from_pixel(4, 4, Rgba([1, 2, 3, 255])), &path, ExportFormat::Png, 90).unwrap();
        assert_eq!(load_image(&path).unwrap().dimensions(), (4, 4));
    }
}
