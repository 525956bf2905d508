//! Image tools: compression, format conversion and resizing.

use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType as PngFilter, PngEncoder};
use image::codecs::webp::WebPEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat};
use std::io::Cursor;
use std::str::FromStr;
use tracing::{debug, instrument};

use crate::error::{Error, Result};

pub const DEFAULT_COMPRESS_QUALITY: u8 = 80;
pub const CONVERT_JPEG_QUALITY: u8 = 90;
pub const MAX_DIMENSION: u32 = 10_000;

/// Formats the tools can write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Png,
    Jpeg,
    WebP,
    Gif,
}

impl OutputFormat {
    pub fn mime_type(self) -> &'static str {
        match self {
            OutputFormat::Png => "image/png",
            OutputFormat::Jpeg => "image/jpeg",
            OutputFormat::WebP => "image/webp",
            OutputFormat::Gif => "image/gif",
        }
    }
}

impl FromStr for OutputFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "png" => Ok(OutputFormat::Png),
            "jpg" | "jpeg" => Ok(OutputFormat::Jpeg),
            "webp" => Ok(OutputFormat::WebP),
            "gif" => Ok(OutputFormat::Gif),
            _ => {
                debug!(format = s, "Unsupported output format");
                Err(Error::UnsupportedFormat)
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct EncodedImage {
    pub bytes: Vec<u8>,
    pub format: OutputFormat,
}

pub fn decode(bytes: &[u8]) -> Result<DynamicImage> {
    image::load_from_memory(bytes).map_err(|e| Error::InvalidImage {
        reason: e.to_string(),
    })
}

/// Re-encode in the same family: PNG at maximum compression, WebP losslessly,
/// everything else as JPEG at `quality`.
#[instrument(skip(bytes), fields(original_size = bytes.len()))]
pub fn compress(bytes: &[u8], quality: u8) -> Result<EncodedImage> {
    let source_format = image::guess_format(bytes).ok();
    let img = decode(bytes)?;

    let encoded = match source_format {
        Some(ImageFormat::Png) => EncodedImage {
            bytes: encode_png(&img, CompressionType::Best)?,
            format: OutputFormat::Png,
        },
        Some(ImageFormat::WebP) => EncodedImage {
            bytes: encode_webp(&img)?,
            format: OutputFormat::WebP,
        },
        _ => EncodedImage {
            bytes: encode_jpeg(&img, quality.clamp(1, 100))?,
            format: OutputFormat::Jpeg,
        },
    };

    debug!(
        compressed_size = encoded.bytes.len(),
        format = ?encoded.format,
        "Image compressed"
    );
    Ok(encoded)
}

#[instrument(skip(bytes), fields(original_size = bytes.len()))]
pub fn convert(bytes: &[u8], target: OutputFormat) -> Result<EncodedImage> {
    let img = decode(bytes)?;
    let bytes = encode(&img, target)?;
    Ok(EncodedImage {
        bytes,
        format: target,
    })
}

/// Check requested dimensions before any decoding work.
pub fn validate_dimensions(width: u32, height: u32) -> Result<()> {
    if width == 0 || height == 0 {
        return Err(Error::InvalidDimensions);
    }
    if width > MAX_DIMENSION || height > MAX_DIMENSION {
        return Err(Error::DimensionTooLarge { max: MAX_DIMENSION });
    }
    Ok(())
}

/// Stretch to exactly `width` x `height` and emit PNG.
#[instrument(skip(bytes), fields(original_size = bytes.len()))]
pub fn resize(bytes: &[u8], width: u32, height: u32) -> Result<EncodedImage> {
    validate_dimensions(width, height)?;
    let img = decode(bytes)?;
    let resized = img.resize_exact(width, height, FilterType::Lanczos3);
    Ok(EncodedImage {
        bytes: encode(&resized, OutputFormat::Png)?,
        format: OutputFormat::Png,
    })
}

pub fn encode(img: &DynamicImage, format: OutputFormat) -> Result<Vec<u8>> {
    match format {
        OutputFormat::Png => encode_png(img, CompressionType::Default),
        OutputFormat::Jpeg => encode_jpeg(img, CONVERT_JPEG_QUALITY),
        OutputFormat::WebP => encode_webp(img),
        OutputFormat::Gif => {
            let mut buffer = Cursor::new(Vec::new());
            DynamicImage::ImageRgba8(img.to_rgba8())
                .write_to(&mut buffer, ImageFormat::Gif)
                .map_err(encode_error)?;
            Ok(buffer.into_inner())
        }
    }
}

pub fn encode_jpeg(img: &DynamicImage, quality: u8) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    // JPEG has no alpha channel
    let rgb = DynamicImage::ImageRgb8(img.to_rgb8());
    rgb.write_with_encoder(JpegEncoder::new_with_quality(&mut buffer, quality))
        .map_err(encode_error)?;
    Ok(buffer)
}

fn encode_png(img: &DynamicImage, compression: CompressionType) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    let encoder = PngEncoder::new_with_quality(&mut buffer, compression, PngFilter::Adaptive);
    img.write_with_encoder(encoder).map_err(encode_error)?;
    Ok(buffer)
}

/// The encoder only supports lossless output.
fn encode_webp(img: &DynamicImage) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    let normalized = if img.color().has_alpha() {
        DynamicImage::ImageRgba8(img.to_rgba8())
    } else {
        DynamicImage::ImageRgb8(img.to_rgb8())
    };
    normalized
        .write_with_encoder(WebPEncoder::new_lossless(&mut buffer))
        .map_err(encode_error)?;
    Ok(buffer)
}

fn encode_error(e: image::ImageError) -> Error {
    Error::Processing {
        reason: e.to_string(),
    }
}
