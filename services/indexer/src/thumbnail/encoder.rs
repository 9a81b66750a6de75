//! Thumbnail encoder - shrinks a normalized image and re-encodes it
//!
//! Images are scaled down to fit a square bounding box while keeping their
//! aspect ratio; images already inside the box keep their size. JPEG output
//! has no alpha channel, so transparent pixels are composited onto white.

use crate::error::ThumbnailError;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, ImageFormat, Rgb, RgbImage};
use std::io::Cursor;
use tracing::debug;

/// JPEG quality used for every JPEG thumbnail
pub const JPEG_QUALITY: u8 = 85;

/// Target format of a thumbnail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThumbnailFormat {
    format: ImageFormat,
}

impl ThumbnailFormat {
    /// Parse a case-insensitive format name such as `JPEG`, `jpg` or `png`
    pub fn parse(name: &str) -> Result<Self, ThumbnailError> {
        ImageFormat::from_extension(name.trim().to_lowercase())
            .filter(|format| format.writing_enabled())
            .map(|format| Self { format })
            .ok_or_else(|| ThumbnailError::UnsupportedFormat(name.to_string()))
    }

    /// Whether this format lacks an alpha channel and needs opaque pixels
    pub fn is_jpeg_class(&self) -> bool {
        self.format == ImageFormat::Jpeg
    }

    pub fn image_format(&self) -> ImageFormat {
        self.format
    }
}

/// Content type for a thumbnail encoded as `name`
pub fn content_type_for(name: &str) -> String {
    match ThumbnailFormat::parse(name) {
        Ok(format) if format.is_jpeg_class() => "image/jpeg".to_string(),
        _ => format!("image/{}", name.trim().to_lowercase()),
    }
}

/// Result of thumbnail generation
#[derive(Debug, Clone)]
pub struct EncodedThumbnail {
    pub data: Vec<u8>,
    pub content_type: String,
    pub width: u32,
    pub height: u32,
}

/// Shrinks and re-encodes images
#[derive(Debug, Clone)]
pub struct ThumbnailEncoder {
    max_dimension: u32,
    format_name: String,
}

impl ThumbnailEncoder {
    /// Create an encoder; the format name is validated on first use
    pub fn new(max_dimension: u32, format_name: impl Into<String>) -> Self {
        Self {
            max_dimension,
            format_name: format_name.into(),
        }
    }

    pub fn max_dimension(&self) -> u32 {
        self.max_dimension
    }

    /// Shrink `image` into the bounding box and encode it
    pub fn encode(&self, image: DynamicImage) -> Result<EncodedThumbnail, ThumbnailError> {
        let format = ThumbnailFormat::parse(&self.format_name)?;

        let (orig_w, orig_h) = image.dimensions();
        let (new_w, new_h) = self.calculate_dimensions(orig_w, orig_h);

        let image = if (new_w, new_h) == (orig_w, orig_h) {
            image
        } else {
            image.resize_exact(new_w, new_h, FilterType::Triangle)
        };

        let data = if format.is_jpeg_class() {
            encode_jpeg(&image)
        } else {
            encode_with(&image, format.image_format())
        }
        .map_err(|e| ThumbnailError::Encode {
            format: self.format_name.clone(),
            message: e.to_string(),
        })?;

        debug!(
            original_width = orig_w,
            original_height = orig_h,
            width = new_w,
            height = new_h,
            size = data.len(),
            "Thumbnail encoded"
        );

        Ok(EncodedThumbnail {
            data,
            content_type: content_type_for(&self.format_name),
            width: new_w,
            height: new_h,
        })
    }

    /// Fit the dimensions into the bounding box, never enlarging
    fn calculate_dimensions(&self, width: u32, height: u32) -> (u32, u32) {
        let max_dim = self.max_dimension.max(1);

        if width <= max_dim && height <= max_dim {
            return (width, height);
        }

        let ratio = f64::min(max_dim as f64 / width as f64, max_dim as f64 / height as f64);
        let scale = |side: u32| ((side as f64 * ratio).round() as u32).clamp(1, max_dim);

        (scale(width), scale(height))
    }
}

/// Encode as JPEG, flattening any alpha channel onto white
fn encode_jpeg(image: &DynamicImage) -> image::ImageResult<Vec<u8>> {
    let mut buf = Vec::new();
    let encoder = JpegEncoder::new_with_quality(&mut buf, JPEG_QUALITY);

    if image.color().has_alpha() {
        DynamicImage::ImageRgb8(flatten_onto_white(image)).write_with_encoder(encoder)?;
    } else if image.color().has_color() {
        DynamicImage::ImageRgb8(image.to_rgb8()).write_with_encoder(encoder)?;
    } else {
        DynamicImage::ImageLuma8(image.to_luma8()).write_with_encoder(encoder)?;
    }

    Ok(buf)
}

fn encode_with(image: &DynamicImage, format: ImageFormat) -> image::ImageResult<Vec<u8>> {
    let mut buf = Vec::new();
    image.write_to(&mut Cursor::new(&mut buf), format)?;
    Ok(buf)
}

/// Composite the image over an opaque white background
fn flatten_onto_white(image: &DynamicImage) -> RgbImage {
    let rgba = image.to_rgba8();
    let mut background = RgbImage::from_pixel(rgba.width(), rgba.height(), Rgb([255, 255, 255]));

    for (x, y, pixel) in rgba.enumerate_pixels() {
        let [r, g, b, a] = pixel.0;
        let alpha = a as u32;
        let blend = |channel: u8| ((channel as u32 * alpha + 255 * (255 - alpha) + 127) / 255) as u8;
        background.put_pixel(x, y, Rgb([blend(r), blend(g), blend(b)]));
    }

    background
}
