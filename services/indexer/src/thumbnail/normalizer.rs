//! Image decoding with best-effort orientation correction.

use crate::error::ThumbnailError;
use image::{DynamicImage, ImageDecoder, ImageReader};
use std::io::Cursor;
use tracing::debug;

/// Rotation that undoes a camera's recorded orientation.
///
/// Only the pure rotations are corrected; mirrored orientations are left as
/// decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrientationCorrection {
    /// Orientation 3
    Rotate180,
    /// Orientation 6: 270° counter-clockwise, i.e. 90° clockwise
    Rotate90Clockwise,
    /// Orientation 8: 90° counter-clockwise
    Rotate90CounterClockwise,
}

impl OrientationCorrection {
    /// Map an EXIF orientation value to its correction
    pub fn from_exif(value: u8) -> Option<Self> {
        match value {
            3 => Some(Self::Rotate180),
            6 => Some(Self::Rotate90Clockwise),
            8 => Some(Self::Rotate90CounterClockwise),
            _ => None,
        }
    }

    /// Rotate the image; the canvas grows to fit the rotated bounds
    pub fn apply(self, image: DynamicImage) -> DynamicImage {
        match self {
            Self::Rotate180 => image.rotate180(),
            Self::Rotate90Clockwise => image.rotate90(),
            Self::Rotate90CounterClockwise => image.rotate270(),
        }
    }
}

/// Read the orientation correction from a decoder's metadata.
///
/// Never fails: missing or unreadable metadata means no correction.
fn read_orientation<D: ImageDecoder>(decoder: &mut D) -> Option<OrientationCorrection> {
    match decoder.orientation() {
        Ok(orientation) => OrientationCorrection::from_exif(orientation.to_exif()),
        Err(e) => {
            debug!(error = %e, "Ignoring unreadable orientation metadata");
            None
        }
    }
}

/// Decode an image payload and undo its recorded orientation
pub fn normalize(data: &[u8]) -> Result<DynamicImage, ThumbnailError> {
    let mut decoder = ImageReader::new(Cursor::new(data))
        .with_guessed_format()
        .map_err(|e| ThumbnailError::Decode(e.to_string()))?
        .into_decoder()
        .map_err(|e| ThumbnailError::Decode(e.to_string()))?;

    let correction = read_orientation(&mut decoder);

    let image =
        DynamicImage::from_decoder(decoder).map_err(|e| ThumbnailError::Decode(e.to_string()))?;

    Ok(match correction {
        Some(correction) => {
            debug!(?correction, "Correcting image orientation");
            correction.apply(image)
        }
        None => image,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::codecs::jpeg::JpegEncoder;
    use image::{ImageFormat, Rgb, RgbImage};

    const RED: Rgb<u8> = Rgb([255, 0, 0]);
    const BLUE: Rgb<u8> = Rgb([0, 0, 255]);

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb([10, 20, 30])));
        let mut buf = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
            .unwrap();
        buf
    }

    /// 40x20 JPEG, left half red and right half blue
    fn split_jpeg() -> Vec<u8> {
        let source = RgbImage::from_fn(40, 20, |x, _| if x < 20 { RED } else { BLUE });
        let mut buf = Vec::new();
        DynamicImage::ImageRgb8(source)
            .write_with_encoder(JpegEncoder::new_with_quality(&mut buf, 95))
            .unwrap();
        buf
    }

    /// Big-endian TIFF block holding a single orientation entry
    fn orientation_tiff(value: u8) -> Vec<u8> {
        let mut tiff = b"MM\x00\x2a\x00\x00\x00\x08".to_vec();
        tiff.extend_from_slice(&[0x00, 0x01]);
        tiff.extend_from_slice(&[0x01, 0x12, 0x00, 0x03, 0x00, 0x00, 0x00, 0x01]);
        tiff.extend_from_slice(&[0x00, value, 0x00, 0x00]);
        tiff.extend_from_slice(&[0x00, 0x00, 0x00, 0x00]);
        tiff
    }

    /// Insert an APP1 Exif segment right after the SOI marker
    fn with_exif(jpeg: &[u8], tiff: &[u8]) -> Vec<u8> {
        let mut payload = b"Exif\x00\x00".to_vec();
        payload.extend_from_slice(tiff);
        let length = (payload.len() + 2) as u16;

        let mut out = jpeg[..2].to_vec();
        out.extend_from_slice(&[0xFF, 0xE1]);
        out.extend_from_slice(&length.to_be_bytes());
        out.extend_from_slice(&payload);
        out.extend_from_slice(&jpeg[2..]);
        out
    }

    fn assert_near(image: &RgbImage, x: u32, y: u32, expected: Rgb<u8>) {
        let actual = image.get_pixel(x, y);
        let close = actual
            .0
            .iter()
            .zip(expected.0.iter())
            .all(|(a, e)| (*a as i16 - *e as i16).abs() < 60);
        assert!(close, "pixel ({}, {}) is {:?}, expected {:?}", x, y, actual, expected);
    }

    #[test]
    fn test_exif_orientation_6_rotates_clockwise() {
        let image = normalize(&with_exif(&split_jpeg(), &orientation_tiff(6)))
            .unwrap()
            .to_rgb8();

        assert_eq!(image.dimensions(), (20, 40));
        // Left edge becomes the top edge
        assert_near(&image, 10, 5, RED);
        assert_near(&image, 10, 35, BLUE);
    }

    #[test]
    fn test_exif_orientation_8_rotates_counter_clockwise() {
        let image = normalize(&with_exif(&split_jpeg(), &orientation_tiff(8)))
            .unwrap()
            .to_rgb8();

        assert_eq!(image.dimensions(), (20, 40));
        // Left edge becomes the bottom edge
        assert_near(&image, 10, 5, BLUE);
        assert_near(&image, 10, 35, RED);
    }

    #[test]
    fn test_exif_orientation_3_turns_upside_down() {
        let image = normalize(&with_exif(&split_jpeg(), &orientation_tiff(3)))
            .unwrap()
            .to_rgb8();

        assert_eq!(image.dimensions(), (40, 20));
        assert_near(&image, 5, 10, BLUE);
        assert_near(&image, 35, 10, RED);
    }

    #[test]
    fn test_exif_orientation_1_is_unchanged() {
        let image = normalize(&with_exif(&split_jpeg(), &orientation_tiff(1)))
            .unwrap()
            .to_rgb8();

        assert_eq!(image.dimensions(), (40, 20));
        assert_near(&image, 5, 10, RED);
    }

    #[test]
    fn test_corrupt_exif_is_ignored() {
        let mut tiff = orientation_tiff(6);
        tiff[..4].copy_from_slice(b"XX\x00\x00");

        let image = normalize(&with_exif(&split_jpeg(), &tiff)).unwrap().to_rgb8();

        assert_eq!(image.dimensions(), (40, 20));
        assert_near(&image, 5, 10, RED);
        assert_near(&image, 35, 10, BLUE);
    }

    #[test]
    fn test_exif_mapping() {
        assert_eq!(
            OrientationCorrection::from_exif(3),
            Some(OrientationCorrection::Rotate180)
        );
        assert_eq!(
            OrientationCorrection::from_exif(6),
            Some(OrientationCorrection::Rotate90Clockwise)
        );
        assert_eq!(
            OrientationCorrection::from_exif(8),
            Some(OrientationCorrection::Rotate90CounterClockwise)
        );
        for value in [0, 1, 2, 4, 5, 7, 9] {
            assert_eq!(OrientationCorrection::from_exif(value), None);
        }
    }

    #[test]
    fn test_quarter_turns_swap_dimensions() {
        let image = DynamicImage::ImageRgb8(RgbImage::new(40, 30));

        let rotated = OrientationCorrection::Rotate90Clockwise.apply(image.clone());
        assert_eq!((rotated.width(), rotated.height()), (30, 40));

        let rotated = OrientationCorrection::Rotate90CounterClockwise.apply(image.clone());
        assert_eq!((rotated.width(), rotated.height()), (30, 40));

        let rotated = OrientationCorrection::Rotate180.apply(image);
        assert_eq!((rotated.width(), rotated.height()), (40, 30));
    }

    #[test]
    fn test_rotation_direction() {
        // Marker in the top-left corner
        let mut source = RgbImage::new(4, 2);
        source.put_pixel(0, 0, Rgb([255, 0, 0]));
        let image = DynamicImage::ImageRgb8(source);

        // Clockwise: top-left moves to top-right
        let clockwise = OrientationCorrection::Rotate90Clockwise
            .apply(image.clone())
            .to_rgb8();
        assert_eq!(clockwise.get_pixel(1, 0), &Rgb([255, 0, 0]));

        // Counter-clockwise: top-left moves to bottom-left
        let counter = OrientationCorrection::Rotate90CounterClockwise
            .apply(image)
            .to_rgb8();
        assert_eq!(counter.get_pixel(0, 3), &Rgb([255, 0, 0]));
    }

    #[test]
    fn test_image_without_orientation_is_unchanged() {
        let image = normalize(&png_bytes(40, 30)).unwrap();
        assert_eq!((image.width(), image.height()), (40, 30));
    }

    #[test]
    fn test_corrupt_payload_fails() {
        let result = normalize(b"definitely not an image");
        assert!(matches!(result, Err(ThumbnailError::Decode(_))));
    }
}
