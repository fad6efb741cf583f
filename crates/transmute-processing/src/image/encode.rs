//! Output encoding helpers

use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType as PngFilterType, PngEncoder};
use image::{DynamicImage, ImageFormat};
use std::io::Cursor;
use transmute_core::AppError;

/// Parse a requested target format (`png`, `JPG`, `webp`, ...)
pub fn target_format(requested: &str) -> Result<ImageFormat, AppError> {
    let requested = requested.trim().to_lowercase();
    ImageFormat::from_extension(&requested)
        .filter(|format| format.writing_enabled())
        .ok_or_else(|| {
            AppError::TransformFailure(format!("Unsupported target format '{}'", requested))
        })
}

/// Canonical file extension for a format
pub fn extension(format: ImageFormat) -> &'static str {
    format.extensions_str().first().copied().unwrap_or("img")
}

/// Encode with the format's default settings
pub fn encode(img: &DynamicImage, format: ImageFormat) -> Result<Vec<u8>, AppError> {
    let img = match format {
        ImageFormat::Jpeg => DynamicImage::ImageRgb8(img.to_rgb8()),
        ImageFormat::Png | ImageFormat::Tiff => img.clone(),
        _ => DynamicImage::ImageRgba8(img.to_rgba8()),
    };

    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), format)
        .map_err(|e| AppError::TransformFailure(format!("Failed to encode {:?}: {}", format, e)))?;
    Ok(buf)
}

pub fn encode_jpeg(img: &DynamicImage, quality: u8) -> Result<Vec<u8>, AppError> {
    let rgb = img.to_rgb8();
    let mut buf = Vec::new();
    JpegEncoder::new_with_quality(&mut buf, quality)
        .encode_image(&rgb)
        .map_err(|e| AppError::TransformFailure(format!("Failed to encode JPEG: {}", e)))?;
    Ok(buf)
}

/// Lossless PNG at maximum compression
pub fn encode_png_best(img: &DynamicImage) -> Result<Vec<u8>, AppError> {
    let mut buf = Vec::new();
    let encoder =
        PngEncoder::new_with_quality(&mut buf, CompressionType::Best, PngFilterType::Adaptive);
    img.write_with_encoder(encoder)
        .map_err(|e| AppError::TransformFailure(format!("Failed to encode PNG: {}", e)))?;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_format_is_case_insensitive() {
        assert_eq!(target_format("PNG").unwrap(), ImageFormat::Png);
        assert_eq!(target_format("jpg").unwrap(), ImageFormat::Jpeg);
        assert_eq!(target_format(" WebP ").unwrap(), ImageFormat::WebP);
    }

    #[test]
    fn test_unsupported_target_format_is_transform_failure() {
        let err = target_format("xyz").unwrap_err();
        assert!(matches!(err, AppError::TransformFailure(msg) if msg.contains("xyz")));
    }

    #[test]
    fn test_jpeg_drops_alpha() {
        let img = DynamicImage::new_rgba8(8, 8);
        let data = encode(&img, ImageFormat::Jpeg).unwrap();
        assert_eq!(image::guess_format(&data).unwrap(), ImageFormat::Jpeg);
    }
}
