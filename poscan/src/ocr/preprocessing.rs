use image::{DynamicImage, GenericImageView, ImageFormat, ImageReader};

use crate::config::OcrConfig;
use crate::error::{PoscanError, Result};

/// Preprocess image bytes before OCR: decode, validate dimensions,
/// downscale so the longest edge fits `max_image_dimension`, convert to
/// grayscale, stretch contrast, re-encode as PNG.
///
/// A decode failure here is a corrupted or unreadable upload, which is a
/// hard job failure, not an engine degradation.
pub fn preprocess_image(bytes: &[u8], config: &OcrConfig) -> Result<Vec<u8>> {
    let reader = ImageReader::new(std::io::Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| PoscanError::Processing(format!("Failed to read image: {e}")))?;

    let img = reader
        .decode()
        .map_err(|_| PoscanError::Processing("Corrupted or unreadable image".to_string()))?;

    let (width, height) = img.dimensions();
    if width < config.min_image_dimension || height < config.min_image_dimension {
        return Err(PoscanError::Processing(format!(
            "Image too small: {}x{}, minimum {}x{}",
            width, height, config.min_image_dimension, config.min_image_dimension
        )));
    }

    let img = resize_if_needed(img, config.max_image_dimension);
    let img = img.grayscale();
    let img = stretch_contrast(img);

    let mut output = Vec::new();
    img.write_to(&mut std::io::Cursor::new(&mut output), ImageFormat::Png)
        .map_err(|e| PoscanError::Processing(format!("Failed to encode image: {e}")))?;

    Ok(output)
}

/// Downscale while maintaining aspect ratio; never upscales.
fn resize_if_needed(img: DynamicImage, max_dim: u32) -> DynamicImage {
    let (width, height) = img.dimensions();
    if width <= max_dim && height <= max_dim {
        return img;
    }

    let ratio = max_dim as f64 / width.max(height) as f64;
    let new_width = ((width as f64) * ratio).round().max(1.0) as u32;
    let new_height = ((height as f64) * ratio).round().max(1.0) as u32;

    img.resize(new_width, new_height, image::imageops::FilterType::Lanczos3)
}

/// Linear contrast stretch across the observed luminance range.
fn stretch_contrast(img: DynamicImage) -> DynamicImage {
    let gray = img.to_luma8();

    let (mut min, mut max) = (u8::MAX, u8::MIN);
    for pixel in gray.pixels() {
        min = min.min(pixel.0[0]);
        max = max.max(pixel.0[0]);
    }

    if max <= min {
        return DynamicImage::ImageLuma8(gray);
    }

    let range = (max - min) as f32;
    let stretched = image::ImageBuffer::from_fn(gray.width(), gray.height(), |x, y| {
        let value = gray.get_pixel(x, y).0[0];
        let scaled = ((value - min) as f32 / range * 255.0).round() as u8;
        image::Luma([scaled])
    });

    DynamicImage::ImageLuma8(stretched)
}
