//! Image normalization before caching.
//!
//! Every cached breed photo is decoded, downscaled so its longest side is at
//! most `max_dimension` (aspect ratio kept, never upscaled) and re-encoded as
//! JPEG at a fixed quality. Undecodable bytes are rejected here, which makes
//! the waterfall move on to the next source.

use anyhow::{Context, Result};
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView};

use crate::config::ImageConfig;

/// Decode, bound and re-encode `bytes` as JPEG.
pub fn normalize(bytes: &[u8], config: &ImageConfig) -> Result<Vec<u8>> {
    let img = image::load_from_memory(bytes).context("Failed to decode image")?;
    let img = bound(img, config.max_dimension);

    // JPEG has no alpha channel.
    let rgb = DynamicImage::ImageRgb8(img.to_rgb8());

    let mut out = Vec::new();
    let encoder = JpegEncoder::new_with_quality(&mut out, config.jpeg_quality);
    rgb.write_with_encoder(encoder)
        .context("Failed to encode JPEG")?;
    Ok(out)
}

/// Run [`normalize`] on the blocking pool.
pub async fn normalize_blocking(bytes: Vec<u8>, config: ImageConfig) -> Result<Vec<u8>> {
    tokio::task::spawn_blocking(move || normalize(&bytes, &config)).await?
}

fn bound(img: DynamicImage, max_dimension: u32) -> DynamicImage {
    let (w, h) = img.dimensions();
    if w <= max_dimension && h <= max_dimension {
        return img;
    }
    // `resize` keeps the aspect ratio and fits within the box.
    img.resize(max_dimension, max_dimension, FilterType::Triangle)
}

#[cfg(test)]
pub(crate) fn sample_png(width: u32, height: u32) -> Vec<u8> {
    let img = image::RgbaImage::from_fn(width, height, |x, y| {
        image::Rgba([(x % 256) as u8, (y % 256) as u8, 128, 255])
    });
    let mut out = std::io::Cursor::new(Vec::new());
    DynamicImage::ImageRgba8(img)
        .write_to(&mut out, image::ImageFormat::Png)
        .unwrap();
    out.into_inner()
}
