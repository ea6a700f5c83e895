//! Applying a [`CompressionStrategy`]: copy, JPEG re-encode, or flatten onto
//! white and re-encode.

use std::path::Path;

use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, Rgb, RgbImage};

use crate::error::ItemError;
use crate::strategy::CompressionStrategy;

/// JPEG quality for [`CompressionStrategy::OptimizeJpeg`], banded by pixel count.
pub fn optimize_jpeg_quality(pixel_count: u64) -> u8 {
    if pixel_count > 2_000_000 {
        65
    } else if pixel_count > 1_000_000 {
        70
    } else if pixel_count < 300_000 {
        80
    } else {
        75
    }
}

/// JPEG quality for [`CompressionStrategy::ConvertAndFlattenToJpeg`].
pub fn flatten_quality(pixel_count: u64) -> u8 {
    if pixel_count > 2_000_000 {
        82
    } else {
        88
    }
}

/// Starting quality for a strategy, or `None` when nothing is encoded.
pub fn strategy_quality(strategy: CompressionStrategy, pixel_count: u64) -> Option<u8> {
    match strategy {
        CompressionStrategy::KeepOriginal => None,
        CompressionStrategy::OptimizeJpeg => Some(optimize_jpeg_quality(pixel_count)),
        CompressionStrategy::ConvertAndFlattenToJpeg => Some(flatten_quality(pixel_count)),
    }
}

/// Alpha-over composite onto an opaque white canvas:
/// `dst = src * a + 255 * (1 - a)` per channel with `a` in `[0, 1]`.
pub fn flatten_onto_white(image: &DynamicImage) -> RgbImage {
    let rgba = image.to_rgba8();
    RgbImage::from_fn(rgba.width(), rgba.height(), |x, y| {
        let [r, g, b, a] = rgba.get_pixel(x, y).0;
        let alpha = a as f32 / 255.0;
        let blend = |c: u8| (c as f32 * alpha + 255.0 * (1.0 - alpha)).round() as u8;
        Rgb([blend(r), blend(g), blend(b)])
    })
}

/// The opaque RGB buffer that gets JPEG-encoded for `strategy`.
///
/// Buffers with an alpha channel are always flattened onto white.
pub fn prepare_pixels(image: &DynamicImage, strategy: CompressionStrategy) -> RgbImage {
    match strategy {
        CompressionStrategy::ConvertAndFlattenToJpeg => flatten_onto_white(image),
        _ if image.color().has_alpha() => flatten_onto_white(image),
        _ => image.to_rgb8(),
    }
}

/// Encode an RGB buffer as baseline JPEG.
pub fn encode_jpeg(rgb: &RgbImage, quality: u8) -> Result<Vec<u8>, ItemError> {
    let mut buffer = Vec::new();
    let encoder = JpegEncoder::new_with_quality(&mut buffer, quality);
    rgb.write_with_encoder(encoder)
        .map_err(|source| ItemError::Encode { quality, source })?;
    Ok(buffer)
}

/// Byte-for-byte copy for [`CompressionStrategy::KeepOriginal`]. Returns the
/// number of bytes written.
pub fn copy_original(src: &Path, dst: &Path) -> Result<u64, ItemError> {
    Ok(std::fs::copy(src, dst)?)
}
