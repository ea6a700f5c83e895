//! Width-bounded nearest-neighbour downscaling.
//!
//! Every destination pixel copies exactly one source pixel; there is no
//! interpolation or filtering.

use image::{DynamicImage, ImageBuffer, Pixel};

/// Dimensions an image of `width` x `height` has after [`resample_to_width`].
pub fn resampled_dimensions(width: u32, height: u32, target_width: u32) -> (u32, u32) {
    if width <= target_width {
        return (width, height);
    }
    let scale = target_width as f64 / width as f64;
    let target_height = ((height as f64 * scale).round() as u32).max(1);
    (target_width, target_height)
}

/// Downscale `image` so its width equals `target_width`, preserving aspect
/// ratio. Images already at most `target_width` wide are returned untouched.
pub fn resample_to_width(image: DynamicImage, target_width: u32) -> DynamicImage {
    let (src_w, src_h) = (image.width(), image.height());
    if src_w <= target_width {
        return image;
    }
    let (dst_w, dst_h) = resampled_dimensions(src_w, src_h, target_width);
    let scale = target_width as f64 / src_w as f64;

    match image {
        DynamicImage::ImageLuma8(buf) => DynamicImage::ImageLuma8(nearest(&buf, dst_w, dst_h, scale)),
        DynamicImage::ImageLumaA8(buf) => DynamicImage::ImageLumaA8(nearest(&buf, dst_w, dst_h, scale)),
        DynamicImage::ImageRgb8(buf) => DynamicImage::ImageRgb8(nearest(&buf, dst_w, dst_h, scale)),
        DynamicImage::ImageRgba8(buf) => DynamicImage::ImageRgba8(nearest(&buf, dst_w, dst_h, scale)),
        DynamicImage::ImageLuma16(buf) => DynamicImage::ImageLuma16(nearest(&buf, dst_w, dst_h, scale)),
        DynamicImage::ImageLumaA16(buf) => DynamicImage::ImageLumaA16(nearest(&buf, dst_w, dst_h, scale)),
        DynamicImage::ImageRgb16(buf) => DynamicImage::ImageRgb16(nearest(&buf, dst_w, dst_h, scale)),
        DynamicImage::ImageRgba16(buf) => DynamicImage::ImageRgba16(nearest(&buf, dst_w, dst_h, scale)),
        DynamicImage::ImageRgb32F(buf) => DynamicImage::ImageRgb32F(nearest(&buf, dst_w, dst_h, scale)),
        DynamicImage::ImageRgba32F(buf) => DynamicImage::ImageRgba32F(nearest(&buf, dst_w, dst_h, scale)),
        other => DynamicImage::ImageRgba8(nearest(&other.to_rgba8(), dst_w, dst_h, scale)),
    }
}

/// Source index for destination index `dst`, clamped into `[0, src_len - 1]`.
fn source_index(dst: u32, scale: f64, src_len: u32) -> u32 {
    let idx = (dst as f64 / scale).floor() as u32;
    idx.min(src_len - 1)
}

fn nearest<P: Pixel>(
    src: &ImageBuffer<P, Vec<P::Subpixel>>,
    dst_w: u32,
    dst_h: u32,
    scale: f64,
) -> ImageBuffer<P, Vec<P::Subpixel>> {
    let (src_w, src_h) = src.dimensions();
    ImageBuffer::from_fn(dst_w, dst_h, |x, y| {
        *src.get_pixel(source_index(x, scale, src_w), source_index(y, scale, src_h))
    })
}
