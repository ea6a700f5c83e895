//! Bounded quality search toward a per-image byte ceiling.

use image::RgbImage;
use tracing::debug;

use crate::encode::encode_jpeg;
use crate::error::ItemError;

/// Lowest quality the search will ever try.
pub const MIN_QUALITY: u8 = 50;
/// Quality dropped between attempts.
pub const QUALITY_STEP: u8 = 15;
/// Encode attempts before the last result is accepted regardless of size.
pub const MAX_ATTEMPTS: u32 = 4;

/// Starting quality for the size-target path, banded by pixel count.
pub fn adaptive_quality(pixel_count: u64) -> u8 {
    let quality: u8 = if pixel_count > 4_000_000 {
        75
    } else if pixel_count > 2_000_000 {
        80
    } else if pixel_count > 1_000_000 {
        85
    } else {
        90
    };
    quality.clamp(60, 95)
}

/// The accepted encoding.
#[derive(Debug, Clone)]
pub struct SearchOutcome {
    pub bytes: Vec<u8>,
    pub quality: u8,
    pub attempts: u32,
}

impl SearchOutcome {
    pub fn within(&self, ceiling: u64) -> bool {
        self.bytes.len() as u64 <= ceiling
    }
}

/// Encode `rgb`, lowering quality by [`QUALITY_STEP`] until the output fits
/// in `ceiling` bytes, quality reaches [`MIN_QUALITY`], or [`MAX_ATTEMPTS`]
/// encodes have run. The ceiling is a target, not a contract: when it is
/// never met the last attempt is returned.
pub fn encode_within_ceiling(
    rgb: &RgbImage,
    start_quality: u8,
    ceiling: u64,
) -> Result<SearchOutcome, ItemError> {
    let mut quality = start_quality.clamp(MIN_QUALITY, 100);
    let mut attempts = 0;
    loop {
        let bytes = encode_jpeg(rgb, quality)?;
        attempts += 1;
        let size = bytes.len() as u64;
        debug!(attempt = attempts, quality, size, ceiling, "JPEG encode attempt");

        if size <= ceiling || quality <= MIN_QUALITY || attempts >= MAX_ATTEMPTS {
            return Ok(SearchOutcome {
                bytes,
                quality,
                attempts,
            });
        }
        quality = quality.saturating_sub(QUALITY_STEP).max(MIN_QUALITY);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    /// High-entropy pixels so the encoded size responds to quality.
    fn noisy(w: u32, h: u32) -> RgbImage {
        let mut state: u32 = 0x1234_5678;
        RgbImage::from_fn(w, h, |_, _| {
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            let [a, b, c, _] = state.to_le_bytes();
            Rgb([a, b, c])
        })
    }

    #[test]
    fn adaptive_bands() {
        assert_eq!(adaptive_quality(4_000_001), 75);
        assert_eq!(adaptive_quality(4_000_000), 80);
        assert_eq!(adaptive_quality(2_000_001), 80);
        assert_eq!(adaptive_quality(2_000_000), 85);
        assert_eq!(adaptive_quality(1_000_001), 85);
        assert_eq!(adaptive_quality(1_000_000), 90);
        assert_eq!(adaptive_quality(0), 90);
    }

    #[test]
    fn fits_on_first_attempt() {
        let rgb = RgbImage::from_pixel(32, 32, Rgb([128, 128, 128]));
        let out = encode_within_ceiling(&rgb, 90, 500 * 1024).unwrap();
        assert_eq!(out.attempts, 1);
        assert_eq!(out.quality, 90);
        assert!(out.within(500 * 1024));
    }

    #[test]
    fn unreachable_ceiling_stops_at_floor() {
        let rgb = noisy(64, 64);
        let out = encode_within_ceiling(&rgb, 90, 1).unwrap();
        // 90 -> 75 -> 60 -> 50
        assert_eq!(out.attempts, 4);
        assert_eq!(out.quality, 50);
        assert!(!out.within(1));
    }

    #[test]
    fn low_start_stops_once_floor_reached() {
        let rgb = noisy(32, 32);
        let out = encode_within_ceiling(&rgb, 60, 1).unwrap();
        // 60 -> 50, then quality <= 50 stops the search.
        assert_eq!(out.attempts, 2);
        assert_eq!(out.quality, 50);
    }

    #[test]
    fn start_below_floor_is_raised() {
        let rgb = noisy(16, 16);
        let out = encode_within_ceiling(&rgb, 10, 1).unwrap();
        assert_eq!(out.attempts, 1);
        assert_eq!(out.quality, 50);
    }

    #[test]
    fn bounded_for_every_start() {
        let rgb = noisy(24, 24);
        for start in [0u8, 50, 65, 75, 88, 95, 100] {
            let out = encode_within_ceiling(&rgb, start, 1).unwrap();
            assert!(out.attempts <= MAX_ATTEMPTS);
            assert!(out.quality >= MIN_QUALITY);
        }
    }
}
