//! Per-image compression strategy selection from pixel count, file size and
//! declared format.

use serde::{Deserialize, Serialize};

use crate::detect::SourceFormat;

const KIB: u64 = 1024;

/// Below this every file is kept as-is.
pub const TINY_FILE_BYTES: u64 = 50 * KIB;
/// JPEGs below this are kept as-is.
pub const SMALL_JPEG_BYTES: u64 = 200 * KIB;
/// PNGs above this (and above [`PHOTO_PNG_MIN_PIXELS`]) are flattened to JPEG.
pub const LARGE_PNG_BYTES: u64 = 500 * KIB;
pub const PHOTO_PNG_MIN_PIXELS: u64 = 100_000;
/// JPEGs above this are re-encoded.
pub const LARGE_JPEG_BYTES: u64 = 300 * KIB;
/// Any other file above this is re-encoded.
pub const LARGE_OTHER_BYTES: u64 = 400 * KIB;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompressionStrategy {
    /// Byte-for-byte copy of the source file.
    KeepOriginal,
    /// Re-encode the resampled pixels as JPEG.
    OptimizeJpeg,
    /// Composite onto white, then re-encode as JPEG.
    ConvertAndFlattenToJpeg,
}

impl CompressionStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            CompressionStrategy::KeepOriginal => "keep_original",
            CompressionStrategy::OptimizeJpeg => "optimize_jpeg",
            CompressionStrategy::ConvertAndFlattenToJpeg => "convert_png_to_jpeg",
        }
    }
}

impl std::fmt::Display for CompressionStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pick a strategy from the resampled pixel count, the original file size and
/// the declared format. First matching rule wins.
pub fn select_strategy(
    pixel_count: u64,
    original_size: u64,
    format: Option<SourceFormat>,
) -> CompressionStrategy {
    let is_jpeg = format.is_some_and(|f| f.is_jpeg());
    let is_png = format == Some(SourceFormat::Png);

    if original_size < TINY_FILE_BYTES {
        return CompressionStrategy::KeepOriginal;
    }
    if is_jpeg && original_size < SMALL_JPEG_BYTES {
        return CompressionStrategy::KeepOriginal;
    }
    if is_png && pixel_count > PHOTO_PNG_MIN_PIXELS && original_size > LARGE_PNG_BYTES {
        return CompressionStrategy::ConvertAndFlattenToJpeg;
    }
    if is_jpeg && original_size > LARGE_JPEG_BYTES {
        return CompressionStrategy::OptimizeJpeg;
    }
    if original_size > LARGE_OTHER_BYTES {
        return CompressionStrategy::OptimizeJpeg;
    }
    CompressionStrategy::KeepOriginal
}

/// Same as [`select_strategy`] for a raw extension such as `"JPG"` or `"png"`.
pub fn select_strategy_for_extension(
    pixel_count: u64,
    original_size: u64,
    extension: &str,
) -> CompressionStrategy {
    select_strategy(pixel_count, original_size, SourceFormat::from_extension(extension))
}
