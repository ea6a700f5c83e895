//! Declared image format from the file extension, plus magic-byte sniffing.

use std::path::Path;

/// Raster formats accepted as input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceFormat {
    Jpeg,
    Png,
    Gif,
    Bmp,
    Tiff,
    WebP,
}

/// Every extension discovery accepts, lowercase and without the dot.
pub const SUPPORTED_EXTENSIONS: &[&str] =
    &["jpg", "jpeg", "png", "gif", "bmp", "tiff", "tif", "webp"];

impl SourceFormat {
    /// Map an extension (any case, no dot) to its format.
    pub fn from_extension(ext: &str) -> Option<SourceFormat> {
        match ext.to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" => Some(SourceFormat::Jpeg),
            "png" => Some(SourceFormat::Png),
            "gif" => Some(SourceFormat::Gif),
            "bmp" => Some(SourceFormat::Bmp),
            "tif" | "tiff" => Some(SourceFormat::Tiff),
            "webp" => Some(SourceFormat::WebP),
            _ => None,
        }
    }

    pub fn from_path(path: &Path) -> Option<SourceFormat> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(SourceFormat::from_extension)
    }

    pub fn extension(&self) -> &'static str {
        match self {
            SourceFormat::Jpeg => "jpg",
            SourceFormat::Png => "png",
            SourceFormat::Gif => "gif",
            SourceFormat::Bmp => "bmp",
            SourceFormat::Tiff => "tiff",
            SourceFormat::WebP => "webp",
        }
    }

    pub fn is_jpeg(&self) -> bool {
        matches!(self, SourceFormat::Jpeg)
    }
}

impl std::fmt::Display for SourceFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.extension().to_uppercase())
    }
}

/// True when the path's extension is one of [`SUPPORTED_EXTENSIONS`].
pub fn is_supported(path: &Path) -> bool {
    SourceFormat::from_path(path).is_some()
}

/// Identify a format from its leading bytes, ignoring the file name.
pub fn sniff(header: &[u8]) -> Option<SourceFormat> {
    if header.starts_with(&[0xFF, 0xD8, 0xFF]) {
        return Some(SourceFormat::Jpeg);
    }
    if header.starts_with(b"\x89PNG\r\n\x1a\n") {
        return Some(SourceFormat::Png);
    }
    if header.starts_with(b"GIF87a") || header.starts_with(b"GIF89a") {
        return Some(SourceFormat::Gif);
    }
    if header.starts_with(b"BM") {
        return Some(SourceFormat::Bmp);
    }
    if header.starts_with(b"II*\0") || header.starts_with(b"MM\0*") {
        return Some(SourceFormat::Tiff);
    }
    if header.len() >= 12 && &header[0..4] == b"RIFF" && &header[8..12] == b"WEBP" {
        return Some(SourceFormat::WebP);
    }
    None
}

/// Number of colour components declared in a baseline/progressive JPEG
/// frame header, or `None` if no SOF marker is found.
pub fn jpeg_components(data: &[u8]) -> Option<u8> {
    if !data.starts_with(&[0xFF, 0xD8]) {
        return None;
    }
    let mut pos = 2;
    while pos + 4 <= data.len() {
        if data[pos] != 0xFF {
            return None;
        }
        let marker = data[pos + 1];
        // Fill bytes and standalone markers carry no length.
        if marker == 0xFF {
            pos += 1;
            continue;
        }
        if marker == 0x01 || (0xD0..=0xD7).contains(&marker) {
            pos += 2;
            continue;
        }
        let len = u16::from_be_bytes([data[pos + 2], data[pos + 3]]) as usize;
        let is_sof = (0xC0..=0xCF).contains(&marker) && !matches!(marker, 0xC4 | 0xC8 | 0xCC);
        if is_sof {
            // length(2) precision(1) height(2) width(2) components(1)
            return data.get(pos + 9).copied();
        }
        if marker == 0xDA || len < 2 {
            return None;
        }
        pos += 2 + len;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extension_case_insensitive() {
        assert_eq!(SourceFormat::from_extension("JPG"), Some(SourceFormat::Jpeg));
        assert_eq!(SourceFormat::from_extension("Jpeg"), Some(SourceFormat::Jpeg));
        assert_eq!(SourceFormat::from_extension("TIF"), Some(SourceFormat::Tiff));
        assert_eq!(SourceFormat::from_extension("webp"), Some(SourceFormat::WebP));
        assert_eq!(SourceFormat::from_extension("svg"), None);
    }

    #[test]
    fn test_from_path() {
        assert_eq!(SourceFormat::from_path(Path::new("a/b/photo.PNG")), Some(SourceFormat::Png));
        assert_eq!(SourceFormat::from_path(Path::new("noext")), None);
        assert!(is_supported(Path::new("scan.tiff")));
        assert!(!is_supported(Path::new("notes.txt")));
    }

    #[test]
    fn test_every_supported_extension_maps() {
        for ext in SUPPORTED_EXTENSIONS {
            assert!(SourceFormat::from_extension(ext).is_some(), "{ext}");
        }
    }

    #[test]
    fn test_sniff() {
        assert_eq!(sniff(&[0xFF, 0xD8, 0xFF, 0xE0]), Some(SourceFormat::Jpeg));
        assert_eq!(sniff(b"\x89PNG\r\n\x1a\n...."), Some(SourceFormat::Png));
        assert_eq!(sniff(b"GIF89a"), Some(SourceFormat::Gif));
        assert_eq!(sniff(b"RIFF\0\0\0\0WEBPVP8 "), Some(SourceFormat::WebP));
        assert_eq!(sniff(b"hello"), None);
    }

    #[test]
    fn test_jpeg_components_from_encoded_image() {
        let rgb = image::RgbImage::from_pixel(4, 4, image::Rgb([10, 20, 30]));
        let mut buf = Vec::new();
        let enc = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut buf, 80);
        rgb.write_with_encoder(enc).unwrap();
        assert_eq!(jpeg_components(&buf), Some(3));

        let gray = image::GrayImage::from_pixel(4, 4, image::Luma([128]));
        let mut buf = Vec::new();
        let enc = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut buf, 80);
        gray.write_with_encoder(enc).unwrap();
        assert_eq!(jpeg_components(&buf), Some(1));
    }

    #[test]
    fn test_jpeg_components_rejects_garbage() {
        assert_eq!(jpeg_components(b"not a jpeg"), None);
        assert_eq!(jpeg_components(&[0xFF, 0xD8, 0x00, 0x00]), None);
    }

    #[test]
    fn test_format_display() {
        assert_eq!(format!("{}", SourceFormat::Jpeg), "JPG");
        assert_eq!(format!("{}", SourceFormat::WebP), "WEBP");
    }
}
