//! Page-document builder: one full-page image per page at a fixed page size.

use std::io::Write;
use std::path::Path;

use flate2::write::ZlibEncoder;
use flate2::Compression;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream};
use tracing::debug;

use crate::detect::{jpeg_components, sniff, SourceFormat};
use crate::encode::flatten_onto_white;
use crate::error::PersistError;
use crate::geometry::PageGeometry;

/// Anything that can lay out a sequence of full-page images and persist the
/// result. [`crate::pipeline::convert_directory`] only talks to this trait.
pub trait PageDocumentBuilder {
    /// Fix the page size for every page that follows.
    fn start(&mut self, geometry: &PageGeometry);

    /// Append one page showing the image at `image_path`, centred and scaled
    /// to cover the page on its limiting axis.
    fn add_full_page_image(&mut self, image_path: &Path) -> Result<(), PersistError>;

    /// Write the finished document to `output_path`.
    fn save(&mut self, output_path: &Path) -> Result<(), PersistError>;
}

/// An image XObject ready to be placed on a page.
struct EmbeddedImage {
    stream: Stream,
    width: u32,
    height: u32,
}

/// [`PageDocumentBuilder`] backed by `lopdf`.
///
/// JPEG files are embedded verbatim (`DCTDecode`), so re-encoded pages cost
/// exactly their scratch file size. Other formats are decoded, flattened onto
/// white and stored as zlib-compressed RGB (`FlateDecode`).
pub struct LopdfBuilder {
    doc: Document,
    pages_id: ObjectId,
    page_ids: Vec<ObjectId>,
    geometry: Option<PageGeometry>,
    title: Option<String>,
}

impl LopdfBuilder {
    pub fn new() -> Self {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        Self {
            doc,
            pages_id,
            page_ids: Vec::new(),
            geometry: None,
            title: None,
        }
    }

    /// Set a title for the PDF /Info dictionary.
    pub fn set_title(&mut self, title: impl Into<String>) {
        self.title = Some(title.into());
    }

    fn embed(&self, image_path: &Path) -> Result<EmbeddedImage, PersistError> {
        let data = std::fs::read(image_path)?;
        if sniff(&data) == Some(SourceFormat::Jpeg) {
            if let Some(embedded) = jpeg_xobject(image_path, &data)? {
                return Ok(embedded);
            }
        }
        flate_xobject(image_path, &data)
    }
}

impl Default for LopdfBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Embed JPEG bytes as-is. Returns `None` for component layouts (CMYK, YCCK)
/// that need a decode pass instead.
fn jpeg_xobject(path: &Path, data: &[u8]) -> Result<Option<EmbeddedImage>, PersistError> {
    let color_space = match jpeg_components(data) {
        Some(1) => "DeviceGray",
        Some(3) => "DeviceRGB",
        _ => return Ok(None),
    };
    let (width, height) = image::ImageReader::new(std::io::Cursor::new(data))
        .with_guessed_format()?
        .into_dimensions()
        .map_err(|e| PersistError::Embed {
            path: path.to_path_buf(),
            detail: e.to_string(),
        })?;

    let dict = dictionary! {
        "Type" => "XObject",
        "Subtype" => "Image",
        "Width" => width as i64,
        "Height" => height as i64,
        "ColorSpace" => color_space,
        "BitsPerComponent" => 8,
        "Filter" => "DCTDecode",
    };
    Ok(Some(EmbeddedImage {
        stream: Stream::new(dict, data.to_vec()),
        width,
        height,
    }))
}

fn flate_xobject(path: &Path, data: &[u8]) -> Result<EmbeddedImage, PersistError> {
    let embed_err = |detail: String| PersistError::Embed {
        path: path.to_path_buf(),
        detail,
    };
    let decoded = image::load_from_memory(data).map_err(|e| embed_err(e.to_string()))?;
    let rgb = flatten_onto_white(&decoded);
    drop(decoded);
    let (width, height) = rgb.dimensions();

    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(rgb.as_raw())?;
    let compressed = encoder.finish()?;

    let dict = dictionary! {
        "Type" => "XObject",
        "Subtype" => "Image",
        "Width" => width as i64,
        "Height" => height as i64,
        "ColorSpace" => "DeviceRGB",
        "BitsPerComponent" => 8,
        "Filter" => "FlateDecode",
    };
    Ok(EmbeddedImage {
        stream: Stream::new(dict, compressed),
        width,
        height,
    })
}

impl PageDocumentBuilder for LopdfBuilder {
    fn start(&mut self, geometry: &PageGeometry) {
        self.geometry = Some(*geometry);
    }

    fn add_full_page_image(&mut self, image_path: &Path) -> Result<(), PersistError> {
        let geometry = self.geometry.ok_or(PersistError::NotStarted)?;
        let embedded = self.embed(image_path)?;
        let placement = geometry.fit_image(embedded.width, embedded.height);
        let image_id = self.doc.add_object(embedded.stream);

        let content = Content {
            operations: vec![
                Operation::new("q", vec![]),
                Operation::new(
                    "cm",
                    vec![
                        (placement.width as f32).into(),
                        0.into(),
                        0.into(),
                        (placement.height as f32).into(),
                        (placement.x as f32).into(),
                        (placement.y as f32).into(),
                    ],
                ),
                Operation::new("Do", vec![Object::Name(b"Im0".to_vec())]),
                Operation::new("Q", vec![]),
            ],
        };
        let encoded = content.encode().map_err(|e| PersistError::Embed {
            path: image_path.to_path_buf(),
            detail: e.to_string(),
        })?;
        let content_id = self.doc.add_object(Stream::new(dictionary! {}, encoded));

        let page_id = self.doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => self.pages_id,
            "MediaBox" => vec![
                0.into(),
                0.into(),
                (geometry.width_pt as f32).into(),
                (geometry.height_pt as f32).into(),
            ],
            "Contents" => content_id,
            "Resources" => dictionary! {
                "XObject" => dictionary! {
                    "Im0" => image_id,
                },
            },
        });
        self.page_ids.push(page_id);
        debug!(
            page = self.page_ids.len(),
            width = embedded.width,
            height = embedded.height,
            "Added page for {}",
            image_path.display()
        );
        Ok(())
    }

    fn save(&mut self, output_path: &Path) -> Result<(), PersistError> {
        let kids: Vec<Object> = self.page_ids.iter().map(|id| Object::Reference(*id)).collect();
        let pages = dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => self.page_ids.len() as i64,
        };
        self.doc.objects.insert(self.pages_id, Object::Dictionary(pages));

        let catalog_id = self.doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => self.pages_id,
        });
        self.doc.trailer.set("Root", catalog_id);

        let mut info = Dictionary::new();
        info.set("Producer", Object::string_literal("images-to-pdf"));
        if let Some(title) = &self.title {
            info.set("Title", Object::string_literal(title.as_str()));
        }
        let info_id = self.doc.add_object(info);
        self.doc.trailer.set("Info", info_id);

        self.doc.save(output_path).map_err(|e| PersistError::Save {
            path: output_path.to_path_buf(),
            detail: e.to_string(),
        })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage, Rgba, RgbaImage};

    fn geometry() -> PageGeometry {
        PageGeometry::from_dimensions(&[(400, 300)], 200.0).unwrap()
    }

    #[test]
    fn add_before_start_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.png");
        RgbImage::from_pixel(4, 4, Rgb([1, 2, 3])).save(&path).unwrap();
        let mut builder = LopdfBuilder::new();
        let err = builder.add_full_page_image(&path).unwrap_err();
        assert!(matches!(err, PersistError::NotStarted));
    }

    #[test]
    fn builds_loadable_pdf_with_one_page_per_image() {
        let dir = tempfile::tempdir().unwrap();
        let jpg = dir.path().join("a.jpg");
        let png = dir.path().join("b.png");
        RgbImage::from_pixel(40, 30, Rgb([200, 10, 10])).save(&jpg).unwrap();
        RgbaImage::from_pixel(30, 40, Rgba([0, 0, 0, 0])).save(&png).unwrap();

        let mut builder = LopdfBuilder::new();
        builder.set_title("Test");
        builder.start(&geometry());
        builder.add_full_page_image(&jpg).unwrap();
        builder.add_full_page_image(&png).unwrap();

        let out = dir.path().join("out.pdf");
        builder.save(&out).unwrap();
        let bytes = std::fs::read(&out).unwrap();
        assert!(bytes.starts_with(b"%PDF-1.5"));

        let loaded = Document::load(&out).unwrap();
        assert_eq!(loaded.get_pages().len(), 2);
    }

    #[test]
    fn jpeg_is_embedded_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        let jpg = dir.path().join("a.jpg");
        RgbImage::from_pixel(8, 8, Rgb([9, 9, 9])).save(&jpg).unwrap();
        let data = std::fs::read(&jpg).unwrap();
        let embedded = jpeg_xobject(&jpg, &data).unwrap().unwrap();
        assert_eq!(embedded.stream.content, data);
        assert_eq!((embedded.width, embedded.height), (8, 8));
    }

    #[test]
    fn undecodable_file_is_embed_error() {
        let dir = tempfile::tempdir().unwrap();
        let bad = dir.path().join("bad.png");
        std::fs::write(&bad, b"definitely not an image").unwrap();
        let mut builder = LopdfBuilder::new();
        builder.start(&geometry());
        let err = builder.add_full_page_image(&bad).unwrap_err();
        assert!(matches!(err, PersistError::Embed { .. }));
    }

    #[test]
    fn save_into_missing_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        let mut builder = LopdfBuilder::new();
        builder.start(&geometry());
        let err = builder.save(&dir.path().join("missing/out.pdf")).unwrap_err();
        assert!(matches!(err, PersistError::Save { .. }));
    }
}
