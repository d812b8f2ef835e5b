//! Pure-Rust backend built on `lopdf`.
//!
//! Reads page geometry only; rasters are blank pages with a thin frame at the
//! correct pixel size. Good enough for headless runs and tests, and it never
//! needs a native library.

use crate::source::{
    check_range, Document, DocumentHandle, OpenError, PageError, PageSize, Raster, RasterSource,
    RgbaImage, TargetResolution,
};
use image::Rgba;
use lopdf::{Dictionary, Object, ObjectId};
use std::fs;
use std::path::Path;
use std::sync::Arc;

const PAPER: Rgba<u8> = Rgba([255, 255, 255, 255]);
const FRAME: Rgba<u8> = Rgba([220, 220, 220, 255]);

/// Depth limit when walking `/Parent` links for an inherited MediaBox.
const MAX_INHERITANCE_DEPTH: usize = 32;

#[derive(Debug, Default, Clone, Copy)]
pub struct LopdfSource;

impl LopdfSource {
    pub fn new() -> Self {
        Self
    }

    /// Open a document held in memory.
    pub fn open_bytes(&self, bytes: &[u8]) -> Result<LopdfDocument, OpenError> {
        LopdfDocument::parse(bytes)
    }
}

impl RasterSource for LopdfSource {
    fn open(&self, path: &Path) -> Result<DocumentHandle, OpenError> {
        let bytes = fs::read(path)?;
        let document = self.open_bytes(&bytes)?;
        tracing::debug!(path = %path.display(), pages = document.page_count(), "opened document");
        Ok(Arc::new(document))
    }
}

/// Page geometry extracted at open time; a page whose geometry is unusable
/// keeps the reason and fails when rasterized.
#[derive(Debug)]
pub struct LopdfDocument {
    pages: Vec<Result<PageSize, String>>,
}

impl LopdfDocument {
    fn parse(bytes: &[u8]) -> Result<Self, OpenError> {
        let mut doc =
            lopdf::Document::load_mem(bytes).map_err(|e| OpenError::Open(e.to_string()))?;
        // Owner-password-only documents open with the empty user password.
        if doc.is_encrypted() {
            if let Err(err) = doc.decrypt("") {
                tracing::debug!("empty user password rejected: {err}");
                return Err(OpenError::Locked);
            }
        }

        let pages: Vec<_> = doc
            .get_pages()
            .into_values()
            .map(|object_id| page_size(&doc, object_id))
            .collect();

        if pages.is_empty() {
            return Err(OpenError::Open("document has no pages".to_owned()));
        }

        Ok(Self { pages })
    }
}

fn page_size(doc: &lopdf::Document, object_id: ObjectId) -> Result<PageSize, String> {
    let dict = doc.get_dictionary(object_id).map_err(|e| e.to_string())?;
    let Some(media_box) = media_box(doc, dict) else {
        return Ok(PageSize::LETTER);
    };

    let [x0, y0, x1, y1] = media_box;
    let size = PageSize { width_pt: (x1 - x0).abs(), height_pt: (y1 - y0).abs() };
    if size.width_pt < 1.0 || size.height_pt < 1.0 {
        return Err(format!("degenerate MediaBox {media_box:?}"));
    }
    Ok(size)
}

/// MediaBox of a page, following `/Parent` for inherited values.
fn media_box<'a>(doc: &'a lopdf::Document, mut dict: &'a Dictionary) -> Option<[f32; 4]> {
    for _ in 0..MAX_INHERITANCE_DEPTH {
        let own = dict.get(b"MediaBox").and_then(|obj| doc.dereference(obj));
        if let Ok((_, Object::Array(array))) = own {
            if array.len() != 4 {
                return None;
            }
            let mut rect = [0.0; 4];
            for (value, obj) in rect.iter_mut().zip(array) {
                *value = doc.dereference(obj).and_then(|(_, obj)| obj.as_float()).ok()?;
            }
            return Some(rect);
        }
        let parent = dict.get(b"Parent").and_then(|obj| obj.as_reference()).ok()?;
        dict = doc.get_dictionary(parent).ok()?;
    }
    None
}

impl Document for LopdfDocument {
    fn page_count(&self) -> u32 {
        self.pages.len() as u32
    }

    fn page_size(&self, page: u32) -> Result<PageSize, PageError> {
        check_range(page, self.page_count())?;
        self.pages[page as usize]
            .clone()
            .map_err(|reason| PageError::Failed { page, reason })
    }

    fn rasterize(&self, page: u32, resolution: TargetResolution) -> Result<Raster, PageError> {
        let size = self.page_size(page)?;
        let (width, height) = resolution
            .bounded_pixel_size(size)
            .map_err(|reason| PageError::Failed { page, reason })?;

        let mut image = RgbaImage::from_pixel(width, height, PAPER);
        if width >= 4 && height >= 4 {
            for x in 0..width {
                image.put_pixel(x, 0, FRAME);
                image.put_pixel(x, height - 1, FRAME);
            }
            for y in 0..height {
                image.put_pixel(0, y, FRAME);
                image.put_pixel(width - 1, y, FRAME);
            }
        }

        Ok(Raster::from_image(image))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::{dictionary, StringFormat};

    fn build_doc(media_boxes: &[[f32; 4]]) -> lopdf::Document {
        let mut doc = lopdf::Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let kids: Vec<Object> = media_boxes
            .iter()
            .map(|b| {
                let page_id = doc.add_object(dictionary! {
                    "Type" => "Page",
                    "Parent" => pages_id,
                    "MediaBox" => b.iter().map(|v| Object::Real(*v)).collect::<Vec<_>>(),
                });
                Object::Reference(page_id)
            })
            .collect();
        let count = kids.len() as i64;
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);
        doc
    }

    fn save(mut doc: lopdf::Document) -> Vec<u8> {
        let mut bytes = Vec::new();
        doc.save_to(&mut bytes).expect("fixture should serialize");
        bytes
    }

    fn build_pdf(media_boxes: &[[f32; 4]]) -> Vec<u8> {
        save(build_doc(media_boxes))
    }

    fn first_page_id(doc: &lopdf::Document) -> ObjectId {
        *doc.get_pages().get(&1).expect("fixture has a first page")
    }

    #[test]
    fn test_open_reads_page_count_and_sizes() {
        let bytes = build_pdf(&[[0.0, 0.0, 612.0, 792.0], [0.0, 0.0, 144.0, 72.0]]);
        let doc = LopdfSource::new().open_bytes(&bytes).expect("open should succeed");

        assert_eq!(doc.page_count(), 2);
        assert_eq!(doc.page_size(1).unwrap(), PageSize { width_pt: 144.0, height_pt: 72.0 });
    }

    #[test]
    fn test_rasterize_uses_target_resolution() {
        let bytes = build_pdf(&[[0.0, 0.0, 144.0, 72.0]]);
        let doc = LopdfSource::new().open_bytes(&bytes).unwrap();

        let raster = doc.rasterize(0, TargetResolution::uniform(36.0)).unwrap();
        assert_eq!((raster.width, raster.height), (72, 36));
        assert!(raster.is_well_formed());
        // Corner is frame, centre is paper.
        assert_eq!(&raster.pixels[0..4], &FRAME.0);
        let centre = Raster::expected_len(72, 18) + 36 * 4;
        assert_eq!(&raster.pixels[centre..centre + 4], &PAPER.0);
    }

    #[test]
    fn test_degenerate_page_fails_without_failing_document() {
        let bytes = build_pdf(&[[0.0, 0.0, 100.0, 100.0], [0.0, 0.0, 0.0, 100.0]]);
        let doc = LopdfSource::new().open_bytes(&bytes).unwrap();

        assert!(doc.rasterize(0, TargetResolution::uniform(72.0)).is_ok());
        let err = doc.rasterize(1, TargetResolution::uniform(72.0)).unwrap_err();
        assert!(matches!(err, PageError::Failed { page: 1, .. }));
    }

    #[test]
    fn test_out_of_range_page() {
        let bytes = build_pdf(&[[0.0, 0.0, 100.0, 100.0]]);
        let doc = LopdfSource::new().open_bytes(&bytes).unwrap();

        let err = doc.rasterize(3, TargetResolution::default()).unwrap_err();
        assert_eq!(err, PageError::OutOfRange { page: 3, page_count: 1 });
    }

    #[test]
    fn test_encrypted_document_is_locked() {
        let mut doc = build_doc(&[[0.0, 0.0, 100.0, 100.0]]);
        let encrypt_id = doc.add_object(dictionary! {
            "Filter" => "Standard",
            "V" => 1,
            "R" => 2,
            "O" => Object::String(vec![0x11; 32], StringFormat::Hexadecimal),
            "U" => Object::String(vec![0xAA; 32], StringFormat::Hexadecimal),
            "P" => -4,
        });
        doc.trailer.set("Encrypt", encrypt_id);
        let file_id = Object::String(vec![0x42; 16], StringFormat::Hexadecimal);
        doc.trailer.set("ID", vec![file_id.clone(), file_id]);

        let err = LopdfSource::new().open_bytes(&save(doc)).unwrap_err();
        assert!(err.is_locked());
    }

    #[test]
    fn test_encrypt_token_in_content_is_not_locked() {
        let mut doc = build_doc(&[[0.0, 0.0, 100.0, 100.0]]);
        let content = lopdf::Stream::new(dictionary! {}, b"% /Encrypt 9 0 R\n".to_vec());
        let content_id = doc.add_object(content);
        let page_id = first_page_id(&doc);
        doc.get_dictionary_mut(page_id).unwrap().set("Contents", content_id);

        let opened = LopdfSource::new().open_bytes(&save(doc)).expect("plain document opens");
        assert_eq!(opened.page_count(), 1);
    }

    #[test]
    fn test_indirect_media_box_is_followed() {
        let mut doc = build_doc(&[[0.0, 0.0, 100.0, 100.0]]);
        let width_id = doc.add_object(Object::Integer(300));
        let rect_id = doc.add_object(Object::Array(vec![
            0.into(),
            0.into(),
            Object::Reference(width_id),
            200.into(),
        ]));
        let page_id = first_page_id(&doc);
        doc.get_dictionary_mut(page_id).unwrap().set("MediaBox", rect_id);

        let opened = LopdfSource::new().open_bytes(&save(doc)).unwrap();
        assert_eq!(opened.page_size(0).unwrap(), PageSize { width_pt: 300.0, height_pt: 200.0 });
    }

    #[test]
    fn test_inherited_media_box() {
        let mut doc = build_doc(&[[0.0, 0.0, 100.0, 100.0]]);
        let page_id = first_page_id(&doc);
        let parent = doc
            .get_dictionary(page_id)
            .and_then(|page| page.get(b"Parent"))
            .and_then(Object::as_reference)
            .unwrap();
        doc.get_dictionary_mut(page_id).unwrap().remove(b"MediaBox");
        doc.get_dictionary_mut(parent)
            .unwrap()
            .set("MediaBox", vec![Object::from(0), 0.into(), 50.into(), 80.into()]);

        let opened = LopdfSource::new().open_bytes(&save(doc)).unwrap();
        assert_eq!(opened.page_size(0).unwrap(), PageSize { width_pt: 50.0, height_pt: 80.0 });
    }

    #[test]
    fn test_oversized_page_fails_alone() {
        let bytes = build_pdf(&[[0.0, 0.0, 14_400.0, 14_400.0], [0.0, 0.0, 72.0, 72.0]]);
        let doc = LopdfSource::new().open_bytes(&bytes).unwrap();

        let err = doc.rasterize(0, TargetResolution::default()).unwrap_err();
        assert!(matches!(err, PageError::Failed { page: 0, .. }));
        assert!(doc.rasterize(1, TargetResolution::default()).is_ok());
    }

    #[test]
    fn test_garbage_is_open_error() {
        let err = LopdfSource::new().open_bytes(b"not a pdf at all").unwrap_err();
        assert!(matches!(err, OpenError::Open(_)));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = LopdfSource::new().open(&dir.path().join("missing.pdf")).err().unwrap();
        assert!(matches!(err, OpenError::Io(_)));
    }

    #[test]
    fn test_open_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.pdf");
        fs::write(&path, build_pdf(&[[0.0, 0.0, 72.0, 72.0]; 3])).unwrap();

        let handle = LopdfSource::new().open(&path).unwrap();
        assert_eq!(handle.page_count(), 3);
    }
}
