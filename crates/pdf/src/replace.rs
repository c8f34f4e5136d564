//! Whole-page raster replacement.
//!
//! Scanned pages cannot be scrubbed in the content stream, so the redacted
//! raster replaces the original page: a JPEG image XObject scaled to the
//! media box, with a fresh content stream drawing only that image. The
//! original image data is no longer referenced and disappears on save.

use crate::content::get_media_box;
use crate::{PdfError, Result};
use lopdf::{Dictionary, Document, Object, Stream};
use std::path::Path;

/// Replaces the visible content of `page_id` with a full-bleed JPEG.
pub fn replace_page_with_jpeg(
    doc: &mut Document,
    page_id: lopdf::ObjectId,
    jpeg_bytes: Vec<u8>,
    pixel_width: u32,
    pixel_height: u32,
) -> Result<()> {
    let (llx, lly, urx, ury) = get_media_box(doc, page_id);
    let page_width = urx - llx;
    let page_height = ury - lly;

    let mut image_dict = Dictionary::new();
    image_dict.set("Type", Object::Name(b"XObject".to_vec()));
    image_dict.set("Subtype", Object::Name(b"Image".to_vec()));
    image_dict.set("Width", Object::Integer(pixel_width as i64));
    image_dict.set("Height", Object::Integer(pixel_height as i64));
    image_dict.set("ColorSpace", Object::Name(b"DeviceRGB".to_vec()));
    image_dict.set("BitsPerComponent", Object::Integer(8));
    image_dict.set("Filter", Object::Name(b"DCTDecode".to_vec()));

    let mut image_stream = Stream::new(image_dict, jpeg_bytes);
    // DCTDecode data is already compressed.
    image_stream.allows_compression = false;
    let image_id = doc.add_object(image_stream);

    // Unit image space scaled to the page, anchored at the media box origin.
    let content = format!(
        "q\n{} 0 0 {} {} {} cm\n/ImRedacted Do\nQ\n",
        page_width, page_height, llx, lly
    );
    let content_id = doc.add_object(Stream::new(Dictionary::new(), content.into_bytes()));

    let mut xobjects = Dictionary::new();
    xobjects.set("ImRedacted", Object::Reference(image_id));
    let mut resources = Dictionary::new();
    resources.set("XObject", Object::Dictionary(xobjects));

    match doc.get_object_mut(page_id) {
        Ok(Object::Dictionary(dict)) => {
            dict.set("Contents", Object::Reference(content_id));
            dict.set("Resources", Object::Dictionary(resources));
            // Stale annotations could still leak the original appearance.
            dict.remove(b"Annots");
            Ok(())
        }
        _ => Err(PdfError::Load(format!(
            "page object {:?} is not a dictionary",
            page_id
        ))),
    }
}

/// Compacts and writes the document.
pub fn save_document(doc: &mut Document, output_path: &Path) -> Result<()> {
    doc.compress();
    let mut file = std::fs::File::create(output_path)
        .map_err(|e| PdfError::Save(format!("{}: {}", output_path.display(), e)))?;
    doc.save_to(&mut file)
        .map_err(|e| PdfError::Save(e.to_string()))?;
    Ok(())
}
