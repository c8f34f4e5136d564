//! lopdf page inspection helpers.

use crate::{PdfError, Result};
use lopdf::{content::Content, Document, Object, Stream};

/// How a page carries its visible content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageKind {
    /// Has a native text layer; can be scrubbed in place.
    NativeText,
    /// Image-only (scanned); must be rasterized to redact.
    Scanned,
    Empty,
}

pub(crate) fn get_number(obj: &Object) -> Option<f32> {
    match obj {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(r) => Some(*r),
        _ => None,
    }
}

fn extract_box_values(arr: &[Object]) -> Option<(f32, f32, f32, f32)> {
    let values: Vec<f32> = arr.iter().filter_map(get_number).collect();
    if values.len() == 4 {
        Some((values[0], values[1], values[2], values[3]))
    } else {
        None
    }
}

/// Effective page bounds: CropBox if present, else MediaBox, else inherited
/// from the parent, else Letter.
pub fn get_media_box(doc: &Document, page_id: lopdf::ObjectId) -> (f32, f32, f32, f32) {
    let raw_box = if let Ok(Object::Dictionary(dict)) = doc.get_object(page_id) {
        if let Ok(Object::Array(arr)) = dict.get(b"CropBox") {
            extract_box_values(arr)
        } else if let Ok(Object::Array(arr)) = dict.get(b"MediaBox") {
            extract_box_values(arr)
        } else if let Ok(Object::Reference(parent_ref)) = dict.get(b"Parent") {
            match doc.get_object(*parent_ref) {
                Ok(Object::Dictionary(parent_dict)) => match parent_dict.get(b"MediaBox") {
                    Ok(Object::Array(arr)) => extract_box_values(arr),
                    _ => None,
                },
                _ => None,
            }
        } else {
            None
        }
    } else {
        None
    };

    raw_box.unwrap_or_else(|| {
        log::warn!("[Pdf] page {:?} has no media box, assuming Letter", page_id);
        (0.0, 0.0, 612.0, 792.0)
    })
}

fn get_stream_content(stream: &Stream) -> Vec<u8> {
    stream
        .decompressed_content()
        .unwrap_or_else(|_| stream.content.clone())
}

/// Concatenated content stream bytes for a page.
pub fn get_page_content(doc: &Document, page_id: lopdf::ObjectId) -> Result<Vec<u8>> {
    let page = doc.get_object(page_id)?;

    if let Object::Dictionary(dict) = page {
        if let Ok(contents) = dict.get(b"Contents") {
            match contents {
                Object::Reference(ref_id) => {
                    if let Ok(Object::Stream(stream)) = doc.get_object(*ref_id) {
                        return Ok(get_stream_content(stream));
                    }
                }
                Object::Array(arr) => {
                    let mut all_content = Vec::new();
                    for item in arr {
                        if let Object::Reference(ref_id) = item {
                            if let Ok(Object::Stream(stream)) = doc.get_object(*ref_id) {
                                all_content.extend(get_stream_content(stream));
                                all_content.push(b'\n');
                            }
                        }
                    }
                    return Ok(all_content);
                }
                Object::Stream(stream) => {
                    return Ok(get_stream_content(stream));
                }
                _ => {}
            }
        }
    }

    Err(PdfError::Load("page has no content stream".to_string()))
}

/// Swaps in a new content stream for the page.
pub fn set_page_content(
    doc: &mut Document,
    page_id: lopdf::ObjectId,
    data: Vec<u8>,
) -> Result<()> {
    let stream_id = doc.add_object(Stream::new(lopdf::Dictionary::new(), data));
    match doc.get_object_mut(page_id) {
        Ok(Object::Dictionary(dict)) => {
            dict.set("Contents", Object::Reference(stream_id));
            Ok(())
        }
        _ => Err(PdfError::Load(format!(
            "page object {:?} is not a dictionary",
            page_id
        ))),
    }
}

/// Classifies a page by its content operators: text-show operators mean a
/// native text layer, an image XObject draw with no text means a scan.
pub fn detect_page_kind(content_data: &[u8]) -> PageKind {
    let content = match Content::decode(content_data) {
        Ok(c) => c,
        Err(_) => return PageKind::Empty,
    };

    let mut has_text_ops = false;
    let mut has_image_ops = false;

    for op in &content.operations {
        match op.operator.as_str() {
            "Tj" | "TJ" | "'" | "\"" => has_text_ops = true,
            "Do" => has_image_ops = true,
            _ => {}
        }
    }

    if has_text_ops {
        PageKind::NativeText
    } else if has_image_ops {
        PageKind::Scanned
    } else {
        PageKind::Empty
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::content::Operation;

    fn encode(ops: Vec<Operation>) -> Vec<u8> {
        Content { operations: ops }.encode().unwrap()
    }

    #[test]
    fn text_operators_mean_native_text() {
        let data = encode(vec![
            Operation::new("BT", vec![]),
            Operation::new(
                "Tj",
                vec![Object::String(b"hello".to_vec(), lopdf::StringFormat::Literal)],
            ),
            Operation::new("ET", vec![]),
        ]);
        assert_eq!(detect_page_kind(&data), PageKind::NativeText);
    }

    #[test]
    fn image_only_page_is_scanned() {
        let data = encode(vec![Operation::new(
            "Do",
            vec![Object::Name(b"Im0".to_vec())],
        )]);
        assert_eq!(detect_page_kind(&data), PageKind::Scanned);
    }

    #[test]
    fn empty_stream_is_empty() {
        assert_eq!(detect_page_kind(&encode(vec![])), PageKind::Empty);
    }

    #[test]
    fn missing_media_box_defaults_to_letter() {
        let mut doc = Document::with_version("1.5");
        let page_id = doc.add_object(lopdf::Dictionary::new());
        assert_eq!(get_media_box(&doc, page_id), (0.0, 0.0, 612.0, 792.0));
    }

    #[test]
    fn media_box_is_read_from_page_dict() {
        let mut doc = Document::with_version("1.5");
        let mut dict = lopdf::Dictionary::new();
        dict.set(
            b"MediaBox".to_vec(),
            Object::Array(vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Integer(595),
                Object::Integer(842),
            ]),
        );
        let page_id = doc.add_object(dict);
        assert_eq!(get_media_box(&doc, page_id), (0.0, 0.0, 595.0, 842.0));
    }
}
