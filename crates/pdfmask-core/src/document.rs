//! Loading source documents and reading page-level structures with lopdf

use crate::error::MaskError;
use crate::geometry::Rect;
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use std::collections::HashMap;

const MAX_REFERENCE_DEPTH: usize = 16;
static NULL: Object = Object::Null;
const US_LETTER: Rect = Rect {
    x0: 0.0,
    y0: 0.0,
    x1: 612.0,
    y1: 792.0,
};

/// Parse and validate a source document.
///
/// Malformed bytes, encrypted files and documents without pages are all
/// rejected as `SourceInvalid`.
pub fn load(bytes: &[u8]) -> Result<Document, MaskError> {
    let doc = Document::load_mem(bytes).map_err(|e| MaskError::SourceInvalid(e.to_string()))?;
    if doc.trailer.get(b"Encrypt").is_ok() {
        return Err(MaskError::SourceInvalid(
            "encrypted documents are not supported".to_string(),
        ));
    }
    if doc.get_pages().is_empty() {
        return Err(MaskError::SourceInvalid("document has no pages".to_string()));
    }
    Ok(doc)
}

/// Follow indirect references until a direct object is reached.
pub fn resolve<'a>(doc: &'a Document, mut obj: &'a Object) -> &'a Object {
    for _ in 0..MAX_REFERENCE_DEPTH {
        match obj {
            Object::Reference(id) => match doc.get_object(*id) {
                Ok(target) => obj = target,
                Err(_) => return &NULL,
            },
            _ => return obj,
        }
    }
    &NULL
}

pub fn resolve_dict<'a>(doc: &'a Document, obj: &'a Object) -> Option<&'a Dictionary> {
    match resolve(doc, obj) {
        Object::Dictionary(dict) => Some(dict),
        Object::Stream(stream) => Some(&stream.dict),
        _ => None,
    }
}

pub fn dict_get<'a>(doc: &'a Document, dict: &'a Dictionary, key: &[u8]) -> Option<&'a Object> {
    dict.get(key).ok().map(|obj| resolve(doc, obj))
}

/// Integer or real operand as f32.
pub fn number(obj: &Object) -> Option<f32> {
    match obj {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(f) => Some(*f),
        _ => None,
    }
}

pub fn name(obj: &Object) -> Option<String> {
    match obj {
        Object::Name(bytes) => Some(String::from_utf8_lossy(bytes).into_owned()),
        _ => None,
    }
}

/// Look up a page attribute, walking `/Parent` links for inherited keys.
pub fn inherited<'a>(doc: &'a Document, page_id: ObjectId, key: &[u8]) -> Option<&'a Object> {
    let mut current = page_id;
    for _ in 0..MAX_REFERENCE_DEPTH {
        let dict = doc.get_object(current).ok()?.as_dict().ok()?;
        if let Ok(value) = dict.get(key) {
            return Some(resolve(doc, value));
        }
        current = dict.get(b"Parent").ok()?.as_reference().ok()?;
    }
    None
}

/// The page's MediaBox in PDF user space, defaulting to US Letter.
pub fn media_box(doc: &Document, page_id: ObjectId) -> Rect {
    let Some(Object::Array(values)) = inherited(doc, page_id, b"MediaBox") else {
        return US_LETTER;
    };
    let coords: Vec<f32> = values
        .iter()
        .filter_map(|v| number(resolve(doc, v)))
        .collect();
    match coords.as_slice() {
        [x0, y0, x1, y1] => {
            let rect = Rect::new(*x0, *y0, *x1, *y1);
            if rect.is_empty() {
                US_LETTER
            } else {
                rect
            }
        }
        _ => US_LETTER,
    }
}

pub fn page_resources(doc: &Document, page_id: ObjectId) -> Option<&Dictionary> {
    inherited(doc, page_id, b"Resources").and_then(|obj| resolve_dict(doc, obj))
}

/// Font resources of a page as `(resource name, font dictionary)`.
pub fn page_fonts(doc: &Document, page_id: ObjectId) -> Vec<(String, &Dictionary)> {
    match page_resources(doc, page_id) {
        Some(resources) => resource_fonts(doc, resources),
        None => Vec::new(),
    }
}

/// Entries of the `/Font` subdictionary of `resources`.
pub fn resource_fonts<'a>(
    doc: &'a Document,
    resources: &'a Dictionary,
) -> Vec<(String, &'a Dictionary)> {
    let Some(fonts) = dict_get(doc, resources, b"Font").and_then(|f| resolve_dict(doc, f)) else {
        return Vec::new();
    };
    fonts
        .iter()
        .filter_map(|(key, value)| {
            resolve_dict(doc, value).map(|dict| (String::from_utf8_lossy(key).into_owned(), dict))
        })
        .collect()
}

/// Form XObjects of `resources`, by resource name.
pub fn xobject_forms(doc: &Document, resources: &Dictionary) -> HashMap<String, ObjectId> {
    let Some(xobjects) = dict_get(doc, resources, b"XObject").and_then(|x| resolve_dict(doc, x))
    else {
        return HashMap::new();
    };
    xobjects
        .iter()
        .filter_map(|(key, value)| {
            let id = value.as_reference().ok()?;
            let Ok(Object::Stream(stream)) = doc.get_object(id) else {
                return None;
            };
            let subtype = dict_get(doc, &stream.dict, b"Subtype").and_then(name)?;
            (subtype == "Form").then(|| (String::from_utf8_lossy(key).into_owned(), id))
        })
        .collect()
}

/// Stream payload, decompressed when a filter is present.
pub fn stream_bytes(stream: &Stream) -> Result<Vec<u8>, MaskError> {
    if stream.dict.get(b"Filter").is_ok() {
        stream
            .decompressed_content()
            .map_err(|e| MaskError::SourceInvalid(format!("failed to decompress stream: {e}")))
    } else {
        Ok(stream.content.clone())
    }
}

/// Concatenated content stream bytes of a page.
pub fn page_content(doc: &Document, page_id: ObjectId) -> Result<Vec<u8>, MaskError> {
    let page = doc
        .get_object(page_id)
        .and_then(|o| o.as_dict())
        .map_err(|e| MaskError::SourceInvalid(format!("page {page_id:?}: {e}")))?;
    let Ok(contents) = page.get(b"Contents") else {
        return Ok(Vec::new());
    };
    let streams: Vec<&Object> = match resolve(doc, contents) {
        Object::Array(items) => items.iter().map(|item| resolve(doc, item)).collect(),
        other => vec![other],
    };
    let mut content = Vec::new();
    for obj in streams {
        let Object::Stream(stream) = obj else {
            continue;
        };
        if !content.is_empty() {
            content.push(b'\n');
        }
        content.extend_from_slice(&stream_bytes(stream)?);
    }
    Ok(content)
}

/// Decode a text string object (UTF-16BE with BOM, UTF-8 or Latin-1).
pub fn decode_text_string(bytes: &[u8]) -> String {
    if bytes.len() >= 2 && bytes[0] == 0xFE && bytes[1] == 0xFF {
        let units: Vec<u16> = bytes[2..]
            .chunks(2)
            .filter(|c| c.len() == 2)
            .map(|c| u16::from_be_bytes([c[0], c[1]]))
            .collect();
        return String::from_utf16_lossy(&units);
    }
    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => bytes.iter().map(|&b| b as char).collect(),
    }
}

/// Strip a `ABCDEF+` subset tag from a font name.
pub fn strip_subset_prefix(name: &str) -> &str {
    match name.split_once('+') {
        Some((tag, rest)) if tag.len() == 6 && tag.chars().all(|c| c.is_ascii_uppercase()) => rest,
        _ => name,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::dictionary;

    fn doc_with_inherited_box() -> (Document, ObjectId) {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
        });
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![Object::from(page_id)],
                "Count" => 1i64,
                "MediaBox" => vec![0.into(), 0.into(), 595.into(), Object::Real(842.0)],
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);
        (doc, page_id)
    }

    #[test]
    fn test_media_box_is_inherited() {
        let (doc, page_id) = doc_with_inherited_box();
        assert_eq!(media_box(&doc, page_id), Rect::new(0.0, 0.0, 595.0, 842.0));
    }

    #[test]
    fn test_page_without_contents_is_empty() {
        let (doc, page_id) = doc_with_inherited_box();
        assert!(page_content(&doc, page_id).unwrap().is_empty());
    }

    #[test]
    fn test_load_rejects_garbage() {
        let err = load(b"not a pdf").unwrap_err();
        assert!(err.is_source_error());
    }

    #[test]
    fn test_load_rejects_zero_pages() {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.add_object(dictionary! {
            "Type" => "Pages",
            "Kids" => Vec::<Object>::new(),
            "Count" => 0i64,
        });
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);
        let mut bytes = Vec::new();
        doc.save_to(&mut bytes).unwrap();
        assert!(matches!(load(&bytes), Err(MaskError::SourceInvalid(_))));
    }

    #[test]
    fn test_strip_subset_prefix() {
        assert_eq!(strip_subset_prefix("ABCDEF+Arial-BoldMT"), "Arial-BoldMT");
        assert_eq!(strip_subset_prefix("Helvetica"), "Helvetica");
        assert_eq!(strip_subset_prefix("abc+Foo"), "abc+Foo");
    }

    #[test]
    fn test_decode_text_string() {
        assert_eq!(decode_text_string(&[0xFE, 0xFF, 0x00, 0x41]), "A");
        assert_eq!(decode_text_string(b"plain"), "plain");
        assert_eq!(decode_text_string(&[0xE9]), "é");
    }
}
