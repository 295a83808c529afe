//! Document information dictionary: author attribution

use crate::document::{decode_text_string, resolve};
use crate::error::MaskError;
use lopdf::{Dictionary, Document, Object, StringFormat};
use std::collections::BTreeMap;
use tracing::warn;

/// PDF text string bytes: plain for printable ASCII, UTF-16BE with a byte
/// order mark otherwise.
pub fn encode_text_string(text: &str) -> Vec<u8> {
    if text.chars().all(|c| (' '..='~').contains(&c)) {
        return text.as_bytes().to_vec();
    }
    let mut bytes = vec![0xFE, 0xFF];
    for unit in text.encode_utf16() {
        bytes.extend_from_slice(&unit.to_be_bytes());
    }
    bytes
}

/// Overwrite `/Author` in the information dictionary, creating the
/// dictionary when the document has none (or only a dangling reference to
/// one). Every other entry is kept as is.
pub fn set_author(doc: &mut Document, author: &str) -> Result<(), MaskError> {
    let value = Object::String(encode_text_string(author), StringFormat::Literal);
    if let Some(id) = doc
        .trailer
        .get(b"Info")
        .ok()
        .and_then(|obj| obj.as_reference().ok())
    {
        if let Ok(info) = doc.get_object_mut(id).and_then(|obj| obj.as_dict_mut()) {
            info.set("Author", value);
            return Ok(());
        }
        warn!(info = ?id, "Information dictionary reference is dangling, writing a new one");
    }
    match doc.trailer.get(b"Info").ok().cloned() {
        Some(Object::Dictionary(mut info)) => {
            info.set("Author", value);
            doc.trailer.set("Info", Object::Dictionary(info));
        }
        _ => {
            let mut info = Dictionary::new();
            info.set("Author", value);
            let id = doc.add_object(info);
            doc.trailer.set("Info", Object::Reference(id));
        }
    }
    Ok(())
}

/// Information dictionary entries decoded as text; non-string values are
/// skipped.
pub fn read_info(doc: &Document) -> BTreeMap<String, String> {
    let Ok(info) = doc.trailer.get(b"Info") else {
        return BTreeMap::new();
    };
    let Ok(dict) = resolve(doc, info).as_dict() else {
        return BTreeMap::new();
    };
    dict.iter()
        .filter_map(|(key, value)| match resolve(doc, value) {
            Object::String(bytes, _) => Some((
                String::from_utf8_lossy(key).into_owned(),
                decode_text_string(bytes),
            )),
            _ => None,
        })
        .collect()
}
