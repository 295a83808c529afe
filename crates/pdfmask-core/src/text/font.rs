//! Page font model: decoding shown strings into Unicode with advances

use super::cmap::ToUnicodeMap;
use super::encoding::{glyph_name_to_char, BaseEncoding};
use super::standard::StandardFace;
use crate::document::{dict_get, name, number, resolve, resolve_dict, stream_bytes, strip_subset_prefix};
use lopdf::{Dictionary, Document, Object};
use std::collections::HashMap;

/// One code decoded from a string operand.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedGlyph {
    pub code: u32,
    /// Number of bytes the code occupied in the operand.
    pub byte_len: usize,
    pub text: String,
    /// Advance in 1/1000 text space units.
    pub width: f32,
}

#[derive(Debug, Clone)]
enum Layout {
    /// Single-byte codes mapped through a 256-entry encoding.
    Simple {
        encoding: Box<[Option<char>; 256]>,
        first_char: u32,
        widths: Vec<f32>,
        missing_width: Option<f32>,
    },
    /// Type0 font with multi-byte codes.
    Composite {
        widths: HashMap<u32, f32>,
        default_width: f32,
    },
}

/// A font resource of a page, ready to decode strings shown with it.
#[derive(Debug, Clone)]
pub struct FontInfo {
    /// Resource name under `/Font`, e.g. `F1`.
    pub resource_name: String,
    /// `/BaseFont` without the subset tag.
    pub family: String,
    /// The BaseFont carried a subset tag (`ABCDEF+`), so the embedded
    /// program may only hold the glyphs the document uses.
    pub is_subset: bool,
    pub standard: Option<StandardFace>,
    pub ascent: f32,
    pub descent: f32,
    to_unicode: Option<ToUnicodeMap>,
    layout: Layout,
}

impl FontInfo {
    pub fn from_dict(doc: &Document, resource_name: &str, dict: &Dictionary) -> Self {
        let base_font = dict_get(doc, dict, b"BaseFont")
            .and_then(name)
            .unwrap_or_else(|| "Helvetica".to_string());
        let family = strip_subset_prefix(&base_font).to_string();
        let is_subset = family.len() != base_font.len();
        let standard = StandardFace::from_name(&family);
        let subtype = dict_get(doc, dict, b"Subtype").and_then(name).unwrap_or_default();

        let to_unicode = dict_get(doc, dict, b"ToUnicode").and_then(|obj| match obj {
            Object::Stream(stream) => stream_bytes(stream).ok().map(|b| ToUnicodeMap::parse(&b)),
            _ => None,
        });

        let (layout, descriptor) = if subtype == "Type0" {
            let descendant = dict_get(doc, dict, b"DescendantFonts").and_then(|obj| match obj {
                Object::Array(items) => items.first().and_then(|d| resolve_dict(doc, d)),
                _ => None,
            });
            let layout = composite_layout(doc, descendant);
            let descriptor = descendant
                .and_then(|d| dict_get(doc, d, b"FontDescriptor"))
                .and_then(|d| resolve_dict(doc, d));
            (layout, descriptor)
        } else {
            let descriptor =
                dict_get(doc, dict, b"FontDescriptor").and_then(|d| resolve_dict(doc, d));
            (simple_layout(doc, dict, descriptor), descriptor)
        };

        let (default_ascent, default_descent) = standard
            .map(|face| face.ascent_descent())
            .unwrap_or((718.0, -207.0));
        let ascent = descriptor
            .and_then(|d| dict_get(doc, d, b"Ascent"))
            .and_then(number)
            .filter(|a| *a > 0.0)
            .unwrap_or(default_ascent);
        let descent = descriptor
            .and_then(|d| dict_get(doc, d, b"Descent"))
            .and_then(number)
            .filter(|d| *d < 0.0)
            .unwrap_or(default_descent);

        Self {
            resource_name: resource_name.to_string(),
            family,
            is_subset,
            standard,
            ascent,
            descent,
            to_unicode: to_unicode.filter(|m| !m.is_empty()),
            layout,
        }
    }

    pub fn is_composite(&self) -> bool {
        matches!(self.layout, Layout::Composite { .. })
    }

    /// Split a string operand into glyphs.
    pub fn decode(&self, bytes: &[u8]) -> Vec<DecodedGlyph> {
        let codes: Vec<(u32, usize)> = match (&self.layout, &self.to_unicode) {
            (Layout::Composite { .. }, Some(map)) => map.split_codes(bytes, 2),
            (Layout::Composite { .. }, None) => bytes
                .chunks(2)
                .map(|c| {
                    let code = c.iter().fold(0u32, |acc, b| (acc << 8) | *b as u32);
                    (code, c.len())
                })
                .collect(),
            (Layout::Simple { .. }, _) => bytes.iter().map(|b| (*b as u32, 1)).collect(),
        };

        codes
            .into_iter()
            .map(|(code, byte_len)| DecodedGlyph {
                code,
                byte_len,
                text: self.code_text(code),
                width: self.code_width(code),
            })
            .collect()
    }

    fn code_text(&self, code: u32) -> String {
        if let Some(text) = self.to_unicode.as_ref().and_then(|m| m.lookup(code)) {
            return text.to_string();
        }
        match &self.layout {
            Layout::Simple { encoding, .. } => encoding
                .get(code as usize)
                .copied()
                .flatten()
                .map(String::from)
                .unwrap_or_else(|| '\u{FFFD}'.to_string()),
            // Identity-H without ToUnicode has no recoverable text.
            Layout::Composite { .. } => '\u{FFFD}'.to_string(),
        }
    }

    fn code_width(&self, code: u32) -> f32 {
        match &self.layout {
            Layout::Simple {
                encoding,
                first_char,
                widths,
                missing_width,
            } => {
                let explicit = code
                    .checked_sub(*first_char)
                    .and_then(|i| widths.get(i as usize))
                    .copied();
                explicit.or(*missing_width).unwrap_or_else(|| {
                    let ch = encoding.get(code as usize).copied().flatten().unwrap_or(' ');
                    self.standard
                        .unwrap_or(StandardFace::Helvetica)
                        .char_width(ch)
                })
            }
            Layout::Composite {
                widths,
                default_width,
            } => widths.get(&code).copied().unwrap_or(*default_width),
        }
    }

    /// Encode `text` through this font's own character map.
    ///
    /// Returns `None` when any character has no code in the font, in which
    /// case the font cannot render the text.
    pub fn encode(&self, text: &str) -> Option<Vec<u8>> {
        let reverse: HashMap<char, u32> = match (&self.to_unicode, &self.layout) {
            (Some(map), _) => map.reverse(),
            (None, Layout::Simple { encoding, .. }) => {
                // Printable codes first, so a space never maps to a control code.
                let mut reverse = HashMap::new();
                for code in (32..256).chain(0..32) {
                    if let Some(ch) = encoding[code] {
                        reverse.entry(ch).or_insert(code as u32);
                    }
                }
                reverse
            }
            (None, Layout::Composite { .. }) => return None,
        };
        let code_len = match &self.layout {
            Layout::Simple { .. } => 1,
            Layout::Composite { .. } => self
                .to_unicode
                .as_ref()
                .and_then(|m| m.code_len())
                .unwrap_or(2),
        };

        let mut bytes = Vec::with_capacity(text.len() * code_len);
        for ch in text.chars() {
            let code = *reverse.get(&ch)?;
            if code_len == 1 && code > 0xFF {
                return None;
            }
            for shift in (0..code_len).rev() {
                bytes.push((code >> (8 * shift)) as u8);
            }
        }
        Some(bytes)
    }

    /// Total advance of an encoded string in 1/1000 text space units.
    pub fn encoded_width(&self, bytes: &[u8]) -> f32 {
        self.decode(bytes).iter().map(|g| g.width).sum()
    }
}

fn simple_layout(doc: &Document, dict: &Dictionary, descriptor: Option<&Dictionary>) -> Layout {
    let mut base = BaseEncoding::WinAnsi;
    let mut differences: Vec<(usize, char)> = Vec::new();
    match dict_get(doc, dict, b"Encoding") {
        Some(Object::Name(n)) => base = BaseEncoding::from_name(&String::from_utf8_lossy(n)),
        Some(Object::Dictionary(enc)) => {
            if let Some(n) = dict_get(doc, enc, b"BaseEncoding").and_then(name) {
                base = BaseEncoding::from_name(&n);
            }
            if let Some(Object::Array(items)) = dict_get(doc, enc, b"Differences") {
                let mut code = 0usize;
                for item in items {
                    match resolve(doc, item) {
                        Object::Integer(i) => code = (*i).clamp(0, 255) as usize,
                        Object::Name(glyph) => {
                            if let Some(ch) = glyph_name_to_char(&String::from_utf8_lossy(glyph)) {
                                differences.push((code, ch));
                            }
                            code += 1;
                        }
                        _ => {}
                    }
                }
            }
        }
        _ => {}
    }

    let mut encoding = Box::new(base.table());
    for (code, ch) in differences {
        if code < 256 {
            encoding[code] = Some(ch);
        }
    }

    let first_char = dict_get(doc, dict, b"FirstChar")
        .and_then(number)
        .map(|f| f.max(0.0) as u32)
        .unwrap_or(0);
    let widths = match dict_get(doc, dict, b"Widths") {
        Some(Object::Array(items)) => items
            .iter()
            .map(|w| number(resolve(doc, w)).unwrap_or(0.0))
            .collect(),
        _ => Vec::new(),
    };
    let missing_width = if widths.is_empty() {
        None
    } else {
        descriptor
            .and_then(|d| dict_get(doc, d, b"MissingWidth"))
            .and_then(number)
            .or(Some(0.0))
    };

    Layout::Simple {
        encoding,
        first_char,
        widths,
        missing_width,
    }
}

fn composite_layout(doc: &Document, descendant: Option<&Dictionary>) -> Layout {
    let default_width = descendant
        .and_then(|d| dict_get(doc, d, b"DW"))
        .and_then(number)
        .unwrap_or(1000.0);
    let mut widths = HashMap::new();
    if let Some(Object::Array(items)) = descendant.and_then(|d| dict_get(doc, d, b"W")) {
        let items: Vec<&Object> = items.iter().map(|i| resolve(doc, i)).collect();
        let mut i = 0;
        while i < items.len() {
            let Some(first) = number(items[i]) else {
                i += 1;
                continue;
            };
            let first = first as u32;
            match items.get(i + 1) {
                // c [w1 w2 ...]
                Some(Object::Array(list)) => {
                    for (offset, w) in list.iter().enumerate() {
                        let code = u32::try_from(offset).ok().and_then(|o| first.checked_add(o));
                        let (Some(code), Some(w)) = (code, number(resolve(doc, w))) else {
                            continue;
                        };
                        widths.insert(code, w);
                    }
                    i += 2;
                }
                // c_first c_last w
                Some(last) => {
                    let last = number(last).map(|l| l as u32).unwrap_or(first);
                    let w = items.get(i + 2).and_then(|w| number(w)).unwrap_or(default_width);
                    for code in first..=last.min(first.saturating_add(0xFFFF)) {
                        widths.insert(code, w);
                    }
                    i += 3;
                }
                None => break,
            }
        }
    }
    Layout::Composite {
        widths,
        default_width,
    }
}
