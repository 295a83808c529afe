//! In-memory PDF fixtures for integration tests

#![allow(dead_code)]

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, Stream, StringFormat};

/// Builds small PDFs whose pages share a Helvetica `/F1` resource through
/// the page tree.
#[derive(Default)]
pub struct FixtureBuilder {
    pages: Vec<FixturePage>,
    info: Vec<(&'static str, &'static str)>,
}

enum FixturePage {
    Content(Vec<u8>),
    /// Page whose only content paints form `/Fm0` with this content.
    Form(Vec<u8>),
}

impl FixtureBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a page with raw content stream bytes.
    pub fn page(mut self, content: &[u8]) -> Self {
        self.pages.push(FixturePage::Content(content.to_vec()));
        self
    }

    /// Add a page that paints a form XObject holding `content`.
    pub fn form_page(mut self, content: &[u8]) -> Self {
        self.pages.push(FixturePage::Form(content.to_vec()));
        self
    }

    /// Add a page showing each `(x, y, size, text)` with `/F1`.
    pub fn text_page(self, lines: &[(i64, i64, i64, &str)]) -> Self {
        let content = show_lines(lines);
        self.page(&content)
    }

    pub fn info(mut self, key: &'static str, value: &'static str) -> Self {
        self.info.push((key, value));
        self
    }

    pub fn build(self) -> Vec<u8> {
        let mut doc = Document::with_version("1.7");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
            "Encoding" => "WinAnsiEncoding",
        });

        let mut kids = Vec::new();
        for page in self.pages {
            let mut page_dict = dictionary! {
                "Type" => "Page",
                "Parent" => Object::Reference(pages_id),
            };
            let content = match page {
                FixturePage::Content(content) => content,
                FixturePage::Form(form) => {
                    let form_id = doc.add_object(Stream::new(
                        dictionary! {
                            "Type" => "XObject",
                            "Subtype" => "Form",
                            "BBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
                            "Resources" => dictionary! {
                                "Font" => dictionary! { "F1" => Object::Reference(font_id) },
                            },
                        },
                        form,
                    ));
                    page_dict.set(
                        "Resources",
                        dictionary! {
                            "Font" => dictionary! { "F1" => Object::Reference(font_id) },
                            "XObject" => dictionary! { "Fm0" => Object::Reference(form_id) },
                        },
                    );
                    b"q /Fm0 Do Q".to_vec()
                }
            };
            let content_id = doc.add_object(Stream::new(Dictionary::new(), content));
            page_dict.set("Contents", Object::Reference(content_id));
            kids.push(Object::Reference(doc.add_object(page_dict)));
        }
        let count = kids.len() as i64;
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
                "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
                "Resources" => dictionary! {
                    "Font" => dictionary! { "F1" => Object::Reference(font_id) },
                },
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => Object::Reference(pages_id),
        });
        doc.trailer.set("Root", Object::Reference(catalog_id));

        if !self.info.is_empty() {
            let mut info = Dictionary::new();
            for (key, value) in self.info {
                info.set(key, Object::string_literal(value));
            }
            let info_id = doc.add_object(info);
            doc.trailer.set("Info", Object::Reference(info_id));
        }

        let mut buffer = Vec::new();
        doc.save_to(&mut buffer).unwrap();
        buffer
    }
}

/// Content stream showing each `(x, y, size, text)` with `/F1`.
pub fn show_lines(lines: &[(i64, i64, i64, &str)]) -> Vec<u8> {
    let mut operations = Vec::new();
    for (x, y, size, text) in lines {
        operations.extend([
            Operation::new("BT", vec![]),
            Operation::new(
                "Tf",
                vec![Object::Name(b"F1".to_vec()), Object::Integer(*size)],
            ),
            Operation::new("Td", vec![Object::Integer(*x), Object::Integer(*y)]),
            Operation::new(
                "Tj",
                vec![Object::String(text.as_bytes().to_vec(), StringFormat::Literal)],
            ),
            Operation::new("ET", vec![]),
        ]);
    }
    Content { operations }.encode().unwrap()
}

/// Whether any stream of `pdf`, once decompressed, contains `needle`.
pub fn any_stream_contains(pdf: &[u8], needle: &[u8]) -> bool {
    let doc = Document::load_mem(pdf).unwrap();
    doc.objects.values().any(|obj| match obj {
        Object::Stream(stream) => {
            let data = stream
                .decompressed_content()
                .unwrap_or_else(|_| stream.content.clone());
            data.windows(needle.len()).any(|w| w == needle)
        }
        _ => false,
    })
}

/// Text of every page of `pdf`, one string per page.
pub fn page_texts(pdf: &[u8]) -> Vec<String> {
    let doc = pdfmask_core::document::load(pdf).unwrap();
    pdfmask_core::text::build_page_texts(&doc, false)
        .unwrap()
        .iter()
        .map(|page| {
            page.lines
                .iter()
                .map(|line| line.text())
                .collect::<Vec<_>>()
                .join("\n")
        })
        .collect()
}

/// Information dictionary entries of `pdf` as raw bytes: string payloads
/// verbatim, other values in debug form.
pub fn raw_info(pdf: &[u8]) -> Vec<(Vec<u8>, Vec<u8>)> {
    let doc = Document::load_mem(pdf).unwrap();
    let dict = match doc.trailer.get(b"Info").unwrap() {
        Object::Reference(id) => doc.get_object(*id).unwrap().as_dict().unwrap().clone(),
        Object::Dictionary(dict) => dict.clone(),
        _ => panic!("Info is not a dictionary"),
    };
    let mut entries: Vec<(Vec<u8>, Vec<u8>)> = dict
        .iter()
        .map(|(key, value)| {
            let raw = match value {
                Object::String(bytes, _) => bytes.clone(),
                other => format!("{other:?}").into_bytes(),
            };
            (key.clone(), raw)
        })
        .collect();
    entries.sort();
    entries
}
