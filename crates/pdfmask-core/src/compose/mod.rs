//! Redaction compositor
//!
//! Each page with matches goes through two phases in a fixed order. The
//! blanking phase strips the matched glyphs out of the content (and out of
//! the form XObjects the page paints) and paints
//! white over their areas; the insertion phase draws the replacement text on
//! top. `PageCompositor` encodes that order in its type: insertion is only
//! available on a blanked compositor.
//!
//! Plans are computed per page from read-only inputs (in parallel when
//! enabled) and committed to the document one page at a time.

pub mod fonts;
pub mod redact;

use crate::document::{media_box, page_content, page_resources, resolve_dict};
use crate::error::MaskError;
use crate::geometry::Rect;
use crate::record::MatchedOccurrence;
use crate::text::font::FontInfo;
use crate::text::interpreter::{ContentSource, FormContent};
use crate::text::{font_table, PageText};
use fonts::{FontAsset, FontCatalog, FontRequest, FontSource, FontStrategy};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream, StringFormat};
use rayon::prelude::*;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::marker::PhantomData;
use tracing::{debug, info};

/// Baseline offset below the top of a match, as a share of the font size.
const BASELINE_RATIO: f32 = 0.8;
/// Prefix of resource names given to fonts added by the compositor.
const FONT_PREFIX: &str = "HmF";

/// Compositor state before blanking.
pub struct Pending;
/// Compositor state once the matched areas are blanked.
pub struct Blanked;

/// Composes the new content of one page.
pub struct PageCompositor<'a, State> {
    page: &'a PageText,
    page_id: ObjectId,
    media_box: Rect,
    /// Font resources of the page, taken once before any change.
    fonts: HashMap<String, FontInfo>,
    occurrences: Vec<&'a MatchedOccurrence>,
    operations: Vec<Operation>,
    /// Forms that lost glyphs, with their new operations.
    forms: Vec<(&'a FormContent, Vec<Operation>)>,
    removed_glyphs: usize,
    _state: PhantomData<State>,
}

/// Everything needed to commit one page.
#[derive(Debug)]
pub struct PagePlan {
    pub page: u32,
    pub page_id: ObjectId,
    pub content: Vec<u8>,
    /// Fonts to add under `/Font`, by resource name.
    pub new_fonts: Vec<(String, FontAsset)>,
    pub forms: Vec<FormRewrite>,
    pub resolutions: Vec<FontStrategy>,
    pub removed_glyphs: usize,
    pub replacements: usize,
}

/// New content for a form XObject painted by a page.
#[derive(Debug)]
pub struct FormRewrite {
    pub id: ObjectId,
    /// XObject names leading from the page resources to the form.
    pub paths: Vec<Vec<String>>,
    pub content: Vec<u8>,
}

impl<'a> PageCompositor<'a, Pending> {
    pub fn new(
        doc: &Document,
        page_id: ObjectId,
        page: &'a PageText,
        occurrences: Vec<&'a MatchedOccurrence>,
    ) -> Result<Self, MaskError> {
        let fonts = font_table(doc, page_resources(doc, page_id));
        let content = page_content(doc, page_id)?;
        let operations = Content::decode(&content)
            .map_err(|e| MaskError::SourceInvalid(format!("page {}: {e}", page.page)))?
            .operations;
        Ok(Self {
            page,
            page_id,
            media_box: media_box(doc, page_id),
            fonts,
            occurrences,
            operations,
            forms: Vec::new(),
            removed_glyphs: 0,
            _state: PhantomData,
        })
    }

    /// Remove the matched glyphs and paint the matched areas white.
    pub fn blank(self) -> PageCompositor<'a, Blanked> {
        let areas: Vec<Rect> = self.occurrences.iter().map(|o| o.rect).collect();
        let page: &'a PageText = self.page;
        let glyphs = &page.glyphs;
        let (redacted, mut removed_glyphs) = redact::remove_glyphs(
            &self.operations,
            glyphs,
            ContentSource::Page,
            &self.fonts,
            &areas,
        );

        let mut forms = Vec::new();
        for form in &page.forms {
            let source = ContentSource::Form(form.id);
            let (rewritten, removed) =
                redact::remove_glyphs(&form.operations, glyphs, source, &form.fonts, &areas);
            if removed > 0 {
                removed_glyphs += removed;
                forms.push((form, rewritten));
            }
        }

        let mut operations = isolate(redacted);
        operations.reserve(4 * areas.len() + 3);
        operations.push(Operation::new("q", vec![]));
        operations.push(Operation::new("rg", vec![1.into(), 1.into(), 1.into()]));
        for area in &areas {
            let (x, y) = self.to_user(area.x0, area.y1);
            operations.push(Operation::new(
                "re",
                vec![
                    Object::Real(x),
                    Object::Real(y),
                    Object::Real(area.width()),
                    Object::Real(area.height()),
                ],
            ));
            operations.push(Operation::new("f", vec![]));
        }
        operations.push(Operation::new("Q", vec![]));

        debug!(
            page = self.page.page,
            areas = areas.len(),
            removed_glyphs,
            forms = forms.len(),
            "Blanked matched areas"
        );
        PageCompositor {
            page: self.page,
            page_id: self.page_id,
            media_box: self.media_box,
            fonts: self.fonts,
            occurrences: self.occurrences,
            operations,
            forms,
            removed_glyphs,
            _state: PhantomData,
        }
    }
}

impl<S> PageCompositor<'_, S> {
    /// Page space (origin top-left) to default user space.
    fn to_user(&self, x: f32, y: f32) -> (f32, f32) {
        (x + self.media_box.x0, self.media_box.y1 - y)
    }
}

impl PageCompositor<'_, Blanked> {
    /// Draw every replacement and produce the page plan.
    pub fn insert(mut self, catalog: &FontCatalog) -> Result<PagePlan, MaskError> {
        let mut added: HashMap<String, String> = HashMap::new();
        let mut new_fonts: Vec<(String, FontAsset)> = Vec::new();
        let mut resolutions = Vec::with_capacity(self.occurrences.len());
        let mut text_ops = Vec::new();
        let mut shown: HashMap<String, HashSet<char>> = HashMap::new();
        for glyph in &self.page.glyphs {
            if glyph.source == ContentSource::Page {
                shown
                    .entry(glyph.font.clone())
                    .or_default()
                    .extend(glyph.text.chars());
            }
        }

        for occurrence in &self.occurrences {
            let style = &occurrence.style;
            let resolution = fonts::resolve(&FontRequest {
                family: &style.font_family,
                text: &occurrence.replacement_text,
                page_fonts: &self.fonts,
                shown: &shown,
                catalog,
            });
            debug!(
                page = self.page.page,
                family = %style.font_family,
                strategy = resolution.strategy.as_str(),
                "Resolved replacement font"
            );
            resolutions.push(resolution.strategy);

            let resource = match resolution.source {
                FontSource::Page(name) => name,
                FontSource::Asset(asset) => {
                    let key = asset.base_font().to_string();
                    match added.get(&key) {
                        Some(name) => name.clone(),
                        None => {
                            let name = self.free_font_name(&new_fonts);
                            added.insert(key, name.clone());
                            new_fonts.push((name.clone(), asset));
                            name
                        }
                    }
                }
            };

            let rect = occurrence.rect;
            let (x, y) = self.to_user(rect.x0, rect.y0 + BASELINE_RATIO * style.font_size);
            text_ops.extend([
                Operation::new("BT", vec![]),
                Operation::new(
                    "Tf",
                    vec![
                        Object::Name(resource.into_bytes()),
                        Object::Real(style.font_size),
                    ],
                ),
                Operation::new(
                    "rg",
                    vec![
                        Object::Real(style.color.r),
                        Object::Real(style.color.g),
                        Object::Real(style.color.b),
                    ],
                ),
                Operation::new(
                    "Tm",
                    vec![
                        1.into(),
                        0.into(),
                        0.into(),
                        1.into(),
                        Object::Real(x),
                        Object::Real(y),
                    ],
                ),
                Operation::new(
                    "Tj",
                    vec![Object::String(resolution.bytes, StringFormat::Hexadecimal)],
                ),
                Operation::new("ET", vec![]),
            ]);
        }

        self.operations.push(Operation::new("q", vec![]));
        self.operations.extend(text_ops);
        self.operations.push(Operation::new("Q", vec![]));

        let content = Content {
            operations: self.operations,
        }
        .encode()
        .map_err(|e| MaskError::Operation(format!("page {}: {e}", self.page.page)))?;

        let mut forms = Vec::with_capacity(self.forms.len());
        for (form, operations) in self.forms {
            let content = Content { operations }
                .encode()
                .map_err(|e| MaskError::Operation(format!("form {:?}: {e}", form.id)))?;
            forms.push(FormRewrite {
                id: form.id,
                paths: form.paths.clone(),
                content,
            });
        }

        Ok(PagePlan {
            page: self.page.page,
            page_id: self.page_id,
            content,
            new_fonts,
            forms,
            replacements: resolutions.len(),
            resolutions,
            removed_glyphs: self.removed_glyphs,
        })
    }

    /// The first `HmF<n>` name free both on the page and among `added`.
    fn free_font_name(&self, added: &[(String, FontAsset)]) -> String {
        (added.len()..)
            .map(|n| format!("{FONT_PREFIX}{n}"))
            .find(|name| {
                !self.fonts.contains_key(name) && added.iter().all(|(taken, _)| taken != name)
            })
            .unwrap_or_default()
    }
}

/// Wrap `operations` in a `q ... Q` pair that survives unbalanced state
/// operators in the content.
fn isolate(operations: Vec<Operation>) -> Vec<Operation> {
    let (mut depth, mut lowest) = (0i64, 0i64);
    for op in &operations {
        match op.operator.as_str() {
            "q" => depth += 1,
            "Q" => {
                depth -= 1;
                lowest = lowest.min(depth);
            }
            _ => {}
        }
    }
    let opening = (1 - lowest) as usize;
    let closing = (1 - lowest + depth) as usize;

    let mut isolated = Vec::with_capacity(operations.len() + opening + closing);
    isolated.extend((0..opening).map(|_| Operation::new("q", vec![])));
    isolated.extend(operations);
    isolated.extend((0..closing).map(|_| Operation::new("Q", vec![])));
    isolated
}

/// Totals over every committed page.
#[derive(Debug, Clone, Default)]
pub struct ComposeReport {
    pub pages_redacted: usize,
    pub replacements: usize,
    pub removed_glyphs: usize,
    pub font_resolutions: BTreeMap<FontStrategy, usize>,
}

/// Build the plan for one page.
pub fn plan_page(
    doc: &Document,
    page_id: ObjectId,
    page: &PageText,
    occurrences: Vec<&MatchedOccurrence>,
    catalog: &FontCatalog,
) -> Result<PagePlan, MaskError> {
    PageCompositor::new(doc, page_id, page, occurrences)?
        .blank()
        .insert(catalog)
}

/// Redact and re-render every page that has occurrences.
///
/// All plans are built before the first commit, so a failure leaves `doc`
/// untouched.
pub fn compose(
    doc: &mut Document,
    pages: &[PageText],
    occurrences: &[MatchedOccurrence],
    catalog: &FontCatalog,
    parallel: bool,
) -> Result<ComposeReport, MaskError> {
    let mut by_page: BTreeMap<u32, Vec<&MatchedOccurrence>> = BTreeMap::new();
    for occurrence in occurrences {
        by_page.entry(occurrence.page).or_default().push(occurrence);
    }
    let page_ids = doc.get_pages();
    let mut work = Vec::with_capacity(by_page.len());
    for (number, list) in by_page {
        let (Some(page_id), Some(page)) = (
            page_ids.get(&number),
            pages.iter().find(|p| p.page == number),
        ) else {
            return Err(MaskError::Operation(format!(
                "page {number} has occurrences but is missing from the document"
            )));
        };
        work.push((*page_id, page, list));
    }

    let plans: Vec<PagePlan> = {
        let doc: &Document = doc;
        if parallel && work.len() > 1 {
            work.into_par_iter()
                .map(|(page_id, page, list)| plan_page(doc, page_id, page, list, catalog))
                .collect::<Result<_, _>>()?
        } else {
            work.into_iter()
                .map(|(page_id, page, list)| plan_page(doc, page_id, page, list, catalog))
                .collect::<Result<_, _>>()?
        }
    };

    let mut report = ComposeReport::default();
    let mut embedded: HashMap<String, ObjectId> = HashMap::new();
    for plan in plans {
        report.pages_redacted += 1;
        report.replacements += plan.replacements;
        report.removed_glyphs += plan.removed_glyphs;
        for strategy in &plan.resolutions {
            *report.font_resolutions.entry(*strategy).or_default() += 1;
        }
        let page = plan.page;
        let replacements = plan.replacements;
        commit(doc, plan, &mut embedded)?;
        info!(page, replacements, "Page redacted");
    }
    Ok(report)
}

/// Write a plan into the document: new content stream, and a private copy
/// of the page resources carrying the added fonts.
fn commit(
    doc: &mut Document,
    plan: PagePlan,
    embedded: &mut HashMap<String, ObjectId>,
) -> Result<(), MaskError> {
    let mut font_refs = Vec::with_capacity(plan.new_fonts.len());
    for (name, asset) in &plan.new_fonts {
        let key = asset.base_font().to_string();
        let id = match embedded.get(&key) {
            Some(id) => *id,
            None => {
                let id = add_font(doc, asset);
                embedded.insert(key, id);
                id
            }
        };
        font_refs.push((name.clone(), id));
    }

    let mut resources: Dictionary = page_resources(doc, plan.page_id).cloned().unwrap_or_default();
    let mut font_dict: Dictionary = resources
        .get(b"Font")
        .ok()
        .and_then(|obj| resolve_dict(doc, obj))
        .cloned()
        .unwrap_or_default();
    for (name, id) in font_refs {
        font_dict.set(name, Object::Reference(id));
    }
    resources.set("Font", Object::Dictionary(font_dict));
    for form in &plan.forms {
        for path in &form.paths {
            replace_form(doc, &mut resources, path, &form.content)?;
        }
    }

    let content_id = doc.add_object(Stream::new(Dictionary::new(), plan.content));

    let page = doc
        .get_object_mut(plan.page_id)
        .and_then(|obj| obj.as_dict_mut())
        .map_err(|e| MaskError::Operation(format!("page {}: {e}", plan.page)))?;
    page.set("Contents", Object::Reference(content_id));
    page.set("Resources", Object::Dictionary(resources));
    Ok(())
}

/// Point `resources` at a copy of the form reached through `path` carrying
/// `content`. Every form along the path is copied too, so other pages
/// painting the originals keep them.
fn replace_form(
    doc: &mut Document,
    resources: &mut Dictionary,
    path: &[String],
    content: &[u8],
) -> Result<(), MaskError> {
    let Some((head, rest)) = path.split_first() else {
        return Ok(());
    };
    let mut xobjects: Dictionary = resources
        .get(b"XObject")
        .ok()
        .and_then(|obj| resolve_dict(doc, obj))
        .cloned()
        .unwrap_or_default();
    let form = xobjects
        .get(head.as_bytes())
        .ok()
        .and_then(|obj| obj.as_reference().ok())
        .and_then(|id| doc.get_object(id).ok())
        .and_then(|obj| obj.as_stream().ok())
        .cloned()
        .ok_or_else(|| MaskError::Operation(format!("form /{head} is missing from resources")))?;

    let mut dict = form.dict;
    let data = if rest.is_empty() {
        dict.remove(b"Filter");
        dict.remove(b"DecodeParms");
        content.to_vec()
    } else {
        // A form without resources of its own uses those of its painter.
        let mut inner: Dictionary = match dict.get(b"Resources") {
            Ok(obj) => resolve_dict(doc, obj).cloned().unwrap_or_default(),
            Err(_) => resources.clone(),
        };
        replace_form(doc, &mut inner, rest, content)?;
        dict.set("Resources", Object::Dictionary(inner));
        form.content
    };
    let copy = doc.add_object(Stream::new(dict, data));
    xobjects.set(head.as_str(), Object::Reference(copy));
    resources.set("XObject", Object::Dictionary(xobjects));
    Ok(())
}

/// Add the font dictionary for `asset`, embedding TrueType data.
fn add_font(doc: &mut Document, asset: &FontAsset) -> ObjectId {
    match asset {
        FontAsset::Standard(face) => {
            let mut font = dictionary! {
                "Type" => "Font",
                "Subtype" => "Type1",
                "BaseFont" => face.base_font(),
            };
            if !matches!(
                face,
                crate::text::standard::StandardFace::Symbol
                    | crate::text::standard::StandardFace::ZapfDingbats
            ) {
                font.set("Encoding", "WinAnsiEncoding");
            }
            doc.add_object(font)
        }
        FontAsset::TrueType(face) => {
            let file_id = doc.add_object(Stream::new(
                dictionary! { "Length1" => face.data.len() as i64 },
                face.data.clone(),
            ));
            let descriptor_id = doc.add_object(dictionary! {
                "Type" => "FontDescriptor",
                "FontName" => Object::Name(face.postscript_name.clone().into_bytes()),
                "Flags" => face.flags,
                "FontBBox" => face.bbox.iter().map(|v| Object::Real(*v)).collect::<Vec<_>>(),
                "ItalicAngle" => 0,
                "Ascent" => Object::Real(face.ascent),
                "Descent" => Object::Real(face.descent),
                "CapHeight" => Object::Real(face.cap_height),
                "StemV" => 80,
                "FontFile2" => Object::Reference(file_id),
            });
            let widths: Vec<Object> = face.widths[32..=255]
                .iter()
                .map(|w| Object::Real(*w))
                .collect();
            doc.add_object(dictionary! {
                "Type" => "Font",
                "Subtype" => "TrueType",
                "BaseFont" => Object::Name(face.postscript_name.clone().into_bytes()),
                "FirstChar" => 32,
                "LastChar" => 255,
                "Widths" => widths,
                "Encoding" => "WinAnsiEncoding",
                "FontDescriptor" => Object::Reference(descriptor_id),
            })
        }
    }
}
