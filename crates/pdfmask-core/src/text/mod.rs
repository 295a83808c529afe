//! Page text model
//!
//! Pages are interpreted into positioned glyphs, which are then grouped into
//! lines (shared baseline, forward progression) and, within a line, into runs
//! of identical font, size and color. Lines carry one character per glyph
//! plus synthetic spaces where glyphs are visibly apart, so a substring
//! search over a line maps straight back to page rectangles.

pub mod cmap;
pub mod encoding;
pub mod font;
pub mod interpreter;
pub mod standard;

use crate::document::{media_box, page_content, page_resources, resource_fonts};
use crate::error::MaskError;
use crate::geometry::{Color, Rect};
use font::FontInfo;
use interpreter::{FormContent, Interpreter, ShownGlyph};
use lopdf::content::Content;
use lopdf::{Dictionary, Document, ObjectId};
use rayon::prelude::*;
use serde::Serialize;
use std::collections::HashMap;

/// Baseline tolerance for joining a glyph to a line, in em.
const BASELINE_TOLERANCE: f32 = 0.25;
/// Horizontal gap that breaks a line, in em.
const MAX_LINE_GAP: f32 = 2.5;
/// Horizontal gap rendered as a space, in em.
const SPACE_GAP: f32 = 0.15;
/// Backwards movement still treated as forward progression, in em.
const BACKTRACK_TOLERANCE: f32 = 0.1;

/// One character of a line and where it renders.
#[derive(Debug, Clone, PartialEq)]
pub struct LineChar {
    pub ch: char,
    pub rect: Rect,
    /// Index into [`PageText::glyphs`]; `None` for synthetic spaces.
    pub glyph: Option<usize>,
}

/// A run of characters sharing font, size and color.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TextRun {
    pub text: String,
    pub rect: Rect,
    /// Font resource name on the page.
    pub font: String,
    /// Font family (BaseFont without subset tag).
    pub font_family: String,
    /// Nominal size from `Tf`.
    pub font_size: f32,
    pub color: Color,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextLine {
    pub chars: Vec<LineChar>,
    pub runs: Vec<TextRun>,
    pub rect: Rect,
    baseline: f32,
    em: f32,
    end_x: f32,
}

impl TextLine {
    pub fn text(&self) -> String {
        self.chars.iter().map(|c| c.ch).collect()
    }

    /// Every rectangle where `needle` renders on this line.
    ///
    /// Occurrences are found left to right without overlapping.
    pub fn find(&self, needle: &str) -> Vec<Rect> {
        let needle: Vec<char> = needle.chars().collect();
        if needle.is_empty() || needle.len() > self.chars.len() {
            return Vec::new();
        }
        let mut hits = Vec::new();
        let mut i = 0;
        while i + needle.len() <= self.chars.len() {
            let window = &self.chars[i..i + needle.len()];
            if window.iter().zip(&needle).all(|(c, n)| c.ch == *n) {
                let rect = window
                    .iter()
                    .skip(1)
                    .fold(window[0].rect, |acc, c| acc.union(&c.rect));
                hits.push(rect);
                i += needle.len();
            } else {
                i += 1;
            }
        }
        hits
    }

    #[cfg(test)]
    pub(crate) fn from_run(run: TextRun) -> Self {
        let rect = run.rect;
        let chars = run
            .text
            .chars()
            .map(|ch| LineChar {
                ch,
                rect,
                glyph: None,
            })
            .collect();
        Self {
            chars,
            runs: vec![run],
            rect,
            baseline: rect.y1,
            em: rect.height(),
            end_x: rect.x1,
        }
    }

    fn accepts(&self, glyph: &ShownGlyph) -> bool {
        let em = self.em.max(glyph.em).max(1.0);
        let same_baseline = (glyph.origin.1 - self.baseline).abs() <= BASELINE_TOLERANCE * em;
        let gap = glyph.origin.0 - self.end_x;
        same_baseline && gap >= -BACKTRACK_TOLERANCE * em && gap <= MAX_LINE_GAP * em
    }
}

/// Text model of a single page.
#[derive(Debug, Clone)]
pub struct PageText {
    /// 1-indexed page number.
    pub page: u32,
    /// Visible area in page space (origin top-left).
    pub bounds: Rect,
    pub glyphs: Vec<ShownGlyph>,
    /// Lines in reading order (top to bottom, then left to right).
    pub lines: Vec<TextLine>,
    /// Form XObjects painted by the page.
    pub forms: Vec<FormContent>,
}

impl PageText {
    /// Interpret a page of `doc`, including the forms it paints.
    pub fn from_page(doc: &Document, page: u32, page_id: ObjectId) -> Result<Self, MaskError> {
        let resources = page_resources(doc, page_id);
        let fonts = font_table(doc, resources);
        let content = page_content(doc, page_id)?;
        let operations = Content::decode(&content)
            .map_err(|e| MaskError::SourceInvalid(format!("page {page}: {e}")))?
            .operations;
        let mb = media_box(doc, page_id);
        let (glyphs, forms) = Interpreter::new(&fonts, mb)
            .with_forms(doc, resources)
            .run_with_forms(&operations);
        let bounds = Rect::new(0.0, 0.0, mb.width(), mb.height());
        let mut text = Self::from_glyphs(page, bounds, glyphs);
        text.forms = forms;
        Ok(text)
    }

    /// Build lines and runs from interpreted glyphs.
    pub fn from_glyphs(page: u32, bounds: Rect, glyphs: Vec<ShownGlyph>) -> Self {
        let mut lines: Vec<TextLine> = Vec::new();

        for (index, glyph) in glyphs.iter().enumerate() {
            if glyph.text.is_empty() {
                continue;
            }
            let target = lines.iter().rposition(|line| line.accepts(glyph));
            let line = match target {
                Some(i) => &mut lines[i],
                None => {
                    lines.push(TextLine {
                        chars: Vec::new(),
                        runs: Vec::new(),
                        rect: glyph.rect,
                        baseline: glyph.origin.1,
                        em: glyph.em,
                        end_x: glyph.origin.0,
                    });
                    let last = lines.len() - 1;
                    &mut lines[last]
                }
            };
            append_glyph(line, index, glyph);
        }

        for line in &mut lines {
            line.runs = build_runs(line, &glyphs);
        }
        lines.retain(|line| !line.text().trim().is_empty());
        lines.sort_by(|a, b| {
            a.rect
                .y0
                .total_cmp(&b.rect.y0)
                .then(a.rect.x0.total_cmp(&b.rect.x0))
        });

        Self {
            page,
            bounds,
            glyphs,
            lines,
            forms: Vec::new(),
        }
    }

    /// All runs of the page in line order.
    pub fn runs(&self) -> impl Iterator<Item = &TextRun> {
        self.lines.iter().flat_map(|line| line.runs.iter())
    }

    /// Every rectangle on the page where `needle` renders, clamped to the
    /// visible area.
    pub fn search(&self, needle: &str) -> Vec<Rect> {
        self.lines
            .iter()
            .flat_map(|line| line.find(needle))
            .map(|rect| rect.clamp_to(&self.bounds))
            .filter(|rect| !rect.is_empty())
            .collect()
    }

    pub fn contains(&self, needle: &str) -> bool {
        !self.search(needle).is_empty()
    }
}

/// Font table of `resources`, keyed by resource name.
pub fn font_table(doc: &Document, resources: Option<&Dictionary>) -> HashMap<String, FontInfo> {
    let Some(resources) = resources else {
        return HashMap::new();
    };
    resource_fonts(doc, resources)
        .into_iter()
        .map(|(name, dict)| {
            let info = FontInfo::from_dict(doc, &name, dict);
            (name, info)
        })
        .collect()
}

/// Interpret every page of `doc`, on the rayon pool when `parallel` is set.
pub fn build_page_texts(doc: &Document, parallel: bool) -> Result<Vec<PageText>, MaskError> {
    let pages: Vec<(u32, ObjectId)> = doc.get_pages().into_iter().collect();
    if parallel && pages.len() > 1 {
        pages
            .par_iter()
            .map(|(number, id)| PageText::from_page(doc, *number, *id))
            .collect()
    } else {
        pages
            .iter()
            .map(|(number, id)| PageText::from_page(doc, *number, *id))
            .collect()
    }
}

fn append_glyph(line: &mut TextLine, index: usize, glyph: &ShownGlyph) {
    let em = line.em.max(glyph.em);
    if let Some(last) = line.chars.last() {
        let gap = glyph.origin.0 - line.end_x;
        let last_blank = last.ch.is_whitespace();
        let this_blank = glyph.text.starts_with(char::is_whitespace);
        if gap > SPACE_GAP * em && !last_blank && !this_blank {
            let rect = Rect::new(last.rect.x1, glyph.rect.y0, glyph.rect.x0, glyph.rect.y1);
            line.chars.push(LineChar {
                ch: ' ',
                rect,
                glyph: None,
            });
        }
    }

    let count = glyph.text.chars().count().max(1) as f32;
    let slice = glyph.rect.width() / count;
    for (i, ch) in glyph.text.chars().enumerate() {
        let x0 = glyph.rect.x0 + slice * i as f32;
        line.chars.push(LineChar {
            ch,
            rect: Rect::new(x0, glyph.rect.y0, x0 + slice, glyph.rect.y1),
            glyph: Some(index),
        });
    }

    line.rect = line.rect.union(&glyph.rect);
    line.em = em;
    line.end_x = glyph.end.0;
}

fn build_runs(line: &TextLine, glyphs: &[ShownGlyph]) -> Vec<TextRun> {
    let mut runs: Vec<TextRun> = Vec::new();
    for c in &line.chars {
        let Some(glyph) = c.glyph.map(|i| &glyphs[i]) else {
            if let Some(run) = runs.last_mut() {
                run.text.push(c.ch);
            }
            continue;
        };
        let continues = runs.last().is_some_and(|run| {
            run.font == glyph.font
                && run.font_family == glyph.family
                && run.font_size == glyph.font_size
                && run.color == glyph.color
        });
        if continues {
            if let Some(run) = runs.last_mut() {
                run.text.push(c.ch);
                run.rect = run.rect.union(&c.rect);
            }
        } else {
            runs.push(TextRun {
                text: c.ch.to_string(),
                rect: c.rect,
                font: glyph.font.clone(),
                font_family: glyph.family.clone(),
                font_size: glyph.font_size,
                color: glyph.color,
            });
        }
    }
    runs
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::dictionary;

    fn page_from(content: &[u8]) -> PageText {
        let doc = Document::with_version("1.5");
        let helvetica = dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
        };
        let bold = dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica-Bold",
        };
        let fonts = HashMap::from([
            ("F1".to_string(), FontInfo::from_dict(&doc, "F1", &helvetica)),
            ("F2".to_string(), FontInfo::from_dict(&doc, "F2", &bold)),
        ]);
        let ops = Content::decode(content).unwrap().operations;
        let glyphs = Interpreter::new(&fonts, Rect::new(0.0, 0.0, 612.0, 792.0)).run(&ops);
        PageText::from_glyphs(1, Rect::new(0.0, 0.0, 612.0, 792.0), glyphs)
    }

    #[test]
    fn test_lines_are_sorted_top_down() {
        let page = page_from(
            b"BT /F1 12 Tf 72 700 Td (Second) Tj ET BT /F1 12 Tf 72 720 Td (First) Tj ET",
        );
        let texts: Vec<String> = page.lines.iter().map(|l| l.text()).collect();
        assert_eq!(texts, vec!["First", "Second"]);
    }

    #[test]
    fn test_positioned_words_get_synthetic_space() {
        let page = page_from(b"BT /F1 12 Tf 72 720 Td (John) Tj 30 0 Td (Doe) Tj ET");
        assert_eq!(page.lines.len(), 1);
        assert_eq!(page.lines[0].text(), "John Doe");
        assert_eq!(page.search("John Doe").len(), 1);
    }

    #[test]
    fn test_kerned_word_has_no_space() {
        let page = page_from(b"BT /F1 12 Tf 72 720 Td [(Jo) -20 (hn)] TJ ET");
        assert_eq!(page.lines[0].text(), "John");
    }

    #[test]
    fn test_search_finds_every_occurrence() {
        let page = page_from(
            b"BT /F1 12 Tf 72 720 Td (Doe and Doe) Tj ET BT /F1 12 Tf 72 600 Td (Doe) Tj ET",
        );
        let hits = page.search("Doe");
        assert_eq!(hits.len(), 3);
        assert!(hits[0].x0 < hits[1].x0);
        assert!(hits.iter().all(|r| !r.is_empty()));
    }

    #[test]
    fn test_runs_split_on_font_change() {
        let page = page_from(b"BT /F1 12 Tf 72 720 Td (Name: ) Tj /F2 12 Tf (John) Tj ET");
        let runs: Vec<&TextRun> = page.runs().collect();
        assert_eq!(runs.len(), 2);
        assert_eq!(runs[0].font_family, "Helvetica");
        assert_eq!(runs[1].font_family, "Helvetica-Bold");
        assert_eq!(runs[1].text, "John");
    }

    #[test]
    fn test_overprinted_text_forms_separate_line() {
        let page = page_from(
            b"BT /F1 12 Tf 72 720 Td (Ghost) Tj ET BT /F1 12 Tf 72 720 Td (Ghost) Tj ET",
        );
        assert_eq!(page.lines.len(), 2);
    }
}
