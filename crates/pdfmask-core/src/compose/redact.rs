//! Structural removal of shown glyphs from decoded page content
//!
//! Every text-showing operation that displays a glyph inside a redaction
//! area is rewritten as a `TJ` whose strings no longer contain that glyph's
//! bytes. The removed glyph is replaced by a kerning adjustment equal to its
//! advance so the text that follows keeps its position.

use crate::geometry::Rect;
use crate::text::font::FontInfo;
use crate::text::interpreter::{ContentSource, ShownGlyph};
use lopdf::content::Operation;
use lopdf::Object;
use std::collections::HashMap;

/// Glyphs to drop, grouped by the operation that shows them.
struct Removals<'a> {
    by_op: HashMap<usize, (&'a str, HashMap<usize, Option<f32>>)>,
}

impl<'a> Removals<'a> {
    fn collect(glyphs: &'a [ShownGlyph], source: ContentSource, areas: &[Rect]) -> Self {
        let mut by_op: HashMap<usize, (&str, HashMap<usize, Option<f32>>)> = HashMap::new();
        for glyph in glyphs.iter().filter(|glyph| glyph.source == source) {
            let (cx, cy) = glyph.rect.center();
            if areas.iter().any(|area| area.contains_point(cx, cy)) {
                by_op
                    .entry(glyph.op_index)
                    .or_insert_with(|| (glyph.font.as_str(), HashMap::new()))
                    .1
                    .insert(glyph.seq, glyph.kern_compensation);
            }
        }
        Self { by_op }
    }

    fn count(&self) -> usize {
        self.by_op.values().map(|(_, seqs)| seqs.len()).sum()
    }
}

/// Rewrite the `operations` of `source`, dropping every glyph whose center
/// lies in one of `areas`. Glyphs shown by other streams are ignored.
/// Returns the new operations and how many glyphs were removed.
pub fn remove_glyphs(
    operations: &[Operation],
    glyphs: &[ShownGlyph],
    source: ContentSource,
    fonts: &HashMap<String, FontInfo>,
    areas: &[Rect],
) -> (Vec<Operation>, usize) {
    let removals = Removals::collect(glyphs, source, areas);
    let removed = removals.count();
    if removed == 0 {
        return (operations.to_vec(), 0);
    }

    let mut rewritten = Vec::with_capacity(operations.len());
    for (index, op) in operations.iter().enumerate() {
        let Some((font_name, seqs)) = removals.by_op.get(&index) else {
            rewritten.push(op.clone());
            continue;
        };
        let Some(font) = fonts.get(*font_name) else {
            rewritten.push(op.clone());
            continue;
        };
        match op.operator.as_str() {
            "Tj" => {
                let items = strip_items(&op.operands[..1.min(op.operands.len())], font, seqs);
                rewritten.push(show_array(items));
            }
            "'" => {
                rewritten.push(Operation::new("T*", vec![]));
                let items = strip_items(&op.operands[..1.min(op.operands.len())], font, seqs);
                rewritten.push(show_array(items));
            }
            "\"" if op.operands.len() >= 3 => {
                rewritten.push(Operation::new("Tw", vec![op.operands[0].clone()]));
                rewritten.push(Operation::new("Tc", vec![op.operands[1].clone()]));
                rewritten.push(Operation::new("T*", vec![]));
                rewritten.push(show_array(strip_items(&op.operands[2..3], font, seqs)));
            }
            "TJ" => match op.operands.first() {
                Some(Object::Array(items)) => {
                    rewritten.push(show_array(strip_items(items, font, seqs)));
                }
                _ => rewritten.push(op.clone()),
            },
            _ => rewritten.push(op.clone()),
        }
    }
    (rewritten, removed)
}

fn show_array(items: Vec<Object>) -> Operation {
    Operation::new("TJ", vec![Object::Array(items)])
}

/// Rebuild the elements of a show operation without the glyphs in `seqs`.
/// Glyph positions count across every string of the operation.
fn strip_items(
    items: &[Object],
    font: &FontInfo,
    seqs: &HashMap<usize, Option<f32>>,
) -> Vec<Object> {
    let mut out: Vec<Object> = Vec::new();
    let mut seq = 0;
    for item in items {
        let Object::String(bytes, format) = item else {
            if let Some(adjust) = crate::document::number(item) {
                push_adjust(&mut out, adjust);
            }
            continue;
        };
        let mut segment: Vec<u8> = Vec::new();
        let mut offset = 0;
        for glyph in font.decode(bytes) {
            let end = (offset + glyph.byte_len).min(bytes.len());
            match seqs.get(&seq) {
                Some(compensation) => {
                    if !segment.is_empty() {
                        out.push(Object::String(std::mem::take(&mut segment), format.clone()));
                    }
                    if let Some(adjust) = compensation {
                        push_adjust(&mut out, *adjust);
                    }
                }
                None => segment.extend_from_slice(&bytes[offset..end]),
            }
            offset = end;
            seq += 1;
        }
        if !segment.is_empty() {
            out.push(Object::String(segment, format.clone()));
        }
    }
    out
}

/// Append a kerning adjustment, folding it into a preceding one.
fn push_adjust(out: &mut Vec<Object>, adjust: f32) {
    if let Some(last) = out.last_mut() {
        if let Some(previous) = crate::document::number(last) {
            *last = Object::Real(previous + adjust);
            return;
        }
    }
    out.push(Object::Real(adjust));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::text::interpreter::Interpreter;
    use lopdf::content::Content;
    use lopdf::{dictionary, Document};
    use pretty_assertions::assert_eq;

    fn fonts() -> HashMap<String, FontInfo> {
        let doc = Document::with_version("1.5");
        let dict = dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
        };
        HashMap::from([("F1".to_string(), FontInfo::from_dict(&doc, "F1", &dict))])
    }

    fn shown(content: &[u8], fonts: &HashMap<String, FontInfo>) -> (Vec<Operation>, Vec<ShownGlyph>) {
        let ops = Content::decode(content).unwrap().operations;
        let glyphs = Interpreter::new(fonts, Rect::new(0.0, 0.0, 612.0, 792.0)).run(&ops);
        (ops, glyphs)
    }

    fn text_of(ops: &[Operation], fonts: &HashMap<String, FontInfo>) -> String {
        Interpreter::new(fonts, Rect::new(0.0, 0.0, 612.0, 792.0))
            .run(ops)
            .into_iter()
            .map(|g| g.text)
            .collect()
    }

    #[test]
    fn test_glyphs_inside_area_are_removed() {
        let fonts = fonts();
        let (ops, glyphs) = shown(b"BT /F1 10 Tf 72 700 Td (Hi John!) Tj ET", &fonts);
        let john = glyphs[3].rect.union(&glyphs[6].rect);
        let (rewritten, removed) =
            remove_glyphs(&ops, &glyphs, ContentSource::Page, &fonts, &[john]);
        assert_eq!(removed, 4);
        assert_eq!(text_of(&rewritten, &fonts), "Hi !");
    }

    #[test]
    fn test_following_glyph_keeps_its_position() {
        let fonts = fonts();
        let (ops, glyphs) = shown(b"BT /F1 10 Tf 2 Tc 72 700 Td (abc) Tj ET", &fonts);
        let area = glyphs[1].rect;
        let (rewritten, _) = remove_glyphs(&ops, &glyphs, ContentSource::Page, &fonts, &[area]);
        let after = Interpreter::new(&fonts, Rect::new(0.0, 0.0, 612.0, 792.0)).run(&rewritten);
        assert_eq!(after.len(), 2);
        assert!((after[1].origin.0 - glyphs[2].origin.0).abs() < 1e-3);
    }

    #[test]
    fn test_quote_operator_keeps_line_advance() {
        let fonts = fonts();
        let (ops, glyphs) = shown(b"BT /F1 10 Tf 12 TL 72 700 Td (A) Tj 1 0 (Secret) \" ET", &fonts);
        let area = glyphs[1].rect.union(&glyphs[6].rect);
        let (rewritten, removed) =
            remove_glyphs(&ops, &glyphs, ContentSource::Page, &fonts, &[area]);
        assert_eq!(removed, 6);
        let operators: Vec<&str> = rewritten.iter().map(|op| op.operator.as_str()).collect();
        assert!(operators.contains(&"T*"));
        assert!(!operators.contains(&"\""));
        assert_eq!(text_of(&rewritten, &fonts), "A");
    }

    #[test]
    fn test_untouched_content_is_unchanged() {
        let fonts = fonts();
        let (ops, glyphs) = shown(b"BT /F1 10 Tf 72 700 Td (Hello) Tj ET", &fonts);
        let area = Rect::new(400.0, 400.0, 500.0, 420.0);
        let (rewritten, removed) =
            remove_glyphs(&ops, &glyphs, ContentSource::Page, &fonts, &[area]);
        assert_eq!(removed, 0);
        assert_eq!(rewritten.len(), ops.len());
    }

    #[test]
    fn test_glyphs_of_other_streams_are_ignored() {
        let fonts = fonts();
        let (ops, mut glyphs) = shown(b"BT /F1 10 Tf 72 700 Td (John) Tj ET", &fonts);
        for glyph in &mut glyphs {
            glyph.source = ContentSource::Form((7, 0));
        }
        let area = glyphs[0].rect.union(&glyphs[3].rect);
        let (_, removed) = remove_glyphs(&ops, &glyphs, ContentSource::Page, &fonts, &[area]);
        assert_eq!(removed, 0);
        let (rewritten, removed) =
            remove_glyphs(&ops, &glyphs, ContentSource::Form((7, 0)), &fonts, &[area]);
        assert_eq!(removed, 4);
        assert_eq!(text_of(&rewritten, &fonts), "");
    }
}
