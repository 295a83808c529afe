//! Content stream interpreter producing positioned glyphs
//!
//! Tracks just enough of the graphics and text state to place every shown
//! glyph on the page: the CTM with its `q`/`Q` stack, the fill color and
//! the text state parameters. Form XObjects painted with `Do` are descended
//! into with their own resources and matrix.

use super::font::FontInfo;
use super::font_table;
use crate::document::{dict_get, number, resolve_dict, stream_bytes, xobject_forms};
use crate::geometry::{Color, Matrix, Rect};
use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, ObjectId};
use std::collections::HashMap;
use tracing::warn;

/// Forms nested deeper than this are not painted.
const MAX_FORM_DEPTH: usize = 8;

/// The content stream a showing operation lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ContentSource {
    #[default]
    Page,
    Form(ObjectId),
}

/// A form XObject painted by a page, decoded once.
#[derive(Debug, Clone)]
pub struct FormContent {
    pub id: ObjectId,
    pub operations: Vec<Operation>,
    /// Fonts of the form's own resources, or of the painting scope when the
    /// form has none.
    pub fonts: HashMap<String, FontInfo>,
    /// XObject names leading from the page resources to this form, one per
    /// distinct route.
    pub paths: Vec<Vec<String>>,
    matrix: Matrix,
    xobjects: HashMap<String, ObjectId>,
}

impl FormContent {
    fn load(
        doc: &Document,
        id: ObjectId,
        fonts: &HashMap<String, FontInfo>,
        xobjects: &HashMap<String, ObjectId>,
        path: Vec<String>,
    ) -> Option<Self> {
        let Ok(Object::Stream(stream)) = doc.get_object(id) else {
            return None;
        };
        let content = match stream_bytes(stream) {
            Ok(content) => content,
            Err(e) => {
                warn!(form = ?id, error = %e, "Skipping unreadable form");
                return None;
            }
        };
        let operations = match Content::decode(&content) {
            Ok(content) => content.operations,
            Err(e) => {
                warn!(form = ?id, error = %e, "Skipping undecodable form");
                return None;
            }
        };
        let matrix = match dict_get(doc, &stream.dict, b"Matrix") {
            Some(Object::Array(values)) => {
                let v: Vec<f32> = values.iter().filter_map(number).collect();
                match v.as_slice() {
                    [a, b, c, d, e, f] => Matrix::new(*a, *b, *c, *d, *e, *f),
                    _ => Matrix::IDENTITY,
                }
            }
            _ => Matrix::IDENTITY,
        };
        let (fonts, xobjects) =
            match dict_get(doc, &stream.dict, b"Resources").and_then(|r| resolve_dict(doc, r)) {
                Some(resources) => (font_table(doc, Some(resources)), xobject_forms(doc, resources)),
                None => (fonts.clone(), xobjects.clone()),
            };
        Some(Self {
            id,
            operations,
            fonts,
            paths: vec![path],
            matrix,
            xobjects,
        })
    }
}

/// A form being painted.
struct Frame {
    form: usize,
    path: Vec<String>,
    /// State stack depth when the form started; its `Q`s never pop below.
    floor: usize,
}

/// A glyph shown by a text operator, in page space.
#[derive(Debug, Clone, PartialEq)]
pub struct ShownGlyph {
    /// Index of the showing operation in the decoded content.
    pub op_index: usize,
    /// Stream holding that operation.
    pub source: ContentSource,
    /// Position of this glyph among the glyphs shown by that operation.
    pub seq: usize,
    pub text: String,
    pub rect: Rect,
    /// Baseline origin in page space.
    pub origin: (f32, f32),
    /// Pen position after the advance, in page space.
    pub end: (f32, f32),
    pub font: String,
    /// Font family (BaseFont without subset tag).
    pub family: String,
    /// Nominal size from `Tf`.
    pub font_size: f32,
    /// Size after the text and graphics transforms.
    pub em: f32,
    pub color: Color,
    /// TJ adjustment that moves the pen exactly as far as this glyph did.
    /// `None` when the font size is zero.
    pub kern_compensation: Option<f32>,
}

#[derive(Debug, Clone)]
struct GraphicsState {
    ctm: Matrix,
    fill: Color,
    char_spacing: f32,
    word_spacing: f32,
    horizontal_scale: f32,
    leading: f32,
    font: Option<String>,
    font_size: f32,
    rise: f32,
}

impl Default for GraphicsState {
    fn default() -> Self {
        Self {
            ctm: Matrix::IDENTITY,
            fill: Color::BLACK,
            char_spacing: 0.0,
            word_spacing: 0.0,
            horizontal_scale: 1.0,
            leading: 0.0,
            font: None,
            font_size: 0.0,
            rise: 0.0,
        }
    }
}

/// Walks decoded operations and records every glyph they show.
pub struct Interpreter<'a> {
    doc: Option<&'a Document>,
    fonts: HashMap<String, FontInfo>,
    xobjects: HashMap<String, ObjectId>,
    forms: Vec<FormContent>,
    frames: Vec<Frame>,
    media_box: Rect,
    state: GraphicsState,
    stack: Vec<GraphicsState>,
    text_matrix: Matrix,
    line_matrix: Matrix,
    glyphs: Vec<ShownGlyph>,
}

impl<'a> Interpreter<'a> {
    pub fn new(fonts: &HashMap<String, FontInfo>, media_box: Rect) -> Self {
        Self {
            doc: None,
            fonts: fonts.clone(),
            xobjects: HashMap::new(),
            forms: Vec::new(),
            frames: Vec::new(),
            media_box,
            state: GraphicsState::default(),
            stack: Vec::new(),
            text_matrix: Matrix::IDENTITY,
            line_matrix: Matrix::IDENTITY,
            glyphs: Vec::new(),
        }
    }

    /// Paint the form XObjects of `resources` when `Do` names them.
    pub fn with_forms(mut self, doc: &'a Document, resources: Option<&Dictionary>) -> Self {
        self.doc = Some(doc);
        self.xobjects = resources
            .map(|resources| xobject_forms(doc, resources))
            .unwrap_or_default();
        self
    }

    pub fn run(self, operations: &[Operation]) -> Vec<ShownGlyph> {
        self.run_with_forms(operations).0
    }

    /// Glyphs of the page and of every form it painted, plus those forms.
    pub fn run_with_forms(mut self, operations: &[Operation]) -> (Vec<ShownGlyph>, Vec<FormContent>) {
        for (index, op) in operations.iter().enumerate() {
            self.apply(index, op);
        }
        (self.glyphs, self.forms)
    }

    fn paint_form(&mut self, resource: &[u8]) {
        let Some(doc) = self.doc else {
            return;
        };
        let resource = String::from_utf8_lossy(resource).into_owned();
        let (fonts, xobjects) = match self.frames.last() {
            Some(frame) => (&self.forms[frame.form].fonts, &self.forms[frame.form].xobjects),
            None => (&self.fonts, &self.xobjects),
        };
        let Some(&id) = xobjects.get(&resource) else {
            return;
        };
        let on_stack = self
            .frames
            .iter()
            .any(|frame| self.forms[frame.form].id == id);
        if on_stack || self.frames.len() >= MAX_FORM_DEPTH {
            return;
        }

        let mut path = self
            .frames
            .last()
            .map(|frame| frame.path.clone())
            .unwrap_or_default();
        path.push(resource);
        let form = match self.forms.iter().position(|form| form.id == id) {
            Some(index) => {
                if !self.forms[index].paths.contains(&path) {
                    self.forms[index].paths.push(path.clone());
                }
                index
            }
            None => {
                let Some(loaded) = FormContent::load(doc, id, fonts, xobjects, path.clone()) else {
                    return;
                };
                self.forms.push(loaded);
                self.forms.len() - 1
            }
        };

        let floor = self.stack.len();
        self.stack.push(self.state.clone());
        let text = (self.text_matrix, self.line_matrix);
        self.state.ctm = self.forms[form].matrix.then(&self.state.ctm);
        self.frames.push(Frame {
            form,
            path,
            floor: floor + 1,
        });

        let operations = std::mem::take(&mut self.forms[form].operations);
        for (index, op) in operations.iter().enumerate() {
            self.apply(index, op);
        }
        self.forms[form].operations = operations;

        self.frames.pop();
        self.stack.truncate(floor + 1);
        if let Some(state) = self.stack.pop() {
            self.state = state;
        }
        (self.text_matrix, self.line_matrix) = text;
    }

    fn apply(&mut self, index: usize, op: &Operation) {
        let nums: Vec<f32> = op.operands.iter().filter_map(number).collect();
        match op.operator.as_str() {
            "q" => self.stack.push(self.state.clone()),
            "Q" => {
                let floor = self.frames.last().map_or(0, |frame| frame.floor);
                if self.stack.len() > floor {
                    if let Some(state) = self.stack.pop() {
                        self.state = state;
                    }
                }
            }
            "Do" => {
                if let Some(Object::Name(resource)) = op.operands.first() {
                    self.paint_form(resource);
                }
            }
            "cm" if nums.len() == 6 => {
                let m = Matrix::new(nums[0], nums[1], nums[2], nums[3], nums[4], nums[5]);
                self.state.ctm = m.then(&self.state.ctm);
            }
            "g" if nums.len() == 1 => self.state.fill = Color::gray(nums[0]),
            "rg" if nums.len() == 3 => self.state.fill = Color::rgb(nums[0], nums[1], nums[2]),
            "k" if nums.len() == 4 => {
                self.state.fill = Color::cmyk(nums[0], nums[1], nums[2], nums[3])
            }
            "sc" | "scn" => match nums.as_slice() {
                [gray] => self.state.fill = Color::gray(*gray),
                [r, g, b] => self.state.fill = Color::rgb(*r, *g, *b),
                [c, m, y, k] => self.state.fill = Color::cmyk(*c, *m, *y, *k),
                _ => {}
            },
            "BT" => {
                self.text_matrix = Matrix::IDENTITY;
                self.line_matrix = Matrix::IDENTITY;
            }
            "Tf" => {
                if let (Some(Object::Name(font)), Some(size)) =
                    (op.operands.first(), op.operands.get(1).and_then(number))
                {
                    self.state.font = Some(String::from_utf8_lossy(font).into_owned());
                    self.state.font_size = size;
                }
            }
            "Tc" if nums.len() == 1 => self.state.char_spacing = nums[0],
            "Tw" if nums.len() == 1 => self.state.word_spacing = nums[0],
            "Tz" if nums.len() == 1 => self.state.horizontal_scale = nums[0] / 100.0,
            "TL" if nums.len() == 1 => self.state.leading = nums[0],
            "Ts" if nums.len() == 1 => self.state.rise = nums[0],
            "Td" if nums.len() == 2 => self.move_line(nums[0], nums[1]),
            "TD" if nums.len() == 2 => {
                self.state.leading = -nums[1];
                self.move_line(nums[0], nums[1]);
            }
            "Tm" if nums.len() == 6 => {
                let m = Matrix::new(nums[0], nums[1], nums[2], nums[3], nums[4], nums[5]);
                self.text_matrix = m;
                self.line_matrix = m;
            }
            "T*" => self.next_line(),
            "Tj" => {
                if let Some(Object::String(bytes, _)) = op.operands.first() {
                    let mut seq = 0;
                    self.show(index, &mut seq, bytes);
                }
            }
            "'" => {
                self.next_line();
                if let Some(Object::String(bytes, _)) = op.operands.first() {
                    let mut seq = 0;
                    self.show(index, &mut seq, bytes);
                }
            }
            "\"" => {
                if let (Some(aw), Some(ac), Some(Object::String(bytes, _))) = (
                    op.operands.first().and_then(number),
                    op.operands.get(1).and_then(number),
                    op.operands.get(2),
                ) {
                    self.state.word_spacing = aw;
                    self.state.char_spacing = ac;
                    self.next_line();
                    let mut seq = 0;
                    self.show(index, &mut seq, bytes);
                }
            }
            "TJ" => {
                if let Some(Object::Array(items)) = op.operands.first() {
                    let mut seq = 0;
                    for item in items {
                        match item {
                            Object::String(bytes, _) => self.show(index, &mut seq, bytes),
                            other => {
                                if let Some(adjust) = number(other) {
                                    let tx = -adjust / 1000.0
                                        * self.state.font_size
                                        * self.state.horizontal_scale;
                                    self.text_matrix =
                                        Matrix::translate(tx, 0.0).then(&self.text_matrix);
                                }
                            }
                        }
                    }
                }
            }
            _ => {}
        }
    }

    fn move_line(&mut self, tx: f32, ty: f32) {
        self.line_matrix = Matrix::translate(tx, ty).then(&self.line_matrix);
        self.text_matrix = self.line_matrix;
    }

    fn next_line(&mut self) {
        self.move_line(0.0, -self.state.leading);
    }

    fn show(&mut self, op_index: usize, seq: &mut usize, bytes: &[u8]) {
        let (fonts, source) = match self.frames.last() {
            Some(frame) => {
                let form = &self.forms[frame.form];
                (&form.fonts, ContentSource::Form(form.id))
            }
            None => (&self.fonts, ContentSource::Page),
        };
        let Some(font) = self.state.font.as_ref().and_then(|name| fonts.get(name)) else {
            return;
        };
        let GraphicsState {
            ctm,
            fill,
            char_spacing,
            word_spacing,
            horizontal_scale: scale,
            font_size: size,
            rise,
            ..
        } = self.state.clone();
        let media_box = self.media_box;
        let to_page = |(x, y): (f32, f32)| (x - media_box.x0, media_box.y1 - y);
        let (asc, desc) = (font.ascent / 1000.0, font.descent / 1000.0);

        for glyph in font.decode(bytes) {
            let spacing = if glyph.byte_len == 1 && glyph.code == 32 {
                char_spacing + word_spacing
            } else {
                char_spacing
            };
            let font_matrix = Matrix::new(size * scale, 0.0, 0.0, size, 0.0, rise);
            let render = font_matrix.then(&self.text_matrix).then(&ctm);

            let w = glyph.width / 1000.0;
            let rect = [(0.0, desc), (w, desc), (0.0, asc), (w, asc)]
                .into_iter()
                .map(|(gx, gy)| to_page(render.apply(gx, gy)))
                .fold(None, |acc: Option<Rect>, (x, y)| {
                    let point = Rect::new(x, y, x, y);
                    Some(acc.map_or(point, |r| r.union(&point)))
                })
                .unwrap_or(Rect::new(0.0, 0.0, 0.0, 0.0));

            let advance = (w * size + spacing) * scale;
            let after = Matrix::translate(advance, 0.0).then(&self.text_matrix);
            let end = to_page(font_matrix.then(&after).then(&ctm).apply(0.0, 0.0));

            let kern_compensation = if size.abs() > f32::EPSILON {
                Some(-(glyph.width + spacing * 1000.0 / size))
            } else {
                None
            };

            self.glyphs.push(ShownGlyph {
                op_index,
                source,
                seq: *seq,
                text: glyph.text,
                rect,
                origin: to_page(render.apply(0.0, 0.0)),
                end,
                font: font.resource_name.clone(),
                family: font.family.clone(),
                font_size: size,
                em: render.vertical_scale(),
                color: fill,
                kern_compensation,
            });
            *seq += 1;
            self.text_matrix = after;
        }
    }
}
