//! The fourteen standard PDF faces and their approximate metrics
//!
//! Widths cover printable ASCII; accented Latin letters reuse the width of
//! their base letter and anything else gets the face's average width.
//! Oblique and italic variants share the metrics of their upright face.

use super::encoding::latin1_decomposition;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StandardFace {
    Helvetica,
    HelveticaBold,
    HelveticaOblique,
    HelveticaBoldOblique,
    TimesRoman,
    TimesBold,
    TimesItalic,
    TimesBoldItalic,
    Courier,
    CourierBold,
    CourierOblique,
    CourierBoldOblique,
    Symbol,
    ZapfDingbats,
}

#[rustfmt::skip]
const HELVETICA: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278,
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 278, 278, 584, 584, 584, 556,
    1015, 667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, 722, 778,
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 278, 278, 278, 469, 556,
    333, 556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, 556, 556,
    556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, 334, 260, 334, 584,
];

#[rustfmt::skip]
const HELVETICA_BOLD: [u16; 95] = [
    278, 333, 474, 556, 556, 889, 722, 238, 333, 333, 389, 584, 278, 333, 278, 278,
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 333, 333, 584, 584, 584, 611,
    975, 722, 722, 722, 722, 667, 611, 778, 722, 278, 556, 722, 611, 833, 722, 778,
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 333, 278, 333, 584, 556,
    333, 556, 611, 556, 611, 556, 333, 611, 611, 278, 278, 556, 278, 889, 611, 611,
    611, 611, 389, 556, 333, 611, 556, 778, 556, 556, 500, 389, 280, 389, 584,
];

#[rustfmt::skip]
const TIMES_ROMAN: [u16; 95] = [
    250, 333, 408, 500, 500, 833, 778, 180, 333, 333, 500, 564, 250, 333, 250, 278,
    500, 500, 500, 500, 500, 500, 500, 500, 500, 500, 278, 278, 564, 564, 564, 444,
    921, 722, 667, 667, 722, 611, 556, 722, 722, 333, 389, 722, 611, 889, 722, 722,
    556, 722, 667, 556, 611, 722, 722, 944, 722, 722, 611, 333, 278, 333, 469, 500,
    333, 444, 500, 444, 500, 444, 333, 500, 500, 278, 278, 500, 278, 778, 500, 500,
    500, 500, 333, 389, 278, 500, 500, 722, 500, 500, 444, 480, 200, 480, 541,
];

#[rustfmt::skip]
const TIMES_BOLD: [u16; 95] = [
    250, 333, 555, 500, 500, 1000, 833, 278, 333, 333, 500, 570, 250, 333, 250, 278,
    500, 500, 500, 500, 500, 500, 500, 500, 500, 500, 333, 333, 570, 570, 570, 500,
    930, 722, 667, 722, 722, 667, 611, 778, 778, 389, 500, 778, 667, 944, 722, 778,
    611, 778, 722, 556, 667, 722, 722, 1000, 722, 722, 667, 333, 278, 333, 581, 500,
    333, 500, 556, 444, 556, 444, 333, 500, 556, 278, 333, 556, 278, 833, 556, 500,
    556, 556, 444, 389, 333, 556, 500, 722, 500, 500, 444, 394, 220, 394, 520,
];

impl StandardFace {
    pub const ALL: [StandardFace; 14] = [
        StandardFace::Helvetica,
        StandardFace::HelveticaBold,
        StandardFace::HelveticaOblique,
        StandardFace::HelveticaBoldOblique,
        StandardFace::TimesRoman,
        StandardFace::TimesBold,
        StandardFace::TimesItalic,
        StandardFace::TimesBoldItalic,
        StandardFace::Courier,
        StandardFace::CourierBold,
        StandardFace::CourierOblique,
        StandardFace::CourierBoldOblique,
        StandardFace::Symbol,
        StandardFace::ZapfDingbats,
    ];

    /// The `/BaseFont` name written into new font dictionaries.
    pub fn base_font(&self) -> &'static str {
        match self {
            StandardFace::Helvetica => "Helvetica",
            StandardFace::HelveticaBold => "Helvetica-Bold",
            StandardFace::HelveticaOblique => "Helvetica-Oblique",
            StandardFace::HelveticaBoldOblique => "Helvetica-BoldOblique",
            StandardFace::TimesRoman => "Times-Roman",
            StandardFace::TimesBold => "Times-Bold",
            StandardFace::TimesItalic => "Times-Italic",
            StandardFace::TimesBoldItalic => "Times-BoldItalic",
            StandardFace::Courier => "Courier",
            StandardFace::CourierBold => "Courier-Bold",
            StandardFace::CourierOblique => "Courier-Oblique",
            StandardFace::CourierBoldOblique => "Courier-BoldOblique",
            StandardFace::Symbol => "Symbol",
            StandardFace::ZapfDingbats => "ZapfDingbats",
        }
    }

    /// Resolve a canonical name, a short alias (`helv`, `tiro`, ...) or a
    /// metric-compatible system name (`ArialMT`, ...).
    pub fn from_name(name: &str) -> Option<StandardFace> {
        if let Some(face) = Self::ALL.iter().find(|f| f.base_font() == name) {
            return Some(*face);
        }
        let face = match name.to_ascii_lowercase().as_str() {
            "helv" | "helvetica" | "arial" | "arialmt" => StandardFace::Helvetica,
            "hebo" | "helvetica-bold" | "arial-bold" | "arial-boldmt" | "arial,bold" => {
                StandardFace::HelveticaBold
            }
            "heit" | "helvetica-oblique" | "helvetica-italic" | "arial-italicmt"
            | "arial,italic" => StandardFace::HelveticaOblique,
            "hebi" | "helvetica-boldoblique" | "arial-bolditalicmt" | "arial,bolditalic" => {
                StandardFace::HelveticaBoldOblique
            }
            "tiro" | "times" | "times-roman" | "timesnewroman" | "timesnewromanpsmt" => {
                StandardFace::TimesRoman
            }
            "tibo" | "times-bold" | "timesnewroman,bold" | "timesnewromanps-boldmt" => {
                StandardFace::TimesBold
            }
            "tiit" | "times-italic" | "timesnewroman,italic" | "timesnewromanps-italicmt" => {
                StandardFace::TimesItalic
            }
            "tibi" | "times-bolditalic" | "timesnewroman,bolditalic"
            | "timesnewromanps-bolditalicmt" => StandardFace::TimesBoldItalic,
            "cour" | "courier" | "couriernew" | "couriernewpsmt" => StandardFace::Courier,
            "cobo" | "courier-bold" | "couriernew,bold" | "couriernewps-boldmt" => {
                StandardFace::CourierBold
            }
            "coit" | "courier-oblique" | "couriernew,italic" | "couriernewps-italicmt" => {
                StandardFace::CourierOblique
            }
            "cobi" | "courier-boldoblique" | "couriernew,bolditalic"
            | "couriernewps-bolditalicmt" => StandardFace::CourierBoldOblique,
            "symb" | "symbol" => StandardFace::Symbol,
            "zadb" | "zapfdingbats" => StandardFace::ZapfDingbats,
            _ => return None,
        };
        Some(face)
    }

    fn ascii_widths(&self) -> Option<&'static [u16; 95]> {
        match self {
            StandardFace::Helvetica | StandardFace::HelveticaOblique => Some(&HELVETICA),
            StandardFace::HelveticaBold | StandardFace::HelveticaBoldOblique => {
                Some(&HELVETICA_BOLD)
            }
            StandardFace::TimesRoman | StandardFace::TimesItalic => Some(&TIMES_ROMAN),
            StandardFace::TimesBold | StandardFace::TimesBoldItalic => Some(&TIMES_BOLD),
            _ => None,
        }
    }

    fn average_width(&self) -> f32 {
        match self {
            StandardFace::Helvetica
            | StandardFace::HelveticaOblique
            | StandardFace::HelveticaBold
            | StandardFace::HelveticaBoldOblique => 556.0,
            StandardFace::TimesRoman
            | StandardFace::TimesItalic
            | StandardFace::TimesBold
            | StandardFace::TimesBoldItalic => 500.0,
            StandardFace::Courier
            | StandardFace::CourierBold
            | StandardFace::CourierOblique
            | StandardFace::CourierBoldOblique => 600.0,
            StandardFace::Symbol | StandardFace::ZapfDingbats => 600.0,
        }
    }

    /// Advance width of `ch` in 1/1000 em.
    pub fn char_width(&self, ch: char) -> f32 {
        let Some(table) = self.ascii_widths() else {
            return self.average_width();
        };
        let ch = latin1_decomposition(ch).map(|(base, _)| base).unwrap_or(ch);
        match ch as u32 {
            cp @ 0x20..=0x7E => table[(cp - 0x20) as usize] as f32,
            0xA0 => table[0] as f32,
            _ => self.average_width(),
        }
    }

    pub fn text_width(&self, text: &str, size: f32) -> f32 {
        text.chars().map(|c| self.char_width(c)).sum::<f32>() * size / 1000.0
    }

    /// Ascender and descender in 1/1000 em.
    pub fn ascent_descent(&self) -> (f32, f32) {
        match self {
            StandardFace::Helvetica
            | StandardFace::HelveticaOblique
            | StandardFace::HelveticaBold
            | StandardFace::HelveticaBoldOblique => (718.0, -207.0),
            StandardFace::TimesRoman
            | StandardFace::TimesItalic
            | StandardFace::TimesBold
            | StandardFace::TimesBoldItalic => (683.0, -217.0),
            StandardFace::Courier
            | StandardFace::CourierBold
            | StandardFace::CourierOblique
            | StandardFace::CourierBoldOblique => (629.0, -157.0),
            StandardFace::Symbol | StandardFace::ZapfDingbats => (800.0, -200.0),
        }
    }

    pub fn is_serif(&self) -> bool {
        matches!(
            self,
            StandardFace::TimesRoman
                | StandardFace::TimesBold
                | StandardFace::TimesItalic
                | StandardFace::TimesBoldItalic
        )
    }
}
