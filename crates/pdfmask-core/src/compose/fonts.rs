//! Replacement font resolution
//!
//! Replacement text is drawn with the first font a fixed chain of
//! strategies can produce: the page's own font resource, a standalone face
//! looked up by exact or normalized family name, the standard sans face
//! (for families that are not serif), the standard serif face, and finally
//! Helvetica with lossy encoding, which always succeeds.

use crate::text::encoding::{char_to_win_ansi, encode_win_ansi_lossy, win_ansi_to_char};
use crate::text::font::FontInfo;
use crate::text::standard::StandardFace;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

/// One step of the resolution chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FontStrategy {
    PageResource,
    ExactName,
    NormalizedName,
    SansFallback,
    SerifFallback,
    BaseFace,
}

impl FontStrategy {
    /// Attempt order. `BaseFace` is last and never misses.
    pub const CHAIN: [FontStrategy; 6] = [
        FontStrategy::PageResource,
        FontStrategy::ExactName,
        FontStrategy::NormalizedName,
        FontStrategy::SansFallback,
        FontStrategy::SerifFallback,
        FontStrategy::BaseFace,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FontStrategy::PageResource => "page_resource",
            FontStrategy::ExactName => "exact_name",
            FontStrategy::NormalizedName => "normalized_name",
            FontStrategy::SansFallback => "sans_fallback",
            FontStrategy::SerifFallback => "serif_fallback",
            FontStrategy::BaseFace => "base_face",
        }
    }
}

/// Lowercase alphanumeric key, so `Family-Bold`, `Family_Bold` and
/// `FamilyBold` collide.
pub fn normalize_family(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(|c| c.to_lowercase())
        .collect()
}

/// A TrueType face read from disk, with the metrics needed to embed it as a
/// simple WinAnsi font.
#[derive(Debug)]
pub struct TrueTypeFace {
    pub postscript_name: String,
    pub full_name: Option<String>,
    pub data: Vec<u8>,
    /// Advance per WinAnsi code in 1/1000 em.
    pub widths: [f32; 256],
    covered: [bool; 256],
    pub ascent: f32,
    pub descent: f32,
    pub cap_height: f32,
    pub bbox: [f32; 4],
    pub flags: i64,
}

impl TrueTypeFace {
    /// Parse a single-face TrueType file. Collections and CFF-flavoured
    /// OpenType files are rejected since they cannot go into `FontFile2`.
    pub fn parse(data: Vec<u8>) -> Option<Self> {
        let face = ttf_parser::Face::parse(&data, 0).ok()?;
        if face.tables().glyf.is_none() {
            return None;
        }
        let units_per_em = face.units_per_em() as f32;
        if units_per_em <= 0.0 {
            return None;
        }
        let scale = 1000.0 / units_per_em;

        let mut postscript_name = None;
        let mut full_name = None;
        for name in face.names() {
            if !name.is_unicode() {
                continue;
            }
            if name.name_id == ttf_parser::name_id::POST_SCRIPT_NAME && postscript_name.is_none() {
                postscript_name = name.to_string();
            } else if name.name_id == ttf_parser::name_id::FULL_NAME && full_name.is_none() {
                full_name = name.to_string();
            }
        }
        let postscript_name: String = postscript_name
            .or_else(|| full_name.clone())?
            .chars()
            .filter(|c| c.is_ascii_graphic() && !"()<>[]{}/%#".contains(*c))
            .collect();
        if postscript_name.is_empty() {
            return None;
        }

        let mut widths = [0.0f32; 256];
        let mut covered = [false; 256];
        for code in 0u8..=255 {
            let Some(ch) = win_ansi_to_char(code) else {
                continue;
            };
            if let Some(gid) = face.glyph_index(ch) {
                covered[code as usize] = true;
                widths[code as usize] =
                    face.glyph_hor_advance(gid).unwrap_or(0) as f32 * scale;
            }
        }

        let bounds = face.global_bounding_box();
        let ascent = face.ascender() as f32 * scale;
        let mut flags = 32;
        if face.is_monospaced() {
            flags |= 1;
        }
        if face.is_italic() {
            flags |= 64;
        }
        let cap_height = face
            .capital_height()
            .map(|h| h as f32 * scale)
            .unwrap_or(ascent);

        Some(Self {
            postscript_name,
            full_name,
            widths,
            covered,
            ascent,
            descent: face.descender() as f32 * scale,
            cap_height,
            bbox: [
                bounds.x_min as f32 * scale,
                bounds.y_min as f32 * scale,
                bounds.x_max as f32 * scale,
                bounds.y_max as f32 * scale,
            ],
            flags,
            data,
        })
    }

    /// WinAnsi bytes for `text`, if the face has a glyph for every character.
    pub fn encode(&self, text: &str) -> Option<Vec<u8>> {
        text.chars()
            .map(|ch| char_to_win_ansi(ch).filter(|code| self.covered[*code as usize]))
            .collect()
    }
}

/// A font that does not come from the page: a standard face or a TrueType
/// file that gets embedded.
#[derive(Debug, Clone)]
pub enum FontAsset {
    Standard(StandardFace),
    TrueType(Arc<TrueTypeFace>),
}

impl FontAsset {
    /// `/BaseFont` of the dictionary written for this asset; also the key
    /// used to embed each asset once per document.
    pub fn base_font(&self) -> &str {
        match self {
            FontAsset::Standard(face) => face.base_font(),
            FontAsset::TrueType(face) => &face.postscript_name,
        }
    }

    /// Strict WinAnsi encoding; `None` when a character cannot be drawn.
    pub fn encode(&self, text: &str) -> Option<Vec<u8>> {
        match self {
            FontAsset::Standard(StandardFace::Symbol | StandardFace::ZapfDingbats) => None,
            FontAsset::Standard(_) => text.chars().map(char_to_win_ansi).collect(),
            FontAsset::TrueType(face) => face.encode(text),
        }
    }
}

/// Standalone faces available for replacement text.
#[derive(Debug, Default)]
pub struct FontCatalog {
    faces: Vec<Arc<TrueTypeFace>>,
    exact: HashMap<String, usize>,
    normalized: HashMap<String, usize>,
}

impl FontCatalog {
    /// Catalog holding only the standard faces.
    pub fn standard() -> Self {
        Self::default()
    }

    /// Scan `dirs` for `.ttf` files. Unreadable or unsupported files are
    /// logged and skipped.
    pub fn load(dirs: &[PathBuf]) -> Self {
        let mut catalog = Self::default();
        for dir in dirs {
            let entries = match fs::read_dir(dir) {
                Ok(entries) => entries,
                Err(e) => {
                    warn!(dir = %dir.display(), error = %e, "Cannot read font directory");
                    continue;
                }
            };
            let mut paths: Vec<PathBuf> = entries
                .filter_map(|entry| entry.ok().map(|e| e.path()))
                .filter(|path| is_truetype_file(path))
                .collect();
            paths.sort();
            for path in paths {
                match fs::read(&path).ok().and_then(TrueTypeFace::parse) {
                    Some(face) => {
                        let stem = path.file_stem().map(|s| s.to_string_lossy().into_owned());
                        catalog.add(face, stem.as_deref());
                    }
                    None => debug!(path = %path.display(), "Skipping unsupported font file"),
                }
            }
        }
        debug!(faces = catalog.faces.len(), "Font catalog loaded");
        catalog
    }

    /// Register a face under its PostScript name, full name and `stem`.
    /// Earlier registrations win on name clashes.
    pub fn add(&mut self, face: TrueTypeFace, stem: Option<&str>) {
        let index = self.faces.len();
        let names: Vec<String> = [
            Some(face.postscript_name.clone()),
            face.full_name.clone(),
            stem.map(str::to_string),
        ]
        .into_iter()
        .flatten()
        .collect();
        for name in names {
            self.normalized.entry(normalize_family(&name)).or_insert(index);
            self.exact.entry(name).or_insert(index);
        }
        self.faces.push(Arc::new(face));
    }

    pub fn len(&self) -> usize {
        self.faces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.faces.is_empty()
    }

    /// Face whose name is exactly `family`.
    pub fn by_exact_name(&self, family: &str) -> Option<FontAsset> {
        if let Some(index) = self.exact.get(family) {
            return Some(FontAsset::TrueType(self.faces[*index].clone()));
        }
        StandardFace::ALL
            .iter()
            .find(|face| face.base_font() == family)
            .map(|face| FontAsset::Standard(*face))
    }

    /// Face whose name matches `family` once separators and case are
    /// ignored, including the standard face aliases.
    pub fn by_normalized_name(&self, family: &str) -> Option<FontAsset> {
        let key = normalize_family(family);
        if key.is_empty() {
            return None;
        }
        if let Some(index) = self.normalized.get(&key) {
            return Some(FontAsset::TrueType(self.faces[*index].clone()));
        }
        StandardFace::from_name(family)
            .or_else(|| {
                StandardFace::ALL
                    .iter()
                    .find(|face| normalize_family(face.base_font()) == key)
                    .copied()
            })
            .map(FontAsset::Standard)
    }
}

fn is_truetype_file(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.eq_ignore_ascii_case("ttf"))
        .unwrap_or(false)
}

/// Where the glyphs of a replacement come from.
#[derive(Debug, Clone)]
pub enum FontSource {
    /// An existing `/Font` resource of the page.
    Page(String),
    Asset(FontAsset),
}

/// Outcome of the chain: the font, the encoded string and which strategy
/// produced it.
#[derive(Debug, Clone)]
pub struct Resolution {
    pub strategy: FontStrategy,
    pub source: FontSource,
    pub bytes: Vec<u8>,
}

/// Inputs to the chain for one replacement.
pub struct FontRequest<'a> {
    pub family: &'a str,
    pub text: &'a str,
    /// Fonts of the page, by resource name.
    pub page_fonts: &'a HashMap<String, FontInfo>,
    /// Characters each page font already draws on the page.
    pub shown: &'a HashMap<String, HashSet<char>>,
    pub catalog: &'a FontCatalog,
}

impl FontRequest<'_> {
    /// A subset font is only trusted with characters it already drew.
    fn already_shown(&self, info: &FontInfo) -> bool {
        let Some(shown) = self.shown.get(&info.resource_name) else {
            return false;
        };
        self.text.chars().all(|ch| shown.contains(&ch))
    }
}

impl FontStrategy {
    /// Try this strategy alone.
    pub fn attempt(&self, request: &FontRequest<'_>) -> Option<Resolution> {
        let (source, bytes) = match self {
            FontStrategy::PageResource => {
                let mut candidates: Vec<&FontInfo> = request
                    .page_fonts
                    .values()
                    .filter(|info| info.family == request.family)
                    .filter(|info| !info.is_subset || request.already_shown(info))
                    .collect();
                candidates.sort_by(|a, b| a.resource_name.cmp(&b.resource_name));
                candidates.into_iter().find_map(|info| {
                    info.encode(request.text)
                        .map(|bytes| (FontSource::Page(info.resource_name.clone()), bytes))
                })?
            }
            FontStrategy::ExactName => {
                asset_source(request.catalog.by_exact_name(request.family)?, request.text)?
            }
            FontStrategy::NormalizedName => {
                asset_source(request.catalog.by_normalized_name(request.family)?, request.text)?
            }
            FontStrategy::SansFallback if !is_serif_family(request.family) => {
                asset_source(FontAsset::Standard(StandardFace::Helvetica), request.text)?
            }
            FontStrategy::SerifFallback => {
                asset_source(FontAsset::Standard(StandardFace::TimesRoman), request.text)?
            }
            FontStrategy::SansFallback => return None,
            FontStrategy::BaseFace => (
                FontSource::Asset(FontAsset::Standard(StandardFace::Helvetica)),
                encode_win_ansi_lossy(request.text),
            ),
        };
        Some(Resolution {
            strategy: *self,
            source,
            bytes,
        })
    }
}

/// Family names that render with serifs, so a sans stand-in would change
/// the look of the text.
pub fn is_serif_family(family: &str) -> bool {
    const SERIF_HINTS: [&str; 12] = [
        "times", "tiro", "roman", "serif", "georgia", "garamond", "cambria", "palatino",
        "minion", "baskerville", "bodoni", "century",
    ];
    let key = normalize_family(family);
    if key.contains("sans") {
        return false;
    }
    SERIF_HINTS.iter().any(|hint| key.contains(hint))
}

fn asset_source(asset: FontAsset, text: &str) -> Option<(FontSource, Vec<u8>)> {
    let bytes = asset.encode(text)?;
    Some((FontSource::Asset(asset), bytes))
}

/// Run the chain; the first strategy that succeeds wins.
pub fn resolve(request: &FontRequest<'_>) -> Resolution {
    first_success(&FontStrategy::CHAIN, request).unwrap_or_else(|| Resolution {
        strategy: FontStrategy::BaseFace,
        source: FontSource::Asset(FontAsset::Standard(StandardFace::Helvetica)),
        bytes: encode_win_ansi_lossy(request.text),
    })
}

pub fn first_success(chain: &[FontStrategy], request: &FontRequest<'_>) -> Option<Resolution> {
    chain.iter().find_map(|strategy| {
        let resolution = strategy.attempt(request);
        if resolution.is_none() {
            debug!(
                strategy = strategy.as_str(),
                family = request.family,
                "Font strategy missed"
            );
        }
        resolution
    })
}
