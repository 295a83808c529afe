//! Single-byte encodings and glyph names

use std::collections::HashMap;
use std::sync::OnceLock;

/// WinAnsiEncoding 0x80..=0x9F; the rest of the table is Latin-1.
const WIN_ANSI_HIGH: [Option<char>; 32] = [
    Some('\u{20AC}'),
    None,
    Some('\u{201A}'),
    Some('\u{0192}'),
    Some('\u{201E}'),
    Some('\u{2026}'),
    Some('\u{2020}'),
    Some('\u{2021}'),
    Some('\u{02C6}'),
    Some('\u{2030}'),
    Some('\u{0160}'),
    Some('\u{2039}'),
    Some('\u{0152}'),
    None,
    Some('\u{017D}'),
    None,
    None,
    Some('\u{2018}'),
    Some('\u{2019}'),
    Some('\u{201C}'),
    Some('\u{201D}'),
    Some('\u{2022}'),
    Some('\u{2013}'),
    Some('\u{2014}'),
    Some('\u{02DC}'),
    Some('\u{2122}'),
    Some('\u{0161}'),
    Some('\u{203A}'),
    Some('\u{0153}'),
    None,
    Some('\u{017E}'),
    Some('\u{0178}'),
];

/// Base encoding of a simple font before `/Differences` are applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BaseEncoding {
    WinAnsi,
    /// StandardEncoding, approximated by WinAnsi with curly quotes at 0x27/0x60.
    Standard,
    MacRoman,
}

impl BaseEncoding {
    pub fn from_name(name: &str) -> Self {
        match name {
            "MacRomanEncoding" => BaseEncoding::MacRoman,
            "StandardEncoding" => BaseEncoding::Standard,
            _ => BaseEncoding::WinAnsi,
        }
    }

    pub fn table(self) -> [Option<char>; 256] {
        let mut table = [None; 256];
        for (code, slot) in table.iter_mut().enumerate() {
            *slot = win_ansi_to_char(code as u8);
        }
        match self {
            BaseEncoding::WinAnsi => {}
            BaseEncoding::Standard => {
                table[0x27] = Some('\u{2019}');
                table[0x60] = Some('\u{2018}');
            }
            BaseEncoding::MacRoman => {
                for (offset, ch) in MAC_ROMAN_HIGH.iter().enumerate() {
                    table[0x80 + offset] = Some(*ch);
                }
            }
        }
        table
    }
}

pub fn win_ansi_to_char(code: u8) -> Option<char> {
    match code {
        0x20..=0x7E => Some(code as char),
        0x80..=0x9F => WIN_ANSI_HIGH[(code - 0x80) as usize],
        0xA0..=0xFF => Some(code as char),
        // Some producers emit tabs and line breaks inside strings.
        0x09 | 0x0A | 0x0D => Some(' '),
        _ => None,
    }
}

pub fn char_to_win_ansi(ch: char) -> Option<u8> {
    let cp = ch as u32;
    match cp {
        0x20..=0x7E | 0xA0..=0xFF => Some(cp as u8),
        _ => WIN_ANSI_HIGH
            .iter()
            .position(|c| *c == Some(ch))
            .map(|i| 0x80 + i as u8),
    }
}

/// Encode text for a font using WinAnsiEncoding. Unencodable characters
/// become `?`.
pub fn encode_win_ansi_lossy(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| char_to_win_ansi(c).unwrap_or(b'?'))
        .collect()
}

const MAC_ROMAN_HIGH: [char; 128] = [
    'Ä', 'Å', 'Ç', 'É', 'Ñ', 'Ö', 'Ü', 'á', 'à', 'â', 'ä', 'ã', 'å', 'ç', 'é', 'è', 'ê', 'ë', 'í',
    'ì', 'î', 'ï', 'ñ', 'ó', 'ò', 'ô', 'ö', 'õ', 'ú', 'ù', 'û', 'ü', '†', '°', '¢', '£', '§', '•',
    '¶', 'ß', '®', '©', '™', '´', '¨', '≠', 'Æ', 'Ø', '∞', '±', '≤', '≥', '¥', 'µ', '∂', '∑', '∏',
    'π', '∫', 'ª', 'º', 'Ω', 'æ', 'ø', '¿', '¡', '¬', '√', 'ƒ', '≈', '∆', '«', '»', '…', '\u{A0}',
    'À', 'Ã', 'Õ', 'Œ', 'œ', '–', '—', '“', '”', '‘', '’', '÷', '◊', 'ÿ', 'Ÿ', '⁄', '€', '‹', '›',
    'ﬁ', 'ﬂ', '‡', '·', '‚', '„', '‰', 'Â', 'Ê', 'Á', 'Ë', 'È', 'Í', 'Î', 'Ï', 'Ì', 'Ó', 'Ô',
    '\u{F8FF}', 'Ò', 'Ú', 'Û', 'Ù', 'ı', 'ˆ', '˜', '¯', '˘', '˙', '˚', '¸', '˝', '˛', 'ˇ',
];

const GLYPH_NAMES: &[(&str, char)] = &[
    ("space", ' '),
    ("exclam", '!'),
    ("quotedbl", '"'),
    ("numbersign", '#'),
    ("dollar", '$'),
    ("percent", '%'),
    ("ampersand", '&'),
    ("quotesingle", '\''),
    ("quoteright", '\u{2019}'),
    ("quoteleft", '\u{2018}'),
    ("parenleft", '('),
    ("parenright", ')'),
    ("asterisk", '*'),
    ("plus", '+'),
    ("comma", ','),
    ("hyphen", '-'),
    ("minus", '\u{2212}'),
    ("period", '.'),
    ("slash", '/'),
    ("zero", '0'),
    ("one", '1'),
    ("two", '2'),
    ("three", '3'),
    ("four", '4'),
    ("five", '5'),
    ("six", '6'),
    ("seven", '7'),
    ("eight", '8'),
    ("nine", '9'),
    ("colon", ':'),
    ("semicolon", ';'),
    ("less", '<'),
    ("equal", '='),
    ("greater", '>'),
    ("question", '?'),
    ("at", '@'),
    ("bracketleft", '['),
    ("backslash", '\\'),
    ("bracketright", ']'),
    ("asciicircum", '^'),
    ("underscore", '_'),
    ("grave", '`'),
    ("braceleft", '{'),
    ("bar", '|'),
    ("braceright", '}'),
    ("asciitilde", '~'),
    ("Euro", '€'),
    ("bullet", '•'),
    ("endash", '–'),
    ("emdash", '—'),
    ("quotedblleft", '“'),
    ("quotedblright", '”'),
    ("quotesinglbase", '‚'),
    ("quotedblbase", '„'),
    ("guilsinglleft", '‹'),
    ("guilsinglright", '›'),
    ("guillemotleft", '«'),
    ("guillemotright", '»'),
    ("ellipsis", '…'),
    ("dagger", '†'),
    ("daggerdbl", '‡'),
    ("perthousand", '‰'),
    ("trademark", '™'),
    ("copyright", '©'),
    ("registered", '®'),
    ("degree", '°'),
    ("section", '§'),
    ("paragraph", '¶'),
    ("cent", '¢'),
    ("sterling", '£'),
    ("yen", '¥'),
    ("currency", '¤'),
    ("florin", 'ƒ'),
    ("exclamdown", '¡'),
    ("questiondown", '¿'),
    ("periodcentered", '·'),
    ("multiply", '×'),
    ("divide", '÷'),
    ("plusminus", '±'),
    ("mu", 'µ'),
    ("nbspace", '\u{A0}'),
    ("ordfeminine", 'ª'),
    ("ordmasculine", 'º'),
    ("germandbls", 'ß'),
    ("AE", 'Æ'),
    ("ae", 'æ'),
    ("OE", 'Œ'),
    ("oe", 'œ'),
    ("Oslash", 'Ø'),
    ("oslash", 'ø'),
    ("Eth", 'Ð'),
    ("eth", 'ð'),
    ("Thorn", 'Þ'),
    ("thorn", 'þ'),
    ("dotlessi", 'ı'),
    ("fi", '\u{FB01}'),
    ("fl", '\u{FB02}'),
    ("ff", '\u{FB00}'),
    ("ffi", '\u{FB03}'),
    ("ffl", '\u{FB04}'),
    ("Scaron", 'Š'),
    ("scaron", 'š'),
    ("Zcaron", 'Ž'),
    ("zcaron", 'ž'),
    ("Ydieresis", 'Ÿ'),
    ("Lslash", 'Ł'),
    ("lslash", 'ł'),
];

/// Accented Latin letters are named `<base><accent>`.
fn accented(name: &str) -> Option<char> {
    const SUFFIXES: &[&str] = &[
        "grave",
        "acute",
        "circumflex",
        "tilde",
        "dieresis",
        "ring",
        "cedilla",
    ];
    let mut chars = name.chars();
    let base = chars.next()?;
    let accent = chars.as_str();
    if !base.is_ascii_alphabetic() || !SUFFIXES.contains(&accent) {
        return None;
    }
    // Latin-1 lays accented letters out in a fixed pattern; search it.
    (0xC0u32..=0xFF)
        .filter_map(char::from_u32)
        .find(|c| latin1_decomposition(*c) == Some((base, accent)))
}

/// Base letter and accent name of a Latin-1 or WinAnsi accented letter.
pub fn latin1_decomposition(ch: char) -> Option<(char, &'static str)> {
    let (base, accent) = match ch {
        'À' => ('A', "grave"),
        'Á' => ('A', "acute"),
        'Â' => ('A', "circumflex"),
        'Ã' => ('A', "tilde"),
        'Ä' => ('A', "dieresis"),
        'Å' => ('A', "ring"),
        'Ç' => ('C', "cedilla"),
        'È' => ('E', "grave"),
        'É' => ('E', "acute"),
        'Ê' => ('E', "circumflex"),
        'Ë' => ('E', "dieresis"),
        'Ì' => ('I', "grave"),
        'Í' => ('I', "acute"),
        'Î' => ('I', "circumflex"),
        'Ï' => ('I', "dieresis"),
        'Ñ' => ('N', "tilde"),
        'Ò' => ('O', "grave"),
        'Ó' => ('O', "acute"),
        'Ô' => ('O', "circumflex"),
        'Õ' => ('O', "tilde"),
        'Ö' => ('O', "dieresis"),
        'Ù' => ('U', "grave"),
        'Ú' => ('U', "acute"),
        'Û' => ('U', "circumflex"),
        'Ü' => ('U', "dieresis"),
        'Ý' => ('Y', "acute"),
        'à' => ('a', "grave"),
        'á' => ('a', "acute"),
        'â' => ('a', "circumflex"),
        'ã' => ('a', "tilde"),
        'ä' => ('a', "dieresis"),
        'å' => ('a', "ring"),
        'ç' => ('c', "cedilla"),
        'è' => ('e', "grave"),
        'é' => ('e', "acute"),
        'ê' => ('e', "circumflex"),
        'ë' => ('e', "dieresis"),
        'ì' => ('i', "grave"),
        'í' => ('i', "acute"),
        'î' => ('i', "circumflex"),
        'ï' => ('i', "dieresis"),
        'ñ' => ('n', "tilde"),
        'ò' => ('o', "grave"),
        'ó' => ('o', "acute"),
        'ô' => ('o', "circumflex"),
        'õ' => ('o', "tilde"),
        'ö' => ('o', "dieresis"),
        'ù' => ('u', "grave"),
        'ú' => ('u', "acute"),
        'û' => ('u', "circumflex"),
        'ü' => ('u', "dieresis"),
        'ý' => ('y', "acute"),
        'ÿ' => ('y', "dieresis"),
        'Š' => ('S', "caron"),
        'š' => ('s', "caron"),
        'Ž' => ('Z', "caron"),
        'ž' => ('z', "caron"),
        'Ÿ' => ('Y', "dieresis"),
        _ => return None,
    };
    Some((base, accent))
}

fn glyph_table() -> &'static HashMap<&'static str, char> {
    static TABLE: OnceLock<HashMap<&'static str, char>> = OnceLock::new();
    TABLE.get_or_init(|| GLYPH_NAMES.iter().copied().collect())
}

/// Map a PostScript glyph name to its character.
///
/// Handles the common Latin names, `uniXXXX`, `uXXXX[XX]`, single ASCII
/// letters and suffixed variants such as `a.sc`.
pub fn glyph_name_to_char(name: &str) -> Option<char> {
    let name = name.split('.').next().unwrap_or(name);
    if name.is_empty() {
        return None;
    }
    if let Some(ch) = glyph_table().get(name) {
        return Some(*ch);
    }
    let mut chars = name.chars();
    if let (Some(ch), None) = (chars.next(), chars.next()) {
        if ch.is_ascii_alphabetic() {
            return Some(ch);
        }
    }
    if let Some(hex) = name.strip_prefix("uni") {
        if hex.len() >= 4 {
            return u32::from_str_radix(&hex[..4], 16)
                .ok()
                .and_then(char::from_u32);
        }
    }
    if let Some(hex) = name.strip_prefix('u') {
        if (4..=6).contains(&hex.len()) && hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return u32::from_str_radix(hex, 16).ok().and_then(char::from_u32);
        }
    }
    accented(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_win_ansi_round_trip_for_specials() {
        for ch in ['€', 'Š', '’', '—', 'é', 'A'] {
            let code = char_to_win_ansi(ch).unwrap();
            assert_eq!(win_ansi_to_char(code), Some(ch));
        }
        assert_eq!(char_to_win_ansi('中'), None);
    }

    #[test]
    fn test_lossy_encoding_substitutes_question_mark() {
        assert_eq!(encode_win_ansi_lossy("a中b"), b"a?b".to_vec());
    }

    #[test]
    fn test_glyph_names() {
        assert_eq!(glyph_name_to_char("space"), Some(' '));
        assert_eq!(glyph_name_to_char("eacute"), Some('é'));
        assert_eq!(glyph_name_to_char("Adieresis"), Some('Ä'));
        assert_eq!(glyph_name_to_char("uni20AC"), Some('€'));
        assert_eq!(glyph_name_to_char("u1F600"), Some('😀'));
        assert_eq!(glyph_name_to_char("a.sc"), Some('a'));
        assert_eq!(glyph_name_to_char("g123"), None);
    }

    #[test]
    fn test_mac_roman_high_half() {
        let table = BaseEncoding::MacRoman.table();
        assert_eq!(table[0x80], Some('Ä'));
        assert_eq!(table[0xD5], Some('’'));
        assert_eq!(table[b'A' as usize], Some('A'));
    }
}
