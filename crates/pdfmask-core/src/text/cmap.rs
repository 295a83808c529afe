//! `/ToUnicode` CMap parsing (codespace ranges, bfchar and bfrange)

use std::collections::HashMap;

/// Upper bound on codes expanded from a single bfrange.
const MAX_RANGE_SPAN: u32 = 0x1_0000;

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Hex(Vec<u8>),
    Word(String),
    ArrayStart,
    ArrayEnd,
}

fn tokenize(data: &[u8]) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut i = 0;
    while i < data.len() {
        let b = data[i];
        match b {
            b'%' => {
                while i < data.len() && data[i] != b'\n' && data[i] != b'\r' {
                    i += 1;
                }
            }
            b'<' if data.get(i + 1) == Some(&b'<') => i += 2,
            b'>' if data.get(i + 1) == Some(&b'>') => i += 2,
            b'<' => {
                let start = i + 1;
                let mut end = start;
                while end < data.len() && data[end] != b'>' {
                    end += 1;
                }
                tokens.push(Token::Hex(decode_hex(&data[start..end])));
                i = end + 1;
            }
            b'[' => {
                tokens.push(Token::ArrayStart);
                i += 1;
            }
            b']' => {
                tokens.push(Token::ArrayEnd);
                i += 1;
            }
            b'(' => {
                // Literal strings only appear in the CIDSystemInfo header.
                let mut depth = 0usize;
                while i < data.len() {
                    match data[i] {
                        b'\\' => i += 1,
                        b'(' => depth += 1,
                        b')' => {
                            depth -= 1;
                            if depth == 0 {
                                break;
                            }
                        }
                        _ => {}
                    }
                    i += 1;
                }
                i += 1;
            }
            _ if b.is_ascii_whitespace() => i += 1,
            _ => {
                let start = i;
                while i < data.len()
                    && !data[i].is_ascii_whitespace()
                    && !matches!(data[i], b'<' | b'>' | b'[' | b']' | b'(' | b'%')
                {
                    i += 1;
                }
                if i == start {
                    i += 1;
                    continue;
                }
                tokens.push(Token::Word(
                    String::from_utf8_lossy(&data[start..i]).into_owned(),
                ));
            }
        }
    }
    tokens
}

fn decode_hex(digits: &[u8]) -> Vec<u8> {
    let nibbles: Vec<u8> = digits
        .iter()
        .filter_map(|d| (*d as char).to_digit(16).map(|v| v as u8))
        .collect();
    nibbles
        .chunks(2)
        .map(|pair| (pair[0] << 4) | pair.get(1).copied().unwrap_or(0))
        .collect()
}

fn code_value(bytes: &[u8]) -> u32 {
    bytes.iter().fold(0u32, |acc, b| (acc << 8) | *b as u32)
}

fn utf16_text(bytes: &[u8]) -> String {
    let units: Vec<u16> = bytes
        .chunks(2)
        .map(|c| u16::from_be_bytes([c[0], c.get(1).copied().unwrap_or(0)]))
        .collect();
    String::from_utf16_lossy(&units)
}

/// Add `offset` to the last UTF-16 unit of a bfrange destination.
fn offset_destination(dst: &[u8], offset: u32) -> String {
    let mut bytes = dst.to_vec();
    if bytes.len() >= 2 {
        let n = bytes.len();
        let last = u16::from_be_bytes([bytes[n - 2], bytes[n - 1]]) as u32 + offset;
        let [hi, lo] = (last as u16).to_be_bytes();
        bytes[n - 2] = hi;
        bytes[n - 1] = lo;
    } else if let Some(b) = bytes.last_mut() {
        *b = b.wrapping_add(offset as u8);
    }
    utf16_text(&bytes)
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct CodespaceRange {
    len: usize,
    low: u32,
    high: u32,
}

/// Parsed `/ToUnicode` map.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToUnicodeMap {
    entries: HashMap<u32, String>,
    codespace: Vec<CodespaceRange>,
    /// Byte length of the source codes seen in bfchar/bfrange entries.
    source_len: Option<usize>,
}

impl ToUnicodeMap {
    pub fn parse(data: &[u8]) -> Self {
        let tokens = tokenize(data);
        let mut map = ToUnicodeMap::default();
        let mut i = 0;
        while i < tokens.len() {
            match &tokens[i] {
                Token::Word(w) if w == "begincodespacerange" => {
                    i += 1;
                    while let (Some(Token::Hex(lo)), Some(Token::Hex(hi))) =
                        (tokens.get(i), tokens.get(i + 1))
                    {
                        map.codespace.push(CodespaceRange {
                            len: lo.len().max(1),
                            low: code_value(lo),
                            high: code_value(hi),
                        });
                        i += 2;
                    }
                }
                Token::Word(w) if w == "beginbfchar" => {
                    i += 1;
                    while let (Some(Token::Hex(src)), Some(Token::Hex(dst))) =
                        (tokens.get(i), tokens.get(i + 1))
                    {
                        map.note_source_len(src.len());
                        map.entries.insert(code_value(src), utf16_text(dst));
                        i += 2;
                    }
                }
                Token::Word(w) if w == "beginbfrange" => {
                    i += 1;
                    i = map.parse_ranges(&tokens, i);
                }
                _ => i += 1,
            }
        }
        map
    }

    fn parse_ranges(&mut self, tokens: &[Token], mut i: usize) -> usize {
        while let (Some(Token::Hex(lo)), Some(Token::Hex(hi))) = (tokens.get(i), tokens.get(i + 1))
        {
            self.note_source_len(lo.len());
            let low = code_value(lo);
            let high = code_value(hi).min(low.saturating_add(MAX_RANGE_SPAN));
            match tokens.get(i + 2) {
                Some(Token::Hex(dst)) => {
                    for code in low..=high {
                        self.entries
                            .insert(code, offset_destination(dst, code - low));
                    }
                    i += 3;
                }
                Some(Token::ArrayStart) => {
                    i += 3;
                    let mut code = low;
                    while let Some(Token::Hex(dst)) = tokens.get(i) {
                        if code <= high {
                            self.entries.insert(code, utf16_text(dst));
                        }
                        code += 1;
                        i += 1;
                    }
                    if tokens.get(i) == Some(&Token::ArrayEnd) {
                        i += 1;
                    }
                }
                _ => return i + 2,
            }
        }
        i
    }

    fn note_source_len(&mut self, len: usize) {
        if self.source_len.is_none() && len > 0 {
            self.source_len = Some(len);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn lookup(&self, code: u32) -> Option<&str> {
        self.entries.get(&code).map(String::as_str)
    }

    /// Split a string operand into `(code, byte_len)` pairs using the
    /// codespace ranges, falling back to `default_len`-byte codes.
    pub fn split_codes(&self, bytes: &[u8], default_len: usize) -> Vec<(u32, usize)> {
        let mut codes = Vec::new();
        let mut i = 0;
        while i < bytes.len() {
            let len = self
                .codespace
                .iter()
                .find(|range| {
                    i + range.len <= bytes.len() && {
                        let code = code_value(&bytes[i..i + range.len]);
                        code >= range.low && code <= range.high
                    }
                })
                .map(|range| range.len)
                .or(self.source_len.filter(|_| self.codespace.is_empty()))
                .unwrap_or(default_len)
                .min(bytes.len() - i)
                .max(1);
            codes.push((code_value(&bytes[i..i + len]), len));
            i += len;
        }
        codes
    }

    /// Byte width of every code when the map uses a single width.
    pub fn code_len(&self) -> Option<usize> {
        let mut lens = self.codespace.iter().map(|r| r.len);
        match lens.next() {
            Some(first) if lens.all(|l| l == first) => Some(first),
            Some(_) => None,
            None => self.source_len,
        }
    }

    /// Inverse map for single-character destinations. When several codes
    /// map to one character, the lowest code wins.
    pub fn reverse(&self) -> HashMap<char, u32> {
        let mut reverse: HashMap<char, u32> = HashMap::new();
        for (code, text) in &self.entries {
            let mut chars = text.chars();
            if let (Some(ch), None) = (chars.next(), chars.next()) {
                reverse
                    .entry(ch)
                    .and_modify(|existing| *existing = (*existing).min(*code))
                    .or_insert(*code);
            }
        }
        reverse
    }
}
