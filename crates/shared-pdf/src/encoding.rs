//! Font-aware string decoding
//!
//! Strings shown with a font are decoded through its ToUnicode CMap when it
//! has one, otherwise through its single-byte encoding (WinAnsi base plus
//! `/Differences`). Composite fonts without a ToUnicode map, and strings shown
//! with no font at all, fall back to [`decode_raw`].

use std::collections::HashMap;

use lopdf::{Dictionary, Document, Object};

use crate::parser::resolve;

/// Upper bound on the codes one `bfrange` entry expands to
const MAX_RANGE_SPAN: u32 = 0xFFFF;

/// WinAnsiEncoding 0x80..=0x9F; the other codes match Latin-1
const WIN_ANSI_HIGH: [char; 32] = [
    '\u{20AC}', '\u{81}', '\u{201A}', '\u{192}', '\u{201E}', '\u{2026}', '\u{2020}', '\u{2021}',
    '\u{2C6}', '\u{2030}', '\u{160}', '\u{2039}', '\u{152}', '\u{8D}', '\u{17D}', '\u{8F}',
    '\u{90}', '\u{2018}', '\u{2019}', '\u{201C}', '\u{201D}', '\u{2022}', '\u{2013}', '\u{2014}',
    '\u{2DC}', '\u{2122}', '\u{161}', '\u{203A}', '\u{153}', '\u{9D}', '\u{17E}', '\u{178}',
];

/// Glyph names likely to appear in `/Differences` of contract documents
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
    ("parenleft", '('),
    ("parenright", ')'),
    ("asterisk", '*'),
    ("plus", '+'),
    ("comma", ','),
    ("hyphen", '-'),
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
    ("underscore", '_'),
    ("bar", '|'),
    ("section", '\u{A7}'),
    ("degree", '\u{B0}'),
    ("ordfeminine", '\u{AA}'),
    ("ordmasculine", '\u{BA}'),
    ("Aacute", '\u{C1}'),
    ("Acircumflex", '\u{C2}'),
    ("Atilde", '\u{C3}'),
    ("Agrave", '\u{C0}'),
    ("Ccedilla", '\u{C7}'),
    ("Eacute", '\u{C9}'),
    ("Ecircumflex", '\u{CA}'),
    ("Iacute", '\u{CD}'),
    ("Oacute", '\u{D3}'),
    ("Ocircumflex", '\u{D4}'),
    ("Otilde", '\u{D5}'),
    ("Uacute", '\u{DA}'),
    ("aacute", '\u{E1}'),
    ("acircumflex", '\u{E2}'),
    ("atilde", '\u{E3}'),
    ("agrave", '\u{E0}'),
    ("ccedilla", '\u{E7}'),
    ("eacute", '\u{E9}'),
    ("ecircumflex", '\u{EA}'),
    ("iacute", '\u{ED}'),
    ("oacute", '\u{F3}'),
    ("ocircumflex", '\u{F4}'),
    ("otilde", '\u{F5}'),
    ("uacute", '\u{FA}'),
];

/// How the strings of one font resource are turned into text
#[derive(Debug, Clone)]
pub(crate) enum FontDecoder {
    /// Single-byte font: one char per code
    Simple(Vec<char>),
    /// ToUnicode CMap; simple fonts keep their byte table for unmapped codes
    Mapped {
        cmap: ToUnicode,
        fallback: Option<Vec<char>>,
    },
    /// Composite font with no ToUnicode map
    Opaque,
}

impl FontDecoder {
    pub(crate) fn for_font(doc: &Document, font: &Dictionary) -> Self {
        let composite = matches!(font.get(b"Subtype"), Ok(Object::Name(n)) if n == b"Type0");

        let cmap = font
            .get(b"ToUnicode")
            .ok()
            .and_then(|obj| resolve(doc, obj).ok())
            .and_then(|obj| obj.as_stream().ok())
            .map(|stream| {
                let data = stream
                    .decompressed_content()
                    .unwrap_or_else(|_| stream.content.clone());
                ToUnicode::parse(&data, if composite { 2 } else { 1 })
            });

        match (cmap, composite) {
            (Some(cmap), true) => FontDecoder::Mapped {
                cmap,
                fallback: None,
            },
            (Some(cmap), false) => FontDecoder::Mapped {
                cmap,
                fallback: Some(simple_table(doc, font)),
            },
            (None, true) => FontDecoder::Opaque,
            (None, false) => FontDecoder::Simple(simple_table(doc, font)),
        }
    }

    pub(crate) fn decode(&self, bytes: &[u8]) -> String {
        match self {
            FontDecoder::Simple(table) => bytes.iter().map(|&b| table[b as usize]).collect(),
            FontDecoder::Mapped { cmap, fallback } => cmap.decode(bytes, fallback.as_deref()),
            FontDecoder::Opaque => decode_raw(bytes),
        }
    }
}

/// Decode a string with no font information: UTF-8, then UTF-16BE with a
/// byte-order mark, then Latin-1
pub(crate) fn decode_raw(bytes: &[u8]) -> String {
    if let Ok(s) = std::str::from_utf8(bytes) {
        return s.to_string();
    }
    if bytes.len() >= 2 && bytes[0] == 0xFE && bytes[1] == 0xFF {
        let units: Vec<u16> = bytes[2..]
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        if let Ok(s) = String::from_utf16(&units) {
            return s;
        }
    }
    bytes.iter().map(|&b| b as char).collect()
}

fn win_ansi_table() -> Vec<char> {
    (0u32..256)
        .map(|code| match code {
            0x80..=0x9F => WIN_ANSI_HIGH[(code - 0x80) as usize],
            _ => char::from_u32(code).unwrap_or('\u{FFFD}'),
        })
        .collect()
}

/// Byte table for a simple font. Base encodings other than WinAnsi are
/// treated as WinAnsi, which agrees with them on ASCII.
fn simple_table(doc: &Document, font: &Dictionary) -> Vec<char> {
    let mut table = win_ansi_table();

    let encoding = font
        .get(b"Encoding")
        .ok()
        .and_then(|obj| resolve(doc, obj).ok());
    let Some(Object::Dictionary(encoding)) = encoding else {
        return table;
    };
    let differences = encoding
        .get(b"Differences")
        .ok()
        .and_then(|obj| resolve(doc, obj).ok());
    if let Some(Object::Array(items)) = differences {
        apply_differences(&mut table, items);
    }
    table
}

fn apply_differences(table: &mut [char], items: &[Object]) {
    let mut code: Option<usize> = None;
    for item in items {
        match item {
            Object::Integer(start) => code = usize::try_from(*start).ok(),
            Object::Name(name) => {
                let Some(current) = code else { continue };
                if let Some(c) = glyph_char(name) {
                    if let Some(slot) = table.get_mut(current) {
                        *slot = c;
                    }
                }
                code = Some(current + 1);
            }
            _ => {}
        }
    }
}

/// Unicode value of a glyph name: single letters, `uniXXXX`, `uXXXX` and the
/// names in [`GLYPH_NAMES`]
fn glyph_char(name: &[u8]) -> Option<char> {
    let name = std::str::from_utf8(name).ok()?;

    if name.len() == 1 && name.as_bytes()[0].is_ascii_alphabetic() {
        return name.chars().next();
    }
    let hex = name
        .strip_prefix("uni")
        .filter(|h| h.len() == 4)
        .or_else(|| name.strip_prefix('u').filter(|h| (4..=6).contains(&h.len())));
    if let Some(value) = hex.and_then(|h| u32::from_str_radix(h, 16).ok()) {
        return char::from_u32(value);
    }

    GLYPH_NAMES
        .iter()
        .find(|(glyph, _)| *glyph == name)
        .map(|(_, c)| *c)
}

/// Parsed ToUnicode CMap: codespace ranges plus code-to-text mappings
#[derive(Debug, Clone, Default)]
pub(crate) struct ToUnicode {
    /// (byte length, low, high), shortest first
    codespace: Vec<(usize, u32, u32)>,
    map: HashMap<(usize, u32), String>,
    default_len: usize,
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Hex(Vec<u8>),
    Word(String),
    Open,
    Close,
}

impl ToUnicode {
    pub(crate) fn parse(data: &[u8], default_len: usize) -> Self {
        let tokens = tokenize(data);
        let mut cmap = ToUnicode {
            default_len: default_len.max(1),
            ..Self::default()
        };

        let mut i = 0;
        while i < tokens.len() {
            let Token::Word(word) = &tokens[i] else {
                i += 1;
                continue;
            };
            i += 1;
            match word.as_str() {
                "begincodespacerange" => {
                    while let (Some(Token::Hex(lo)), Some(Token::Hex(hi))) =
                        (tokens.get(i), tokens.get(i + 1))
                    {
                        cmap.codespace.push((lo.len(), be_value(lo), be_value(hi)));
                        i += 2;
                    }
                }
                "beginbfchar" => {
                    while let (Some(Token::Hex(src)), Some(Token::Hex(dst))) =
                        (tokens.get(i), tokens.get(i + 1))
                    {
                        cmap.map.insert((src.len(), be_value(src)), utf16_text(dst));
                        i += 2;
                    }
                }
                "beginbfrange" => {
                    while let (Some(Token::Hex(lo)), Some(Token::Hex(hi))) =
                        (tokens.get(i), tokens.get(i + 1))
                    {
                        i += 2;
                        let len = lo.len();
                        let (lo, hi) = (be_value(lo), be_value(hi));
                        let hi = hi.min(lo.saturating_add(MAX_RANGE_SPAN));
                        match tokens.get(i) {
                            Some(Token::Hex(dst)) => {
                                for code in lo..=hi {
                                    cmap.map.insert((len, code), offset_text(dst, code - lo));
                                }
                                i += 1;
                            }
                            Some(Token::Open) => {
                                i += 1;
                                let mut code = lo;
                                while let Some(Token::Hex(dst)) = tokens.get(i) {
                                    if code <= hi {
                                        cmap.map.insert((len, code), utf16_text(dst));
                                    }
                                    code = code.saturating_add(1);
                                    i += 1;
                                }
                                if tokens.get(i) == Some(&Token::Close) {
                                    i += 1;
                                }
                            }
                            _ => break,
                        }
                    }
                }
                _ => {}
            }
        }

        cmap.codespace.sort_by_key(|(len, _, _)| *len);
        cmap
    }

    fn next_code(&self, bytes: &[u8]) -> (usize, u32) {
        for &(len, lo, hi) in &self.codespace {
            if len > 0 && bytes.len() >= len {
                let code = be_value(&bytes[..len]);
                if (lo..=hi).contains(&code) {
                    return (len, code);
                }
            }
        }
        let len = self.default_len.min(bytes.len()).max(1);
        (len, be_value(&bytes[..len]))
    }

    fn decode(&self, bytes: &[u8], fallback: Option<&[char]>) -> String {
        let mut text = String::new();
        let mut rest = bytes;
        while !rest.is_empty() {
            let (len, code) = self.next_code(rest);
            match (self.map.get(&(len, code)), fallback) {
                (Some(mapped), _) => text.push_str(mapped),
                (None, Some(table)) if len == 1 => text.push(table[code as usize]),
                (None, _) => text.push('\u{FFFD}'),
            }
            rest = &rest[len..];
        }
        text
    }
}

fn be_value(bytes: &[u8]) -> u32 {
    bytes
        .iter()
        .take(4)
        .fold(0u32, |acc, &b| (acc << 8) | b as u32)
}

fn utf16_units(bytes: &[u8]) -> Vec<u16> {
    if bytes.len() == 1 {
        return vec![bytes[0] as u16];
    }
    bytes
        .chunks(2)
        .map(|pair| match pair {
            [hi, lo] => u16::from_be_bytes([*hi, *lo]),
            [single] => *single as u16,
            _ => 0,
        })
        .collect()
}

fn utf16_text(bytes: &[u8]) -> String {
    String::from_utf16_lossy(&utf16_units(bytes))
}

/// Destination of the `offset`-th code in a `bfrange`: the last UTF-16 unit
/// is incremented
fn offset_text(base: &[u8], offset: u32) -> String {
    let mut units = utf16_units(base);
    if let Some(last) = units.last_mut() {
        *last = last.wrapping_add(offset as u16);
    }
    String::from_utf16_lossy(&units)
}

fn tokenize(data: &[u8]) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut i = 0;
    while i < data.len() {
        match data[i] {
            b'%' => {
                while i < data.len() && data[i] != b'\n' && data[i] != b'\r' {
                    i += 1;
                }
            }
            b'<' if data.get(i + 1) == Some(&b'<') => {
                tokens.push(Token::Word("<<".to_string()));
                i += 2;
            }
            b'>' if data.get(i + 1) == Some(&b'>') => {
                tokens.push(Token::Word(">>".to_string()));
                i += 2;
            }
            b'<' => {
                i += 1;
                let mut digits = Vec::new();
                while i < data.len() && data[i] != b'>' {
                    if data[i].is_ascii_hexdigit() {
                        digits.push(data[i]);
                    }
                    i += 1;
                }
                i += 1;
                if digits.len() % 2 == 1 {
                    digits.push(b'0');
                }
                let bytes = digits
                    .chunks(2)
                    .filter_map(|pair| {
                        std::str::from_utf8(pair)
                            .ok()
                            .and_then(|h| u8::from_str_radix(h, 16).ok())
                    })
                    .collect();
                tokens.push(Token::Hex(bytes));
            }
            b'[' => {
                tokens.push(Token::Open);
                i += 1;
            }
            b']' => {
                tokens.push(Token::Close);
                i += 1;
            }
            c if c.is_ascii_whitespace() => i += 1,
            _ => {
                let start = i;
                while i < data.len()
                    && !data[i].is_ascii_whitespace()
                    && !matches!(data[i], b'<' | b'>' | b'[' | b']' | b'%')
                {
                    i += 1;
                }
                // a stray '>' would otherwise never advance
                if i == start {
                    i += 1;
                    continue;
                }
                tokens.push(Token::Word(String::from_utf8_lossy(&data[start..i]).into_owned()));
            }
        }
    }
    tokens
}
