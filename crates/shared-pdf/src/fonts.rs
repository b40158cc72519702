//! The base-14 fonts used for overlays, with their glyph advance widths

use lopdf::{dictionary, Dictionary};
use shared_types::FontStyle;

/// Standard Type1 fonts every conforming reader provides without embedding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StandardFont {
    Helvetica,
    HelveticaBold,
    TimesRoman,
    TimesItalic,
}

impl StandardFont {
    /// Font used for a signer's typed name
    pub fn for_style(style: FontStyle) -> Self {
        match style {
            FontStyle::Default => StandardFont::Helvetica,
            FontStyle::Handwritten | FontStyle::SimpleScript => StandardFont::TimesItalic,
            FontStyle::Serif => StandardFont::TimesRoman,
        }
    }

    pub fn base_font_name(&self) -> &'static str {
        match self {
            StandardFont::Helvetica => "Helvetica",
            StandardFont::HelveticaBold => "Helvetica-Bold",
            StandardFont::TimesRoman => "Times-Roman",
            StandardFont::TimesItalic => "Times-Italic",
        }
    }

    /// Font resource dictionary
    pub fn dictionary(&self) -> Dictionary {
        dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => self.base_font_name(),
            "Encoding" => "WinAnsiEncoding",
        }
    }

    /// Width of `text` at `size` points, or None if any glyph has no metrics
    pub fn string_width(&self, text: &str, size: f64) -> Option<f64> {
        let table = self.widths();
        let mut units = 0u32;
        for ch in text.chars() {
            let code = fold_accent(ch) as u32;
            if !(FIRST_CHAR..=LAST_CHAR).contains(&code) {
                return None;
            }
            units += u32::from(table[(code - FIRST_CHAR) as usize]);
        }
        Some(f64::from(units) * size / 1000.0)
    }

    fn widths(&self) -> &'static [u16; GLYPH_COUNT] {
        match self {
            StandardFont::Helvetica => &HELVETICA,
            StandardFont::HelveticaBold => &HELVETICA_BOLD,
            StandardFont::TimesRoman => &TIMES_ROMAN,
            StandardFont::TimesItalic => &TIMES_ITALIC,
        }
    }
}

/// Accented letters share the advance of their base letter in these fonts
fn fold_accent(ch: char) -> char {
    match ch {
        'À' | 'Á' | 'Â' | 'Ã' | 'Ä' | 'Å' => 'A',
        'à' | 'á' | 'â' | 'ã' | 'ä' | 'å' => 'a',
        'Ç' => 'C',
        'ç' => 'c',
        'È' | 'É' | 'Ê' | 'Ë' => 'E',
        'è' | 'é' | 'ê' | 'ë' => 'e',
        'Ì' | 'Í' | 'Î' | 'Ï' => 'I',
        'ì' | 'í' | 'î' | 'ï' => 'i',
        'Ñ' => 'N',
        'ñ' => 'n',
        'Ò' | 'Ó' | 'Ô' | 'Õ' | 'Ö' => 'O',
        'ò' | 'ó' | 'ô' | 'õ' | 'ö' => 'o',
        'Ù' | 'Ú' | 'Û' | 'Ü' => 'U',
        'ù' | 'ú' | 'û' | 'ü' => 'u',
        'Ý' => 'Y',
        'ý' | 'ÿ' => 'y',
        other => other,
    }
}

const FIRST_CHAR: u32 = 32;
const LAST_CHAR: u32 = 126;
const GLYPH_COUNT: usize = (LAST_CHAR - FIRST_CHAR + 1) as usize;

// Advance widths for codes 32..=126 in 1/1000 em, from the Adobe AFM files.

#[rustfmt::skip]
static HELVETICA: [u16; GLYPH_COUNT] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278,
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 278, 278, 584, 584, 584, 556,
    1015, 667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, 722, 778,
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 278, 278, 278, 469, 556,
    333, 556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, 556, 556,
    556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, 334, 260, 334, 584,
];

#[rustfmt::skip]
static HELVETICA_BOLD: [u16; GLYPH_COUNT] = [
    278, 333, 474, 556, 556, 889, 722, 238, 333, 333, 389, 584, 278, 333, 278, 278,
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 333, 333, 584, 584, 584, 611,
    975, 722, 722, 722, 722, 667, 611, 778, 722, 278, 556, 722, 611, 833, 722, 778,
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 333, 278, 333, 584, 556,
    333, 556, 611, 556, 611, 556, 333, 611, 611, 278, 278, 556, 278, 889, 611, 611,
    611, 611, 389, 556, 333, 611, 556, 778, 556, 556, 500, 389, 280, 389, 584,
];

#[rustfmt::skip]
static TIMES_ROMAN: [u16; GLYPH_COUNT] = [
    250, 333, 408, 500, 500, 833, 778, 180, 333, 333, 500, 564, 250, 333, 250, 278,
    500, 500, 500, 500, 500, 500, 500, 500, 500, 500, 278, 278, 564, 564, 564, 444,
    921, 722, 667, 667, 722, 611, 556, 722, 722, 333, 389, 722, 611, 889, 722, 722,
    556, 722, 667, 556, 611, 722, 722, 944, 722, 722, 611, 333, 278, 333, 469, 500,
    333, 444, 500, 444, 500, 444, 333, 500, 500, 278, 278, 500, 278, 778, 500, 500,
    500, 500, 333, 389, 278, 500, 500, 722, 500, 500, 444, 480, 200, 480, 541,
];

#[rustfmt::skip]
static TIMES_ITALIC: [u16; GLYPH_COUNT] = [
    250, 333, 420, 500, 500, 833, 778, 214, 333, 333, 500, 675, 250, 333, 250, 278,
    500, 500, 500, 500, 500, 500, 500, 500, 500, 500, 333, 333, 675, 675, 675, 500,
    920, 611, 611, 667, 722, 611, 611, 722, 722, 333, 444, 667, 556, 833, 667, 722,
    611, 722, 611, 500, 556, 722, 611, 833, 611, 556, 556, 389, 278, 389, 422, 500,
    333, 500, 500, 444, 500, 444, 278, 500, 500, 278, 278, 444, 278, 722, 500, 500,
    500, 500, 389, 389, 278, 500, 444, 667, 444, 444, 389, 400, 275, 400, 541,
];

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_known_widths() {
        // "Verificar online" in Helvetica at 6pt
        let width = StandardFont::Helvetica
            .string_width("Verificar online", 6.0)
            .unwrap();
        assert!((width - 39.678).abs() < 1e-9);

        assert_eq!(StandardFont::HelveticaBold.string_width("W", 10.0), Some(9.44));
        assert_eq!(StandardFont::TimesRoman.string_width(" ", 1000.0), Some(250.0));
    }

    #[test]
    fn test_accents_measure_as_base_letter() {
        let font = StandardFont::Helvetica;
        assert_eq!(
            font.string_width("PÁGINA", 14.0),
            font.string_width("PAGINA", 14.0)
        );
        assert_eq!(font.string_width("ção", 10.0), font.string_width("cao", 10.0));
    }

    #[test]
    fn test_unmeasurable_text() {
        assert_eq!(StandardFont::Helvetica.string_width("日本", 10.0), None);
        assert_eq!(StandardFont::Helvetica.string_width("", 10.0), Some(0.0));
    }

    #[test]
    fn test_style_mapping() {
        assert_eq!(StandardFont::for_style(FontStyle::Default), StandardFont::Helvetica);
        assert_eq!(StandardFont::for_style(FontStyle::Handwritten), StandardFont::TimesItalic);
        assert_eq!(StandardFont::for_style(FontStyle::Serif), StandardFont::TimesRoman);
        assert_eq!(StandardFont::for_style(FontStyle::SimpleScript), StandardFont::TimesItalic);
        assert_eq!(StandardFont::TimesItalic.base_font_name(), "Times-Italic");
    }

    proptest! {
        #[test]
        fn width_is_additive(a in "[ -~]{0,20}", b in "[ -~]{0,20}") {
            let font = StandardFont::TimesItalic;
            let whole = font.string_width(&format!("{}{}", a, b), 12.0).unwrap();
            let parts = font.string_width(&a, 12.0).unwrap() + font.string_width(&b, 12.0).unwrap();
            prop_assert!((whole - parts).abs() < 1e-6);
        }
    }
}
