//! Positioned text extraction
//!
//! Walks a decoded content stream and reports each text-showing operator with
//! the text-matrix origin it was drawn at, mapped through the current
//! transformation matrix. Form XObjects painted with `Do` are walked in place.

use std::collections::HashMap;

use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, ObjectId};

use crate::encoding::{decode_raw, FontDecoder};
use crate::error::PdfError;
use crate::parser::{inherited, number, resolve};

/// Forms nested deeper than this are skipped
const MAX_FORM_DEPTH: usize = 8;

/// A run of text and the baseline origin it was shown at
#[derive(Debug, Clone, PartialEq)]
pub struct TextFragment {
    pub text: String,
    pub x: f64,
    pub y: f64,
}

/// Text matrix [a b c d e f] with the line matrix it was derived from
#[derive(Debug, Clone, Copy)]
struct TextState {
    line: [f64; 6],
    leading: f64,
}

const IDENTITY: [f64; 6] = [1.0, 0.0, 0.0, 1.0, 0.0, 0.0];

impl TextState {
    fn new() -> Self {
        Self {
            line: IDENTITY,
            leading: 0.0,
        }
    }

    /// Move to the start of the next line offset by (tx, ty)
    fn translate(&mut self, tx: f64, ty: f64) {
        let [a, b, c, d, e, f] = self.line;
        self.line[4] = tx * a + ty * c + e;
        self.line[5] = tx * b + ty * d + f;
    }

    fn next_line(&mut self) {
        let leading = self.leading;
        self.translate(0.0, -leading);
    }

    fn origin(&self) -> (f64, f64) {
        (self.line[4], self.line[5])
    }
}

/// Extract positioned fragments from a sequence of content operations.
///
/// No resources are available, so strings are decoded without font
/// information and `Do` is ignored.
pub fn fragments_from_operations(operations: &[Operation]) -> Vec<TextFragment> {
    let mut walker = Walker::new(None);
    walker.walk(operations, None, IDENTITY, 0);
    walker.fragments
}

/// Extract positioned fragments from one page of a parsed document, following
/// Form XObjects and decoding strings through the page's fonts
pub fn extract_fragments(doc: &Document, page_id: ObjectId) -> Result<Vec<TextFragment>, PdfError> {
    let page = doc
        .get_dictionary(page_id)
        .map_err(|e| PdfError::Structure(format!("Failed to get page object: {}", e)))?;
    let resources = match inherited(doc, page, b"Resources")? {
        Some(obj) => Some(
            resolve(doc, obj)?
                .as_dict()
                .map_err(|_| PdfError::Structure("Resources is not a dictionary".to_string()))?,
        ),
        None => None,
    };

    let data = doc
        .get_page_content(page_id)
        .map_err(|e| PdfError::Structure(format!("Failed to read page content: {}", e)))?;
    let content = Content::decode(&data)
        .map_err(|e| PdfError::Structure(format!("Failed to decode content stream: {}", e)))?;

    let mut walker = Walker::new(Some(doc));
    walker.walk(&content.operations, resources, IDENTITY, 0);
    Ok(walker.fragments)
}

/// Concatenate two affine matrices: `first` then `second`
fn multiply(first: [f64; 6], second: [f64; 6]) -> [f64; 6] {
    let [a1, b1, c1, d1, e1, f1] = first;
    let [a2, b2, c2, d2, e2, f2] = second;
    [
        a1 * a2 + b1 * c2,
        a1 * b2 + b1 * d2,
        c1 * a2 + d1 * c2,
        c1 * b2 + d1 * d2,
        e1 * a2 + f1 * c2 + e2,
        e1 * b2 + f1 * d2 + f2,
    ]
}

fn transform(m: [f64; 6], (x, y): (f64, f64)) -> (f64, f64) {
    (m[0] * x + m[2] * y + m[4], m[1] * x + m[3] * y + m[5])
}

/// Walks content streams, descending into Form XObjects
struct Walker<'a> {
    doc: Option<&'a Document>,
    fragments: Vec<TextFragment>,
}

impl<'a> Walker<'a> {
    fn new(doc: Option<&'a Document>) -> Self {
        Self {
            doc,
            fragments: Vec::new(),
        }
    }

    fn walk(
        &mut self,
        operations: &[Operation],
        resources: Option<&'a Dictionary>,
        ctm: [f64; 6],
        depth: usize,
    ) {
        let mut state = TextState::new();
        let mut ctm = ctm;
        let mut saved: Vec<[f64; 6]> = Vec::new();
        let mut fonts: HashMap<Vec<u8>, FontDecoder> = HashMap::new();
        let mut font: Option<Vec<u8>> = None;

        for op in operations {
            let operands = &op.operands;
            let decoder = font.as_ref().and_then(|name| fonts.get(name));
            match op.operator.as_str() {
                "q" => saved.push(ctm),
                "Q" => {
                    if let Some(previous) = saved.pop() {
                        ctm = previous;
                    }
                }
                "cm" => {
                    if let Some(matrix) = numbers::<6>(operands) {
                        ctm = multiply(matrix, ctm);
                    }
                }
                "Tf" => {
                    if let Some(Object::Name(name)) = operands.first() {
                        if !fonts.contains_key(name) {
                            if let Some(decoder) = self.font_decoder(resources, name) {
                                fonts.insert(name.clone(), decoder);
                            }
                        }
                        font = Some(name.clone());
                    }
                }
                "Do" => {
                    if let Some(Object::Name(name)) = operands.first() {
                        self.paint_form(resources, name, ctm, depth);
                    }
                }
                "BT" => state.line = IDENTITY,
                "Tm" => {
                    if let Some(values) = numbers::<6>(operands) {
                        state.line = values;
                    }
                }
                "Td" => {
                    if let Some([tx, ty]) = numbers::<2>(operands) {
                        state.translate(tx, ty);
                    }
                }
                "TD" => {
                    if let Some([tx, ty]) = numbers::<2>(operands) {
                        state.leading = -ty;
                        state.translate(tx, ty);
                    }
                }
                "TL" => {
                    if let Some([leading]) = numbers::<1>(operands) {
                        state.leading = leading;
                    }
                }
                "T*" => state.next_line(),
                "Tj" | "TJ" => self.push(&state, ctm, decoder, operands.first()),
                "'" => {
                    state.next_line();
                    self.push(&state, ctm, decoder, operands.first());
                }
                "\"" => {
                    state.next_line();
                    self.push(&state, ctm, decoder, operands.get(2));
                }
                _ => {}
            }
        }
    }

    fn push(
        &mut self,
        state: &TextState,
        ctm: [f64; 6],
        decoder: Option<&FontDecoder>,
        operand: Option<&Object>,
    ) {
        let Some(text) = operand.and_then(|o| decode_operand(o, decoder)) else {
            return;
        };
        let (x, y) = transform(ctm, state.origin());
        self.fragments.push(TextFragment { text, x, y });
    }

    fn font_decoder(&self, resources: Option<&'a Dictionary>, name: &[u8]) -> Option<FontDecoder> {
        let doc = self.doc?;
        let font = resource(doc, resources?, b"Font", name)?.as_dict().ok()?;
        Some(FontDecoder::for_font(doc, font))
    }

    fn paint_form(
        &mut self,
        resources: Option<&'a Dictionary>,
        name: &[u8],
        ctm: [f64; 6],
        depth: usize,
    ) {
        let Some(doc) = self.doc else { return };
        if depth >= MAX_FORM_DEPTH {
            tracing::debug!("Form XObjects nested too deep, skipping {}", String::from_utf8_lossy(name));
            return;
        }
        let Some(stream) = resources
            .and_then(|r| resource(doc, r, b"XObject", name))
            .and_then(|obj| obj.as_stream().ok())
        else {
            return;
        };
        if !matches!(stream.dict.get(b"Subtype"), Ok(Object::Name(n)) if n == b"Form") {
            return;
        }

        let data = stream
            .decompressed_content()
            .unwrap_or_else(|_| stream.content.clone());
        let operations = match Content::decode(&data) {
            Ok(content) => content.operations,
            Err(e) => {
                tracing::debug!("Skipping undecodable form {}: {}", String::from_utf8_lossy(name), e);
                return;
            }
        };

        let matrix = stream
            .dict
            .get(b"Matrix")
            .ok()
            .and_then(|obj| resolve(doc, obj).ok())
            .and_then(|obj| obj.as_array().ok())
            .and_then(|values| numbers::<6>(values))
            .unwrap_or(IDENTITY);
        let form_resources = stream
            .dict
            .get(b"Resources")
            .ok()
            .and_then(|obj| resolve(doc, obj).ok())
            .and_then(|obj| obj.as_dict().ok())
            .or(resources);

        self.walk(&operations, form_resources, multiply(matrix, ctm), depth + 1);
    }
}

/// Named entry of a resource category (`Font`, `XObject`), references resolved
fn resource<'a>(
    doc: &'a Document,
    resources: &'a Dictionary,
    category: &[u8],
    name: &[u8],
) -> Option<&'a Object> {
    let group = resolve(doc, resources.get(category).ok()?).ok()?.as_dict().ok()?;
    resolve(doc, group.get(name).ok()?).ok()
}

fn numbers<const N: usize>(operands: &[Object]) -> Option<[f64; N]> {
    if operands.len() < N {
        return None;
    }
    let mut values = [0.0; N];
    for (slot, operand) in values.iter_mut().zip(operands) {
        *slot = number(operand)?;
    }
    Some(values)
}

fn decode_operand(operand: &Object, decoder: Option<&FontDecoder>) -> Option<String> {
    let decode = |bytes: &[u8]| match decoder {
        Some(decoder) => decoder.decode(bytes),
        None => decode_raw(bytes),
    };
    match operand {
        Object::String(bytes, _) => Some(decode(bytes)),
        Object::Array(items) => {
            let mut text = String::new();
            for item in items {
                match item {
                    Object::String(bytes, _) => text.push_str(&decode(bytes)),
                    // Large negative adjustments are word gaps
                    other => {
                        if number(other).is_some_and(|n| n < -100.0) {
                            text.push(' ');
                        }
                    }
                }
            }
            Some(text)
        }
        _ => None,
    }
}
