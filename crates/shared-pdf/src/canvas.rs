//! Drawing surface for single-page overlays
//!
//! An [`OverlayCanvas`] records content operations in page-relative
//! coordinates. Finishing it yields an [`OverlayPage`]: the operations plus the
//! fonts, images and link regions they reference. Resource names carry the
//! canvas layer prefix so several overlays can share one page.

use lopdf::content::{Content, Operation};
use lopdf::{Object, StringFormat};
use shared_types::{PageBox, Point};

use crate::error::PdfError;
use crate::fonts::StandardFont;
use crate::images::EmbeddedImage;
use crate::parser::number;
use crate::text::{fragments_from_operations, TextFragment};

/// Bezier control distance for a quarter circle of radius 1
const KAPPA: f64 = 0.552_284_749_8;

/// Advance assumed per glyph when a string cannot be measured
const ESTIMATED_ADVANCE: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Color {
    Gray(f64),
    Rgb(f64, f64, f64),
}

impl Color {
    pub const BLACK: Color = Color::Gray(0.0);
    pub const WHITE: Color = Color::Gray(1.0);

    fn fill_operation(&self) -> Operation {
        match *self {
            Color::Gray(g) => Operation::new("g", vec![real(g)]),
            Color::Rgb(r, g, b) => Operation::new("rg", vec![real(r), real(g), real(b)]),
        }
    }
}

/// A clickable rectangle bound to a URI, as (x1, y1, x2, y2)
#[derive(Debug, Clone, PartialEq)]
pub struct LinkArea {
    pub rect: [f64; 4],
    pub uri: String,
}

/// A finished single-page overlay
#[derive(Debug, Clone)]
pub struct OverlayPage {
    pub page: PageBox,
    pub operations: Vec<Operation>,
    pub fonts: Vec<(String, StandardFont)>,
    pub images: Vec<(String, EmbeddedImage)>,
    pub links: Vec<LinkArea>,
}

impl OverlayPage {
    pub fn content_bytes(&self) -> Result<Vec<u8>, PdfError> {
        Content {
            operations: self.operations.clone(),
        }
        .encode()
        .map_err(|e| PdfError::WriteError(format!("Failed to encode overlay content: {}", e)))
    }

    /// Text drawn on this overlay, positioned at each string's baseline start
    pub fn text_fragments(&self) -> Vec<TextFragment> {
        fragments_from_operations(&self.operations)
    }

    /// Drawn image boxes as (resource name, x, y, width, height)
    pub fn image_placements(&self) -> Vec<(String, f64, f64, f64, f64)> {
        let mut placements = Vec::new();
        let mut matrix = None;
        for op in &self.operations {
            match op.operator.as_str() {
                "cm" => {
                    let values: Vec<f64> = op.operands.iter().filter_map(number).collect();
                    if let [w, _, _, h, x, y] = values.as_slice() {
                        matrix = Some((*x, *y, *w, *h));
                    }
                }
                "Do" => {
                    if let (Some((x, y, w, h)), Some(Object::Name(name))) =
                        (matrix, op.operands.first())
                    {
                        placements.push((String::from_utf8_lossy(name).into_owned(), x, y, w, h));
                    }
                }
                "Q" => matrix = None,
                _ => {}
            }
        }
        placements
    }
}

pub struct OverlayCanvas {
    layer: String,
    page: PageBox,
    operations: Vec<Operation>,
    fonts: Vec<(String, StandardFont)>,
    images: Vec<(String, EmbeddedImage)>,
    links: Vec<LinkArea>,
}

impl OverlayCanvas {
    /// Start an empty overlay for a page of the given size. `layer` prefixes
    /// every resource name the canvas allocates.
    pub fn new(layer: &str, width: f64, height: f64) -> Self {
        Self {
            layer: layer.to_string(),
            page: PageBox::sized(width, height),
            operations: Vec::new(),
            fonts: Vec::new(),
            images: Vec::new(),
            links: Vec::new(),
        }
    }

    pub fn width(&self) -> f64 {
        self.page.width
    }

    pub fn height(&self) -> f64 {
        self.page.height
    }

    pub fn fill_rect(&mut self, x: f64, y: f64, width: f64, height: f64, color: Color) {
        self.operations.extend([
            Operation::new("q", vec![]),
            color.fill_operation(),
            Operation::new("re", vec![real(x), real(y), real(width), real(height)]),
            Operation::new("f", vec![]),
            Operation::new("Q", vec![]),
        ]);
    }

    pub fn fill_circle(&mut self, center: Point, radius: f64, color: Color) {
        let Point { x, y } = center;
        let k = radius * KAPPA;
        let r = radius;

        self.operations.extend([
            Operation::new("q", vec![]),
            color.fill_operation(),
            Operation::new("m", vec![real(x + r), real(y)]),
            curve(x + r, y + k, x + k, y + r, x, y + r),
            curve(x - k, y + r, x - r, y + k, x - r, y),
            curve(x - r, y - k, x - k, y - r, x, y - r),
            curve(x + k, y - r, x + r, y - k, x + r, y),
            Operation::new("f", vec![]),
            Operation::new("Q", vec![]),
        ]);
    }

    pub fn stroke_line(&mut self, from: Point, to: Point, line_width: f64) {
        self.operations.extend([
            Operation::new("q", vec![]),
            Operation::new("w", vec![real(line_width)]),
            Operation::new("G", vec![real(0.0)]),
            Operation::new("m", vec![real(from.x), real(from.y)]),
            Operation::new("l", vec![real(to.x), real(to.y)]),
            Operation::new("S", vec![]),
            Operation::new("Q", vec![]),
        ]);
    }

    /// Draw `text` with its baseline starting at `at`
    pub fn draw_text(&mut self, font: StandardFont, size: f64, at: Point, text: &str, color: Color) {
        let name = self.font_resource(font);
        self.operations.extend([
            Operation::new("q", vec![]),
            color.fill_operation(),
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec![Object::Name(name.into_bytes()), real(size)]),
            Operation::new("Td", vec![real(at.x), real(at.y)]),
            Operation::new("Tj", vec![Object::String(win_ansi(text), StringFormat::Literal)]),
            Operation::new("ET", vec![]),
            Operation::new("Q", vec![]),
        ]);
    }

    /// Draw `text` horizontally centred on `center`
    pub fn draw_centred_text(
        &mut self,
        font: StandardFont,
        size: f64,
        center: Point,
        text: &str,
        color: Color,
    ) {
        let width = measure(font, text, size);
        self.draw_text(font, size, center.offset(-width / 2.0, 0.0), text, color);
    }

    /// Paint `image` stretched into the given box
    pub fn draw_image(&mut self, image: EmbeddedImage, x: f64, y: f64, width: f64, height: f64) {
        let name = format!("{}Im{}", self.layer, self.images.len() + 1);
        self.operations.extend([
            Operation::new("q", vec![]),
            Operation::new(
                "cm",
                vec![real(width), real(0.0), real(0.0), real(height), real(x), real(y)],
            ),
            Operation::new("Do", vec![Object::Name(name.clone().into_bytes())]),
            Operation::new("Q", vec![]),
        ]);
        self.images.push((name, image));
    }

    pub fn link(&mut self, rect: [f64; 4], uri: &str) {
        self.links.push(LinkArea {
            rect,
            uri: uri.to_string(),
        });
    }

    pub fn finish(self) -> OverlayPage {
        OverlayPage {
            page: self.page,
            operations: self.operations,
            fonts: self.fonts,
            images: self.images,
            links: self.links,
        }
    }

    fn font_resource(&mut self, font: StandardFont) -> String {
        if let Some((name, _)) = self.fonts.iter().find(|(_, f)| *f == font) {
            return name.clone();
        }
        let name = format!("{}F{}", self.layer, self.fonts.len() + 1);
        self.fonts.push((name.clone(), font));
        name
    }
}

/// Width of `text` in `font`, estimated from an average advance when the
/// metrics do not cover every glyph
pub fn measure(font: StandardFont, text: &str, size: f64) -> f64 {
    font.string_width(text, size)
        .unwrap_or_else(|| text.chars().count() as f64 * size * ESTIMATED_ADVANCE)
}

/// Encode text for a WinAnsiEncoding font. Code points outside the shared
/// Latin-1 range become `?`.
pub fn win_ansi(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| match c as u32 {
            code @ (0x20..=0x7E | 0xA0..=0xFF) => code as u8,
            _ => b'?',
        })
        .collect()
}

fn curve(x1: f64, y1: f64, x2: f64, y2: f64, x3: f64, y3: f64) -> Operation {
    Operation::new(
        "c",
        vec![real(x1), real(y1), real(x2), real(y2), real(x3), real(y3)],
    )
}

fn real(value: f64) -> Object {
    Object::Real(value as f32)
}
