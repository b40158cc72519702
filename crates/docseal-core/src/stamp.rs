//! Footer stamp: compliance notice, signature hash and a scannable
//! verification link, drawn on every sealed page

use shared_pdf::canvas::{Color, OverlayCanvas};
use shared_pdf::{EmbeddedImage, OverlayPage, PdfError, StandardFont};
use shared_types::Point;

use crate::qr::ScannableCodeGenerator;

pub const STAMP_LAYER: &str = "Stamp";

pub const NOTICE: &str = "Assinado com Assinatura Eletrônica (Lei 14.063/2020)";
pub const LINK_LABEL: &str = "Verificar online";

/// Characters of the hash shown before the ellipsis
pub const HASH_PREFIX_LEN: usize = 24;

const BAND_HEIGHT: f64 = 45.0;
const BAND_GRAY: f64 = 0.96;
const BRAND_BLUE: Color = Color::Rgb(0.2, 0.4, 0.8);
const TEXT_X: f64 = 55.0;
const LINK_LABEL_SIZE: f64 = 6.0;
const CODE_SIZE: f64 = 35.0;
const CODE_MARGIN: f64 = 55.0;
const CODE_BOTTOM: f64 = 5.0;
const CODE_CELL_SIZE: u32 = 2;

/// Verification URL for a document id
pub fn verification_url(base_url: &str, document_id: &str) -> String {
    format!("{}?hash={}", base_url, document_id)
}

/// Hash label text: the first characters of the hash and an ellipsis
pub fn hash_label(hash: &str) -> String {
    let prefix: String = hash.chars().take(HASH_PREFIX_LEN).collect();
    format!("Hash SHA256: {}...", prefix)
}

pub struct StampRenderer<'a> {
    codes: &'a dyn ScannableCodeGenerator,
}

impl<'a> StampRenderer<'a> {
    pub fn new(codes: &'a dyn ScannableCodeGenerator) -> Self {
        Self { codes }
    }

    /// Render the footer overlay for a page of the given size
    pub fn render(&self, hash: &str, url: &str, width: f64, height: f64) -> Result<OverlayPage, PdfError> {
        let mut canvas = OverlayCanvas::new(STAMP_LAYER, width, height);

        canvas.fill_rect(0.0, 0.0, width, BAND_HEIGHT, Color::Gray(BAND_GRAY));

        canvas.fill_circle(Point::new(30.0, 22.0), 12.0, BRAND_BLUE);
        canvas.draw_text(
            StandardFont::HelveticaBold,
            14.0,
            Point::new(26.0, 17.0),
            "a",
            Color::WHITE,
        );

        canvas.draw_text(
            StandardFont::HelveticaBold,
            8.0,
            Point::new(TEXT_X, 28.0),
            NOTICE,
            Color::BLACK,
        );
        canvas.draw_text(
            StandardFont::Helvetica,
            6.0,
            Point::new(TEXT_X, 18.0),
            &hash_label(hash),
            Color::BLACK,
        );
        canvas.draw_text(
            StandardFont::Helvetica,
            LINK_LABEL_SIZE,
            Point::new(TEXT_X, 8.0),
            LINK_LABEL,
            Color::BLACK,
        );
        match StandardFont::Helvetica.string_width(LINK_LABEL, LINK_LABEL_SIZE) {
            Some(label_width) => canvas.link([TEXT_X, 6.0, TEXT_X + label_width, 12.0], url),
            None => tracing::warn!("Could not measure verification label, link omitted"),
        }

        let raster = self
            .codes
            .generate(url, CODE_CELL_SIZE, 0)
            .map_err(|e| PdfError::Image(e.to_string()))?;
        let code_x = width - CODE_MARGIN;
        canvas.draw_image(
            EmbeddedImage::from_gray(&raster)?,
            code_x,
            CODE_BOTTOM,
            CODE_SIZE,
            CODE_SIZE,
        );
        canvas.link(
            [code_x, CODE_BOTTOM, code_x + CODE_SIZE, CODE_BOTTOM + CODE_SIZE],
            url,
        );

        Ok(canvas.finish())
    }
}
