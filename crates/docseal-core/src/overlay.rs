//! Signature overlay: signer names or images at their anchors, optionally
//! laid out as a standalone signature page

use chrono::{DateTime, Utc};
use shared_pdf::canvas::{Color, OverlayCanvas};
use shared_pdf::{EmbeddedImage, OverlayPage, StandardFont};
use shared_types::{FontStyle, Point, Signatory, SignatoryRole};

use crate::anchors::ResolvedAnchors;

pub const SIGNATURE_LAYER: &str = "Sig";

pub const TITLE: &str = "PÁGINA DE ASSINATURAS";
pub const SUBTITLE: &str = "Este documento foi assinado digitalmente conforme Lei 14.063/2020";

const IMAGE_WIDTH: f64 = 150.0;
const IMAGE_HEIGHT: f64 = 60.0;
const NAME_SIZE: f64 = 22.0;
const CAPTION_SIZE: f64 = 8.0;
const RULE_HALF_WIDTH: f64 = 75.0;

/// Baseline of the default anchors on pages that already have content
const INLINE_BASELINE: f64 = 85.0;

/// Page geometry and anchor choices for one overlay
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SignatureLayout {
    pub width: f64,
    pub height: f64,
    /// Draw the title, subtitle and a rule plus caption per role
    pub standalone: bool,
    /// Explicit anchors, in page-relative space; missing roles use the defaults
    pub anchors: ResolvedAnchors,
}

impl SignatureLayout {
    pub fn standalone(width: f64, height: f64) -> Self {
        Self {
            width,
            height,
            standalone: true,
            anchors: ResolvedAnchors::default(),
        }
    }

    pub fn anchored(width: f64, height: f64, anchors: ResolvedAnchors) -> Self {
        Self {
            width,
            height,
            standalone: false,
            anchors,
        }
    }

    /// Anchor used for a role when none was detected
    pub fn default_anchor(&self, role: SignatoryRole) -> Point {
        let x = match role {
            SignatoryRole::Contratante => self.width * 0.25,
            SignatoryRole::Contratada => self.width * 0.75,
        };
        let y = if self.standalone {
            self.height / 2.0 - 50.0
        } else {
            INLINE_BASELINE
        };
        Point::new(x, y)
    }

    pub fn anchor(&self, role: SignatoryRole) -> Point {
        self.anchors
            .get(role)
            .unwrap_or_else(|| self.default_anchor(role))
    }
}

/// "Signed on" caption for a timestamp
pub fn signed_on_caption(timestamp: DateTime<Utc>) -> String {
    format!("Assinado em {}", timestamp.format("%d/%m/%Y"))
}

/// What a role contributes to the overlay
enum Artifact<'a> {
    Image(EmbeddedImage),
    Name(&'a str),
}

/// An image, when supplied, replaces the name even if it cannot be decoded
fn artifact_for(signatory: &Signatory) -> Option<Artifact<'_>> {
    if let Some(bytes) = signatory.image.as_deref() {
        return match EmbeddedImage::decode(bytes) {
            Ok(image) => Some(Artifact::Image(image)),
            Err(e) => {
                tracing::warn!(
                    "Signature image for {} could not be decoded, drawing nothing: {}",
                    signatory.role,
                    e
                );
                None
            }
        };
    }

    Some(signatory.name.trim())
        .filter(|n| !n.is_empty())
        .map(Artifact::Name)
}

/// Render the signature overlay.
///
/// A role draws nothing when its image cannot be decoded or, without an
/// image, when its name is blank.
pub fn render_signatures(
    signatories: &[Signatory],
    font: FontStyle,
    signed_at: DateTime<Utc>,
    layout: &SignatureLayout,
) -> OverlayPage {
    let mut canvas = OverlayCanvas::new(SIGNATURE_LAYER, layout.width, layout.height);

    if layout.standalone {
        draw_page_structure(&mut canvas, layout);
    }

    let name_font = StandardFont::for_style(font);
    let caption = signed_on_caption(signed_at);

    for role in SignatoryRole::ALL {
        let Some(artifact) = signatories
            .iter()
            .find(|s| s.role == role)
            .and_then(artifact_for)
        else {
            continue;
        };

        let anchor = layout.anchor(role);
        match artifact {
            Artifact::Image(image) => canvas.draw_image(
                image,
                anchor.x - IMAGE_WIDTH / 2.0,
                anchor.y,
                IMAGE_WIDTH,
                IMAGE_HEIGHT,
            ),
            Artifact::Name(name) => {
                canvas.draw_centred_text(name_font, NAME_SIZE, anchor, name, Color::BLACK)
            }
        }
        canvas.draw_centred_text(
            StandardFont::Helvetica,
            CAPTION_SIZE,
            anchor.offset(0.0, -10.0),
            &caption,
            Color::BLACK,
        );
    }

    canvas.finish()
}

fn draw_page_structure(canvas: &mut OverlayCanvas, layout: &SignatureLayout) {
    let center_x = layout.width / 2.0;
    canvas.draw_centred_text(
        StandardFont::HelveticaBold,
        14.0,
        Point::new(center_x, layout.height - 100.0),
        TITLE,
        Color::BLACK,
    );
    canvas.draw_centred_text(
        StandardFont::Helvetica,
        10.0,
        Point::new(center_x, layout.height - 130.0),
        SUBTITLE,
        Color::BLACK,
    );

    for role in SignatoryRole::ALL {
        let anchor = layout.default_anchor(role);
        let rule_y = anchor.y - 10.0;
        canvas.stroke_line(
            Point::new(anchor.x - RULE_HALF_WIDTH, rule_y),
            Point::new(anchor.x + RULE_HALF_WIDTH, rule_y),
            1.0,
        );
        canvas.draw_centred_text(
            StandardFont::Helvetica,
            10.0,
            anchor.offset(0.0, -25.0),
            role.caption(),
            Color::BLACK,
        );
    }
}
