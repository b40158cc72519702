//! Fixtures shared by the sealing integration tests

#![allow(dead_code)]

use std::sync::{Arc, OnceLock};

use docseal_core::{QrCodeGenerator, Sealer};
use shared_crypto::{RsaPssIdentity, StaticKeyProvider};
use shared_pdf::{PdfDocument, StandardFont, TextFragment};
use shared_types::{Signatory, SignatoryRole};

pub use shared_pdf::test_support::{blank_pdf, build_pdf, text_at};

pub const BASE_URL: &str = "https://localhost:8000/validar";

/// One 1024-bit key for the whole test binary
pub fn identity() -> RsaPssIdentity {
    static IDENTITY: OnceLock<RsaPssIdentity> = OnceLock::new();
    IDENTITY
        .get_or_init(|| RsaPssIdentity::generate(1024).unwrap())
        .clone()
}

pub fn sealer() -> Sealer {
    Sealer::new(
        Arc::new(StaticKeyProvider::new(identity())),
        Arc::new(QrCodeGenerator),
        BASE_URL,
    )
}

pub fn signatory(name: &str, role: SignatoryRole) -> Signatory {
    Signatory {
        name: name.to_string(),
        role,
        email: Some(format!("{}@example.com", name.to_lowercase())),
        image: None,
    }
}

/// Text fragments of one page of a sealed document
pub fn page_fragments(pdf: &[u8], page_index: usize) -> Vec<TextFragment> {
    let doc = PdfDocument::from_bytes(pdf.to_vec()).unwrap();
    let page_id = doc.page_id(page_index).unwrap();
    shared_pdf::extract_fragments(doc.doc(), page_id).unwrap()
}

/// Horizontal centre and baseline of a drawn string
pub fn centre_of(fragments: &[TextFragment], text: &str, font: StandardFont, size: f64) -> (f64, f64) {
    let fragment = fragments
        .iter()
        .find(|f| f.text == text)
        .unwrap_or_else(|| panic!("{} not drawn", text));
    let width = font.string_width(text, size).unwrap();
    (fragment.x + width / 2.0, fragment.y)
}

pub fn assert_near(actual: (f64, f64), expected: (f64, f64)) {
    assert!(
        (actual.0 - expected.0).abs() < 1e-2 && (actual.1 - expected.1).abs() < 1e-2,
        "expected {:?}, got {:?}",
        expected,
        actual
    );
}
