//! Shared PDF handling utilities
//!
//! This crate provides PDF parsing, positioned text extraction, overlay
//! drawing and page composition used by the sealing pipeline.

pub mod canvas;
pub mod compose;
mod encoding;
pub mod error;
pub mod fonts;
pub mod images;
pub mod parser;
pub mod text;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use canvas::{LinkArea, OverlayCanvas, OverlayPage};
pub use compose::{append_blank_page, merge_overlays, render_standalone};
pub use error::PdfError;
pub use fonts::StandardFont;
pub use images::EmbeddedImage;
pub use parser::PdfDocument;
pub use text::{extract_fragments, fragments_from_operations, TextFragment};
