use thiserror::Error;

#[derive(Error, Debug)]
pub enum PdfError {
    #[error("Failed to parse PDF: {0}")]
    ParseError(String),

    #[error("Encrypted PDFs are not supported")]
    Encrypted,

    #[error("Page {0} not found")]
    PageNotFound(u32),

    #[error("Malformed page structure: {0}")]
    Structure(String),

    #[error("Image error: {0}")]
    Image(String),

    #[error("Failed to write PDF: {0}")]
    WriteError(String),
}

impl From<lopdf::Error> for PdfError {
    fn from(e: lopdf::Error) -> Self {
        PdfError::Structure(e.to_string())
    }
}
