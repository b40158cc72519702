use shared_crypto::CryptoError;
use shared_pdf::PdfError;
use thiserror::Error;

/// Failures that reject a sealing request. Composition and persistence
/// problems never surface here: they degrade the affected stage or are logged.
#[derive(Debug, Error)]
pub enum SealError {
    /// Malformed upload or unreadable page structure, rejected before signing
    #[error("Invalid input document: {0}")]
    Input(#[source] PdfError),

    #[error("Signing failed: {0}")]
    Signing(#[from] CryptoError),

    #[error("Worker pool unavailable: {0}")]
    Worker(String),
}

impl SealError {
    /// Stable label for logs
    pub fn kind(&self) -> &'static str {
        match self {
            SealError::Input(_) => "input",
            SealError::Signing(_) => "signing",
            SealError::Worker(_) => "worker",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_labels() {
        let input = SealError::Input(PdfError::ParseError("truncated".to_string()));
        assert_eq!(input.kind(), "input");
        assert!(input.to_string().starts_with("Invalid input document"));
        let signing = SealError::from(CryptoError::KeyNotFound("operator.pem".to_string()));
        assert_eq!(signing.kind(), "signing");
        assert_eq!(SealError::Worker("closed".to_string()).kind(), "worker");
    }
}
