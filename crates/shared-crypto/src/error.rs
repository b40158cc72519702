use thiserror::Error;

#[derive(Error, Debug)]
pub enum CryptoError {
    #[error("Private key not found: {0}")]
    KeyNotFound(String),

    #[error("Invalid private key: {0}")]
    InvalidKey(String),

    #[error("Signing failed: {0}")]
    SigningFailed(String),

    #[error("Key I/O error: {0}")]
    Io(#[from] std::io::Error),
}
