//! Shared cryptography utilities
//!
//! This crate provides RSA-PSS signing identities, private-key providers,
//! and the digest helpers used to derive document identifiers.

pub mod digest;
pub mod error;
pub mod keys;

pub use digest::{document_id, sha256, sha256_hex};
pub use error::CryptoError;
pub use keys::{KeyProvider, PemKeyProvider, RsaPssIdentity, SigningIdentity, StaticKeyProvider};
