//! Digest helpers

use sha2::{Digest, Sha256};

pub fn sha256(data: &[u8]) -> [u8; 32] {
    Sha256::digest(data).into()
}

pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(sha256(data))
}

/// Derive the document identifier from signature bytes.
///
/// The id is the hex SHA-256 of the signature, not of the document, so it is
/// a pure function of the signature bytes and always 64 filesystem-safe
/// characters. Collisions are assumed not to happen; stores do not check for
/// them and a second write under the same id replaces the first.
pub fn document_id(signature: &[u8]) -> String {
    sha256_hex(signature)
}
