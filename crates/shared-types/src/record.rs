//! Signature records and the persisted metadata schema

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Algorithm label recorded for every seal
pub const SIGNATURE_ALGORITHM: &str = "RSASSA-PSS-SHA256";

/// Party to the contract
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignatoryRole {
    Contratante,
    Contratada,
}

impl SignatoryRole {
    pub const ALL: [SignatoryRole; 2] = [SignatoryRole::Contratante, SignatoryRole::Contratada];

    /// Caption printed under the signature rule
    pub fn caption(&self) -> &'static str {
        match self {
            SignatoryRole::Contratante => "CONTRATANTE",
            SignatoryRole::Contratada => "CONTRATADA",
        }
    }
}

impl std::fmt::Display for SignatoryRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SignatoryRole::Contratante => write!(f, "contratante"),
            SignatoryRole::Contratada => write!(f, "contratada"),
        }
    }
}

/// A signer as captured for one request
#[derive(Debug, Clone, PartialEq)]
pub struct Signatory {
    pub name: String,
    pub role: SignatoryRole,
    pub email: Option<String>,
    pub image: Option<Vec<u8>>,
}

/// The cryptographic outcome of one sealing request. Built once, never mutated.
#[derive(Debug, Clone)]
pub struct SignatureRecord {
    pub document_id: String,
    pub signature: Vec<u8>,
    pub algorithm: &'static str,
    pub timestamp: DateTime<Utc>,
    pub signatories: Vec<Signatory>,
}

impl SignatureRecord {
    pub fn signature_base64(&self) -> String {
        BASE64.encode(&self.signature)
    }

    /// Build the persisted metadata record
    pub fn metadata(&self, source_identifier: &str) -> SealMetadata {
        SealMetadata {
            document_id: self.document_id.clone(),
            signature_base64: self.signature_base64(),
            signed_at: self.timestamp.to_rfc3339(),
            signatories: self
                .signatories
                .iter()
                .map(|s| SignatoryEntry {
                    name: s.name.clone(),
                    role: s.role,
                    email: s.email.clone(),
                })
                .collect(),
            source_identifier: source_identifier.to_string(),
        }
    }
}

/// Signer entry in the metadata record (images are not persisted)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignatoryEntry {
    pub name: String,
    pub role: SignatoryRole,
    #[serde(default)]
    pub email: Option<String>,
}

/// Metadata record persisted next to the sealed and original documents
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SealMetadata {
    pub document_id: String,
    pub signature_base64: String,
    pub signed_at: String,
    pub signatories: Vec<SignatoryEntry>,
    pub source_identifier: String,
}
