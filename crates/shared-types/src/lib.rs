//! Shared data model for the sealing pipeline

pub mod record;
pub mod types;

pub use record::{
    SealMetadata, SignatoryEntry, Signatory, SignatoryRole, SignatureRecord, SIGNATURE_ALGORITHM,
};
pub use types::{FontStyle, PageBox, Point};
