//! Document sealing
//!
//! This crate signs uploaded PDFs with the operator key, stamps every page
//! with a verification footer, places signer names or images at detected
//! anchors (or on an appended signature page) and persists the artifacts
//! needed for later verification.
//!
//! - `Sealer`: synchronous pipeline, one request at a time
//! - `SealService`: bounded async worker pool with background persistence
//! - `lookup`: resolve a document id back to its stored artifacts

pub mod anchors;
pub mod config;
pub mod error;
pub mod lookup;
pub mod overlay;
pub mod pipeline;
pub mod qr;
pub mod service;
pub mod stamp;
pub mod store;

pub use anchors::{
    classify_fragments, detect_anchors, resolve_placement, search_anchors, AnchorSearch,
    AnchorSet, ResolvedAnchors,
};
pub use config::SealConfig;
pub use error::SealError;
pub use lookup::{id_variants, lookup, VerificationRecord};
pub use overlay::{render_signatures, SignatureLayout};
pub use pipeline::{persist, Placement, SealRequest, SealState, SealedDocument, Sealer};
pub use qr::{CodeError, QrCodeGenerator, ScannableCodeGenerator};
pub use service::{PersistenceHandle, SealService};
pub use stamp::{verification_url, StampRenderer};
pub use store::{ArtifactStore, FsStore, MemoryStore, StoreError};
