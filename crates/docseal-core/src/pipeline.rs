//! The sealing pipeline
//!
//! `RECEIVED → SIGNED → COMPOSED → PLACED → PERSISTED → COMPLETE`, or
//! `FAILED` from any state. Input and signing failures abort the request.
//! Composition failures degrade the affected stage to the unmodified
//! original content and are reported in [`SealedDocument::degraded`].
//! Persistence failures are logged and never fail the request.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use lopdf::Document;
use shared_crypto::{document_id, KeyProvider, SigningIdentity};
use shared_pdf::parser::{page_box, save_to_bytes};
use shared_pdf::{append_blank_page, merge_overlays, OverlayPage, PdfDocument};
use shared_types::{
    FontStyle, PageBox, SealMetadata, Signatory, SignatureRecord, SIGNATURE_ALGORITHM,
};

use crate::anchors::{resolve_placement, search_anchors, AnchorSearch, ResolvedAnchors};
use crate::error::SealError;
use crate::overlay::{render_signatures, SignatureLayout};
use crate::qr::ScannableCodeGenerator;
use crate::stamp::{verification_url, StampRenderer};
use crate::store::{original_key, record_key, sealed_key, ArtifactStore, StoreError};

/// Pipeline states, as logged
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SealState {
    Received,
    Signed,
    Composed,
    Placed,
    Persisted,
    Complete,
    Failed,
}

impl fmt::Display for SealState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SealState::Received => "RECEIVED",
            SealState::Signed => "SIGNED",
            SealState::Composed => "COMPOSED",
            SealState::Placed => "PLACED",
            SealState::Persisted => "PERSISTED",
            SealState::Complete => "COMPLETE",
            SealState::Failed => "FAILED",
        };
        f.write_str(name)
    }
}

/// One sealing request
#[derive(Debug, Clone)]
pub struct SealRequest {
    pub pdf: Vec<u8>,
    /// Caller-facing name of the upload, recorded in the metadata
    pub source_identifier: String,
    pub signatories: Vec<Signatory>,
    pub font: FontStyle,
}

impl SealRequest {
    pub fn new(pdf: Vec<u8>, source_identifier: impl Into<String>) -> Self {
        Self {
            pdf,
            source_identifier: source_identifier.into(),
            signatories: Vec::new(),
            font: FontStyle::Default,
        }
    }

    pub fn with_signatory(mut self, signatory: Signatory) -> Self {
        self.signatories.push(signatory);
        self
    }

    pub fn with_font(mut self, font: FontStyle) -> Self {
        self.font = font;
        self
    }

    /// Signatories that contribute an artifact: a non-blank name or an image
    fn effective_signatories(&self) -> Vec<Signatory> {
        self.signatories
            .iter()
            .filter(|s| !s.name.trim().is_empty() || s.image.is_some())
            .cloned()
            .collect()
    }
}

/// Where the signature overlay ended up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    OnExistingPage { page_index: usize },
    AppendedPage,
    NotRequested,
}

/// The result of a sealing request
#[derive(Debug, Clone)]
pub struct SealedDocument {
    pub document_id: String,
    pub sealed_bytes: Vec<u8>,
    pub original_bytes: Vec<u8>,
    pub record: SignatureRecord,
    pub source_identifier: String,
    pub verification_url: String,
    pub placement: Placement,
    /// Composition stages that fell back to unmodified content
    pub degraded: Vec<String>,
}

impl SealedDocument {
    pub fn metadata(&self) -> SealMetadata {
        self.record.metadata(&self.source_identifier)
    }

    pub fn is_degraded(&self) -> bool {
        !self.degraded.is_empty()
    }
}

/// Synchronous sealing pipeline
#[derive(Clone)]
pub struct Sealer {
    keys: Arc<dyn KeyProvider>,
    codes: Arc<dyn ScannableCodeGenerator>,
    base_url: String,
}

impl Sealer {
    pub fn new(
        keys: Arc<dyn KeyProvider>,
        codes: Arc<dyn ScannableCodeGenerator>,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            keys,
            codes,
            base_url: base_url.into(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Sign, stamp and place signatures. Nothing is persisted.
    pub fn seal(&self, request: SealRequest) -> Result<SealedDocument, SealError> {
        let source_identifier = request.source_identifier.clone();
        self.seal_inner(request).inspect_err(|e| {
            tracing::warn!(
                state = %SealState::Failed,
                source = %source_identifier,
                kind = e.kind(),
                "Sealing failed: {}",
                e
            );
        })
    }

    /// Seal, then persist the three artifacts. Persistence is best-effort:
    /// the sealed document is returned even if storing it failed.
    pub fn seal_and_persist(
        &self,
        request: SealRequest,
        store: &dyn ArtifactStore,
    ) -> Result<SealedDocument, SealError> {
        let sealed = self.seal(request)?;
        persist_logged(&sealed, store);
        Ok(sealed)
    }

    fn seal_inner(&self, request: SealRequest) -> Result<SealedDocument, SealError> {
        tracing::debug!(
            state = %SealState::Received,
            source = %request.source_identifier,
            bytes = request.pdf.len(),
            "Seal request received"
        );
        let signatories = request.effective_signatories();
        let SealRequest {
            pdf,
            source_identifier,
            font,
            ..
        } = request;

        let source = PdfDocument::from_bytes(pdf).map_err(SealError::Input)?;

        let identity = self.keys.identity()?;
        let signature = identity.sign(source.bytes())?;
        let id = document_id(&signature);
        let record = SignatureRecord {
            document_id: id.clone(),
            signature,
            algorithm: SIGNATURE_ALGORITHM,
            timestamp: Utc::now(),
            signatories,
        };
        tracing::debug!(state = %SealState::Signed, document_id = %id, "Document signed");

        let url = verification_url(&self.base_url, &id);
        let mut composer = Composer::new(&source, self.codes.as_ref(), &record, &url);

        composer.stamp_pages();
        tracing::debug!(state = %SealState::Composed, document_id = %id, "Pages stamped");

        let placement = composer.place_signatures(font);
        tracing::debug!(
            state = %SealState::Placed,
            document_id = %id,
            placement = ?placement,
            "Signatures placed"
        );

        let (sealed_bytes, degraded) = composer.finish();
        tracing::info!(
            document_id = %id,
            placement = ?placement,
            degraded = degraded.len(),
            "Sealed {} ({} bytes)",
            source_identifier,
            sealed_bytes.len()
        );

        Ok(SealedDocument {
            document_id: id,
            sealed_bytes,
            original_bytes: source.bytes().to_vec(),
            record,
            source_identifier,
            verification_url: url,
            placement,
            degraded,
        })
    }
}

/// Write the sealed bytes, original bytes and metadata record
pub fn persist(sealed: &SealedDocument, store: &dyn ArtifactStore) -> Result<(), StoreError> {
    let id = &sealed.document_id;
    store.put_blob(&sealed_key(id), &sealed.sealed_bytes)?;
    store.put_blob(&original_key(id), &sealed.original_bytes)?;
    let record = serde_json::to_value(sealed.metadata())?;
    store.put_record(&record_key(id), &record)?;
    Ok(())
}

/// Persist and log the outcome. Returns whether the artifacts were stored.
pub fn persist_logged(sealed: &SealedDocument, store: &dyn ArtifactStore) -> bool {
    match persist(sealed, store) {
        Ok(()) => {
            tracing::debug!(
                state = %SealState::Persisted,
                document_id = %sealed.document_id,
                "Artifacts persisted"
            );
            tracing::debug!(state = %SealState::Complete, document_id = %sealed.document_id, "Seal complete");
            true
        }
        Err(e) => {
            tracing::warn!(
                document_id = %sealed.document_id,
                "Failed to persist sealed document: {}",
                e
            );
            false
        }
    }
}

/// Composition state for one request: a working copy of the source plus the
/// stages that had to fall back
struct Composer<'a> {
    source: &'a PdfDocument,
    codes: &'a dyn ScannableCodeGenerator,
    record: &'a SignatureRecord,
    url: &'a str,
    hash: String,
    doc: Document,
    degraded: Vec<String>,
}

impl<'a> Composer<'a> {
    fn new(
        source: &'a PdfDocument,
        codes: &'a dyn ScannableCodeGenerator,
        record: &'a SignatureRecord,
        url: &'a str,
    ) -> Self {
        Self {
            source,
            codes,
            record,
            url,
            hash: record.signature_base64(),
            doc: source.doc().clone(),
            degraded: Vec::new(),
        }
    }

    fn degrade(&mut self, stage: String, error: impl fmt::Display) {
        tracing::warn!(
            document_id = %self.record.document_id,
            "{} left unmodified: {}",
            stage,
            error
        );
        self.degraded.push(stage);
    }

    fn stamp(&self, media_box: &PageBox) -> Result<OverlayPage, shared_pdf::PdfError> {
        StampRenderer::new(self.codes).render(&self.hash, self.url, media_box.width, media_box.height)
    }

    fn stamp_pages(&mut self) {
        let source = self.source;
        for (index, &page_id) in source.page_ids().iter().enumerate() {
            let result = page_box(&self.doc, page_id)
                .and_then(|media_box| self.stamp(&media_box))
                .and_then(|stamp| merge_overlays(&mut self.doc, page_id, &[&stamp]));
            if let Err(e) = result {
                self.degrade(format!("stamp on page {}", index + 1), e);
            }
        }
    }

    fn place_signatures(&mut self, font: FontStyle) -> Placement {
        if self.record.signatories.is_empty() {
            return Placement::NotRequested;
        }

        match search_anchors(self.source) {
            AnchorSearch::Found {
                page_index,
                anchors,
            } => {
                self.place_on_page(page_index, resolve_placement(&anchors), font);
                Placement::OnExistingPage { page_index }
            }
            AnchorSearch::NotFound => {
                self.append_signature_page(font);
                Placement::AppendedPage
            }
        }
    }

    fn place_on_page(&mut self, page_index: usize, absolute: ResolvedAnchors, font: FontStyle) {
        let stage = format!("signatures on page {}", page_index + 1);
        let source = self.source;
        let (page_id, media_box) = match (source.page_id(page_index), source.page_box(page_index)) {
            (Some(page_id), Ok(media_box)) => (page_id, media_box),
            (None, _) => return self.degrade(stage, "page missing"),
            (_, Err(e)) => return self.degrade(stage, e),
        };

        // Detection works in absolute page space, overlays in page-relative space
        let anchors = ResolvedAnchors {
            contratante: absolute.contratante.map(|p| media_box.relative(p)),
            contratada: absolute.contratada.map(|p| media_box.relative(p)),
        };
        let overlay = render_signatures(
            &self.record.signatories,
            font,
            self.signed_at(),
            &SignatureLayout::anchored(media_box.width, media_box.height, anchors),
        );
        if let Err(e) = merge_overlays(&mut self.doc, page_id, &[&overlay]) {
            self.degrade(stage, e);
        }
    }

    fn append_signature_page(&mut self, font: FontStyle) {
        let Some(last_index) = self.source.page_count().checked_sub(1) else {
            return;
        };
        let media_box = match self.source.page_box(last_index) {
            Ok(media_box) => media_box.at_origin(),
            Err(e) => {
                self.degrade("signature page".to_string(), e);
                return;
            }
        };

        let signatures = render_signatures(
            &self.record.signatories,
            font,
            self.signed_at(),
            &SignatureLayout::standalone(media_box.width, media_box.height),
        );
        let stamp = match self.stamp(&media_box) {
            Ok(stamp) => Some(stamp),
            Err(e) => {
                self.degrade("stamp on signature page".to_string(), e);
                None
            }
        };
        let layers: Vec<&OverlayPage> = stamp.iter().chain(std::iter::once(&signatures)).collect();

        let result = append_blank_page(&mut self.doc, media_box)
            .and_then(|page_id| merge_overlays(&mut self.doc, page_id, &layers));
        if let Err(e) = result {
            self.degrade("signature page".to_string(), e);
        }
    }

    fn signed_at(&self) -> DateTime<Utc> {
        self.record.timestamp
    }

    /// Assemble the output. If the document cannot be written the original
    /// bytes are returned unchanged.
    fn finish(mut self) -> (Vec<u8>, Vec<String>) {
        self.doc.compress();
        match save_to_bytes(&mut self.doc) {
            Ok(bytes) => (bytes, self.degraded),
            Err(e) => {
                self.degrade("document assembly".to_string(), e);
                (self.source.bytes().to_vec(), self.degraded)
            }
        }
    }
}
