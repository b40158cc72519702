//! Verification lookup by document id

use shared_types::SealMetadata;

use crate::store::{original_key, record_key, sealed_key, ArtifactStore, StoreError};

/// Everything stored for one sealed document
#[derive(Debug, Clone, PartialEq)]
pub struct VerificationRecord {
    /// The id variant the artifacts were found under
    pub document_id: String,
    pub metadata: SealMetadata,
    pub sealed: Option<Vec<u8>>,
    pub original: Option<Vec<u8>>,
}

/// Candidate spellings of an id that may have been mangled in transit: as
/// given, with spaces turned back into `+`, in URL-safe base64 form, and
/// percent-decoded. Duplicates are dropped, order is kept.
pub fn id_variants(raw: &str) -> Vec<String> {
    let url_safe = raw
        .replace('+', "-")
        .replace('/', "_")
        .trim_end_matches('=')
        .to_string();
    let decoded = urlencoding::decode(raw)
        .map(|d| d.into_owned())
        .unwrap_or_else(|_| raw.to_string());

    let mut variants: Vec<String> = Vec::with_capacity(4);
    for candidate in [raw.to_string(), raw.replace(' ', "+"), url_safe, decoded] {
        if !candidate.is_empty() && !variants.contains(&candidate) {
            variants.push(candidate);
        }
    }
    variants
}

/// Resolve the metadata record and both byte streams for an id.
///
/// The first variant with a metadata record wins. The sealed and original
/// streams are looked up independently and may each be absent.
pub fn lookup(store: &dyn ArtifactStore, raw_id: &str) -> Result<Option<VerificationRecord>, StoreError> {
    for id in id_variants(raw_id.trim()) {
        let record = match store.get_record(&record_key(&id)) {
            Ok(Some(record)) => record,
            Ok(None) | Err(StoreError::InvalidKey(_)) => continue,
            Err(e) => return Err(e),
        };
        let metadata: SealMetadata = serde_json::from_value(record)?;

        let sealed = store.get_blob(&sealed_key(&id))?;
        let original = store.get_blob(&original_key(&id))?;
        tracing::debug!(
            "Lookup {} resolved as {} (sealed: {}, original: {})",
            raw_id,
            id,
            sealed.is_some(),
            original.is_some()
        );

        return Ok(Some(VerificationRecord {
            document_id: id,
            metadata,
            sealed,
            original,
        }));
    }

    Ok(None)
}
