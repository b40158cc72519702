//! Artifact persistence
//!
//! Sealed documents are stored as three keyed artifacts: the sealed bytes,
//! the original bytes and a JSON metadata record. Keys are derived from the
//! document id, which is a hex digest, so writes never contend.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Invalid artifact key: {0}")]
    InvalidKey(String),

    #[error("Storage I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Record serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Store lock poisoned")]
    Poisoned,
}

/// Key of the sealed document
pub fn sealed_key(document_id: &str) -> String {
    format!("{}.pdf", document_id)
}

/// Key of the original, unsealed upload
pub fn original_key(document_id: &str) -> String {
    format!("{}_original.pdf", document_id)
}

/// Key of the metadata record
pub fn record_key(document_id: &str) -> String {
    format!("{}.json", document_id)
}

/// Put/get storage for byte blobs and JSON records
pub trait ArtifactStore: Send + Sync {
    fn put_blob(&self, key: &str, bytes: &[u8]) -> Result<(), StoreError>;
    fn get_blob(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;
    fn put_record(&self, key: &str, record: &Value) -> Result<(), StoreError>;
    fn get_record(&self, key: &str) -> Result<Option<Value>, StoreError>;
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    blobs: RwLock<HashMap<String, Vec<u8>>>,
    records: RwLock<HashMap<String, Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored blobs and records
    pub fn len(&self) -> usize {
        let blobs = self.blobs.read().map(|b| b.len()).unwrap_or(0);
        let records = self.records.read().map(|r| r.len()).unwrap_or(0);
        blobs + records
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ArtifactStore for MemoryStore {
    fn put_blob(&self, key: &str, bytes: &[u8]) -> Result<(), StoreError> {
        self.blobs
            .write()
            .map_err(|_| StoreError::Poisoned)?
            .insert(key.to_string(), bytes.to_vec());
        Ok(())
    }

    fn get_blob(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self
            .blobs
            .read()
            .map_err(|_| StoreError::Poisoned)?
            .get(key)
            .cloned())
    }

    fn put_record(&self, key: &str, record: &Value) -> Result<(), StoreError> {
        self.records
            .write()
            .map_err(|_| StoreError::Poisoned)?
            .insert(key.to_string(), record.clone());
        Ok(())
    }

    fn get_record(&self, key: &str) -> Result<Option<Value>, StoreError> {
        Ok(self
            .records
            .read()
            .map_err(|_| StoreError::Poisoned)?
            .get(key)
            .cloned())
    }
}

/// One file per key under a root directory
#[derive(Debug, Clone)]
pub struct FsStore {
    root: PathBuf,
}

impl FsStore {
    /// Open a store, creating the root directory if needed
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StoreError> {
        let safe = !key.is_empty()
            && !key.starts_with('.')
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '+' | '='));
        if !safe {
            return Err(StoreError::InvalidKey(key.to_string()));
        }
        Ok(self.root.join(key))
    }

    fn read(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        match fs::read(self.path_for(key)?) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

impl ArtifactStore for FsStore {
    fn put_blob(&self, key: &str, bytes: &[u8]) -> Result<(), StoreError> {
        fs::write(self.path_for(key)?, bytes)?;
        Ok(())
    }

    fn get_blob(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        self.read(key)
    }

    fn put_record(&self, key: &str, record: &Value) -> Result<(), StoreError> {
        let path = self.path_for(key)?;
        fs::write(path, serde_json::to_vec_pretty(record)?)?;
        Ok(())
    }

    fn get_record(&self, key: &str) -> Result<Option<Value>, StoreError> {
        match self.read(key)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }
}
