//! Async front of the pipeline: a bounded pool of blocking sealing workers
//! with out-of-band persistence

use std::sync::Arc;

use shared_crypto::PemKeyProvider;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;

use crate::config::SealConfig;
use crate::error::SealError;
use crate::pipeline::{persist_logged, SealRequest, SealedDocument, Sealer};
use crate::qr::QrCodeGenerator;
use crate::store::{ArtifactStore, FsStore};

/// Background write of one sealed document's artifacts
#[derive(Debug)]
pub struct PersistenceHandle {
    document_id: String,
    task: JoinHandle<bool>,
}

impl PersistenceHandle {
    pub fn document_id(&self) -> &str {
        &self.document_id
    }

    /// Wait for the write. Returns whether all artifacts were stored.
    pub async fn wait(self) -> bool {
        match self.task.await {
            Ok(stored) => stored,
            Err(e) => {
                tracing::warn!(
                    document_id = %self.document_id,
                    "Persistence task did not complete: {}",
                    e
                );
                false
            }
        }
    }
}

#[derive(Clone)]
pub struct SealService {
    sealer: Arc<Sealer>,
    store: Arc<dyn ArtifactStore>,
    permits: Arc<Semaphore>,
}

impl SealService {
    pub fn new(sealer: Sealer, store: Arc<dyn ArtifactStore>, max_concurrent: usize) -> Self {
        Self {
            sealer: Arc::new(sealer),
            store,
            permits: Arc::new(Semaphore::new(max_concurrent.max(1))),
        }
    }

    /// Build a service backed by the PEM key file and filesystem store named
    /// in the configuration
    pub fn from_config(config: &SealConfig) -> anyhow::Result<Self> {
        use anyhow::Context;

        let store = FsStore::open(&config.storage.root).with_context(|| {
            format!(
                "Failed to open storage directory: {}",
                config.storage.root.display()
            )
        })?;
        let sealer = Sealer::new(
            Arc::new(PemKeyProvider::new(&config.signing.private_key_path)),
            Arc::new(QrCodeGenerator),
            config.verification.base_url.clone(),
        );
        Ok(Self::new(
            sealer,
            Arc::new(store),
            config.workers.max_concurrent,
        ))
    }

    pub fn store(&self) -> &Arc<dyn ArtifactStore> {
        &self.store
    }

    /// Seals currently in flight may use at most this many more workers
    pub fn available_workers(&self) -> usize {
        self.permits.available_permits()
    }

    /// Seal on the worker pool. The sealed document is returned as soon as
    /// composition finishes; its artifacts are written in the background.
    pub async fn seal(
        &self,
        request: SealRequest,
    ) -> Result<(SealedDocument, PersistenceHandle), SealError> {
        // The permit lives in the blocking task so a cancelled caller keeps
        // its worker counted until the seal actually finishes
        let permit = Arc::clone(&self.permits)
            .acquire_owned()
            .await
            .map_err(|e| SealError::Worker(e.to_string()))?;
        let sealer = Arc::clone(&self.sealer);
        let sealed = tokio::task::spawn_blocking(move || {
            let result = sealer.seal(request);
            drop(permit);
            result
        })
        .await
        .map_err(|e| SealError::Worker(format!("Sealing task panicked: {}", e)))??;

        let store = Arc::clone(&self.store);
        let to_store = sealed.clone();
        let task = tokio::task::spawn_blocking(move || persist_logged(&to_store, store.as_ref()));

        let handle = PersistenceHandle {
            document_id: sealed.document_id.clone(),
            task,
        };
        Ok((sealed, handle))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lookup::lookup;
    use crate::store::MemoryStore;
    use shared_crypto::{CryptoError, KeyProvider, RsaPssIdentity, StaticKeyProvider};
    use shared_pdf::test_support;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::OnceLock;
    use std::time::Duration;

    fn identity() -> RsaPssIdentity {
        static IDENTITY: OnceLock<RsaPssIdentity> = OnceLock::new();
        IDENTITY
            .get_or_init(|| RsaPssIdentity::generate(1024).unwrap())
            .clone()
    }

    fn blank_pdf() -> Vec<u8> {
        test_support::blank_pdf(1)
    }

    /// Key provider that holds the worker for a while and records how many
    /// seals run at once
    struct SlowKeys {
        running: AtomicUsize,
        peak: AtomicUsize,
    }

    impl KeyProvider for SlowKeys {
        fn identity(&self) -> Result<RsaPssIdentity, CryptoError> {
            let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(300));
            self.running.fetch_sub(1, Ordering::SeqCst);
            Ok(identity())
        }
    }

    fn service(store: Arc<dyn ArtifactStore>, workers: usize) -> SealService {
        let sealer = Sealer::new(
            Arc::new(StaticKeyProvider::new(identity())),
            Arc::new(QrCodeGenerator),
            "https://localhost:8000/validar",
        );
        SealService::new(sealer, store, workers)
    }

    #[tokio::test]
    async fn test_seal_then_persist() {
        let store = Arc::new(MemoryStore::new());
        let service = service(store.clone(), 2);

        let (sealed, handle) = service
            .seal(SealRequest::new(blank_pdf(), "contrato.pdf"))
            .await
            .unwrap();
        assert_eq!(handle.document_id(), sealed.document_id);
        assert!(handle.wait().await);

        let found = lookup(store.as_ref(), &sealed.document_id).unwrap().unwrap();
        assert_eq!(found.sealed, Some(sealed.sealed_bytes));
        assert_eq!(found.original, Some(sealed.original_bytes));
        assert_eq!(service.available_workers(), 2);
    }

    #[tokio::test]
    async fn test_concurrent_requests_are_independent() {
        let store = Arc::new(MemoryStore::new());
        let service = service(store.clone(), 2);

        let mut tasks = Vec::new();
        for i in 0..4 {
            let service = service.clone();
            tasks.push(tokio::spawn(async move {
                let (sealed, handle) = service
                    .seal(SealRequest::new(blank_pdf(), format!("doc-{}.pdf", i)))
                    .await
                    .unwrap();
                assert!(handle.wait().await);
                sealed.document_id
            }));
        }

        let mut ids = Vec::new();
        for task in tasks {
            ids.push(task.await.unwrap());
        }
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 4);
        assert_eq!(store.len(), 12);
    }

    #[tokio::test]
    async fn test_input_error_writes_nothing() {
        let store = Arc::new(MemoryStore::new());
        let err = service(store.clone(), 1)
            .seal(SealRequest::new(b"not a pdf".to_vec(), "bad.pdf"))
            .await
            .unwrap_err();
        assert!(matches!(err, SealError::Input(_)));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_cancelled_callers_keep_pool_bound() {
        let keys = Arc::new(SlowKeys {
            running: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        });
        let sealer = Sealer::new(
            keys.clone(),
            Arc::new(QrCodeGenerator),
            "https://localhost:8000/validar",
        );
        let service = SealService::new(sealer, Arc::new(MemoryStore::new()), 1);

        for i in 0..3 {
            let call = service.seal(SealRequest::new(blank_pdf(), format!("doc-{}.pdf", i)));
            let outcome = tokio::time::timeout(Duration::from_millis(50), call).await;
            assert!(outcome.is_err());
        }
        assert_eq!(service.available_workers(), 0);

        // The abandoned seal still owns the only worker
        let (sealed, handle) = service
            .seal(SealRequest::new(blank_pdf(), "last.pdf"))
            .await
            .unwrap();
        assert_eq!(handle.document_id(), sealed.document_id);
        assert!(handle.wait().await);
        assert_eq!(keys.peak.load(Ordering::SeqCst), 1);
        assert_eq!(service.available_workers(), 1);
    }

    #[test]
    fn test_from_config_opens_storage() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = SealConfig::default();
        config.storage.root = dir.path().join("assinados");
        config.workers.max_concurrent = 3;

        let service = SealService::from_config(&config).unwrap();
        assert_eq!(service.available_workers(), 3);
        assert!(config.storage.root.is_dir());
    }
}
