//! Snapshot-file persistence.
//!
//! Every flush rewrites `<collection>.<extension>` with the full document set,
//! encoded by [`SnapshotCodec`] and written atomically.

use std::sync::Arc;

use crate::backend::{Change, DocumentView, PersistenceBackend, SnapshotConfig};
use crate::document::Document;
use crate::error::{Result, TesseraError};
use crate::snapshot::SnapshotCodec;
use crate::storage::{Storage, read_all, write_atomic};

#[derive(Debug)]
pub struct SnapshotBackend {
    storage: Arc<dyn Storage>,
    codec: SnapshotCodec,
    extension: String,
}

impl SnapshotBackend {
    /// Create a backend with the default extension and compression level.
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self::with_config(storage, &SnapshotConfig::default())
    }

    pub fn with_config(storage: Arc<dyn Storage>, config: &SnapshotConfig) -> Self {
        SnapshotBackend {
            storage,
            codec: SnapshotCodec::new(config.compression_level),
            extension: config.extension.clone(),
        }
    }

    /// Name of the snapshot file of `collection`.
    pub fn snapshot_name(&self, collection: &str) -> String {
        format!("{collection}.{}", self.extension)
    }

    pub fn storage(&self) -> &Arc<dyn Storage> {
        &self.storage
    }
}

impl PersistenceBackend for SnapshotBackend {
    fn kind(&self) -> &'static str {
        "snapshot"
    }

    fn load(&self, collection: &str) -> Result<Option<Vec<Document>>> {
        let name = self.snapshot_name(collection);
        if !self.storage.file_exists(&name) {
            return Ok(None);
        }

        let bytes = read_all(self.storage.as_ref(), &name)
            .map_err(|e| TesseraError::load_failed(format!("{name}: {e}")))?;
        let documents = self.codec.from_bytes(&bytes).map_err(|e| match e {
            TesseraError::CorruptSnapshot(reason) => {
                TesseraError::corrupt_snapshot(format!("{name}: {reason}"))
            }
            other => other,
        })?;

        log::debug!(
            "read snapshot {name} ({} bytes, {} documents)",
            bytes.len(),
            documents.len()
        );
        Ok(Some(documents))
    }

    fn persist(
        &self,
        collection: &str,
        changes: &[Change],
        view: &dyn DocumentView,
    ) -> Result<()> {
        let name = self.snapshot_name(collection);
        let documents = view.documents();
        let bytes = self.codec.to_bytes(&documents)?;

        write_atomic(self.storage.as_ref(), &name, &bytes)
            .map_err(|e| TesseraError::save_failed(format!("{name}: {e}")))?;

        log::debug!(
            "wrote snapshot {name} ({} bytes, {} documents, {} changes)",
            bytes.len(),
            documents.len(),
            changes.len()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::DocumentId;
    use crate::storage::memory::MemoryStorage;
    use std::io::Write;

    struct FixedView(Vec<Document>);

    impl DocumentView for FixedView {
        fn documents(&self) -> Vec<Document> {
            self.0.clone()
        }

        fn get(&self, id: &DocumentId) -> Option<Document> {
            self.0.iter().find(|d| &d.id == id).cloned()
        }
    }

    fn backend() -> (MemoryStorage, SnapshotBackend) {
        let storage = MemoryStorage::new_default();
        let backend = SnapshotBackend::new(Arc::new(storage.clone()));
        (storage, backend)
    }

    #[test]
    fn test_missing_snapshot_loads_as_none() {
        let (_, backend) = backend();
        assert!(backend.load("fresh").unwrap().is_none());
    }

    #[test]
    fn test_persist_then_load() {
        let (storage, backend) = backend();
        let documents = vec![
            Document::new("a", vec![1.0, 0.0]),
            Document::new("b", vec![0.0, 1.0]),
        ];
        let ids = documents.iter().map(|d| d.id).collect();
        backend
            .persist("notes", &[Change::Upsert(ids)], &FixedView(documents.clone()))
            .unwrap();

        assert!(storage.file_exists("notes.snapshot"));
        assert_eq!(backend.load("notes").unwrap(), Some(documents));
    }

    #[test]
    fn test_corrupt_snapshot_is_an_error() {
        let (storage, backend) = backend();
        let mut output = storage.create_output("broken.snapshot").unwrap();
        output.write_all(b"\x01garbage").unwrap();
        output.close().unwrap();

        let err = backend.load("broken").unwrap_err();
        assert!(matches!(err, TesseraError::CorruptSnapshot(_)));
        assert!(err.to_string().contains("broken.snapshot"));
    }

    #[test]
    fn test_custom_extension() {
        let storage = MemoryStorage::new_default();
        let config = SnapshotConfig {
            extension: "svdb".to_string(),
            ..Default::default()
        };
        let backend = SnapshotBackend::with_config(Arc::new(storage.clone()), &config);
        backend
            .persist("x", &[Change::Clear], &FixedView(Vec::new()))
            .unwrap();
        assert!(storage.file_exists("x.svdb"));
        assert!(!storage.file_exists("x.snapshot"));
        assert_eq!(backend.load("x").unwrap(), Some(Vec::new()));
    }
}
